use std::path::PathBuf;
use thiserror::Error;

pub type GrepIntelResult<T, E = GrepIntelError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GrepIntelError {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("config error: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("pattern file not found: {}", .0.display())]
  PatternFileNotFound(PathBuf),

  #[error("invalid pattern file {}: {reason}", path.display())]
  PatternParse { path: PathBuf, reason: String },

  #[error("unsupported language: {0}")]
  UnsupportedLanguage(String),

  #[error("target path not found: {}", .0.display())]
  TargetNotFound(PathBuf),

  #[error("other: {0}")]
  Other(String),
}

impl From<&str> for GrepIntelError {
  fn from(s: &str) -> Self {
    GrepIntelError::Other(s.to_owned())
  }
}

impl From<String> for GrepIntelError {
  fn from(s: String) -> Self {
    GrepIntelError::Other(s)
  }
}

#[test]
fn display_names_the_offending_path_and_language() {
  let e = GrepIntelError::PatternFileNotFound(PathBuf::from("patterns/php.txt"));
  assert_eq!(e.to_string(), "pattern file not found: patterns/php.txt");

  let e = GrepIntelError::UnsupportedLanguage("cobol".into());
  assert_eq!(e.to_string(), "unsupported language: cobol");

  let e: GrepIntelError = "boom".into();
  assert!(matches!(e, GrepIntelError::Other(ref m) if m == "boom"));
}
