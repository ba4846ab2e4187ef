use crate::utils::Config;
use std::path::Path;

/// Lowercased extension of `path`, without the dot.
pub fn lowercase_ext(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
}

/// Resolve the language of `path` through the configured extension table.
pub fn language_for_path<'c>(path: &Path, cfg: &'c Config) -> Option<&'c str> {
    let ext = lowercase_ext(path)?;
    cfg.language_for_extension(&ext)
}

#[test]
fn language_for_path_recognises_known_extensions() {
  let cfg = Config::default();
  let cases = [
    ("index.php",   Some("php")),
    ("INDEX.PHP",   Some("php")),
    ("Main.java",   Some("java")),
    ("script.PY",   Some("python")),
    ("app.tsx",     Some("javascript")),
    ("server.go",   Some("golang")),
    ("Rakefile",    None),
    ("style.css",   None),      // unsupported
  ];

  for (file, expected) in cases {
    assert_eq!(language_for_path(Path::new(file), &cfg), expected, "case: {file}");
  }
}
