use crate::analyzer::severity::Severity;
use crate::errors::GrepIntelResult;
use console::style;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

static DEFAULT_CONFIG_TOML: &str = include_str!("../../default-grepintel.conf");

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| (*s).to_owned()).collect()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ScannerConfig {
    /// Language → file extensions (without the dot, lowercase).
    pub extensions: BTreeMap<String, Vec<String>>,

    /// The maximum file size to scan, in megabytes.
    pub max_file_size_mb: Option<u64>,

    /// File extensions to exclude from scanning.
    pub excluded_extensions: Vec<String>,

    /// Directories to exclude from scanning.
    pub excluded_directories: Vec<String>,

    /// Whether to respect VCS ignore files (`.gitignore`, ..) or not.
    pub read_vcsignore: bool,

    /// Whether to follow symlinks or not.
    pub follow_symlinks: bool,

    /// Whether to scan hidden files or not.
    pub scan_hidden_files: bool,
}
impl Default for ScannerConfig {
    fn default() -> Self {
        let mut extensions = BTreeMap::new();
        extensions.insert(
            "php".to_owned(),
            strings(&["php", "phtml", "php3", "php4", "php5", "php7", "phps"]),
        );
        extensions.insert("java".to_owned(), strings(&["java", "jsp", "jspx"]));
        extensions.insert(
            "python".to_owned(),
            strings(&["py", "pyw", "pyc", "pyo", "pyd"]),
        );
        extensions.insert(
            "javascript".to_owned(),
            strings(&["js", "jsx", "ts", "tsx"]),
        );
        extensions.insert("golang".to_owned(), strings(&["go"]));
        extensions.insert(
            "ruby".to_owned(),
            strings(&["rb", "erb", "rake", "gemspec", "ru"]),
        );

        Self {
            extensions,
            max_file_size_mb: None,
            excluded_extensions: Vec::new(),
            excluded_directories: Vec::new(),
            read_vcsignore: false,
            follow_symlinks: false,
            scan_hidden_files: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PatternsConfig {
    /// Directory holding `languages/*.txt` and `frameworks/*.txt`.
    /// Built-in documents are used when unset.
    pub dir: Option<PathBuf>,

    /// Framework → owning language.
    pub frameworks: BTreeMap<String, String>,
}
impl Default for PatternsConfig {
    fn default() -> Self {
        let frameworks = [
            ("laravel", "php"),
            ("symfony", "php"),
            ("django", "python"),
            ("flask", "python"),
            ("fastapi", "python"),
            ("spring", "java"),
            ("rails", "ruby"),
            ("react", "javascript"),
            ("angular", "javascript"),
            ("vue", "javascript"),
            ("express", "javascript"),
            ("gin", "golang"),
            ("echo", "golang"),
        ]
        .into_iter()
        .map(|(f, l)| (f.to_owned(), l.to_owned()))
        .collect();

        Self {
            dir: None,
            frameworks,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Lines of context kept on each side of a match.
    pub context_lines: usize,

    /// Extractions per batched model request.
    pub batch_size: usize,

    /// Override for the single-finding prompt template.
    pub prompt_template: Option<PathBuf>,

    /// Vulnerability types that default to high severity.
    pub high_severity_types: Vec<String>,

    /// Vulnerability types that default to medium severity.
    pub medium_severity_types: Vec<String>,

    /// Impact keywords forcing high severity.
    pub high_keywords: Vec<String>,

    /// Impact keywords forcing low severity.
    pub low_keywords: Vec<String>,
}
impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            context_lines: 5,
            batch_size: 3,
            prompt_template: None,
            high_severity_types: strings(&[
                "SQL_INJECTION",
                "COMMAND_INJECTION",
                "INSECURE_DESERIALIZATION",
                "REMOTE_CODE_EXECUTION",
            ]),
            medium_severity_types: strings(&[
                "XSS",
                "CSRF",
                "PATH_TRAVERSAL",
                "AUTHENTICATION_FLAWS",
                "AUTHORIZATION_FLAWS",
                "SENSITIVE_DATA_EXPOSURE",
                "ELOQUENT_INJECTION",
                "MASS_ASSIGNMENT",
            ]),
            high_keywords: strings(&[
                "critical",
                "severe",
                "high",
                "remote",
                "full access",
                "data breach",
            ]),
            low_keywords: strings(&["minor", "low", "limited", "minimal"]),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// External command that reads a prompt on stdin and answers on stdout.
    pub command: Option<String>,

    /// Arguments passed to `command`.
    pub args: Vec<String>,

    /// Attempts after a rate-limited call before giving up.
    pub max_retries: u32,

    /// Base delay between retries, in seconds (multiplied by the attempt).
    pub retry_delay_secs: u64,

    /// Prompts are truncated to roughly this many tokens.
    pub max_prompt_tokens: usize,

    /// Whether to write every prompt/response pair to `chat_log_dir`.
    pub log_chat: bool,

    /// Where chat logs go. Defaults to the local data dir.
    pub chat_log_dir: Option<PathBuf>,
}
impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            max_retries: 3,
            retry_delay_secs: 5,
            max_prompt_tokens: 8000,
            log_chat: false,
            chat_log_dir: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// The default output format, `console` or `json`.
    pub default_format: String,

    /// Whether to print findings to the console or only the summary.
    pub quiet: bool,

    /// The maximum number of findings to show.
    pub max_results: Option<u32>,

    /// The minimum severity level to print.
    pub min_severity: Severity,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: "console".into(),
            quiet: false,
            max_results: None,
            min_severity: Severity::Low,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PerformanceConfig {
    /// The maximum number of worker threads to use., or `None` to auto-detect.
    pub worker_threads: Option<usize>,

    /// capacity = threads × this
    pub channel_multiplier: usize,

    /// The stack size for Rayon threads, in bytes.
    pub rayon_thread_stack_size: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            channel_multiplier: 4usize,
            rayon_thread_stack_size: 8 * 1024 * 1024, // 8 MiB
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub patterns: PatternsConfig,
    pub analysis: AnalysisConfig,
    pub model: ModelConfig,
    pub output: OutputConfig,
    pub performance: PerformanceConfig,
}

impl Config {
    pub fn load(config_dir: &Path) -> GrepIntelResult<Self> {
        let mut config = Config::default();

        let default_config_path = config_dir.join("grepintel.conf");
        if !default_config_path.exists() {
            create_example_config(config_dir)?;
        }

        let user_config_path = config_dir.join("grepintel.local");
        if user_config_path.exists() {
            let user_config_content = fs::read_to_string(&user_config_path)?;
            let user_config: Config = toml::from_str(&user_config_content)?;

            config = merge_configs(config, user_config);

            eprintln!(
                "{}: Loaded user config from: {}\n",
                style("note").green().bold(),
                style(user_config_path.display())
                    .underlined()
                    .white()
                    .bold()
            );
        } else {
            tracing::debug!(
                "using default configuration; create {} to customize",
                user_config_path.display()
            );
        }

        Ok(config)
    }

    /// Language owning `ext` (lowercase, no dot), per the extension table.
    pub fn language_for_extension(&self, ext: &str) -> Option<&str> {
        self.scanner
            .extensions
            .iter()
            .find(|(_, exts)| exts.iter().any(|e| e == ext))
            .map(|(lang, _)| lang.as_str())
    }
}

fn create_example_config(config_dir: &Path) -> GrepIntelResult<()> {
    let example_path = config_dir.join("grepintel.conf");
    if !example_path.exists() {
        fs::write(&example_path, DEFAULT_CONFIG_TOML)?;
        tracing::debug!("Example config created at: {}", example_path.display());
    }
    Ok(())
}

/// Merge user config into default config, preserving defaults where the user didn't
/// supply new exclusions and overriding everything else.
fn merge_configs(mut default: Config, user: Config) -> Config {
    // --- ScannerConfig ---
    default.scanner.extensions.extend(user.scanner.extensions);
    default.scanner.max_file_size_mb = user.scanner.max_file_size_mb;
    default.scanner.read_vcsignore = user.scanner.read_vcsignore;
    default.scanner.follow_symlinks = user.scanner.follow_symlinks;
    default.scanner.scan_hidden_files = user.scanner.scan_hidden_files;

    // Merge exclusion lists (default ⊔ user), then sort & dedupe
    default
        .scanner
        .excluded_extensions
        .extend(user.scanner.excluded_extensions);
    default
        .scanner
        .excluded_directories
        .extend(user.scanner.excluded_directories);
    default.scanner.excluded_extensions.sort_unstable();
    default.scanner.excluded_extensions.dedup();
    default.scanner.excluded_directories.sort_unstable();
    default.scanner.excluded_directories.dedup();

    // --- PatternsConfig ---
    default.patterns.dir = user.patterns.dir;
    default.patterns.frameworks.extend(user.patterns.frameworks);

    // --- AnalysisConfig ---
    default.analysis = user.analysis;

    // --- ModelConfig ---
    default.model = user.model;

    // --- OutputConfig ---
    default.output.default_format = user.output.default_format;
    default.output.quiet = user.output.quiet;
    default.output.max_results = user.output.max_results;
    default.output.min_severity = user.output.min_severity;

    // --- PerformanceConfig ---
    default.performance.worker_threads = user.performance.worker_threads;
    default.performance.channel_multiplier = user.performance.channel_multiplier;
    default.performance.rayon_thread_stack_size = user.performance.rayon_thread_stack_size;

    default
}

#[test]
fn merge_configs_dedupes_and_keeps_order() {
    let mut default_cfg = Config::default();
    default_cfg.scanner.excluded_extensions = vec!["rs".into(), "toml".into()];

    let mut user_cfg = Config::default();
    user_cfg.scanner.excluded_extensions = vec!["jpg".into(), "rs".into()];

    let merged = merge_configs(default_cfg, user_cfg);

    assert_eq!(
        merged.scanner.excluded_extensions,
        vec!["jpg", "rs", "toml"]
    );
}

#[test]
fn extension_table_resolves_languages() {
    let cfg = Config::default();
    assert_eq!(cfg.language_for_extension("php"), Some("php"));
    assert_eq!(cfg.language_for_extension("tsx"), Some("javascript"));
    assert_eq!(cfg.language_for_extension("go"), Some("golang"));
    assert_eq!(cfg.language_for_extension("css"), None);
}

#[test]
fn embedded_default_config_parses() {
    let cfg: Config = toml::from_str(DEFAULT_CONFIG_TOML).expect("default config is valid TOML");
    assert_eq!(cfg.analysis.context_lines, 5);
    assert_eq!(cfg.analysis.batch_size, 3);
    assert_eq!(cfg.patterns.frameworks.get("laravel").map(String::as_str), Some("php"));
}

#[test]
fn load_creates_example_and_reads_user_overrides() {
    let cfg_dir = tempfile::tempdir().unwrap();
    let cfg_path = cfg_dir.path();

    let user_toml = r#"
        [scanner]
        follow_symlinks = true
        excluded_extensions = ["foo"]

        [analysis]
        context_lines = 2
        batch_size = 4

        [output]
        quiet = true
        min_severity = "high"
    "#;
    fs::write(cfg_path.join("grepintel.local"), user_toml).unwrap();

    let cfg = Config::load(cfg_path).expect("Config::load should succeed");

    assert!(cfg_path.join("grepintel.conf").is_file());

    assert!(cfg.scanner.follow_symlinks);
    assert!(cfg.output.quiet);
    assert_eq!(cfg.output.min_severity, Severity::High);
    assert!(cfg.scanner.excluded_extensions.contains(&"foo".to_string()));
    assert_eq!(cfg.analysis.context_lines, 2);
    assert_eq!(cfg.analysis.batch_size, 4);
    // tables not mentioned by the user keep their defaults
    assert_eq!(cfg.language_for_extension("rb"), Some("ruby"));
    assert!(!cfg.analysis.high_severity_types.is_empty());

    assert!(!cfg.scanner.scan_hidden_files);
}
