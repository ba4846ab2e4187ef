pub mod patterns;
pub mod scan;

use crate::analyzer::severity::Severity;
use crate::cli::Commands;
use crate::errors::GrepIntelResult;
use crate::patterns::PatternStore;
use crate::utils::config::Config;
use std::path::Path;

pub fn handle_command(
    command: Commands,
    verbose: bool,
    data_dir: &Path,
    config: &mut Config,
) -> GrepIntelResult<()> {
    match command {
        Commands::Scan {
            path,
            language,
            framework,
            output,
            format,
            high_only,
            context_lines,
            batch_size,
        } => {
            if high_only {
                config.output.min_severity = Severity::High;
            }
            if let Some(n) = context_lines {
                config.analysis.context_lines = n;
            }
            if let Some(n) = batch_size {
                config.analysis.batch_size = n;
            }

            scan::handle(
                &path,
                &language,
                framework.as_deref(),
                output.as_deref(),
                &format,
                data_dir,
                config,
            )
        }
        Commands::Patterns { framework } => {
            patterns::handle(framework.as_deref(), verbose, config)
        }
    }
}

/// Pattern store for this run: the configured pattern directory, or the
/// built-in documents, plus the requested framework overlay.
///
/// A load that fails is reported and the run continues with whatever
/// did load.
pub(crate) fn build_store(config: &Config, framework: Option<&str>) -> PatternStore {
    let dir = config.patterns.dir.as_deref();

    let mut store = match dir {
        Some(d) => {
            let mut s = PatternStore::new();
            if let Err(e) = s.load_dir(d) {
                tracing::warn!("pattern directory {}: {e}", d.display());
            }
            if s.languages().is_empty() {
                tracing::warn!("no language patterns under {}, using built-ins", d.display());
                PatternStore::builtin()
            } else {
                s
            }
        }
        None => PatternStore::builtin(),
    };

    if let Some(fw) = framework {
        match store.load_named_framework(fw, dir, &config.patterns.frameworks) {
            Ok(lang) => tracing::info!(framework = fw, language = %lang, "framework patterns loaded"),
            Err(e) => tracing::warn!("framework ‘{fw}’ not loaded: {e}"),
        }
    }
    store
}

#[test]
fn build_store_falls_back_to_builtins() {
    let mut cfg = Config::default();
    cfg.patterns.dir = Some("/definitely/not/here".into());
    let store = build_store(&cfg, Some("laravel"));
    assert!(store.has_language("php"));
    // the overlay file is missing from the configured directory
    assert!(store.frameworks().is_empty());

    let store = build_store(&Config::default(), Some("laravel"));
    assert_eq!(store.frameworks().len(), 1);
    assert!(store.patterns_for("php").unwrap().get("MASS_ASSIGNMENT").is_some());
}
