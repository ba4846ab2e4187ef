use crate::analyzer::BatchAnalyzer;
use crate::analyzer::severity::Severity;
use crate::commands::build_store;
use crate::errors::{GrepIntelError, GrepIntelResult};
use crate::extract::ContextExtractor;
use crate::findings::{ScanSession, VulnerabilityAnalysis};
use crate::model::{ChatLog, CommandModel, Model, Retrying};
use crate::pipeline::{Pipeline, ScanReport};
use crate::scanner::{LanguageFilter, Scanner};
use crate::utils::config::{Config, ModelConfig};
use crate::utils::default_report_path;
use console::style;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Entry point called by the CLI.
pub fn handle(
    path: &Path,
    languages: &[String],
    framework: Option<&str>,
    output: Option<&Path>,
    format: &str,
    data_dir: &Path,
    config: &Config,
) -> GrepIntelResult<()> {
    let format = if format.is_empty() {
        config.output.default_format.as_str()
    } else {
        format
    };
    if format != "console" && format != "json" {
        return Err(format!("unknown output format ‘{format}’").into());
    }

    let target = path
        .canonicalize()
        .map_err(|_| GrepIntelError::TargetNotFound(path.to_path_buf()))?;

    let store = Arc::new(build_store(config, framework));
    let model = build_model(&config.model, data_dir)?;
    let pipeline = Pipeline::new(
        Scanner::new(store),
        ContextExtractor::new(config.analysis.context_lines),
        BatchAnalyzer::from_config(model, &config.analysis)?,
    );

    let filter = LanguageFilter::from_args(languages);
    let report = pipeline.run(&target, &filter, framework, config)?;

    if format == "console" {
        print_findings(&report, config);
    }

    let json_path = match (output, format) {
        (Some(p), _) => Some(p.to_path_buf()),
        (None, "json") => Some(default_report_path(&target, data_dir)?),
        _ => None,
    };
    if let Some(p) = json_path {
        write_report(&report, &p)?;
        println!(
            "{}: report written to {}",
            style("note").green().bold(),
            style(p.display()).underlined()
        );
    }

    print_summary(&report.session);
    Ok(())
}

/// External command model, with retries and optional chat logging.
fn build_model(cfg: &ModelConfig, data_dir: &Path) -> GrepIntelResult<Box<dyn Model>> {
    let program = cfg.command.as_deref().ok_or_else(|| {
        GrepIntelError::Other(
            "no model command configured; set `command` under [model] in grepintel.local".into(),
        )
    })?;

    let model = Retrying::new(
        CommandModel::new(program, cfg.args.clone(), cfg.max_prompt_tokens),
        cfg.max_retries,
        Duration::from_secs(cfg.retry_delay_secs),
    );

    if cfg.log_chat {
        let dir: PathBuf = cfg
            .chat_log_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("chats"));
        tracing::debug!("logging model chats to {}", dir.display());
        Ok(Box::new(ChatLog::new(model, &dir)))
    } else {
        Ok(Box::new(model))
    }
}

fn write_report(report: &ScanReport, path: &Path) -> GrepIntelResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

/// Confirmed findings at or above `min`.
fn shown(v: &VulnerabilityAnalysis, min: Severity) -> bool {
    v.is_vulnerable && v.severity != Severity::None && v.severity <= min
}

fn print_findings(report: &ScanReport, config: &Config) {
    if config.output.quiet {
        return;
    }
    let limit = config.output.max_results.map_or(usize::MAX, |n| n as usize);
    let min = config.output.min_severity;

    let findings = report.files.iter().flat_map(|f| {
        f.vulnerabilities
            .iter()
            .filter(move |v| shown(v, min))
            .map(move |v| (f, v))
    });

    let mut printed = 0;
    for (file, v) in findings.take(limit) {
        println!(
            "{}:{}  [{}]  {}",
            style(file.file_path.display()).blue().underlined(),
            v.line_number,
            v.severity,
            style(&v.vulnerability_type).bold(),
        );
        if let Some(first) = v.explanation.lines().find(|l| !l.trim().is_empty()) {
            println!("    {}", style(first.trim()).dim());
        }
        printed += 1;
    }

    if printed == 0 {
        println!("  {}", style("∅ No confirmed findings").dim());
    }
    println!();
}

fn print_summary(s: &ScanSession) {
    println!("{}", style("Scan summary").blue().bold().underlined());
    let rows = [
        ("Files scanned", s.files_scanned),
        ("Files analyzed", s.files_analyzed),
        ("Candidates", s.vulnerabilities_found),
        ("Analyzed", s.vulnerabilities_analyzed),
        ("Confirmed", s.true_findings),
        ("False positives", s.false_positives),
    ];
    for (label, n) in rows {
        println!("  {:16} {}", style(label), n);
    }
    println!(
        "  {:16} {} high, {} medium, {} low",
        style("Severity"),
        style(s.high_severity).red().bold(),
        style(s.medium_severity).yellow().bold(),
        style(s.low_severity).cyan().bold(),
    );
}

#[test]
fn severity_filter_keeps_confirmed_findings_at_or_above_threshold() {
    use crate::findings::analysis;
    assert!(shown(&analysis(true, Severity::High), Severity::Medium));
    assert!(shown(&analysis(true, Severity::Medium), Severity::Medium));
    assert!(!shown(&analysis(true, Severity::Low), Severity::Medium));
    assert!(!shown(&analysis(false, Severity::None), Severity::Low));
    assert!(shown(&analysis(true, Severity::Low), Severity::Low));
}

#[test]
fn json_report_has_the_documented_shape() {
    let dir = tempfile::tempdir().unwrap();
    let report = ScanReport {
        generated_at: "2026-01-01T00:00:00+00:00".into(),
        target: "/src/app".into(),
        files: Vec::new(),
        session: ScanSession::default(),
    };
    let path = dir.path().join("out/report.json");
    write_report(&report, &path).unwrap();

    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["target"], "/src/app");
    assert!(v["files"].as_array().unwrap().is_empty());
    assert_eq!(v["session"]["files_scanned"], 0);
    assert_eq!(v["generated_at"], "2026-01-01T00:00:00+00:00");
}

#[test]
fn missing_model_command_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = build_model(&ModelConfig::default(), dir.path()).err().unwrap();
    assert!(err.to_string().contains("no model command configured"));
}
