use crate::analyzer::BatchAnalyzer;
use crate::errors::GrepIntelResult;
use crate::extract::ContextExtractor;
use crate::findings::{FileReport, ScanSession};
use crate::model::Model;
use crate::scanner::{LanguageFilter, Scanner};
use crate::utils::Config;
use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Everything one run produced, ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub generated_at: String,
    pub target: PathBuf,
    pub files: Vec<FileReport>,
    pub session: ScanSession,
}

pub struct Pipeline<M> {
    scanner: Scanner,
    extractor: ContextExtractor,
    analyzer: BatchAnalyzer<M>,
}

impl<M: Model> Pipeline<M> {
    pub fn new(scanner: Scanner, extractor: ContextExtractor, analyzer: BatchAnalyzer<M>) -> Self {
        Self {
            scanner,
            extractor,
            analyzer,
        }
    }

    /// Scan, extract and analyze `target`.
    ///
    /// Files are analyzed in parallel; counters are folded from the finished
    /// reports afterwards.
    pub fn run(
        &self,
        target: &Path,
        filter: &LanguageFilter,
        framework: Option<&str>,
        cfg: &Config,
    ) -> GrepIntelResult<ScanReport> {
        let scan = self.scanner.scan(target, filter, framework, cfg)?;
        tracing::info!(
            files = scan.files.len(),
            candidates = scan.vulnerabilities_found,
            "scan finished, analyzing"
        );

        let files: Vec<FileReport> = scan
            .files
            .par_iter()
            .map(|fm| self.analyzer.analyze_file(&self.extractor.extract(fm)))
            .collect();

        let session = ScanSession {
            files_scanned: scan.files_scanned,
            vulnerabilities_found: scan.vulnerabilities_found,
            ..ScanSession::from_reports(&files)
        };

        Ok(ScanReport {
            generated_at: Utc::now().to_rfc3339(),
            target: target.to_path_buf(),
            files,
            session,
        })
    }
}

#[cfg(test)]
use crate::model::testing::Scripted;
#[cfg(test)]
use crate::patterns::PatternStore;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
fn pipeline(store: PatternStore, model: Scripted, radius: usize) -> Pipeline<Scripted> {
    use crate::analyzer::{prompt::PromptBuilder, severity::SeverityPolicy};
    Pipeline::new(
        Scanner::new(Arc::new(store)),
        ContextExtractor::new(radius),
        BatchAnalyzer::new(model, PromptBuilder::default(), SeverityPolicy::default(), 3),
    )
}

#[test]
fn php_injection_end_to_end() {
    use crate::analyzer::severity::Severity;

    let dir = tempfile::tempdir().unwrap();
    let src = "<?php\n$db = connect();\n// fetch\n$r = mysql_query(\"SELECT * FROM t WHERE id=\" . $_GET['id']);\nprint_r($r);\n\n?>\n";
    std::fs::write(dir.path().join("db.php"), src).unwrap();
    std::fs::write(dir.path().join("ok.php"), "<?php echo 'hi';\n").unwrap();

    let mut store = PatternStore::new();
    store.load_language_str(
        "[SQL_INJECTION]\ndescription: SQL\npatterns:\n- mysql_query\\s*\\(\\s*.*\\$.*\\)\n",
        "php",
    );
    let answer = "## Vulnerability Assessment\nVulnerable\n## Explanation\n...\n## Impact\ncritical data breach\n## Recommendation\nUse prepared statements.";
    let p = pipeline(store, Scripted::ok(&[answer]), 2);

    let report = p
        .run(dir.path(), &LanguageFilter::All, None, &Config::default())
        .unwrap();

    assert_eq!(report.files.len(), 1);
    let v = &report.files[0].vulnerabilities;
    assert_eq!(v.len(), 1);
    assert_eq!(v[0].line_number, 4);
    assert_eq!((v[0].code_context.start_line, v[0].code_context.end_line), (2, 6));
    assert!(v[0].code_context.code.contains("$r = mysql_query(\"SELECT * FROM t WHERE id=\" . $_GET['id']);"));
    assert!(v[0].is_vulnerable);
    assert_eq!(v[0].severity, Severity::High);

    let s = report.session;
    assert_eq!(s.files_scanned, 2);
    assert_eq!(s.files_analyzed, 1);
    assert_eq!(s.vulnerabilities_found, 1);
    assert_eq!(s.true_findings, 1);
    assert_eq!(s.high_severity, 1);
}

#[test]
fn model_outage_still_yields_one_record_per_candidate() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("a.php"),
        "echo $_GET['a'];\necho $_GET['b'];\necho $_GET['c'];\necho $_GET['d'];\n",
    )
    .unwrap();

    let mut store = PatternStore::new();
    store.load_language_str("[XSS]\n- echo\\s+\\$_GET\n", "php");
    let p = pipeline(store, Scripted::new(Vec::new()), 1);

    let report = p
        .run(dir.path(), &LanguageFilter::All, None, &Config::default())
        .unwrap();
    let v = &report.files[0].vulnerabilities;
    assert_eq!(v.len(), 4);
    assert!(v.iter().all(|a| a.explanation.starts_with("Error during analysis:")));
    assert_eq!(report.session.medium_severity, 4);
    assert_eq!(report.session.vulnerabilities_analyzed, 4);
}
