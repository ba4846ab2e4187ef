//! Records passed between pipeline stages.

use crate::analyzer::severity::Severity;
use serde::Serialize;
use std::path::PathBuf;

/// One `(pattern, line)` hit.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Match {
    pub vulnerability_type: String,
    pub description: String,
    /// 1-based.
    pub line_number: usize,
    /// The matched line, trimmed.
    pub line_content: String,
    pub pattern: String,
}

/// Scanner output for a file with at least one match.
#[derive(Debug, Clone, Serialize)]
pub struct FileMatches {
    pub file_path: PathBuf,
    pub language: String,
    pub framework: Option<String>,
    pub matches: Vec<Match>,
}

/// Inclusive `[start_line, end_line]` window and its verbatim text.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CodeContext {
    pub start_line: usize,
    pub end_line: usize,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Extraction {
    pub vulnerability_type: String,
    pub description: String,
    pub line_number: usize,
    pub pattern: String,
    pub context: CodeContext,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileExtractions {
    pub file_path: PathBuf,
    pub language: String,
    pub framework: Option<String>,
    pub extractions: Vec<Extraction>,
}

/// The model's verdict on one extraction.
///
/// `severity` is [`Severity::None`] exactly when `is_vulnerable` is false.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VulnerabilityAnalysis {
    pub is_vulnerable: bool,
    pub severity: Severity,
    pub explanation: String,
    pub impact: String,
    pub secure_alternative: String,
    pub recommendation: String,
    pub vulnerability_type: String,
    pub line_number: usize,
    pub pattern: String,
    pub code_context: CodeContext,
}

/// Analyses for one file, index-aligned with its extractions.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file_path: PathBuf,
    pub language: String,
    pub framework: Option<String>,
    pub vulnerabilities: Vec<VulnerabilityAnalysis>,
}

/// Aggregate counters, always derived by folding over reports.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ScanSession {
    pub files_scanned: usize,
    pub files_analyzed: usize,
    pub vulnerabilities_found: usize,
    pub vulnerabilities_analyzed: usize,
    pub true_findings: usize,
    pub false_positives: usize,
    pub high_severity: usize,
    pub medium_severity: usize,
    pub low_severity: usize,
}

impl ScanSession {
    /// Counters for one analysed file.
    pub fn for_report(report: &FileReport) -> Self {
        let mut s = ScanSession {
            files_scanned: 1,
            files_analyzed: 1,
            vulnerabilities_found: report.vulnerabilities.len(),
            vulnerabilities_analyzed: report.vulnerabilities.len(),
            ..Self::default()
        };
        for v in &report.vulnerabilities {
            if !v.is_vulnerable {
                s.false_positives += 1;
                continue;
            }
            s.true_findings += 1;
            match v.severity {
                Severity::High => s.high_severity += 1,
                Severity::Medium => s.medium_severity += 1,
                Severity::Low => s.low_severity += 1,
                Severity::None => {}
            }
        }
        s
    }

    /// Sum two partial sessions.
    pub fn merge(self, other: Self) -> Self {
        ScanSession {
            files_scanned: self.files_scanned + other.files_scanned,
            files_analyzed: self.files_analyzed + other.files_analyzed,
            vulnerabilities_found: self.vulnerabilities_found + other.vulnerabilities_found,
            vulnerabilities_analyzed: self.vulnerabilities_analyzed + other.vulnerabilities_analyzed,
            true_findings: self.true_findings + other.true_findings,
            false_positives: self.false_positives + other.false_positives,
            high_severity: self.high_severity + other.high_severity,
            medium_severity: self.medium_severity + other.medium_severity,
            low_severity: self.low_severity + other.low_severity,
        }
    }

    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a FileReport>) -> Self {
        reports
            .into_iter()
            .map(Self::for_report)
            .fold(Self::default(), Self::merge)
    }
}

#[cfg(test)]
pub(crate) fn analysis(is_vulnerable: bool, severity: Severity) -> VulnerabilityAnalysis {
    VulnerabilityAnalysis {
        is_vulnerable,
        severity,
        explanation: String::new(),
        impact: String::new(),
        secure_alternative: String::new(),
        recommendation: String::new(),
        vulnerability_type: "XSS".into(),
        line_number: 1,
        pattern: "x".into(),
        code_context: CodeContext { start_line: 1, end_line: 1, code: "x\n".into() },
    }
}

#[test]
fn session_folds_counts_over_reports() {
    let a = FileReport {
        file_path: "a.php".into(),
        language: "php".into(),
        framework: None,
        vulnerabilities: vec![
            analysis(true, Severity::High),
            analysis(false, Severity::None),
            analysis(true, Severity::Low),
        ],
    };
    let b = FileReport {
        file_path: "b.php".into(),
        language: "php".into(),
        framework: None,
        vulnerabilities: vec![analysis(true, Severity::Medium)],
    };

    let s = ScanSession::from_reports([&a, &b]);
    assert_eq!(s.files_analyzed, 2);
    assert_eq!(s.vulnerabilities_analyzed, 4);
    assert_eq!(s.true_findings, 3);
    assert_eq!(s.false_positives, 1);
    assert_eq!((s.high_severity, s.medium_severity, s.low_severity), (1, 1, 1));

    assert_eq!(ScanSession::from_reports(Vec::<FileReport>::new().iter()), ScanSession::default());
}
