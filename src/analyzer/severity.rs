use crate::utils::config::AnalysisConfig;
use console::style;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    /// Not a vulnerability.
    None,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = style(self.as_str().to_uppercase());
        let s = match *self {
            Severity::High => label.red().bold(),
            Severity::Medium => label.yellow().bold(),
            Severity::Low => label.cyan().bold(),
            Severity::None => label.dim(),
        };
        write!(f, "{s}")
    }
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::None => "none",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "none" => Ok(Severity::None),
            other => Err(format!("unknown severity ‘{other}’")),
        }
    }
}

/// Severity rules for confirmed findings: impact keywords first, then the
/// per-type table.
#[derive(Debug, Clone)]
pub struct SeverityPolicy {
    high_types: Vec<String>,
    medium_types: Vec<String>,
    high_keywords: Vec<String>,
    low_keywords: Vec<String>,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl SeverityPolicy {
    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self {
            high_types: cfg.high_severity_types.clone(),
            medium_types: cfg.medium_severity_types.clone(),
            high_keywords: lowercased(&cfg.high_keywords),
            low_keywords: lowercased(&cfg.low_keywords),
        }
    }

    /// Severity of a confirmed finding of `vulnerability_type` whose model
    /// impact text is `impact`.
    ///
    /// A high keyword wins over everything, a low keyword over the table;
    /// types missing from the table are low.
    pub fn classify(&self, vulnerability_type: &str, impact: &str) -> Severity {
        let impact = impact.to_lowercase();

        if self.high_keywords.iter().any(|k| impact.contains(k.as_str())) {
            return Severity::High;
        }
        if self.low_keywords.iter().any(|k| impact.contains(k.as_str())) {
            return Severity::Low;
        }

        if self.high_types.iter().any(|t| t == vulnerability_type) {
            Severity::High
        } else if self.medium_types.iter().any(|t| t == vulnerability_type) {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

fn lowercased(v: &[String]) -> Vec<String> {
    v.iter().map(|k| k.to_lowercase()).collect()
}

#[test]
fn severity_str_roundtrip() {
    for &s in &[Severity::High, Severity::Medium, Severity::Low, Severity::None] {
        assert_eq!(s.as_str().parse::<Severity>().unwrap(), s);
        assert_eq!(s.as_str().to_uppercase().parse::<Severity>().unwrap(), s);
    }
    assert!("urgent".parse::<Severity>().is_err());
}

#[test]
fn severity_display_contains_uppercase_name() {
    assert!(Severity::High.to_string().contains("HIGH"));
    assert!(Severity::Medium.to_string().contains("MEDIUM"));
    assert!(Severity::Low.to_string().contains("LOW"));
    assert!(Severity::None.to_string().contains("NONE"));
}

#[test]
fn high_keyword_beats_low_keyword() {
    let p = SeverityPolicy::default();
    assert_eq!(p.classify("XSS", "A minor but Critical issue"), Severity::High);
    assert_eq!(p.classify("SQL_INJECTION", "critical data breach"), Severity::High);
}

#[test]
fn low_keyword_beats_type_table() {
    let p = SeverityPolicy::default();
    assert_eq!(p.classify("SQL_INJECTION", "Only minimal information leaks"), Severity::Low);
}

#[test]
fn type_table_applies_without_keywords() {
    let p = SeverityPolicy::default();
    assert_eq!(p.classify("COMMAND_INJECTION", "attacker runs commands"), Severity::High);
    assert_eq!(p.classify("PATH_TRAVERSAL", "reads other files"), Severity::Medium);
    assert_eq!(p.classify("MASS_ASSIGNMENT", ""), Severity::Medium);
    assert_eq!(p.classify("WEIRD_THING", ""), Severity::Low);
}

#[test]
fn keyword_match_is_a_plain_substring() {
    // "highlight" contains "high": preserved as-is
    let p = SeverityPolicy::default();
    assert_eq!(p.classify("XSS", "could highlight text"), Severity::High);
}
