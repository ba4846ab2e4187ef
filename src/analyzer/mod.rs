//! Model-backed triage of extracted candidates.
//!
//! [`BatchAnalyzer`] maps a file's extractions onto an index-aligned list
//! of [`VulnerabilityAnalysis`] records. Batches that fail, or whose answer
//! cannot be cut into one slice per item, are redone item by item; an item
//! whose own call fails gets a conservative default record. Nothing is
//! ever dropped.

pub mod parse;
pub mod prompt;
pub mod severity;

use crate::errors::GrepIntelResult;
use crate::findings::{Extraction, FileExtractions, FileReport, VulnerabilityAnalysis};
use crate::model::{Model, ModelError};
use crate::utils::config::AnalysisConfig;
use parse::{ParsedResponse, parse_response, split_batch};
use prompt::PromptBuilder;
use severity::{Severity, SeverityPolicy};
use thiserror::Error;

/// Why a batch was abandoned.
#[derive(Debug, Error)]
enum BatchError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("no section for item {0} in the batched answer")]
    MissingSection(usize),
}

pub struct BatchAnalyzer<M> {
    model: M,
    prompts: PromptBuilder,
    policy: SeverityPolicy,
    batch_size: usize,
}

impl<M: Model> BatchAnalyzer<M> {
    pub fn new(model: M, prompts: PromptBuilder, policy: SeverityPolicy, batch_size: usize) -> Self {
        Self {
            model,
            prompts,
            policy,
            batch_size: batch_size.max(1),
        }
    }

    /// Analyzer wired from the `[analysis]` config section. Fails only if a
    /// configured prompt template cannot be read.
    pub fn from_config(model: M, cfg: &AnalysisConfig) -> GrepIntelResult<Self> {
        let prompts = match &cfg.prompt_template {
            Some(path) => PromptBuilder::from_file(path)?,
            None => PromptBuilder::default(),
        };
        Ok(Self::new(
            model,
            prompts,
            SeverityPolicy::from_config(cfg),
            cfg.batch_size,
        ))
    }

    #[cfg(test)]
    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn analyze_file(&self, file: &FileExtractions) -> FileReport {
        let path = file.file_path.to_string_lossy();
        FileReport {
            file_path: file.file_path.clone(),
            language: file.language.clone(),
            framework: file.framework.clone(),
            vulnerabilities: self.analyze_all(&file.extractions, &path, &file.language),
        }
    }

    /// One analysis per extraction, in input order.
    pub fn analyze_all(
        &self,
        extractions: &[Extraction],
        file_path: &str,
        language: &str,
    ) -> Vec<VulnerabilityAnalysis> {
        match extractions {
            [] => Vec::new(),
            [only] => vec![self.analyze_one(only, file_path, language)],
            _ => {
                let mut out = Vec::with_capacity(extractions.len());
                for batch in extractions.chunks(self.batch_size) {
                    match self.analyze_batch(batch, file_path, language) {
                        Ok(results) => out.extend(results),
                        Err(e) => {
                            tracing::warn!(
                                file = file_path,
                                items = batch.len(),
                                "batch analysis failed ({e}); analyzing individually"
                            );
                            out.extend(
                                batch
                                    .iter()
                                    .map(|ex| self.analyze_one(ex, file_path, language)),
                            );
                        }
                    }
                }
                out
            }
        }
    }

    /// One model call for the whole batch. Any error discards every result
    /// of the batch.
    fn analyze_batch(
        &self,
        batch: &[Extraction],
        file_path: &str,
        language: &str,
    ) -> Result<Vec<VulnerabilityAnalysis>, BatchError> {
        let prompt = self.prompts.batch(batch, file_path, language);
        tracing::debug!(file = file_path, items = batch.len(), "sending batch");
        let response = self.model.analyze(&prompt)?;

        let slices = split_batch(&response, batch.len()).map_err(BatchError::MissingSection)?;
        Ok(slices
            .into_iter()
            .zip(batch)
            .map(|(text, ex)| self.finish(parse_response(text), ex))
            .collect())
    }

    /// Analyze a single extraction. Never fails.
    pub fn analyze_one(
        &self,
        extraction: &Extraction,
        file_path: &str,
        language: &str,
    ) -> VulnerabilityAnalysis {
        let prompt = self.prompts.single(extraction, file_path, language);
        match self.model.analyze(&prompt) {
            Ok(response) => self.finish(parse_response(&response), extraction),
            Err(e) => {
                tracing::error!(
                    file = file_path,
                    line = extraction.line_number,
                    "model call failed: {e}"
                );
                default_error_record(extraction, &e)
            }
        }
    }

    fn finish(&self, parsed: ParsedResponse, extraction: &Extraction) -> VulnerabilityAnalysis {
        let severity = if parsed.is_vulnerable {
            self.policy
                .classify(&extraction.vulnerability_type, &parsed.impact)
        } else {
            Severity::None
        };
        VulnerabilityAnalysis {
            is_vulnerable: parsed.is_vulnerable,
            severity,
            explanation: parsed.explanation,
            impact: parsed.impact,
            secure_alternative: parsed.secure_alternative,
            recommendation: parsed.recommendation,
            vulnerability_type: extraction.vulnerability_type.clone(),
            line_number: extraction.line_number,
            pattern: extraction.pattern.clone(),
            code_context: extraction.context.clone(),
        }
    }
}

/// Record used when the model could not be asked at all: assume the worst
/// and ask for a manual review.
pub fn default_error_record(extraction: &Extraction, err: &ModelError) -> VulnerabilityAnalysis {
    VulnerabilityAnalysis {
        is_vulnerable: true,
        severity: Severity::Medium,
        explanation: format!("Error during analysis: {err}"),
        impact: "Unknown (analysis failed)".into(),
        secure_alternative: "Unknown (analysis failed)".into(),
        recommendation: "Please review this vulnerability manually.".into(),
        vulnerability_type: extraction.vulnerability_type.clone(),
        line_number: extraction.line_number,
        pattern: extraction.pattern.clone(),
        code_context: extraction.context.clone(),
    }
}

#[cfg(test)]
use crate::model::testing::Scripted;
#[cfg(test)]
use prompt::extraction;

#[cfg(test)]
fn analyzer(model: Scripted, batch_size: usize) -> BatchAnalyzer<Scripted> {
    BatchAnalyzer::new(model, PromptBuilder::default(), SeverityPolicy::default(), batch_size)
}

#[cfg(test)]
const FALSE_POSITIVE_ANSWER: &str = "## Vulnerability Assessment\nFalse Positive\n\n## Explanation\nThe value is cast to int first.\n\n## Recommendation\nNone needed.\n";

#[cfg(test)]
const MINOR_ANSWER: &str = "## Vulnerability Assessment\nVulnerable\n\n## Explanation\nReflected output.\n\n## Impact (if vulnerable)\nOnly a minor cosmetic issue.\n\n## Recommendation\nEscape output.\n";

#[test]
fn batch_results_match_individual_results() {
    let items = [
        extraction("SQL_INJECTION", 3, "mysql_query($a);\n"),
        extraction("SQL_INJECTION", 8, "mysql_query($b);\n"),
        extraction("XSS", 12, "echo $c;\n"),
    ];
    let answers = [parse::VULNERABLE_ANSWER, FALSE_POSITIVE_ANSWER, MINOR_ANSWER];

    let batched_reply = answers
        .iter()
        .enumerate()
        .map(|(i, a)| format!("ANALYSIS FOR VULNERABILITY {}:\n{a}\n", i + 1))
        .collect::<String>();
    let batched = analyzer(Scripted::ok(&[batched_reply.as_str()]), 3);
    let from_batch = batched.analyze_all(&items, "x.php", "php");
    assert_eq!(batched.model().calls(), 1);

    let single = analyzer(Scripted::ok(&answers), 3);
    let one_by_one: Vec<_> = items
        .iter()
        .map(|ex| single.analyze_one(ex, "x.php", "php"))
        .collect();

    assert_eq!(from_batch, one_by_one);
    assert_eq!(from_batch[0].severity, Severity::High);
    assert_eq!(from_batch[1].severity, Severity::None);
    assert_eq!(from_batch[2].severity, Severity::Low);
}

#[test]
fn failed_batch_call_falls_back_to_each_item() {
    let items = [
        extraction("XSS", 1, "a\n"),
        extraction("XSS", 2, "b\n"),
        extraction("XSS", 3, "c\n"),
    ];
    let model = Scripted::new(vec![
        Err(ModelError::Failure("timeout".into())),
        Ok(MINOR_ANSWER.into()),
        Ok(FALSE_POSITIVE_ANSWER.into()),
        Ok(MINOR_ANSWER.into()),
    ]);
    let a = analyzer(model, 3);
    let out = a.analyze_all(&items, "x.php", "php");

    assert_eq!(out.len(), 3);
    assert_eq!(a.model().calls(), 4);
    assert_eq!(
        out.iter().map(|v| v.line_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(!out[1].is_vulnerable);
}

#[test]
fn missing_marker_discards_the_whole_batch() {
    let items = [extraction("XSS", 1, "a\n"), extraction("XSS", 2, "b\n")];
    let partial = format!("ANALYSIS FOR VULNERABILITY 1:\n{MINOR_ANSWER}");
    let model = Scripted::ok(&[partial.as_str(), FALSE_POSITIVE_ANSWER, FALSE_POSITIVE_ANSWER]);
    let a = analyzer(model, 2);
    let out = a.analyze_all(&items, "x.php", "php");

    assert_eq!(a.model().calls(), 3);
    assert!(out.iter().all(|v| !v.is_vulnerable));
}

#[test]
fn single_extraction_bypasses_batching() {
    let a = analyzer(Scripted::ok(&[MINOR_ANSWER]), 3);
    let out = a.analyze_all(&[extraction("XSS", 7, "x\n")], "x.php", "php");
    assert_eq!(out.len(), 1);
    let prompts = a.model().prompts.lock().unwrap();
    assert!(!prompts[0].contains("ANALYSIS FOR VULNERABILITY"));
}

#[test]
fn trailing_chunk_is_still_a_batch() {
    let items = [
        extraction("XSS", 1, "a\n"),
        extraction("XSS", 2, "b\n"),
        extraction("XSS", 3, "c\n"),
    ];
    let pair = format!(
        "ANALYSIS FOR VULNERABILITY 1:\n{MINOR_ANSWER}\nANALYSIS FOR VULNERABILITY 2:\n{MINOR_ANSWER}"
    );
    let last = format!("ANALYSIS FOR VULNERABILITY 1:\n{FALSE_POSITIVE_ANSWER}");
    let a = analyzer(Scripted::ok(&[pair.as_str(), last.as_str()]), 2);
    let out = a.analyze_all(&items, "x.php", "php");
    assert_eq!(a.model().calls(), 2);
    assert_eq!(out.len(), 3);
    assert!(!out[2].is_vulnerable);
    assert!(a.model().prompts.lock().unwrap()[1].contains("VULNERABILITY 1:"));
}

#[test]
fn failed_single_call_yields_default_record() {
    let ex = extraction("SQL_INJECTION", 4, "mysql_query($q);\n");
    let a = analyzer(Scripted::new(vec![Err(ModelError::Failure("boom".into()))]), 3);
    let got = a.analyze_one(&ex, "x.php", "php");

    let want = VulnerabilityAnalysis {
        is_vulnerable: true,
        severity: Severity::Medium,
        explanation: "Error during analysis: boom".into(),
        impact: "Unknown (analysis failed)".into(),
        secure_alternative: "Unknown (analysis failed)".into(),
        recommendation: "Please review this vulnerability manually.".into(),
        vulnerability_type: "SQL_INJECTION".into(),
        line_number: 4,
        pattern: ex.pattern.clone(),
        code_context: ex.context.clone(),
    };
    assert_eq!(got, want);
}

#[test]
fn critical_impact_on_php_injection_is_high() {
    let answer = "## Vulnerability Assessment\nVulnerable\n## Explanation\n...\n## Impact\ncritical data breach\n## Recommendation\nUse prepared statements.";
    let a = analyzer(Scripted::ok(&[answer]), 3);
    let ex = extraction("SQL_INJECTION", 4, "$r = mysql_query(\"SELECT * FROM t WHERE id=\" . $_GET['id']);\n");
    let v = a.analyze_one(&ex, "db.php", "php");
    assert!(v.is_vulnerable);
    assert_eq!(v.severity, Severity::High);
    assert_eq!(v.recommendation, "Use prepared statements.");
}
