//! Turning free-text model answers into fields.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker that opens each item's section in a batched answer.
pub const BATCH_MARKER: &str = "ANALYSIS FOR VULNERABILITY";

static ASSESSMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"## Vulnerability Assessment\s*\n([^\n]+)").expect("static regex"));
static EXPLANATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"## Explanation\s*\n").expect("static regex"));
static IMPACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"## Impact[^\n]*\n").expect("static regex"));
static RECOMMENDATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"## Recommendation\s*\n").expect("static regex"));
static SECURE_ALTERNATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)## Secure Alternative.*?\n```.*?\n(.*?)```").expect("static regex")
});

/// Fields read from one item's answer. Missing sections are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub is_vulnerable: bool,
    pub explanation: String,
    pub impact: String,
    pub secure_alternative: String,
    pub recommendation: String,
}

/// Text after `heading` up to the next `\n##` or the end, trimmed.
fn section(response: &str, heading: &Regex) -> String {
    let Some(m) = heading.find(response) else {
        return String::new();
    };
    let body = &response[m.end()..];
    let end = body.find("\n##").unwrap_or(body.len());
    body[..end].trim().to_owned()
}

/// Parse a single-item answer.
///
/// The verdict is positive iff the line under the assessment heading
/// contains `vulnerable` (case-insensitive). This is a plain substring
/// test, so "Not vulnerable" also counts as positive.
pub fn parse_response(response: &str) -> ParsedResponse {
    let mut out = ParsedResponse::default();

    if let Some(c) = ASSESSMENT.captures(response) {
        out.is_vulnerable = c[1].trim().to_lowercase().contains("vulnerable");
    }

    out.explanation = section(response, &EXPLANATION);

    if out.is_vulnerable {
        out.impact = section(response, &IMPACT);
        if let Some(c) = SECURE_ALTERNATIVE.captures(response) {
            out.secure_alternative = c[1].trim().to_owned();
        }
    }

    out.recommendation = section(response, &RECOMMENDATION);
    out
}

/// Cut a batched answer into per-item slices, ordinal 1..=`count`.
///
/// Each slice runs from its marker to the next marker of any number (or
/// the end). Returns the first ordinal without a marker on failure.
pub fn split_batch(response: &str, count: usize) -> Result<Vec<&str>, usize> {
    (1..=count)
        .map(|n| {
            let needle = format!("{BATCH_MARKER} {n}:");
            let start = response.find(&needle).ok_or(n)? + needle.len();
            let rest = &response[start..];
            let end = rest.find(BATCH_MARKER).unwrap_or(rest.len());
            Ok(rest[..end].trim())
        })
        .collect()
}

#[cfg(test)]
pub(crate) const VULNERABLE_ANSWER: &str = "
## Vulnerability Assessment
Vulnerable

## Explanation
User input is concatenated into the SQL string.

## Impact (if vulnerable)
An attacker can read the whole users table.

## Secure Alternative (if vulnerable)
```php
$stmt = $db->prepare('SELECT * FROM t WHERE id = ?');
$stmt->execute([$_GET['id']]);
```

## Recommendation
Use prepared statements.
";

#[test]
fn parses_every_section_of_a_vulnerable_answer() {
    let p = parse_response(VULNERABLE_ANSWER);
    assert!(p.is_vulnerable);
    assert_eq!(p.explanation, "User input is concatenated into the SQL string.");
    assert_eq!(p.impact, "An attacker can read the whole users table.");
    assert_eq!(
        p.secure_alternative,
        "$stmt = $db->prepare('SELECT * FROM t WHERE id = ?');\n$stmt->execute([$_GET['id']]);"
    );
    assert_eq!(p.recommendation, "Use prepared statements.");
}

#[test]
fn false_positive_skips_impact_and_alternative() {
    let answer = "## Vulnerability Assessment\nFalse Positive\n\n## Explanation\nConstant query.\n\n## Impact\nNone really\n\n## Recommendation\nNothing to do.";
    let p = parse_response(answer);
    assert!(!p.is_vulnerable);
    assert_eq!(p.explanation, "Constant query.");
    assert_eq!(p.impact, "");
    assert_eq!(p.secure_alternative, "");
    assert_eq!(p.recommendation, "Nothing to do.");
}

#[test]
fn missing_sections_are_empty_strings() {
    let p = parse_response("I cannot help with that.");
    assert_eq!(p, ParsedResponse::default());
}

#[test]
fn not_vulnerable_still_counts_as_vulnerable() {
    // known edge: the verdict is a substring test on "vulnerable"
    let p = parse_response("## Vulnerability Assessment\nNot vulnerable\n");
    assert!(p.is_vulnerable);
}

#[test]
fn split_batch_slices_between_markers() {
    let text = "preamble\nANALYSIS FOR VULNERABILITY 1:\nfirst\nANALYSIS FOR VULNERABILITY 2:\nsecond\n";
    assert_eq!(split_batch(text, 2).unwrap(), ["first", "second"]);
}

#[test]
fn split_batch_does_not_confuse_1_with_11() {
    let text = "ANALYSIS FOR VULNERABILITY 11:\neleven\nANALYSIS FOR VULNERABILITY 1:\none";
    assert_eq!(split_batch(text, 1).unwrap(), ["one"]);
}

#[test]
fn split_batch_reports_first_missing_ordinal() {
    let text = "ANALYSIS FOR VULNERABILITY 1:\nfirst\nANALYSIS FOR VULNERABILITY 3:\nthird";
    assert_eq!(split_batch(text, 3), Err(2));
}
