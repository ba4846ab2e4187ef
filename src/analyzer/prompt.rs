use crate::errors::GrepIntelResult;
use crate::findings::Extraction;
use crate::analyzer::parse::BATCH_MARKER;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt::Write;
use std::fs;
use std::path::Path;

/// Single-finding prompt. Placeholders: `{language}`, `{file_path}`,
/// `{vulnerability_type}`, `{pattern}`, `{code_snippet}`.
pub const DEFAULT_TEMPLATE: &str = "\
You are a security expert reviewing a potential vulnerability that was found by pattern matching.

File: {file_path}
Language: {language}
Vulnerability type: {vulnerability_type}
Pattern matched: {pattern}

Code snippet:
```{language}
{code_snippet}
```

Decide whether this is a real vulnerability or a false positive and answer in exactly this format:

## Vulnerability Assessment
[Vulnerable/False Positive]

## Explanation
[Detailed explanation]

## Impact (if vulnerable)
[Description of impact]

## Secure Alternative (if vulnerable)
```[language]
[Secure code]
```

## Recommendation
[Specific recommendation]
";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("static regex"));

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self { template: DEFAULT_TEMPLATE.to_owned() }
    }
}

impl PromptBuilder {
    pub fn with_template(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    pub fn from_file(path: &Path) -> GrepIntelResult<Self> {
        Ok(Self::with_template(fs::read_to_string(path)?))
    }

    /// Prompt for one extraction. Substitution is a single pass, so code
    /// that happens to contain `{pattern}` is left alone.
    pub fn single(&self, extraction: &Extraction, file_path: &str, language: &str) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |c: &Captures| match &c[1] {
                "language" => language.to_owned(),
                "file_path" => file_path.to_owned(),
                "vulnerability_type" => extraction.vulnerability_type.clone(),
                "pattern" => extraction.pattern.clone(),
                "code_snippet" => extraction.context.code.clone(),
                _ => c[0].to_owned(),
            })
            .into_owned()
    }

    /// One prompt covering every item of `batch`, numbered from 1.
    pub fn batch(&self, batch: &[Extraction], file_path: &str, language: &str) -> String {
        let mut p = String::from(
            "You are a security expert analyzing potential vulnerabilities in source code.\n\n",
        );
        let _ = write!(p, "File: {file_path}\nLanguage: {language}\n\n");
        p.push_str("Please analyze the following potential vulnerabilities:\n\n");

        for (i, ex) in batch.iter().enumerate() {
            let _ = writeln!(p, "VULNERABILITY {}:", i + 1);
            let _ = writeln!(p, "Type: {}", ex.vulnerability_type);
            let _ = writeln!(p, "Pattern matched: {}", ex.pattern);
            let _ = write!(
                p,
                "Code snippet:\n```{language}\n{}\n```\n\n",
                ex.context.code
            );
        }

        p.push_str("For each vulnerability, provide your analysis in the following format:\n\n");
        let _ = writeln!(p, "{BATCH_MARKER} X:");
        p.push_str("## Vulnerability Assessment\n[Vulnerable/False Positive]\n\n");
        p.push_str("## Explanation\n[Detailed explanation]\n\n");
        p.push_str("## Impact (if vulnerable)\n[Description of impact]\n\n");
        p.push_str("## Secure Alternative (if vulnerable)\n```[language]\n[Secure code]\n```\n\n");
        p.push_str("## Recommendation\n[Specific recommendation]\n\n");
        p.push_str("Replace X with the vulnerability number (1, 2, 3, etc.).");
        p
    }
}

#[cfg(test)]
pub(crate) fn extraction(vtype: &str, line: usize, code: &str) -> Extraction {
    use crate::findings::CodeContext;
    Extraction {
        vulnerability_type: vtype.into(),
        description: String::new(),
        line_number: line,
        pattern: "mysql_query\\s*\\(".into(),
        context: CodeContext { start_line: line, end_line: line, code: code.into() },
    }
}

#[test]
fn single_prompt_fills_every_placeholder() {
    let ex = extraction("SQL_INJECTION", 4, "mysql_query($q . $_GET['id']);\n");
    let p = PromptBuilder::default().single(&ex, "app/db.php", "php");
    assert!(p.contains("File: app/db.php"));
    assert!(p.contains("Vulnerability type: SQL_INJECTION"));
    assert!(p.contains("Pattern matched: mysql_query\\s*\\("));
    assert!(p.contains("```php\nmysql_query($q . $_GET['id']);\n"));
    assert!(!p.contains("{code_snippet}"));
}

#[test]
fn substitution_does_not_recurse_into_code() {
    let ex = extraction("XSS", 1, "echo \"{pattern}\";");
    let p = PromptBuilder::with_template("{code_snippet}|{unknown}").single(&ex, "a.php", "php");
    assert_eq!(p, "echo \"{pattern}\";|{unknown}");
}

#[test]
fn batch_prompt_numbers_items_and_asks_for_markers() {
    let items = [
        extraction("SQL_INJECTION", 3, "a();"),
        extraction("XSS", 9, "b();"),
    ];
    let p = PromptBuilder::default().batch(&items, "x.php", "php");
    assert!(p.contains("VULNERABILITY 1:\nType: SQL_INJECTION"));
    assert!(p.contains("VULNERABILITY 2:\nType: XSS"));
    assert!(p.contains("```php\nb();\n```"));
    assert!(p.contains("ANALYSIS FOR VULNERABILITY X:"));
    assert!(!p.contains("VULNERABILITY 3:"));
}
