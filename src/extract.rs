//! Bounded code windows around matched lines.

use crate::findings::{CodeContext, Extraction, FileExtractions, FileMatches, Match};
use std::fs;

#[derive(Debug, Clone, Copy)]
pub struct ContextExtractor {
    radius: usize,
}

impl ContextExtractor {
    pub fn new(radius: usize) -> Self {
        Self { radius }
    }

    /// Extractions for every match of `file`, in match order. The file is
    /// read once.
    pub fn extract(&self, file: &FileMatches) -> FileExtractions {
        let content = match fs::read_to_string(&file.file_path) {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::warn!(
                    "cannot re-read {} for context: {e}; using matched lines only",
                    file.file_path.display()
                );
                None
            }
        };
        let lines: Vec<&str> = content
            .as_deref()
            .map(|c| c.split_inclusive('\n').collect())
            .unwrap_or_default();

        let extractions = file
            .matches
            .iter()
            .map(|m| {
                // the file may have shrunk since the scan
                let context = if content.is_some() && m.line_number <= lines.len() {
                    extract_context(&lines, m.line_number, self.radius)
                } else {
                    bare_context(m)
                };
                Extraction {
                    vulnerability_type: m.vulnerability_type.clone(),
                    description: m.description.clone(),
                    line_number: m.line_number,
                    pattern: m.pattern.clone(),
                    context,
                }
            })
            .collect();

        FileExtractions {
            file_path: file.file_path.clone(),
            language: file.language.clone(),
            framework: file.framework.clone(),
            extractions,
        }
    }
}

/// Inclusive 1-based `[start, end]` around `line`, clamped to `1..=total`.
pub fn window(total: usize, line: usize, radius: usize) -> (usize, usize) {
    let start = line.saturating_sub(radius).max(1);
    let end = line.saturating_add(radius).min(total);
    (start, end)
}

/// Context for `line` out of `lines`, each still carrying its terminator.
/// A line past the end of the file (changed since the scan) gets no code.
pub fn extract_context(lines: &[&str], line: usize, radius: usize) -> CodeContext {
    let (start_line, end_line) = window(lines.len(), line, radius);
    let code = if start_line <= end_line {
        lines[start_line - 1..end_line].concat()
    } else {
        String::new()
    };
    CodeContext {
        start_line,
        end_line,
        code,
    }
}

fn bare_context(m: &Match) -> CodeContext {
    CodeContext {
        start_line: m.line_number,
        end_line: m.line_number,
        code: m.line_content.clone(),
    }
}

#[test]
fn five_line_file_radius_two_clamps_both_ends() {
    assert_eq!(window(5, 1, 2), (1, 3));
    assert_eq!(window(5, 3, 2), (1, 5));
    assert_eq!(window(5, 5, 2), (3, 5));
}

#[test]
fn context_slices_lines_verbatim() {
    let lines = ["a\n", "b\r\n", "c\n", "d\n", "e"];
    let ctx = extract_context(&lines, 2, 1);
    assert_eq!((ctx.start_line, ctx.end_line), (1, 3));
    assert_eq!(ctx.code, "a\nb\r\nc\n");

    let ctx = extract_context(&lines, 5, 0);
    assert_eq!(ctx.code, "e");
}

#[test]
fn radius_zero_and_short_files() {
    assert_eq!(window(1, 1, 5), (1, 1));
    assert_eq!(window(10, 4, 0), (4, 4));
    let ctx = extract_context(&[], 1, 2);
    assert_eq!(ctx.code, "");
}

#[test]
fn php_match_gets_its_surrounding_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.php");
    let src = "<?php\n$db = connect();\n// fetch\n$r = mysql_query(\"SELECT * FROM t WHERE id=\" . $_GET['id']);\nprint_r($r);\n\n?>\n";
    fs::write(&path, src).unwrap();

    let fm = FileMatches {
        file_path: path,
        language: "php".into(),
        framework: None,
        matches: vec![Match {
            vulnerability_type: "SQL_INJECTION".into(),
            description: String::new(),
            line_number: 4,
            line_content: String::new(),
            pattern: "mysql_query\\s*\\(\\s*.*\\$.*\\)".into(),
        }],
    };
    let out = ContextExtractor::new(2).extract(&fm);
    let ctx = &out.extractions[0].context;
    assert_eq!((ctx.start_line, ctx.end_line), (2, 6));
    assert!(ctx
        .code
        .contains("$r = mysql_query(\"SELECT * FROM t WHERE id=\" . $_GET['id']);"));
    assert!(ctx.code.starts_with("$db = connect();\n"));
}

#[test]
fn unreadable_file_falls_back_to_the_matched_line() {
    let fm = FileMatches {
        file_path: "/no/such/file.php".into(),
        language: "php".into(),
        framework: None,
        matches: vec![Match {
            vulnerability_type: "XSS".into(),
            description: String::new(),
            line_number: 9,
            line_content: "echo $_GET['q'];".into(),
            pattern: "echo".into(),
        }],
    };
    let out = ContextExtractor::new(3).extract(&fm);
    assert_eq!(out.extractions.len(), 1);
    assert_eq!(
        out.extractions[0].context,
        CodeContext { start_line: 9, end_line: 9, code: "echo $_GET['q'];".into() }
    );
}

#[test]
fn match_past_a_shrunk_file_keeps_the_matched_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.php");
    fs::write(&path, "<?php\n$a = 1;\n").unwrap();

    let fm = FileMatches {
        file_path: path,
        language: "php".into(),
        framework: None,
        matches: vec![Match {
            vulnerability_type: "XSS".into(),
            description: String::new(),
            line_number: 10,
            line_content: "echo $_GET['q'];".into(),
            pattern: "echo".into(),
        }],
    };
    let ctx = &ContextExtractor::new(5).extract(&fm).extractions[0].context;
    assert_eq!(ctx, &CodeContext { start_line: 10, end_line: 10, code: "echo $_GET['q'];".into() });
}
