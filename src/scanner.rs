//! Line-oriented signature matching over a file or a directory tree.

use crate::errors::{GrepIntelError, GrepIntelResult};
use crate::findings::{FileMatches, Match};
use crate::patterns::PatternStore;
use crate::utils::Config;
use crate::utils::ext::language_for_path;
use crate::walk::collect_files;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Which languages a scan looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageFilter {
    /// Every language of the extension table that has loaded patterns.
    All,
    Only(Vec<String>),
}

impl LanguageFilter {
    /// `all` anywhere in the list (or an empty list) selects every language.
    pub fn from_args(langs: &[String]) -> Self {
        if langs.is_empty() || langs.iter().any(|l| l.eq_ignore_ascii_case("all")) {
            LanguageFilter::All
        } else {
            LanguageFilter::Only(langs.iter().map(|l| l.to_ascii_lowercase()).collect())
        }
    }

    /// Explicitly requested languages must have a loaded layer.
    pub fn validate(&self, store: &PatternStore) -> GrepIntelResult<()> {
        if let LanguageFilter::Only(langs) = self {
            for lang in langs {
                store.patterns_for(lang)?;
            }
        }
        Ok(())
    }

    fn allows(&self, language: &str) -> bool {
        match self {
            LanguageFilter::All => true,
            LanguageFilter::Only(langs) => langs.iter().any(|l| l == language),
        }
    }
}

/// A rule whose patterns compiled.
#[derive(Debug)]
pub struct CompiledRule {
    pub vulnerability_type: String,
    pub description: String,
    /// `(source, regex)` in rule order.
    pub patterns: Vec<(String, Regex)>,
}

type RuleCache = RwLock<HashMap<String, Arc<Vec<CompiledRule>>>>;

/// Scan stage output.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Files with at least one match, sorted by path.
    pub files: Vec<FileMatches>,
    /// Files whose language was resolved and selected.
    pub files_scanned: usize,
    pub vulnerabilities_found: usize,
}

pub struct Scanner {
    store: Arc<PatternStore>,
    cache: RuleCache,
}

impl Scanner {
    pub fn new(store: Arc<PatternStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Scan `target` (file or directory).
    ///
    /// `framework` only labels the resulting [`FileMatches`]; its patterns
    /// are already part of the store's combined view.
    pub fn scan(
        &self,
        target: &Path,
        filter: &LanguageFilter,
        framework: Option<&str>,
        cfg: &Config,
    ) -> GrepIntelResult<ScanResult> {
        if !target.exists() {
            return Err(GrepIntelError::TargetNotFound(target.to_path_buf()));
        }
        filter.validate(&self.store)?;

        let candidates = if target.is_file() {
            vec![target.to_path_buf()]
        } else {
            collect_files(target, cfg)
        };

        let selected: Vec<(PathBuf, &str)> = candidates
            .into_iter()
            .filter_map(|path| {
                let lang = language_for_path(&path, cfg)?;
                if !filter.allows(lang) || !self.store.has_language(lang) {
                    return None;
                }
                Some((path, lang))
            })
            .collect();

        tracing::info!(files = selected.len(), target = %target.display(), "scanning");

        let max_bytes = cfg.scanner.max_file_size_mb.unwrap_or(0) * 1_048_576;
        let files: Vec<FileMatches> = selected
            .par_iter()
            .filter_map(|(path, lang)| {
                let matches = self.scan_file(path, lang, max_bytes);
                if matches.is_empty() {
                    return None;
                }
                Some(FileMatches {
                    file_path: path.clone(),
                    language: (*lang).to_owned(),
                    framework: self.framework_label(framework, lang),
                    matches,
                })
            })
            .collect();

        let vulnerabilities_found = files.iter().map(|f| f.matches.len()).sum();
        Ok(ScanResult {
            files,
            files_scanned: selected.len(),
            vulnerabilities_found,
        })
    }

    /// Matches in one file. Unreadable, binary and oversized files have none.
    pub fn scan_file(&self, path: &Path, language: &str, max_bytes: u64) -> Vec<Match> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("cannot read {}: {e}", path.display());
                return Vec::new();
            }
        };

        if max_bytes != 0 && bytes.len() as u64 > max_bytes {
            tracing::debug!("skipping oversized {}", path.display());
            return Vec::new();
        }

        // >1% NULs
        if bytes.iter().filter(|b| **b == 0).count() * 100 / bytes.len().max(1) > 1 {
            tracing::debug!("skipping binary {}", path.display());
            return Vec::new();
        }

        let content = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("cannot read {}: {e}", path.display());
                return Vec::new();
            }
        };

        match self.rules_for(language) {
            Ok(rules) => match_lines(&content, &rules),
            Err(e) => {
                tracing::warn!("{}: {e}", path.display());
                Vec::new()
            }
        }
    }

    /// Compiled combined view of `language`, compiled once per run.
    fn rules_for(&self, language: &str) -> GrepIntelResult<Arc<Vec<CompiledRule>>> {
        if let Ok(cache) = self.cache.read() {
            if let Some(rules) = cache.get(language) {
                return Ok(rules.clone());
            }
        }

        let compiled = Arc::new(compile(language, self.store.patterns_for(language)?));
        match self.cache.write() {
            Ok(mut w) => Ok(w
                .entry(language.to_owned())
                .or_insert_with(|| compiled.clone())
                .clone()),
            Err(_) => Ok(compiled),
        }
    }

    fn framework_label(&self, framework: Option<&str>, language: &str) -> Option<String> {
        let name = framework?;
        self.store
            .frameworks()
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name) && f.language == language)
            .map(|f| f.name.clone())
    }
}

/// Compile every pattern of `rules`; a pattern that fails is logged and
/// left out.
fn compile(language: &str, rules: &crate::patterns::RuleSet) -> Vec<CompiledRule> {
    rules
        .iter()
        .map(|rule| CompiledRule {
            vulnerability_type: rule.vulnerability_type.clone(),
            description: rule.description.clone(),
            patterns: rule
                .patterns
                .iter()
                .filter_map(|src| match Regex::new(src) {
                    Ok(re) => Some((src.clone(), re)),
                    Err(e) => {
                        tracing::warn!(
                            language,
                            rule = %rule.vulnerability_type,
                            "invalid pattern ‘{src}’: {e}"
                        );
                        None
                    }
                })
                .collect(),
        })
        .collect()
}

/// One [`Match`] per matching `(pattern, line)`, ordered by line, then by
/// rule and pattern order.
pub fn match_lines(content: &str, rules: &[CompiledRule]) -> Vec<Match> {
    let mut out = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        for rule in rules {
            for (src, re) in &rule.patterns {
                if re.is_match(line) {
                    out.push(Match {
                        vulnerability_type: rule.vulnerability_type.clone(),
                        description: rule.description.clone(),
                        line_number: idx + 1,
                        line_content: line.trim().to_owned(),
                        pattern: src.clone(),
                    });
                }
            }
        }
    }
    out
}

#[cfg(test)]
const PHP: &str = "\
[SQL_INJECTION]
description: SQL injection
patterns:
- mysql_query\\s*\\(\\s*.*\\$.*\\)
- \\$_GET
- ([unclosed

[XSS]
description: XSS
patterns:
- echo\\s+\\$_GET
";

#[cfg(test)]
fn php_scanner() -> Scanner {
    let mut store = PatternStore::new();
    store.load_language_str(PHP, "php");
    Scanner::new(Arc::new(store))
}

#[test]
fn one_line_two_patterns_gives_two_matches() {
    let scanner = php_scanner();
    let rules = scanner.rules_for("php").unwrap();
    let src = "<?php\n$r = mysql_query(\"SELECT \" . $_GET['id']);\necho $x;\n";
    let m = match_lines(src, &rules);

    assert_eq!(m.len(), 2);
    assert!(m.iter().all(|m| m.line_number == 2));
    assert_eq!(m[0].pattern, "mysql_query\\s*\\(\\s*.*\\$.*\\)");
    assert_eq!(m[1].pattern, "\\$_GET");
    assert_eq!(m[0].line_content, "$r = mysql_query(\"SELECT \" . $_GET['id']);");
}

#[test]
fn matches_are_ordered_by_line_then_rule() {
    let scanner = php_scanner();
    let rules = scanner.rules_for("php").unwrap();
    let src = "echo $_GET['a'];\nmysql_query($q);\n";
    let m = match_lines(src, &rules);
    let got: Vec<_> = m
        .iter()
        .map(|m| (m.line_number, m.vulnerability_type.as_str()))
        .collect();
    assert_eq!(
        got,
        [(1, "SQL_INJECTION"), (1, "XSS"), (2, "SQL_INJECTION")]
    );
}

#[test]
fn invalid_regex_is_skipped_not_fatal() {
    let scanner = php_scanner();
    let rules = scanner.rules_for("php").unwrap();
    let sqli = rules
        .iter()
        .find(|r| r.vulnerability_type == "SQL_INJECTION")
        .unwrap();
    assert_eq!(sqli.patterns.len(), 2);
}

#[test]
fn scan_directory_filters_languages_and_extensions() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("a.php"), "<?php\necho $_GET['q'];\n").unwrap();
    fs::write(root.join("clean.php"), "<?php\necho 'hi';\n").unwrap();
    fs::write(root.join("notes.txt"), "echo $_GET['q'];\n").unwrap();
    fs::write(root.join("app.py"), "eval(input())\n").unwrap();

    let scanner = php_scanner();
    let res = scanner
        .scan(root, &LanguageFilter::All, None, &Config::default())
        .unwrap();

    // app.py has no loaded layer, notes.txt no language
    assert_eq!(res.files_scanned, 2);
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.files[0].file_path, root.join("a.php"));
    assert_eq!(res.vulnerabilities_found, 2);
}

#[test]
fn explicit_unloaded_language_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = php_scanner();
    let err = scanner
        .scan(
            dir.path(),
            &LanguageFilter::from_args(&["python".into()]),
            None,
            &Config::default(),
        )
        .unwrap_err();
    assert!(matches!(err, GrepIntelError::UnsupportedLanguage(ref l) if l == "python"));
}

#[test]
fn missing_target_is_reported() {
    let scanner = php_scanner();
    let err = scanner
        .scan(
            Path::new("/no/such/place"),
            &LanguageFilter::All,
            None,
            &Config::default(),
        )
        .unwrap_err();
    assert!(matches!(err, GrepIntelError::TargetNotFound(_)));
}

#[test]
fn single_file_target_and_framework_label() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("x.php");
    fs::write(&file, "mysql_query($a);\n").unwrap();

    let mut store = PatternStore::new();
    store.load_language_str(PHP, "php");
    store.load_framework_str("[MASS_ASSIGNMENT]\n- guarded\n", "laravel", "php");
    let scanner = Scanner::new(Arc::new(store));

    let res = scanner
        .scan(&file, &LanguageFilter::All, Some("laravel"), &Config::default())
        .unwrap();
    assert_eq!(res.files_scanned, 1);
    assert_eq!(res.files[0].framework.as_deref(), Some("laravel"));
}

#[test]
fn binary_and_unreadable_files_have_no_matches() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("blob.php");
    let mut bytes = b"echo $_GET['x'];\n".to_vec();
    bytes.extend(std::iter::repeat(0u8).take(64));
    fs::write(&bin, bytes).unwrap();

    let scanner = php_scanner();
    assert!(scanner.scan_file(&bin, "php", 0).is_empty());
    assert!(scanner
        .scan_file(&dir.path().join("gone.php"), "php", 0)
        .is_empty());
}

#[test]
fn language_filter_parsing() {
    assert_eq!(LanguageFilter::from_args(&[]), LanguageFilter::All);
    assert_eq!(
        LanguageFilter::from_args(&["php".into(), "ALL".into()]),
        LanguageFilter::All
    );
    assert_eq!(
        LanguageFilter::from_args(&["PHP".into()]),
        LanguageFilter::Only(vec!["php".into()])
    );
}

#[test]
fn non_utf8_source_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let latin1 = dir.path().join("latin1.php");
    fs::write(&latin1, b"echo $_GET['caf\xe9'];\n").unwrap();
    let good = dir.path().join("good.php");
    fs::write(&good, "echo $_GET['cafe'];\n").unwrap();

    let scanner = php_scanner();
    assert!(scanner.scan_file(&latin1, "php", 0).is_empty());

    let res = scanner
        .scan(dir.path(), &LanguageFilter::All, None, &Config::default())
        .unwrap();
    assert_eq!(res.files_scanned, 2);
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.files[0].file_path, good);
}
