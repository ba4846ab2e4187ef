pub mod frameworks;
mod go;
mod java;
mod javascript;
mod php;
mod python;
mod ruby;
pub mod store;

pub use store::PatternStore;

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// One named vulnerability category with its regex signatures.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PatternRule {
    /// Section name, e.g. `SQL_INJECTION`.
    pub vulnerability_type: String,
    /// Human-readable explanation (empty when the document has none).
    pub description: String,
    /// Regex sources, tried independently against every line.
    pub patterns: Vec<String>,
}

/// Ordered `vulnerability_type → PatternRule` map for one language or
/// framework. Enumeration order is document order.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<PatternRule>,
}

impl RuleSet {
    pub fn get(&self, vulnerability_type: &str) -> Option<&PatternRule> {
        self.rules
            .iter()
            .find(|r| r.vulnerability_type == vulnerability_type)
    }

    fn get_mut(&mut self, vulnerability_type: &str) -> Option<&mut PatternRule> {
        self.rules
            .iter_mut()
            .find(|r| r.vulnerability_type == vulnerability_type)
    }

    /// Insert `rule`, replacing an existing rule of the same type in place.
    pub fn insert(&mut self, rule: PatternRule) {
        match self.get_mut(&rule.vulnerability_type) {
            Some(slot) => *slot = rule,
            None => self.rules.push(rule),
        }
    }

    /// Union `rule` into this set: unseen pattern strings are appended to
    /// the existing entry, or the rule is added whole if its type is new.
    pub fn merge(&mut self, rule: &PatternRule) {
        match self.get_mut(&rule.vulnerability_type) {
            Some(existing) => {
                for p in &rule.patterns {
                    if !existing.patterns.contains(p) {
                        existing.patterns.push(p.clone());
                    }
                }
            }
            None => {
                let mut fresh = PatternRule {
                    vulnerability_type: rule.vulnerability_type.clone(),
                    description: rule.description.clone(),
                    patterns: Vec::with_capacity(rule.patterns.len()),
                };
                for p in &rule.patterns {
                    if !fresh.patterns.contains(p) {
                        fresh.patterns.push(p.clone());
                    }
                }
                self.rules.push(fresh);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn pattern_count(&self) -> usize {
        self.rules.iter().map(|r| r.patterns.len()).sum()
    }
}

/// Parse a pattern document.
///
/// The format is permissive: anything that is not a section header,
/// `description:`, `patterns:` or a `- ` item is ignored.
pub fn parse_document(content: &str) -> RuleSet {
    let mut out = RuleSet::default();
    let mut current: Option<PatternRule> = None;

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if line.len() >= 2 && line.starts_with('[') && line.ends_with(']') {
            if let Some(rule) = current.take() {
                out.insert(rule);
            }
            let name = &line[1..line.len() - 1];
            // `[]` opens nothing; items until the next header are dropped
            if !name.is_empty() {
                current = Some(PatternRule {
                    vulnerability_type: name.to_owned(),
                    ..PatternRule::default()
                });
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("description:") {
            if let Some(rule) = current.as_mut() {
                rule.description = rest.trim().to_owned();
            }
            continue;
        }

        if line == "patterns:" {
            continue;
        }

        if let Some(rest) = line.strip_prefix("- ") {
            if let Some(rule) = current.as_mut() {
                rule.patterns.push(rest.trim().to_owned());
            }
        }
    }

    if let Some(rule) = current.take() {
        out.insert(rule);
    }
    out
}

/// A framework overlay shipped with the binary.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinFramework {
    pub name: &'static str,
    pub language: &'static str,
    pub document: &'static str,
}

/// Global, lazily-initialised registry: language → built-in document
static LANGUAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert("php", php::DOCUMENT);
    m.insert("java", java::DOCUMENT);
    m.insert("python", python::DOCUMENT);
    m.insert("javascript", javascript::DOCUMENT);
    m.insert("golang", go::DOCUMENT);
    m.insert("ruby", ruby::DOCUMENT);

    tracing::debug!("built-in pattern registry initialised ({} languages)", m.len());

    m
});

pub static FRAMEWORKS: &[BuiltinFramework] = &[
    BuiltinFramework { name: "laravel", language: "php", document: frameworks::LARAVEL },
    BuiltinFramework { name: "symfony", language: "php", document: frameworks::SYMFONY },
    BuiltinFramework { name: "django", language: "python", document: frameworks::DJANGO },
    BuiltinFramework { name: "flask", language: "python", document: frameworks::FLASK },
    BuiltinFramework { name: "spring", language: "java", document: frameworks::SPRING },
    BuiltinFramework { name: "rails", language: "ruby", document: frameworks::RAILS },
    BuiltinFramework { name: "express", language: "javascript", document: frameworks::EXPRESS },
    BuiltinFramework { name: "gin", language: "golang", document: frameworks::GIN },
];

/// Built-in document for `lang` (case-insensitive).
pub fn builtin_language(lang: &str) -> Option<&'static str> {
    let key = lang.to_ascii_lowercase();
    LANGUAGES.get(key.as_str()).copied()
}

pub fn builtin_framework(name: &str) -> Option<&'static BuiltinFramework> {
    let key = name.to_ascii_lowercase();
    FRAMEWORKS.iter().find(|f| f.name == key)
}

/// Sorted names of every built-in language.
pub fn builtin_languages() -> Vec<&'static str> {
    let mut v: Vec<_> = LANGUAGES.keys().copied().collect();
    v.sort_unstable();
    v
}

#[test]
fn parse_document_reads_sections_in_order() {
    let doc = "\
[SQL_INJECTION]
description: SQL built from strings
patterns:
- mysql_query\\s*\\(
-   pg_query\\(

[XSS]
description: echo of input
- echo\\s+\\$_GET
";
    let rules = parse_document(doc);
    let types: Vec<_> = rules.iter().map(|r| r.vulnerability_type.as_str()).collect();
    assert_eq!(types, ["SQL_INJECTION", "XSS"]);

    let sqli = rules.get("SQL_INJECTION").unwrap();
    assert_eq!(sqli.description, "SQL built from strings");
    assert_eq!(sqli.patterns, ["mysql_query\\s*\\(", "pg_query\\("]);

    assert_eq!(rules.get("XSS").unwrap().patterns, ["echo\\s+\\$_GET"]);
}

#[test]
fn parse_document_ignores_noise_and_orphan_items() {
    let doc = "\
- orphan before any section
random garbage line
[CSRF]
# comment-ish line
- csrf_exempt
[]
- dropped
";
    let rules = parse_document(doc);
    assert_eq!(rules.len(), 1);
    let csrf = rules.get("CSRF").unwrap();
    assert_eq!(csrf.description, "");
    assert_eq!(csrf.patterns, ["csrf_exempt"]);
}

#[test]
fn merge_appends_unseen_patterns_only() {
    let mut set = parse_document("[A]\n- x\n- y\n");
    set.merge(&PatternRule {
        vulnerability_type: "A".into(),
        description: "ignored".into(),
        patterns: vec!["y".into(), "z".into(), "z".into()],
    });
    set.merge(&PatternRule {
        vulnerability_type: "B".into(),
        description: "new".into(),
        patterns: vec!["q".into()],
    });

    assert_eq!(set.get("A").unwrap().patterns, ["x", "y", "z"]);
    assert_eq!(set.get("A").unwrap().description, "");
    assert_eq!(set.get("B").unwrap().description, "new");
    assert_eq!(set.pattern_count(), 4);
}

#[test]
fn builtin_documents_parse_into_non_empty_sets() {
    for lang in builtin_languages() {
        let doc = builtin_language(lang).unwrap();
        assert!(!parse_document(doc).is_empty(), "{lang} has no rules");
    }
    for fw in FRAMEWORKS {
        assert!(!parse_document(fw.document).is_empty(), "{} has no rules", fw.name);
    }
    assert_eq!(builtin_language("PHP"), builtin_language("php"));
    assert!(builtin_language("brainfuck").is_none());
    assert_eq!(builtin_framework("Laravel").map(|f| f.language), Some("php"));
}

#[test]
fn builtin_patterns_compile() {
    for lang in builtin_languages() {
        for rule in parse_document(builtin_language(lang).unwrap()).iter() {
            for p in &rule.patterns {
                assert!(regex::Regex::new(p).is_ok(), "{lang}: bad regex {p}");
            }
        }
    }
    for fw in FRAMEWORKS {
        for rule in parse_document(fw.document).iter() {
            for p in &rule.patterns {
                assert!(regex::Regex::new(p).is_ok(), "{}: bad regex {p}", fw.name);
            }
        }
    }
}
