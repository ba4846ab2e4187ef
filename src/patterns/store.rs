use crate::errors::{GrepIntelError, GrepIntelResult};
use crate::patterns::{self, RuleSet, parse_document};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// A framework overlay tagged with the language it extends.
#[derive(Debug, Clone)]
pub struct FrameworkLayer {
    pub name: String,
    pub language: String,
    pub rules: RuleSet,
}

/// Language layers, framework overlays and the combined per-language view.
///
/// Built once at startup through the `load_*` methods, then shared
/// read-only (`Arc<PatternStore>`) for the rest of the run.
#[derive(Debug, Default, Clone)]
pub struct PatternStore {
    languages: HashMap<String, RuleSet>,
    frameworks: Vec<FrameworkLayer>,
    combined: HashMap<String, RuleSet>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in language document. Framework overlays are opt-in,
    /// see [`PatternStore::load_named_framework`].
    pub fn builtin() -> Self {
        let mut store = Self::new();
        for lang in patterns::builtin_languages() {
            if let Some(doc) = patterns::builtin_language(lang) {
                store.load_language_str(doc, lang);
            }
        }
        store
    }

    /// Install the document at `path` as the language layer for `language`.
    pub fn load_language(&mut self, path: &Path, language: &str) -> GrepIntelResult<()> {
        let content = read_document(path)?;
        tracing::debug!(language, path = %path.display(), "loading language patterns");
        self.load_language_str(&content, language);
        Ok(())
    }

    pub fn load_language_str(&mut self, document: &str, language: &str) {
        let rules = parse_document(document);
        if rules.is_empty() {
            tracing::warn!(language, "pattern document defines no rules");
        }
        self.languages.insert(language.to_owned(), rules);
        self.rebuild(language);
    }

    /// Install the document at `path` as a framework overlay of `language`.
    pub fn load_framework(
        &mut self,
        path: &Path,
        framework: &str,
        language: &str,
    ) -> GrepIntelResult<()> {
        let content = read_document(path)?;
        tracing::debug!(framework, language, path = %path.display(), "loading framework patterns");
        self.load_framework_str(&content, framework, language);
        Ok(())
    }

    pub fn load_framework_str(&mut self, document: &str, framework: &str, language: &str) {
        let layer = FrameworkLayer {
            name: framework.to_owned(),
            language: language.to_owned(),
            rules: parse_document(document),
        };
        match self.frameworks.iter_mut().find(|f| f.name == framework) {
            Some(slot) => {
                let previous = std::mem::replace(slot, layer);
                if previous.language != language {
                    self.rebuild(&previous.language);
                }
            }
            None => self.frameworks.push(layer),
        }
        self.rebuild(language);
    }

    /// Load every `languages/*.txt` under `dir`, each named by its stem.
    ///
    /// A file that cannot be loaded is logged and skipped. Fails only when
    /// the directory is missing or no language loaded at all.
    pub fn load_dir(&mut self, dir: &Path) -> GrepIntelResult<()> {
        if !dir.is_dir() {
            return Err(GrepIntelError::PatternFileNotFound(dir.to_path_buf()));
        }

        let lang_dir = dir.join("languages");
        if !lang_dir.is_dir() {
            return Err(GrepIntelError::PatternFileNotFound(lang_dir));
        }

        let mut loaded = 0;
        let mut first_err = None;
        for (stem, path) in pattern_files(&lang_dir)? {
            match self.load_language(&path, &stem) {
                Ok(()) => loaded += 1,
                Err(e) => {
                    tracing::warn!(language = %stem, "skipping pattern file: {e}");
                    first_err.get_or_insert(e);
                }
            }
        }

        match (loaded, first_err) {
            (0, Some(e)) => Err(e),
            (0, None) => Err(GrepIntelError::PatternFileNotFound(lang_dir)),
            _ => Ok(()),
        }
    }

    /// Overlay `framework`, read from `dir/frameworks/<name>.txt` when a
    /// pattern directory is configured and from the built-in documents
    /// otherwise. Returns the language the overlay was attached to.
    pub fn load_named_framework(
        &mut self,
        framework: &str,
        dir: Option<&Path>,
        framework_languages: &BTreeMap<String, String>,
    ) -> GrepIntelResult<String> {
        let name = framework.to_ascii_lowercase();
        let builtin = patterns::builtin_framework(&name);
        let language = framework_languages
            .get(&name)
            .cloned()
            .or_else(|| builtin.map(|b| b.language.to_owned()))
            .ok_or_else(|| format!("no language mapped for framework ‘{name}’"))?;

        match dir {
            Some(dir) => {
                let path = dir.join("frameworks").join(format!("{name}.txt"));
                self.load_framework(&path, &name, &language)?;
            }
            None => {
                let b = builtin
                    .ok_or_else(|| format!("no built-in patterns for framework ‘{name}’"))?;
                self.load_framework_str(b.document, &name, &language);
            }
        }
        Ok(language)
    }

    /// Combined view for `language`.
    pub fn patterns_for(&self, language: &str) -> GrepIntelResult<&RuleSet> {
        self.combined
            .get(language)
            .ok_or_else(|| GrepIntelError::UnsupportedLanguage(language.to_owned()))
    }

    /// The language layer alone, without framework overlays.
    pub fn language_layer(&self, language: &str) -> Option<&RuleSet> {
        self.languages.get(language)
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.combined.contains_key(language)
    }

    /// Sorted names of languages with a loaded layer.
    pub fn languages(&self) -> Vec<&str> {
        let mut v: Vec<_> = self.languages.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }

    pub fn frameworks(&self) -> &[FrameworkLayer] {
        &self.frameworks
    }

    /// Recompute the combined view of `language` from its layers.
    ///
    /// Without a language layer there is no combined view; framework
    /// overlays wait until one is loaded.
    fn rebuild(&mut self, language: &str) {
        let Some(base) = self.languages.get(language) else {
            self.combined.remove(language);
            return;
        };

        let mut combined = RuleSet::default();
        for rule in base.iter() {
            combined.merge(rule);
        }
        for fw in self.frameworks.iter().filter(|f| f.language == language) {
            for rule in fw.rules.iter() {
                combined.merge(rule);
            }
        }

        tracing::debug!(
            language,
            rules = combined.len(),
            patterns = combined.pattern_count(),
            "combined pattern view rebuilt"
        );
        self.combined.insert(language.to_owned(), combined);
    }
}

fn read_document(path: &Path) -> GrepIntelResult<String> {
    if !path.exists() {
        return Err(GrepIntelError::PatternFileNotFound(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::InvalidData => GrepIntelError::PatternParse {
            path: path.to_path_buf(),
            reason: "not valid UTF-8".into(),
        },
        _ => GrepIntelError::Io(e),
    })
}

/// `(stem, path)` of every `*.txt` in `dir`, sorted by stem.
fn pattern_files(dir: &Path) -> GrepIntelResult<Vec<(String, std::path::PathBuf)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("txt") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            out.push((stem.to_owned(), path.clone()));
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
const PHP: &str = "\
[SQL_INJECTION]
description: SQL injection
patterns:
- mysql_query\\s*\\(
- pg_query\\s*\\(

[XSS]
description: XSS
patterns:
- echo\\s+\\$_GET
";

#[cfg(test)]
const LARAVEL: &str = "\
[SQL_INJECTION]
description: laravel sql
patterns:
- DB::raw\\s*\\(
- mysql_query\\s*\\(

[MASS_ASSIGNMENT]
description: mass assignment
patterns:
- \\$guarded\\s*=\\s*\\[\\s*\\]
";

#[test]
fn combined_view_is_superset_without_duplicates() {
    let mut store = PatternStore::new();
    store.load_language_str(PHP, "php");
    store.load_framework_str(LARAVEL, "laravel", "php");

    let base = store.language_layer("php").unwrap().clone();
    let combined = store.patterns_for("php").unwrap();

    for rule in base.iter() {
        let merged = combined.get(&rule.vulnerability_type).unwrap();
        for p in &rule.patterns {
            assert!(merged.patterns.contains(p));
        }
    }
    for rule in combined.iter() {
        let mut seen = rule.patterns.clone();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), rule.patterns.len(), "{} has duplicates", rule.vulnerability_type);
    }

    let sqli = combined.get("SQL_INJECTION").unwrap();
    assert_eq!(sqli.patterns, ["mysql_query\\s*\\(", "pg_query\\s*\\(", "DB::raw\\s*\\("]);
    assert_eq!(sqli.description, "SQL injection");
    assert_eq!(combined.get("MASS_ASSIGNMENT").unwrap().description, "mass assignment");
}

#[test]
fn rebuild_is_idempotent() {
    let mut store = PatternStore::new();
    store.load_language_str(PHP, "php");
    store.load_framework_str(LARAVEL, "laravel", "php");
    let first = store.patterns_for("php").unwrap().clone();

    store.rebuild("php");
    store.load_framework_str(LARAVEL, "laravel", "php");
    assert_eq!(store.patterns_for("php").unwrap(), &first);
}

#[test]
fn framework_only_applies_to_its_language() {
    let mut store = PatternStore::new();
    store.load_language_str(PHP, "php");
    store.load_language_str("[XSS]\n- innerHTML\n", "javascript");
    store.load_framework_str(LARAVEL, "laravel", "php");

    let js = store.patterns_for("javascript").unwrap();
    assert!(js.get("MASS_ASSIGNMENT").is_none());
    assert_eq!(js.pattern_count(), 1);
}

#[test]
fn framework_loaded_before_language_is_applied_later() {
    let mut store = PatternStore::new();
    store.load_framework_str(LARAVEL, "laravel", "php");
    assert!(store.patterns_for("php").is_err());

    store.load_language_str(PHP, "php");
    assert!(store.patterns_for("php").unwrap().get("MASS_ASSIGNMENT").is_some());
}

#[test]
fn unknown_language_is_unsupported() {
    let store = PatternStore::new();
    let err = store.patterns_for("cobol").unwrap_err();
    assert!(matches!(err, GrepIntelError::UnsupportedLanguage(ref l) if l == "cobol"));
}

#[test]
fn missing_file_is_pattern_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = PatternStore::new();
    let err = store
        .load_language(&dir.path().join("nope.txt"), "php")
        .unwrap_err();
    assert!(matches!(err, GrepIntelError::PatternFileNotFound(_)));
    assert!(!store.has_language("php"));
}

#[test]
fn load_dir_reads_language_files_only() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("languages")).unwrap();
    fs::create_dir_all(dir.path().join("frameworks")).unwrap();
    fs::write(dir.path().join("languages/php.txt"), PHP).unwrap();
    fs::write(dir.path().join("languages/README.md"), "ignored").unwrap();
    fs::write(dir.path().join("frameworks/laravel.txt"), LARAVEL).unwrap();

    let mut store = PatternStore::new();
    store.load_dir(dir.path()).unwrap();
    assert_eq!(store.languages(), ["php"]);
    assert!(store.frameworks().is_empty());

    let mut map = BTreeMap::new();
    map.insert("laravel".to_string(), "php".to_string());
    let lang = store
        .load_named_framework("Laravel", Some(dir.path()), &map)
        .unwrap();
    assert_eq!(lang, "php");
    assert!(store.patterns_for("php").unwrap().get("MASS_ASSIGNMENT").is_some());

    let err = store
        .load_named_framework("symfony", Some(dir.path()), &BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, GrepIntelError::PatternFileNotFound(_)));
}

#[test]
fn missing_pattern_dir_is_pattern_file_not_found() {
    let mut store = PatternStore::new();
    let err = store.load_dir(Path::new("/definitely/not/here")).unwrap_err();
    assert!(matches!(err, GrepIntelError::PatternFileNotFound(_)));
}

#[test]
fn builtin_store_covers_every_builtin_language() {
    let mut store = PatternStore::builtin();
    for lang in patterns::builtin_languages() {
        assert!(store.has_language(lang), "{lang} missing");
    }
    assert!(store.frameworks().is_empty());

    let before = store.patterns_for("python").unwrap().pattern_count();
    let lang = store
        .load_named_framework("django", None, &BTreeMap::new())
        .unwrap();
    assert_eq!(lang, "python");
    assert!(store.patterns_for("python").unwrap().pattern_count() > before);

    assert!(store.load_named_framework("cakephp", None, &BTreeMap::new()).is_err());
}

#[test]
fn load_dir_skips_bad_files_and_keeps_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("languages")).unwrap();
    fs::write(dir.path().join("languages/java.txt"), b"[XSS]\n- \xff\xfe\n").unwrap();
    fs::write(dir.path().join("languages/php.txt"), PHP).unwrap();

    let mut store = PatternStore::new();
    store.load_dir(dir.path()).unwrap();
    assert!(store.has_language("php"));
    assert!(!store.has_language("java"));
}

#[test]
fn load_dir_with_nothing_loadable_fails() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("languages")).unwrap();
    fs::write(dir.path().join("languages/java.txt"), b"\xff\xfe").unwrap();

    let mut store = PatternStore::new();
    let err = store.load_dir(dir.path()).unwrap_err();
    assert!(matches!(err, GrepIntelError::PatternParse { .. }));

    let empty = tempfile::tempdir().unwrap();
    let err = PatternStore::new().load_dir(empty.path()).unwrap_err();
    assert!(matches!(err, GrepIntelError::PatternFileNotFound(_)));
}

#[test]
fn non_utf8_pattern_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("php.txt");
    fs::write(&path, b"[SQL_INJECTION]\n- mysql_\xc3\x28\n").unwrap();

    let mut store = PatternStore::new();
    let err = store.load_language(&path, "php").unwrap_err();
    match err {
        GrepIntelError::PatternParse { path: p, reason } => {
            assert_eq!(p, path);
            assert_eq!(reason, "not valid UTF-8");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!store.has_language("php"));
}
