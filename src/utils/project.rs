use crate::errors::{GrepIntelError, GrepIntelResult};
use std::path::{Path, PathBuf};

/// Default JSON report location for a scan of `target`:
/// `<dir>/<sanitized-target-name>-grepintel.json`.
pub fn default_report_path(target: &Path, dir: &Path) -> GrepIntelResult<PathBuf> {
    let name = target
        .file_stem()
        .and_then(|n| n.to_str())
        .ok_or_else(|| GrepIntelError::Other("Unable to determine target name".into()))?;

    let name = sanitize_project_name(name);
    Ok(dir.join(format!("{}-grepintel.json", name)))
}

pub fn sanitize_project_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '\t' | '\n' | '\r' => '_',
            c if c.is_alphanumeric() || c == '_' || c == '-' => c,
            _ => '_',
        })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[test]
fn sanitize_project_name_is_idempotent_and_lossless_enough() {
    let samples = [
        ("My Project", "my_project"),
        ("Hello-World", "hello-world"),
        ("mixed_case", "mixed_case"),
        ("tabs\tspaces\n", "tabs_spaces"),
        ("   multiple   ", "multiple"),
        ("weird@$*chars", "weird_chars"),
    ];

    for (input, expected) in samples {
        assert_eq!(sanitize_project_name(input), expected, "input: {}", input);
        assert_eq!(sanitize_project_name(expected), expected);
    }
}

#[test]
fn default_report_path_uses_sanitized_target_name() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    let target = root.join("Example Project");
    std::fs::create_dir(&target).unwrap();

    let path = default_report_path(&target, root).expect("should name report");
    assert_eq!(path, root.join("example_project-grepintel.json"));

    let file = default_report_path(Path::new("src/Login Controller.php"), root).unwrap();
    assert_eq!(file, root.join("login_controller-grepintel.json"));
}
