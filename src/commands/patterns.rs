use crate::commands::build_store;
use crate::errors::GrepIntelResult;
use crate::patterns::{self, PatternStore, RuleSet};
use crate::utils::config::Config;
use console::style;

pub fn handle(framework: Option<&str>, verbose: bool, config: &Config) -> GrepIntelResult<()> {
    let store = build_store(config, framework);
    print!("{}", render(&store, verbose));
    Ok(())
}

fn render(store: &PatternStore, verbose: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", style("Loaded languages").blue().bold().underlined()));

    let languages = store.languages();
    if languages.is_empty() {
        out.push_str(&format!("  {}\n", style("∅ No pattern layers loaded").dim()));
    }

    for lang in languages {
        let Ok(rules) = store.patterns_for(lang) else {
            continue;
        };
        let overlay = overlay_count(rules, store.language_layer(lang));
        out.push_str(&format!(
            "  {}  {} rules, {} patterns",
            style(lang).white().bold(),
            rules.len(),
            rules.pattern_count()
        ));
        if overlay > 0 {
            out.push_str(&format!(", {overlay} from frameworks"));
        }
        out.push('\n');
        for rule in rules.iter() {
            out.push_str(&format!(
                "    {:28} {}\n",
                style(&rule.vulnerability_type),
                style(&rule.description).dim()
            ));
            if verbose {
                for p in &rule.patterns {
                    out.push_str(&format!("      - {p}\n"));
                }
            }
        }
    }

    out.push_str(&format!("\n{}\n", style("Frameworks").blue().bold().underlined()));
    for fw in patterns::FRAMEWORKS {
        let active = store.frameworks().iter().any(|f| f.name == fw.name);
        out.push_str(&format!(
            "  {:10} {:12} {}\n",
            style(fw.name),
            fw.language,
            if active {
                style("loaded").green().to_string()
            } else {
                style("available").dim().to_string()
            }
        ));
    }
    for fw in store.frameworks() {
        if patterns::builtin_framework(&fw.name).is_none() {
            out.push_str(&format!(
                "  {:10} {:12} {}\n",
                style(&fw.name),
                fw.language,
                style("loaded").green()
            ));
        }
    }
    out
}

/// Patterns of `combined` that the language layer does not have itself.
fn overlay_count(combined: &RuleSet, base: Option<&RuleSet>) -> usize {
    combined
        .iter()
        .map(|rule| {
            let own = base.and_then(|b| b.get(&rule.vulnerability_type));
            rule.patterns
                .iter()
                .filter(|p| own.is_none_or(|o| !o.patterns.contains(p)))
                .count()
        })
        .sum()
}

#[test]
fn render_lists_rules_and_framework_state() {
    let mut store = PatternStore::new();
    store.load_language_str("[XSS]\ndescription: echo of input\n- echo\\s+\\$_GET\n", "php");
    store.load_framework_str("[MASS_ASSIGNMENT]\n- guarded\n", "laravel", "php");

    console::set_colors_enabled(false);
    let text = render(&store, true);
    assert!(text.contains("php  2 rules, 2 patterns, 1 from frameworks"));
    assert!(text.contains("echo of input"));
    assert!(text.contains("- echo\\s+\\$_GET"));
    assert!(text.contains("laravel"));
    assert!(text.contains("loaded"));

    let short = render(&store, false);
    assert!(!short.contains("- guarded"));
}

#[test]
fn duplicated_pattern_line_does_not_count_as_overlay() {
    let mut store = PatternStore::new();
    store.load_language_str("[XSS]\n- echo\n- echo\n", "php");

    console::set_colors_enabled(false);
    let text = render(&store, false);
    assert!(text.contains("php  1 rules, 1 patterns\n"));
    assert!(!text.contains("from frameworks"));

    store.load_framework_str("[XSS]\n- echo\n- print\n", "laravel", "php");
    assert!(render(&store, false).contains("1 rules, 2 patterns, 1 from frameworks"));
}
