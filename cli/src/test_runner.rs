use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use interpreter::{LocalSources, ModelInterpreter, Options};
use xdra::Element;

const TEST_SUFFIX: &str = ".test.xdra";

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Expected generated document (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected runtime error: the error's Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, the model itself must fail to parse.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Inline XML documents registered as global sources before the run.
    #[serde(default)]
    pub sources: Vec<String>,

    /// `scoped` (default) or `global`.
    #[serde(default)]
    pub local_sources: Option<String>,
}

/// Split a `.test.xdra` file into its TOML config and model text.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..];
    let model = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, model))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.strip_suffix(TEST_SUFFIX).unwrap_or(s))
                .unwrap_or("?")
        })
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let (description, outcome) = match std::fs::read_to_string(path) {
        Ok(content) => match parse_test_file(&content) {
            Ok((config, model)) => (config.description.clone(), evaluate(path, &config, model)),
            Err(e) => (None, Err(format!("frontmatter error: {}", e))),
        },
        Err(e) => (None, Err(format!("cannot read file: {}", e))),
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: match outcome {
            Ok(()) => TestOutcome::Pass,
            Err(reason) => TestOutcome::Fail(reason),
        },
    }
}

/// Run one test's model against its expectations. `Err` carries the failure reason.
fn evaluate(path: &Path, config: &TestConfig, model: &str) -> Result<(), String> {
    let parsed = xdra::parser::Parser::new(model.to_string(), 0).parse();
    if config.expect_parse_error {
        return match parsed {
            Err(_) => Ok(()),
            Ok(_) => Err("expected parse error, but parsing succeeded".into()),
        };
    }
    let model = parsed.map_err(|e| format!("unexpected parse error: {}", e.message))?;

    let sources = config
        .sources
        .iter()
        .enumerate()
        .map(|(i, text)| {
            xdra::parser::Parser::new(text.clone(), 0)
                .parse()
                .map_err(|e| format!("source {} does not parse: {}", i + 1, e.message))
        })
        .collect::<Result<Vec<Element>, String>>()?;

    let local_sources = match config.local_sources.as_deref() {
        None | Some("scoped") => LocalSources::Scoped,
        Some("global") => LocalSources::Global,
        Some(other) => return Err(format!("unknown local_sources policy '{}'", other)),
    };

    let options = Options {
        local_sources,
        base_dir: path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".")),
        write_output: false,
        ..Options::default()
    };
    let result = ModelInterpreter::with_options(options)
        .with_sources(sources)
        .run(&model);

    match (&config.expect_error, &config.expect_output, result) {
        (Some(expected), _, Err(err)) => {
            let err = err.to_string();
            if err.contains(expected.as_str()) {
                Ok(())
            } else {
                Err(format!("expected error containing \"{}\", got: {}", expected, err))
            }
        }
        (Some(expected), _, Ok(_)) => Err(format!(
            "expected error containing \"{}\", but evaluation succeeded",
            expected
        )),
        (None, _, Err(err)) => Err(format!("unexpected runtime error: {}", err)),
        (None, Some(expected), Ok(actual)) => {
            let (expected, actual) = (expected.trim(), actual.trim());
            if expected == actual {
                Ok(())
            } else {
                Err(format!(
                    "output mismatch\n  expected: {}\n  actual:   {}",
                    expected, actual
                ))
            }
        }
        (None, None, Ok(_)) => Ok(()),
    }
}

/// Discover test files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let entries = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok);
    for entry in entries {
        let is_test = entry.file_name().to_str().is_some_and(|n| n.ends_with(TEST_SUFFIX));
        if !entry.file_type().is_file() || !is_test {
            continue;
        }
        let category = entry
            .path()
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        categories.entry(category).or_default().push(entry.into_path());
    }
    categories
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(cat), files.len());
    }
}

fn paint(text: &str, code: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }
}

/// Print one result line and return whether it passed.
fn report(result: &TestResult, no_color: bool) -> bool {
    let (label, passed) = match result.outcome {
        TestOutcome::Pass => (paint("PASS", "32", no_color), true),
        TestOutcome::Fail(_) => (paint("FAIL", "31", no_color), false),
    };
    eprintln!("  {}  {}", label, result.label());
    passed
}

fn print_failures(failures: &[TestResult]) {
    if failures.is_empty() {
        return;
    }
    eprintln!();
    eprintln!("failures:");
    for failure in failures {
        eprintln!();
        eprintln!("  --- {} ---", failure.path.display());
        if let TestOutcome::Fail(reason) = &failure.outcome {
            for line in reason.lines() {
                eprintln!("  {}", line);
            }
        }
    }
}

fn print_summary(passed: usize, failed: usize, no_color: bool) -> i32 {
    eprintln!();
    if failed == 0 {
        eprintln!("test result: {}. {} passed, 0 failed", paint("ok", "32", no_color), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failed,
            passed + failed
        );
        1
    }
}

/// Pick the categories matching the `-c` filters; a filter also selects
/// its subcategories.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }
    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let prefix = format!("{}/", request);
        let before = selected.len();
        for (cat, files) in all {
            if cat == request || cat.starts_with(&prefix) {
                selected.insert(cat.as_str(), files);
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                available.join(", ")
            );
        }
    }
    selected
}

/// Run all test files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    if path.is_file() {
        let result = run_single_test(path);
        let passed = report(&result, no_color);
        let failures = if passed { Vec::new() } else { vec![result] };
        print_failures(&failures);
        return print_summary(usize::from(passed), failures.len(), no_color);
    }

    let all_categories = discover_categorized(path);
    if all_categories.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return 1;
    }

    let selected = select_categories(&all_categories, categories);
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();
    for (cat, files) in &selected {
        eprintln!();
        eprintln!("{}", paint(category_label(cat), "1", no_color));

        for file in *files {
            let result = run_single_test(file);
            if report(&result, no_color) {
                passed += 1;
            } else {
                failures.push(result);
            }
        }
    }

    print_failures(&failures);
    print_summary(passed, failures.len(), no_color)
}
