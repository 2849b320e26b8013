use std::fs;
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/tests/fixtures")
}

/// Load an HTML fixture by name, panicking when it is missing
pub fn load_html_fixture(fixture_name: &str) -> String {
    let path = fixtures_dir().join(format!("{}.html", fixture_name));
    fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("Failed to load test fixture: {}", path.display()))
}

/// Names of the pages saved by `debug_structure`, if any
pub fn failure_names() -> Vec<String> {
    let dir = fixtures_dir().join("failures");
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "html"))
        .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names
}

/// Load a saved failure page for regression testing
pub fn load_failure_html(failure_name: &str) -> Option<String> {
    let path = fixtures_dir()
        .join("failures")
        .join(format!("{}.html", failure_name));
    fs::read_to_string(path).ok()
}
