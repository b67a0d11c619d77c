use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn redirects_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("redirects");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/redirects.sqlite"

[server]
bind = "127.0.0.1:7332"

[log]
level = "warn"
"#,
        root.display()
    );

    let config_path = config_dir.join("redirects.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_redirects(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = redirects_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run redirects binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_redirects(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/redirects.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_redirects(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_redirects(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let (stdout, stderr, success) =
        run_redirects(Path::new("/nonexistent/redirects.toml"), &["list"]);
    assert!(!success, "expected failure: stdout={}", stdout);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_add_and_list() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_redirects(&config_path, &["add", "/old/page/", "new/page", "--status", "302"]);
    assert!(success, "add failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("++ old/page => new/page (302) - all hosts"));

    let (stdout, _, success) = run_redirects(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("== Redirects valid for all hosts"));
    assert!(stdout.contains("> old/page => new/page (302)"));
}

#[test]
fn test_add_collapses_chains() {
    let (_tmp, config_path) = setup_test_env();

    run_redirects(&config_path, &["add", "c", "d"]);
    run_redirects(&config_path, &["add", "d", "e"]);

    let (stdout, _, _) = run_redirects(&config_path, &["list"]);
    assert!(stdout.contains("> c => e (301)"), "list: {}", stdout);
    assert!(stdout.contains("> d => e (301)"), "list: {}", stdout);
    assert!(!stdout.contains("c => d"));
}

#[test]
fn test_add_removes_circular_redirect() {
    let (_tmp, config_path) = setup_test_env();

    run_redirects(&config_path, &["add", "c", "d"]);
    run_redirects(&config_path, &["add", "d", "c"]);

    let (stdout, _, _) = run_redirects(&config_path, &["list"]);
    assert!(stdout.contains("> d => c (301)"));
    assert!(!stdout.contains("> c => d"));
}

#[test]
fn test_add_conflict_requires_force() {
    let (_tmp, config_path) = setup_test_env();

    run_redirects(&config_path, &["add", "a", "b"]);

    let (stdout, _, success) = run_redirects(&config_path, &["add", "a", "c"]);
    assert!(!success, "conflicting add should fail: {}", stdout);
    assert!(stdout.contains("Use --force to replace it"));

    let (stdout, _, success) = run_redirects(&config_path, &["add", "a", "c", "--force"]);
    assert!(success);
    assert!(stdout.contains("-- a => b (301)"));
    assert!(stdout.contains("++ a => c (301)"));
}

#[test]
fn test_add_identical_is_unchanged() {
    let (_tmp, config_path) = setup_test_env();

    run_redirects(&config_path, &["add", "a", "b"]);
    let (stdout, _, success) = run_redirects(&config_path, &["add", "a", "b"]);
    assert!(success);
    assert!(stdout.contains("~~ a => b (301)"));
}

#[test]
fn test_add_self_redirect_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_redirects(&config_path, &["add", "/a/", "a"]);
    assert!(!success);
    assert!(stderr.contains("to itself is not allowed"));
}

#[test]
fn test_failed_forced_add_keeps_existing_redirect() {
    let (_tmp, config_path) = setup_test_env();

    run_redirects(&config_path, &["add", "a", "b"]);

    let (stdout, stderr, success) = run_redirects(&config_path, &["add", "a", "/a", "--force"]);
    assert!(!success, "self redirect should fail: {}", stdout);
    assert!(stderr.contains("to itself is not allowed"));
    assert!(!stdout.contains("-- a => b"));

    let (stdout, _, _) = run_redirects(&config_path, &["list"]);
    assert!(stdout.contains("> a => b (301)"), "list: {}", stdout);
}

#[test]
fn test_list_by_host_and_match() {
    let (_tmp, config_path) = setup_test_env();

    run_redirects(&config_path, &["add", "blog/one", "news/one", "--host", "a.test"]);
    run_redirects(&config_path, &["add", "shop", "store", "--host", "a.test"]);
    run_redirects(&config_path, &["add", "blog/two", "news/two"]);

    let (stdout, _, _) = run_redirects(&config_path, &["list", "--host", "a.test"]);
    assert!(stdout.contains("== Redirects for a.test"));
    assert!(stdout.contains("blog/one"));
    assert!(!stdout.contains("blog/two"));

    let (stdout, _, _) = run_redirects(&config_path, &["list", "--match", "blog"]);
    assert!(stdout.contains("> [blog]/one => news/one"));
    assert!(stdout.contains("> [blog]/two => news/two"));
    assert!(!stdout.contains("shop"));
}

#[test]
fn test_remove() {
    let (_tmp, config_path) = setup_test_env();

    run_redirects(&config_path, &["add", "a", "b", "--host", "a.test"]);

    let (stdout, _, success) = run_redirects(&config_path, &["remove", "a"]);
    assert!(!success, "remove without host should not match: {}", stdout);
    assert!(stdout.contains("--host"));

    let (stdout, _, success) = run_redirects(&config_path, &["remove", "a", "--host", "a.test"]);
    assert!(success);
    assert!(stdout.contains("Removed redirect"));
}

#[test]
fn test_remove_by_host_and_remove_all() {
    let (_tmp, config_path) = setup_test_env();

    run_redirects(&config_path, &["add", "a", "b", "--host", "a.test"]);
    run_redirects(&config_path, &["add", "c", "d", "--host", "b.test"]);
    run_redirects(&config_path, &["add", "e", "f"]);

    let (stdout, _, success) = run_redirects(&config_path, &["remove-by-host", "all"]);
    assert!(success);
    assert!(stdout.contains("Removed 1 redirects matching all hosts"));

    let (stdout, _, _) = run_redirects(&config_path, &["remove-by-host", "a.test"]);
    assert!(stdout.contains("Removed 1 redirects for host \"a.test\""));

    let (stdout, _, _) = run_redirects(&config_path, &["remove-all"]);
    assert!(stdout.contains("Removed all redirects (1)"));
}

#[test]
fn test_import_and_reimport() {
    let (tmp, config_path) = setup_test_env();
    let csv = write_csv(
        tmp.path(),
        "redirects.csv",
        "Source Uri,Target Uri,Status Code,Host\n\
         old,new,301,\n\
         promo,sale,302,a.test|b.test\n",
    );

    let (stdout, stderr, success) =
        run_redirects(&config_path, &["import", csv.to_str().unwrap()]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("++ old => new (301) - all hosts"));
    assert!(stdout.contains("++ promo => sale (302) - a.test"));
    assert!(stdout.contains("++ promo => sale (302) - b.test"));
    assert!(stdout.contains("Legend"));

    let (stdout, _, success) = run_redirects(&config_path, &["import", csv.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("~~ old => new (301) - all hosts"));
    assert!(!stdout.contains("++ old"));
}

#[test]
fn test_import_with_wrong_delimiter() {
    let (tmp, config_path) = setup_test_env();
    let csv = write_csv(tmp.path(), "redirects.csv", "old;new;301\n");

    let (stdout, _, success) = run_redirects(&config_path, &["import", csv.to_str().unwrap()]);
    assert!(!success);
    assert!(stdout.contains("Invalid csv format, did you set the correct delimiter?"));

    let (stdout, _, success) = run_redirects(
        &config_path,
        &["import", csv.to_str().unwrap(), "--delimiter", ";"],
    );
    assert!(success, "import failed: {}", stdout);
    assert!(stdout.contains("++ old => new (301)"));
}

#[test]
fn test_import_reports_bad_rows() {
    let (tmp, config_path) = setup_test_env();
    let csv = write_csv(
        tmp.path(),
        "redirects.csv",
        "good,target,301\n\
         bad path,target,301\n\
         dated,target,301,,2024-13-01\n",
    );

    let (stdout, _, success) = run_redirects(&config_path, &["import", csv.to_str().unwrap()]);
    assert!(!success);
    assert!(stdout.contains("++ good => target (301)"));
    assert!(stdout.contains("Source path \"bad path\" does not have a valid format"));
    assert!(stdout.contains("Start date time \"2024-13-01\" does not match"));
    assert!(stdout.contains("some errors appeared during import"));
}

#[test]
fn test_import_missing_file() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_redirects(&config_path, &["import", "/nonexistent.csv"]);
    assert!(!success);
    assert!(stdout.contains("is not readable or does not exist"));
}

#[test]
fn test_export_round_trips_through_import() {
    let (tmp, config_path) = setup_test_env();

    run_redirects(
        &config_path,
        &[
            "add",
            "a",
            "b",
            "--host",
            "a.test",
            "--comment",
            "campaign",
            "--start",
            "2024-05-01T10:00:00+02:00",
        ],
    );
    run_redirects(&config_path, &["add", "c", "https://example.com/d", "--type", "manual"]);

    let out = tmp.path().join("out/export.csv");
    let (_, stderr, success) = run_redirects(
        &config_path,
        &["export", "--output", out.to_str().unwrap()],
    );
    assert!(success, "export failed: {}", stderr);

    let text = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "Source Uri,Target Uri,Status Code,Host,Start DateTime,End DateTime,Comment,Creator,Type"
    );
    assert_eq!(
        lines[1],
        "a,b,301,a.test,2024-05-01T08:00:00+00:00,,campaign,,generated"
    );
    assert_eq!(lines[2], "c,https://example.com/d,301,,,,,,manual");

    let (stdout, _, success) = run_redirects(&config_path, &["import", out.to_str().unwrap()]);
    assert!(success, "re-import failed: {}", stdout);
    assert!(stdout.contains("~~ a => b (301) - a.test"));
    assert!(stdout.contains("~~ c => https://example.com/d (301) - all hosts"));
}

#[test]
fn test_export_filters_and_no_header() {
    let (_tmp, config_path) = setup_test_env();

    run_redirects(&config_path, &["add", "a", "b", "--host", "a.test"]);
    run_redirects(&config_path, &["add", "c", "d"]);
    run_redirects(
        &config_path,
        &["add", "e", "f", "--end", "2000-01-01T00:00:00+00:00"],
    );

    let (stdout, _, success) =
        run_redirects(&config_path, &["export", "--host", "a.test", "--no-header"]);
    assert!(success);
    assert_eq!(stdout.trim(), "a,b,301,a.test,,,,,generated");

    let (stdout, _, _) = run_redirects(&config_path, &["export", "--only-active", "--no-header"]);
    assert_eq!(stdout.lines().count(), 2);
    assert!(!stdout.contains("e,f"));
}
