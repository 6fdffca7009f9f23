//! End-to-end batch runs over a results directory on disk.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use wpt_metrics::{
    browser_specific_series, interop_series, load_runs, trends_series, Channel, DateRuns,
    LoadedRuns, MetricsConfig, MetricsError, MetricsPaths, RunRecord, Window,
};
use wpt_results::{Run, TestStatus, TreeBuilder, TrendMethod};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

const PASS: &str = r#"{"status":"PASS"}"#;
const FAIL: &str = r#"{"status":"FAIL"}"#;
const SUB_ALL_PASS: &str = r#"{"status":"OK","subtests":[
    {"name":"x","status":"PASS"},{"name":"y","status":"PASS"}]}"#;
const SUB_HALF_PASS: &str = r#"{"status":"OK","subtests":[
    {"name":"x","status":"PASS"},{"name":"y","status":"FAIL"}]}"#;

/// Two good dates plus one inside a stable bad range whose results were
/// never fetched.
fn fixture(root: &Path) -> MetricsPaths {
    let manifest = r#"[
        {"id": 1, "browser_name": "chrome", "browser_version": "100",
         "full_revision_hash": "0123456789abcdef", "time_start": "2023-01-01T01:00:00Z"},
        {"id": 2, "browser_name": "firefox", "browser_version": "90",
         "full_revision_hash": "0123456789abcdef", "time_start": "2023-01-01T02:00:00Z"},
        {"id": 4, "browser_name": "firefox", "browser_version": "91",
         "full_revision_hash": "fedcba9876543210", "time_start": "2023-01-02T02:00:00Z"},
        {"id": 3, "browser_name": "chrome", "browser_version": "101",
         "full_revision_hash": "fedcba9876543210", "time_start": "2023-01-02T01:00:00Z"},
        {"id": 5, "browser_name": "chrome", "browser_version": "101",
         "full_revision_hash": "aaaaaaaaaaaaaaaa", "time_start": "2023-01-05T01:00:00Z"},
        {"id": 6, "browser_name": "firefox", "browser_version": "91",
         "full_revision_hash": "aaaaaaaaaaaaaaaa", "time_start": "2023-01-05T02:00:00Z"},
        {"id": 7, "browser_name": "safari", "browser_version": "16",
         "full_revision_hash": "aaaaaaaaaaaaaaaa", "time_start": "2023-01-05T02:00:00Z"}
    ]"#;
    write(root, "runs.json", manifest);

    let results = root.join("results");
    write(&results, "1/css/a.html.json", PASS);
    write(&results, "1/css/b.html.json", FAIL);
    write(&results, "1/css/sub.html.json", SUB_ALL_PASS);
    write(&results, "2/css/a.html.json", FAIL);
    write(&results, "2/css/b.html.json", FAIL);
    write(&results, "2/css/sub.html.json", SUB_HALF_PASS);

    write(&results, "3/css/a.html.json", PASS);
    write(&results, "3/css/b.html.json", FAIL);
    write(&results, "3/css/sub.html.json", SUB_ALL_PASS);
    write(&results, "3/css/new.html.json", FAIL);
    write(&results, "4/css/a.html.json", PASS);
    write(&results, "4/css/b.html.json", FAIL);
    write(&results, "4/css/sub.html.json", SUB_ALL_PASS);
    write(&results, "4/css/new.html.json", PASS);

    write(
        root,
        "metrics.toml",
        r#"
        products = ["firefox", "chrome"]

        [bad_ranges]
        stable = [["2023-01-05", "2023-01-06"]]

        [[categories]]
        name = "sub"
        tests_file = "lists/sub.txt"
        "#,
    );
    write(root, "lists/sub.txt", "# two tests\n/css/a.html\n\n/css/sub.html\n");

    MetricsPaths {
        results,
        runs: root.join("runs.json"),
    }
}

fn window(channel: Channel) -> Window {
    Window {
        from: date("2023-01-01"),
        to: date("2023-02-01"),
        channel,
    }
}

#[test]
fn config_merges_tests_file() {
    let tmp = tempfile::tempdir().unwrap();
    fixture(tmp.path());
    let config = MetricsConfig::load(&tmp.path().join("metrics.toml")).unwrap();
    assert_eq!(config.categories[0].tests, ["/css/a.html", "/css/sub.html"]);
    assert!(config.categories[0].tests_file.is_none());
}

#[test]
fn bad_ranges_are_skipped_before_import() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = fixture(tmp.path());
    let config = MetricsConfig::load(&tmp.path().join("metrics.toml")).unwrap();

    let loaded = load_runs(&config, &paths, window(Channel::Stable)).unwrap();
    let dates: Vec<_> = loaded.dates.iter().map(|d| d.date).collect();
    assert_eq!(dates, [date("2023-01-01"), date("2023-01-02")]);
    // Runs are in sorted product order regardless of manifest order.
    assert_eq!(loaded.dates[1].runs[0].browser_name, "chrome");
    assert_eq!(loaded.dates[1].version("firefox"), "91");

    // No experimental bad ranges: the unfetched runs are reported.
    let err = load_runs(&config, &paths, window(Channel::Experimental)).err();
    assert!(
        matches!(&err, Some(MetricsError::MissingRuns { run_ids }) if run_ids == &[5, 6]),
        "{err:?}"
    );
}

#[test]
fn browser_specific_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = fixture(tmp.path());
    let config = MetricsConfig::load(&tmp.path().join("metrics.toml")).unwrap();
    let loaded = load_runs(&config, &paths, window(Channel::Stable)).unwrap();

    let report = browser_specific_series(&config, &loaded, None).unwrap();
    assert_eq!(
        report.render(),
        "sha,date,chrome-version,chrome,firefox-version,firefox\n\
         0123456789abcdef,2023-01-01,100,0,90,1.5\n\
         fedcba9876543210,2023-01-02,101,1,91,0\n"
    );
}

#[test]
fn baseline_pins_the_test_set() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = fixture(tmp.path());
    let config = MetricsConfig::load(&tmp.path().join("metrics.toml")).unwrap();
    let loaded = load_runs(&config, &paths, window(Channel::Stable)).unwrap();

    let report = browser_specific_series(&config, &loaded, Some(date("2023-01-01"))).unwrap();
    // new.html did not exist on the baseline date.
    assert_eq!(report.rows[1], ["fedcba9876543210", "2023-01-02", "101", "0", "91", "0"]);

    let missing = browser_specific_series(&config, &loaded, Some(date("2022-12-31")));
    assert!(matches!(missing, Err(MetricsError::BaselineNotFound { .. })));
}

#[test]
fn interop_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = fixture(tmp.path());
    let config = MetricsConfig::load(&tmp.path().join("metrics.toml")).unwrap();
    let loaded = load_runs(&config, &paths, window(Channel::Stable)).unwrap();

    let report = interop_series(&config, &loaded).unwrap();
    assert_eq!(
        report.render(),
        "date,chrome-version,chrome-sub,firefox-version,firefox-sub,interop-version,interop-sub\n\
         2023-01-01,100,1000,90,250,-,250\n\
         2023-01-02,101,1000,91,1000,-,1000\n"
    );

    let bare = MetricsConfig {
        categories: Vec::new(),
        ..config
    };
    assert!(matches!(
        interop_series(&bare, &loaded),
        Err(MetricsError::NoCategories)
    ));
}

#[test]
fn trends_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = fixture(tmp.path());
    let config = MetricsConfig::load(&tmp.path().join("metrics.toml")).unwrap();
    let loaded = load_runs(&config, &paths, window(Channel::Stable)).unwrap();

    let binary = trends_series(&config, &loaded, TrendMethod::Binary);
    assert_eq!(
        binary.render(),
        "date,sha,tests,chrome,firefox\n\
         2023-01-01,0123456789,3,2,0\n\
         2023-01-02,fedcba9876,4,2,3\n"
    );

    let interop = trends_series(&config, &loaded, TrendMethod::Interop);
    assert_eq!(interop.rows[0], ["2023-01-01", "0123456789", "3", "2", "0.5"]);
}

#[test]
fn repeated_product_on_a_date_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = fixture(tmp.path());
    let config = MetricsConfig::load(&tmp.path().join("metrics.toml")).unwrap();
    // Two chrome runs match the product count but leave firefox uncovered.
    write(
        tmp.path(),
        "runs.json",
        r#"[
        {"id": 1, "browser_name": "chrome", "browser_version": "100",
         "full_revision_hash": "0123456789abcdef", "time_start": "2023-01-01T01:00:00Z"},
        {"id": 3, "browser_name": "chrome", "browser_version": "101",
         "full_revision_hash": "0123456789abcdef", "time_start": "2023-01-01T05:00:00Z"}
    ]"#,
    );

    let err = load_runs(&config, &paths, window(Channel::Stable)).err();
    assert!(
        matches!(
            &err,
            Some(MetricsError::DuplicateProduct { product, run_ids, .. })
                if product == "chrome" && run_ids == &[1, 3]
        ),
        "{err:?}"
    );
}

#[test]
fn interop_rejects_run_sets_with_a_repeated_browser() {
    let tmp = tempfile::tempdir().unwrap();
    fixture(tmp.path());
    let config = MetricsConfig::load(&tmp.path().join("metrics.toml")).unwrap();

    let record = |id, browser: &str| RunRecord {
        id,
        browser_name: browser.to_string(),
        browser_version: "1".to_string(),
        full_revision_hash: "0123456789abcdef".to_string(),
        time_start: "2023-01-01T01:00:00Z".parse().unwrap(),
    };
    let pass = TreeBuilder::new().test("css/a.html", TestStatus::Pass).build();
    let fail = TreeBuilder::new().test("css/a.html", TestStatus::Fail).build();
    let loaded = LoadedRuns {
        dates: vec![DateRuns {
            date: date("2023-01-01"),
            records: vec![record(1, "chrome"), record(2, "chrome")],
            runs: vec![Run::new(1, "chrome", pass), Run::new(2, "chrome", fail)],
        }],
    };

    let err = interop_series(&config, &loaded).err();
    assert!(
        matches!(
            err.as_ref(),
            Some(MetricsError::Results(e))
                if matches!(e.innermost(), wpt_results::Error::DuplicateBrowser { .. })
        ),
        "{err:?}"
    );
}
