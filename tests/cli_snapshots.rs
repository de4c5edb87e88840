use assert_cmd::Command;
use assert_cmd::assert::Assert;
use predicates::prelude::*;
use serde_json::Value;

fn expenses() -> Command {
    let tmp_home = tempfile::tempdir().unwrap();
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("expenses"));
    cmd.env("HOME", tmp_home.path());
    cmd.env_remove("EXPENSES_TOKEN");
    cmd.env_remove("EXPENSES_TOKEN_FILE");
    cmd.env_remove("EXPENSES_LOG");
    cmd.env("EXPENSES_FIXTURES_DIR", "tests/fixtures/api");
    cmd.env("EXPENSES_USER_ID", "1");
    cmd
}

fn stdout_of(assert: Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

fn run(args: &[&str]) -> String {
    stdout_of(expenses().args(args).assert().success())
}

fn run_json(args: &[&str]) -> Value {
    let mut full = vec!["--output", "json"];
    full.extend_from_slice(args);
    serde_json::from_str(&run(&full)).unwrap()
}

fn ids(items: &Value) -> Vec<&str> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect()
}

#[test]
fn categories_tree_text() {
    insta::assert_snapshot!(run(&["categories", "tree"]), @r"
    Food (1)
      Groceries (2)
        Produce (3)
    Rent (4)
    Orphan (5)
    Loop A (6)
    Loop B (7)
    ");
}

#[test]
fn categories_tree_sorted_by_name() {
    insta::assert_snapshot!(run(&["categories", "tree", "--sort", "name"]), @r"
    Food (1)
      Groceries (2)
        Produce (3)
    Loop A (6)
    Loop B (7)
    Orphan (5)
    Rent (4)
    ");
}

#[test]
fn categories_tree_reports_structural_issues_on_stderr() {
    expenses()
        .args(["categories", "tree"])
        .assert()
        .success()
        .stderr(
            predicate::str::contains("category 5 points at missing parent 99")
                .and(predicate::str::contains("category 6 is part of a parent cycle"))
                .and(predicate::str::contains("category 7 is part of a parent cycle")),
        );
}

#[test]
fn categories_tree_json_lists_nodes_in_tree_order() {
    let entries = run_json(&["categories", "tree"]);
    assert_eq!(ids(&entries), ["1", "2", "3", "4", "5", "6", "7"]);
    assert_eq!(entries[0]["children"], serde_json::json!(["2"]));
    let produce = &entries[2];
    assert_eq!(produce["name"], "Produce");
    assert_eq!(produce["parent_id"], "2");
    assert_eq!(produce["depth"], 2);
    assert_eq!(entries[4]["children"], serde_json::json!([]));
}

#[test]
fn categories_list_filters_by_name() {
    let rows = run_json(&["categories", "list", "--name-contains", "loop"]);
    assert_eq!(ids(&rows), ["6", "7"]);
}

#[test]
fn categories_show_includes_hierarchy() {
    let out = run(&["--color", "never", "categories", "show", "2"]);
    assert!(out.contains("Groceries"));
    assert!(out.contains("Food"));
    assert!(out.contains("Produce"));
}

#[test]
fn categories_parents_excludes_own_subtree() {
    let rows = run_json(&["categories", "parents", "1"]);
    assert_eq!(ids(&rows), ["4", "5", "6", "7"]);

    let rows = run_json(&["categories", "parents", "3"]);
    assert_eq!(ids(&rows), ["1", "2", "4", "5", "6", "7"]);
}

#[test]
fn categories_show_unknown_id_fails() {
    expenses()
        .args(["categories", "show", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("category not found"));
}

#[test]
fn transactions_list_applies_filters() {
    let items = run_json(&["transactions", "list", "--name", "coffee"]);
    assert_eq!(ids(&items), ["103", "107"]);

    let items = run_json(&["transactions", "list", "--min", "20", "--max", "70"]);
    assert_eq!(ids(&items), ["101", "102", "103"]);

    let items = run_json(&[
        "transactions",
        "list",
        "--from",
        "09-01-2025",
        "--to",
        "2025-09-10",
        "--category-id",
        "4",
    ]);
    assert_eq!(ids(&items), ["104"]);
}

#[test]
fn transactions_list_table_shows_sentinel_category() {
    let out = run(&["--color", "never", "transactions", "list", "--name", "parking"]);
    assert!(out.contains("Parking"));
    assert!(out.contains("Uncategorized"));
    assert!(out.contains("$15.00"));
}

#[test]
fn transactions_watch_renders_latest_filter_state() {
    let out = stdout_of(
        expenses()
            .args(["--output", "json", "transactions", "watch", "--debounce-ms", "200"])
            .write_stdin("name coffee\nbogus line\nmin 10\n")
            .assert()
            .success()
            .stderr(predicate::str::contains("unknown filter field `bogus`")),
    );
    let last = out.lines().last().unwrap();
    let items: Value = serde_json::from_str(last).unwrap();
    assert_eq!(ids(&items), ["103"]);
}

#[test]
fn transactions_watch_keeps_every_edit_from_a_large_burst() {
    let mut input = String::from("category 1\n");
    for _ in 0..3000 {
        input.push_str("name e\n");
    }
    let out = stdout_of(
        expenses()
            .args(["--output", "json", "transactions", "watch", "--debounce-ms", "50"])
            .write_stdin(input)
            .assert()
            .success(),
    );
    let items: Value = serde_json::from_str(out.lines().last().unwrap()).unwrap();
    assert_eq!(ids(&items), ["102", "103", "107"]);
}

#[test]
fn transactions_watch_starts_from_flag_filters() {
    let out = stdout_of(
        expenses()
            .args([
                "--output",
                "json",
                "transactions",
                "watch",
                "--debounce-ms",
                "0",
                "--category-id",
                "4",
            ])
            .write_stdin("")
            .assert()
            .success(),
    );
    let items: Value = serde_json::from_str(out.lines().last().unwrap()).unwrap();
    assert_eq!(ids(&items), ["104", "106"]);
}

#[test]
fn report_show_json() {
    let report = run_json(&["report", "show", "--month", "9", "--year", "2025"]);
    assert_eq!(report["period"]["month"], 9);
    assert_eq!(report["topCategory"], "Rent");
    let labels: Vec<&str> = report["buckets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["categoryLabel"].as_str().unwrap())
        .collect();
    assert_eq!(labels, ["Food", "Groceries", "Rent", "Uncategorized"]);
}

#[test]
fn report_show_table_has_shares() {
    let out = run(&["--color", "never", "report", "show", "--month", "9", "--year", "2025"]);
    assert!(out.contains("23.3%"));
    assert!(out.contains("$285.00"));
}

#[test]
fn report_drill_matching_bucket_has_no_warning() {
    let assert = expenses()
        .args(["--output", "json", "report", "drill", "Food", "--month", "9", "--year", "2025"])
        .assert()
        .success()
        .stderr(predicate::str::contains("figures may be out of date").not());
    let drill: Value = serde_json::from_str(&stdout_of(assert)).unwrap();
    assert_eq!(ids(&drill["records"]), ["102", "103"]);
    assert!(drill["warning"].is_null());
}

#[test]
fn report_drill_mismatch_is_flagged_but_shown() {
    let assert = expenses()
        .args(["--output", "json", "report", "drill", "Rent", "--month", "9", "--year", "2025"])
        .assert()
        .success()
        .stderr(predicate::str::contains("figures may be out of date"));
    let drill: Value = serde_json::from_str(&stdout_of(assert)).unwrap();
    assert_eq!(ids(&drill["records"]), ["104"]);
    assert_eq!(drill["warning"]["label"], "Rent");
}

#[test]
fn report_drill_uncategorized_bucket() {
    let drill = run_json(&[
        "report",
        "drill",
        "Uncategorized",
        "--month",
        "9",
        "--year",
        "2025",
    ]);
    assert_eq!(ids(&drill["records"]), ["105"]);
}

#[test]
fn report_drill_unknown_bucket_fails() {
    expenses()
        .args(["report", "drill", "Travel", "--month", "9", "--year", "2025"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no `Travel` bucket"));
}

#[test]
fn report_explore_switches_month_before_drilling() {
    expenses()
        .args(["--color", "never", "report", "explore", "--month", "9", "--year", "2025"])
        .write_stdin("month 8 2025\nRent\n")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("August rent")
                .and(predicate::str::contains("2025-08"))
                .and(predicate::str::contains("September rent").not()),
        )
        .stderr(predicate::str::contains("figures may be out of date").not());
}

#[test]
fn report_explore_reports_refused_selection_and_continues() {
    expenses()
        .args(["--color", "never", "report", "explore", "--month", "9", "--year", "2025"])
        .write_stdin("Travel\nRent\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("September rent"))
        .stderr(
            predicate::str::contains("no `Travel` bucket")
                .and(predicate::str::contains("figures may be out of date")),
        );
}

#[test]
fn report_explore_bare_month_shows_usage() {
    expenses()
        .args(["--color", "never", "report", "explore", "--month", "9", "--year", "2025"])
        .write_stdin("month\nRent\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("September rent"))
        .stderr(
            predicate::str::contains("usage: month <1-12> <yyyy>")
                .and(predicate::str::contains("no `month` bucket").not()),
        );
}

#[test]
fn budget_status_json_passes_server_figures_through() {
    let assert = expenses()
        .args(["--output", "json", "budget", "status", "--month", "9", "--year", "2025"])
        .assert()
        .success()
        .stderr(predicate::str::contains("budget limit").not());
    let status: Value = serde_json::from_str(&stdout_of(assert)).unwrap();
    assert_eq!(status["period"]["month"], 9);
    assert_eq!(status["nearLimit"], false);
    let remaining: f64 = status["remainingBudget"].as_str().unwrap().parse().unwrap();
    assert_eq!(remaining, 285.0);
}

#[test]
fn budget_status_table_without_a_period() {
    let out = run(&["--color", "never", "budget", "status"]);
    assert!(out.contains("current"));
    assert!(out.contains("$500.00"));
    assert!(out.contains("$285.00"));
}

#[test]
fn budget_categories_are_named_from_the_category_list() {
    let rows = run_json(&["budget", "categories"]);
    assert_eq!(ids(&rows), ["1", "2", "3"]);
    let names: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["category"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Food", "Rent", "Unknown"]);

    let out = run(&["--color", "never", "budget", "categories"]);
    assert!(out.contains("$800.00"));
}
