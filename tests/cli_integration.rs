//! CLI integration tests for todo
//!
//! These tests verify the complete workflow from initialization through
//! task management, ensuring commands work together correctly. Every
//! command runs with a fixed date so deadlines are reproducible.

use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const TODAY: &str = "03-01-2025";

/// Get a command instance for the todo binary, pinned to `today`
fn todo_at(dir: &Path, today: &str) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("todo"));
    cmd.current_dir(dir)
        .env("TODO_TODAY", today)
        .env_remove("RUST_LOG");
    cmd
}

fn todo_cmd(dir: &Path) -> assert_cmd::Command {
    todo_at(dir, TODAY)
}

/// Create a temporary directory and initialize a todo project
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    todo_cmd(dir.path()).arg("init").arg(dir.path()).assert().success();
    dir
}

fn json_output(cmd: &mut assert_cmd::Command) -> serde_json::Value {
    let output = cmd.arg("--format").arg("json").assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    serde_json::from_str(&stdout).unwrap()
}

/// Adds a task and returns its ID
fn add_task(dir: &Path, args: &[&str]) -> String {
    let json = json_output(todo_cmd(dir).args(["task", "add"]).args(args));
    json["id"].as_str().unwrap().to_string()
}

fn show_task(dir: &Path, id: &str) -> serde_json::Value {
    json_output(todo_cmd(dir).args(["task", "show", id]))
}

// =============================================================================
// Initialization Tests
// =============================================================================

#[test]
fn test_init_creates_structure() {
    let dir = TempDir::new().unwrap();

    todo_cmd(dir.path())
        .arg("init")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized todo project"));

    assert!(dir.path().join(".todo").is_dir());
    assert!(dir.path().join(".todo/config.toml").is_file());
    assert!(dir.path().join(".todo/tasks.jsonl").is_file());
    assert!(dir.path().join(".todo/blueprints.jsonl").is_file());
}

#[test]
fn test_init_is_idempotent() {
    let dir = setup_project();
    add_task(dir.path(), &["Keep me", "-c", "life"]);

    todo_cmd(dir.path()).arg("init").arg(dir.path()).assert().success();

    todo_cmd(dir.path())
        .args(["task", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Keep me"));
}

#[test]
fn test_commands_outside_project_fail() {
    let dir = TempDir::new().unwrap();

    todo_cmd(dir.path())
        .args(["task", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not in a todo project"));
}

// =============================================================================
// Task Tests
// =============================================================================

#[test]
fn test_task_add_applies_defaults() {
    let dir = setup_project();
    let id = add_task(dir.path(), &["Essay", "-c", "university"]);

    assert!(id.starts_with("t-"));
    let task = show_task(dir.path(), &id);
    assert_eq!(task["title"], "Essay");
    assert_eq!(task["category"], "University");
    assert_eq!(task["priority"], "parked");
    assert_eq!(task["status"], "todo");
    assert_eq!(task["created_on"], "03-01-2025");
    assert_eq!(task["deadline"], "03-08-2025");
}

#[test]
fn test_task_add_with_options() {
    let dir = setup_project();
    let id = add_task(
        dir.path(),
        &[
            "Tax return", "-c", "financial", "-p", "important", "-d", "04-15-2025", "-t", "paperwork",
            "--estimate", "3",
        ],
    );

    let task = show_task(dir.path(), &id);
    assert_eq!(task["priority"], "important");
    assert_eq!(task["deadline"], "04-15-2025");
    assert_eq!(task["tags"][0], "paperwork");
    assert_eq!(task["estimated_hours"], 3.0);
}

#[test]
fn test_task_add_rejects_past_deadline() {
    let dir = setup_project();

    todo_cmd(dir.path())
        .args(["task", "add", "Late", "-c", "life", "-d", "02-01-2025"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("before today"));
}

#[test]
fn test_task_add_rejects_unknown_category() {
    let dir = setup_project();

    todo_cmd(dir.path())
        .args(["task", "add", "Jam", "-c", "hobby"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid category"));
}

#[test]
fn test_tag_cannot_reuse_category_name() {
    let dir = setup_project();
    let id = add_task(dir.path(), &["Run", "-c", "sport"]);

    todo_cmd(dir.path())
        .args(["task", "tag", &id, "work"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid tag"));
}

#[test]
fn test_select_task_by_title() {
    let dir = setup_project();
    add_task(dir.path(), &["Laundry", "-c", "room"]);

    todo_cmd(dir.path())
        .args(["task", "start", "Laundry"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Started task"));
}

#[test]
fn test_duplicate_titles_are_ambiguous() {
    let dir = setup_project();
    add_task(dir.path(), &["Twin", "-c", "life"]);
    add_task(dir.path(), &["Twin", "-c", "life"]);

    todo_cmd(dir.path())
        .args(["task", "done", "Twin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("use an ID instead"));
}

#[test]
fn test_list_sorts_by_deadline_then_priority() {
    let dir = setup_project();
    add_task(dir.path(), &["Later", "-c", "life", "--due-in", "5"]);
    add_task(dir.path(), &["Soon low", "-c", "life", "--due-in", "2", "-p", "optional"]);
    add_task(dir.path(), &["Soon high", "-c", "life", "--due-in", "2", "-p", "essential"]);

    let json = json_output(todo_cmd(dir.path()).args(["task", "list"]));
    let titles: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();

    assert_eq!(titles, ["Soon high", "Soon low", "Later"]);
}

#[test]
fn test_edit_updates_attributes() {
    let dir = setup_project();
    let id = add_task(dir.path(), &["Draft", "-c", "work"]);

    todo_cmd(dir.path())
        .args(["task", "edit", &id, "priority=blocking", "title=Final draft"])
        .assert()
        .success();

    let task = show_task(dir.path(), &id);
    assert_eq!(task["priority"], "blocking");
    assert_eq!(task["title"], "Final draft");
}

#[test]
fn test_edit_rejects_unknown_attribute() {
    let dir = setup_project();
    let id = add_task(dir.path(), &["Draft", "-c", "work"]);

    todo_cmd(dir.path())
        .args(["task", "edit", &id, "owner=me"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown attribute 'owner'"));
}

#[test]
fn test_extend_moves_deadline() {
    let dir = setup_project();
    let id = add_task(dir.path(), &["Report", "-c", "work", "-d", "03-10-2025"]);

    todo_cmd(dir.path())
        .args(["task", "extend", &id, "-3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("03-07-2025"));
}

// =============================================================================
// Dependency Tests
// =============================================================================

#[test]
fn test_blocked_task_cannot_be_completed() {
    let dir = setup_project();
    let parent = add_task(dir.path(), &["Write paper", "-c", "university"]);
    let child = add_task(dir.path(), &["Read sources", "-c", "university"]);

    todo_cmd(dir.path())
        .args(["task", "dep", &parent, &child])
        .assert()
        .success()
        .stdout(predicate::str::contains("now depends on"));

    todo_cmd(dir.path())
        .args(["task", "done", &parent])
        .assert()
        .failure()
        .stderr(predicate::str::contains("blocked by"));

    todo_cmd(dir.path()).args(["task", "done", &child]).assert().success();
    todo_cmd(dir.path()).args(["task", "done", &parent]).assert().success();

    assert_eq!(show_task(dir.path(), &parent)["status"], "done");
}

#[test]
fn test_project_completes_with_its_subtasks() {
    let dir = setup_project();
    let project = add_task(dir.path(), &["Move flat", "-c", "room", "--project"]);
    let pack = add_task(dir.path(), &["Pack", "-c", "room", "--parent", &project]);
    let clean = add_task(dir.path(), &["Clean", "-c", "room", "--parent", &project]);

    todo_cmd(dir.path())
        .args(["task", "done", &pack, "--hours", "2"])
        .assert()
        .success();
    assert_eq!(show_task(dir.path(), &project)["status"], "todo");

    todo_cmd(dir.path())
        .args(["task", "done", &clean, "--hours", "1.5"])
        .assert()
        .success();

    let json = show_task(dir.path(), &project);
    assert_eq!(json["status"], "done");
    assert_eq!(json["actual_hours"], 3.5);
    assert_eq!(json["completed_on"], TODAY);

    // Reopening a subtask reopens the project
    todo_cmd(dir.path()).args(["task", "undo", &pack]).assert().success();
    assert_eq!(show_task(dir.path(), &project)["status"], "todo");
}

#[test]
fn test_start_reopens_done_dependants() {
    let dir = setup_project();
    let project = add_task(dir.path(), &["Trip", "-c", "life", "--project"]);
    let book = add_task(dir.path(), &["Book", "-c", "life", "--parent", &project]);
    todo_cmd(dir.path()).args(["task", "done", &book]).assert().success();
    assert_eq!(show_task(dir.path(), &project)["status"], "done");

    todo_cmd(dir.path()).args(["task", "start", &book]).assert().success();

    assert_eq!(show_task(dir.path(), &book)["status"], "in_progress");
    assert_eq!(show_task(dir.path(), &project)["status"], "todo");
}

#[test]
fn test_settled_project_cannot_be_reopened() {
    let dir = setup_project();
    let project = add_task(dir.path(), &["Trip", "-c", "life", "--project"]);
    let book = add_task(dir.path(), &["Book", "-c", "life", "--parent", &project]);
    todo_cmd(dir.path()).args(["task", "done", &book]).assert().success();

    for command in ["undo", "start"] {
        todo_cmd(dir.path())
            .args(["task", command, &project])
            .assert()
            .failure()
            .stderr(predicate::str::contains("reopen one of them instead"));
    }
    assert_eq!(show_task(dir.path(), &project)["status"], "done");
}

#[test]
fn test_invalid_hours_are_rejected() {
    let dir = setup_project();
    let id = add_task(dir.path(), &["Run", "-c", "sport"]);

    todo_cmd(dir.path())
        .args(["task", "done", &id, "--hours=-5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hours must be non-negative"));
    todo_cmd(dir.path())
        .args(["task", "done", &id, "--hours", "NaN"])
        .assert()
        .failure();
    assert_eq!(show_task(dir.path(), &id)["status"], "todo");

    todo_cmd(dir.path())
        .args(["task", "add", "Swim", "-c", "sport", "--estimate=-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hours must be non-negative"));
}

#[test]
fn test_cycle_is_rejected() {
    let dir = setup_project();
    let a = add_task(dir.path(), &["A", "-c", "life"]);
    let b = add_task(dir.path(), &["B", "-c", "life"]);

    todo_cmd(dir.path()).args(["task", "dep", &a, &b]).assert().success();

    todo_cmd(dir.path())
        .args(["task", "dep", &b, &a])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cycle"));

    todo_cmd(dir.path())
        .args(["task", "dep", &a, &a])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Self-dependency"));
}

#[test]
fn test_task_has_at_most_one_dependant() {
    let dir = setup_project();
    let a = add_task(dir.path(), &["A", "-c", "life"]);
    let b = add_task(dir.path(), &["B", "-c", "life"]);
    let c = add_task(dir.path(), &["C", "-c", "life"]);

    todo_cmd(dir.path()).args(["task", "dep", &a, &c]).assert().success();

    todo_cmd(dir.path())
        .args(["task", "dep", &b, &c])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already belongs to"));

    // Re-adding the same edge is fine
    todo_cmd(dir.path())
        .args(["task", "dep", &a, &c])
        .assert()
        .success()
        .stdout(predicate::str::contains("already depends on"));
}

#[test]
fn test_undep_completes_waiting_project() {
    let dir = setup_project();
    let project = add_task(dir.path(), &["Garden", "-c", "life", "--project"]);
    let weed = add_task(dir.path(), &["Weed", "-c", "life", "--parent", &project]);

    todo_cmd(dir.path())
        .args(["task", "undep", &project, &weed])
        .assert()
        .success();

    assert_eq!(show_task(dir.path(), &project)["status"], "done");
    assert_eq!(show_task(dir.path(), &weed)["dependants"], serde_json::Value::Null);
}

#[test]
fn test_removing_project_removes_subtree() {
    let dir = setup_project();
    let project = add_task(dir.path(), &["Thesis", "-c", "university", "--project"]);
    let chapter = add_task(
        dir.path(),
        &["Chapter", "-c", "university", "--project", "--parent", &project],
    );
    add_task(dir.path(), &["Section", "-c", "university", "--parent", &chapter]);
    add_task(dir.path(), &["Unrelated", "-c", "university"]);

    let json = json_output(todo_cmd(dir.path()).args(["task", "rm", &project]));
    assert_eq!(json["removed"].as_array().unwrap().len(), 3);

    let list = json_output(todo_cmd(dir.path()).args(["task", "list"]));
    let tasks = list.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "Unrelated");
}

#[test]
fn test_tree_shows_nested_dependencies() {
    let dir = setup_project();
    let project = add_task(dir.path(), &["Album", "-c", "band", "--project"]);
    add_task(dir.path(), &["Record", "-c", "band", "--parent", &project]);

    todo_cmd(dir.path())
        .args(["task", "tree", &project])
        .assert()
        .success()
        .stdout(predicate::str::contains("Album"))
        .stdout(predicate::str::contains("  t-"))
        .stdout(predicate::str::contains("Record"));
}

// =============================================================================
// Query Tests
// =============================================================================

#[test]
fn test_ready_lists_unblocked_open_tasks() {
    let dir = setup_project();
    let parent = add_task(dir.path(), &["Cook", "-c", "life"]);
    let child = add_task(dir.path(), &["Shop", "-c", "life"]);
    todo_cmd(dir.path()).args(["task", "dep", &parent, &child]).assert().success();

    todo_cmd(dir.path())
        .arg("ready")
        .assert()
        .success()
        .stdout(predicate::str::contains("Shop"))
        .stdout(predicate::str::contains("Cook").not());
}

#[test]
fn test_overdue_and_upcoming() {
    let dir = setup_project();
    add_task(dir.path(), &["Due soon", "-c", "work", "--due-in", "2"]);
    add_task(dir.path(), &["Due later", "-c", "work", "--due-in", "20"]);

    todo_cmd(dir.path())
        .arg("upcoming")
        .assert()
        .success()
        .stdout(predicate::str::contains("Due soon"))
        .stdout(predicate::str::contains("Due later").not());

    todo_at(dir.path(), "03-05-2025")
        .arg("overdue")
        .assert()
        .success()
        .stdout(predicate::str::contains("Due soon"));
}

#[test]
fn test_status_reports_counts() {
    let dir = setup_project();
    let a = add_task(dir.path(), &["A", "-c", "life", "-t", "chores"]);
    add_task(dir.path(), &["B", "-c", "life"]);
    todo_cmd(dir.path()).args(["task", "done", &a]).assert().success();

    let json = json_output(todo_cmd(dir.path()).arg("status"));
    assert_eq!(json["tasks"]["overall"], 2);
    assert_eq!(json["tasks"]["done"], 1);
    assert_eq!(json["tasks"]["completion_ratio"], 0.5);

    let json = json_output(todo_cmd(dir.path()).args(["status", "--search", "chores"]));
    assert_eq!(json["average_completion_days"], 0.0);
}

// =============================================================================
// Escalation Tests
// =============================================================================

#[test]
fn test_refresh_escalates_near_deadlines() {
    let dir = setup_project();
    let id = add_task(dir.path(), &["Invoice", "-c", "work", "-p", "moderate", "--due-in", "2"]);

    todo_cmd(dir.path()).arg("refresh").assert().success();
    assert_eq!(show_task(dir.path(), &id)["priority"], "important");

    // Each threshold fires once
    todo_cmd(dir.path()).arg("refresh").assert().success();
    assert_eq!(show_task(dir.path(), &id)["priority"], "important");

    todo_at(dir.path(), "03-02-2025").arg("refresh").assert().success();
    assert_eq!(show_task(dir.path(), &id)["priority"], "essential");
}

// =============================================================================
// Blueprint Tests
// =============================================================================

#[test]
fn test_blueprint_generates_due_occurrences() {
    let dir = setup_project();

    todo_at(dir.path(), "03-21-2025")
        .args([
            "blueprint", "add", "Sheet {n}", "-c", "university", "--every", "7", "--start",
            "03-01-2025", "--subtask", "Solve@-1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created blueprint"));

    let list = json_output(todo_at(dir.path(), "03-21-2025").args(["task", "list", "--roots"]));
    let titles: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Sheet 1", "Sheet 2"]);
    assert_eq!(list[0]["deadline"], "03-15-2025");
    assert_eq!(list[0]["is_project"], true);

    // Nothing new until the next occurrence
    let run = json_output(todo_at(dir.path(), "03-21-2025").args(["blueprint", "run"]));
    assert!(run["generated"].as_array().unwrap().is_empty());

    let run = json_output(todo_at(dir.path(), "03-22-2025").args(["blueprint", "run"]));
    assert_eq!(run["generated"].as_array().unwrap().len(), 1);
}

#[test]
fn test_stopped_blueprint_generates_nothing() {
    let dir = setup_project();
    let json = json_output(todo_cmd(dir.path()).args([
        "blueprint", "add", "Rent", "-c", "financial", "--every", "30",
    ]));
    let id = json["id"].as_str().unwrap().to_string();

    todo_cmd(dir.path())
        .args(["blueprint", "stop", &id])
        .assert()
        .success();

    let run = json_output(todo_at(dir.path(), "06-01-2025").args(["blueprint", "run"]));
    assert!(run["generated"].as_array().unwrap().is_empty());

    todo_cmd(dir.path())
        .args(["blueprint", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stopped"));
}

#[test]
fn test_blueprint_import_from_yaml() {
    let dir = setup_project();
    let file = dir.path().join("blueprints.yaml");
    fs::write(
        &file,
        r#"blueprints:
  - title_pattern: "Practice {n}"
    category: Band
    interval_days: 3
    start_date: "03-01-2025"
    priority: important
    subtasks:
      - title: Scales
        offset_days: 0
  - title_pattern: Budget review
    category: Financial
    interval_days: 30
    start_date: "03-01-2025"
"#,
    )
    .unwrap();

    todo_cmd(dir.path())
        .args(["blueprint", "import"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported blueprint"));

    let list = json_output(todo_cmd(dir.path()).args(["blueprint", "list"]));
    assert_eq!(list.as_array().unwrap().len(), 2);
    assert_eq!(list[0]["next_occurrence"], "03-04-2025");
}

// =============================================================================
// Integrity Tests
// =============================================================================

#[test]
fn test_check_repairs_one_sided_edges() {
    let dir = setup_project();
    fs::write(
        dir.path().join(".todo/tasks.jsonl"),
        concat!(
            r#"{"id":"t-0000000a","title":"Parent","category":"Life","created_on":"03-01-2025","deadline":"03-10-2025","dependencies":[{"id":"t-0000000b","title":"Child"}]}"#,
            "\n",
            r#"{"id":"t-0000000b","title":"Child","category":"Life","created_on":"03-01-2025","deadline":"03-10-2025"}"#,
            "\n",
        ),
    )
    .unwrap();

    todo_cmd(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("t-0000000a"));

    todo_cmd(dir.path()).args(["check", "--fix"]).assert().success();

    todo_cmd(dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("consistent"));

    let child = show_task(dir.path(), "t-0000000b");
    assert_eq!(child["dependants"][0]["title"], "Parent");
}

#[test]
fn test_check_on_clean_project() {
    let dir = setup_project();
    add_task(dir.path(), &["Stretch", "-c", "sport"]);

    todo_cmd(dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("consistent (1 tasks)"));
}

#[test]
fn test_check_reports_dropped_tags() {
    let dir = setup_project();
    fs::write(
        dir.path().join(".todo/tasks.jsonl"),
        concat!(
            r#"{"id":"t-0000000c","title":"Rehearse","category":"Life","created_on":"03-01-2025","deadline":"03-10-2025","tags":["Band","evening"]}"#,
            "\n",
        ),
    )
    .unwrap();

    todo_cmd(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("dropped value: t-0000000c"));

    todo_cmd(dir.path()).args(["check", "--fix"]).assert().success();

    let task = show_task(dir.path(), "t-0000000c");
    assert_eq!(task["tags"], serde_json::json!(["evening"]));
    todo_cmd(dir.path()).arg("check").assert().success();
}
