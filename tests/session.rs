mod common;

use std::{cell::RefCell, fs, rc::Rc};

use common::{EMPLOYEES_CSV, TestWorkspace};
use sqlite_chat::{
    activity::{ActivityLevel, ActivityLog, parse_line},
    assistant::SqlGenerator,
    conflict::FixedResolution,
    error::{ChatError, Result},
    ingest::{IngestRequest, ingest},
    session::{SessionContext, run_session},
};

type Calls = Rc<RefCell<Vec<(String, Vec<String>, String)>>>;

struct CannedGenerator {
    reply: std::result::Result<String, String>,
    calls: Calls,
}

impl SqlGenerator for CannedGenerator {
    fn generate_sql(&self, table: &str, columns: &[String], request: &str) -> Result<String> {
        self.calls
            .borrow_mut()
            .push((table.to_string(), columns.to_vec(), request.to_string()));
        self.reply.clone().map_err(ChatError::Generation)
    }
}

fn open_context(workspace: &TestWorkspace) -> SessionContext {
    let activity = ActivityLog::open(&workspace.log_path()).expect("activity log");
    SessionContext::new(workspace.open_store(), activity)
}

fn drive(ctx: &mut SessionContext, script: &str) -> String {
    let mut output = Vec::new();
    run_session(ctx, script.as_bytes(), &mut output).expect("session");
    String::from_utf8(output).expect("utf8 output")
}

fn activity_lines(workspace: &TestWorkspace) -> Vec<(ActivityLevel, String)> {
    fs::read_to_string(workspace.log_path())
        .expect("read activity log")
        .lines()
        .map(|line| {
            let (level, message) = parse_line(line).expect("well-formed activity line");
            (level, message.to_string())
        })
        .collect()
}

fn seed_employees(workspace: &TestWorkspace) -> std::path::PathBuf {
    let path = workspace.write("employees.csv", EMPLOYEES_CSV);
    let mut store = workspace.open_store();
    ingest(
        &mut store,
        &IngestRequest::new(&path, "employees"),
        &mut FixedResolution(None),
    )
    .expect("seed");
    store.close().expect("close seed store");
    path
}

#[test]
fn load_list_query_and_exit() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("employees.csv", EMPLOYEES_CSV);
    let mut ctx = open_context(&workspace);
    let script = format!(
        "1\n{}\nemployees\n2\n3\nSELECT name, salary FROM employees ORDER BY id\n4\n",
        path.display()
    );

    let output = drive(&mut ctx, &script);
    ctx.close().expect("close");

    assert!(output.contains("Data inserted into table 'employees' (3 row(s))."));
    assert!(output.contains("Tables in the database:\n- employees\n"));
    assert!(output.contains("name  salary"));
    assert!(output.contains("Cy    72500.25"));
    assert!(output.contains("Goodbye!"));

    let lines = activity_lines(&workspace);
    assert!(lines.iter().all(|(level, _)| *level == ActivityLevel::Info));
    assert!(lines.iter().any(|(_, m)| m == "User listed tables in the database."));
    assert!(lines.iter().any(|(_, m)| m.starts_with("Executed SQL query: SELECT name")));
    assert_eq!(
        lines.last().map(|(_, m)| m.as_str()),
        Some("SQLite connection closed.")
    );
}

#[test]
fn errors_are_reported_and_session_continues() {
    let workspace = TestWorkspace::new();
    let mut ctx = open_context(&workspace);
    let missing = workspace.path().join("missing.csv");
    let script = format!(
        "9\n3\nSELEC nonsense\n1\n{}\nt\n2\n4\n",
        missing.display()
    );

    let output = drive(&mut ctx, &script);

    assert!(output.contains("Invalid choice. Please enter a valid number (1-4)."));
    assert!(output.contains("Error: Store error:"));
    assert!(output.contains("Error: Failed to load CSV file"));
    assert!(output.contains("No tables found."));
    assert!(output.contains("Goodbye!"));
    let errors = activity_lines(&workspace)
        .into_iter()
        .filter(|(level, _)| *level == ActivityLevel::Error)
        .count();
    assert_eq!(errors, 2);
}

#[test]
fn conflict_rename_keeps_original_table() {
    let workspace = TestWorkspace::new();
    let path = seed_employees(&workspace);
    let mut ctx = open_context(&workspace);
    let script = format!("1\n{}\nemployees\n2\nv2\n2\n4\n", path.display());

    let output = drive(&mut ctx, &script);

    assert!(output.contains("Table 'employees' already exists with the same columns."));
    assert!(output.contains("Data inserted into table 'employees_v2' (3 row(s))."));
    assert!(output.contains("- employees\n- employees_v2\n"));
    assert_eq!(ctx.store.count_rows("employees").expect("count"), 3);
}

#[test]
fn unrecognized_conflict_answer_aborts() {
    let workspace = TestWorkspace::new();
    let path = seed_employees(&workspace);
    let mut ctx = open_context(&workspace);
    let script = format!("1\n{}\nemployees\nmaybe\n4\n", path.display());

    let output = drive(&mut ctx, &script);

    assert!(output.contains("Ingestion into 'employees' cancelled (abort); no changes were made."));
    assert_eq!(ctx.store.list_tables().expect("tables"), vec!["employees"]);
}

#[test]
fn skip_answer_leaves_store_untouched() {
    let workspace = TestWorkspace::new();
    let path = seed_employees(&workspace);
    let mut ctx = open_context(&workspace);
    let script = format!("1\n{}\nemployees\nskip\n4\n", path.display());

    let output = drive(&mut ctx, &script);

    assert!(output.contains("cancelled (skip)"));
    assert_eq!(ctx.store.count_rows("employees").expect("count"), 3);
}

#[test]
fn assistant_generates_and_runs_query() {
    let workspace = TestWorkspace::new();
    seed_employees(&workspace);
    let calls: Calls = Rc::default();
    let generator = CannedGenerator {
        reply: Ok("SELECT COUNT(*) AS headcount FROM employees".to_string()),
        calls: Rc::clone(&calls),
    };
    let mut ctx = open_context(&workspace).with_generator(Box::new(generator));

    let output = drive(&mut ctx, "3\n2\nemployees\nhow many people work here\n4\n");

    assert!(output.contains("3. Run an SQL query or ask the assistant to write one"));
    assert!(output.contains("Generated SQL query:\nSELECT COUNT(*) AS headcount FROM employees"));
    assert!(output.contains("headcount\n---------\n3\n"));
    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "employees");
    assert_eq!(calls[0].1, vec!["id", "name", "salary"]);
    assert_eq!(calls[0].2, "how many people work here");
}

#[test]
fn generation_failures_do_not_end_the_session() {
    let workspace = TestWorkspace::new();
    seed_employees(&workspace);
    let generator = CannedGenerator {
        reply: Err("network unreachable".to_string()),
        calls: Rc::default(),
    };
    let mut ctx = open_context(&workspace).with_generator(Box::new(generator));

    let output = drive(&mut ctx, "3\n2\nemployees\nanything\n3\n2\nnope\nanything\n4\n");

    assert!(output.contains("Error: SQL generation failed: network unreachable"));
    assert!(output.contains("Error: Table 'nope' does not exist"));
    assert!(output.contains("Goodbye!"));
}

#[test]
fn end_of_input_ends_session_cleanly() {
    let workspace = TestWorkspace::new();
    let mut ctx = open_context(&workspace);

    let output = drive(&mut ctx, "2\n1\n");
    ctx.close().expect("close");

    assert!(output.contains("No tables found."));
    assert!(!output.contains("Goodbye!"));
    let lines = activity_lines(&workspace);
    assert!(lines.iter().any(|(_, m)| m == "Input closed; ending session."));
    assert_eq!(
        lines.last().map(|(_, m)| m.as_str()),
        Some("SQLite connection closed.")
    );
}
