use chrono::{TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use peer_eval_forms::infrastructure::memory::{
    MemoryClassroom, MemoryForms, MemorySpreadsheet, MemoryStorage,
};
use peer_eval_forms::models::{
    Answer, CellValue, FormNotification, HorizontalAlignment, QuestionSpec, Status,
};
use peer_eval_forms::services::MemoryErrorLog;
use peer_eval_forms::{App, Backend, Config, GenerationSettings, SubmissionEvent};

type TestApp = App<MemorySpreadsheet, MemoryForms, MemoryClassroom, MemoryStorage, MemoryErrorLog>;

fn config(dir: &TempDir) -> Config {
    Config {
        context_secret: "test-secret".into(),
        handler_registry_file: dir.path().join("handlers.json").display().to_string(),
        defaults_file: dir.path().join("defaults.json").display().to_string(),
        acting_user: "teacher@school.edu".into(),
        ..Default::default()
    }
}

fn sheets() -> MemorySpreadsheet {
    MemorySpreadsheet::new("ss-1")
        .with_sheet("Roster")
        .with_column("Roster", "A2", &["Alice", "Bob", "Carol", "Dan"])
        .with_column("Roster", "B2", &["A", "A", "B", "B"])
}

fn classroom() -> MemoryClassroom {
    MemoryClassroom::new()
        .with_course("c-1", "Biology 101")
        .with_student("c-1", "Alice", "alice@school.edu")
        .with_student("c-1", "Bob", "bob@school.edu")
        .with_student("c-1", "Carol", "carol@school.edu")
        .with_student("c-1", "Dan", "dan@school.edu")
}

fn settings() -> GenerationSettings {
    GenerationSettings {
        sheet_name: "Roster".into(),
        names_range: "A2:A5".into(),
        group_names_range: "B2:B5".into(),
        evaluation_table_start_col: "E".into(),
        url_links_cell: "M1".into(),
        form_folder: "Peer Forms".into(),
        course_name: "Biology 101".into(),
        course_topic_name: "Peer Evaluations".into(),
        due_date: "2099-01-01".into(),
        due_time: "17:00:00".into(),
        utc_offset: "+0000".into(),
        form_title: "Peer Eval".into(),
        form_description: "Be honest.".into(),
        scale_lower_bound: 1,
        scale_upper_bound: 5,
        scale_lower_label: "Poor".into(),
        scale_upper_label: "Great".into(),
        assignment_title: "Peer Eval".into(),
        assignment_description: "Rate your group.".into(),
        assignment_points: 10,
        include_justification_in_table: true,
        include_feedback_in_table: true,
        ..Default::default()
    }
}

fn app_with(dir: &TempDir, sheets: MemorySpreadsheet, classroom: MemoryClassroom) -> TestApp {
    App::new(
        config(dir),
        Backend::new(sheets, MemoryForms::new(), classroom, MemoryStorage::new()),
        MemoryErrorLog::new(),
    )
}

/// 按表单题目顺序作答：打分题用 `scores`，文字题用 `texts`
fn answers_for(app: &TestApp, form_id: &str, scores: &[&str], texts: &[&str]) -> Vec<Answer> {
    let form = app.backend().forms.form(form_id).unwrap();
    let (mut s, mut t) = (scores.iter(), texts.iter());
    form.questions
        .iter()
        .map(|q| {
            let response = match q.spec {
                QuestionSpec::Scale { .. } => s.next().copied().unwrap_or("3"),
                QuestionSpec::Text { .. } => t.next().copied().unwrap_or(""),
            };
            Answer::new(q.item_id.clone(), q.spec.title(), response)
        })
        .collect()
}

/// 同一组作答，按 question id 索引，和 Forms API 返回的作答一样
fn responses_for(app: &TestApp, form_id: &str, scores: &[&str], texts: &[&str]) -> Vec<(String, String)> {
    let form = app.backend().forms.form(form_id).unwrap();
    answers_for(app, form_id, scores, texts)
        .into_iter()
        .zip(&form.questions)
        .map(|(answer, q)| (q.question_id.clone(), answer.response))
        .collect()
}

fn submitted_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 14, 9, 5, 0).unwrap()
}

fn event(form_id: &str, email: &str, answers: Vec<Answer>) -> SubmissionEvent {
    SubmissionEvent {
        form_id: form_id.into(),
        respondent_email: email.into(),
        answers,
        submitted_at: submitted_at(),
    }
}

fn form_for_group(app: &TestApp, group: &str) -> String {
    app.backend()
        .forms
        .forms()
        .into_iter()
        .find(|(_, f)| f.title == format!("Peer Eval - Group {group}"))
        .map(|(id, _)| id)
        .unwrap()
}

#[tokio::test]
async fn test_generate_creates_forms_table_and_assignments() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());

    let status = app.generate(&settings(), false).await;
    assert_eq!(status.status, Status::Success, "{}", status.message);
    assert!(status.message.contains("URLs written to M1."));

    let backend = app.backend();
    let forms = backend.forms.forms();
    assert_eq!(forms.len(), 2);
    // 两名组员各两道题，加一道反馈题
    assert_eq!(forms[0].1.questions.len(), 5);
    assert!(forms[0].1.description.starts_with("Form Data (do not edit): "));
    assert!(forms[0].1.description.contains("Group Members: Alice, Bob"));

    let urls = backend.sheets.get("Roster", "M1").display();
    assert_eq!(urls.lines().count(), 2);

    assert_eq!(backend.sheets.get("Roster", "E1"), CellValue::text("M1 Score"));
    assert_eq!(backend.sheets.get("Roster", "K1"), CellValue::text("Last Submitted"));
    assert!(backend.sheets.format("Roster", "E1").unwrap().bold);
    assert_eq!(
        backend.sheets.get("Roster", "I2"),
        CellValue::Formula("=IFERROR(AVERAGE(E2,G2), \"\")".into())
    );

    let assignments = backend.classroom.assignments();
    assert_eq!(assignments.len(), 2);
    assert_eq!(assignments[0].1.student_ids.len(), 2);
    assert_eq!(backend.storage.folders().len(), 1);
    assert_eq!(backend.classroom.topics("c-1").len(), 1);

    let handlers = app.list_handlers().await.unwrap();
    assert_eq!(handlers.len(), 2);
    assert_eq!(handlers[0].record.sheet, "Roster");
    assert_eq!(backend.forms.handlers().len(), 2);
}

#[tokio::test]
async fn test_submission_is_routed_into_peer_table() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());
    assert!(app.generate(&settings(), false).await.is_success());

    let form_id = form_for_group(&app, "A");
    let answers = answers_for(&app, &form_id, &["4", "5"], &["solid work", "did my part", "fun"]);
    app.route_submission(&event(&form_id, "bob@school.edu", answers)).await;

    // Bob 是 A 组第 2 人，分数写在 G 列，理由在 H 列
    let sheets = &app.backend().sheets;
    assert_eq!(sheets.get("Roster", "G2"), CellValue::Number(4.0));
    assert_eq!(sheets.get("Roster", "H2"), CellValue::text("solid work"));
    assert_eq!(sheets.get("Roster", "G3"), CellValue::Number(5.0));
    assert_eq!(sheets.get("Roster", "H3"), CellValue::text("did my part"));
    assert_eq!(sheets.get("Roster", "J3"), CellValue::text("fun"));
    assert!(!sheets.get("Roster", "K3").is_blank());
    assert_eq!(
        sheets.format("Roster", "K3").unwrap().horizontal_alignment,
        Some(HorizontalAlignment::Right)
    );
    assert!(app.error_log().entries().is_empty());
}

#[tokio::test]
async fn test_submission_from_other_group_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());
    assert!(app.generate(&settings(), false).await.is_success());
    let before = app.backend().sheets.filled_cells("Roster");

    let form_id = form_for_group(&app, "A");
    let answers = answers_for(&app, &form_id, &["4", "5"], &[]);
    app.route_submission(&event(&form_id, "carol@school.edu", answers)).await;

    assert_eq!(app.backend().sheets.filled_cells("Roster"), before);
    assert_eq!(app.error_log().with_category("Submission Info").len(), 1);
}

#[tokio::test]
async fn test_failed_cell_write_is_logged_and_others_continue() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());
    assert!(app.generate(&settings(), false).await.is_success());
    app.backend().sheets.fail_writes_at("Roster", "G2");

    let form_id = form_for_group(&app, "A");
    let answers = answers_for(&app, &form_id, &["4", "5"], &["a", "b", ""]);
    app.route_submission(&event(&form_id, "bob@school.edu", answers)).await;

    let sheets = &app.backend().sheets;
    assert!(sheets.get("Roster", "G2").is_blank());
    assert_eq!(sheets.get("Roster", "G3"), CellValue::Number(5.0));
    assert_eq!(app.error_log().with_category("Submission WriteError").len(), 1);
}

#[tokio::test]
async fn test_corrupt_context_aborts_only_that_event() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());
    app.backend()
        .forms
        .insert_form("form-x", "Form Data (do not edit): %%%not-a-blob%%%");

    app.route_submission(&event("form-x", "bob@school.edu", Vec::new())).await;

    assert_eq!(app.backend().sheets.filled_cells("Roster"), 8);
    assert_eq!(app.error_log().with_category("Submission DecodeError").len(), 1);
}

#[tokio::test]
async fn test_unresolved_respondent_aborts_event() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());
    assert!(app.generate(&settings(), false).await.is_success());
    let before = app.backend().sheets.filled_cells("Roster");

    let form_id = form_for_group(&app, "A");
    let answers = answers_for(&app, &form_id, &["4", "5"], &["a", "b", "c"]);
    app.route_submission(&event(&form_id, "stranger@x.edu", answers)).await;

    assert_eq!(app.backend().sheets.filled_cells("Roster"), before);
    let entries = app.error_log().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].category, "Submission LookupError");
    assert!(entries[0].message.contains("stranger@x.edu"));
}

#[tokio::test]
async fn test_router_reads_current_roster_not_generation_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());
    assert!(app.generate(&settings(), false).await.is_success());

    // 生成之后 Alice 和 Bob 换了行：Bob 变成 A 组第 1 人
    let sheets = &app.backend().sheets;
    sheets.set("Roster", "A2", CellValue::text("Bob"));
    sheets.set("Roster", "A3", CellValue::text("Alice"));

    let form_id = form_for_group(&app, "A");
    // 表单题目仍按生成时的顺序：先 Alice 后 Bob
    let answers = answers_for(&app, &form_id, &["4", "5"], &["for alice", "for bob", ""]);
    app.route_submission(&event(&form_id, "bob@school.edu", answers)).await;

    // 行号和组内序号都按新名单：Bob 的分数写在 E 列（第 1 个位置）
    assert_eq!(sheets.get("Roster", "E3"), CellValue::Number(4.0));
    assert_eq!(sheets.get("Roster", "F3"), CellValue::text("for alice"));
    assert_eq!(sheets.get("Roster", "E2"), CellValue::Number(5.0));
    assert!(sheets.get("Roster", "G2").is_blank());
    assert!(sheets.get("Roster", "G3").is_blank());
    assert!(!sheets.get("Roster", "K2").is_blank());
    assert!(sheets.get("Roster", "K3").is_blank());
    assert!(app.error_log().entries().is_empty());
}

#[tokio::test]
async fn test_duplicate_name_is_routed_from_its_last_row() {
    let dir = tempfile::tempdir().unwrap();
    let sheets = MemorySpreadsheet::new("ss-1")
        .with_sheet("Roster")
        .with_column("Roster", "A2", &["Bob", "Alice", "Alice", "Dan"])
        .with_column("Roster", "B2", &["A", "A", "B", "B"]);
    let app = app_with(&dir, sheets, classroom());

    let report = app.preview(&settings()).await;
    assert_eq!(report.duplicate_names, vec!["Alice"]);
    let status = app.generate(&settings(), false).await;
    assert!(status.is_success(), "{}", status.message);

    // Alice 只在 B 组（第 1 个位置）
    let group_b = app.backend().forms.form(&form_for_group(&app, "B")).unwrap();
    assert!(group_b.description.contains("Group Members: Alice, Dan"));
    let group_a = app.backend().forms.form(&form_for_group(&app, "A")).unwrap();
    assert!(group_a.description.contains("Group Members: Bob\n"));

    let before = app.backend().sheets.filled_cells("Roster");
    let form_a = form_for_group(&app, "A");
    let answers = answers_for(&app, &form_a, &["2"], &["x", ""]);
    app.route_submission(&event(&form_a, "alice@school.edu", answers)).await;
    assert_eq!(app.backend().sheets.filled_cells("Roster"), before);
    assert_eq!(app.error_log().with_category("Submission Info").len(), 1);

    let form_b = form_for_group(&app, "B");
    let answers = answers_for(&app, &form_b, &["5", "3"], &["self", "for dan", ""]);
    app.route_submission(&event(&form_b, "alice@school.edu", answers)).await;

    let sheets = &app.backend().sheets;
    assert_eq!(sheets.get("Roster", "E4"), CellValue::Number(5.0));
    assert_eq!(sheets.get("Roster", "E5"), CellValue::Number(3.0));
    assert_eq!(sheets.get("Roster", "F5"), CellValue::text("for dan"));
    assert!(sheets.get("Roster", "E2").is_blank());
    assert!(sheets.get("Roster", "G2").is_blank());
    assert!(!sheets.get("Roster", "K4").is_blank());
    assert!(sheets.get("Roster", "K3").is_blank());
}

#[tokio::test]
async fn test_response_fetched_by_id_is_routed() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());
    assert!(app.generate(&settings(), false).await.is_success());

    let form_id = form_for_group(&app, "A");
    let responses = responses_for(&app, &form_id, &["4", "5"], &["solid work", "did my part", ""]);
    let response_id = app
        .backend()
        .forms
        .submit(&form_id, "bob@school.edu", &responses, submitted_at());
    app.route_response(&form_id, &response_id).await;

    let sheets = &app.backend().sheets;
    assert_eq!(sheets.get("Roster", "G2"), CellValue::Number(4.0));
    assert_eq!(sheets.get("Roster", "H2"), CellValue::text("solid work"));
    assert_eq!(sheets.get("Roster", "G3"), CellValue::Number(5.0));
    assert!(app.error_log().entries().is_empty());

    app.route_response(&form_id, "response-missing").await;
    assert_eq!(app.error_log().with_category("Submission ServiceError").len(), 1);
}

#[tokio::test]
async fn test_notification_routes_recent_responses() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());
    assert!(app.generate(&settings(), false).await.is_success());

    let form_id = form_for_group(&app, "B");
    let responses = responses_for(&app, &form_id, &["2", "3"], &["", "", ""]);
    app.backend()
        .forms
        .submit(&form_id, "dan@school.edu", &responses, submitted_at());

    let schema: FormNotification = serde_json::from_value(json!({
        "message": {
            "attributes": { "formId": form_id, "watchId": "w-1", "eventType": "SCHEMA" },
            "publishTime": "2030-03-14T09:05:30Z"
        }
    }))
    .unwrap();
    assert_eq!(app.route_notification(&schema).await, 0);
    assert!(app.backend().sheets.get("Roster", "G4").is_blank());

    let notification: FormNotification = serde_json::from_value(json!({
        "message": {
            "attributes": { "formId": form_id, "watchId": "w-1", "eventType": "RESPONSES" },
            "publishTime": "2030-03-14T09:05:30Z"
        }
    }))
    .unwrap();
    assert_eq!(app.route_notification(&notification).await, 1);

    // Dan 是 B 组第 2 人
    let sheets = &app.backend().sheets;
    assert_eq!(sheets.get("Roster", "G4"), CellValue::Number(2.0));
    assert_eq!(sheets.get("Roster", "G5"), CellValue::Number(3.0));
}

#[tokio::test]
async fn test_generation_refuses_invalid_settings() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());

    let mut bad = settings();
    bad.due_date = "2000-01-01".into();
    let status = app.generate(&bad, false).await;
    assert_eq!(status.status, Status::Error);
    assert!(status
        .message
        .starts_with("An error occurred: Input validation failed: "));
    assert!(status.message.contains("Due date must be in the future."));
    assert!(app.backend().forms.forms().is_empty());

    let mut bad = settings();
    bad.scale_upper_bound = 1;
    let status = app.generate(&bad, false).await;
    assert!(status.message.contains("Invalid scale bounds"));
}

#[tokio::test]
async fn test_roster_mismatch_blocks_generation() {
    let dir = tempfile::tempdir().unwrap();
    let classroom = MemoryClassroom::new()
        .with_course("c-1", "Biology 101")
        .with_student("c-1", "Alice", "alice@school.edu")
        .with_student("c-1", "Bob", "bob@school.edu");
    let app = app_with(&dir, sheets(), classroom);

    let report = app.preview(&settings()).await;
    assert_eq!(report.classroom_name_mismatch_count, 2);
    assert_eq!(report.classroom_name_mismatches, vec!["Carol", "Dan"]);
    assert!(report
        .error
        .unwrap()
        .contains("2 name(s) from sheet NOT found in Classroom roster. This is a critical error."));

    let status = app.generate(&settings(), false).await;
    assert_eq!(status.status, Status::Error);
}

#[tokio::test]
async fn test_preview_reports_clean_setup() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());

    let report = app.preview(&settings()).await;
    assert_eq!(report.error, None);
    assert_eq!(report.student_count, 4);
    assert_eq!(report.unique_groups, vec!["A", "B"]);
    assert!(report.eval_header.is_empty);
    assert!(report.url_cell.is_empty);
    assert!(report.eval_table_area_clear);
    assert_eq!(report.drive_folder_check_message, "Folder does NOT exist (will be created).");
    assert_eq!(report.classroom_topic_check_message, "Topic does NOT exist (will be created).");
    assert_eq!(report.due_date_check_message, "Due date is in the future.");
    assert_eq!(report.schedule_date_check_message, "Not scheduled.");
    assert_eq!(
        report.classroom_roster_check_message,
        "All names from sheet appear to match Classroom roster."
    );
}

#[tokio::test]
async fn test_preview_finds_non_empty_table_area() {
    let dir = tempfile::tempdir().unwrap();
    let sheets = sheets();
    sheets.set("Roster", "F4", CellValue::text("old data"));
    let app = app_with(&dir, sheets, classroom());

    let report = app.preview(&settings()).await;
    assert!(!report.eval_table_area_clear);
    assert_eq!(
        report.eval_table_check_message,
        "Evaluation table area for students is NOT clear. First non-empty cell found at F4 (row of student 'Carol')."
    );
}

#[tokio::test]
async fn test_replace_handlers_removes_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());
    assert!(app.generate(&settings(), false).await.is_success());
    let first: Vec<String> = app.list_handlers().await.unwrap().into_iter().map(|h| h.id).collect();

    // 第二次生成前清空表格里的互评表和链接
    let mut rerun = settings();
    rerun.url_links_cell = "N1".into();
    for a1 in ["E1", "F1", "G1", "H1", "I1", "J1", "K1", "I2", "I3", "I4", "I5"] {
        app.backend().sheets.set("Roster", a1, CellValue::Empty);
    }
    let status = app.generate(&rerun, true).await;
    assert!(status.is_success(), "{}", status.message);

    let handlers = app.list_handlers().await.unwrap();
    assert_eq!(handlers.len(), 2);
    assert!(handlers.iter().all(|h| !first.contains(&h.id)));
    assert_eq!(app.backend().forms.handlers().len(), 2);

    let status = app.delete_all_handlers().await;
    assert_eq!(status.message, "Successfully deleted 2 submit handlers.");
    assert!(app.list_handlers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_defaults_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(&dir, sheets(), classroom());

    assert_eq!(app.load_defaults().await, GenerationSettings::default());
    let status = app.save_defaults(&settings()).await;
    assert_eq!(status.message, "Defaults saved successfully.");
    assert_eq!(app.load_defaults().await, settings());
}
