
use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn generate_places_sessions_and_regeneration_replaces_them() {
    let workspace = temp_dir("studyplanner-generate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "input": {
            "firstName": "Mina",
            "lastName": "Arai",
            "email": "mina@example.com"
        }}),
    );
    let student_id = student
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();

    let algebra = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "books.create",
        json!({ "input": { "title": "Algebra" } }),
    );
    let algebra_id = algebra
        .get("bookId")
        .and_then(|v| v.as_str())
        .expect("bookId")
        .to_string();
    let biology = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "books.create",
        json!({ "input": { "title": "Biology" } }),
    );
    let biology_id = biology
        .get("bookId")
        .and_then(|v| v.as_str())
        .expect("bookId")
        .to_string();

    let plan = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "weeklyPlans.create",
        json!({ "studentId": student_id, "input": {
            "startDateOfWeek": "2026-03-01"
        }}),
    );
    let plan_id = plan
        .get("weeklyPlanId")
        .and_then(|v| v.as_str())
        .expect("weeklyPlanId")
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "frequencies.set",
        json!({ "weeklyPlanId": plan_id, "items": [
            { "bookId": algebra_id, "frequencyPerWeek": 3 },
            { "bookId": biology_id, "frequencyPerWeek": 2 }
        ]}),
    );

    let outcome = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "schedule.generate",
        json!({ "weeklyPlanId": plan_id }),
    );
    // No template and no hour budget: the target is the frequency sum.
    assert_eq!(outcome.get("placedCount").and_then(|v| v.as_i64()), Some(5));
    assert_eq!(outcome.get("requestedCount").and_then(|v| v.as_i64()), Some(5));
    assert_eq!(
        outcome.get("skippedUnavailableTimes").and_then(|v| v.as_i64()),
        Some(0)
    );

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "weeklyPlans.open",
        json!({ "weeklyPlanId": plan_id }),
    );
    let daily_plans = opened
        .get("dailyPlans")
        .and_then(|v| v.as_array())
        .expect("dailyPlans")
        .clone();
    let total_sessions: usize = daily_plans
        .iter()
        .map(|d| d.get("sessions").and_then(|v| v.as_array()).map_or(0, |s| s.len()))
        .sum();
    assert_eq!(total_sessions, 5);
    let mut book_ids: Vec<String> = Vec::new();
    for day in &daily_plans {
        for session in day.get("sessions").and_then(|v| v.as_array()).expect("sessions") {
            assert_eq!(session.get("isCompleted").and_then(|v| v.as_bool()), Some(false));
            book_ids.push(
                session
                    .get("bookId")
                    .and_then(|v| v.as_str())
                    .expect("bookId")
                    .to_string(),
            );
        }
    }
    assert_eq!(book_ids.iter().filter(|b| **b == algebra_id).count(), 3);
    assert_eq!(book_ids.iter().filter(|b| **b == biology_id).count(), 2);

    // Regeneration replaces the previous output instead of stacking on it.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "schedule.generate",
        json!({ "weeklyPlanId": plan_id }),
    );
    assert_eq!(again.get("placedCount").and_then(|v| v.as_i64()), Some(5));
    let reopened = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "weeklyPlans.open",
        json!({ "weeklyPlanId": plan_id }),
    );
    let total_after: usize = reopened
        .get("dailyPlans")
        .and_then(|v| v.as_array())
        .expect("dailyPlans")
        .iter()
        .map(|d| d.get("sessions").and_then(|v| v.as_array()).map_or(0, |s| s.len()))
        .sum();
    assert_eq!(total_after, 5);
}

#[test]
fn generate_reports_partial_placement_when_capacity_is_short() {
    let workspace = temp_dir("studyplanner-generate-partial");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "input": {
            "firstName": "Tomas",
            "lastName": "Reyes",
            "email": "tomas@example.com"
        }}),
    );
    let student_id = student
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();
    let book = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "books.create",
        json!({ "input": { "title": "History" } }),
    );
    let book_id = book
        .get("bookId")
        .and_then(|v| v.as_str())
        .expect("bookId")
        .to_string();

    // Recurring all-day blocks on six of seven days leave eight slots.
    for day in 1..7 {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("block-{}", day),
            "unavailableTimes.create",
            json!({ "studentId": student_id, "input": {
                "dayOfWeek": day,
                "startTime": "00:00:00",
                "endTime": "23:59:59"
            }}),
        );
    }

    let plan = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "weeklyPlans.create",
        json!({ "studentId": student_id, "input": {
            "startDateOfWeek": "2026-03-01"
        }}),
    );
    let plan_id = plan
        .get("weeklyPlanId")
        .and_then(|v| v.as_str())
        .expect("weeklyPlanId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "frequencies.set",
        json!({ "weeklyPlanId": plan_id, "items": [
            { "bookId": book_id, "frequencyPerWeek": 12 }
        ]}),
    );

    let outcome = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "schedule.generate",
        json!({ "weeklyPlanId": plan_id }),
    );
    // Only Sunday is open: eight 100-minute slots between 08:00 and 22:00.
    assert_eq!(outcome.get("placedCount").and_then(|v| v.as_i64()), Some(8));
    assert_eq!(outcome.get("requestedCount").and_then(|v| v.as_i64()), Some(12));
}

#[test]
fn generate_with_template_uses_rules_and_block_target() {
    let workspace = temp_dir("studyplanner-generate-template");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "input": {
            "firstName": "Noor",
            "lastName": "Haddad",
            "email": "noor@example.com"
        }}),
    );
    let student_id = student
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();
    let book = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "books.create",
        json!({ "input": { "title": "Physics" } }),
    );
    let book_id = book
        .get("bookId")
        .and_then(|v| v.as_str())
        .expect("bookId")
        .to_string();

    let template = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "templates.create",
        json!({ "input": { "name": "Science Focus", "totalStudyBlocksPerWeek": 4 } }),
    );
    let template_id = template
        .get("templateId")
        .and_then(|v| v.as_str())
        .expect("templateId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "templates.rules.create",
        json!({ "templateId": template_id, "input": {
            "bookId": book_id,
            "defaultFrequency": 4,
            "consecutiveSessions": true
        }}),
    );

    let plan = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "weeklyPlans.create",
        json!({ "studentId": student_id, "input": {
            "startDateOfWeek": "2026-03-01"
        }}),
    );
    let plan_id = plan
        .get("weeklyPlanId")
        .and_then(|v| v.as_str())
        .expect("weeklyPlanId")
        .to_string();

    // No explicit frequencies: the template's rules seed them and the
    // template's block total is the target.
    let outcome = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "schedule.generate",
        json!({ "weeklyPlanId": plan_id, "templateId": template_id }),
    );
    assert_eq!(outcome.get("placedCount").and_then(|v| v.as_i64()), Some(4));
    assert_eq!(outcome.get("requestedCount").and_then(|v| v.as_i64()), Some(4));

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "weeklyPlans.open",
        json!({ "weeklyPlanId": plan_id }),
    );
    let daily_plans = opened
        .get("dailyPlans")
        .and_then(|v| v.as_array())
        .expect("dailyPlans");
    // Consecutive placement keeps all four sessions on the first day.
    assert_eq!(daily_plans.len(), 1);
    let sessions = daily_plans[0]
        .get("sessions")
        .and_then(|v| v.as_array())
        .expect("sessions");
    assert_eq!(sessions.len(), 4);
    for pair in sessions.windows(2) {
        assert_eq!(
            pair[0].get("endTime").and_then(|v| v.as_str()),
            pair[1].get("startTime").and_then(|v| v.as_str())
        );
    }
}

#[test]
fn generate_rejects_missing_plan_and_empty_inputs() {
    let workspace = temp_dir("studyplanner-generate-errors");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let code = request_err(
        &mut stdin,
        &mut reader,
        "0",
        "schedule.generate",
        json!({ "weeklyPlanId": "nope" }),
    );
    assert_eq!(code, "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "schedule.generate",
        json!({ "weeklyPlanId": "nope" }),
    );
    assert_eq!(code, "not_found");

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "input": {
            "firstName": "Lea",
            "lastName": "Brandt",
            "email": "lea@example.com"
        }}),
    );
    let student_id = student
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();
    let plan = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "weeklyPlans.create",
        json!({ "studentId": student_id, "input": {
            "startDateOfWeek": "2026-03-01"
        }}),
    );
    let plan_id = plan
        .get("weeklyPlanId")
        .and_then(|v| v.as_str())
        .expect("weeklyPlanId")
        .to_string();

    // Neither frequencies nor a template: rejected before any write.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "schedule.generate",
        json!({ "weeklyPlanId": plan_id }),
    );
    assert_eq!(code, "bad_params");
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "weeklyPlans.open",
        json!({ "weeklyPlanId": plan_id }),
    );
    assert_eq!(
        opened.get("dailyPlans").and_then(|v| v.as_array()).map(|v| v.len()),
        Some(0)
    );
}

#[test]
fn completing_a_session_stamps_and_clears_the_date() {
    let workspace = temp_dir("studyplanner-complete");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "input": {
            "firstName": "Iris",
            "lastName": "Kato",
            "email": "iris@example.com"
        }}),
    );
    let student_id = student
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();
    let book = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "books.create",
        json!({ "input": { "title": "Latin" } }),
    );
    let book_id = book
        .get("bookId")
        .and_then(|v| v.as_str())
        .expect("bookId")
        .to_string();
    let plan = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "weeklyPlans.create",
        json!({ "studentId": student_id, "input": {
            "startDateOfWeek": "2026-03-01"
        }}),
    );
    let plan_id = plan
        .get("weeklyPlanId")
        .and_then(|v| v.as_str())
        .expect("weeklyPlanId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "frequencies.set",
        json!({ "weeklyPlanId": plan_id, "items": [
            { "bookId": book_id, "frequencyPerWeek": 1 }
        ]}),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "schedule.generate",
        json!({ "weeklyPlanId": plan_id }),
    );
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "weeklyPlans.open",
        json!({ "weeklyPlanId": plan_id }),
    );
    let session_id = opened
        .get("dailyPlans")
        .and_then(|v| v.as_array())
        .and_then(|days| days.first())
        .and_then(|d| d.get("sessions"))
        .and_then(|v| v.as_array())
        .and_then(|s| s.first())
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .expect("session id")
        .to_string();

    let done = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "studySessions.complete",
        json!({ "studySessionId": session_id }),
    );
    assert_eq!(done.get("isCompleted").and_then(|v| v.as_bool()), Some(true));
    assert!(done
        .get("completionDate")
        .and_then(|v| v.as_str())
        .is_some());

    let undone = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "studySessions.complete",
        json!({ "studySessionId": session_id, "completed": false }),
    );
    assert_eq!(undone.get("isCompleted").and_then(|v| v.as_bool()), Some(false));
    assert!(undone
        .get("completionDate")
        .map_or(true, |v| v.is_null()));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "10",
        "studySessions.complete",
        json!({ "studySessionId": "missing" }),
    );
    assert_eq!(code, "not_found");
}
