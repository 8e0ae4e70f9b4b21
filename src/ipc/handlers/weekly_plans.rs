use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, parse_iso_date, parse_opt_i64, parse_opt_string, parse_time_of_day, required_str,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

/// Weekly block budget used by the frequency distribution routine:
/// max study hours converted to 100-minute blocks, with a fallback when the
/// plan carries no explicit budget.
const SLOT_MINUTES: i64 = 100;
const DEFAULT_WEEKLY_BLOCKS: i64 = 18;

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_exists = match conn
        .query_row(
            "SELECT 1 FROM students WHERE id = ? LIMIT 1",
            [&student_id],
            |_r| Ok(()),
        )
        .optional()
    {
        Ok(v) => v.is_some(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if !student_exists {
        return err(&req.id, "not_found", "student not found", None);
    }
    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };
    let start_date = match input.get("startDateOfWeek").and_then(|v| v.as_str()) {
        Some(raw) => match parse_iso_date(raw) {
            Some(_) => raw.trim().to_string(),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "input.startDateOfWeek must be YYYY-MM-DD",
                    None,
                )
            }
        },
        None => return err(&req.id, "bad_params", "missing input.startDateOfWeek", None),
    };
    let day_start_time = match parse_opt_string(input.get("dayStartTime")) {
        Ok(Some(raw)) => {
            if parse_time_of_day(&raw).is_none() {
                return err(&req.id, "bad_params", "input.dayStartTime must be HH:MM:SS", None);
            }
            Some(raw)
        }
        Ok(None) => None,
        Err(m) => return err(&req.id, "bad_params", format!("input.dayStartTime {}", m), None),
    };
    let max_study_hours = match parse_opt_i64(input.get("maxStudyHoursPerWeek")) {
        Ok(Some(v)) if v > 0 => Some(v),
        Ok(Some(_)) => {
            return err(
                &req.id,
                "bad_params",
                "input.maxStudyHoursPerWeek must be > 0",
                None,
            )
        }
        Ok(None) => None,
        Err(m) => {
            return err(
                &req.id,
                "bad_params",
                format!("input.maxStudyHoursPerWeek {}", m),
                None,
            )
        }
    };

    let plan_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO weekly_plans(id, student_id, start_date_of_week, day_start_time, max_study_hours_per_week)
         VALUES(?, ?, ?, ?, ?)",
        params![plan_id, student_id, start_date, day_start_time, max_study_hours],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "weeklyPlanId": plan_id }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, start_date_of_week, day_start_time, max_study_hours_per_week
         FROM weekly_plans
         WHERE student_id = ?
         ORDER BY start_date_of_week DESC, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let plans = match stmt.query_map([&student_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "startDateOfWeek": r.get::<_, String>(1)?,
            "dayStartTime": r.get::<_, Option<String>>(2)?,
            "maxStudyHoursPerWeek": r.get::<_, Option<i64>>(3)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "weeklyPlans": plans }))
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let plan_id = match required_str(req, "weeklyPlanId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let plan = match conn
        .query_row(
            "SELECT id, student_id, start_date_of_week, day_start_time, max_study_hours_per_week
             FROM weekly_plans
             WHERE id = ?",
            [&plan_id],
            |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "studentId": r.get::<_, String>(1)?,
                    "startDateOfWeek": r.get::<_, String>(2)?,
                    "dayStartTime": r.get::<_, Option<String>>(3)?,
                    "maxStudyHoursPerWeek": r.get::<_, Option<i64>>(4)?,
                }))
            },
        )
        .optional()
    {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "weekly plan not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut day_stmt = match conn.prepare(
        "SELECT id, plan_date FROM daily_plans WHERE weekly_plan_id = ? ORDER BY plan_date, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let day_rows = match day_stmt.query_map([&plan_id], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut session_stmt = match conn.prepare(
        "SELECT id, book_id, start_time, end_time, is_completed, completion_date
         FROM study_sessions
         WHERE daily_plan_id = ?
         ORDER BY start_time, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut daily_plans = Vec::with_capacity(day_rows.len());
    for (daily_plan_id, plan_date) in day_rows {
        let sessions = match session_stmt.query_map([&daily_plan_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "bookId": r.get::<_, String>(1)?,
                "startTime": r.get::<_, String>(2)?,
                "endTime": r.get::<_, String>(3)?,
                "isCompleted": r.get::<_, i64>(4)? != 0,
                "completionDate": r.get::<_, Option<String>>(5)?,
            }))
        }) {
            Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
                Ok(v) => v,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            },
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        daily_plans.push(json!({
            "id": daily_plan_id,
            "planDate": plan_date,
            "sessions": sessions,
        }));
    }

    ok(
        &req.id,
        json!({ "weeklyPlan": plan, "dailyPlans": daily_plans }),
    )
}

fn handle_frequencies_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let plan_id = match required_str(req, "weeklyPlanId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let plan_exists = match conn
        .query_row(
            "SELECT 1 FROM weekly_plans WHERE id = ? LIMIT 1",
            [&plan_id],
            |_r| Ok(()),
        )
        .optional()
    {
        Ok(v) => v.is_some(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if !plan_exists {
        return err(&req.id, "not_found", "weekly plan not found", None);
    }
    let Some(items) = req.params.get("items").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing items", None);
    };
    let mut parsed: Vec<(String, i64)> = Vec::with_capacity(items.len());
    for item in items {
        let Some(book_id) = item.get("bookId").and_then(|v| v.as_str()) else {
            return err(&req.id, "bad_params", "items[].bookId is required", None);
        };
        let Some(per_week) = item.get("frequencyPerWeek").and_then(|v| v.as_i64()) else {
            return err(&req.id, "bad_params", "items[].frequencyPerWeek is required", None);
        };
        if per_week <= 0 {
            return err(
                &req.id,
                "bad_params",
                "items[].frequencyPerWeek must be > 0",
                None,
            );
        }
        let book_id = book_id.trim().to_string();
        if book_id.is_empty() {
            return err(&req.id, "bad_params", "items[].bookId must not be empty", None);
        }
        if parsed.iter().any(|(existing, _)| *existing == book_id) {
            return err(
                &req.id,
                "bad_params",
                format!("duplicate bookId in items: {}", book_id),
                None,
            );
        }
        parsed.push((book_id, per_week));
    }

    // Replace-all keeps one row per (plan, book).
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute(
        "DELETE FROM subject_frequencies WHERE weekly_plan_id = ?",
        [&plan_id],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    for (book_id, per_week) in &parsed {
        if let Err(e) = tx.execute(
            "INSERT INTO subject_frequencies(id, weekly_plan_id, book_id, frequency_per_week)
             VALUES(?, ?, ?, ?)",
            params![Uuid::new_v4().to_string(), plan_id, book_id, per_week],
        ) {
            let _ = tx.rollback();
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "count": parsed.len() }))
}

fn handle_frequencies_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let plan_id = match required_str(req, "weeklyPlanId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, book_id, frequency_per_week
         FROM subject_frequencies
         WHERE weekly_plan_id = ?
         ORDER BY book_id, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let frequencies = match stmt.query_map([&plan_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "bookId": r.get::<_, String>(1)?,
            "frequencyPerWeek": r.get::<_, i64>(2)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "frequencies": frequencies }))
}

struct TemplateRow {
    id: String,
    name: String,
    total_blocks: i64,
}

fn weekly_block_budget(max_study_hours: Option<i64>) -> i64 {
    match max_study_hours {
        Some(hours) if hours > 0 => hours * 60 / SLOT_MINUTES,
        _ => DEFAULT_WEEKLY_BLOCKS,
    }
}

fn closest_template(
    conn: &Connection,
    grade_id: Option<&str>,
    major_id: Option<&str>,
    target_blocks: i64,
) -> Result<Option<TemplateRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, name, total_study_blocks_per_week
         FROM schedule_templates
         WHERE (target_grade_id IS NULL OR target_grade_id = ?)
           AND (target_major_id IS NULL OR target_major_id = ?)
         ORDER BY name, id",
    )?;
    let rows = stmt
        .query_map(params![grade_id, major_id], |r| {
            Ok(TemplateRow {
                id: r.get(0)?,
                name: r.get(1)?,
                total_blocks: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut best: Option<TemplateRow> = None;
    for row in rows {
        let diff = (row.total_blocks - target_blocks).abs();
        let better = match &best {
            Some(current) => diff < (current.total_blocks - target_blocks).abs(),
            None => true,
        };
        if better {
            best = Some(row);
        }
    }
    Ok(best)
}

/// Collaborator routine: recommend a template for the plan's block budget
/// and split that budget equally across the selected books (remainder goes
/// to the first book ids in ascending order).
fn handle_frequencies_calculate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let plan_id = match required_str(req, "weeklyPlanId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw_books) = req.params.get("selectedBookIds").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing selectedBookIds", None);
    };
    let mut book_ids: Vec<String> = Vec::with_capacity(raw_books.len());
    for v in raw_books {
        let Some(s) = v.as_str() else {
            return err(&req.id, "bad_params", "selectedBookIds must be strings", None);
        };
        let s = s.trim().to_string();
        if !s.is_empty() && !book_ids.contains(&s) {
            book_ids.push(s);
        }
    }
    if book_ids.is_empty() {
        return err(&req.id, "bad_params", "selectedBookIds must not be empty", None);
    }
    book_ids.sort();

    let plan = match conn
        .query_row(
            "SELECT wp.max_study_hours_per_week, s.grade_id, s.major_id
             FROM weekly_plans wp
             JOIN students s ON s.id = wp.student_id
             WHERE wp.id = ?",
            [&plan_id],
            |r| {
                Ok((
                    r.get::<_, Option<i64>>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()
    {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "weekly plan not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let (max_hours, grade_id, major_id) = plan;
    let target_blocks = weekly_block_budget(max_hours);

    let template = match parse_opt_string(req.params.get("templateId")) {
        Ok(Some(template_id)) => {
            match conn
                .query_row(
                    "SELECT id, name, total_study_blocks_per_week FROM schedule_templates WHERE id = ?",
                    [&template_id],
                    |r| {
                        Ok(TemplateRow {
                            id: r.get(0)?,
                            name: r.get(1)?,
                            total_blocks: r.get(2)?,
                        })
                    },
                )
                .optional()
            {
                Ok(Some(v)) => v,
                Ok(None) => return err(&req.id, "not_found", "template not found", None),
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            }
        }
        Ok(None) => {
            match closest_template(conn, grade_id.as_deref(), major_id.as_deref(), target_blocks) {
                Ok(Some(v)) => v,
                Ok(None) => {
                    return err(
                        &req.id,
                        "not_found",
                        "no suitable template found for the student's grade and major",
                        None,
                    )
                }
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            }
        }
        Err(m) => return err(&req.id, "bad_params", format!("templateId {}", m), None),
    };

    let subjects = book_ids.len() as i64;
    if subjects > target_blocks {
        return err(
            &req.id,
            "bad_params",
            format!(
                "too many subjects ({}) for available blocks ({})",
                subjects, target_blocks
            ),
            None,
        );
    }
    let base = target_blocks / subjects;
    let remainder = (target_blocks % subjects) as usize;
    let mut adjusted = serde_json::Map::new();
    for (i, book_id) in book_ids.iter().enumerate() {
        let extra = if i < remainder { 1 } else { 0 };
        adjusted.insert(book_id.clone(), json!(base + extra));
    }

    ok(
        &req.id,
        json!({
            "recommendedTemplate": {
                "id": template.id,
                "name": template.name,
                "totalStudyBlocksPerWeek": template.total_blocks,
            },
            "adjustedFrequencies": adjusted,
            "totalWeeklyBlocks": target_blocks,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "weeklyPlans.create" => Some(handle_create(state, req)),
        "weeklyPlans.list" => Some(handle_list(state, req)),
        "weeklyPlans.open" => Some(handle_open(state, req)),
        "frequencies.set" => Some(handle_frequencies_set(state, req)),
        "frequencies.list" => Some(handle_frequencies_list(state, req)),
        "frequencies.calculate" => Some(handle_frequencies_calculate(state, req)),
        _ => None,
    }
}
