use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_bool, parse_opt_string, parse_time_of_day, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

// Stored day_of_week convention: 0 = Sunday .. 6 = Saturday.

struct TimeWindow {
    day_of_week: i64,
    start_time: String,
    end_time: String,
}

fn parse_window(
    input: &serde_json::Map<String, serde_json::Value>,
) -> Result<TimeWindow, String> {
    let day_of_week = match input.get("dayOfWeek").and_then(|v| v.as_i64()) {
        Some(v) if (0..=6).contains(&v) => v,
        Some(_) => return Err("dayOfWeek must be in 0..=6 (0 = Sunday)".to_string()),
        None => return Err("missing dayOfWeek".to_string()),
    };
    let start_time = match input.get("startTime").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return Err("missing startTime".to_string()),
    };
    let end_time = match input.get("endTime").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return Err("missing endTime".to_string()),
    };
    let Some(start) = parse_time_of_day(&start_time) else {
        return Err("startTime must be HH:MM:SS".to_string());
    };
    let Some(end) = parse_time_of_day(&end_time) else {
        return Err("endTime must be HH:MM:SS".to_string());
    };
    if end <= start {
        return Err("endTime must be after startTime".to_string());
    }
    Ok(TimeWindow {
        day_of_week,
        start_time,
        end_time,
    })
}

fn ensure_student_exists(
    conn: &rusqlite::Connection,
    student_id: &str,
) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT 1 FROM students WHERE id = ? LIMIT 1",
        [student_id],
        |_r| Ok(()),
    )
    .optional()
    .map(|v| v.is_some())
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ensure_student_exists(conn, &student_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };
    let window = match parse_window(input) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let title = match parse_opt_string(input.get("title")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.title {}", m), None),
    };
    let is_recurring = match parse_bool(input.get("isRecurring"), true) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.isRecurring {}", m), None),
    };

    let entry_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO unavailable_times(id, student_id, title, day_of_week, start_time, end_time, is_recurring)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            entry_id,
            student_id,
            title,
            window.day_of_week,
            window.start_time,
            window.end_time,
            if is_recurring { 1 } else { 0 }
        ],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "unavailableTimeId": entry_id }))
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
        "SELECT id, title, day_of_week, start_time, end_time, is_recurring
         FROM unavailable_times
         WHERE student_id = ?
         ORDER BY day_of_week, start_time, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let entries = match stmt.query_map([&student_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "title": r.get::<_, Option<String>>(1)?,
            "dayOfWeek": r.get::<_, i64>(2)?,
            "startTime": r.get::<_, String>(3)?,
            "endTime": r.get::<_, String>(4)?,
            "isRecurring": r.get::<_, i64>(5)? != 0,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "unavailableTimes": entries }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entry_id = match required_str(req, "unavailableTimeId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };
    // Full replace keeps the start/end ordering check in one place.
    let window = match parse_window(input) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let title = match parse_opt_string(input.get("title")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.title {}", m), None),
    };
    let is_recurring = match parse_bool(input.get("isRecurring"), true) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.isRecurring {}", m), None),
    };
    match conn.execute(
        "UPDATE unavailable_times
         SET title = ?, day_of_week = ?, start_time = ?, end_time = ?, is_recurring = ?
         WHERE id = ? AND student_id = ?",
        params![
            title,
            window.day_of_week,
            window.start_time,
            window.end_time,
            if is_recurring { 1 } else { 0 },
            entry_id,
            student_id
        ],
    ) {
        Ok(0) => err(&req.id, "not_found", "unavailable time not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entry_id = match required_str(req, "unavailableTimeId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute(
        "DELETE FROM unavailable_times WHERE id = ? AND student_id = ?",
        params![entry_id, student_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "unavailable time not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "unavailableTimes.create" => Some(handle_create(state, req)),
        "unavailableTimes.list" => Some(handle_list(state, req)),
        "unavailableTimes.update" => Some(handle_update(state, req)),
        "unavailableTimes.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
