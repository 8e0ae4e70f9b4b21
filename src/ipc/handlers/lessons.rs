use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_opt_i64, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

// Lessons are the chapters of a book; study time is an optional estimate
// in minutes.

struct LessonInput {
    name: String,
    estimated_minutes: Option<i64>,
}

fn parse_lesson_input(
    input: &serde_json::Map<String, serde_json::Value>,
) -> Result<LessonInput, String> {
    let name = match input.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return Err("name is required".to_string()),
    };
    let estimated_minutes = match parse_opt_i64(input.get("estimatedStudyTimeMinutes")) {
        Ok(Some(v)) if v > 0 => Some(v),
        Ok(Some(_)) => return Err("estimatedStudyTimeMinutes must be > 0".to_string()),
        Ok(None) => None,
        Err(m) => return Err(format!("estimatedStudyTimeMinutes {}", m)),
    };
    Ok(LessonInput {
        name,
        estimated_minutes,
    })
}

fn ensure_book_exists(
    conn: &rusqlite::Connection,
    book_id: &str,
) -> Result<bool, rusqlite::Error> {
    conn.query_row("SELECT 1 FROM books WHERE id = ? LIMIT 1", [book_id], |_r| Ok(()))
        .optional()
        .map(|v| v.is_some())
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let book_id = match required_str(req, "bookId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ensure_book_exists(conn, &book_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "book not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };
    let lesson = match parse_lesson_input(input) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let lesson_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO lessons(id, book_id, name, estimated_study_time_minutes)
         VALUES(?, ?, ?, ?)",
        params![lesson_id, book_id, lesson.name, lesson.estimated_minutes],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "lessonId": lesson_id }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let book_id = match required_str(req, "bookId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, name, estimated_study_time_minutes
         FROM lessons
         WHERE book_id = ?
         ORDER BY name, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let lessons = match stmt.query_map([&book_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "name": r.get::<_, String>(1)?,
            "estimatedStudyTimeMinutes": r.get::<_, Option<i64>>(2)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "lessons": lessons }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let book_id = match required_str(req, "bookId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let lesson_id = match required_str(req, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };
    let lesson = match parse_lesson_input(input) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match conn.execute(
        "UPDATE lessons SET name = ?, estimated_study_time_minutes = ?
         WHERE id = ? AND book_id = ?",
        params![lesson.name, lesson.estimated_minutes, lesson_id, book_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "lesson not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let book_id = match required_str(req, "bookId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let lesson_id = match required_str(req, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute(
        "DELETE FROM lessons WHERE id = ? AND book_id = ?",
        params![lesson_id, book_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "lesson not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "lessons.create" => Some(handle_create(state, req)),
        "lessons.list" => Some(handle_list(state, req)),
        "lessons.update" => Some(handle_update(state, req)),
        "lessons.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
