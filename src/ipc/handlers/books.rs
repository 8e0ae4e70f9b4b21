use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_opt_string, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };
    let title = match input.get("title").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "input.title is required", None),
    };
    let grade_id = match parse_opt_string(input.get("gradeId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.gradeId {}", m), None),
    };

    let book_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO books(id, title, grade_id) VALUES(?, ?, ?)",
        params![book_id, title, grade_id],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "bookId": book_id }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare("SELECT id, title, grade_id FROM books ORDER BY title, id") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let books = match stmt.query_map([], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "title": r.get::<_, String>(1)?,
            "gradeId": r.get::<_, Option<String>>(2)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "books": books }))
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
    let in_use = match conn
        .query_row(
            "SELECT 1 FROM study_sessions WHERE book_id = ? LIMIT 1",
            [&book_id],
            |_r| Ok(()),
        )
        .optional()
    {
        Ok(v) => v.is_some(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if in_use {
        return err(
            &req.id,
            "bad_params",
            "book has scheduled sessions; regenerate or delete those plans first",
            None,
        );
    }
    // Lessons belong to the book and go with it.
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute("DELETE FROM lessons WHERE book_id = ?", [&book_id]) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    let deleted = match tx.execute("DELETE FROM books WHERE id = ?", [&book_id]) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    };
    if deleted == 0 {
        let _ = tx.rollback();
        return err(&req.id, "not_found", "book not found", None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "books.create" => Some(handle_create(state, req)),
        "books.list" => Some(handle_list(state, req)),
        "books.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
