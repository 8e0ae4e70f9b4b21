use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_bool, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::params;
use serde_json::json;

fn handle_complete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let session_id = match required_str(req, "studySessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let completed = match parse_bool(req.params.get("completed"), true) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("completed {}", m), None),
    };
    let completion_date = if completed {
        Some(chrono::Local::now().date_naive().format("%Y-%m-%d").to_string())
    } else {
        None
    };
    match conn.execute(
        "UPDATE study_sessions SET is_completed = ?, completion_date = ? WHERE id = ?",
        params![if completed { 1 } else { 0 }, completion_date, session_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "study session not found", None),
        Ok(_) => ok(
            &req.id,
            json!({ "ok": true, "isCompleted": completed, "completionDate": completion_date }),
        ),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "studySessions.complete" => Some(handle_complete(state, req)),
        _ => None,
    }
}
