use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

// Grades and majors are plain name lookups used to scope templates.

fn handle_create(state: &mut AppState, req: &Request, table: &str, key: &str) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = Uuid::new_v4().to_string();
    let sql = format!("INSERT INTO {}(id, name) VALUES(?, ?)", table);
    if let Err(e) = conn.execute(&sql, rusqlite::params![id, name]) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ key: id }))
}

fn handle_list(state: &mut AppState, req: &Request, table: &str, key: &str) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let sql = format!("SELECT id, name FROM {} ORDER BY name, id", table);
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = match stmt.query_map([], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "name": r.get::<_, String>(1)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ key: rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.create" => Some(handle_create(state, req, "grades", "gradeId")),
        "grades.list" => Some(handle_list(state, req, "grades", "grades")),
        "majors.create" => Some(handle_create(state, req, "majors", "majorId")),
        "majors.list" => Some(handle_list(state, req, "majors", "majors")),
        _ => None,
    }
}
