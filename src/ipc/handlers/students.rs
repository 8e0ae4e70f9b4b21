use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_opt_string, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension};
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
    let first_name = match input.get("firstName").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "input.firstName is required", None),
    };
    let last_name = match input.get("lastName").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "input.lastName is required", None),
    };
    let email = match input.get("email").and_then(|v| v.as_str()) {
        Some(v) if v.contains('@') => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "input.email must be a valid address", None),
    };
    let phone_number = match parse_opt_string(input.get("phoneNumber")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.phoneNumber {}", m), None),
    };
    let grade_id = match parse_opt_string(input.get("gradeId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.gradeId {}", m), None),
    };
    let major_id = match parse_opt_string(input.get("majorId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.majorId {}", m), None),
    };

    let student_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO students(id, first_name, last_name, email, phone_number, grade_id, major_id)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![student_id, first_name, last_name, email, phone_number, grade_id, major_id],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "studentId": student_id }))
}

fn student_to_json(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "firstName": r.get::<_, String>(1)?,
        "lastName": r.get::<_, String>(2)?,
        "email": r.get::<_, String>(3)?,
        "phoneNumber": r.get::<_, Option<String>>(4)?,
        "gradeId": r.get::<_, Option<String>>(5)?,
        "majorId": r.get::<_, Option<String>>(6)?,
    }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, first_name, last_name, email, phone_number, grade_id, major_id
         FROM students
         ORDER BY last_name, first_name, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let students = match stmt.query_map([], student_to_json) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "students": students }))
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
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch", None);
    };

    let mut fields: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    for (k, v) in patch {
        match k.as_str() {
            "firstName" | "lastName" | "email" => {
                let Some(s) = v.as_str() else {
                    return err(&req.id, "bad_params", format!("patch.{} must be string", k), None);
                };
                let s = s.trim();
                if s.is_empty() {
                    return err(&req.id, "bad_params", format!("patch.{} must not be empty", k), None);
                }
                let column = match k.as_str() {
                    "firstName" => "first_name",
                    "lastName" => "last_name",
                    _ => "email",
                };
                fields.push(format!("{} = ?", column));
                values.push(Value::Text(s.to_string()));
            }
            "phoneNumber" | "gradeId" | "majorId" => {
                let column = match k.as_str() {
                    "phoneNumber" => "phone_number",
                    "gradeId" => "grade_id",
                    _ => "major_id",
                };
                fields.push(format!("{} = ?", column));
                if v.is_null() {
                    values.push(Value::Null);
                } else if let Some(s) = v.as_str() {
                    values.push(Value::Text(s.trim().to_string()));
                } else {
                    return err(
                        &req.id,
                        "bad_params",
                        format!("patch.{} must be string or null", k),
                        None,
                    );
                }
            }
            _ => return err(&req.id, "bad_params", format!("unknown patch field: {}", k), None),
        }
    }
    if fields.is_empty() {
        return ok(&req.id, json!({ "ok": true }));
    }
    values.push(Value::Text(student_id));
    let sql = format!("UPDATE students SET {} WHERE id = ?", fields.join(", "));
    match conn.execute(&sql, params_from_iter(values)) {
        Ok(0) => err(&req.id, "not_found", "student not found", None),
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
    let has_plans = match conn
        .query_row(
            "SELECT 1 FROM weekly_plans WHERE student_id = ? LIMIT 1",
            [&student_id],
            |_r| Ok(()),
        )
        .optional()
    {
        Ok(v) => v.is_some(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if has_plans {
        return err(
            &req.id,
            "bad_params",
            "student has weekly plans; delete those first",
            None,
        );
    }
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute(
        "DELETE FROM unavailable_times WHERE student_id = ?",
        [&student_id],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    let deleted = match tx.execute("DELETE FROM students WHERE id = ?", [&student_id]) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    };
    if deleted == 0 {
        let _ = tx.rollback();
        return err(&req.id, "not_found", "student not found", None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_create(state, req)),
        "students.list" => Some(handle_list(state, req)),
        "students.update" => Some(handle_update(state, req)),
        "students.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
