use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_bool, parse_opt_string, required_str};
use crate::ipc::types::{AppState, Request};
use crate::scheduler::{TimePreference, PRIORITY_SLOT_FIRST};
use rusqlite::{params, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn handle_templates_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };
    let name = match input.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "input.name is required", None),
    };
    let total_blocks = match input.get("totalStudyBlocksPerWeek").and_then(|v| v.as_i64()) {
        Some(v) if v > 0 => v,
        Some(_) => {
            return err(
                &req.id,
                "bad_params",
                "input.totalStudyBlocksPerWeek must be > 0",
                None,
            )
        }
        None => {
            return err(
                &req.id,
                "bad_params",
                "missing input.totalStudyBlocksPerWeek",
                None,
            )
        }
    };
    let target_grade_id = match parse_opt_string(input.get("targetGradeId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.targetGradeId {}", m), None),
    };
    let target_major_id = match parse_opt_string(input.get("targetMajorId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.targetMajorId {}", m), None),
    };

    let template_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO schedule_templates(id, name, target_grade_id, target_major_id, total_study_blocks_per_week)
         VALUES(?, ?, ?, ?, ?)",
        params![template_id, name, target_grade_id, target_major_id, total_blocks],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "templateId": template_id }))
}

fn handle_templates_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, name, target_grade_id, target_major_id, total_study_blocks_per_week
         FROM schedule_templates
         ORDER BY name, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let templates = match stmt.query_map([], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "name": r.get::<_, String>(1)?,
            "targetGradeId": r.get::<_, Option<String>>(2)?,
            "targetMajorId": r.get::<_, Option<String>>(3)?,
            "totalStudyBlocksPerWeek": r.get::<_, i64>(4)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "templates": templates }))
}

fn ensure_template_exists(
    conn: &rusqlite::Connection,
    template_id: &str,
) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT 1 FROM schedule_templates WHERE id = ? LIMIT 1",
        [template_id],
        |_r| Ok(()),
    )
    .optional()
    .map(|v| v.is_some())
}

struct RuleInput {
    book_id: String,
    default_frequency: i64,
    priority_slot: Option<String>,
    time_preference: Option<String>,
    consecutive_sessions: bool,
}

fn parse_rule_input(input: &serde_json::Map<String, serde_json::Value>) -> Result<RuleInput, String> {
    let book_id = match input.get("bookId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return Err("bookId is required".to_string()),
    };
    let default_frequency = match input.get("defaultFrequency").and_then(|v| v.as_i64()) {
        Some(v) if v > 0 => v,
        Some(_) => return Err("defaultFrequency must be > 0".to_string()),
        None => return Err("missing defaultFrequency".to_string()),
    };
    let priority_slot = match parse_opt_string(input.get("prioritySlot")) {
        Ok(Some(raw)) => {
            let lowered = raw.to_ascii_lowercase();
            if lowered != PRIORITY_SLOT_FIRST {
                return Err(format!("prioritySlot must be \"{}\"", PRIORITY_SLOT_FIRST));
            }
            Some(lowered)
        }
        Ok(None) => None,
        Err(m) => return Err(format!("prioritySlot {}", m)),
    };
    let time_preference = match parse_opt_string(input.get("timePreference")) {
        Ok(Some(raw)) => match TimePreference::parse(&raw) {
            Some(_) => Some(raw.to_ascii_lowercase()),
            None => return Err("timePreference must be \"morning\" or \"afternoon\"".to_string()),
        },
        Ok(None) => None,
        Err(m) => return Err(format!("timePreference {}", m)),
    };
    let consecutive_sessions = match parse_bool(input.get("consecutiveSessions"), false) {
        Ok(v) => v,
        Err(m) => return Err(format!("consecutiveSessions {}", m)),
    };
    Ok(RuleInput {
        book_id,
        default_frequency,
        priority_slot,
        time_preference,
        consecutive_sessions,
    })
}

fn handle_rules_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let template_id = match required_str(req, "templateId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ensure_template_exists(conn, &template_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "template not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };
    let rule = match parse_rule_input(input) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let rule_id = Uuid::new_v4().to_string();
    // UNIQUE(template_id, book_id) keeps it to one rule per book.
    if let Err(e) = conn.execute(
        "INSERT INTO template_rules(id, template_id, book_id, default_frequency, priority_slot, time_preference, consecutive_sessions)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            rule_id,
            template_id,
            rule.book_id,
            rule.default_frequency,
            rule.priority_slot,
            rule.time_preference,
            if rule.consecutive_sessions { 1 } else { 0 }
        ],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ruleId": rule_id }))
}

fn handle_rules_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let template_id = match required_str(req, "templateId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, book_id, default_frequency, priority_slot, time_preference, consecutive_sessions
         FROM template_rules
         WHERE template_id = ?
         ORDER BY book_id, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rules = match stmt.query_map([&template_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "bookId": r.get::<_, String>(1)?,
            "defaultFrequency": r.get::<_, i64>(2)?,
            "prioritySlot": r.get::<_, Option<String>>(3)?,
            "timePreference": r.get::<_, Option<String>>(4)?,
            "consecutiveSessions": r.get::<_, i64>(5)? != 0,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "rules": rules }))
}

fn handle_rules_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let template_id = match required_str(req, "templateId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rule_id = match required_str(req, "ruleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };
    let rule = match parse_rule_input(input) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match conn.execute(
        "UPDATE template_rules
         SET book_id = ?, default_frequency = ?, priority_slot = ?, time_preference = ?, consecutive_sessions = ?
         WHERE id = ? AND template_id = ?",
        params![
            rule.book_id,
            rule.default_frequency,
            rule.priority_slot,
            rule.time_preference,
            if rule.consecutive_sessions { 1 } else { 0 },
            rule_id,
            template_id
        ],
    ) {
        Ok(0) => err(&req.id, "not_found", "rule not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_rules_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let template_id = match required_str(req, "templateId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rule_id = match required_str(req, "ruleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute(
        "DELETE FROM template_rules WHERE id = ? AND template_id = ?",
        params![rule_id, template_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "rule not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "templates.create" => Some(handle_templates_create(state, req)),
        "templates.list" => Some(handle_templates_list(state, req)),
        "templates.rules.create" => Some(handle_rules_create(state, req)),
        "templates.rules.list" => Some(handle_rules_list(state, req)),
        "templates.rules.update" => Some(handle_rules_update(state, req)),
        "templates.rules.delete" => Some(handle_rules_delete(state, req)),
        _ => None,
    }
}
