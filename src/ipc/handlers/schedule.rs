use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_iso_date, parse_opt_string, required_str};
use crate::ipc::types::{AppState, Request};
use crate::scheduler::{
    self, BookFrequency, GenerateRequest, PlacementRule, PlanStore, TimePreference,
    UnavailableWindow, DEFAULT_DAY_END, DEFAULT_DAY_START, DEFAULT_SLOT_MINUTES,
};
use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::json;
use uuid::Uuid;

struct PlanRow {
    student_id: String,
    start_date_of_week: String,
    day_start_time: Option<String>,
    max_study_hours_per_week: Option<i64>,
}

fn load_plan(conn: &Connection, plan_id: &str) -> Result<Option<PlanRow>, rusqlite::Error> {
    conn.query_row(
        "SELECT student_id, start_date_of_week, day_start_time, max_study_hours_per_week
         FROM weekly_plans
         WHERE id = ?",
        [plan_id],
        |r| {
            Ok(PlanRow {
                student_id: r.get(0)?,
                start_date_of_week: r.get(1)?,
                day_start_time: r.get(2)?,
                max_study_hours_per_week: r.get(3)?,
            })
        },
    )
    .optional()
}

fn load_unavailable(
    conn: &Connection,
    student_id: &str,
) -> Result<Vec<UnavailableWindow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT day_of_week, start_time, end_time, is_recurring
         FROM unavailable_times
         WHERE student_id = ?
         ORDER BY day_of_week, start_time, id",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok(UnavailableWindow {
                day_of_week: r.get::<_, i64>(0)?.max(0) as u32,
                start_time: r.get(1)?,
                end_time: r.get(2)?,
                is_recurring: r.get::<_, i64>(3)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_frequencies(
    conn: &Connection,
    plan_id: &str,
) -> Result<Vec<BookFrequency>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT book_id, frequency_per_week
         FROM subject_frequencies
         WHERE weekly_plan_id = ?
         ORDER BY book_id",
    )?;
    let rows = stmt
        .query_map([plan_id], |r| {
            Ok(BookFrequency {
                book_id: r.get(0)?,
                per_week: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_rules(
    conn: &Connection,
    template_id: &str,
) -> Result<Vec<PlacementRule>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT book_id, default_frequency, priority_slot, time_preference, consecutive_sessions
         FROM template_rules
         WHERE template_id = ?
         ORDER BY book_id, id",
    )?;
    let rows = stmt
        .query_map([template_id], |r| {
            let time_preference: Option<String> = r.get(3)?;
            Ok(PlacementRule {
                book_id: r.get(0)?,
                default_frequency: r.get(1)?,
                priority_slot: r.get(2)?,
                time_preference: time_preference.as_deref().and_then(TimePreference::parse),
                consecutive_sessions: r.get::<_, i64>(4)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Writes placements through the surrounding transaction so a regeneration
/// is all-or-nothing.
struct SqlitePlanStore<'a> {
    tx: &'a Transaction<'a>,
    weekly_plan_id: &'a str,
}

impl PlanStore for SqlitePlanStore<'_> {
    fn get_or_create_daily_plan(&mut self, date: NaiveDate) -> Result<String> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let existing = self
            .tx
            .query_row(
                "SELECT id FROM daily_plans WHERE weekly_plan_id = ? AND plan_date = ?",
                params![self.weekly_plan_id, date_str],
                |r| r.get::<_, String>(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        let id = Uuid::new_v4().to_string();
        self.tx.execute(
            "INSERT INTO daily_plans(id, weekly_plan_id, plan_date) VALUES(?, ?, ?)",
            params![id, self.weekly_plan_id, date_str],
        )?;
        Ok(id)
    }

    fn insert_study_session(
        &mut self,
        daily_plan_id: &str,
        book_id: &str,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.tx.execute(
            "INSERT INTO study_sessions(id, daily_plan_id, book_id, start_time, end_time, is_completed)
             VALUES(?, ?, ?, ?, ?, 0)",
            params![
                id,
                daily_plan_id,
                book_id,
                start.format("%H:%M:%S").to_string(),
                end.format("%H:%M:%S").to_string()
            ],
        )?;
        Ok(id)
    }
}

fn handle_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let plan_id = match required_str(req, "weeklyPlanId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let plan = match load_plan(conn, &plan_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "weekly plan not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(week_start) = parse_iso_date(&plan.start_date_of_week) else {
        return err(
            &req.id,
            "bad_params",
            "weekly plan has an invalid start date",
            None,
        );
    };

    // Template blocks, then the plan's hour budget, then the frequency sum
    // decide how many occurrences the week asks for.
    let template_blocks = match parse_opt_string(req.params.get("templateId")) {
        Ok(Some(template_id)) => {
            match conn
                .query_row(
                    "SELECT total_study_blocks_per_week FROM schedule_templates WHERE id = ?",
                    [&template_id],
                    |r| r.get::<_, i64>(0),
                )
                .optional()
            {
                Ok(Some(blocks)) => Some((template_id, blocks)),
                Ok(None) => return err(&req.id, "not_found", "template not found", None),
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            }
        }
        Ok(None) => None,
        Err(m) => return err(&req.id, "bad_params", format!("templateId {}", m), None),
    };

    let unavailable = match load_unavailable(conn, &plan.student_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let frequencies = match load_frequencies(conn, &plan_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rules = match &template_blocks {
        Some((template_id, _)) => match load_rules(conn, template_id) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        None => Vec::new(),
    };
    if frequencies.is_empty() && rules.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "no subject frequencies or template rules supplied",
            None,
        );
    }

    let total_target = match &template_blocks {
        Some((_, blocks)) if *blocks > 0 => *blocks,
        _ => match plan.max_study_hours_per_week {
            Some(hours) if hours > 0 => hours * 60 / DEFAULT_SLOT_MINUTES,
            _ => frequencies.iter().map(|f| f.per_week.max(0)).sum(),
        },
    };

    let day_start = plan
        .day_start_time
        .as_deref()
        .and_then(scheduler::parse_time_of_day)
        .or_else(|| scheduler::parse_time_of_day(DEFAULT_DAY_START));
    let day_end = scheduler::parse_time_of_day(DEFAULT_DAY_END);
    let (Some(day_start), Some(day_end)) = (day_start, day_end) else {
        return err(&req.id, "bad_params", "invalid day start time", None);
    };

    let gen_req = GenerateRequest {
        week_start,
        total_target,
        day_start,
        day_end,
        slot_minutes: DEFAULT_SLOT_MINUTES,
        unavailable,
        frequencies,
        rules,
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    // Regeneration replaces whatever the previous run produced.
    if let Err(e) = tx.execute(
        "DELETE FROM study_sessions
         WHERE daily_plan_id IN (SELECT id FROM daily_plans WHERE weekly_plan_id = ?)",
        [&plan_id],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    if let Err(e) = tx.execute("DELETE FROM daily_plans WHERE weekly_plan_id = ?", [&plan_id]) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    let outcome = {
        let mut store = SqlitePlanStore {
            tx: &tx,
            weekly_plan_id: &plan_id,
        };
        match scheduler::generate_weekly_plan(&gen_req, &mut store) {
            Ok(v) => v,
            Err(e) => {
                let _ = tx.rollback();
                return err(&req.id, "db_insert_failed", e.to_string(), None);
            }
        }
    };
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "placedCount": outcome.placed,
            "requestedCount": outcome.requested,
            "skippedUnavailableTimes": outcome.skipped_unavailable,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.generate" => Some(handle_generate(state, req)),
        _ => None,
    }
}
