use anyhow::{bail, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use std::collections::{BTreeMap, HashMap, VecDeque};

pub const DEFAULT_DAY_START: &str = "08:00:00";
pub const DEFAULT_DAY_END: &str = "22:00:00";
pub const DEFAULT_SLOT_MINUTES: i64 = 100;

/// Day-of-week convention for stored unavailable times: 0 = Sunday .. 6 = Saturday.
pub fn day_of_week_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S").ok()
}

/// One fixed-duration study block on a concrete date. Never mutated after
/// the grid is built; consumed from the front of its day queue once placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone)]
pub struct UnavailableWindow {
    pub day_of_week: u32,
    pub start_time: String,
    pub end_time: String,
    pub is_recurring: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePreference {
    Morning,
    Afternoon,
}

impl TimePreference {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "morning" => Some(TimePreference::Morning),
            "afternoon" => Some(TimePreference::Afternoon),
            _ => None,
        }
    }

    fn matches_hour(self, hour: u32) -> bool {
        match self {
            TimePreference::Morning => hour < 12,
            TimePreference::Afternoon => hour >= 12,
        }
    }
}

pub const PRIORITY_SLOT_FIRST: &str = "first";

#[derive(Debug, Clone)]
pub struct PlacementRule {
    pub book_id: String,
    pub priority_slot: Option<String>,
    pub time_preference: Option<TimePreference>,
    pub consecutive_sessions: bool,
    pub default_frequency: i64,
}

#[derive(Debug, Clone)]
pub struct BookFrequency {
    pub book_id: String,
    pub per_week: i64,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub week_start: NaiveDate,
    pub total_target: i64,
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub slot_minutes: i64,
    pub unavailable: Vec<UnavailableWindow>,
    pub frequencies: Vec<BookFrequency>,
    pub rules: Vec<PlacementRule>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOutcome {
    pub placed: i64,
    pub requested: i64,
    pub skipped_unavailable: usize,
}

/// Narrow persistence interface the engine writes through. Both calls run
/// inside the caller's transaction; any error aborts the whole run.
pub trait PlanStore {
    fn get_or_create_daily_plan(&mut self, date: NaiveDate) -> Result<String>;
    fn insert_study_session(
        &mut self,
        daily_plan_id: &str,
        book_id: &str,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<String>;
}

pub struct WeekGrid {
    pub days: Vec<(NaiveDate, VecDeque<Slot>)>,
    pub skipped_entries: usize,
}

/// Builds the per-day availability queues for the 7 dates starting at
/// `week_start`. Slots are emitted from `day_start` in `slot_minutes`
/// steps; no partial slots past `day_end`. A slot is dropped when it
/// half-open overlaps an unavailable window whose day-of-week matches the
/// date. Entries with unparseable times are skipped and counted, never
/// fatal.
pub fn build_week_grid(
    week_start: NaiveDate,
    day_start: NaiveTime,
    day_end: NaiveTime,
    slot_minutes: i64,
    unavailable: &[UnavailableWindow],
) -> WeekGrid {
    let mut windows: Vec<(u32, NaiveTime, NaiveTime)> = Vec::new();
    let mut skipped = 0usize;
    for entry in unavailable {
        let parsed = parse_time_of_day(&entry.start_time)
            .zip(parse_time_of_day(&entry.end_time))
            .filter(|(start, end)| end > start);
        match parsed {
            Some((start, end)) if entry.day_of_week <= 6 => {
                windows.push((entry.day_of_week, start, end));
            }
            _ => skipped += 1,
        }
    }

    let mut days = Vec::with_capacity(7);
    for offset in 0..7 {
        let date = week_start + Duration::days(offset);
        let dow = day_of_week_index(date);
        let mut slots = VecDeque::new();
        if slot_minutes > 0 {
            let step = Duration::minutes(slot_minutes);
            let mut cursor = day_start;
            loop {
                let (end, wrapped) = cursor.overflowing_add_signed(step);
                if wrapped != 0 || end > day_end || end <= cursor {
                    break;
                }
                let blocked = windows
                    .iter()
                    .any(|(day, w_start, w_end)| *day == dow && cursor < *w_end && end > *w_start);
                if !blocked {
                    slots.push_back(Slot { start: cursor, end });
                }
                cursor = end;
            }
        }
        days.push((date, slots));
    }

    WeekGrid {
        days,
        skipped_entries: skipped,
    }
}

/// At most one rule per book; the first rule seen for a book wins.
pub fn build_rule_index(rules: &[PlacementRule]) -> HashMap<String, PlacementRule> {
    let mut index = HashMap::new();
    for rule in rules {
        index
            .entry(rule.book_id.clone())
            .or_insert_with(|| rule.clone());
    }
    index
}

/// Remaining-occurrence counters, keyed by book id. Explicit frequencies
/// win; template default frequencies only seed the ledger when no explicit
/// frequencies were supplied. BTreeMap keeps iteration in ascending book
/// id order, which is what makes candidate ranking deterministic.
pub fn build_ledger(
    frequencies: &[BookFrequency],
    rules: &[PlacementRule],
) -> BTreeMap<String, i64> {
    let mut ledger = BTreeMap::new();
    if frequencies.is_empty() {
        for rule in rules {
            if rule.default_frequency > 0 {
                ledger
                    .entry(rule.book_id.clone())
                    .or_insert(rule.default_frequency);
            }
        }
    } else {
        for freq in frequencies {
            if freq.per_week > 0 {
                ledger.entry(freq.book_id.clone()).or_insert(freq.per_week);
            }
        }
    }
    ledger
}

fn rank_candidates(
    ledger: &BTreeMap<String, i64>,
    rules: &HashMap<String, PlacementRule>,
    slots: &VecDeque<Slot>,
) -> Vec<String> {
    let next_hour = slots.front().map(|slot| slot.start.hour());
    let mut prioritized = Vec::new();
    let mut others = Vec::new();
    for (book_id, remaining) in ledger {
        if *remaining <= 0 {
            continue;
        }
        let is_prioritized = rules.get(book_id).is_some_and(|rule| {
            rule.priority_slot.as_deref() == Some(PRIORITY_SLOT_FIRST)
                || next_hour.is_some_and(|hour| {
                    rule.time_preference
                        .is_some_and(|pref| pref.matches_hour(hour))
                })
                || (rule.consecutive_sessions && slots.len() >= 2 && *remaining >= 2)
        });
        if is_prioritized {
            prioritized.push(book_id.clone());
        } else {
            others.push(book_id.clone());
        }
    }
    prioritized.extend(others);
    prioritized
}

fn place_occurrence(
    store: &mut dyn PlanStore,
    plan_ids: &mut HashMap<NaiveDate, String>,
    date: NaiveDate,
    book_id: &str,
    slot: Slot,
) -> Result<()> {
    let daily_plan_id = match plan_ids.get(&date) {
        Some(id) => id.clone(),
        None => {
            let id = store.get_or_create_daily_plan(date)?;
            plan_ids.insert(date, id.clone());
            id
        }
    };
    store.insert_study_session(&daily_plan_id, book_id, slot.start, slot.end)?;
    Ok(())
}

/// Greedy day-by-day placement. Rounds over the week repeat while the
/// total target is unmet and the previous round placed at least one
/// occurrence. Under-scheduling is reported through the outcome, not as an
/// error; only bad input and store failures abort the run.
pub fn generate_weekly_plan(
    req: &GenerateRequest,
    store: &mut dyn PlanStore,
) -> Result<GenerateOutcome> {
    if req.total_target < 0 {
        bail!("total target occurrences must not be negative");
    }
    if req.total_target == 0 {
        return Ok(GenerateOutcome {
            placed: 0,
            requested: 0,
            skipped_unavailable: 0,
        });
    }
    if req.frequencies.is_empty() && req.rules.is_empty() {
        bail!("no subject frequencies or template rules supplied");
    }

    let grid = build_week_grid(
        req.week_start,
        req.day_start,
        req.day_end,
        req.slot_minutes,
        &req.unavailable,
    );
    let rule_index = build_rule_index(&req.rules);
    let mut ledger = build_ledger(&req.frequencies, &req.rules);

    let mut days = grid.days;
    let mut plan_ids: HashMap<NaiveDate, String> = HashMap::new();
    let mut placed: i64 = 0;

    loop {
        let placed_at_round_start = placed;
        for (date, slots) in days.iter_mut() {
            if placed >= req.total_target {
                break;
            }
            if slots.is_empty() {
                continue;
            }
            let ranked = rank_candidates(&ledger, &rule_index, slots);
            for book_id in &ranked {
                loop {
                    if placed >= req.total_target || slots.is_empty() {
                        break;
                    }
                    let remaining = ledger.get(book_id).copied().unwrap_or(0);
                    if remaining <= 0 {
                        break;
                    }
                    let wants_pair = rule_index
                        .get(book_id)
                        .is_some_and(|rule| rule.consecutive_sessions);
                    let pair_at = if wants_pair && remaining >= 2 && slots.len() >= 2 {
                        // A pair must be genuinely back-to-back; an
                        // unavailable window can leave the front of the
                        // queue with a gap, so scan for adjacency.
                        (0..slots.len() - 1).find(|&i| slots[i].end == slots[i + 1].start)
                    } else {
                        None
                    };
                    if let Some(i) = pair_at {
                        let Some(first) = slots.remove(i) else { break };
                        place_occurrence(store, &mut plan_ids, *date, book_id, first)?;
                        if let Some(count) = ledger.get_mut(book_id) {
                            *count -= 1;
                        }
                        placed += 1;
                        if placed >= req.total_target {
                            break;
                        }
                        // The second half moved into the vacated index.
                        let Some(second) = slots.remove(i) else { break };
                        place_occurrence(store, &mut plan_ids, *date, book_id, second)?;
                        if let Some(count) = ledger.get_mut(book_id) {
                            *count -= 1;
                        }
                        placed += 1;
                    } else {
                        let Some(slot) = slots.pop_front() else { break };
                        place_occurrence(store, &mut plan_ids, *date, book_id, slot)?;
                        if let Some(count) = ledger.get_mut(book_id) {
                            *count -= 1;
                        }
                        placed += 1;
                    }
                }
                if placed >= req.total_target || slots.is_empty() {
                    break;
                }
            }
        }
        if placed >= req.total_target || placed == placed_at_round_start {
            break;
        }
    }

    Ok(GenerateOutcome {
        placed,
        requested: req.total_target,
        skipped_unavailable: grid.skipped_entries,
    })
}
