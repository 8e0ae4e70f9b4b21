#[path = "../src/scheduler.rs"]
mod scheduler;

use chrono::{NaiveDate, NaiveTime};
use scheduler::{build_week_grid, day_of_week_index, UnavailableWindow};

fn t(raw: &str) -> NaiveTime {
    NaiveTime::parse_from_str(raw, "%H:%M:%S").expect("time literal")
}

fn d(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date literal")
}

fn window(day: u32, start: &str, end: &str) -> UnavailableWindow {
    UnavailableWindow {
        day_of_week: day,
        start_time: start.to_string(),
        end_time: end.to_string(),
        is_recurring: true,
    }
}

#[test]
fn full_week_emits_fixed_slots_per_day() {
    // 08:00 to 22:00 in 100-minute steps fits 8 whole slots.
    let grid = build_week_grid(d("2026-03-01"), t("08:00:00"), t("22:00:00"), 100, &[]);
    assert_eq!(grid.days.len(), 7);
    assert_eq!(grid.skipped_entries, 0);
    for (i, (date, slots)) in grid.days.iter().enumerate() {
        assert_eq!(*date, d("2026-03-01") + chrono::Duration::days(i as i64));
        assert_eq!(slots.len(), 8, "day {}", date);
        let first = slots.front().expect("first slot");
        assert_eq!(first.start, t("08:00:00"));
        assert_eq!(first.end, t("09:40:00"));
        let last = slots.back().expect("last slot");
        assert_eq!(last.end, t("21:20:00"));
    }
}

#[test]
fn no_partial_slot_past_day_end() {
    // 3 hours fits exactly one 100-minute slot; the second would overrun.
    let grid = build_week_grid(d("2026-03-01"), t("08:00:00"), t("11:00:00"), 100, &[]);
    for (_, slots) in &grid.days {
        assert_eq!(slots.len(), 1);
    }
}

#[test]
fn day_end_not_after_day_start_yields_empty_days() {
    let grid = build_week_grid(d("2026-03-01"), t("22:00:00"), t("08:00:00"), 100, &[]);
    for (_, slots) in &grid.days {
        assert!(slots.is_empty());
    }
    let grid = build_week_grid(d("2026-03-01"), t("08:00:00"), t("08:00:00"), 100, &[]);
    for (_, slots) in &grid.days {
        assert!(slots.is_empty());
    }
}

#[test]
fn unavailable_window_blocks_overlapping_slots_on_matching_day_only() {
    // 2026-03-01 is a Sunday, so day_of_week 2 is Tuesday 2026-03-03.
    let week_start = d("2026-03-01");
    assert_eq!(day_of_week_index(week_start), 0);
    let grid = build_week_grid(
        week_start,
        t("08:00:00"),
        t("22:00:00"),
        100,
        &[window(2, "09:00:00", "12:00:00")],
    );
    let (tuesday, tuesday_slots) = &grid.days[2];
    assert_eq!(day_of_week_index(*tuesday), 2);
    // 08:00-09:40, 09:40-11:20 and 11:20-13:00 all overlap the window;
    // 13:00 onward survives.
    assert_eq!(tuesday_slots.len(), 5);
    assert_eq!(tuesday_slots.front().expect("slot").start, t("13:00:00"));
    for (i, (_, slots)) in grid.days.iter().enumerate() {
        if i != 2 {
            assert_eq!(slots.len(), 8);
        }
    }
}

#[test]
fn touching_windows_do_not_block() {
    // Half-open comparison: a window ending exactly at a slot start (or
    // starting at its end) leaves the slot available.
    let grid = build_week_grid(
        d("2026-03-01"),
        t("08:00:00"),
        t("22:00:00"),
        100,
        &[window(0, "06:00:00", "08:00:00"), window(0, "09:40:00", "11:20:00")],
    );
    let (_, sunday_slots) = &grid.days[0];
    assert_eq!(sunday_slots.front().expect("slot").start, t("08:00:00"));
    // Only the 09:40-11:20 slot is gone.
    assert_eq!(sunday_slots.len(), 7);
}

#[test]
fn full_day_window_empties_the_day() {
    let grid = build_week_grid(
        d("2026-03-01"),
        t("08:00:00"),
        t("22:00:00"),
        100,
        &[window(4, "00:00:00", "23:59:59")],
    );
    assert!(grid.days[4].1.is_empty());
    assert_eq!(grid.days[3].1.len(), 8);
}

#[test]
fn malformed_entries_are_skipped_and_counted() {
    let grid = build_week_grid(
        d("2026-03-01"),
        t("08:00:00"),
        t("22:00:00"),
        100,
        &[
            window(1, "not-a-time", "12:00:00"),
            window(1, "09:00:00", "nope"),
            window(1, "12:00:00", "10:00:00"), // end before start
            window(9, "09:00:00", "10:00:00"), // bad weekday
            window(1, "09:00:00", "10:00:00"), // the one valid entry
        ],
    );
    assert_eq!(grid.skipped_entries, 4);
    // The valid window blocks the 08:00-09:40 and 09:40-11:20 slots.
    let (_, monday_slots) = &grid.days[1];
    assert_eq!(monday_slots.len(), 6);
    assert_eq!(monday_slots.front().expect("slot").start, t("11:20:00"));
}

#[test]
fn zero_slot_minutes_yields_empty_grid() {
    let grid = build_week_grid(d("2026-03-01"), t("08:00:00"), t("22:00:00"), 0, &[]);
    for (_, slots) in &grid.days {
        assert!(slots.is_empty());
    }
}
