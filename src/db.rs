use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("studyplanner.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS majors(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone_number TEXT,
            grade_id TEXT,
            major_id TEXT,
            FOREIGN KEY(grade_id) REFERENCES grades(id),
            FOREIGN KEY(major_id) REFERENCES majors(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS books(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            grade_id TEXT,
            FOREIGN KEY(grade_id) REFERENCES grades(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lessons(
            id TEXT PRIMARY KEY,
            book_id TEXT NOT NULL,
            name TEXT NOT NULL,
            estimated_study_time_minutes INTEGER,
            FOREIGN KEY(book_id) REFERENCES books(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lessons_book ON lessons(book_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS unavailable_times(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            title TEXT,
            day_of_week INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            is_recurring INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_unavailable_times_student ON unavailable_times(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_templates(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            target_grade_id TEXT,
            target_major_id TEXT,
            total_study_blocks_per_week INTEGER NOT NULL,
            FOREIGN KEY(target_grade_id) REFERENCES grades(id),
            FOREIGN KEY(target_major_id) REFERENCES majors(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS template_rules(
            id TEXT PRIMARY KEY,
            template_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            default_frequency INTEGER NOT NULL,
            priority_slot TEXT,
            time_preference TEXT,
            consecutive_sessions INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(template_id) REFERENCES schedule_templates(id),
            FOREIGN KEY(book_id) REFERENCES books(id),
            UNIQUE(template_id, book_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_template_rules_template ON template_rules(template_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS weekly_plans(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            start_date_of_week TEXT NOT NULL,
            day_start_time TEXT,
            max_study_hours_per_week INTEGER,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_weekly_plans_student ON weekly_plans(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_frequencies(
            id TEXT PRIMARY KEY,
            weekly_plan_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            frequency_per_week INTEGER NOT NULL,
            FOREIGN KEY(weekly_plan_id) REFERENCES weekly_plans(id),
            FOREIGN KEY(book_id) REFERENCES books(id),
            UNIQUE(weekly_plan_id, book_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subject_frequencies_plan ON subject_frequencies(weekly_plan_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS daily_plans(
            id TEXT PRIMARY KEY,
            weekly_plan_id TEXT NOT NULL,
            plan_date TEXT NOT NULL,
            FOREIGN KEY(weekly_plan_id) REFERENCES weekly_plans(id),
            UNIQUE(weekly_plan_id, plan_date)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_daily_plans_weekly_plan ON daily_plans(weekly_plan_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS study_sessions(
            id TEXT PRIMARY KEY,
            daily_plan_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            is_completed INTEGER NOT NULL DEFAULT 0,
            completion_date TEXT,
            FOREIGN KEY(daily_plan_id) REFERENCES daily_plans(id),
            FOREIGN KEY(book_id) REFERENCES books(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_study_sessions_daily_plan ON study_sessions(daily_plan_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_study_sessions_book ON study_sessions(book_id)",
        [],
    )?;

    Ok(conn)
}
