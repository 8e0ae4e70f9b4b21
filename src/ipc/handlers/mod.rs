pub mod books;
pub mod core;
pub mod lessons;
pub mod lookups;
pub mod schedule;
pub mod students;
pub mod study_sessions;
pub mod templates;
pub mod unavailable_times;
pub mod weekly_plans;
