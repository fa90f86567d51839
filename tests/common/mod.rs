#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use funnel_kpi::Event;

pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

pub fn at(secs: i64) -> NaiveDateTime {
    let origin = NaiveDate::from_ymd_opt(2017, 4, 17)
        .and_then(|date| date.and_hms_opt(9, 0, 0))
        .expect("failed to build origin timestamp");
    origin + TimeDelta::seconds(secs)
}

pub fn event(entity_id: &str, step: &str, secs: i64, group: &str) -> Event {
    Event::new(entity_id, step, at(secs), group)
}

/// Client skipping `step_3` on its way to `confirm`.
pub fn skipping_client(group: &str) -> Vec<Event> {
    vec![
        event("A", "start", 0, group),
        event("A", "step_1", 60, group),
        event("A", "step_2", 130, group),
        event("A", "confirm", 200, group),
    ]
}

/// Client walking the whole funnel, 30 seconds per step.
pub fn complete_client(group: &str) -> Vec<Event> {
    vec![
        event("B", "start", 0, group),
        event("B", "step_1", 30, group),
        event("B", "step_2", 60, group),
        event("B", "step_3", 90, group),
        event("B", "confirm", 120, group),
    ]
}
