use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::line::{parse_line, PayloadGrammar, ScheduleLine, STUDY_DAY};
use crate::models::{CalendarEvent, EventKind, ScheduleEntry};

pub const UNKNOWN_LEVEL: &str = "Unknown";

/// Date-keyed schedule. Keeps first-seen order; a repeated date replaces
/// the earlier entry in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScheduleMap {
    entries: Vec<ScheduleEntry>,
}

impl ScheduleMap {
    pub fn insert(&mut self, entry: ScheduleEntry) {
        match self.entries.iter_mut().find(|existing| existing.date == entry.date) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Same entries, ascending by date.
    pub fn sorted(mut self) -> Self {
        self.entries.sort_by_key(|entry| entry.date);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub schedule: ScheduleMap,
    pub notes: Vec<String>,
}

/// Reads a generator suggestion into a schedule plus the lines it could not place.
pub fn extract(text: &str, grammar: PayloadGrammar) -> Extraction {
    let mut extraction = Extraction::default();
    let mut ignored = 0usize;

    for line in text.lines() {
        match parse_line(line, grammar) {
            ScheduleLine::Entry(entry) => extraction.schedule.insert(entry),
            ScheduleLine::Note(note) => extraction.notes.push(note),
            ScheduleLine::Ignored => ignored += 1,
        }
    }

    debug!(
        days = extraction.schedule.len(),
        notes = extraction.notes.len(),
        ignored,
        "suggestion parsed"
    );
    extraction
}

/// [`extract`] with the schedule ordered by date.
pub fn extract_sorted(text: &str, grammar: PayloadGrammar) -> Extraction {
    let extraction = extract(text, grammar);
    Extraction {
        schedule: extraction.schedule.sorted(),
        notes: extraction.notes,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOptions {
    /// Emit a placeholder event for days without exams.
    pub include_study_days: bool,
}

/// Every exam in the schedule, as calendar events.
pub fn master_calendar(
    schedule: &ScheduleMap,
    levels: &HashMap<String, String>,
    options: EventOptions,
) -> Vec<CalendarEvent> {
    build_events(schedule, levels, options, |_| true)
}

/// Exams for the courses a student is enrolled in.
pub fn join_for_student(
    schedule: &ScheduleMap,
    enrolled: &HashSet<String>,
    levels: &HashMap<String, String>,
    options: EventOptions,
) -> Vec<CalendarEvent> {
    build_events(schedule, levels, options, |code| enrolled.contains(code))
}

fn build_events(
    schedule: &ScheduleMap,
    levels: &HashMap<String, String>,
    options: EventOptions,
    wanted: impl Fn(&str) -> bool,
) -> Vec<CalendarEvent> {
    let mut events = Vec::new();

    for entry in schedule.iter() {
        if entry.is_study_day {
            if options.include_study_days {
                events.push(CalendarEvent {
                    title: STUDY_DAY.to_string(),
                    date: entry.date,
                    level: UNKNOWN_LEVEL.to_string(),
                    kind: EventKind::StudyDay,
                });
            }
            continue;
        }

        for code in entry.course_codes.iter().filter(|code| wanted(code)) {
            events.push(CalendarEvent {
                title: code.clone(),
                date: entry.date,
                level: levels
                    .get(code)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_LEVEL.to_string()),
                kind: EventKind::Exam,
            });
        }
    }

    events
}

/// Distinct course codes across the schedule, for a single level lookup.
pub fn collect_course_codes(schedule: &ScheduleMap) -> Vec<String> {
    schedule
        .iter()
        .flat_map(|entry| entry.course_codes.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
