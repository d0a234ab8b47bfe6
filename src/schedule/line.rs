use std::sync::LazyLock;

use chrono::NaiveDate;
use clap::ValueEnum;
use regex::Regex;

use crate::models::ScheduleEntry;

/// Payload sentinel for a day without exams.
pub const STUDY_DAY: &str = "Study Day";

static ENTRY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\s*(\d{4}-\d{2}-\d{2})\s*:\s*(.*)$").expect("entry pattern is valid")
});

static DATE_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("date pattern is valid"));

// Generator chatter around the numbered list.
static PREAMBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(here is|based on|schedule|note:|```)").expect("preamble pattern is valid")
});

/// How the text after `N. YYYY-MM-DD:` is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PayloadGrammar {
    /// Zero or more comma-separated course codes; nothing means a study day.
    #[default]
    CommaList,
    /// Exactly one course code or the study-day sentinel.
    SingleItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleLine {
    Entry(ScheduleEntry),
    /// Text that is neither an entry nor known filler; kept for display.
    Note(String),
    /// Blank lines, preamble and stray date fragments.
    Ignored,
}

pub fn parse_line(line: &str, grammar: PayloadGrammar) -> ScheduleLine {
    let line = line.trim();
    if line.is_empty() {
        return ScheduleLine::Ignored;
    }

    if let Some(caps) = ENTRY_LINE.captures(line) {
        return match build_entry(&caps[1], caps[2].trim(), grammar) {
            Some(entry) => ScheduleLine::Entry(entry),
            None => ScheduleLine::Note(line.to_string()),
        };
    }

    if DATE_FRAGMENT.is_match(line) || PREAMBLE.is_match(line) {
        return ScheduleLine::Ignored;
    }
    ScheduleLine::Note(line.to_string())
}

fn build_entry(date: &str, payload: &str, grammar: PayloadGrammar) -> Option<ScheduleEntry> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;

    let items: Vec<&str> = match grammar {
        PayloadGrammar::CommaList => payload
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect(),
        PayloadGrammar::SingleItem if payload.is_empty() => return None,
        PayloadGrammar::SingleItem => vec![payload],
    };

    // First occurrence keeps its place; repeats on the same line are dropped.
    let mut course_codes: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if item.eq_ignore_ascii_case(STUDY_DAY) || course_codes.iter().any(|code| code == item) {
            continue;
        }
        course_codes.push(item.to_string());
    }

    Some(ScheduleEntry {
        date,
        is_study_day: course_codes.is_empty(),
        course_codes,
    })
}
