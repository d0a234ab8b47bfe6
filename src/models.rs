use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// The six grade buckets, in canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Grade {
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub const ALL: [Grade; 6] = [Grade::APlus, Grade::A, Grade::B, Grade::C, Grade::D, Grade::F];

    /// Matches an already normalized (trimmed, upper-cased) grade label.
    pub fn from_label(label: &str) -> Option<Grade> {
        match label {
            "A+" => Some(Grade::APlus),
            "A" => Some(Grade::A),
            "B" => Some(Grade::B),
            "C" => Some(Grade::C),
            "D" => Some(Grade::D),
            "F" => Some(Grade::F),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// A validated marks row. Columns other than these are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkRow {
    pub student_id: String,
    pub course_code: String,
    pub total: f64,
    /// Trimmed and upper-cased; may be outside the six known buckets.
    pub grade: String,
}

impl MarkRow {
    pub fn grade_bucket(&self) -> Option<Grade> {
        Grade::from_label(&self.grade)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradeHistogram {
    counts: [u64; 6],
}

impl GradeHistogram {
    pub fn increment(&mut self, grade: Grade) {
        self.counts[grade.index()] += 1;
    }

    pub fn get(&self, grade: Grade) -> u64 {
        self.counts[grade.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Grade, u64)> + '_ {
        Grade::ALL.iter().map(move |grade| (*grade, self.get(*grade)))
    }
}

impl Serialize for GradeHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Grade::ALL.len()))?;
        for (grade, count) in self.iter() {
            map.serialize_entry(grade.label(), &count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsBucket {
    pub total_score_sum: f64,
    pub count: u64,
    pub grades: GradeHistogram,
    /// Filled in by finalization; zero while the scan is running.
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub overall_stats: StatsBucket,
    pub courses: BTreeMap<String, StatsBucket>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub date: NaiveDate,
    pub course_codes: Vec<String>,
    pub is_study_day: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Exam,
    StudyDay,
}

/// One calendar cell. For exams the title is the course code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub title: String,
    pub date: NaiveDate,
    pub level: String,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub student_id: String,
    pub academic_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrolledCourse {
    pub course_code: String,
    pub course_name: String,
    pub academic_level: String,
}
