//! Exam schedule suggestions: line classification, the date-keyed schedule
//! and the calendar views built from it.

mod extract;
mod line;
mod source;

pub use extract::{
    collect_course_codes, extract, extract_sorted, join_for_student, master_calendar, EventOptions,
};
pub use line::PayloadGrammar;
pub use source::{load_schedule_source, ScheduleSource};
