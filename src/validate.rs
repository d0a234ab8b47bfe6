use std::collections::HashMap;

use crate::models::MarkRow;

/// A section row keyed by column name, values already stripped of quotes.
pub type FieldMap = HashMap<String, String>;

/// Turns a raw section row into a [`MarkRow`], or `None` when any of the
/// essential fields is empty or the total is not a finite number.
pub fn validate(row: &FieldMap) -> Option<MarkRow> {
    let student_id = field(row, "student_id")?;
    let course_code = field(row, "course_code")?;
    let grade = field(row, "grade")?.to_uppercase();
    let total = parse_total(field(row, "total")?)?;

    Some(MarkRow {
        student_id: student_id.to_string(),
        course_code: course_code.to_string(),
        total,
        grade,
    })
}

// Only blank counts as missing; "0" is a real id, code or grade.
fn field<'a>(row: &'a FieldMap, name: &str) -> Option<&'a str> {
    row.get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_total(raw: &str) -> Option<f64> {
    // f64::from_str also takes "inf" and "NaN", which are not marks.
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}
