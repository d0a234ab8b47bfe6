use std::fmt::Write;

use crate::models::{AnalysisResult, CalendarEvent, EventKind, StatsBucket, StudentRecord};

pub fn build_marks_report(source: &str, result: &AnalysisResult) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Grade Distribution Report");
    let _ = writeln!(output, "Generated from {source}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall");
    write_bucket(&mut output, &result.overall_stats);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Courses");

    if result.courses.is_empty() {
        let _ = writeln!(output, "No course data in this section.");
    } else {
        for (code, bucket) in result.courses.iter() {
            let _ = writeln!(output);
            let _ = writeln!(output, "### {code}");
            write_bucket(&mut output, bucket);
        }
    }

    output
}

fn write_bucket(output: &mut String, bucket: &StatsBucket) {
    let _ = writeln!(
        output,
        "- {} records, average score {:.2}",
        bucket.count, bucket.average_score
    );
    for (grade, count) in bucket.grades.iter() {
        let _ = writeln!(
            output,
            "- {}: {} ({:.1}%)",
            grade.label(),
            count,
            percent(count, bucket.count)
        );
    }
    let unbucketed = bucket.count.saturating_sub(bucket.grades.total());
    if unbucketed > 0 {
        let _ = writeln!(output, "- other grades: {unbucketed}");
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Calendar listing, oldest date first. `title` heads the document.
pub fn build_calendar_report(
    title: &str,
    student: Option<&StudentRecord>,
    events: &[CalendarEvent],
    notes: &[String],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {title}");
    if let Some(student) = student {
        let _ = writeln!(
            output,
            "Student {} ({})",
            student.student_id, student.academic_level
        );
    }
    let _ = writeln!(output);

    let mut ordered = events.to_vec();
    ordered.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.title.cmp(&b.title)));

    if ordered.is_empty() {
        let _ = writeln!(output, "No exams scheduled.");
    } else {
        for event in ordered.iter() {
            match event.kind {
                EventKind::Exam => {
                    let _ = writeln!(output, "- {}: {} [{}]", event.date, event.title, event.level);
                }
                EventKind::StudyDay => {
                    let _ = writeln!(output, "- {}: {}", event.date, event.title);
                }
            }
        }
    }

    if !notes.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Unparsed Lines");
        let _ = writeln!(
            output,
            "Some lines from the saved suggestion could not be parsed as schedule entries:"
        );
        for note in notes {
            let _ = writeln!(output, "- {note}");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use crate::models::{Grade, GradeHistogram};

    fn bucket(count: u64, sum: f64, grades: &[Grade]) -> StatsBucket {
        let mut histogram = GradeHistogram::default();
        for grade in grades {
            histogram.increment(*grade);
        }
        StatsBucket {
            total_score_sum: sum,
            count,
            grades: histogram,
            average_score: if count == 0 { 0.0 } else { sum / count as f64 },
        }
    }

    #[test]
    fn marks_report_lists_courses_in_order() {
        let mut courses = BTreeMap::new();
        courses.insert("C200".to_string(), bucket(1, 90.0, &[Grade::APlus]));
        courses.insert("C100".to_string(), bucket(2, 140.0, &[Grade::A]));
        let result = AnalysisResult {
            overall_stats: bucket(3, 230.0, &[Grade::APlus, Grade::A]),
            courses,
        };

        let report = build_marks_report("marks.csv", &result);
        assert!(report.contains("Generated from marks.csv"));
        assert!(report.contains("- 3 records, average score 76.67"));
        assert!(report.contains("- A: 1 (50.0%)"));
        assert!(report.contains("- other grades: 1"));
        let c100 = report.find("### C100").unwrap();
        let c200 = report.find("### C200").unwrap();
        assert!(c100 < c200);
    }

    #[test]
    fn calendar_report_sorts_and_lists_notes() {
        let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let events = vec![
            CalendarEvent {
                title: "CS201".to_string(),
                date: date("2024-08-22"),
                level: "Bachelor".to_string(),
                kind: EventKind::Exam,
            },
            CalendarEvent {
                title: "CS101".to_string(),
                date: date("2024-08-20"),
                level: "Unknown".to_string(),
                kind: EventKind::Exam,
            },
        ];
        let student = StudentRecord {
            student_id: "12s00125".to_string(),
            academic_level: "Bachelor".to_string(),
        };

        let report = build_calendar_report(
            "Exam Schedule",
            Some(&student),
            &events,
            &["random leftover text".to_string()],
        );
        assert!(report.contains("Student 12s00125 (Bachelor)"));
        let first = report.find("2024-08-20: CS101 [Unknown]").unwrap();
        let second = report.find("2024-08-22: CS201 [Bachelor]").unwrap();
        assert!(first < second);
        assert!(report.contains("- random leftover text"));
    }

    #[test]
    fn empty_calendar_says_so() {
        let report = build_calendar_report("Exam Schedule", None, &[], &[]);
        assert!(report.contains("No exams scheduled."));
        assert!(!report.contains("Unparsed Lines"));
    }
}
