use std::collections::BTreeMap;

use crate::models::{AnalysisResult, MarkRow, StatsBucket};

/// Running totals over validated marks rows, overall and per course.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    overall: StatsBucket,
    courses: BTreeMap<String, StatsBucket>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, row: &MarkRow) {
        add_row(&mut self.overall, row);
        let course = self.courses.entry(row.course_code.clone()).or_default();
        add_row(course, row);
    }

    pub fn count(&self) -> u64 {
        self.overall.count
    }

    /// Computes every average and hands back the immutable result.
    /// Courses come out in ascending code order.
    pub fn finalize(self) -> AnalysisResult {
        let mut overall_stats = self.overall;
        overall_stats.average_score = average(&overall_stats);

        let courses = self
            .courses
            .into_iter()
            .map(|(code, mut bucket)| {
                bucket.average_score = average(&bucket);
                (code, bucket)
            })
            .collect();

        AnalysisResult {
            overall_stats,
            courses,
        }
    }
}

fn add_row(bucket: &mut StatsBucket, row: &MarkRow) {
    bucket.total_score_sum += row.total;
    bucket.count += 1;
    if let Some(grade) = row.grade_bucket() {
        bucket.grades.increment(grade);
    }
}

pub fn average(bucket: &StatsBucket) -> f64 {
    if bucket.count == 0 {
        0.0
    } else {
        round2(bucket.total_score_sum / bucket.count as f64)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Grade;

    fn mark(student: &str, course: &str, total: f64, grade: &str) -> MarkRow {
        MarkRow {
            student_id: student.to_string(),
            course_code: course.to_string(),
            total,
            grade: grade.to_string(),
        }
    }

    #[test]
    fn aggregates_overall_and_per_course() {
        let mut stats = StatsAggregator::new();
        stats.ingest(&mark("S1", "C200", 90.0, "A+"));
        stats.ingest(&mark("S1", "C100", 85.0, "A"));
        stats.ingest(&mark("S2", "C100", 55.0, "F"));

        let result = stats.finalize();
        assert_eq!(result.overall_stats.count, 3);
        assert!((result.overall_stats.average_score - 76.67).abs() < 1e-9);

        let codes: Vec<&String> = result.courses.keys().collect();
        assert_eq!(codes, vec!["C100", "C200"]);

        let c100 = &result.courses["C100"];
        assert_eq!(c100.count, 2);
        assert!((c100.average_score - 70.0).abs() < 1e-9);
        assert_eq!(c100.grades.get(Grade::A), 1);
        assert_eq!(c100.grades.get(Grade::F), 1);
        assert_eq!(c100.grades.get(Grade::APlus), 0);

        let per_course: u64 = result.courses.values().map(|b| b.count).sum();
        assert_eq!(per_course, result.overall_stats.count);
    }

    #[test]
    fn unrecognized_grades_count_but_skip_histogram() {
        let mut stats = StatsAggregator::new();
        stats.ingest(&mark("S1", "C100", 40.0, "INC"));
        stats.ingest(&mark("S2", "C100", 60.0, "C"));

        let result = stats.finalize();
        let bucket = &result.overall_stats;
        assert_eq!(bucket.count, 2);
        assert!((bucket.total_score_sum - 100.0).abs() < 1e-9);
        assert_eq!(bucket.grades.total(), 1);
        assert!(bucket.grades.total() < bucket.count);
    }

    #[test]
    fn empty_bucket_averages_to_zero() {
        let result = StatsAggregator::new().finalize();
        assert_eq!(result.overall_stats.count, 0);
        assert_eq!(result.overall_stats.average_score, 0.0);
        assert!(result.courses.is_empty());
    }

    #[test]
    fn averages_round_to_two_places() {
        assert_eq!(round2(70.0), 70.0);
        assert_eq!(round2(2.0 / 3.0), 0.67);
        assert_eq!(round2(-2.5), -2.5);

        let mut stats = StatsAggregator::new();
        for total in [10.0, 10.0, 11.0] {
            stats.ingest(&mark("S", "C1", total, "D"));
        }
        assert_eq!(stats.count(), 3);
        assert_eq!(stats.finalize().courses["C1"].average_score, 10.33);
    }
}
