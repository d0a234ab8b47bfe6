use std::collections::HashMap;

use sqlx::{PgPool, Row};
use tracing::debug;

use crate::models::{EnrolledCourse, StudentRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let courses = vec![
        ("CS101", "Introduction to Programming", "Bachelor"),
        ("CS102", "Discrete Mathematics", "Bachelor"),
        ("CS201", "Data Structures", "Bachelor"),
        ("IT110", "Computer Fundamentals", "Diploma"),
        ("IT120", "Office Applications", "Diploma"),
    ];

    for (code, name, level) in courses {
        sqlx::query(
            r#"
            INSERT INTO exam_portal.courses (course_code, course_name, academic_level)
            VALUES ($1, $2, $3)
            ON CONFLICT (course_code) DO UPDATE
            SET course_name = EXCLUDED.course_name, academic_level = EXCLUDED.academic_level
            "#,
        )
        .bind(code)
        .bind(name)
        .bind(level)
        .execute(pool)
        .await?;
    }

    let students = vec![
        ("12s00125", "Bachelor", vec!["CS101", "CS102"]),
        ("12s00225", "Bachelor", vec!["CS101", "CS201"]),
        ("10d00125", "Diploma", vec!["IT110", "IT120"]),
    ];

    for (student_id, level, enrolled) in students {
        sqlx::query(
            r#"
            INSERT INTO exam_portal.students (student_id, academic_level)
            VALUES ($1, $2)
            ON CONFLICT (student_id) DO UPDATE
            SET academic_level = EXCLUDED.academic_level
            "#,
        )
        .bind(student_id)
        .bind(level)
        .execute(pool)
        .await?;

        for code in enrolled {
            sqlx::query(
                r#"
                INSERT INTO exam_portal.course_enrollments (student_id, course_code)
                VALUES ($1, $2)
                ON CONFLICT (student_id, course_code) DO NOTHING
                "#,
            )
            .bind(student_id)
            .bind(code)
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

pub async fn fetch_student(pool: &PgPool, student_id: &str) -> anyhow::Result<Option<StudentRecord>> {
    let row = sqlx::query(
        "SELECT student_id, academic_level FROM exam_portal.students WHERE student_id = $1",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| StudentRecord {
        student_id: row.get("student_id"),
        academic_level: row.get("academic_level"),
    }))
}

pub async fn fetch_enrolled_courses(
    pool: &PgPool,
    student_id: &str,
) -> anyhow::Result<Vec<EnrolledCourse>> {
    let rows = sqlx::query(
        r#"
        SELECT ce.course_code, c.course_name, c.academic_level
        FROM exam_portal.course_enrollments ce
        JOIN exam_portal.courses c ON ce.course_code = c.course_code
        WHERE ce.student_id = $1
        ORDER BY ce.course_code
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    let mut courses = Vec::new();
    for row in rows {
        courses.push(EnrolledCourse {
            course_code: row.get("course_code"),
            course_name: row.get("course_name"),
            academic_level: row.get("academic_level"),
        });
    }

    Ok(courses)
}

/// Levels for the given course codes; codes missing from the catalogue are
/// simply absent from the map.
pub async fn fetch_course_levels(
    pool: &PgPool,
    codes: &[String],
) -> anyhow::Result<HashMap<String, String>> {
    if codes.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query(
        "SELECT course_code, academic_level FROM exam_portal.courses WHERE course_code = ANY($1)",
    )
    .bind(codes)
    .fetch_all(pool)
    .await?;

    let levels: HashMap<String, String> = rows
        .into_iter()
        .map(|row| (row.get("course_code"), row.get("academic_level")))
        .collect();
    debug!(requested = codes.len(), found = levels.len(), "course levels fetched");
    Ok(levels)
}
