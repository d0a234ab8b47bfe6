use std::path::PathBuf;

/// Terminal failures of a single analysis or extraction call.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("Could not open or read the CSV file: {}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Specified marks header was not found in the file.")]
    HeaderNotFound,

    #[error(
        "Marks header found, but essential columns (id, student_id, course_code, total, grade) are missing: {}",
        .missing.join(", ")
    )]
    MissingColumns { missing: Vec<String> },

    #[error("Marks header found, but no valid data rows followed.")]
    NoValidRows,

    #[error("Could not parse the schedule result ({}): {message}", .path.display())]
    ScheduleParse { path: PathBuf, message: String },

    #[error("Exam schedule file not found ({}). Please generate a schedule first.", .path.display())]
    ScheduleSourceMissing { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, PortalError>;
