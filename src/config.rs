use std::path::PathBuf;

use clap::Args;

use crate::section::{SectionLocator, DEFAULT_LIMIT_LINES};

/// Header of the marks table in the registry's combined export.
pub const DEFAULT_MARKS_HEADER: &str =
    r#""id","student_id","course_code","test1","midterm","test2","assignment","total","grade","created_at""#;

/// Where the schedule generator drops its result.
pub const DEFAULT_SCHEDULE_FILE: &str = "process/schedule_result.json";

/// Settings shared by every command.
#[derive(Debug, Clone, Args)]
pub struct PortalConfig {
    /// Postgres connection string for student and course lookups
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// Schedule result written by the generator
    #[arg(long = "schedule-file", env = "SCHEDULE_FILE_PATH", default_value = DEFAULT_SCHEDULE_FILE, global = true)]
    pub schedule_file: PathBuf,
}

/// What the marks analyzer looks for and how far it reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    pub locator: SectionLocator,
    pub limit_lines: usize,
}

impl AnalyzerConfig {
    pub fn exact_header(header: impl Into<String>) -> Self {
        Self {
            locator: SectionLocator::ExactHeader(header.into()),
            limit_lines: DEFAULT_LIMIT_LINES,
        }
    }

    /// Section opened by a one-field `token` record; the next record is the header.
    pub fn marker(token: impl Into<String>) -> Self {
        Self {
            locator: SectionLocator::Marker(token.into()),
            limit_lines: DEFAULT_LIMIT_LINES,
        }
    }

    pub fn with_limit(mut self, limit_lines: usize) -> Self {
        self.limit_lines = limit_lines;
        self
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::exact_header(DEFAULT_MARKS_HEADER)
    }
}
