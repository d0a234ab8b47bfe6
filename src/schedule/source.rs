use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;

use crate::error::{PortalError, Result};

/// What the schedule generator left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleSource {
    Suggestion(String),
    /// The generator ran but reported a failure of its own.
    GeneratorFailed(String),
}

#[derive(Debug, Deserialize)]
struct ScheduleResultFile {
    suggestion: Option<String>,
    error: Option<String>,
}

pub fn load_schedule_source(path: &Path) -> Result<ScheduleSource> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(PortalError::ScheduleSourceMissing {
                path: path.to_path_buf(),
            })
        }
        Err(err) => {
            return Err(PortalError::ScheduleParse {
                path: path.to_path_buf(),
                message: format!("could not read the result file: {err}"),
            })
        }
    };
    parse_schedule_source(path, &content)
}

pub fn parse_schedule_source(path: &Path, content: &str) -> Result<ScheduleSource> {
    let parsed: ScheduleResultFile =
        serde_json::from_str(content).map_err(|err| PortalError::ScheduleParse {
            path: path.to_path_buf(),
            message: format!("could not decode JSON: {err}"),
        })?;

    match parsed {
        ScheduleResultFile {
            error: Some(error), ..
        } => Ok(ScheduleSource::GeneratorFailed(error)),
        ScheduleResultFile {
            suggestion: Some(suggestion),
            ..
        } => Ok(ScheduleSource::Suggestion(suggestion)),
        _ => Err(PortalError::ScheduleParse {
            path: path.to_path_buf(),
            message: "neither a suggestion nor an error was recorded".to_string(),
        }),
    }
}
