use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::config::AnalyzerConfig;
use crate::error::{PortalError, Result};
use crate::models::AnalysisResult;
use crate::section::SectionScanner;
use crate::stats::StatsAggregator;
use crate::validate::validate;

/// Grade distribution for the marks section of the export at `path`.
///
/// Every failure comes back as a [`PortalError`]; a section whose rows all
/// fail validation is an error rather than an empty result.
pub fn analyze(path: &Path, config: &AnalyzerConfig) -> Result<AnalysisResult> {
    let scanner = SectionScanner::open(path, config.locator.clone(), config.limit_lines)?;
    let result = aggregate(scanner)?;
    info!(
        path = %path.display(),
        rows = result.overall_stats.count,
        courses = result.courses.len(),
        "marks analysis complete"
    );
    Ok(result)
}

fn aggregate<R: Read>(mut scanner: SectionScanner<R>) -> Result<AnalysisResult> {
    let mut stats = StatsAggregator::new();
    let mut rejected = 0usize;

    for row in &mut scanner {
        match validate(&row?) {
            Some(mark) => stats.ingest(&mark),
            None => rejected += 1,
        }
    }

    debug!(
        lines = scanner.lines_read(),
        truncated = scanner.truncated(),
        accepted = stats.count(),
        rejected,
        "section scan finished"
    );

    if stats.count() == 0 {
        return Err(PortalError::NoValidRows);
    }
    Ok(stats.finalize())
}
