use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use csv::{ByteRecord, ReaderBuilder};
use regex::Regex;
use tracing::debug;

use crate::error::{PortalError, Result};
use crate::validate::FieldMap;

/// Columns a marks section must declare before any row is accepted.
pub const REQUIRED_COLUMNS: [&str; 5] = ["id", "student_id", "course_code", "total", "grade"];

pub const DEFAULT_LIMIT_LINES: usize = 10_000;

// Student-list sections open with a two-field row keyed by a bachelor id.
static STUDENT_SECTION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^12s\d{3}25$").expect("student id pattern is valid"));

/// How the start of the wanted section is recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionLocator {
    /// The header line, written the way the export writes it (every field
    /// double-quoted, comma-joined). Compared verbatim after trimming.
    ExactHeader(String),
    /// A one-field record holding this token; the next non-blank record is the header.
    Marker(String),
}

enum ScanState {
    Searching { marker_seen: bool },
    InSection { columns: Vec<String> },
    Done,
}

enum Boundary {
    EndOfSection(&'static str),
    Malformed,
    Row,
}

/// Streams the rows of one section out of a multi-section CSV export.
///
/// Yields field maps for the rows of the located section. Scanning stops at
/// the first boundary, at end of input or after `limit_lines` records. A
/// header that never shows up is reported as the last item.
pub struct SectionScanner<R: io::Read> {
    reader: BufReader<R>,
    locator: SectionLocator,
    limit_lines: usize,
    lines_read: usize,
    truncated: bool,
    state: ScanState,
    source: PathBuf,
}

impl SectionScanner<File> {
    pub fn open(path: &Path, locator: SectionLocator, limit_lines: usize) -> Result<Self> {
        let file = File::open(path).map_err(|source| PortalError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let mut scanner = Self::new(file, locator, limit_lines);
        scanner.source = path.to_path_buf();
        Ok(scanner)
    }
}

impl<R: io::Read> SectionScanner<R> {
    pub fn new(reader: R, locator: SectionLocator, limit_lines: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            locator,
            limit_lines,
            lines_read: 0,
            truncated: false,
            state: ScanState::Searching { marker_seen: false },
            source: PathBuf::from("<memory>"),
        }
    }

    /// Records consumed so far, blank lines included.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// True when the line cap stopped the scan before end of input.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Reads one logical record. Physical lines are joined while a quoted
    /// field is still open, so quoted values may contain newlines.
    fn read_record(&mut self) -> Result<Option<Vec<String>>> {
        if self.lines_read >= self.limit_lines {
            self.truncated = true;
            debug!(limit = self.limit_lines, "line limit reached, scan truncated");
            return Ok(None);
        }

        let mut raw = Vec::new();
        loop {
            let read = self
                .reader
                .read_until(b'\n', &mut raw)
                .map_err(|source| PortalError::FileAccess {
                    path: self.source.clone(),
                    source,
                })?;
            if read == 0 || !ends_inside_quotes(&raw) {
                break;
            }
        }

        if raw.is_empty() {
            return Ok(None);
        }
        self.lines_read += 1;
        Ok(Some(split_record(&raw)))
    }

    fn is_header(&self, fields: &[String], marker_seen: bool) -> bool {
        match &self.locator {
            SectionLocator::ExactHeader(header) => canonical_line(fields) == header.trim(),
            SectionLocator::Marker(_) => marker_seen,
        }
    }

    fn is_marker(&self, fields: &[String]) -> bool {
        match &self.locator {
            SectionLocator::Marker(token) => fields.len() == 1 && strip_field(&fields[0]) == token.trim(),
            SectionLocator::ExactHeader(_) => false,
        }
    }

    fn finish(&mut self) -> Option<Result<FieldMap>> {
        let searching = matches!(self.state, ScanState::Searching { .. });
        self.state = ScanState::Done;
        if searching {
            Some(Err(PortalError::HeaderNotFound))
        } else {
            None
        }
    }
}

impl<R: io::Read> Iterator for SectionScanner<R> {
    type Item = Result<FieldMap>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if matches!(self.state, ScanState::Done) {
                return None;
            }

            let fields = match self.read_record() {
                Ok(Some(fields)) => fields,
                Ok(None) => return self.finish(),
                Err(err) => {
                    self.state = ScanState::Done;
                    return Some(Err(err));
                }
            };

            match &self.state {
                ScanState::Searching { marker_seen } => {
                    let marker_seen = *marker_seen;
                    if is_blank(&fields) {
                        continue;
                    }
                    if self.is_header(&fields, marker_seen) {
                        let columns: Vec<String> = fields.iter().map(|f| strip_field(f).to_string()).collect();
                        let missing = missing_columns(&columns);
                        if !missing.is_empty() {
                            self.state = ScanState::Done;
                            return Some(Err(PortalError::MissingColumns { missing }));
                        }
                        debug!(line = self.lines_read, width = columns.len(), "section header matched");
                        self.state = ScanState::InSection { columns };
                    } else if self.is_marker(&fields) {
                        debug!(line = self.lines_read, "section marker found");
                        self.state = ScanState::Searching { marker_seen: true };
                    }
                }
                ScanState::InSection { columns } => match classify(&fields, columns.len()) {
                    Boundary::EndOfSection(reason) => {
                        debug!(line = self.lines_read, reason, "section ended");
                        self.state = ScanState::Done;
                        return None;
                    }
                    Boundary::Malformed => {
                        debug!(
                            line = self.lines_read,
                            fields = fields.len(),
                            expected = columns.len(),
                            "skipping malformed row"
                        );
                    }
                    Boundary::Row => {
                        let row = columns
                            .iter()
                            .cloned()
                            .zip(fields.iter().map(|f| strip_field(f).to_string()))
                            .collect();
                        return Some(Ok(row));
                    }
                },
                ScanState::Done => return None,
            }
        }
    }
}

/// Splits one raw record into fields. A blank line is a single empty field,
/// so inside a section it reads as a short row.
fn split_record(raw: &[u8]) -> Vec<String> {
    let line = raw
        .strip_suffix(b"\n")
        .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
        .unwrap_or(raw);
    if line.is_empty() {
        return vec![String::new()];
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line);
    let mut record = ByteRecord::new();
    match reader.read_byte_record(&mut record) {
        Ok(true) => record
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect(),
        _ => vec![String::new()],
    }
}

/// True while a field that opened with `"` has not been closed yet. A quote
/// in the middle of an unquoted field is a literal character.
fn ends_inside_quotes(raw: &[u8]) -> bool {
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut bytes = raw.iter().peekable();

    while let Some(&byte) = bytes.next() {
        if in_quotes {
            if byte == b'"' {
                if bytes.peek() == Some(&&b'"') {
                    bytes.next();
                } else {
                    in_quotes = false;
                }
            }
            continue;
        }
        match byte {
            b'"' if at_field_start => {
                in_quotes = true;
                at_field_start = false;
            }
            b',' | b'\n' => at_field_start = true,
            _ => at_field_start = false,
        }
    }

    in_quotes
}

fn is_blank(fields: &[String]) -> bool {
    fields.len() == 1 && fields[0].trim().is_empty()
}

/// Re-serializes parsed fields the way the export writes a header line.
pub fn canonical_line(fields: &[String]) -> String {
    fields
        .iter()
        .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}

fn strip_field(value: &str) -> &str {
    value.trim_matches(|c| c == ' ' || c == '"')
}

fn missing_columns(columns: &[String]) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter(|required| !columns.iter().any(|c| c == *required))
        .map(|required| required.to_string())
        .collect()
}

fn is_upper_word(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_uppercase())
}

// Sibling sections are guessed from their shape; a data row can
// coincidentally match, which ends the section early.
fn classify(fields: &[String], width: usize) -> Boundary {
    if fields.len() < width {
        return Boundary::EndOfSection("short row");
    }
    if fields.len() == 3 && is_upper_word(strip_field(&fields[0])) {
        return Boundary::EndOfSection("upper-case section header");
    }
    if fields.len() == 2 && STUDENT_SECTION_ID.is_match(strip_field(&fields[0])) {
        return Boundary::EndOfSection("student section header");
    }
    if fields.len() != width {
        return Boundary::Malformed;
    }
    Boundary::Row
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#""id","student_id","course_code","total","grade""#;

    fn scan(input: &str, locator: SectionLocator, limit: usize) -> Vec<Result<FieldMap>> {
        SectionScanner::new(input.as_bytes(), locator, limit).collect()
    }

    fn exact() -> SectionLocator {
        SectionLocator::ExactHeader(HEADER.to_string())
    }

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn canonical_line_quotes_and_escapes() {
        assert_eq!(canonical_line(&fields(&["id", "say \"hi\""])), r#""id","say ""hi""""#);
    }

    #[test]
    fn yields_rows_after_exact_header() {
        let input = format!(
            "\"COURSES\",\"x\",\"y\"\n{HEADER}\n\"1\",\"S1\",\"C100\",\"85\",\"A\"\n\"2\",\"S2\",\" C100 \",\"55\",\"F\"\n"
        );
        let rows: Vec<FieldMap> = scan(&input, exact(), DEFAULT_LIMIT_LINES)
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["student_id"], "S1");
        assert_eq!(rows[1]["course_code"], "C100");
    }

    #[test]
    fn header_match_is_exact() {
        let loose = "id,student_id,course_code,total,grade\n1,S1,C100,85,A\n";
        // Unquoted fields re-serialize with quotes, so this still matches.
        assert_eq!(scan(loose, exact(), 100).len(), 1);

        let other_order = "\"student_id\",\"id\",\"course_code\",\"total\",\"grade\"\n1,S1,C100,85,A\n";
        let results = scan(other_order, exact(), 100);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(PortalError::HeaderNotFound)));
    }

    #[test]
    fn missing_columns_stop_before_rows() {
        let header = r#""id","student_id","course_code","total""#;
        let input = format!("{header}\n1,S1,C100,85\n");
        let results = scan(&input, SectionLocator::ExactHeader(header.to_string()), 100);

        assert_eq!(results.len(), 1);
        match &results[0] {
            Err(PortalError::MissingColumns { missing }) => assert_eq!(missing, &vec!["grade".to_string()]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn short_row_ends_section() {
        let input = format!("{HEADER}\n1,S1,C100,85,A\n\"STUDENTS\",\"x\"\n2,S2,C100,55,F\n");
        let rows = scan(&input, exact(), 100);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn blank_line_ends_section() {
        let input = format!("{HEADER}\n1,S1,C100,85,A\n\n2,S2,C100,55,F\n");
        let rows = scan(&input, exact(), 100);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn wide_rows_are_skipped_not_terminal() {
        let input = format!("{HEADER}\n1,S1,C100,85,A,extra\n2,S2,C100,55,F\n");
        let rows: Vec<FieldMap> = scan(&input, exact(), 100).into_iter().collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "2");
    }

    #[test]
    fn shape_heuristics_apply_to_narrow_schemas() {
        assert!(matches!(classify(&fields(&["COURSES", "a", "b"]), 3), Boundary::EndOfSection(_)));
        assert!(matches!(classify(&fields(&["Courses", "a", "b"]), 3), Boundary::Row));
        assert!(matches!(classify(&fields(&["12s00125", "Bachelor"]), 2), Boundary::EndOfSection(_)));
        assert!(matches!(classify(&fields(&["10d00125", "Diploma"]), 2), Boundary::Row));
        assert!(matches!(classify(&fields(&["a", "b", "c", "d"]), 3), Boundary::Malformed));
    }

    #[test]
    fn upper_case_three_field_line_ends_section() {
        let header = r#""id","student_id","course_code","total","grade""#;
        let input = format!("{header}\n1,S1,C100,85,A\n\"CS101\",\"Intro\",\"Bachelor\"\n2,S2,C100,55,F\n");
        // Any three-field line is shorter than the five-column schema.
        assert_eq!(scan(&input, exact(), 100).len(), 1);
        assert!(is_upper_word("COURSES"));
        assert!(!is_upper_word("CS101"));
        assert!(!is_upper_word(""));
    }

    #[test]
    fn limit_truncates_search_into_header_not_found() {
        let input = format!("a,b\nc,d\n{HEADER}\n1,S1,C100,85,A\n");
        let results = scan(&input, exact(), 2);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(PortalError::HeaderNotFound)));

        let mut scanner = SectionScanner::new(input.as_bytes(), exact(), 3);
        assert!(scanner.next().is_none());
        assert!(scanner.truncated());
    }

    #[test]
    fn quoted_fields_may_span_lines() {
        let input = format!("\"note\",\"multi\nline\"\n\n{HEADER}\n1,S1,C100,85,A\n2,S2,C100,55,F\n");
        let rows = scan(&input, exact(), 100);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn stray_quote_inside_unquoted_field_stays_on_its_line() {
        let input = format!(
            "{HEADER}\n1,S1,C100,85,A\"\n2,S2,C100,55,F\n3,S3,C100,70,B\"\n4,S4,C100,60,C\n"
        );
        let rows: Vec<FieldMap> = scan(&input, exact(), 100).into_iter().collect::<Result<_>>().unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["grade"], "A");
        assert_eq!(rows[1]["student_id"], "S2");
        assert_eq!(rows[3]["grade"], "C");
    }

    #[test]
    fn quote_state_tracks_field_openings() {
        assert!(!ends_inside_quotes(b"1,S1,C100,85,A\"\n"));
        assert!(ends_inside_quotes(b"\"note\",\"multi\n"));
        assert!(!ends_inside_quotes(b"\"say \"\"hi\"\"\",2\n"));
        assert!(ends_inside_quotes(b"1,\"open \"\" still\n"));
    }

    #[test]
    fn marker_locator_takes_following_record_as_header() {
        let input = "\"marks\"\nid,student_id,course_code,total,grade,created_at\n1,S1,C100,85,A,2025-01-01\n";
        let mut scanner = SectionScanner::new(input.as_bytes(), SectionLocator::Marker("marks".into()), 100);
        let row = scanner.next().unwrap().unwrap();
        assert_eq!(row["grade"], "A");
        assert_eq!(row.len(), 6);
        assert!(scanner.next().is_none());
    }

    #[test]
    fn open_reports_missing_file() {
        let err = SectionScanner::open(Path::new("/definitely/not/here.csv"), exact(), 10)
            .err()
            .unwrap();
        assert!(matches!(err, PortalError::FileAccess { .. }));
    }
}
