//! Parsing for uploaded rules/sessions CSV files.
//!
//! The first line is a header and is skipped; blank lines and lines
//! beginning with `#` are ignored. Every remaining row must carry all of
//! its columns non-empty or the whole upload fails.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord};

use super::domain::{EnrollmentRule, SessionOption};
use super::service::RegistrationError;

/// Parse an enrollment-rules upload: school, curriculum, grade, course id.
pub fn parse_rules<R: Read>(reader: R) -> Result<Vec<EnrollmentRule>, RegistrationError> {
    let mut rules = Vec::new();
    for record in records(reader)? {
        let record = record?;
        if is_blank(&record) {
            continue;
        }
        let [school, curriculum, grade, course_id] = required_columns(&record)?;
        rules.push(EnrollmentRule {
            school,
            curriculum,
            grade,
            course_id,
        });
    }

    if rules.is_empty() {
        return Err(RegistrationError::EmptyUpload);
    }
    Ok(rules)
}

/// Parse a session-options upload: curriculum, session range, course id.
pub fn parse_sessions<R: Read>(reader: R) -> Result<Vec<SessionOption>, RegistrationError> {
    let mut sessions = Vec::new();
    for record in records(reader)? {
        let record = record?;
        if is_blank(&record) {
            continue;
        }
        let [curriculum, session_range, course_id] = required_columns(&record)?;
        sessions.push(SessionOption {
            curriculum,
            session_range,
            course_id,
        });
    }

    if sessions.is_empty() {
        return Err(RegistrationError::EmptyUpload);
    }
    Ok(sessions)
}

fn records<R: Read>(
    reader: R,
) -> Result<impl Iterator<Item = Result<StringRecord, RegistrationError>>, RegistrationError> {
    let csv_reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader);
    Ok(csv_reader.into_records().map(|record| {
        record.map_err(|err| RegistrationError::MalformedUploadRow(err.to_string()))
    }))
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.is_empty())
}

fn required_columns<const N: usize>(
    record: &StringRecord,
) -> Result<[String; N], RegistrationError> {
    let mut columns: [String; N] = std::array::from_fn(|_| String::new());
    for (idx, column) in columns.iter_mut().enumerate() {
        match record.get(idx) {
            Some(value) if !value.is_empty() => *column = value.to_string(),
            _ => return Err(RegistrationError::MalformedUploadRow(render_row(record))),
        }
    }
    Ok(columns)
}

fn render_row(record: &StringRecord) -> String {
    record.iter().collect::<Vec<_>>().join(",")
}
