//! CSV projection of stored registrations (and optional surveys).

use std::collections::BTreeMap;

use mime::Mime;
use tracing::warn;

use super::domain::{RegistrationRecord, SurveySubmission, UserAccount};
use super::repository::{NameSubstitutionPolicy, UserDirectory};
use super::service::RegistrationError;

pub const EXPORT_FILENAME: &str = "registrations.csv";

const BASE_HEADER: [&str; 10] = [
    "username",
    "first_name",
    "last_name",
    "employee_id",
    "email",
    "phone",
    "school",
    "grade",
    "session_range",
    "curriculum",
];

/// Which export surface is being produced. The administrative variant adds
/// the registration date column and filters out operator-internal accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportVariant {
    Standard,
    Admin,
}

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub variant: ExportVariant,
    pub include_survey: bool,
}

/// A finished export ready to be written to the wire.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: &'static str,
    pub content_type: Mime,
    pub body: Vec<u8>,
}

/// Project registrations into header + rows.
///
/// Records are ordered by timestamp ascending. A record is skipped (with a
/// log line) when its user no longer resolves; the admin variant also skips
/// accounts under the operator's internal domain.
pub fn project<U>(
    mut entries: Vec<(RegistrationRecord, Option<SurveySubmission>)>,
    directory: &U,
    names: &dyn NameSubstitutionPolicy,
    options: ExportOptions,
    internal_domain: Option<&str>,
) -> Result<CsvExport, RegistrationError>
where
    U: UserDirectory + ?Sized,
{
    entries.sort_by_key(|(record, _)| record.timestamp);

    // Display label -> question id, ordered lexicographically by label.
    let mut survey_columns: BTreeMap<String, String> = BTreeMap::new();
    if options.include_survey {
        for (_, survey) in &entries {
            let Some(survey) = survey else { continue };
            for answer in &survey.answers {
                survey_columns.insert(
                    survey_label(&answer.question_id),
                    answer.question_id.clone(),
                );
            }
        }
    }

    let mut header: Vec<String> = BASE_HEADER.iter().map(|name| name.to_string()).collect();
    if options.variant == ExportVariant::Admin {
        header.push("registration_date".to_string());
    }
    if options.include_survey {
        header.push("survey_version".to_string());
        header.extend(survey_columns.keys().cloned());
    }

    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer.write_record(&header)?;

        for (record, survey) in &entries {
            let Some(account) = directory.resolve(&record.username) else {
                warn!(username = %record.username, "skipping unresolvable user in export");
                continue;
            };
            if options.variant == ExportVariant::Admin
                && is_internal(&account.email, internal_domain)
            {
                continue;
            }

            let (first_name, last_name) = split_realname(&account);
            let mut row = vec![
                names.substitute(&record.username),
                first_name,
                last_name,
                record.employee_id.clone().unwrap_or_default(),
                account.email.clone(),
                record.phone.clone().unwrap_or_default(),
                record.school.clone(),
                record.grade.clone(),
                record.session_range.clone(),
                record.curriculum.clone(),
            ];
            if options.variant == ExportVariant::Admin {
                row.push(record.timestamp.to_rfc3339());
            }
            if options.include_survey {
                row.push(
                    survey
                        .as_ref()
                        .map(|survey| survey.survey_version.clone())
                        .unwrap_or_default(),
                );
                for question_id in survey_columns.values() {
                    let cell = survey
                        .as_ref()
                        .and_then(|survey| {
                            survey
                                .answers
                                .iter()
                                .find(|answer| &answer.question_id == question_id)
                        })
                        .map(|answer| answer.response.flatten())
                        .unwrap_or_default();
                    row.push(cell);
                }
            }
            writer.write_record(&row)?;
        }

        writer.flush().map_err(csv::Error::from)?;
    }

    Ok(CsvExport {
        filename: EXPORT_FILENAME,
        content_type: mime::TEXT_CSV_UTF_8,
        body: buf,
    })
}

/// Column label for a survey question; whitespace in the id collapses to
/// underscores so labels stay single-token.
fn survey_label(question_id: &str) -> String {
    let key = question_id.split_whitespace().collect::<Vec<_>>().join("_");
    format!("Survey: {key}")
}

/// Realnames that look like addresses (or merely echo the username) carry
/// no usable name tokens.
fn split_realname(account: &UserAccount) -> (String, String) {
    let realname = account.realname.trim();
    if realname.is_empty() || realname.contains('@') || realname == account.username {
        return (String::new(), String::new());
    }
    let tokens: Vec<&str> = realname.split_whitespace().collect();
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => (first.to_string(), last.to_string()),
        _ => (String::new(), String::new()),
    }
}

fn is_internal(email: &str, internal_domain: Option<&str>) -> bool {
    let Some(domain) = internal_domain else {
        return false;
    };
    email
        .rsplit_once('@')
        .map(|(_, candidate)| candidate.eq_ignore_ascii_case(domain))
        .unwrap_or(false)
}
