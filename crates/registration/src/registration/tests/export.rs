use chrono::{TimeZone, Utc};

use super::common::MemoryDirectory;
use crate::registration::domain::{
    CampaignId, RegistrationRecord, SurveyAnswer, SurveyResponse, SurveySubmission,
};
use crate::registration::export::{project, CsvExport, ExportOptions, ExportVariant};
use crate::registration::repository::{IdentityNames, NameSubstitutionPolicy};

fn record(username: &str, hour: u32) -> RegistrationRecord {
    RegistrationRecord {
        username: username.to_string(),
        campaign_id: CampaignId::from("C1"),
        school: "Lincoln High".to_string(),
        grade: "6".to_string(),
        curriculum: "Math".to_string(),
        session_range: "July 1-2".to_string(),
        phone: Some("867-5309".to_string()),
        employee_id: None,
        timestamp: Utc
            .with_ymd_and_hms(2026, 7, 1, hour, 0, 0)
            .single()
            .expect("valid timestamp"),
    }
}

fn survey(questions: &[(&str, SurveyResponse)]) -> SurveySubmission {
    SurveySubmission {
        campaign_id: CampaignId::from("C1"),
        survey_version: "1".to_string(),
        answers: questions
            .iter()
            .map(|(question_id, response)| SurveyAnswer {
                question_id: question_id.to_string(),
                response: response.clone(),
            })
            .collect(),
    }
}

fn directory() -> MemoryDirectory {
    let directory = MemoryDirectory::default();
    directory.insert("u1", "Lilla Federick", "lilla@school.test");
    directory.insert("u2", "Jo March", "jo@school.test");
    directory.insert("staff", "Op Erator", "op@operator.test");
    directory
}

fn rows(export: &CsvExport) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_reader(export.body.as_slice());
    let header = reader
        .headers()
        .expect("header row")
        .iter()
        .map(str::to_string)
        .collect();
    let body = reader
        .records()
        .map(|record| {
            record
                .expect("data row")
                .iter()
                .map(str::to_string)
                .collect()
        })
        .collect();
    (header, body)
}

fn standard() -> ExportOptions {
    ExportOptions {
        variant: ExportVariant::Standard,
        include_survey: false,
    }
}

#[test]
fn orders_rows_by_timestamp_ascending() {
    let entries = vec![(record("u2", 12), None), (record("u1", 9), None)];
    let export = project(entries, &directory(), &IdentityNames, standard(), None)
        .expect("projection succeeds");
    let (header, body) = rows(&export);

    assert_eq!(header[0], "username");
    assert_eq!(header.len(), 10);
    assert_eq!(body.len(), 2);
    assert_eq!(body[0][0], "u1");
    assert_eq!(body[1][0], "u2");
}

#[test]
fn splits_realname_into_first_and_last_tokens() {
    let entries = vec![(record("u1", 9), None)];
    let export = project(entries, &directory(), &IdentityNames, standard(), None)
        .expect("projection succeeds");
    let (_, body) = rows(&export);
    assert_eq!(body[0][1], "Lilla");
    assert_eq!(body[0][2], "Federick");
    assert_eq!(body[0][4], "lilla@school.test");
}

#[test]
fn address_like_realnames_leave_names_blank() {
    let directory = MemoryDirectory::default();
    directory.insert("u1", "u1@school.test", "u1@school.test");
    let entries = vec![(record("u1", 9), None)];
    let export = project(entries, &directory, &IdentityNames, standard(), None)
        .expect("projection succeeds");
    let (_, body) = rows(&export);
    assert_eq!(body[0][1], "");
    assert_eq!(body[0][2], "");
}

#[test]
fn unresolvable_users_are_skipped() {
    let entries = vec![(record("ghost", 9), None), (record("u1", 10), None)];
    let export = project(entries, &directory(), &IdentityNames, standard(), None)
        .expect("projection succeeds");
    let (_, body) = rows(&export);
    assert_eq!(body.len(), 1);
    assert_eq!(body[0][0], "u1");
}

#[test]
fn admin_variant_adds_registration_date_and_drops_internal_accounts() {
    let entries = vec![(record("u1", 9), None), (record("staff", 10), None)];
    let export = project(
        entries,
        &directory(),
        &IdentityNames,
        ExportOptions {
            variant: ExportVariant::Admin,
            include_survey: false,
        },
        Some("operator.test"),
    )
    .expect("projection succeeds");
    let (header, body) = rows(&export);

    assert_eq!(header.last().map(String::as_str), Some("registration_date"));
    assert_eq!(body.len(), 1);
    assert_eq!(body[0][0], "u1");
    assert!(body[0][10].starts_with("2026-07-01T09:00:00"));
}

#[test]
fn survey_columns_are_sorted_with_empty_cells_for_unanswered() {
    let entries = vec![
        (
            record("u1", 9),
            Some(survey(&[
                ("zebra question", SurveyResponse::Text("z".to_string())),
                (
                    "apple question",
                    SurveyResponse::List(vec!["1".to_string(), "2".to_string()]),
                ),
            ])),
        ),
        (
            record("u2", 10),
            Some(survey(&[(
                "apple question",
                SurveyResponse::Text("a".to_string()),
            )])),
        ),
    ];
    let export = project(
        entries,
        &directory(),
        &IdentityNames,
        ExportOptions {
            variant: ExportVariant::Standard,
            include_survey: true,
        },
        None,
    )
    .expect("projection succeeds");
    let (header, body) = rows(&export);

    assert_eq!(header[10], "survey_version");
    assert_eq!(header[11], "Survey: apple_question");
    assert_eq!(header[12], "Survey: zebra_question");
    assert_eq!(body[0][10], "1");
    assert_eq!(body[0][11], "1,2");
    assert_eq!(body[0][12], "z");
    assert_eq!(body[1][11], "a");
    assert_eq!(body[1][12], "");
}

#[test]
fn name_substitution_policy_masks_usernames() {
    struct Masked;
    impl NameSubstitutionPolicy for Masked {
        fn substitute(&self, _username: &str) -> String {
            "masked".to_string()
        }
    }

    let entries = vec![(record("u1", 9), None)];
    let export = project(entries, &directory(), &Masked, standard(), None)
        .expect("projection succeeds");
    let (_, body) = rows(&export);
    assert_eq!(body[0][0], "masked");
}
