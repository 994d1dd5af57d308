use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for a registration campaign ("registration id" on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CampaignId(pub String);

impl CampaignId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CampaignId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One row of an uploaded enrollment-rules CSV: which curricula a
/// school/grade pair may register for, and the course backing each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRule {
    pub school: String,
    pub curriculum: String,
    pub grade: String,
    pub course_id: String,
}

/// One row of an uploaded session-options CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOption {
    pub curriculum: String,
    pub session_range: String,
    pub course_id: String,
}

/// A user's stored registration for one campaign.
///
/// At most one record exists per (username, campaign) pair; the repository
/// enforces create-or-fail semantics on insertion. Mutation happens only
/// through the admin update whitelist ([`RegistrationUpdate`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub username: String,
    pub campaign_id: CampaignId,
    pub school: String,
    pub grade: String,
    pub curriculum: String,
    pub session_range: String,
    pub phone: Option<String>,
    pub employee_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A single survey answer. List responses flatten to comma-joined text
/// when projected into CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurveyResponse {
    Text(String),
    List(Vec<String>),
}

impl SurveyResponse {
    pub fn flatten(&self) -> String {
        match self {
            SurveyResponse::Text(value) => value.clone(),
            SurveyResponse::List(values) => values.join(","),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyAnswer {
    pub question_id: String,
    pub response: SurveyResponse,
}

/// The survey captured alongside a registration. Exactly one per
/// registration record, immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveySubmission {
    pub campaign_id: CampaignId,
    pub survey_version: String,
    pub answers: Vec<SurveyAnswer>,
}

/// Whitelisted fields an admin CSV update may touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationUpdate {
    pub employee_id: Option<String>,
    pub phone: Option<String>,
    pub school: Option<String>,
    pub grade: Option<String>,
    pub session_range: Option<String>,
    pub curriculum: Option<String>,
}

impl RegistrationUpdate {
    pub fn is_empty(&self) -> bool {
        self.employee_id.is_none()
            && self.phone.is_none()
            && self.school.is_none()
            && self.grade.is_none()
            && self.session_range.is_none()
            && self.curriculum.is_none()
    }

    pub fn apply(&self, record: &mut RegistrationRecord) {
        if let Some(employee_id) = &self.employee_id {
            record.employee_id = Some(employee_id.clone());
        }
        if let Some(phone) = &self.phone {
            record.phone = Some(phone.clone());
        }
        if let Some(school) = &self.school {
            record.school = school.clone();
        }
        if let Some(grade) = &self.grade {
            record.grade = grade.clone();
        }
        if let Some(session_range) = &self.session_range {
            record.session_range = session_range.clone();
        }
        if let Some(curriculum) = &self.curriculum {
            record.curriculum = curriculum.clone();
        }
    }
}

/// Resolved directory entry for a registrant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub username: String,
    pub realname: String,
    pub email: String,
}

/// Handle to a course the enrollment manager can act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseHandle {
    pub course_id: String,
    pub title: String,
}

/// Result of enrolling a user in a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub username: String,
    pub course_id: String,
    pub course_title: String,
}
