use super::domain::{
    CampaignId, CourseHandle, EnrollmentRecord, EnrollmentRule, RegistrationRecord, SessionOption,
    SurveyAnswer, SurveySubmission, UserAccount,
};

/// Storage abstraction over the registration store so the service can be
/// exercised in isolation.
///
/// `create_registration` and `create_survey` must be create-or-fail: the
/// backend owns the uniqueness guarantee for (username, campaign) and
/// surfaces violations as [`RepositoryError::Conflict`]. Rule and session
/// stores are additive; repeated uploads accumulate rows in feed order.
pub trait RegistrationRepository: Send + Sync {
    fn store_rules(
        &self,
        campaign: &CampaignId,
        rules: Vec<EnrollmentRule>,
    ) -> Result<usize, RepositoryError>;

    fn store_sessions(
        &self,
        campaign: &CampaignId,
        sessions: Vec<SessionOption>,
    ) -> Result<usize, RepositoryError>;

    fn get_rules(&self, campaign: &CampaignId) -> Result<Vec<EnrollmentRule>, RepositoryError>;

    fn get_sessions(&self, campaign: &CampaignId) -> Result<Vec<SessionOption>, RepositoryError>;

    /// Registrations matching the given filters; either filter alone is
    /// valid, and no filters means everything.
    fn get_registrations(
        &self,
        username: Option<&str>,
        campaign: Option<&CampaignId>,
    ) -> Result<Vec<RegistrationRecord>, RepositoryError>;

    fn create_registration(
        &self,
        record: RegistrationRecord,
    ) -> Result<RegistrationRecord, RepositoryError>;

    fn update_registration(&self, record: RegistrationRecord) -> Result<(), RepositoryError>;

    fn create_survey(
        &self,
        username: &str,
        survey: SurveySubmission,
    ) -> Result<(), RepositoryError>;

    fn get_survey(
        &self,
        username: &str,
        campaign: &CampaignId,
    ) -> Result<Option<SurveySubmission>, RepositoryError>;

    fn delete_registrations(
        &self,
        username: Option<&str>,
        campaign: Option<&CampaignId>,
    ) -> Result<Vec<RegistrationRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// User/profile lookup collaborator.
pub trait UserDirectory: Send + Sync {
    fn resolve(&self, username: &str) -> Option<UserAccount>;
}

/// Course-enrollment collaborator.
pub trait EnrollmentManager: Send + Sync {
    fn resolve_course(&self, course_id: &str) -> Option<CourseHandle>;

    fn enroll(
        &self,
        username: &str,
        course: &CourseHandle,
    ) -> Result<EnrollmentRecord, EnrollmentError>;

    fn unenroll(&self, username: &str, course: &CourseHandle) -> Result<(), EnrollmentError>;
}

/// Enrollment backend error.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("enrollment backend unavailable: {0}")]
    Unavailable(String),
}

/// Optional display-name masking applied to exported usernames.
pub trait NameSubstitutionPolicy: Send + Sync {
    fn substitute(&self, username: &str) -> String;
}

/// Identity policy used when no masking is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityNames;

impl NameSubstitutionPolicy for IdentityNames {
    fn substitute(&self, username: &str) -> String {
        username.to_string()
    }
}

/// Payload broadcast to listeners after a survey is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveySubmittedEvent {
    pub username: String,
    pub campaign_id: CampaignId,
    pub survey_version: String,
    pub answers: Vec<SurveyAnswer>,
}

/// Subscriber hook for survey submissions (fire-and-forget).
pub trait SurveyListener: Send + Sync {
    fn survey_submitted(&self, event: &SurveySubmittedEvent);
}
