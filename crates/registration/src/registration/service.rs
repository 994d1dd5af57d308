use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use csv::ReaderBuilder;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::domain::{
    CampaignId, EnrollmentRecord, RegistrationRecord, RegistrationUpdate, SurveyAnswer,
    SurveyResponse, SurveySubmission,
};
use super::export::{self, CsvExport, ExportOptions, ExportVariant};
use super::index::{RuleIndex, SessionIndex};
use super::params;
use super::repository::{
    EnrollmentError, EnrollmentManager, IdentityNames, NameSubstitutionPolicy,
    RegistrationRepository, RepositoryError, SurveyListener, SurveySubmittedEvent, UserDirectory,
};
use super::upload;

/// Rule and session lookup structures for one campaign, as served to the
/// registration form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationRules {
    pub rules: RuleIndex,
    pub sessions: SessionIndex,
}

/// Filters and options for a CSV export.
#[derive(Debug, Clone)]
pub struct ExportQuery {
    pub username: Option<String>,
    pub campaign_id: Option<CampaignId>,
    pub include_survey: bool,
    pub variant: ExportVariant,
}

/// Admin bulk-removal request. `unenroll` defaults to true; `force` is the
/// explicit confirmation required when no filter is given.
#[derive(Debug, Clone)]
pub struct RemovalRequest {
    pub username: Option<String>,
    pub campaign_id: Option<CampaignId>,
    pub force: bool,
    pub unenroll: bool,
}

/// Service composing the repository, user directory, and enrollment manager.
///
/// Registration and survey persistence happen in sequence against the same
/// store: a failure after the registration row is created leaves that row in
/// place and surfaces the error to the caller; the duplicate check on the
/// registration itself is the repository's create-or-fail guarantee.
pub struct RegistrationService<R, U, E> {
    repository: Arc<R>,
    directory: Arc<U>,
    enrollment: Arc<E>,
    names: Arc<dyn NameSubstitutionPolicy>,
    listeners: Vec<Arc<dyn SurveyListener>>,
    internal_domain: Option<String>,
}

impl<R, U, E> RegistrationService<R, U, E>
where
    R: RegistrationRepository + 'static,
    U: UserDirectory + 'static,
    E: EnrollmentManager + 'static,
{
    pub fn new(repository: Arc<R>, directory: Arc<U>, enrollment: Arc<E>) -> Self {
        Self {
            repository,
            directory,
            enrollment,
            names: Arc::new(IdentityNames),
            listeners: Vec::new(),
            internal_domain: None,
        }
    }

    pub fn with_name_policy(mut self, names: Arc<dyn NameSubstitutionPolicy>) -> Self {
        self.names = names;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn SurveyListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn with_internal_domain(mut self, domain: Option<String>) -> Self {
        self.internal_domain = domain;
        self
    }

    /// The registration possibilities for a campaign, in feed order.
    pub fn rules(&self, campaign: &CampaignId) -> Result<RegistrationRules, RegistrationError> {
        let rules = self.repository.get_rules(campaign)?;
        let sessions = self.repository.get_sessions(campaign)?;
        if rules.is_empty() || sessions.is_empty() {
            return Err(RegistrationError::NoRegistrationRules);
        }
        Ok(RegistrationRules {
            rules: RuleIndex::build(&rules),
            sessions: SessionIndex::build(&sessions),
        })
    }

    /// Store an enrollment-rules CSV for a campaign. Additive: rows from
    /// earlier uploads remain.
    pub fn upload_rules<S: Read>(
        &self,
        campaign: &CampaignId,
        source: S,
    ) -> Result<usize, RegistrationError> {
        let rules = upload::parse_rules(source)?;
        let stored = self.repository.store_rules(campaign, rules)?;
        info!(%campaign, count = stored, "registration enrollment rules stored");
        Ok(stored)
    }

    /// Store a session-options CSV for a campaign. Additive.
    pub fn upload_sessions<S: Read>(
        &self,
        campaign: &CampaignId,
        source: S,
    ) -> Result<usize, RegistrationError> {
        let sessions = upload::parse_sessions(source)?;
        let stored = self.repository.store_sessions(campaign, sessions)?;
        info!(%campaign, count = stored, "registration session options stored");
        Ok(stored)
    }

    /// Submit a registration form bundled with a survey, then enroll the
    /// user in the mapped course.
    pub fn submit(
        &self,
        username: &str,
        campaign: &CampaignId,
        mut form: Map<String, Value>,
    ) -> Result<EnrollmentRecord, RegistrationError> {
        params::strip_campaign_keys(&mut form);

        let phone = take_optional(&mut form, "phone");
        let employee_id = take_optional(&mut form, "employee_id");
        let survey_version =
            take_optional(&mut form, "survey_version").unwrap_or_else(|| "1".to_string());
        let school = take_required(&mut form, "school")?;
        let grade = take_required(&mut form, "grade")?;
        let curriculum = take_required(&mut form, "course")?;
        let session_range = take_required(&mut form, "session")?;

        let rule_index = RuleIndex::build(&self.repository.get_rules(campaign)?);
        if !rule_index.allows(&school, &grade, &curriculum) {
            return Err(RegistrationError::InvalidSelection(format!(
                "no curriculum '{curriculum}' for school '{school}', grade '{grade}'"
            )));
        }
        let session_index = SessionIndex::build(&self.repository.get_sessions(campaign)?);
        if !session_index.allows(&curriculum, &session_range) {
            return Err(RegistrationError::InvalidSelection(format!(
                "no session '{session_range}' for curriculum '{curriculum}'"
            )));
        }

        let record = RegistrationRecord {
            username: username.to_string(),
            campaign_id: campaign.clone(),
            school,
            grade,
            curriculum,
            session_range,
            phone,
            employee_id,
            timestamp: Utc::now(),
        };
        let record = self
            .repository
            .create_registration(record)
            .map_err(|err| match err {
                RepositoryError::Conflict => RegistrationError::DuplicateRegistration,
                other => RegistrationError::Repository(other),
            })?;

        // Everything left in the form is a survey answer.
        let answers: Vec<SurveyAnswer> = form
            .iter()
            .map(|(question_id, value)| SurveyAnswer {
                question_id: question_id.clone(),
                response: survey_response(value),
            })
            .collect();
        let survey = SurveySubmission {
            campaign_id: campaign.clone(),
            survey_version,
            answers,
        };
        self.repository
            .create_survey(username, survey.clone())
            .map_err(|err| match err {
                RepositoryError::Conflict => RegistrationError::DuplicateSurvey,
                other => RegistrationError::Repository(other),
            })?;

        let event = SurveySubmittedEvent {
            username: username.to_string(),
            campaign_id: campaign.clone(),
            survey_version: survey.survey_version.clone(),
            answers: survey.answers.clone(),
        };
        for listener in &self.listeners {
            listener.survey_submitted(&event);
        }

        let course_id = self
            .course_for_record(&record)?
            .ok_or(RegistrationError::EnrollmentTargetNotFound)?;
        let course = self
            .enrollment
            .resolve_course(&course_id)
            .ok_or(RegistrationError::EnrollmentTargetNotFound)?;
        let enrollment = self.enrollment.enroll(username, &course)?;
        info!(%username, course = %course.course_id, "user enrolled during registration");
        Ok(enrollment)
    }

    /// Export registrations (and optionally surveys) as CSV.
    pub fn export(&self, query: ExportQuery) -> Result<CsvExport, RegistrationError> {
        let registrations = self
            .repository
            .get_registrations(query.username.as_deref(), query.campaign_id.as_ref())?;
        if registrations.is_empty() {
            return Err(RegistrationError::NoRegistrations);
        }

        let mut entries = Vec::with_capacity(registrations.len());
        for record in registrations {
            let survey = if query.include_survey {
                self.repository
                    .get_survey(&record.username, &record.campaign_id)?
            } else {
                None
            };
            entries.push((record, survey));
        }

        export::project(
            entries,
            &*self.directory,
            &*self.names,
            ExportOptions {
                variant: query.variant,
                include_survey: query.include_survey,
            },
            self.internal_domain.as_deref(),
        )
    }

    /// Apply an admin CSV update (whitelisted columns only) to the matching
    /// registrations. Returns the number of records updated.
    pub fn update_from_csv<S: Read>(
        &self,
        campaign: Option<&CampaignId>,
        source: S,
    ) -> Result<usize, RegistrationError> {
        let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
        let headers = reader
            .headers()
            .map_err(|err| RegistrationError::MalformedUploadRow(err.to_string()))?
            .clone();

        let mut updated = 0;
        for record in reader.records() {
            let record =
                record.map_err(|err| RegistrationError::MalformedUploadRow(err.to_string()))?;
            let row: HashMap<&str, &str> = headers
                .iter()
                .zip(record.iter())
                .filter(|(_, value)| !value.is_empty())
                .collect();

            let username = row.get("username").copied();
            if let Some(name) = username {
                if self.directory.resolve(name).is_none() {
                    warn!(username = %name, "skipping unknown user in registration update");
                    continue;
                }
            }

            let registrations = self.repository.get_registrations(username, campaign)?;
            if registrations.is_empty() {
                return Err(RegistrationError::NoRegistrations);
            }

            let update = update_from_row(&row);
            if update.is_empty() {
                continue;
            }
            for mut registration in registrations {
                update.apply(&mut registration);
                self.repository.update_registration(registration)?;
                updated += 1;
            }
            info!(username = ?username, "updated registration data");
        }
        Ok(updated)
    }

    /// Bulk-delete registrations by user and/or campaign, optionally
    /// dropping the matching course enrollments.
    pub fn remove(
        &self,
        request: RemovalRequest,
    ) -> Result<Vec<(RegistrationRecord, Option<String>)>, RegistrationError> {
        if request.username.is_none() && request.campaign_id.is_none() && !request.force {
            return Err(RegistrationError::AmbiguousDeleteRequest);
        }

        // Resolve course ids before the rows (and their rule context) go away.
        let matching = self
            .repository
            .get_registrations(request.username.as_deref(), request.campaign_id.as_ref())?;
        let mut course_ids = HashMap::with_capacity(matching.len());
        for record in &matching {
            let course_id = self.course_for_record(record)?;
            course_ids.insert(
                (record.username.clone(), record.campaign_id.clone()),
                course_id,
            );
        }

        let deleted = self
            .repository
            .delete_registrations(request.username.as_deref(), request.campaign_id.as_ref())?;
        info!(
            count = deleted.len(),
            username = ?request.username,
            campaign = ?request.campaign_id,
            "deleted user registrations"
        );

        let mut removed = Vec::with_capacity(deleted.len());
        for record in deleted {
            let course_id = course_ids
                .remove(&(record.username.clone(), record.campaign_id.clone()))
                .flatten();

            if request.unenroll {
                match course_id
                    .as_deref()
                    .and_then(|id| self.enrollment.resolve_course(id))
                {
                    Some(course) => {
                        self.enrollment.unenroll(&record.username, &course)?;
                        info!(username = %record.username, course = %course.course_id, "user unenrolled");
                    }
                    None => {
                        warn!(
                            username = %record.username,
                            course = ?course_id,
                            "no course found while unenrolling"
                        );
                    }
                }
            }
            removed.push((record, course_id));
        }
        Ok(removed)
    }

    /// Course backing a stored registration: the session row matching the
    /// chosen (curriculum, session range) wins, the enrollment rule for the
    /// (school, grade, curriculum) triple is the fallback.
    fn course_for_record(
        &self,
        record: &RegistrationRecord,
    ) -> Result<Option<String>, RegistrationError> {
        let sessions = self.repository.get_sessions(&record.campaign_id)?;
        if let Some(session) = sessions.iter().find(|session| {
            session.curriculum == record.curriculum
                && session.session_range == record.session_range
        }) {
            return Ok(Some(session.course_id.clone()));
        }

        let rules = self.repository.get_rules(&record.campaign_id)?;
        Ok(rules
            .iter()
            .find(|rule| {
                rule.school == record.school
                    && rule.grade == record.grade
                    && rule.curriculum == record.curriculum
            })
            .map(|rule| rule.course_id.clone()))
    }
}

fn take_optional(form: &mut Map<String, Value>, key: &str) -> Option<String> {
    params::take_value(form, &[key])
        .as_ref()
        .and_then(params::value_to_string)
}

fn take_required(
    form: &mut Map<String, Value>,
    key: &'static str,
) -> Result<String, RegistrationError> {
    take_optional(form, key).ok_or(RegistrationError::MissingField(key))
}

fn survey_response(value: &Value) -> SurveyResponse {
    match value {
        Value::Array(items) => SurveyResponse::List(
            items
                .iter()
                .map(|item| params::value_to_string(item).unwrap_or_else(|| item.to_string()))
                .collect(),
        ),
        other => SurveyResponse::Text(
            params::value_to_string(other).unwrap_or_else(|| other.to_string()),
        ),
    }
}

/// Error raised by the registration service. All validation failures are
/// client faults; repository and enrollment failures are server faults.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("no registration id given")]
    MissingRegistrationId,
    #[error("upload row with missing data ({0})")]
    MalformedUploadRow(String),
    #[error("no rows found in upload")]
    EmptyUpload,
    #[error("missing registration value: {0}")]
    MissingField(&'static str),
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("user already registered for this campaign")]
    DuplicateRegistration,
    #[error("user already submitted a survey for this campaign")]
    DuplicateSurvey,
    #[error("course not found during registration")]
    EnrollmentTargetNotFound,
    #[error("no username or registration id given, must force")]
    AmbiguousDeleteRequest,
    #[error("there are no registrations")]
    NoRegistrations,
    #[error("no registration rules found")]
    NoRegistrationRules,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error("invalid csv data: {0}")]
    Csv(#[from] csv::Error),
}

impl RegistrationError {
    /// HTTP status this error surfaces as.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistrationError::MissingRegistrationId
            | RegistrationError::MalformedUploadRow(_)
            | RegistrationError::EmptyUpload
            | RegistrationError::MissingField(_)
            | RegistrationError::InvalidSelection(_)
            | RegistrationError::DuplicateRegistration
            | RegistrationError::DuplicateSurvey
            | RegistrationError::EnrollmentTargetNotFound
            | RegistrationError::AmbiguousDeleteRequest => StatusCode::UNPROCESSABLE_ENTITY,
            RegistrationError::NoRegistrations | RegistrationError::NoRegistrationRules => {
                StatusCode::NOT_FOUND
            }
            RegistrationError::Repository(_)
            | RegistrationError::Enrollment(_)
            | RegistrationError::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn update_from_row(row: &HashMap<&str, &str>) -> RegistrationUpdate {
    let column = |key: &str| row.get(key).map(|value| value.to_string());
    RegistrationUpdate {
        employee_id: column("employee_id"),
        phone: column("phone"),
        school: column("school"),
        grade: column("grade"),
        session_range: column("session_range"),
        curriculum: column("curriculum"),
    }
}
