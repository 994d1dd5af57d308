use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use analytics_registration::registration::{
    CampaignId, CourseHandle, EnrollmentError, EnrollmentManager, EnrollmentRecord,
    EnrollmentRule, RegistrationRecord, RegistrationRepository, RepositoryError, SessionOption,
    SurveyListener, SurveySubmission, SurveySubmittedEvent, UserAccount, UserDirectory,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory registration store. Uniqueness of (username, campaign) is
/// enforced on insert, matching the create-or-fail repository contract.
#[derive(Default)]
pub(crate) struct InMemoryRegistrationStore {
    rules: Mutex<HashMap<CampaignId, Vec<EnrollmentRule>>>,
    sessions: Mutex<HashMap<CampaignId, Vec<SessionOption>>>,
    registrations: Mutex<Vec<RegistrationRecord>>,
    surveys: Mutex<HashMap<(String, CampaignId), SurveySubmission>>,
}

fn matches(
    record: &RegistrationRecord,
    username: Option<&str>,
    campaign: Option<&CampaignId>,
) -> bool {
    username.map_or(true, |name| record.username == name)
        && campaign.map_or(true, |id| &record.campaign_id == id)
}

impl RegistrationRepository for InMemoryRegistrationStore {
    fn store_rules(
        &self,
        campaign: &CampaignId,
        rules: Vec<EnrollmentRule>,
    ) -> Result<usize, RepositoryError> {
        let mut guard = self.rules.lock().expect("store mutex poisoned");
        let stored = rules.len();
        guard.entry(campaign.clone()).or_default().extend(rules);
        Ok(stored)
    }

    fn store_sessions(
        &self,
        campaign: &CampaignId,
        sessions: Vec<SessionOption>,
    ) -> Result<usize, RepositoryError> {
        let mut guard = self.sessions.lock().expect("store mutex poisoned");
        let stored = sessions.len();
        guard.entry(campaign.clone()).or_default().extend(sessions);
        Ok(stored)
    }

    fn get_rules(&self, campaign: &CampaignId) -> Result<Vec<EnrollmentRule>, RepositoryError> {
        let guard = self.rules.lock().expect("store mutex poisoned");
        Ok(guard.get(campaign).cloned().unwrap_or_default())
    }

    fn get_sessions(&self, campaign: &CampaignId) -> Result<Vec<SessionOption>, RepositoryError> {
        let guard = self.sessions.lock().expect("store mutex poisoned");
        Ok(guard.get(campaign).cloned().unwrap_or_default())
    }

    fn get_registrations(
        &self,
        username: Option<&str>,
        campaign: Option<&CampaignId>,
    ) -> Result<Vec<RegistrationRecord>, RepositoryError> {
        let guard = self.registrations.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| matches(record, username, campaign))
            .cloned()
            .collect())
    }

    fn create_registration(
        &self,
        record: RegistrationRecord,
    ) -> Result<RegistrationRecord, RepositoryError> {
        let mut guard = self.registrations.lock().expect("store mutex poisoned");
        if guard
            .iter()
            .any(|existing| matches(existing, Some(&record.username), Some(&record.campaign_id)))
        {
            return Err(RepositoryError::Conflict);
        }
        guard.push(record.clone());
        Ok(record)
    }

    fn update_registration(&self, record: RegistrationRecord) -> Result<(), RepositoryError> {
        let mut guard = self.registrations.lock().expect("store mutex poisoned");
        match guard
            .iter_mut()
            .find(|existing| matches(existing, Some(&record.username), Some(&record.campaign_id)))
        {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn create_survey(
        &self,
        username: &str,
        survey: SurveySubmission,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.surveys.lock().expect("store mutex poisoned");
        let key = (username.to_string(), survey.campaign_id.clone());
        if guard.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(key, survey);
        Ok(())
    }

    fn get_survey(
        &self,
        username: &str,
        campaign: &CampaignId,
    ) -> Result<Option<SurveySubmission>, RepositoryError> {
        let guard = self.surveys.lock().expect("store mutex poisoned");
        Ok(guard.get(&(username.to_string(), campaign.clone())).cloned())
    }

    fn delete_registrations(
        &self,
        username: Option<&str>,
        campaign: Option<&CampaignId>,
    ) -> Result<Vec<RegistrationRecord>, RepositoryError> {
        let mut guard = self.registrations.lock().expect("store mutex poisoned");
        let (deleted, kept): (Vec<_>, Vec<_>) = guard
            .drain(..)
            .partition(|record| matches(record, username, campaign));
        *guard = kept;
        for record in &deleted {
            self.surveys
                .lock()
                .expect("store mutex poisoned")
                .remove(&(record.username.clone(), record.campaign_id.clone()));
        }
        Ok(deleted)
    }
}

/// Directory that synthesizes an account for any username, with explicit
/// overrides for seeded accounts. Stands in for the platform user store.
#[derive(Default)]
pub(crate) struct InMemoryUserDirectory {
    accounts: Mutex<HashMap<String, UserAccount>>,
}

impl InMemoryUserDirectory {
    pub(crate) fn insert(&self, account: UserAccount) {
        self.accounts
            .lock()
            .expect("directory mutex poisoned")
            .insert(account.username.clone(), account);
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn resolve(&self, username: &str) -> Option<UserAccount> {
        let guard = self.accounts.lock().expect("directory mutex poisoned");
        guard.get(username).cloned().or_else(|| {
            Some(UserAccount {
                username: username.to_string(),
                realname: username.to_string(),
                email: format!("{username}@example.com"),
            })
        })
    }
}

/// Enrollment catalog that accepts every course id the rule/session rows
/// name. Real deployments adapt their course-management backend here.
#[derive(Default)]
pub(crate) struct InMemoryEnrollmentCatalog {
    enrollments: Mutex<Vec<(String, String)>>,
}

impl EnrollmentManager for InMemoryEnrollmentCatalog {
    fn resolve_course(&self, course_id: &str) -> Option<CourseHandle> {
        Some(CourseHandle {
            course_id: course_id.to_string(),
            title: course_id.to_string(),
        })
    }

    fn enroll(
        &self,
        username: &str,
        course: &CourseHandle,
    ) -> Result<EnrollmentRecord, EnrollmentError> {
        self.enrollments
            .lock()
            .expect("catalog mutex poisoned")
            .push((username.to_string(), course.course_id.clone()));
        Ok(EnrollmentRecord {
            username: username.to_string(),
            course_id: course.course_id.clone(),
            course_title: course.title.clone(),
        })
    }

    fn unenroll(&self, username: &str, course: &CourseHandle) -> Result<(), EnrollmentError> {
        let mut guard = self.enrollments.lock().expect("catalog mutex poisoned");
        guard.retain(|(name, id)| !(name == username && id == &course.course_id));
        Ok(())
    }
}

/// Logs survey submissions as they arrive.
#[derive(Default)]
pub(crate) struct LoggingSurveyListener;

impl SurveyListener for LoggingSurveyListener {
    fn survey_submitted(&self, event: &SurveySubmittedEvent) {
        info!(
            username = %event.username,
            campaign = %event.campaign_id,
            answers = event.answers.len(),
            "registration survey submitted"
        );
    }
}
