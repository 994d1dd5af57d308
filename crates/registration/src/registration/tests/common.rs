use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use crate::registration::domain::{
    CampaignId, CourseHandle, EnrollmentRecord, EnrollmentRule, RegistrationRecord, SessionOption,
    SurveySubmission, UserAccount,
};
use crate::registration::repository::{
    EnrollmentError, EnrollmentManager, RegistrationRepository, RepositoryError, SurveyListener,
    SurveySubmittedEvent, UserDirectory,
};
use crate::registration::service::RegistrationService;

pub(super) const RULES_CSV: &str = "\
school,curriculum,grade,course_id
Lincoln High,Math,6,course-A
Lincoln High,Science,6,course-B
# decommissioned
Jefferson Middle,Math,8,course-A
";

pub(super) const SESSIONS_CSV: &str = "\
curriculum,session_range,course_id
Math,July 1-2,course-A
Math,July 8-9,course-A
Science,August 3-4,course-B
";

pub(super) fn campaign() -> CampaignId {
    CampaignId::from("C1")
}

pub(super) fn form() -> Map<String, Value> {
    json!({
        "registration_id": "C1",
        "school": "Lincoln High",
        "grade": 6,
        "course": "Math",
        "session": "July 1-2",
        "phone": "867-5309",
        "survey_freetext": "bleh",
        "survey_list": [1, 2, 3, 4, 5]
    })
    .as_object()
    .expect("object literal")
    .clone()
}

#[derive(Default)]
pub(super) struct MemoryStore {
    rules: Mutex<HashMap<CampaignId, Vec<EnrollmentRule>>>,
    sessions: Mutex<HashMap<CampaignId, Vec<SessionOption>>>,
    registrations: Mutex<Vec<RegistrationRecord>>,
    surveys: Mutex<HashMap<(String, CampaignId), SurveySubmission>>,
}

impl MemoryStore {
    pub(super) fn registrations(&self) -> Vec<RegistrationRecord> {
        self.registrations.lock().expect("store mutex poisoned").clone()
    }

    pub(super) fn survey(
        &self,
        username: &str,
        campaign: &CampaignId,
    ) -> Option<SurveySubmission> {
        self.surveys
            .lock()
            .expect("store mutex poisoned")
            .get(&(username.to_string(), campaign.clone()))
            .cloned()
    }
}

fn matches(record: &RegistrationRecord, username: Option<&str>, campaign: Option<&CampaignId>) -> bool {
    username.map_or(true, |name| record.username == name)
        && campaign.map_or(true, |id| &record.campaign_id == id)
}

impl RegistrationRepository for MemoryStore {
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
        Ok(deleted)
    }
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    accounts: Mutex<HashMap<String, UserAccount>>,
}

impl MemoryDirectory {
    pub(super) fn insert(&self, username: &str, realname: &str, email: &str) {
        self.accounts.lock().expect("directory mutex poisoned").insert(
            username.to_string(),
            UserAccount {
                username: username.to_string(),
                realname: realname.to_string(),
                email: email.to_string(),
            },
        );
    }
}

impl UserDirectory for MemoryDirectory {
    fn resolve(&self, username: &str) -> Option<UserAccount> {
        self.accounts
            .lock()
            .expect("directory mutex poisoned")
            .get(username)
            .cloned()
    }
}

#[derive(Default)]
pub(super) struct MemoryEnrollments {
    pub(super) enrolled: Mutex<Vec<(String, String)>>,
    pub(super) dropped: Mutex<Vec<(String, String)>>,
}

impl MemoryEnrollments {
    pub(super) fn enrolled(&self) -> Vec<(String, String)> {
        self.enrolled.lock().expect("enrollment mutex poisoned").clone()
    }

    pub(super) fn dropped(&self) -> Vec<(String, String)> {
        self.dropped.lock().expect("enrollment mutex poisoned").clone()
    }
}

impl EnrollmentManager for MemoryEnrollments {
    fn resolve_course(&self, course_id: &str) -> Option<CourseHandle> {
        // Courses the fixture catalog knows about.
        ["course-A", "course-B"]
            .contains(&course_id)
            .then(|| CourseHandle {
                course_id: course_id.to_string(),
                title: format!("Course {course_id}"),
            })
    }

    fn enroll(
        &self,
        username: &str,
        course: &CourseHandle,
    ) -> Result<EnrollmentRecord, EnrollmentError> {
        self.enrolled
            .lock()
            .expect("enrollment mutex poisoned")
            .push((username.to_string(), course.course_id.clone()));
        Ok(EnrollmentRecord {
            username: username.to_string(),
            course_id: course.course_id.clone(),
            course_title: course.title.clone(),
        })
    }

    fn unenroll(&self, username: &str, course: &CourseHandle) -> Result<(), EnrollmentError> {
        self.dropped
            .lock()
            .expect("enrollment mutex poisoned")
            .push((username.to_string(), course.course_id.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingListener {
    events: Mutex<Vec<SurveySubmittedEvent>>,
}

impl RecordingListener {
    pub(super) fn events(&self) -> Vec<SurveySubmittedEvent> {
        self.events.lock().expect("listener mutex poisoned").clone()
    }
}

impl SurveyListener for RecordingListener {
    fn survey_submitted(&self, event: &SurveySubmittedEvent) {
        self.events
            .lock()
            .expect("listener mutex poisoned")
            .push(event.clone());
    }
}

pub(super) struct Fixture {
    pub(super) service: RegistrationService<MemoryStore, MemoryDirectory, MemoryEnrollments>,
    pub(super) store: Arc<MemoryStore>,
    pub(super) enrollments: Arc<MemoryEnrollments>,
    pub(super) listener: Arc<RecordingListener>,
}

pub(super) fn build_service() -> Fixture {
    let store = Arc::new(MemoryStore::default());
    let directory = Arc::new(MemoryDirectory::default());
    let enrollments = Arc::new(MemoryEnrollments::default());
    let listener = Arc::new(RecordingListener::default());

    directory.insert("u1", "Lilla Federick", "lilla@school.test");
    directory.insert("u2", "Jo March", "jo@school.test");

    let service = RegistrationService::new(store.clone(), directory, enrollments.clone())
        .with_listener(listener.clone());

    Fixture {
        service,
        store,
        enrollments,
        listener,
    }
}

pub(super) fn seed_campaign(fixture: &Fixture) {
    fixture
        .service
        .upload_rules(&campaign(), RULES_CSV.as_bytes())
        .expect("rules upload succeeds");
    fixture
        .service
        .upload_sessions(&campaign(), SESSIONS_CSV.as_bytes())
        .expect("sessions upload succeeds");
}
