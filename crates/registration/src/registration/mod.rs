//! Registration campaigns: rule/session uploads, form submission with
//! survey capture, enrollment, and roster export.

pub mod domain;
pub mod export;
pub mod index;
pub mod params;
pub mod repository;
pub mod router;
pub mod service;
pub mod upload;

#[cfg(test)]
mod tests;

pub use domain::{
    CampaignId, CourseHandle, EnrollmentRecord, EnrollmentRule, RegistrationRecord,
    RegistrationUpdate, SessionOption, SurveyAnswer, SurveyResponse, SurveySubmission, UserAccount,
};
pub use export::{CsvExport, ExportOptions, ExportVariant, EXPORT_FILENAME};
pub use index::{RuleIndex, SessionIndex};
pub use repository::{
    EnrollmentError, EnrollmentManager, IdentityNames, NameSubstitutionPolicy,
    RegistrationRepository, RepositoryError, SurveyListener, SurveySubmittedEvent, UserDirectory,
};
pub use router::registration_router;
pub use service::{
    ExportQuery, RegistrationError, RegistrationRules, RegistrationService, RemovalRequest,
};
