use crate::infra::{InMemoryEnrollmentCatalog, InMemoryRegistrationStore, InMemoryUserDirectory};
use analytics_registration::error::AppError;
use analytics_registration::registration::{
    CampaignId, ExportQuery, ExportVariant, RegistrationService, UserAccount,
};
use clap::Args;
use serde_json::{json, Map, Value};
use std::io::Cursor;
use std::sync::Arc;

const DEMO_RULES: &str = "\
school,curriculum,grade,course id
Lincoln High,Math,6,demo-course-math
Lincoln High,Science,6,demo-course-science
Jefferson Middle,Math,7,demo-course-math
";

const DEMO_SESSIONS: &str = "\
curriculum,session range,course id
Math,July 6-10,demo-course-math
Math,July 13-17,demo-course-math
Science,August 3-7,demo-course-science
";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Campaign identifier used for the demo uploads and submission.
    #[arg(long, default_value = "demo-campaign")]
    pub(crate) campaign: String,
    /// Username to register during the demo.
    #[arg(long, default_value = "demo.user")]
    pub(crate) username: String,
    /// Render the export with admin columns (registration date, internal
    /// accounts filtered out).
    #[arg(long)]
    pub(crate) admin_export: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        campaign,
        username,
        admin_export,
    } = args;

    let campaign = CampaignId::from(campaign.as_str());
    let repository = Arc::new(InMemoryRegistrationStore::default());
    let directory = Arc::new(InMemoryUserDirectory::default());
    directory.insert(UserAccount {
        username: username.clone(),
        realname: "Demo User".to_string(),
        email: format!("{username}@example.com"),
    });
    let enrollment = Arc::new(InMemoryEnrollmentCatalog::default());
    let service = RegistrationService::new(repository, directory, enrollment);

    println!("Registration campaign demo ({campaign})");

    let rule_count = service.upload_rules(&campaign, Cursor::new(DEMO_RULES))?;
    let session_count = service.upload_sessions(&campaign, Cursor::new(DEMO_SESSIONS))?;
    println!("  stored {rule_count} enrollment rules and {session_count} session options");

    let rules = service.rules(&campaign)?;
    let payload = serde_json::to_string_pretty(&rules).map_err(|err| {
        AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })?;
    println!("\nAvailable selections:\n{payload}");

    let form = demo_form();
    let enrolled = service.submit(&username, &campaign, form)?;
    println!(
        "\nRegistered {} into {} ({})",
        enrolled.username, enrolled.course_title, enrolled.course_id
    );

    let export = service.export(ExportQuery {
        username: None,
        campaign_id: Some(campaign),
        include_survey: true,
        variant: if admin_export {
            ExportVariant::Admin
        } else {
            ExportVariant::Standard
        },
    })?;
    let body = String::from_utf8_lossy(&export.body);
    println!("\nRoster export ({}):\n{}", export.filename, body);

    Ok(())
}

fn demo_form() -> Map<String, Value> {
    let form = json!({
        "school": "Lincoln High",
        "grade": 6,
        "course": "Math",
        "session": "July 6-10",
        "phone": "555-0100",
        "survey_expectations": "Sharpen problem-solving skills",
        "survey_topics": ["fractions", "ratios"],
    });
    match form {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}
