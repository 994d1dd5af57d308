use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Map, Value};

use super::export::ExportVariant;
use super::params;
use super::repository::{EnrollmentManager, RegistrationRepository, UserDirectory};
use super::service::{ExportQuery, RegistrationError, RegistrationService, RemovalRequest};

/// Router exposing the registration surface: rules lookup and submission
/// for users, CSV uploads, roster export, update, and removal for admins.
pub fn registration_router<R, U, E>(service: Arc<RegistrationService<R, U, E>>) -> Router
where
    R: RegistrationRepository + 'static,
    U: UserDirectory + 'static,
    E: EnrollmentManager + 'static,
{
    Router::new()
        .route(
            "/api/v1/users/:username/registration/rules",
            get(rules_handler::<R, U, E>),
        )
        .route(
            "/api/v1/users/:username/registration",
            post(submit_handler::<R, U, E>),
        )
        .route(
            "/api/v1/admin/registration/rules",
            post(upload_rules_handler::<R, U, E>),
        )
        .route(
            "/api/v1/admin/registration/sessions",
            post(upload_sessions_handler::<R, U, E>),
        )
        .route(
            "/api/v1/admin/registration/registrations",
            get(export_handler::<R, U, E>),
        )
        .route(
            "/api/v1/admin/registration/registrations/update",
            post(update_handler::<R, U, E>),
        )
        .route(
            "/api/v1/admin/registration/remove",
            post(remove_handler::<R, U, E>),
        )
        .with_state(service)
}

fn error_response(err: RegistrationError) -> Response {
    let status = err.status_code();
    let body = axum::Json(json!({ "error": err.to_string() }));
    (status, body).into_response()
}

pub(crate) async fn rules_handler<R, U, E>(
    State(service): State<Arc<RegistrationService<R, U, E>>>,
    Path(_username): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response
where
    R: RegistrationRepository + 'static,
    U: UserDirectory + 'static,
    E: EnrollmentManager + 'static,
{
    let campaign = match params::resolve_campaign_id(&Map::new(), &query, true) {
        Ok(Some(campaign)) => campaign,
        Ok(None) => unreachable!("strict resolution yields a value or an error"),
        Err(err) => return error_response(err),
    };
    match service.rules(&campaign) {
        Ok(rules) => (StatusCode::OK, axum::Json(rules)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<R, U, E>(
    State(service): State<Arc<RegistrationService<R, U, E>>>,
    Path(username): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    axum::Json(form): axum::Json<Map<String, Value>>,
) -> Response
where
    R: RegistrationRepository + 'static,
    U: UserDirectory + 'static,
    E: EnrollmentManager + 'static,
{
    let campaign = match params::resolve_campaign_id(&form, &query, true) {
        Ok(Some(campaign)) => campaign,
        Ok(None) => unreachable!("strict resolution yields a value or an error"),
        Err(err) => return error_response(err),
    };
    match service.submit(&username, &campaign, form) {
        Ok(enrollment) => (StatusCode::OK, axum::Json(enrollment)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn upload_rules_handler<R, U, E>(
    State(service): State<Arc<RegistrationService<R, U, E>>>,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Response
where
    R: RegistrationRepository + 'static,
    U: UserDirectory + 'static,
    E: EnrollmentManager + 'static,
{
    let campaign = match params::resolve_campaign_id(&Map::new(), &query, true) {
        Ok(Some(campaign)) => campaign,
        Ok(None) => unreachable!("strict resolution yields a value or an error"),
        Err(err) => return error_response(err),
    };
    match service.upload_rules(&campaign, body.as_bytes()) {
        Ok(stored) => (StatusCode::CREATED, axum::Json(json!({ "stored": stored }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn upload_sessions_handler<R, U, E>(
    State(service): State<Arc<RegistrationService<R, U, E>>>,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Response
where
    R: RegistrationRepository + 'static,
    U: UserDirectory + 'static,
    E: EnrollmentManager + 'static,
{
    let campaign = match params::resolve_campaign_id(&Map::new(), &query, true) {
        Ok(Some(campaign)) => campaign,
        Ok(None) => unreachable!("strict resolution yields a value or an error"),
        Err(err) => return error_response(err),
    };
    match service.upload_sessions(&campaign, body.as_bytes()) {
        Ok(stored) => (StatusCode::CREATED, axum::Json(json!({ "stored": stored }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn export_handler<R, U, E>(
    State(service): State<Arc<RegistrationService<R, U, E>>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response
where
    R: RegistrationRepository + 'static,
    U: UserDirectory + 'static,
    E: EnrollmentManager + 'static,
{
    let campaign = match params::resolve_campaign_id(&Map::new(), &query, false) {
        Ok(campaign) => campaign,
        Err(err) => return error_response(err),
    };
    let username = params::query_string(&query, &["user", "username"]);
    let include_survey = params::query_string(&query, &["survey"])
        .as_deref()
        .and_then(params::parse_bool)
        .unwrap_or(false);

    match service.export(ExportQuery {
        username,
        campaign_id: campaign,
        include_survey,
        variant: ExportVariant::Admin,
    }) {
        Ok(export) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, export.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export.filename),
                ),
            ],
            export.body,
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_handler<R, U, E>(
    State(service): State<Arc<RegistrationService<R, U, E>>>,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Response
where
    R: RegistrationRepository + 'static,
    U: UserDirectory + 'static,
    E: EnrollmentManager + 'static,
{
    let campaign = match params::resolve_campaign_id(&Map::new(), &query, false) {
        Ok(campaign) => campaign,
        Err(err) => return error_response(err),
    };
    match service.update_from_csv(campaign.as_ref(), body.as_bytes()) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn remove_handler<R, U, E>(
    State(service): State<Arc<RegistrationService<R, U, E>>>,
    Query(query): Query<HashMap<String, String>>,
    axum::Json(body): axum::Json<Map<String, Value>>,
) -> Response
where
    R: RegistrationRepository + 'static,
    U: UserDirectory + 'static,
    E: EnrollmentManager + 'static,
{
    let campaign = match params::resolve_campaign_id(&body, &query, false) {
        Ok(campaign) => campaign,
        Err(err) => return error_response(err),
    };
    let username = params::body_string(&body, &["user", "username"]);
    let force = params::body_value(&body, &["force"])
        .and_then(params::value_to_bool)
        .unwrap_or(false);
    let unenroll = params::body_value(&body, &["unenroll"])
        .and_then(params::value_to_bool)
        .unwrap_or(true);

    match service.remove(RemovalRequest {
        username,
        campaign_id: campaign,
        force,
        unenroll,
    }) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}
