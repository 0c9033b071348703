//! JSON API for the pricing simulator and audit request wizards.
//!
//! - `GET  /api/v1/wizards/{kind}`                      definition
//! - `POST /api/v1/wizards/{kind}/quote`                stateless price breakdown
//! - `POST /api/v1/wizards/{kind}/sessions`             start a session
//! - `GET  /api/v1/sessions/{id}`                       session snapshot
//! - `PUT  /api/v1/sessions/{id}/answers/{step_key}`    record an answer
//! - `POST /api/v1/sessions/{id}/advance`               next step or submit
//! - `POST /api/v1/sessions/{id}/retreat`               previous step
//! - `POST /api/v1/sessions/{id}/reset`                 start over
//! - `DELETE /api/v1/sessions/{id}`                     dismiss the wizard
//!
//! A session leaves the registry when it is dismissed or once it is submitted.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;
use webfit_core::audit::{AuditContext, AuditSink};
use webfit_core::domain::answers::{AnswerSet, AnswerValue, StepKey};
use webfit_core::errors::{ApplicationError, InterfaceError};
use webfit_core::quote::{price_with_trace, QuoteBreakdown};
use webfit_core::submission::SubmissionCollaborator;
use webfit_core::wizard::{
    AdvanceOutcome, Catalog, SharedWizard, WizardController, WizardDefinition, WizardKind,
    WizardState,
};

const CORRELATION_HEADER: &str = "x-correlation-id";

/// Live sessions keyed by session id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SharedWizard>>>,
}

impl SessionRegistry {
    pub async fn insert(&self, wizard: SharedWizard) -> String {
        let id = wizard.session().id.0;
        self.sessions.write().await.insert(id.clone(), wizard);
        id
    }

    pub async fn get(&self, id: &str) -> Option<SharedWizard> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Re-keys a session after `reset` handed it a new id.
    pub async fn rekey(&self, old_id: &str, wizard: SharedWizard) -> String {
        let new_id = wizard.session().id.0;
        let mut sessions = self.sessions.write().await;
        sessions.remove(old_id);
        sessions.insert(new_id.clone(), wizard);
        new_id
    }

    pub async fn remove(&self, id: &str) -> Option<SharedWizard> {
        self.sessions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub catalog: Catalog,
    pub sessions: SessionRegistry,
    pub collaborator: Arc<dyn SubmissionCollaborator>,
    pub audit: Arc<dyn AuditSink>,
}

#[derive(Debug, Serialize)]
pub struct StepStatus {
    pub key: StepKey,
    pub title: String,
    pub complete: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub kind: WizardKind,
    #[serde(flatten)]
    pub state: WizardState,
    pub current_step_index: usize,
    pub step_count: usize,
    pub can_advance: bool,
    pub answers: AnswerSet,
    pub computed_price: i64,
    pub steps: Vec<StepStatus>,
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    #[serde(flatten)]
    pub outcome: AdvanceOutcome,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: &'static str,
    pub message: String,
    pub correlation_id: String,
}

pub struct ApiError(InterfaceError);

impl ApiError {
    fn new(error: impl Into<ApplicationError>, correlation_id: &str) -> Self {
        Self(error.into().into_interface(correlation_id))
    }

    pub fn interface(&self) -> &InterfaceError {
        &self.0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ApiErrorBody {
            error: self.0.user_message(),
            message: self.0.message().to_owned(),
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/wizards/{kind}", get(get_definition))
        .route("/api/v1/wizards/{kind}/quote", post(quote))
        .route("/api/v1/wizards/{kind}/sessions", post(create_session))
        .route("/api/v1/sessions/{id}", get(get_session).delete(dismiss_session))
        .route("/api/v1/sessions/{id}/answers/{step_key}", put(record_answer))
        .route("/api/v1/sessions/{id}/advance", post(advance))
        .route("/api/v1/sessions/{id}/retreat", post(retreat))
        .route("/api/v1/sessions/{id}/reset", post(reset))
        .with_state(state)
}

pub async fn get_definition(
    Path(kind): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<WizardDefinition>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let kind = parse_kind(&kind, &correlation_id)?;
    Ok(Json(state.catalog.get(kind).as_ref().clone()))
}

pub async fn quote(
    Path(kind): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(answers): Json<AnswerSet>,
) -> Result<Json<QuoteBreakdown>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let kind = parse_kind(&kind, &correlation_id)?;
    let definition = state.catalog.get(kind);
    Ok(Json(price_with_trace(definition.price_table(), &answers)))
}

pub async fn create_session(
    Path(kind): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let correlation_id = correlation_id(&headers);
    let kind = parse_kind(&kind, &correlation_id)?;

    let controller = WizardController::new(state.catalog.get(kind))
        .with_audit(Arc::clone(&state.audit), AuditContext::new(&correlation_id, "web"));
    let wizard = SharedWizard::new(controller);
    let session_id = state.sessions.insert(wizard.clone()).await;

    info!(
        event_name = "api.session.created",
        correlation_id = %correlation_id,
        session_id = %session_id,
        kind = kind.as_str(),
        "wizard session created"
    );
    Ok((StatusCode::CREATED, Json(snapshot(&wizard))))
}

pub async fn get_session(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let wizard = find_session(&state, &id, &correlation_id).await?;
    Ok(Json(snapshot(&wizard)))
}

pub async fn record_answer(
    Path((id, step_key)): Path<(String, String)>,
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(value): Json<AnswerValue>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let wizard = find_session(&state, &id, &correlation_id).await?;
    wizard.record_answer(step_key, value).map_err(|error| ApiError::new(error, &correlation_id))?;
    Ok(Json(snapshot(&wizard)))
}

pub async fn advance(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let wizard = find_session(&state, &id, &correlation_id).await?;

    let outcome = wizard.advance(state.collaborator.as_ref()).await;
    match &outcome {
        AdvanceOutcome::Submitted => {
            state.sessions.remove(&id).await;
            info!(
                event_name = "api.session.submitted",
                correlation_id = %correlation_id,
                session_id = %id,
                "wizard submitted"
            );
        }
        AdvanceOutcome::Failed { reason } => warn!(
            event_name = "api.session.submission_failed",
            correlation_id = %correlation_id,
            session_id = %id,
            reason = %reason,
            "wizard submission failed"
        ),
        _ => {}
    }
    Ok(Json(AdvanceResponse { outcome, session: snapshot(&wizard) }))
}

pub async fn retreat(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let wizard = find_session(&state, &id, &correlation_id).await?;
    wizard.retreat().map_err(|error| ApiError::new(error, &correlation_id))?;
    Ok(Json(snapshot(&wizard)))
}

pub async fn reset(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let wizard = find_session(&state, &id, &correlation_id).await?;
    wizard.reset().map_err(|error| ApiError::new(error, &correlation_id))?;
    state.sessions.rekey(&id, wizard.clone()).await;
    Ok(Json(snapshot(&wizard)))
}

pub async fn dismiss_session(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let correlation_id = correlation_id(&headers);
    state.sessions.remove(&id).await.ok_or_else(|| {
        ApiError::new(ApplicationError::NotFound(format!("session `{id}`")), &correlation_id)
    })?;
    info!(
        event_name = "api.session.dismissed",
        correlation_id = %correlation_id,
        session_id = %id,
        "wizard session dismissed"
    );
    Ok(StatusCode::NO_CONTENT)
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4().simple()))
}

fn parse_kind(raw: &str, correlation_id: &str) -> Result<WizardKind, ApiError> {
    raw.parse::<WizardKind>()
        .map_err(|_| ApiError::new(ApplicationError::NotFound(format!("wizard `{raw}`")), correlation_id))
}

async fn find_session(
    state: &ApiState,
    id: &str,
    correlation_id: &str,
) -> Result<SharedWizard, ApiError> {
    state.sessions.get(id).await.ok_or_else(|| {
        ApiError::new(ApplicationError::NotFound(format!("session `{id}`")), correlation_id)
    })
}

fn snapshot(wizard: &SharedWizard) -> SessionSnapshot {
    wizard.with(|controller| {
        let session = controller.session();
        let steps = controller
            .definition()
            .steps()
            .iter()
            .enumerate()
            .map(|(index, step)| StepStatus {
                key: step.key.clone(),
                title: step.title.clone(),
                complete: controller.is_step_complete(index),
            })
            .collect();

        SessionSnapshot {
            session_id: session.id.0.clone(),
            kind: controller.definition().kind(),
            state: session.state(),
            current_step_index: session.current_step_index,
            step_count: controller.definition().step_count(),
            can_advance: controller.can_advance(),
            answers: session.answers.clone(),
            computed_price: session.computed_price,
            steps,
        }
    })
}
