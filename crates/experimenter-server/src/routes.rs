//! Router and request handlers.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use experimenter_core::error::ExperimenterError;
use experimenter_core::models::experiment::Experiment;
use experimenter_core::repository::Store;
use experimenter_service::forms::{
    CommentForm, NormandyIdForm, ObjectivesForm, OverviewForm, ReviewForm, RisksForm, StatusForm,
    VariantsForm,
};
use experimenter_service::links::detail_path;
use experimenter_service::{BugTracker, ExperimentDetail, ExperimentFilter, ExperimentPage};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use url::form_urlencoded;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;

/// Header carrying review sign-offs that were dropped for lack of
/// permission. One value per warning.
pub const WARNING_HEADER: &str = "x-experimenter-warning";

type ApiResult<T> = Result<T, ApiError>;

/// A form body plus the submit button that sent it.
#[derive(Debug, Deserialize)]
pub struct Submission<F> {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(flatten)]
    pub form: F,
}

impl<F> Submission<F> {
    fn continues(&self) -> bool {
        self.action.as_deref() == Some("continue")
    }
}

#[derive(Debug, Default, Deserialize)]
struct RejectBody {
    #[serde(default)]
    message: Option<String>,
}

/// Editing steps in the order a new experiment walks through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditStep {
    Overview,
    Variants,
    Objectives,
    Risks,
}

impl EditStep {
    fn path(self) -> &'static str {
        match self {
            EditStep::Overview => "overview",
            EditStep::Variants => "variants",
            EditStep::Objectives => "objectives",
            EditStep::Risks => "risks",
        }
    }

    fn next(self) -> Option<EditStep> {
        match self {
            EditStep::Overview => Some(EditStep::Variants),
            EditStep::Variants => Some(EditStep::Objectives),
            EditStep::Objectives => Some(EditStep::Risks),
            EditStep::Risks => None,
        }
    }

    /// Where to send the browser after saving this step.
    fn redirect(self, slug: &str, continues: bool) -> Redirect {
        match self.next().filter(|_| continues) {
            Some(next) => Redirect::to(&edit_path(slug, next)),
            None => Redirect::to(&detail_path(slug)),
        }
    }
}

fn edit_path(slug: &str, step: EditStep) -> String {
    format!("/experiments/{slug}/edit/{}", step.path())
}

pub fn build_router<S, B>(state: AppState<S, B>) -> Router
where
    S: Store + 'static,
    B: BugTracker + 'static,
{
    Router::new()
        .route("/healthz", get(healthz))
        .route("/experiments", get(list::<S, B>).post(create::<S, B>))
        .route("/experiments/{slug}", get(detail::<S, B>))
        .route("/experiments/{slug}/", get(detail::<S, B>))
        .route("/experiments/{slug}/edit/overview", post(edit_overview::<S, B>))
        .route("/experiments/{slug}/edit/variants", post(edit_variants::<S, B>))
        .route("/experiments/{slug}/edit/objectives", post(edit_objectives::<S, B>))
        .route("/experiments/{slug}/edit/risks", post(edit_risks::<S, B>))
        .route("/experiments/{slug}/review", post(review::<S, B>))
        .route("/experiments/{slug}/status", post(status::<S, B>))
        .route("/experiments/{slug}/archive", post(archive::<S, B>))
        .route("/experiments/{slug}/subscribe", post(subscribe::<S, B>))
        .route("/experiments/{slug}/normandy", post(normandy::<S, B>))
        .route("/experiments/{slug}/comment", post(comment::<S, B>))
        .route("/api/v1/experiments/{slug}/accept", post(accept::<S, B>))
        .route("/api/v1/experiments/{slug}/reject", post(reject::<S, B>))
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

async fn list<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    _user: CurrentUser,
    Query(filter): Query<ExperimentFilter>,
) -> ApiResult<Json<ExperimentPage>> {
    Ok(Json(state.service.list(&filter).await?))
}

async fn detail<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<ExperimentDetail>> {
    Ok(Json(state.service.detail(&user, &slug).await?))
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

async fn create<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<Submission<OverviewForm>>,
) -> ApiResult<Redirect> {
    let continues = body.continues();
    let experiment = state.service.create(&user, body.form).await?;
    Ok(EditStep::Overview.redirect(&experiment.slug, continues))
}

async fn edit_overview<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(body): Json<Submission<OverviewForm>>,
) -> ApiResult<Redirect> {
    let continues = body.continues();
    let experiment = state.service.update_overview(&user, &slug, body.form).await?;
    Ok(EditStep::Overview.redirect(&experiment.slug, continues))
}

async fn edit_variants<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(body): Json<Submission<VariantsForm>>,
) -> ApiResult<Redirect> {
    let continues = body.continues();
    let experiment = state.service.update_variants(&user, &slug, body.form).await?;
    Ok(EditStep::Variants.redirect(&experiment.slug, continues))
}

async fn edit_objectives<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(body): Json<Submission<ObjectivesForm>>,
) -> ApiResult<Redirect> {
    let continues = body.continues();
    let experiment = state.service.update_objectives(&user, &slug, body.form).await?;
    Ok(EditStep::Objectives.redirect(&experiment.slug, continues))
}

async fn edit_risks<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(body): Json<Submission<RisksForm>>,
) -> ApiResult<Redirect> {
    let continues = body.continues();
    let experiment = state.service.update_risks(&user, &slug, body.form).await?;
    Ok(EditStep::Risks.redirect(&experiment.slug, continues))
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

async fn review<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(form): Json<ReviewForm>,
) -> ApiResult<Response> {
    let outcome = state.service.update_review(&user, &slug, form).await?;

    let mut headers = HeaderMap::new();
    for warning in &outcome.warnings {
        if let Ok(value) = HeaderValue::from_str(warning) {
            headers.append(HeaderName::from_static(WARNING_HEADER), value);
        }
    }

    Ok((headers, Redirect::to(&detail_path(&outcome.experiment.slug))).into_response())
}

async fn status<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(form): Json<StatusForm>,
) -> ApiResult<Redirect> {
    match state.service.update_status(&user, &slug, form).await {
        Ok(experiment) => Ok(Redirect::to(&detail_path(&experiment.slug))),
        Err(e @ (ExperimenterError::InvalidForm(_) | ExperimenterError::InvalidTransition { .. })) => {
            info!(slug = %slug, user_id = %user.id, error = %e, "Status change refused");
            Ok(Redirect::to(&detail_path(&slug)))
        }
        Err(e) => Err(e.into()),
    }
}

async fn archive<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> ApiResult<Redirect> {
    let experiment = state.service.toggle_archive(&user, &slug).await?;
    Ok(Redirect::to(&detail_path(&experiment.slug)))
}

async fn subscribe<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> ApiResult<Redirect> {
    state.service.toggle_subscription(&user, &slug).await?;
    Ok(Redirect::to(&detail_path(&slug)))
}

async fn normandy<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(form): Json<NormandyIdForm>,
) -> ApiResult<Redirect> {
    match state.service.set_normandy_id(&user, &slug, &form).await {
        Ok(experiment) => Ok(Redirect::to(&detail_path(&experiment.slug))),
        Err(ExperimenterError::InvalidForm(errors)) => {
            warn!(slug = %slug, errors = %errors, "Invalid Normandy id");
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("normandy_id", &form.raw())
                .finish();
            Ok(Redirect::to(&format!("{}?{query}", detail_path(&slug))))
        }
        Err(e @ ExperimenterError::InvalidTransition { .. }) => {
            info!(slug = %slug, error = %e, "Normandy id refused");
            Ok(Redirect::to(&detail_path(&slug)))
        }
        Err(e) => Err(e.into()),
    }
}

async fn comment<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(form): Json<CommentForm>,
) -> ApiResult<Redirect> {
    match state.service.add_comment(&user, &slug, form).await {
        Ok(comment) => Ok(Redirect::to(&format!(
            "{}#{}-comments",
            detail_path(&slug),
            comment.section.as_str()
        ))),
        Err(ExperimenterError::InvalidForm(_)) => Ok(Redirect::to(&detail_path(&slug))),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Delivery callbacks
// ---------------------------------------------------------------------------

async fn accept<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<Experiment>> {
    Ok(Json(state.service.accept(&user, &slug).await?))
}

async fn reject<S: Store + 'static, B: BugTracker + 'static>(
    State(state): State<AppState<S, B>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Experiment>> {
    let body: RejectBody = if body.is_empty() {
        RejectBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ExperimenterError::Validation {
            message: format!("invalid reject body: {e}"),
        })?
    };
    Ok(Json(state.service.reject(&user, &slug, body.message).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_chain_to_detail() {
        assert_eq!(EditStep::Overview.next(), Some(EditStep::Variants));
        assert_eq!(EditStep::Variants.next(), Some(EditStep::Objectives));
        assert_eq!(EditStep::Objectives.next(), Some(EditStep::Risks));
        assert_eq!(EditStep::Risks.next(), None);
    }

    #[test]
    fn submission_reads_action_beside_form_fields() {
        let body: Submission<CommentForm> = serde_json::from_value(json!({
            "action": "continue",
            "section": "objectives",
            "text": "Looks good",
        }))
        .unwrap();
        assert!(body.continues());
        assert_eq!(body.form.text.as_deref(), Some("Looks good"));
    }
}
