//! Proxy-header authentication.
//!
//! Experimenter sits behind an authenticating proxy that forwards the
//! signed-in user's email in a request header. The first request from an
//! unknown email creates the user record.

use axum::extract::FromRequestParts;
use experimenter_core::models::user::User;
use experimenter_core::repository::{Store, UserRepository};
use experimenter_service::BugTracker;
use http::request::Parts;
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;

/// The user making the request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S, B> FromRequestParts<AppState<S, B>> for CurrentUser
where
    S: Store + 'static,
    B: BugTracker + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, B>,
    ) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get(&state.email_header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| {
                debug!(header = %state.email_header, "Request without user header");
                ApiError::unauthenticated(format!("missing {} header", state.email_header))
            })?;

        let user = state
            .service
            .store()
            .users()
            .get_or_create_by_email(email)
            .await?;

        Ok(CurrentUser(user))
    }
}
