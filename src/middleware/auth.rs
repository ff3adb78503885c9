// Caller identification for dataset routes

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::models::{AppState, User};
use crate::types::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller. Resolved from the `x-user-id` header and
/// checked against the store, so handlers only ever see existing users.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }
}

fn header_user_id(parts: &Parts) -> Option<Uuid> {
    parts
        .headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = header_user_id(parts).ok_or(AppError::Unauthorized)?;

        match state.store.get_user(user_id).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                tracing::debug!(user_id = %user_id, "Unknown user");
                Err(AppError::Unauthorized)
            }
        }
    }
}
