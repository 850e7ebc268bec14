//! Request identity.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

/// Header carrying the authenticated user's id, set by the session layer in
/// front of this service.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the authenticated user's role, set by the same layer.
pub const USER_ROLE_HEADER: &str = "x-user-role";

const ADMIN_ROLE: &str = "admin";

/// The user a request acts for.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER} header")))?;

        raw.trim()
            .parse()
            .map(CurrentUser)
            .map_err(|e| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER} header: {e}")))
    }
}

/// An identified user holding the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user_id) = CurrentUser::from_request_parts(parts, state).await?;

        let is_admin = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|role| role.trim().eq_ignore_ascii_case(ADMIN_ROLE));
        if !is_admin {
            tracing::warn!(%user_id, "admin route refused");
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }

        Ok(AdminUser(user_id))
    }
}
