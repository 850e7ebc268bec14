//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::ParseStatusError;
use fulfillment::{ErrorKind, FulfillmentError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The request carried no usable user identity.
    Unauthorized(String),
    /// The caller is known but lacks the role the route needs.
    Forbidden(String),
    /// Error from a fulfillment operation.
    Fulfillment(FulfillmentError),
}

const INTERNAL_MESSAGE: &str = "Internal server error";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    match err.kind() {
        ErrorKind::Validation | ErrorKind::BusinessRule => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        ErrorKind::Infrastructure => {
            tracing::error!(error = %err, "fulfillment operation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<ParseStatusError> for ApiError {
    fn from(err: ParseStatusError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::DomainError;
    use store::EntityKind;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_business_rules_are_bad_requests() {
        let err = ApiError::from(FulfillmentError::from(DomainError::EmptyCart));
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_entities_are_not_found() {
        let err = ApiError::from(FulfillmentError::not_found(EntityKind::Order, "x"));
        assert_eq!(status_of(err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_identity_errors() {
        assert_eq!(
            status_of(ApiError::Unauthorized("who".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::Forbidden("admin only".to_string())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_infrastructure_errors_are_internal() {
        let err = ApiError::from(FulfillmentError::Gateway("down".to_string()));
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
