use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    /// Authenticated, but the account must change its password first.
    PasswordChangeRequired,
    Conflict(String),
    BadRequest(String),
    BusinessRule(String),
    TooManyRequests {
        message: String,
        retry_after_secs: u64,
    },
    /// A downstream dependency (mail relay, storage, PDF renderer) failed.
    Integration(String),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::PasswordChangeRequired => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::BusinessRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Integration(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to an end user (views use it for flash redirects).
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg)
            | AppError::BusinessRule(msg)
            | AppError::Integration(msg) => msg.clone(),
            AppError::TooManyRequests { message, .. } => message.clone(),
            AppError::PasswordChangeRequired => "Password change required".to_string(),
            AppError::Validation(errors) => errors.join(", "),
            AppError::InternalServerError(_) => "Internal server error".to_string(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::InternalServerError(err) => write!(f, "internal error: {:#}", err),
            other => write!(f, "{}", other.public_message()),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut retry_after = None;
        let (error_message, code, details) = match self {
            AppError::NotFound(msg) => (msg, "NOT_FOUND", None),
            AppError::Unauthorized(msg) => (msg, "UNAUTHORIZED", None),
            AppError::Forbidden(msg) => (msg, "FORBIDDEN", None),
            AppError::PasswordChangeRequired => (
                "Password change required".to_string(),
                "PASSWORD_CHANGE_REQUIRED",
                None,
            ),
            AppError::Conflict(msg) => (msg, "CONFLICT", None),
            AppError::BadRequest(msg) => (msg, "BAD_REQUEST", None),
            AppError::BusinessRule(msg) => (msg, "BUSINESS_RULE_VIOLATION", None),
            AppError::TooManyRequests {
                message,
                retry_after_secs,
            } => {
                retry_after = Some(retry_after_secs);
                (message, "RATE_LIMITED", None)
            }
            AppError::Integration(msg) => {
                tracing::error!(error = %msg, "Integration failure");
                (msg, "INTEGRATION_ERROR", None)
            }
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR",
                    None,
                )
            }
            AppError::Validation(errors) => (
                "Validation failed".to_string(),
                "VALIDATION_ERROR",
                Some(serde_json::json!({ "errors": errors })),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: code.to_string(),
            details,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(err) => AppError::InternalServerError(err),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(ref db)
                if db.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                AppError::Conflict("Resource already exists".to_string())
            }
            _ => AppError::InternalServerError(err.into()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        AppError::Validation(messages)
    }
}

impl From<crate::services::numbering::TemplateError> for AppError {
    fn from(err: crate::services::numbering::TemplateError) -> Self {
        AppError::Validation(vec![format!("template: {}", err)])
    }
}

impl From<crate::services::password_reset::ResetTokenError> for AppError {
    fn from(err: crate::services::password_reset::ResetTokenError) -> Self {
        use crate::services::password_reset::ResetTokenError;
        match err {
            ResetTokenError::InvalidToken | ResetTokenError::TokenExpired => {
                AppError::NotFound(err.to_string())
            }
            ResetTokenError::TokenAlreadyUsed => AppError::Conflict(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn app_error_into_response_maps_status_and_body() {
        let cases = vec![
            (AppError::BadRequest("bad".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Unauthorized("nope".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Forbidden("denied".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AppError::Conflict("taken".into()), StatusCode::CONFLICT, "CONFLICT"),
            (AppError::NotFound("missing".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                AppError::BusinessRule("no seller".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "BUSINESS_RULE_VIOLATION",
            ),
            (
                AppError::Integration("smtp down".into()),
                StatusCode::BAD_GATEWAY,
                "INTEGRATION_ERROR",
            ),
        ];

        for (error, status, code) in cases {
            let message = error.public_message();
            let response = error.into_response();
            assert_eq!(response.status(), status);
            let json = response_json(response).await;
            assert_eq!(json["error"], message);
            assert_eq!(json["code"], code);
        }
    }

    #[tokio::test]
    async fn app_error_validation_includes_details() {
        let response = AppError::Validation(vec!["field: invalid".to_string()]).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["error"], "Validation failed");
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["details"]["errors"][0], "field: invalid");
    }

    #[tokio::test]
    async fn app_error_internal_maps_to_generic_message() {
        let response = AppError::InternalServerError(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = response_json(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert_eq!(json["code"], "INTERNAL_SERVER_ERROR");
        assert!(json["details"].is_null());
    }

    #[tokio::test]
    async fn too_many_requests_sets_retry_after() {
        let response = AppError::TooManyRequests {
            message: "slow down".into(),
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response
                .headers()
                .get(axum::http::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
            Some("42")
        );
    }

    #[tokio::test]
    async fn password_change_required_has_dedicated_code() {
        let response = AppError::PasswordChangeRequired.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["code"], "PASSWORD_CHANGE_REQUIRED");
    }

    #[test]
    fn anyhow_wrapping_an_app_error_keeps_its_variant() {
        let err = anyhow::Error::new(AppError::BusinessRule("No active seller found".into()));
        let mapped: AppError = err.into();
        assert!(matches!(mapped, AppError::BusinessRule(_)));
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let mapped: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(mapped, AppError::NotFound(_)));
    }
}
