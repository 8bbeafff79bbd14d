use std::fmt::Display;

use axum::http::StatusCode;

use crate::{db::dao::DaoLayerError, storage::StorageError};

const DB_FAILURE_MESSAGE: &str = "database operation failed. Please check the logs for more details";
const STORAGE_FAILURE_MESSAGE: &str = "Object storage request failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::BadGateway(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Logs `source` and keeps only `message` for the client.
    pub fn internal_with_source(message: impl Into<String>, source: impl Display) -> Self {
        let message = message.into();
        tracing::error!(error = %source, "{message}");
        Self::Internal(message)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Self::bad_request(message)
            }
            StatusCode::UNAUTHORIZED => Self::unauthorized(message),
            StatusCode::FORBIDDEN => Self::forbidden(message),
            StatusCode::NOT_FOUND => Self::not_found(message),
            StatusCode::CONFLICT => Self::conflict(message),
            StatusCode::BAD_GATEWAY => Self::bad_gateway(message),
            _ if status.is_client_error() => Self::bad_request(message),
            _ => Self::internal(message),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::BadGateway(message)
            | Self::Internal(message) => message.as_str(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl From<DaoLayerError> for AppError {
    fn from(err: DaoLayerError) -> Self {
        match err {
            DaoLayerError::NotFound { .. } => AppError::not_found(err.to_string()),
            DaoLayerError::Conflict(message) => AppError::conflict(message),
            DaoLayerError::InvalidPagination { .. } => AppError::bad_request(err.to_string()),
            DaoLayerError::Db(db_err) => AppError::internal_with_source(DB_FAILURE_MESSAGE, db_err),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "object storage failure");
        AppError::bad_gateway(STORAGE_FAILURE_MESSAGE)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|(left, _), (right, _)| left.cmp(right));

        let message = fields
            .into_iter()
            .find_map(|(field, errs)| {
                errs.first().map(|err| match err.message.as_ref() {
                    Some(message) => format!("{field}: {message}"),
                    None => format!("{field}: invalid value ({})", err.code),
                })
            })
            .unwrap_or_else(|| "Invalid request".to_string());

        AppError::bad_request(message)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use sea_orm::DbErr;
    use uuid::Uuid;
    use validator::Validate;

    use super::AppError;
    use crate::{db::dao::DaoLayerError, storage::StorageError};

    #[derive(Validate)]
    struct Form {
        #[validate(email(message = "must be a valid email address"))]
        email: String,
    }

    #[test]
    fn dao_errors_map_to_expected_statuses() {
        let not_found = AppError::from(DaoLayerError::NotFound {
            entity: "user",
            id: Uuid::nil(),
        });
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let paging = AppError::from(DaoLayerError::InvalidPagination {
            page: 0,
            page_size: 10,
        });
        assert_eq!(paging.status(), StatusCode::BAD_REQUEST);

        let conflict = AppError::from(DaoLayerError::Conflict("Email already registered"));
        assert_eq!(conflict, AppError::conflict("Email already registered"));

        let db = AppError::from(DaoLayerError::Db(DbErr::Custom("boom".to_string())));
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!db.message().contains("boom"));
    }

    #[test]
    fn storage_errors_hide_details() {
        let err = AppError::from(StorageError::Status {
            status: 403,
            body: "AccessDenied".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.message(), "Object storage request failed");
    }

    #[test]
    fn validation_errors_report_first_field_message() {
        let form = Form {
            email: "not-an-email".to_string(),
        };
        let err = AppError::from(form.validate().expect_err("email should be invalid"));

        assert_eq!(err, AppError::bad_request("email: must be a valid email address"));
    }

    #[test]
    fn from_status_folds_unknown_client_errors_into_bad_request() {
        assert_eq!(
            AppError::from_status(StatusCode::PAYLOAD_TOO_LARGE, "too big"),
            AppError::bad_request("too big")
        );
        assert_eq!(
            AppError::from_status(StatusCode::SERVICE_UNAVAILABLE, "down"),
            AppError::internal("down")
        );
    }
}
