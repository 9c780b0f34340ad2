use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum CarlError {
    #[display("database error: {_0}")]
    Database(DieselError),
    #[display("connection pool error: {_0}")]
    Pool(diesel::r2d2::PoolError),
    #[display("{what} {id} not found")]
    #[from(ignore)]
    NotFound { what: &'static str, id: i32 },
    #[display("{message}")]
    #[from(ignore)]
    InvalidInput { message: String },
    #[display("an engagement run is already in progress")]
    #[from(ignore)]
    AlreadyRunning,
}

impl CarlError {
    pub fn not_found(what: &'static str, id: i32) -> Self {
        Self::NotFound { what, id }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Database(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
                unique_violation_message(info.message())
            }
            Self::Database(_) | Self::Pool(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

fn unique_violation_message(detail: &str) -> String {
    if detail.contains("users.username") {
        "username already taken".to_string()
    } else if detail.contains("likes.") {
        "already liked".to_string()
    } else if detail.contains("retweets.") {
        "already retweeted".to_string()
    } else {
        "duplicate entry".to_string()
    }
}

impl ResponseError for CarlError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Database(DieselError::NotFound) | Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Pool(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::AlreadyRunning => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        HttpResponse::build(status).json(serde_json::json!({ "error": self.public_message() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            CarlError::not_found("post", 7).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CarlError::invalid("bad limit").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(CarlError::AlreadyRunning.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            CarlError::from(DieselError::RollbackTransaction).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(CarlError::not_found("post", 42).to_string(), "post 42 not found");
    }

    #[test]
    fn test_unique_violation_messages() {
        assert_eq!(
            unique_violation_message("UNIQUE constraint failed: users.username"),
            "username already taken"
        );
        assert_eq!(
            unique_violation_message("UNIQUE constraint failed: likes.post_id, likes.user_id"),
            "already liked"
        );
        assert_eq!(unique_violation_message("something else"), "duplicate entry");
    }
}
