use sea_orm::TransactionError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Access forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Config error: {0}")]
    Config(String),
}

impl AppError {
    /// HTTP-style status for the surrounding transport layer
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Forbidden(_) => 403,
            AppError::Conflict(_) => 409,
            AppError::Validation(_) => 400,
            AppError::Database(err) => {
                tracing::error!("Database error: {}", err);
                500
            }
            AppError::Config(msg) => {
                tracing::error!("Config error: {}", msg);
                500
            }
        }
    }
}

/// Result type alias for application
pub type AppResult<T> = Result<T, AppError>;

/// Helper trait for converting Option to AppError::NotFound
pub trait OptionExt<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(msg.into()))
    }
}

/// Flatten errors raised inside `TransactionTrait::transaction` closures
impl From<TransactionError<AppError>> for AppError {
    fn from(err: TransactionError<AppError>) -> Self {
        match err {
            TransactionError::Connection(db) => AppError::Database(db),
            TransactionError::Transaction(app) => app,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("event".into()).status_code(), 404);
        assert_eq!(AppError::Forbidden("membership".into()).status_code(), 403);
        assert_eq!(AppError::Conflict("voting closed".into()).status_code(), 409);
        assert_eq!(AppError::Validation("kind".into()).status_code(), 400);
    }

    #[test]
    fn test_option_ext() {
        let opt: Option<i32> = None;
        let result = opt.ok_or_not_found("Item not found");
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_transaction_error_flattening() {
        let err: AppError =
            TransactionError::Transaction(AppError::Conflict("closed".into())).into();
        assert!(matches!(err, AppError::Conflict(_)));

        let err: AppError =
            TransactionError::<AppError>::Connection(sea_orm::DbErr::Custom("gone".into())).into();
        assert!(matches!(err, AppError::Database(_)));
    }
}
