use sea_orm::error::DbErr;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the transfer engine.
///
/// Any error raised inside a create/update/delete transaction aborts the
/// whole transaction; callers never observe partial stock or cost mutation.
#[derive(Error, Debug, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Invalid discount: {0}")]
    InvalidDiscount(String),

    #[error("Invalid tax rate: {0}")]
    InvalidTaxRate(String),

    #[error("Invalid shipping: {0}")]
    InvalidShipping(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Helper trait so `ServiceError::db_error` accepts both `DbErr` and plain
/// message strings.
pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }
}

impl From<sea_orm::TransactionError<ServiceError>> for ServiceError {
    fn from(err: sea_orm::TransactionError<ServiceError>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            sea_orm::TransactionError::Transaction(service_err) => service_err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_error_accepts_strings() {
        let err = ServiceError::db_error("connection lost");
        assert!(matches!(err, ServiceError::DatabaseError(_)));
        assert!(err.to_string().contains("connection lost"));
    }

    #[test]
    fn domain_errors_serialize_for_transport() {
        let err = ServiceError::InsufficientStock("requested 5, available 3".into());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("InsufficientStock"));
    }

    #[test]
    fn transaction_error_unwraps_inner_service_error() {
        let inner = ServiceError::NotFound("transfer 42".into());
        let wrapped = sea_orm::TransactionError::Transaction(inner);
        let err: ServiceError = wrapped.into();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
