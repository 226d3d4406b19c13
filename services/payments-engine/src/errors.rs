use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use escrow_core::Error as DomainError;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, PaymentsError>;

#[derive(Error, Debug)]
pub enum PaymentsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Payment initiation failed: {0}")]
    PaymentInitiationFailed(String),

    #[error("Payment not yet completed: {0}")]
    PaymentNotCompleted(String),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Escrow account not found: {0}")]
    EscrowNotFound(Uuid),

    #[error("Wallet not found for user: {0}")]
    WalletNotFound(Uuid),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for PaymentsError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.to_string(),
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            PaymentsError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PaymentsError::Domain(e) => domain_status_code(e),
            PaymentsError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // External dependency failure, not a caller error
            PaymentsError::PaymentInitiationFailed(_) => StatusCode::BAD_GATEWAY,
            PaymentsError::PaymentNotCompleted(_) => StatusCode::CONFLICT,
            PaymentsError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            PaymentsError::EscrowNotFound(_) => StatusCode::NOT_FOUND,
            PaymentsError::WalletNotFound(_) => StatusCode::NOT_FOUND,
            PaymentsError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            PaymentsError::Validation(_) => StatusCode::BAD_REQUEST,
            PaymentsError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PaymentsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn domain_status_code(e: &DomainError) -> StatusCode {
    match e {
        // Caller-correctable input
        DomainError::EmptyCart
        | DomainError::InvalidAddress(_)
        | DomainError::MissingPaymentMethod
        | DomainError::NonPositiveAmount(_)
        | DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        // Business-rule violations, detailed enough to adjust the request
        DomainError::ProductUnavailable { .. }
        | DomainError::InsufficientStock { .. }
        | DomainError::MultiSellerCheckout { .. }
        | DomainError::InsufficientFunds { .. }
        | DomainError::SingleLimitExceeded { .. }
        | DomainError::DailyLimitExceeded { .. }
        | DomainError::WalletInactive(_) => StatusCode::UNPROCESSABLE_ENTITY,
        // Consistency conflicts
        DomainError::InvalidTransition { .. }
        | DomainError::NotFunded(_)
        | DomainError::AmountMismatch { .. }
        | DomainError::ReleaseConditionUnmet { .. } => StatusCode::CONFLICT,
        DomainError::UnknownValue { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl PaymentsError {
    fn error_type(&self) -> &'static str {
        match self {
            PaymentsError::Database(_) => "database_error",
            PaymentsError::Domain(e) => match e {
                DomainError::EmptyCart => "empty_cart",
                DomainError::InvalidAddress(_) => "invalid_address",
                DomainError::MissingPaymentMethod => "missing_payment_method",
                DomainError::ProductUnavailable { .. } => "product_unavailable",
                DomainError::InsufficientStock { .. } => "insufficient_stock",
                DomainError::MultiSellerCheckout { .. } => "multi_seller_checkout",
                DomainError::InsufficientFunds { .. } => "insufficient_funds",
                DomainError::SingleLimitExceeded { .. }
                | DomainError::DailyLimitExceeded { .. } => "limit_exceeded",
                DomainError::WalletInactive(_) => "wallet_inactive",
                DomainError::InvalidTransition { .. } => "invalid_transition",
                DomainError::NotFunded(_) => "escrow_not_funded",
                DomainError::AmountMismatch { .. } => "amount_mismatch",
                DomainError::ReleaseConditionUnmet { .. } => "release_condition_unmet",
                DomainError::NonPositiveAmount(_) => "non_positive_amount",
                DomainError::UnknownValue { .. } => "corrupt_record",
                DomainError::Validation(_) => "validation_error",
            },
            PaymentsError::Serialization(_) => "serialization_error",
            PaymentsError::PaymentInitiationFailed(_) => "payment_initiation_failed",
            PaymentsError::PaymentNotCompleted(_) => "payment_not_completed",
            PaymentsError::OrderNotFound(_)
            | PaymentsError::EscrowNotFound(_)
            | PaymentsError::WalletNotFound(_)
            | PaymentsError::TransactionNotFound(_) => "not_found",
            PaymentsError::Validation(_) => "validation_error",
            PaymentsError::Configuration(_) => "configuration_error",
            PaymentsError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_checkout_errors_map_to_4xx() {
        assert_eq!(
            PaymentsError::from(DomainError::EmptyCart).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PaymentsError::from(DomainError::MultiSellerCheckout { sellers: 2 }).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            PaymentsError::from(DomainError::InsufficientStock {
                name: "maize".to_string(),
                available: 1,
                requested: 3,
            })
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_provider_failure_maps_to_5xx() {
        let err = PaymentsError::PaymentInitiationFailed("timeout".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_invariant_violations_map_to_422() {
        let err = PaymentsError::from(DomainError::InsufficientFunds {
            available: Decimal::from(100),
            requested: Decimal::from(500),
        });
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_conflicts_map_to_409() {
        use escrow_core::EscrowStatus;
        let err = PaymentsError::from(DomainError::InvalidTransition {
            from: EscrowStatus::Released,
            to: EscrowStatus::Refunding,
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = PaymentsError::from(DomainError::ReleaseConditionUnmet {
            condition: "delivery_confirmation",
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
