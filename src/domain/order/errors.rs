use super::value_objects::OrderStatus;
use crate::domain::ErrorKind;
use crate::payment::PaymentError;
use crate::store::StoreError;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(i64),

    #[error("Order not found for number: {0}")]
    NumberNotFound(String),

    #[error("Address book entry not found: {0}")]
    AddressNotFound(i64),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Shopping cart is empty")]
    EmptyCart,

    #[error("Cannot {action} order in status {status}")]
    InvalidTransition {
        status: OrderStatus,
        action: &'static str,
    },

    #[error("Order in status {0} can no longer be cancelled by the customer")]
    TooLateToCancel(OrderStatus),

    #[error("Payment for order {0} was already confirmed")]
    DuplicateCallback(String),

    #[error("Payment failed: {0}")]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::NotFound(_)
            | OrderError::NumberNotFound(_)
            | OrderError::AddressNotFound(_)
            | OrderError::UserNotFound(_) => ErrorKind::NotFound,
            OrderError::EmptyCart
            | OrderError::InvalidTransition { .. }
            | OrderError::TooLateToCancel(_) => ErrorKind::BusinessRuleViolation,
            OrderError::DuplicateCallback(_) => ErrorKind::DuplicateCallback,
            OrderError::Payment(e) => e.kind(),
            OrderError::Store(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_and_illegal_are_distinct_kinds() {
        assert_eq!(OrderError::NotFound(7).kind(), ErrorKind::NotFound);
        assert_eq!(
            OrderError::InvalidTransition {
                status: OrderStatus::Completed,
                action: "dispatch",
            }
            .kind(),
            ErrorKind::BusinessRuleViolation
        );
        assert_eq!(
            OrderError::TooLateToCancel(OrderStatus::Confirmed).kind(),
            ErrorKind::BusinessRuleViolation
        );
    }

    #[test]
    fn test_payment_failure_is_external() {
        let err = OrderError::from(PaymentError::Declined("insufficient funds".to_string()));
        assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
    }

    #[test]
    fn test_version_conflict_is_business_rule() {
        let err = OrderError::from(StoreError::VersionConflict {
            id: 1,
            expected: 2,
            actual: 3,
        });
        assert_eq!(err.kind(), ErrorKind::BusinessRuleViolation);
    }

    #[test]
    fn test_message_names_action_and_status() {
        let err = OrderError::InvalidTransition {
            status: OrderStatus::Confirmed,
            action: "reject",
        };
        assert_eq!(err.to_string(), "Cannot reject order in status CONFIRMED");
    }
}
