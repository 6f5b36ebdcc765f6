// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// - order/    - Order state machine, order service (cart → order → fulfilment)
// - catalog/  - Dish/combo rules and cache-coherent catalog service
//
// Every domain error maps onto one ErrorKind so callers can tell a missing
// entity from a broken business rule without matching on messages.
//
// ============================================================================

pub mod catalog;
pub mod order;

use serde::Serialize;

/// Machine-distinguishable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Referenced order/address/cart/catalog entity does not exist
    NotFound,
    /// A state guard or catalog rule failed
    BusinessRuleViolation,
    /// The payment provider failed a charge
    ExternalServiceFailure,
    /// A payment confirmation replay; callers treat it as success
    DuplicateCallback,
    /// A refund failed during reject/cancel; the cancellation still happened
    RefundFailed,
    /// Storage or cache backend fault
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::BusinessRuleViolation => "BUSINESS_RULE_VIOLATION",
            ErrorKind::ExternalServiceFailure => "EXTERNAL_SERVICE_FAILURE",
            ErrorKind::DuplicateCallback => "DUPLICATE_CALLBACK",
            ErrorKind::RefundFailed => "REFUND_FAILED",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
