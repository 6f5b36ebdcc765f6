// ============================================================================
// Payment Gateway Adapter
// ============================================================================
//
// Boundary to the external payment/refund provider.
//
// - charge: idempotent per order number on the provider side. "Already paid"
//   is a success, transient failures are retried by the caller.
// - refund: attempted once per cancellation; callers decide what a failure
//   means for the order (it never blocks the cancellation).
//
// ============================================================================

pub mod http;
pub mod simulated;

pub use http::HttpPaymentGateway;
pub use simulated::SimulatedPaymentGateway;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ErrorKind;
use crate::health::{ComponentHealth, HealthStatus};
use crate::utils::{CircuitState, IsTransient};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub order_number: String,
    pub amount: Decimal,
    pub description: String,
    /// Payer identity at the provider (the user's openid)
    pub payer_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeStatus {
    Paid,
    /// The provider already holds a successful charge for this order number
    AlreadyPaid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    pub status: ChargeStatus,
    /// Opaque token the client uses to finish the payment
    pub transaction_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub order_number: String,
    pub refund_reference: String,
    pub refund_amount: Decimal,
    pub original_amount: Decimal,
}

impl RefundRequest {
    /// Full refund of an order; the reference is derived from the order
    /// number so a replayed refund is recognised by the provider
    pub fn full(order_number: &str, amount: Decimal) -> Self {
        Self {
            order_number: order_number.to_string(),
            refund_reference: format!("R{}", order_number),
            refund_amount: amount,
            original_amount: amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub refund_reference: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PaymentError {
    /// Network failure, timeout or provider 5xx
    #[error("Payment provider temporarily unavailable: {0}")]
    Transient(String),

    /// The provider refused the request
    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Payment provider circuit breaker is open")]
    CircuitOpen,
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ExternalServiceFailure
    }
}

impl IsTransient for PaymentError {
    fn is_transient(&self) -> bool {
        // An open breaker will not close within a retry window
        matches!(self, PaymentError::Transient(_))
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, PaymentError>;

    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, PaymentError>;

    /// Component health as seen by the health endpoint
    async fn health(&self) -> ComponentHealth {
        ComponentHealth::new("payment_gateway", HealthStatus::Healthy)
    }

    /// Providers without a breaker always report Closed
    async fn circuit_state(&self) -> CircuitState {
        CircuitState::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retried() {
        assert!(PaymentError::Transient("503".to_string()).is_transient());
        assert!(!PaymentError::Declined("card blocked".to_string()).is_transient());
        assert!(!PaymentError::CircuitOpen.is_transient());
    }

    #[test]
    fn test_full_refund_reference() {
        let request = RefundRequest::full("1700000000000001", Decimal::new(2500, 2));
        assert_eq!(request.refund_reference, "R1700000000000001");
        assert_eq!(request.refund_amount, request.original_amount);
    }

    #[test]
    fn test_charge_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ChargeStatus::AlreadyPaid).unwrap(),
            "\"ALREADY_PAID\""
        );
    }
}
