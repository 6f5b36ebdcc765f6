use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use dashmap::DashSet;
use uuid::Uuid;

use super::{
    ChargeReceipt, ChargeRequest, ChargeStatus, PaymentError, PaymentGateway, RefundReceipt,
    RefundRequest,
};

// ============================================================================
// Simulated Payment Gateway
// ============================================================================
//
// In-process provider for local runs and tests. Charges always succeed
// (a second charge of the same order number reports ALREADY_PAID) unless
// transient failures are queued; refunds can be switched to fail.
//
// ============================================================================

#[derive(Default)]
pub struct SimulatedPaymentGateway {
    paid: DashSet<String>,
    charge_calls: AtomicU32,
    refund_calls: AtomicU32,
    pending_charge_failures: AtomicU32,
    fail_refunds: AtomicBool,
}

impl SimulatedPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` charges fail with a transient error
    pub fn fail_next_charges(&self, count: u32) {
        self.pending_charge_failures.store(count, Ordering::SeqCst);
    }

    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    pub fn charge_calls(&self) -> u32 {
        self.charge_calls.load(Ordering::SeqCst)
    }

    pub fn refund_calls(&self) -> u32 {
        self.refund_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, PaymentError> {
        self.charge_calls.fetch_add(1, Ordering::SeqCst);

        let injected_failure = self
            .pending_charge_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected_failure {
            return Err(PaymentError::Transient("simulated provider outage".to_string()));
        }

        let status = if self.paid.insert(request.order_number.clone()) {
            ChargeStatus::Paid
        } else {
            ChargeStatus::AlreadyPaid
        };

        Ok(ChargeReceipt {
            status,
            transaction_token: Some(Uuid::new_v4().to_string()),
        })
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, PaymentError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(PaymentError::Declined(format!(
                "refund rejected for order {}",
                request.order_number
            )));
        }

        Ok(RefundReceipt {
            refund_reference: request.refund_reference.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn request(number: &str) -> ChargeRequest {
        ChargeRequest {
            order_number: number.to_string(),
            amount: Decimal::new(1000, 2),
            description: "Takeout order".to_string(),
            payer_id: "openid".to_string(),
        }
    }

    #[tokio::test]
    async fn test_second_charge_reports_already_paid() {
        let gateway = SimulatedPaymentGateway::new();
        let first = gateway.charge(&request("A1")).await.unwrap();
        let second = gateway.charge(&request("A1")).await.unwrap();

        assert_eq!(first.status, ChargeStatus::Paid);
        assert_eq!(second.status, ChargeStatus::AlreadyPaid);
        assert_eq!(gateway.charge_calls(), 2);
    }

    #[tokio::test]
    async fn test_injected_charge_failures_are_consumed() {
        let gateway = SimulatedPaymentGateway::new();
        gateway.fail_next_charges(1);

        assert!(matches!(
            gateway.charge(&request("B1")).await,
            Err(PaymentError::Transient(_))
        ));
        assert!(gateway.charge(&request("B1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_refund_failure_switch() {
        let gateway = SimulatedPaymentGateway::new();
        let refund = RefundRequest::full("C1", Decimal::new(1000, 2));

        assert!(gateway.refund(&refund).await.is_ok());
        gateway.set_fail_refunds(true);
        assert!(gateway.refund(&refund).await.is_err());
        assert_eq!(gateway.refund_calls(), 2);
    }
}
