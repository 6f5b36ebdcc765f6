use serde::{Deserialize, Serialize};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::models::AddressBook;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::OrderEvent;
use super::value_objects::{OrderStatus, PayMethod, PayStatus, SubmitOrder};

// ============================================================================
// Order Aggregate - State Machine
// ============================================================================
//
//   PENDING_PAYMENT(1) → TO_BE_CONFIRMED(2) → CONFIRMED(3)
//        │                    │                   │
//        └──────┬─────────────┘                   ▼
//               ▼                     DELIVERY_IN_PROGRESS(4)
//          CANCELLED(6)                           │
//                                                 ▼
//                                           COMPLETED(5)
//
// handle_command validates a command against the current state and returns
// the events it produces; apply_event folds an event into the order. Status
// never decreases by ordinal.
//
// ============================================================================

pub const USER_CANCEL_REASON: &str = "user cancelled";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    // Identity
    pub id: i64,
    pub number: String,
    pub version: u64,

    // Current state
    pub status: OrderStatus,
    pub pay_status: PayStatus,
    pub pay_method: PayMethod,

    pub user_id: i64,
    pub address_book_id: i64,
    pub amount: Decimal,
    pub pack_amount: Decimal,
    pub tableware_number: u32,
    pub remark: Option<String>,

    // Delivery snapshot taken at submission
    pub consignee: String,
    pub phone: String,
    pub address: String,

    // Timeline
    pub order_time: NaiveDateTime,
    pub checkout_time: Option<NaiveDateTime>,
    pub estimated_delivery_time: Option<NaiveDateTime>,
    pub delivery_time: Option<NaiveDateTime>,
    pub cancel_time: Option<NaiveDateTime>,

    pub cancel_reason: Option<String>,
    pub rejection_reason: Option<String>,
}

impl Order {
    /// New order awaiting payment. The store assigns `id`.
    pub fn place(
        number: String,
        user_id: i64,
        address: &AddressBook,
        request: &SubmitOrder,
        amount: Decimal,
        order_time: NaiveDateTime,
    ) -> Self {
        Self {
            id: 0,
            number,
            version: 0,
            status: OrderStatus::PendingPayment,
            pay_status: PayStatus::Unpaid,
            pay_method: request.pay_method,
            user_id,
            address_book_id: address.id,
            amount,
            pack_amount: request.pack_amount,
            tableware_number: request.tableware_number,
            remark: request.remark.clone(),
            consignee: address.consignee.clone(),
            phone: address.phone.clone(),
            address: address.full_address(),
            order_time,
            checkout_time: None,
            estimated_delivery_time: request.estimated_delivery_time,
            delivery_time: None,
            cancel_time: None,
            cancel_reason: None,
            rejection_reason: None,
        }
    }

    /// Validate a command and emit events (business logic)
    pub fn handle_command(&self, command: &OrderCommand) -> Result<Vec<OrderEvent>, OrderError> {
        let now = crate::utils::now();

        match command {
            OrderCommand::ConfirmPayment => {
                if self.pay_status != PayStatus::Unpaid {
                    return Err(OrderError::DuplicateCallback(self.number.clone()));
                }
                self.require(OrderStatus::PendingPayment, command)?;
                Ok(vec![OrderEvent::PaymentConfirmed { checkout_time: now }])
            }

            OrderCommand::Confirm => {
                self.require(OrderStatus::ToBeConfirmed, command)?;
                Ok(vec![OrderEvent::Confirmed])
            }

            OrderCommand::Reject { reason } => {
                self.require(OrderStatus::ToBeConfirmed, command)?;
                Ok(vec![OrderEvent::Rejected {
                    reason: reason.clone(),
                    cancel_time: now,
                    refund_required: self.pay_status == PayStatus::Paid,
                }])
            }

            OrderCommand::Cancel { reason } => {
                if !matches!(
                    self.status,
                    OrderStatus::PendingPayment | OrderStatus::ToBeConfirmed
                ) {
                    return Err(self.invalid(command));
                }
                Ok(vec![OrderEvent::Cancelled {
                    reason: reason.clone(),
                    cancel_time: now,
                    refund_required: self.pay_status == PayStatus::Paid,
                }])
            }

            OrderCommand::UserCancel => {
                if self.status > OrderStatus::ToBeConfirmed {
                    return Err(OrderError::TooLateToCancel(self.status));
                }
                Ok(vec![OrderEvent::Cancelled {
                    reason: USER_CANCEL_REASON.to_string(),
                    cancel_time: now,
                    refund_required: self.status == OrderStatus::ToBeConfirmed
                        && self.pay_status == PayStatus::Paid,
                }])
            }

            OrderCommand::Dispatch => {
                self.require(OrderStatus::Confirmed, command)?;
                Ok(vec![OrderEvent::Dispatched])
            }

            OrderCommand::Complete => {
                self.require(OrderStatus::DeliveryInProgress, command)?;
                Ok(vec![OrderEvent::Completed { delivery_time: now }])
            }

            OrderCommand::Remind => {
                if self.status.is_terminal() {
                    return Err(self.invalid(command));
                }
                Ok(vec![OrderEvent::ReminderRequested])
            }
        }
    }

    /// Fold an event into the order
    pub fn apply_event(&mut self, event: &OrderEvent) {
        match event {
            OrderEvent::PaymentConfirmed { checkout_time } => {
                self.status = OrderStatus::ToBeConfirmed;
                self.pay_status = PayStatus::Paid;
                self.checkout_time = Some(*checkout_time);
            }
            OrderEvent::Confirmed => {
                self.status = OrderStatus::Confirmed;
            }
            OrderEvent::Rejected { reason, cancel_time, .. } => {
                self.status = OrderStatus::Cancelled;
                self.rejection_reason = Some(reason.clone());
                self.cancel_time = Some(*cancel_time);
            }
            OrderEvent::Cancelled { reason, cancel_time, .. } => {
                self.status = OrderStatus::Cancelled;
                self.cancel_reason = Some(reason.clone());
                self.cancel_time = Some(*cancel_time);
            }
            OrderEvent::Dispatched => {
                self.status = OrderStatus::DeliveryInProgress;
            }
            OrderEvent::Completed { delivery_time } => {
                self.status = OrderStatus::Completed;
                self.delivery_time = Some(*delivery_time);
            }
            OrderEvent::ReminderRequested => {}
            OrderEvent::Refunded { .. } => {
                self.pay_status = PayStatus::Refunded;
            }
        }
    }

    fn require(&self, expected: OrderStatus, command: &OrderCommand) -> Result<(), OrderError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.invalid(command))
        }
    }

    fn invalid(&self, command: &OrderCommand) -> OrderError {
        OrderError::InvalidTransition {
            status: self.status,
            action: command.action(),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    pub(crate) fn sample_order(status: OrderStatus, pay_status: PayStatus) -> Order {
        let address = AddressBook {
            id: 3,
            user_id: 1,
            consignee: "Wang".to_string(),
            phone: "13900000000".to_string(),
            province_name: None,
            city_name: Some("Hangzhou".to_string()),
            district_name: None,
            detail: "West Lake Rd 8".to_string(),
        };
        let mut order = Order::place(
            "1700000000000000".to_string(),
            1,
            &address,
            &SubmitOrder::new(3),
            Decimal::new(2500, 2),
            crate::utils::now(),
        );
        order.id = 42;
        order.status = status;
        order.pay_status = pay_status;
        order
    }

    fn all_commands() -> Vec<OrderCommand> {
        vec![
            OrderCommand::ConfirmPayment,
            OrderCommand::Confirm,
            OrderCommand::Reject { reason: "sold out".to_string() },
            OrderCommand::Cancel { reason: "closing early".to_string() },
            OrderCommand::UserCancel,
            OrderCommand::Dispatch,
            OrderCommand::Complete,
            OrderCommand::Remind,
        ]
    }

    fn pay_status_for(status: OrderStatus) -> PayStatus {
        if status == OrderStatus::PendingPayment {
            PayStatus::Unpaid
        } else {
            PayStatus::Paid
        }
    }

    #[test]
    fn test_place_snapshots_address() {
        let order = sample_order(OrderStatus::PendingPayment, PayStatus::Unpaid);
        assert_eq!(order.consignee, "Wang");
        assert_eq!(order.address, "HangzhouWest Lake Rd 8");
        assert_eq!(order.version, 0);
    }

    #[test]
    fn test_happy_path() {
        let mut order = sample_order(OrderStatus::PendingPayment, PayStatus::Unpaid);

        for command in [
            OrderCommand::ConfirmPayment,
            OrderCommand::Confirm,
            OrderCommand::Dispatch,
            OrderCommand::Complete,
        ] {
            for event in order.handle_command(&command).unwrap() {
                order.apply_event(&event);
            }
        }

        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.pay_status, PayStatus::Paid);
        assert!(order.checkout_time.is_some());
        assert!(order.delivery_time.is_some());
    }

    #[test]
    fn test_status_never_decreases() {
        for status in OrderStatus::ALL {
            for command in all_commands() {
                let order = sample_order(status, pay_status_for(status));
                if let Ok(events) = order.handle_command(&command) {
                    let mut next = order.clone();
                    for event in &events {
                        next.apply_event(event);
                    }
                    assert!(
                        next.status >= order.status,
                        "{:?} moved {} back to {}",
                        command,
                        order.status,
                        next.status
                    );
                }
            }
        }
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for status in [OrderStatus::Completed, OrderStatus::Cancelled] {
            for command in all_commands() {
                let order = sample_order(status, PayStatus::Paid);
                assert!(order.handle_command(&command).is_err(), "{:?} on {}", command, status);
            }
        }
    }

    #[test]
    fn test_duplicate_payment_callback() {
        let order = sample_order(OrderStatus::ToBeConfirmed, PayStatus::Paid);
        let err = order.handle_command(&OrderCommand::ConfirmPayment).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateCallback);
    }

    #[test]
    fn test_payment_on_cancelled_unpaid_order_is_rejected() {
        let order = sample_order(OrderStatus::Cancelled, PayStatus::Unpaid);
        let err = order.handle_command(&OrderCommand::ConfirmPayment).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BusinessRuleViolation);
    }

    #[test]
    fn test_reject_paid_order_requires_refund() {
        let order = sample_order(OrderStatus::ToBeConfirmed, PayStatus::Paid);
        let events = order
            .handle_command(&OrderCommand::Reject { reason: "kitchen closed".to_string() })
            .unwrap();
        assert!(events[0].refund_required());

        let mut next = order.clone();
        next.apply_event(&events[0]);
        assert_eq!(next.status, OrderStatus::Cancelled);
        assert_eq!(next.rejection_reason.as_deref(), Some("kitchen closed"));
        assert!(next.cancel_time.is_some());
    }

    #[test]
    fn test_reject_requires_to_be_confirmed() {
        let order = sample_order(OrderStatus::Confirmed, PayStatus::Paid);
        let err = order
            .handle_command(&OrderCommand::Reject { reason: "late".to_string() })
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition { status: OrderStatus::Confirmed, action: "reject" }
        ));
    }

    #[test]
    fn test_cancel_unpaid_order_needs_no_refund() {
        let order = sample_order(OrderStatus::PendingPayment, PayStatus::Unpaid);
        let events = order
            .handle_command(&OrderCommand::Cancel { reason: "timeout".to_string() })
            .unwrap();
        assert!(!events[0].refund_required());
    }

    #[test]
    fn test_cancel_after_confirm_is_rejected() {
        let order = sample_order(OrderStatus::Confirmed, PayStatus::Paid);
        let err = order
            .handle_command(&OrderCommand::Cancel { reason: "x".to_string() })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BusinessRuleViolation);
    }

    #[test]
    fn test_user_cancel_rules() {
        let pending = sample_order(OrderStatus::PendingPayment, PayStatus::Unpaid);
        let events = pending.handle_command(&OrderCommand::UserCancel).unwrap();
        assert!(!events[0].refund_required());

        let waiting = sample_order(OrderStatus::ToBeConfirmed, PayStatus::Paid);
        let events = waiting.handle_command(&OrderCommand::UserCancel).unwrap();
        assert!(events[0].refund_required());
        let mut next = waiting.clone();
        next.apply_event(&events[0]);
        assert_eq!(next.cancel_reason.as_deref(), Some(USER_CANCEL_REASON));

        let confirmed = sample_order(OrderStatus::Confirmed, PayStatus::Paid);
        assert!(matches!(
            confirmed.handle_command(&OrderCommand::UserCancel),
            Err(OrderError::TooLateToCancel(OrderStatus::Confirmed))
        ));
    }

    #[test]
    fn test_reminder_changes_nothing() {
        let order = sample_order(OrderStatus::Confirmed, PayStatus::Paid);
        let events = order.handle_command(&OrderCommand::Remind).unwrap();
        assert_eq!(events, vec![OrderEvent::ReminderRequested]);
        assert!(!events[0].changes_state());

        let mut next = order.clone();
        next.apply_event(&events[0]);
        assert_eq!(next, order);
    }

    #[test]
    fn test_refund_marks_pay_status() {
        let mut order = sample_order(OrderStatus::Cancelled, PayStatus::Paid);
        order.apply_event(&OrderEvent::Refunded { refund_reference: "R1".to_string() });
        assert_eq!(order.pay_status, PayStatus::Refunded);
    }

    #[test]
    fn test_dispatch_and_complete_guards() {
        let waiting = sample_order(OrderStatus::ToBeConfirmed, PayStatus::Paid);
        assert!(waiting.handle_command(&OrderCommand::Dispatch).is_err());
        assert!(waiting.handle_command(&OrderCommand::Complete).is_err());

        let confirmed = sample_order(OrderStatus::Confirmed, PayStatus::Paid);
        assert!(confirmed.handle_command(&OrderCommand::Complete).is_err());
    }
}
