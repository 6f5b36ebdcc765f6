use serde::{Deserialize, Serialize};
use chrono::NaiveDateTime;

// ============================================================================
// Order Domain Events
// ============================================================================
//
// Facts produced by Order::handle_command and folded back with
// Order::apply_event. Events are not stored; the folded order row is.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    PaymentConfirmed {
        checkout_time: NaiveDateTime,
    },
    Confirmed,
    Rejected {
        reason: String,
        cancel_time: NaiveDateTime,
        refund_required: bool,
    },
    Cancelled {
        reason: String,
        cancel_time: NaiveDateTime,
        refund_required: bool,
    },
    Dispatched,
    Completed {
        delivery_time: NaiveDateTime,
    },
    /// No state change; only drives a staff notification
    ReminderRequested,
    /// Appended by the service after the provider accepted a refund
    Refunded {
        refund_reference: String,
    },
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::PaymentConfirmed { .. } => "OrderPaymentConfirmed",
            OrderEvent::Confirmed => "OrderConfirmed",
            OrderEvent::Rejected { .. } => "OrderRejected",
            OrderEvent::Cancelled { .. } => "OrderCancelled",
            OrderEvent::Dispatched => "OrderDispatched",
            OrderEvent::Completed { .. } => "OrderCompleted",
            OrderEvent::ReminderRequested => "OrderReminderRequested",
            OrderEvent::Refunded { .. } => "OrderRefunded",
        }
    }

    /// Whether folding this event changes the persisted order
    pub fn changes_state(&self) -> bool {
        !matches!(self, OrderEvent::ReminderRequested)
    }

    /// Whether the provider must be asked to return the money
    pub fn refund_required(&self) -> bool {
        match self {
            OrderEvent::Rejected { refund_required, .. }
            | OrderEvent::Cancelled { refund_required, .. } => *refund_required,
            _ => false,
        }
    }
}
