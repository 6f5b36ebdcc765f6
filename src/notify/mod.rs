// ============================================================================
// Staff Notification Fan-out
// ============================================================================
//
// Pushes order events to every connected staff dashboard. Delivery is
// at-most-once: no acknowledgement, no replay for clients that connect
// later, and a client whose channel is gone is dropped from the registry.
//
// ============================================================================

pub mod registry;

pub use registry::{BroadcastReport, ClientId, ConnectionRegistry, StaffConnection};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum NotificationType {
    NewOrder = 1,
    Reminder = 2,
}

impl NotificationType {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationType::NewOrder => "NEW_ORDER",
            NotificationType::Reminder => "REMINDER",
        }
    }
}

impl From<NotificationType> for u8 {
    fn from(kind: NotificationType) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for NotificationType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(NotificationType::NewOrder),
            2 => Ok(NotificationType::Reminder),
            other => Err(format!("invalid notification type: {}", other)),
        }
    }
}

/// Wire message sent to staff dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotification {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub order_id: i64,
    pub content: String,
}

impl OrderNotification {
    pub fn new_order(order_id: i64, order_number: &str) -> Self {
        Self {
            kind: NotificationType::NewOrder,
            order_id,
            content: format!("Order number: {}", order_number),
        }
    }

    pub fn reminder(order_id: i64, order_number: &str) -> Self {
        Self {
            kind: NotificationType::Reminder,
            order_id,
            content: format!("Order number: {}", order_number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(OrderNotification::new_order(12, "1700000000000001")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": 1,
                "orderId": 12,
                "content": "Order number: 1700000000000001"
            })
        );

        let json = serde_json::to_value(OrderNotification::reminder(12, "N")).unwrap();
        assert_eq!(json["type"], 2);
    }
}
