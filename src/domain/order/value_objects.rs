use serde::{Deserialize, Serialize};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::models::CatalogRef;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Order status. The numeric codes are persisted and their ORDER matters:
/// guards such as "user may cancel only while status <= TO_BE_CONFIRMED"
/// compare ordinals, so `Ord` follows the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum OrderStatus {
    PendingPayment = 1,
    ToBeConfirmed = 2,
    Confirmed = 3,
    DeliveryInProgress = 4,
    Completed = 5,
    Cancelled = 6,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::PendingPayment,
        OrderStatus::ToBeConfirmed,
        OrderStatus::Confirmed,
        OrderStatus::DeliveryInProgress,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "PENDING_PAYMENT",
            OrderStatus::ToBeConfirmed => "TO_BE_CONFIRMED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::DeliveryInProgress => "DELIVERY_IN_PROGRESS",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl From<OrderStatus> for u8 {
    fn from(status: OrderStatus) -> u8 {
        status.code()
    }
}

impl TryFrom<u8> for OrderStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.code() == code)
            .ok_or_else(|| format!("invalid order status code: {}", code))
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PayStatus {
    Unpaid = 0,
    Paid = 1,
    Refunded = 2,
}

impl From<PayStatus> for u8 {
    fn from(status: PayStatus) -> u8 {
        status as u8
    }
}

impl TryFrom<u8> for PayStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PayStatus::Unpaid),
            1 => Ok(PayStatus::Paid),
            2 => Ok(PayStatus::Refunded),
            other => Err(format!("invalid pay status code: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayMethod {
    WeChat,
    Alipay,
}

/// Snapshot of a cart line taken at submission time. Never mutated after
/// the order is created, so later catalog edits do not rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: i64,
    pub order_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub item: CatalogRef,
    pub dish_flavor: Option<String>,
    pub number: u32,
    /// Unit price
    pub amount: Decimal,
}

/// Submit-order request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOrder {
    pub address_book_id: i64,
    pub pay_method: PayMethod,
    pub remark: Option<String>,
    pub estimated_delivery_time: Option<NaiveDateTime>,
    /// Packaging fee added on top of the line total
    pub pack_amount: Decimal,
    pub tableware_number: u32,
}

impl SubmitOrder {
    pub fn new(address_book_id: i64) -> Self {
        Self {
            address_book_id,
            pay_method: PayMethod::WeChat,
            remark: None,
            estimated_delivery_time: None,
            pack_amount: Decimal::ZERO,
            tableware_number: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmitted {
    pub id: i64,
    pub order_number: String,
    pub order_amount: Decimal,
    pub order_time: NaiveDateTime,
}

/// Filters for order listings. All filters are optional; pages are 1-based.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQuery {
    pub user_id: Option<i64>,
    pub status: Option<OrderStatus>,
    pub number: Option<String>,
    pub phone: Option<String>,
    pub begin_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub page: u32,
    pub page_size: u32,
}

impl OrderQuery {
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            ..Default::default()
        }
    }

    pub fn for_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Zero-based offset of the first record of the requested page
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.page_size as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatistics {
    pub to_be_confirmed: u64,
    pub confirmed: u64,
    pub delivery_in_progress: u64,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering_follows_codes() {
        assert!(OrderStatus::PendingPayment < OrderStatus::ToBeConfirmed);
        assert!(OrderStatus::ToBeConfirmed < OrderStatus::Confirmed);
        assert!(OrderStatus::Confirmed > OrderStatus::ToBeConfirmed);
        assert!(OrderStatus::Cancelled > OrderStatus::Completed);

        let mut sorted = OrderStatus::ALL;
        sorted.reverse();
        sorted.sort();
        assert_eq!(sorted, OrderStatus::ALL);
    }

    #[test]
    fn test_status_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&OrderStatus::PendingPayment).unwrap(), "1");
        assert_eq!(serde_json::to_string(&OrderStatus::Cancelled).unwrap(), "6");

        let parsed: OrderStatus = serde_json::from_str("4").unwrap();
        assert_eq!(parsed, OrderStatus::DeliveryInProgress);
    }

    #[test]
    fn test_unknown_status_code_rejected() {
        assert!(OrderStatus::try_from(0).is_err());
        assert!(OrderStatus::try_from(7).is_err());
        assert!(serde_json::from_str::<OrderStatus>("9").is_err());
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![OrderStatus::Completed, OrderStatus::Cancelled]);
    }

    #[test]
    fn test_pay_status_codes() {
        assert_eq!(serde_json::to_string(&PayStatus::Refunded).unwrap(), "2");
        assert_eq!(PayStatus::try_from(1).unwrap(), PayStatus::Paid);
        assert!(PayStatus::try_from(3).is_err());
    }

    #[test]
    fn test_query_offset() {
        assert_eq!(OrderQuery::page(1, 10).offset(), 0);
        assert_eq!(OrderQuery::page(3, 10).offset(), 20);
        // page 0 is treated as the first page
        assert_eq!(OrderQuery::page(0, 10).offset(), 0);
    }
}
