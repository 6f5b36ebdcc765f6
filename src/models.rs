use serde::{Deserialize, Serialize};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

// ============================================================================
// Shared Records
// ============================================================================
//
// Catalog rows, users, address book entries and cart lines. Order records
// are owned by the order domain (see domain::order).
//
// ============================================================================

/// Availability flag for dishes and combos (0 = off sale, 1 = on sale)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ItemStatus {
    Disabled,
    Enabled,
}

impl ItemStatus {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ItemStatus::Enabled)
    }
}

impl From<ItemStatus> for u8 {
    fn from(status: ItemStatus) -> u8 {
        match status {
            ItemStatus::Disabled => 0,
            ItemStatus::Enabled => 1,
        }
    }
}

impl TryFrom<u8> for ItemStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ItemStatus::Disabled),
            1 => Ok(ItemStatus::Enabled),
            other => Err(format!("invalid item status code: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DishFlavor {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
    pub price: Decimal,
    pub image: Option<String>,
    pub description: Option<String>,
    pub status: ItemStatus,
    pub flavors: Vec<DishFlavor>,
    pub update_time: NaiveDateTime,
}

/// Dish fields supplied by a create call; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewDish {
    pub name: String,
    pub category_id: i64,
    pub price: Decimal,
    pub image: Option<String>,
    pub description: Option<String>,
    pub status: ItemStatus,
    pub flavors: Vec<DishFlavor>,
}

/// A dish reference inside a combo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboDish {
    pub dish_id: i64,
    pub name: String,
    pub price: Decimal,
    pub copies: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combo {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub price: Decimal,
    pub status: ItemStatus,
    pub description: Option<String>,
    pub image: Option<String>,
    pub dishes: Vec<ComboDish>,
    pub update_time: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewCombo {
    pub category_id: i64,
    pub name: String,
    pub price: Decimal,
    pub status: ItemStatus,
    pub description: Option<String>,
    pub image: Option<String>,
    pub dishes: Vec<ComboDish>,
}

/// Combo constituent as shown to customers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboDishItem {
    pub name: String,
    pub copies: u32,
    pub image: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Identity known to the payment provider
    pub openid: String,
    pub name: Option<String>,
    pub create_time: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressBook {
    pub id: i64,
    pub user_id: i64,
    pub consignee: String,
    pub phone: String,
    pub province_name: Option<String>,
    pub city_name: Option<String>,
    pub district_name: Option<String>,
    pub detail: String,
}

impl AddressBook {
    /// Full delivery address as it is frozen onto an order
    pub fn full_address(&self) -> String {
        [
            self.province_name.as_deref(),
            self.city_name.as_deref(),
            self.district_name.as_deref(),
            Some(self.detail.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("")
    }
}

/// What a cart line (or order line item) points at in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogRef {
    Dish(i64),
    Combo(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub item: CatalogRef,
    pub dish_flavor: Option<String>,
    pub number: u32,
    /// Unit price at the time the line was added
    pub amount: Decimal,
    pub create_time: NaiveDateTime,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.amount * Decimal::from(self.number)
    }
}

#[derive(Debug, Clone)]
pub struct NewCartLine {
    pub user_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub item: CatalogRef,
    pub dish_flavor: Option<String>,
    pub number: u32,
    pub amount: Decimal,
}

/// One page of a filtered listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub total: u64,
    pub records: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total: self.total,
            records: self.records.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_status_serializes_as_code() {
        assert_eq!(serde_json::to_string(&ItemStatus::Enabled).unwrap(), "1");
        assert_eq!(serde_json::to_string(&ItemStatus::Disabled).unwrap(), "0");
        let parsed: ItemStatus = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, ItemStatus::Enabled);
        assert!(serde_json::from_str::<ItemStatus>("7").is_err());
    }

    #[test]
    fn test_full_address_skips_missing_parts() {
        let address = AddressBook {
            id: 1,
            user_id: 1,
            consignee: "Li".to_string(),
            phone: "13800000000".to_string(),
            province_name: Some("Beijing".to_string()),
            city_name: None,
            district_name: Some("Haidian".to_string()),
            detail: " 1 Zhongguancun St".to_string(),
        };

        assert_eq!(address.full_address(), "BeijingHaidian 1 Zhongguancun St");
    }

    #[test]
    fn test_cart_line_total() {
        let line = CartLine {
            id: 1,
            user_id: 1,
            name: "Kung Pao Chicken".to_string(),
            image: None,
            item: CatalogRef::Dish(3),
            dish_flavor: None,
            number: 3,
            amount: Decimal::new(1250, 2),
            create_time: crate::utils::now(),
        };

        assert_eq!(line.line_total(), Decimal::new(3750, 2));
    }
}
