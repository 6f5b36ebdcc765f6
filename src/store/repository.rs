use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::domain::order::{Order, OrderLineItem, OrderQuery, OrderStatus};
use crate::models::{
    AddressBook, CartLine, Combo, Dish, ItemStatus, NewCartLine, NewCombo, NewDish, Page, User,
};

use super::StoreError;

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait CatalogRepository: Send + Sync + 'static {
    async fn insert_dish(&self, dish: NewDish) -> Result<Dish, StoreError>;

    /// Replaces the stored dish; NotFound if it does not exist
    async fn update_dish(&self, dish: Dish) -> Result<Dish, StoreError>;

    async fn get_dish(&self, id: i64) -> Result<Option<Dish>, StoreError>;

    /// Deletes dishes and their flavor rows in one step
    async fn delete_dishes(&self, ids: &[i64]) -> Result<(), StoreError>;

    async fn list_dishes(
        &self,
        category_id: i64,
        status: Option<ItemStatus>,
    ) -> Result<Vec<Dish>, StoreError>;

    /// Ids of combos referencing any of the given dishes
    async fn combo_ids_for_dishes(&self, dish_ids: &[i64]) -> Result<Vec<i64>, StoreError>;

    async fn insert_combo(&self, combo: NewCombo) -> Result<Combo, StoreError>;

    /// Replaces the stored combo including its dish links
    async fn update_combo(&self, combo: Combo) -> Result<Combo, StoreError>;

    async fn get_combo(&self, id: i64) -> Result<Option<Combo>, StoreError>;

    async fn delete_combos(&self, ids: &[i64]) -> Result<(), StoreError>;

    async fn list_combos(
        &self,
        category_id: i64,
        status: Option<ItemStatus>,
    ) -> Result<Vec<Combo>, StoreError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    async fn cart_lines(&self, user_id: i64) -> Result<Vec<CartLine>, StoreError>;

    async fn add_cart_lines(&self, lines: Vec<NewCartLine>) -> Result<Vec<CartLine>, StoreError>;

    async fn clear_cart(&self, user_id: i64) -> Result<(), StoreError>;

    /// Persists the order and its line items and removes the consumed cart
    /// lines, all or nothing. Ids are assigned by the store; the returned
    /// order and items carry them.
    async fn submit_order(
        &self,
        order: Order,
        items: Vec<OrderLineItem>,
        consumed_cart_lines: &[i64],
    ) -> Result<(Order, Vec<OrderLineItem>), StoreError>;

    async fn get_order(&self, id: i64) -> Result<Option<Order>, StoreError>;

    async fn find_by_number(&self, number: &str) -> Result<Option<Order>, StoreError>;

    /// Compare-and-set write. Fails with VersionConflict unless the stored
    /// version equals `expected_version`; on success the stored order carries
    /// `expected_version + 1` and is returned.
    async fn update_order(&self, order: &Order, expected_version: u64) -> Result<Order, StoreError>;

    async fn line_items(&self, order_id: i64) -> Result<Vec<OrderLineItem>, StoreError>;

    /// Filtered page, newest first
    async fn page_orders(&self, query: &OrderQuery) -> Result<Page<Order>, StoreError>;

    async fn count_by_status(&self, status: OrderStatus) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait AddressBookRepository: Send + Sync + 'static {
    async fn get_address(&self, id: i64) -> Result<Option<AddressBook>, StoreError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError>;
}

/// Read-only rollup queries. Both bounds are inclusive.
#[async_trait]
pub trait ReportSource: Send + Sync + 'static {
    /// Sum of order amounts placed in the range with the given status;
    /// None when no order matches
    async fn sum_amount(
        &self,
        begin: NaiveDateTime,
        end: NaiveDateTime,
        status: OrderStatus,
    ) -> Result<Option<Decimal>, StoreError>;

    async fn count_orders(
        &self,
        begin: NaiveDateTime,
        end: NaiveDateTime,
        status: Option<OrderStatus>,
    ) -> Result<u64, StoreError>;

    /// Users created within the range; an open lower bound counts every
    /// user created up to `end`
    async fn count_users(
        &self,
        begin: Option<NaiveDateTime>,
        end: NaiveDateTime,
    ) -> Result<u64, StoreError>;
}
