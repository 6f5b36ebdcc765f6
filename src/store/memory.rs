use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::order::{Order, OrderLineItem, OrderQuery, OrderStatus};
use crate::models::{
    AddressBook, CartLine, Combo, Dish, ItemStatus, NewCartLine, NewCombo, NewDish, Page, User,
};

use super::repository::{
    AddressBookRepository, CatalogRepository, OrderRepository, ReportSource, UserRepository,
};
use super::StoreError;

// ============================================================================
// In-Memory Store
// ============================================================================
//
// All tables sit behind one RwLock, which makes multi-table writes such as
// submit_order atomic. Ids come from per-table sequences starting at 1.
//
// ============================================================================

#[derive(Default)]
struct Tables {
    dishes: BTreeMap<i64, Dish>,
    combos: BTreeMap<i64, Combo>,
    users: BTreeMap<i64, User>,
    addresses: BTreeMap<i64, AddressBook>,
    cart: BTreeMap<i64, CartLine>,
    orders: BTreeMap<i64, Order>,
    line_items: BTreeMap<i64, OrderLineItem>,
    sequences: Sequences,
}

#[derive(Default)]
struct Sequences {
    dish: i64,
    combo: i64,
    user: i64,
    address: i64,
    cart: i64,
    order: i64,
    line_item: i64,
}

fn next_id(sequence: &mut i64) -> i64 {
    *sequence += 1;
    *sequence
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(
        &self,
        openid: &str,
        name: Option<&str>,
        create_time: NaiveDateTime,
    ) -> User {
        let mut tables = self.tables.write().await;
        let user = User {
            id: next_id(&mut tables.sequences.user),
            openid: openid.to_string(),
            name: name.map(str::to_string),
            create_time,
        };
        tables.users.insert(user.id, user.clone());
        user
    }

    /// Stores an address book entry; the id field of `address` is replaced
    pub async fn insert_address(&self, mut address: AddressBook) -> AddressBook {
        let mut tables = self.tables.write().await;
        address.id = next_id(&mut tables.sequences.address);
        tables.addresses.insert(address.id, address.clone());
        address
    }
}

fn in_range(time: NaiveDateTime, begin: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> bool {
    begin.map_or(true, |b| time >= b) && end.map_or(true, |e| time <= e)
}

fn matches_query(order: &Order, query: &OrderQuery) -> bool {
    query.user_id.map_or(true, |id| order.user_id == id)
        && query.status.map_or(true, |s| order.status == s)
        && query
            .number
            .as_deref()
            .map_or(true, |n| order.number.contains(n))
        && query
            .phone
            .as_deref()
            .map_or(true, |p| order.phone.contains(p))
        && in_range(order.order_time, query.begin_time, query.end_time)
}

// ============================================================================
// Catalog
// ============================================================================

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn insert_dish(&self, dish: NewDish) -> Result<Dish, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.dishes.values().any(|d| d.name == dish.name) {
            return Err(StoreError::Duplicate(format!("dish name '{}'", dish.name)));
        }
        let stored = Dish {
            id: next_id(&mut tables.sequences.dish),
            name: dish.name,
            category_id: dish.category_id,
            price: dish.price,
            image: dish.image,
            description: dish.description,
            status: dish.status,
            flavors: dish.flavors,
            update_time: crate::utils::now(),
        };
        tables.dishes.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_dish(&self, mut dish: Dish) -> Result<Dish, StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .dishes
            .get_mut(&dish.id)
            .ok_or(StoreError::NotFound { entity: "dish", id: dish.id })?;
        dish.update_time = crate::utils::now();
        *slot = dish.clone();
        Ok(dish)
    }

    async fn get_dish(&self, id: i64) -> Result<Option<Dish>, StoreError> {
        Ok(self.tables.read().await.dishes.get(&id).cloned())
    }

    async fn delete_dishes(&self, ids: &[i64]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        for id in ids {
            tables.dishes.remove(id);
        }
        Ok(())
    }

    async fn list_dishes(
        &self,
        category_id: i64,
        status: Option<ItemStatus>,
    ) -> Result<Vec<Dish>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .dishes
            .values()
            .filter(|d| d.category_id == category_id)
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect())
    }

    async fn combo_ids_for_dishes(&self, dish_ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .combos
            .values()
            .filter(|c| c.dishes.iter().any(|d| dish_ids.contains(&d.dish_id)))
            .map(|c| c.id)
            .collect())
    }

    async fn insert_combo(&self, combo: NewCombo) -> Result<Combo, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.combos.values().any(|c| c.name == combo.name) {
            return Err(StoreError::Duplicate(format!("combo name '{}'", combo.name)));
        }
        let stored = Combo {
            id: next_id(&mut tables.sequences.combo),
            category_id: combo.category_id,
            name: combo.name,
            price: combo.price,
            status: combo.status,
            description: combo.description,
            image: combo.image,
            dishes: combo.dishes,
            update_time: crate::utils::now(),
        };
        tables.combos.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_combo(&self, mut combo: Combo) -> Result<Combo, StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .combos
            .get_mut(&combo.id)
            .ok_or(StoreError::NotFound { entity: "combo", id: combo.id })?;
        combo.update_time = crate::utils::now();
        *slot = combo.clone();
        Ok(combo)
    }

    async fn get_combo(&self, id: i64) -> Result<Option<Combo>, StoreError> {
        Ok(self.tables.read().await.combos.get(&id).cloned())
    }

    async fn delete_combos(&self, ids: &[i64]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        for id in ids {
            tables.combos.remove(id);
        }
        Ok(())
    }

    async fn list_combos(
        &self,
        category_id: i64,
        status: Option<ItemStatus>,
    ) -> Result<Vec<Combo>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .combos
            .values()
            .filter(|c| c.category_id == category_id)
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Cart & Orders
// ============================================================================

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn cart_lines(&self, user_id: i64) -> Result<Vec<CartLine>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .cart
            .values()
            .filter(|line| line.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_cart_lines(&self, lines: Vec<NewCartLine>) -> Result<Vec<CartLine>, StoreError> {
        let mut tables = self.tables.write().await;
        let now = crate::utils::now();
        let mut stored = Vec::with_capacity(lines.len());
        for line in lines {
            let line = CartLine {
                id: next_id(&mut tables.sequences.cart),
                user_id: line.user_id,
                name: line.name,
                image: line.image,
                item: line.item,
                dish_flavor: line.dish_flavor,
                number: line.number,
                amount: line.amount,
                create_time: now,
            };
            tables.cart.insert(line.id, line.clone());
            stored.push(line);
        }
        Ok(stored)
    }

    async fn clear_cart(&self, user_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.cart.retain(|_, line| line.user_id != user_id);
        Ok(())
    }

    async fn submit_order(
        &self,
        mut order: Order,
        items: Vec<OrderLineItem>,
        consumed_cart_lines: &[i64],
    ) -> Result<(Order, Vec<OrderLineItem>), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.orders.values().any(|o| o.number == order.number) {
            return Err(StoreError::Duplicate(format!("order number {}", order.number)));
        }

        order.id = next_id(&mut tables.sequences.order);
        let mut stored_items = Vec::with_capacity(items.len());
        for mut item in items {
            item.id = next_id(&mut tables.sequences.line_item);
            item.order_id = order.id;
            stored_items.push(item);
        }

        tables.orders.insert(order.id, order.clone());
        for item in &stored_items {
            tables.line_items.insert(item.id, item.clone());
        }
        for id in consumed_cart_lines {
            tables.cart.remove(id);
        }

        Ok((order, stored_items))
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Order>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().find(|o| o.number == number).cloned())
    }

    async fn update_order(&self, order: &Order, expected_version: u64) -> Result<Order, StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .orders
            .get_mut(&order.id)
            .ok_or(StoreError::NotFound { entity: "order", id: order.id })?;

        if slot.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: order.id,
                expected: expected_version,
                actual: slot.version,
            });
        }

        let mut next = order.clone();
        next.version = expected_version + 1;
        *slot = next.clone();
        Ok(next)
    }

    async fn line_items(&self, order_id: i64) -> Result<Vec<OrderLineItem>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .line_items
            .values()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn page_orders(&self, query: &OrderQuery) -> Result<Page<Order>, StoreError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Order> = tables
            .orders
            .values()
            .filter(|o| matches_query(o, query))
            .collect();
        matching.sort_by(|a, b| b.order_time.cmp(&a.order_time).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let records = matching
            .into_iter()
            .skip(query.offset())
            .take(query.page_size as usize)
            .cloned()
            .collect();

        Ok(Page { total, records })
    }

    async fn count_by_status(&self, status: OrderStatus) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().filter(|o| o.status == status).count() as u64)
    }
}

#[async_trait]
impl AddressBookRepository for MemoryStore {
    async fn get_address(&self, id: i64) -> Result<Option<AddressBook>, StoreError> {
        Ok(self.tables.read().await.addresses.get(&id).cloned())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }
}

// ============================================================================
// Reporting
// ============================================================================

#[async_trait]
impl ReportSource for MemoryStore {
    async fn sum_amount(
        &self,
        begin: NaiveDateTime,
        end: NaiveDateTime,
        status: OrderStatus,
    ) -> Result<Option<Decimal>, StoreError> {
        let tables = self.tables.read().await;
        let amounts: Vec<Decimal> = tables
            .orders
            .values()
            .filter(|o| o.status == status && in_range(o.order_time, Some(begin), Some(end)))
            .map(|o| o.amount)
            .collect();

        if amounts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(amounts.into_iter().sum()))
        }
    }

    async fn count_orders(
        &self,
        begin: NaiveDateTime,
        end: NaiveDateTime,
        status: Option<OrderStatus>,
    ) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .filter(|o| in_range(o.order_time, Some(begin), Some(end)))
            .count() as u64)
    }

    async fn count_users(
        &self,
        begin: Option<NaiveDateTime>,
        end: NaiveDateTime,
    ) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| in_range(u.create_time, begin, Some(end)))
            .count() as u64)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_order;
    use crate::domain::order::PayStatus;
    use crate::models::CatalogRef;

    fn cart_line(user_id: i64, name: &str) -> NewCartLine {
        NewCartLine {
            user_id,
            name: name.to_string(),
            image: None,
            item: CatalogRef::Dish(1),
            dish_flavor: None,
            number: 1,
            amount: Decimal::new(1000, 2),
        }
    }

    async fn stored_order(store: &MemoryStore) -> Order {
        let order = sample_order(OrderStatus::PendingPayment, PayStatus::Unpaid);
        let (order, _) = store.submit_order(order, vec![], &[]).await.unwrap();
        order
    }

    #[tokio::test]
    async fn test_update_order_is_compare_and_set() {
        let store = MemoryStore::new();
        let order = stored_order(&store).await;
        assert_eq!(order.version, 0);

        let mut first = order.clone();
        first.status = OrderStatus::ToBeConfirmed;
        let committed = store.update_order(&first, 0).await.unwrap();
        assert_eq!(committed.version, 1);

        // A writer holding the stale version loses
        let mut stale = order.clone();
        stale.status = OrderStatus::Cancelled;
        let err = store.update_order(&stale, 0).await.unwrap_err();
        assert_eq!(err, StoreError::VersionConflict { id: order.id, expected: 0, actual: 1 });

        let current = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(current.status, OrderStatus::ToBeConfirmed);
    }

    #[tokio::test]
    async fn test_submit_removes_only_consumed_cart_lines() {
        let store = MemoryStore::new();
        let lines = store
            .add_cart_lines(vec![cart_line(1, "rice"), cart_line(1, "tea"), cart_line(2, "soup")])
            .await
            .unwrap();

        let order = sample_order(OrderStatus::PendingPayment, PayStatus::Unpaid);
        store.submit_order(order, vec![], &[lines[0].id]).await.unwrap();

        let remaining = store.cart_lines(1).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "tea");
        assert_eq!(store.cart_lines(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_order_number_rejected() {
        let store = MemoryStore::new();
        stored_order(&store).await;
        let again = sample_order(OrderStatus::PendingPayment, PayStatus::Unpaid);
        let result = store.submit_order(again, vec![], &[]).await;
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_page_orders_filters_and_slices() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let mut order = sample_order(OrderStatus::PendingPayment, PayStatus::Unpaid);
            order.number = format!("N{}", i);
            order.user_id = if i < 3 { 1 } else { 2 };
            store.submit_order(order, vec![], &[]).await.unwrap();
        }

        let page = store
            .page_orders(&OrderQuery::page(1, 2).for_user(1))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.records.len(), 2);

        let last = store
            .page_orders(&OrderQuery::page(2, 2).for_user(1))
            .await
            .unwrap();
        assert_eq!(last.records.len(), 1);
    }

    #[tokio::test]
    async fn test_sum_amount_is_none_without_matches() {
        let store = MemoryStore::new();
        let now = crate::utils::now();
        let sum = store
            .sum_amount(now, now, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(sum, None);
    }
}
