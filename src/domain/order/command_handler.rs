use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::ErrorKind;
use crate::metrics::Metrics;
use crate::models::{NewCartLine, Page};
use crate::notify::{BroadcastReport, ConnectionRegistry, OrderNotification};
use crate::payment::{ChargeRequest, ChargeStatus, PaymentGateway, RefundRequest};
use crate::store::{AddressBookRepository, OrderRepository, UserRepository};
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

use super::aggregate::Order;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::OrderEvent;
use super::number::OrderNumberGenerator;
use super::value_objects::{
    OrderLineItem, OrderQuery, OrderStatistics, OrderStatus, OrderSubmitted, PayStatus,
    SubmitOrder,
};

// ============================================================================
// Order Service - Command Handler
// ============================================================================
//
// Orchestrates: Command → Order::handle_command → Events → (refund) → CAS write
//
// Every transition on an existing order runs under that order's lock:
//   lock → load → guard → external call (charge or refund) → compare-and-set write
// The write is conditional on the version that was loaded, so even a writer
// outside this process cannot be silently overwritten.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct OrderSettings {
    /// Description shown on the payer's statement
    pub payment_description: String,
    pub charge_retry: RetryConfig,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            payment_description: "Takeout order".to_string(),
            charge_retry: RetryConfig::conservative(),
        }
    }
}

// ============================================================================
// Results & Read Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    NotRequired,
    Refunded { refund_reference: String },
    /// The cancellation was committed; money still has to be returned by hand
    Failed { error: String },
}

impl RefundStatus {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            RefundStatus::Failed { .. } => Some(ErrorKind::RefundFailed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationReceipt {
    pub order: Order,
    pub refund: RefundStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "order", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentConfirmation {
    Confirmed(Order),
    /// Replayed confirmation for an order that is already paid; nothing changed
    Duplicate(Order),
}

impl PaymentConfirmation {
    pub fn order(&self) -> &Order {
        match self {
            PaymentConfirmation::Confirmed(order) | PaymentConfirmation::Duplicate(order) => order,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub transaction_token: Option<String>,
    pub confirmation: PaymentConfirmation,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderLineItem>,
}

/// Listing row: the order plus a "name*qty;" summary of its lines
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub order_dishes: String,
}

fn dishes_summary(items: &[OrderLineItem]) -> String {
    items
        .iter()
        .map(|item| format!("{}*{};", item.name, item.number))
        .collect()
}

struct Transition {
    previous: OrderStatus,
    order: Order,
    events: Vec<OrderEvent>,
    refund: RefundStatus,
}

// ============================================================================
// Per-order Locks
// ============================================================================

#[derive(Default)]
struct OrderLocks {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl OrderLocks {
    async fn acquire(&self, order_id: i64) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Forget the lock once nobody holds or waits for it
    fn release(&self, order_id: i64) {
        self.locks
            .remove_if(&order_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

// ============================================================================
// Order Service
// ============================================================================

pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    addresses: Arc<dyn AddressBookRepository>,
    users: Arc<dyn UserRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: ConnectionRegistry,
    metrics: Arc<Metrics>,
    numbers: OrderNumberGenerator,
    locks: OrderLocks,
    settings: OrderSettings,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        addresses: Arc<dyn AddressBookRepository>,
        users: Arc<dyn UserRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: ConnectionRegistry,
        metrics: Arc<Metrics>,
        settings: OrderSettings,
    ) -> Self {
        Self {
            orders,
            addresses,
            users,
            gateway,
            notifier,
            metrics,
            numbers: OrderNumberGenerator::new(),
            locks: OrderLocks::default(),
            settings,
        }
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Convert the user's cart into an order awaiting payment. The order, its
    /// line items and the cart cleanup are written together or not at all.
    pub async fn submit_order(
        &self,
        user_id: i64,
        request: SubmitOrder,
    ) -> Result<OrderSubmitted, OrderError> {
        let address = self
            .addresses
            .get_address(request.address_book_id)
            .await?
            .filter(|address| address.user_id == user_id)
            .ok_or(OrderError::AddressNotFound(request.address_book_id))?;

        let cart = self.orders.cart_lines(user_id).await?;
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let lines_total: Decimal = cart.iter().map(|line| line.line_total()).sum();
        let amount = lines_total + request.pack_amount;

        let order = Order::place(
            self.numbers.next(),
            user_id,
            &address,
            &request,
            amount,
            crate::utils::now(),
        );
        let items: Vec<OrderLineItem> = cart
            .iter()
            .map(|line| OrderLineItem {
                id: 0,
                order_id: 0,
                name: line.name.clone(),
                image: line.image.clone(),
                item: line.item,
                dish_flavor: line.dish_flavor.clone(),
                number: line.number,
                amount: line.amount,
            })
            .collect();
        let consumed: Vec<i64> = cart.iter().map(|line| line.id).collect();

        let (order, items) = self.orders.submit_order(order, items, &consumed).await?;
        self.metrics.orders_submitted.inc();

        tracing::info!(
            order_id = order.id,
            order_number = %order.number,
            amount = %order.amount,
            line_items = items.len(),
            "🧾 Order submitted"
        );

        Ok(OrderSubmitted {
            id: order.id,
            order_number: order.number,
            order_amount: order.amount,
            order_time: order.order_time,
        })
    }

    // ========================================================================
    // Payment
    // ========================================================================

    /// Charge the user for a pending order and confirm it. Transient provider
    /// failures are retried; "already paid" counts as paid.
    ///
    /// The order lock is held from the guard check through the charge to the
    /// commit, so a cancellation arriving mid-charge sees the paid order and
    /// refunds it.
    pub async fn pay(&self, user_id: i64, order_number: &str) -> Result<PaymentOutcome, OrderError> {
        let order = self
            .orders
            .find_by_number(order_number)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or_else(|| OrderError::NumberNotFound(order_number.to_string()))?;

        let guard = self.locks.acquire(order.id).await;
        let result = self.pay_locked(user_id, order.id).await;
        drop(guard);
        self.locks.release(order.id);

        let outcome = result?;
        if let PaymentConfirmation::Confirmed(order) = &outcome.confirmation {
            self.announce(order);
        }
        Ok(outcome)
    }

    async fn pay_locked(&self, user_id: i64, order_id: i64) -> Result<PaymentOutcome, OrderError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        // Dry run of the guard: never charge for an order that cannot be paid
        match order.handle_command(&OrderCommand::ConfirmPayment) {
            Ok(_) => {}
            Err(OrderError::DuplicateCallback(_)) => {
                self.metrics.payment_duplicate_callbacks.inc();
                return Ok(PaymentOutcome {
                    transaction_token: None,
                    confirmation: PaymentConfirmation::Duplicate(order),
                });
            }
            Err(e) => return Err(e),
        }

        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(OrderError::UserNotFound(user_id))?;

        let request = ChargeRequest {
            order_number: order.number.clone(),
            amount: order.amount,
            description: self.settings.payment_description.clone(),
            payer_id: user.openid,
        };

        let result = retry_on_transient(self.settings.charge_retry.clone(), |attempt| {
            if attempt > 1 {
                self.metrics.record_retry_attempt("payment_charge", attempt);
            }
            self.gateway.charge(&request)
        })
        .await;

        let receipt = match result {
            RetryResult::Success(receipt) => receipt,
            RetryResult::Failed(e) | RetryResult::PermanentFailure(e) => {
                self.metrics.record_charge("failed");
                tracing::error!(order_number = %order.number, error = %e, "❌ Charge failed");
                return Err(OrderError::Payment(e));
            }
        };
        self.metrics.record_charge(match receipt.status {
            ChargeStatus::Paid => "paid",
            ChargeStatus::AlreadyPaid => "already_paid",
        });

        let transition = self
            .execute_locked(order_id, &OrderCommand::ConfirmPayment)
            .await?;
        Ok(PaymentOutcome {
            transaction_token: receipt.transaction_token,
            confirmation: PaymentConfirmation::Confirmed(transition.order),
        })
    }

    /// Provider callback: the charge for `order_number` succeeded
    pub async fn payment_webhook(&self, order_number: &str) -> Result<PaymentConfirmation, OrderError> {
        self.confirm_payment(order_number).await
    }

    async fn confirm_payment(&self, order_number: &str) -> Result<PaymentConfirmation, OrderError> {
        let order = self
            .orders
            .find_by_number(order_number)
            .await?
            .ok_or_else(|| OrderError::NumberNotFound(order_number.to_string()))?;

        match self.execute(order.id, OrderCommand::ConfirmPayment).await {
            Ok(transition) => {
                self.announce(&transition.order);
                Ok(PaymentConfirmation::Confirmed(transition.order))
            }
            Err(OrderError::DuplicateCallback(_)) => {
                self.metrics.payment_duplicate_callbacks.inc();
                tracing::info!(order_number = %order_number, "Duplicate payment confirmation ignored");
                let current = self
                    .orders
                    .get_order(order.id)
                    .await?
                    .ok_or(OrderError::NotFound(order.id))?;
                Ok(PaymentConfirmation::Duplicate(current))
            }
            Err(e) => Err(e),
        }
    }

    fn announce(&self, order: &Order) {
        self.notifier
            .broadcast(&OrderNotification::new_order(order.id, &order.number));
    }

    // ========================================================================
    // Staff Actions
    // ========================================================================

    pub async fn confirm(&self, order_id: i64) -> Result<Order, OrderError> {
        Ok(self.execute(order_id, OrderCommand::Confirm).await?.order)
    }

    /// Refuse a waiting order; a paid order is refunded first
    pub async fn reject(&self, order_id: i64, reason: &str) -> Result<CancellationReceipt, OrderError> {
        let command = OrderCommand::Reject { reason: reason.to_string() };
        Ok(self.execute(order_id, command).await?.into_receipt())
    }

    /// Cancel an order that has not been confirmed yet; refunds if paid
    pub async fn cancel(&self, order_id: i64, reason: &str) -> Result<CancellationReceipt, OrderError> {
        let command = OrderCommand::Cancel { reason: reason.to_string() };
        Ok(self.execute(order_id, command).await?.into_receipt())
    }

    pub async fn dispatch(&self, order_id: i64) -> Result<Order, OrderError> {
        Ok(self.execute(order_id, OrderCommand::Dispatch).await?.order)
    }

    pub async fn complete(&self, order_id: i64) -> Result<Order, OrderError> {
        Ok(self.execute(order_id, OrderCommand::Complete).await?.order)
    }

    // ========================================================================
    // Customer Actions
    // ========================================================================

    pub async fn user_cancel(&self, user_id: i64, order_id: i64) -> Result<CancellationReceipt, OrderError> {
        self.require_owned(user_id, order_id).await?;
        Ok(self.execute(order_id, OrderCommand::UserCancel).await?.into_receipt())
    }

    /// Nudge the kitchen about an open order
    pub async fn remind(&self, user_id: i64, order_id: i64) -> Result<BroadcastReport, OrderError> {
        self.require_owned(user_id, order_id).await?;
        let transition = self.execute(order_id, OrderCommand::Remind).await?;

        let notification = OrderNotification::reminder(transition.order.id, &transition.order.number);
        Ok(self.notifier.broadcast(&notification))
    }

    /// Put the lines of a past order back into the user's cart
    pub async fn repetition(&self, user_id: i64, order_id: i64) -> Result<usize, OrderError> {
        self.require_owned(user_id, order_id).await?;

        let lines: Vec<NewCartLine> = self
            .orders
            .line_items(order_id)
            .await?
            .into_iter()
            .map(|item| NewCartLine {
                user_id,
                name: item.name,
                image: item.image,
                item: item.item,
                dish_flavor: item.dish_flavor,
                number: item.number,
                amount: item.amount,
            })
            .collect();

        let added = self.orders.add_cart_lines(lines).await?;
        tracing::debug!(order_id = order_id, lines = added.len(), "Order copied back into cart");
        Ok(added.len())
    }

    /// Empty the user's cart without placing an order
    pub async fn clear_cart(&self, user_id: i64) -> Result<(), OrderError> {
        self.orders.clear_cart(user_id).await?;
        tracing::debug!(user_id = user_id, "Cart cleared");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn details(&self, order_id: i64) -> Result<OrderDetails, OrderError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;
        let items = self.orders.line_items(order_id).await?;
        Ok(OrderDetails { order, items })
    }

    pub async fn list_orders(&self, query: &OrderQuery) -> Result<Page<OrderSummary>, OrderError> {
        let page = self.orders.page_orders(query).await?;

        let mut records = Vec::with_capacity(page.records.len());
        for order in page.records {
            let items = self.orders.line_items(order.id).await?;
            records.push(OrderSummary {
                order_dishes: dishes_summary(&items),
                order,
            });
        }
        Ok(Page { total: page.total, records })
    }

    pub async fn statistics(&self) -> Result<OrderStatistics, OrderError> {
        Ok(OrderStatistics {
            to_be_confirmed: self.orders.count_by_status(OrderStatus::ToBeConfirmed).await?,
            confirmed: self.orders.count_by_status(OrderStatus::Confirmed).await?,
            delivery_in_progress: self
                .orders
                .count_by_status(OrderStatus::DeliveryInProgress)
                .await?,
        })
    }

    // ========================================================================
    // Transition Pipeline
    // ========================================================================

    async fn require_owned(&self, user_id: i64, order_id: i64) -> Result<Order, OrderError> {
        self.orders
            .get_order(order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or(OrderError::NotFound(order_id))
    }

    async fn execute(&self, order_id: i64, command: OrderCommand) -> Result<Transition, OrderError> {
        let guard = self.locks.acquire(order_id).await;
        let result = self.execute_locked(order_id, &command).await;
        drop(guard);
        self.locks.release(order_id);
        result
    }

    /// Caller holds the lock for `order_id`
    async fn execute_locked(&self, order_id: i64, command: &OrderCommand) -> Result<Transition, OrderError> {
        let started = Instant::now();
        let action = command.action();
        let result = self.apply_command(order_id, command).await;

        match &result {
            Ok(transition) => {
                let event_types: Vec<&str> = transition.events.iter().map(|e| e.event_type()).collect();
                self.metrics.record_transition(
                    action,
                    transition.previous.label(),
                    transition.order.status.label(),
                    started.elapsed().as_secs_f64(),
                );
                tracing::info!(
                    order_id = order_id,
                    action = action,
                    from = %transition.previous,
                    to = %transition.order.status,
                    version = transition.order.version,
                    events = ?event_types,
                    "✅ Order command applied"
                );
            }
            Err(e) => {
                self.metrics.record_command_failure(action, e.kind().as_str());
                tracing::debug!(order_id = order_id, action = action, error = %e, "Order command rejected");
            }
        }
        result
    }

    async fn apply_command(&self, order_id: i64, command: &OrderCommand) -> Result<Transition, OrderError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        let mut events = order.handle_command(command)?;
        let mut next = order.clone();
        for event in &events {
            next.apply_event(event);
        }

        let mut refund = RefundStatus::NotRequired;
        if events.iter().any(|event| event.refund_required()) {
            refund = self.refund(&order).await;
            if let RefundStatus::Refunded { refund_reference } = &refund {
                let event = OrderEvent::Refunded { refund_reference: refund_reference.clone() };
                next.apply_event(&event);
                events.push(event);
            }
        }

        let committed = if events.iter().any(|event| event.changes_state()) {
            self.orders.update_order(&next, order.version).await?
        } else {
            order.clone()
        };

        Ok(Transition {
            previous: order.status,
            order: committed,
            events,
            refund,
        })
    }

    /// One refund attempt. A failure is reported, never raised: the caller
    /// still commits the cancellation.
    async fn refund(&self, order: &Order) -> RefundStatus {
        debug_assert_eq!(order.pay_status, PayStatus::Paid);
        let request = RefundRequest::full(&order.number, order.amount);

        match self.gateway.refund(&request).await {
            Ok(receipt) => {
                self.metrics.record_refund(true);
                tracing::info!(
                    order_id = order.id,
                    order_number = %order.number,
                    refund_reference = %receipt.refund_reference,
                    "💸 Refund accepted"
                );
                RefundStatus::Refunded { refund_reference: receipt.refund_reference }
            }
            Err(e) => {
                self.metrics.record_refund(false);
                tracing::warn!(
                    order_id = order.id,
                    order_number = %order.number,
                    error = %e,
                    "⚠️ Refund failed, cancelling anyway"
                );
                RefundStatus::Failed { error: e.to_string() }
            }
        }
    }
}

impl Transition {
    fn into_receipt(self) -> CancellationReceipt {
        CancellationReceipt {
            order: self.order,
            refund: self.refund,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
