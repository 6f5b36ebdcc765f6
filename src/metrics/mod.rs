// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, Opts, Registry,
};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the order back office
// ============================================================================
//
// - Order lifecycle (submissions, transitions, rejected commands, latency)
// - Payment provider outcomes (charges, refunds, retries, duplicate callbacks)
// - Staff notification fan-out (broadcasts, deliveries, pruned clients)
// - Catalog cache (hits, misses, invalidations by mode)
// - Circuit breaker and overall health
//
// All metrics are registered with Prometheus and scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Order Lifecycle Metrics
    pub orders_submitted: IntCounter,
    pub order_transitions: IntCounterVec,
    pub order_command_failures: IntCounterVec,
    pub order_command_duration: HistogramVec,

    // Payment Metrics
    pub payment_charges: IntCounterVec,
    pub payment_refunds: IntCounterVec,
    pub payment_duplicate_callbacks: IntCounter,
    pub retry_attempts_total: IntCounterVec,

    // Notification Metrics
    pub notifications_broadcast: IntCounterVec,
    pub notification_deliveries: IntCounter,
    pub notification_clients_pruned: IntCounter,
    pub notification_clients_connected: IntGauge,

    // Catalog Cache Metrics
    pub cache_lookups: IntCounterVec,
    pub cache_invalidations: IntCounterVec,

    // Circuit Breaker / Health Metrics
    pub circuit_breaker_state: IntGauge,
    pub service_health_status: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Order Lifecycle Metrics
        let orders_submitted = IntCounter::new(
            "orders_submitted_total",
            "Total orders created from shopping carts",
        )?;
        registry.register(Box::new(orders_submitted.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Committed order status transitions"),
            &["action", "from_status", "to_status"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let order_command_failures = IntCounterVec::new(
            Opts::new("order_command_failures_total", "Order commands rejected or failed"),
            &["action", "kind"],
        )?;
        registry.register(Box::new(order_command_failures.clone()))?;

        let order_command_duration = HistogramVec::new(
            HistogramOpts::new("order_command_duration_seconds", "Order command handling duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["action"],
        )?;
        registry.register(Box::new(order_command_duration.clone()))?;

        // Payment Metrics
        let payment_charges = IntCounterVec::new(
            Opts::new("payment_charges_total", "Charge attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(payment_charges.clone()))?;

        let payment_refunds = IntCounterVec::new(
            Opts::new("payment_refunds_total", "Refund attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(payment_refunds.clone()))?;

        let payment_duplicate_callbacks = IntCounter::new(
            "payment_duplicate_callbacks_total",
            "Payment confirmations replayed for already paid orders",
        )?;
        registry.register(Box::new(payment_duplicate_callbacks.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        // Notification Metrics
        let notifications_broadcast = IntCounterVec::new(
            Opts::new("notifications_broadcast_total", "Staff notifications broadcast"),
            &["type"],
        )?;
        registry.register(Box::new(notifications_broadcast.clone()))?;

        let notification_deliveries = IntCounter::new(
            "notification_deliveries_total",
            "Notifications handed to connected staff clients",
        )?;
        registry.register(Box::new(notification_deliveries.clone()))?;

        let notification_clients_pruned = IntCounter::new(
            "notification_clients_pruned_total",
            "Staff clients dropped after a failed send",
        )?;
        registry.register(Box::new(notification_clients_pruned.clone()))?;

        let notification_clients_connected = IntGauge::new(
            "notification_clients_connected",
            "Currently connected staff clients",
        )?;
        registry.register(Box::new(notification_clients_connected.clone()))?;

        // Catalog Cache Metrics
        let cache_lookups = IntCounterVec::new(
            Opts::new("catalog_cache_lookups_total", "Catalog cache lookups"),
            &["namespace", "result"],
        )?;
        registry.register(Box::new(cache_lookups.clone()))?;

        let cache_invalidations = IntCounterVec::new(
            Opts::new("catalog_cache_invalidations_total", "Catalog cache invalidations"),
            &["namespace", "mode"],
        )?;
        registry.register(Box::new(cache_invalidations.clone()))?;

        // Circuit Breaker / Health Metrics
        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Payment circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let service_health_status = IntGauge::new(
            "service_health_status",
            "Overall health (0=Unhealthy, 1=Degraded, 2=Healthy)",
        )?;
        registry.register(Box::new(service_health_status.clone()))?;

        Ok(Self {
            registry,
            orders_submitted,
            order_transitions,
            order_command_failures,
            order_command_duration,
            payment_charges,
            payment_refunds,
            payment_duplicate_callbacks,
            retry_attempts_total,
            notifications_broadcast,
            notification_deliveries,
            notification_clients_pruned,
            notification_clients_connected,
            cache_lookups,
            cache_invalidations,
            circuit_breaker_state,
            service_health_status,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a committed transition
    pub fn record_transition(&self, action: &str, from: &str, to: &str, duration_secs: f64) {
        self.order_transitions.with_label_values(&[action, from, to]).inc();
        self.order_command_duration.with_label_values(&[action]).observe(duration_secs);
    }

    /// Helper to record a rejected or failed command
    pub fn record_command_failure(&self, action: &str, kind: &str) {
        self.order_command_failures.with_label_values(&[action, kind]).inc();
    }

    pub fn record_charge(&self, outcome: &str) {
        self.payment_charges.with_label_values(&[outcome]).inc();
    }

    pub fn record_refund(&self, success: bool) {
        let outcome = if success { "succeeded" } else { "failed" };
        self.payment_refunds.with_label_values(&[outcome]).inc();
    }

    /// Helper to record retry attempt
    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total.with_label_values(&[operation, &attempt.to_string()]).inc();
    }

    pub fn record_broadcast(&self, notification_type: &str, delivered: usize, pruned: usize) {
        self.notifications_broadcast.with_label_values(&[notification_type]).inc();
        self.notification_deliveries.inc_by(delivered as u64);
        self.notification_clients_pruned.inc_by(pruned as u64);
    }

    pub fn record_cache_lookup(&self, namespace: &str, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[namespace, result]).inc();
    }

    pub fn record_cache_invalidation(&self, namespace: &str, mode: &str) {
        self.cache_invalidations.with_label_values(&[namespace, mode]).inc();
    }

    /// Helper to update circuit breaker state
    pub fn update_circuit_breaker_state(&self, state: u8) {
        self.circuit_breaker_state.set(state as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(metrics: &Metrics, name: &str) -> Option<f64> {
        let gathered = metrics.registry.gather();
        let family = gathered.iter().find(|m| m.name() == name)?;
        family.metric[0].counter.value
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.orders_submitted.inc();
        assert!(metrics.registry.gather().len() > 0);
    }

    #[test]
    fn test_record_transition() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition("confirm", "TO_BE_CONFIRMED", "CONFIRMED", 0.002);

        assert_eq!(counter_value(&metrics, "order_transitions_total"), Some(1.0));
    }

    #[test]
    fn test_record_retry() {
        let metrics = Metrics::new().unwrap();
        metrics.record_retry_attempt("payment_charge", 1);
        metrics.record_retry_attempt("payment_charge", 2);

        let gathered = metrics.registry.gather();
        let attempts = gathered.iter().find(|m| m.name() == "retry_attempts_total").unwrap();
        assert_eq!(attempts.metric.len(), 2); // Two different attempt labels
    }

    #[test]
    fn test_record_broadcast() {
        let metrics = Metrics::new().unwrap();
        metrics.record_broadcast("NEW_ORDER", 3, 1);
        metrics.record_broadcast("REMINDER", 2, 0);

        assert_eq!(counter_value(&metrics, "notification_deliveries_total"), Some(5.0));
        assert_eq!(counter_value(&metrics, "notification_clients_pruned_total"), Some(1.0));
    }

    #[test]
    fn test_circuit_breaker_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.update_circuit_breaker_state(1);
        assert_eq!(metrics.circuit_breaker_state.get(), 1);
    }
}
