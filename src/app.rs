use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::cache::{CacheBackend, CatalogCache, MemoryCache, RedisCache, COMBO_NAMESPACE, DISH_NAMESPACE};
use crate::config::AppConfig;
use crate::domain::catalog::CatalogService;
use crate::domain::order::{OrderService, OrderSettings};
use crate::health::{ComponentHealth, HealthReporter, HealthStatus};
use crate::metrics::Metrics;
use crate::notify::ConnectionRegistry;
use crate::payment::{HttpPaymentGateway, PaymentGateway, SimulatedPaymentGateway};
use crate::reporting::ReportService;
use crate::store::{
    AddressBookRepository, CatalogRepository, OrderRepository, ReportSource, UserRepository,
};

// ============================================================================
// Back Office Wiring
// ============================================================================
//
// One store feeds every service. Services share:
// - Metrics registry (transitions, payments, cache, broadcasts)
// - Staff connection registry (NEW_ORDER / REMINDER fan-out)
// - Health reporter (payment provider, staff registry)
//
// ============================================================================

/// Every capability the services need from persistence
pub trait BackofficeStore:
    CatalogRepository + OrderRepository + AddressBookRepository + UserRepository + ReportSource
{
}

impl<T> BackofficeStore for T where
    T: CatalogRepository + OrderRepository + AddressBookRepository + UserRepository + ReportSource
{
}

#[derive(Clone)]
pub struct Backoffice {
    pub orders: Arc<OrderService>,
    pub catalog: Arc<CatalogService>,
    pub reports: Arc<ReportService>,
    pub notifier: ConnectionRegistry,
    pub metrics: Arc<Metrics>,
    pub health: HealthReporter,
    gateway: Arc<dyn PaymentGateway>,
}

impl Backoffice {
    pub fn new<S: BackofficeStore>(
        store: Arc<S>,
        cache: Arc<dyn CacheBackend>,
        gateway: Arc<dyn PaymentGateway>,
        settings: OrderSettings,
    ) -> anyhow::Result<Self> {
        let metrics = Arc::new(Metrics::new()?);
        let notifier = ConnectionRegistry::new().with_metrics(metrics.clone());

        let dish_cache = CatalogCache::new(cache.clone(), DISH_NAMESPACE).with_metrics(metrics.clone());
        let combo_cache = CatalogCache::new(cache, COMBO_NAMESPACE).with_metrics(metrics.clone());
        let catalog = Arc::new(CatalogService::new(store.clone(), dish_cache, combo_cache));

        let orders = Arc::new(OrderService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            gateway.clone(),
            notifier.clone(),
            metrics.clone(),
            settings,
        ));
        let reports = Arc::new(ReportService::new(store));

        Ok(Self {
            orders,
            catalog,
            reports,
            notifier,
            metrics,
            health: HealthReporter::new(),
            gateway,
        })
    }

    /// Pick cache and payment backends from configuration
    pub async fn from_config<S: BackofficeStore>(config: &AppConfig, store: Arc<S>) -> anyhow::Result<Self> {
        let cache: Arc<dyn CacheBackend> = match &config.redis_url {
            Some(url) => {
                tracing::info!(url = %url, "Connecting catalog cache to Redis");
                Arc::new(RedisCache::connect(url).await?)
            }
            None => {
                tracing::info!("Using in-process catalog cache");
                Arc::new(MemoryCache::new())
            }
        };

        let gateway: Arc<dyn PaymentGateway> = match &config.payment_gateway_url {
            Some(url) => {
                tracing::info!(url = %url, "Using HTTP payment provider");
                Arc::new(HttpPaymentGateway::new(url, config.payment_timeout)?)
            }
            None => {
                tracing::warn!("⚠️ PAYMENT_GATEWAY_URL not set, using simulated payment provider");
                Arc::new(SimulatedPaymentGateway::new())
            }
        };

        Self::new(store, cache, gateway, config.order_settings())
    }

    /// Refresh component health and the circuit breaker gauge
    pub async fn check_health(&self) {
        let state = self.gateway.circuit_state().await;
        self.metrics.update_circuit_breaker_state(state.code());
        self.health.update(self.gateway.health().await);

        let connected = self.notifier.connected();
        self.health.update(
            ComponentHealth::new("staff_notifications", HealthStatus::Healthy)
                .with_details(format!("{} client(s) connected", connected)),
        );
    }

    /// Periodic health checks until the returned task is aborted
    pub fn spawn_health_watcher(&self, period: Duration) -> JoinHandle<()> {
        let app = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                app.check_health().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn backoffice(gateway: Arc<dyn PaymentGateway>) -> Backoffice {
        Backoffice::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new()),
            gateway,
            OrderSettings::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_health_check_reports_components() {
        let app = backoffice(Arc::new(SimulatedPaymentGateway::new()));
        let _staff = app.notifier.connect();

        app.check_health().await;
        let snapshot = app.health.snapshot();

        assert_eq!(snapshot.overall_status, HealthStatus::Healthy);
        assert!(snapshot.components.contains_key("payment_gateway"));
        let staff = &snapshot.components["staff_notifications"];
        assert_eq!(staff.details.as_deref(), Some("1 client(s) connected"));
    }

    #[tokio::test]
    async fn test_from_config_defaults_to_in_process_backends() {
        let app = Backoffice::from_config(&AppConfig::default(), Arc::new(MemoryStore::new()))
            .await
            .unwrap();
        assert_eq!(app.gateway.circuit_state().await.code(), 0);
    }
}
