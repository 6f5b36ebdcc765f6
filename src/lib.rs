// ============================================================================
// Takeout Back Office - Order Lifecycle & Consistency Engine
// ============================================================================
//
// Layout:
// - domain/     - Order state machine and catalog business rules
// - store/      - Persistence boundary (traits) + in-memory implementation
// - cache/      - Category-keyed read-through cache with explicit invalidation
// - payment/    - Payment/refund provider boundary
// - notify/     - Real-time fan-out to connected staff dashboards
// - reporting/  - Date-range rollups (turnover, users, orders)
// - metrics/    - Prometheus metrics + /metrics and /health endpoints
// - utils/      - Circuit breaker, retry, clock
//
// ============================================================================

pub mod app;
pub mod cache;
pub mod config;
pub mod domain;
pub mod health;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod payment;
pub mod reporting;
pub mod store;
pub mod utils;

pub use app::Backoffice;
pub use config::AppConfig;
pub use domain::ErrorKind;
