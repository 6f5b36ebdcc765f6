use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use takeout_orders::domain::order::SubmitOrder;
use takeout_orders::metrics::start_metrics_server;
use takeout_orders::models::{AddressBook, CatalogRef, ItemStatus, NewCartLine, NewDish};
use takeout_orders::store::{MemoryStore, OrderRepository};
use takeout_orders::{AppConfig, Backoffice};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,takeout_orders=debug")),
        )
        .init();

    tracing::info!("🚀 Starting takeout back office");

    let config = AppConfig::from_env();
    let store = Arc::new(MemoryStore::new());
    let app = Backoffice::from_config(&config, store.clone()).await?;
    tracing::info!("📊 Metrics registry created with {} metrics", app.metrics.registry().gather().len());

    // Metrics server runs on its own runtime so actix stays off the main one
    let metrics = app.metrics.clone();
    let health = app.health.clone();
    let port = config.metrics_port;
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build metrics runtime");
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = start_metrics_server(metrics, health, port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    let watcher = app.spawn_health_watcher(Duration::from_secs(10));

    // A staff dashboard that logs what it receives
    let mut dashboard = app.notifier.connect();
    tokio::spawn(async move {
        while let Some(message) = dashboard.receiver.recv().await {
            tracing::info!(message = %message, "📣 Staff dashboard received");
        }
    });

    run_demo(&app, &store).await?;

    tracing::info!("✅ Demo complete. Press Ctrl+C to exit.");
    tokio::signal::ctrl_c().await?;

    watcher.abort();
    tracing::info!("👋 Shutting down");
    Ok(())
}

/// Walk one order from cart to completion and print the day's report
async fn run_demo(app: &Backoffice, store: &MemoryStore) -> anyhow::Result<()> {
    let dish = app
        .catalog
        .create_dish(NewDish {
            name: "Kung Pao Chicken".to_string(),
            category_id: 1,
            price: Decimal::new(2800, 2),
            image: None,
            description: Some("Peanuts, chili, chicken".to_string()),
            status: ItemStatus::Enabled,
            flavors: vec![],
        })
        .await?;
    let menu = app.catalog.list_dishes(1).await?;
    tracing::info!(dishes = menu.len(), "Menu loaded for category 1");

    let user = store.insert_user("demo-openid", Some("Demo"), takeout_orders::utils::now()).await;
    let address = store
        .insert_address(AddressBook {
            id: 0,
            user_id: user.id,
            consignee: "Demo".to_string(),
            phone: "13800000000".to_string(),
            province_name: None,
            city_name: Some("Hangzhou".to_string()),
            district_name: None,
            detail: "No. 1 Demo Road".to_string(),
        })
        .await;

    store
        .add_cart_lines(vec![NewCartLine {
            user_id: user.id,
            name: dish.name.clone(),
            image: dish.image.clone(),
            item: CatalogRef::Dish(dish.id),
            dish_flavor: None,
            number: 2,
            amount: dish.price,
        }])
        .await?;

    let submitted = app.orders.submit_order(user.id, SubmitOrder::new(address.id)).await?;
    let outcome = app.orders.pay(user.id, &submitted.order_number).await?;
    tracing::info!(order_id = submitted.id, status = %outcome.confirmation.order().status, "Payment confirmed");

    app.orders.confirm(submitted.id).await?;
    app.orders.dispatch(submitted.id).await?;
    app.orders.complete(submitted.id).await?;

    let today = takeout_orders::utils::now().date();
    let turnover = app.reports.turnover(today, today).await?;
    tracing::info!(report = %serde_json::to_string(&turnover)?, "📈 Today's turnover");

    let stats = app.orders.statistics().await?;
    tracing::info!(?stats, "Open order counts");
    Ok(())
}
