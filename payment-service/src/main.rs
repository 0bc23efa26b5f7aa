use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use diesel::PgConnection;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

use anyhow::Result;
use clap::Parser;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection};
use diesel::Connection;
use payment_service::api::{self, AppState};
use payment_service::auth::JwtVerifier;
use payment_service::clients::{CardServiceClient, OrderServiceClient};
use payment_service::config::Args;
use payment_service::gateway::SimulatedGateway;
use payment_service::monitor::ProcessingMonitor;
use payment_service::service::PaymentService;
use payment_service::store::PgPaymentStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    // Run migrations first
    info!("Running database migrations...");
    let mut conn = PgConnection::establish(&args.database_url)?;
    conn.run_pending_migrations(MIGRATIONS).map_err(|e| anyhow::anyhow!("Migration error: {}", e))?;
    info!("Migrations completed successfully");

    let config = diesel_async::pooled_connection::AsyncDieselConnectionManager::<AsyncPgConnection>::new(&args.database_url);
    let pool = Pool::builder().build(config).await?;

    let cards = CardServiceClient::new(&args.card_service_url, args.downstream_timeout())?;
    let orders = OrderServiceClient::new(&args.order_service_url, args.downstream_timeout())?;
    let gateway = SimulatedGateway::new(args.gateway_latency(), args.gateway_success_rate);

    let service = PaymentService::new(
        Arc::new(PgPaymentStore::new(pool)),
        Arc::new(cards),
        Arc::new(orders),
        Arc::new(gateway),
    );

    let monitor = ProcessingMonitor::new(service.clone(), args.monitor_interval(), args.stale_processing());
    tokio::spawn(async move {
        monitor.run().await;
    });

    let app_state = AppState {
        service,
        verifier: Arc::new(JwtVerifier::new(args.jwt_secret.as_bytes())),
    };

    let app = api::create_router(app_state, args.request_timeout());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;

    info!("Payment service started on port {}", args.port);
    info!("Card service at {}, order service at {}", args.card_service_url, args.order_service_url);

    axum::serve(listener, app).await?;

    Ok(())
}
