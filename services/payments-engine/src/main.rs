use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use payments_engine::{
    checkout::CheckoutService,
    config::Config,
    database::Database,
    escrow::EscrowService,
    events::EventPublisher,
    handlers,
    ledger::LedgerService,
    metrics,
    provider::{MobileMoneyProvider, MockPaymentProvider, PaymentProvider},
    sweeper::EscrowSweeper,
};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    info!("Starting Payments Engine on port {}", config.server.port);

    if let Err(e) = metrics::register_metrics(prometheus::default_registry()) {
        warn!("Failed to register metrics: {}", e);
    }

    let db = Database::new(&config.database)
        .await
        .expect("Failed to connect to database");

    let events = EventPublisher::connect(&config.nats).await;

    let provider: Arc<dyn PaymentProvider> = if config.provider.use_mock {
        warn!("Using mock payment provider; captures will not hit the gateway");
        Arc::new(MockPaymentProvider::succeeding())
    } else {
        Arc::new(
            MobileMoneyProvider::new(&config.provider)
                .expect("Failed to build payment provider client"),
        )
    };

    let ledger = Arc::new(LedgerService::new(config.payments.clone()));
    let escrow = Arc::new(EscrowService::new(
        db.clone(),
        LedgerService::new(config.payments.clone()),
        events.clone(),
        config.payments.clone(),
    ));
    let checkout = Arc::new(CheckoutService::new(
        db.clone(),
        LedgerService::new(config.payments.clone()),
        EscrowService::new(
            db.clone(),
            LedgerService::new(config.payments.clone()),
            events.clone(),
            config.payments.clone(),
        ),
        provider,
        events.clone(),
        config.payments.clone(),
    ));

    let mut sweeper = EscrowSweeper::new(escrow.clone(), config.payments.sweep_schedule.clone())
        .await
        .expect("Failed to build escrow sweeper");
    sweeper.start().await.expect("Failed to start escrow sweeper");

    let server_db = db.clone();
    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::Data::new(server_db.clone()))
            .app_data(web::Data::new(checkout.clone()))
            .app_data(web::Data::new(escrow.clone()))
            .app_data(web::Data::new(ledger.clone()))
            .configure(handlers::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
