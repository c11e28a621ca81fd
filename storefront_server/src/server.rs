use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use futures::FutureExt;
use log::*;
use storefront_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    CartApi,
    CheckoutApi,
    OrderApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::HostedCheckoutGateway,
    middleware::AuthenticationMiddlewareFactory,
    routes::{
        health,
        CheckTokenRoute,
        CreatePaymentSessionRoute,
        GenerateOtpRoute,
        MyCartRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        OrderBySessionRoute,
        PaymentWebhookRoute,
        PlaceOrderRoute,
        ProductsRoute,
        RemoveCartItemRoute,
        SetCartItemRoute,
        SyncCartRoute,
        UpdateOrderStatusRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;
const MAX_DB_CONNECTIONS: u32 = 25;

type Gateway = HostedCheckoutGateway;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = HostedCheckoutGateway::new(config.gateway.clone())?;
    let hooks = create_event_hooks(&config);
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let worker_api = CheckoutApi::new(db.clone(), gateway.clone(), config.otp.clone(), producers.clone());
    // Do not await the worker. It runs until the server shuts down.
    let _worker = start_expiry_worker(worker_api, config.payment_session_timeout);
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// The hooks the server subscribes to engine events with. There is no SMS or email integration, so OTP delivery is
/// a log line, and the code itself is only logged when `SF_LOG_OTP_CODES` is on.
pub fn create_event_hooks(config: &ServerConfig) -> EventHooks {
    let log_otp_codes = config.log_otp_codes;
    let mut hooks = EventHooks::default();
    hooks
        .on_otp_issued(move |ev| {
            async move {
                if log_otp_codes {
                    info!("📬️ OTP for user #{} ({}): {} valid until {}", ev.user_id, ev.purpose, ev.code, ev.expires_at);
                } else {
                    info!("📬️ OTP issued for user #{} ({}), valid until {}", ev.user_id, ev.purpose, ev.expires_at);
                }
            }
            .boxed()
        })
        .on_order_placed(|ev| {
            async move {
                let order = ev.order;
                info!(
                    "📬️ Order #{} placed by user #{}: {} lines, {} ({})",
                    order.id,
                    order.user_id,
                    order.items.len(),
                    order.total_amount,
                    order.payment_method
                );
            }
            .boxed()
        })
        .on_checkout_failed(|ev| {
            async move {
                let session = ev.session_id.as_deref().unwrap_or("-");
                warn!("📬️ Checkout failed for user #{} (session {session}). {}", ev.user_id, ev.reason);
                for line in &ev.shortfall {
                    warn!("📬️   {line}");
                }
            }
            .boxed()
        });
    hooks
}

/// Malformed JSON bodies are reported in the same `{"error": ...}` shape as every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|e, _req| ServerError::InvalidRequestBody(e.to_string()).into())
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: Gateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let cart_api = CartApi::new(db.clone(), config.merge_policy);
        let checkout_api = CheckoutApi::new(db.clone(), gateway.clone(), config.otp.clone(), producers.clone());
        let orders_api = OrderApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sf::access_log"))
            .app_data(json_config())
            .app_data(web::Data::new(cart_api))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(orders_api));
        // Routes that require authentication
        let auth_scope = web::scope("/api")
            .wrap(AuthenticationMiddlewareFactory::new(config.auth.auth_secret.clone()))
            .service(CheckTokenRoute::new())
            .service(SyncCartRoute::<SqliteDatabase>::new())
            .service(MyCartRoute::<SqliteDatabase>::new())
            .service(SetCartItemRoute::<SqliteDatabase>::new())
            .service(RemoveCartItemRoute::<SqliteDatabase>::new())
            .service(GenerateOtpRoute::<SqliteDatabase, Gateway>::new())
            .service(CreatePaymentSessionRoute::<SqliteDatabase, Gateway>::new())
            .service(PlaceOrderRoute::<SqliteDatabase, Gateway>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrderBySessionRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(ProductsRoute::<SqliteDatabase, Gateway>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase, Gateway>::new())
            .service(auth_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
