//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two belong in the engine APIs, so
//! keep this module neat and tidy 🙏
//!
//! Each worker thread processes its requests sequentially, so a handler must never block the thread. Everything that
//! waits (database calls, the payment provider, confirmation polling) is awaited instead.
//!
//! Routes under `/api` sit behind the authentication middleware, which supplies the [`AccessClaims`] extractor. The
//! user a handler acts for always comes from the claims, never from the request body.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use storefront_engine::{
    cart::SyncRequest,
    checkout::PollOutcome,
    checkout_objects::{CheckoutOutcome, PaymentSessionRequest, PlaceOrderRequest},
    db_types::Role,
    traits::{CatalogManagement, CheckoutDatabase, OrderManagement, PaymentGateway},
    CartApi,
    CheckoutApi,
    OrderApi,
};

use crate::{
    auth::AccessClaims,
    data_objects::{JsonResponse, PaymentRedirect, QuantityUpdate, SessionOrderParams, StatusUpdate},
    errors::ServerError,
    integrations::PAYMENT_SIGNATURE_HEADER,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:ty),*]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:ty),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------  Check Token  ----------------------------------------------------
route!(check_token => Get "/check_token" requires [Role::User]);
pub async fn check_token(claims: AccessClaims) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET check_token for user #{}", claims.user_id);
    Ok(HttpResponse::Ok().body("Token is valid."))
}

//----------------------------------------------   Catalog  ----------------------------------------------------
route!(products => Get "/products" impl CheckoutDatabase, PaymentGateway);
/// Lists the catalog with current prices and stock. This route is public.
pub async fn products<B, G>(api: web::Data<CheckoutApi<B, G>>) -> Result<HttpResponse, ServerError>
where
    B: CheckoutDatabase,
    G: PaymentGateway,
{
    trace!("💻️ GET products");
    let products = api.db().fetch_products().await?;
    Ok(HttpResponse::Ok().json(products))
}

//----------------------------------------------   Cart  ----------------------------------------------------
route!(sync_cart => Post "/cart/sync" impl CheckoutDatabase);
/// Route handler for the guest cart merge.
///
/// Clients call this once, right after the shopper signs in, with the cart they built anonymously. The body is
/// `{ "syncId": "...", "items": [{ "productId", "quantity", "modifiedAt" }] }`. Re-sending the same `syncId` is
/// harmless, so a client whose request timed out can simply retry.
///
/// The response is the merged account cart, plus a warning for every line that was clamped to the available stock
/// or dropped.
pub async fn sync_cart<B: CheckoutDatabase>(
    claims: AccessClaims,
    body: web::Json<SyncRequest>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let SyncRequest { sync_id, items } = body.into_inner();
    debug!("💻️ POST cart sync for user #{} with {} items", claims.user_id, items.len());
    let merged = api.sync_guest_cart(claims.user_id, sync_id, items).await?;
    Ok(HttpResponse::Ok().json(merged))
}

route!(my_cart => Get "/cart" impl CheckoutDatabase);
pub async fn my_cart<B: CheckoutDatabase>(
    claims: AccessClaims,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET cart for user #{}", claims.user_id);
    let items = api.fetch_cart(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(items))
}

route!(set_cart_item => Put "/cart/items/{product_id}" impl CheckoutDatabase);
pub async fn set_cart_item<B: CheckoutDatabase>(
    claims: AccessClaims,
    path: web::Path<i64>,
    body: web::Json<QuantityUpdate>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    let quantity = body.into_inner().quantity;
    debug!("💻️ PUT cart item {product_id} x{quantity} for user #{}", claims.user_id);
    let item = api.set_item_quantity(claims.user_id, product_id, quantity).await?;
    Ok(HttpResponse::Ok().json(item))
}

route!(remove_cart_item => Delete "/cart/items/{product_id}" impl CheckoutDatabase);
pub async fn remove_cart_item<B: CheckoutDatabase>(
    claims: AccessClaims,
    path: web::Path<i64>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    debug!("💻️ DELETE cart item {product_id} for user #{}", claims.user_id);
    let response = if api.remove_item(claims.user_id, product_id).await? {
        JsonResponse::success(format!("Product {product_id} was removed from your cart."))
    } else {
        JsonResponse::failure(format!("Product {product_id} was not in your cart."))
    };
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(generate_otp => Post "/orders/generate-otp" impl CheckoutDatabase, PaymentGateway);
/// Issues the one-time password that a cash on delivery order must present. The code is delivered out of band, so
/// the response is empty.
pub async fn generate_otp<B, G>(
    claims: AccessClaims,
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: CheckoutDatabase,
    G: PaymentGateway,
{
    debug!("💻️ POST generate-otp for user #{}", claims.user_id);
    api.generate_order_otp(claims.user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

route!(place_order => Post "/orders" impl CheckoutDatabase, PaymentGateway);
/// Route handler for checkout.
///
/// The order is built from the caller's server cart, so clients must have synced their guest cart first.
/// * Cash on delivery needs `otp`. On success the order is returned with `201 Created`.
/// * Online methods (card, UPI) return `200 OK` with `{ redirectUrl, sessionId }`. The order only exists once the
///   payment provider confirms the payment via the webhook. Use `/api/orders/by-session/{sessionId}` to pick it up.
pub async fn place_order<B, G>(
    claims: AccessClaims,
    body: web::Json<PlaceOrderRequest>,
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: CheckoutDatabase,
    G: PaymentGateway,
{
    debug!("💻️ POST order for user #{}", claims.user_id);
    match api.place_order(claims.user_id, body.into_inner()).await? {
        CheckoutOutcome::Placed(order) => Ok(HttpResponse::Created().json(order)),
        CheckoutOutcome::AwaitingPayment(session) => Ok(HttpResponse::Ok().json(PaymentRedirect::from(session))),
    }
}

route!(create_payment_session => Post "/orders/create-payment-session" impl CheckoutDatabase, PaymentGateway);
pub async fn create_payment_session<B, G>(
    claims: AccessClaims,
    body: web::Json<PaymentSessionRequest>,
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: CheckoutDatabase,
    G: PaymentGateway,
{
    debug!("💻️ POST create-payment-session for user #{}", claims.user_id);
    let session = api.create_payment_session(claims.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(session))
}

//----------------------------------------------   Payment webhook  ----------------------------------------------------
route!(payment_webhook => Post "/payments/webhook" impl CheckoutDatabase, PaymentGateway);
/// Receives payment notifications from the provider.
///
/// Every verified callback gets a `200` with a JSON description of what happened, including duplicates and payments
/// that could not be turned into an order. A session we have not stored yet gets a `404`, and backend failures a
/// `5xx`. Both make the provider retry.
pub async fn payment_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: CheckoutDatabase,
    G: PaymentGateway,
{
    trace!("💻️ Received payment callback");
    let signature = req.headers().get(PAYMENT_SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).ok_or_else(|| {
        warn!("💻️ Payment callback without a signature. Rejecting it.");
        ServerError::InvalidCallbackSignature
    })?;
    let outcome = api.handle_payment_callback(signature, body.as_ref()).await?;
    info!("💻️ Payment callback handled: {outcome:?}");
    Ok(HttpResponse::Ok().json(outcome))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(my_orders => Get "/orders" impl OrderManagement);
/// The caller's orders, newest first.
pub async fn my_orders<B: OrderManagement>(
    claims: AccessClaims,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders for user #{}", claims.user_id);
    let orders = api.orders_for_user(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement);
pub async fn order_by_id<B: OrderManagement>(
    claims: AccessClaims,
    path: web::Path<i64>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order #{order_id} for user #{}", claims.user_id);
    let order = api
        .order_for_user(claims.user_id, order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order #{order_id}")))?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_by_session => Get "/orders/by-session/{session_id}" impl OrderManagement);
/// The order created for a payment session, or `null` if the provider has not confirmed the payment yet.
///
/// With `?wait=true` the server polls for a short, bounded time before giving up, which saves the client from
/// polling right after it is redirected back from the payment page.
pub async fn order_by_session<B: OrderManagement>(
    claims: AccessClaims,
    path: web::Path<String>,
    params: web::Query<SessionOrderParams>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let session_id = path.into_inner();
    debug!("💻️ GET order for session {session_id} for user #{}", claims.user_id);
    let order = if params.wait {
        match api.wait_for_session_order(claims.user_id, &session_id, Default::default()).await {
            PollOutcome::Found(order) => Some(order),
            PollOutcome::NotFound => None,
        }
    } else {
        api.order_for_session(claims.user_id, &session_id).await?
    };
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Post "/admin/orders/{order_id}/status" impl OrderManagement where requires [Role::Admin]);
/// Admin only. Moves an order along Placed → Shipped → Delivered, or cancels it.
pub async fn update_order_status<B: OrderManagement>(
    claims: AccessClaims,
    path: web::Path<i64>,
    body: web::Json<StatusUpdate>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let status = body.into_inner().status;
    info!("💻️ Admin #{} sets order #{order_id} to {status}", claims.user_id);
    let order = api.update_status(order_id, status).await?;
    Ok(HttpResponse::Ok().json(order))
}
