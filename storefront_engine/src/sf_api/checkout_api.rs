//! `CheckoutApi` turns the signed-in user's cart into an order.
//!
//! There are two paths through checkout:
//!
//! * **Cash on delivery.** The shopper proves intent with a one-time password. The OTP is consumed, then the order is
//!   committed against the inventory in one transaction.
//! * **Online payment.** Current prices are quoted into a payment session at the gateway and the shopper is
//!   redirected there. No order exists until the gateway's signed callback confirms payment, at which point the
//!   session is claimed and the order is committed at the quoted prices.
//!
//! Each attempt walks the [`CheckoutState`] machine, so every exit is either `Placed`, `Rejected` (nothing happened)
//! or `FailedRolledBack` (the commit was attempted and nothing was kept).
use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    checkout::{CheckoutEvent, CheckoutState},
    db_types::{
        CartItem,
        Money,
        NewOrder,
        NewPaymentSession,
        Order,
        OtpPurpose,
        PaymentDetails,
        PaymentMethod,
        PaymentSessionStatus,
        QuotedLine,
        StockShortfall,
    },
    events::{CheckoutFailedEvent, EventProducers, OrderPlacedEvent},
    sf_api::{
        checkout_objects::{CheckoutDraft, CheckoutOutcome, PaymentSessionRequest, PlaceOrderRequest, WebhookOutcome},
        errors::CheckoutError,
        otp_api::{OtpApi, OtpSettings},
    },
    traits::{
        CallbackStatus,
        CheckoutDatabase,
        CheckoutDatabaseError,
        GatewaySession,
        PaymentGateway,
        SessionCommitResult,
        SessionRequest,
    },
};

const MIN_ADDRESS_LENGTH: usize = 5;

/// Tracks one checkout attempt through the state machine and logs every move.
struct CheckoutRun {
    user_id: i64,
    state: CheckoutState,
}

impl CheckoutRun {
    fn new(user_id: i64) -> Self {
        Self { user_id, state: CheckoutState::Draft }
    }

    fn advance(&mut self, event: CheckoutEvent) -> Result<(), CheckoutError> {
        let next = self.state.transition(event)?;
        trace!("🧾️ Checkout for user #{}: {} -> {next}", self.user_id, self.state);
        self.state = next;
        Ok(())
    }

    fn reject(&mut self, err: CheckoutError) -> CheckoutError {
        match self.advance(CheckoutEvent::Rejected) {
            Ok(()) => debug!("🧾️ Checkout for user #{} rejected. {err}", self.user_id),
            Err(e) => error!("🧾️ {e}"),
        }
        err
    }
}

pub struct CheckoutApi<B, G> {
    db: B,
    gateway: G,
    otp: OtpApi<B>,
    producers: EventProducers,
}

impl<B, G> Debug for CheckoutApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B, G> CheckoutApi<B, G>
where
    B: CheckoutDatabase,
    G: PaymentGateway,
{
    pub fn new(db: B, gateway: G, otp_settings: OtpSettings, producers: EventProducers) -> Self {
        let otp = OtpApi::new(db.clone(), otp_settings, producers.clone());
        Self { db, gateway, otp, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn otp_api(&self) -> &OtpApi<B> {
        &self.otp
    }

    /// Issues the OTP a cash-on-delivery checkout must present.
    pub async fn generate_order_otp(&self, user_id: i64) -> Result<(), CheckoutError> {
        self.otp.issue(user_id, OtpPurpose::PlaceOrder).await?;
        Ok(())
    }

    /// Places an order from the user's server cart.
    ///
    /// Cash on delivery requires `request.otp` and yields [`CheckoutOutcome::Placed`]. Online methods open a payment
    /// session and yield [`CheckoutOutcome::AwaitingPayment`] with the gateway redirect.
    pub async fn place_order(
        &self,
        user_id: i64,
        request: PlaceOrderRequest,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let mut run = CheckoutRun::new(user_id);
        let draft = match self.validate_draft(user_id, &request.shipping_address, &request.payment_method).await {
            Ok(draft) => draft,
            Err(e) => return Err(run.reject(e)),
        };
        if draft.payment_method.is_online() {
            run.advance(CheckoutEvent::DraftAccepted)?;
            return match self.open_payment_session(&draft).await {
                Ok(session) => Ok(CheckoutOutcome::AwaitingPayment(session)),
                Err(e) => Err(run.reject(e)),
            };
        }
        let code = match request.otp.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => code,
            _ => {
                let err = CheckoutError::ValidationError("An OTP is required for cash on delivery orders".into());
                return Err(run.reject(err));
            },
        };
        run.advance(CheckoutEvent::DraftAccepted)?;
        if let Err(e) = self.otp.validate(user_id, OtpPurpose::PlaceOrder, code).await {
            return Err(run.reject(e.into()));
        }
        run.advance(CheckoutEvent::ProofVerified)?;
        let details = PaymentDetails::CashOnDelivery { otp_verified_at: Utc::now() };
        let order = NewOrder::from_cart(user_id, &draft.cart, draft.shipping_address, PaymentMethod::Cod, details);
        match self.db.commit_order(order).await {
            Ok(order) => {
                run.advance(CheckoutEvent::CommitSucceeded)?;
                info!("🧾️ Order #{} placed by user #{user_id} for {} (cash on delivery)", order.id, order.total_amount);
                self.call_order_placed_hook(&order).await;
                Ok(CheckoutOutcome::Placed(order))
            },
            Err(e) => {
                run.advance(CheckoutEvent::CommitFailed)?;
                info!("🧾️ Cash on delivery order for user #{user_id} was rolled back. {e}");
                Err(e.into())
            },
        }
    }

    /// Opens an online payment session for the user's cart and returns the gateway redirect.
    pub async fn create_payment_session(
        &self,
        user_id: i64,
        request: PaymentSessionRequest,
    ) -> Result<GatewaySession, CheckoutError> {
        let draft = self.validate_draft(user_id, &request.shipping_address, &request.payment_method).await?;
        if !draft.payment_method.is_online() {
            return Err(CheckoutError::ValidationError(
                "Cash on delivery orders are placed with an OTP, not a payment session".into(),
            ));
        }
        self.open_payment_session(&draft).await
    }

    /// Handles a callback from the payment gateway.
    ///
    /// Anything that reaches a final state (including duplicates and paid-but-out-of-stock) is an `Ok`, so that the
    /// gateway stops redelivering. A session we have no record of yet is [`CheckoutError::SessionNotFound`]: the
    /// gateway may call back before `insert_payment_session` has committed, so the callback must be redelivered.
    pub async fn handle_payment_callback(
        &self,
        signature: &str,
        body: &[u8],
    ) -> Result<WebhookOutcome, CheckoutError> {
        let callback = self.gateway.verify_callback(signature, body)?;
        let session_id = callback.session_id;
        debug!("🧾️ Payment callback for session {session_id}: {}", callback.status);
        match callback.status {
            CallbackStatus::Paid => self.commit_paid_session(&session_id).await,
            CallbackStatus::Failed | CallbackStatus::Expired => {
                let status = match callback.status {
                    CallbackStatus::Expired => PaymentSessionStatus::Expired,
                    _ => PaymentSessionStatus::Failed,
                };
                let reason = format!("Gateway reported the payment as {}", callback.status);
                if self.db.close_payment_session(&session_id, status, Some(&reason)).await? {
                    info!("🧾️ Payment session {session_id} closed as {status}");
                    return Ok(WebhookOutcome::SessionClosed { status });
                }
                match self.db.fetch_payment_session(&session_id).await? {
                    Some(session) => Ok(WebhookOutcome::SessionClosed { status: session.status }),
                    None => {
                        warn!("🧾️ {} callback for unknown session {session_id}. Asking for redelivery.", callback.status);
                        Err(CheckoutError::SessionNotFound(session_id))
                    },
                }
            },
        }
    }

    /// Marks every payment session that has been pending for longer than `timeout` as expired.
    pub async fn expire_stale_sessions(&self, timeout: Duration) -> Result<Vec<String>, CheckoutError> {
        let expired = self.db.expire_payment_sessions(Utc::now() - timeout).await?;
        Ok(expired)
    }

    async fn commit_paid_session(&self, session_id: &str) -> Result<WebhookOutcome, CheckoutError> {
        match self.db.commit_session_order(session_id).await {
            Ok(SessionCommitResult::Placed(order)) => {
                info!(
                    "🧾️ Order #{} placed by user #{} for {} (session {session_id})",
                    order.id, order.user_id, order.total_amount
                );
                let order_id = order.id;
                self.call_order_placed_hook(&order).await;
                Ok(WebhookOutcome::OrderPlaced { order_id })
            },
            Ok(SessionCommitResult::Duplicate(order_id)) => {
                debug!("🧾️ Duplicate payment callback for session {session_id} (order #{order_id})");
                Ok(WebhookOutcome::Duplicate { order_id })
            },
            Ok(SessionCommitResult::Closed(status)) => {
                warn!("🧾️ Payment confirmed for session {session_id}, which is already {status}. A refund is needed.");
                let reason = format!("Payment confirmed for a session that is {status}");
                self.report_failed_session(session_id, reason, vec![]).await?;
                Ok(WebhookOutcome::SessionClosed { status })
            },
            Err(CheckoutDatabaseError::InsufficientStock(lines)) => {
                let reason = "Insufficient stock after payment".to_string();
                self.report_failed_session(session_id, reason, lines.clone()).await?;
                Ok(WebhookOutcome::StockUnavailable { lines })
            },
            Err(CheckoutDatabaseError::SessionNotFound(id)) => {
                warn!("🧾️ Payment callback for unknown session {id}. Asking for redelivery.");
                Err(CheckoutError::SessionNotFound(id))
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Fires the checkout-failed hook for the owner of `session_id`. Without a session row there is no one to
    /// notify, so the failure is only logged.
    async fn report_failed_session(
        &self,
        session_id: &str,
        reason: String,
        lines: Vec<StockShortfall>,
    ) -> Result<(), CheckoutError> {
        match self.db.fetch_payment_session(session_id).await? {
            Some(session) => self.call_checkout_failed_hook(session.user_id, session_id, reason, lines).await,
            None => error!("🧾️ Checkout failed for session {session_id}, but the session record is gone. {reason}"),
        }
        Ok(())
    }

    async fn validate_draft(
        &self,
        user_id: i64,
        shipping_address: &str,
        payment_method: &str,
    ) -> Result<CheckoutDraft, CheckoutError> {
        let payment_method = payment_method
            .parse::<PaymentMethod>()
            .map_err(|_| CheckoutError::ValidationError(format!("Unknown payment method: {payment_method}")))?;
        let shipping_address = shipping_address.trim();
        if shipping_address.chars().count() < MIN_ADDRESS_LENGTH {
            return Err(CheckoutError::ValidationError("A valid shipping address is required".into()));
        }
        let cart = self.db.fetch_cart(user_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::ValidationError("Your cart is empty".into()));
        }
        Ok(CheckoutDraft { user_id, cart, shipping_address: shipping_address.to_string(), payment_method })
    }

    /// Prices every cart line at the current catalog price. Lines that cannot possibly be fulfilled are rejected
    /// now, before the shopper is sent to pay for them.
    async fn quote(&self, cart: &[CartItem]) -> Result<Vec<QuotedLine>, CheckoutError> {
        let mut quoted = Vec::with_capacity(cart.len());
        let mut short = Vec::new();
        for item in cart {
            match self.db.fetch_product(item.product_id).await? {
                Some(p) if p.stock >= item.quantity => {
                    quoted.push(QuotedLine { product_id: p.id, quantity: item.quantity, unit_price: p.price })
                },
                Some(p) => short.push(StockShortfall {
                    product_id: p.id,
                    requested: item.quantity,
                    available: Some(p.stock),
                }),
                None => short.push(StockShortfall {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available: None,
                }),
            }
        }
        if short.is_empty() {
            Ok(quoted)
        } else {
            Err(CheckoutError::InsufficientStock(short))
        }
    }

    async fn open_payment_session(&self, draft: &CheckoutDraft) -> Result<GatewaySession, CheckoutError> {
        let items = self.quote(&draft.cart).await?;
        let amount: Money = items.iter().map(|l| l.unit_price * l.quantity).sum();
        let request = SessionRequest {
            user_id: draft.user_id,
            payment_method: draft.payment_method,
            amount,
            items: items.clone(),
        };
        let session = self.gateway.create_session(&request).await?;
        let new_session = NewPaymentSession {
            session_id: session.session_id.clone(),
            provider: self.gateway.provider().to_string(),
            user_id: draft.user_id,
            payment_method: draft.payment_method,
            shipping_address: draft.shipping_address.clone(),
            amount,
            items,
        };
        self.db.insert_payment_session(new_session).await?;
        info!(
            "🧾️ Payment session {} opened for user #{} ({}, {amount})",
            session.session_id, draft.user_id, draft.payment_method
        );
        Ok(session)
    }

    async fn call_order_placed_hook(&self, order: &Order) {
        for emitter in &self.producers.order_placed_producer {
            debug!("🧾️ Notifying order placed hook subscribers");
            emitter.publish_event(OrderPlacedEvent::new(order.clone())).await;
        }
    }

    async fn call_checkout_failed_hook(
        &self,
        user_id: i64,
        session_id: &str,
        reason: String,
        shortfall: Vec<StockShortfall>,
    ) {
        for emitter in &self.producers.checkout_failed_producer {
            debug!("🧾️ Notifying checkout failed hook subscribers");
            let event = CheckoutFailedEvent {
                user_id,
                session_id: Some(session_id.to_string()),
                reason: reason.clone(),
                shortfall: shortfall.clone(),
            };
            emitter.publish_event(event).await;
        }
    }
}
