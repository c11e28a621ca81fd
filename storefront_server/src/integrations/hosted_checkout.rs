//! A [`PaymentGateway`] backed by a hosted checkout provider.
//!
//! The provider exposes a REST endpoint that creates a checkout session and returns the URL of its hosted payment page.
//! When the shopper finishes (or abandons) the payment, the provider POSTs a JSON notification to
//! `/payments/webhook`, signed with the shared webhook secret. The signature is the url-safe base64 HMAC-SHA256 of the
//! raw request body, sent in the `X-Payment-Signature` header.
use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use storefront_engine::{
    db_types::{Money, QuotedLine},
    traits::{GatewayError, GatewaySession, PaymentCallback, PaymentGateway, SessionRequest},
};

use crate::{config::GatewayConfig, errors::ServerError, helpers::verify_hmac};

pub const PAYMENT_SIGNATURE_HEADER: &str = "X-Payment-Signature";
const PROVIDER_NAME: &str = "hosted-checkout";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionBody<'a> {
    amount: Money,
    currency: &'a str,
    payment_method: &'a str,
    client_reference: String,
    line_items: &'a [QuotedLine],
    #[serde(skip_serializing_if = "Option::is_none")]
    success_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancel_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    id: String,
    url: String,
}

#[derive(Clone)]
pub struct HostedCheckoutGateway {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl HostedCheckoutGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.api_key.reveal());
        let mut val = HeaderValue::from_str(&bearer).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.url.trim_end_matches('/'))
    }
}

impl PaymentGateway for HostedCheckoutGateway {
    fn provider(&self) -> &str {
        PROVIDER_NAME
    }

    async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession, GatewayError> {
        let body = CreateSessionBody {
            amount: request.amount,
            currency: &self.config.currency,
            payment_method: request.payment_method.as_str(),
            client_reference: request.user_id.to_string(),
            line_items: &request.items,
            success_url: non_empty(&self.config.success_url),
            cancel_url: non_empty(&self.config.cancel_url),
        };
        let url = self.url("/sessions");
        trace!("💳️ Creating checkout session at {url} for user #{}", request.user_id);
        let response = self.client.post(url).json(&body).send().await.map_err(|e| {
            warn!("💳️ Could not reach the payment provider. {e}");
            GatewayError::Unavailable(e.to_string())
        })?;
        let status = response.status();
        if status.is_success() {
            let session = response
                .json::<CreateSessionResponse>()
                .await
                .map_err(|e| GatewayError::Unavailable(format!("Unexpected response from the provider. {e}")))?;
            debug!("💳️ Checkout session {} created", session.id);
            Ok(GatewaySession { url: session.url, session_id: session.id })
        } else {
            let message = response.text().await.unwrap_or_default();
            warn!("💳️ Payment provider responded with {status}. {message}");
            if status.is_server_error() || status.as_u16() == 429 {
                Err(GatewayError::Unavailable(format!("{status}: {message}")))
            } else {
                Err(GatewayError::Rejected(format!("{status}: {message}")))
            }
        }
    }

    fn verify_callback(&self, signature: &str, body: &[u8]) -> Result<PaymentCallback, GatewayError> {
        if self.config.webhook_secret.is_blank() {
            warn!("💳️ No webhook secret is configured, so the payment callback cannot be trusted");
            return Err(GatewayError::InvalidSignature);
        }
        if !verify_hmac(self.config.webhook_secret.reveal(), body, signature.trim()) {
            warn!("💳️ Payment callback signature did not verify");
            return Err(GatewayError::InvalidSignature);
        }
        serde_json::from_slice::<PaymentCallback>(body).map_err(|e| GatewayError::MalformedCallback(e.to_string()))
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}
