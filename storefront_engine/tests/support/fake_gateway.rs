use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
    Mutex,
};

use storefront_engine::traits::{GatewayError, GatewaySession, PaymentCallback, PaymentGateway, SessionRequest};

pub const GOOD_SIGNATURE: &str = "signed-by-fakepay";

/// An in-process payment provider. Session ids are `sess_<n>`, counting up from the starting number, and callbacks
/// are accepted when they carry [`GOOD_SIGNATURE`].
#[derive(Clone, Default)]
pub struct FakeGateway {
    next_id: Arc<AtomicU64>,
    offline: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<SessionRequest>>>,
}

impl FakeGateway {
    pub fn starting_at(n: u64) -> Self {
        Self { next_id: Arc::new(AtomicU64::new(n)), ..Default::default() }
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn callback_body(session_id: &str, status: &str) -> Vec<u8> {
        format!(r#"{{"sessionId":"{session_id}","status":"{status}"}}"#).into_bytes()
    }
}

impl PaymentGateway for FakeGateway {
    fn provider(&self) -> &str {
        "fakepay"
    }

    async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession, GatewayError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("fakepay is down".into()));
        }
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let session_id = format!("sess_{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let url = format!("https://pay.example.test/checkout/{session_id}");
        Ok(GatewaySession { url, session_id })
    }

    fn verify_callback(&self, signature: &str, body: &[u8]) -> Result<PaymentCallback, GatewayError> {
        if signature != GOOD_SIGNATURE {
            return Err(GatewayError::InvalidSignature);
        }
        serde_json::from_slice(body).map_err(|e| GatewayError::MalformedCallback(e.to_string()))
    }
}
