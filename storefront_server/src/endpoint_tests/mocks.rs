use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
    Mutex,
};

use chrono::{TimeZone, Utc};
use mockall::mock;
use storefront_engine::{
    db_types::{Money, Order, OrderLine, OrderStatusType, PaymentDetails, PaymentMethod},
    traits::{
        GatewayError,
        GatewaySession,
        OrderManagement,
        OrderManagementError,
        PaymentCallback,
        PaymentGateway,
        SessionRequest,
    },
};

mock! {
    pub OrderManager {}
    impl OrderManagement for OrderManager {
        async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderManagementError>;
        async fn fetch_order_by_session_id(&self, session_id: &str) -> Result<Option<Order>, OrderManagementError>;
        async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderManagementError>;
        async fn update_order_status(&self, order_id: i64, status: OrderStatusType) -> Result<Order, OrderManagementError>;
    }
}

pub const GOOD_SIGNATURE: &str = "signed-by-stubpay";

/// A payment provider that never leaves the process. Sessions are numbered from 1 and every request is recorded.
#[derive(Clone, Default)]
pub struct StubGateway {
    next_id: Arc<AtomicU64>,
    requests: Arc<Mutex<Vec<SessionRequest>>>,
}

impl StubGateway {
    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl PaymentGateway for StubGateway {
    fn provider(&self) -> &str {
        "stubpay"
    }

    async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = format!("sess_{n}");
        Ok(GatewaySession { url: format!("https://stubpay.test/pay/{session_id}"), session_id })
    }

    fn verify_callback(&self, signature: &str, body: &[u8]) -> Result<PaymentCallback, GatewayError> {
        if signature != GOOD_SIGNATURE {
            return Err(GatewayError::InvalidSignature);
        }
        serde_json::from_slice(body).map_err(|e| GatewayError::MalformedCallback(e.to_string()))
    }
}

pub fn sample_order(id: i64, user_id: i64, status: OrderStatusType) -> Order {
    let placed_at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
    Order {
        id,
        user_id,
        items: vec![
            OrderLine { product_id: 1, quantity: 2, price_at_purchase: Money::from(500) },
            OrderLine { product_id: 4, quantity: 1, price_at_purchase: Money::from(1250) },
        ],
        total_amount: Money::from(2250),
        status,
        shipping_address: "221B Baker Street, London".into(),
        payment_method: PaymentMethod::Cod,
        payment_details: PaymentDetails::CashOnDelivery { otp_verified_at: placed_at },
        session_id: None,
        created_at: placed_at,
        updated_at: placed_at,
    }
}
