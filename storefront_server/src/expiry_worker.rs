use chrono::Duration;
use log::*;
use storefront_engine::{traits::PaymentGateway, CheckoutApi, SqliteDatabase};
use tokio::task::JoinHandle;

const EXPIRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every minute it marks payment sessions that have been pending for longer than `session_timeout` as expired, and
/// purges OTP challenges that can no longer be used.
pub fn start_expiry_worker<G>(api: CheckoutApi<SqliteDatabase, G>, session_timeout: Duration) -> JoinHandle<()>
where G: PaymentGateway + Send + Sync + 'static {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(EXPIRY_INTERVAL);
        info!("🕰️ Payment session expiry worker started");
        loop {
            timer.tick().await;
            run_expiry_job(&api, session_timeout).await;
        }
    })
}

async fn run_expiry_job<G: PaymentGateway>(api: &CheckoutApi<SqliteDatabase, G>, session_timeout: Duration) {
    trace!("🕰️ Running payment session expiry job");
    match api.expire_stale_sessions(session_timeout).await {
        Ok(expired) if expired.is_empty() => trace!("🕰️ No stale payment sessions"),
        Ok(expired) => info!("🕰️ {} payment sessions expired: {}", expired.len(), expired.join(", ")),
        Err(e) => error!("🕰️ Error running payment session expiry job: {e}"),
    }
    match api.otp_api().purge().await {
        Ok(0) => {},
        Ok(n) => debug!("🕰️ Purged {n} stale OTP challenges"),
        Err(e) => error!("🕰️ Error purging OTP challenges: {e}"),
    }
}
