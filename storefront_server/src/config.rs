use std::env;

use chrono::Duration;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sf_common::{helpers::parse_boolean_flag, Secret};
use storefront_engine::{cart::MergePolicy, OtpSettings};

use crate::errors::ServerError;

const DEFAULT_SF_HOST: &str = "127.0.0.1";
const DEFAULT_SF_PORT: u16 = 8360;
const DEFAULT_OTP_TTL_SECS: i64 = 300;
const DEFAULT_OTP_MAX_ATTEMPTS: i64 = 5;
const DEFAULT_PAYMENT_SESSION_TIMEOUT: Duration = Duration::minutes(60);
const DEFAULT_CURRENCY: &str = "INR";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub otp: OtpSettings,
    /// How a guest cart is folded into the account cart at sign-in. One policy per deployment.
    pub merge_policy: MergePolicy,
    /// Pending payment sessions older than this are marked as expired by the expiry worker.
    pub payment_session_timeout: Duration,
    pub gateway: GatewayConfig,
    /// Development only. Writes issued OTP codes to the log, in lieu of an SMS or email integration.
    pub log_otp_codes: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SF_HOST.to_string(),
            port: DEFAULT_SF_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            otp: default_otp_settings(),
            merge_policy: MergePolicy::default(),
            payment_session_timeout: DEFAULT_PAYMENT_SESSION_TIMEOUT,
            gateway: GatewayConfig::default(),
            log_otp_codes: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SF_HOST").ok().unwrap_or_else(|| DEFAULT_SF_HOST.into());
        let port = env::var("SF_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SF_PORT. {e} Using the default, {DEFAULT_SF_PORT}, instead."
                    );
                    DEFAULT_SF_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SF_PORT);
        let database_url = env::var("SF_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SF_DATABASE_URL is not set. Please set it to the URL for the storefront database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let otp = configure_otp();
        let merge_policy = match env::var("SF_CART_MERGE_POLICY") {
            Ok(s) => s.parse::<MergePolicy>().unwrap_or_else(|e| {
                warn!("🪛️ {e}. Using the default cart merge policy, {}.", MergePolicy::default());
                MergePolicy::default()
            }),
            Err(_) => {
                info!("🪛️ SF_CART_MERGE_POLICY is not set. Using the default, {}.", MergePolicy::default());
                MergePolicy::default()
            },
        };
        let payment_session_timeout = env::var("SF_PAYMENT_SESSION_TIMEOUT_MINS")
            .map_err(|_| {
                info!(
                    "🪛️ SF_PAYMENT_SESSION_TIMEOUT_MINS is not set. Using the default value of {} mins.",
                    DEFAULT_PAYMENT_SESSION_TIMEOUT.num_minutes()
                )
            })
            .and_then(|s| {
                s.parse::<i64>()
                    .map(Duration::minutes)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for SF_PAYMENT_SESSION_TIMEOUT_MINS. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_PAYMENT_SESSION_TIMEOUT);
        let gateway = GatewayConfig::from_env_or_defaults();
        let log_otp_codes = parse_boolean_flag(env::var("SF_LOG_OTP_CODES").ok(), false);
        if log_otp_codes {
            warn!(
                "🚨️ SF_LOG_OTP_CODES is on. One-time passwords will be written to the log. Never do this in \
                 production."
            );
        }
        Self {
            host,
            port,
            database_url,
            auth,
            otp,
            merge_policy,
            payment_session_timeout,
            gateway,
            log_otp_codes,
        }
    }
}

fn default_otp_settings() -> OtpSettings {
    OtpSettings {
        ttl: Duration::seconds(DEFAULT_OTP_TTL_SECS),
        max_attempts: DEFAULT_OTP_MAX_ATTEMPTS,
        pepper: Secret::new(random_secret()),
    }
}

fn configure_otp() -> OtpSettings {
    let ttl = read_positive_i64("SF_OTP_TTL_SECS", DEFAULT_OTP_TTL_SECS);
    let max_attempts = read_positive_i64("SF_OTP_MAX_ATTEMPTS", DEFAULT_OTP_MAX_ATTEMPTS);
    let pepper = env::var("SF_OTP_PEPPER").ok().filter(|s| !s.is_empty()).unwrap_or_else(|| {
        warn!(
            "🚨️ SF_OTP_PEPPER is not set. I'm using a random value for this session. OTPs issued before a restart will \
             no longer validate."
        );
        random_secret()
    });
    OtpSettings { ttl: Duration::seconds(ttl), max_attempts, pepper: Secret::new(pepper) }
}

fn read_positive_i64(name: &str, default: i64) -> i64 {
    match env::var(name) {
        Ok(s) => match s.trim().parse::<i64>() {
            Ok(v) if v > 0 => v,
            _ => {
                warn!("🪛️ Invalid configuration value for {name}: {s}. Using the default, {default}.");
                default
            },
        },
        Err(_) => {
            info!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

fn random_secret() -> String {
    thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect()
}

//-------------------------------------------------  GatewayConfig  ----------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    /// Base URL of the hosted checkout provider's API, e.g. "https://api.pay.example.com/v1"
    pub url: String,
    pub api_key: Secret<String>,
    /// The key the provider signs its callbacks with.
    pub webhook_secret: Secret<String>,
    /// Where the provider sends the shopper after a successful payment.
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
}

impl GatewayConfig {
    pub fn from_env_or_defaults() -> Self {
        let url = env::var("SF_GATEWAY_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SF_GATEWAY_URL is not set. Online payments will not work until it is.");
            String::default()
        });
        let api_key = env::var("SF_GATEWAY_API_KEY").ok().unwrap_or_else(|| {
            error!("🪛️ SF_GATEWAY_API_KEY is not set. Please set it to the API key for your payment provider.");
            String::default()
        });
        let webhook_secret = env::var("SF_GATEWAY_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ SF_GATEWAY_WEBHOOK_SECRET is not set. Payment callbacks cannot be verified and will all be \
                 rejected."
            );
            String::default()
        });
        let success_url = env::var("SF_GATEWAY_SUCCESS_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SF_GATEWAY_SUCCESS_URL is not set. The provider's default page will be used.");
            String::default()
        });
        let cancel_url = env::var("SF_GATEWAY_CANCEL_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SF_GATEWAY_CANCEL_URL is not set. The provider's default page will be used.");
            String::default()
        });
        let currency = env::var("SF_CURRENCY").ok().unwrap_or_else(|| {
            info!("🪛️ SF_CURRENCY is not set. Using {DEFAULT_CURRENCY}.");
            DEFAULT_CURRENCY.to_string()
        });
        Self {
            url,
            api_key: Secret::new(api_key),
            webhook_secret: Secret::new(webhook_secret),
            success_url,
            cancel_url,
            currency,
        }
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The key shared with the identity service for signing and verifying access tokens.
    pub auth_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The access token secret has not been set. I'm using a random value for this session. DO NOT \
             operate on production like this, since no token issued elsewhere will be accepted. 🚨️🚨️🚨️"
        );
        Self { auth_secret: Secret::new(random_secret()) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { auth_secret: Secret::new(secret.into()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret = env::var("SF_AUTH_SECRET")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [SF_AUTH_SECRET]")))?;
        if secret.len() < 16 {
            return Err(ServerError::ConfigurationError(
                "SF_AUTH_SECRET must be at least 16 characters long".to_string(),
            ));
        }
        Ok(Self::new(secret))
    }
}
