use std::env::{self, VarError};

/// Variables whose values are safe to echo back.
const PUBLIC_ENVS: [&str; 13] = [
    "RUST_LOG",
    "SF_HOST",
    "SF_PORT",
    "SF_DATABASE_URL",
    "SF_OTP_TTL_SECS",
    "SF_OTP_MAX_ATTEMPTS",
    "SF_LOG_OTP_CODES",
    "SF_CART_MERGE_POLICY",
    "SF_PAYMENT_SESSION_TIMEOUT_MINS",
    "SF_GATEWAY_URL",
    "SF_GATEWAY_SUCCESS_URL",
    "SF_GATEWAY_CANCEL_URL",
    "SF_CURRENCY",
];

/// Only whether these are set is reported.
const SECRET_ENVS: [&str; 4] = ["SF_AUTH_SECRET", "SF_OTP_PEPPER", "SF_GATEWAY_API_KEY", "SF_GATEWAY_WEBHOOK_SECRET"];

/// The server has no real CLI. Any argument at all prints the help text and the current configuration, and returns
/// true so that `main` exits instead of starting the server.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().len() > 1;
    if has_cli_args {
        println!("\n{}\n", include_str!("./cli-help.txt"));
        println!("Current environment:");
        PUBLIC_ENVS.iter().for_each(|&name| println!("  {name:<35} {}", describe(name, false)));
        SECRET_ENVS.iter().for_each(|&name| println!("  {name:<35} {}", describe(name, true)));
    }
    has_cli_args
}

fn describe(name: &str, secret: bool) -> String {
    match env::var(name) {
        Ok(s) if s.is_empty() => "Set, but empty".into(),
        Ok(_) if secret => "Set (hidden)".into(),
        Ok(s) => s,
        Err(VarError::NotPresent) => "Not set".into(),
        Err(VarError::NotUnicode(_)) if secret => "Invalid value (not unicode)".into(),
        Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
    }
}
