mod otp_code;

pub use otp_code::{generate_otp_code, hash_otp_code, is_well_formed, OTP_CODE_LENGTH};

/// A random, url-safe identifier. Used for guest cart sync ids when the client does not provide one.
pub fn random_id(prefix: &str) -> String {
    use rand::{distributions::Alphanumeric, Rng};
    let suffix: String = rand::thread_rng().sample_iter(&Alphanumeric).take(20).map(char::from).collect();
    format!("{prefix}_{suffix}")
}
