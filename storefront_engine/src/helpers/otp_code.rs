use blake2::{Blake2b512, Digest};
use rand::Rng;

pub const OTP_CODE_LENGTH: usize = 6;
const OTP_HASH_DOMAIN: &[u8] = b"storefront.otp.v1";

/// Generates a fresh numeric one-time password, zero-padded to [`OTP_CODE_LENGTH`] digits.
pub fn generate_otp_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}

/// Hashes a one-time password for storage. The plaintext code is never persisted.
///
/// The hash is keyed with the server pepper (length-prefixed, so key and code can't be confused), meaning a leaked
/// table cannot be brute-forced over the 10^6 code space without the server secret.
pub fn hash_otp_code(code: &str, pepper: &[u8]) -> String {
    let hash = Blake2b512::new()
        .chain_update(OTP_HASH_DOMAIN)
        .chain_update((pepper.len() as u64).to_le_bytes())
        .chain_update(pepper)
        .chain_update(code.trim().as_bytes())
        .finalize();
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Cheap shape check so obviously malformed input never reaches the database.
pub fn is_well_formed(code: &str) -> bool {
    let code = code.trim();
    code.len() == OTP_CODE_LENGTH && code.chars().all(|c| c.is_ascii_digit())
}
