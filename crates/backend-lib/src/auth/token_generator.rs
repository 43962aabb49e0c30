// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
/** Secure opaque token generation
Refresh tokens and password-reset tokens are random values with no
embedded meaning; their only property is that they cannot be guessed. */
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use rand::RngCore;

/// Refresh token size in bytes (512 bits of entropy)
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// Password-reset token size in bytes (256 bits of entropy)
pub const RESET_TOKEN_BYTES: usize = 32;

fn random_bytes(bytes: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buffer);
    buffer
}

/** Generate a refresh token: `bytes` random bytes, standard base64
# Arguments
* `bytes` - The size of the random token in bytes */
pub fn generate_refresh_token(bytes: usize) -> String {
    STANDARD.encode(random_bytes(bytes))
}

/** Generate a password-reset token.
URL-safe without padding because it travels as a query parameter in the
reset link. */
pub fn generate_reset_token() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(RESET_TOKEN_BYTES))
}
