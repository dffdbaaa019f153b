use rand::{Rng, RngCore};

/// Raw one-time tokens carry 256 bits of entropy.
pub const RAW_TOKEN_BYTES: usize = 32;

pub const SLUG_LEN: usize = 7;

/// Lowercase alphanumerics without the look-alikes 0/o, 1/i/l.
const SLUG_ALPHABET: &[u8] = b"23456789abcdefghjkmnpqrstuvwxyz";

/// Generate a raw one-time token, hex encoded (64 chars).
pub fn generate_raw_token() -> String {
    let mut bytes = [0u8; RAW_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Cheap shape check so garbage input never reaches the hash scan.
pub fn is_well_formed_token(raw: &str) -> bool {
    raw.len() == RAW_TOKEN_BYTES * 2 && raw.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Generate a short human-shareable message slug.
/// Uniqueness is enforced by storage, not here.
pub fn generate_slug() -> String {
    let mut rng = rand::rng();
    (0..SLUG_LEN)
        .map(|_| SLUG_ALPHABET[rng.random_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}
