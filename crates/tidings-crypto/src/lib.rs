/// Tidings Crypto Library
///
/// Server-side secrets handling:
/// - Argon2id hashing and verification for access passwords and one-time tokens
/// - Generation of raw one-time tokens and message slugs
///
/// Raw secrets never reach storage; only their PHC-encoded hashes do.

pub mod hasher;
pub mod tokens;

pub use hasher::{CredentialHasher, HashedSecret};
