//! HTTP surface of Tidings: password-protected greeting cards with
//! one-time magic links.

pub mod artifacts;
pub mod auth;
pub mod cloudinary;
pub mod compose;
pub mod error;
pub mod gate;
pub mod messages;
pub mod router;
pub mod session;
pub mod state;
pub mod tokens;
pub mod views;

pub use router::router;
pub use state::{AppState, AppStateInner, Settings};
