//! Domain core for kindred.
//!
//! Services here own the business rules and talk to persistence only through
//! the [`store::Store`] seam, so the HTTP layer and the tests share one path.

pub mod clock;
pub mod conversation;
pub mod hub;
pub mod identity;
pub mod matching;
pub mod models;
pub mod moderation;
pub mod store;
