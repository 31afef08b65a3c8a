//! Adapters implementing the domain ports.
//!
//! `sqlite` is the authoritative store; `cache` plays the hot-counter
//! role (metrics, sketches, short-TTL idempotency, locks); `http`
//! reaches the external asset service.

pub mod cache;
pub mod http;
pub mod sqlite;
