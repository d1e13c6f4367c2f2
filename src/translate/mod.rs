//! Shapes exchanged with the client and with the two upstream providers.
//!
//! The client always speaks the relay shape ([`relay_types`]). Requests are
//! mapped to the selected provider's shape and responses are mapped back.
//! All translation functions are pure (no I/O).

pub mod anthropic_types;
pub mod openai_types;
pub mod relay_types;
pub mod request;
pub mod response;
