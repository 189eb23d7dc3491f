//! Upstream API integration: wire types, client, cache keys.

pub mod api_types;
pub mod cache;
pub mod client;
