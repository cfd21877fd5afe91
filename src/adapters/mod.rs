//! Adapters: concrete implementations of ports plus the HTTP surface.

pub mod ai;
pub mod http;
