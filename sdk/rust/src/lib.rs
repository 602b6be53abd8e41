//! Caller-side client for the forwarding proxy.

pub mod client;

pub use client::{ProxyCall, ProxyClient, ProxyReply};
