//! HTTP boundary for the policy consent verification service.

pub mod server;
