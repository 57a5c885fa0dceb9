//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations for the session core:
//! - Identity toolkit REST client (password sign-in, reset links, token refresh)
//! - Remember-me credential persistence

pub mod credential_store;
pub mod identity_toolkit;
