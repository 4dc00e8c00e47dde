//! Credential material and the strategies that turn it into access tokens.

pub mod secret;
pub mod strategy;

pub use secret::*;
pub use strategy::*;
