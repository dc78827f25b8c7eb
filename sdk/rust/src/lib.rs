//! Client SDK for the signed-request API gateway.

pub mod client;

pub use client::{sign, SignedClient, SignedHeaders};
