//! # Storefront server
//! This crate hosts the HTTP server for the storefront checkout core. It is responsible for:
//! * Authenticating shoppers with the access tokens issued by the identity service.
//! * Exposing the cart, checkout and order APIs of `storefront_engine` over JSON.
//! * Talking to the hosted checkout provider, and receiving its signed payment callbacks.
//! * Expiring abandoned payment sessions in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/products`: The catalog.
//! * `/payments/webhook`: Payment notifications from the provider.
//! * `/api/...`: Everything else, for signed-in users. See [routes](routes/index.html).

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
