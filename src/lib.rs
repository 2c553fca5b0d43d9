// Shared components
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Domain layer
pub mod broadcast;
pub mod connection_manager;
pub mod interest;
pub mod presence;
pub mod ratelimit;
pub mod session;
pub mod store;

// Application layer
pub mod api;
pub mod server;
pub mod tasks;
pub mod websocket;
