//! Connection rate limiting using a sliding window per origin.
//!
//! Each origin keeps the timestamps of its recent connection attempts.
//! Entries older than the window are pruned on every check, and an origin
//! that already has the maximum number of attempts inside the window is
//! rejected until the oldest one expires.

mod config;
mod limiter;

pub use config::RateLimitConfig;
pub use limiter::{ConnectionRateLimiter, RateLimiterStats};
