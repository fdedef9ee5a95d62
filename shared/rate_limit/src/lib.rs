//! Shared Rate Limiting Library
//!
//! This crate provides rate limiting functionality shared across services,
//! including:
//!
//! - IP-based rate limiting for authentication endpoints
//! - User-based rate limiting for authenticated endpoints
//! - Account lockout after consecutive failed login attempts
//! - Progressive delays for failed attempts
//! - Redis backend for distributed rate limiting (with in-memory fallback)
//!
//! # Example
//!
//! ```rust,ignore
//! use shared_rate_limit::{RateLimitConfig, RateLimitState, RateLimitEndpoint, RateLimitLayer};
//!
//! // Create rate limit state from configuration
//! let config = RateLimitConfig::default();
//! let state = RateLimitState::from_config(config).await;
//!
//! // Apply rate limiting to a specific route
//! let app = Router::new()
//!     .route("/api/v1/auth/login", post(login))
//!     .layer(RateLimitLayer::new(state.clone(), RateLimitEndpoint::Login));
//! ```
//!
//! # Account Lockout
//!
//! ```rust,ignore
//! use shared_rate_limit::AccountLockout;
//!
//! let lockout = AccountLockout::new(rate_limiter, 10, 3600);
//!
//! // Check if account is locked
//! let status = lockout.check_lockout(user_id).await?;
//! if status.is_locked {
//!     return Err(AccountLocked { remaining: status.remaining_seconds });
//! }
//!
//! // Record failed attempt
//! let status = lockout.record_failed_attempt(user_id).await?;
//! if let Some(delay) = status.delay_ms {
//!     tokio::time::sleep(Duration::from_millis(delay)).await;
//! }
//!
//! // On successful login
//! lockout.record_success(user_id).await?;
//! ```

pub mod config;
pub mod limiter;
pub mod lockout;
pub mod memory_limiter;
pub mod middleware;
pub mod redis_limiter;

// Re-export main types
pub use config::{EndpointRules, RateLimitConfig, RateLimitRule};
pub use limiter::{KeyGenerator, RateLimitError, RateLimitResult, RateLimiter};
pub use lockout::{AccountLockout, LockoutStatus};
pub use memory_limiter::InMemoryRateLimiter;
pub use middleware::{
    RateLimitEndpoint, RateLimitExt, RateLimitLayer, RateLimitMiddleware, RateLimitState,
    SharedRateLimiter,
};
pub use redis_limiter::RedisRateLimiter;
