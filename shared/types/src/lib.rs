//! Common value types shared across the identity and reciprocal services.

pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;

use serde::{Deserialize, Serialize};

/// Money as minor currency units (cents) to avoid floating point drift.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Applies a whole-percent discount, rounding the discount amount toward zero.
    pub fn apply_discount_percent(self, percent: u8) -> Money {
        let percent = percent.min(100) as i64;
        Money(self.0 - (self.0 * percent) / 100)
    }
}

/// ISO-4217 currency code, normalized to uppercase at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency(pub String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Self {
        Currency(code.into().to_uppercase())
    }
}

/// Newtype wrapper distinguishing a tenant id from other UUIDs at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Offset/limit pagination used by repository list operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self { offset: 0, limit: 50 }
    }
}
