//! How long a snippet stays visible.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned for a day count outside the permitted set.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("lifetime must be 1, 7 or 365 days (got {0})")]
pub struct LifetimeError(pub i32);

/// Permitted snippet lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum SnippetLifetime {
    Day,
    Week,
    Year,
}

impl SnippetLifetime {
    /// Lifetime pre-selected on the create form.
    pub const DEFAULT: Self = Self::Year;

    /// Number of days the snippet stays visible.
    #[must_use]
    pub const fn days(self) -> i32 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
            Self::Year => 365,
        }
    }
}

impl TryFrom<i32> for SnippetLifetime {
    type Error = LifetimeError;

    fn try_from(days: i32) -> Result<Self, Self::Error> {
        match days {
            1 => Ok(Self::Day),
            7 => Ok(Self::Week),
            365 => Ok(Self::Year),
            other => Err(LifetimeError(other)),
        }
    }
}

impl From<SnippetLifetime> for i32 {
    fn from(lifetime: SnippetLifetime) -> Self {
        lifetime.days()
    }
}

impl fmt::Display for SnippetLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} days", self.days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_permitted_day_counts_convert() {
        assert_eq!(SnippetLifetime::try_from(1), Ok(SnippetLifetime::Day));
        assert_eq!(SnippetLifetime::try_from(7), Ok(SnippetLifetime::Week));
        assert_eq!(SnippetLifetime::try_from(365), Ok(SnippetLifetime::Year));
        assert_eq!(SnippetLifetime::try_from(30), Err(LifetimeError(30)));
        assert_eq!(SnippetLifetime::try_from(0), Err(LifetimeError(0)));
    }

    #[test]
    fn test_default_is_one_year() {
        assert_eq!(SnippetLifetime::DEFAULT.days(), 365);
    }
}
