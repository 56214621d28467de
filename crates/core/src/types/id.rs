//! Newtype IDs for type-safe entity references.
//!
//! Ids are positive `i32` values assigned by `SERIAL` columns. Zero is
//! reserved as the "unset" value, which is how an absent
//! `authenticatedUserId` reads back from the session.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Default` (unset)
/// - `new()`, `as_i32()`, `is_set()` and `parse_positive()`
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use snippetbox_core::define_id;
/// define_id!(UserId);
/// define_id!(SnippetId);
///
/// assert_eq!(SnippetId::parse_positive("42"), Some(SnippetId::new(42)));
/// assert_eq!(SnippetId::parse_positive("0"), None);
/// assert!(!UserId::default().is_set());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }

            /// Whether this id refers to a row (`> 0`).
            #[must_use]
            pub const fn is_set(&self) -> bool {
                self.0 > 0
            }

            /// Parse a path segment into an id, rejecting anything that
            /// is not a positive integer.
            #[must_use]
            pub fn parse_positive(segment: &str) -> Option<Self> {
                segment
                    .parse::<i32>()
                    .ok()
                    .filter(|id| *id > 0)
                    .map(Self)
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_id!(UserId);
define_id!(SnippetId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positive_rejects_non_positive() {
        assert_eq!(SnippetId::parse_positive("7"), Some(SnippetId::new(7)));
        assert_eq!(SnippetId::parse_positive("0"), None);
        assert_eq!(SnippetId::parse_positive("-3"), None);
        assert_eq!(SnippetId::parse_positive("abc"), None);
        assert_eq!(SnippetId::parse_positive(""), None);
        assert_eq!(SnippetId::parse_positive("1.5"), None);
    }

    #[test]
    fn test_default_is_unset() {
        assert!(!UserId::default().is_set());
        assert!(UserId::new(1).is_set());
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&UserId::new(12)).unwrap();
        assert_eq!(json, "12");
        let back: UserId = serde_json::from_str("12").unwrap();
        assert_eq!(back, UserId::new(12));
    }
}
