//! Newtype IDs for type-safe entity references.
//!
//! Catalog entities carry numeric IDs assigned by the catalog owner
//! ([`define_id!`]). Records created on the device (addresses, favorites)
//! carry opaque string IDs minted from UUIDs ([`define_key!`]), so an ID is
//! never reused after its record is removed.

/// Macro to define a numeric, catalog-assigned ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i32()`
/// - `From<i32>` and `Into<i32>` implementations
///
/// # Example
///
/// ```rust
/// # use farmacia_core::define_id;
/// define_id!(SkuId);
/// define_id!(CategoryId);
///
/// let sku = SkuId::new(1);
/// let category = CategoryId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: SkuId = category;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
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
    };
}

/// Macro to define an opaque string ID for device-created records.
///
/// Records persisted by older sessions may carry arbitrary strings (e.g.
/// `"1"`), so the wrapper accepts any string on deserialization; new IDs are
/// minted with `generate()`.
///
/// # Example
///
/// ```rust
/// # use farmacia_core::define_key;
/// define_key!(NoteId);
///
/// let a = NoteId::generate();
/// let b = NoteId::generate();
/// assert_ne!(a, b);
/// assert_eq!(NoteId::from("legacy-1").as_str(), "legacy-1");
/// ```
#[macro_export]
macro_rules! define_key {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mint a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(::uuid::Uuid::new_v4().to_string())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Catalog-assigned
define_id!(ProductId);

// Device-created
define_key!(AddressId);
define_key!(FavoriteId);
define_key!(PurchaseId);

/// Identifier of an account at the remote identity provider.
///
/// Opaque to the storefront; only compared and echoed back to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RemoteUserId(String);

impl RemoteUserId {
    /// Wrap a provider-issued user id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RemoteUserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_roundtrips_as_number() {
        let id = ProductId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        let parsed: ProductId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let a = AddressId::generate();
        let b = AddressId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_legacy_keys_deserialize() {
        let id: FavoriteId = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(id.as_str(), "3");
        assert_eq!(id.to_string(), "3");
    }

    #[test]
    fn test_remote_user_id_display() {
        let id = RemoteUserId::new("u1");
        assert_eq!(format!("{id}"), "u1");
    }
}
