//! Newtype IDs for type-safe entity references.
//!
//! Webflow identifies everything with opaque hex strings. Use the
//! `define_id!` macro to create wrappers that prevent accidentally passing a
//! product id where a variant id is expected.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `Default`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use ticket_ledger_core::define_id;
/// define_id!(ShowId);
/// define_id!(SeatId);
///
/// let show = ShowId::new("63ef74b5f1e5b8057d54abfd");
/// let seat = SeatId::new("63ef74b5f1e5b8057d54abfd");
///
/// // These are different types, so this won't compile:
/// // let _: ShowId = seat;
/// assert_eq!(show.as_str(), seat.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Default,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from anything string-like.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper, returning the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Webflow entity IDs
define_id!(SiteId);
define_id!(OrderId);
define_id!(ProductId);
define_id!(VariantId);
define_id!(CollectionId);
define_id!(ItemId);
