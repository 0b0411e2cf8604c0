pub mod article;
pub mod error;
pub mod feed;
mod timestamp;

pub use self::article::{Article, NewArticle};
pub use self::feed::{Feed, RawEntry};
pub use self::timestamp::Timestamp;

/// Define a copyable numeric identity newtype
///
/// Identities are opaque: nothing outside the store should do arithmetic on
/// them, so only conversions and formatting are provided.
#[macro_export]
macro_rules! define_id_type {
    (
        $(#[$outer:meta])*
        struct $t:ident
    ) => {
        $(#[$outer])*
        #[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
        #[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
        #[derive(Copy, Clone, Hash, Debug, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $t(u64);

        impl $t {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }

            pub const fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $t {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }

        impl From<$t> for u64 {
            fn from(v: $t) -> Self {
                v.0
            }
        }

        impl std::fmt::Display for $t {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $t {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

define_id_type!(
    /// Identity of a registered feed
    struct FeedId
);

define_id_type!(
    /// Identity of a stored article, assigned by the store
    struct ArticleId
);
