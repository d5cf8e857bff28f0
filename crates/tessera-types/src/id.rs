use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque voter handle supplied by the calling collaborator.
///
/// 1 to 64 characters from `[A-Za-z0-9_.-]`. The engine never interprets it
/// beyond equality and ordering.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VoterId(String);

impl VoterId {
    pub const MAX_LEN: usize = 64;

    pub fn new(id: impl Into<String>) -> Result<Self, TypesError> {
        let id = id.into();
        if id.is_empty() || id.len() > Self::MAX_LEN {
            return Err(TypesError::InvalidVoterId(format!(
                "length {} outside 1..={}",
                id.len(),
                Self::MAX_LEN
            )));
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(TypesError::InvalidVoterId(format!("illegal character {:?}", c)));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VoterId {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VoterId> for String {
    fn from(value: VoterId) -> Self {
        value.0
    }
}

impl FromStr for VoterId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for VoterId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoterId({})", self.0)
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $inner:ty, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            pub const fn get(&self) -> $inner {
                self.0
            }

            /// The id following this one.
            pub fn next(&self) -> Self {
                Self(self.0.saturating_add(1))
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s.strip_prefix($prefix).unwrap_or(s);
                digits
                    .parse::<$inner>()
                    .map(Self)
                    .map_err(|e| TypesError::InvalidId(format!("{}: {}", s, e)))
            }
        }
    };
}

numeric_id!(
    /// Sequential proposal identifier, assigned by the proposal store.
    ProposalId,
    u64,
    "P-"
);

numeric_id!(
    /// Index of an option within its proposal.
    OptionId,
    u32,
    "O-"
);

numeric_id!(
    /// Handle for an amount of stake locked by the ledger.
    LockId,
    u64,
    "L-"
);
