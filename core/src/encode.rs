//! Identifiers and their percent-encoding for URL paths.

use std::borrow::Cow;
use std::fmt;

/// Encode an identifier as a single URL path segment.
///
/// Everything outside `A-Z a-z 0-9 - . _ ~` is percent-encoded, including
/// `/`, so an identifier can never add path segments.
pub fn encode(id: &str) -> Cow<'_, str> {
    urlencoding::encode(id)
}

/// A customer, device, segment or collection identifier.
///
/// Integer ids are accepted and stringified, so `1` and `"1"` address the
/// same customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank means empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The identifier as a single encoded path segment.
    pub fn encoded(&self) -> Cow<'_, str> {
        encode(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(v: &str) -> Self {
        Identifier(v.to_string())
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Identifier(v)
    }
}

impl From<&String> for Identifier {
    fn from(v: &String) -> Self {
        Identifier(v.clone())
    }
}

macro_rules! int_identifier {
    ($($t:ty),*) => {
        $(impl From<$t> for Identifier {
            fn from(v: $t) -> Self {
                Identifier(v.to_string())
            }
        })*
    };
}

int_identifier!(i32, i64, u32, u64, usize);
