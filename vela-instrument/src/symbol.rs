use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{
    borrow::Borrow,
    fmt::{Display, Formatter},
};

/// Vela representation of a traded pair, normalised to lowercase (eg/ "btc_usdt").
///
/// Used to key market data, orders, and positions in a memory efficient way.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct Symbol(SmolStr);

impl Symbol {
    /// Construct a new [`Symbol`], normalising the input to lowercase.
    pub fn new<S>(input: S) -> Self
    where
        S: AsRef<str>,
    {
        Self(SmolStr::new(input.as_ref().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Symbol {
    fn from(input: &str) -> Self {
        Self::new(input)
    }
}

impl From<String> for Symbol {
    fn from(input: String) -> Self {
        Self::new(input)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
