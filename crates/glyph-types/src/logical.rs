use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const IMAGE_PREFIX: &str = "image/";
const DOCUMENT_PREFIX: &str = "document/";

/// Application-assigned key for an [`Entry`](crate::Entry).
///
/// Distinct from the ledger [`Pointer`](crate::Pointer): a logical id stays
/// the same across rewrites while its pointer may be replaced. By convention
/// card artwork lives under `image/<n>` and card metadata under
/// `document/<n>`, but any non-empty, whitespace-free string is valid.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalId(String);

impl LogicalId {
    /// Validate and wrap a logical id.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidLogicalId(id));
        }
        Ok(Self(id))
    }

    /// Logical id of the image blob for item `n`.
    pub fn image(n: u64) -> Self {
        Self(format!("{IMAGE_PREFIX}{n}"))
    }

    /// Logical id of the structured-document blob for item `n`.
    pub fn document(n: u64) -> Self {
        Self(format!("{DOCUMENT_PREFIX}{n}"))
    }

    /// For a `document/<n>` id, the `image/<n>` id it embeds.
    pub fn companion_image(&self) -> Option<Self> {
        self.0
            .strip_prefix(DOCUMENT_PREFIX)
            .map(|rest| Self(format!("{IMAGE_PREFIX}{rest}")))
    }

    /// The numeric suffix of conventional ids (`image/7` -> 7).
    pub fn index(&self) -> Option<u64> {
        self.0
            .rsplit_once('/')
            .and_then(|(_, n)| n.parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogicalId({})", self.0)
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LogicalId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LogicalId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LogicalId> for String {
    fn from(id: LogicalId) -> Self {
        id.0
    }
}
