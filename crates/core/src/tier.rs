use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Top-level storage tier of the data lake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Raw,
    Staging,
    Processed,
    Archive,
    Metadata,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Raw,
        Tier::Staging,
        Tier::Processed,
        Tier::Archive,
        Tier::Metadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Raw => "raw",
            Tier::Staging => "staging",
            Tier::Processed => "processed",
            Tier::Archive => "archive",
            Tier::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::InvalidTier(s.to_string()))
    }
}
