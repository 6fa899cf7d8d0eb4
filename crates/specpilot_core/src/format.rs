//! Declared specification formats.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Represent the two specification encodings the engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecFormat {
    Yaml,
    Json,
}

impl SpecFormat {
    /// File extension used when the spec is staged on disk.
    pub fn extension(self) -> &'static str {
        match self {
            SpecFormat::Yaml => "yaml",
            SpecFormat::Json => "json",
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        self.extension()
    }
}

impl fmt::Display for SpecFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a format name is not one of `yaml`, `yml` or `json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFormat(pub String);

impl fmt::Display for UnknownFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown spec format '{}' (expected yaml or json)", self.0)
    }
}

impl std::error::Error for UnknownFormat {}

impl FromStr for SpecFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(SpecFormat::Yaml),
            "json" => Ok(SpecFormat::Json),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}
