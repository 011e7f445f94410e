//! Content item identifiers and declared sources.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the external content item artifacts are generated for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Declared source type of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Uploaded to the site or hosted directly as a media file
    Direct,
    /// Third-party player embed
    Embed,
    #[default]
    Unknown,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Direct => "direct",
            SourceType::Embed => "embed",
            SourceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "self_hosted" | "self-hosted" | "upload" => Ok(SourceType::Direct),
            "embed" => Ok(SourceType::Embed),
            "unknown" | "" => Ok(SourceType::Unknown),
            other => Err(format!("unknown source type: {other}")),
        }
    }
}

/// What a content item says about where its video lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSource {
    pub source_type: SourceType,
    pub url: String,
}

impl ContentSource {
    pub fn new(source_type: SourceType, url: impl Into<String>) -> Self {
        Self {
            source_type,
            url: url.into(),
        }
    }

    pub fn direct(url: impl Into<String>) -> Self {
        Self::new(SourceType::Direct, url)
    }
}
