use serde::{Deserialize, Serialize};
use std::fmt;

/// Social platforms a video can be published to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Facebook,
    Instagram,
    TikTok,
}

impl Platform {
    /// Every supported platform, in a stable order
    pub const ALL: [Platform; 4] = [
        Platform::YouTube,
        Platform::Facebook,
        Platform::Instagram,
        Platform::TikTok,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::TikTok => "tiktok",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "youtube" => Ok(Self::YouTube),
            "facebook" => Ok(Self::Facebook),
            "instagram" => Ok(Self::Instagram),
            "tiktok" => Ok(Self::TikTok),
            _ => Err(format!("Invalid platform: {s}")),
        }
    }
}
