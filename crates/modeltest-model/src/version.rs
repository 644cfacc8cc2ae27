//! Management model versions

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// `major.minor.micro` version of a subsystem's management model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelVersion {
    major: u32,
    minor: u32,
    micro: u32,
}

impl ModelVersion {
    #[inline]
    #[must_use]
    pub const fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
        }
    }

    #[inline]
    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    #[inline]
    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.minor
    }

    #[inline]
    #[must_use]
    pub const fn micro(&self) -> u32 {
        self.micro
    }
}

impl Display for ModelVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

impl FromStr for ModelVersion {
    type Err = VersionError;

    /// Parses `1`, `1.2` or `1.2.3`; missing parts are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(VersionError::Malformed(s.to_string()));
        }
        let mut numbers = [0_u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| VersionError::Malformed(s.to_string()))?;
        }
        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl TryFrom<String> for ModelVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelVersion> for String {
    fn from(value: ModelVersion) -> Self {
        value.to_string()
    }
}

/// Version parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("malformed model version '{0}' (expected major.minor.micro)")]
    Malformed(String),
}
