//! Small value types shared across the framework.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseVersionError;

/// Version of a driver or module, `major.minor.patch:build`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl Version {
    /// Create a version with a zero build number.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build: 0,
        }
    }

    /// Set the build number.
    #[must_use]
    pub const fn with_build(mut self, build: u32) -> Self {
        self.build = build;
        self
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}:{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    /// Parses `major[.minor[.patch[:build]]]`. Missing parts are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseVersionError::Empty);
        }

        let (numbers, build) = match s.split_once(':') {
            Some((numbers, build)) => (numbers, Some(build)),
            None => (s, None),
        };

        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| ParseVersionError::InvalidComponent(part.to_string()))
        };

        let mut version = Self::default();
        let mut parts = numbers.split('.');
        version.major = parse(parts.next().unwrap_or_default())?;
        if let Some(minor) = parts.next() {
            version.minor = parse(minor)?;
        }
        if let Some(patch) = parts.next() {
            version.patch = parse(patch)?;
        }
        if let Some(extra) = parts.next() {
            return Err(ParseVersionError::InvalidComponent(extra.to_string()));
        }
        if let Some(build) = build {
            version.build = parse(build)?;
        }
        Ok(version)
    }
}

/// Size of a rectangle, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RectSize {
    pub width: u32,
    pub height: u32,
}

impl RectSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Position relative to the screen origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenPosition {
    pub x: u32,
    pub y: u32,
}

impl ScreenPosition {
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Splits `s` on `c`, dropping empty parts.
#[must_use]
pub fn explode(s: &str, c: char) -> Vec<String> {
    s.split(c)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
