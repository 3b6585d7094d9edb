//! Headless driver configuration.

use rd_core::{ScreenPosition, Version};
use serde::{Deserialize, Serialize};

/// Configuration of a headless driver.
///
/// Pass it as user data when requesting the driver capability from the
/// headless module; without it the defaults apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlessDriverConfig {
    /// Version reported by the driver.
    pub version: Version,
    /// Maximum number of open surfaces. Creating more fails.
    pub max_surfaces: Option<usize>,
    /// Where new surfaces are placed.
    pub origin: ScreenPosition,
}

impl Default for HeadlessDriverConfig {
    fn default() -> Self {
        Self {
            version: Version::new(1, 0, 0),
            max_surfaces: None,
            origin: ScreenPosition::default(),
        }
    }
}

impl HeadlessDriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_max_surfaces(mut self, max_surfaces: usize) -> Self {
        self.max_surfaces = Some(max_surfaces);
        self
    }

    pub fn with_origin(mut self, origin: ScreenPosition) -> Self {
        self.origin = origin;
        self
    }
}
