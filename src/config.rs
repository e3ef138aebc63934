//! Options recognized by the overlay and the fixed timing constants

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{BannerError, Result};

/// Delay after `seeked` before re-evaluating, while the scrub position settles
pub const SEEK_SETTLE: Duration = Duration::from_millis(250);

/// Delay after `play` before leaving a pause-forced banner
pub const PLAY_RESUME: Duration = Duration::from_millis(300);

/// Fullscreen transitions report unstable dimensions for a few frames
pub const RESIZE_SETTLE: Duration = Duration::from_millis(60);

/// Length of the close animation on user-initiated close
pub const EXIT_ANIMATION: Duration = Duration::from_millis(300);

/// Width that absolute segment coordinates are authored against
pub const REFERENCE_WIDTH: f64 = 1280.0;

/// How to choose between banners whose windows overlap
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// First banner in load order wins
    #[default]
    InsertionOrder,

    /// Banner whose window opened first wins
    EarliestStart,
}

/// Options accepted when installing the overlay
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Selector of the player shell receiving the offset properties
    pub shell_selector: String,

    /// Selector of the container banner nodes are attached to
    pub host_selector: String,

    /// Persist close/click interactions
    pub enable_cookie_tracking: bool,

    /// Force a banner on screen while playback is paused
    pub show_banners_on_pause: bool,

    pub overlap_policy: OverlapPolicy,

    pub reference_width: f64,

    /// Where to fetch the VAST/VSAT payload from
    pub payload_url: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            shell_selector: "#player-shell".to_string(),
            host_selector: "#lbanner-host".to_string(),
            enable_cookie_tracking: true,
            show_banners_on_pause: false,
            overlap_policy: OverlapPolicy::default(),
            reference_width: REFERENCE_WIDTH,
            payload_url: None,
        }
    }
}

impl Options {
    /// Load options from a JSON file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Options> {
        let content = std::fs::read_to_string(path)?;
        let options: Options = serde_json::from_str(&content)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject options the overlay cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.shell_selector.trim().is_empty() {
            return Err(BannerError::Config("shellSelector is required".to_string()));
        }
        if self.host_selector.trim().is_empty() {
            return Err(BannerError::Config("hostSelector is required".to_string()));
        }
        if !(self.reference_width.is_finite() && self.reference_width > 0.0) {
            return Err(BannerError::Config(format!(
                "referenceWidth must be positive, got {}",
                self.reference_width
            )));
        }
        if let Some(url) = &self.payload_url {
            url::Url::parse(url)?;
        }
        Ok(())
    }
}
