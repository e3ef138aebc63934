//! Tracking pixels and persisted interactions
//!
//! Both are best effort: a sink never reports failure to the caller and an
//! absent sink is a silent no-op.

use log::{debug, warn};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BannerError, Result};
use crate::models::{Banner, BannerMetadata, ButtonAction};

/// Emitted when a banner becomes visible
#[derive(Debug, Clone, PartialEq)]
pub struct ImpressionEvent {
    pub banner_id: String,
    pub metadata: BannerMetadata,
}

impl ImpressionEvent {
    pub fn for_banner(banner: &Banner) -> Self {
        ImpressionEvent {
            banner_id: banner.id.clone(),
            metadata: banner.metadata.clone(),
        }
    }
}

/// Emitted when a button on a banner is activated
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionEvent {
    pub banner_id: String,
    pub button_id: String,
    pub action: ButtonAction,
}

pub trait TrackingSink {
    fn impression(&self, event: &ImpressionEvent);

    fn conversion(&self, event: &ConversionEvent);

    fn fire_pixel(&self, url: &str);
}

/// Sink used when no tracking is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TrackingSink for NoopSink {
    fn impression(&self, _event: &ImpressionEvent) {}

    fn conversion(&self, _event: &ConversionEvent) {}

    fn fire_pixel(&self, _url: &str) {}
}

/// Fires tracking pixels as GET requests on the current tokio runtime
#[derive(Debug, Clone)]
pub struct HttpPixelSink {
    client: reqwest::Client,
}

impl HttpPixelSink {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .map_err(BannerError::Http)?;
        Ok(HttpPixelSink { client })
    }
}

impl TrackingSink for HttpPixelSink {
    fn impression(&self, event: &ImpressionEvent) {
        debug!("Impression for banner {}", event.banner_id);
        for url in &event.metadata.impressions {
            self.fire_pixel(url);
        }
    }

    fn conversion(&self, event: &ConversionEvent) {
        debug!(
            "Conversion on banner {} button {} -> {}",
            event.banner_id,
            event.button_id,
            event.action.target()
        );
    }

    fn fire_pixel(&self, url: &str) {
        let url = match url::Url::parse(url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Ignoring malformed tracking URL {}: {}", url, e);
                return;
            }
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available, dropping pixel {}", url);
            return;
        };

        let pixel_id: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        let client = self.client.clone();
        runtime.spawn(async move {
            match client.get(url.clone()).send().await {
                Ok(response) => debug!("[{}] Pixel {} -> {}", pixel_id, url, response.status()),
                Err(e) => debug!("[{}] Pixel {} failed: {}", pixel_id, url, e),
            }
        });
    }
}

/// Key-value persistence of user interactions (closed banners, clicks)
pub trait InteractionStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str);
}

/// Interaction store kept for the lifetime of the process
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl InteractionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}
