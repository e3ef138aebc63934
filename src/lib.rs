//! L-banner overlays for video players, driven by VAST/VSAT payloads
//!
//! Payloads are parsed into a [`models::BannerSet`], the [`controller::Controller`]
//! decides from player events which banner is visible, and the
//! [`render::RenderAdapter`] places its segments around the shrunken video
//! using rules from [`geometry`].

pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod geometry;
pub mod models;
pub mod parser;
pub mod render;
pub mod runtime;
pub mod simulate;
pub mod timer;
pub mod tracking;
pub mod unwrap;

pub mod async_api {
    use crate::error::Result;
    use crate::models::{BannerSet, VastDocument};

    pub async fn parse_banners(xml: &str) -> Result<BannerSet> {
        // Parsing is CPU-bound, so we can just wrap the sync version
        crate::parser::parse_banners(xml)
    }

    pub async fn unwrap_vast(xml_content: &str) -> Result<VastDocument> {
        crate::unwrap::unwrap_vast_async(xml_content).await
    }

    pub async fn load_banners(url_or_path: &str) -> Result<BannerSet> {
        crate::fetch::load_banners(url_or_path).await
    }
}
