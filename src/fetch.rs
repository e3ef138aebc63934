//! Ad payload loading with at most one request in flight
//!
//! Starting a fetch aborts the previous one. Every outcome is tagged with the
//! generation that started it so a response that raced past an abort can
//! still be recognised as stale and dropped.

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::BannerSet;
use crate::parser;
use crate::unwrap;

/// Result of one payload fetch
#[derive(Debug)]
pub struct FetchOutcome {
    pub generation: u64,
    pub source: String,
    pub result: Result<BannerSet>,
}

/// Fetch, unwrap and parse a VAST/VSAT payload into banners
pub async fn load_banners(source: &str) -> Result<BannerSet> {
    let xml = unwrap::fetch_vast_content_async(source).await?;
    let vast = unwrap::unwrap_vast_async(&xml).await?;
    Ok(parser::collect_banners(vast))
}

#[derive(Debug)]
pub struct PayloadFetcher {
    generation: u64,
    in_flight: Option<JoinHandle<()>>,
    outcomes: mpsc::UnboundedSender<FetchOutcome>,
}

impl PayloadFetcher {
    /// Create a fetcher and the channel its outcomes arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FetchOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            PayloadFetcher {
                generation: 0,
                in_flight: None,
                outcomes: tx,
            },
            rx,
        )
    }

    /// Start fetching `source`, superseding any fetch in flight
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, source: &str) -> u64 {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let source = source.to_string();
        let outcomes = self.outcomes.clone();
        info!("Fetching ad payload {} (generation {})", source, generation);

        self.in_flight = Some(tokio::spawn(async move {
            let result = load_banners(&source).await;
            // Receiver gone means the driver shut down
            let _ = outcomes.send(FetchOutcome {
                generation,
                source,
                result,
            });
        }));
        generation
    }

    /// Abort the fetch in flight, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            if !handle.is_finished() {
                debug!("Aborting ad payload fetch (generation {})", self.generation);
            }
            handle.abort();
        }
    }

    /// Whether `outcome` belongs to the latest fetch
    pub fn is_current(&self, outcome: &FetchOutcome) -> bool {
        outcome.generation == self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for PayloadFetcher {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn payload(banner_id: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"<VAST version="4.0"><Ad id="a"><InLine><Extensions><Extension type="VSAT">
                <LBanner id="{banner_id}"><Timing start="0" end="5"/></LBanner>
            </Extension></Extensions></InLine></Ad></VAST>"#
        )
        .unwrap();
        file
    }

    #[tokio::test]
    async fn test_newer_fetch_supersedes_older() {
        let first = payload("first");
        let second = payload("second");
        let (mut fetcher, mut outcomes) = PayloadFetcher::new();

        fetcher.start(&first.path().display().to_string());
        let latest = fetcher.start(&second.path().display().to_string());
        assert_eq!(latest, 2);

        loop {
            let outcome = outcomes.recv().await.unwrap();
            if !fetcher.is_current(&outcome) {
                continue;
            }
            let banners = outcome.result.unwrap();
            assert!(banners.contains("second"));
            assert!(!banners.contains("first"));
            break;
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_reports_error() {
        let (mut fetcher, mut outcomes) = PayloadFetcher::new();
        fetcher.start("/no/such/payload.xml");
        let outcome = outcomes.recv().await.unwrap();
        assert!(fetcher.is_current(&outcome));
        assert!(outcome.result.is_err());
    }
}
