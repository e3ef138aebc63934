//! Tokio event loop around a [`Controller`]
//!
//! The driver maps tokio's clock onto the controller's scheduler, feeds it
//! player events and user actions from a channel, and merges ad payloads as
//! the [`PayloadFetcher`] delivers them. It runs on the current task; the
//! controller itself is never shared across threads.

use log::{debug, error, warn};
use std::future::pending;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::controller::{Controller, PlayerEvent};
use crate::fetch::{FetchOutcome, PayloadFetcher};
use crate::render::RenderTarget;

/// Input accepted by the driver
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Player(PlayerEvent),
    /// User pressed the close button
    Close,
    /// User pressed a banner button
    Activate(String),
    /// Fetch a new ad payload from a file path or URL
    Reload(String),
    Shutdown,
}

impl From<PlayerEvent> for Command {
    fn from(event: PlayerEvent) -> Self {
        Command::Player(event)
    }
}

enum Wake {
    Command(Option<Command>),
    Fetched(FetchOutcome),
    Timer,
}

pub struct Driver<R: RenderTarget> {
    controller: Controller<R>,
    fetcher: PayloadFetcher,
    outcomes: mpsc::UnboundedReceiver<FetchOutcome>,
    started: Instant,
}

impl<R: RenderTarget> Driver<R> {
    pub fn new(controller: Controller<R>) -> Self {
        let (fetcher, outcomes) = PayloadFetcher::new();
        Driver {
            controller,
            fetcher,
            outcomes,
            started: Instant::now(),
        }
    }

    /// Run until `Shutdown` arrives or every sender is dropped
    ///
    /// Fetches `payload_url` first when the options name one. Returns the
    /// controller so the caller can inspect the final state.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Controller<R> {
        if let Some(url) = self.controller.options().payload_url.clone() {
            self.fetcher.start(&url);
        }

        loop {
            let deadline = self.controller.next_deadline().map(|d| self.started + d);
            let wake = tokio::select! {
                command = commands.recv() => Wake::Command(command),
                Some(outcome) = self.outcomes.recv() => Wake::Fetched(outcome),
                _ = sleep_until_deadline(deadline) => Wake::Timer,
            };

            // Timers due before this wake-up fire before it is handled
            self.controller.advance_to(self.started.elapsed());

            match wake {
                Wake::Command(None) | Wake::Command(Some(Command::Shutdown)) => break,
                Wake::Command(Some(command)) => self.apply(command),
                Wake::Fetched(outcome) => self.on_fetched(outcome),
                Wake::Timer => (),
            }
        }

        self.fetcher.cancel();
        debug!("Driver stopped");
        self.controller
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Player(event) => self.controller.handle(event),
            Command::Close => {
                self.controller.close();
            }
            Command::Activate(button) => {
                if self.controller.activate(&button).is_none() {
                    warn!("No visible button {}", button);
                }
            }
            Command::Reload(source) => {
                self.fetcher.start(&source);
            }
            Command::Shutdown => (),
        }
    }

    fn on_fetched(&mut self, outcome: FetchOutcome) {
        if !self.fetcher.is_current(&outcome) {
            debug!(
                "Dropping stale payload from {} (generation {}, current {})",
                outcome.source,
                outcome.generation,
                self.fetcher.generation()
            );
            return;
        }
        match outcome.result {
            Ok(banners) => self.controller.load(banners),
            Err(e) => error!("Failed to load ad payload from {}: {}", outcome.source, e),
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
