//! Banner lifecycle state machine
//!
//! The [`Controller`] observes the player (time updates, seeks, pause/play,
//! viewport changes) and decides which banner, if any, is on screen. It never
//! reads a clock: delayed work goes through its [`Scheduler`] and runs when
//! the owner calls [`Controller::advance_to`].

use log::{debug, info, warn};
use std::time::Duration;

use crate::config::{Options, EXIT_ANIMATION, PLAY_RESUME, RESIZE_SETTLE, SEEK_SETTLE};
use crate::error::{BannerError, Result};
use crate::models::{Banner, BannerSet, ButtonAction, Buttons};
use crate::render::{RenderAdapter, RenderTarget};
use crate::timer::{Scheduler, TimerHandle};
use crate::tracking::{ConversionEvent, ImpressionEvent, InteractionStore, MemoryStore, NoopSink, TrackingSink};

/// Everything the player reports
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    /// Periodic playback position, in seconds
    TimeUpdate(f64),
    Seeking,
    Seeked(f64),
    Pause(f64),
    Play(f64),
    /// Any of the resize/fullscreen variants fired
    ViewportChanged,
}

/// Visible state as seen from outside
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Showing(String),
    Seeking,
    PauseForced(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    /// Banner selected by the last evaluation or pause
    pub current: Option<String>,
    pub paused: bool,
    pub seeking: bool,
    pub pause_banner_active: bool,
    /// The user closed `current`; it stays hidden until the selection changes
    pub dismissed: bool,
    pub last_shown: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    SeekSettled { generation: u64 },
    PlayResumed,
    ResizeSettled,
    ExitFinished,
}

pub struct Controller<R: RenderTarget> {
    options: Options,
    banners: BannerSet,
    renderer: RenderAdapter<R>,
    tracking: Box<dyn TrackingSink>,
    store: Box<dyn InteractionStore>,
    scheduler: Scheduler<Task>,
    state: ControllerState,
    playhead: f64,
    seek_generation: u64,
    seek_timer: Option<TimerHandle>,
    resume_timer: Option<TimerHandle>,
    resize_timer: Option<TimerHandle>,
    exit_timer: Option<TimerHandle>,
}

impl<R: RenderTarget> std::fmt::Debug for Controller<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("banners", &self.banners.len())
            .field("state", &self.state)
            .field("playhead", &self.playhead)
            .field("now", &self.scheduler.now())
            .finish()
    }
}

impl<R: RenderTarget> Controller<R> {
    /// Install the overlay on `target`
    ///
    /// Fails when the options are unusable, the shell or host cannot be
    /// found, or there is nothing to show.
    pub fn install(options: Options, banners: BannerSet, mut target: R) -> Result<Self> {
        options.validate()?;
        if banners.is_empty() {
            return Err(BannerError::NoBanners);
        }
        if !target.locate(&options.shell_selector, &options.host_selector) {
            return Err(BannerError::Config(format!(
                "player shell {} or banner host {} not found",
                options.shell_selector, options.host_selector
            )));
        }

        info!("Installed L-banner overlay with {} banner(s)", banners.len());
        let reference_width = options.reference_width;
        Ok(Controller {
            options,
            banners,
            renderer: RenderAdapter::new(target, reference_width),
            tracking: Box::new(NoopSink),
            store: Box::new(MemoryStore::new()),
            scheduler: Scheduler::new(),
            state: ControllerState::default(),
            playhead: 0.0,
            seek_generation: 0,
            seek_timer: None,
            resume_timer: None,
            resize_timer: None,
            exit_timer: None,
        })
    }

    pub fn with_tracking(mut self, sink: Box<dyn TrackingSink>) -> Self {
        self.tracking = sink;
        self
    }

    pub fn with_store(mut self, store: Box<dyn InteractionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn banners(&self) -> &BannerSet {
        &self.banners
    }

    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    pub fn renderer(&self) -> &RenderAdapter<R> {
        &self.renderer
    }

    pub fn target(&self) -> &R {
        self.renderer.target()
    }

    pub fn target_mut(&mut self) -> &mut R {
        self.renderer.target_mut()
    }

    pub fn store(&self) -> &dyn InteractionStore {
        self.store.as_ref()
    }

    /// Current scheduler time
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// When the next delayed transition is due, if any
    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    pub fn phase(&self) -> Phase {
        if self.state.seeking {
            return Phase::Seeking;
        }
        match (&self.state.current, self.renderer.rendered_banner()) {
            (Some(current), Some(rendered)) if current == rendered => {
                if self.state.pause_banner_active {
                    Phase::PauseForced(current.clone())
                } else {
                    Phase::Showing(current.clone())
                }
            }
            _ => Phase::Idle,
        }
    }

    pub fn handle(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::TimeUpdate(t) => self.on_time_update(t),
            PlayerEvent::Seeking => self.on_seeking(),
            PlayerEvent::Seeked(t) => self.on_seeked(t),
            PlayerEvent::Pause(t) => self.on_pause(t),
            PlayerEvent::Play(t) => self.on_play(t),
            PlayerEvent::ViewportChanged => self.on_viewport_changed(),
        }
    }

    /// Run every delayed transition due at or before `now`
    pub fn advance_to(&mut self, now: Duration) {
        while let Some((handle, task)) = self.scheduler.pop_due(now) {
            for slot in [
                &mut self.seek_timer,
                &mut self.resume_timer,
                &mut self.resize_timer,
                &mut self.exit_timer,
            ] {
                if *slot == Some(handle) {
                    *slot = None;
                }
            }
            self.run(task);
        }
    }

    /// Advance the scheduler clock by `delta`
    pub fn advance_by(&mut self, delta: Duration) {
        let now = self.scheduler.now() + delta;
        self.advance_to(now);
    }

    fn run(&mut self, task: Task) {
        match task {
            Task::SeekSettled { generation } => {
                if generation != self.seek_generation {
                    debug!("Dropping stale seek settle (generation {})", generation);
                    return;
                }
                self.state.seeking = false;
                if !self.state.paused {
                    self.state.pause_banner_active = false;
                    self.cancel_timer(TimerSlot::Resume);
                    self.evaluate();
                }
            }
            Task::PlayResumed => {
                if self.state.paused {
                    return;
                }
                self.state.pause_banner_active = false;
                if self.state.seeking {
                    // Seek suppression applies again; the settle timer re-evaluates
                    self.hide();
                    return;
                }
                self.evaluate();
            }
            Task::ResizeSettled => self.renderer.relayout(),
            Task::ExitFinished => self.renderer.finish_exit(),
        }
    }

    fn on_time_update(&mut self, t: f64) {
        self.playhead = t;
        if self.state.seeking || self.state.paused || self.state.pause_banner_active {
            return;
        }
        self.evaluate();
    }

    fn on_seeking(&mut self) {
        self.cancel_timer(TimerSlot::Seek);
        self.cancel_timer(TimerSlot::Resume);
        self.cancel_timer(TimerSlot::Exit);
        self.seek_generation += 1;

        self.state.seeking = true;
        self.state.pause_banner_active = false;
        self.state.current = None;
        self.state.dismissed = false;
        self.renderer.teardown(true);
        debug!("Seek started, overlay suspended");
    }

    fn on_seeked(&mut self, t: f64) {
        self.playhead = t;
        self.cancel_timer(TimerSlot::Seek);
        let generation = self.seek_generation;
        self.seek_timer = Some(self.scheduler.schedule(SEEK_SETTLE, Task::SeekSettled { generation }));
        debug!("Seek ended at {:.3}s, settling", t);
    }

    fn on_pause(&mut self, t: f64) {
        self.playhead = t;
        self.state.paused = true;
        self.cancel_timer(TimerSlot::Resume);
        if !self.options.show_banners_on_pause {
            return;
        }

        let chosen = self
            .banners
            .active_at(t, self.options.overlap_policy)
            .or_else(|| {
                self.state
                    .last_shown
                    .as_deref()
                    .and_then(|id| self.banners.get(id))
            })
            .or_else(|| self.banners.first())
            .map(|banner| banner.id.clone());

        let Some(id) = chosen else {
            return;
        };
        // Always re-render: a seek may have emptied the host while `current` still names this banner
        self.show(&id);
        self.state.pause_banner_active = true;
        debug!("Pause forced banner {}", id);
    }

    fn on_play(&mut self, t: f64) {
        self.playhead = t;
        self.state.paused = false;
        if self.state.pause_banner_active {
            self.cancel_timer(TimerSlot::Resume);
            self.resume_timer = Some(self.scheduler.schedule(PLAY_RESUME, Task::PlayResumed));
        } else if !self.state.seeking {
            self.evaluate();
        }
    }

    fn on_viewport_changed(&mut self) {
        if !self.renderer.is_showing() {
            return;
        }
        self.cancel_timer(TimerSlot::Resize);
        self.resize_timer = Some(self.scheduler.schedule(RESIZE_SETTLE, Task::ResizeSettled));
    }

    /// Pick the banner for the playhead and switch to it if it changed
    fn evaluate(&mut self) {
        let matched = self
            .banners
            .active_at(self.playhead, self.options.overlap_policy)
            .map(|banner| banner.id.clone());
        if matched == self.state.current {
            return;
        }
        match matched {
            Some(id) => self.show(&id),
            None => self.hide(),
        }
    }

    fn show(&mut self, id: &str) {
        self.cancel_timer(TimerSlot::Exit);
        let already_visible = self.renderer.rendered_banner() == Some(id);
        let Some(banner) = self.banners.get(id) else {
            warn!("Banner {} vanished from the collection", id);
            return;
        };

        self.renderer.render(banner);
        if !already_visible {
            info!("Showing banner {} at {:.3}s", id, self.playhead);
            announce(self.tracking.as_ref(), banner);
        }

        self.state.current = Some(id.to_string());
        self.state.last_shown = Some(id.to_string());
        self.state.dismissed = false;
    }

    fn hide(&mut self) {
        self.cancel_timer(TimerSlot::Exit);
        self.renderer.teardown(true);
        if let Some(previous) = self.state.current.take() {
            debug!("Hid banner {} at {:.3}s", previous, self.playhead);
        }
        self.state.dismissed = false;
    }

    /// User-initiated close of the visible banner
    ///
    /// Returns `false` if nothing was visible.
    pub fn close(&mut self) -> bool {
        let Some(id) = self.renderer.rendered_banner().map(str::to_string) else {
            return false;
        };

        if self.renderer.teardown(false) {
            self.cancel_timer(TimerSlot::Exit);
            self.exit_timer = Some(self.scheduler.schedule(EXIT_ANIMATION, Task::ExitFinished));
        }
        self.state.dismissed = true;
        self.remember(&format!("closed:{id}"));
        info!("Banner {} closed by user", id);
        true
    }

    /// Activate a button on the visible banner
    ///
    /// VSAT buttons are addressed by their id, a legacy button by the id of
    /// the segment it sits on. Returns the action to perform, or `None` if no
    /// visible button matches.
    pub fn activate(&mut self, button_id: &str) -> Option<ButtonAction> {
        let banner = self.banners.get(self.renderer.rendered_banner()?)?;

        let (action, pixels) = banner.content.iter().find_map(|element| match &element.buttons {
            Buttons::Vsat(buttons) => buttons
                .iter()
                .find(|b| b.id == button_id)
                .map(|b| (b.action.clone(), b.tracking.click.clone())),
            Buttons::Legacy(b) if b.show && element.segment_id == button_id => Some((
                ButtonAction::Clickthrough(b.url.clone().unwrap_or_default()),
                Vec::new(),
            )),
            _ => None,
        })?;

        let banner_id = banner.id.clone();
        self.tracking.conversion(&ConversionEvent {
            banner_id: banner_id.clone(),
            button_id: button_id.to_string(),
            action: action.clone(),
        });
        for url in &pixels {
            self.tracking.fire_pixel(url);
        }
        self.remember(&format!("clicked:{banner_id}:{button_id}"));
        Some(action)
    }

    /// Merge a freshly loaded banner collection
    ///
    /// A replaced banner that is on screen is re-rendered in place; otherwise
    /// visible state is untouched until the next evaluation.
    pub fn load(&mut self, banners: BannerSet) {
        if banners.is_empty() {
            warn!("Ignoring empty banner payload");
            return;
        }
        let replaced = self.banners.merge(banners);
        info!(
            "Loaded banners: {} total, {} replaced",
            self.banners.len(),
            replaced.len()
        );

        if let Some(rendered) = self.renderer.rendered_banner().map(str::to_string) {
            if replaced.contains(&rendered) {
                if let Some(banner) = self.banners.get(&rendered) {
                    self.renderer.render(banner);
                }
            }
        }

        if !(self.state.seeking || self.state.paused || self.state.pause_banner_active) {
            self.evaluate();
        }
    }

    fn remember(&mut self, key: &str) {
        if self.options.enable_cookie_tracking {
            self.store.set(key, "1");
        }
    }

    fn cancel_timer(&mut self, slot: TimerSlot) {
        let handle = match slot {
            TimerSlot::Seek => self.seek_timer.take(),
            TimerSlot::Resume => self.resume_timer.take(),
            TimerSlot::Resize => self.resize_timer.take(),
            TimerSlot::Exit => self.exit_timer.take(),
        };
        if let Some(handle) = handle {
            self.scheduler.cancel(handle);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TimerSlot {
    Seek,
    Resume,
    Resize,
    Exit,
}

fn announce(tracking: &dyn TrackingSink, banner: &Banner) {
    tracking.impression(&ImpressionEvent::for_banner(banner));
    for element in &banner.content {
        if let Buttons::Vsat(buttons) = &element.buttons {
            for url in buttons.iter().flat_map(|b| &b.tracking.viewable) {
                tracking.fire_pixel(url);
            }
        }
    }
}
