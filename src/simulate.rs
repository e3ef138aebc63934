//! Scripted playback for trying banner payloads without a player
//!
//! A script is one step per line:
//!
//! ```text
//! # comment
//! time 7          periodic time update
//! seek            seek started
//! seeked 12.5     seek finished at 12.5s
//! pause 13        pause (time optional)
//! play            play (time optional)
//! resize 1920 1080
//! wait 300        advance the clock by 300ms
//! close           user closes the banner
//! click cta       user presses button "cta"
//! ```

use std::time::Duration;

use crate::controller::{Controller, Phase, PlayerEvent};
use crate::error::{BannerError, Result};
use crate::geometry::ShellSize;
use crate::render::MemoryHost;

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Player(PlayerEvent),
    /// Pause at the given time, or at the current playhead
    Pause(Option<f64>),
    Play(Option<f64>),
    Resize(ShellSize),
    Wait(Duration),
    Close,
    Click(String),
}

/// Parse a script; the error names the offending line
pub fn parse_script(script: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();

    for (index, raw) in script.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let step = parse_step(line)
            .ok_or_else(|| BannerError::Other(format!("line {}: cannot parse {:?}", index + 1, raw.trim())))?;
        steps.push(step);
    }

    Ok(steps)
}

fn parse_step(line: &str) -> Option<Step> {
    let mut words = line.split_whitespace();
    let command = words.next()?;
    let args: Vec<&str> = words.collect();
    let seconds = |i: usize| args.get(i).and_then(|v| v.parse::<f64>().ok()).filter(|v| *v >= 0.0);

    let step = match (command, args.len()) {
        ("time", 1) => Step::Player(PlayerEvent::TimeUpdate(seconds(0)?)),
        ("seek", 0) => Step::Player(PlayerEvent::Seeking),
        ("seeked", 1) => Step::Player(PlayerEvent::Seeked(seconds(0)?)),
        ("pause", 0) => Step::Pause(None),
        ("pause", 1) => Step::Pause(Some(seconds(0)?)),
        ("play", 0) => Step::Play(None),
        ("play", 1) => Step::Play(Some(seconds(0)?)),
        ("resize", 2) => Step::Resize(ShellSize::new(seconds(0)?, seconds(1)?)),
        ("wait", 1) => Step::Wait(Duration::from_millis(args[0].parse().ok()?)),
        ("close", 0) => Step::Close,
        ("click", 1) => Step::Click(args[0].to_string()),
        _ => return None,
    };
    Some(step)
}

/// Apply one step; pause/play without a time use the current playhead
pub fn apply(controller: &mut Controller<MemoryHost>, step: &Step) {
    let playhead = controller.playhead();

    match step {
        Step::Pause(t) => controller.handle(PlayerEvent::Pause(t.unwrap_or(playhead))),
        Step::Play(t) => controller.handle(PlayerEvent::Play(t.unwrap_or(playhead))),
        Step::Player(event) => controller.handle(*event),
        Step::Resize(shell) => {
            controller.target_mut().resize(*shell);
            controller.handle(PlayerEvent::ViewportChanged);
        }
        Step::Wait(delay) => controller.advance_by(*delay),
        Step::Close => {
            controller.close();
        }
        Step::Click(button) => {
            controller.activate(button);
        }
    }
}

/// One-line summary of what is on screen
pub fn describe(controller: &Controller<MemoryHost>) -> String {
    let phase = match controller.phase() {
        Phase::Idle => "idle".to_string(),
        Phase::Seeking => "seeking".to_string(),
        Phase::Showing(id) => format!("showing {id}"),
        Phase::PauseForced(id) => format!("pause-forced {id}"),
    };
    let offsets = controller.renderer().offsets();
    format!(
        "[{:>6}ms] t={:.3}s {} nodes={} offsets(l={} r={} t={} b={})",
        controller.now().as_millis(),
        controller.playhead(),
        phase,
        controller.target().child_count(),
        offsets.left,
        offsets.right,
        offsets.top,
        offsets.bottom
    )
}

/// Run a whole script, returning one description per step
pub fn run(controller: &mut Controller<MemoryHost>, steps: &[Step]) -> Vec<String> {
    steps
        .iter()
        .map(|step| {
            apply(controller, step);
            describe(controller)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::models::fixtures::banner;

    #[test]
    fn test_parse_script() {
        let steps = parse_script(
            "# warm up\n\
             time 7\n\
             \n\
             seek\n\
             seeked 12.5  # jump\n\
             pause\n\
             resize 1920 1080\n\
             wait 300\n\
             click cta\n",
        )
        .unwrap();

        assert_eq!(steps.len(), 7);
        assert_eq!(steps[0], Step::Player(PlayerEvent::TimeUpdate(7.0)));
        assert_eq!(steps[2], Step::Player(PlayerEvent::Seeked(12.5)));
        assert_eq!(steps[3], Step::Pause(None));
        assert_eq!(steps[4], Step::Resize(ShellSize::new(1920.0, 1080.0)));
        assert_eq!(steps[5], Step::Wait(Duration::from_millis(300)));
        assert_eq!(steps[6], Step::Click("cta".to_string()));
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let err = parse_script("time 1\nfly away\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
        assert!(parse_script("time -4").is_err());
    }

    #[test]
    fn test_pause_and_play_default_to_playhead() {
        let mut controller = Controller::install(
            Options {
                show_banners_on_pause: true,
                ..Options::default()
            },
            vec![banner("a", Some((5.0, 10.0))), banner("b", Some((10.0, 20.0)))]
                .into_iter()
                .collect(),
            MemoryHost::new(ShellSize::new(1280.0, 720.0)),
        )
        .unwrap();

        let steps = parse_script("time 12\npause\nplay 13").unwrap();
        assert_eq!(steps[2], Step::Play(Some(13.0)));

        let lines = run(&mut controller, &steps);
        assert!(lines[1].contains("t=12.000s pause-forced b"), "{}", lines[1]);
        assert_eq!(controller.playhead(), 13.0);
    }

    #[test]
    fn test_run_reports_each_step() {
        let banners = vec![banner("a", Some((5.0, 10.0)))];
        let mut controller = Controller::install(
            Options {
                show_banners_on_pause: true,
                ..Options::default()
            },
            banners.into_iter().collect(),
            MemoryHost::new(ShellSize::new(1280.0, 720.0)),
        )
        .unwrap();

        let steps = parse_script("time 6\npause\nplay\nwait 300\ntime 11").unwrap();
        let lines = run(&mut controller, &steps);

        assert!(lines[0].contains("showing a"), "{}", lines[0]);
        assert!(lines[1].contains("pause-forced a"), "{}", lines[1]);
        assert!(lines[3].contains("showing a"), "{}", lines[3]);
        assert!(lines[4].contains("idle nodes=0"), "{}", lines[4]);
    }
}
