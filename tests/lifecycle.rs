use std::time::Duration;

use vsat_lbanner::config::{Options, PLAY_RESUME, SEEK_SETTLE};
use vsat_lbanner::controller::{Controller, Phase, PlayerEvent};
use vsat_lbanner::geometry::{resolve_offsets, ShellSize};
use vsat_lbanner::parser::parse_banners;
use vsat_lbanner::render::MemoryHost;

const PAYLOAD: &str = r#"<VAST version="4.0">
  <Ad id="campaign">
    <InLine>
      <AdSystem>Acme Ads</AdSystem>
      <Impression>https://t.example.com/imp</Impression>
      <Extensions>
        <Extension type="VSAT">
          <LBanner id="a">
            <Timing start="5" end="10"/>
            <Layout>
              <Segment id="side" x="0" y="0" width="300" height="620" type="vertical"/>
              <Segment id="strip" x="300" y="620" width="980" height="100" type="horizontal"/>
            </Layout>
            <Elements>
              <Element segmentId="side" type="image"><Media>https://cdn.example.com/a-side.png</Media></Element>
              <Element segmentId="strip" type="image"><Media>https://cdn.example.com/a-strip.png</Media></Element>
            </Elements>
          </LBanner>
          <LBanner id="b">
            <Timing start="10" end="20"/>
            <Layout><Segment id="top" position="top" height="80"/></Layout>
            <Elements>
              <Element segmentId="top" type="image"><Media>https://cdn.example.com/b-top.png</Media></Element>
            </Elements>
          </LBanner>
        </Extension>
      </Extensions>
    </InLine>
  </Ad>
</VAST>"#;

fn install(options: Options) -> Controller<MemoryHost> {
    let banners = parse_banners(PAYLOAD).unwrap();
    Controller::install(options, banners, MemoryHost::new(ShellSize::new(1280.0, 720.0))).unwrap()
}

#[test]
fn test_consecutive_windows_swap_without_idle_frame() {
    let mut controller = install(Options::default());

    controller.handle(PlayerEvent::TimeUpdate(7.0));
    assert_eq!(controller.phase(), Phase::Showing("a".to_string()));
    assert_eq!(controller.target().child_count(), 2);
    assert_eq!(controller.target().property("--lbanner-offset-left"), Some("300px"));
    assert_eq!(controller.target().property("--lbanner-offset-bottom"), Some("100px"));

    controller.handle(PlayerEvent::TimeUpdate(10.0));
    assert_eq!(controller.phase(), Phase::Showing("b".to_string()));
    assert_eq!(controller.target().banner_ids(), vec!["b"]);
    assert_eq!(controller.target().child_count(), 1);
    assert_eq!(controller.target().property("--lbanner-offset-left"), Some("0px"));
    assert_eq!(controller.target().property("--lbanner-offset-top"), Some("80px"));

    controller.handle(PlayerEvent::TimeUpdate(25.0));
    assert_eq!(controller.phase(), Phase::Idle);
    assert_eq!(controller.target().child_count(), 0);
}

#[test]
fn test_bottom_strip_hugs_shrunk_video() {
    let mut controller = install(Options::default());
    controller.handle(PlayerEvent::TimeUpdate(6.0));

    let strip = controller
        .target()
        .children()
        .find(|node| node.style.contains("bottom:0px"))
        .unwrap();
    assert!(strip.style.contains("left:300px"), "{}", strip.style);
    assert!(strip.style.contains("calc(100% - 300px - 0px)"), "{}", strip.style);
}

#[test]
fn test_pause_falls_back_and_play_hides_again() {
    let mut controller = install(Options {
        show_banners_on_pause: true,
        ..Options::default()
    });

    controller.handle(PlayerEvent::TimeUpdate(50.0));
    assert_eq!(controller.target().child_count(), 0);

    controller.handle(PlayerEvent::Pause(50.0));
    assert_eq!(controller.phase(), Phase::PauseForced("a".to_string()));
    assert!(controller.target().child_count() > 0);

    controller.handle(PlayerEvent::Play(50.0));
    // Still up while playback resumes
    assert!(controller.target().child_count() > 0);

    controller.advance_by(PLAY_RESUME);
    assert_eq!(controller.phase(), Phase::Idle);
    assert_eq!(controller.target().child_count(), 0);
}

#[test]
fn test_nothing_shows_while_seek_settles() {
    let mut controller = install(Options::default());
    controller.handle(PlayerEvent::TimeUpdate(7.0));

    controller.handle(PlayerEvent::Seeking);
    assert_eq!(controller.target().child_count(), 0);

    controller.handle(PlayerEvent::Seeked(12.0));
    controller.handle(PlayerEvent::TimeUpdate(12.1));
    controller.advance_by(SEEK_SETTLE - Duration::from_millis(1));
    assert_eq!(controller.phase(), Phase::Seeking);
    assert_eq!(controller.target().child_count(), 0);

    controller.advance_by(Duration::from_millis(1));
    assert_eq!(controller.phase(), Phase::Showing("b".to_string()));
}

#[test]
fn test_teardown_resets_shell_properties() {
    let mut controller = install(Options::default());
    controller.handle(PlayerEvent::TimeUpdate(7.0));
    controller.handle(PlayerEvent::TimeUpdate(30.0));

    for edge in ["left", "right", "top", "bottom"] {
        let name = format!("--lbanner-offset-{edge}");
        assert_eq!(controller.target().property(&name), Some("0px"), "{name}");
    }
    assert_eq!(controller.target().listeners().count(), 0);
}

#[test]
fn test_mixed_relative_and_absolute_offsets() {
    let banners = parse_banners(
        r#"<VAST version="3.0"><Ad><InLine><Extensions><Extension type="VSAT">
            <LBanner id="mixed">
              <Layout>
                <Segment id="top" position="top" height="80"/>
                <Segment id="side" x="0" y="0" width="300" height="100" type="vertical"/>
              </Layout>
            </LBanner>
        </Extension></Extensions></InLine></Ad></VAST>"#,
    )
    .unwrap();

    let banner = banners.get("mixed").unwrap();
    let offsets = resolve_offsets(&banner.layout.segments, ShellSize::new(1280.0, 720.0));
    assert_eq!(offsets.left, 300.0);
    assert_eq!(offsets.right, 0.0);
    assert_eq!(offsets.top, 80.0);
    assert_eq!(offsets.bottom, 0.0);
}

#[test]
fn test_play_during_seek_with_forced_banner_follows_playhead() {
    let mut controller = install(Options {
        show_banners_on_pause: true,
        ..Options::default()
    });

    controller.handle(PlayerEvent::TimeUpdate(7.0));
    controller.handle(PlayerEvent::Seeking);
    controller.handle(PlayerEvent::Pause(7.0));
    controller.handle(PlayerEvent::Play(7.0));
    controller.advance_by(PLAY_RESUME);
    controller.handle(PlayerEvent::Seeked(12.0));
    controller.advance_by(SEEK_SETTLE + Duration::from_millis(1));
    assert_eq!(controller.phase(), Phase::Showing("b".to_string()));

    controller.handle(PlayerEvent::TimeUpdate(25.0));
    assert_eq!(controller.phase(), Phase::Idle);
    assert_eq!(controller.target().child_count(), 0);
}
