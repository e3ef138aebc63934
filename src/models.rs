use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::config::OverlapPolicy;

/// Represents a parsed VAST document, reduced to what the overlay needs
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct VastDocument {
    /// The VAST version (e.g., "2.0", "3.0", "4.0", etc.)
    pub version: String,

    /// The Ad elements within the VAST document
    pub ads: Vec<AdUnit>,
}

/// One `<Ad>` element, either InLine (carrying banners) or a Wrapper
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct AdUnit {
    pub id: Option<String>,

    /// The ad system name
    pub ad_system: Option<String>,

    pub ad_title: Option<String>,

    /// Impression tracking URLs
    pub impressions: Vec<String>,

    /// Set when this ad is a Wrapper pointing at another VAST document
    pub wrapper_uri: Option<String>,

    /// L-banners found in `<Extension type="VSAT">` blocks
    pub banners: Vec<Banner>,
}

/// One advertising unit shown over the player
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Banner {
    /// Unique within a loaded set
    pub id: String,

    /// Absent means the banner is never triggered by playback time
    pub timing: Option<Timing>,

    pub layout: Layout,

    /// One element per segment, in declaration order
    pub content: Vec<Element>,

    pub behavior: Behavior,

    pub metadata: BannerMetadata,
}

impl Banner {
    /// Whether the banner's time window contains `t`
    pub fn is_active_at(&self, t: f64) -> bool {
        self.timing.is_some_and(|timing| timing.contains(t))
    }

    /// Look up a segment of this banner's layout by id
    pub fn segment(&self, id: &str) -> Option<&Segment> {
        self.layout.segments.iter().find(|s| s.id == id)
    }
}

/// Half-open playback window `[start, end)` in seconds
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub struct Timing {
    pub start: f64,
    pub end: f64,
}

impl Timing {
    /// Build a window, rejecting negative starts and empty or inverted ranges
    pub fn new(start: f64, end: f64) -> Option<Self> {
        if start.is_finite() && end.is_finite() && start >= 0.0 && end > start {
            Some(Timing { start, end })
        } else {
            None
        }
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Default)]
pub struct Behavior {
    pub show_close_button: bool,
}

/// Descriptive data attached to impression events
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct BannerMetadata {
    pub ad_id: Option<String>,
    pub ad_system: Option<String>,
    pub ad_title: Option<String>,
    pub impressions: Vec<String>,
}

/// Screen edge of the player shell
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    pub fn parse(value: &str) -> Option<Edge> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Edge::Left),
            "right" => Some(Edge::Right),
            "top" => Some(Edge::Top),
            "bottom" => Some(Edge::Bottom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::Left => "left",
            Edge::Right => "right",
            Edge::Top => "top",
            Edge::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared orientation of an absolute segment
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Corner an L-banner wraps around
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub fn parse(value: &str) -> Option<Corner> {
        match value.trim().to_ascii_lowercase().as_str() {
            "top-left" => Some(Corner::TopLeft),
            "top-right" => Some(Corner::TopRight),
            "bottom-left" => Some(Corner::BottomLeft),
            "bottom-right" => Some(Corner::BottomRight),
            _ => None,
        }
    }

    fn from_edges(side: Edge, band: Edge) -> Corner {
        match (band, side) {
            (Edge::Top, Edge::Right) => Corner::TopRight,
            (Edge::Top, _) => Corner::TopLeft,
            (_, Edge::Right) => Corner::BottomRight,
            _ => Corner::BottomLeft,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct Layout {
    pub segments: Vec<Segment>,

    /// Corner tag, declared or derived from the segments' edges
    pub position: Option<Corner>,
}

impl Layout {
    /// Derive the corner from edge hints and relative positions
    ///
    /// Returns `None` when the segments name neither a side nor a band.
    pub fn derive_position(segments: &[Segment]) -> Option<Corner> {
        let mut side = None;
        let mut band = None;

        for segment in segments {
            let edge = match &segment.shape {
                SegmentShape::Absolute(abs) => abs.hint,
                SegmentShape::Relative(rel) => Some(rel.edge),
                SegmentShape::Unplaced { .. } => None,
            };
            match edge {
                Some(e @ (Edge::Left | Edge::Right)) => side = side.or(Some(e)),
                Some(e @ (Edge::Top | Edge::Bottom)) => band = band.or(Some(e)),
                None => (),
            }
        }

        match (side, band) {
            (None, None) => None,
            (side, band) => Some(Corner::from_edges(
                side.unwrap_or(Edge::Left),
                band.unwrap_or(Edge::Bottom),
            )),
        }
    }
}

/// A placement region inside a banner's layout
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Segment {
    pub id: String,
    pub shape: SegmentShape,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SegmentShape {
    /// Pixel rectangle relative to the player shell origin
    Absolute(AbsoluteSegment),

    /// Legacy hand-authored strip glued to one edge
    Relative(RelativeSegment),

    /// Neither coordinates nor a recognized edge were given
    Unplaced { position: Option<String> },
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub struct AbsoluteSegment {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub orientation: Option<Orientation>,
    pub hint: Option<Edge>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub struct RelativeSegment {
    pub edge: Edge,
    pub width: f64,
    pub height: f64,
}

/// Visual content bound to one segment
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Element {
    pub segment_id: String,
    pub kind: ElementKind,
    pub media_url: Option<String>,
    pub poll: Option<Poll>,
    pub buttons: Buttons,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Image,
    Video,
    Poll,
    None,
}

impl ElementKind {
    pub fn parse(value: &str) -> ElementKind {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => ElementKind::Image,
            "video" => ElementKind::Video,
            "poll" => ElementKind::Poll,
            _ => ElementKind::None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct Poll {
    pub heading: Option<String>,
    pub question: Option<String>,
    pub tagline: Option<String>,
    pub options: Vec<String>,
}

/// Button payloads come in two incompatible generations
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Buttons {
    #[default]
    None,

    /// Single redirect button from hand-authored banners
    Legacy(LegacyButton),

    Vsat(Vec<VsatButton>),
}

impl Buttons {
    /// Buttons that should actually be drawn
    pub fn visible_count(&self) -> usize {
        match self {
            Buttons::None => 0,
            Buttons::Legacy(button) => usize::from(button.show),
            Buttons::Vsat(buttons) => buttons.len(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct LegacyButton {
    pub show: bool,
    pub text: String,
    pub color: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct VsatButton {
    pub id: String,
    pub label: String,
    pub role: Option<String>,

    /// Position relative to the owning segment
    pub rect: Option<ButtonRect>,

    pub action: ButtonAction,
    pub tracking: ButtonTracking,
    pub default_focus: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub struct ButtonRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "type", content = "target", rename_all = "lowercase")]
pub enum ButtonAction {
    Clickthrough(String),
    Deeplink(String),
    Custom(String),
}

impl ButtonAction {
    pub fn parse(kind: &str, target: String) -> ButtonAction {
        match kind.trim().to_ascii_lowercase().as_str() {
            "deeplink" => ButtonAction::Deeplink(target),
            "custom" => ButtonAction::Custom(target),
            _ => ButtonAction::Clickthrough(target),
        }
    }

    pub fn target(&self) -> &str {
        match self {
            ButtonAction::Clickthrough(t) | ButtonAction::Deeplink(t) | ButtonAction::Custom(t) => t,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct ButtonTracking {
    pub click: Vec<String>,
    pub viewable: Vec<String>,
}

/// Insertion-ordered keyed collection of banners
#[derive(Debug, Clone, Default)]
pub struct BannerSet {
    banners: Vec<Banner>,
    index: HashMap<String, usize>,
}

impl BannerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a banner, overwriting any banner with the same id in place
    ///
    /// Returns `true` when an existing banner was replaced.
    pub fn insert(&mut self, banner: Banner) -> bool {
        match self.index.get(&banner.id) {
            Some(&slot) => {
                self.banners[slot] = banner;
                true
            }
            None => {
                self.index.insert(banner.id.clone(), self.banners.len());
                self.banners.push(banner);
                false
            }
        }
    }

    /// Merge another set into this one by key overwrite
    ///
    /// Returns the ids that replaced an existing banner.
    pub fn merge(&mut self, other: BannerSet) -> Vec<String> {
        let mut replaced = Vec::new();
        for banner in other.banners {
            let id = banner.id.clone();
            if self.insert(banner) {
                replaced.push(id);
            }
        }
        replaced
    }

    pub fn get(&self, id: &str) -> Option<&Banner> {
        self.index.get(id).map(|&slot| &self.banners[slot])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.banners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banners.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Banner> {
        self.banners.iter()
    }

    pub fn first(&self) -> Option<&Banner> {
        self.banners.first()
    }

    /// The banner whose window contains `t`, tie-broken by `policy`
    pub fn active_at(&self, t: f64, policy: OverlapPolicy) -> Option<&Banner> {
        let mut candidates = self.banners.iter().filter(|b| b.is_active_at(t));
        match policy {
            OverlapPolicy::InsertionOrder => candidates.next(),
            OverlapPolicy::EarliestStart => candidates.min_by(|a, b| {
                let start = |banner: &Banner| banner.timing.map_or(f64::MAX, |w| w.start);
                start(a).total_cmp(&start(b))
            }),
        }
    }
}

impl FromIterator<Banner> for BannerSet {
    fn from_iter<I: IntoIterator<Item = Banner>>(iter: I) -> Self {
        let mut set = BannerSet::new();
        for banner in iter {
            set.insert(banner);
        }
        set
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn absolute(id: &str, x: f64, y: f64, width: f64, height: f64) -> Segment {
        Segment {
            id: id.to_string(),
            shape: SegmentShape::Absolute(AbsoluteSegment {
                x,
                y,
                width,
                height,
                orientation: None,
                hint: None,
            }),
        }
    }

    pub fn relative(id: &str, edge: Edge, width: f64, height: f64) -> Segment {
        Segment {
            id: id.to_string(),
            shape: SegmentShape::Relative(RelativeSegment { edge, width, height }),
        }
    }

    pub fn image(segment_id: &str) -> Element {
        Element {
            segment_id: segment_id.to_string(),
            kind: ElementKind::Image,
            media_url: Some(format!("https://cdn.example.com/{segment_id}.png")),
            poll: None,
            buttons: Buttons::None,
        }
    }

    /// Two-segment L-banner (left arm + bottom strip) with the given window
    pub fn banner(id: &str, window: Option<(f64, f64)>) -> Banner {
        let segments = vec![
            relative("side", Edge::Left, 200.0, 0.0),
            relative("strip", Edge::Bottom, 0.0, 90.0),
        ];
        Banner {
            id: id.to_string(),
            timing: window.and_then(|(start, end)| Timing::new(start, end)),
            layout: Layout {
                position: Layout::derive_position(&segments),
                segments,
            },
            content: vec![image("side"), image("strip")],
            behavior: Behavior::default(),
            metadata: BannerMetadata {
                ad_id: Some(format!("ad-{id}")),
                ..BannerMetadata::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_timing_is_half_open() {
        let timing = Timing::new(5.0, 10.0).unwrap();
        assert!(!timing.contains(4.999));
        assert!(timing.contains(5.0));
        assert!(timing.contains(9.999));
        assert!(!timing.contains(10.0));
    }

    #[test]
    fn test_timing_rejects_inverted_windows() {
        assert!(Timing::new(10.0, 5.0).is_none());
        assert!(Timing::new(3.0, 3.0).is_none());
        assert!(Timing::new(-1.0, 3.0).is_none());
    }

    #[test]
    fn test_merge_overwrites_in_place() {
        let mut set: BannerSet = vec![banner("a", Some((0.0, 5.0))), banner("b", Some((5.0, 9.0)))]
            .into_iter()
            .collect();

        let update: BannerSet = vec![banner("a", Some((20.0, 30.0))), banner("c", None)]
            .into_iter()
            .collect();
        let replaced = set.merge(update);

        assert_eq!(replaced, vec!["a".to_string()]);
        let ids: Vec<&str> = set.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(set.get("a").unwrap().timing, Timing::new(20.0, 30.0));
    }

    #[test]
    fn test_overlap_policies() {
        let set: BannerSet = vec![banner("late", Some((8.0, 20.0))), banner("early", Some((2.0, 12.0)))]
            .into_iter()
            .collect();

        assert_eq!(set.active_at(10.0, OverlapPolicy::InsertionOrder).unwrap().id, "late");
        assert_eq!(set.active_at(10.0, OverlapPolicy::EarliestStart).unwrap().id, "early");
        assert!(set.active_at(25.0, OverlapPolicy::InsertionOrder).is_none());
    }

    #[test]
    fn test_banner_without_timing_is_never_active() {
        let untimed = banner("x", None);
        assert!(!untimed.is_active_at(0.0));
        assert!(!untimed.is_active_at(1000.0));
    }

    #[test]
    fn test_derive_position() {
        let segments = vec![
            relative("v", Edge::Right, 120.0, 0.0),
            relative("h", Edge::Top, 0.0, 60.0),
        ];
        assert_eq!(Layout::derive_position(&segments), Some(Corner::TopRight));
        assert_eq!(Layout::derive_position(&[absolute("a", 0.0, 0.0, 10.0, 10.0)]), None);
    }
}
