//! Screen geometry of L-banner segments
//!
//! Two questions are answered here: how far the video viewport has to shrink
//! on each edge so nothing is covered ([`resolve_offsets`]), and where each
//! segment node goes inside the shell ([`place_segment`]). Both use the same
//! edge classification so the node placement always agrees with the offsets.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{AbsoluteSegment, Edge, Orientation, RelativeSegment, Segment, SegmentShape};

/// Slack for sub-pixel rounding when testing whether a segment touches the right edge
pub const EDGE_TOLERANCE_PX: f64 = 1.0;

/// Undeclared segments whose sides differ by at most this much count as square
pub const SQUARE_TOLERANCE_PX: f64 = 1.0;

/// Distance under which a bottom strip snaps to the left offset
pub const FULLSCREEN_SNAP_PX: f64 = 10.0;

/// CSS custom properties written on the player shell, one per edge
pub const OFFSET_PROPERTIES: [(Edge, &str); 4] = [
    (Edge::Left, "--lbanner-offset-left"),
    (Edge::Right, "--lbanner-offset-right"),
    (Edge::Top, "--lbanner-offset-top"),
    (Edge::Bottom, "--lbanner-offset-bottom"),
];

/// Current pixel size of the player shell
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub struct ShellSize {
    pub width: f64,
    pub height: f64,
}

impl ShellSize {
    pub fn new(width: f64, height: f64) -> Self {
        ShellSize { width, height }
    }
}

/// How much the viewport shrinks on each edge, in pixels
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Default)]
pub struct OffsetVector {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl OffsetVector {
    pub fn get(&self, edge: Edge) -> f64 {
        match edge {
            Edge::Left => self.left,
            Edge::Right => self.right,
            Edge::Top => self.top,
            Edge::Bottom => self.bottom,
        }
    }

    /// Raise one edge to at least `amount`
    fn grow(&mut self, edge: Edge, amount: f64) {
        let slot = match edge {
            Edge::Left => &mut self.left,
            Edge::Right => &mut self.right,
            Edge::Top => &mut self.top,
            Edge::Bottom => &mut self.bottom,
        };
        *slot = slot.max(amount.max(0.0));
    }

    /// `(property, value)` pairs ready to be written on the shell
    pub fn css_properties(&self) -> [(&'static str, String); 4] {
        OFFSET_PROPERTIES.map(|(edge, name)| (name, Length::Px(self.get(edge)).to_string()))
    }
}

/// A CSS length as emitted on segment nodes
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub enum Length {
    Px(f64),
    Percent(f64),

    /// `100%` of the containing shell
    Fill,

    /// Whatever the shrunk viewport leaves between the two side offsets
    BetweenOffsets { left: f64, right: f64 },
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Px(v) => write!(f, "{}px", round_to(*v, 2)),
            Length::Percent(v) => write!(f, "{}%", round_to(*v, 4)),
            Length::Fill => f.write_str("100%"),
            Length::BetweenOffsets { left, right } => write!(
                f,
                "calc(100% - {}px - {}px)",
                round_to(*left, 2),
                round_to(*right, 2)
            ),
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    let rounded = (value * scale).round() / scale;
    // Avoid printing "-0"
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Distance of a node from one edge of the shell
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub struct Anchor {
    pub edge: Edge,
    pub offset: Length,
}

impl Anchor {
    fn flush(edge: Edge) -> Self {
        Anchor { edge, offset: Length::Px(0.0) }
    }
}

/// Where one segment node sits inside the player shell
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub struct PlacementRule {
    /// Left or right anchor
    pub horizontal: Anchor,

    /// Top or bottom anchor
    pub vertical: Anchor,

    pub width: Length,
    pub height: Length,
}

impl PlacementRule {
    /// Inline style for the segment node
    pub fn to_css(&self) -> String {
        format!(
            "position:absolute;{}:{};{}:{};width:{};height:{}",
            self.horizontal.edge,
            self.horizontal.offset,
            self.vertical.edge,
            self.vertical.offset,
            self.width,
            self.height
        )
    }
}

/// Edge classification of an absolute segment against the current shell
#[derive(Debug, Clone, Copy, PartialEq)]
struct Classification {
    vertical: bool,
    horizontal: bool,
    left_edge: bool,
    right_edge: bool,
    bottom: bool,
}

fn classify(segment: &AbsoluteSegment, shell: ShellSize) -> Classification {
    let square = (segment.width - segment.height).abs() <= SQUARE_TOLERANCE_PX;
    let (vertical, horizontal) = match segment.orientation {
        Some(Orientation::Vertical) => (true, false),
        Some(Orientation::Horizontal) => (false, true),
        None => (
            segment.height > segment.width || square,
            segment.width > segment.height || square,
        ),
    };

    let left_edge = segment.hint == Some(Edge::Left) || segment.x == 0.0;
    let right_edge = segment.hint == Some(Edge::Right)
        || (!left_edge && segment.x + segment.width >= shell.width - EDGE_TOLERANCE_PX);
    let bottom = segment.hint == Some(Edge::Bottom) || segment.y > shell.height * 0.5;

    Classification {
        vertical,
        horizontal,
        left_edge,
        right_edge,
        bottom,
    }
}

/// Compute how far the viewport must shrink on each edge
///
/// Vertical arms push the left or right edge by their width. Horizontal arms
/// push the bottom by their height, or the top by their lower edge (`y +
/// height`) since a top strip need not start at `y = 0`. Ambiguous square
/// segments contribute on both axes. Unplaced segments contribute nothing.
pub fn resolve_offsets(segments: &[Segment], shell: ShellSize) -> OffsetVector {
    let mut offsets = OffsetVector::default();

    for segment in segments {
        match &segment.shape {
            SegmentShape::Absolute(abs) => {
                let class = classify(abs, shell);
                if class.vertical {
                    let edge = if class.left_edge { Edge::Left } else { Edge::Right };
                    offsets.grow(edge, abs.width);
                }
                if class.horizontal {
                    if class.bottom {
                        offsets.grow(Edge::Bottom, abs.height);
                    } else {
                        offsets.grow(Edge::Top, abs.y + abs.height);
                    }
                }
            }
            SegmentShape::Relative(rel) => {
                offsets.grow(rel.edge, relative_extent(rel));
            }
            SegmentShape::Unplaced { position } => {
                warn!(
                    "Segment {} has no coordinates and no usable position ({:?}), skipping",
                    segment.id, position
                );
            }
        }
    }

    debug!("Resolved offsets {:?} for shell {}x{}", offsets, shell.width, shell.height);
    offsets
}

fn relative_extent(rel: &RelativeSegment) -> f64 {
    match rel.edge {
        Edge::Top | Edge::Bottom => rel.height,
        Edge::Left | Edge::Right => rel.width,
    }
}

/// Compute the placement rule for one segment node
///
/// `offsets` must be the vector already resolved for the segment's banner;
/// a bottom strip reaching the right edge that starts at the left offset is
/// sized with `calc()` so it keeps hugging the shrunk video after the shell
/// changes size. Other absolute segments are placed horizontally in
/// percentages of `reference_width`.
pub fn place_segment(
    segment: &Segment,
    shell: ShellSize,
    offsets: &OffsetVector,
    reference_width: f64,
) -> Option<PlacementRule> {
    match &segment.shape {
        SegmentShape::Absolute(abs) => Some(place_absolute(abs, shell, offsets, reference_width)),
        SegmentShape::Relative(rel) => Some(place_relative(rel)),
        SegmentShape::Unplaced { .. } => None,
    }
}

fn place_absolute(
    abs: &AbsoluteSegment,
    shell: ShellSize,
    offsets: &OffsetVector,
    reference_width: f64,
) -> PlacementRule {
    let class = classify(abs, shell);

    if class.vertical {
        let side = if class.left_edge { Edge::Left } else { Edge::Right };
        return PlacementRule {
            horizontal: Anchor::flush(side),
            vertical: Anchor {
                edge: Edge::Top,
                offset: Length::Px(abs.y),
            },
            width: Length::Px(abs.width),
            height: Length::Px(abs.height),
        };
    }

    let vertical = if class.bottom {
        Anchor::flush(Edge::Bottom)
    } else {
        Anchor {
            edge: Edge::Top,
            offset: Length::Px(abs.y),
        }
    };

    let snaps = class.bottom && class.right_edge && (abs.x - offsets.left).abs() <= FULLSCREEN_SNAP_PX;
    let (horizontal, width) = if snaps {
        (
            Anchor {
                edge: Edge::Left,
                offset: Length::Px(offsets.left),
            },
            Length::BetweenOffsets {
                left: offsets.left,
                right: offsets.right,
            },
        )
    } else {
        (
            Anchor {
                edge: Edge::Left,
                offset: Length::Percent(abs.x / reference_width * 100.0),
            },
            Length::Percent(abs.width / reference_width * 100.0),
        )
    };

    PlacementRule {
        horizontal,
        vertical,
        width,
        height: Length::Px(abs.height),
    }
}

fn place_relative(rel: &RelativeSegment) -> PlacementRule {
    match rel.edge {
        Edge::Left | Edge::Right => PlacementRule {
            horizontal: Anchor::flush(rel.edge),
            vertical: Anchor::flush(Edge::Top),
            width: Length::Px(rel.width),
            height: Length::Fill,
        },
        Edge::Top | Edge::Bottom => PlacementRule {
            horizontal: Anchor::flush(Edge::Left),
            vertical: Anchor::flush(rel.edge),
            width: Length::Fill,
            height: Length::Px(rel.height),
        },
    }
}
