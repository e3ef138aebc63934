//! Attaching banners to the page
//!
//! [`RenderTarget`] is the seam to whatever actually draws (a browser DOM
//! binding, a test double). [`RenderAdapter`] is the only code that mutates
//! the banner host: every render starts with a full teardown of the previous
//! banner's nodes, listeners and offset properties.

use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};

use crate::geometry::{self, OffsetVector, ShellSize, OFFSET_PROPERTIES};
use crate::models::{Banner, ElementKind, Segment};

/// Every event name that signals a viewport size change, across vendors
pub const VIEWPORT_EVENTS: [&str; 5] = [
    "resize",
    "fullscreenchange",
    "webkitfullscreenchange",
    "mozfullscreenchange",
    "MSFullscreenChange",
];

/// Identifier of a node attached to the banner host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// A node the adapter asks the target to attach
#[derive(Debug, Clone, PartialEq)]
pub struct BannerNode {
    pub banner_id: String,
    pub role: NodeRole,
    /// Inline CSS
    pub style: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeRole {
    Segment {
        segment_id: String,
        kind: ElementKind,
        media_url: Option<String>,
        buttons: usize,
    },
    CloseButton,
}

/// Page surface the overlay draws into
pub trait RenderTarget {
    /// Resolve the player shell and banner host; `false` if either is missing
    fn locate(&mut self, shell_selector: &str, host_selector: &str) -> bool;

    fn shell_size(&self) -> ShellSize;

    /// Set a CSS custom property on the player shell
    fn set_property(&mut self, name: &str, value: &str);

    fn append_child(&mut self, node: BannerNode) -> NodeId;

    fn remove_child(&mut self, id: NodeId) -> bool;

    fn set_style(&mut self, id: NodeId, style: &str);

    /// Start the fade-out of a node; it stays attached until removed
    fn start_exit_animation(&mut self, id: NodeId);

    fn add_listener(&mut self, event: &'static str);

    fn remove_listener(&mut self, event: &'static str);
}

/// In-memory render target
///
/// Used by the CLI simulator and the tests; behaves like a host element
/// whose children and shell properties can be inspected.
#[derive(Debug)]
pub struct MemoryHost {
    shell_selector: String,
    host_selector: String,
    shell: ShellSize,
    properties: HashMap<String, String>,
    children: Vec<(NodeId, BannerNode)>,
    exiting: BTreeSet<NodeId>,
    listeners: BTreeSet<&'static str>,
    next_id: u64,
}

impl MemoryHost {
    pub fn new(shell: ShellSize) -> Self {
        Self::with_selectors("#player-shell", "#lbanner-host", shell)
    }

    pub fn with_selectors(shell_selector: &str, host_selector: &str, shell: ShellSize) -> Self {
        MemoryHost {
            shell_selector: shell_selector.to_string(),
            host_selector: host_selector.to_string(),
            shell,
            properties: HashMap::new(),
            children: Vec::new(),
            exiting: BTreeSet::new(),
            listeners: BTreeSet::new(),
            next_id: 0,
        }
    }

    pub fn resize(&mut self, shell: ShellSize) {
        self.shell = shell;
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> impl Iterator<Item = &BannerNode> {
        self.children.iter().map(|(_, node)| node)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn is_exiting(&self, id: NodeId) -> bool {
        self.exiting.contains(&id)
    }

    pub fn listeners(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.listeners.iter().copied()
    }

    /// Banner ids of the attached children, deduplicated in attach order
    pub fn banner_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for node in self.children() {
            if !ids.contains(&node.banner_id.as_str()) {
                ids.push(&node.banner_id);
            }
        }
        ids
    }
}

impl RenderTarget for MemoryHost {
    fn locate(&mut self, shell_selector: &str, host_selector: &str) -> bool {
        shell_selector == self.shell_selector && host_selector == self.host_selector
    }

    fn shell_size(&self) -> ShellSize {
        self.shell
    }

    fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_string(), value.to_string());
    }

    fn append_child(&mut self, node: BannerNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.children.push((id, node));
        id
    }

    fn remove_child(&mut self, id: NodeId) -> bool {
        self.exiting.remove(&id);
        let before = self.children.len();
        self.children.retain(|(child, _)| *child != id);
        self.children.len() != before
    }

    fn set_style(&mut self, id: NodeId, style: &str) {
        if let Some((_, node)) = self.children.iter_mut().find(|(child, _)| *child == id) {
            node.style = style.to_string();
        }
    }

    fn start_exit_animation(&mut self, id: NodeId) {
        self.exiting.insert(id);
    }

    fn add_listener(&mut self, event: &'static str) {
        self.listeners.insert(event);
    }

    fn remove_listener(&mut self, event: &'static str) {
        self.listeners.remove(event);
    }
}

#[derive(Debug)]
struct RenderedSegment {
    node: NodeId,
    segment: Segment,
}

/// What is currently on screen
#[derive(Debug)]
struct Rendered {
    banner_id: String,
    layout: Vec<Segment>,
    segments: Vec<RenderedSegment>,
    close_button: Option<NodeId>,
}

/// Owns the banner host and turns banners into attached nodes
#[derive(Debug)]
pub struct RenderAdapter<R: RenderTarget> {
    target: R,
    reference_width: f64,
    rendered: Option<Rendered>,
    exiting: Vec<NodeId>,
    listening: bool,
    offsets: OffsetVector,
}

impl<R: RenderTarget> RenderAdapter<R> {
    pub fn new(target: R, reference_width: f64) -> Self {
        RenderAdapter {
            target,
            reference_width,
            rendered: None,
            exiting: Vec::new(),
            listening: false,
            offsets: OffsetVector::default(),
        }
    }

    pub fn target(&self) -> &R {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut R {
        &mut self.target
    }

    /// Id of the banner whose nodes are attached
    pub fn rendered_banner(&self) -> Option<&str> {
        self.rendered.as_ref().map(|r| r.banner_id.as_str())
    }

    pub fn is_showing(&self) -> bool {
        self.rendered.is_some()
    }

    /// Offsets currently written on the shell
    pub fn offsets(&self) -> OffsetVector {
        self.offsets
    }

    /// Replace whatever is shown with `banner`
    ///
    /// Returns the number of segment nodes attached. Elements pointing at a
    /// segment missing from the layout, unplaceable segments, and media
    /// elements without a media URL are skipped.
    pub fn render(&mut self, banner: &Banner) -> usize {
        self.teardown(true);

        let shell = self.target.shell_size();
        let offsets = geometry::resolve_offsets(&banner.layout.segments, shell);
        let mut segments = Vec::with_capacity(banner.content.len());

        for element in &banner.content {
            let Some(segment) = banner.segment(&element.segment_id) else {
                warn!(
                    "Banner {}: element references unknown segment {}, skipping",
                    banner.id, element.segment_id
                );
                continue;
            };
            if matches!(element.kind, ElementKind::Image | ElementKind::Video)
                && element.media_url.is_none()
            {
                warn!(
                    "Banner {}: {:?} element on segment {} has no media, skipping",
                    banner.id, element.kind, segment.id
                );
                continue;
            }
            let Some(rule) = geometry::place_segment(segment, shell, &offsets, self.reference_width) else {
                continue;
            };

            let node = self.target.append_child(BannerNode {
                banner_id: banner.id.clone(),
                role: NodeRole::Segment {
                    segment_id: segment.id.clone(),
                    kind: element.kind,
                    media_url: element.media_url.clone(),
                    buttons: element.buttons.visible_count(),
                },
                style: rule.to_css(),
            });
            segments.push(RenderedSegment {
                node,
                segment: segment.clone(),
            });
        }

        let close_button = banner.behavior.show_close_button.then(|| {
            self.target.append_child(BannerNode {
                banner_id: banner.id.clone(),
                role: NodeRole::CloseButton,
                style: close_button_css(&offsets),
            })
        });

        self.subscribe();
        self.write_offsets(offsets);

        let attached = segments.len();
        debug!("Rendered banner {} with {} segment node(s)", banner.id, attached);
        self.rendered = Some(Rendered {
            banner_id: banner.id.clone(),
            layout: banner.layout.segments.clone(),
            segments,
            close_button,
        });
        attached
    }

    /// Remove the current banner
    ///
    /// With `immediate = false` the nodes start their exit animation and stay
    /// attached until [`finish_exit`](Self::finish_exit); the return value
    /// says whether such nodes are pending. Listeners and offsets are reset
    /// right away in both modes.
    pub fn teardown(&mut self, immediate: bool) -> bool {
        if immediate {
            for node in self.exiting.drain(..) {
                self.target.remove_child(node);
            }
        }

        if let Some(rendered) = self.rendered.take() {
            let nodes = rendered
                .segments
                .iter()
                .map(|s| s.node)
                .chain(rendered.close_button);
            for node in nodes {
                if immediate {
                    self.target.remove_child(node);
                } else {
                    self.target.start_exit_animation(node);
                    self.exiting.push(node);
                }
            }
            debug!("Tore down banner {} (immediate: {})", rendered.banner_id, immediate);
        }

        self.unsubscribe();
        self.write_offsets(OffsetVector::default());
        !self.exiting.is_empty()
    }

    /// Remove nodes whose exit animation has completed
    pub fn finish_exit(&mut self) {
        for node in self.exiting.drain(..) {
            self.target.remove_child(node);
        }
    }

    /// Recompute offsets and placement for the shown banner at the current shell size
    pub fn relayout(&mut self) {
        let Some(rendered) = &self.rendered else {
            return;
        };

        let shell = self.target.shell_size();
        let offsets = geometry::resolve_offsets(&rendered.layout, shell);
        for entry in &rendered.segments {
            if let Some(rule) = geometry::place_segment(&entry.segment, shell, &offsets, self.reference_width) {
                self.target.set_style(entry.node, &rule.to_css());
            }
        }
        if let Some(node) = rendered.close_button {
            self.target.set_style(node, &close_button_css(&offsets));
        }

        debug!(
            "Relaid out banner {} for shell {}x{}",
            rendered.banner_id, shell.width, shell.height
        );
        self.write_offsets(offsets);
    }

    fn subscribe(&mut self) {
        if !self.listening {
            for event in VIEWPORT_EVENTS {
                self.target.add_listener(event);
            }
            self.listening = true;
        }
    }

    fn unsubscribe(&mut self) {
        if self.listening {
            for event in VIEWPORT_EVENTS {
                self.target.remove_listener(event);
            }
            self.listening = false;
        }
    }

    fn write_offsets(&mut self, offsets: OffsetVector) {
        for (name, value) in offsets.css_properties() {
            self.target.set_property(name, &value);
        }
        self.offsets = offsets;
    }
}

/// Close button sits in the top-right corner of the area the banner frees
fn close_button_css(offsets: &OffsetVector) -> String {
    format!(
        "position:absolute;top:{}px;right:{}px",
        offsets.top + 8.0,
        offsets.right + 8.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::banner;

    fn adapter() -> RenderAdapter<MemoryHost> {
        RenderAdapter::new(MemoryHost::new(ShellSize::new(1280.0, 720.0)), 1280.0)
    }

    fn assert_offsets_cleared(host: &MemoryHost) {
        for (_, name) in OFFSET_PROPERTIES {
            assert_eq!(host.property(name), Some("0px"), "{name}");
        }
    }

    #[test]
    fn test_render_then_teardown_leaves_nothing() {
        let mut adapter = adapter();
        assert_eq!(adapter.render(&banner("a", None)), 2);
        assert_eq!(adapter.target().child_count(), 2);
        assert_eq!(adapter.target().property("--lbanner-offset-left"), Some("200px"));
        assert_eq!(adapter.target().property("--lbanner-offset-bottom"), Some("90px"));
        assert_eq!(adapter.target().listeners().count(), VIEWPORT_EVENTS.len());

        assert!(!adapter.teardown(true));
        assert_eq!(adapter.target().child_count(), 0);
        assert_eq!(adapter.target().listeners().count(), 0);
        assert_offsets_cleared(adapter.target());
        assert!(!adapter.is_showing());
    }

    #[test]
    fn test_render_replaces_previous_banner() {
        let mut adapter = adapter();
        adapter.render(&banner("a", None));
        adapter.render(&banner("b", None));

        assert_eq!(adapter.target().banner_ids(), vec!["b"]);
        assert_eq!(adapter.target().child_count(), 2);
        assert_eq!(adapter.rendered_banner(), Some("b"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut adapter = adapter();
        let b = banner("a", None);
        adapter.render(&b);
        adapter.render(&b);
        assert_eq!(adapter.target().child_count(), 2);
        assert_eq!(adapter.target().listeners().count(), VIEWPORT_EVENTS.len());
    }

    #[test]
    fn test_element_with_unknown_segment_is_skipped() {
        let mut b = banner("a", None);
        b.content[0].segment_id = "missing".to_string();
        assert_eq!(adapter().render(&b), 1);
    }

    #[test]
    fn test_media_element_without_media_is_skipped() {
        let mut b = banner("a", None);
        b.content[1].media_url = None;
        let mut adapter = adapter();
        assert_eq!(adapter.render(&b), 1);
        // Offsets still cover the whole layout
        assert_eq!(adapter.offsets().bottom, 90.0);
    }

    #[test]
    fn test_close_button_is_attached_and_removed() {
        let mut b = banner("a", None);
        b.behavior.show_close_button = true;
        let mut adapter = adapter();
        adapter.render(&b);
        assert_eq!(adapter.target().child_count(), 3);
        assert!(adapter
            .target()
            .children()
            .any(|node| node.role == NodeRole::CloseButton));

        adapter.teardown(true);
        assert_eq!(adapter.target().child_count(), 0);
    }

    #[test]
    fn test_animated_teardown_keeps_nodes_until_finished() {
        let mut adapter = adapter();
        adapter.render(&banner("a", None));

        assert!(adapter.teardown(false));
        assert_eq!(adapter.target().child_count(), 2);
        assert!(adapter.target().is_exiting(NodeId(0)));
        assert_offsets_cleared(adapter.target());

        adapter.finish_exit();
        assert_eq!(adapter.target().child_count(), 0);
    }

    #[test]
    fn test_render_during_exit_removes_outgoing_nodes() {
        let mut adapter = adapter();
        adapter.render(&banner("a", None));
        adapter.teardown(false);
        adapter.render(&banner("b", None));
        assert_eq!(adapter.target().banner_ids(), vec!["b"]);
    }

    #[test]
    fn test_relayout_follows_shell_size() {
        let mut b = banner("a", None);
        b.layout.segments = vec![crate::models::fixtures::absolute("h", 0.0, 600.0, 1280.0, 90.0)];
        b.content = vec![crate::models::fixtures::image("h")];

        let mut adapter = adapter();
        adapter.render(&b);
        assert_eq!(adapter.offsets().bottom, 90.0);

        // In a taller shell the strip is no longer in the lower half
        adapter.target_mut().resize(ShellSize::new(1280.0, 1400.0));
        adapter.relayout();
        assert_eq!(adapter.offsets().top, 690.0);
        assert_eq!(adapter.offsets().bottom, 0.0);
        assert_eq!(adapter.target().property("--lbanner-offset-top"), Some("690px"));
        let style = &adapter.target().children().next().unwrap().style;
        assert!(style.contains("top:600px"), "{style}");
    }
}
