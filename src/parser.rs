use crate::error::{BannerError, Result};
use crate::models::*;
use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::str::from_utf8;

/// Extension type carrying L-banner definitions
const VSAT_EXTENSION: &str = "VSAT";

/// Parse a VAST XML string, collecting the L-banners of its VSAT extensions
pub fn parse_vast(xml: &str) -> Result<VastDocument> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut vast = VastDocument {
        version: String::new(),
        ads: Vec::new(),
    };

    // Look for the VAST element
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"VAST" => {
                vast.version = attributes(e).remove("version").unwrap_or_default();
                if vast.version.is_empty() {
                    return Err(BannerError::MissingField("VAST version".to_string()));
                }
                if !matches!(vast.version.chars().next(), Some('2' | '3' | '4')) {
                    return Err(BannerError::InvalidVersion(vast.version));
                }

                vast.ads = parse_ads(&mut reader)?;
                break;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    if vast.version.is_empty() {
        return Err(BannerError::MissingField("VAST root element".to_string()));
    }
    Ok(vast)
}

/// Parse a VAST document straight into a keyed banner collection
///
/// Wrapper ads are not followed; see [`crate::unwrap`] for that.
pub fn parse_banners(xml: &str) -> Result<BannerSet> {
    Ok(collect_banners(parse_vast(xml)?))
}

/// Flatten the banners of every ad, later duplicates overwriting earlier ones
pub fn collect_banners(vast: VastDocument) -> BannerSet {
    let mut set = BannerSet::new();
    for banner in vast.ads.into_iter().flat_map(|ad| ad.banners) {
        let id = banner.id.clone();
        if set.insert(banner) {
            warn!("Duplicate banner id {}, keeping the later definition", id);
        }
    }
    set
}

/// Parse Ad elements from the VAST XML
fn parse_ads(reader: &mut Reader<&[u8]>) -> Result<Vec<AdUnit>> {
    let mut ads = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Ad" => {
                let ad = parse_ad_element(reader, e)?;
                ads.push(ad);
            }
            Ok(Event::Start(_)) => skip_element(reader)?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"VAST" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(ads)
}

/// Parse a single Ad element
fn parse_ad_element(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<AdUnit> {
    let mut ad = AdUnit {
        id: attributes(start).remove("id"),
        ..AdUnit::default()
    };

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"InLine" => parse_ad_body(reader, &mut ad, b"InLine")?,
                b"Wrapper" => parse_ad_body(reader, &mut ad, b"Wrapper")?,
                _ => skip_element(reader)?,
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Ad" => break,
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    // Impression metadata travels with every banner of this ad
    let metadata = BannerMetadata {
        ad_id: ad.id.clone(),
        ad_system: ad.ad_system.clone(),
        ad_title: ad.ad_title.clone(),
        impressions: ad.impressions.clone(),
    };
    for banner in &mut ad.banners {
        banner.metadata = metadata.clone();
    }

    Ok(ad)
}

/// Parse the children shared by InLine and Wrapper
fn parse_ad_body(reader: &mut Reader<&[u8]>, ad: &mut AdUnit, end: &[u8]) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"AdSystem" => ad.ad_system = Some(read_text_element(reader)?),
                b"AdTitle" => ad.ad_title = Some(read_text_element(reader)?),
                b"Impression" => {
                    let url = read_text_element(reader)?;
                    if !url.is_empty() {
                        ad.impressions.push(url);
                    }
                }
                b"VASTAdTagURI" => ad.wrapper_uri = Some(read_text_element(reader)?),
                b"Extensions" => ad.banners.extend(parse_extensions(reader)?),
                _ => skip_element(reader)?,
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == end => break,
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(())
}

/// Helper function to read the text content of an XML element
fn read_text_element(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => {
                text = e.unescape()?.into_owned();
            }
            Ok(Event::CData(e)) => {
                if let Ok(value) = from_utf8(&e) {
                    text = value.to_string();
                }
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(text.trim().to_string())
}

/// Skip the rest of an element whose start tag was just read
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(())
}

/// Attribute map of a start tag; undecodable attributes are dropped
fn attributes(start: &BytesStart) -> HashMap<String, String> {
    start
        .attributes()
        .flatten()
        .filter_map(|attr| {
            let key = from_utf8(attr.key.as_ref()).ok()?.to_string();
            let value = attr.unescape_value().ok()?.trim().to_string();
            Some((key, value))
        })
        .collect()
}

fn number(attrs: &HashMap<String, String>, key: &str) -> Option<f64> {
    attrs.get(key).and_then(|v| v.parse::<f64>().ok()).filter(|v| v.is_finite())
}

fn flag(attrs: &HashMap<String, String>, key: &str) -> bool {
    attrs
        .get(key)
        .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

/// Parse Extensions, keeping only the VSAT ones
fn parse_extensions(reader: &mut Reader<&[u8]>) -> Result<Vec<Banner>> {
    let mut banners = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Extension" => {
                let is_vsat = attributes(e)
                    .get("type")
                    .is_some_and(|t| t.eq_ignore_ascii_case(VSAT_EXTENSION));
                if is_vsat {
                    banners.extend(parse_vsat_extension(reader)?);
                } else {
                    skip_element(reader)?;
                }
            }
            Ok(Event::Start(_)) => skip_element(reader)?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Extensions" => break,
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(banners)
}

fn parse_vsat_extension(reader: &mut Reader<&[u8]>) -> Result<Vec<Banner>> {
    let mut banners = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"LBanner" => {
                if let Some(banner) = parse_lbanner(reader, e)? {
                    banners.push(banner);
                }
            }
            Ok(Event::Start(_)) => skip_element(reader)?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Extension" => break,
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(banners)
}

/// Parse one LBanner; banners without an id are dropped
fn parse_lbanner(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<Option<Banner>> {
    let attrs = attributes(start);
    let mut timing = None;
    let mut behavior = Behavior::default();
    let mut segments = Vec::new();
    let mut content = Vec::new();

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"Timing" => timing = Some(attributes(e)),
                b"Behavior" => behavior.show_close_button = flag(&attributes(e), "showCloseButton"),
                _ => (),
            },
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Timing" => {
                    timing = Some(attributes(e));
                    skip_element(reader)?;
                }
                b"Behavior" => {
                    behavior.show_close_button = flag(&attributes(e), "showCloseButton");
                    skip_element(reader)?;
                }
                b"Layout" => segments = parse_layout(reader)?,
                b"Elements" => content = parse_elements(reader)?,
                _ => skip_element(reader)?,
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"LBanner" => break,
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    let Some(id) = attrs.get("id").filter(|id| !id.is_empty()).cloned() else {
        warn!("LBanner without an id, skipping");
        return Ok(None);
    };

    let timing = timing.and_then(|t| {
        let window = match (t.get("start"), t.get("end")) {
            (Some(start), Some(end)) => parse_offset(start).zip(parse_offset(end)),
            _ => None,
        };
        let parsed = window.and_then(|(start, end)| Timing::new(start, end));
        if parsed.is_none() {
            warn!("Banner {}: malformed timing {:?}, it will not be time-triggered", id, t);
        }
        parsed
    });

    let position = attrs
        .get("position")
        .and_then(|p| Corner::parse(p))
        .or_else(|| Layout::derive_position(&segments));

    debug!("Parsed banner {} with {} segment(s)", id, segments.len());
    Ok(Some(Banner {
        id,
        timing,
        layout: Layout { segments, position },
        content,
        behavior,
        metadata: BannerMetadata::default(),
    }))
}

/// Parse a time offset: plain seconds or `HH:MM:SS[.mmm]`
pub fn parse_offset(value: &str) -> Option<f64> {
    let value = value.trim();
    let seconds = if value.contains(':') {
        let parts: Vec<&str> = value.split(':').collect();
        let [hours, minutes, seconds] = parts.as_slice() else {
            return None;
        };
        let hours = hours.parse::<u32>().ok()? as f64;
        let minutes = minutes.parse::<u32>().ok()? as f64;
        let seconds = seconds.parse::<f64>().ok()?;
        if minutes >= 60.0 || seconds >= 60.0 {
            return None;
        }
        hours * 3600.0 + minutes * 60.0 + seconds
    } else {
        value.parse::<f64>().ok()?
    };
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

fn parse_layout(reader: &mut Reader<&[u8]>) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"Segment" => {
                segments.push(segment_from(&attributes(e), segments.len()));
            }
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Segment" => {
                segments.push(segment_from(&attributes(e), segments.len()));
                skip_element(reader)?;
            }
            Ok(Event::Start(_)) => skip_element(reader)?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Layout" => break,
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(segments)
}

/// Decide the segment shape from whichever attributes are present
fn segment_from(attrs: &HashMap<String, String>, index: usize) -> Segment {
    let id = attrs
        .get("id")
        .cloned()
        .unwrap_or_else(|| format!("segment-{index}"));
    let position = attrs.get("position");
    let width = number(attrs, "width");
    let height = number(attrs, "height");

    let shape = match (number(attrs, "x"), number(attrs, "y")) {
        (Some(x), Some(y)) => SegmentShape::Absolute(AbsoluteSegment {
            x,
            y,
            width: width.unwrap_or(0.0),
            height: height.unwrap_or(0.0),
            orientation: attrs.get("type").and_then(|t| match t.to_ascii_lowercase().as_str() {
                "horizontal" => Some(Orientation::Horizontal),
                "vertical" => Some(Orientation::Vertical),
                _ => None,
            }),
            hint: position.and_then(|p| Edge::parse(p)),
        }),
        _ => match position.and_then(|p| Edge::parse(p)) {
            Some(edge) => SegmentShape::Relative(RelativeSegment {
                edge,
                width: width.unwrap_or(0.0),
                height: height.unwrap_or(0.0),
            }),
            None => SegmentShape::Unplaced {
                position: position.cloned(),
            },
        },
    };

    Segment { id, shape }
}

fn parse_elements(reader: &mut Reader<&[u8]>) -> Result<Vec<Element>> {
    let mut elements = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Element" => {
                if let Some(element) = parse_element(reader, e)? {
                    elements.push(element);
                }
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"Element" => {
                if let Some(element) = element_from(&attributes(e), None, None, Buttons::None) {
                    elements.push(element);
                }
            }
            Ok(Event::Start(_)) => skip_element(reader)?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Elements" => break,
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(elements)
}

fn parse_element(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<Option<Element>> {
    let attrs = attributes(start);
    let mut media_url = None;
    let mut poll = None;
    let mut buttons = Buttons::None;

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"LegacyButton" => {
                buttons = Buttons::Legacy(legacy_button(&attributes(e)));
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"Poll" => {
                poll = Some(poll_from(&attributes(e)));
            }
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Media" => media_url = Some(read_text_element(reader)?).filter(|url| !url.is_empty()),
                b"Poll" => {
                    let mut parsed = poll_from(&attributes(e));
                    parsed.options = parse_poll_options(reader)?;
                    poll = Some(parsed);
                }
                b"LegacyButton" => {
                    buttons = Buttons::Legacy(legacy_button(&attributes(e)));
                    skip_element(reader)?;
                }
                b"Buttons" => buttons = Buttons::Vsat(parse_buttons(reader)?),
                _ => skip_element(reader)?,
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Element" => break,
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(element_from(&attrs, media_url, poll, buttons))
}

fn element_from(
    attrs: &HashMap<String, String>,
    media_url: Option<String>,
    poll: Option<Poll>,
    buttons: Buttons,
) -> Option<Element> {
    let Some(segment_id) = attrs.get("segmentId").cloned() else {
        warn!("Element without segmentId, skipping");
        return None;
    };

    Some(Element {
        segment_id,
        kind: attrs
            .get("type")
            .map_or(ElementKind::None, |t| ElementKind::parse(t)),
        media_url,
        poll,
        buttons,
    })
}

fn poll_from(attrs: &HashMap<String, String>) -> Poll {
    Poll {
        heading: attrs.get("heading").cloned(),
        question: attrs.get("question").cloned(),
        tagline: attrs.get("tagline").cloned(),
        options: Vec::new(),
    }
}

fn parse_poll_options(reader: &mut Reader<&[u8]>) -> Result<Vec<String>> {
    let mut options = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Option" => {
                options.push(read_text_element(reader)?);
            }
            Ok(Event::Start(_)) => skip_element(reader)?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Poll" => break,
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(options)
}

fn legacy_button(attrs: &HashMap<String, String>) -> LegacyButton {
    LegacyButton {
        show: flag(attrs, "show"),
        text: attrs.get("text").cloned().unwrap_or_default(),
        color: attrs.get("color").cloned(),
        url: attrs.get("url").cloned(),
    }
}

fn parse_buttons(reader: &mut Reader<&[u8]>) -> Result<Vec<VsatButton>> {
    let mut buttons = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Button" => {
                if let Some(button) = parse_button(reader, e)? {
                    buttons.push(button);
                }
            }
            Ok(Event::Start(_)) => skip_element(reader)?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Buttons" => break,
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(buttons)
}

/// Parse one VSAT Button; buttons without an id or an action are dropped
fn parse_button(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<Option<VsatButton>> {
    let attrs = attributes(start);
    let mut label = attrs.get("label").cloned().unwrap_or_default();
    let mut action = None;
    let mut tracking = ButtonTracking::default();

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Label" => label = read_text_element(reader)?,
                b"Action" => {
                    let kind = attributes(e).remove("type").unwrap_or_default();
                    action = Some(ButtonAction::parse(&kind, read_text_element(reader)?));
                }
                b"Tracking" => {
                    let event = attributes(e).remove("event").unwrap_or_default();
                    let url = read_text_element(reader)?;
                    match event.to_ascii_lowercase().as_str() {
                        "click" => tracking.click.push(url),
                        "viewable" => tracking.viewable.push(url),
                        other => debug!("Ignoring button tracking event {:?}", other),
                    }
                }
                _ => skip_element(reader)?,
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Button" => break,
            Ok(Event::Eof) => {
                return Err(BannerError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(BannerError::Xml(e)),
            _ => (),
        }
        buf.clear();
    }

    let Some(id) = attrs.get("id").cloned() else {
        warn!("Button without id, skipping");
        return Ok(None);
    };
    let Some(action) = action else {
        warn!("Button {} has no action, skipping", id);
        return Ok(None);
    };

    let rect = match (
        number(&attrs, "x"),
        number(&attrs, "y"),
        number(&attrs, "width"),
        number(&attrs, "height"),
    ) {
        (Some(x), Some(y), Some(width), Some(height)) => Some(ButtonRect { x, y, width, height }),
        _ => None,
    };

    Ok(Some(VsatButton {
        id,
        label,
        role: attrs.get("role").cloned(),
        rect,
        action,
        tracking,
        default_focus: flag(&attrs, "defaultFocus"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<VAST version="4.1">
  <Ad id="ad-42">
    <InLine>
      <AdSystem version="2">Acme Ads</AdSystem>
      <AdTitle>Spring Sale</AdTitle>
      <Impression><![CDATA[https://t.example.com/imp?ad=42]]></Impression>
      <Creatives><Creative><Linear><Duration>00:00:15</Duration></Linear></Creative></Creatives>
      <Extensions>
        <Extension type="other"><Whatever><Nested>1</Nested></Whatever></Extension>
        <Extension type="VSAT">
          <LBanner id="spring" position="bottom-left">
            <Timing start="5" end="00:00:12.5"/>
            <Behavior showCloseButton="true"/>
            <Layout>
              <Segment id="side" x="0" y="0" width="300" height="620" type="vertical"/>
              <Segment id="strip" position="bottom" width="1280" height="100"/>
              <Segment id="odd" position="center"/>
            </Layout>
            <Elements>
              <Element segmentId="side" type="image">
                <Media><![CDATA[https://cdn.example.com/side.png]]></Media>
                <Buttons>
                  <Button id="cta" role="primary" defaultFocus="true" x="10" y="500" width="120" height="40">
                    <Label>Shop now</Label>
                    <Action type="clickthrough">https://shop.example.com/?a=1&amp;b=2</Action>
                    <Tracking event="click">https://t.example.com/click</Tracking>
                    <Tracking event="viewable">https://t.example.com/view</Tracking>
                  </Button>
                  <Button id="broken"><Label>No action</Label></Button>
                </Buttons>
              </Element>
              <Element segmentId="strip" type="poll">
                <Poll heading="Quick poll" question="Which colour?">
                  <Option>Red</Option>
                  <Option>Blue</Option>
                </Poll>
                <LegacyButton show="true" text="Vote" color="#ff0" url="https://vote.example.com"/>
              </Element>
              <Element type="image"><Media>https://cdn.example.com/orphan.png</Media></Element>
            </Elements>
          </LBanner>
          <LBanner id="late">
            <Timing start="30" end="20"/>
            <Layout><Segment id="top" position="top" height="80"/></Layout>
          </LBanner>
        </Extension>
      </Extensions>
    </InLine>
  </Ad>
</VAST>"##;

    #[test]
    fn test_parse_banner_fields() {
        let vast = parse_vast(SAMPLE).unwrap();
        assert_eq!(vast.version, "4.1");
        assert_eq!(vast.ads.len(), 1);

        let ad = &vast.ads[0];
        assert_eq!(ad.ad_system.as_deref(), Some("Acme Ads"));
        assert_eq!(ad.banners.len(), 2);

        let banner = &ad.banners[0];
        assert_eq!(banner.id, "spring");
        assert_eq!(banner.timing, Timing::new(5.0, 12.5));
        assert!(banner.behavior.show_close_button);
        assert_eq!(banner.layout.position, Some(Corner::BottomLeft));
        assert_eq!(banner.metadata.ad_id.as_deref(), Some("ad-42"));
        assert_eq!(banner.metadata.impressions, vec!["https://t.example.com/imp?ad=42"]);
    }

    #[test]
    fn test_parse_segment_shapes() {
        let set = parse_banners(SAMPLE).unwrap();
        let segments = &set.get("spring").unwrap().layout.segments;

        assert!(matches!(
            segments[0].shape,
            SegmentShape::Absolute(AbsoluteSegment {
                width: 300.0,
                orientation: Some(Orientation::Vertical),
                ..
            })
        ));
        assert_eq!(
            segments[1].shape,
            SegmentShape::Relative(RelativeSegment {
                edge: Edge::Bottom,
                width: 1280.0,
                height: 100.0
            })
        );
        assert_eq!(
            segments[2].shape,
            SegmentShape::Unplaced {
                position: Some("center".to_string())
            }
        );
    }

    #[test]
    fn test_parse_elements_and_buttons() {
        let set = parse_banners(SAMPLE).unwrap();
        let content = &set.get("spring").unwrap().content;
        assert_eq!(content.len(), 2, "element without segmentId is dropped");

        let Buttons::Vsat(buttons) = &content[0].buttons else {
            panic!("expected VSAT buttons");
        };
        assert_eq!(buttons.len(), 1, "button without action is dropped");
        let cta = &buttons[0];
        assert_eq!(cta.label, "Shop now");
        assert!(cta.default_focus);
        assert_eq!(
            cta.action,
            ButtonAction::Clickthrough("https://shop.example.com/?a=1&b=2".to_string())
        );
        assert_eq!(cta.tracking.viewable, vec!["https://t.example.com/view"]);
        assert_eq!(cta.rect.map(|r| r.width), Some(120.0));

        let strip = &content[1];
        assert_eq!(strip.kind, ElementKind::Poll);
        assert_eq!(strip.poll.as_ref().unwrap().options, vec!["Red", "Blue"]);
        let Buttons::Legacy(legacy) = &strip.buttons else {
            panic!("expected legacy button");
        };
        assert!(legacy.show);
        assert_eq!(legacy.url.as_deref(), Some("https://vote.example.com"));
    }

    #[test]
    fn test_inverted_timing_is_dropped() {
        let set = parse_banners(SAMPLE).unwrap();
        let late = set.get("late").unwrap();
        assert!(late.timing.is_none());
        assert_eq!(late.layout.position, Some(Corner::TopLeft));
    }

    #[test]
    fn test_wrapper_uri_is_recorded() {
        let xml = r#"<VAST version="3.0"><Ad id="w"><Wrapper>
            <AdSystem>Relay</AdSystem>
            <VASTAdTagURI><![CDATA[https://ads.example.com/next.xml]]></VASTAdTagURI>
            <Impression>https://relay.example.com/imp</Impression>
        </Wrapper></Ad></VAST>"#;
        let vast = parse_vast(xml).unwrap();
        assert_eq!(vast.ads[0].wrapper_uri.as_deref(), Some("https://ads.example.com/next.xml"));
        assert!(vast.ads[0].banners.is_empty());
    }

    #[test]
    fn test_version_is_required() {
        assert!(matches!(
            parse_vast("<VAST><Ad/></VAST>"),
            Err(BannerError::MissingField(_))
        ));
        assert!(matches!(
            parse_vast(r#"<VAST version="9.0"></VAST>"#),
            Err(BannerError::InvalidVersion(_))
        ));
        assert!(matches!(parse_vast("<html/>"), Err(BannerError::MissingField(_))));
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("7.5"), Some(7.5));
        assert_eq!(parse_offset("00:01:05"), Some(65.0));
        assert_eq!(parse_offset("01:00:00.250"), Some(3600.25));
        assert_eq!(parse_offset("-3"), None);
        assert_eq!(parse_offset("00:99:00"), None);
        assert_eq!(parse_offset("soon"), None);
    }
}
