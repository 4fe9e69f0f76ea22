//! Content organization: merge positioned text and image markers into
//! reading-order lines.
//!
//! Input coordinates are y-down (the extractor flips pdfium's bottom-left
//! origin before calling in here). Items are banded into lines with a small
//! vertical tolerance, then a second pass corrects multi-column layouts
//! where an image's vertical anchor lags its true reading position by
//! pulling nearby images up into the line that already contains one.
//!
//! Two renditions come out: `raw_text` (text only, no placeholders) and
//! `formatted_text` (text interleaved with `[IMAGE_n]` tokens, one line per
//! visual line).

use crate::document::PageContent;

/// A positioned text run on the page, y increasing downward.
#[derive(Debug, Clone)]
pub struct TextItem {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// A positioned image placeholder on the page.
#[derive(Debug, Clone)]
pub struct ImageMarker {
    pub placeholder: String,
    pub x: f32,
    pub y: f32,
}

/// Items within this vertical distance of a line's first item share the line.
const LINE_TOLERANCE: f32 = 5.0;

/// How many subsequent lines the image pull-up pass inspects.
const IMAGE_PULL_LOOKAHEAD: usize = 2;

/// An image with no text this close (horizontally) is "isolated" and may be
/// pulled up to the nearest image-bearing line.
const TEXT_CLEARANCE: f32 = 50.0;

/// An image vertically this close to an anchor line belongs to it.
const VERTICAL_SNAP: f32 = 20.0;

#[derive(Debug, Clone)]
enum ItemKind {
    Text(String),
    Image(String),
}

#[derive(Debug, Clone)]
struct Item {
    kind: ItemKind,
    x: f32,
    y: f32,
}

#[derive(Debug)]
struct Line {
    anchor_y: f32,
    items: Vec<Item>,
}

impl Line {
    fn has_image(&self) -> bool {
        self.items
            .iter()
            .any(|i| matches!(i.kind, ItemKind::Image(_)))
    }
}

/// Merge a page's text items and image markers into reading-order content.
///
/// `full_page_scan` is the placeholder of a full-page scan, prepended before
/// all positioned content when present. A page with only a scan marker and
/// no other content yields `formatted_text` equal to exactly that
/// placeholder.
pub fn organize_page(
    text_items: &[TextItem],
    image_markers: &[ImageMarker],
    full_page_scan: Option<&str>,
) -> PageContent {
    let mut items: Vec<Item> = Vec::with_capacity(text_items.len() + image_markers.len());
    for t in text_items {
        if t.text.trim().is_empty() {
            continue;
        }
        items.push(Item {
            kind: ItemKind::Text(t.text.trim().to_string()),
            x: t.x,
            y: t.y,
        });
    }
    for m in image_markers {
        items.push(Item {
            kind: ItemKind::Image(m.placeholder.clone()),
            x: m.x,
            y: m.y,
        });
    }

    let mut lines = band_into_lines(items);
    pull_up_nearby_images(&mut lines);

    for line in &mut lines {
        line.items
            .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    }

    let mut formatted_lines: Vec<String> = Vec::with_capacity(lines.len() + 1);
    if let Some(scan) = full_page_scan {
        formatted_lines.push(scan.to_string());
    }

    let mut raw_lines: Vec<String> = Vec::with_capacity(lines.len());

    for line in &lines {
        let mut formatted_parts: Vec<&str> = Vec::with_capacity(line.items.len());
        let mut raw_parts: Vec<&str> = Vec::new();
        for item in &line.items {
            match &item.kind {
                ItemKind::Text(text) => {
                    formatted_parts.push(text);
                    raw_parts.push(text);
                }
                ItemKind::Image(placeholder) => formatted_parts.push(placeholder),
            }
        }
        if !formatted_parts.is_empty() {
            formatted_lines.push(formatted_parts.join(" "));
        }
        if !raw_parts.is_empty() {
            raw_lines.push(raw_parts.join(" "));
        }
    }

    PageContent {
        raw_text: raw_lines.join("\n"),
        formatted_text: formatted_lines.join("\n"),
    }
}

/// Sort by y, then group items within [`LINE_TOLERANCE`] of a line's first
/// item into that line.
fn band_into_lines(mut items: Vec<Item>) -> Vec<Line> {
    items.sort_by(|a, b| {
        a.y.partial_cmp(&b.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lines: Vec<Line> = Vec::new();
    for item in items {
        match lines.last_mut() {
            Some(line) if (item.y - line.anchor_y).abs() <= LINE_TOLERANCE => {
                line.items.push(item);
            }
            _ => lines.push(Line {
                anchor_y: item.y,
                items: vec![item],
            }),
        }
    }
    lines
}

/// Second pass: for each image-bearing line, pull images from the next
/// [`IMAGE_PULL_LOOKAHEAD`] lines into it when they are isolated from text
/// ([`TEXT_CLEARANCE`]) or vertically close to the anchor
/// ([`VERTICAL_SNAP`]). Corrects multi-column layouts where an image's
/// y-anchor lags its true reading position.
fn pull_up_nearby_images(lines: &mut Vec<Line>) {
    let mut i = 0;
    while i < lines.len() {
        if lines[i].has_image() {
            let anchor_y = lines[i].anchor_y;
            let last = (i + IMAGE_PULL_LOOKAHEAD).min(lines.len().saturating_sub(1));
            for j in (i + 1)..=last {
                if j >= lines.len() {
                    break;
                }
                let pulled = take_pullable_images(&mut lines[j], anchor_y);
                lines[i].items.extend(pulled);
            }
        }
        i += 1;
    }
    lines.retain(|l| !l.items.is_empty());
}

fn take_pullable_images(line: &mut Line, anchor_y: f32) -> Vec<Item> {
    let text_positions: Vec<f32> = line
        .items
        .iter()
        .filter(|i| matches!(i.kind, ItemKind::Text(_)))
        .map(|i| i.x)
        .collect();

    let mut pulled = Vec::new();
    let mut kept = Vec::with_capacity(line.items.len());
    for item in line.items.drain(..) {
        let is_image = matches!(item.kind, ItemKind::Image(_));
        let isolated = text_positions
            .iter()
            .all(|tx| (tx - item.x).abs() > TEXT_CLEARANCE);
        let near_anchor = (item.y - anchor_y).abs() <= VERTICAL_SNAP;
        if is_image && (isolated || near_anchor) {
            pulled.push(item);
        } else {
            kept.push(item);
        }
    }
    line.items = kept;
    pulled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str, x: f32, y: f32) -> TextItem {
        TextItem {
            text: s.to_string(),
            x,
            y,
        }
    }

    fn image(placeholder: &str, x: f32, y: f32) -> ImageMarker {
        ImageMarker {
            placeholder: placeholder.to_string(),
            x,
            y,
        }
    }

    #[test]
    fn single_text_run() {
        let content = organize_page(&[text("Hello", 10.0, 100.0)], &[], None);
        assert_eq!(content.raw_text, "Hello");
        assert_eq!(content.formatted_text, "Hello");
    }

    #[test]
    fn items_within_tolerance_share_a_line() {
        let content = organize_page(
            &[text("world", 50.0, 102.0), text("Hello", 10.0, 100.0)],
            &[],
            None,
        );
        assert_eq!(content.raw_text, "Hello world");
    }

    #[test]
    fn items_beyond_tolerance_split_lines() {
        let content = organize_page(
            &[text("Hello", 10.0, 100.0), text("world", 10.0, 120.0)],
            &[],
            None,
        );
        assert_eq!(content.raw_text, "Hello\nworld");
    }

    #[test]
    fn placeholders_appear_only_in_formatted_text() {
        let content = organize_page(
            &[text("Figure caption", 10.0, 100.0)],
            &[image("[IMAGE_1]", 200.0, 100.0)],
            None,
        );
        assert_eq!(content.raw_text, "Figure caption");
        assert_eq!(content.formatted_text, "Figure caption [IMAGE_1]");
    }

    #[test]
    fn isolated_image_pulled_into_anchor_line() {
        // The second image lands a line below its column partner but has no
        // text nearby; the pull-up pass reunites them.
        let content = organize_page(
            &[text("caption", 10.0, 100.0)],
            &[image("[IMAGE_1]", 120.0, 100.0), image("[IMAGE_2]", 300.0, 130.0)],
            None,
        );
        let first_line = content.formatted_text.lines().next().unwrap();
        assert!(first_line.contains("[IMAGE_1]"));
        assert!(first_line.contains("[IMAGE_2]"));
    }

    #[test]
    fn image_near_text_stays_on_its_own_line() {
        let content = organize_page(
            &[text("caption", 10.0, 100.0), text("body", 290.0, 130.0)],
            &[image("[IMAGE_1]", 120.0, 100.0), image("[IMAGE_2]", 300.0, 130.0)],
            None,
        );
        // [IMAGE_2] has text within 50 units and sits 30 below the anchor:
        // neither pull condition holds.
        let lines: Vec<&str> = content.formatted_text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("[IMAGE_2]"));
    }

    #[test]
    fn vertically_close_image_pulled_despite_text() {
        let content = organize_page(
            &[text("caption", 10.0, 100.0), text("body", 290.0, 112.0)],
            &[image("[IMAGE_1]", 120.0, 100.0), image("[IMAGE_2]", 300.0, 112.0)],
            None,
        );
        // 12 units below the anchor is within the vertical snap band.
        let first_line = content.formatted_text.lines().next().unwrap();
        assert!(first_line.contains("[IMAGE_2]"));
    }

    #[test]
    fn scan_only_page_is_exactly_the_placeholder() {
        let content = organize_page(&[], &[], Some("[IMAGE_1]"));
        assert_eq!(content.formatted_text, "[IMAGE_1]");
        assert_eq!(content.raw_text, "");
    }

    #[test]
    fn scan_marker_prepends_positioned_content() {
        let content = organize_page(&[text("Hello", 10.0, 100.0)], &[], Some("[IMAGE_3]"));
        assert_eq!(content.formatted_text, "[IMAGE_3]\nHello");
        assert_eq!(content.raw_text, "Hello");
    }

    #[test]
    fn whitespace_only_text_items_are_dropped() {
        let content = organize_page(
            &[text("   ", 10.0, 100.0), text("kept", 10.0, 120.0)],
            &[],
            None,
        );
        assert_eq!(content.raw_text, "kept");
    }

    #[test]
    fn empty_page_is_empty() {
        let content = organize_page(&[], &[], None);
        assert_eq!(content.raw_text, "");
        assert_eq!(content.formatted_text, "");
    }
}
