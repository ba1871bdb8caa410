// ABOUTME: Markdown image discovery and in-place substitution
// ABOUTME: Walks pulldown-cmark events with an explicit ancestor stack and splices by byte range

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use std::ops::Range;

/// One markdown image occurrence with its link context and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageNode {
    pub url: String,
    pub alt: Option<String>,
    pub title: Option<String>,
    /// Byte range of the image syntax in the source document
    pub range: Range<usize>,
    /// The image is wrapped by a markdown link or an open raw `<a>` run
    pub in_link: bool,
    /// The image directly follows text or another image on the same line
    pub inline: bool,
}

/// Ancestor kinds threaded through the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ancestor {
    Link,
    Image,
    Other,
}

/// Pure link-context predicate over an ancestor stack.
pub fn is_inside_link(ancestors: &[Ancestor]) -> bool {
    ancestors.contains(&Ancestor::Link)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Preceding {
    Text,
    Image,
    Other,
}

struct PendingImage {
    url: String,
    title: Option<String>,
    alt: String,
    range: Range<usize>,
    in_link: bool,
    inline: bool,
}

/// Find every image in a markdown document, with ancestors tracked
/// explicitly so link context never depends on traversal side effects.
pub fn scan(source: &str) -> Vec<ImageNode> {
    let mut markdown_options = Options::empty();
    markdown_options.insert(Options::ENABLE_TABLES);
    markdown_options.insert(Options::ENABLE_STRIKETHROUGH);
    markdown_options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(source, markdown_options);

    let mut images = Vec::new();
    let mut ancestors: Vec<Ancestor> = Vec::new();
    let mut pending: Option<PendingImage> = None;
    let mut open_html_anchors: i32 = 0;
    let mut preceding: Option<Preceding> = None;

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(Tag::Image {
                dest_url, title, ..
            }) => {
                let in_link = is_inside_link(&ancestors) || open_html_anchors > 0;
                let inline = matches!(preceding, Some(Preceding::Text | Preceding::Image));
                pending = Some(PendingImage {
                    url: dest_url.to_string(),
                    title: (!title.is_empty()).then(|| title.to_string()),
                    alt: String::new(),
                    range: range.clone(),
                    in_link,
                    inline,
                });
                ancestors.push(Ancestor::Image);
            }
            Event::End(TagEnd::Image) => {
                ancestors.pop();
                if let Some(done) = pending.take() {
                    images.push(ImageNode {
                        url: done.url,
                        alt: (!done.alt.is_empty()).then_some(done.alt),
                        title: done.title,
                        range: done.range,
                        in_link: done.in_link,
                        inline: done.inline,
                    });
                }
                preceding = Some(Preceding::Image);
            }
            Event::Start(tag) => {
                // Inline containers keep their surrounding flow; block
                // containers start a fresh one
                if !is_inline_container(&tag) {
                    preceding = None;
                }
                ancestors.push(match tag {
                    Tag::Link { .. } => Ancestor::Link,
                    _ => Ancestor::Other,
                });
            }
            Event::End(end) => {
                ancestors.pop();
                preceding = match end {
                    TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                        Some(Preceding::Other)
                    }
                    _ => None,
                };
            }
            Event::Text(text) => {
                if let Some(image) = pending.as_mut() {
                    image.alt.push_str(&text);
                } else {
                    preceding = Some(Preceding::Text);
                }
            }
            Event::Code(_) | Event::FootnoteReference(_) | Event::TaskListMarker(_) => {
                if pending.is_none() {
                    preceding = Some(Preceding::Other);
                }
            }
            Event::SoftBreak | Event::HardBreak | Event::Rule => {
                preceding = None;
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                open_html_anchors =
                    (open_html_anchors + anchor_delta(&html)).max(0);
                if pending.is_none() {
                    preceding = Some(Preceding::Other);
                }
            }
            _ => {}
        }
    }

    images
}

fn is_inline_container(tag: &Tag<'_>) -> bool {
    matches!(
        tag,
        Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. }
    )
}

/// Net change in open raw `<a>` elements contributed by an HTML run.
fn anchor_delta(html: &str) -> i32 {
    let ends_tag_name = |offset: usize| {
        matches!(
            html.as_bytes().get(offset).copied(),
            Some(b' ') | Some(b'>') | Some(b'\t') | Some(b'\n') | Some(b'/')
        )
    };

    let opens = html
        .match_indices("<a")
        .filter(|(i, _)| ends_tag_name(i + 2))
        .count() as i32;
    let closes = html
        .match_indices("</a")
        .filter(|(i, _)| ends_tag_name(i + 3))
        .count() as i32;
    opens - closes
}

/// Substitute replacement fragments into the source by byte range.
///
/// Ranges must come from `scan` on the same source; overlapping or
/// out-of-bounds ranges are skipped rather than corrupting the output.
/// Untouched parts of the document are preserved byte for byte.
pub fn splice(source: &str, mut replacements: Vec<(Range<usize>, String)>) -> String {
    replacements.sort_by_key(|(range, _)| range.start);

    let mut output = String::with_capacity(source.len());
    let mut cursor = 0;
    for (range, replacement) in replacements {
        if range.start < cursor || range.end > source.len() || range.start > range.end {
            log::warn!("skipping unusable replacement range {:?}", range);
            continue;
        }
        output.push_str(&source[cursor..range.start]);
        output.push_str(&replacement);
        cursor = range.end;
    }
    output.push_str(&source[cursor..]);
    output
}
