//! Reference list and citation annotation of rendered HTML.
//!
//! Three passes run over the HTML produced by [`crate::markdown`]:
//!
//! 1. The first `<h2>` whose text is the references heading opens a
//!    `<div class="references" id="references-section">` that runs to the end
//!    of the document, or up to the footnotes block when there is one. The id
//!    carries the page break in the stylesheet.
//! 2. Inside that container, list items shaped like
//!    `Author. (2024). *Title*. https://url` become
//!    `<li id="ref-N">Author. (2024). <a href="https://url">Title</a>.`
//!    where N is one more than the number of `<li` tags before the item.
//!    Items of any other shape are left as they are.
//! 3. Every `[n]` in the document becomes `<a href="#ref-n">[n]</a>`, whether
//!    or not a `ref-n` anchor exists.

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::{Captures, Regex};

pub const CONTAINER_OPEN: &str = r#"<div class="references" id="references-section">"#;
pub const CONTAINER_ID: &str = "references-section";
/// Start of the block comrak appends after the last paragraph for footnote
/// definitions.
const FOOTNOTES_OPEN: &str = r#"<section class="footnotes""#;

lazy_static! {
    static ref REFERENCE_ITEM: Regex = Regex::new(
        r#"<li>(\s*<p>)?(.*?)\.\s*\((\d{4})\)\.\s*(?:<em>(.*?)</em>|\*(.*?)\*)\.\s*(https?://[^\s<>"]+)"#
    )
    .unwrap();
    static ref LIST_ITEM_OPEN: Regex = Regex::new(r"<li[\s>]").unwrap();
    static ref CITATION: Regex = Regex::new(r"\[(\d+)\]").unwrap();
}

/// A reference list item that matched the expected shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    /// 1-based position among the list items of the references section.
    pub ordinal: usize,
    pub author: String,
    pub year: String,
    pub title: String,
    pub url: String,
}

impl ReferenceEntry {
    pub fn anchor(&self) -> String {
        anchor_id(self.ordinal)
    }
}

/// Anchor id of the n-th reference.
pub fn anchor_id(ordinal: usize) -> String {
    format!("ref-{}", ordinal)
}

/// Result of [`annotate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotated {
    pub html: String,
    pub entries: Vec<ReferenceEntry>,
    /// List items inside the references section that were left untouched.
    pub unmatched: usize,
    /// Whether a references heading was found.
    pub has_section: bool,
}

/// Runs all three passes over the rendered body.
///
/// ```
/// use proposal2pdf::references::annotate;
///
/// let html = "<p>As shown [1].</p>\n<h2 id=\"references\">References</h2>\n<ol>\n\
///             <li>Roe, J. (2021). <em>Soil</em>. https://example.org/soil</li>\n</ol>\n";
/// let out = annotate(html.to_string(), "References");
/// assert!(out.html.contains(r##"<a href="#ref-1">[1]</a>"##));
/// assert!(out.html.contains(r#"<li id="ref-1">Roe, J. (2021). <a href="https://example.org/soil">Soil</a>.</li>"#));
/// assert_eq!(out.entries.len(), 1);
/// ```
pub fn annotate(html: String, heading: &str) -> Annotated {
    let (html, entries, unmatched, has_section) = match wrap_references_section(&html, heading) {
        Some((wrapped, entries, unmatched)) => (wrapped, entries, unmatched, true),
        None => {
            warn!("No '{}' heading found; reference list left unstyled", heading);
            (html, Vec::new(), 0, false)
        }
    };

    Annotated {
        html: link_citations(&html),
        entries,
        unmatched,
        has_section,
    }
}

/// Finds the first `<h2>` (optionally carrying an `id`) whose text is `heading`.
///
/// Returns the byte offsets of the element's start and end.
pub fn split_references_section(html: &str, heading: &str) -> Option<(usize, usize)> {
    let pattern = format!(
        r#"<h2(?:\s+id="[^"]*")?>\s*{}\s*</h2>"#,
        regex::escape(heading)
    );
    let re = Regex::new(&pattern).ok()?;
    re.find(html).map(|m| (m.start(), m.end()))
}

/// Byte range of the references section: from the heading to the footnotes
/// block, or to the end of `html` when there are no footnotes after it.
pub fn references_section_bounds(html: &str, heading: &str) -> Option<(usize, usize)> {
    let (start, heading_end) = split_references_section(html, heading)?;
    let end = html[heading_end..]
        .find(FOOTNOTES_OPEN)
        .map(|offset| heading_end + offset)
        .unwrap_or(html.len());
    Some((start, end))
}

/// Wraps the references section in the references container and links its
/// entries. Returns the new document, the linked entries and the number of
/// items left as-is; `None` when there is no references heading.
pub fn wrap_references_section(
    html: &str,
    heading: &str,
) -> Option<(String, Vec<ReferenceEntry>, usize)> {
    let (start, end) = references_section_bounds(html, heading)?;
    let (section, entries, unmatched) = link_reference_entries(&html[start..end]);

    let mut wrapped = String::with_capacity(html.len() + CONTAINER_OPEN.len() + 16);
    wrapped.push_str(&html[..start]);
    wrapped.push_str(CONTAINER_OPEN);
    wrapped.push_str(&section);
    wrapped.push_str("</div>\n");
    wrapped.push_str(&html[end..]);
    debug!(
        "References section spans bytes {}..{}: {} linked, {} left as-is",
        start,
        end,
        entries.len(),
        unmatched
    );
    Some((wrapped, entries, unmatched))
}

/// Rewrites matching list items of a references section into anchored entries.
///
/// Ordinals come from counting `<li` tags that precede each match in the
/// unmodified section, so unmatched items still take up a number.
pub fn link_reference_entries(section: &str) -> (String, Vec<ReferenceEntry>, usize) {
    let mut entries = Vec::new();

    let linked = REFERENCE_ITEM
        .replace_all(section, |caps: &Captures| {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            let ordinal = LIST_ITEM_OPEN.find_iter(&section[..start]).count() + 1;
            let paragraph = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let title = caps
                .get(4)
                .or_else(|| caps.get(5))
                .map(|m| m.as_str())
                .unwrap_or("");
            let entry = ReferenceEntry {
                ordinal,
                author: caps[2].to_string(),
                year: caps[3].to_string(),
                title: title.to_string(),
                url: caps[6].to_string(),
            };
            let rewritten = format!(
                "<li id=\"{}\">{}{}. ({}). <a href=\"{}\">{}</a>.",
                entry.anchor(),
                paragraph,
                entry.author,
                entry.year,
                entry.url,
                entry.title
            );
            entries.push(entry);
            rewritten
        })
        .into_owned();

    let total = LIST_ITEM_OPEN.find_iter(section).count();
    let unmatched = total.saturating_sub(entries.len());
    (linked, entries, unmatched)
}

/// Turns every `[n]` into a link to `#ref-n`.
pub fn link_citations(html: &str) -> String {
    CITATION
        .replace_all(html, r##"<a href="#ref-$1">[$1]</a>"##)
        .into_owned()
}
