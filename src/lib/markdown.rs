//! Markdown to HTML rendering.
//!
//! comrak parses CommonMark and renders tables, footnotes and smart
//! punctuation. Header ids and the table of contents are produced by passes
//! over comrak's output so that headings come out as plain
//! `<h2 id="slug">Text</h2>` elements, which the reference annotator matches on.

use crate::highlighting;
use crate::settings::{MarkdownExtension, MarkdownSettings};
use comrak::{markdown_to_html, Options};
use lazy_static::lazy_static;
use log::debug;
use regex::{Captures, NoExpand, Regex};
use std::collections::HashMap;

lazy_static! {
    static ref HEADING: Regex = Regex::new(r"(?s)<h([1-6])>(.*?)</h[1-6]>").unwrap();
    static ref TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref ENTITY: Regex = Regex::new(r"&#?[A-Za-z0-9]+;").unwrap();
    static ref TOC_MARKER: Regex = Regex::new(r"<p>\[TOC\]</p>\n?").unwrap();
}

/// A heading found in the rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub id: String,
    /// Heading content with tags removed, still HTML-escaped.
    pub text: String,
}

/// Renders the markdown body to an HTML fragment.
///
/// Never fails: malformed markdown degrades to best-effort HTML.
///
/// ```
/// use proposal2pdf::markdown::render_markdown;
/// use proposal2pdf::settings::MarkdownSettings;
///
/// let html = render_markdown("## Aims\n\n| a | b |\n|---|---|\n| 1 | 2 |", &MarkdownSettings::default());
/// assert!(html.contains(r#"<h2 id="aims">Aims</h2>"#));
/// assert!(html.contains("<table>"));
/// ```
pub fn render_markdown(body: &str, settings: &MarkdownSettings) -> String {
    let mut options = Options::default();
    options.extension.table = settings.has(MarkdownExtension::Tables);
    options.extension.footnotes = settings.has(MarkdownExtension::Footnotes);
    options.parse.smart = settings.has(MarkdownExtension::SmartyPants);
    options.render.unsafe_ = true;

    let mut html = markdown_to_html(body, &options);
    debug!("comrak produced {} bytes of HTML", html.len());

    if settings.highlight && settings.has(MarkdownExtension::FencedCodeBlocks) {
        html = highlighting::highlight_code_blocks(&html, &settings.highlight_theme);
    }

    // The table of contents links to heading ids, so it needs them too.
    let wants_toc = settings.has(MarkdownExtension::Toc);
    if settings.has(MarkdownExtension::HeaderIds) || wants_toc {
        let (with_ids, headings) = add_header_ids(&html);
        html = with_ids;
        if wants_toc {
            html = insert_toc(&html, &headings);
        }
    }
    html
}

/// Turns heading text into an id: lowercase, alphanumerics kept, runs of
/// whitespace and dashes collapsed to a single `-`.
pub fn slugify(heading_html: &str) -> String {
    let text = TAG.replace_all(heading_html, "");
    let text = ENTITY.replace_all(&text, " ");
    let mut slug = String::new();
    let mut pending_dash = false;
    for ch in text.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("section");
    }
    slug
}

/// Adds a unique `id` to every `<h1>`..`<h6>`. Repeated slugs get `-2`, `-3`, ...
pub fn add_header_ids(html: &str) -> (String, Vec<Heading>) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut headings = Vec::new();

    let rewritten = HEADING
        .replace_all(html, |caps: &Captures| {
            let level = &caps[1];
            let inner = &caps[2];
            let base = slugify(inner);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            let id = if *count == 1 {
                base
            } else {
                format!("{}-{}", base, count)
            };
            headings.push(Heading {
                level: level.parse().unwrap_or(1),
                id: id.clone(),
                text: TAG.replace_all(inner, "").trim().to_string(),
            });
            format!("<h{level} id=\"{id}\">{inner}</h{level}>")
        })
        .into_owned();

    (rewritten, headings)
}

/// Renders the headings as nested lists inside `<div class="toc">`.
pub fn render_toc(headings: &[Heading]) -> String {
    let mut html = String::from("<div class=\"toc\">\n");
    let mut open: Vec<u8> = Vec::new();
    for heading in headings {
        while open.last().is_some_and(|&level| level > heading.level) {
            html.push_str("</li>\n</ul>\n");
            open.pop();
        }
        if open.last() == Some(&heading.level) {
            html.push_str("</li>\n");
        } else {
            html.push_str("<ul>\n");
            open.push(heading.level);
        }
        html.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            heading.id, heading.text
        ));
    }
    while open.pop().is_some() {
        html.push_str("</li>\n</ul>\n");
    }
    html.push_str("</div>\n");
    html
}

/// Replaces each `[TOC]` marker paragraph with the table of contents.
pub fn insert_toc(html: &str, headings: &[Heading]) -> String {
    if !TOC_MARKER.is_match(html) {
        return html.to_string();
    }
    let toc = render_toc(headings);
    TOC_MARKER.replace_all(html, NoExpand(&toc)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(extensions: &[MarkdownExtension]) -> MarkdownSettings {
        MarkdownSettings {
            extensions: extensions.to_vec(),
            ..MarkdownSettings::default()
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("References"), "references");
        assert_eq!(slugify("Aims &amp; Scope"), "aims-scope");
        assert_eq!(slugify("<em>Prior</em> Work -- 2024"), "prior-work-2024");
        assert_eq!(slugify("   "), "section");
    }

    #[test]
    fn test_header_ids_are_unique() {
        let (html, headings) = add_header_ids("<h2>Methods</h2>\n<h3>Methods</h3>\n<h2>Methods</h2>\n");
        assert!(html.contains(r#"<h2 id="methods">Methods</h2>"#));
        assert!(html.contains(r#"<h3 id="methods-2">Methods</h3>"#));
        assert!(html.contains(r#"<h2 id="methods-3">Methods</h2>"#));
        let levels: Vec<u8> = headings.iter().map(|h| h.level).collect();
        assert_eq!(levels, vec![2, 3, 2]);
    }

    #[test]
    fn test_toc_marker_replaced_with_nested_list() {
        let md = "[TOC]\n\n## Aims\n\n### Aim 1\n\n## Plan\n";
        let html = render_markdown(md, &MarkdownSettings::default());
        assert!(!html.contains("[TOC]"));
        assert!(html.starts_with("<div class=\"toc\">"));
        assert!(html.contains("<li><a href=\"#aims\">Aims</a><ul>\n<li><a href=\"#aim-1\">Aim 1</a>"));
        assert!(html.contains("<li><a href=\"#plan\">Plan</a>"));
    }

    #[test]
    fn test_render_toc_balances_lists() {
        let headings = vec![
            Heading { level: 3, id: "a".into(), text: "A".into() },
            Heading { level: 2, id: "b".into(), text: "B".into() },
        ];
        let toc = render_toc(&headings);
        assert_eq!(toc.matches("<ul>").count(), toc.matches("</ul>").count());
        assert_eq!(toc.matches("<li>").count(), toc.matches("</li>").count());
    }

    #[test]
    fn test_without_header_ids_headings_are_bare() {
        let html = render_markdown("## References", &only(&[MarkdownExtension::Tables]));
        assert_eq!(html.trim(), "<h2>References</h2>");
    }

    #[test]
    fn test_footnotes_and_smart_punctuation() {
        let md = "It's \"quoted\" -- see note[^1].\n\n[^1]: The note.\n";
        let html = render_markdown(md, &MarkdownSettings::default());
        assert!(html.contains('\u{201c}'));
        assert!(html.contains("footnote"));

        let plain = render_markdown(md, &only(&[]));
        assert!(plain.contains("&quot;quoted&quot;"));
    }

    #[test]
    fn test_citation_brackets_survive_rendering() {
        let html = render_markdown("Prior work [1] and [12].", &MarkdownSettings::default());
        assert!(html.contains("[1]"));
        assert!(html.contains("[12]"));
    }

    #[test]
    fn test_raw_html_passes_through() {
        let html = render_markdown("<div class=\"page-break\"></div>\n", &MarkdownSettings::default());
        assert!(html.contains("<div class=\"page-break\"></div>"));
    }

    #[test]
    fn test_malformed_markdown_does_not_fail() {
        let html = render_markdown("```\nunclosed fence\n\n| a |\n|--", &MarkdownSettings::default());
        assert!(html.contains("unclosed fence"));
    }
}
