//! Title-page metadata at the head of a proposal.
//!
//! A proposal opens with a `# Title` line, a few bold author/role lines and a
//! grant line, followed by `## Abstract`. Those header lines feed the title
//! page and are dropped from the body handed to the markdown renderer.

use crate::settings::DocumentSettings;
use log::debug;
use std::borrow::Cow;

/// Metadata recovered from the first lines of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrontMatter {
    pub title: String,
    /// Bold lines, with the surrounding `*` removed, in document order.
    pub authors: Vec<String>,
    pub grant: Option<String>,
}

/// Extracts title, author lines and grant label.
///
/// Only the first `settings.front_matter_lines` lines are scanned for author
/// and grant lines. A bold line is an author line even when it contains the
/// grant marker, so only a non-bold line can be the grant label.
///
/// ```
/// use proposal2pdf::front_matter::extract;
/// use proposal2pdf::settings::DocumentSettings;
///
/// let doc = "# Soil Microbes\n**Jane Roe**\n**Dept. of Biology**\n\n## Abstract\nText";
/// let front = extract(doc, &DocumentSettings::default());
/// assert_eq!(front.title, "Soil Microbes");
/// assert_eq!(front.authors, vec!["Jane Roe", "Dept. of Biology"]);
/// assert_eq!(front.grant, None);
/// ```
pub fn extract(source: &str, settings: &DocumentSettings) -> FrontMatter {
    let lines: Vec<&str> = source.split('\n').collect();

    let title = lines
        .first()
        .and_then(|line| line.strip_prefix("# "))
        .map(|t| t.trim_end_matches('\r').to_string())
        .unwrap_or_else(|| settings.default_title.clone());

    let mut authors = Vec::new();
    let mut grant = None;
    for line in lines.iter().take(settings.front_matter_lines) {
        let line = line.trim_end_matches('\r');
        if is_bold_line(line) {
            authors.push(line.trim_matches('*').to_string());
        } else if !settings.grant_marker.is_empty() && line.contains(settings.grant_marker.as_str()) {
            grant = Some(line.trim_matches('*').to_string());
        }
    }

    FrontMatter {
        title,
        authors,
        grant,
    }
}

fn is_bold_line(line: &str) -> bool {
    line.starts_with("**") && line[2..].contains("**")
}

/// Index of the first line equal to `heading`, trimmed and ignoring case.
pub fn find_abstract_boundary(lines: &[&str], heading: &str) -> Option<usize> {
    let wanted = heading.trim().to_lowercase();
    lines
        .iter()
        .position(|line| line.trim().to_lowercase() == wanted)
}

/// Returns the part of the document that gets rendered.
///
/// Everything before the abstract heading is dropped when the heading sits
/// below line 0. Without an abstract heading, or with the heading on line 0,
/// the document is returned untouched.
pub fn strip_front_matter<'a>(source: &'a str, settings: &DocumentSettings) -> Cow<'a, str> {
    let lines: Vec<&str> = source.split('\n').collect();
    match find_abstract_boundary(&lines, &settings.abstract_heading) {
        Some(start) if start > 0 => {
            debug!("Front matter ends at line {}", start);
            Cow::Owned(lines[start..].join("\n"))
        }
        Some(_) => {
            debug!("Abstract heading is the first line; rendering the whole document");
            Cow::Borrowed(source)
        }
        None => {
            debug!("No abstract heading found; rendering the whole document");
            Cow::Borrowed(source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROPOSAL: &str = "# Example Proposal
**Jane Roe**
**Undergraduate Researcher**
*Phase-2 URI Student Seed Grant Proposal*

Some intro that is not rendered.

## Abstract

We study things.

## References
";

    #[test]
    fn test_extract_title_authors_grant() {
        let front = extract(PROPOSAL, &DocumentSettings::default());
        assert_eq!(front.title, "Example Proposal");
        assert_eq!(front.authors, vec!["Jane Roe", "Undergraduate Researcher"]);
        assert_eq!(
            front.grant.as_deref(),
            Some("Phase-2 URI Student Seed Grant Proposal")
        );
    }

    #[test]
    fn test_bold_grant_line_is_author_not_grant() {
        let doc = "# T\n**Phase-2 URI Student Seed Grant Proposal**\n**Author**";
        let front = extract(doc, &DocumentSettings::default());
        assert_eq!(
            front.authors,
            vec!["Phase-2 URI Student Seed Grant Proposal", "Author"]
        );
        assert_eq!(front.grant, None);
    }

    #[test]
    fn test_default_title_when_no_heading() {
        let front = extract("## Not a title\n**A**", &DocumentSettings::default());
        assert_eq!(front.title, "Research Proposal");
        assert_eq!(front.authors, vec!["A"]);
    }

    #[test]
    fn test_bold_line_needs_closing_marker() {
        let front = extract("# T\n**unterminated\n** **", &DocumentSettings::default());
        assert_eq!(front.authors, vec![" "]);
    }

    #[test]
    fn test_only_first_lines_are_scanned() {
        let mut doc = String::from("# T\n");
        for _ in 0..12 {
            doc.push_str("filler\n");
        }
        doc.push_str("**Late Author**\n");
        let front = extract(&doc, &DocumentSettings::default());
        assert!(front.authors.is_empty());
    }

    #[test]
    fn test_strip_front_matter_drops_header() {
        let body = strip_front_matter(PROPOSAL, &DocumentSettings::default());
        assert!(body.starts_with("## Abstract"));
        assert!(!body.contains("Jane Roe"));
        assert!(!body.contains("Some intro"));
        assert!(body.contains("## References"));
    }

    #[test]
    fn test_abstract_match_is_trimmed_and_case_insensitive() {
        let doc = "# T\n**A**\n   ## ABSTRACT  \nbody";
        let body = strip_front_matter(doc, &DocumentSettings::default());
        assert_eq!(body, "   ## ABSTRACT  \nbody");
    }

    #[test]
    fn test_no_abstract_renders_everything() {
        let doc = "# T\n**A**\n## Summary\nbody";
        let body = strip_front_matter(doc, &DocumentSettings::default());
        assert!(matches!(body, Cow::Borrowed(_)));
        assert_eq!(body, doc);
    }

    #[test]
    fn test_abstract_on_first_line_keeps_document() {
        let doc = "## Abstract\nbody";
        let lines: Vec<&str> = doc.split('\n').collect();
        assert_eq!(find_abstract_boundary(&lines, "## Abstract"), Some(0));
        let body = strip_front_matter(doc, &DocumentSettings::default());
        assert_eq!(body, doc);
    }
}
