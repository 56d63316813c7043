//! Pre-flight diagnostics over a proposal's markdown source.
//!
//! The conversion pipeline is deliberately forgiving: a missing abstract, an
//! unmatched reference or a citation without a target all degrade silently.
//! This module reports those cases up front so they can be fixed before the
//! PDF is produced. It never changes what the pipeline renders.

use crate::front_matter::find_abstract_boundary;
use crate::references::ReferenceEntry;
use crate::settings::{AuthorSource, ProposalConfig};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

lazy_static! {
    static ref LIST_MARKER: Regex = Regex::new(r"^\s*(?:\d+[.)]|[-*+])\s+").unwrap();
    static ref REFERENCE_LINE: Regex = Regex::new(
        r#"^(.*?)\.\s*\((\d{4})\)\.\s*(?:\*([^*]+)\*|_([^_]+)_)\.\s*(https?://[^\s<>"]+)"#
    )
    .unwrap();
    static ref YEAR: Regex = Regex::new(r"\(\d{4}\)").unwrap();
    static ref ITALIC: Regex = Regex::new(r"\*[^*]+\*|_[^_]+_").unwrap();
    static ref URL: Regex = Regex::new(r#"https?://[^\s<>"]+"#).unwrap();
    static ref CITATION: Regex = Regex::new(r"\[(\d+)\]").unwrap();
    static ref FENCE: Regex = Regex::new(r"^\s*(```|~~~)").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Line 0 is not a `# ` heading; the default title is used.
    MissingTitle,
    /// The title page takes its authors from the document but none were found.
    MissingAuthors,
    /// No abstract heading; the whole document, front matter included, is rendered.
    MissingAbstract,
    /// The abstract heading is the first line, so no front matter is stripped.
    AbstractOnFirstLine,
    MissingReferences,
    /// Only the first references heading opens the references section.
    DuplicateReferences,
    /// A reference list item that will not be anchored or linked.
    MalformedReference,
    /// A `[n]` marker that links to an anchor no reference provides.
    DanglingCitation,
}

impl WarningKind {
    pub fn label(&self) -> &'static str {
        match self {
            WarningKind::MissingTitle => "missing-title",
            WarningKind::MissingAuthors => "missing-authors",
            WarningKind::MissingAbstract => "missing-abstract",
            WarningKind::AbstractOnFirstLine => "abstract-on-first-line",
            WarningKind::MissingReferences => "missing-references",
            WarningKind::DuplicateReferences => "duplicate-references",
            WarningKind::MalformedReference => "malformed-reference",
            WarningKind::DanglingCitation => "dangling-citation",
        }
    }
}

/// One diagnostic, with an optional 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub kind: WarningKind,
    pub line: Option<usize>,
    pub message: String,
}

impl ValidationWarning {
    fn new(kind: WarningKind, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {} [{}]: {}", line, self.kind.label(), self.message),
            None => write!(f, "[{}]: {}", self.kind.label(), self.message),
        }
    }
}

/// Why a reference line does not have the `Author. (YYYY). *Title*. URL` shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceIssue {
    MissingYear,
    MissingTitle,
    MissingUrl,
    /// All parts are present but not in the expected order or punctuation.
    Shape,
}

impl fmt::Display for ReferenceIssue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            ReferenceIssue::MissingYear => "no four-digit year in parentheses",
            ReferenceIssue::MissingTitle => "no *italic* title",
            ReferenceIssue::MissingUrl => "no http(s) URL",
            ReferenceIssue::Shape => "expected `Author. (YYYY). *Title*. URL`",
        };
        f.write_str(text)
    }
}

/// Parses one markdown reference line, with or without its list marker.
///
/// ```
/// use proposal2pdf::validation::{parse_reference_line, ReferenceIssue};
///
/// let entry = parse_reference_line("1. Roe, J. (2021). *Soil*. https://example.org", 1).unwrap();
/// assert_eq!(entry.year, "2021");
/// assert_eq!(entry.title, "Soil");
/// assert_eq!(
///     parse_reference_line("- Roe, J. *Soil*. https://example.org", 2),
///     Err(ReferenceIssue::MissingYear)
/// );
/// ```
pub fn parse_reference_line(line: &str, ordinal: usize) -> Result<ReferenceEntry, ReferenceIssue> {
    let text = LIST_MARKER.replace(line, "");
    let text = text.trim();

    if let Some(caps) = REFERENCE_LINE.captures(text) {
        let title = caps.get(3).or_else(|| caps.get(4)).map(|m| m.as_str());
        return Ok(ReferenceEntry {
            ordinal,
            author: caps[1].to_string(),
            year: caps[2].to_string(),
            title: title.unwrap_or_default().to_string(),
            url: caps[5].to_string(),
        });
    }

    if !YEAR.is_match(text) {
        Err(ReferenceIssue::MissingYear)
    } else if !ITALIC.is_match(text) {
        Err(ReferenceIssue::MissingTitle)
    } else if !URL.is_match(text) {
        Err(ReferenceIssue::MissingUrl)
    } else {
        Err(ReferenceIssue::Shape)
    }
}

fn is_references_heading(line: &str, heading: &str) -> bool {
    line.trim()
        .strip_prefix("## ")
        .is_some_and(|text| text.trim() == heading)
}

fn is_section_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("# ") || trimmed.starts_with("## ")
}

/// Runs every check over `source` and returns the findings in line order.
pub fn validate_document(source: &str, config: &ProposalConfig) -> Vec<ValidationWarning> {
    let document = &config.document;
    let lines: Vec<&str> = source.split('\n').collect();
    let mut warnings = Vec::new();

    if !lines.first().is_some_and(|line| line.starts_with("# ")) {
        warnings.push(ValidationWarning::new(
            WarningKind::MissingTitle,
            Some(1),
            format!(
                "first line is not a '# ' title; using \"{}\"",
                document.default_title
            ),
        ));
    }

    if config.author.source == AuthorSource::FrontMatter {
        let front = crate::front_matter::extract(source, document);
        if front.authors.is_empty() {
            warnings.push(ValidationWarning::new(
                WarningKind::MissingAuthors,
                None,
                format!(
                    "no **bold** author lines in the first {} lines; the configured identity is used",
                    document.front_matter_lines
                ),
            ));
        }
    }

    match find_abstract_boundary(&lines, &document.abstract_heading) {
        None => warnings.push(ValidationWarning::new(
            WarningKind::MissingAbstract,
            None,
            format!(
                "no '{}' line; the front matter will be rendered as body text",
                document.abstract_heading
            ),
        )),
        Some(0) => warnings.push(ValidationWarning::new(
            WarningKind::AbstractOnFirstLine,
            Some(1),
            "abstract heading is the first line; nothing is stripped and the title falls back to the default",
        )),
        Some(_) => {}
    }

    let reference_headings: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| is_references_heading(line, &document.references_heading))
        .map(|(index, _)| index)
        .collect();

    let mut anchored = BTreeSet::new();
    match reference_headings.first() {
        None => warnings.push(ValidationWarning::new(
            WarningKind::MissingReferences,
            None,
            format!("no '## {}' heading; references are not linked", document.references_heading),
        )),
        Some(&start) => {
            for &index in &reference_headings[1..] {
                warnings.push(ValidationWarning::new(
                    WarningKind::DuplicateReferences,
                    Some(index + 1),
                    format!(
                        "second '## {}' heading is treated as part of the first section",
                        document.references_heading
                    ),
                ));
            }
            check_reference_list(&lines, start, &mut anchored, &mut warnings);
        }
    }

    check_citations(&lines, &anchored, &mut warnings);

    warnings.sort_by_key(|w| w.line.unwrap_or(0));
    debug!("Validation produced {} warning(s)", warnings.len());
    warnings
}

/// Checks list items below the references heading. Like the HTML annotator,
/// the section runs to the end of the document.
fn check_reference_list(
    lines: &[&str],
    heading: usize,
    anchored: &mut BTreeSet<usize>,
    warnings: &mut Vec<ValidationWarning>,
) {
    let mut ordinal = 0;
    for (index, line) in lines.iter().enumerate().skip(heading + 1) {
        if is_section_heading(line) || !LIST_MARKER.is_match(line) {
            continue;
        }
        ordinal += 1;
        match parse_reference_line(line, ordinal) {
            Ok(entry) => {
                anchored.insert(entry.ordinal);
            }
            Err(issue) => warnings.push(ValidationWarning::new(
                WarningKind::MalformedReference,
                Some(index + 1),
                format!("reference {} will not be linked: {}", ordinal, issue),
            )),
        }
    }
}

fn check_citations(
    lines: &[&str],
    anchored: &BTreeSet<usize>,
    warnings: &mut Vec<ValidationWarning>,
) {
    let mut in_fence = false;
    for (index, line) in lines.iter().enumerate() {
        if FENCE.is_match(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        for caps in CITATION.captures_iter(line) {
            let number: usize = caps[1].parse().unwrap_or(0);
            if !anchored.contains(&number) {
                warnings.push(ValidationWarning::new(
                    WarningKind::DanglingCitation,
                    Some(index + 1),
                    format!("[{}] links to #ref-{}, which no reference defines", &caps[1], &caps[1]),
                ));
            }
        }
    }
}
