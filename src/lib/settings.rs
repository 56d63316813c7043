//! Settings consumed by the conversion pipeline.
//!
//! Every value that shapes the output (heading literals, the grant marker, the
//! author block on the title page, the markdown extension list, the PDF engine)
//! lives here instead of being hard-coded in the pipeline stages. The defaults
//! reproduce the stock research-proposal layout; [`crate::config`] overlays
//! values read from a `proposal2pdfrc.toml` file.

use std::path::PathBuf;

/// A markdown feature enabled on the renderer.
///
/// Names follow the conventional extension identifiers so they can be listed
/// in configuration files as plain strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkdownExtension {
    /// ```` ``` ```` fenced code blocks. CommonMark always parses these; the
    /// entry only gates syntax highlighting.
    FencedCodeBlocks,
    /// GitHub-style pipe tables.
    Tables,
    /// `id` attributes on every heading, derived from the heading text.
    HeaderIds,
    /// Replaces a `[TOC]` paragraph with a table of contents.
    Toc,
    /// `[^1]` footnote references and definitions.
    Footnotes,
    /// Curly quotes, en/em dashes and ellipses.
    SmartyPants,
}

impl MarkdownExtension {
    /// The extension list used when no configuration overrides it, in order.
    pub const DEFAULT: [MarkdownExtension; 6] = [
        MarkdownExtension::FencedCodeBlocks,
        MarkdownExtension::Tables,
        MarkdownExtension::HeaderIds,
        MarkdownExtension::Toc,
        MarkdownExtension::Footnotes,
        MarkdownExtension::SmartyPants,
    ];

    /// Looks up an extension by its configuration name.
    ///
    /// Matching ignores case and treats `_` like `-`.
    ///
    /// ```
    /// use proposal2pdf::settings::MarkdownExtension;
    ///
    /// assert_eq!(
    ///     MarkdownExtension::from_name("smarty_pants"),
    ///     Some(MarkdownExtension::SmartyPants)
    /// );
    /// assert_eq!(MarkdownExtension::from_name("wiki-links"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('_', "-").as_str() {
            "fenced-code-blocks" | "fenced-code" => Some(MarkdownExtension::FencedCodeBlocks),
            "tables" | "table" => Some(MarkdownExtension::Tables),
            "header-ids" => Some(MarkdownExtension::HeaderIds),
            "toc" => Some(MarkdownExtension::Toc),
            "footnotes" => Some(MarkdownExtension::Footnotes),
            "smarty-pants" | "smart" => Some(MarkdownExtension::SmartyPants),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MarkdownExtension::FencedCodeBlocks => "fenced-code-blocks",
            MarkdownExtension::Tables => "tables",
            MarkdownExtension::HeaderIds => "header-ids",
            MarkdownExtension::Toc => "toc",
            MarkdownExtension::Footnotes => "footnotes",
            MarkdownExtension::SmartyPants => "smarty-pants",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownSettings {
    pub extensions: Vec<MarkdownExtension>,
    /// Colorize fenced code blocks with syntect.
    pub highlight: bool,
    /// Name of a theme from syntect's default theme set.
    pub highlight_theme: String,
}

impl MarkdownSettings {
    pub fn has(&self, extension: MarkdownExtension) -> bool {
        self.extensions.contains(&extension)
    }
}

impl Default for MarkdownSettings {
    fn default() -> Self {
        Self {
            extensions: MarkdownExtension::DEFAULT.to_vec(),
            highlight: true,
            highlight_theme: "InspiredGitHub".to_string(),
        }
    }
}

/// Literals used to find the structural landmarks of a proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSettings {
    /// Title used when line 0 is not a `# ` heading.
    pub default_title: String,
    /// Shown under the title on the title page; empty hides it.
    pub subtitle: String,
    /// Substring identifying the grant-label line in the front matter.
    pub grant_marker: String,
    /// Line (compared trimmed, case-insensitively) where the rendered body starts.
    pub abstract_heading: String,
    /// Text of the `<h2>` that opens the references section.
    pub references_heading: String,
    /// How many leading lines are scanned for author and grant lines.
    pub front_matter_lines: usize,
    pub lang: String,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            default_title: "Research Proposal".to_string(),
            subtitle: "URI Phase II Proposal".to_string(),
            grant_marker: "Phase-2 URI Student Seed Grant Proposal".to_string(),
            abstract_heading: "## Abstract".to_string(),
            references_heading: "References".to_string(),
            front_matter_lines: 10,
            lang: "en".to_string(),
        }
    }
}

/// Where the title page takes its author block from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorSource {
    /// The fixed identity from configuration.
    Config,
    /// The bold lines found in the document's front matter.
    FrontMatter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorIdentity {
    pub source: AuthorSource,
    pub name: String,
    /// Role and affiliation lines printed under the name.
    pub titles: Vec<String>,
}

impl Default for AuthorIdentity {
    fn default() -> Self {
        Self {
            source: AuthorSource::Config,
            name: "Principal Investigator".to_string(),
            titles: vec![
                "Undergraduate Researcher".to_string(),
                "Faculty Advisor".to_string(),
            ],
        }
    }
}

/// External program used to turn the composed HTML into a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfBackend {
    /// First available of WeasyPrint, Chromium, wkhtmltopdf.
    Auto,
    WeasyPrint,
    Chromium,
    Wkhtmltopdf,
}

impl PdfBackend {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "auto" => Some(PdfBackend::Auto),
            "weasyprint" => Some(PdfBackend::WeasyPrint),
            "chromium" | "chrome" => Some(PdfBackend::Chromium),
            "wkhtmltopdf" => Some(PdfBackend::Wkhtmltopdf),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PdfBackend::Auto => "auto",
            PdfBackend::WeasyPrint => "weasyprint",
            PdfBackend::Chromium => "chromium",
            PdfBackend::Wkhtmltopdf => "wkhtmltopdf",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfSettings {
    pub backend: PdfBackend,
    /// Run `installer` when no engine can be found.
    pub install_missing: bool,
    /// Program and arguments that install the default engine.
    pub installer: Vec<String>,
    /// Directory relative resources (images) are resolved against.
    pub base_dir: Option<PathBuf>,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            backend: PdfBackend::Auto,
            install_missing: true,
            installer: vec![
                "python3".to_string(),
                "-m".to_string(),
                "pip".to_string(),
                "install".to_string(),
                "--user".to_string(),
                "weasyprint".to_string(),
            ],
            base_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleSettings {
    /// Stylesheet appended after the embedded one.
    pub extra_css: Option<PathBuf>,
}

/// The complete configuration of one conversion run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProposalConfig {
    pub document: DocumentSettings,
    pub author: AuthorIdentity,
    pub markdown: MarkdownSettings,
    pub pdf: PdfSettings,
    pub style: StyleSettings,
}
