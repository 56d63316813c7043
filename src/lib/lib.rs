//! The proposal2pdf library turns a research proposal written in Markdown into a print-ready PDF
//! with a title page, linked citations and a styled reference list.
//!
//! A proposal is an ordinary Markdown file with a little structure at the top:
//!
//! ```markdown
//! # Soil Microbes Under Drought
//! **Jane Roe**
//! **Department of Biology**
//! *Phase-2 URI Student Seed Grant Proposal*
//!
//! ## Abstract
//! Earlier work [1] suggests ...
//!
//! ## References
//! 1. Roe, J. (2021). *Soil microbes*. https://example.org/soil
//! ```
//!
//! The `# ` title, the bold author lines and the grant line feed the title page and are left out of
//! the body, which starts at `## Abstract`. Every `[n]` in the text becomes a link to the n-th entry of
//! the reference list, and reference entries of the shape `Author. (YYYY). *Title*. URL` get an anchor
//! and a linked title.
//!
//! Producing the HTML needs nothing outside the binary:
//! ```rust
//! use proposal2pdf::settings::ProposalConfig;
//!
//! let source = "# Example Proposal\n\n## Abstract\nSee [1].\n\n## References\n\n\
//!               1. Roe, J. (2021). *Soil*. https://example.org/soil\n";
//! let document = proposal2pdf::convert_to_html(source, &ProposalConfig::default()).unwrap();
//! assert!(document.html.contains("<h1>Example Proposal</h1>"));
//! assert!(document.html.contains(r##"<a href="#ref-1">[1]</a>"##));
//! assert_eq!(document.references.len(), 1);
//! ```
//!
//! Writing the PDF hands that HTML to an external engine (WeasyPrint by default), which is located,
//! and installed on request, by [`bootstrap`]:
//! ```rust,no_run
//! use proposal2pdf::{config, ConvertOptions};
//! use std::path::Path;
//!
//! fn example() -> Result<(), proposal2pdf::ProposalError> {
//!     let config = config::load_config_from_source(config::ConfigSource::Default);
//!     let report = proposal2pdf::convert_file(
//!         Path::new("proposal.md"),
//!         Path::new("proposal.pdf"),
//!         &config,
//!         &ConvertOptions::default(),
//!     )?;
//!     println!("{} bytes", report.pdf_size.unwrap_or(0));
//!     Ok(())
//! }
//! ```
//!
//! Headings, the author block, markdown extensions and the engine are all configurable through a
//! `proposal2pdfrc.toml` file; see [`config`].
//!
//! ## Pipeline
//! ```text
//! +-------------+     +----------------+     +-------------------+
//! |  Markdown   |     |  Front matter  |     |  Body HTML        |
//! |  source     | --> |  title, authors| --> |  comrak, syntect, |
//! |             |     |  grant, strip  |     |  header ids, TOC  |
//! +-------------+     +----------------+     +-------------------+
//!
//! +-------------------+     +----------------+     +--------------+
//! | References        |     | Compose        |     | PDF engine   |
//! | section, anchors, | --> | title page,    | --> | WeasyPrint / |
//! | [n] citations     |     | stylesheet     |     | Chromium ... |
//! +-------------------+     +----------------+     +--------------+
//! ```

pub mod assets;
pub mod bootstrap;
pub mod compose;
pub mod config;
pub mod front_matter;
pub mod highlighting;
pub mod markdown;
pub mod pdf;
pub mod references;
pub mod settings;
pub mod validation;

use front_matter::FrontMatter;
use log::{debug, error, info, warn};
use pdf::PdfEngine;
use references::ReferenceEntry;
use settings::ProposalConfig;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use validation::ValidationWarning;

/// Errors that stop a conversion.
///
/// Everything else (unmatched references, dangling citations, a broken
/// configuration file) degrades gracefully and is only logged.
#[derive(Debug)]
pub enum ProposalError {
    /// The source document does not exist
    MissingInput { path: String, suggestion: String },
    /// The PDF engine is not installed and could not be installed
    MissingDependency {
        name: String,
        message: String,
        suggestion: String,
    },
    /// The PDF engine failed
    RenderError {
        message: String,
        path: Option<String>,
        suggestion: String,
    },
    /// Indicates an invalid configuration
    ConfigError { message: String, suggestion: String },
    /// Indicates an I/O error
    IoError {
        message: String,
        path: String,
        suggestion: String,
    },
}

impl Error for ProposalError {}
impl fmt::Display for ProposalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProposalError::MissingInput { path, suggestion } => {
                write!(f, "❌ Input file not found: {}", path)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            ProposalError::MissingDependency {
                name,
                message,
                suggestion,
            } => {
                write!(f, "❌ Missing dependency '{}': {}", name, message)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            ProposalError::RenderError {
                message,
                path,
                suggestion,
            } => {
                write!(f, "❌ PDF Generation Error: {}", message)?;
                if let Some(p) = path {
                    write!(f, "\n📁 Path: {}", p)?;
                }
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            ProposalError::ConfigError {
                message,
                suggestion,
            } => {
                write!(f, "❌ Configuration Error: {}", message)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            ProposalError::IoError {
                message,
                path,
                suggestion,
            } => {
                write!(f, "❌ File Error: {}", message)?;
                write!(f, "\n📁 Path: {}", path)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
        }
    }
}

/// The composed HTML and what was learned while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlDocument {
    pub html: String,
    pub front_matter: FrontMatter,
    /// Reference entries that received an anchor.
    pub references: Vec<ReferenceEntry>,
    /// Reference list items left as they were.
    pub unmatched_references: usize,
    pub has_references_section: bool,
}

/// Runs the HTML half of the pipeline. Deterministic: the same source and
/// configuration always give byte-identical HTML.
pub fn convert_to_html(source: &str, config: &ProposalConfig) -> Result<HtmlDocument, ProposalError> {
    let front_matter = front_matter::extract(source, &config.document);
    debug!(
        "Front matter: title {:?}, {} author line(s), grant {:?}",
        front_matter.title,
        front_matter.authors.len(),
        front_matter.grant
    );

    let body = front_matter::strip_front_matter(source, &config.document);
    let body_html = markdown::render_markdown(&body, &config.markdown);
    let annotated = references::annotate(body_html, &config.document.references_heading);
    if annotated.unmatched > 0 {
        info!(
            "{} reference item(s) did not match 'Author. (YYYY). *Title*. URL' and were left unlinked",
            annotated.unmatched
        );
    }

    let html = compose::compose(&front_matter, &annotated.html, config)?;
    Ok(HtmlDocument {
        html,
        front_matter,
        references: annotated.entries,
        unmatched_references: annotated.unmatched,
        has_references_section: annotated.has_section,
    })
}

/// Reads the source document, distinguishing a missing file from other I/O errors.
pub fn read_source(path: &Path) -> Result<String, ProposalError> {
    if !path.is_file() {
        return Err(ProposalError::MissingInput {
            path: path.display().to_string(),
            suggestion: "Check the path, or pass the proposal with -p/--path".to_string(),
        });
    }
    fs::read_to_string(path).map_err(|e| ProposalError::IoError {
        message: format!("Cannot read input: {}", e),
        path: path.display().to_string(),
        suggestion: "Make sure the file is readable UTF-8 text".to_string(),
    })
}

/// Options of [`convert_file`] beyond the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Also write the composed HTML here.
    pub html_output: Option<PathBuf>,
    /// Stop after the HTML; no engine is needed.
    pub html_only: bool,
}

/// Steps of [`convert_file_with_progress`] reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// The engine is missing and the installer command is about to run.
    Installing(String),
    ConvertingMarkdown,
    ConvertingPdf,
}

#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub document: HtmlDocument,
    pub warnings: Vec<ValidationWarning>,
    /// Name of the engine that produced the PDF.
    pub backend: Option<&'static str>,
    pub pdf_size: Option<u64>,
}

/// Converts `input` into the PDF at `output`.
pub fn convert_file(
    input: &Path,
    output: &Path,
    config: &ProposalConfig,
    options: &ConvertOptions,
) -> Result<ConversionReport, ProposalError> {
    convert_file_with_progress(input, output, config, options, |_| {})
}

/// Same as [`convert_file`], calling `progress` as each stage starts.
///
/// The input is checked before anything else happens, so a missing source
/// leaves the output path untouched.
pub fn convert_file_with_progress<F>(
    input: &Path,
    output: &Path,
    config: &ProposalConfig,
    options: &ConvertOptions,
    mut progress: F,
) -> Result<ConversionReport, ProposalError>
where
    F: FnMut(Stage),
{
    let source = read_source(input)?;

    if !options.html_only {
        check_output_dir(output)?;
    }

    let mut pdf_settings = config.pdf.clone();
    if pdf_settings.base_dir.is_none() {
        pdf_settings.base_dir = input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok());
    }

    let engine = if options.html_only {
        None
    } else {
        let backend = match bootstrap::resolve_backend(&pdf_settings) {
            Ok(backend) => backend,
            Err(err) if pdf_settings.install_missing && !pdf_settings.installer.is_empty() => {
                debug!("{}", err);
                progress(Stage::Installing(pdf_settings.installer.join(" ")));
                bootstrap::ensure_backend(&pdf_settings)?
            }
            Err(err) => return Err(err),
        };
        Some(PdfEngine::new(backend, &pdf_settings))
    };

    let warnings = validation::validate_document(&source, config);
    for warning in &warnings {
        warn!("{}", warning);
    }

    progress(Stage::ConvertingMarkdown);
    let document = convert_to_html(&source, config)?;

    if let Some(html_path) = &options.html_output {
        fs::write(html_path, &document.html).map_err(|e| ProposalError::IoError {
            message: format!("Cannot write HTML: {}", e),
            path: html_path.display().to_string(),
            suggestion: "Check that the directory exists and is writable".to_string(),
        })?;
        info!("Wrote HTML to {}", html_path.display());
    }

    let Some(engine) = engine else {
        return Ok(ConversionReport {
            document,
            warnings,
            backend: None,
            pdf_size: None,
        });
    };

    progress(Stage::ConvertingPdf);
    if let Some(err) = engine.render(&document.html, output) {
        error!("Error converting HTML to PDF: {}", err);
        return Err(ProposalError::RenderError {
            message: err.clone(),
            path: Some(output.display().to_string()),
            suggestion: if err.contains("Permission") || err.contains("denied") {
                "Check that you have write permissions for this location".to_string()
            } else if err.contains("failed to run") {
                "Check that the PDF engine is installed correctly, or pick another with --backend"
                    .to_string()
            } else {
                "Run with --html to inspect the generated document, or try another --backend"
                    .to_string()
            },
        });
    }

    let pdf_size = fs::metadata(output).map(|m| m.len()).ok();
    Ok(ConversionReport {
        document,
        warnings,
        backend: Some(engine.backend().name()),
        pdf_size,
    })
}

fn check_output_dir(output: &Path) -> Result<(), ProposalError> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ProposalError::IoError {
                message: "Output directory does not exist".to_string(),
                path: parent.display().to_string(),
                suggestion: format!("Create the directory first: mkdir -p {}", parent.display()),
            });
        }
    }
    Ok(())
}
