//! Configuration loading for the conversion pipeline.
//!
//! Settings are read from a TOML file and overlaid, key by key, on the
//! defaults in [`crate::settings`]. Missing keys, keys of the wrong type and
//! unparseable files all fall back to the defaults, so a broken configuration
//! never stops a conversion.
//!
//! # Configuration Structure
//!
//! - `document` holds the literals used to find the title, grant line,
//!   abstract boundary and references heading
//! - `author` controls the identity block on the title page
//! - `markdown` lists the renderer extensions and the highlighting theme
//! - `pdf` selects the rendering engine and how a missing engine is installed
//! - `style` points at an optional stylesheet appended to the embedded one
//!
//! # Configuration Example
//!
//! ```toml
//! [document]
//! subtitle = "Seed Grant Application"
//! references_heading = "Bibliography"
//!
//! [author]
//! name = "Dr. Jane Roe"
//! titles = ["Department of Statistics"]
//!
//! [markdown]
//! extensions = ["tables", "header-ids", "footnotes"]
//!
//! [pdf]
//! backend = "chromium"
//! install_missing = false
//! ```
//!
//! The full default file is embedded in the binary and printed by
//! `proposal2pdf --get-default-configuration`.

use crate::assets;
use crate::settings::{
    AuthorIdentity, AuthorSource, DocumentSettings, MarkdownExtension, MarkdownSettings,
    PdfBackend, PdfSettings, ProposalConfig, StyleSettings,
};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use toml::Value;

/// File name looked up in the working directory and the user config directory.
pub const CONFIG_FILE_NAME: &str = "proposal2pdfrc.toml";

/// Where the TOML configuration should be loaded from.
#[derive(Debug, Clone)]
pub enum ConfigSource<'a> {
    /// Built-in defaults
    Default,
    /// A file on disk
    File(&'a str),
    /// A TOML string held in memory
    Embedded(&'a str),
}

fn parse_string(value: Option<&Value>, default: String) -> String {
    value
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or(default)
}

fn parse_string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| item.as_str().map(|s| s.to_string()))
            .collect(),
    )
}

fn parse_bool(value: Option<&Value>, default: bool) -> bool {
    value.and_then(|v| v.as_bool()).unwrap_or(default)
}

fn parse_path(value: Option<&Value>, default: Option<PathBuf>) -> Option<PathBuf> {
    match value.and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Some(PathBuf::from(s)),
        _ => default,
    }
}

fn parse_document(value: Option<&Value>, default: DocumentSettings) -> DocumentSettings {
    let Some(section) = value else {
        return default;
    };
    DocumentSettings {
        default_title: parse_string(section.get("default_title"), default.default_title),
        subtitle: parse_string(section.get("subtitle"), default.subtitle),
        grant_marker: parse_string(section.get("grant_marker"), default.grant_marker),
        abstract_heading: parse_string(section.get("abstract_heading"), default.abstract_heading),
        references_heading: parse_string(
            section.get("references_heading"),
            default.references_heading,
        ),
        front_matter_lines: section
            .get("front_matter_lines")
            .and_then(|v| v.as_integer())
            .filter(|n| *n >= 0)
            .map(|n| n as usize)
            .unwrap_or(default.front_matter_lines),
        lang: parse_string(section.get("lang"), default.lang),
    }
}

fn parse_author(value: Option<&Value>, default: AuthorIdentity) -> AuthorIdentity {
    let Some(section) = value else {
        return default;
    };
    let source = match section.get("source").and_then(|v| v.as_str()) {
        Some("front-matter") | Some("front_matter") => AuthorSource::FrontMatter,
        Some("config") => AuthorSource::Config,
        Some(other) => {
            warn!("Unknown author source '{}', using the configured identity", other);
            AuthorSource::Config
        }
        None => default.source,
    };
    AuthorIdentity {
        source,
        name: parse_string(section.get("name"), default.name),
        titles: parse_string_list(section.get("titles")).unwrap_or(default.titles),
    }
}

fn parse_markdown(value: Option<&Value>, default: MarkdownSettings) -> MarkdownSettings {
    let Some(section) = value else {
        return default;
    };
    let extensions = match parse_string_list(section.get("extensions")) {
        Some(names) => names
            .iter()
            .filter_map(|name| {
                let ext = MarkdownExtension::from_name(name);
                if ext.is_none() {
                    warn!("Ignoring unknown markdown extension '{}'", name);
                }
                ext
            })
            .collect(),
        None => default.extensions,
    };
    MarkdownSettings {
        extensions,
        highlight: parse_bool(section.get("highlight"), default.highlight),
        highlight_theme: parse_string(section.get("highlight_theme"), default.highlight_theme),
    }
}

fn parse_pdf(value: Option<&Value>, default: PdfSettings) -> PdfSettings {
    let Some(section) = value else {
        return default;
    };
    let backend = match section.get("backend").and_then(|v| v.as_str()) {
        Some(name) => PdfBackend::from_name(name).unwrap_or_else(|| {
            warn!("Unknown PDF backend '{}', falling back to auto", name);
            PdfBackend::Auto
        }),
        None => default.backend,
    };
    let installer = parse_string_list(section.get("installer"))
        .filter(|cmd| !cmd.is_empty())
        .unwrap_or(default.installer);
    PdfSettings {
        backend,
        install_missing: parse_bool(section.get("install_missing"), default.install_missing),
        installer,
        base_dir: parse_path(section.get("base_dir"), default.base_dir),
    }
}

fn parse_style(value: Option<&Value>, default: StyleSettings) -> StyleSettings {
    let Some(section) = value else {
        return default;
    };
    StyleSettings {
        extra_css: parse_path(section.get("extra_css"), default.extra_css),
    }
}

/// Parses a TOML configuration string into a complete [`ProposalConfig`].
///
/// Returns the defaults when the string is not valid TOML.
///
/// ```rust
/// use proposal2pdf::config::parse_config_string;
///
/// let config = parse_config_string(r#"
/// [document]
/// references_heading = "Bibliography"
///
/// [author]
/// name = "Dr. Jane Roe"
/// "#);
/// assert_eq!(config.document.references_heading, "Bibliography");
/// assert_eq!(config.author.name, "Dr. Jane Roe");
/// assert_eq!(config.document.abstract_heading, "## Abstract");
/// ```
pub fn parse_config_string(config_str: &str) -> ProposalConfig {
    let config: Value = match toml::from_str(config_str) {
        Ok(v) => v,
        Err(e) => {
            warn!("Invalid configuration, using defaults: {}", e);
            return ProposalConfig::default();
        }
    };

    let default = ProposalConfig::default();
    ProposalConfig {
        document: parse_document(config.get("document"), default.document),
        author: parse_author(config.get("author"), default.author),
        markdown: parse_markdown(config.get("markdown"), default.markdown),
        pdf: parse_pdf(config.get("pdf"), default.pdf),
        style: parse_style(config.get("style"), default.style),
    }
}

/// Loads the configuration from the given source.
///
/// An unreadable file yields the defaults.
pub fn load_config_from_source(source: ConfigSource) -> ProposalConfig {
    match source {
        ConfigSource::Default => ProposalConfig::default(),
        ConfigSource::File(path) => match fs::read_to_string(Path::new(path)) {
            Ok(s) => {
                debug!("Loaded configuration from {}", path);
                parse_config_string(&s)
            }
            Err(e) => {
                warn!("Could not read configuration {}: {}", path, e);
                ProposalConfig::default()
            }
        },
        ConfigSource::Embedded(content) => parse_config_string(content),
    }
}

/// Returns the configuration file found by convention, if any.
///
/// Priority order: `./proposal2pdfrc.toml`, then
/// `<user config dir>/proposal2pdf/proposal2pdfrc.toml`.
pub fn discover_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("proposal2pdf").join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

/// The default configuration file, as shipped in the binary.
pub fn default_config_toml() -> String {
    assets::asset_text(assets::DEFAULT_CONFIG).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_toml_matches_defaults() {
        let parsed = parse_config_string(&default_config_toml());
        assert_eq!(parsed, ProposalConfig::default());
    }

    #[test]
    fn test_parse_config_string_overrides() {
        let config = parse_config_string(
            r#"
            [document]
            default_title = "Untitled"
            grant_marker = "Seed Grant"
            front_matter_lines = 4

            [author]
            source = "front-matter"
            name = "A. Person"
            titles = ["Lab A", "Lab B"]

            [markdown]
            extensions = ["tables", "footnotes", "not-a-thing"]
            highlight = false

            [pdf]
            backend = "wkhtmltopdf"
            install_missing = false
            base_dir = "docs"

            [style]
            extra_css = "print.css"
            "#,
        );

        assert_eq!(config.document.default_title, "Untitled");
        assert_eq!(config.document.grant_marker, "Seed Grant");
        assert_eq!(config.document.front_matter_lines, 4);
        assert_eq!(config.document.references_heading, "References");
        assert_eq!(config.author.source, AuthorSource::FrontMatter);
        assert_eq!(config.author.titles, vec!["Lab A", "Lab B"]);
        assert_eq!(
            config.markdown.extensions,
            vec![MarkdownExtension::Tables, MarkdownExtension::Footnotes]
        );
        assert!(!config.markdown.highlight);
        assert_eq!(config.pdf.backend, PdfBackend::Wkhtmltopdf);
        assert!(!config.pdf.install_missing);
        assert_eq!(config.pdf.base_dir, Some(PathBuf::from("docs")));
        assert_eq!(config.pdf.installer, PdfSettings::default().installer);
        assert_eq!(config.style.extra_css, Some(PathBuf::from("print.css")));
    }

    #[test]
    fn test_parse_config_string_invalid_toml() {
        let config = parse_config_string("this is not valid toml {{{");
        assert_eq!(config, ProposalConfig::default());
    }

    #[test]
    fn test_parse_config_wrong_types_fall_back() {
        let config = parse_config_string(
            r#"
            [document]
            front_matter_lines = "ten"
            lang = 3

            [pdf]
            backend = "prince"
            installer = []
            "#,
        );
        assert_eq!(config.document.front_matter_lines, 10);
        assert_eq!(config.document.lang, "en");
        assert_eq!(config.pdf.backend, PdfBackend::Auto);
        assert_eq!(config.pdf.installer, PdfSettings::default().installer);
    }

    #[test]
    fn test_load_config_sources() {
        let config = load_config_from_source(ConfigSource::Default);
        assert_eq!(config, ProposalConfig::default());

        let config = load_config_from_source(ConfigSource::File("nonexistent.toml"));
        assert_eq!(config, ProposalConfig::default());

        const EMBEDDED: &str = r#"
            [author]
            name = "Embedded Author"
        "#;
        let config = load_config_from_source(ConfigSource::Embedded(EMBEDDED));
        assert_eq!(config.author.name, "Embedded Author");
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[document]\nsubtitle = \"\"\n").unwrap();
        let config = load_config_from_source(ConfigSource::File(path.to_str().unwrap()));
        assert_eq!(config.document.subtitle, "");
    }
}
