//! Assembly of the final HTML document: title page, stylesheet and body.

use crate::assets;
use crate::front_matter::FrontMatter;
use crate::settings::{AuthorSource, ProposalConfig};
use crate::ProposalError;
use log::{debug, warn};
use std::fmt::Write;
use std::fs;

/// Escapes text for use in HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Name and role lines printed on the title page.
fn author_block(front: &FrontMatter, config: &ProposalConfig) -> (String, Vec<String>) {
    match config.author.source {
        AuthorSource::FrontMatter if !front.authors.is_empty() => {
            let mut lines = front.authors.iter().cloned();
            let name = lines.next().unwrap_or_default();
            (name, lines.collect())
        }
        AuthorSource::FrontMatter => {
            warn!("No author lines in the front matter; using the configured identity");
            (config.author.name.clone(), config.author.titles.clone())
        }
        AuthorSource::Config => (config.author.name.clone(), config.author.titles.clone()),
    }
}

/// Renders the title page `<div>`.
///
/// ```
/// use proposal2pdf::compose::title_page;
/// use proposal2pdf::front_matter::FrontMatter;
/// use proposal2pdf::settings::ProposalConfig;
///
/// let front = FrontMatter { title: "Example Proposal".into(), ..Default::default() };
/// let html = title_page(&front, &ProposalConfig::default());
/// assert!(html.contains("<h1>Example Proposal</h1>"));
/// assert!(html.contains(r#"<div class="author-name">Principal Investigator</div>"#));
/// ```
pub fn title_page(front: &FrontMatter, config: &ProposalConfig) -> String {
    let (name, titles) = author_block(front, config);

    let mut html = String::from("<div class=\"title-page\">\n");
    let _ = writeln!(html, "    <h1>{}</h1>", escape_html(&front.title));
    if !config.document.subtitle.is_empty() {
        let _ = writeln!(
            html,
            "    <div class=\"subtitle\">{}</div>",
            escape_html(&config.document.subtitle)
        );
    }
    html.push_str("    <div class=\"author-info\">\n");
    let _ = writeln!(
        html,
        "        <div class=\"author-name\">{}</div>",
        escape_html(&name)
    );
    for title in &titles {
        let _ = writeln!(
            html,
            "        <div class=\"author-title\">{}</div>",
            escape_html(title)
        );
    }
    html.push_str("    </div>\n");
    let _ = writeln!(
        html,
        "    <div class=\"grant-info\">{}</div>",
        escape_html(front.grant.as_deref().unwrap_or(""))
    );
    html.push_str("</div>\n");
    html
}

/// The embedded print stylesheet followed by the optional extra stylesheet.
pub fn stylesheet(config: &ProposalConfig) -> Result<String, ProposalError> {
    let mut css = assets::asset_text(assets::STYLESHEET).ok_or_else(|| {
        ProposalError::ConfigError {
            message: format!("Embedded stylesheet '{}' is missing", assets::STYLESHEET),
            suggestion: "Rebuild the binary with the assets/ directory present".to_string(),
        }
    })?;

    if let Some(path) = &config.style.extra_css {
        let extra = fs::read_to_string(path).map_err(|e| ProposalError::IoError {
            message: format!("Cannot read extra stylesheet: {}", e),
            path: path.display().to_string(),
            suggestion: "Check the [style] extra_css path in the configuration".to_string(),
        })?;
        debug!("Appending stylesheet {}", path.display());
        css.push('\n');
        css.push_str(&extra);
    }
    Ok(css)
}

/// Builds the complete HTML document handed to the PDF engine.
pub fn compose(
    front: &FrontMatter,
    body: &str,
    config: &ProposalConfig,
) -> Result<String, ProposalError> {
    let css = stylesheet(config)?;
    let title_page = title_page(front, config);

    let mut html = String::with_capacity(css.len() + title_page.len() + body.len() + 512);
    html.push_str("<!DOCTYPE html>\n");
    let _ = writeln!(html, "<html lang=\"{}\">", escape_html(&config.document.lang));
    html.push_str("<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    let _ = writeln!(html, "<title>{}</title>", escape_html(&front.title));
    html.push_str("<style>\n");
    html.push_str(&css);
    html.push_str("\n</style>\n");
    html.push_str("</head>\n<body>\n");
    html.push_str(&title_page);
    html.push_str(body);
    html.push_str("</body>\n</html>\n");
    Ok(html)
}
