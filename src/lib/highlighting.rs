//! Syntax highlighting of fenced code blocks using syntect.
//! Rewrites rendered `<pre><code class="language-x">` blocks into inline-styled HTML
//! so the colors survive in every PDF engine without extra stylesheets.

use lazy_static::lazy_static;
use log::warn;
use regex::{Captures, Regex};
use std::collections::HashMap;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};

/// Theme used when the configured one is not part of syntect's default set.
pub const DEFAULT_THEME: &str = "InspiredGitHub";

lazy_static! {
    static ref SYNTAX_SET: SyntaxSet = SyntaxSet::load_defaults_newlines();
    static ref THEME_SET: ThemeSet = ThemeSet::load_defaults();
    static ref CODE_BLOCK: Regex =
        Regex::new(r#"(?s)<pre><code class="language-([^"\s]+)">(.*?)</code></pre>"#).unwrap();
}

/// Maps fence info strings to syntect syntax names
fn get_syntax_mapping() -> HashMap<&'static str, &'static str> {
    let mut map = HashMap::new();
    map.insert("c", "C");
    map.insert("cpp", "C++");
    map.insert("c++", "C++");
    map.insert("java", "Java");
    map.insert("python", "Python");
    map.insert("py", "Python");
    map.insert("r", "R");
    map.insert("javascript", "JavaScript");
    map.insert("js", "JavaScript");
    map.insert("rust", "Rust");
    map.insert("rs", "Rust");
    map.insert("go", "Go");
    map.insert("bash", "Bourne Again Shell (bash)");
    map.insert("sh", "Bourne Again Shell (bash)");
    map.insert("shell", "Bourne Again Shell (bash)");
    map.insert("html", "HTML");
    map.insert("xml", "XML");
    map.insert("json", "JSON");
    map.insert("yaml", "YAML");
    map.insert("yml", "YAML");
    map.insert("sql", "SQL");
    map.insert("latex", "LaTeX");
    map.insert("tex", "LaTeX");
    map.insert("markdown", "Markdown");
    map.insert("md", "Markdown");
    map
}

/// Finds the syntect syntax for a fence language, by alias, name or file extension.
pub fn find_syntax(language: &str) -> Option<&'static SyntaxReference> {
    let language = language.to_lowercase();
    let mapping = get_syntax_mapping();
    mapping
        .get(language.as_str())
        .and_then(|name| SYNTAX_SET.find_syntax_by_name(name))
        .or_else(|| SYNTAX_SET.find_syntax_by_token(&language))
}

/// Highlights one code snippet into a `<pre>` block with inline styles.
///
/// Returns `None` when the language is unknown or syntect fails, in which case
/// callers keep the plain block.
///
/// ```
/// use proposal2pdf::highlighting::highlight_code;
///
/// let html = highlight_code("fn main() {}\n", "rust", "InspiredGitHub").unwrap();
/// assert!(html.starts_with("<pre"));
/// assert!(html.contains("<span"));
/// assert!(highlight_code("x", "no-such-language", "InspiredGitHub").is_none());
/// ```
pub fn highlight_code(code: &str, language: &str, theme_name: &str) -> Option<String> {
    let syntax = find_syntax(language)?;
    let theme = THEME_SET
        .themes
        .get(theme_name)
        .or_else(|| THEME_SET.themes.get(DEFAULT_THEME))?;
    match highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme) {
        Ok(html) => Some(html),
        Err(e) => {
            warn!("Highlighting {} code failed: {}", language, e);
            None
        }
    }
}

/// Reverses the escaping comrak applies to code block contents.
fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Replaces every recognized fenced code block in `html` with highlighted markup.
pub fn highlight_code_blocks(html: &str, theme_name: &str) -> String {
    CODE_BLOCK
        .replace_all(html, |caps: &Captures| {
            let code = unescape_html(&caps[2]);
            highlight_code(&code, &caps[1], theme_name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_syntax_aliases() {
        assert_eq!(find_syntax("py").map(|s| s.name.as_str()), Some("Python"));
        assert_eq!(find_syntax("Rust").map(|s| s.name.as_str()), Some("Rust"));
        assert!(find_syntax("sh").is_some());
        assert!(find_syntax("definitely-not-a-language").is_none());
    }

    #[test]
    fn test_highlight_code_blocks_rewrites_known_language() {
        let html = "<p>x</p>\n<pre><code class=\"language-python\">print(&quot;hi&quot;)\n</code></pre>\n";
        let out = highlight_code_blocks(html, "InspiredGitHub");
        assert!(out.starts_with("<p>x</p>"));
        assert!(!out.contains("language-python"));
        assert!(out.contains("style="));
        assert!(out.contains("print"));
    }

    #[test]
    fn test_highlight_code_blocks_keeps_unknown_language() {
        let html = "<pre><code class=\"language-klingon\">qapla'\n</code></pre>";
        assert_eq!(highlight_code_blocks(html, "InspiredGitHub"), html);
    }

    #[test]
    fn test_unknown_theme_falls_back() {
        assert!(highlight_code("let x = 1;", "rust", "NoSuchTheme").is_some());
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("a &lt;b&gt; &amp;lt;"), "a <b> &lt;");
    }
}
