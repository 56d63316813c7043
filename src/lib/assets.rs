//! Text assets compiled into the binary: the print stylesheet and the default
//! configuration file.

use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

pub const STYLESHEET: &str = "proposal.css";
pub const DEFAULT_CONFIG: &str = "proposal2pdfrc.toml";

/// Returns an embedded asset as UTF-8 text.
pub fn asset_text(name: &str) -> Option<String> {
    Assets::get(name).map(|file| String::from_utf8_lossy(&file.data).into_owned())
}

/// Names of all embedded assets.
pub fn known_assets() -> Vec<String> {
    Assets::iter().map(|name| name.into_owned()).collect()
}

#[test]
fn test_stylesheet_is_embedded() {
    let css = asset_text(STYLESHEET).expect("stylesheet missing");
    assert!(css.contains("@page"));
    assert!(css.contains("#references-section"));
}

#[test]
fn test_default_config_is_embedded() {
    assert!(known_assets().iter().any(|a| a == DEFAULT_CONFIG));
    assert!(asset_text("missing.css").is_none());
}
