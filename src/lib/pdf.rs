//! PDF generation through an external HTML engine.
//!
//! The composed HTML document is written to a temporary file and handed to
//! the engine found by [`crate::bootstrap`]. WeasyPrint is the reference
//! engine since it implements CSS paged media (`@page` margins, running page
//! numbers, `page-break-before`). Headless Chromium and wkhtmltopdf are
//! accepted as fallbacks; they print the same document with less faithful
//! page furniture.
//!
//! Every failure of the engine call (spawn error, non-zero exit, missing output
//! file) leaves an existing output file untouched and is contained here and returned as a message, in the same way the
//! document renderer reports errors to [`crate::convert_file`].

use crate::bootstrap::ResolvedBackend;
use crate::settings::PdfSettings;
use log::{debug, info, warn};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{NamedTempFile, TempPath};

/// A resolved engine plus the options that shape its invocation.
#[derive(Debug, Clone)]
pub struct PdfEngine {
    backend: ResolvedBackend,
    base_dir: Option<PathBuf>,
}

impl PdfEngine {
    pub fn new(backend: ResolvedBackend, settings: &PdfSettings) -> Self {
        Self {
            backend,
            base_dir: settings.base_dir.clone(),
        }
    }

    pub fn backend(&self) -> &ResolvedBackend {
        &self.backend
    }

    /// Renders `html` into the PDF file at `output`.
    ///
    /// Returns `None` on success and the error message otherwise.
    pub fn render(&self, html: &str, output: &Path) -> Option<String> {
        match self.render_inner(html, output) {
            Ok(()) => None,
            Err(err) => Some(err),
        }
    }

    fn render_inner(&self, html: &str, output: &Path) -> Result<(), String> {
        let mut temp = self
            .temp_html()
            .map_err(|err| format!("failed to create temp file: {}", err))?;
        temp.write_all(html.as_bytes())
            .and_then(|_| temp.flush())
            .map_err(|err| format!("failed to write temp html: {}", err))?;
        debug!("Wrote {} bytes of HTML to {}", html.len(), temp.path().display());

        // The engine output replaces `output` only when it is non-empty.
        let target = temp_pdf(output).map_err(|err| format!("failed to create temp PDF: {}", err))?;

        let cmd = match &self.backend {
            ResolvedBackend::WeasyPrint(path) => self.weasyprint_command(path, temp.path(), &target),
            ResolvedBackend::Chromium(path) => chromium_command(path, temp.path(), &target)?,
            ResolvedBackend::Wkhtmltopdf(path) => wkhtmltopdf_command(path, temp.path(), &target),
        };
        info!("Rendering PDF with {}", self.backend.name());
        run_command(cmd, self.backend.name())?;

        match fs::metadata(&target) {
            Ok(meta) if meta.len() > 0 => {}
            _ => {
                return Err(format!(
                    "{} finished but did not produce {}",
                    self.backend.name(),
                    output.display()
                ))
            }
        }
        target
            .persist(output)
            .map_err(|err| format!("failed to write {}: {}", output.display(), err))
    }

    /// The temp HTML lives next to the source when possible so that engines
    /// without a base-URL option still resolve relative image paths.
    fn temp_html(&self) -> std::io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(".proposal2pdf-").suffix(".html");
        if let Some(dir) = &self.base_dir {
            match builder.tempfile_in(dir) {
                Ok(file) => return Ok(file),
                Err(err) => warn!(
                    "Cannot write temp HTML in {} ({}); using the system temp dir",
                    dir.display(),
                    err
                ),
            }
        }
        builder.tempfile()
    }

    fn weasyprint_command(&self, weasyprint: &Path, html: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(weasyprint);
        if let Some(dir) = &self.base_dir {
            cmd.arg("--base-url").arg(dir);
        }
        cmd.arg(html);
        cmd.arg(output);
        cmd
    }
}

/// An empty placeholder in the output's directory, so the final rename never
/// crosses file systems.
fn temp_pdf(output: &Path) -> std::io::Result<TempPath> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file = tempfile::Builder::new()
        .prefix(".proposal2pdf-")
        .suffix(".pdf")
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

fn chromium_command(chromium: &Path, html: &Path, output: &Path) -> Result<Command, String> {
    let html_url = path_to_file_url(html)?;
    let mut cmd = Command::new(chromium);
    cmd.arg("--headless");
    cmd.arg("--disable-gpu");
    cmd.arg("--allow-file-access-from-files");
    cmd.arg("--no-pdf-header-footer");
    cmd.arg(format!("--print-to-pdf={}", output.display()));
    cmd.arg(html_url);
    Ok(cmd)
}

fn wkhtmltopdf_command(wkhtmltopdf: &Path, html: &Path, output: &Path) -> Command {
    let mut cmd = Command::new(wkhtmltopdf);
    cmd.arg("--quiet");
    cmd.arg("--enable-local-file-access");
    cmd.arg("--page-size").arg("A4");
    cmd.arg(html);
    cmd.arg(output);
    cmd
}

fn run_command(mut cmd: Command, label: &str) -> Result<(), String> {
    let output = cmd
        .output()
        .map_err(|err| format!("failed to run {}: {}", label, err))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut message = format!("{} failed ({})", label, output.status);
    let stderr = stderr.trim();
    let stdout = stdout.trim();
    if !stderr.is_empty() {
        message.push_str(&format!(": {}", stderr));
    } else if !stdout.is_empty() {
        message.push_str(&format!(": {}", stdout));
    }
    Err(message)
}

/// Percent-encodes an absolute path into a `file://` URL.
pub fn path_to_file_url(path: &Path) -> Result<String, String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map_err(|err| format!("failed to resolve current directory: {}", err))?
            .join(path)
    };
    let mut value = absolute.to_string_lossy().replace('\\', "/");
    if !value.starts_with('/') {
        value = format!("/{}", value);
    }

    let mut out = String::from("file://");
    for byte in value.as_bytes() {
        let ch = *byte as char;
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '~' | '/') {
            out.push(ch);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url_is_percent_encoded() {
        let url = path_to_file_url(Path::new("/tmp/my proposal/ü.html")).unwrap();
        assert_eq!(url, "file:///tmp/my%20proposal/%C3%BC.html");
    }

    #[cfg(unix)]
    fn fake_engine(dir: &Path, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_render_with_weasyprint_style_engine() {
        let dir = tempfile::tempdir().unwrap();
        // Copies the input HTML to the last argument.
        let engine = fake_engine(
            dir.path(),
            "weasyprint",
            r#"for a; do prev=$last; last=$a; done; cp "$prev" "$last""#,
        );
        let output = dir.path().join("out.pdf");
        let settings = PdfSettings {
            base_dir: Some(dir.path().to_path_buf()),
            ..PdfSettings::default()
        };
        let pdf = PdfEngine::new(ResolvedBackend::WeasyPrint(engine), &settings);
        assert_eq!(pdf.render("<p>hello</p>", &output), None);
        assert_eq!(fs::read_to_string(&output).unwrap(), "<p>hello</p>");

        // The temp HTML and the temp PDF are cleaned up afterwards.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".proposal2pdf-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "wkhtmltopdf", "echo 'cannot load page' >&2; exit 2");
        let pdf = PdfEngine::new(ResolvedBackend::Wkhtmltopdf(engine), &PdfSettings::default());
        let err = pdf.render("<p/>", &dir.path().join("out.pdf")).unwrap();
        assert!(err.starts_with("wkhtmltopdf failed"));
        assert!(err.contains("cannot load page"));
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_output_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        fs::write(&output, "stale").unwrap();
        let engine = fake_engine(dir.path(), "weasyprint", "exit 0");
        let pdf = PdfEngine::new(ResolvedBackend::WeasyPrint(engine), &PdfSettings::default());
        let err = pdf.render("<p/>", &output).unwrap();
        assert!(err.contains("did not produce"));
        assert_eq!(fs::read_to_string(&output).unwrap(), "stale");
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_render_keeps_previous_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        fs::write(&output, "%PDF-1.4 previous").unwrap();
        // Writes partial output, then fails.
        let engine = fake_engine(
            dir.path(),
            "weasyprint",
            r#"for a; do last=$a; done; echo partial > "$last"; exit 1"#,
        );
        let pdf = PdfEngine::new(ResolvedBackend::WeasyPrint(engine), &PdfSettings::default());
        let err = pdf.render("<p/>", &output).unwrap();
        assert!(err.starts_with("weasyprint failed"));
        assert_eq!(fs::read_to_string(&output).unwrap(), "%PDF-1.4 previous");
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".pdf"))
            .count();
        assert_eq!(leftovers, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_render_replaces_previous_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        fs::write(&output, "old").unwrap();
        let engine = fake_engine(
            dir.path(),
            "wkhtmltopdf",
            r#"for a; do last=$a; done; echo new > "$last""#,
        );
        let pdf = PdfEngine::new(ResolvedBackend::Wkhtmltopdf(engine), &PdfSettings::default());
        assert_eq!(pdf.render("<p/>", &output), None);
        assert_eq!(fs::read_to_string(&output).unwrap(), "new\n");
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let pdf = PdfEngine::new(
            ResolvedBackend::Chromium(PathBuf::from("/nonexistent/chromium")),
            &PdfSettings::default(),
        );
        let dir = tempfile::tempdir().unwrap();
        let err = pdf.render("<p/>", &dir.path().join("out.pdf")).unwrap();
        assert!(err.starts_with("failed to run chromium"));
    }
}
