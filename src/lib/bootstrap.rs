//! Locating, and if necessary installing, the external PDF engine.
//!
//! Everything else the pipeline needs is compiled into the binary, so the
//! engine executable is the only runtime dependency that can be missing.

use crate::settings::{PdfBackend, PdfSettings};
use crate::ProposalError;
use log::{debug, info};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const WEASYPRINT: &[&str] = &["weasyprint"];
const CHROMIUM: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "msedge",
    "microsoft-edge",
];
const WKHTMLTOPDF: &[&str] = &["wkhtmltopdf"];

/// An engine that was found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedBackend {
    WeasyPrint(PathBuf),
    Chromium(PathBuf),
    Wkhtmltopdf(PathBuf),
}

impl ResolvedBackend {
    pub fn name(&self) -> &'static str {
        match self {
            ResolvedBackend::WeasyPrint(_) => "weasyprint",
            ResolvedBackend::Chromium(_) => "chromium",
            ResolvedBackend::Wkhtmltopdf(_) => "wkhtmltopdf",
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ResolvedBackend::WeasyPrint(path)
            | ResolvedBackend::Chromium(path)
            | ResolvedBackend::Wkhtmltopdf(path) => path,
        }
    }
}

/// Directories searched for engine executables: `PATH`, then `~/.local/bin`
/// where `pip install --user` puts its scripts.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = env::var_os("PATH")
        .map(|path| env::split_paths(&path).collect())
        .unwrap_or_default();
    if let Some(home) = dirs::home_dir() {
        let local_bin = home.join(".local").join("bin");
        if !found.contains(&local_bin) {
            found.push(local_bin);
        }
    }
    found
}

/// First executable named in `candidates` found in `dirs`, searching each
/// directory in order.
pub fn resolve_executable(candidates: &[&str], dirs: &[PathBuf]) -> Option<PathBuf> {
    for dir in dirs {
        for candidate in candidates {
            let full = dir.join(candidate);
            if is_executable(&full) {
                return Some(full);
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    let metadata = match fs::metadata(path) {
        Ok(value) => value,
        Err(_) => return false,
    };
    metadata.is_file() && metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

fn resolve_in(backend: PdfBackend, dirs: &[PathBuf]) -> Result<ResolvedBackend, ProposalError> {
    let weasyprint = || resolve_executable(WEASYPRINT, dirs).map(ResolvedBackend::WeasyPrint);
    let chromium = || resolve_executable(CHROMIUM, dirs).map(ResolvedBackend::Chromium);
    let wkhtmltopdf = || resolve_executable(WKHTMLTOPDF, dirs).map(ResolvedBackend::Wkhtmltopdf);

    let found = match backend {
        PdfBackend::Auto => weasyprint().or_else(chromium).or_else(wkhtmltopdf),
        PdfBackend::WeasyPrint => weasyprint(),
        PdfBackend::Chromium => chromium(),
        PdfBackend::Wkhtmltopdf => wkhtmltopdf(),
    };

    found.ok_or_else(|| {
        let name = match backend {
            PdfBackend::Auto => "weasyprint, chromium or wkhtmltopdf",
            other => other.name(),
        };
        ProposalError::MissingDependency {
            name: name.to_string(),
            message: format!("{} not found in PATH or ~/.local/bin", name),
            suggestion: "Install WeasyPrint (python3 -m pip install --user weasyprint) \
                         or select another engine with --backend"
                .to_string(),
        }
    })
}

/// Finds the configured engine without installing anything.
pub fn resolve_backend(settings: &PdfSettings) -> Result<ResolvedBackend, ProposalError> {
    let backend = resolve_in(settings.backend, &search_dirs())?;
    debug!("Using {} at {}", backend.name(), backend.path().display());
    Ok(backend)
}

/// Finds the configured engine, running the installer once when it is
/// missing and installation is enabled.
pub fn ensure_backend(settings: &PdfSettings) -> Result<ResolvedBackend, ProposalError> {
    match resolve_backend(settings) {
        Ok(backend) => Ok(backend),
        Err(err) if settings.install_missing && !settings.installer.is_empty() => {
            info!("{}; running installer", err_summary(&err));
            run_installer(&settings.installer)?;
            resolve_backend(settings)
        }
        Err(err) => Err(err),
    }
}

fn err_summary(err: &ProposalError) -> String {
    match err {
        ProposalError::MissingDependency { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Runs `command[0]` with the remaining elements as arguments.
///
/// A spawn failure or a non-zero exit is a [`ProposalError::MissingDependency`].
pub fn run_installer(command: &[String]) -> Result<(), ProposalError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| ProposalError::MissingDependency {
            name: "installer".to_string(),
            message: "No installer command configured".to_string(),
            suggestion: "Set [pdf] installer in the configuration or install the engine manually"
                .to_string(),
        })?;

    info!("Running installer: {}", command.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ProposalError::MissingDependency {
            name: program.clone(),
            message: format!("Failed to run installer '{}': {}", program, e),
            suggestion: format!("Make sure '{}' is installed and on PATH", program),
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detail = if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        stdout.trim().to_string()
    };
    Err(ProposalError::MissingDependency {
        name: program.clone(),
        message: format!("Installer '{}' failed ({}): {}", command.join(" "), output.status, detail),
        suggestion: "Install the PDF engine manually, then run again with --no-install".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn fake_executable(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_auto_prefers_weasyprint() {
        let dir = tempfile::tempdir().unwrap();
        fake_executable(dir.path(), "wkhtmltopdf");
        fake_executable(dir.path(), "chromium");
        let weasy = fake_executable(dir.path(), "weasyprint");
        let dirs = vec![dir.path().to_path_buf()];
        assert_eq!(
            resolve_in(PdfBackend::Auto, &dirs).unwrap(),
            ResolvedBackend::WeasyPrint(weasy)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_auto_falls_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let wk = fake_executable(dir.path(), "wkhtmltopdf");
        let dirs = vec![dir.path().to_path_buf()];
        assert_eq!(
            resolve_in(PdfBackend::Auto, &dirs).unwrap(),
            ResolvedBackend::Wkhtmltopdf(wk)
        );
        assert!(resolve_in(PdfBackend::Chromium, &dirs).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("weasyprint"), "not executable").unwrap();
        let dirs = vec![dir.path().to_path_buf()];
        assert!(resolve_executable(WEASYPRINT, &dirs).is_none());
    }

    #[test]
    fn test_missing_backend_error_names_engine() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_in(PdfBackend::WeasyPrint, &[dir.path().to_path_buf()]).unwrap_err();
        match err {
            ProposalError::MissingDependency { name, .. } => assert_eq!(name, "weasyprint"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_search_dirs_include_local_bin() {
        if let Some(home) = dirs::home_dir() {
            assert!(search_dirs().contains(&home.join(".local").join("bin")));
        }
    }

    #[test]
    fn test_empty_installer_is_an_error() {
        assert!(matches!(
            run_installer(&[]),
            Err(ProposalError::MissingDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_installer_program_is_an_error() {
        let command = vec!["proposal2pdf-no-such-installer".to_string()];
        assert!(matches!(
            run_installer(&command),
            Err(ProposalError::MissingDependency { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_installer_reports_output() {
        let command: Vec<String> = ["sh", "-c", "echo broken >&2; exit 3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        match run_installer(&command) {
            Err(ProposalError::MissingDependency { message, .. }) => {
                assert!(message.contains("broken"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
