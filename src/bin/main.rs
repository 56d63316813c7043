use clap::{Arg, ArgAction, Command};
use log::{debug, error, info, warn, LevelFilter};
use proposal2pdf::config::{self, ConfigSource};
use proposal2pdf::settings::{PdfBackend, ProposalConfig};
use proposal2pdf::{validation, ConvertOptions, ProposalError, Stage};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Debug)]
enum AppError {
    ConversionError(ProposalError),
    ArgumentError(String),
    ValidationFailed(usize),
}

/// Verbosity level for output
#[derive(Debug, Clone, Copy, PartialEq)]
enum Verbosity {
    Quiet,   // No output except errors
    Normal,  // Standard output
    Verbose, // Detailed output
}

fn get_verbosity(matches: &clap::ArgMatches) -> Verbosity {
    if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Get the configuration file based on CLI arguments or default behavior.
///
/// Priority order:
/// 1. If `--config` is explicitly provided, use that file
/// 2. If `proposal2pdfrc.toml` exists in current directory, use it
/// 3. If it exists in the user configuration directory, use that
/// 4. Otherwise use default configuration
fn get_config_file(matches: &clap::ArgMatches) -> Option<PathBuf> {
    if let Some(config_file) = matches.get_one::<String>("config") {
        return Some(PathBuf::from(config_file));
    }
    config::discover_config_file()
}

fn load_config(matches: &clap::ArgMatches) -> Result<ProposalConfig, AppError> {
    let mut config = match get_config_file(matches) {
        Some(path) => {
            let path_str = path
                .to_str()
                .ok_or_else(|| AppError::ArgumentError("Invalid config path".to_string()))?;
            debug!("Loading configuration from {}", path_str);
            config::load_config_from_source(ConfigSource::File(path_str))
        }
        None => config::load_config_from_source(ConfigSource::Default),
    };

    if let Some(name) = matches.get_one::<String>("backend") {
        config.pdf.backend = PdfBackend::from_name(name).ok_or_else(|| {
            AppError::ArgumentError(format!(
                "Unknown backend '{}' (expected auto, weasyprint, chromium or wkhtmltopdf)",
                name
            ))
        })?;
    }
    if matches.get_flag("no-install") {
        config.pdf.install_missing = false;
    }
    Ok(config)
}

fn get_input_path(matches: &clap::ArgMatches) -> PathBuf {
    matches
        .get_one::<String>("path")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("proposal.md"))
}

fn get_output_path(matches: &clap::ArgMatches) -> PathBuf {
    matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("proposal.pdf"))
}

fn format_size(bytes: u64) -> String {
    format!("{:.1} KB", bytes as f64 / 1024.0)
}

fn dry_run(input: &Path, config: &ProposalConfig, verbosity: Verbosity) -> Result<(), AppError> {
    let source = proposal2pdf::read_source(input).map_err(AppError::ConversionError)?;
    let warnings = validation::validate_document(&source, config);

    if verbosity == Verbosity::Quiet {
        return if warnings.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationFailed(warnings.len()))
        };
    }

    for warning in &warnings {
        println!("⚠️  {}", warning);
    }
    println!("✓ Dry-run validation complete. No PDF generated.");
    if warnings.is_empty() {
        println!("✓ No issues detected. Run without --dry-run to generate the PDF.");
    } else {
        println!(
            "⚠️  {} warning(s) found. Review above and run without --dry-run to generate the PDF anyway.",
            warnings.len()
        );
    }
    Ok(())
}

fn run(matches: clap::ArgMatches) -> Result<(), AppError> {
    let verbosity = get_verbosity(&matches);
    let config = load_config(&matches)?;
    let input = get_input_path(&matches);
    let output = get_output_path(&matches);

    if matches.get_flag("dry-run") {
        return dry_run(&input, &config, verbosity);
    }

    let options = ConvertOptions {
        html_output: matches.get_one::<String>("html").map(PathBuf::from),
        html_only: matches.get_flag("html-only"),
    };

    let report = proposal2pdf::convert_file_with_progress(&input, &output, &config, &options, |stage| {
        if verbosity == Verbosity::Quiet {
            return;
        }
        match stage {
            Stage::Installing(command) => println!("Installing PDF engine: {}", command),
            Stage::ConvertingMarkdown => println!("Converting markdown to HTML..."),
            Stage::ConvertingPdf => println!("Converting HTML to PDF..."),
        }
    })
    .map_err(AppError::ConversionError)?;

    if verbosity == Verbosity::Verbose {
        info!(
            "{} reference(s) linked, {} left as-is",
            report.document.references.len(),
            report.document.unmatched_references
        );
        if !report.document.has_references_section {
            warn!("No references section found");
        }
    }

    if verbosity != Verbosity::Quiet {
        if let Some(html) = &options.html_output {
            println!("📝 HTML written to {}", html.display());
        }
        if let Some(size) = report.pdf_size {
            println!("✅ PDF successfully generated: {}", output.display());
            println!("📄 File size: {}", format_size(size));
            if verbosity == Verbosity::Verbose {
                if let Some(backend) = report.backend {
                    println!("   Engine: {}", backend);
                }
            }
        }
    }

    Ok(())
}

fn build_cli() -> Command {
    Command::new("proposal2pdf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Convert a Markdown research proposal into a styled PDF")
        .after_help(
            "EXAMPLES:\n  \
            proposal2pdf\n  \
            proposal2pdf -p proposal.md -o proposal.pdf\n  \
            proposal2pdf -p proposal.md --html proposal.html --html-only\n  \
            proposal2pdf -p proposal.md --dry-run\n  \
            proposal2pdf --backend chromium --no-install\n",
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .value_name("FILE_PATH")
                .help("Path to the markdown proposal (defaults to ./proposal.md)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_PATH")
                .help("Path to the output PDF file (defaults to ./proposal.pdf)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("CONFIG_FILE")
                .help("Path to configuration file (TOML format). Auto-detects proposal2pdfrc.toml if not specified"),
        )
        .arg(
            Arg::new("html")
                .long("html")
                .value_name("HTML_PATH")
                .help("Also write the composed HTML document to this file"),
        )
        .arg(
            Arg::new("html-only")
                .long("html-only")
                .help("Stop after writing the HTML; no PDF engine is needed")
                .action(ArgAction::SetTrue)
                .requires("html"),
        )
        .arg(
            Arg::new("backend")
                .long("backend")
                .value_name("ENGINE")
                .help("PDF engine: auto, weasyprint, chromium or wkhtmltopdf"),
        )
        .arg(
            Arg::new("no-install")
                .long("no-install")
                .help("Fail instead of installing a missing PDF engine")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show detailed output including debug logs and the engine used")
                .action(ArgAction::SetTrue)
                .conflicts_with("quiet"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress all output except errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Validate the proposal without generating anything")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("get-default-configuration")
                .long("get-default-configuration")
                .help("Print a default proposal2pdfrc.toml to stdout and exit")
                .action(ArgAction::SetTrue),
        )
}

fn main() {
    let matches = build_cli().get_matches();

    // Initialize logger with environment variable control (RUST_LOG)
    let mut logger = env_logger::Builder::from_default_env();
    logger.format_timestamp_millis();
    match get_verbosity(&matches) {
        Verbosity::Verbose => {
            logger.filter_level(LevelFilter::Debug);
        }
        Verbosity::Quiet => {
            logger.filter_level(LevelFilter::Error);
        }
        Verbosity::Normal => {
            if std::env::var_os("RUST_LOG").is_none() {
                logger.filter_level(LevelFilter::Warn);
            }
        }
    }
    logger.init();

    // Print a default configuration TOML and exit if requested
    if matches.get_flag("get-default-configuration") {
        println!("{}", config::default_config_toml());
        process::exit(0);
    }

    if let Err(e) = run(matches) {
        match e {
            AppError::ConversionError(e) => error!("[X] {}", e),
            AppError::ArgumentError(e) => error!("[X] Invalid arguments: {}", e),
            AppError::ValidationFailed(count) => {
                error!("[X] Validation found {} warning(s)", count)
            }
        }
        process::exit(1);
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_default_paths() {
        let matches = build_cli().get_matches_from(vec!["proposal2pdf"]);
        assert_eq!(get_input_path(&matches), PathBuf::from("proposal.md"));
        assert_eq!(get_output_path(&matches), PathBuf::from("proposal.pdf"));
        assert_eq!(get_verbosity(&matches), Verbosity::Normal);
    }

    #[test]
    fn test_custom_paths_and_verbosity() {
        let matches =
            build_cli().get_matches_from(vec!["proposal2pdf", "-p", "a.md", "-o", "b.pdf", "-q"]);
        assert_eq!(get_input_path(&matches), PathBuf::from("a.md"));
        assert_eq!(get_output_path(&matches), PathBuf::from("b.pdf"));
        assert_eq!(get_verbosity(&matches), Verbosity::Quiet);
    }

    #[test]
    fn test_backend_and_no_install_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("custom.toml");
        fs::write(&config_path, "[pdf]\nbackend = \"weasyprint\"\n").unwrap();
        let matches = build_cli().get_matches_from(vec![
            "proposal2pdf",
            "-c",
            config_path.to_str().unwrap(),
            "--backend",
            "wkhtmltopdf",
            "--no-install",
        ]);
        let config = load_config(&matches).unwrap();
        assert_eq!(config.pdf.backend, PdfBackend::Wkhtmltopdf);
        assert!(!config.pdf.install_missing);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let matches = build_cli().get_matches_from(vec!["proposal2pdf", "--backend", "latex"]);
        assert!(matches!(load_config(&matches), Err(AppError::ArgumentError(_))));
    }

    #[test]
    fn test_explicit_config_takes_priority() {
        let matches = build_cli().get_matches_from(vec!["proposal2pdf", "--config", "custom.toml"]);
        assert_eq!(get_config_file(&matches), Some(PathBuf::from("custom.toml")));
    }

    #[test]
    fn test_html_only_requires_html() {
        let result = build_cli().try_get_matches_from(vec!["proposal2pdf", "--html-only"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
    }

    #[test]
    fn test_quiet_dry_run_fails_on_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("p.md");
        fs::write(&input, "no title, no abstract").unwrap();
        let result = dry_run(&input, &ProposalConfig::default(), Verbosity::Quiet);
        assert!(matches!(result, Err(AppError::ValidationFailed(_))));
    }
}
