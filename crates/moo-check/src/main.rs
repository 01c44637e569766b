//! Batch decoder for MOO test files.
//!
//! Decodes every file named on the command line in parallel and reports
//! what it found: CPU, format version, test count, anomalies and how many
//! tests appear in an optional revocation list.

use std::path::{Path, PathBuf};
use std::process;

use format_moo::{
    CollectionStats, DecodeOptions, Flag, Register, RevocationSet, TestCollection,
};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

struct CliArgs {
    revocations: Option<PathBuf>,
    strict_hashes: bool,
    json: bool,
    paths: Vec<String>,
}

fn print_usage() {
    eprintln!("Usage: moo-check [OPTIONS] PATH...");
    eprintln!();
    eprintln!("Each PATH may be a .MOO file, a directory, or a glob pattern.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --revocations <file>  Count tests whose hash appears in this list");
    eprintln!("  --strict-hashes       Treat duplicate test hashes as a decode failure");
    eprintln!("  --json                Print the report as JSON");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_arg_list(&args) {
        Ok(Some(cli)) => cli,
        Ok(None) => {
            print_usage();
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            process::exit(1);
        }
    }
}

/// Parse arguments (without the program name). `Ok(None)` means help was
/// requested.
fn parse_arg_list(args: &[String]) -> Result<Option<CliArgs>, String> {
    let mut cli = CliArgs {
        revocations: None,
        strict_hashes: false,
        json: false,
        paths: Vec::new(),
    };

    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--revocations" => match args.next() {
                Some(path) if !path.starts_with("--") => {
                    cli.revocations = Some(PathBuf::from(path));
                }
                _ => return Err("--revocations requires a file argument".to_string()),
            },
            "--strict-hashes" => {
                cli.strict_hashes = true;
            }
            "--json" => {
                cli.json = true;
            }
            "--help" | "-h" => return Ok(None),
            other if other.starts_with("--") => {
                return Err(format!("Unknown argument: {other}"));
            }
            path => cli.paths.push(path.to_string()),
        }
    }

    if cli.paths.is_empty() {
        return Err("No input paths given".to_string());
    }
    Ok(Some(cli))
}

/// Expand a command-line path into the MOO files it names.
fn expand_path(arg: &str) -> Vec<PathBuf> {
    let path = Path::new(arg);
    if path.is_file() {
        vec![path.to_path_buf()]
    } else if path.is_dir() {
        // Glob matching is case-sensitive on most platforms.
        ["*.MOO", "*.moo"]
            .iter()
            .flat_map(|ext| glob_files(&path.join(ext).to_string_lossy()))
            .collect()
    } else {
        glob_files(arg)
    }
}

fn glob_files(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(paths) => paths
            .filter_map(|entry| match entry {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("{e}");
                    None
                }
            })
            .filter(|p| p.is_file())
            .collect(),
        Err(e) => {
            warn!("Invalid pattern {pattern:?}: {e}");
            Vec::new()
        }
    }
}

#[derive(Serialize)]
struct FileReport {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<CollectionStats>,
    anomalies: Vec<String>,
    revoked: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl FileReport {
    fn failed(path: &Path, error: String) -> Self {
        Self {
            path: path.to_path_buf(),
            cpu: None,
            version: None,
            stats: None,
            anomalies: Vec::new(),
            revoked: 0,
            error: Some(error),
        }
    }
}

fn check_file(path: &Path, options: DecodeOptions, revoked: &RevocationSet) -> FileReport {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) => return FileReport::failed(path, format!("read error: {e}")),
    };
    match TestCollection::parse_with(&data, options) {
        Ok(moo) => FileReport {
            path: path.to_path_buf(),
            cpu: Some(moo.cpu().to_string()),
            version: Some(moo.version().to_string()),
            stats: Some(moo.stats()),
            anomalies: moo.anomalies().iter().map(ToString::to_string).collect(),
            revoked: moo.revoked_count(revoked),
            error: None,
        },
        Err(e) => FileReport::failed(path, e.to_string()),
    }
}

fn print_text(reports: &[FileReport]) {
    for r in reports {
        match (&r.error, &r.stats) {
            (Some(e), _) => println!("{}: FAILED: {e}", r.path.display()),
            (None, Some(stats)) => {
                println!(
                    "{}: {} v{}, {} tests, {} cycles ({}-{}, avg {:.1}), {} exceptions, {} revoked",
                    r.path.display(),
                    r.cpu.as_deref().unwrap_or("?"),
                    r.version.as_deref().unwrap_or("?"),
                    stats.tests,
                    stats.total_cycles,
                    stats.min_cycles,
                    stats.max_cycles,
                    stats.avg_cycles,
                    stats.with_exception,
                    r.revoked
                );
                println!(
                    "  bus: {} fetches, {} mem reads, {} mem writes, {} io reads, {} io writes, {} waits",
                    stats.code_fetches,
                    stats.mem_reads,
                    stats.mem_writes,
                    stats.io_reads,
                    stats.io_writes,
                    stats.wait_states
                );
                if !stats.registers_modified.is_empty() {
                    let regs: Vec<&str> =
                        stats.registers_modified.iter().copied().map(Register::name).collect();
                    println!("  modifies: {}", regs.join(" "));
                }
                let modified = stats.flags_modified();
                if !modified.is_empty() {
                    let flags: Vec<&str> = modified.iter().copied().map(Flag::name).collect();
                    println!("  flags: {}", flags.join(" "));
                }
                for a in &r.anomalies {
                    println!("  {a}");
                }
            }
            (None, None) => {}
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = parse_args();

    let revoked = match &cli.revocations {
        Some(path) => match RevocationSet::load(path) {
            Ok(set) => set,
            Err(e) => {
                eprintln!("Failed to read revocation list {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => RevocationSet::default(),
    };

    let mut files: Vec<PathBuf> = cli.paths.iter().flat_map(|p| expand_path(p)).collect();
    files.sort();
    files.dedup();
    if files.is_empty() {
        eprintln!("No MOO files found");
        process::exit(1);
    }
    info!("Checking {} files", files.len());

    let options = DecodeOptions {
        strict_hashes: cli.strict_hashes,
    };
    let reports: Vec<FileReport> = files
        .par_iter()
        .map(|path| check_file(path, options, &revoked))
        .collect();

    if cli.json {
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("JSON error: {e}");
                process::exit(1);
            }
        }
    } else {
        print_text(&reports);
    }

    let failures = reports.iter().filter(|r| r.error.is_some()).count();
    if failures > 0 {
        eprintln!("{failures} of {} files failed to decode", reports.len());
        process::exit(1);
    }
}
