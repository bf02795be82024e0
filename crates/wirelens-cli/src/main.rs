//! wirelens - Sniff the structure of Protocol Buffer model files
//!
//! This tool decides whether a file holds the text or the binary wire
//! encoding and prints the field structure it recovers without a schema.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;
use wirelens_core::text::LineReader;
use wirelens_core::{Decoder, ReaderConfig, Signature, TextReader};

/// Sniff the structure of Protocol Buffer model files without a schema
#[derive(Parser, Debug)]
#[command(name = "wirelens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Which encoding to assume
    #[arg(long, value_enum, default_value = "auto")]
    format: InputFormat,

    /// Character encoding hint for text input (utf-8, iso-8859-1, ...)
    #[arg(long)]
    encoding: Option<String>,

    /// Deepest nesting followed during signature inference
    #[arg(long, default_value = "64")]
    max_depth: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "tree")]
    output: OutputFormat,

    /// Skip files larger than this many bytes
    #[arg(long, default_value = "536870912")]
    max_size: u64,

    /// Print the first N lines of text input
    #[arg(long, default_value = "0")]
    preview: usize,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single file to inspect
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of files to inspect and group
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Encoding of the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    /// Text format if it sniffs as text, otherwise binary
    Auto,
    /// Binary wire format
    Binary,
    /// Text format
    Text,
}

/// Output format for recovered structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Indented field tree
    Tree,
    /// Short hash of the tree (for grouping and scripting)
    Fingerprint,
}

/// Structure recovered from one file
#[derive(Debug, Clone, PartialEq)]
enum Report {
    /// Text format with its field paths
    Text {
        encoding: &'static str,
        tags: BTreeSet<String>,
    },
    /// Binary wire format with its inferred signature
    Binary(Signature),
    /// Neither encoding produced any structure
    Unrecognized,
}

impl Report {
    fn render(&self) -> String {
        match self {
            Report::Text { encoding, tags } => {
                let mut out = format!("text ({})\n", encoding);
                for tag in tags {
                    out.push_str(tag);
                    out.push('\n');
                }
                out
            }
            Report::Binary(signature) => format!("binary\n{}", signature),
            Report::Unrecognized => "unrecognized\n".to_string(),
        }
    }

    /// First 16 hex digits of the blake3 hash of the rendered tree
    fn fingerprint(&self) -> String {
        let hash = blake3::hash(self.render().as_bytes());
        hash.to_hex()[..16].to_string()
    }
}

/// Files grouped by structure fingerprint
#[derive(Default)]
struct FingerprintGroups {
    /// Maps fingerprint -> (report, files)
    groups: BTreeMap<String, (Report, Vec<PathBuf>)>,
    /// Statistics
    stats: GroupStats,
}

#[derive(Default)]
struct GroupStats {
    inspected: usize,
    unrecognized: usize,
    skipped: usize,
    failed: usize,
}

impl FingerprintGroups {
    fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, path: &Path, report: Report) {
        self.stats.inspected += 1;
        if report == Report::Unrecognized {
            self.stats.unrecognized += 1;
        }
        let fingerprint = report.fingerprint();
        self.groups
            .entry(fingerprint)
            .or_insert_with(|| (report, Vec::new()))
            .1
            .push(path.to_path_buf());
    }

    fn print(&self, output: OutputFormat) {
        for (fingerprint, (report, files)) in &self.groups {
            println!("{}  {} file(s)", fingerprint, files.len());
            for file in files {
                println!("  {}", file.display());
            }
            if output == OutputFormat::Tree {
                for line in report.render().lines() {
                    println!("    {}", line);
                }
            }
        }
    }

    fn print_summary(&self) {
        info!(
            "Summary: {} inspected, {} groups, {} unrecognized, {} skipped, {} failed",
            self.stats.inspected,
            self.groups.len(),
            self.stats.unrecognized,
            self.stats.skipped,
            self.stats.failed
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, file)
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, directory)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

/// Inspect one file and print its structure
fn process_single_file(cli: &Cli, file: &Path) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let data = read_input(file)?;
    if cli.preview > 0 {
        for line in preview(&data, cli.encoding.as_deref(), cli.preview)? {
            println!("| {}", line);
        }
    }

    let report = inspect(cli, &data)
        .with_context(|| format!("Failed to inspect {}", file.display()))?;
    match cli.output {
        OutputFormat::Tree => print!("{}", report.render()),
        OutputFormat::Fingerprint => println!("{}", report.fingerprint()),
    }
    Ok(())
}

/// Inspect a directory recursively and group files by structure
fn process_directory(cli: &Cli, directory: &Path) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut groups = FingerprintGroups::new();
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || is_hidden(path) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > cli.max_size {
            trace!("Skipping large file: {} ({} bytes)", path.display(), size);
            groups.stats.skipped += 1;
            continue;
        }

        debug!("Inspecting: {}", path.display());
        match read_input(path).and_then(|data| inspect(cli, &data)) {
            Ok(report) => groups.add(path, report),
            Err(e) => {
                // Log error but continue with other files
                warn!("Error inspecting {}: {:#}", path.display(), e);
                groups.stats.failed += 1;
            }
        }
    }

    groups.print(cli.output);
    groups.print_summary();
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    trace!("Reading {}", path.display());
    let data = fs::read(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    trace!("Read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

/// Recover structure from `data` according to `--format`
fn inspect(cli: &Cli, data: &[u8]) -> Result<Report> {
    let encoding = cli.encoding.as_deref();
    match cli.format {
        InputFormat::Text => {
            let reader = TextReader::with_encoding(data, encoding)
                .context("Input is not readable as text")?;
            text_report(reader)
        }
        InputFormat::Binary => Ok(binary_report(cli, data)),
        InputFormat::Auto => {
            match TextReader::open_with_encoding(data, encoding) {
                Ok(Some(reader)) => {
                    let report = text_report(reader)?;
                    if report != Report::Unrecognized {
                        return Ok(report);
                    }
                    debug!("Text sniffing matched but no fields parsed");
                }
                Ok(None) => {}
                Err(e) => debug!("Not text: {}", e),
            }
            Ok(binary_report(cli, data))
        }
    }
}

fn text_report(mut reader: TextReader<'_>) -> Result<Report> {
    let tags = reader.signature().context("Failed to read text fields")?;
    if tags.is_empty() {
        return Ok(Report::Unrecognized);
    }
    let encoding = reader.encoding().map_or("utf-8", |e| e.label());
    Ok(Report::Text { encoding, tags })
}

fn binary_report(cli: &Cli, data: &[u8]) -> Report {
    let config = ReaderConfig::new().max_depth(cli.max_depth);
    let signature = Signature::infer_with(data, &config);
    if signature.is_empty() {
        Report::Unrecognized
    } else {
        Report::Binary(signature)
    }
}

/// First `count` lines of `data` decoded as text
fn preview(data: &[u8], encoding: Option<&str>, count: usize) -> Result<Vec<String>> {
    let decoder = Decoder::open(data, encoding).context("Input is not readable as text")?;
    LineReader::with_limit(decoder, 64 * 1024)
        .take(count)
        .collect::<wirelens_core::Result<Vec<_>>>()
        .context("Failed to decode preview")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["wirelens", "--file", "unused"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    // field 1: { field 1: 150 }, field 2: "no"
    const BINARY: [u8; 9] = [0x0A, 0x03, 0x08, 0x96, 0x01, 0x12, 0x02, b'n', b'o'];
    const TEXT: &[u8] = b"# model\nname: \"net\"\ngraph { node { op: 'Add' } }\n";

    #[test]
    fn test_inspect_auto_detects_text() {
        let report = inspect(&cli(&[]), TEXT).unwrap();
        match report {
            Report::Text { encoding, tags } => {
                assert_eq!(encoding, "utf-8");
                let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
                assert_eq!(tags, vec!["graph", "graph.node", "name"]);
            }
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[test]
    fn test_inspect_auto_falls_back_to_binary() {
        let report = inspect(&cli(&[]), &BINARY).unwrap();
        assert_eq!(
            report.render(),
            "binary\n1: message\n  1: varint\n2: bytes\n"
        );
    }

    #[test]
    fn test_inspect_respects_max_depth() {
        let report = inspect(&cli(&["--max-depth", "0"]), &BINARY).unwrap();
        assert_eq!(report.render(), "binary\n1: bytes\n2: bytes\n");
    }

    #[test]
    fn test_inspect_forced_format() {
        let report = inspect(&cli(&["--format", "binary"]), TEXT).unwrap();
        assert_ne!(report, inspect(&cli(&[]), TEXT).unwrap());

        assert!(inspect(&cli(&["--format", "text", "--encoding", "utf-16"]), TEXT).is_err());
        assert_eq!(inspect(&cli(&[]), b"").unwrap(), Report::Unrecognized);
    }

    #[test]
    fn test_fingerprint() {
        let a = inspect(&cli(&[]), &BINARY).unwrap();
        let b = inspect(&cli(&[]), &BINARY).unwrap();
        let c = inspect(&cli(&[]), TEXT).unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn test_preview() {
        let lines = preview(TEXT, None, 2).unwrap();
        assert_eq!(lines, vec!["# model", "name: \"net\""]);
    }

    #[test]
    fn test_groups_by_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let write = |name: &str, data: &[u8]| {
            let path = temp_dir.path().join(name);
            let mut file = fs::File::create(&path).unwrap();
            file.write_all(data).unwrap();
            path
        };
        let first = write("a.pb", &BINARY);
        let second = write("b.pb", &BINARY);
        let third = write("c.pbtxt", TEXT);

        let cli = cli(&[]);
        let mut groups = FingerprintGroups::new();
        for path in [&first, &second, &third] {
            let data = read_input(path).unwrap();
            groups.add(path, inspect(&cli, &data).unwrap());
        }

        assert_eq!(groups.groups.len(), 2);
        assert_eq!(groups.stats.inspected, 3);
        let binary = inspect(&cli, &BINARY).unwrap().fingerprint();
        assert_eq!(groups.groups[&binary].1, vec![first, second]);
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(Path::new("/tmp/.cache")));
        assert!(!is_hidden(Path::new("/tmp/model.onnx")));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
