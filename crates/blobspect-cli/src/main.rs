//! blobspect - Inspect self-describing binary blobs
//!
//! This tool reads a blob from a file or URL, decodes its payload against
//! the schema embedded in the blob, and prints the result as YAML or JSON.

use anyhow::{Context, Result};
use blobspect_core::{
    resolve, DecoderConfig, Envelope, ErrorKind, InspectorScheme, Magic, RenderFormat,
    ResolverConfig, SchemeRegistry, UseCase, SDBF_MAGIC,
};
use clap::{Parser, ValueEnum};
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

/// Inspect self-describing binary blobs
#[derive(Parser, Debug)]
#[command(name = "blobspect")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// URL or file path of the blob to inspect
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Output format
    #[arg(long, value_enum, default_value = "yaml")]
    format: OutputFormat,

    /// Print the blob's schema before the decoded document
    #[arg(long)]
    schema: bool,

    /// Protocol context to decode the blob under
    #[arg(long, value_enum, default_value = "p2p")]
    use_case: UseCaseArg,

    /// Maximum value nesting accepted while decoding
    #[arg(long, default_value = "256")]
    max_depth: usize,

    /// Timeout in seconds for fetching http(s) sources
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Output format for the decoded document
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Block-style YAML with anchors for shared objects
    Yaml,
    /// Pretty-printed JSON with @id/@ref members for shared objects
    Json,
}

impl From<OutputFormat> for RenderFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Yaml => RenderFormat::Yaml,
            OutputFormat::Json => RenderFormat::Json,
        }
    }
}

/// Protocol context accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum UseCaseArg {
    /// Peer-to-peer messaging
    P2p,
    /// Server side of an RPC connection
    RpcServer,
    /// Client side of an RPC connection
    RpcClient,
    /// Persisted records
    Storage,
    /// Checkpointed state
    Checkpoint,
    /// Test fixtures
    Testing,
}

impl From<UseCaseArg> for UseCase {
    fn from(arg: UseCaseArg) -> Self {
        match arg {
            UseCaseArg::P2p => UseCase::P2p,
            UseCaseArg::RpcServer => UseCase::RpcServer,
            UseCaseArg::RpcClient => UseCase::RpcClient,
            UseCaseArg::Storage => UseCase::Storage,
            UseCaseArg::Checkpoint => UseCase::Checkpoint,
            UseCaseArg::Testing => UseCase::Testing,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for the document
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    match inspect(&cli, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Runs the whole pipeline for one source, writing to `out`.
///
/// Without `--schema` the scheme is selected from the magic alone, so a blob
/// of another format fails as unsupported before its schema is parsed.
fn inspect(cli: &Cli, out: &mut impl Write) -> Result<()> {
    let resolver = ResolverConfig::new().timeout(Duration::from_secs(cli.timeout));
    let blob = resolve(&cli.source, &resolver)
        .with_context(|| format!("Failed to load blob from {}", cli.source))?;
    info!("Blob {} ({} bytes, blake3 {})", blob.origin(), blob.len(), blob.digest());

    let registry = SchemeRegistry::new();
    if !cli.schema {
        let magic = Magic::read(&blob)
            .with_context(|| format!("Failed to read magic of {}", blob.origin()))?;
        register_scheme(&registry, cli)?;
        registry.resolve(&magic, cli.use_case.into())?;
    }

    let envelope = Envelope::extract(&blob)
        .with_context(|| format!("Failed to read envelope of {}", blob.origin()))?;
    let stats = envelope.schema().stats();
    debug!(
        "Schema declares {} records ({} fields) and {} enums ({} constants)",
        stats.record_count, stats.field_count, stats.enum_count, stats.constant_count
    );

    if cli.schema {
        writeln!(out, "{}\n", envelope.schema()).context("Failed to write schema")?;
        out.flush().context("Failed to write schema")?;
        register_scheme(&registry, cli)?;
    }

    let scheme = registry.resolve(envelope.magic(), cli.use_case.into())?;
    debug!("Decoding with scheme '{}'", scheme.name());

    let value = scheme
        .decode(envelope.schema(), envelope.payload())
        .with_context(|| format!("Failed to decode payload of {}", blob.origin()))?;

    RenderFormat::from(cli.format)
        .write(&value, out)
        .context("Failed to render document")?;

    Ok(())
}

/// Registers the built-in scheme, configured from the command line
fn register_scheme(registry: &SchemeRegistry, cli: &Cli) -> Result<()> {
    let scheme = InspectorScheme::new(SDBF_MAGIC, UseCase::P2p)
        .with_config(DecoderConfig::new().max_depth(cli.max_depth));
    registry.register(Box::new(scheme))?;
    Ok(())
}

/// Maps a failure to the process exit code of its pipeline stage.
///
/// Codes start at 3 so they never overlap clap's usage error code 2.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<blobspect_core::Error>().map(|e| e.kind()) {
        Some(ErrorKind::Resolution) => 3,
        Some(ErrorKind::MalformedEnvelope) => 4,
        Some(ErrorKind::UnsupportedScheme) => 5,
        Some(ErrorKind::Decode) => 6,
        Some(ErrorKind::Render) => 7,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    /// Schema of `example.Basic { name: string, value: i32 }`
    const BASIC_SCHEMA: &[u8] = &[
        0x20, 0x00, 0x01, 0x01, 0x0D, b'e', b'x', b'a', b'm', b'p', b'l', b'e', b'.', b'B', b'a',
        b's', b'i', b'c', 0x02, 0x04, b'n', b'a', b'm', b'e', 0x0D, 0x05, b'v', b'a', b'l', b'u',
        b'e', 0x04,
    ];

    fn blob_file(magic: &[u8; 8], payload: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(magic).unwrap();
        file.write_all(&[BASIC_SCHEMA.len() as u8]).unwrap();
        file.write_all(BASIC_SCHEMA).unwrap();
        file.write_all(payload).unwrap();
        file.flush().unwrap();
        file
    }

    fn cli_for(file: &NamedTempFile, extra: &[&str]) -> Cli {
        let path = file.path().to_string_lossy().to_string();
        let mut args = vec!["blobspect", path.as_str()];
        args.extend_from_slice(extra);
        Cli::parse_from(args)
    }

    const BASIC_PAYLOAD: &[u8] = &[0x01, 0x01, b'a', 0x01, 0x00, 0x00, 0x00];

    #[test]
    fn test_inspect_basic() {
        let file = blob_file(SDBF_MAGIC.as_bytes(), BASIC_PAYLOAD);
        let mut out = Vec::new();
        inspect(&cli_for(&file, &[]), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "example.Basic\n---\nname: a\nvalue: 1\n"
        );
    }

    #[test]
    fn test_inspect_json() {
        let file = blob_file(SDBF_MAGIC.as_bytes(), BASIC_PAYLOAD);
        let mut out = Vec::new();
        inspect(&cli_for(&file, &["--format", "json"]), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("example.Basic\n{"));
        assert!(text.contains("\"name\": \"a\""));
    }

    #[test]
    fn test_schema_printed_before_decode_failure() {
        let file = blob_file(SDBF_MAGIC.as_bytes(), &[0x01, 0x05, b'a']);
        let mut out = Vec::new();
        let err = inspect(&cli_for(&file, &["--schema"]), &mut out).unwrap_err();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("root example.Basic;\n"));
        assert!(text.ends_with("}\n\n"));
        assert_eq!(exit_code(&err), 6);
    }

    #[test]
    fn test_unsupported_magic_prints_nothing() {
        let file = blob_file(b"OTHR\x01\x00\x00\x00", BASIC_PAYLOAD);
        let mut out = Vec::new();
        let err = inspect(&cli_for(&file, &[]), &mut out).unwrap_err();
        assert!(out.is_empty());
        assert_eq!(exit_code(&err), 5);
    }

    #[test]
    fn test_foreign_magic_with_garbage_is_unsupported() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"OTHR\x01\x00\x00\x00").unwrap();
        file.write_all(&[0xFF; 12]).unwrap();
        file.flush().unwrap();

        let mut out = Vec::new();
        let err = inspect(&cli_for(&file, &[]), &mut out).unwrap_err();
        assert!(out.is_empty());
        assert_eq!(exit_code(&err), 5);
        assert!(format!("{:#}", err).contains("OTHR"));
    }

    #[test]
    fn test_foreign_magic_with_schema_flag_is_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"OTHR\x01\x00\x00\x00").unwrap();
        file.write_all(&[0xFF; 12]).unwrap();
        file.flush().unwrap();

        let err = inspect(&cli_for(&file, &["--schema"]), &mut Vec::new()).unwrap_err();
        assert_eq!(exit_code(&err), 4);
    }

    #[test]
    fn test_use_case_must_match() {
        let file = blob_file(SDBF_MAGIC.as_bytes(), BASIC_PAYLOAD);
        let mut out = Vec::new();
        let err = inspect(&cli_for(&file, &["--use-case", "storage"]), &mut out).unwrap_err();
        assert_eq!(exit_code(&err), 5);
    }

    #[test]
    fn test_missing_file_exit_code() {
        let cli = Cli::parse_from(["blobspect", "/nonexistent/blobspect/missing.blob"]);
        let err = inspect(&cli, &mut Vec::new()).unwrap_err();
        assert_eq!(exit_code(&err), 3);
        assert!(format!("{:#}", err).contains("missing.blob"));
    }

    #[test]
    fn test_short_blob_exit_code() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"SDB").unwrap();
        let err = inspect(&cli_for(&file, &[]), &mut Vec::new()).unwrap_err();
        assert_eq!(exit_code(&err), 4);
    }

    #[test]
    fn test_other_errors_exit_code() {
        assert_eq!(exit_code(&anyhow::anyhow!("something else")), 1);
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
