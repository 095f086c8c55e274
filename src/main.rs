//! Purpose: `bakehouse` CLI entry point: pool creation, serving, and remote admin.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit one JSON value on stdout (pretty on a TTY).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;

use bakehouse::api::{Error, ErrorKind, TargetInfo, to_exit_code};

mod command_dispatch;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::InvalidArgument)
                        .with_message(clap_error_summary(&err))
                        .with_hint(clap_error_hint(&err)),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command)
        .map_err(add_io_hint)
        .map_err(add_corrupt_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "bakehouse",
    version,
    about = "Region storage on persistent pool files, served over HTTP",
    long_about = None,
    after_help = r#"EXAMPLES
  $ bakehouse make-pool /data/a.bake --size 64M
  $ bakehouse serve --provider-id 1 --target /data/a.bake
  $ bakehouse probe 127.0.0.1:9800
  $ bakehouse region put 127.0.0.1:9800 <TARGET> 'hello'
  $ bakehouse region get 127.0.0.1:9800 <TARGET> <REGION>

NOTES
  - Output is JSON on stdout; errors are JSON on stderr (text on a TTY)
  - Exit codes are stable per error kind"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        name = "make-pool",
        about = "Create a new pool file (never overwrites)",
        after_help = r#"EXAMPLES
  $ bakehouse make-pool /data/a.bake --size 64M
  $ bakehouse make-pool /data/b.bake --size 8M --mode 0600 --max-regions 128"#
    )]
    MakePool {
        #[arg(help = "Pool file path", value_hint = ValueHint::FilePath)]
        path: PathBuf,
        #[arg(long, default_value = "8M", help = "Pool file size (bytes or K/M/G)")]
        size: String,
        #[arg(long, default_value = "0644", help = "File mode in octal")]
        mode: String,
        #[arg(long, help = "Region slot count (default scales with size)")]
        max_regions: Option<u32>,
    },
    #[command(
        about = "Host a provider over HTTP (loopback by default)",
        after_help = r#"EXAMPLES
  $ bakehouse serve --provider-id 1 --target /data/a.bake
  $ bakehouse serve --bind 127.0.0.1:9801 --create-target /data/c.bake=16M

NOTES
  - Non-loopback binds require --allow-non-loopback
  - POST /v0/shutdown is refused unless --enable-remote-shutdown is set
  - RUST_LOG controls log verbosity (default: info)"#
    )]
    Serve(ServeArgs),
    #[command(about = "List the targets a provider serves")]
    Probe {
        #[command(flatten)]
        remote: RemoteArgs,
        #[arg(long, default_value_t = 0, help = "Maximum targets to return (0 = all)")]
        max: u64,
    },
    #[command(about = "Ask a server started with --enable-remote-shutdown to stop")]
    Shutdown {
        #[arg(help = "Server address (host:port or http URL)")]
        address: String,
        #[arg(long, help = "Request timeout (e.g. 500ms, 10s)")]
        timeout: Option<String>,
    },
    #[command(arg_required_else_help = true, about = "Manage a provider's targets")]
    Target {
        #[command(subcommand)]
        command: TargetCommand,
    },
    #[command(arg_required_else_help = true, about = "Region operations against a provider")]
    Region {
        #[command(subcommand)]
        command: RegionCommand,
    },
}

#[derive(Args)]
struct RemoteArgs {
    #[arg(help = "Server address (host:port or http URL)")]
    address: String,
    #[arg(long, default_value_t = 1, help = "Provider id at the server")]
    provider_id: u16,
    #[arg(long, help = "Request timeout (e.g. 500ms, 10s)")]
    timeout: Option<String>,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:9800", help = "Bind address")]
    bind: String,
    #[arg(long, default_value_t = 1, help = "Provider id to register")]
    provider_id: u16,
    #[arg(long = "target", value_name = "PATH", help = "Attach an existing pool (repeatable)")]
    targets: Vec<PathBuf>,
    #[arg(
        long = "create-target",
        value_name = "PATH=SIZE",
        help = "Create a pool if missing, then attach it (repeatable)"
    )]
    create_targets: Vec<String>,
    #[arg(long, help = "Allow POST /v0/shutdown")]
    enable_remote_shutdown: bool,
    #[arg(long, help = "Allow binding to non-loopback addresses")]
    allow_non_loopback: bool,
    #[arg(long, default_value = "64M", help = "Maximum request body size (bytes or K/M/G)")]
    max_body_bytes: String,
}

#[derive(Subcommand)]
enum TargetCommand {
    #[command(about = "Attach an existing pool file at the server")]
    Attach {
        #[command(flatten)]
        remote: RemoteArgs,
        #[arg(help = "Pool path on the server host")]
        path: String,
    },
    #[command(about = "Create and attach a pool file at the server")]
    Create {
        #[command(flatten)]
        remote: RemoteArgs,
        #[arg(help = "Pool path on the server host")]
        path: String,
        #[arg(long, default_value = "8M", help = "Pool file size (bytes or K/M/G)")]
        size: String,
    },
    #[command(about = "Detach a target (the pool file is kept)")]
    Detach {
        #[command(flatten)]
        remote: RemoteArgs,
        target: String,
    },
    #[command(about = "List attached targets")]
    List {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    #[command(about = "Move every region of a target to another provider")]
    Migrate {
        #[command(flatten)]
        remote: RemoteArgs,
        target: String,
        #[command(flatten)]
        dest: DestArgs,
        #[arg(long, help = "Directory on the destination host for the new pool")]
        dest_root: String,
    },
}

#[derive(Args)]
struct DestArgs {
    #[arg(long = "dest", help = "Destination server address")]
    dest_address: String,
    #[arg(long, default_value_t = 1, help = "Destination provider id")]
    dest_provider_id: u16,
    #[arg(long, help = "Remove the source after a successful copy")]
    remove_source: bool,
}

#[derive(Subcommand)]
enum RegionCommand {
    #[command(about = "Allocate a zero-filled region")]
    Create {
        #[command(flatten)]
        remote: RemoteArgs,
        target: String,
        #[arg(long, help = "Region size (bytes or K/M/G)")]
        size: String,
    },
    #[command(
        about = "Store bytes as a new durable region",
        after_help = r#"EXAMPLES
  $ bakehouse region put 127.0.0.1:9800 <TARGET> 'hello'
  $ bakehouse region put 127.0.0.1:9800 <TARGET> -f blob.bin
  $ cat blob.bin | bakehouse region put 127.0.0.1:9800 <TARGET> -f -"#
    )]
    Put {
        #[command(flatten)]
        remote: RemoteArgs,
        target: String,
        #[arg(help = "Inline data (UTF-8)")]
        data: Option<String>,
        #[arg(
            short = 'f',
            long = "file",
            help = "Read data from a file (use - for stdin)",
            conflicts_with = "data",
            value_hint = ValueHint::FilePath
        )]
        file: Option<String>,
    },
    #[command(about = "Read bytes from a region")]
    Get {
        #[command(flatten)]
        remote: RemoteArgs,
        target: String,
        region: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, help = "Bytes to read (default: to the end of the region)")]
        size: Option<String>,
        #[arg(long, help = "Write raw bytes to stdout instead of JSON")]
        raw: bool,
    },
    #[command(about = "Print a region's size")]
    Size {
        #[command(flatten)]
        remote: RemoteArgs,
        target: String,
        region: String,
    },
    #[command(about = "Free a region")]
    Remove {
        #[command(flatten)]
        remote: RemoteArgs,
        target: String,
        region: String,
    },
    #[command(about = "List live regions of a target")]
    List {
        #[command(flatten)]
        remote: RemoteArgs,
        target: String,
    },
    #[command(about = "Copy a region to another provider")]
    Migrate {
        #[command(flatten)]
        remote: RemoteArgs,
        target: String,
        region: String,
        #[command(flatten)]
        dest: DestArgs,
        #[arg(long, help = "Target id at the destination")]
        dest_target: String,
    },
}

fn parse_size(input: &str) -> Result<u64, Error> {
    let trimmed = input.trim();
    let split = trimmed
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map(|(idx, _)| idx)
        .unwrap_or(trimmed.len());
    let digits = trimmed[..split].trim();
    let suffix = trimmed[split..].trim();

    let value: u64 = digits.parse().map_err(|err| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message("invalid size")
            .with_hint("Use bytes or K/M/G (e.g. 64M).")
            .with_source(err)
    })?;

    let multiplier = match suffix {
        "" => 1,
        "K" | "k" => 1024,
        "M" | "m" => 1024 * 1024,
        "G" | "g" => 1024 * 1024 * 1024,
        _ => {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message("invalid size suffix")
                .with_hint("Use K/M/G (e.g. 64M)."));
        }
    };

    value.checked_mul(multiplier).ok_or_else(|| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message("size overflow")
            .with_hint("Use a smaller size value.")
    })
}

fn parse_mode(input: &str) -> Result<u32, Error> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
    let mode = u32::from_str_radix(digits, 8).map_err(|err| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message(format!("invalid mode '{trimmed}'"))
            .with_hint("Use an octal mode like 0644.")
            .with_source(err)
    })?;
    if mode > 0o7777 {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message(format!("mode '{trimmed}' is out of range"))
            .with_hint("Use an octal mode like 0644."));
    }
    Ok(mode)
}

fn parse_duration(input: &str) -> Result<Duration, Error> {
    let invalid = || {
        Error::new(ErrorKind::InvalidArgument)
            .with_message("invalid duration")
            .with_hint("Use a number plus ms|s|m|h (e.g. 10s).")
    };
    let trimmed = input.trim();
    let split = trimmed.char_indices().find(|(_, ch)| !ch.is_ascii_digit());
    let (num_str, unit) = match split {
        Some((idx, _)) => trimmed.split_at(idx),
        None => ("", ""),
    };
    if num_str.is_empty() || unit.is_empty() {
        return Err(invalid());
    }
    let value: u64 = num_str.parse().map_err(|_| invalid())?;
    let millis = match unit {
        "ms" => value,
        "s" => value.saturating_mul(1_000),
        "m" => value.saturating_mul(60_000),
        "h" => value.saturating_mul(3_600_000),
        _ => return Err(invalid()),
    };
    Ok(Duration::from_millis(millis))
}

/// Splits `PATH=SIZE` on the last `=` so paths may contain `=`.
fn parse_create_target(input: &str) -> Result<(PathBuf, u64), Error> {
    let (path, size) = input.rsplit_once('=').ok_or_else(|| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message(format!("invalid --create-target '{input}'"))
            .with_hint("Use PATH=SIZE (e.g. /data/a.bake=64M).")
    })?;
    if path.is_empty() {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message("--create-target path is empty")
            .with_hint("Use PATH=SIZE (e.g. /data/a.bake=64M)."));
    }
    Ok((PathBuf::from(path), parse_size(size)?))
}

fn read_input(data: Option<String>, file: Option<String>) -> Result<Vec<u8>, Error> {
    match (data, file) {
        (Some(data), _) => Ok(data.into_bytes()),
        (None, Some(path)) if path == "-" => read_stdin(),
        (None, Some(path)) => std::fs::read(&path).map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_message("failed to read input file")
                .with_path(&path)
                .with_source(err)
        }),
        (None, None) if !io::stdin().is_terminal() => read_stdin(),
        (None, None) => Err(Error::new(ErrorKind::InvalidArgument)
            .with_message("missing region data")
            .with_hint("Provide inline data, --file PATH, or pipe bytes on stdin.")),
    }
}

fn read_stdin() -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read stdin")
            .with_source(err)
    })?;
    Ok(buf)
}

fn io_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

fn target_info_json(info: &TargetInfo) -> Value {
    json!({
        "target": info.id.to_string(),
        "path": info.path.display().to_string(),
        "file_size": info.file_size,
        "data_size": info.data_size,
        "slot_count": info.slot_count,
        "region_count": info.region_count,
        "used_bytes": info.used_bytes,
        "free_bytes": info.free_bytes,
    })
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => {
            err.with_hint("Permission denied. Check file and directory permissions.")
        }
        ErrorKind::Busy => {
            err.with_hint("Pool is attached by another process. Detach it there first.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the address, path, and disk space."),
        _ => err,
    }
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Corrupt || err.hint().is_some() {
        return err;
    }
    err.with_hint("Pool appears corrupt. Recreate it from a migrated copy.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and share command/context if it persists.",
    )
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    match err.message() {
        Some(message) => message.to_string(),
        None => err.kind().as_str().to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(err.kind().as_str()));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(target) = err.target() {
        inner.insert("target".to_string(), json!(target));
    }
    if let Some(region) = err.region() {
        inner.insert("region".to_string(), json!(region));
    }
    if let Some(offset) = err.offset() {
        inner.insert("offset".to_string(), json!(offset));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    let fields = [
        ("hint:", err.hint().map(str::to_string)),
        ("path:", err.path().map(|path| path.display().to_string())),
        ("target:", err.target().map(str::to_string)),
        ("region:", err.region().map(str::to_string)),
        ("offset:", err.offset().map(|offset| offset.to_string())),
        ("caused by:", error_causes(err).into_iter().next()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            lines.push(format!(
                "{} {value}",
                colorize_label(label, use_color, AnsiColor::Yellow)
            ));
        }
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);
    let Some(usage) = usage else {
        return "Try `bakehouse --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "bakehouse") else {
        return "Try `bakehouse --help`.".to_string();
    };
    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect();
    if parts.is_empty() {
        return "Try `bakehouse --help`.".to_string();
    }
    format!("Try `bakehouse {} --help`.", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::{
        Cli, error_json, error_text, parse_create_target, parse_duration, parse_mode, parse_size,
    };
    use bakehouse::api::{Error, ErrorKind};
    use clap::CommandFactory;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_size_accepts_bytes_and_kmg() {
        assert_eq!(parse_size("42").unwrap(), 42);
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("2k").unwrap(), 2048);
        assert_eq!(parse_size("3M").unwrap(), 3 * 1024 * 1024);
        assert_eq!(parse_size("4g").unwrap(), 4 * 1024 * 1024 * 1024);
    }

    #[test]
    fn parse_size_rejects_iec_suffixes_and_garbage() {
        for input in ["1MiB", "2Gi", "", "M", "-5"] {
            let err = parse_size(input).expect_err(input);
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn parse_mode_reads_octal() {
        assert_eq!(parse_mode("0644").unwrap(), 0o644);
        assert_eq!(parse_mode("600").unwrap(), 0o600);
        assert_eq!(parse_mode("0o755").unwrap(), 0o755);
        assert!(parse_mode("0999").is_err());
        assert!(parse_mode("17777").is_err());
    }

    #[test]
    fn parse_duration_accepts_ms_s_m() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn create_target_splits_on_last_equals() {
        let (path, size) = parse_create_target("/tmp/a=b.bake=1M").expect("parse");
        assert_eq!(path, PathBuf::from("/tmp/a=b.bake"));
        assert_eq!(size, 1024 * 1024);
        assert!(parse_create_target("/tmp/a.bake").is_err());
        assert!(parse_create_target("=1M").is_err());
    }

    #[test]
    fn error_json_carries_kind_and_context() {
        let err = Error::new(ErrorKind::OutOfBounds)
            .with_message("write past end")
            .with_region("AAAA")
            .with_offset(12);
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "OutOfBounds");
        assert_eq!(value["error"]["message"], "write past end");
        assert_eq!(value["error"]["region"], "AAAA");
        assert_eq!(value["error"]["offset"], 12);
        assert!(value["error"].get("hint").is_none());
    }

    #[test]
    fn error_text_respects_color_flag() {
        let err = Error::new(ErrorKind::InvalidArgument).with_message("bad input");
        let colored = error_text(&err, true);
        let plain = error_text(&err, false);
        assert!(colored.contains("\u{1b}[31merror:\u{1b}[0m"));
        assert!(plain.contains("error: bad input"));
        assert!(!plain.contains("\u{1b}["));
    }
}
