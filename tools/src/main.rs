use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glob::Pattern;
use tools::{
    describe_aspects, describe_flags, describe_target, dump_payload, format_dump_pretty,
    parse_number, summarize, MaskReport, PayloadDump,
};
use tracing_subscriber::EnvFilter;
use wire::Limits;

#[derive(Parser)]
#[command(
    name = "crysync-tools",
    version,
    about = "crysync payload and RMI inspection tools"
)]
struct Cli {
    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize one payload file or every payload in a directory.
    Inspect {
        /// Payload file or directory.
        path: PathBuf,
        /// Optional glob filter when inspecting a directory.
        #[arg(long)]
        glob: Option<String>,
        /// Sort inspected payloads.
        #[arg(long, value_enum)]
        sort: Option<InspectSort>,
        /// Limit the number of inspected payloads (after sorting).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print every group and field of a payload.
    Dump {
        /// Payload file.
        path: PathBuf,
    },
    /// Decode a packed RMI flag byte (decimal or 0x hex).
    Flags { raw: String },
    /// Name the bits of an RMI target mask.
    Target { raw: String },
    /// Name the bits of an entity aspect mask.
    Aspects { raw: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InspectSort {
    Size,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let limits = Limits::default();
    match cli.command {
        Command::Inspect {
            path,
            glob,
            sort,
            limit,
        } => {
            if path.is_dir() {
                let entries = collect_entries(&path, glob.as_deref())?;
                let mut entries = maybe_sort_entries(entries, sort);
                let limit = limit.or(sort.map(|InspectSort::Size| 10));
                if let Some(limit) = limit {
                    entries.truncate(limit);
                }
                for entry in entries {
                    let dump = load_dump(&entry.path, &limits)?;
                    if !cli.json {
                        println!("== {} ({} bytes) ==", entry.path.display(), entry.size);
                    }
                    print_inspect(&dump, cli.json)?;
                }
            } else {
                let dump = load_dump(&path, &limits)?;
                print_inspect(&dump, cli.json)?;
            }
        }
        Command::Dump { path } => {
            let dump = load_dump(&path, &limits)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&dump).context("serialize json")?
                );
            } else {
                print!("{}", format_dump_pretty(&dump));
            }
        }
        Command::Flags { raw } => {
            let raw = u8::try_from(parse_number(&raw).context("parse flag byte")?)
                .context("flag byte must fit in 8 bits")?;
            let report = describe_flags(raw).context("decode flags")?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("serialize json")?
                );
            } else {
                println!(
                    "0x{:02X}: attachment={} reliable={} to_server={} low_delay={}",
                    report.raw,
                    report.attachment,
                    report.reliable,
                    report.to_server,
                    report.low_delay
                );
            }
        }
        Command::Target { raw } => print_mask(&describe_target(parse_mask(&raw)?), cli.json)?,
        Command::Aspects { raw } => print_mask(&describe_aspects(parse_mask(&raw)?), cli.json)?,
    }
    Ok(())
}

fn load_dump(path: &Path, limits: &Limits) -> Result<PayloadDump> {
    let bytes = fs::read(path).with_context(|| format!("read payload {}", path.display()))?;
    tracing::debug!(path = %path.display(), len = bytes.len(), "payload loaded");
    dump_payload(&bytes, limits).with_context(|| format!("decode payload {}", path.display()))
}

fn parse_mask(raw: &str) -> Result<u32> {
    let value = parse_number(raw).context("parse mask")?;
    u32::try_from(value).context("mask must fit in 32 bits")
}

fn print_inspect(dump: &PayloadDump, json: bool) -> Result<()> {
    let summary = summarize(dump);
    if json {
        let value = serde_json::json!({
            "version": dump.version,
            "context": dump.context,
            "size": dump.size,
            "summary": summary,
        });
        println!(
            "{}",
            serde_json::to_string(&value).context("serialize json")?
        );
    } else {
        println!(
            "version: {} context: {:?} size: {} bytes",
            dump.version, dump.context, dump.size
        );
        println!(
            "fields: {} groups: {} max depth: {}",
            summary.fields, summary.groups, summary.max_depth
        );
    }
    Ok(())
}

fn print_mask(report: &MaskReport, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("serialize json")?
        );
        return Ok(());
    }
    let names = if report.names.is_empty() {
        "(none)".to_owned()
    } else {
        report.names.join(" | ")
    };
    println!("0x{:08X}: {names}", report.raw);
    if report.unknown_bits != 0 {
        println!("unknown bits: 0x{:08X}", report.unknown_bits);
    }
    Ok(())
}

struct PayloadEntry {
    path: PathBuf,
    size: u64,
}

fn collect_entries(dir: &Path, glob: Option<&str>) -> Result<Vec<PayloadEntry>> {
    let mut entries = Vec::new();
    let pattern = match glob {
        Some(value) => Some(Pattern::new(value).context("invalid glob pattern")?),
        None => None,
    };

    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(pattern) = &pattern {
            let matches_path = pattern.matches_path(&path);
            let matches_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.matches(name));
            if !matches_path && !matches_name {
                continue;
            }
        }
        let size = entry.metadata()?.len();
        entries.push(PayloadEntry { path, size });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn maybe_sort_entries(
    mut entries: Vec<PayloadEntry>,
    sort: Option<InspectSort>,
) -> Vec<PayloadEntry> {
    if let Some(InspectSort::Size) = sort {
        entries.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
    }
    entries
}
