use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use std::fmt::Write as _;
use std::path::PathBuf;

use simplevm_disasm::analyze::{build_report, Report};
use simplevm_disasm::model::load_image;

#[derive(Parser, Debug)]
#[command(author, version, about = "simplevm bytecode disassembler", long_about = None)]
struct Cli {
    /// Persisted bytecode (or a .vasm source, assembled first)
    #[arg(value_name = "FILE")]
    input: PathBuf,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Linear listing of every word
    List {
        /// Show the raw words of each instruction
        #[arg(long)]
        show_words: bool,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Control-flow report from entry points
    Analyze {
        /// Entry word indices. Repeat to add more; defaults to 0.
        #[arg(long = "entry", value_name = "INDEX")]
        entries: Vec<String>,
        /// Maximum instructions to visit
        #[arg(long, default_value_t = 100_000usize)]
        max_instr: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat { Text, Json }

fn parse_index(s: &str) -> Result<usize> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(usize::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<usize>()?)
    }
}

fn render_listing(report: &Report, show_words: bool) -> String {
    let mut buf = String::new();
    for line in &report.listing {
        if let Some(lbl) = &line.label {
            let _ = writeln!(buf, "{lbl}:");
        }
        if show_words {
            let words: Vec<String> = line.words.iter().map(|w| w.to_string()).collect();
            let _ = writeln!(buf, "  {:5}: {:<24} {}", line.index, words.join(" "), line.text);
        } else {
            let _ = writeln!(buf, "  {:5}: {}", line.index, line.text);
        }
    }
    buf
}

fn render_summary(report: &Report) -> String {
    let mut buf = String::new();
    let _ = writeln!(buf, "Analysis summary:");
    let _ = writeln!(buf, "  entries     : {:?}", report.entries);
    let _ = writeln!(buf, "  insts       : {}", report.listing.len());
    let _ = writeln!(buf, "  edges       : {}", report.edges.len());
    let _ = writeln!(buf, "  unreachable : {:?}", report.unreachable);
    let _ = writeln!(buf, "Edges:");
    for e in &report.edges {
        let _ = writeln!(buf, "  {:5} -> {:5} ({})", e.from, e.to, e.kind);
    }
    if !report.bad_targets.is_empty() {
        let _ = writeln!(buf, "Targets off an instruction boundary:");
        for e in &report.bad_targets {
            let _ = writeln!(buf, "  {:5} -> {:5} ({})", e.from, e.to, e.kind);
        }
    }
    buf
}

fn emit(out: Option<PathBuf>, text: &str) -> Result<()> {
    match out {
        Some(path) => std::fs::write(&path, text).with_context(|| format!("writing {}", path.display())),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let img = load_image(&cli.input)?;

    match cli.cmd {
        Command::List { show_words, out } => {
            let report = build_report(&img, &[0], usize::MAX);
            emit(out, &render_listing(&report, show_words))?;
        }
        Command::Analyze { entries, max_instr, format, out } => {
            let mut seeds: Vec<usize> = if entries.is_empty() {
                vec![0]
            } else {
                entries.iter().map(|e| parse_index(e)).collect::<Result<_>>()?
            };
            seeds.sort_unstable();
            seeds.dedup();
            let report = build_report(&img, &seeds, max_instr);
            let text = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&report)? + "\n",
                OutputFormat::Text => render_summary(&report) + "\nListing:\n" + &render_listing(&report, false),
            };
            emit(out, &text)?;
        }
    }

    Ok(())
}
