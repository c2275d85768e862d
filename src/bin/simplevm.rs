use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use simplevm::{assemble, image, AsmError, CoreDump, CpuConfig, Machine, Program};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assemble and run programs on the simplevm virtual CPU"
)]
struct Opts {
    /// Program to run: a .vasm source or persisted bytecode
    #[arg(value_name = "INPUT")]
    input: PathBuf,
    /// Assemble INPUT into this bytecode file instead of running it
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,
    /// CPU settings as JSON
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Fault after this many instructions
    #[arg(long)]
    max_steps: Option<u64>,
    /// Print the final machine state as JSON
    #[arg(long)]
    dump_json: bool,
}

fn load_config(path: Option<&Path>) -> Result<CpuConfig> {
    let Some(path) = path else {
        return Ok(CpuConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn assemble_file(path: &Path) -> Result<Program> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    match assemble(&source) {
        Ok(p) => Ok(p),
        Err(AsmError::Diagnostics(diags)) => {
            for d in &diags {
                eprintln!("[ERROR] {d}");
            }
            bail!("{}: assembly failed with {} diagnostic(s)", path.display(), diags.len())
        }
        Err(e) => Err(e).with_context(|| format!("assembling {}", path.display())),
    }
}

fn print_dump(dump: &CoreDump, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(dump)?);
    } else {
        print!("{dump}");
    }
    Ok(())
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    if let Some(output) = &opts.output {
        let program = assemble_file(&opts.input)?;
        image::write_file(output, &program)
            .with_context(|| format!("writing {}", output.display()))?;
        info!(words = program.len(), "wrote {}", output.display());
        println!("Executable written to: {}", output.display());
        return Ok(ExitCode::SUCCESS);
    }

    let mut cfg = load_config(opts.config.as_deref())?;
    if opts.max_steps.is_some() {
        cfg.max_steps = opts.max_steps;
    }

    let program = if opts.input.extension().is_some_and(|e| e == "vasm") {
        assemble_file(&opts.input)?
    } else {
        image::read_file(&opts.input)
            .with_context(|| format!("loading {}", opts.input.display()))?
    };

    let mut machine = Machine::new(cfg);
    match machine.run(&program) {
        Ok(exit) => {
            print_dump(&machine.dump(), opts.dump_json)?;
            println!("process finished with exit code {}", exit.code);
            Ok(ExitCode::from(exit.code as u8))
        }
        Err(fault) => {
            print_dump(&fault.dump, opts.dump_json)?;
            Err(anyhow::Error::new(fault).context(format!("running {}", opts.input.display())))
        }
    }
}
