use std::{
    fs::File,
    io::{BufReader, Write as _},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};
use wavyte_presets::{BaseData, ProjectFile, ReferenceItem};

#[derive(Parser, Debug)]
#[command(name = "wavyte-presets", version)]
struct Cli {
    /// Log merge decisions (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a generation pass and write the resulting composition document.
    Generate(GenerateArgs),
    /// Report reference keys used by entries but not defined by the project.
    Validate(ValidateArgs),
    /// Resolve `data:[..]` references in a single JSON value.
    Resolve(ResolveArgs),
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output document path (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Fail on the first preset that cannot be run or merged.
    #[arg(long)]
    strict: bool,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct ResolveArgs {
    /// JSON value to resolve.
    #[arg(long)]
    value: PathBuf,

    /// Reference pool: a list of reference items or a `{key: value}` object.
    #[arg(long)]
    refs: PathBuf,

    /// Whole-value substitution with `$data` overrides instead of template expansion.
    #[arg(long)]
    flexible: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RefsFile {
    Items(Vec<ReferenceItem>),
    Map(serde_json::Map<String, serde_json::Value>),
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Command::Generate(args) => cmd_generate(args),
        Command::Validate(args) => cmd_validate(args),
        Command::Resolve(args) => cmd_resolve(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "wavyte_presets=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let f = File::open(path).with_context(|| format!("open {what} '{}'", path.display()))?;
    serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parse {what} JSON"))
}

fn write_json(out: Option<&Path>, value: &impl serde::Serialize) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output")?;
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(path, text + "\n")
                .with_context(|| format!("write document '{}'", path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{text}").context("write to stdout")?;
        }
    }
    Ok(())
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<ExitCode> {
    let project = ProjectFile::from_path(&args.in_path)?;
    // Unknown preset ids surface as PresetNotFound diagnostics of the pass.
    project.base_document.validate()?;

    let report = project.generate(args.strict)?;
    for d in &report.diagnostics {
        eprintln!("warning: {d}");
    }
    write_json(args.out.as_deref(), &report.document)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<ExitCode> {
    let project = ProjectFile::from_path(&args.in_path)?;
    project.validate()?;

    let missing = project.missing_references();
    if missing.is_empty() {
        println!("ok: {} entries, all references defined", project.entries.len());
        return Ok(ExitCode::SUCCESS);
    }
    for m in &missing {
        println!(
            "entries[{}] ({}): missing {}",
            m.index,
            m.preset_id,
            m.keys.join(", ")
        );
    }
    Ok(ExitCode::FAILURE)
}

fn cmd_resolve(args: ResolveArgs) -> anyhow::Result<ExitCode> {
    let value: serde_json::Value = read_json(&args.value, "value")?;
    let base = match read_json::<RefsFile>(&args.refs, "references")? {
        RefsFile::Items(items) => BaseData::from_items(items),
        RefsFile::Map(map) => BaseData::from(map),
    };

    let resolved = if args.flexible {
        wavyte_presets::resolve_flexible(&value, &base)
    } else {
        wavyte_presets::resolve_all(&value, &base)
    };
    for d in &resolved.diagnostics {
        eprintln!("warning: {d}");
    }
    write_json(None, &resolved.value)?;
    Ok(ExitCode::SUCCESS)
}
