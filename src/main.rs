use anyhow::{anyhow, Context, Result};
use build_report::cli::{
    CheckArgs, Command, EventArgs, RecordArgs, RootArgs, RunArgs, SummarizeArgs,
};
use build_report::config::{load_config, Config};
use build_report::record::CompileEvent;
use build_report::report::FileSet;
use build_report::session::OutputSession;
use build_report::stage::Stage;
use clap::Parser;
use std::io::{self, Read, Write};
use std::process::{self, ExitCode};
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    let cli = RootArgs::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Record(args) => cmd_record(args),
        Command::Run(args) => cmd_run(args),
        Command::Summarize(args) => cmd_summarize(args),
        Command::Check(args) => cmd_check(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn cmd_record(args: RecordArgs) -> Result<ExitCode> {
    let bytes = match &args.log {
        Some(path) => std::fs::read(path).with_context(|| format!("read {}", path.display()))?,
        None => {
            let mut bytes = Vec::new();
            io::stdin()
                .read_to_end(&mut bytes)
                .context("read tool output from stdin")?;
            bytes
        }
    };
    let output = String::from_utf8_lossy(&bytes).into_owned();
    let stage: Stage = args.event.stage.parse()?;
    let config = load_config(&args.event.config)?;
    record_one(&config, stage, &args.event, output)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    let stage: Stage = args.event.stage.parse()?;
    let config = load_config(&args.event.config)?;
    let (program, rest) = args
        .command
        .split_first()
        .ok_or_else(|| anyhow!("no command given after --"))?;
    let resolved = which::which(program).with_context(|| format!("resolve command {program}"))?;
    tracing::debug!(command = %shell_words::join(&args.command), "running build tool");

    let captured = process::Command::new(&resolved)
        .args(rest)
        .output()
        .with_context(|| format!("run {}", resolved.display()))?;
    io::stdout()
        .write_all(&captured.stdout)
        .context("forward stdout")?;
    io::stderr()
        .write_all(&captured.stderr)
        .context("forward stderr")?;

    let output = combined_output(&captured.stdout, &captured.stderr);
    record_one(&config, stage, &args.event, output)?;

    let code = captured.status.code().unwrap_or(1);
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

/// Stdout followed by stderr, with stderr starting on its own line.
fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut output = String::from_utf8_lossy(stdout).into_owned();
    if !output.is_empty() && !stderr.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output.push_str(&String::from_utf8_lossy(stderr));
    output
}

fn cmd_summarize(args: SummarizeArgs) -> Result<ExitCode> {
    let config = load_config(&args.config)?;
    let mut session = OutputSession::open(&config)?;
    let summary = session.summarize(&args.obj_files, &args.executable)?;
    if args.json {
        let text = serde_json::to_string_pretty(summary).context("serialize summary")?;
        println!("{text}");
    } else {
        println!("{}:", summary.executable);
        if summary.results.is_empty() {
            println!("  no matches");
        }
        for entry in &summary.results {
            println!("  {}: {}", entry.name, entry.result);
        }
    }
    session.finalize()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(args: CheckArgs) -> Result<ExitCode> {
    let config = load_config(&args.config)?;
    println!("output_file: {}", config.output_file.display());
    println!("report_file: {}", config.report_file.display());
    let stages: Vec<&str> = config.output_stages.iter().map(Stage::as_str).collect();
    println!("output_stages: {}", stages.join(", "));
    for filter in &config.filters {
        println!("filter {} ({})", filter.name(), filter.summary());
    }
    Ok(ExitCode::SUCCESS)
}

fn record_one(config: &Config, stage: Stage, event: &EventArgs, output: String) -> Result<()> {
    let event = CompileEvent {
        output,
        stage,
        input_file: FileSet::from_paths(event.inputs.clone()),
        output_file: FileSet::from_paths(event.outputs.clone()),
    };
    let mut session = OutputSession::open(config)?;
    session.record_event(&event)?;
    session.finalize()
}
