//! CLI argument parsing for the build report hook.
//!
//! Every command loads the config, opens a session on its two store files,
//! does one thing, and writes the files back.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "breport",
    version,
    about = "Filter build output into match reports and per-artifact summaries",
    after_help = "Commands:\n  record --config <file> --stage <stage> --input <src> --output <obj>   Record tool output read from stdin or --log\n  run --config <file> --stage <stage> --input <src> --output <obj> -- <cmd>...   Run a tool and record its output\n  summarize --config <file> --executable <exe> --obj <obj>...   Summarize matches for an artifact\n  check --config <file>   Validate the config and list filters\n\nExamples:\n  breport run --config breport.json --stage compile --input main.c --output main.o -- cc -c main.c -o main.o\n  breport summarize --config breport.json --executable app --obj main.o --obj util.o --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log session activity to stderr (overridden by RUST_LOG)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Record(RecordArgs),
    Run(RunArgs),
    Summarize(SummarizeArgs),
    Check(CheckArgs),
}

/// Identifies the compile event being recorded.
#[derive(Parser, Debug)]
pub struct EventArgs {
    /// Report config file
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Build stage that produced the output
    #[arg(long)]
    pub stage: String,

    /// Input file(s) of the invocation
    #[arg(long = "input", value_name = "PATH", required = true)]
    pub inputs: Vec<String>,

    /// Output file(s) of the invocation
    #[arg(long = "output", value_name = "PATH", required = true)]
    pub outputs: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Record already captured tool output")]
pub struct RecordArgs {
    #[command(flatten)]
    pub event: EventArgs,

    /// Read the tool output from this file instead of stdin
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Run a build tool and record its output")]
pub struct RunArgs {
    #[command(flatten)]
    pub event: EventArgs,

    /// Command line to run
    #[arg(last = true, required = true, value_name = "CMD")]
    pub command: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Append a summary for an artifact")]
pub struct SummarizeArgs {
    /// Report config file
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Artifact name recorded in the summary
    #[arg(long, value_name = "NAME")]
    pub executable: String,

    /// Object files linked into the artifact
    #[arg(long = "obj", value_name = "PATH", required = true)]
    pub obj_files: Vec<String>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Validate a config and list its filters")]
pub struct CheckArgs {
    /// Report config file
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,
}
