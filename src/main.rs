use std::{ffi::OsString, path::PathBuf, process::ExitCode};

use clap::{CommandFactory, Parser};
use colored::Colorize;
use metac::{
    backend::CodegenOptions,
    driver::{compile_file, CompileOptions, Limits},
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    source_files: Vec<PathBuf>,

    /// Reserved for running the compiled program, currently ignored
    #[arg(long)]
    exec: bool,

    /// Directory to write `<name>.asm` files into instead of next to each
    /// source file
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Print the optimized graph of every routine
    #[arg(long)]
    dump_ir: bool,

    /// Leave node descriptions out of the generated assembly
    #[arg(long)]
    no_comments: bool,

    /// Maximum number of live nodes per routine
    #[arg(long)]
    max_nodes: Option<usize>,

    /// Log more (-v info, -vv debug, -vvv graph events)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn compile_options(&self) -> CompileOptions {
        let defaults = Limits::default();

        CompileOptions {
            limits: Limits {
                max_nodes: self.max_nodes.unwrap_or(defaults.max_nodes),
                ..defaults
            },
            codegen: CodegenOptions {
                emit_comments: !self.no_comments,
            },
            dump_ir: self.dump_ir,
        }
    }
}

/// The single dash spellings are accepted for compatibility
fn normalize_arguments(arguments: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    arguments
        .into_iter()
        .map(|argument| match argument.to_str() {
            Some("-exec") => "--exec".into(),
            Some("-help") => "--help".into(),
            Some("-version") => "--version".into(),
            _ => argument,
        })
        .collect()
}

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = match record.level() {
            log::Level::Error => "error".red(),
            log::Level::Warn => "warn".yellow(),
            log::Level::Info => "info".green(),
            log::Level::Debug => "debug".blue(),
            log::Level::Trace => "trace".white(),
        };

        eprintln!("{level}: {}", record.args());
    }

    fn flush(&self) {}
}

fn main() -> ExitCode {
    let arguments = normalize_arguments(std::env::args_os());

    if arguments.len() <= 1 {
        eprintln!("{}", Args::command().render_usage());
        return ExitCode::SUCCESS;
    }

    let args = Args::parse_from(arguments);

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        });
    }

    if args.exec {
        log::warn!("-exec is not supported yet, only assembly is produced");
    }

    let options = args.compile_options();
    let mut failed = false;

    for source_file in &args.source_files {
        if let Err(error) = compile_file(source_file, args.output.as_deref(), &options) {
            eprintln!("{}: {error}", "error".red());
            failed = true;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
