//! Boardkit command line.
//!
//! Composes a board from a JSON project file, pours the inner layers and
//! runs the circuit and physical design rule checks.
//!
//! ```bash
//! boardkit mainboard.json
//! boardkit mainboard.json --report output/drc.json
//! RUST_LOG=debug boardkit mainboard.json
//! ```
//!
//! Exit status: 0 when both checks pass, 1 on violations, 2 on fatal errors.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};

use boardkit_io::{DrcReport, ProjectFile};

struct Args {
    project: PathBuf,
    report: Option<PathBuf>,
}

fn print_help() {
    println!("Usage: boardkit <project.json> [--report <out.json>]");
    println!();
    println!("Options:");
    println!("  -r, --report <PATH>  Write the DRC report as JSON");
    println!("  -h, --help           Print this help");
}

enum Command {
    Run(Args),
    Help,
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Command> {
    let mut project = None;
    let mut report = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--report" | "-r" => {
                let path = args.next().context("--report needs a file path")?;
                report = Some(PathBuf::from(path));
            }
            "--help" | "-h" => return Ok(Command::Help),
            flag if flag.starts_with('-') => bail!("unknown argument: {}", flag),
            _ if project.is_some() => bail!("unexpected extra argument: {}", arg),
            _ => project = Some(PathBuf::from(&arg)),
        }
    }
    let project = project.context("missing project file")?;
    Ok(Command::Run(Args { project, report }))
}

fn print_findings(report: &DrcReport) {
    for violation in &report.composite {
        println!("{}", violation);
    }
    if report.violations.is_empty() {
        println!("physical DRC passed!");
    } else {
        for violation in &report.violations {
            println!("{}", violation);
        }
    }
}

fn run(args: &Args) -> Result<bool> {
    let project = ProjectFile::load(&args.project)
        .with_context(|| format!("failed to load project {}", args.project.display()))?;

    let (_, report) = project
        .build_with(|phase| println!("*** {}...", phase))
        .with_context(|| format!("failed to build project '{}'", project.name))?;
    print_findings(&report);

    if let Some(path) = &args.report {
        report
            .save(path)
            .with_context(|| format!("failed to write report {}", path.display()))?;
    }
    Ok(report.passed())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("error: {}", err);
            print_help();
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(2)
        }
    }
}
