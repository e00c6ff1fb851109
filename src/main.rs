// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! spacey-jsc - compile a JSON-encoded AST and print its bytecode
//!
//! Reads a program (or, with `--expr`, a single expression) serialized from
//! the Spacey AST, compiles it, and prints a colored listing of the chunk.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use spacey_compiler::ast::{Expression, Program};
use spacey_compiler::compiler::OperandType;
use spacey_compiler::compiler::verify::analyze;
use spacey_compiler::{Bytecode, CompilerConfig, Disassembler, OpCode, SourceUnit};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "spacey-jsc",
    about = "Compile a JSON-encoded JavaScript AST to Spacey bytecode",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// JSON file holding the AST
    input: PathBuf,

    /// Compiler configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fail instead of handing statements to the interpreter
    #[arg(long)]
    no_fallback: bool,

    /// Treat the input as a single expression rather than a program
    #[arg(long)]
    expr: bool,

    /// Check stack depths of the compiled chunk
    #[arg(long)]
    verify: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => CompilerConfig::load(path)?,
        None => CompilerConfig::default(),
    };
    if cli.no_fallback {
        config.allow_fallback = false;
    }

    let text = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let (unit, start) = if cli.expr {
        let expr: Expression = serde_json::from_str(&text).context("invalid expression AST")?;
        let mut unit = SourceUnit::with_config(Program::default(), config);
        let start = unit.compile_expression(&expr)?;
        (unit, start)
    } else {
        let program: Program = serde_json::from_str(&text).context("invalid program AST")?;
        let mut unit = SourceUnit::with_config(program, config);
        let start = unit.compile_script()?;
        (unit, start)
    };

    let code = unit.bytecode().context("nothing was compiled")?;
    info!(start, instructions = code.len(), "compiled {}", cli.input.display());
    print_listing(code, start);

    if cli.verify {
        let report = analyze(code, start)?;
        println!();
        println!(
            "{} max depth {}, {} of {} instructions reachable",
            "verified:".green().bold(),
            report.max_depth,
            report.reachable,
            Disassembler::chunk(code, start).lines().count()
        );
    }

    Ok(())
}

fn print_listing(code: &Bytecode, start: u32) {
    for line in Disassembler::chunk(code, start).lines() {
        let opcode = code.instructions()[line.offset as usize].opcode;
        let mnemonic = format!("{:<14}", line.mnemonic);
        let mnemonic = match opcode {
            OpCode::Tree => mnemonic.yellow().bold().to_string(),
            OpCode::Ret => mnemonic.green().to_string(),
            _ if opcode.signature().0 == OperandType::Addr => {
                mnemonic.cyan().to_string()
            }
            _ => mnemonic,
        };
        println!(
            "{}  {}{}",
            format!("{:04}", line.offset).dimmed(),
            mnemonic,
            line.operands
        );
    }
}
