//! Lark Compiler Driver
//!
//! `larkc` reads the JSON document produced by the front end and writes
//! ARM64 assembly.

use clap::{Parser, Subcommand};
use lark_driver::{CompilationResult, Compiler, CompilerOptions};
use lark_syntax::CompilationInput;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "larkc")]
#[command(about = "Lark Compiler - ARM64 backend")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON compilation input to ARM64 assembly
    Compile {
        /// Input JSON file (syntax tree, scope trace, upstream diagnostics)
        input: PathBuf,

        /// Output assembly file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the IR optimizer
        #[arg(long)]
        no_ir_opt: bool,

        /// Skip the assembly peephole pass
        #[arg(long)]
        no_asm_opt: bool,

        /// Write the IR listing to this file
        #[arg(long)]
        emit_ir: Option<PathBuf>,

        /// Print the IR listing to stdout
        #[arg(long)]
        print_ir: bool,

        /// Print compilation statistics as JSON to stderr
        #[arg(long)]
        stats: bool,

        /// Omit the implicit return when the entry code already returns
        #[arg(long)]
        suppress_redundant_return: bool,
    },
}

struct OutputRequest<'a> {
    output: Option<&'a Path>,
    emit_ir: Option<&'a Path>,
    print_ir: bool,
    stats: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            no_ir_opt,
            no_asm_opt,
            emit_ir,
            print_ir,
            stats,
            suppress_redundant_return,
        } => {
            let options = CompilerOptions {
                optimize_ir: !no_ir_opt,
                optimize_asm: !no_asm_opt,
                suppress_redundant_return,
            };
            let request = OutputRequest { output: output.as_deref(), emit_ir: emit_ir.as_deref(), print_ir, stats };
            if let Err(e) = compile_command(&input, options, &request) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn compile_command(
    input_path: &Path,
    options: CompilerOptions,
    request: &OutputRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(input_path)
        .map_err(|e| format!("cannot read {}: {}", input_path.display(), e))?;
    let input = CompilationInput::from_json(&text)?;

    let result = Compiler::compile(&input, options);
    let reporter = result.reporter();
    reporter.print_diagnostics();

    write_outputs(&result, request)?;

    if !result.succeeded() {
        return Err(format!("compilation failed ({}): {}", result.state, reporter.summary()).into());
    }
    Ok(())
}

fn write_outputs(result: &CompilationResult, request: &OutputRequest) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(ir) = &result.ir_text {
        if let Some(path) = request.emit_ir {
            fs::write(path, ir)?;
            eprintln!("IR written to {}", path.display());
        }
        if request.print_ir {
            println!("{}", ir);
        }
    }

    if request.stats {
        eprintln!("{}", result.statistics.to_json()?);
    }

    // Best effort: whatever was generated is written even if validation failed
    if let Some(assembly) = &result.assembly {
        match request.output {
            Some(path) => {
                fs::write(path, assembly)?;
                eprintln!("Assembly written to {}", path.display());
            }
            None => print!("{}", assembly),
        }
    }
    Ok(())
}
