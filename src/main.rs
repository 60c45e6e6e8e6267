//! RV32I assembler CLI - assembles a source file into hex and binary dumps.
//!
//! Usage:
//!     rv32-assembler program.asm
//!     rv32-assembler program.asm --hex out.hex --bin out.bin

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use rv32_assembler::assemble;

#[derive(Parser, Debug)]
#[command(name = "rv32-assembler")]
#[command(version)]
#[command(about = "Two-pass RV32I assembler")]
struct Args {
    /// Input assembly file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Hex dump output path (defaults to <input>.hex)
    #[arg(long, value_name = "FILE")]
    hex: Option<PathBuf>,

    /// Binary dump output path (defaults to <input>.bin)
    #[arg(long, value_name = "FILE")]
    bin: Option<PathBuf>,

    /// Show word and symbol counts plus timing
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let start = Instant::now();

    let source = match fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read {}: {}", args.input.display(), e);
            return ExitCode::from(2);
        }
    };

    let assembly = assemble(&source);

    if !assembly.ok() {
        for diagnostic in assembly.diagnostics.iter() {
            eprintln!("{diagnostic}");
        }
        eprintln!("{}", assembly.diagnostics.summary());
        return ExitCode::from(1);
    }

    // One instruction per line: 8 hex digits, and the same word as 32
    // binary digits.
    let mut hex_dump = String::new();
    let mut bin_dump = String::new();
    for word in assembly.words() {
        let _ = writeln!(hex_dump, "{word:08x}");
        let _ = writeln!(bin_dump, "{word:032b}");
    }

    let hex_path = args.hex.unwrap_or_else(|| args.input.with_extension("hex"));
    let bin_path = args.bin.unwrap_or_else(|| args.input.with_extension("bin"));

    for (path, contents) in [(&hex_path, hex_dump), (&bin_path, bin_dump)] {
        if let Err(e) = fs::write(path, contents) {
            eprintln!("error: cannot write {}: {}", path.display(), e);
            return ExitCode::from(2);
        }
    }

    if args.verbose {
        eprintln!(
            "  {} words, {} symbols, {:.2}ms",
            assembly.text.len() / 4,
            assembly.symbols.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    println!(
        "{} -> {}, {}",
        args.input.display(),
        hex_path.display(),
        bin_path.display()
    );

    ExitCode::SUCCESS
}
