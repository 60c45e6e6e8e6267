//! Two-pass RV32I assembler.
//!
//! Pass one walks the source to collect label addresses, advancing the
//! program counter by the expansion length of every statement. Pass two
//! walks it again with the completed symbol table, expands pseudo
//! instructions, and encodes each one into a 32-bit little-endian word.
//! A statement that fails any check is replaced by a zero-word placeholder
//! so byte addresses stay in lockstep between the two passes.

pub mod diag;
pub mod encoder;
pub mod isa;
pub mod parser;
pub mod pseudo;

use std::collections::HashMap;

use diag::Diagnostics;
use parser::{check_directive, clean_line, parse_statement, split_label};

/// The result of one assembly run: machine code, resolved symbols, and
/// every diagnostic that was raised along the way.
#[derive(Debug)]
pub struct Assembly {
    pub text: Vec<u8>,
    pub symbols: HashMap<String, u32>,
    pub diagnostics: Diagnostics,
}

impl Assembly {
    pub fn ok(&self) -> bool {
        !self.diagnostics.has_errors()
    }

    /// The text segment as 32-bit words, in instruction order.
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.text
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
    }
}

/// Assemble RV32I source text into little-endian machine code.
///
/// Never returns early: all errors are accumulated in the result's
/// diagnostics and each faulty instruction leaves a zero word behind.
pub fn assemble(source: &str) -> Assembly {
    let mut diagnostics = Diagnostics::new();
    let mut symbols: HashMap<String, u32> = HashMap::new();

    // Pass 1: collect label addresses.
    let mut pc = 0u32;
    for (idx, raw) in source.lines().enumerate() {
        let line = clean_line(raw);
        if line.is_empty() {
            continue;
        }
        let (label, rest) = split_label(line);
        if let Some(label) = label {
            if symbols.contains_key(label) {
                diagnostics.report(
                    idx + 1,
                    raw,
                    diag::AsmError::DuplicateLabel(label.to_string()),
                );
            } else {
                symbols.insert(label.to_string(), pc);
            }
        }
        if rest.is_empty() || rest.starts_with('.') {
            continue;
        }
        // Unparseable statements still occupy one placeholder word; the
        // diagnostic itself is raised in pass two.
        match parse_statement(rest) {
            Ok(stmt) => {
                pc += 4 * pseudo::expansion_len(&stmt.mnemonic, &stmt.operands) as u32;
            }
            Err(_) => pc += 4,
        }
    }

    // Pass 2: expand and encode.
    let mut text = Vec::with_capacity(pc as usize);
    let emit_zero = |text: &mut Vec<u8>| text.extend_from_slice(&0u32.to_le_bytes());
    let mut pc = 0u32;
    for (idx, raw) in source.lines().enumerate() {
        let line_num = idx + 1;
        let line = clean_line(raw);
        if line.is_empty() {
            continue;
        }
        let (_, rest) = split_label(line);
        if rest.is_empty() {
            continue;
        }
        if rest.starts_with('.') {
            if let Err(e) = check_directive(rest) {
                diagnostics.report(line_num, raw, e);
            }
            continue;
        }
        let stmt = match parse_statement(rest) {
            Ok(stmt) => stmt,
            Err(e) => {
                diagnostics.report(line_num, raw, e);
                emit_zero(&mut text);
                pc += 4;
                continue;
            }
        };
        let insts = match pseudo::expand(&stmt.mnemonic, &stmt.operands) {
            Ok(insts) => insts,
            Err(e) => {
                diagnostics.report(line_num, raw, e);
                emit_zero(&mut text);
                pc += 4;
                continue;
            }
        };
        let base_pc = pc;
        for inst in &insts {
            let word = match encoder::encode(inst, pc, base_pc, &symbols) {
                Ok(word) => word,
                Err(e) => {
                    diagnostics.report(line_num, raw, e);
                    0
                }
            };
            text.extend_from_slice(&word.to_le_bytes());
            pc += 4;
        }
    }

    Assembly {
        text,
        symbols,
        diagnostics,
    }
}
