//! Line-level lexical analysis: comment stripping, label and directive
//! recognition, and typed operand parsing.

use std::fmt;

use crate::diag::{AsmError, Result};
use crate::isa;

/// Relocation-style operand functions. `Hi`/`Lo` come from `%hi(sym)` /
/// `%lo(sym)` in source text; the pc-relative pair is generated by the
/// pseudo expander for `call` and `li rd, label`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocFn {
    Hi,
    Lo,
    PcrelHi,
    PcrelLo,
}

/// Offset half of a memory operand `offset(base)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemOffset {
    Imm(i64),
    Sym(String),
}

/// One parsed operand. Registers and immediates are resolved at parse time;
/// symbols are carried by name until pass two looks them up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(u8),
    Imm(i64),
    Sym(String),
    Func(RelocFn, String),
    Mem { offset: MemOffset, base: u8 },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(n) => write!(f, "x{n}"),
            Operand::Imm(v) => write!(f, "{v}"),
            Operand::Sym(s) => write!(f, "{s}"),
            Operand::Func(RelocFn::Hi, s) => write!(f, "%hi({s})"),
            Operand::Func(RelocFn::Lo, s) => write!(f, "%lo({s})"),
            Operand::Func(RelocFn::PcrelHi, s) => write!(f, "%pcrel_hi({s})"),
            Operand::Func(RelocFn::PcrelLo, s) => write!(f, "%pcrel_lo({s})"),
            Operand::Mem { offset, base } => match offset {
                MemOffset::Imm(v) => write!(f, "{v}(x{base})"),
                MemOffset::Sym(s) => write!(f, "{s}(x{base})"),
            },
        }
    }
}

/// A mnemonic with its operand list, still unexpanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub mnemonic: String,
    pub operands: Vec<Operand>,
}

/// Strip the `#` comment and surrounding whitespace.
pub fn clean_line(line: &str) -> &str {
    line.split('#').next().unwrap_or("").trim()
}

fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Split a leading `label:` prefix off a cleaned line. Returns the label (if
/// the prefix is a well-formed identifier) and the remaining text.
pub fn split_label(line: &str) -> (Option<&str>, &str) {
    if let Some(colon) = line.find(':') {
        let candidate = &line[..colon];
        if is_identifier(candidate) {
            return (Some(candidate), line[colon + 1..].trim_start());
        }
    }
    (None, line)
}

/// Directives are recognized and skipped; anything else starting with `.`
/// draws a diagnostic rather than silently assembling to nothing.
pub fn check_directive(line: &str) -> Result<()> {
    let name = line.split_whitespace().next().unwrap_or(line);
    match name {
        ".text" | ".data" | ".globl" | ".global" => Ok(()),
        other => Err(AsmError::UnsupportedDirective(other.to_string())),
    }
}

/// Parse an integer literal: decimal, `0x` hex, `0b` binary, or `0o` octal,
/// with an optional leading sign.
pub fn parse_int(s: &str) -> Option<i64> {
    let (negative, rest) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, body) = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (16, hex)
    } else if let Some(bin) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        (2, bin)
    } else if let Some(oct) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        (8, oct)
    } else {
        (10, rest)
    };
    if body.is_empty() {
        return None;
    }
    let magnitude = u64::from_str_radix(body, radix).ok()?;
    if magnitude > i64::MAX as u64 {
        return None;
    }
    Some(if negative {
        -(magnitude as i64)
    } else {
        magnitude as i64
    })
}

fn parse_reloc_fn(op: &str) -> Option<Result<Operand>> {
    let (kind, rest) = if let Some(rest) = op.strip_prefix("%hi(") {
        (RelocFn::Hi, rest)
    } else if let Some(rest) = op.strip_prefix("%lo(") {
        (RelocFn::Lo, rest)
    } else {
        return None;
    };
    let Some(symbol) = rest.strip_suffix(')') else {
        return Some(Err(AsmError::MalformedOperand(op.to_string())));
    };
    if !is_identifier(symbol) {
        return Some(Err(AsmError::MalformedOperand(op.to_string())));
    }
    Some(Ok(Operand::Func(kind, symbol.to_string())))
}

fn parse_mem_operand(op: &str) -> Result<Operand> {
    let open = op.find('(').expect("caller checked for '('");
    let Some(inner) = op[open + 1..].strip_suffix(')') else {
        return Err(AsmError::UnclosedMemOperand(op.to_string()));
    };
    let offset_str = op[..open].trim();
    let base_str = inner.trim();

    if offset_str.is_empty() || base_str.is_empty() {
        return Err(AsmError::MalformedOperand(op.to_string()));
    }
    let base = isa::register(base_str)
        .ok_or_else(|| AsmError::UnknownRegister(base_str.to_string()))?;
    let offset = if let Some(value) = parse_int(offset_str) {
        MemOffset::Imm(value)
    } else if is_identifier(offset_str) {
        MemOffset::Sym(offset_str.to_string())
    } else {
        return Err(AsmError::MalformedOperand(offset_str.to_string()));
    };
    Ok(Operand::Mem { offset, base })
}

/// Parse a single operand token.
pub fn parse_operand(op: &str) -> Result<Operand> {
    if let Some(reg) = isa::register(op) {
        return Ok(Operand::Reg(reg));
    }
    // `x` followed by digits can only have been meant as a register.
    if let Some(digits) = op.strip_prefix('x').or_else(|| op.strip_prefix('X')) {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AsmError::UnknownRegister(op.to_string()));
        }
    }
    if let Some(value) = parse_int(op) {
        return Ok(Operand::Imm(value));
    }
    if let Some(result) = parse_reloc_fn(op) {
        return result;
    }
    if op.contains('(') {
        return parse_mem_operand(op);
    }
    if is_identifier(op) {
        return Ok(Operand::Sym(op.to_string()));
    }
    Err(AsmError::MalformedOperand(op.to_string()))
}

/// Parse the instruction part of a line (label and comment already removed)
/// into a mnemonic plus comma-separated operands.
pub fn parse_statement(line: &str) -> Result<Statement> {
    let (mnemonic, rest) = match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim_start()),
        None => (line, ""),
    };
    let mnemonic = mnemonic.to_ascii_lowercase();

    let mut operands = Vec::new();
    if !rest.is_empty() {
        for (i, token) in rest.split(',').enumerate() {
            let token = token.trim();
            if token.is_empty() {
                return Err(AsmError::EmptyOperand { position: i + 1 });
            }
            operands.push(parse_operand(token)?);
        }
    }
    Ok(Statement { mnemonic, operands })
}
