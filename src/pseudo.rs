//! Pseudo-instruction expansion.
//!
//! Both passes go through this module: pass one asks only for the expansion
//! length (to advance the program counter), pass two for the concrete
//! instructions. The two share one decision path, which matters for `li` —
//! its length depends on the immediate's magnitude.

use crate::diag::{AsmError, Result};
use crate::isa::Mnemonic;
use crate::parser::{MemOffset, Operand, RelocFn};

/// A concrete RV32I instruction ready for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inst {
    pub mnemonic: Mnemonic,
    pub operands: Vec<Operand>,
}

fn inst(mnemonic: Mnemonic, operands: Vec<Operand>) -> Inst {
    Inst { mnemonic, operands }
}

const X0: Operand = Operand::Reg(0);
const RA: Operand = Operand::Reg(1);

fn arity(mnemonic: &str, expected: &'static str, ops: &[Operand], n: usize) -> Result<()> {
    if ops.len() != n {
        return Err(AsmError::OperandCount {
            mnemonic: mnemonic.to_string(),
            expected,
            found: ops.len(),
        });
    }
    Ok(())
}

fn expect_reg(op: &Operand) -> Result<u8> {
    match op {
        Operand::Reg(n) => Ok(*n),
        other => Err(AsmError::OperandType {
            expected: "register",
            found: other.to_string(),
        }),
    }
}

/// Split a 32-bit value for `lui` + `addi`. The upper part is rounded so the
/// sign-extended low 12 bits bring the sum back to exactly `value`.
fn hi_lo_split(value: i64) -> (i64, i64) {
    let hi20 = (value + 0x800) >> 12;
    let lo12 = value - (hi20 << 12);
    (hi20 & 0xFFFFF, lo12)
}

fn expand_li(rd: &Operand, value_op: &Operand) -> Result<Vec<Inst>> {
    use Mnemonic::*;
    match value_op {
        Operand::Imm(raw) => {
            if *raw < i32::MIN as i64 || *raw > u32::MAX as i64 {
                return Err(AsmError::ImmediateRange {
                    value: *raw,
                    min: i32::MIN as i64,
                    max: u32::MAX as i64,
                });
            }
            // Values given as large unsigned literals wrap to their two's
            // complement reading.
            let value = *raw as u32 as i32 as i64;
            if (-2048..=2047).contains(&value) {
                return Ok(vec![inst(Addi, vec![rd.clone(), X0, Operand::Imm(value)])]);
            }
            let (hi20, lo12) = hi_lo_split(value);
            Ok(vec![
                inst(Lui, vec![rd.clone(), Operand::Imm(hi20)]),
                inst(Addi, vec![rd.clone(), rd.clone(), Operand::Imm(lo12)]),
            ])
        }
        Operand::Sym(symbol) => Ok(vec![
            inst(
                Auipc,
                vec![rd.clone(), Operand::Func(RelocFn::PcrelHi, symbol.clone())],
            ),
            inst(
                Addi,
                vec![
                    rd.clone(),
                    rd.clone(),
                    Operand::Func(RelocFn::PcrelLo, symbol.clone()),
                ],
            ),
        ]),
        other => Err(AsmError::OperandType {
            expected: "immediate or label",
            found: other.to_string(),
        }),
    }
}

/// Expand a source-level mnemonic into one or two concrete instructions.
///
/// Base mnemonics pass through unchanged (after the single string-to-enum
/// lookup); unknown mnemonics fail here and nowhere else.
pub fn expand(mnemonic: &str, ops: &[Operand]) -> Result<Vec<Inst>> {
    use Mnemonic::*;
    match mnemonic {
        "nop" => {
            arity(mnemonic, "no operands", ops, 0)?;
            Ok(vec![inst(Addi, vec![X0, X0, Operand::Imm(0)])])
        }
        "mv" => {
            arity(mnemonic, "rd, rs", ops, 2)?;
            Ok(vec![inst(Addi, vec![ops[0].clone(), ops[1].clone(), Operand::Imm(0)])])
        }
        "not" => {
            arity(mnemonic, "rd, rs", ops, 2)?;
            Ok(vec![inst(Xori, vec![ops[0].clone(), ops[1].clone(), Operand::Imm(-1)])])
        }
        "neg" => {
            arity(mnemonic, "rd, rs", ops, 2)?;
            Ok(vec![inst(Sub, vec![ops[0].clone(), X0, ops[1].clone()])])
        }
        "seqz" => {
            arity(mnemonic, "rd, rs", ops, 2)?;
            Ok(vec![inst(Sltiu, vec![ops[0].clone(), ops[1].clone(), Operand::Imm(1)])])
        }
        "snez" => {
            arity(mnemonic, "rd, rs", ops, 2)?;
            Ok(vec![inst(Sltu, vec![ops[0].clone(), X0, ops[1].clone()])])
        }
        "sltz" => {
            arity(mnemonic, "rd, rs", ops, 2)?;
            Ok(vec![inst(Slt, vec![ops[0].clone(), ops[1].clone(), X0])])
        }
        "sgtz" => {
            arity(mnemonic, "rd, rs", ops, 2)?;
            Ok(vec![inst(Slt, vec![ops[0].clone(), X0, ops[1].clone()])])
        }
        "beqz" | "bnez" | "bltz" | "bgez" => {
            arity(mnemonic, "rs, label", ops, 2)?;
            let base = match mnemonic {
                "beqz" => Beq,
                "bnez" => Bne,
                "bltz" => Blt,
                _ => Bge,
            };
            Ok(vec![inst(base, vec![ops[0].clone(), X0, ops[1].clone()])])
        }
        "blez" => {
            arity(mnemonic, "rs, label", ops, 2)?;
            Ok(vec![inst(Bge, vec![X0, ops[0].clone(), ops[1].clone()])])
        }
        "bgtz" => {
            arity(mnemonic, "rs, label", ops, 2)?;
            Ok(vec![inst(Blt, vec![X0, ops[0].clone(), ops[1].clone()])])
        }
        "bgt" | "ble" | "bgtu" | "bleu" => {
            arity(mnemonic, "rs, rt, label", ops, 3)?;
            let base = match mnemonic {
                "bgt" => Blt,
                "ble" => Bge,
                "bgtu" => Bltu,
                _ => Bgeu,
            };
            // Swapped register order reuses the complementary comparison.
            Ok(vec![inst(base, vec![ops[1].clone(), ops[0].clone(), ops[2].clone()])])
        }
        "j" => {
            arity(mnemonic, "label", ops, 1)?;
            Ok(vec![inst(Jal, vec![X0, ops[0].clone()])])
        }
        "jal" if ops.len() == 1 => Ok(vec![inst(Jal, vec![RA, ops[0].clone()])]),
        "jr" => {
            arity(mnemonic, "rs", ops, 1)?;
            let rs = expect_reg(&ops[0])?;
            Ok(vec![inst(
                Jalr,
                vec![X0, Operand::Mem { offset: MemOffset::Imm(0), base: rs }],
            )])
        }
        "jalr" if ops.len() == 1 => {
            let rs = expect_reg(&ops[0])?;
            Ok(vec![inst(
                Jalr,
                vec![RA, Operand::Mem { offset: MemOffset::Imm(0), base: rs }],
            )])
        }
        "ret" => {
            arity(mnemonic, "no operands", ops, 0)?;
            Ok(vec![inst(
                Jalr,
                vec![X0, Operand::Mem { offset: MemOffset::Imm(0), base: 1 }],
            )])
        }
        "call" => {
            arity(mnemonic, "label", ops, 1)?;
            let symbol = match &ops[0] {
                Operand::Sym(s) => s.clone(),
                other => {
                    return Err(AsmError::OperandType {
                        expected: "label",
                        found: other.to_string(),
                    })
                }
            };
            Ok(vec![
                inst(Auipc, vec![RA, Operand::Func(RelocFn::PcrelHi, symbol.clone())]),
                inst(Jalr, vec![RA, RA, Operand::Func(RelocFn::PcrelLo, symbol)]),
            ])
        }
        "li" => {
            arity(mnemonic, "rd, imm", ops, 2)?;
            expand_li(&ops[0], &ops[1])
        }
        _ => {
            let m = Mnemonic::parse(mnemonic)
                .ok_or_else(|| AsmError::UnknownMnemonic(mnemonic.to_string()))?;
            Ok(vec![inst(m, ops.to_vec())])
        }
    }
}

/// Number of concrete instructions a statement will occupy. Pass one calls
/// this to advance the program counter; statements whose expansion fails
/// still occupy one placeholder word so addresses stay in lockstep with
/// pass two.
pub fn expansion_len(mnemonic: &str, ops: &[Operand]) -> usize {
    expand(mnemonic, ops).map_or(1, |insts| insts.len())
}
