//! Static RV32I architecture tables: mnemonics, instruction formats,
//! opcode/funct fields, and register names.

use phf::phf_map;

/// The six RV32I encoding formats, plus the system group
/// (`ecall`, `ebreak`, `fence`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    R,
    I,
    S,
    B,
    U,
    J,
    Sys,
}

/// Every RV32I base mnemonic as a closed variant set.
///
/// Parsing from text happens exactly once, in [`Mnemonic::parse`]; all later
/// dispatch is a match over this enum, so "unknown mnemonic" has a single
/// failure point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    // R-type
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    // I-type arithmetic
    Addi,
    Slli,
    Slti,
    Sltiu,
    Xori,
    Srli,
    Srai,
    Ori,
    Andi,
    // I-type jumps and loads
    Jalr,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    // S-type
    Sb,
    Sh,
    Sw,
    // B-type
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    // U-type
    Lui,
    Auipc,
    // J-type
    Jal,
    // System
    Ecall,
    Ebreak,
    Fence,
}

/// 7-bit opcodes. The I and U formats each cover several opcode groups, so
/// encoders select by mnemonic class rather than by the bare format tag.
pub mod opcode {
    pub const OP: u32 = 0b0110011;
    pub const OP_IMM: u32 = 0b0010011;
    pub const LOAD: u32 = 0b0000011;
    pub const JALR: u32 = 0b1100111;
    pub const STORE: u32 = 0b0100011;
    pub const BRANCH: u32 = 0b1100011;
    pub const LUI: u32 = 0b0110111;
    pub const AUIPC: u32 = 0b0010111;
    pub const JAL: u32 = 0b1101111;
    pub const SYSTEM: u32 = 0b1110011;
    pub const MISC_MEM: u32 = 0b0001111;
}

impl Mnemonic {
    pub fn parse(s: &str) -> Option<Self> {
        use Mnemonic::*;
        Some(match s {
            "add" => Add,
            "sub" => Sub,
            "sll" => Sll,
            "slt" => Slt,
            "sltu" => Sltu,
            "xor" => Xor,
            "srl" => Srl,
            "sra" => Sra,
            "or" => Or,
            "and" => And,
            "addi" => Addi,
            "slli" => Slli,
            "slti" => Slti,
            "sltiu" => Sltiu,
            "xori" => Xori,
            "srli" => Srli,
            "srai" => Srai,
            "ori" => Ori,
            "andi" => Andi,
            "jalr" => Jalr,
            "lb" => Lb,
            "lh" => Lh,
            "lw" => Lw,
            "lbu" => Lbu,
            "lhu" => Lhu,
            "sb" => Sb,
            "sh" => Sh,
            "sw" => Sw,
            "beq" => Beq,
            "bne" => Bne,
            "blt" => Blt,
            "bge" => Bge,
            "bltu" => Bltu,
            "bgeu" => Bgeu,
            "lui" => Lui,
            "auipc" => Auipc,
            "jal" => Jal,
            "ecall" => Ecall,
            "ebreak" => Ebreak,
            "fence" => Fence,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use Mnemonic::*;
        match self {
            Add => "add",
            Sub => "sub",
            Sll => "sll",
            Slt => "slt",
            Sltu => "sltu",
            Xor => "xor",
            Srl => "srl",
            Sra => "sra",
            Or => "or",
            And => "and",
            Addi => "addi",
            Slli => "slli",
            Slti => "slti",
            Sltiu => "sltiu",
            Xori => "xori",
            Srli => "srli",
            Srai => "srai",
            Ori => "ori",
            Andi => "andi",
            Jalr => "jalr",
            Lb => "lb",
            Lh => "lh",
            Lw => "lw",
            Lbu => "lbu",
            Lhu => "lhu",
            Sb => "sb",
            Sh => "sh",
            Sw => "sw",
            Beq => "beq",
            Bne => "bne",
            Blt => "blt",
            Bge => "bge",
            Bltu => "bltu",
            Bgeu => "bgeu",
            Lui => "lui",
            Auipc => "auipc",
            Jal => "jal",
            Ecall => "ecall",
            Ebreak => "ebreak",
            Fence => "fence",
        }
    }

    pub fn format(self) -> Format {
        use Mnemonic::*;
        match self {
            Add | Sub | Sll | Slt | Sltu | Xor | Srl | Sra | Or | And => Format::R,
            Addi | Slli | Slti | Sltiu | Xori | Srli | Srai | Ori | Andi | Jalr | Lb | Lh
            | Lw | Lbu | Lhu => Format::I,
            Sb | Sh | Sw => Format::S,
            Beq | Bne | Blt | Bge | Bltu | Bgeu => Format::B,
            Lui | Auipc => Format::U,
            Jal => Format::J,
            Ecall | Ebreak | Fence => Format::Sys,
        }
    }

    /// 3-bit funct3 field. Zero for the formats that do not carry one.
    pub fn funct3(self) -> u32 {
        use Mnemonic::*;
        match self {
            Add | Sub | Addi | Beq | Jalr | Lb | Sb | Ecall | Ebreak | Fence => 0b000,
            Sll | Slli | Bne | Lh | Sh => 0b001,
            Slt | Slti | Lw | Sw => 0b010,
            Sltu | Sltiu => 0b011,
            Xor | Xori | Blt | Lbu => 0b100,
            Srl | Sra | Srli | Srai | Bge | Lhu => 0b101,
            Or | Ori | Bltu => 0b110,
            And | Andi | Bgeu => 0b111,
            Lui | Auipc | Jal => 0,
        }
    }

    /// 7-bit funct7 field; nonzero only for `sub`, `sra`, and `srai`.
    pub fn funct7(self) -> u32 {
        use Mnemonic::*;
        match self {
            Sub | Sra | Srai => 0b0100000,
            _ => 0,
        }
    }

    pub fn is_load(self) -> bool {
        use Mnemonic::*;
        matches!(self, Lb | Lh | Lw | Lbu | Lhu)
    }

    pub fn is_shift_imm(self) -> bool {
        use Mnemonic::*;
        matches!(self, Slli | Srli | Srai)
    }
}

/// ABI register aliases. Numeric `x0..x31` names are handled by
/// [`register`] directly.
static ABI_REGISTERS: phf::Map<&'static str, u8> = phf_map! {
    "zero" => 0, "ra" => 1, "sp" => 2, "gp" => 3, "tp" => 4,
    "t0" => 5, "t1" => 6, "t2" => 7,
    "s0" => 8, "fp" => 8, "s1" => 9,
    "a0" => 10, "a1" => 11, "a2" => 12, "a3" => 13,
    "a4" => 14, "a5" => 15, "a6" => 16, "a7" => 17,
    "s2" => 18, "s3" => 19, "s4" => 20, "s5" => 21, "s6" => 22,
    "s7" => 23, "s8" => 24, "s9" => 25, "s10" => 26, "s11" => 27,
    "t3" => 28, "t4" => 29, "t5" => 30, "t6" => 31,
};

/// Resolve a register name (`x0..x31` or ABI alias) to its index.
pub fn register(name: &str) -> Option<u8> {
    let name = name.to_ascii_lowercase();
    if let Some(digits) = name.strip_prefix('x') {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return digits.parse::<u8>().ok().filter(|&n| n <= 31);
        }
    }
    ABI_REGISTERS.get(name.as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_registers() {
        assert_eq!(register("x0"), Some(0));
        assert_eq!(register("x31"), Some(31));
        assert_eq!(register("X5"), Some(5));
        assert_eq!(register("x32"), None);
        assert_eq!(register("x"), None);
    }

    #[test]
    fn test_abi_aliases() {
        assert_eq!(register("zero"), Some(0));
        assert_eq!(register("ra"), Some(1));
        assert_eq!(register("sp"), Some(2));
        assert_eq!(register("s0"), Some(8));
        assert_eq!(register("fp"), Some(8));
        assert_eq!(register("a7"), Some(17));
        assert_eq!(register("t6"), Some(31));
        assert_eq!(register("b0"), None);
    }

    #[test]
    fn test_mnemonic_roundtrip() {
        // Every mnemonic parses back from its own name.
        for name in [
            "add", "sub", "sll", "slt", "sltu", "xor", "srl", "sra", "or", "and", "addi",
            "slli", "slti", "sltiu", "xori", "srli", "srai", "ori", "andi", "jalr", "lb",
            "lh", "lw", "lbu", "lhu", "sb", "sh", "sw", "beq", "bne", "blt", "bge", "bltu",
            "bgeu", "lui", "auipc", "jal", "ecall", "ebreak", "fence",
        ] {
            let m = Mnemonic::parse(name).unwrap_or_else(|| panic!("missing {name}"));
            assert_eq!(m.name(), name);
        }
        assert_eq!(Mnemonic::parse("mul"), None);
        assert_eq!(Mnemonic::parse("li"), None);
    }

    #[test]
    fn test_funct7_only_where_needed() {
        use Mnemonic::*;
        for m in [Add, Sll, Srl, Slli, Srli, Addi] {
            assert_eq!(m.funct7(), 0);
        }
        for m in [Sub, Sra, Srai] {
            assert_eq!(m.funct7(), 0b0100000);
        }
    }

    #[test]
    fn test_format_assignment() {
        use Mnemonic::*;
        assert_eq!(Add.format(), Format::R);
        assert_eq!(Addi.format(), Format::I);
        assert_eq!(Lw.format(), Format::I);
        assert_eq!(Jalr.format(), Format::I);
        assert_eq!(Sw.format(), Format::S);
        assert_eq!(Beq.format(), Format::B);
        assert_eq!(Lui.format(), Format::U);
        assert_eq!(Auipc.format(), Format::U);
        assert_eq!(Jal.format(), Format::J);
        assert_eq!(Ecall.format(), Format::Sys);
        assert_eq!(Fence.format(), Format::Sys);
    }

    #[test]
    fn test_branch_funct3() {
        use Mnemonic::*;
        assert_eq!(Beq.funct3(), 0b000);
        assert_eq!(Bne.funct3(), 0b001);
        assert_eq!(Blt.funct3(), 0b100);
        assert_eq!(Bge.funct3(), 0b101);
        assert_eq!(Bltu.funct3(), 0b110);
        assert_eq!(Bgeu.funct3(), 0b111);
    }

    #[test]
    fn test_opcodes_are_seven_bits() {
        for op in [
            opcode::OP,
            opcode::OP_IMM,
            opcode::LOAD,
            opcode::JALR,
            opcode::STORE,
            opcode::BRANCH,
            opcode::LUI,
            opcode::AUIPC,
            opcode::JAL,
            opcode::SYSTEM,
            opcode::MISC_MEM,
        ] {
            assert!(op <= 0b111_1111);
        }
    }
}
