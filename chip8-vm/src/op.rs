//! Instruction decoding.
use std::fmt::{self, Display, Formatter};

use crate::constants::Address;

/// Fields of a 16-bit instruction word.
///
/// ```text
/// 0xF000 op   0x0F00 x   0x00F0 y   0x000F n
/// 0x0FFF nnn  0x00FF kk
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr {
    pub op: u8,
    pub x: u8,
    pub y: u8,
    pub n: u8,
    pub nnn: Address,
    pub kk: u8,
}

impl Instr {
    #[inline(always)]
    pub fn new(word: u16) -> Self {
        let [a, b] = word.to_be_bytes();
        Self {
            op: a >> 4,
            x: a & 0xF,
            y: b >> 4,
            n: b & 0xF,
            nnn: word & 0xFFF,
            kk: b,
        }
    }
}

/// A decoded instruction.
///
/// Register operands are indices `0x0..=0xF` into the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// 00E0 (CLS)
    Cls,
    /// 00EE (RET)
    Ret,
    /// 1nnn (JP addr)
    Jp(Address),
    /// 2nnn (CALL addr)
    Call(Address),
    /// 3xkk (SE Vx, byte)
    SeImm(u8, u8),
    /// 4xkk (SNE Vx, byte)
    SneImm(u8, u8),
    /// 5xy0 (SE Vx, Vy)
    SeReg(u8, u8),
    /// 6xkk (LD Vx, byte)
    LdImm(u8, u8),
    /// 7xkk (ADD Vx, byte)
    AddImm(u8, u8),
    /// 8xy0 (LD Vx, Vy)
    LdReg(u8, u8),
    /// 8xy1 (OR Vx, Vy)
    Or(u8, u8),
    /// 8xy2 (AND Vx, Vy)
    And(u8, u8),
    /// 8xy3 (XOR Vx, Vy)
    Xor(u8, u8),
    /// 8xy4 (ADD Vx, Vy)
    AddReg(u8, u8),
    /// 8xy5 (SUB Vx, Vy)
    Sub(u8, u8),
    /// 8xy6 (SHR Vx {, Vy})
    Shr(u8, u8),
    /// 8xy7 (SUBN Vx, Vy)
    Subn(u8, u8),
    /// 8xyE (SHL Vx {, Vy})
    Shl(u8, u8),
    /// 9xy0 (SNE Vx, Vy)
    SneReg(u8, u8),
    /// Annn (LD I, addr)
    LdI(Address),
    /// Bnnn (JP V0, addr)
    JpV0(Address),
    /// Cxkk (RND Vx, byte)
    Rnd(u8, u8),
    /// Dxyn (DRW Vx, Vy, nibble)
    Drw(u8, u8, u8),
    /// Ex9E (SKP Vx)
    Skp(u8),
    /// ExA1 (SKNP Vx)
    Sknp(u8),
    /// Fx07 (LD Vx, DT)
    LdVxDt(u8),
    /// Fx0A (LD Vx, K)
    LdVxK(u8),
    /// Fx15 (LD DT, Vx)
    LdDtVx(u8),
    /// Fx18 (LD ST, Vx)
    LdStVx(u8),
    /// Fx1E (ADD I, Vx)
    AddI(u8),
    /// Fx29 (LD F, Vx)
    LdF(u8),
    /// Fx33 (LD B, Vx)
    LdB(u8),
    /// Fx55 (LD [I], Vx)
    StoreRegs(u8),
    /// Fx65 (LD Vx, [I])
    LoadRegs(u8),
    /// Word that matches no known instruction.
    Unknown(u16),
}

impl Op {
    /// Route on the high nibble, then on `n` or `kk` for the classes
    /// that share a high nibble.
    pub fn decode(word: u16) -> Self {
        let Instr {
            op,
            x,
            y,
            n,
            nnn,
            kk,
        } = Instr::new(word);

        match op {
            0x0 => match word {
                0x00E0 => Op::Cls,
                0x00EE => Op::Ret,
                _ => Op::Unknown(word),
            },
            0x1 => Op::Jp(nnn),
            0x2 => Op::Call(nnn),
            0x3 => Op::SeImm(x, kk),
            0x4 => Op::SneImm(x, kk),
            0x5 if n == 0 => Op::SeReg(x, y),
            0x6 => Op::LdImm(x, kk),
            0x7 => Op::AddImm(x, kk),
            0x8 => match n {
                0x0 => Op::LdReg(x, y),
                0x1 => Op::Or(x, y),
                0x2 => Op::And(x, y),
                0x3 => Op::Xor(x, y),
                0x4 => Op::AddReg(x, y),
                0x5 => Op::Sub(x, y),
                0x6 => Op::Shr(x, y),
                0x7 => Op::Subn(x, y),
                0xE => Op::Shl(x, y),
                _ => Op::Unknown(word),
            },
            0x9 if n == 0 => Op::SneReg(x, y),
            0xA => Op::LdI(nnn),
            0xB => Op::JpV0(nnn),
            0xC => Op::Rnd(x, kk),
            0xD => Op::Drw(x, y, n),
            0xE => match kk {
                0x9E => Op::Skp(x),
                0xA1 => Op::Sknp(x),
                _ => Op::Unknown(word),
            },
            0xF => match kk {
                0x07 => Op::LdVxDt(x),
                0x0A => Op::LdVxK(x),
                0x15 => Op::LdDtVx(x),
                0x18 => Op::LdStVx(x),
                0x1E => Op::AddI(x),
                0x29 => Op::LdF(x),
                0x33 => Op::LdB(x),
                0x55 => Op::StoreRegs(x),
                0x65 => Op::LoadRegs(x),
                _ => Op::Unknown(word),
            },
            _ => Op::Unknown(word),
        }
    }
}

impl Display for Op {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Op::Cls              => write!(f, "CLS"),
            Op::Ret              => write!(f, "RET"),
            Op::Jp(nnn)          => write!(f, "JP   {nnn:03X}"),
            Op::Call(nnn)        => write!(f, "CALL {nnn:03X}"),
            Op::SeImm(x, kk)     => write!(f, "SE   V{x:X}, {kk:02X}"),
            Op::SneImm(x, kk)    => write!(f, "SNE  V{x:X}, {kk:02X}"),
            Op::SeReg(x, y)      => write!(f, "SE   V{x:X}, V{y:X}"),
            Op::LdImm(x, kk)     => write!(f, "LD   V{x:X}, {kk:02X}"),
            Op::AddImm(x, kk)    => write!(f, "ADD  V{x:X}, {kk:02X}"),
            Op::LdReg(x, y)      => write!(f, "LD   V{x:X}, V{y:X}"),
            Op::Or(x, y)         => write!(f, "OR   V{x:X}, V{y:X}"),
            Op::And(x, y)        => write!(f, "AND  V{x:X}, V{y:X}"),
            Op::Xor(x, y)        => write!(f, "XOR  V{x:X}, V{y:X}"),
            Op::AddReg(x, y)     => write!(f, "ADD  V{x:X}, V{y:X}"),
            Op::Sub(x, y)        => write!(f, "SUB  V{x:X}, V{y:X}"),
            Op::Shr(x, y)        => write!(f, "SHR  V{x:X}, V{y:X}"),
            Op::Subn(x, y)       => write!(f, "SUBN V{x:X}, V{y:X}"),
            Op::Shl(x, y)        => write!(f, "SHL  V{x:X}, V{y:X}"),
            Op::SneReg(x, y)     => write!(f, "SNE  V{x:X}, V{y:X}"),
            Op::LdI(nnn)         => write!(f, "LD   I, {nnn:03X}"),
            Op::JpV0(nnn)        => write!(f, "JP   V0, {nnn:03X}"),
            Op::Rnd(x, kk)       => write!(f, "RND  V{x:X}, {kk:02X}"),
            Op::Drw(x, y, n)     => write!(f, "DRW  V{x:X}, V{y:X}, {n:X}"),
            Op::Skp(x)           => write!(f, "SKP  V{x:X}"),
            Op::Sknp(x)          => write!(f, "SKNP V{x:X}"),
            Op::LdVxDt(x)        => write!(f, "LD   V{x:X}, DT"),
            Op::LdVxK(x)         => write!(f, "LD   V{x:X}, K"),
            Op::LdDtVx(x)        => write!(f, "LD   DT, V{x:X}"),
            Op::LdStVx(x)        => write!(f, "LD   ST, V{x:X}"),
            Op::AddI(x)          => write!(f, "ADD  I, V{x:X}"),
            Op::LdF(x)           => write!(f, "LD   F, V{x:X}"),
            Op::LdB(x)           => write!(f, "LD   B, V{x:X}"),
            Op::StoreRegs(x)     => write!(f, "LD   [I], V{x:X}"),
            Op::LoadRegs(x)      => write!(f, "LD   V{x:X}, [I]"),
            Op::Unknown(word)    => write!(f, "???? {word:04X}"),
        }
    }
}
