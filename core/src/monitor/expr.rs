//! Number-literal parsing and the breakpoint condition compiler.
//!
//! Conditions compile once, at `bpadd` time, into an [`Condition`] value —
//! a small enum tree rather than a boxed closure, so evaluating one at an
//! instruction boundary is a match, not an indirect call. This mirrors the
//! "match compiles to a dense jump table" approach the CPU decoder itself
//! uses.

use crate::bus::AddressSpace;
use crate::cpu::z80::Z80;
use crate::error::{Error, Result};

/// Parse a monitor number literal: `$hex`, `#decimal`, `#$hex`, or bare hex.
pub fn parse_number(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix("#$") {
        return u32::from_str_radix(rest, 16).map_err(|_| Error::InvalidNumber(s.to_string()));
    }
    if let Some(rest) = s.strip_prefix('$') {
        return u32::from_str_radix(rest, 16).map_err(|_| Error::InvalidNumber(s.to_string()));
    }
    if let Some(rest) = s.strip_prefix('#') {
        return rest.parse::<u32>().map_err(|_| Error::InvalidNumber(s.to_string()));
    }
    u32::from_str_radix(s, 16).map_err(|_| Error::InvalidNumber(s.to_string()))
}

/// Look up an 8/16-bit register by name (case-insensitive). Returns the
/// zero-extended value so 8-bit and 16-bit registers share a return type.
pub fn register_value(cpu: &Z80, name: &str) -> Option<u16> {
    Some(match name.to_ascii_lowercase().as_str() {
        "a" => cpu.a as u16,
        "f" => cpu.f as u16,
        "b" => cpu.b as u16,
        "c" => cpu.c as u16,
        "d" => cpu.d as u16,
        "e" => cpu.e as u16,
        "h" => cpu.h as u16,
        "l" => cpu.l as u16,
        "i" => cpu.i as u16,
        "r" => cpu.r as u16,
        "af" => ((cpu.a as u16) << 8) | cpu.f as u16,
        "bc" => ((cpu.b as u16) << 8) | cpu.c as u16,
        "de" => ((cpu.d as u16) << 8) | cpu.e as u16,
        "hl" => ((cpu.h as u16) << 8) | cpu.l as u16,
        "ix" => cpu.ix,
        "iy" => cpu.iy,
        "sp" => cpu.sp,
        "pc" => cpu.pc,
        _ => return None,
    })
}

#[derive(Clone, Debug, PartialEq)]
enum Operand {
    Literal(u16),
    Indirect(u16),
    Register(String),
    IndirectRegister(String),
}

impl Operand {
    fn parse(token: &str) -> Result<Self> {
        if let Some(rest) = token.strip_prefix('*') {
            return Ok(if rest.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) && register_name_valid(rest) {
                Operand::IndirectRegister(rest.to_string())
            } else {
                Operand::Indirect(parse_number(rest)? as u16)
            });
        }
        if register_name_valid(token) {
            return Ok(Operand::Register(token.to_string()));
        }
        Ok(Operand::Literal(parse_number(token)? as u16))
    }

    fn eval(&self, cpu: &Z80, bus: &AddressSpace) -> u16 {
        match self {
            Operand::Literal(v) => *v,
            Operand::Indirect(addr) => bus.peek(*addr) as u16,
            Operand::Register(name) => register_value(cpu, name).unwrap_or(0),
            Operand::IndirectRegister(name) => {
                let addr = register_value(cpu, name).unwrap_or(0);
                bus.peek(addr) as u16
            }
        }
    }
}

fn register_name_valid(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "a" | "f" | "b" | "c" | "d" | "e" | "h" | "l" | "i" | "r" | "af" | "bc" | "de" | "hl" | "ix" | "iy" | "sp" | "pc"
    )
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum CmpOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl CmpOp {
    fn parse(token: &str) -> Result<Self> {
        Ok(match token {
            "<" => CmpOp::Lt,
            ">" => CmpOp::Gt,
            "<=" => CmpOp::Le,
            ">=" => CmpOp::Ge,
            "==" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            "&" => CmpOp::And,
            "|" => CmpOp::Or,
            _ => return Err(Error::InvalidArgument(format!("unknown operator: {token}"))),
        })
    }

    fn apply(self, l: u16, r: u16) -> bool {
        match self {
            CmpOp::Lt => l < r,
            CmpOp::Gt => l > r,
            CmpOp::Le => l <= r,
            CmpOp::Ge => l >= r,
            CmpOp::Eq => l == r,
            CmpOp::Ne => l != r,
            CmpOp::And => (l & r) != 0,
            CmpOp::Or => (l | r) != 0,
        }
    }
}

/// A compiled conditional breakpoint expression: `val op val`.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    left: Operand,
    op: CmpOp,
    right: Operand,
}

impl Condition {
    /// Compile `val op val` once, at `bpadd` time.
    pub fn compile(expr: &str) -> Result<Self> {
        let tokens: Vec<&str> = expr.split_whitespace().collect();
        if tokens.len() != 3 {
            return Err(Error::InvalidArgument(format!("malformed condition: {expr:?}")));
        }
        Ok(Condition {
            left: Operand::parse(tokens[0])?,
            op: CmpOp::parse(tokens[1])?,
            right: Operand::parse(tokens[2])?,
        })
    }

    pub fn evaluate(&self, cpu: &Z80, bus: &AddressSpace) -> bool {
        self.op.apply(self.left.eval(cpu, bus), self.right.eval(cpu, bus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_four_literal_forms() {
        assert_eq!(parse_number("$FF").unwrap(), 0xFF);
        assert_eq!(parse_number("#255").unwrap(), 255);
        assert_eq!(parse_number("#$FF").unwrap(), 0xFF);
        assert_eq!(parse_number("FF").unwrap(), 0xFF);
    }

    #[test]
    fn condition_compiles_and_distinguishes_register_from_indirect() {
        let cond = Condition::compile("a == $80").unwrap();
        assert_eq!(cond.left, Operand::Register("a".to_string()));
        assert_eq!(cond.right, Operand::Literal(0x80));

        let cond = Condition::compile("*hl != 0").unwrap();
        assert_eq!(cond.left, Operand::IndirectRegister("hl".to_string()));
    }
}
