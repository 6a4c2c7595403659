//! Compact binary records for persisted lattice equations.
//!
//! Analysis results are stored as equations over a small value lattice: an
//! equation is either already final (one lattice value) or pending on
//! components, each pairing a lattice value with the ids it depends on. The
//! record layout keeps indices small: 32-bit big-endian ids, a one-byte
//! final/pending discriminator, and LEB128 variable-length integers for
//! ordinals and counts.
//!
//! # Citations
//! - LEB128 encoding: DWARF Debugging Information Format, Version 5, §7.6 (2017)

use std::fmt;
use std::io::{self, Read, Write};

/// The analysis value lattice, bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LatticeValue {
    /// No information yet.
    Bot = 0,
    /// Proven not-null.
    NotNull = 1,
    /// Proven null.
    Null = 2,
    /// Proven true.
    True = 3,
    /// Proven false.
    False = 4,
    /// Proven to fail.
    Fail = 5,
    /// Unknown.
    Top = 6,
}

impl LatticeValue {
    /// Stable wire ordinal of this value.
    #[inline]
    pub const fn ordinal(self) -> u32 {
        self as u32
    }

    /// Decodes a wire ordinal.
    pub fn from_ordinal(ordinal: u32) -> Result<Self, IndexError> {
        match ordinal {
            0 => Ok(LatticeValue::Bot),
            1 => Ok(LatticeValue::NotNull),
            2 => Ok(LatticeValue::Null),
            3 => Ok(LatticeValue::True),
            4 => Ok(LatticeValue::False),
            5 => Ok(LatticeValue::Fail),
            6 => Ok(LatticeValue::Top),
            other => Err(IndexError::InvalidOrdinal(other)),
        }
    }
}

/// One dependency component of a pending equation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Lattice value contributed when the dependencies resolve.
    pub value: LatticeValue,
    /// Ids this component depends on.
    pub ids: Vec<u32>,
}

/// Right-hand side of an equation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EquationRhs {
    /// Fully resolved.
    Final(LatticeValue),
    /// Awaiting the listed components.
    Pending(Vec<Component>),
}

/// One persisted equation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equation {
    /// Equation id.
    pub id: u32,
    /// Resolved value or pending components.
    pub rhs: EquationRhs,
}

/// Errors raised while reading or writing index records.
#[derive(Debug)]
pub enum IndexError {
    /// Underlying I/O failure (including truncated input).
    Io(io::Error),
    /// A lattice ordinal outside the known range.
    InvalidOrdinal(u32),
    /// A variable-length integer did not terminate within 32 bits.
    VarintOverflow,
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::Io(e) => write!(f, "index i/o error: {e}"),
            IndexError::InvalidOrdinal(ord) => write!(f, "unknown lattice ordinal {ord}"),
            IndexError::VarintOverflow => write!(f, "variable-length integer overflows 32 bits"),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IndexError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for IndexError {
    fn from(e: io::Error) -> Self {
        IndexError::Io(e)
    }
}

fn write_varint(out: &mut impl Write, mut value: u32) -> Result<(), IndexError> {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.write_all(&[byte])?;
            return Ok(());
        }
        out.write_all(&[byte | 0x80])?;
    }
}

fn read_varint(input: &mut impl Read) -> Result<u32, IndexError> {
    let mut value: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = read_u8(input)?;
        if shift >= 35 {
            return Err(IndexError::VarintOverflow);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return u32::try_from(value).map_err(|_| IndexError::VarintOverflow);
        }
        shift += 7;
    }
}

fn read_u8(input: &mut impl Read) -> Result<u8, IndexError> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32(input: &mut impl Read) -> Result<u32, IndexError> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

impl Equation {
    /// Serializes this equation to a writer.
    pub fn write_to(&self, out: &mut impl Write) -> Result<(), IndexError> {
        out.write_all(&self.id.to_be_bytes())?;
        match &self.rhs {
            EquationRhs::Final(value) => {
                out.write_all(&[1])?;
                write_varint(out, value.ordinal())?;
            }
            EquationRhs::Pending(components) => {
                out.write_all(&[0])?;
                write_varint(out, components.len() as u32)?;
                for component in components {
                    write_varint(out, component.value.ordinal())?;
                    write_varint(out, component.ids.len() as u32)?;
                    for id in &component.ids {
                        out.write_all(&id.to_be_bytes())?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Deserializes one equation from a reader.
    pub fn read_from(input: &mut impl Read) -> Result<Self, IndexError> {
        let id = read_u32(input)?;
        let is_final = read_u8(input)? != 0;
        let rhs = if is_final {
            EquationRhs::Final(LatticeValue::from_ordinal(read_varint(input)?)?)
        } else {
            let count = read_varint(input)? as usize;
            let mut components = Vec::with_capacity(count);
            for _ in 0..count {
                let value = LatticeValue::from_ordinal(read_varint(input)?)?;
                let id_count = read_varint(input)? as usize;
                let mut ids = Vec::with_capacity(id_count);
                for _ in 0..id_count {
                    ids.push(read_u32(input)?);
                }
                components.push(Component { value, ids });
            }
            EquationRhs::Pending(components)
        };
        Ok(Equation { id, rhs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(equation: &Equation) -> Equation {
        let mut bytes = Vec::new();
        equation.write_to(&mut bytes).unwrap();
        Equation::read_from(&mut bytes.as_slice()).unwrap()
    }

    #[test]
    fn final_equation_round_trips() {
        let eq = Equation {
            id: 42,
            rhs: EquationRhs::Final(LatticeValue::NotNull),
        };
        assert_eq!(round_trip(&eq), eq);
    }

    #[test]
    fn pending_equation_round_trips() {
        let eq = Equation {
            id: 7,
            rhs: EquationRhs::Pending(vec![
                Component {
                    value: LatticeValue::NotNull,
                    ids: vec![3, 4],
                },
                Component {
                    value: LatticeValue::Fail,
                    ids: vec![],
                },
            ]),
        };
        assert_eq!(round_trip(&eq), eq);
    }

    #[test]
    fn final_record_layout_is_stable() {
        let eq = Equation {
            id: 1,
            rhs: EquationRhs::Final(LatticeValue::Top),
        };
        let mut bytes = Vec::new();
        eq.write_to(&mut bytes).unwrap();
        assert_eq!(bytes, [0, 0, 0, 1, 1, 6]);
    }

    #[test]
    fn pending_record_layout_is_stable() {
        let eq = Equation {
            id: 2,
            rhs: EquationRhs::Pending(vec![Component {
                value: LatticeValue::NotNull,
                ids: vec![3, 4],
            }]),
        };
        let mut bytes = Vec::new();
        eq.write_to(&mut bytes).unwrap();
        assert_eq!(bytes, [0, 0, 0, 2, 0, 1, 1, 2, 0, 0, 0, 3, 0, 0, 0, 4]);
    }

    #[test]
    fn varint_uses_the_low_seven_bits_per_byte() {
        let mut bytes = Vec::new();
        write_varint(&mut bytes, 300).unwrap();
        assert_eq!(bytes, [0xac, 0x02]);
        assert_eq!(read_varint(&mut bytes.as_slice()).unwrap(), 300);

        let mut max = Vec::new();
        write_varint(&mut max, u32::MAX).unwrap();
        assert_eq!(read_varint(&mut max.as_slice()).unwrap(), u32::MAX);
    }

    #[test]
    fn unknown_ordinal_is_an_error() {
        let bytes = [0, 0, 0, 1, 1, 9];
        match Equation::read_from(&mut bytes.as_slice()) {
            Err(IndexError::InvalidOrdinal(9)) => {}
            other => panic!("expected InvalidOrdinal, got {other:?}"),
        }
    }

    #[test]
    fn truncated_input_is_an_io_error() {
        let eq = Equation {
            id: 9,
            rhs: EquationRhs::Pending(vec![Component {
                value: LatticeValue::Null,
                ids: vec![1, 2, 3],
            }]),
        };
        let mut bytes = Vec::new();
        eq.write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 2);
        match Equation::read_from(&mut bytes.as_slice()) {
            Err(IndexError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
