//! Instruction decoding.
//!
//! [`BytecodeCursor`] wraps a verified method body and turns byte indices into
//! [`OpcodeRecord`]s: opcode identity, decoded operands with branch offsets
//! already made absolute, and the index of the following instruction. The
//! cursor is stateless; `decode` may be called at any instruction boundary in
//! any order, which is what the block-discovery prescan and the analyzer's
//! method peeks rely on.

use crate::{
    bytecode::{FlowKind, Opcode, OperandForm},
    Error, Result,
};

/// One decoded instruction.
#[derive(Clone, Debug)]
pub struct OpcodeRecord {
    /// Byte index of the opcode within the method body.
    pub offset: usize,
    /// The decoded opcode.
    pub opcode: Opcode,
    /// Whether the wide prefix preceded the opcode.
    pub wide: bool,
    /// Decoded operand bytes.
    pub operands: Operands,
    /// Byte index of the next instruction (= end of this one).
    pub next: usize,
}

impl OpcodeRecord {
    /// Control-flow effect of this instruction.
    pub fn flow(&self) -> FlowKind {
        self.opcode.flow()
    }

    /// All control-transfer targets of this instruction, taken edges only.
    pub fn branch_targets(&self) -> Vec<usize> {
        match &self.operands {
            Operands::Branch { target } => vec![*target],
            Operands::TableSwitch {
                default, targets, ..
            } => {
                let mut all = Vec::with_capacity(targets.len() + 1);
                all.push(*default);
                all.extend_from_slice(targets);
                all
            }
            Operands::LookupSwitch { default, pairs } => {
                let mut all = Vec::with_capacity(pairs.len() + 1);
                all.push(*default);
                all.extend(pairs.iter().map(|(_, target)| *target));
                all
            }
            _ => Vec::new(),
        }
    }
}

/// Decoded operand bytes of one instruction.
#[derive(Clone, Debug)]
pub enum Operands {
    /// No operands.
    None,
    /// Immediate constant (`bipush`, `sipush`).
    Immediate(i32),
    /// Constant-pool index.
    Pool(u16),
    /// Local-variable index.
    Local(u16),
    /// Local-variable index and signed increment (`iinc`).
    LocalIncrement {
        /// The local-variable index.
        local: u16,
        /// The signed increment.
        delta: i16,
    },
    /// Absolute branch target.
    Branch {
        /// Byte index of the target instruction.
        target: usize,
    },
    /// Bounded jump table (`tableswitch`).
    TableSwitch {
        /// Absolute default target.
        default: usize,
        /// Lowest matched key.
        low: i32,
        /// Absolute targets for keys `low..=low + targets.len() - 1`.
        targets: Vec<usize>,
    },
    /// Sparse jump table (`lookupswitch`).
    LookupSwitch {
        /// Absolute default target.
        default: usize,
        /// Match keys with their absolute targets, keys strictly ascending.
        pairs: Vec<(i32, usize)>,
    },
    /// Constant-pool index plus dimension count (`multianewarray`).
    PoolAndDims {
        /// The constant-pool index of the array class.
        pool: u16,
        /// Number of dimensions supplied on the operand stack.
        dims: u8,
    },
    /// Constant-pool index plus argument-count byte (`invokeinterface`).
    PoolAndCount {
        /// The constant-pool index of the interface method.
        pool: u16,
        /// The redundant argument-slot count byte.
        count: u8,
    },
    /// Primitive element-type code (`newarray`).
    ElementType(u8),
}

/// A read-only cursor over one method body.
pub struct BytecodeCursor<'code> {
    code: &'code [u8],
}

impl<'code> BytecodeCursor<'code> {
    /// Creates a cursor over `code`.
    ///
    /// # Errors
    /// Returns [`Error::Empty`] for an empty buffer.
    pub fn new(code: &'code [u8]) -> Result<Self> {
        if code.is_empty() {
            return Err(Error::Empty);
        }
        Ok(BytecodeCursor { code })
    }

    /// Length of the method body in bytes.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Whether the body is empty (never true for a constructed cursor).
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Decodes the instruction at `index`.
    ///
    /// # Errors
    /// - [`Error::UnsupportedBytecode`] for undefined bytes and for defined but
    ///   untranslatable opcodes
    /// - [`Error::OutOfBounds`] when operands run past the end of the body
    /// - [`Error::Malformed`] for structural damage (wide prefix on a
    ///   non-widenable opcode, inverted switch bounds, unsorted match keys,
    ///   targets outside the body)
    pub fn decode(&self, index: usize) -> Result<OpcodeRecord> {
        let byte = self.read_u8(index)?;
        let opcode = Opcode::from_repr(byte).ok_or(Error::UnsupportedBytecode {
            opcode: byte,
            offset: index,
        })?;
        if opcode.unsupported() {
            return Err(Error::UnsupportedBytecode {
                opcode: byte,
                offset: index,
            });
        }
        if opcode == Opcode::Wide {
            return self.decode_wide(index);
        }

        let operand_at = index + 1;
        let (operands, next) = match opcode.operand_form() {
            OperandForm::None => (Operands::None, operand_at),
            OperandForm::SignedByte => (
                Operands::Immediate(i32::from(self.read_u8(operand_at)? as i8)),
                operand_at + 1,
            ),
            OperandForm::SignedShort => (
                Operands::Immediate(i32::from(self.read_i16(operand_at)?)),
                operand_at + 2,
            ),
            OperandForm::PoolByte => (
                Operands::Pool(u16::from(self.read_u8(operand_at)?)),
                operand_at + 1,
            ),
            OperandForm::Pool => (Operands::Pool(self.read_u16(operand_at)?), operand_at + 2),
            OperandForm::PoolAndCount => (
                Operands::PoolAndCount {
                    pool: self.read_u16(operand_at)?,
                    count: self.read_u8(operand_at + 2)?,
                },
                operand_at + 4,
            ),
            OperandForm::PoolAndDims => (
                Operands::PoolAndDims {
                    pool: self.read_u16(operand_at)?,
                    dims: self.read_u8(operand_at + 2)?,
                },
                operand_at + 3,
            ),
            OperandForm::Local => (
                Operands::Local(u16::from(self.read_u8(operand_at)?)),
                operand_at + 1,
            ),
            OperandForm::LocalIncrement => (
                Operands::LocalIncrement {
                    local: u16::from(self.read_u8(operand_at)?),
                    delta: i16::from(self.read_u8(operand_at + 1)? as i8),
                },
                operand_at + 2,
            ),
            OperandForm::Branch16 => (
                Operands::Branch {
                    target: self.branch_target(index, i32::from(self.read_i16(operand_at)?))?,
                },
                operand_at + 2,
            ),
            OperandForm::Branch32 => (
                Operands::Branch {
                    target: self.branch_target(index, self.read_i32(operand_at)?)?,
                },
                operand_at + 4,
            ),
            OperandForm::TableSwitch => self.decode_tableswitch(index)?,
            OperandForm::LookupSwitch => self.decode_lookupswitch(index)?,
            OperandForm::ElementType => (
                Operands::ElementType(self.read_u8(operand_at)?),
                operand_at + 1,
            ),
        };

        Ok(OpcodeRecord {
            offset: index,
            opcode,
            wide: false,
            operands,
            next,
        })
    }

    /// Decodes the whole body front to back.
    ///
    /// # Errors
    /// Fails with the first decoding error; a partial stream is never returned.
    pub fn decode_all(&self) -> Result<Vec<OpcodeRecord>> {
        let mut records = Vec::new();
        let mut index = 0;
        while index < self.code.len() {
            let record = self.decode(index)?;
            index = record.next;
            records.push(record);
        }
        Ok(records)
    }

    fn decode_wide(&self, index: usize) -> Result<OpcodeRecord> {
        let byte = self.read_u8(index + 1)?;
        let opcode = Opcode::from_repr(byte).ok_or(Error::UnsupportedBytecode {
            opcode: byte,
            offset: index + 1,
        })?;
        if opcode.unsupported() {
            return Err(Error::UnsupportedBytecode {
                opcode: byte,
                offset: index + 1,
            });
        }
        if !opcode.widenable() {
            return Err(malformed_error!(
                "wide prefix on non-widenable opcode {} at offset {}",
                opcode.mnemonic(),
                index
            ));
        }

        let operand_at = index + 2;
        let (operands, next) = match opcode.operand_form() {
            OperandForm::Local => (Operands::Local(self.read_u16(operand_at)?), operand_at + 2),
            OperandForm::LocalIncrement => (
                Operands::LocalIncrement {
                    local: self.read_u16(operand_at)?,
                    delta: self.read_i16(operand_at + 2)?,
                },
                operand_at + 4,
            ),
            // widenable() admits only the two forms above
            _ => unreachable!(),
        };

        Ok(OpcodeRecord {
            offset: index,
            opcode,
            wide: true,
            operands,
            next,
        })
    }

    fn decode_tableswitch(&self, index: usize) -> Result<(Operands, usize)> {
        let base = self.switch_base(index);
        let default = self.branch_target(index, self.read_i32(base)?)?;
        let low = self.read_i32(base + 4)?;
        let high = self.read_i32(base + 8)?;
        if low > high {
            return Err(malformed_error!(
                "tableswitch at offset {} has inverted bounds {}..{}",
                index,
                low,
                high
            ));
        }

        let count = (i64::from(high) - i64::from(low) + 1) as usize;
        let table_at = base + 12;
        let table_len = count
            .checked_mul(4)
            .ok_or(Error::OutOfBounds)
            .and_then(|bytes| {
                table_at.checked_add(bytes).ok_or(Error::OutOfBounds)
            })?;
        if table_len > self.code.len() {
            return Err(Error::OutOfBounds);
        }

        let mut targets = Vec::with_capacity(count);
        for entry in 0..count {
            targets.push(self.branch_target(index, self.read_i32(table_at + entry * 4)?)?);
        }
        Ok((
            Operands::TableSwitch {
                default,
                low,
                targets,
            },
            table_len,
        ))
    }

    fn decode_lookupswitch(&self, index: usize) -> Result<(Operands, usize)> {
        let base = self.switch_base(index);
        let default = self.branch_target(index, self.read_i32(base)?)?;
        let npairs = self.read_i32(base + 4)?;
        if npairs < 0 {
            return Err(malformed_error!(
                "lookupswitch at offset {} has negative pair count {}",
                index,
                npairs
            ));
        }

        let count = npairs as usize;
        let table_at = base + 8;
        let table_len = count
            .checked_mul(8)
            .ok_or(Error::OutOfBounds)
            .and_then(|bytes| {
                table_at.checked_add(bytes).ok_or(Error::OutOfBounds)
            })?;
        if table_len > self.code.len() {
            return Err(Error::OutOfBounds);
        }

        let mut pairs = Vec::with_capacity(count);
        for entry in 0..count {
            let key = self.read_i32(table_at + entry * 8)?;
            let target = self.branch_target(index, self.read_i32(table_at + entry * 8 + 4)?)?;
            if let Some((previous, _)) = pairs.last() {
                if *previous >= key {
                    return Err(malformed_error!(
                        "lookupswitch at offset {} has non-ascending keys at {}",
                        index,
                        key
                    ));
                }
            }
            pairs.push((key, target));
        }
        Ok((Operands::LookupSwitch { default, pairs }, table_len))
    }

    /// First operand byte of a switch: skip the opcode byte, then pad to the
    /// next 4-byte boundary relative to the start of the body.
    fn switch_base(&self, index: usize) -> usize {
        let after_opcode = index + 1;
        after_opcode + ((4 - (after_opcode % 4)) % 4)
    }

    fn branch_target(&self, instruction_at: usize, relative: i32) -> Result<usize> {
        let target = instruction_at as i64 + i64::from(relative);
        if target < 0 || target >= self.code.len() as i64 {
            return Err(malformed_error!(
                "branch at offset {} targets {} outside the method body",
                instruction_at,
                target
            ));
        }
        Ok(target as usize)
    }

    fn read_u8(&self, index: usize) -> Result<u8> {
        self.code.get(index).copied().ok_or(Error::OutOfBounds)
    }

    fn read_u16(&self, index: usize) -> Result<u16> {
        let bytes: [u8; 2] = self
            .code
            .get(index..index + 2)
            .ok_or(Error::OutOfBounds)?
            .try_into()
            .map_err(|_| Error::OutOfBounds)?;
        Ok(u16::from_be_bytes(bytes))
    }

    fn read_i16(&self, index: usize) -> Result<i16> {
        Ok(self.read_u16(index)? as i16)
    }

    fn read_i32(&self, index: usize) -> Result<i32> {
        let bytes: [u8; 4] = self
            .code
            .get(index..index + 4)
            .ok_or(Error::OutOfBounds)?
            .try_into()
            .map_err(|_| Error::OutOfBounds)?;
        Ok(i32::from_be_bytes(bytes))
    }
}
