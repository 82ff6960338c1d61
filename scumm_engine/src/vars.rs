use log::warn;

use crate::config::{AddressingPolicy, EngineConfig};
use crate::error::{VmError, VmResult};

/// Local variables available to every script slot.
pub const NUM_LOCALS: usize = 26;

/// Address bit asking for one more operand that offsets the base address.
pub const INDIRECT_BIT: u16 = 0x2000;
const BIT_VAR_FLAG: u16 = 0x8000;
const LOCAL_VAR_FLAG: u16 = 0x4000;

// Engine-owned global variables.
pub const VAR_EGO: u16 = 1;
pub const VAR_CAMERA_POS_X: u16 = 2;
pub const VAR_HAVE_MSG: u16 = 3;
pub const VAR_ROOM: u16 = 4;
pub const VAR_OVERRIDE: u16 = 5;
pub const VAR_VERB_SCRIPT: u16 = 32;
pub const VAR_SENTENCE_SCRIPT: u16 = 33;
pub const VAR_CUTSCENE_START_SCRIPT: u16 = 35;
pub const VAR_CUTSCENE_END_SCRIPT: u16 = 36;
pub const VAR_TIMER: u16 = 46;

/// A decoded variable address. Exactly one addressing scheme applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarAddress {
    Global(u16),
    Bit(u16),
    Local(u16),
}

impl VarAddress {
    /// Classifies a raw address whose indirection has already been resolved.
    pub fn classify(raw: u16) -> Self {
        if raw & 0xF000 == 0 {
            VarAddress::Global(raw)
        } else if raw & BIT_VAR_FLAG != 0 {
            VarAddress::Bit(raw & 0x7FFF)
        } else if raw & LOCAL_VAR_FLAG != 0 {
            VarAddress::Local(raw & 0x0FFF)
        } else {
            VarAddress::Global(raw & 0x0FFF)
        }
    }

    /// Raw operand word for this address.
    pub fn encode(self) -> u16 {
        match self {
            VarAddress::Global(index) => index & 0x0FFF,
            VarAddress::Bit(index) => (index & 0x7FFF) | BIT_VAR_FLAG,
            VarAddress::Local(index) => (index & 0x0FFF) | LOCAL_VAR_FLAG,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariableStore {
    globals: Vec<i32>,
    bits: Vec<u8>,
    num_bits: usize,
    locals: Vec<[i32; NUM_LOCALS]>,
    policy: AddressingPolicy,
}

impl VariableStore {
    pub fn new(config: &EngineConfig) -> Self {
        let num_bits = config.num_bit_variables;
        VariableStore {
            globals: vec![0; config.num_variables.max(1)],
            bits: vec![0; num_bits.div_ceil(8).max(1)],
            num_bits: num_bits.max(1),
            locals: vec![[0; NUM_LOCALS]; config.num_script_slots],
            policy: config.addressing,
        }
    }

    pub fn policy(&self) -> AddressingPolicy {
        self.policy
    }

    /// Reads a variable. `current` is the slot whose locals are visible.
    pub fn read(&self, address: VarAddress, current: Option<usize>) -> VmResult<i32> {
        match address {
            VarAddress::Global(index) => {
                let index = self.bound("global", index.into(), self.globals.len())?;
                Ok(self.globals[index])
            }
            VarAddress::Bit(index) => {
                let index = self.bound("bit", index.into(), self.num_bits)?;
                Ok(i32::from(self.bits[index >> 3] & (1 << (index & 7)) != 0))
            }
            VarAddress::Local(index) => match current {
                Some(slot) => {
                    let (slot, index) = self.local_position(slot, index)?;
                    Ok(self.locals[slot][index])
                }
                None => {
                    warn!("local variable {index} read with no current script");
                    Ok(self.globals[0])
                }
            },
        }
    }

    pub fn write(&mut self, address: VarAddress, current: Option<usize>, value: i32) -> VmResult<()> {
        match address {
            VarAddress::Global(index) => {
                let index = self.bound("global", index.into(), self.globals.len())?;
                self.globals[index] = value;
            }
            VarAddress::Bit(index) => {
                let index = self.bound("bit", index.into(), self.num_bits)?;
                let mask = 1u8 << (index & 7);
                if value != 0 {
                    self.bits[index >> 3] |= mask;
                } else {
                    self.bits[index >> 3] &= !mask;
                }
            }
            VarAddress::Local(index) => match current {
                Some(slot) => {
                    let (slot, index) = self.local_position(slot, index)?;
                    self.locals[slot][index] = value;
                }
                None => {
                    warn!("local variable {index} written with no current script");
                    self.globals[0] = value;
                }
            },
        }
        Ok(())
    }

    /// Adds the offset carried by the operand that follows an indirect
    /// address. An offset operand with the indirect bit set names a variable
    /// whose value is the offset; otherwise its low 12 bits are used.
    pub fn resolve_indirect(&self, raw: u16, offset: u16, current: Option<usize>) -> VmResult<u16> {
        let step = if offset & INDIRECT_BIT != 0 {
            self.read(VarAddress::classify(offset & !INDIRECT_BIT), current)? as u16
        } else {
            offset & 0x0FFF
        };
        Ok(raw.wrapping_add(step) & !INDIRECT_BIT)
    }

    /// Well-known engine variable; missing indices read as zero.
    pub fn global(&self, index: u16) -> i32 {
        self.globals.get(usize::from(index)).copied().unwrap_or(0)
    }

    pub fn set_global(&mut self, index: u16, value: i32) {
        match self.globals.get_mut(usize::from(index)) {
            Some(slot) => *slot = value,
            None => warn!("engine variable {index} is outside the configured variable space"),
        }
    }

    pub fn local(&self, slot: usize, index: usize) -> i32 {
        self.locals
            .get(slot)
            .and_then(|locals| locals.get(index))
            .copied()
            .unwrap_or(0)
    }

    /// Seeds a slot's locals from script arguments, zeroing the rest.
    pub fn init_locals(&mut self, slot: usize, args: &[i32]) {
        if let Some(locals) = self.locals.get_mut(slot) {
            *locals = [0; NUM_LOCALS];
            for (dst, src) in locals.iter_mut().zip(args) {
                *dst = *src;
            }
        }
    }

    fn local_position(&self, slot: usize, index: u16) -> VmResult<(usize, usize)> {
        let slot = self.bound("local slot", slot, self.locals.len())?;
        let index = self.bound("local", index.into(), NUM_LOCALS)?;
        Ok((slot, index))
    }

    fn bound(&self, kind: &'static str, index: usize, limit: usize) -> VmResult<usize> {
        if index < limit {
            return Ok(index);
        }
        match self.policy {
            AddressingPolicy::Strict => Err(VmError::VariableOutOfRange { kind, index, limit }),
            AddressingPolicy::Legacy => {
                warn!("{kind} variable {index} aliased onto {}", index % limit);
                Ok(index % limit)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VariableStore {
        VariableStore::new(&EngineConfig::default())
    }

    #[test]
    fn classifies_each_scheme() {
        assert_eq!(VarAddress::classify(0x0012), VarAddress::Global(0x12));
        assert_eq!(VarAddress::classify(0x8005), VarAddress::Bit(5));
        assert_eq!(VarAddress::classify(0x4003), VarAddress::Local(3));
        assert_eq!(VarAddress::classify(0xC001), VarAddress::Bit(0x4001));
        for address in [VarAddress::Global(7), VarAddress::Bit(900), VarAddress::Local(25)] {
            assert_eq!(VarAddress::classify(address.encode()), address);
        }
    }

    #[test]
    fn global_write_then_read() {
        let mut vars = store();
        vars.write(VarAddress::Global(100), None, -42).unwrap();
        assert_eq!(vars.read(VarAddress::Global(100), None).unwrap(), -42);
        assert_eq!(vars.global(100), -42);
    }

    #[test]
    fn bit_write_then_read_is_packed() {
        let mut vars = store();
        vars.write(VarAddress::Bit(9), None, 7).unwrap();
        assert_eq!(vars.read(VarAddress::Bit(9), None).unwrap(), 1);
        assert_eq!(vars.read(VarAddress::Bit(8), None).unwrap(), 0);
        assert_eq!(vars.read(VarAddress::Bit(10), None).unwrap(), 0);
        vars.write(VarAddress::Bit(4095), None, 1).unwrap();
        assert_eq!(vars.read(VarAddress::Bit(4095), None).unwrap(), 1);
        vars.write(VarAddress::Bit(9), None, 0).unwrap();
        assert_eq!(vars.read(VarAddress::Bit(9), None).unwrap(), 0);
    }

    #[test]
    fn locals_are_per_slot() {
        let mut vars = store();
        vars.write(VarAddress::Local(3), Some(1), 11).unwrap();
        vars.write(VarAddress::Local(3), Some(2), 22).unwrap();
        assert_eq!(vars.read(VarAddress::Local(3), Some(1)).unwrap(), 11);
        assert_eq!(vars.read(VarAddress::Local(3), Some(2)).unwrap(), 22);
    }

    #[test]
    fn local_without_current_script_falls_back_to_global_zero() {
        let mut vars = store();
        vars.write(VarAddress::Local(4), None, 5).unwrap();
        assert_eq!(vars.global(0), 5);
        assert_eq!(vars.read(VarAddress::Local(9), None).unwrap(), 5);
    }

    #[test]
    fn indirect_offset_uses_literal_or_variable() {
        let mut vars = store();
        vars.write(VarAddress::Global(7), None, 3).unwrap();
        let literal = vars.resolve_indirect(100 | INDIRECT_BIT, 4, None).unwrap();
        assert_eq!(literal, 104);
        let through_var = vars
            .resolve_indirect(100 | INDIRECT_BIT, 7 | INDIRECT_BIT, None)
            .unwrap();
        assert_eq!(through_var, 103);
    }

    #[test]
    fn strict_policy_rejects_out_of_range() {
        let vars = store();
        let err = vars.read(VarAddress::Global(800), None).unwrap_err();
        assert!(matches!(
            err,
            VmError::VariableOutOfRange { kind: "global", index: 800, limit: 800 }
        ));
        assert!(vars.read(VarAddress::Local(26), Some(0)).is_err());
    }

    #[test]
    fn legacy_policy_aliases_out_of_range() {
        let mut vars = VariableStore::new(&EngineConfig::default().legacy_addressing());
        vars.write(VarAddress::Global(801), None, 9).unwrap();
        assert_eq!(vars.global(1), 9);
        vars.write(VarAddress::Local(27), Some(0), 4).unwrap();
        assert_eq!(vars.local(0, 1), 4);
    }

    #[test]
    fn init_locals_zeroes_tail() {
        let mut vars = store();
        vars.write(VarAddress::Local(5), Some(0), 99).unwrap();
        vars.init_locals(0, &[1, 2, 3]);
        assert_eq!(vars.local(0, 0), 1);
        assert_eq!(vars.local(0, 2), 3);
        assert_eq!(vars.local(0, 5), 0);
    }
}
