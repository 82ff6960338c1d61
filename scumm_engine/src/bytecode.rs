//! Instruction stream access: a read cursor for the dispatcher and an
//! assembler used by scenarios and tests to produce script bytecode.

use std::rc::Rc;

use crate::actors::direction::to_old_dir;
use crate::error::{VmError, VmResult};
use crate::opcodes::{
    actor_ops, anim, op, wait, LIST_END, PARAM_1, PARAM_2, PARAM_3, START_FREEZE_RESISTANT,
    START_RECURSIVE,
};
use crate::vars::VarAddress;

/// Read position inside one script's bytecode.
#[derive(Debug, Clone)]
pub struct ScriptCursor {
    code: Rc<[u8]>,
    pos: usize,
    script: u16,
}

impl Default for ScriptCursor {
    fn default() -> Self {
        ScriptCursor {
            code: Rc::from(Vec::new()),
            pos: 0,
            script: 0,
        }
    }
}

impl ScriptCursor {
    pub fn new(code: Rc<[u8]>, script: u16, pos: usize) -> Self {
        ScriptCursor { code, pos, script }
    }

    pub fn script(&self) -> u16 {
        self.script
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.code.len()
    }

    pub fn fetch_byte(&mut self) -> VmResult<u8> {
        let byte = *self.code.get(self.pos).ok_or(self.truncated())?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn fetch_word(&mut self) -> VmResult<u16> {
        let lo = self.fetch_byte()?;
        let hi = self.fetch_byte()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    pub fn fetch_word_signed(&mut self) -> VmResult<i16> {
        Ok(self.fetch_word()? as i16)
    }

    pub fn fetch_u24(&mut self) -> VmResult<u32> {
        let lo = self.fetch_word()?;
        let hi = self.fetch_byte()?;
        Ok(u32::from(lo) | (u32::from(hi) << 16))
    }

    /// Relative jump from the current position.
    pub fn jump(&mut self, offset: i16) -> VmResult<()> {
        let target = self.pos as isize + isize::from(offset);
        if target < 0 || target as usize > self.code.len() {
            return Err(self.truncated());
        }
        self.pos = target as usize;
        Ok(())
    }

    fn truncated(&self) -> VmError {
        VmError::TruncatedScript {
            script: self.script,
            offset: self.pos,
        }
    }
}

/// A script operand: either an immediate value or a variable to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Lit(i32),
    Var(VarAddress),
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Lit(value)
    }
}

impl From<VarAddress> for Operand {
    fn from(address: VarAddress) -> Self {
        Operand::Var(address)
    }
}

impl Operand {
    fn is_var(&self) -> bool {
        matches!(self, Operand::Var(_))
    }
}

/// Forward or backward jump target handed out by [`ScriptBuilder::label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Assembles bytecode for the opcode set the dispatcher understands.
///
/// Conditional instructions fall through when their condition holds and
/// jump to the given label otherwise.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Label)>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.bytes.len());
        self
    }

    /// Creates a label bound at the current position.
    pub fn here(&mut self) -> Label {
        let label = self.label();
        self.bind(label);
        label
    }

    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn finish(&mut self) -> VmResult<Vec<u8>> {
        for &(at, label) in &self.fixups {
            let target = self.labels[label.0].ok_or(VmError::UnboundLabel(label.0))?;
            let offset = (target as isize - (at as isize + 2)) as i16;
            self.bytes[at..at + 2].copy_from_slice(&offset.to_le_bytes());
        }
        self.fixups.clear();
        Ok(std::mem::take(&mut self.bytes))
    }

    pub fn stop(&mut self) -> &mut Self {
        self.byte(op::STOP_OBJECT_CODE_ALT)
    }

    pub fn break_here(&mut self) -> &mut Self {
        self.byte(op::BREAK_HERE)
    }

    pub fn delay(&mut self, ticks: u32) -> &mut Self {
        self.byte(op::DELAY);
        let [a, b, c, _] = ticks.to_le_bytes();
        self.raw(&[a, b, c])
    }

    pub fn delay_variable(&mut self, var: VarAddress) -> &mut Self {
        self.byte(op::DELAY_VARIABLE).var(var)
    }

    pub fn set_var(&mut self, dst: VarAddress, value: impl Into<Operand>) -> &mut Self {
        self.result_word(op::MOVE, dst, value.into())
    }

    pub fn add(&mut self, dst: VarAddress, value: impl Into<Operand>) -> &mut Self {
        self.result_word(op::ADD, dst, value.into())
    }

    pub fn sub(&mut self, dst: VarAddress, value: impl Into<Operand>) -> &mut Self {
        self.result_word(op::SUBTRACT, dst, value.into())
    }

    pub fn multiply(&mut self, dst: VarAddress, value: impl Into<Operand>) -> &mut Self {
        self.result_word(op::MULTIPLY, dst, value.into())
    }

    pub fn inc(&mut self, dst: VarAddress) -> &mut Self {
        self.byte(op::INCREMENT).var(dst)
    }

    pub fn dec(&mut self, dst: VarAddress) -> &mut Self {
        self.byte(op::DECREMENT).var(dst)
    }

    /// Writes consecutive variables starting at `dst`.
    pub fn set_var_range(&mut self, dst: VarAddress, values: &[i16]) -> &mut Self {
        self.byte(op::SET_VAR_RANGE | PARAM_1).var(dst);
        self.byte(values.len() as u8);
        for value in values {
            self.raw(&value.to_le_bytes());
        }
        self
    }

    pub fn jump(&mut self, target: Label) -> &mut Self {
        self.byte(op::JUMP_RELATIVE).fixup(target)
    }

    pub fn is_equal(&mut self, var: VarAddress, value: impl Into<Operand>, otherwise: Label) -> &mut Self {
        self.compare(op::IS_EQUAL, var, value.into(), otherwise)
    }

    pub fn is_not_equal(&mut self, var: VarAddress, value: impl Into<Operand>, otherwise: Label) -> &mut Self {
        self.compare(op::IS_NOT_EQUAL, var, value.into(), otherwise)
    }

    pub fn is_less(&mut self, var: VarAddress, value: impl Into<Operand>, otherwise: Label) -> &mut Self {
        self.compare(op::IS_LESS, var, value.into(), otherwise)
    }

    pub fn is_less_or_equal(&mut self, var: VarAddress, value: impl Into<Operand>, otherwise: Label) -> &mut Self {
        self.compare(op::LESS_OR_EQUAL, var, value.into(), otherwise)
    }

    pub fn is_greater(&mut self, var: VarAddress, value: impl Into<Operand>, otherwise: Label) -> &mut Self {
        self.compare(op::IS_GREATER, var, value.into(), otherwise)
    }

    pub fn is_greater_equal(&mut self, var: VarAddress, value: impl Into<Operand>, otherwise: Label) -> &mut Self {
        self.compare(op::IS_GREATER_EQUAL, var, value.into(), otherwise)
    }

    pub fn equal_zero(&mut self, var: VarAddress, otherwise: Label) -> &mut Self {
        self.byte(op::EQUAL_ZERO).var(var).fixup(otherwise)
    }

    pub fn not_equal_zero(&mut self, var: VarAddress, otherwise: Label) -> &mut Self {
        self.byte(op::NOT_EQUAL_ZERO).var(var).fixup(otherwise)
    }

    pub fn start_script(&mut self, number: impl Into<Operand>, args: &[Operand]) -> &mut Self {
        self.start_script_with(number, args, false, false)
    }

    pub fn start_script_with(
        &mut self,
        number: impl Into<Operand>,
        args: &[Operand],
        freeze_resistant: bool,
        recursive: bool,
    ) -> &mut Self {
        let number = number.into();
        let mut opcode = op::START_SCRIPT;
        if number.is_var() {
            opcode |= PARAM_1;
        }
        if freeze_resistant {
            opcode |= START_FREEZE_RESISTANT;
        }
        if recursive {
            opcode |= START_RECURSIVE;
        }
        self.byte(opcode).param_byte(number).args(args)
    }

    pub fn chain_script(&mut self, number: impl Into<Operand>, args: &[Operand]) -> &mut Self {
        let number = number.into();
        self.opcode(op::CHAIN_SCRIPT, &[number]).param_byte(number).args(args)
    }

    /// Script number zero stops the script executing the instruction.
    pub fn stop_script(&mut self, number: impl Into<Operand>) -> &mut Self {
        let number = number.into();
        self.opcode(op::STOP_SCRIPT, &[number]).param_byte(number)
    }

    pub fn is_script_running(&mut self, dst: VarAddress, number: impl Into<Operand>) -> &mut Self {
        let number = number.into();
        self.opcode(op::IS_SCRIPT_RUNNING, &[number]).var(dst).param_byte(number)
    }

    pub fn start_object(
        &mut self,
        object: impl Into<Operand>,
        verb: impl Into<Operand>,
        args: &[Operand],
    ) -> &mut Self {
        let (object, verb) = (object.into(), verb.into());
        self.opcode(op::START_OBJECT, &[object, verb])
            .param_word(object)
            .param_byte(verb)
            .args(args)
    }

    pub fn stop_object_script(&mut self, object: impl Into<Operand>) -> &mut Self {
        let object = object.into();
        self.opcode(op::STOP_OBJECT_SCRIPT, &[object]).param_word(object)
    }

    /// A zero flag thaws instead of freezing.
    pub fn freeze_scripts(&mut self, flag: impl Into<Operand>) -> &mut Self {
        let flag = flag.into();
        self.opcode(op::FREEZE_SCRIPTS, &[flag]).param_byte(flag)
    }

    pub fn cutscene(&mut self, args: &[Operand]) -> &mut Self {
        self.byte(op::CUTSCENE).args(args)
    }

    pub fn end_cutscene(&mut self) -> &mut Self {
        self.byte(op::END_CUTSCENE)
    }

    /// Marks the override point. Aborting the cutscene resumes at the jump
    /// that follows, which leads to `skip`.
    pub fn begin_override(&mut self, skip: Label) -> &mut Self {
        self.raw(&[op::OVERRIDE, 1, op::JUMP_RELATIVE]).fixup(skip)
    }

    pub fn end_override(&mut self) -> &mut Self {
        self.raw(&[op::OVERRIDE, 0])
    }

    pub fn do_sentence(
        &mut self,
        verb: impl Into<Operand>,
        object_a: impl Into<Operand>,
        object_b: impl Into<Operand>,
    ) -> &mut Self {
        let (verb, a, b) = (verb.into(), object_a.into(), object_b.into());
        self.opcode(op::DO_SENTENCE, &[verb, a, b])
            .param_byte(verb)
            .param_word(a)
            .param_word(b)
    }

    pub fn clear_sentences(&mut self) -> &mut Self {
        self.raw(&[op::DO_SENTENCE, 0xFE])
    }

    pub fn put_actor(
        &mut self,
        actor: impl Into<Operand>,
        x: impl Into<Operand>,
        y: impl Into<Operand>,
    ) -> &mut Self {
        self.actor_xy(op::PUT_ACTOR, actor.into(), x.into(), y.into())
    }

    pub fn walk_actor_to(
        &mut self,
        actor: impl Into<Operand>,
        x: impl Into<Operand>,
        y: impl Into<Operand>,
    ) -> &mut Self {
        self.actor_xy(op::WALK_ACTOR_TO, actor.into(), x.into(), y.into())
    }

    pub fn wait_for_actor(&mut self, actor: impl Into<Operand>) -> &mut Self {
        let actor = actor.into();
        let sub = if actor.is_var() { wait::FOR_ACTOR | PARAM_1 } else { wait::FOR_ACTOR };
        self.raw(&[op::WAIT, sub]).param_byte(actor)
    }

    pub fn wait_for_message(&mut self) -> &mut Self {
        self.raw(&[op::WAIT, wait::FOR_MESSAGE])
    }

    pub fn wait_for_camera(&mut self) -> &mut Self {
        self.raw(&[op::WAIT, wait::FOR_CAMERA])
    }

    pub fn wait_for_sentence(&mut self) -> &mut Self {
        self.raw(&[op::WAIT, wait::FOR_SENTENCE])
    }

    pub fn get_actor_moving(&mut self, dst: VarAddress, actor: impl Into<Operand>) -> &mut Self {
        let actor = actor.into();
        self.opcode(op::GET_ACTOR_MOVING, &[actor]).var(dst).param_byte(actor)
    }

    pub fn get_actor_walk_box(&mut self, dst: VarAddress, actor: impl Into<Operand>) -> &mut Self {
        let actor = actor.into();
        self.opcode(op::GET_ACTOR_WALK_BOX, &[actor]).var(dst).param_byte(actor)
    }

    pub fn get_actor_x(&mut self, dst: VarAddress, actor: impl Into<Operand>) -> &mut Self {
        let actor = actor.into();
        self.opcode(op::GET_ACTOR_X, &[actor]).var(dst).param_word(actor)
    }

    pub fn get_actor_y(&mut self, dst: VarAddress, actor: impl Into<Operand>) -> &mut Self {
        let actor = actor.into();
        self.opcode(op::GET_ACTOR_Y, &[actor]).var(dst).param_word(actor)
    }

    pub fn animate_actor(&mut self, actor: impl Into<Operand>, anim: impl Into<Operand>) -> &mut Self {
        let (actor, anim) = (actor.into(), anim.into());
        self.opcode(op::ANIMATE_ACTOR, &[actor, anim])
            .param_byte(actor)
            .param_byte(anim)
    }

    /// Turns gradually toward the nearest of the four cardinal facings.
    pub fn turn_actor(&mut self, actor: impl Into<Operand>, facing: i32) -> &mut Self {
        self.animate_actor(actor, anim::TURN + to_old_dir(facing))
    }

    pub fn stop_actor(&mut self, actor: impl Into<Operand>) -> &mut Self {
        self.animate_actor(actor, anim::STOP)
    }

    pub fn set_walk_speed(&mut self, actor: impl Into<Operand>, x: u8, y: u8) -> &mut Self {
        self.actor_op_prefix(actor.into());
        self.raw(&[actor_ops::WALK_SPEED, x, y, LIST_END])
    }

    pub fn ignore_boxes(&mut self, actor: impl Into<Operand>) -> &mut Self {
        self.actor_op_prefix(actor.into());
        self.raw(&[actor_ops::IGNORE_BOXES, LIST_END])
    }

    pub fn follow_boxes(&mut self, actor: impl Into<Operand>) -> &mut Self {
        self.actor_op_prefix(actor.into());
        self.raw(&[actor_ops::FOLLOW_BOXES, LIST_END])
    }

    pub fn pan_camera_to(&mut self, x: impl Into<Operand>) -> &mut Self {
        let x = x.into();
        self.opcode(op::PAN_CAMERA_TO, &[x]).param_word(x)
    }

    pub fn set_camera_at(&mut self, x: impl Into<Operand>) -> &mut Self {
        let x = x.into();
        self.opcode(op::SET_CAMERA_AT, &[x]).param_word(x)
    }

    fn byte(&mut self, byte: u8) -> &mut Self {
        self.bytes.push(byte);
        self
    }

    fn word(&mut self, word: u16) -> &mut Self {
        self.raw(&word.to_le_bytes())
    }

    fn var(&mut self, var: VarAddress) -> &mut Self {
        self.word(var.encode())
    }

    /// Emits `base` with the parameter bits of every variable operand set.
    fn opcode(&mut self, base: u8, params: &[Operand]) -> &mut Self {
        let mut opcode = base;
        for (param, bit) in params.iter().zip([PARAM_1, PARAM_2, PARAM_3]) {
            if param.is_var() {
                opcode |= bit;
            }
        }
        self.byte(opcode)
    }

    fn param_byte(&mut self, operand: Operand) -> &mut Self {
        match operand {
            Operand::Lit(value) => self.byte(value as u8),
            Operand::Var(var) => self.var(var),
        }
    }

    fn param_word(&mut self, operand: Operand) -> &mut Self {
        match operand {
            Operand::Lit(value) => self.word(value as u16),
            Operand::Var(var) => self.var(var),
        }
    }

    fn args(&mut self, args: &[Operand]) -> &mut Self {
        for &arg in args {
            self.byte(if arg.is_var() { PARAM_1 | 1 } else { 1 });
            self.param_word(arg);
        }
        self.byte(LIST_END)
    }

    fn fixup(&mut self, target: Label) -> &mut Self {
        self.fixups.push((self.bytes.len(), target));
        self.word(0)
    }

    fn result_word(&mut self, base: u8, dst: VarAddress, value: Operand) -> &mut Self {
        self.opcode(base, &[value]).var(dst).param_word(value)
    }

    fn compare(&mut self, base: u8, var: VarAddress, value: Operand, otherwise: Label) -> &mut Self {
        self.opcode(base, &[value]).var(var).param_word(value).fixup(otherwise)
    }

    fn actor_xy(&mut self, base: u8, actor: Operand, x: Operand, y: Operand) -> &mut Self {
        self.opcode(base, &[actor, x, y])
            .param_byte(actor)
            .param_word(x)
            .param_word(y)
    }

    fn actor_op_prefix(&mut self, actor: Operand) {
        self.opcode(op::ACTOR_OPS, &[actor]).param_byte(actor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_reads_little_endian() {
        let code: Rc<[u8]> = Rc::from(vec![0x34, 0x12, 0xFE, 0xFF, 0x01, 0x02, 0x03]);
        let mut cursor = ScriptCursor::new(code, 7, 0);
        assert_eq!(cursor.fetch_word().unwrap(), 0x1234);
        assert_eq!(cursor.fetch_word_signed().unwrap(), -2);
        assert_eq!(cursor.fetch_u24().unwrap(), 0x030201);
        assert!(cursor.at_end());
        assert_eq!(
            cursor.fetch_byte().unwrap_err(),
            VmError::TruncatedScript { script: 7, offset: 7 }
        );
    }

    #[test]
    fn cursor_rejects_jump_before_start() {
        let mut cursor = ScriptCursor::new(Rc::from(vec![0u8; 4]), 1, 2);
        cursor.jump(-2).unwrap();
        assert_eq!(cursor.pos(), 0);
        assert!(cursor.jump(-1).is_err());
    }

    #[test]
    fn forward_and_backward_labels_resolve() {
        let mut builder = ScriptBuilder::new();
        let top = builder.here();
        let done = builder.label();
        builder.jump(done).jump(top);
        builder.bind(done).stop();
        let bytes = builder.finish().unwrap();
        // jump +3 over the second jump, then jump -6 back to offset 0
        assert_eq!(bytes, vec![0x18, 3, 0, 0x18, 0xFA, 0xFF, 0xA0]);
    }

    #[test]
    fn unbound_label_is_reported() {
        let mut builder = ScriptBuilder::new();
        let nowhere = builder.label();
        builder.jump(nowhere);
        assert_eq!(builder.finish().unwrap_err(), VmError::UnboundLabel(0));
    }

    #[test]
    fn variable_operands_set_parameter_bits() {
        let mut builder = ScriptBuilder::new();
        builder.put_actor(1, VarAddress::Global(10), 20);
        let bytes = builder.finish().unwrap();
        assert_eq!(bytes, vec![op::PUT_ACTOR | PARAM_2, 1, 10, 0, 20, 0]);
    }

    #[test]
    fn start_script_folds_flags_and_args() {
        let mut builder = ScriptBuilder::new();
        builder.start_script_with(5, &[Operand::Lit(3), VarAddress::Local(0).into()], true, true);
        let bytes = builder.finish().unwrap();
        assert_eq!(
            bytes,
            vec![0x0A | 0x20 | 0x40, 5, 0x01, 3, 0, 0x81, 0x00, 0x40, 0xFF]
        );
    }
}
