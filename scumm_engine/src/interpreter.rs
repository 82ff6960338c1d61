//! The run loop: slot scheduling, nested calls and opcode dispatch.

use log::{trace, warn};

use scumm_formats::Point;

use crate::bytecode::ScriptCursor;
use crate::engine::Engine;
use crate::error::{VmError, VmResult};
use crate::opcodes::{
    actor_ops, wait, Opcode, LIST_END, PARAM_1, PARAM_2, PARAM_3, SENTENCE_CLEAR_VERB,
    START_FREEZE_RESISTANT, START_RECURSIVE,
};
use crate::scheduler::{ScriptLocation, ScriptSlot, SlotStatus};
use crate::vars::{VarAddress, INDIRECT_BIT, VAR_HAVE_MSG, VAR_SENTENCE_SCRIPT};

impl Engine {
    /// Drives every runnable slot, in table order, until it yields.
    pub fn run_all_scripts(&mut self) -> VmResult<()> {
        self.scheduler.clear_did_exec();
        self.scheduler.set_current(None);
        for index in 0..self.scheduler.slots().len() {
            if !self.scheduler.slot(index).is_some_and(ScriptSlot::is_runnable) {
                continue;
            }
            self.scheduler.set_current(Some(index));
            self.load_cursor(index)?;
            self.execute_script()?;
        }
        Ok(())
    }

    /// Starts script `number` and runs it until it first yields.
    pub fn run_script(
        &mut self,
        number: u16,
        freeze_resistant: bool,
        recursive: bool,
        args: &[i32],
    ) -> VmResult<()> {
        if number == 0 {
            return Ok(());
        }
        if !recursive {
            self.scheduler.stop_script(number);
        }

        let location = self.script_location(number);
        if self.library.code_for(number, location).is_none() {
            return Err(VmError::MissingScript { number });
        }

        let index = self.scheduler.allocate()?;
        self.scheduler
            .occupy(index, number, location, 0, freeze_resistant, recursive);
        self.vars.init_locals(index, args);
        self.log_event(format!("script.start {number} (slot {index})"));
        self.run_script_nested(index)
    }

    /// Starts the code attached to `verb` of `object`. Unknown objects and
    /// verbs without code are ignored.
    pub fn run_object_script(
        &mut self,
        object: u16,
        verb: u8,
        freeze_resistant: bool,
        recursive: bool,
        args: &[i32],
    ) -> VmResult<()> {
        if object == 0 {
            return Ok(());
        }
        if !recursive {
            self.scheduler.stop_object_script(object);
        }

        let location = self.library.where_is_object(object);
        if location == ScriptLocation::NotFound {
            warn!("object {object} has no code loaded");
            return Ok(());
        }
        let Some(entry) = self.library.object_entry(object, verb) else {
            trace!("object {object} has no entry for verb {verb}");
            return Ok(());
        };

        let index = self.scheduler.allocate()?;
        self.scheduler
            .occupy(index, object, location, entry, freeze_resistant, recursive);
        self.vars.init_locals(index, args);
        self.log_event(format!("object.start {object} verb {verb} (slot {index})"));
        self.run_script_nested(index)
    }

    /// Replaces the current script in its own slot, keeping its flags.
    pub(crate) fn chain_script(&mut self, number: u16, args: &[i32]) -> VmResult<()> {
        let Some(index) = self.scheduler.current() else {
            return Ok(());
        };
        let (freeze_resistant, recursive) = self
            .scheduler
            .slot(index)
            .map_or((false, false), |slot| (slot.freeze_resistant, slot.recursive));

        let location = self.script_location(number);
        if self.library.code_for(number, location).is_none() {
            return Err(VmError::MissingScript { number });
        }

        self.scheduler.stop_slot(index);
        if !recursive {
            self.scheduler.stop_script(number);
        }
        self.scheduler
            .occupy(index, number, location, 0, freeze_resistant, recursive);
        self.vars.init_locals(index, args);
        self.log_event(format!("script.chain {number} (slot {index})"));
        self.scheduler.set_current(None);
        self.run_script_nested(index)
    }

    /// Runs `index` to its first yield, then resumes the caller if it is
    /// still the same live, unfrozen script.
    fn run_script_nested(&mut self, index: usize) -> VmResult<()> {
        let caller = self.scheduler.current().and_then(|caller| {
            self.save_offset(caller);
            self.scheduler.caller_frame(caller)
        });
        self.scheduler.push_nest(caller)?;

        self.scheduler.set_current(Some(index));
        let result = self.load_cursor(index).and_then(|()| self.execute_script());
        let caller = self.scheduler.pop_nest();
        result?;

        match caller.filter(|frame| self.scheduler.resumable(frame)) {
            Some(frame) => {
                self.scheduler.set_current(Some(frame.slot));
                self.load_cursor(frame.slot)?;
            }
            None => {
                self.scheduler.set_current(None);
                self.cursor = ScriptCursor::default();
            }
        }
        Ok(())
    }

    fn script_location(&self, number: u16) -> ScriptLocation {
        if number < self.config.num_global_scripts {
            ScriptLocation::Global
        } else {
            ScriptLocation::Local
        }
    }

    fn load_cursor(&mut self, index: usize) -> VmResult<()> {
        let Some(slot) = self.scheduler.slot(index) else {
            return Ok(());
        };
        let (number, offset) = (slot.number, slot.offset);
        let code = self
            .library
            .code_for(number, slot.location)
            .ok_or(VmError::MissingScript { number })?;
        self.cursor = ScriptCursor::new(code, number, offset);
        Ok(())
    }

    fn save_offset(&mut self, index: usize) {
        let offset = self.cursor.pos();
        if let Some(slot) = self.scheduler.slot_mut(index) {
            slot.offset = offset;
        }
    }

    fn execute_script(&mut self) -> VmResult<()> {
        while let Some(index) = self.scheduler.current() {
            if self.cursor.at_end() {
                self.stop_object_code();
                continue;
            }
            if let Some(slot) = self.scheduler.slot_mut(index) {
                slot.did_exec = true;
            }

            let start = self.cursor.pos();
            let byte = self.cursor.fetch_byte()?;
            let opcode = Opcode::decode(byte).ok_or(VmError::UnsupportedOpcode {
                opcode: byte,
                script: self.cursor.script(),
                offset: start,
            })?;
            trace!(
                "script {} @{start}: {opcode:?} (0x{byte:02X})",
                self.cursor.script()
            );
            self.dispatch(opcode, byte, start)?;
        }
        Ok(())
    }

    /// Ends the current slot.
    fn stop_object_code(&mut self) {
        if let Some(index) = self.scheduler.current() {
            let number = self.scheduler.slot(index).map_or(0, |slot| slot.number);
            self.scheduler.stop_slot(index);
            self.log_event(format!("script.end {number} (slot {index})"));
        }
        self.cursor = ScriptCursor::default();
    }

    /// Yields the current slot until the next tick.
    fn break_here(&mut self) {
        if let Some(index) = self.scheduler.current() {
            self.save_offset(index);
        }
        self.scheduler.set_current(None);
    }

    fn pause_current(&mut self, delay: i32) {
        if let Some(slot) = self
            .scheduler
            .current()
            .and_then(|index| self.scheduler.slot_mut(index))
        {
            slot.delay = delay;
            slot.status = SlotStatus::Paused;
        }
        self.break_here();
    }

    fn fetch_address(&mut self) -> VmResult<VarAddress> {
        let raw = self.cursor.fetch_word()?;
        let raw = if raw & INDIRECT_BIT != 0 {
            let offset = self.cursor.fetch_word()?;
            self.vars
                .resolve_indirect(raw, offset, self.scheduler.current())?
        } else {
            raw
        };
        Ok(VarAddress::classify(raw))
    }

    fn get_var(&mut self) -> VmResult<i32> {
        let address = self.fetch_address()?;
        self.vars.read(address, self.scheduler.current())
    }

    fn set_result(&mut self, address: VarAddress, value: i32) -> VmResult<()> {
        self.vars.write(address, self.scheduler.current(), value)
    }

    fn param_byte(&mut self, opcode: u8, mask: u8) -> VmResult<i32> {
        if opcode & mask != 0 {
            self.get_var()
        } else {
            Ok(i32::from(self.cursor.fetch_byte()?))
        }
    }

    fn param_word(&mut self, opcode: u8, mask: u8) -> VmResult<i32> {
        if opcode & mask != 0 {
            self.get_var()
        } else {
            Ok(i32::from(self.cursor.fetch_word_signed()?))
        }
    }

    /// Argument list: marker byte per entry, closed by `LIST_END`.
    fn word_vararg(&mut self) -> VmResult<Vec<i32>> {
        let mut args = Vec::new();
        loop {
            let marker = self.cursor.fetch_byte()?;
            if marker == LIST_END {
                return Ok(args);
            }
            args.push(self.param_word(marker, PARAM_1)?);
        }
    }

    fn branch_unless(&mut self, condition: bool) -> VmResult<()> {
        let offset = self.cursor.fetch_word_signed()?;
        if !condition {
            self.cursor.jump(offset)?;
        }
        Ok(())
    }

    fn compare(&mut self, byte: u8, holds: fn(i32, i32) -> bool) -> VmResult<()> {
        let var = self.get_var()?;
        let value = self.param_word(byte, PARAM_1)?;
        self.branch_unless(holds(var, value))
    }

    fn arithmetic(&mut self, byte: u8, apply: fn(i32, i32) -> i32) -> VmResult<()> {
        let result = self.fetch_address()?;
        let value = self.param_word(byte, PARAM_1)?;
        let current = self.vars.read(result, self.scheduler.current())?;
        self.set_result(result, apply(current, value))
    }

    fn unsupported_sub(&self, opcode: u8, sub: u8) -> VmError {
        VmError::UnsupportedSubOpcode {
            opcode,
            sub,
            script: self.cursor.script(),
        }
    }

    fn dispatch(&mut self, opcode: Opcode, byte: u8, start: usize) -> VmResult<()> {
        match opcode {
            Opcode::StopObjectCode => self.stop_object_code(),
            Opcode::BreakHere => self.break_here(),
            Opcode::JumpRelative => {
                let offset = self.cursor.fetch_word_signed()?;
                self.cursor.jump(offset)?;
            }
            Opcode::Delay => {
                let ticks = self.cursor.fetch_u24()?;
                self.pause_current(ticks as i32);
            }
            Opcode::DelayVariable => {
                let ticks = self.get_var()?;
                self.pause_current(ticks);
            }

            Opcode::Move => {
                let result = self.fetch_address()?;
                let value = self.param_word(byte, PARAM_1)?;
                self.set_result(result, value)?;
            }
            Opcode::Add => self.arithmetic(byte, i32::wrapping_add)?,
            Opcode::Subtract => self.arithmetic(byte, i32::wrapping_sub)?,
            Opcode::Multiply => self.arithmetic(byte, i32::wrapping_mul)?,
            Opcode::Increment | Opcode::Decrement => {
                let result = self.fetch_address()?;
                let value = self.vars.read(result, self.scheduler.current())?;
                let step = if opcode == Opcode::Increment { 1 } else { -1 };
                self.set_result(result, value.wrapping_add(step))?;
            }
            Opcode::SetVarRange => {
                let result = self.fetch_address()?;
                // A zero count wraps around to 256 values.
                let count = match self.cursor.fetch_byte()? {
                    0 => 256,
                    count => u16::from(count),
                };
                let base = result.encode();
                for index in 0..count {
                    let value = if byte & PARAM_1 != 0 {
                        i32::from(self.cursor.fetch_word_signed()?)
                    } else {
                        i32::from(self.cursor.fetch_byte()?)
                    };
                    self.set_result(VarAddress::classify(base.wrapping_add(index)), value)?;
                }
            }

            Opcode::IsEqual => self.compare(byte, |a, b| a == b)?,
            Opcode::IsNotEqual => self.compare(byte, |a, b| a != b)?,
            Opcode::IsLess => self.compare(byte, |a, b| a < b)?,
            Opcode::LessOrEqual => self.compare(byte, |a, b| a <= b)?,
            Opcode::IsGreater => self.compare(byte, |a, b| a > b)?,
            Opcode::IsGreaterEqual => self.compare(byte, |a, b| a >= b)?,
            Opcode::EqualZero => {
                let value = self.get_var()?;
                self.branch_unless(value == 0)?;
            }
            Opcode::NotEqualZero => {
                let value = self.get_var()?;
                self.branch_unless(value != 0)?;
            }

            Opcode::StartScript => {
                let number = self.param_byte(byte, PARAM_1)?;
                let args = self.word_vararg()?;
                self.run_script(
                    number as u16,
                    byte & START_FREEZE_RESISTANT != 0,
                    byte & START_RECURSIVE != 0,
                    &args,
                )?;
            }
            Opcode::ChainScript => {
                let number = self.param_byte(byte, PARAM_1)?;
                let args = self.word_vararg()?;
                self.chain_script(number as u16, &args)?;
            }
            Opcode::StopScript => {
                let number = self.param_byte(byte, PARAM_1)?;
                if number == 0 {
                    self.stop_object_code();
                } else {
                    self.stop_script(number as u16);
                }
            }
            Opcode::IsScriptRunning => {
                let result = self.fetch_address()?;
                let number = self.param_byte(byte, PARAM_1)?;
                let running = self.scheduler.is_script_running(number as u16);
                self.set_result(result, i32::from(running))?;
            }
            Opcode::StartObject => {
                let object = self.param_word(byte, PARAM_1)?;
                let verb = self.param_byte(byte, PARAM_2)?;
                let args = self.word_vararg()?;
                self.run_object_script(object as u16, verb as u8, false, false, &args)?;
            }
            Opcode::StopObjectScript => {
                let object = self.param_word(byte, PARAM_1)?;
                self.stop_object_script(object as u16);
            }
            Opcode::FreezeScripts => {
                let flag = self.param_byte(byte, PARAM_1)?;
                self.freeze_scripts(flag as u8);
            }

            Opcode::Cutscene => {
                let args = self.word_vararg()?;
                self.begin_cutscene(&args)?;
            }
            Opcode::EndCutscene => self.end_cutscene()?,
            Opcode::Override => {
                if self.cursor.fetch_byte()? != 0 {
                    self.begin_override()?;
                } else {
                    self.end_override();
                }
            }
            Opcode::DoSentence => {
                let verb = self.param_byte(byte, PARAM_1)?;
                if verb == SENTENCE_CLEAR_VERB {
                    self.do_sentence(verb, 0, 0);
                } else {
                    let object_a = self.param_word(byte, PARAM_2)?;
                    let object_b = self.param_word(byte, PARAM_3)?;
                    self.do_sentence(verb, object_a, object_b);
                }
            }
            Opcode::Wait => self.wait(byte, start)?,

            Opcode::PutActor => {
                let actor = self.param_byte(byte, PARAM_1)?;
                let x = self.param_word(byte, PARAM_2)?;
                let y = self.param_word(byte, PARAM_3)?;
                let room = self.actor(actor)?.room;
                self.put_actor(actor, Point::new(x, y), room)?;
            }
            Opcode::WalkActorTo => {
                let actor = self.param_byte(byte, PARAM_1)?;
                let x = self.param_word(byte, PARAM_2)?;
                let y = self.param_word(byte, PARAM_3)?;
                self.start_walk_actor(actor, Point::new(x, y), None)?;
            }
            Opcode::AnimateActor => {
                let actor = self.param_byte(byte, PARAM_1)?;
                let anim = self.param_byte(byte, PARAM_2)?;
                self.animate_actor(actor, anim)?;
            }
            Opcode::ActorOps => self.actor_ops(byte)?,
            Opcode::GetActorX | Opcode::GetActorY => {
                let result = self.fetch_address()?;
                let actor = self.param_word(byte, PARAM_1)?;
                let pos = self.actor(actor)?.pos;
                let value = if opcode == Opcode::GetActorX { pos.x } else { pos.y };
                self.set_result(result, value)?;
            }
            Opcode::GetActorMoving => {
                let result = self.fetch_address()?;
                let actor = self.param_byte(byte, PARAM_1)?;
                let moving = self.actor(actor)?.moving.0;
                self.set_result(result, i32::from(moving))?;
            }
            Opcode::GetActorWalkBox => {
                let result = self.fetch_address()?;
                let actor = self.param_byte(byte, PARAM_1)?;
                let walk_box = self.actor(actor)?.walk_box;
                self.set_result(result, i32::from(walk_box))?;
            }

            Opcode::PanCameraTo => {
                let x = self.param_word(byte, PARAM_1)?;
                self.pan_camera_to(x);
            }
            Opcode::SetCameraAt => {
                let x = self.param_word(byte, PARAM_1)?;
                self.set_camera_at(x);
            }
        }
        Ok(())
    }

    /// Blocking waits rewind to the wait opcode and yield, so the condition
    /// is checked again on the next tick.
    fn wait(&mut self, byte: u8, start: usize) -> VmResult<()> {
        let sub = self.cursor.fetch_byte()?;
        let blocked = match sub & 0x1F {
            wait::FOR_ACTOR => {
                let actor = self.param_byte(sub, PARAM_1)?;
                self.actor(actor)
                    .is_ok_and(|actor| actor.is_in_room(self.room) && actor.is_moving())
            }
            wait::FOR_MESSAGE => self.vars.global(VAR_HAVE_MSG) != 0,
            wait::FOR_CAMERA => !self.camera.is_settled(),
            wait::FOR_SENTENCE => {
                let script = self.vars.global(VAR_SENTENCE_SCRIPT) as u16;
                let script_busy = self.scheduler.is_script_in_use(script);
                match self.sentences.newest() {
                    Some(sentence) => !(sentence.freeze_count != 0 && !script_busy),
                    None => script_busy,
                }
            }
            _ => return Err(self.unsupported_sub(byte, sub)),
        };
        if blocked {
            self.cursor.set_pos(start);
            self.break_here();
        }
        Ok(())
    }

    fn actor_ops(&mut self, byte: u8) -> VmResult<()> {
        let actor = self.param_byte(byte, PARAM_1)?;
        loop {
            let sub = self.cursor.fetch_byte()?;
            if sub == LIST_END {
                return Ok(());
            }
            match sub & 0x1F {
                actor_ops::WALK_SPEED => {
                    let speed_x = self.param_byte(sub, PARAM_1)?;
                    let speed_y = self.param_byte(sub, PARAM_2)?;
                    self.set_actor_walk_speed(actor, speed_x, speed_y)?;
                }
                actor_ops::IGNORE_BOXES => self.set_actor_ignore_boxes(actor, true)?,
                actor_ops::FOLLOW_BOXES => self.set_actor_ignore_boxes(actor, false)?,
                _ => return Err(self.unsupported_sub(byte, sub)),
            }
        }
    }
}
