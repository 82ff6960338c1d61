//! Nested cutscene brackets, override points and script freezing.

use log::{debug, warn};
use serde::Serialize;

use crate::engine::Engine;
use crate::error::{VmError, VmResult};
use crate::scheduler::SlotStatus;
use crate::vars::{VAR_CUTSCENE_END_SCRIPT, VAR_CUTSCENE_START_SCRIPT, VAR_OVERRIDE};

/// Frames including the base frame, so four cutscenes can nest.
pub const CUTSCENE_STACK_SIZE: usize = 5;

/// Where an aborted cutscene resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverridePoint {
    pub slot: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CutsceneFrame {
    pub override_at: Option<OverridePoint>,
    /// First argument of the cutscene opcode, handed to the end hook.
    pub data: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CutsceneStack {
    frames: [CutsceneFrame; CUTSCENE_STACK_SIZE],
    depth: usize,
    /// Slot that opened the cutscene being set up; exempt from freezing.
    owner: Option<usize>,
}

impl Default for CutsceneStack {
    fn default() -> Self {
        CutsceneStack {
            frames: [CutsceneFrame::default(); CUTSCENE_STACK_SIZE],
            depth: 0,
            owner: None,
        }
    }
}

impl CutsceneStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn owner(&self) -> Option<usize> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: Option<usize>) {
        self.owner = owner;
    }

    pub fn top(&self) -> &CutsceneFrame {
        &self.frames[self.depth]
    }

    pub fn top_mut(&mut self) -> &mut CutsceneFrame {
        &mut self.frames[self.depth]
    }

    pub fn push(&mut self, data: i32) -> VmResult<()> {
        let depth = self.depth + 1;
        if depth >= CUTSCENE_STACK_SIZE {
            return Err(VmError::CutsceneOverflow { depth });
        }
        self.depth = depth;
        self.frames[depth] = CutsceneFrame {
            override_at: None,
            data,
        };
        Ok(())
    }

    /// Pops the innermost cutscene; the base frame is never popped.
    pub fn pop(&mut self) -> Option<CutsceneFrame> {
        if self.depth == 0 {
            return None;
        }
        let frame = std::mem::take(&mut self.frames[self.depth]);
        self.depth -= 1;
        Some(frame)
    }
}

impl Engine {
    pub fn begin_cutscene(&mut self, args: &[i32]) -> VmResult<()> {
        let current = self.scheduler.current();
        self.cutscenes.push(args.first().copied().unwrap_or(0))?;
        if let Some(slot) = current.and_then(|index| self.scheduler.slot_mut(index)) {
            slot.cutscene_override = slot.cutscene_override.saturating_add(1);
        }
        self.log_event(format!("cutscene.begin depth {}", self.cutscenes.depth()));

        self.cutscenes.set_owner(current);
        let hook = self.vars.global(VAR_CUTSCENE_START_SCRIPT);
        let result = if hook != 0 {
            self.run_script(hook as u16, false, false, args)
        } else {
            Ok(())
        };
        self.cutscenes.set_owner(None);
        result
    }

    pub fn end_cutscene(&mut self) -> VmResult<()> {
        if self.cutscenes.depth() == 0 {
            warn!("end of cutscene outside any cutscene");
            return Ok(());
        }

        let has_override = self.cutscenes.top().override_at.is_some();
        if let Some(slot) = self
            .scheduler
            .current()
            .and_then(|index| self.scheduler.slot_mut(index))
        {
            if slot.cutscene_override > 0 {
                slot.cutscene_override -= 1;
            }
            if has_override && slot.cutscene_override > 0 {
                slot.cutscene_override -= 1;
            }
        }

        self.vars.set_global(VAR_OVERRIDE, 0);
        let depth = self.cutscenes.depth();
        let frame = self.cutscenes.pop().unwrap_or_default();
        self.log_event(format!("cutscene.end depth {depth}"));

        let hook = self.vars.global(VAR_CUTSCENE_END_SCRIPT);
        if hook != 0 {
            self.run_script(hook as u16, false, false, &[frame.data])?;
        }
        Ok(())
    }

    /// Records the override point at the cursor, which sits on the jump that
    /// follows the override opcode, then skips that jump.
    pub(crate) fn begin_override(&mut self) -> VmResult<()> {
        if let Some(slot) = self.scheduler.current() {
            let offset = self.cursor.pos();
            self.cutscenes.top_mut().override_at = Some(OverridePoint { slot, offset });
        }
        self.cursor.fetch_byte()?;
        self.cursor.fetch_word()?;
        self.vars.set_global(VAR_OVERRIDE, 0);
        Ok(())
    }

    pub(crate) fn end_override(&mut self) {
        self.cutscenes.top_mut().override_at = None;
        self.vars.set_global(VAR_OVERRIDE, 0);
    }

    /// Skips the innermost cutscene: its owning slot resumes at the saved
    /// override point on its next run. Returns false when nothing was saved.
    pub fn abort_cutscene(&mut self) -> bool {
        let Some(point) = self.cutscenes.top().override_at else {
            debug!("cutscene abort with no override point");
            return false;
        };

        if let Some(slot) = self.scheduler.slot_mut(point.slot) {
            slot.offset = point.offset;
            slot.status = SlotStatus::Running;
            slot.frozen = false;
            slot.freeze_count = 0;
            if slot.cutscene_override > 0 {
                slot.cutscene_override -= 1;
            }
        }
        if self.scheduler.current() == Some(point.slot) {
            self.cursor.set_pos(point.offset);
        }

        self.vars.set_global(VAR_OVERRIDE, 1);
        self.cutscenes.top_mut().override_at = None;
        self.log_event(format!(
            "cutscene.abort slot {} offset {}",
            point.slot, point.offset
        ));
        true
    }

    /// A zero flag thaws instead of freezing.
    pub fn freeze_scripts(&mut self, flag: u8) {
        if flag == 0 {
            self.unfreeze_scripts();
            return;
        }
        self.scheduler.freeze(flag, self.cutscenes.owner());
        self.sentences.freeze();
        self.log_event(format!("scripts.freeze 0x{flag:02X}"));
    }

    pub fn unfreeze_scripts(&mut self) {
        self.scheduler.unfreeze();
        self.sentences.unfreeze();
        self.log_event("scripts.unfreeze");
    }
}
