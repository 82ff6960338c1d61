use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{VmError, VmResult};

/// Deepest chain of synchronous script-in-script calls.
pub const MAX_NESTED_SCRIPTS: usize = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    #[default]
    Dead,
    Paused,
    Running,
}

/// Where the code of a slot lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptLocation {
    #[default]
    Global,
    Local,
    Room,
    Inventory,
    FLObject,
    NotFound,
}

impl ScriptLocation {
    pub fn is_script(self) -> bool {
        matches!(self, ScriptLocation::Global | ScriptLocation::Local)
    }

    pub fn is_object(self) -> bool {
        matches!(
            self,
            ScriptLocation::Room | ScriptLocation::Inventory | ScriptLocation::FLObject
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptSlot {
    pub number: u16,
    pub status: SlotStatus,
    pub location: ScriptLocation,
    pub offset: usize,
    /// Ticks left while `Paused`.
    pub delay: i32,
    pub frozen: bool,
    pub freeze_count: u8,
    pub freeze_resistant: bool,
    pub recursive: bool,
    pub did_exec: bool,
    pub cutscene_override: u8,
}

impl ScriptSlot {
    pub fn is_live(&self) -> bool {
        self.status != SlotStatus::Dead
    }

    /// Runnable this tick: running, unfrozen, not yet visited.
    pub fn is_runnable(&self) -> bool {
        self.status == SlotStatus::Running && !self.frozen && !self.did_exec
    }

    fn kill(&mut self) {
        self.number = 0;
        self.status = SlotStatus::Dead;
    }
}

/// Caller identity recorded when a script starts another synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NestFrame {
    pub number: u16,
    pub location: ScriptLocation,
    pub slot: usize,
}

/// Fixed script slot table plus the nested-call stack.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptScheduler {
    slots: Vec<ScriptSlot>,
    /// `None` entries are callers that were idle or have been stopped.
    nest: Vec<Option<NestFrame>>,
    current: Option<usize>,
}

impl ScriptScheduler {
    pub fn new(num_slots: usize) -> Self {
        ScriptScheduler {
            slots: vec![ScriptSlot::default(); num_slots],
            nest: Vec::with_capacity(MAX_NESTED_SCRIPTS),
            current: None,
        }
    }

    pub fn slots(&self) -> &[ScriptSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&ScriptSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut ScriptSlot> {
        self.slots.get_mut(index)
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn set_current(&mut self, current: Option<usize>) {
        self.current = current;
    }

    pub fn nest_depth(&self) -> usize {
        self.nest.len()
    }

    /// First dead slot in table order.
    pub fn allocate(&self) -> VmResult<usize> {
        self.slots
            .iter()
            .position(|slot| !slot.is_live())
            .ok_or(VmError::SlotTableFull {
                slots: self.slots.len(),
            })
    }

    pub fn occupy(
        &mut self,
        index: usize,
        number: u16,
        location: ScriptLocation,
        offset: usize,
        freeze_resistant: bool,
        recursive: bool,
    ) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = ScriptSlot {
                number,
                status: SlotStatus::Running,
                location,
                offset,
                freeze_resistant,
                recursive,
                ..ScriptSlot::default()
            };
        }
    }

    pub fn clear_did_exec(&mut self) {
        for slot in &mut self.slots {
            slot.did_exec = false;
        }
    }

    /// Kills the slot outright, as when a script runs its stop opcode.
    pub fn stop_slot(&mut self, index: usize) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        if slot.cutscene_override > 0 {
            warn!(
                "script {} stopped while holding {} cutscene override(s)",
                slot.number, slot.cutscene_override
            );
            slot.cutscene_override = 0;
        }
        slot.kill();
        if self.current == Some(index) {
            self.current = None;
        }
    }

    /// Stops every global or local instance of `number` and forgets nested
    /// callers with that identity. Returns the slots that were stopped.
    pub fn stop_script(&mut self, number: u16) -> Vec<usize> {
        self.stop_matching(number, ScriptLocation::is_script)
    }

    pub fn stop_object_script(&mut self, object: u16) -> Vec<usize> {
        self.stop_matching(object, ScriptLocation::is_object)
    }

    fn stop_matching(&mut self, number: u16, matches: fn(ScriptLocation) -> bool) -> Vec<usize> {
        if number == 0 {
            return Vec::new();
        }
        let stopped: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.number == number && slot.is_live() && matches(slot.location))
            .map(|(index, _)| index)
            .collect();
        for &index in &stopped {
            self.stop_slot(index);
        }
        for frame in &mut self.nest {
            if frame.is_some_and(|f| f.number == number && matches(f.location)) {
                *frame = None;
            }
        }
        stopped
    }

    /// Freezes every live slot except `current`. Freeze-resistant slots only
    /// yield to flags of 0x80 and above.
    pub fn freeze(&mut self, flag: u8, exempt: Option<usize>) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if Some(index) == self.current || !slot.is_live() {
                continue;
            }
            if slot.freeze_resistant && flag < 0x80 {
                continue;
            }
            slot.frozen = true;
            slot.freeze_count = slot.freeze_count.saturating_add(1);
        }
        if let Some(slot) = exempt.and_then(|index| self.slots.get_mut(index)) {
            slot.frozen = false;
            slot.freeze_count = 0;
        }
    }

    pub fn unfreeze(&mut self) {
        for slot in self.slots.iter_mut().filter(|slot| slot.frozen) {
            slot.freeze_count = slot.freeze_count.saturating_sub(1);
            if slot.freeze_count == 0 {
                slot.frozen = false;
            }
        }
    }

    /// Counts down paused slots; a slot whose delay drops below zero runs again.
    pub fn decrease_delays(&mut self, ticks: i32) {
        for slot in &mut self.slots {
            if slot.status == SlotStatus::Paused && !slot.frozen {
                slot.delay -= ticks;
                if slot.delay < 0 {
                    slot.status = SlotStatus::Running;
                    slot.delay = 0;
                }
            }
        }
    }

    pub fn push_nest(&mut self, frame: Option<NestFrame>) -> VmResult<()> {
        if self.nest.len() >= MAX_NESTED_SCRIPTS {
            return Err(VmError::NestingOverflow {
                limit: MAX_NESTED_SCRIPTS,
            });
        }
        self.nest.push(frame);
        Ok(())
    }

    pub fn pop_nest(&mut self) -> Option<NestFrame> {
        self.nest.pop().flatten()
    }

    /// The caller still holds the same script, is alive and is not frozen.
    pub fn resumable(&self, frame: &NestFrame) -> bool {
        self.slots.get(frame.slot).is_some_and(|slot| {
            slot.number == frame.number
                && slot.location == frame.location
                && slot.is_live()
                && slot.freeze_count == 0
        })
    }

    pub fn caller_frame(&self, index: usize) -> Option<NestFrame> {
        let slot = self.slots.get(index)?;
        Some(NestFrame {
            number: slot.number,
            location: slot.location,
            slot: index,
        })
    }

    pub fn is_script_running(&self, number: u16) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.number == number && slot.location.is_script() && slot.is_live())
    }

    pub fn is_script_in_use(&self, number: u16) -> bool {
        number != 0 && self.slots.iter().any(|slot| slot.number == number && slot.is_live())
    }

    /// A live, unfrozen instance of `number` exists.
    pub fn has_active_instance(&self, number: u16) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.number == number && slot.is_live() && slot.freeze_count == 0)
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_live()).count()
    }
}
