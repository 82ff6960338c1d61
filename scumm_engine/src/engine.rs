use log::{debug, trace, warn};
use serde::Serialize;

use scumm_formats::Point;

use crate::actors::direction::from_old_dir;
use crate::actors::Actor;
use crate::boxes::RoomBoxes;
use crate::bytecode::ScriptCursor;
use crate::config::EngineConfig;
use crate::cutscenes::CutsceneStack;
use crate::error::{VmError, VmResult};
use crate::library::ScriptLibrary;
use crate::opcodes::anim;
use crate::scheduler::ScriptScheduler;
use crate::sentence::SentenceQueue;
use crate::vars::{VariableStore, VAR_CAMERA_POS_X, VAR_ROOM, VAR_TIMER};

/// Pixels the camera moves per tick while panning.
pub const CAMERA_STEP: i32 = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Camera {
    pub cur_x: i32,
    pub dest_x: i32,
}

impl Camera {
    /// Panning is tracked in 8-pixel strips.
    pub fn is_settled(&self) -> bool {
        self.cur_x.div_euclid(CAMERA_STEP) == self.dest_x.div_euclid(CAMERA_STEP)
    }

    fn step(&mut self) {
        let diff = self.dest_x - self.cur_x;
        self.cur_x += diff.clamp(-CAMERA_STEP, CAMERA_STEP);
    }
}

/// Owns every arena the VM touches. Sub-systems live in sibling modules as
/// further `impl Engine` blocks.
#[derive(Debug)]
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) vars: VariableStore,
    pub(crate) scheduler: ScriptScheduler,
    pub(crate) library: ScriptLibrary,
    /// Instruction cursor of the current slot.
    pub(crate) cursor: ScriptCursor,
    pub(crate) cutscenes: CutsceneStack,
    pub(crate) sentences: SentenceQueue,
    pub(crate) actors: Vec<Actor>,
    pub(crate) boxes: RoomBoxes,
    pub(crate) camera: Camera,
    pub(crate) room: i32,
    pub(crate) ticks: u64,
    events: Vec<String>,
}

impl Engine {
    pub fn new(config: EngineConfig, library: ScriptLibrary) -> Self {
        let actors = (0..config.num_actors)
            .map(|id| Actor::new(id as i32, config.walk_speed_x, config.walk_speed_y))
            .collect();
        Engine {
            vars: VariableStore::new(&config),
            scheduler: ScriptScheduler::new(config.num_script_slots),
            library,
            cursor: ScriptCursor::default(),
            cutscenes: CutsceneStack::new(),
            sentences: SentenceQueue::new(),
            actors,
            boxes: RoomBoxes::default(),
            camera: Camera::default(),
            room: 0,
            ticks: 0,
            events: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn vars(&self) -> &VariableStore {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VariableStore {
        &mut self.vars
    }

    pub fn scheduler(&self) -> &ScriptScheduler {
        &self.scheduler
    }

    pub fn library_mut(&mut self) -> &mut ScriptLibrary {
        &mut self.library
    }

    pub fn cutscenes(&self) -> &CutsceneStack {
        &self.cutscenes
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn room(&self) -> i32 {
        self.room
    }

    pub fn boxes(&self) -> &RoomBoxes {
        &self.boxes
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<String> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn log_event(&mut self, event: impl Into<String>) {
        let event = event.into();
        debug!("{event}");
        self.events.push(event);
    }

    /// Enters `room` with its walk boxes; actors already placed there are
    /// snapped into the new boxes.
    pub fn set_room(&mut self, room: i32, boxes: RoomBoxes) {
        self.boxes = boxes.with_first_walk_box(self.config.first_walk_box);
        self.room = room;
        self.vars.set_global(VAR_ROOM, room);
        for actor in self.actors.iter_mut().filter(|actor| actor.is_in_room(room)) {
            actor.adjust_pos(&self.boxes);
        }
        self.log_event(format!("room.enter {room} ({} boxes)", self.boxes.len()));
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn actor(&self, id: i32) -> VmResult<&Actor> {
        let index = self.actor_index(id)?;
        Ok(&self.actors[index])
    }

    fn actor_index(&self, id: i32) -> VmResult<usize> {
        usize::try_from(id)
            .ok()
            .filter(|index| *index > 0 && *index < self.actors.len())
            .ok_or(VmError::UnknownActor(id))
    }

    /// The actor together with the boxes it moves through.
    fn actor_in_room(&mut self, id: i32) -> VmResult<(&mut Actor, &RoomBoxes, i32)> {
        let index = self.actor_index(id)?;
        Ok((&mut self.actors[index], &self.boxes, self.room))
    }

    pub fn put_actor(&mut self, id: i32, pos: Point, room: i32) -> VmResult<()> {
        let (actor, boxes, current_room) = self.actor_in_room(id)?;
        actor.put(boxes, current_room, pos, room);
        let box_id = actor.walk_box;
        self.log_event(format!(
            "actor.put {id} ({}, {}) room {room} box {box_id}",
            pos.x, pos.y
        ));
        Ok(())
    }

    pub fn start_walk_actor(&mut self, id: i32, dest: Point, dir: Option<i32>) -> VmResult<()> {
        let (actor, boxes, current_room) = self.actor_in_room(id)?;
        actor.start_walk(boxes, current_room, dest, dir);
        let target = actor.walkdata.dest;
        self.log_event(format!(
            "walk.start actor {id} -> ({}, {})",
            target.x, target.y
        ));
        Ok(())
    }

    pub fn set_actor_walk_speed(&mut self, id: i32, speed_x: i32, speed_y: i32) -> VmResult<()> {
        let (actor, boxes, _) = self.actor_in_room(id)?;
        actor.set_walk_speed(boxes, speed_x.max(1), speed_y.max(1));
        Ok(())
    }

    pub fn set_actor_ignore_boxes(&mut self, id: i32, ignore: bool) -> VmResult<()> {
        let (actor, boxes, current_room) = self.actor_in_room(id)?;
        actor.set_ignore_boxes(boxes, current_room, ignore);
        Ok(())
    }

    pub fn turn_actor_to(&mut self, id: i32, direction: i32) -> VmResult<()> {
        let (actor, _, _) = self.actor_in_room(id)?;
        actor.turn_to_direction(Some(direction));
        Ok(())
    }

    pub fn stop_actor_moving(&mut self, id: i32) -> VmResult<()> {
        let (actor, _, _) = self.actor_in_room(id)?;
        actor.stop_moving();
        Ok(())
    }

    /// Plays `anim` on the actor. The reserved codes in `opcodes::anim` turn
    /// it, set its facing at once or halt its walk instead.
    pub fn animate_actor(&mut self, id: i32, anim: i32) -> VmResult<()> {
        let facing = from_old_dir(anim);
        if (anim::STOP..anim::STOP + 4).contains(&anim) {
            return self.stop_actor_moving(id);
        }
        if (anim::TURN..anim::FACE).contains(&anim) {
            return self.turn_actor_to(id, facing);
        }
        let (actor, _, _) = self.actor_in_room(id)?;
        if (anim::FACE..anim::STOP).contains(&anim) {
            actor.set_direction(facing);
        } else if let Ok(frame) = u8::try_from(anim) {
            actor.start_anim(frame);
        } else {
            warn!("actor {id}: animation {anim} out of range");
        }
        Ok(())
    }

    /// Advances every moving actor of the current room by one step.
    pub fn walk_actors(&mut self) {
        let mut events = Vec::new();
        for actor in self.actors.iter_mut().filter(|actor| actor.is_in_room(self.room)) {
            if !actor.is_moving() {
                continue;
            }
            let leg = (actor.walkdata.cur, actor.walkdata.next);
            let walk_box = actor.walk_box;
            actor.walk(&self.boxes);
            trace!(
                "actor {} at ({}, {}) moving 0x{:02X}",
                actor.id,
                actor.pos.x,
                actor.pos.y,
                actor.moving.0
            );

            let next = actor.walkdata.next;
            if (actor.walkdata.cur, next) != leg {
                events.push(format!("walk.leg actor {} -> ({}, {})", actor.id, next.x, next.y));
            }
            if actor.walk_box != walk_box {
                events.push(format!("walk.box actor {} box {}", actor.id, actor.walk_box));
            }
            if !actor.is_moving() {
                events.push(format!(
                    "walk.done actor {} at ({}, {}) box {}",
                    actor.id, actor.pos.x, actor.pos.y, actor.walk_box
                ));
            }
        }
        for event in events {
            self.log_event(event);
        }
    }

    pub fn pan_camera_to(&mut self, x: i32) {
        self.camera.dest_x = x;
    }

    pub fn set_camera_at(&mut self, x: i32) {
        self.camera = Camera { cur_x: x, dest_x: x };
        self.vars.set_global(VAR_CAMERA_POS_X, x);
    }

    fn move_camera(&mut self) {
        if self.camera.cur_x != self.camera.dest_x {
            self.camera.step();
            self.vars.set_global(VAR_CAMERA_POS_X, self.camera.cur_x);
        }
    }

    /// One game tick.
    pub fn tick(&mut self) -> VmResult<()> {
        self.scheduler.decrease_delays(1);
        self.run_all_scripts()?;
        self.check_and_run_sentence_script()?;
        self.walk_actors();
        self.move_camera();
        self.ticks += 1;
        self.vars.set_global(VAR_TIMER, self.ticks as i32);
        Ok(())
    }

    pub fn stop_script(&mut self, number: u16) {
        let stopped = self.scheduler.stop_script(number);
        if self.scheduler.current().is_none() {
            self.cursor = ScriptCursor::default();
        }
        if !stopped.is_empty() {
            self.log_event(format!("script.stop {number}"));
        }
    }

    pub fn stop_object_script(&mut self, object: u16) {
        if !self.scheduler.stop_object_script(object).is_empty() {
            self.log_event(format!("object.stop {object}"));
        }
    }

    pub fn is_script_running(&self, number: u16) -> bool {
        self.scheduler.is_script_running(number)
    }

    pub fn is_script_in_use(&self, number: u16) -> bool {
        self.scheduler.is_script_in_use(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::fixtures::corridor;

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::default(), ScriptLibrary::new());
        engine.set_room(1, corridor());
        engine
    }

    #[test]
    fn camera_pans_one_strip_per_tick() {
        let mut engine = engine();
        engine.pan_camera_to(20);
        assert!(!engine.camera().is_settled());
        engine.tick().unwrap();
        assert_eq!(engine.camera().cur_x, 8);
        engine.tick().unwrap();
        engine.tick().unwrap();
        assert_eq!(engine.camera().cur_x, 20);
        assert_eq!(engine.vars().global(VAR_CAMERA_POS_X), 20);
    }

    #[test]
    fn negative_camera_positions_use_their_own_strip() {
        let camera = Camera { cur_x: -7, dest_x: 7 };
        assert!(!camera.is_settled());
        let camera = Camera { cur_x: -1, dest_x: -8 };
        assert!(camera.is_settled());
    }

    #[test]
    fn actor_zero_and_out_of_range_ids_are_unknown() {
        let engine = engine();
        assert_eq!(engine.actor(0).unwrap_err(), VmError::UnknownActor(0));
        assert_eq!(engine.actor(13).unwrap_err(), VmError::UnknownActor(13));
        assert!(engine.actor(12).is_ok());
    }

    #[test]
    fn only_actors_in_the_current_room_walk() {
        let mut engine = engine();
        engine.put_actor(1, Point::new(10, 120), 1).unwrap();
        engine.put_actor(2, Point::new(10, 120), 2).unwrap();
        engine.start_walk_actor(1, Point::new(60, 120), None).unwrap();
        engine.start_walk_actor(2, Point::new(60, 120), None).unwrap();
        engine.walk_actors();
        assert!(engine.actor(1).unwrap().pos.x > 10);
        assert_eq!(engine.actor(2).unwrap().pos, Point::new(60, 120));
    }

    #[test]
    fn tick_counts_and_records_timer() {
        let mut engine = engine();
        engine.tick().unwrap();
        engine.tick().unwrap();
        assert_eq!(engine.ticks(), 2);
        assert_eq!(engine.vars().global(VAR_TIMER), 2);
        assert_eq!(engine.vars().global(VAR_ROOM), 1);
    }
}
