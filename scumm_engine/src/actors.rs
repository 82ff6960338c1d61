//! Actors and their box-constrained movement.

pub mod direction;
mod walk;

use serde::Serialize;

use scumm_formats::{Point, INVALID_BOX};

use crate::boxes::RoomBoxes;

/// Per-actor movement state bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MoveFlags(pub u8);

impl MoveFlags {
    pub const NEW_LEG: u8 = 0x01;
    pub const IN_LEG: u8 = 0x02;
    pub const TURN: u8 = 0x04;
    pub const LAST_LEG: u8 = 0x08;
    pub const FROZEN: u8 = 0x80;

    pub fn contains(self, bits: u8) -> bool {
        self.0 & bits != 0
    }

    pub fn insert(&mut self, bits: u8) {
        self.0 |= bits;
    }

    pub fn remove(&mut self, bits: u8) {
        self.0 &= !bits;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

// Animation selectors handed to the renderer.
pub const INIT_FRAME: u8 = 1;
pub const WALK_FRAME: u8 = 2;
pub const STAND_FRAME: u8 = 3;

/// State of the walk currently in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalkData {
    pub dest: Point,
    pub dest_box: u8,
    pub dest_dir: Option<i32>,
    /// Start and end of the current leg.
    pub cur: Point,
    pub next: Point,
    pub cur_box: u8,
    /// Per-tick 16.16 step along each axis.
    pub delta_x: i32,
    pub delta_y: i32,
    pub x_frac: u16,
    pub y_frac: u16,
}

impl Default for WalkData {
    fn default() -> Self {
        WalkData {
            dest: Point::default(),
            dest_box: INVALID_BOX,
            dest_dir: None,
            cur: Point::default(),
            next: Point::default(),
            cur_box: INVALID_BOX,
            delta_x: 0,
            delta_y: 0,
            x_frac: 0,
            y_frac: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: i32,
    pub room: i32,
    pub pos: Point,
    pub facing: i32,
    pub target_facing: i32,
    pub moving: MoveFlags,
    pub speed_x: i32,
    pub speed_y: i32,
    pub scale_x: u8,
    pub scale_y: u8,
    pub ignore_boxes: bool,
    pub walk_box: u8,
    pub frame: u8,
    pub need_redraw: bool,
    pub walkdata: WalkData,
}

impl Actor {
    pub fn new(id: i32, speed_x: i32, speed_y: i32) -> Self {
        Actor {
            id,
            room: 0,
            pos: Point::default(),
            facing: 180,
            target_facing: 180,
            moving: MoveFlags::default(),
            speed_x,
            speed_y,
            scale_x: 255,
            scale_y: 255,
            ignore_boxes: false,
            walk_box: INVALID_BOX,
            frame: INIT_FRAME,
            need_redraw: false,
            walkdata: WalkData::default(),
        }
    }

    pub fn current_box(&self) -> Option<u8> {
        (self.walk_box != INVALID_BOX).then_some(self.walk_box)
    }

    pub fn is_moving(&self) -> bool {
        !self.moving.is_empty()
    }

    pub fn is_in_room(&self, room: i32) -> bool {
        room != 0 && self.room == room
    }

    pub fn set_direction(&mut self, direction: i32) {
        if self.facing == direction {
            return;
        }
        self.facing = direction::normalize_angle(direction);
        self.need_redraw = true;
    }

    /// Queues a gradual turn; `None` keeps the current facing.
    pub fn turn_to_direction(&mut self, direction: Option<i32>) {
        let Some(direction) = direction else {
            return;
        };
        self.moving.remove(MoveFlags::TURN);
        if direction != self.facing {
            self.moving.insert(MoveFlags::TURN);
            self.target_facing = direction;
        }
    }

    pub fn start_anim(&mut self, frame: u8) {
        self.frame = frame;
        self.need_redraw = true;
    }

    pub fn stop_moving(&mut self) {
        self.moving = MoveFlags::default();
    }

    pub fn set_box(&mut self, boxes: &RoomBoxes, id: u8) {
        self.walk_box = id;
        self.setup_scale(boxes);
    }

    fn setup_scale(&mut self, boxes: &RoomBoxes) {
        if self.ignore_boxes || boxes.flags(self.walk_box).ignore_scale() {
            return;
        }
        if let Some(scale) = boxes.scale(self.walk_box) {
            self.scale_x = scale;
            self.scale_y = scale;
        }
    }

    /// Snaps the actor into the walkable area and cancels any walk.
    pub fn adjust_pos(&mut self, boxes: &RoomBoxes) {
        let adjusted = if self.ignore_boxes {
            None
        } else {
            Some(boxes.adjust_xy_to_be_in_box(self.pos))
        };
        let walk_box = match adjusted {
            Some(result) => {
                self.pos = result.point;
                result.walk_box.unwrap_or(INVALID_BOX)
            }
            None => INVALID_BOX,
        };
        self.walkdata.dest_box = walk_box;
        self.set_box(boxes, walk_box);
        self.walkdata.dest = Point::new(-1, self.walkdata.dest.y);
        self.stop_moving();

        if boxes.flags(self.walk_box).facing_lock() != 0 {
            self.turn_to_direction(Some(self.facing));
        }
    }

    pub fn put(&mut self, boxes: &RoomBoxes, current_room: i32, pos: Point, room: i32) {
        self.pos = pos;
        self.room = room;
        self.need_redraw = true;
        if self.is_in_room(current_room) {
            if self.is_moving() {
                self.stop_moving();
                self.start_anim(STAND_FRAME);
            }
            self.adjust_pos(boxes);
        }
    }

    pub fn set_ignore_boxes(&mut self, boxes: &RoomBoxes, current_room: i32, ignore: bool) {
        self.ignore_boxes = ignore;
        if ignore {
            self.walk_box = INVALID_BOX;
        }
        if self.is_in_room(current_room) {
            self.put(boxes, current_room, self.pos, self.room);
        }
    }

    /// New speeds take effect on the leg in progress.
    pub fn set_walk_speed(&mut self, boxes: &RoomBoxes, speed_x: i32, speed_y: i32) {
        if speed_x == self.speed_x && speed_y == self.speed_y {
            return;
        }
        self.speed_x = speed_x;
        self.speed_y = speed_y;
        if self.is_moving() {
            let next = self.walkdata.next;
            self.calc_movement_factor(boxes, next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::fixtures::corridor;

    #[test]
    fn new_actor_faces_the_viewer() {
        let actor = Actor::new(1, 8, 2);
        assert_eq!(actor.facing, 180);
        assert_eq!(actor.frame, INIT_FRAME);
        assert_eq!(actor.current_box(), None);
        assert!(!actor.is_moving());
    }

    #[test]
    fn put_in_current_room_snaps_into_box() {
        let boxes = corridor();
        let mut actor = Actor::new(1, 8, 2);
        actor.put(&boxes, 1, Point::new(40, 150), 1);
        assert_eq!(actor.pos, Point::new(40, 140));
        assert_eq!(actor.current_box(), Some(0));
    }

    #[test]
    fn put_elsewhere_leaves_position_alone() {
        let boxes = corridor();
        let mut actor = Actor::new(1, 8, 2);
        actor.put(&boxes, 1, Point::new(40, 150), 2);
        assert_eq!(actor.pos, Point::new(40, 150));
        assert_eq!(actor.current_box(), None);
    }

    #[test]
    fn turn_to_same_direction_is_not_queued() {
        let mut actor = Actor::new(1, 8, 2);
        actor.turn_to_direction(Some(180));
        assert!(!actor.moving.contains(MoveFlags::TURN));
        actor.turn_to_direction(Some(90));
        assert!(actor.moving.contains(MoveFlags::TURN));
        assert_eq!(actor.target_facing, 90);
    }

    #[test]
    fn ignoring_boxes_drops_walk_box() {
        let boxes = corridor();
        let mut actor = Actor::new(1, 8, 2);
        actor.put(&boxes, 1, Point::new(40, 120), 1);
        actor.set_ignore_boxes(&boxes, 1, true);
        assert_eq!(actor.current_box(), None);
        actor.set_ignore_boxes(&boxes, 1, false);
        assert_eq!(actor.current_box(), Some(0));
    }
}
