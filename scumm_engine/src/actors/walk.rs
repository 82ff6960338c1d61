use scumm_formats::{Point, INVALID_BOX};

use super::direction::{angle_from_delta, normalize_angle, step_toward, INTERPOLATE};
use super::{Actor, MoveFlags, STAND_FRAME, WALK_FRAME};
use crate::boxes::geometry::{closest_pt_on_box, point_in_box};
use crate::boxes::{AdjustBoxResult, PathStep, RoomBoxes};

impl Actor {
    /// Starts walking toward `dest`, snapped into the walkable area unless the
    /// actor ignores boxes. `dir` is the facing to assume on arrival.
    pub fn start_walk(&mut self, boxes: &RoomBoxes, current_room: i32, dest: Point, dir: Option<i32>) {
        if !self.is_in_room(current_room) {
            self.pos = dest;
            if let Some(dir) = dir {
                self.set_direction(dir);
            }
            return;
        }

        let mut target = if self.ignore_boxes {
            AdjustBoxResult {
                point: dest,
                walk_box: None,
            }
        } else {
            boxes.adjust_xy_to_be_in_box(dest)
        };

        if self.ignore_boxes {
            target.walk_box = None;
            self.walk_box = INVALID_BOX;
        } else {
            if boxes.contains(self.walkdata.dest_box, target.point) {
                target.walk_box = Some(self.walkdata.dest_box);
            } else {
                target = boxes.adjust_xy_to_be_in_box(target.point);
            }
            if self.is_moving() && self.walkdata.dest_dir == dir && self.walkdata.dest == target.point {
                return;
            }
        }

        if self.pos == target.point {
            if dir != Some(self.facing) {
                self.turn_to_direction(dir);
            }
            return;
        }

        self.walkdata.dest = target.point;
        self.walkdata.dest_box = target.walk_box.unwrap_or(INVALID_BOX);
        self.walkdata.dest_dir = dir;
        self.moving = MoveFlags((self.moving.0 & MoveFlags::IN_LEG) | MoveFlags::NEW_LEG);
        self.walkdata.cur_box = self.walk_box;
    }

    /// Advances the walk by one tick.
    pub fn walk(&mut self, boxes: &RoomBoxes) {
        if !self.is_moving() {
            return;
        }

        if !self.moving.contains(MoveFlags::NEW_LEG) {
            if self.moving.contains(MoveFlags::IN_LEG) && self.walk_step(boxes) {
                return;
            }

            if self.moving.contains(MoveFlags::LAST_LEG) {
                self.stop_moving();
                self.set_box(boxes, self.walkdata.dest_box);
                self.start_anim(STAND_FRAME);
                if Some(self.target_facing) != self.walkdata.dest_dir {
                    self.turn_to_direction(self.walkdata.dest_dir);
                }
                return;
            }

            if self.moving.contains(MoveFlags::TURN) {
                let new_dir = self.update_direction(boxes, false);
                if self.facing != new_dir {
                    self.set_direction(new_dir);
                } else {
                    self.stop_moving();
                }
                return;
            }

            self.set_box(boxes, self.walkdata.cur_box);
            self.moving = MoveFlags(self.moving.0 & MoveFlags::IN_LEG);
        }

        self.moving.remove(MoveFlags::NEW_LEG);
        // A consistent matrix needs at most one hop per box.
        for _ in 0..=boxes.len() {
            if self.walk_box == INVALID_BOX {
                let dest_box = self.walkdata.dest_box;
                self.set_box(boxes, dest_box);
                self.walkdata.cur_box = dest_box;
                break;
            }
            if self.walk_box == self.walkdata.dest_box {
                break;
            }

            let Some(next_box) = boxes.next_box(self.walk_box, self.walkdata.dest_box) else {
                self.finish_inside_current_box(boxes);
                return;
            };

            if boxes.flags(next_box).locked() {
                self.stop_at_edge(boxes, next_box);
                return;
            }

            self.walkdata.cur_box = next_box;
            let step = boxes.find_path_towards(
                self.walk_box,
                next_box,
                self.walkdata.dest_box,
                self.pos,
                self.walkdata.dest,
            );
            match step {
                PathStep::Reachable => break,
                PathStep::Waypoint(point) => {
                    if self.calc_movement_factor(boxes, point) {
                        return;
                    }
                    self.set_box(boxes, next_box);
                }
            }
        }

        self.moving.insert(MoveFlags::LAST_LEG);
        let dest = self.walkdata.dest;
        self.calc_movement_factor(boxes, dest);
    }

    /// No route to the destination box: end the walk at the point of the
    /// current box nearest to the destination.
    fn finish_inside_current_box(&mut self, boxes: &RoomBoxes) {
        self.walkdata.dest_box = self.walk_box;
        if let Some(coords) = boxes.coords(self.walk_box) {
            if !point_in_box(&coords, self.walkdata.dest) {
                self.walkdata.dest = closest_pt_on_box(&coords, self.walkdata.dest).0;
            }
        }
        self.moving.insert(MoveFlags::LAST_LEG);
        let dest = self.walkdata.dest;
        self.calc_movement_factor(boxes, dest);
    }

    /// The next box is locked: walk up to the shared edge and stop there.
    fn stop_at_edge(&mut self, boxes: &RoomBoxes, locked: u8) {
        let edge = match boxes.find_path_towards(self.walk_box, locked, INVALID_BOX, self.pos, self.walkdata.dest) {
            PathStep::Waypoint(point) => point,
            PathStep::Reachable => self.pos,
        };
        self.walkdata.dest = edge;
        self.walkdata.dest_box = self.walk_box;
        self.walkdata.cur_box = self.walk_box;
        self.moving.insert(MoveFlags::LAST_LEG);
        self.calc_movement_factor(boxes, edge);
    }

    /// Plans a straight leg to `next` and takes its first step. Returns
    /// false when the actor already stands on `next` or arrived at once.
    pub(crate) fn calc_movement_factor(&mut self, boxes: &RoomBoxes, next: Point) -> bool {
        if self.pos == next {
            return false;
        }

        let diff_x = i64::from(next.x - self.pos.x);
        let diff_y = i64::from(next.y - self.pos.y);
        let speed_x = i64::from(self.speed_x) << 16;

        let mut delta_y = i64::from(self.speed_y) << 16;
        if diff_y < 0 {
            delta_y = -delta_y;
        }
        let mut delta_x = delta_y * diff_x;
        if diff_y != 0 {
            delta_x /= diff_y;
        } else {
            delta_y = 0;
        }

        if delta_x.abs() > speed_x {
            delta_x = if diff_x < 0 { -speed_x } else { speed_x };
            delta_y = delta_x * diff_y;
            if diff_x != 0 {
                delta_y /= diff_x;
            } else {
                delta_x = 0;
            }
        }

        self.walkdata.cur = self.pos;
        self.walkdata.next = next;
        self.walkdata.delta_x = ensure_progress(delta_x);
        self.walkdata.delta_y = ensure_progress(delta_y);
        self.walkdata.x_frac = 0;
        self.walkdata.y_frac = 0;
        self.target_facing = angle_from_delta(self.walkdata.delta_x, self.walkdata.delta_y);
        self.walk_step(boxes)
    }

    /// Moves one tick along the current leg without passing its end point.
    /// Returns false once the leg is complete.
    pub(crate) fn walk_step(&mut self, boxes: &RoomBoxes) -> bool {
        self.need_redraw = true;

        let next_facing = self.update_direction(boxes, true);
        if !self.moving.contains(MoveFlags::IN_LEG) || self.facing != next_facing {
            if self.frame != WALK_FRAME || self.facing != next_facing {
                self.set_direction(next_facing);
                self.start_anim(WALK_FRAME);
            }
            self.moving.insert(MoveFlags::IN_LEG);
        }

        let cur_box = self.walkdata.cur_box;
        if self.walk_box != cur_box && boxes.contains(cur_box, self.pos) {
            self.set_box(boxes, cur_box);
        }

        let WalkLeg { cur, next } = self.leg();
        let dist_x = (next.x - cur.x).abs();
        let dist_y = (next.y - cur.y).abs();
        if (self.pos.x - cur.x).abs() >= dist_x && (self.pos.y - cur.y).abs() >= dist_y {
            self.moving.remove(MoveFlags::IN_LEG);
            return false;
        }

        let (x, x_frac) = advance(self.pos.x, self.walkdata.x_frac, self.walkdata.delta_x, self.scale_x);
        let (y, y_frac) = advance(self.pos.y, self.walkdata.y_frac, self.walkdata.delta_y, self.scale_y);
        self.pos = Point::new(x, y);
        self.walkdata.x_frac = x_frac;
        self.walkdata.y_frac = y_frac;

        if (self.pos.x - cur.x).abs() > dist_x {
            self.pos.x = next.x;
        }
        if (self.pos.y - cur.y).abs() > dist_y {
            self.pos.y = next.y;
        }

        if self.pos == next {
            self.moving.remove(MoveFlags::IN_LEG);
            return false;
        }
        true
    }

    fn leg(&self) -> WalkLeg {
        WalkLeg {
            cur: self.walkdata.cur,
            next: self.walkdata.next,
        }
    }

    /// Facing to use this tick, one turn step at a time.
    pub(crate) fn update_direction(&self, boxes: &RoomBoxes, is_walking: bool) -> i32 {
        let dir = self.remap_direction(boxes, self.target_facing, is_walking);
        if dir & INTERPOLATE != 0 {
            step_toward(false, self.facing, dir & (INTERPOLATE - 1))
        } else {
            dir
        }
    }

    /// Applies the flip and facing-lock bits of the current box.
    fn remap_direction(&self, boxes: &RoomBoxes, dir: i32, is_walking: bool) -> i32 {
        if self.ignore_boxes {
            return normalize_angle(dir) | INTERPOLATE;
        }

        let flags = boxes.flags(self.walk_box);
        let mut dir = dir;
        let mut flip_x = self.walkdata.delta_x > 0;
        let mut flip_y = self.walkdata.delta_y > 0;
        if flags.x_flip() {
            dir = 360 - dir;
            flip_x = !flip_x;
        }
        if flags.y_flip() {
            dir = 180 - dir;
            flip_y = !flip_y;
        }

        match flags.facing_lock() {
            1 if is_walking => {
                if flip_x {
                    90
                } else {
                    270
                }
            }
            1 => {
                if dir == 90 {
                    90
                } else {
                    270
                }
            }
            2 if is_walking => {
                if flip_y {
                    180
                } else {
                    0
                }
            }
            2 => {
                if dir == 0 {
                    0
                } else {
                    180
                }
            }
            3 => 270,
            4 => 90,
            5 => 0,
            6 => 180,
            _ => normalize_angle(dir) | INTERPOLATE,
        }
    }
}

struct WalkLeg {
    cur: Point,
    next: Point,
}

/// A non-zero factor always moves at least one scaled unit per tick.
fn ensure_progress(factor: i64) -> i32 {
    let factor = factor.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    if factor != 0 && factor.abs() < 256 {
        256 * factor.signum()
    } else {
        factor
    }
}

/// One 16.16 integration step on a single axis.
fn advance(pos: i32, frac: u16, delta: i32, scale: u8) -> (i32, u16) {
    let tmp = (i64::from(pos) << 16) + i64::from(frac) + i64::from(delta >> 8) * i64::from(scale);
    ((tmp >> 16) as i32, tmp as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::fixtures::corridor;
    use scumm_formats::{BoxCoords, BoxFlags, BoxMatrix, BoxRecord};

    fn placed(boxes: &RoomBoxes, x: i32, y: i32) -> Actor {
        let mut actor = Actor::new(1, 8, 2);
        actor.put(boxes, 1, Point::new(x, y), 1);
        actor
    }

    fn walk_until_stopped(actor: &mut Actor, boxes: &RoomBoxes) -> usize {
        for tick in 1..=500 {
            actor.walk(boxes);
            if !actor.is_moving() {
                return tick;
            }
        }
        panic!("actor still moving after 500 ticks: {:?}", actor.moving);
    }

    #[test]
    fn movement_factor_scales_dominant_axis() {
        let boxes = corridor();
        let mut actor = placed(&boxes, 10, 110);
        assert!(actor.calc_movement_factor(&boxes, Point::new(70, 130)));
        assert_eq!(actor.walkdata.delta_x, 6 << 16);
        assert_eq!(actor.walkdata.delta_y, 2 << 16);
        assert_eq!(actor.target_facing, 90);

        let mut actor = placed(&boxes, 10, 110);
        assert!(actor.calc_movement_factor(&boxes, Point::new(70, 113)));
        assert_eq!(actor.walkdata.delta_x, 8 << 16);
        assert_eq!(actor.walkdata.delta_y, (8 << 16) * 3 / 60);
    }

    #[test]
    fn vertical_leg_uses_y_speed() {
        let boxes = corridor();
        let mut actor = placed(&boxes, 40, 101);
        assert!(actor.calc_movement_factor(&boxes, Point::new(40, 139)));
        assert_eq!(actor.walkdata.delta_x, 0);
        assert_eq!(actor.walkdata.delta_y, 2 << 16);
        assert_eq!(actor.target_facing, 180);
    }

    #[test]
    fn tiny_factors_still_progress() {
        assert_eq!(ensure_progress(100), 256);
        assert_eq!(ensure_progress(-3), -256);
        assert_eq!(ensure_progress(0), 0);
        assert_eq!(ensure_progress(70_000), 70_000);
    }

    #[test]
    fn advance_carries_fraction() {
        let (pos, frac) = advance(10, 0, 1 << 15, 255);
        assert_eq!(pos, 10);
        let (pos, _) = advance(pos, frac, 1 << 15, 255);
        assert_eq!(pos, 10);
        let (pos, _) = advance(10, 0xFFFF, 1 << 16, 255);
        assert_eq!(pos, 11);
        let (pos, _) = advance(10, 0, -(1 << 16), 255);
        assert_eq!(pos, 9);
    }

    #[test]
    fn walk_inside_one_box_arrives_exactly() {
        let boxes = corridor();
        let mut actor = placed(&boxes, 10, 110);
        actor.start_walk(&boxes, 1, Point::new(70, 130), None);
        walk_until_stopped(&mut actor, &boxes);
        assert_eq!(actor.pos, Point::new(70, 130));
        assert_eq!(actor.current_box(), Some(0));
        assert_eq!(actor.frame, STAND_FRAME);
    }

    #[test]
    fn walk_to_own_position_only_turns() {
        let boxes = corridor();
        let mut actor = placed(&boxes, 40, 120);
        actor.start_walk(&boxes, 1, Point::new(40, 120), Some(90));
        assert_eq!(actor.moving.0, MoveFlags::TURN);
        walk_until_stopped(&mut actor, &boxes);
        assert_eq!(actor.facing, 90);
        assert_eq!(actor.pos, Point::new(40, 120));
    }

    #[test]
    fn repeated_start_is_ignored_while_walking() {
        let boxes = corridor();
        let mut actor = placed(&boxes, 10, 120);
        actor.start_walk(&boxes, 1, Point::new(70, 120), None);
        actor.walk(&boxes);
        let before = actor.clone();
        actor.start_walk(&boxes, 1, Point::new(70, 120), None);
        assert_eq!(actor, before);
    }

    #[test]
    fn walking_outside_the_room_teleports() {
        let boxes = corridor();
        let mut actor = Actor::new(1, 8, 2);
        actor.room = 2;
        actor.start_walk(&boxes, 1, Point::new(200, 120), Some(270));
        assert_eq!(actor.pos, Point::new(200, 120));
        assert_eq!(actor.facing, 270);
        assert!(!actor.is_moving());
    }

    #[test]
    fn walking_outside_the_room_keeps_the_raw_destination() {
        let boxes = corridor();
        let mut actor = Actor::new(1, 8, 2);
        actor.room = 2;
        actor.start_walk(&boxes, 1, Point::new(120, 20), None);
        assert_eq!(actor.pos, Point::new(120, 20));
        assert!(!actor.is_moving());
    }

    #[test]
    fn unrouted_destination_stops_at_nearest_point() {
        let boxes = RoomBoxes::new(
            vec![
                BoxRecord::new(BoxCoords::rect(0, 0, 50, 50)),
                BoxRecord::new(BoxCoords::rect(100, 0, 150, 50)),
            ],
            BoxMatrix::from_groups([vec![(0, 0, 0)], vec![(1, 1, 1)]]),
        );
        let mut actor = placed(&boxes, 10, 25);
        actor.start_walk(&boxes, 1, Point::new(120, 25), None);
        walk_until_stopped(&mut actor, &boxes);
        assert_eq!(actor.pos, Point::new(50, 25));
        assert_eq!(actor.current_box(), Some(0));
    }

    #[test]
    fn locked_neighbour_stops_walk_on_the_edge() {
        let mut boxes = corridor().records().to_vec();
        boxes[1] = boxes[1].with_flags(BoxFlags::LOCKED);
        let boxes = RoomBoxes::new(boxes, corridor().matrix().clone());
        let mut actor = placed(&boxes, 40, 120);
        actor.start_walk(&boxes, 1, Point::new(200, 120), None);
        walk_until_stopped(&mut actor, &boxes);
        assert_eq!(actor.pos, Point::new(80, 120));
        assert_eq!(actor.current_box(), Some(0));
    }

    #[test]
    fn facing_lock_pins_walking_direction() {
        let boxes = RoomBoxes::new(
            vec![BoxRecord::new(BoxCoords::rect(0, 0, 200, 200)).with_flags(4)],
            BoxMatrix::from_groups([vec![(0, 0, 0)]]),
        );
        let mut actor = placed(&boxes, 100, 100);
        actor.start_walk(&boxes, 1, Point::new(20, 100), None);
        actor.walk(&boxes);
        assert_eq!(actor.facing, 90);
    }

    #[test]
    fn x_flip_box_mirrors_facing() {
        let boxes = RoomBoxes::new(
            vec![BoxRecord::new(BoxCoords::rect(0, 0, 200, 200)).with_flags(BoxFlags::X_FLIP)],
            BoxMatrix::from_groups([vec![(0, 0, 0)]]),
        );
        let mut actor = placed(&boxes, 100, 100);
        actor.facing = 270;
        actor.start_walk(&boxes, 1, Point::new(180, 100), None);
        actor.walk(&boxes);
        // heading right (90) is mirrored to 270, which the actor already faces
        assert_eq!(actor.facing, 270);
        assert!(actor.pos.x > 100);
    }
}
