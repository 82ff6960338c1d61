use std::mem::swap;

use serde::Serialize;

use scumm_formats::{Point, INVALID_BOX};

use super::geometry::{closest_pt_on_box, point_in_box, quick_reject};
use super::RoomBoxes;

/// Snap distances tried in turn by [`RoomBoxes::adjust_xy_to_be_in_box`].
const ADJUST_THRESHOLDS: [i32; 3] = [30, 80, 0];

/// Outcome of a path query from one box toward a neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStep {
    /// The destination point can be walked to in a straight line.
    Reachable,
    /// Walk to this point first.
    Waypoint(Point),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdjustBoxResult {
    pub point: Point,
    pub walk_box: Option<u8>,
}

impl RoomBoxes {
    /// Neighbour to enter next on the way from `from` to `to`.
    pub fn next_box(&self, from: u8, to: u8) -> Option<u8> {
        if from == INVALID_BOX || to == INVALID_BOX {
            return None;
        }
        if from == to {
            return Some(to);
        }

        let mut rest = self.matrix().as_bytes();
        for _ in 0..from {
            let end = group_end(rest)?;
            rest = &rest[end + 1..];
        }

        let mut next = None;
        for triple in rest.chunks_exact(3) {
            if triple[0] == INVALID_BOX {
                break;
            }
            if triple[0] <= to && to <= triple[1] {
                next = Some(triple[2]);
            }
        }
        next.filter(|next| *next != INVALID_BOX)
    }

    /// Finds where the walk from `box1` into its neighbour `box2` crosses
    /// their shared edge. `box3` is the final destination box; when it equals
    /// `box2` the crossing follows the line from `pos` toward `dest`.
    pub fn find_path_towards(&self, box1: u8, box2: u8, box3: u8, pos: Point, dest: Point) -> PathStep {
        let (Some(mut b1), Some(mut b2)) = (self.coords(box1), self.coords(box2)) else {
            return PathStep::Waypoint(pos);
        };
        let toward_destination = box2 == box3;

        for _ in 0..4 {
            for _ in 0..4 {
                if b1.ul.x == b1.ur.x && b1.ul.x == b2.ul.x && b1.ul.x == b2.ur.x {
                    let (flip1, flip2) = (b1.ul.y > b1.ur.y, b2.ul.y > b2.ur.y);
                    if flip1 {
                        swap(&mut b1.ul.y, &mut b1.ur.y);
                    }
                    if flip2 {
                        swap(&mut b2.ul.y, &mut b2.ur.y);
                    }
                    if edges_disjoint(b1.ul.y, b1.ur.y, b2.ul.y, b2.ur.y) {
                        if flip1 {
                            swap(&mut b1.ul.y, &mut b1.ur.y);
                        }
                        if flip2 {
                            swap(&mut b2.ul.y, &mut b2.ur.y);
                        }
                    } else {
                        let mut target = pos.y;
                        if toward_destination {
                            let diff_x = dest.x - pos.x;
                            let diff_y = (dest.y - pos.y) * (b1.ul.x - pos.x);
                            if diff_x != 0 {
                                let mut t = diff_y / diff_x;
                                if t == 0 && (diff_y <= 0 || diff_x <= 0) && (diff_y >= 0 || diff_x >= 0) {
                                    t = -1;
                                }
                                target = pos.y + t;
                            }
                        }
                        let q = clamp_loose(clamp_loose(target, b2.ul.y, b2.ur.y), b1.ul.y, b1.ur.y);
                        if q == target && toward_destination {
                            return PathStep::Reachable;
                        }
                        return PathStep::Waypoint(Point::new(b1.ul.x, q));
                    }
                }

                if b1.ul.y == b1.ur.y && b1.ul.y == b2.ul.y && b1.ul.y == b2.ur.y {
                    let (flip1, flip2) = (b1.ul.x > b1.ur.x, b2.ul.x > b2.ur.x);
                    if flip1 {
                        swap(&mut b1.ul.x, &mut b1.ur.x);
                    }
                    if flip2 {
                        swap(&mut b2.ul.x, &mut b2.ur.x);
                    }
                    if edges_disjoint(b1.ul.x, b1.ur.x, b2.ul.x, b2.ur.x) {
                        if flip1 {
                            swap(&mut b1.ul.x, &mut b1.ur.x);
                        }
                        if flip2 {
                            swap(&mut b2.ul.x, &mut b2.ur.x);
                        }
                    } else {
                        let mut target = pos.x;
                        if toward_destination {
                            let diff_y = dest.y - pos.y;
                            if diff_y != 0 {
                                target += (dest.x - pos.x) * (b1.ul.y - pos.y) / diff_y;
                            }
                        }
                        let q = clamp_loose(clamp_loose(target, b2.ul.x, b2.ur.x), b1.ul.x, b1.ur.x);
                        if q == target && toward_destination {
                            return PathStep::Reachable;
                        }
                        return PathStep::Waypoint(Point::new(q, b1.ul.y));
                    }
                }

                b1.rotate();
            }
            b2.rotate();
        }

        // No shared edge: head for the nearest point of the neighbour.
        PathStep::Waypoint(closest_pt_on_box(&b2, pos).0)
    }

    /// Moves a point into the walkable area. Boxes are scanned from last to
    /// first with growing snap distances; a containing box wins immediately.
    pub fn adjust_xy_to_be_in_box(&self, p: Point) -> AdjustBoxResult {
        let mut result = AdjustBoxResult {
            point: p,
            walk_box: None,
        };
        let first = usize::from(self.first_walk_box);
        if self.len() <= first {
            return result;
        }

        for threshold in ADJUST_THRESHOLDS {
            let mut best_dist = i64::MAX;
            let mut best_box = None;
            for index in (first..self.len()).rev() {
                let Ok(id) = u8::try_from(index) else {
                    continue;
                };
                let Some(record) = self.get(id) else {
                    continue;
                };
                if record.flags.invisible() {
                    continue;
                }
                if threshold > 0 && quick_reject(&record.coords, p, threshold) {
                    continue;
                }
                if point_in_box(&record.coords, p) {
                    return AdjustBoxResult {
                        point: p,
                        walk_box: Some(id),
                    };
                }
                let (closest, dist) = closest_pt_on_box(&record.coords, p);
                if dist < best_dist {
                    result.point = closest;
                    if dist == 0 {
                        result.walk_box = Some(id);
                        return result;
                    }
                    best_dist = dist;
                    best_box = Some(id);
                }
            }
            let limit = i64::from(threshold) * i64::from(threshold);
            if threshold == 0 || limit >= best_dist {
                result.walk_box = best_box;
                return result;
            }
        }
        result
    }
}

/// Index of the group terminator that closes the first group in `bytes`.
fn group_end(bytes: &[u8]) -> Option<usize> {
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == INVALID_BOX {
            return Some(index);
        }
        index += 3;
    }
    None
}

/// Two collinear edges do not overlap, or merely touch at one end.
fn edges_disjoint(lo1: i32, hi1: i32, lo2: i32, hi2: i32) -> bool {
    lo1 > hi2 || lo2 > hi1 || ((hi1 == lo2 || hi2 == lo1) && lo1 != hi1 && lo2 != hi2)
}

/// Clamp that tolerates `lo > hi`; the high bound wins.
fn clamp_loose(value: i32, lo: i32, hi: i32) -> i32 {
    value.max(lo).min(hi)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::corridor;
    use super::*;
    use scumm_formats::{BoxCoords, BoxFlags, BoxMatrix, BoxRecord};

    #[test]
    fn next_box_routes_through_neighbour() {
        let boxes = corridor();
        assert_eq!(boxes.next_box(0, 2), Some(1));
        assert_eq!(boxes.next_box(1, 2), Some(2));
        assert_eq!(boxes.next_box(2, 0), Some(1));
        for id in 0..3 {
            assert_eq!(boxes.next_box(id, id), Some(id));
        }
    }

    #[test]
    fn next_box_rejects_invalid_and_unrouted() {
        let boxes = corridor();
        assert_eq!(boxes.next_box(INVALID_BOX, 1), None);
        assert_eq!(boxes.next_box(0, INVALID_BOX), None);
        assert_eq!(boxes.next_box(0, 9), None);
        let truncated = RoomBoxes::new(Vec::new(), BoxMatrix::from_bytes(vec![0, 0, 0, 0xFF]));
        assert_eq!(truncated.next_box(4, 0), None);
    }

    #[test]
    fn later_triples_override_earlier_ones() {
        let boxes = RoomBoxes::new(
            Vec::new(),
            BoxMatrix::from_groups([vec![(0, 5, 1), (3, 3, 2)]]),
        );
        assert_eq!(boxes.next_box(0, 3), Some(2));
        assert_eq!(boxes.next_box(0, 4), Some(1));
    }

    #[test]
    fn shared_vertical_edge_gives_waypoint() {
        let boxes = corridor();
        let step = boxes.find_path_towards(0, 1, 2, Point::new(40, 120), Point::new(200, 120));
        assert_eq!(step, PathStep::Waypoint(Point::new(80, 120)));
    }

    #[test]
    fn destination_neighbour_is_reachable_in_line() {
        let boxes = corridor();
        let step = boxes.find_path_towards(1, 2, 2, Point::new(80, 120), Point::new(200, 120));
        assert_eq!(step, PathStep::Reachable);
    }

    #[test]
    fn destination_neighbour_off_line_gives_clamped_waypoint() {
        let boxes = RoomBoxes::new(
            vec![
                BoxRecord::new(BoxCoords::rect(0, 0, 100, 100)),
                BoxRecord::new(BoxCoords::rect(100, 50, 200, 100)),
            ],
            BoxMatrix::from_groups([vec![(1, 1, 1)], vec![(0, 0, 0)]]),
        );
        // the straight line toward (150, 60) meets x = 100 at y 30, above box 1
        let step = boxes.find_path_towards(0, 1, 1, Point::new(50, 0), Point::new(150, 60));
        assert_eq!(step, PathStep::Waypoint(Point::new(100, 50)));
    }

    #[test]
    fn shared_horizontal_edge() {
        let boxes = RoomBoxes::new(
            vec![
                BoxRecord::new(BoxCoords::rect(0, 0, 100, 50)),
                BoxRecord::new(BoxCoords::rect(20, 50, 80, 100)),
            ],
            BoxMatrix::from_groups([vec![(1, 1, 1)], vec![(0, 0, 0)]]),
        );
        let toward_dest = boxes.find_path_towards(0, 1, 1, Point::new(90, 10), Point::new(50, 90));
        assert_eq!(toward_dest, PathStep::Reachable);
        // passing through box 1 on the way elsewhere keeps the actor's x
        let passing = boxes.find_path_towards(0, 1, 7, Point::new(90, 10), Point::new(50, 90));
        assert_eq!(passing, PathStep::Waypoint(Point::new(80, 50)));
    }

    #[test]
    fn disjoint_boxes_fall_back_to_closest_point() {
        let boxes = RoomBoxes::new(
            vec![
                BoxRecord::new(BoxCoords::rect(0, 0, 10, 10)),
                BoxRecord::new(BoxCoords::rect(30, 0, 40, 10)),
            ],
            BoxMatrix::default(),
        );
        let step = boxes.find_path_towards(0, 1, 1, Point::new(5, 5), Point::new(35, 5));
        assert_eq!(step, PathStep::Waypoint(Point::new(30, 5)));
    }

    #[test]
    fn adjust_keeps_contained_points() {
        let boxes = corridor();
        let result = boxes.adjust_xy_to_be_in_box(Point::new(100, 120));
        assert_eq!(result.point, Point::new(100, 120));
        assert_eq!(result.walk_box, Some(1));
    }

    #[test]
    fn adjust_prefers_later_box_on_shared_edge() {
        let boxes = corridor();
        let result = boxes.adjust_xy_to_be_in_box(Point::new(80, 120));
        assert_eq!(result.walk_box, Some(1));
    }

    #[test]
    fn adjust_snaps_nearby_points() {
        let boxes = corridor();
        let result = boxes.adjust_xy_to_be_in_box(Point::new(200, 150));
        assert_eq!(result.point, Point::new(200, 140));
        assert_eq!(result.walk_box, Some(2));
    }

    #[test]
    fn adjust_uses_last_pass_for_far_points() {
        let boxes = corridor();
        let result = boxes.adjust_xy_to_be_in_box(Point::new(120, 400));
        assert_eq!(result.point, Point::new(120, 140));
        assert_eq!(result.walk_box, Some(1));
    }

    #[test]
    fn adjust_skips_invisible_and_leading_boxes() {
        let boxes = RoomBoxes::new(
            vec![
                BoxRecord::new(BoxCoords::rect(0, 0, 50, 50)),
                BoxRecord::new(BoxCoords::rect(0, 0, 50, 50)).with_flags(BoxFlags::INVISIBLE),
                BoxRecord::new(BoxCoords::rect(60, 0, 100, 50)),
            ],
            BoxMatrix::default(),
        )
        .with_first_walk_box(1);
        let result = boxes.adjust_xy_to_be_in_box(Point::new(20, 20));
        assert_eq!(result.walk_box, Some(2));
        assert_eq!(result.point, Point::new(60, 20));
    }
}
