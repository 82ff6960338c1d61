use proptest::prelude::*;
use scumm_engine::{Actor, RoomBoxes};
use scumm_formats::{BoxCoords, BoxMatrix, BoxRecord, Point};

fn open_floor() -> RoomBoxes {
    RoomBoxes::new(
        vec![BoxRecord::new(BoxCoords::rect(0, 0, 320, 200))],
        BoxMatrix::default(),
    )
}

fn within(value: i32, from: i32, to: i32) -> bool {
    (value - from).abs() <= (to - from).abs()
}

proptest! {
    /// Every step stays between the start and the target on both axes, and
    /// the walk ends exactly on the target.
    #[test]
    fn walk_never_overshoots(
        start_x in 1i32..320,
        start_y in 1i32..200,
        dest_x in 1i32..320,
        dest_y in 1i32..200,
        speed_x in 1i32..16,
        speed_y in 1i32..8,
    ) {
        let boxes = open_floor();
        let start = Point::new(start_x, start_y);
        let dest = Point::new(dest_x, dest_y);

        let mut actor = Actor::new(1, speed_x, speed_y);
        actor.put(&boxes, 1, start, 1);
        prop_assert_eq!(actor.pos, start);
        actor.start_walk(&boxes, 1, dest, None);

        let mut ticks = 0;
        while actor.is_moving() {
            actor.walk(&boxes);
            ticks += 1;
            prop_assert!(
                within(actor.pos.x, start.x, dest.x) && within(actor.pos.y, start.y, dest.y),
                "{:?} left the span {:?} -> {:?}", actor.pos, start, dest
            );
            prop_assert!(ticks < 5_000, "walk {:?} -> {:?} did not finish", start, dest);
        }
        prop_assert_eq!(actor.pos, dest);
        prop_assert_eq!(actor.current_box(), Some(0));
    }

    /// A leg in progress survives a speed change without overshooting.
    #[test]
    fn speed_change_mid_walk_still_arrives(
        dest_x in 1i32..320,
        dest_y in 1i32..200,
        new_speed in 1i32..24,
        after in 1usize..10,
    ) {
        let boxes = open_floor();
        let start = Point::new(160, 100);
        let dest = Point::new(dest_x, dest_y);

        let mut actor = Actor::new(1, 8, 2);
        actor.put(&boxes, 1, start, 1);
        actor.start_walk(&boxes, 1, dest, None);
        for _ in 0..after {
            actor.walk(&boxes);
        }
        actor.set_walk_speed(&boxes, new_speed, new_speed);

        let mut ticks = 0;
        while actor.is_moving() {
            actor.walk(&boxes);
            ticks += 1;
            prop_assert!(within(actor.pos.x, start.x, dest.x));
            prop_assert!(within(actor.pos.y, start.y, dest.y));
            prop_assert!(ticks < 5_000);
        }
        prop_assert_eq!(actor.pos, dest);
    }
}
