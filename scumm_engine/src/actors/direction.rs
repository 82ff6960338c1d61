//! Facing angles. Angles are degrees clockwise from "away from the camera":
//! 0 faces up the screen, 90 right, 180 toward the viewer, 270 left.

/// Or-ed into a remapped direction when turning should step gradually.
pub const INTERPOLATE: i32 = 1024;

const FOUR_WAY_BOUNDS: [i32; 4] = [71, 109, 251, 289];
const EIGHT_WAY_BOUNDS: [i32; 8] = [22, 72, 107, 157, 202, 252, 287, 337];

/// Bucket index of an angle: 0..4 for four-way, 0..8 for eight-way.
pub fn to_simple_dir(eight_way: bool, dir: i32) -> i32 {
    let bounds: &[i32] = if eight_way {
        &EIGHT_WAY_BOUNDS
    } else {
        &FOUR_WAY_BOUNDS
    };
    bounds
        .windows(2)
        .position(|pair| dir >= pair[0] && dir <= pair[1])
        .map_or(0, |index| index as i32 + 1)
}

pub fn from_simple_dir(eight_way: bool, dir: i32) -> i32 {
    if eight_way {
        dir * 45
    } else {
        dir * 90
    }
}

/// Wraps into 0..360 and snaps to the nearest multiple of 45.
pub fn normalize_angle(angle: i32) -> i32 {
    to_simple_dir(true, angle.rem_euclid(360)) * 45
}

/// Cardinal facing for a movement delta, favouring the vertical axis.
pub fn angle_from_delta(x: i32, y: i32) -> i32 {
    if i64::from(y).abs() * 2 < i64::from(x).abs() {
        if x > 0 {
            90
        } else {
            270
        }
    } else if y > 0 {
        180
    } else {
        0
    }
}

/// Facing for a two-bit direction code: west, east, south, north.
pub fn from_old_dir(dir: i32) -> i32 {
    const FACINGS: [i32; 4] = [270, 90, 180, 0];
    FACINGS[(dir & 3) as usize]
}

pub fn to_old_dir(angle: i32) -> i32 {
    match angle.rem_euclid(360) {
        71..=109 => 1,
        110..=250 => 2,
        251..=289 => 0,
        _ => 3,
    }
}

/// One bucket step from `from` toward `to`, turning the shorter way round.
pub fn step_toward(eight_way: bool, from: i32, to: i32) -> i32 {
    let buckets = if eight_way { 8 } else { 4 };
    let from = to_simple_dir(eight_way, from);
    let to = to_simple_dir(eight_way, to);
    let mut diff = to - from;
    if diff.abs() > buckets >> 1 {
        diff = -diff;
    }
    let next = from + diff.signum();
    from_simple_dir(eight_way, (next + buckets) % buckets)
}
