//! Integer geometry over walk-box quadrilaterals.

use scumm_formats::{BoxCoords, Point};

/// True when `p3` lies on the inner side of the oriented edge `p1 -> p2`.
pub fn compare_slope(p1: Point, p2: Point, p3: Point) -> bool {
    let lhs = i64::from(p2.y - p1.y) * i64::from(p3.x - p1.x);
    let rhs = i64::from(p3.y - p1.y) * i64::from(p2.x - p1.x);
    lhs <= rhs
}

fn all_corners(coords: &BoxCoords, test: impl Fn(Point) -> bool) -> bool {
    coords.corners().into_iter().all(test)
}

/// Point containment for a convex quad. Boxes collapsed into a line segment
/// accept points within two pixels of the segment.
pub fn point_in_box(coords: &BoxCoords, p: Point) -> bool {
    if all_corners(coords, |c| p.x < c.x)
        || all_corners(coords, |c| p.x > c.x)
        || all_corners(coords, |c| p.y < c.y)
        || all_corners(coords, |c| p.y > c.y)
    {
        return false;
    }

    let is_segment = (coords.ul == coords.ur && coords.lr == coords.ll)
        || (coords.ul == coords.ll && coords.ur == coords.lr);
    if is_segment && p.sqr_dist(closest_pt_on_line(coords.ul, coords.lr, p)) <= 4 {
        return true;
    }

    compare_slope(coords.ul, coords.ur, p)
        && compare_slope(coords.ur, coords.lr, p)
        && compare_slope(coords.lr, coords.ll, p)
        && compare_slope(coords.ll, coords.ul, p)
}

/// True when `p` is farther than `threshold` from the box on some axis.
pub fn quick_reject(coords: &BoxCoords, p: Point, threshold: i32) -> bool {
    all_corners(coords, |c| p.x - threshold > c.x)
        || all_corners(coords, |c| p.x + threshold < c.x)
        || all_corners(coords, |c| p.y - threshold > c.y)
        || all_corners(coords, |c| p.y + threshold < c.y)
}

/// Projection of `p` onto the segment `start -> end`, clamped to its ends.
/// Projection runs along the dominant axis of the segment.
pub fn closest_pt_on_line(start: Point, end: Point, p: Point) -> Point {
    let lx = i64::from(end.x - start.x);
    let ly = i64::from(end.y - start.y);
    let (sx, sy) = (i64::from(start.x), i64::from(start.y));
    let (px, py) = (i64::from(p.x), i64::from(p.y));

    let mut result = if lx == 0 {
        Point::new(start.x, p.y)
    } else if ly == 0 {
        Point::new(p.x, start.y)
    } else {
        let dist = lx * lx + ly * ly;
        if lx.abs() > ly.abs() {
            let a = sx * ly / lx;
            let b = px * lx / ly;
            let c = (a + b - sy + py) * ly * lx / dist;
            Point::new(c as i32, (c * ly / lx - a + sy) as i32)
        } else {
            let a = sy * lx / ly;
            let b = py * ly / lx;
            let c = (a + b - sx + px) * ly * lx / dist;
            Point::new((c * lx / ly - a + sx) as i32, c as i32)
        }
    };

    if ly.abs() < lx.abs() {
        if lx > 0 {
            if result.x < start.x {
                result = start;
            } else if result.x > end.x {
                result = end;
            }
        } else if result.x > start.x {
            result = start;
        } else if result.x < end.x {
            result = end;
        }
    } else if ly > 0 {
        if result.y < start.y {
            result = start;
        } else if result.y > end.y {
            result = end;
        }
    } else if result.y > start.y {
        result = start;
    } else if result.y < end.y {
        result = end;
    }
    result
}

/// Closest point on the outline of the box and its squared distance to `p`.
pub fn closest_pt_on_box(coords: &BoxCoords, p: Point) -> (Point, i64) {
    let edges = [
        (coords.ul, coords.ur),
        (coords.ur, coords.lr),
        (coords.lr, coords.ll),
        (coords.ll, coords.ul),
    ];
    let mut best = (p, i64::MAX);
    for (start, end) in edges {
        let candidate = closest_pt_on_line(start, end, p);
        let dist = p.sqr_dist(candidate);
        if dist < best.1 {
            best = (candidate, dist);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> BoxCoords {
        BoxCoords::rect(10, 10, 50, 50)
    }

    #[test]
    fn inside_edges_and_outside() {
        let coords = square();
        assert!(point_in_box(&coords, Point::new(30, 30)));
        assert!(point_in_box(&coords, Point::new(10, 10)));
        assert!(point_in_box(&coords, Point::new(50, 30)));
        assert!(!point_in_box(&coords, Point::new(51, 30)));
        assert!(!point_in_box(&coords, Point::new(30, 9)));
    }

    #[test]
    fn trapezoid_uses_slopes() {
        let coords = BoxCoords {
            ul: Point::new(20, 0),
            ur: Point::new(40, 0),
            lr: Point::new(60, 40),
            ll: Point::new(0, 40),
        };
        assert!(point_in_box(&coords, Point::new(30, 20)));
        // inside the bounding range but left of the slanted edge
        assert!(!point_in_box(&coords, Point::new(2, 2)));
    }

    #[test]
    fn line_boxes_accept_nearby_points() {
        let coords = BoxCoords {
            ul: Point::new(0, 0),
            ur: Point::new(0, 0),
            lr: Point::new(40, 0),
            ll: Point::new(40, 0),
        };
        assert!(point_in_box(&coords, Point::new(20, 0)));
        assert!(!point_in_box(&coords, Point::new(20, 3)));
    }

    #[test]
    fn projection_clamps_to_segment() {
        let start = Point::new(0, 0);
        let end = Point::new(100, 0);
        assert_eq!(closest_pt_on_line(start, end, Point::new(40, 25)), Point::new(40, 0));
        assert_eq!(closest_pt_on_line(start, end, Point::new(-30, 5)), start);
        assert_eq!(closest_pt_on_line(start, end, Point::new(130, 5)), end);

        let vertical_end = Point::new(0, 50);
        assert_eq!(closest_pt_on_line(start, vertical_end, Point::new(9, 20)), Point::new(0, 20));
        assert_eq!(closest_pt_on_line(start, vertical_end, Point::new(9, 80)), vertical_end);
    }

    #[test]
    fn diagonal_projection_stays_on_segment() {
        let start = Point::new(0, 0);
        let end = Point::new(100, 50);
        let projected = closest_pt_on_line(start, end, Point::new(50, 0));
        assert!((0..=100).contains(&projected.x));
        assert!((0..=50).contains(&projected.y));
    }

    #[test]
    fn closest_point_on_box_picks_nearest_edge() {
        let (point, dist) = closest_pt_on_box(&square(), Point::new(70, 30));
        assert_eq!(point, Point::new(50, 30));
        assert_eq!(dist, 400);
    }

    #[test]
    fn quick_reject_honours_threshold() {
        let coords = square();
        assert!(quick_reject(&coords, Point::new(100, 30), 30));
        assert!(!quick_reject(&coords, Point::new(70, 30), 30));
        assert!(quick_reject(&coords, Point::new(30, -25), 30));
    }
}
