//! Walk boxes of the current room and the routing queries over them.

pub mod geometry;
pub mod navigator;

use log::warn;
use serde::{Deserialize, Serialize};

use scumm_formats::{
    BoxBlocks, BoxCoords, BoxFlags, BoxMatrix, BoxRecord, Point, INVALID_BOX, MAX_BOXES,
};

pub use navigator::{AdjustBoxResult, PathStep};

/// Box records and routing matrix, immutable while the room is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomBoxes {
    boxes: Vec<BoxRecord>,
    matrix: BoxMatrix,
    #[serde(default)]
    first_walk_box: u8,
}

impl RoomBoxes {
    /// Records past `MAX_BOXES` have no box id and are dropped.
    pub fn new(mut boxes: Vec<BoxRecord>, matrix: BoxMatrix) -> Self {
        if boxes.len() > MAX_BOXES {
            warn!("room has {} boxes, keeping the first {MAX_BOXES}", boxes.len());
            boxes.truncate(MAX_BOXES);
        }
        RoomBoxes {
            boxes,
            matrix,
            first_walk_box: 0,
        }
    }

    pub fn from_blocks(blocks: BoxBlocks) -> Self {
        Self::new(blocks.boxes, blocks.box_matrix)
    }

    /// Boxes below this index are never chosen when snapping points.
    pub fn with_first_walk_box(mut self, first: u8) -> Self {
        self.first_walk_box = first;
        self
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn records(&self) -> &[BoxRecord] {
        &self.boxes
    }

    pub fn matrix(&self) -> &BoxMatrix {
        &self.matrix
    }

    pub fn get(&self, id: u8) -> Option<&BoxRecord> {
        if id == INVALID_BOX {
            return None;
        }
        self.boxes.get(usize::from(id))
    }

    pub fn coords(&self, id: u8) -> Option<BoxCoords> {
        self.get(id).map(|record| record.coords)
    }

    /// Flags of a box; unknown ids have none set.
    pub fn flags(&self, id: u8) -> BoxFlags {
        self.get(id).map(|record| record.flags).unwrap_or_default()
    }

    /// Actor scale inside a box, when the box defines a fixed one.
    pub fn scale(&self, id: u8) -> Option<u8> {
        let scale = self.get(id)?.scale;
        u8::try_from(scale).ok().filter(|scale| *scale > 0)
    }

    pub fn contains(&self, id: u8, p: Point) -> bool {
        self.coords(id)
            .is_some_and(|coords| geometry::point_in_box(&coords, p))
    }
}
