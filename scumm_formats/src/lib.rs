pub mod boxes;

pub use boxes::{
    BoxBlocks, BoxCoords, BoxFlags, BoxMatrix, BoxRecord, INVALID_BOX, MAX_BOXES, Point,
    decode_boxd, decode_boxm,
};
