use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

/// Sentinel used by rooms and actors for "no box".
pub const INVALID_BOX: u8 = 0xFF;

/// Box ids are bytes and `INVALID_BOX` is reserved, so a room holds at most
/// this many boxes.
pub const MAX_BOXES: usize = INVALID_BOX as usize;

const BOX_RECORD_SIZE: usize = 20;
const GROUP_TERMINATOR: u8 = 0xFF;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn sqr_dist(self, other: Point) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }
}

/// Corners of a walk box, stored clockwise starting at the upper left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxCoords {
    pub ul: Point,
    pub ur: Point,
    pub lr: Point,
    pub ll: Point,
}

impl BoxCoords {
    pub fn rect(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            ul: Point::new(left, top),
            ur: Point::new(right, top),
            lr: Point::new(right, bottom),
            ll: Point::new(left, bottom),
        }
    }

    pub fn corners(&self) -> [Point; 4] {
        [self.ul, self.ur, self.lr, self.ll]
    }

    /// Shifts every corner one position: ur becomes ul, lr becomes ur, and so on.
    pub fn rotate(&mut self) {
        let tmp = self.ul;
        self.ul = self.ur;
        self.ur = self.lr;
        self.lr = self.ll;
        self.ll = tmp;
    }
}

/// Raw box flag byte. The low three bits pin actor facing while inside the box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoxFlags(pub u8);

impl BoxFlags {
    pub const FACING_MASK: u8 = 0x07;
    pub const X_FLIP: u8 = 0x08;
    pub const Y_FLIP: u8 = 0x10;
    pub const IGNORE_SCALE: u8 = 0x20;
    pub const LOCKED: u8 = 0x40;
    pub const INVISIBLE: u8 = 0x80;

    pub fn contains(self, bits: u8) -> bool {
        self.0 & bits == bits
    }

    pub fn facing_lock(self) -> u8 {
        self.0 & Self::FACING_MASK
    }

    pub fn x_flip(self) -> bool {
        self.contains(Self::X_FLIP)
    }

    pub fn y_flip(self) -> bool {
        self.contains(Self::Y_FLIP)
    }

    pub fn ignore_scale(self) -> bool {
        self.contains(Self::IGNORE_SCALE)
    }

    pub fn locked(self) -> bool {
        self.contains(Self::LOCKED)
    }

    pub fn invisible(self) -> bool {
        self.contains(Self::INVISIBLE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxRecord {
    pub coords: BoxCoords,
    #[serde(default)]
    pub mask: u8,
    #[serde(default)]
    pub flags: BoxFlags,
    #[serde(default = "default_scale")]
    pub scale: u16,
}

fn default_scale() -> u16 {
    255
}

impl BoxRecord {
    pub fn new(coords: BoxCoords) -> Self {
        Self {
            coords,
            mask: 0,
            flags: BoxFlags::default(),
            scale: default_scale(),
        }
    }

    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = BoxFlags(flags);
        self
    }

    pub fn with_scale(mut self, scale: u16) -> Self {
        self.scale = scale;
        self
    }

    fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut corners = [Point::default(); 4];
        for corner in &mut corners {
            let x = cursor.read_i16::<LittleEndian>()?;
            let y = cursor.read_i16::<LittleEndian>()?;
            *corner = Point::new(i32::from(x), i32::from(y));
        }
        let mask = cursor.read_u8()?;
        let flags = BoxFlags(cursor.read_u8()?);
        let scale = cursor.read_u16::<LittleEndian>()?;
        Ok(BoxRecord {
            coords: BoxCoords {
                ul: corners[0],
                ur: corners[1],
                lr: corners[2],
                ll: corners[3],
            },
            mask,
            flags,
            scale,
        })
    }
}

/// Decodes a `BOXD` payload: a little-endian box count followed by fixed
/// 20-byte box records.
pub fn decode_boxd(bytes: &[u8]) -> Result<Vec<BoxRecord>> {
    let mut cursor = Cursor::new(bytes);
    let count = usize::from(
        cursor
            .read_u16::<LittleEndian>()
            .context("reading BOXD box count")?,
    );
    ensure!(
        count <= MAX_BOXES,
        "BOXD declares {count} boxes, at most {MAX_BOXES} are addressable"
    );
    let needed = 2 + count * BOX_RECORD_SIZE;
    ensure!(
        bytes.len() >= needed,
        "BOXD payload truncated: {count} boxes need {needed} bytes, found {}",
        bytes.len()
    );

    let mut boxes = Vec::with_capacity(count);
    for index in 0..count {
        let record =
            BoxRecord::read(&mut cursor).with_context(|| format!("reading box {index}"))?;
        boxes.push(record);
    }
    Ok(boxes)
}

/// Routing table of a room. Each source box owns one group of
/// `(lo, hi, next)` triples closed by `0xFF`; groups appear in box order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoxMatrix(Vec<u8>);

impl BoxMatrix {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        BoxMatrix(bytes)
    }

    /// Builds the byte stream from per-box triple lists.
    pub fn from_groups<G>(groups: G) -> Self
    where
        G: IntoIterator,
        G::Item: AsRef<[(u8, u8, u8)]>,
    {
        let mut bytes = Vec::new();
        for group in groups {
            for &(lo, hi, next) in group.as_ref() {
                bytes.extend_from_slice(&[lo, hi, next]);
            }
            bytes.push(GROUP_TERMINATOR);
        }
        BoxMatrix(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Splits the stream back into triples per source box.
    pub fn groups(&self) -> Vec<Vec<(u8, u8, u8)>> {
        let mut groups = Vec::new();
        let mut current = Vec::new();
        let mut rest = self.0.as_slice();
        while let Some((&first, tail)) = rest.split_first() {
            if first == GROUP_TERMINATOR {
                groups.push(std::mem::take(&mut current));
                rest = tail;
                continue;
            }
            if rest.len() < 3 {
                break;
            }
            current.push((rest[0], rest[1], rest[2]));
            rest = &rest[3..];
        }
        if !current.is_empty() {
            groups.push(current);
        }
        groups
    }
}

/// Validates and wraps a `BOXM` payload.
pub fn decode_boxm(bytes: &[u8]) -> Result<BoxMatrix> {
    let mut cursor = Cursor::new(bytes);
    let mut group = 0usize;
    let mut triple = [0u8; 3];
    while (cursor.position() as usize) < bytes.len() {
        let lead = bytes[cursor.position() as usize];
        if lead == GROUP_TERMINATOR {
            cursor.set_position(cursor.position() + 1);
            group += 1;
            continue;
        }
        if let Err(err) = cursor.read_exact(&mut triple) {
            bail!("BOXM group {group} ends inside a triple: {err}");
        }
        ensure!(
            triple[0] <= triple[1],
            "BOXM group {group} has inverted range {}..{}",
            triple[0],
            triple[1]
        );
    }
    Ok(BoxMatrix(bytes.to_vec()))
}

/// Decoded box blocks of one room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxBlocks {
    pub boxes: Vec<BoxRecord>,
    #[serde(default)]
    pub box_matrix: BoxMatrix,
}

impl BoxBlocks {
    /// Reads raw `BOXD` and optional `BOXM` payload files from disk.
    pub fn read_files(boxd: &Path, boxm: Option<&Path>) -> Result<Self> {
        let bytes = fs::read(boxd).with_context(|| format!("reading {}", boxd.display()))?;
        let boxes = decode_boxd(&bytes).with_context(|| format!("decoding {}", boxd.display()))?;
        let box_matrix = match boxm {
            Some(path) => {
                let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
                decode_boxm(&bytes).with_context(|| format!("decoding {}", path.display()))?
            }
            None => BoxMatrix::default(),
        };
        Ok(BoxBlocks { boxes, box_matrix })
    }
}
