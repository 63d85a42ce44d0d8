use serde::{Deserialize, Serialize};

/// A cell of the toroidal lattice. Always stored normalized, `x < width` and `y < height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    #[inline(always)]
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Wraps arbitrary (possibly negative) coordinates onto a `width` x `height` torus.
#[inline(always)]
pub fn wrap(x: i64, y: i64, width: u32, height: u32) -> Position {
    Position {
        x: x.rem_euclid(width as i64) as u32,
        y: y.rem_euclid(height as i64) as u32,
    }
}

// Shortest distance between two coordinates on a ring of length `len`
#[inline(always)]
fn ring_distance(a: u32, b: u32, len: u32) -> u32 {
    let d = a.abs_diff(b);
    d.min(len - d)
}

/// Manhattan distance on the torus, taking the shorter way around on each axis.
#[inline(always)]
pub fn torus_manhattan(a: Position, b: Position, width: u32, height: u32) -> u32 {
    ring_distance(a.x, b.x, width) + ring_distance(a.y, b.y, height)
}
