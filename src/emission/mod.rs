//! Writing new particles into the state texture.
//!
//! Emission never rewrites the whole texture. Each call plans the
//! row-bounded chunks its particles land in, uploads each chunk as a
//! partial-region write, and advances a rolling cursor.

mod scheduler;
mod split;

use crate::{backend::TexelRegion, grid::Particle};

pub use self::{scheduler::EmissionScheduler, split::split_span};

/// A row-bounded run of `len` texels starting at `(x, y)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub x: u32,
    pub y: u32,
    pub len: u32,
}

impl Chunk {
    /// The chunk as a one-texel-high region.
    pub fn region(&self) -> TexelRegion {
        TexelRegion {
            x: self.x,
            y: self.y,
            width: self.len,
            height: 1,
        }
    }
}

/// The parameters of one emission call.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EmitRequest<'glyphs> {
    /// How many particles to write.
    pub count: u32,

    /// The spiral radius for every particle in this call.
    pub radius: f32,

    /// The point size for every particle in this call.
    pub point_size: f32,

    /// Glyph indices, cycled across the emitted particles. May be empty.
    pub glyphs: &'glyphs [i32],

    /// Added to every particle's phase.
    pub phase_offset: f32,
}

/// The chunks and records for one emission call, before anything is
/// written.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionPlan {
    pub chunks: Vec<Chunk>,

    /// One record per emitted particle in emission order. Chunk `n` takes
    /// the `chunks[n].len` records following those of the chunks before it.
    pub records: Vec<Particle>,
}

/// What an emission call did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EmissionReport {
    pub start_cursor: u32,
    pub end_cursor: u32,
    pub chunk_count: usize,
    pub record_count: usize,
}
