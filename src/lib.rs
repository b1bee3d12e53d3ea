//! GPU-style glyph particles arranged in a rotating spiral.
//!
//! Particle state lives in a pair of float textures. Each frame a physics
//! pass advances every record, new particles are emitted into row-wrapped
//! regions of the input texture, and the latest state is drawn as
//! additive-blended point sprites textured from a glyph atlas.

pub mod atlas;
pub mod backend;
pub mod config;
pub mod emission;
pub mod frame;
pub mod grid;
pub mod logging;
pub mod simulation;
pub mod spiral;
pub mod stepper;
pub mod timing;
