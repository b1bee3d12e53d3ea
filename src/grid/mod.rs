mod particle;

use thiserror::Error;

pub use self::particle::{Particle, DataLocation, NO_GLYPH};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("The particle grid capacity must be greater than zero")]
    Empty,

    #[error(
        "The particle grid capacity {} is not a perfect square and cannot be laid out as a square texture",
        .0
    )]
    NotASquare(u32),
}

/// The 2D texel coordinate of a single particle record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TexelCoord {
    pub x: u32,
    pub y: u32,
}

/// A fixed-size square grid which maps linear particle indices onto the
/// texels of the simulation state textures.
///
/// Every part of the system which reads or writes particle state (emission
/// writes and the render pass's per-vertex data locations) goes through
/// [ParticleGrid::linear_to_coord], so the two can never disagree about
/// where a particle lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParticleGrid {
    side: u32,
}

impl ParticleGrid {
    /// Build a grid which holds exactly `capacity` particles.
    ///
    /// # Params
    ///
    /// * `capacity` - the total number of particles. Must be a non-zero
    ///   perfect square.
    pub fn with_capacity(capacity: u32) -> Result<Self, GridError> {
        if capacity == 0 {
            return Err(GridError::Empty);
        }
        let side = integer_sqrt(capacity);
        if side * side != capacity {
            return Err(GridError::NotASquare(capacity));
        }
        Ok(Self { side })
    }

    /// The width and height of the grid in texels.
    pub fn side(&self) -> u32 {
        self.side
    }

    /// The total number of particle records the grid can hold.
    pub fn capacity(&self) -> u32 {
        self.side * self.side
    }

    /// Map a linear particle index to its texel coordinate.
    ///
    /// `index` is expected to be in `[0, capacity)`.
    pub fn linear_to_coord(&self, index: u32) -> TexelCoord {
        debug_assert!(index < self.capacity());
        TexelCoord {
            x: index % self.side,
            y: index / self.side,
        }
    }

    /// The per-vertex data consumed by the render pass: one texel coordinate
    /// for every particle, in linear index order.
    pub fn data_locations(&self) -> Vec<DataLocation> {
        (0..self.capacity())
            .map(|index| {
                let coord = self.linear_to_coord(index);
                DataLocation {
                    texel: [coord.x as f32, coord.y as f32],
                }
            })
            .collect()
    }
}

/// Floor of the square root, computed without going through floating point
/// so large capacities don't round the wrong way.
fn integer_sqrt(value: u32) -> u32 {
    let mut root = (value as f64).sqrt() as u32;
    while (root as u64) * (root as u64) > value as u64 {
        root -= 1;
    }
    while ((root + 1) as u64) * ((root + 1) as u64) <= value as u64 {
        root += 1;
    }
    root
}

#[cfg(test)]
mod test {
    use {super::*, proptest::prelude::*};

    #[test]
    fn default_capacity_is_a_256_texel_square() {
        let grid = ParticleGrid::with_capacity(65536).unwrap();
        assert_eq!(grid.side(), 256);
        assert_eq!(grid.capacity(), 65536);
    }

    #[test]
    fn rejects_capacities_which_are_not_squares() {
        assert_eq!(
            ParticleGrid::with_capacity(65535),
            Err(GridError::NotASquare(65535))
        );
        assert_eq!(ParticleGrid::with_capacity(0), Err(GridError::Empty));
    }

    #[test]
    fn integer_sqrt_handles_the_top_of_the_range() {
        assert_eq!(integer_sqrt(u32::MAX), 65535);
        assert_eq!(integer_sqrt(1), 1);
        assert_eq!(integer_sqrt(15), 3);
        assert_eq!(integer_sqrt(16), 4);
    }

    #[test]
    fn data_locations_follow_the_addressing_function() {
        let grid = ParticleGrid::with_capacity(16).unwrap();
        let locations = grid.data_locations();
        assert_eq!(locations.len(), 16);
        assert_eq!(locations[0].texel, [0.0, 0.0]);
        assert_eq!(locations[5].texel, [1.0, 1.0]);
        assert_eq!(locations[15].texel, [3.0, 3.0]);
    }

    proptest! {
        #[test]
        fn every_index_maps_inside_the_grid(index in 0u32..65536) {
            let grid = ParticleGrid::with_capacity(65536).unwrap();
            let coord = grid.linear_to_coord(index);
            prop_assert_eq!(coord.x, index % 256);
            prop_assert_eq!(coord.y, index / 256);
            prop_assert!(coord.x < grid.side());
            prop_assert!(coord.y < grid.side());
        }
    }
}
