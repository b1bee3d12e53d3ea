use {super::Chunk, crate::grid::ParticleGrid};

/// Split `count` contiguous slots starting at linear index `start` into
/// row-bounded chunks.
///
/// A run which crosses the right edge of the grid is truncated at the edge
/// and continues at column 0 of the next row. The row index wraps past the
/// bottom of the grid back to the top. The loop runs at most
/// `ceil((x + count) / side)` times.
pub fn split_span(grid: &ParticleGrid, start: u32, count: u32) -> Vec<Chunk> {
    let side = grid.side();
    let first = grid.linear_to_coord(start % grid.capacity());
    let mut chunks = Vec::with_capacity(
        ((first.x as u64 + count as u64).div_ceil(side as u64)) as usize,
    );

    let (mut x, mut y) = (first.x, first.y);
    let mut remaining = count;
    while remaining > 0 {
        let len = remaining.min(side - x);
        chunks.push(Chunk { x, y, len });
        remaining -= len;
        x = 0;
        y = (y + 1) % side;
    }
    chunks
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq, proptest::prelude::*};

    fn grid() -> ParticleGrid {
        ParticleGrid::with_capacity(16).unwrap()
    }

    #[test]
    fn a_span_inside_one_row_is_one_chunk() {
        assert_eq!(
            split_span(&grid(), 5, 3),
            vec![Chunk { x: 1, y: 1, len: 3 }]
        );
    }

    #[test]
    fn a_span_crossing_the_edge_continues_on_the_next_row() {
        assert_eq!(
            split_span(&grid(), 6, 4),
            vec![Chunk { x: 2, y: 1, len: 2 }, Chunk { x: 0, y: 2, len: 2 }]
        );
    }

    #[test]
    fn the_last_row_wraps_to_the_first() {
        assert_eq!(
            split_span(&grid(), 14, 7),
            vec![
                Chunk { x: 2, y: 3, len: 2 },
                Chunk { x: 0, y: 0, len: 4 },
                Chunk { x: 0, y: 1, len: 1 },
            ]
        );
    }

    #[test]
    fn an_empty_span_has_no_chunks() {
        assert!(split_span(&grid(), 3, 0).is_empty());
    }

    proptest! {
        #[test]
        fn chunks_cover_exactly_count_slots(
            start in 0u32..256,
            count in 0u32..2048,
        ) {
            let grid = ParticleGrid::with_capacity(256).unwrap();
            let chunks = split_span(&grid, start, count);
            let covered: u32 = chunks.iter().map(|chunk| chunk.len).sum();
            prop_assert_eq!(covered, count);

            let first_x = start % 16;
            prop_assert!(chunks.len() as u32 <= (first_x + count).div_ceil(16));
            for chunk in &chunks {
                prop_assert!(chunk.len > 0);
                prop_assert!(chunk.x + chunk.len <= 16);
                prop_assert!(chunk.y < 16);
            }
            for pair in chunks.windows(2) {
                prop_assert_eq!(pair[1].x, 0);
                prop_assert_eq!(pair[1].y, (pair[0].y + 1) % 16);
            }
        }
    }
}
