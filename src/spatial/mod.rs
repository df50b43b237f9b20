use std::collections::HashMap;

use crate::types::Vec2;

/// Uniform grid broad phase for circles. A circle is filed under every cell
/// its bounding box touches, so a query only has to look at its own cells.
#[derive(Debug)]
pub struct SpatialHash {
    cell_size: f32,
    cells: HashMap<(i32, i32), Vec<usize>>,
}

impl SpatialHash {
    pub fn new(cell_size: f32) -> Self {
        assert!(
            cell_size.is_finite() && cell_size > 0.0,
            "cell_size must be positive and finite"
        );
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    pub fn rebuild<I>(&mut self, circles: I)
    where
        I: IntoIterator<Item = (Vec2, f32)>,
    {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        for (idx, (pos, radius)) in circles.into_iter().enumerate() {
            let (min, max) = self.cell_span(pos, radius);
            for cy in min.1..=max.1 {
                for cx in min.0..=max.0 {
                    self.cells.entry((cx, cy)).or_default().push(idx);
                }
            }
        }
    }

    /// Indices of circles whose cells overlap the circle at `pos`. Sorted and
    /// free of duplicates; may include the querying circle itself.
    pub fn query(&self, pos: Vec2, radius: f32, out: &mut Vec<usize>) {
        out.clear();
        let (min, max) = self.cell_span(pos, radius);
        for cy in min.1..=max.1 {
            for cx in min.0..=max.0 {
                if let Some(indices) = self.cells.get(&(cx, cy)) {
                    out.extend_from_slice(indices);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
    }

    fn cell_span(&self, pos: Vec2, radius: f32) -> ((i32, i32), (i32, i32)) {
        let r = radius.max(0.0);
        (
            self.cell_key(Vec2::new(pos.x - r, pos.y - r)),
            self.cell_key(Vec2::new(pos.x + r, pos.y + r)),
        )
    }

    fn cell_key(&self, pos: Vec2) -> (i32, i32) {
        let cx = (pos.x / self.cell_size).floor() as i32;
        let cy = (pos.y / self.cell_size).floor() as i32;
        (cx, cy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod spatial_hash_new {
        use super::*;

        #[test]
        #[should_panic(expected = "cell_size must be positive and finite")]
        fn panics_with_zero_cell_size() {
            SpatialHash::new(0.0);
        }

        #[test]
        #[should_panic(expected = "cell_size must be positive and finite")]
        fn panics_with_nan_cell_size() {
            SpatialHash::new(f32::NAN);
        }
    }

    mod spatial_hash_rebuild {
        use super::*;

        #[test]
        fn circle_spanning_cells_is_filed_in_each() {
            let mut hash = SpatialHash::new(10.0);
            hash.rebuild([(Vec2::new(10.0, 10.0), 2.0)]);
            for key in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                assert_eq!(hash.cells.get(&key).map(Vec::len), Some(1), "cell {key:?}");
            }
        }

        #[test]
        fn rebuild_forgets_previous_circles() {
            let mut hash = SpatialHash::new(10.0);
            hash.rebuild([(Vec2::new(5.0, 5.0), 1.0)]);
            hash.rebuild([(Vec2::new(55.0, 55.0), 1.0)]);
            let mut out = Vec::new();
            hash.query(Vec2::new(5.0, 5.0), 1.0, &mut out);
            assert!(out.is_empty());
        }
    }

    mod spatial_hash_query {
        use super::*;

        #[test]
        fn finds_overlapping_neighbour_once() {
            let mut hash = SpatialHash::new(10.0);
            hash.rebuild([
                (Vec2::new(9.0, 9.0), 4.0),
                (Vec2::new(14.0, 9.0), 4.0),
                (Vec2::new(80.0, 80.0), 4.0),
            ]);
            let mut out = Vec::new();
            hash.query(Vec2::new(9.0, 9.0), 4.0, &mut out);
            assert_eq!(out, vec![0, 1]);
        }

        #[test]
        fn negative_coordinates_are_indexed() {
            let mut hash = SpatialHash::new(10.0);
            hash.rebuild([(Vec2::new(-15.0, -5.0), 1.0)]);
            let mut out = Vec::new();
            hash.query(Vec2::new(-14.0, -6.0), 1.0, &mut out);
            assert_eq!(out, vec![0]);
        }
    }
}
