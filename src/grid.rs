//! The synthetic location grid and its partition-tiled index projection.
//!
//! Locations form a `width × height` grid split into rectangular tiles, one
//! tile per location partition. Global location indices run through each
//! tile in row-major order before moving to the next tile, so a partition
//! owns one contiguous index block. The projection between `(x, y)`
//! coordinates and global indices is exact in both directions.

use crate::error::NososError;
use crate::rng::SimRng;
use crate::Id;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationGrid {
    pub width: i64,
    pub height: i64,
    pub tile_width: i64,
    pub tile_height: i64,
    pub partition_cols: i64,
    pub partition_rows: i64,
}

impl LocationGrid {
    pub fn new(
        width: i64,
        height: i64,
        partition_cols: i64,
        partition_rows: i64,
    ) -> Result<LocationGrid, NososError> {
        if width <= 0 || height <= 0 || partition_cols <= 0 || partition_rows <= 0 {
            return Err(NososError::Config(format!(
                "location grid {width}x{height} over {partition_cols}x{partition_rows} partitions \
                 must have positive dimensions"
            )));
        }
        if width % partition_cols != 0 || height % partition_rows != 0 {
            return Err(NososError::Config(format!(
                "location grid {width}x{height} does not tile into \
                 {partition_cols}x{partition_rows} partitions"
            )));
        }
        Ok(LocationGrid {
            width,
            height,
            tile_width: width / partition_cols,
            tile_height: height / partition_rows,
            partition_cols,
            partition_rows,
        })
    }

    #[must_use]
    pub fn num_locations(&self) -> u64 {
        (self.width * self.height) as u64
    }

    #[must_use]
    pub fn locations_per_tile(&self) -> i64 {
        self.tile_width * self.tile_height
    }

    /// Manhattan radius of the grid, the largest hop budget that can be
    /// spent from any cell.
    #[must_use]
    pub fn manhattan_radius(&self) -> i64 {
        self.width + self.height - 2
    }

    /// Global index of the location at `(x, y)`, running through the owning
    /// tile first.
    #[must_use]
    pub fn index_of(&self, x: i64, y: i64) -> Id {
        debug_assert!(self.contains(x, y));
        let tile_x = x / self.tile_width;
        let tile_y = y / self.tile_height;
        let index = (x % self.tile_width)
            + (y % self.tile_height) * self.tile_width
            + tile_x * self.locations_per_tile()
            + tile_y * self.partition_cols * self.locations_per_tile();
        index as Id
    }

    /// Inverse of [`index_of`](Self::index_of).
    #[must_use]
    pub fn coords_of(&self, index: Id) -> (i64, i64) {
        let index = index as i64;
        let tile = index / self.locations_per_tile();
        let within = index % self.locations_per_tile();
        let tile_x = tile % self.partition_cols;
        let tile_y = tile / self.partition_cols;
        (
            tile_x * self.tile_width + within % self.tile_width,
            tile_y * self.tile_height + within / self.tile_width,
        )
    }

    #[must_use]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        (0..self.width).contains(&x) && (0..self.height).contains(&y)
    }

    /// Top-left corner of the tile owned by `location_partition`.
    #[must_use]
    pub fn tile_origin(&self, location_partition: usize) -> (i64, i64) {
        let partition = location_partition as i64;
        (
            (partition % self.partition_cols) * self.tile_width,
            (partition / self.partition_cols) * self.tile_height,
        )
    }

    /// Splits a hop budget into grid offsets from `(home_x, home_y)`: a
    /// uniform draw over the reachable X range, with the remainder spent in
    /// Y in a uniformly chosen direction. Clamping keeps the destination on
    /// the grid even from a corner.
    #[must_use]
    pub fn random_offsets(
        &self,
        home_x: i64,
        home_y: i64,
        hops: i64,
        rng: &mut SimRng,
    ) -> (i64, i64) {
        if hops == 0 {
            return (0, 0);
        }
        let max_negative_x = hops.min(home_x);
        let max_positive_x = hops.min(self.width - 1 - home_x);
        let offset_x = rng.random_range(-max_negative_x..=max_positive_x);
        let remaining = hops - offset_x.abs();
        let offset_y = if remaining == 0 {
            0
        } else if rng.random_bool(0.5) {
            remaining.min(self.height - 1 - home_y)
        } else {
            -remaining.min(home_y)
        };
        (offset_x, offset_y)
    }
}
