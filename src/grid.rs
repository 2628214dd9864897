//! Uniform spatial grid over the XZ plane for broad-phase neighbour queries.
//!
//! Each cell holds the indices of the particles registered in it. A particle
//! lives in its primary cell and, when it sits within the overlap margin of
//! the cell's far edges, also in the right, down and diagonal neighbours.
//! With `overlap >= 2 * radius` and `cell_size >= overlap`, two particles
//! closer than `2 * radius` always share at least one cell, so a particle
//! only ever needs to look at the cells it is registered in.
//!
//! ```text
//!        cx        cx+1
//!   +---------+---------+
//!   |      :##|         |   ## = overlap band of cell (cx, cy):
//!   |      :##|  right  |        particles here also join cx+1
//! cy|......:##|         |
//!   |#########|#########|
//!   +---------+---------+
//!   |  down   |  diag   |
//! ```
//!
//! Positions outside the grid extent map to no cell at all. Such particles
//! neither find nor are found as neighbours.

use crate::config::GridConfig;
use crate::error::SwarmError;
use crate::Vec3;

/// Largest supported number of cells per axis.
pub const MAX_GRID_WIDTH: u32 = 2048;

/// Cells per axis for a box of `half_extent` covered with `config`.
///
/// `floor(2 * half_extent / cell_size) + 2`, rejected when it is not finite
/// or exceeds [`MAX_GRID_WIDTH`].
pub fn grid_width(half_extent: f32, config: &GridConfig) -> Result<u32, SwarmError> {
    let width = ((half_extent * 2.0) / config.cell_size).floor() + 2.0;
    if !(width.is_finite() && width >= 2.0 && width <= MAX_GRID_WIDTH as f32) {
        return Err(SwarmError::GridTooLarge {
            width,
            max: MAX_GRID_WIDTH,
        });
    }
    Ok(width as u32)
}

/// Ordered list of up to four cell indices: primary, right, down, diagonal.
///
/// Stack allocated. Unused slots stay zeroed so two lists compare equal
/// exactly when they hold the same cells in the same order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellList {
    cells: [u32; 4],
    len: u8,
}

impl CellList {
    /// An empty list (position outside the grid).
    pub const EMPTY: CellList = CellList {
        cells: [0; 4],
        len: 0,
    };

    #[inline]
    fn push(&mut self, cell: u32) {
        self.cells[self.len as usize] = cell;
        self.len += 1;
    }

    /// The cells as a slice, primary first.
    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.cells[..self.len as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The primary cell, if the position is inside the grid.
    #[inline]
    pub fn primary(&self) -> Option<u32> {
        self.as_slice().first().copied()
    }

    #[inline]
    pub fn contains(&self, cell: u32) -> bool {
        self.as_slice().contains(&cell)
    }
}

impl<'a> IntoIterator for &'a CellList {
    type Item = &'a u32;
    type IntoIter = std::slice::Iter<'a, u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

/// Uniform grid of particle index sets.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    overlap: f32,
    /// World coordinate of the grid's minimum corner on both axes.
    origin: f32,
    /// Cells per axis.
    width: u32,
    /// Sorted member indices per cell, indexed by `cx * width + cy`.
    cells: Vec<Vec<u32>>,
}

impl SpatialGrid {
    /// Create an empty grid covering a box of `half_extent` plus a one unit
    /// margin on every side.
    pub fn new(half_extent: f32, config: GridConfig) -> Result<Self, SwarmError> {
        let width = grid_width(half_extent, &config)?;
        let cell_count = (width as usize)
            .checked_mul(width as usize)
            .ok_or(SwarmError::GridTooLarge {
                width: width as f32,
                max: MAX_GRID_WIDTH,
            })?;
        Ok(Self {
            cell_size: config.cell_size,
            overlap: config.overlap,
            origin: -(half_extent + 1.0),
            width,
            cells: vec![Vec::new(); cell_count],
        })
    }

    /// Cells per axis.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Total number of cells.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn overlap(&self) -> f32 {
        self.overlap
    }

    /// Covered range on both X and Z, as `(min, max)`.
    pub fn extent(&self) -> (f32, f32) {
        (self.origin, self.origin + self.width as f32 * self.cell_size)
    }

    /// Flat index of cell `(cx, cy)`.
    #[inline]
    pub fn cell_index(&self, cx: u32, cy: u32) -> u32 {
        cx * self.width + cy
    }

    /// Cell coordinates and the offset inside the cell along one axis.
    ///
    /// `None` outside the grid, including for non-finite input.
    #[inline]
    fn axis(&self, v: f32) -> Option<(u32, f32)> {
        let rel = v - self.origin;
        let c = (rel / self.cell_size).floor();
        if !(c >= 0.0 && c < self.width as f32) {
            return None;
        }
        let c = c as u32;
        Some((c, rel - c as f32 * self.cell_size))
    }

    /// Cells a particle at world `(x, z)` belongs to.
    pub fn cells_for(&self, x: f32, z: f32) -> CellList {
        let (Some((cx, local_x)), Some((cy, local_y))) = (self.axis(x), self.axis(z)) else {
            return CellList::EMPTY;
        };

        let mut out = CellList::default();
        out.push(self.cell_index(cx, cy));

        let edge = self.cell_size - self.overlap;
        let right = local_x >= edge && cx + 1 < self.width;
        let down = local_y >= edge && cy + 1 < self.width;

        if right {
            out.push(self.cell_index(cx + 1, cy));
        }
        if down {
            out.push(self.cell_index(cx, cy + 1));
            if right {
                out.push(self.cell_index(cx + 1, cy + 1));
            }
        }
        out
    }

    /// Cells for a world position (Y is ignored).
    #[inline]
    pub fn cells_at(&self, position: Vec3) -> CellList {
        self.cells_for(position.x, position.z)
    }

    /// Members of a cell in ascending index order.
    #[inline]
    pub fn members(&self, cell: u32) -> &[u32] {
        &self.cells[cell as usize]
    }

    #[inline]
    pub fn contains(&self, cell: u32, particle: u32) -> bool {
        self.cells[cell as usize].binary_search(&particle).is_ok()
    }

    /// Add `particle` to `cell`. Returns `false` if it was already there.
    pub fn insert(&mut self, cell: u32, particle: u32) -> bool {
        let members = &mut self.cells[cell as usize];
        match members.binary_search(&particle) {
            Ok(_) => false,
            Err(at) => {
                members.insert(at, particle);
                true
            }
        }
    }

    /// Remove `particle` from `cell`. Returns `false` if it was not there.
    pub fn remove(&mut self, cell: u32, particle: u32) -> bool {
        let members = &mut self.cells[cell as usize];
        match members.binary_search(&particle) {
            Ok(at) => {
                members.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    /// Insert `particle` into every cell of `cells`.
    pub fn register(&mut self, particle: u32, cells: &CellList) {
        for &cell in cells {
            self.insert(cell, particle);
        }
    }

    /// Remove `particle` from every cell of `cells`.
    pub fn unregister(&mut self, particle: u32, cells: &CellList) {
        for &cell in cells {
            self.remove(cell, particle);
        }
    }

    /// Move `particle` from `old` to `new` if the two lists differ.
    ///
    /// Lists are compared element-wise in order, not as sets. Returns
    /// whether membership was touched.
    pub fn relocate(&mut self, particle: u32, old: &CellList, new: &CellList) -> bool {
        if old == new {
            return false;
        }
        self.unregister(particle, old);
        self.register(particle, new);
        true
    }

    /// Empty every cell.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    /// Rebuild membership from scratch.
    pub fn rebuild(&mut self, positions: &[Vec3]) {
        self.clear();
        for (i, &p) in positions.iter().enumerate() {
            let cells = self.cells_at(p);
            self.register(i as u32, &cells);
        }
    }
}

/// Reusable visited set for deduplicating neighbour candidates.
///
/// A candidate can be a member of several of the queried cells. Instead of
/// clearing a set for every query, each query bumps an epoch and marks
/// visited indices with it.
#[derive(Clone, Debug, Default)]
pub struct NeighborScratch {
    stamps: Vec<u32>,
    epoch: u32,
}

impl NeighborScratch {
    pub fn new(particle_count: usize) -> Self {
        Self {
            stamps: vec![0; particle_count],
            epoch: 0,
        }
    }

    /// Start a new query. Everything visited before is forgotten.
    pub fn begin(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            self.stamps.fill(0);
            self.epoch = 1;
        }
    }

    /// Mark `index` visited. Returns `true` the first time in this query.
    #[inline]
    pub fn visit(&mut self, index: u32) -> bool {
        let stamp = &mut self.stamps[index as usize];
        if *stamp == self.epoch {
            false
        } else {
            *stamp = self.epoch;
            true
        }
    }
}
