//! Geometry of a 4D bilateral grid stored as a tiled 2D raster.
//!
//! Axes are, in order, spatial x, spatial y, range 1 and range 2. The range
//! axes are laid out as a tile grid: tile `(r1, r2)` holds the spatial slab
//! of those range cells, so the raster is
//! `grid_size[0] * grid_size[2]` wide and `grid_size[1] * grid_size[3]` high.

/// Number of grid axes.
pub const NUM_AXES: usize = 4;

/// Clamped bilateral grid parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridConfig {
    /// Extents of the input domain: image width, image height and the two
    /// range extents.
    pub input_size: [usize; NUM_AXES],
    /// Per-axis down sample factor, at least 1.
    pub sigma: [f32; NUM_AXES],
    /// Per-axis border cells.
    pub padding: [usize; NUM_AXES],
}

impl GridConfig {
    /// Creates a configuration, clamping `input_size` to at least 1, `sigma`
    /// to at least 1 (NaN becomes 1) and `padding` to at least 0.
    pub fn new(input_size: [usize; NUM_AXES], sigma: [f32; NUM_AXES], padding: [i32; NUM_AXES]) -> Self {
        Self {
            input_size: input_size.map(|n| n.max(1)),
            sigma: sigma.map(|s| if s >= 1.0 { s } else { 1.0 }),
            padding: padding.map(|p| p.max(0) as usize),
        }
    }
}

/// Number of cells of one grid axis.
pub fn grid_extent(input_size: usize, sigma: f32, padding: usize) -> usize {
    ((input_size.max(1) - 1) as f32 / sigma).ceil() as usize + 1 + 2 * padding
}

/// Maps pixel `index` of an axis with `len` pixels onto an input axis with
/// `input_len` positions. Pixel centers are aligned, so equal lengths give
/// the identity.
#[inline]
pub fn to_input_coord(index: usize, len: usize, input_len: usize) -> f32 {
    (index as f32 + 0.5) * input_len as f32 / len as f32 - 0.5
}

/// Nearest pixel of an axis with `target_len` pixels for pixel `index` of an
/// axis with `len` pixels.
#[inline]
pub fn rescale_index(index: usize, len: usize, target_len: usize) -> usize {
    if len == target_len {
        return index;
    }
    let scaled = ((index as f64 + 0.5) * target_len as f64 / len as f64) as usize;
    scaled.min(target_len.saturating_sub(1))
}

/// Derived sizes of a configured grid and the mappings between input
/// coordinates, grid cells and raster positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    pub config: GridConfig,
    pub grid_size: [usize; NUM_AXES],
    pub raster_width: usize,
    pub raster_height: usize,
}

impl GridLayout {
    pub fn new(config: GridConfig) -> Self {
        let grid_size = [0, 1, 2, 3]
            .map(|d| grid_extent(config.input_size[d], config.sigma[d], config.padding[d]));
        Self {
            config,
            grid_size,
            raster_width: grid_size[0] * grid_size[2],
            raster_height: grid_size[1] * grid_size[3],
        }
    }

    pub fn num_cells(&self) -> usize {
        self.raster_width * self.raster_height
    }

    /// Discrete cell of an input coordinate:
    /// `floor((coord + 0.5) / sigma) + padding`, clamped into the grid.
    #[inline]
    pub fn cell_of(&self, coord: [f32; NUM_AXES]) -> [usize; NUM_AXES] {
        let GridConfig { sigma, padding, .. } = self.config;
        [0, 1, 2, 3].map(|d| {
            let cell = ((coord[d] + 0.5) / sigma[d]).floor() + padding[d] as f32;
            (cell.max(0.0) as usize).min(self.grid_size[d] - 1)
        })
    }

    /// Raster `(row, col)` holding `cell`.
    #[inline]
    pub fn raster_of(&self, cell: [usize; NUM_AXES]) -> (usize, usize) {
        (
            cell[1] + cell[3] * self.grid_size[1],
            cell[0] + cell[2] * self.grid_size[0],
        )
    }

    /// Inverse of [`GridLayout::raster_of`].
    #[inline]
    pub fn cell_of_raster(&self, row: usize, col: usize) -> [usize; NUM_AXES] {
        [
            col % self.grid_size[0],
            row % self.grid_size[1],
            col / self.grid_size[0],
            row / self.grid_size[1],
        ]
    }

    /// Offset `(rows, cols)` in the raster between neighbor cells along `axis`.
    #[inline]
    pub fn raster_step(&self, axis: usize) -> (usize, usize) {
        match axis {
            0 => (0, 1),
            1 => (1, 0),
            2 => (0, self.grid_size[0]),
            _ => (self.grid_size[1], 0),
        }
    }
}
