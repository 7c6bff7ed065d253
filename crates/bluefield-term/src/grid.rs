// SPDX-License-Identifier: MIT
//
// Grid — a fixed-size, 1-indexed 2D array with a fill value.
//
// Both axes count from 1, matching the terminal's own coordinates, so a
// cell at `(y, x)` in a grid is the cell the terminal addresses with
// `CSI y ; x H`. Storage is a flat row-major `Vec<T>`: a row is a
// contiguous slice and the differ scans it left to right.
//
// Two access disciplines:
//
//   - Direct access (`Index`, `set`, `row`) treats an out-of-range
//     coordinate as a programming error and panics.
//   - Tolerant access (`get`, `get_or`) returns `None` or the supplied
//     default, so callers can probe neighbours of edge cells freely.
//
// The dimensions are fixed at construction. The only other way to shape a
// grid is `from_rows`, which infers them from externally supplied data.

use std::ops::{Index, IndexMut};

use crate::error::{Error, Result};

/// A `height × width` grid addressed as `(y, x)`, both 1-indexed.
///
/// # Examples
///
/// ```
/// use bluefield_term::grid::Grid;
///
/// let mut grid = Grid::new(2, 3, 0u8);
/// grid.set(2, 3, 7);
/// assert_eq!(grid[(2, 3)], 7);
/// assert_eq!(grid.get(3, 1), None);
/// assert_eq!(*grid.get_or(0, 0, &9), 9);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    height: u16,
    width: u16,
    fill: T,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Create a grid with every cell set to `fill`.
    #[must_use]
    pub fn new(height: u16, width: u16, fill: T) -> Self {
        let size = usize::from(height) * usize::from(width);
        Self {
            height,
            width,
            cells: vec![fill.clone(); size],
            fill,
        }
    }

    /// Build a grid from row data, inferring the dimensions from it.
    ///
    /// `fill` is the value [`reset`](Self::reset) restores; the supplied
    /// rows are kept as the initial contents.
    ///
    /// # Errors
    ///
    /// [`Error::RaggedRows`] if the rows differ in length,
    /// [`Error::TooLarge`] if either dimension exceeds `u16::MAX`.
    pub fn from_rows(rows: Vec<Vec<T>>, fill: T) -> Result<Self> {
        let expected = rows.first().map_or(0, Vec::len);
        let (Ok(height), Ok(width)) = (u16::try_from(rows.len()), u16::try_from(expected)) else {
            return Err(Error::TooLarge {
                rows: rows.len(),
                cols: expected,
            });
        };

        let mut cells = Vec::with_capacity(rows.len() * expected);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != expected {
                return Err(Error::RaggedRows {
                    row: i + 1,
                    expected,
                    found: row.len(),
                });
            }
            cells.extend(row);
        }

        Ok(Self {
            height,
            width,
            fill,
            cells,
        })
    }

    /// Refill every cell with the fill value.
    pub fn reset(&mut self) {
        self.cells.fill(self.fill.clone());
    }

    /// Overwrite one cell.
    ///
    /// # Panics
    ///
    /// Panics if `(y, x)` is outside `[1..=height] × [1..=width]`.
    #[inline]
    pub fn set(&mut self, y: u16, x: u16, value: T) {
        self[(y, x)] = value;
    }

    /// Copy every cell from `other`, reusing this grid's allocation.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions differ.
    pub fn copy_from(&mut self, other: &Self) {
        assert!(
            self.height == other.height && self.width == other.width,
            "grid copy between {}x{} and {}x{}",
            other.height,
            other.width,
            self.height,
            self.width,
        );
        self.cells.clone_from_slice(&other.cells);
    }
}

impl<T> Grid<T> {
    /// Number of rows.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Number of columns.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// The value [`reset`](Grid::reset) writes.
    #[inline]
    #[must_use]
    pub const fn fill(&self) -> &T {
        &self.fill
    }

    /// Whether `(y, x)` addresses a cell.
    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, y: u16, x: u16) -> bool {
        y >= 1 && x >= 1 && y <= self.height && x <= self.width
    }

    #[inline]
    const fn offset(&self, y: u16, x: u16) -> usize {
        (y as usize - 1) * self.width as usize + (x as usize - 1)
    }

    /// The cell at `(y, x)`, or `None` outside the grid.
    #[inline]
    #[must_use]
    pub fn get(&self, y: u16, x: u16) -> Option<&T> {
        if self.in_bounds(y, x) {
            Some(&self.cells[self.offset(y, x)])
        } else {
            None
        }
    }

    /// The cell at `(y, x)`, or `default` outside the grid.
    #[inline]
    #[must_use]
    pub fn get_or<'a>(&'a self, y: u16, x: u16, default: &'a T) -> &'a T {
        self.get(y, x).unwrap_or(default)
    }

    /// Row `y` as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `y` is outside `[1..=height]`.
    #[must_use]
    pub fn row(&self, y: u16) -> &[T] {
        assert!(
            y >= 1 && y <= self.height,
            "row {y} outside 1..={}",
            self.height
        );
        let start = self.offset(y, 1);
        &self.cells[start..start + usize::from(self.width)]
    }

    /// Iterate rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // max(1) keeps chunks() happy for zero-width grids, which have no cells anyway.
        self.cells.chunks(usize::from(self.width).max(1))
    }

    /// The raw row-major cell slice.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    #[track_caller]
    fn check(&self, y: u16, x: u16) {
        assert!(
            self.in_bounds(y, x),
            "cell ({y}, {x}) outside 1..={} x 1..={}",
            self.height,
            self.width
        );
    }
}

impl<T> Index<(u16, u16)> for Grid<T> {
    type Output = T;

    #[track_caller]
    fn index(&self, (y, x): (u16, u16)) -> &T {
        self.check(y, x);
        &self.cells[self.offset(y, x)]
    }
}

impl<T> IndexMut<(u16, u16)> for Grid<T> {
    #[track_caller]
    fn index_mut(&mut self, (y, x): (u16, u16)) -> &mut T {
        self.check(y, x);
        let idx = self.offset(y, x);
        &mut self.cells[idx]
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
