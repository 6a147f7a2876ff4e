use crate::{
    error::{ClassMapError, Result},
    traits::MaskExtractor,
    types::{ClassCode, ClassGrid},
};

/// Boolean raster with the same dimensions as the grid it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMask {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl ClassMask {
    /// All-false mask
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    /// Mask of the cells holding `class_code`
    pub fn from_grid(grid: &ClassGrid, class_code: ClassCode) -> Self {
        let bits = grid.cells().iter().map(|&code| code == class_code).collect();
        Self {
            width: grid.width(),
            height: grid.height(),
            bits,
        }
    }

    /// Mask from nested rows; rows shorter than the first are padded with `false`.
    pub fn from_rows(rows: &[Vec<bool>]) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut mask = Self::new(width, height);
        for (row, values) in rows.iter().enumerate() {
            for (col, &value) in values.iter().enumerate().take(width) {
                mask.set(col, row, value);
            }
        }
        mask
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn get(&self, col: usize, row: usize) -> bool {
        col < self.width && row < self.height && self.bits[row * self.width + col]
    }

    /// Signed lookup, `false` outside the mask.
    pub fn get_signed(&self, col: isize, row: isize) -> bool {
        col >= 0 && row >= 0 && self.get(col as usize, row as usize)
    }

    pub fn set(&mut self, col: usize, row: usize, value: bool) {
        if col < self.width && row < self.height {
            self.bits[row * self.width + col] = value;
        }
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&bit| bit).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|&bit| bit)
    }

    pub(crate) fn bits(&self) -> &[bool] {
        &self.bits
    }
}

/// Equality test against a single class code.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualityMaskExtractor;

impl MaskExtractor for EqualityMaskExtractor {
    fn extract_into(&self, grid: &ClassGrid, class_code: ClassCode, mask: &mut ClassMask) -> Result<()> {
        if grid.dimensions() != mask.dimensions() {
            return Err(ClassMapError::DimensionMismatch {
                expected: grid.dimensions(),
                actual: mask.dimensions(),
            });
        }
        for (bit, &code) in mask.bits.iter_mut().zip(grid.cells()) {
            *bit = code == class_code;
        }
        Ok(())
    }
}
