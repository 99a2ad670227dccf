use std::fmt;

use s2::cellid::CellID;
use s2::cellunion::CellUnion;
use s2::region::RegionCoverer;

use super::{Loop, LoopRegion, MIN_LEVEL};

/// The cover produced was rejected: either it contains a cell coarser
/// than [`MIN_LEVEL`] (a degenerate/near-global cover), or covering the
/// region resolved to the wrong number of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverError {
    TooCoarse { level: u8, cell: u64 },
}

impl fmt::Display for CoverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooCoarse { level, cell } => write!(
                f,
                "cover contains cell {cell:#x} at level {level}, below the minimum viable level {MIN_LEVEL}"
            ),
        }
    }
}

impl std::error::Error for CoverError {}

/// The coverer used for import and radius queries: `{MinLevel:1,
/// MaxLevel:30, MaxCells:8}`.
pub fn default_coverer() -> RegionCoverer {
    RegionCoverer {
        min_level: 1,
        max_level: 30,
        level_mod: 1,
        max_cells: 8,
    }
}

/// The coverer used for rectangle queries: exactly one cell at the
/// coarsest level that fits the rectangle.
pub fn single_cell_coverer() -> RegionCoverer {
    RegionCoverer {
        min_level: 0,
        max_level: 30,
        level_mod: 1,
        max_cells: 1,
    }
}

/// Rejects a cover containing any cell below [`MIN_LEVEL`] *(I5)*.
pub fn validate_cover(cells: &[CellID]) -> Result<(), CoverError> {
    for &cell in cells {
        if cell.level() < MIN_LEVEL as u64 {
            return Err(CoverError::TooCoarse {
                level: cell.level() as u8,
                cell: cell.0,
            });
        }
    }
    Ok(())
}

/// Covers a loop using its [`LoopRegion`] adapter — never the loop's
/// rectangular bound, which would let the coverer return cells lying
/// entirely outside the polygon (see the module docs on `LoopRegion`).
pub fn cover_loop(loop_: &Loop, coverer: &RegionCoverer) -> CellUnion {
    let region = LoopRegion::new(loop_);
    coverer.covering(&region)
}
