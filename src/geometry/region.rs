//! Loop-as-Region Adapter: makes a [`Loop`] usable by [`s2::region::RegionCoverer`].
//!
//! Covering a loop by its rectangular bound produces spurious
//! containment — a tilted or irregular polygon's bounding rectangle
//! reaches well outside the polygon itself, so the coverer hands back
//! cells that the fast cover-based filter in `FenceEngine::stubbing_query`
//! would wrongly treat as candidates. Wrapping the loop so the coverer
//! asks it directly (`ContainsCell`/`IntersectsCell`) instead of asking
//! its bounding rectangle produces a tight, polygon-shaped cover.

use s2::cap::Cap;
use s2::cell::Cell;
use s2::rect::Rect;
use s2::region::Region;

use super::Loop;

/// Wraps a borrowed [`Loop`] so the region coverer sees it as a general
/// [`Region`].
pub struct LoopRegion<'a> {
    loop_: &'a Loop,
}

impl<'a> LoopRegion<'a> {
    pub fn new(loop_: &'a Loop) -> Self {
        Self { loop_ }
    }
}

impl<'a> Region for LoopRegion<'a> {
    fn cap_bound(&self) -> Cap {
        self.loop_.cap_bound()
    }

    fn rect_bound(&self) -> Rect {
        self.loop_.rect_bound()
    }

    /// True iff all four cell vertices lie inside the loop.
    fn contains_cell(&self, cell: &Cell) -> bool {
        cell.vertices()
            .iter()
            .all(|&v| self.loop_.contains_point(v))
    }

    /// True iff any cell vertex lies inside the loop, or any loop vertex
    /// lies inside the cell. The second disjunct is required: a cell may
    /// fully contain the loop while none of the cell's own vertices fall
    /// inside it.
    fn intersects_cell(&self, cell: &Cell) -> bool {
        if cell.vertices().iter().any(|&v| self.loop_.contains_point(v)) {
            return true;
        }
        self.loop_
            .vertices()
            .iter()
            .any(|&v| cell.contains_point(&v))
    }
}
