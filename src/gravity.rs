//! Barrier-aware gravity and refill.
//!
//! Each column is split into open segments bounded by frozen cells or the grid
//! edges. Survivors in a segment are packed to its bottom in their original
//! order and the remaining top slots get fresh items. Frozen cells never move.

use crate::grid::{Grid, Pos};
use crate::item::{Item, ItemFactory};

/// Where an item that ended up at `Fall::to_row` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallOrigin {
    /// Survivor that moved down within its segment.
    Row(usize),
    /// Freshly created at the top of its segment.
    Spawned,
}

/// One item movement produced by gravity, recorded while packing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fall {
    pub col: usize,
    pub origin: FallOrigin,
    pub to_row: usize,
    /// Rows travelled. Spawned items count from just above the segment top,
    /// stacked in the order they appear.
    pub distance: usize,
    pub item: Item,
}

impl Fall {
    /// Row the animation starts from; negative or barrier-overlapping for spawned items.
    pub fn start_row(&self) -> isize {
        self.to_row as isize - self.distance as isize
    }
}

impl Grid {
    /// Compact every column and refill gaps. Returns every item that moved or spawned.
    pub fn apply_gravity(&mut self, factory: &mut ItemFactory, active: usize) -> Vec<Fall> {
        let mut falls = Vec::new();
        for col in 0..self.cols {
            // `end` is the exclusive bottom of the current open segment.
            let mut end = self.rows;
            while end > 0 {
                let mut start = end;
                while start > 0 && !self.is_frozen(Pos::new(col, start - 1)) {
                    start -= 1;
                }
                self.settle_segment(col, start, end, factory, active, &mut falls);
                // Skip the barrier at `start - 1` (or stop at the top edge).
                end = start.saturating_sub(1);
            }
        }
        falls
    }

    /// Pack rows `start..end` of `col` to the bottom and fill the top.
    fn settle_segment(
        &mut self,
        col: usize,
        start: usize,
        end: usize,
        factory: &mut ItemFactory,
        active: usize,
        falls: &mut Vec<Fall>,
    ) {
        let survivors: Vec<(usize, Item)> = (start..end)
            .rev()
            .filter_map(|row| self.take(Pos::new(col, row)).map(|item| (row, item)))
            .collect();

        let mut write = end;
        for (from_row, item) in survivors {
            write -= 1;
            self.set(Pos::new(col, write), Some(item));
            if from_row != write {
                falls.push(Fall {
                    col,
                    origin: FallOrigin::Row(from_row),
                    to_row: write,
                    distance: write - from_row,
                    item,
                });
            }
        }

        let spawned = write - start;
        for row in (start..write).rev() {
            let item = factory.create_item(active);
            self.set(Pos::new(col, row), Some(item));
            falls.push(Fall {
                col,
                origin: FallOrigin::Spawned,
                to_row: row,
                distance: spawned,
                item,
            });
        }
    }
}
