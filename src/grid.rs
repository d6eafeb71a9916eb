//! Grid store: items and frozen armor, addressed `[row][col]`, row 0 at the top.

use crate::item::{Item, ItemFactory};

/// Hits a frozen tile starts with.
pub const FROZEN_HITS: u8 = 2;

/// A cell position. `row` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub col: usize,
    pub row: usize,
}

impl Pos {
    pub const fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}

#[derive(Debug, Clone)]
pub struct Grid {
    pub cols: usize,
    pub rows: usize,
    /// cells[row][col]; `None` only between clearing and gravity.
    cells: Vec<Vec<Option<Item>>>,
    /// armor[row][col] = hits remaining; 0 means unfrozen.
    armor: Vec<Vec<u8>>,
}

impl Grid {
    /// Empty grid of the given size (both dimensions at least 1).
    pub fn new(cols: usize, rows: usize) -> Self {
        let (cols, rows) = (cols.max(1), rows.max(1));
        Self {
            cols,
            rows,
            cells: (0..rows).map(|_| vec![None; cols]).collect(),
            armor: (0..rows).map(|_| vec![0; cols]).collect(),
        }
    }

    /// Fresh grid populated cell by cell, then frozen with probability `frozen_chance` per cell.
    pub fn generate(
        cols: usize,
        rows: usize,
        factory: &mut ItemFactory,
        active: usize,
        frozen_chance: f64,
    ) -> Self {
        let mut grid = Self::new(cols, rows);
        for pos in grid.positions().collect::<Vec<_>>() {
            grid.set(pos, Some(factory.create_item(active)));
            if factory.roll(frozen_chance) {
                grid.set_armor(pos, FROZEN_HITS);
            }
        }
        grid
    }

    /// Redraw every item, leaving armor untouched.
    pub fn reroll_items(&mut self, factory: &mut ItemFactory, active: usize) {
        for row in &mut self.cells {
            for cell in row.iter_mut() {
                *cell = Some(factory.create_item(active));
            }
        }
    }

    #[inline]
    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.col < self.cols && pos.row < self.rows
    }

    #[inline]
    pub fn get(&self, pos: Pos) -> Option<&Item> {
        self.cells.get(pos.row)?.get(pos.col)?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, pos: Pos) -> Option<&mut Item> {
        self.cells.get_mut(pos.row)?.get_mut(pos.col)?.as_mut()
    }

    /// Out-of-bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, pos: Pos, item: Option<Item>) {
        if let Some(cell) = self.cells.get_mut(pos.row).and_then(|r| r.get_mut(pos.col)) {
            *cell = item;
        }
    }

    #[inline]
    pub fn take(&mut self, pos: Pos) -> Option<Item> {
        self.cells
            .get_mut(pos.row)
            .and_then(|r| r.get_mut(pos.col))
            .and_then(Option::take)
    }

    /// Hits remaining; 0 for unfrozen or out-of-bounds.
    #[inline]
    pub fn armor(&self, pos: Pos) -> u8 {
        self.armor
            .get(pos.row)
            .and_then(|r| r.get(pos.col))
            .copied()
            .unwrap_or(0)
    }

    #[inline]
    pub fn set_armor(&mut self, pos: Pos, hits: u8) {
        if let Some(a) = self.armor.get_mut(pos.row).and_then(|r| r.get_mut(pos.col)) {
            *a = hits;
        }
    }

    #[inline]
    pub fn is_frozen(&self, pos: Pos) -> bool {
        self.armor(pos) > 0
    }

    /// Decrement armor by one (floor 0). Returns the remaining hits if the cell was frozen.
    pub fn crack(&mut self, pos: Pos) -> Option<u8> {
        let hits = self.armor(pos);
        if hits == 0 {
            return None;
        }
        self.set_armor(pos, hits - 1);
        Some(hits - 1)
    }

    /// Orthogonal in-bounds neighbours.
    pub fn neighbors(&self, pos: Pos) -> impl Iterator<Item = Pos> + '_ {
        const DIRS: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
        DIRS.iter().filter_map(move |&(dc, dr)| {
            let col = pos.col.checked_add_signed(dc)?;
            let row = pos.row.checked_add_signed(dr)?;
            let p = Pos::new(col, row);
            self.in_bounds(p).then_some(p)
        })
    }

    /// Every position, row-major.
    pub fn positions(&self) -> impl Iterator<Item = Pos> + use<> {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| Pos::new(col, row)))
    }

    /// Occupied positions, row-major.
    pub fn occupied(&self) -> Vec<Pos> {
        self.positions().filter(|&p| self.get(p).is_some()).collect()
    }

    /// True when no cell is empty (the state the grid is always left in at rest).
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|row| row.iter().all(Option::is_some))
    }

    #[inline]
    pub(crate) fn index(&self, pos: Pos) -> usize {
        pos.row * self.cols + pos.col
    }

    pub fn frozen_count(&self) -> usize {
        self.armor.iter().flatten().filter(|&&a| a > 0).count()
    }
}

/// Grid from rows of kind letters: `D`onut `C`ookie c`R`oissant `P`udding `B`oba `*`burst, `.` empty.
#[cfg(test)]
pub fn grid_from_rows(rows: &[&str]) -> Grid {
    use crate::item::ItemKind;
    let cols = rows.iter().map(|r| r.len()).max().unwrap_or(1);
    let mut grid = Grid::new(cols, rows.len());
    for (row, line) in rows.iter().enumerate() {
        for (col, ch) in line.chars().enumerate() {
            let kind = match ch {
                'D' => ItemKind::Donut,
                'C' => ItemKind::Cookie,
                'R' => ItemKind::Croissant,
                'P' => ItemKind::Pudding,
                'B' => ItemKind::Boba,
                '*' => ItemKind::Burst,
                _ => continue,
            };
            grid.set(Pos::new(col, row), Some(Item::new(kind, 0)));
        }
    }
    grid
}
