//! Cluster finder: 4-connected flood fill over same-kind, unfrozen cells.

use crate::grid::{Grid, Pos};

impl Grid {
    /// True if `pos` holds an item that may take part in a cluster.
    #[inline]
    fn is_matchable(&self, pos: Pos) -> bool {
        self.get(pos).is_some() && !self.is_frozen(pos)
    }

    /// Flood fill from `origin`, marking `visited` as it goes. Frozen cells are walls.
    fn flood(&self, origin: Pos, visited: &mut [bool]) -> Vec<Pos> {
        let kind = match self.get(origin) {
            Some(item) if !self.is_frozen(origin) => item.kind,
            _ => return Vec::new(),
        };
        let mut component = Vec::new();
        let mut stack = vec![origin];
        visited[self.index(origin)] = true;

        while let Some(pos) = stack.pop() {
            component.push(pos);
            for next in self.neighbors(pos) {
                let idx = self.index(next);
                if visited[idx] || !self.is_matchable(next) {
                    continue;
                }
                if self.get(next).is_some_and(|it| it.kind == kind) {
                    visited[idx] = true;
                    stack.push(next);
                }
            }
        }
        component
    }

    /// Connected same-kind region containing `origin`, in discovery order.
    /// Empty when `origin` is empty, frozen or out of bounds.
    pub fn find_cluster(&self, origin: Pos) -> Vec<Pos> {
        if !self.in_bounds(origin) {
            return Vec::new();
        }
        let mut visited = vec![false; self.cols * self.rows];
        self.flood(origin, &mut visited)
    }

    /// True if some cluster has at least `threshold` cells.
    /// Each cell is visited at most once per scan; stops at the first hit.
    pub fn has_any_cluster(&self, threshold: usize) -> bool {
        let mut visited = vec![false; self.cols * self.rows];
        for pos in self.positions() {
            if visited[self.index(pos)] || !self.is_matchable(pos) {
                continue;
            }
            if self.flood(pos, &mut visited).len() >= threshold {
                return true;
            }
        }
        false
    }

    /// Largest cluster on the board (first found wins ties). Used for hints.
    pub fn largest_cluster(&self) -> Vec<Pos> {
        let mut visited = vec![false; self.cols * self.rows];
        let mut best = Vec::new();
        for pos in self.positions() {
            if visited[self.index(pos)] || !self.is_matchable(pos) {
                continue;
            }
            let component = self.flood(pos, &mut visited);
            if component.len() > best.len() {
                best = component;
            }
        }
        best
    }
}
