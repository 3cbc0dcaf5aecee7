use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::layout::address::CellAddress;

/// An inclusive, normalized rectangle of cell addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

impl Bounds {
    /// Builds the rectangle spanned by two corners, in any order.
    pub fn from_corners(a: CellAddress, b: CellAddress) -> Self {
        Self {
            min_row: a.row.min(b.row),
            max_row: a.row.max(b.row),
            min_col: a.col.min(b.col),
            max_col: a.col.max(b.col),
        }
    }

    /// Rectangle covered by a merge rooted at `root`. Spans are at least 1.
    pub fn from_span(root: CellAddress, row_span: usize, col_span: usize) -> Self {
        Self {
            min_row: root.row,
            max_row: root.row.saturating_add(row_span.max(1) - 1),
            min_col: root.col,
            max_col: root.col.saturating_add(col_span.max(1) - 1),
        }
    }

    pub fn top_left(&self) -> CellAddress {
        CellAddress::new(self.min_row, self.min_col)
    }

    pub fn row_span(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    pub fn col_span(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    pub fn cell_count(&self) -> usize {
        self.row_span() * self.col_span()
    }

    pub fn contains(&self, addr: CellAddress) -> bool {
        (self.min_row..=self.max_row).contains(&addr.row)
            && (self.min_col..=self.max_col).contains(&addr.col)
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_row <= other.max_row
            && other.min_row <= self.max_row
            && self.min_col <= other.max_col
            && other.min_col <= self.max_col
    }

    /// All addresses in the rectangle, row-major.
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> {
        let (min_col, max_col) = (self.min_col, self.max_col);
        (self.min_row..=self.max_row)
            .flat_map(move |r| (min_col..=max_col).map(move |c| CellAddress::new(r, c)))
    }
}

/// Which selection gesture the pointer currently drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionMode {
    #[default]
    Rectangle,
    Multi,
}

/// Transient drag rectangle. Exists from `begin` until a merge or `cancel`.
#[derive(Debug, Clone, Default)]
pub struct RectSelection {
    corners: Option<(CellAddress, CellAddress)>,
    dragging: bool,
}

impl RectSelection {
    pub fn begin(&mut self, addr: CellAddress) {
        self.corners = Some((addr, addr));
        self.dragging = true;
    }

    /// Moves the free corner. Ignored unless a drag is in progress.
    pub fn extend(&mut self, addr: CellAddress) {
        if !self.dragging {
            return;
        }
        if let Some((_, end)) = self.corners.as_mut() {
            *end = addr;
        }
    }

    /// Finishes the drag; the rectangle stays available for a merge.
    pub fn end(&mut self) {
        self.dragging = false;
    }

    pub fn cancel(&mut self) {
        self.corners = None;
        self.dragging = false;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.corners
            .map(|(start, end)| Bounds::from_corners(start, end))
    }
}

/// Individually toggled cells used for batch regeneration.
#[derive(Debug, Clone, Default)]
pub struct MultiSelect {
    cells: BTreeSet<CellAddress>,
}

impl MultiSelect {
    /// Toggles membership and returns whether the cell is now selected.
    pub fn toggle(&mut self, addr: CellAddress) -> bool {
        if self.cells.remove(&addr) {
            false
        } else {
            self.cells.insert(addr);
            true
        }
    }

    pub fn contains(&self, addr: CellAddress) -> bool {
        self.cells.contains(&addr)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn retain(&mut self, mut keep: impl FnMut(CellAddress) -> bool) {
        self.cells.retain(|addr| keep(*addr));
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.cells.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(row: usize, col: usize) -> CellAddress {
        CellAddress::new(row, col)
    }

    #[test]
    fn test_bounds_normalize_reverse_drag() {
        let b = Bounds::from_corners(at(3, 4), at(1, 0));
        assert_eq!(b.top_left(), at(1, 0));
        assert_eq!(b.row_span(), 3);
        assert_eq!(b.col_span(), 5);
        assert_eq!(b.cell_count(), 15);
    }

    #[test]
    fn test_bounds_cells_row_major() {
        let b = Bounds::from_span(at(0, 1), 2, 2);
        let cells: Vec<_> = b.cells().collect();
        assert_eq!(cells, vec![at(0, 1), at(0, 2), at(1, 1), at(1, 2)]);
    }

    #[test]
    fn test_bounds_intersection_edges() {
        let a = Bounds::from_span(at(0, 0), 2, 2);
        assert!(a.intersects(&Bounds::from_span(at(1, 1), 1, 1)));
        assert!(!a.intersects(&Bounds::from_span(at(0, 2), 2, 1)));
        assert!(!a.intersects(&Bounds::from_span(at(2, 0), 1, 3)));
    }

    #[test]
    fn test_extend_without_drag_is_ignored() {
        let mut sel = RectSelection::default();
        sel.extend(at(2, 2));
        assert!(sel.bounds().is_none());

        sel.begin(at(0, 0));
        sel.extend(at(1, 2));
        sel.end();
        sel.extend(at(5, 5));
        assert_eq!(sel.bounds(), Some(Bounds::from_corners(at(0, 0), at(1, 2))));
        assert!(!sel.is_dragging());
    }

    #[test]
    fn test_cancel_clears_rectangle() {
        let mut sel = RectSelection::default();
        sel.begin(at(1, 1));
        sel.cancel();
        assert!(sel.bounds().is_none());
    }

    #[test]
    fn test_multi_select_toggle() {
        let mut multi = MultiSelect::default();
        assert!(multi.toggle(at(0, 0)));
        assert!(multi.toggle(at(1, 0)));
        assert!(!multi.toggle(at(0, 0)));
        assert_eq!(multi.iter().collect::<Vec<_>>(), vec![at(1, 0)]);
    }
}
