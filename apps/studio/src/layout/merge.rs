//! Merge engine: merge roots, their spans, and the hidden cells they absorb.
//!
//! # Invariant
//! `hidden` is always exactly the union of every merge rectangle minus its root.
//! Every mutating method validates first and only then mutates, so a returned
//! error leaves the map untouched.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::StudioError;
use crate::layout::address::CellAddress;
use crate::layout::rows::LayoutModel;
use crate::layout::selection::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSpan {
    pub row_span: usize,
    pub col_span: usize,
}

impl MergeSpan {
    pub fn bounds(&self, root: CellAddress) -> Bounds {
        Bounds::from_span(root, self.row_span, self.col_span)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeMap {
    merges: BTreeMap<CellAddress, MergeSpan>,
    hidden: BTreeSet<CellAddress>,
}

impl MergeMap {
    /// Rebuilds a merge map from persisted parts.
    ///
    /// Rejects zero spans, merges that leave the grid, overlapping merges, and a hidden
    /// set that differs from the one the merges imply.
    pub fn from_parts(
        merges: BTreeMap<CellAddress, MergeSpan>,
        hidden: BTreeSet<CellAddress>,
        layout: &LayoutModel,
    ) -> Result<Self, StudioError> {
        let mut placed: Vec<Bounds> = Vec::with_capacity(merges.len());
        for (root, span) in &merges {
            if span.row_span == 0 || span.col_span == 0 {
                return Err(StudioError::validation(format!(
                    "Merge at {root} has a zero span"
                )));
            }
            let row_end = root.row.checked_add(span.row_span);
            if row_end.map_or(true, |end| end > layout.row_count()) {
                return Err(StudioError::validation(format!(
                    "Merge at {root} spans {} rows, past the end of the grid",
                    span.row_span
                )));
            }
            let columns = layout.row(root.row).map_or(0, |row| row.effective_columns());
            let col_end = root.col.checked_add(span.col_span);
            if col_end.map_or(true, |end| end > columns) {
                return Err(StudioError::validation(format!(
                    "Merge at {root} spans {} columns, past the end of its row",
                    span.col_span
                )));
            }
            let rect = span.bounds(*root);
            if let Some(cell) = rect.cells().find(|c| !layout.contains(*c)) {
                return Err(StudioError::validation(format!(
                    "Merge at {root} covers {cell}, which is outside the grid"
                )));
            }
            if placed.iter().any(|other| other.intersects(&rect)) {
                return Err(StudioError::validation(format!(
                    "Merge at {root} overlaps another merge"
                )));
            }
            placed.push(rect);
        }

        let derived = derive_hidden(&merges);
        if derived != hidden {
            return Err(StudioError::validation(format!(
                "Hidden cells do not match merges ({} listed, {} implied)",
                hidden.len(),
                derived.len()
            )));
        }
        Ok(Self { merges, hidden })
    }

    pub fn merges(&self) -> &BTreeMap<CellAddress, MergeSpan> {
        &self.merges
    }

    pub fn hidden(&self) -> &BTreeSet<CellAddress> {
        &self.hidden
    }

    pub fn span_at(&self, root: CellAddress) -> Option<MergeSpan> {
        self.merges.get(&root).copied()
    }

    pub fn is_hidden(&self, addr: CellAddress) -> bool {
        self.hidden.contains(&addr)
    }

    /// Root of the merge covering `addr`, or `None` when `addr` is not merged.
    pub fn owner_of(&self, addr: CellAddress) -> Option<CellAddress> {
        self.merges
            .iter()
            .find(|(root, span)| span.bounds(**root).contains(addr))
            .map(|(root, _)| *root)
    }

    /// Merges the rectangle into one cell rooted at its top-left corner.
    pub fn merge(&mut self, bounds: Bounds, layout: &LayoutModel) -> Result<CellAddress, StudioError> {
        if bounds.cell_count() < 2 {
            return Err(StudioError::validation(
                "Select more than one cell to merge",
            ));
        }
        if let Some(cell) = bounds.cells().find(|c| !layout.contains(*c)) {
            return Err(StudioError::validation(format!(
                "Cannot merge: {cell} is not an addressable cell"
            )));
        }
        if let Some(root) = self
            .merges
            .iter()
            .find(|(root, span)| span.bounds(**root).intersects(&bounds))
            .map(|(root, _)| *root)
        {
            return Err(StudioError::validation(format!(
                "Cannot merge: selection overlaps the merge at {root}"
            )));
        }

        let root = bounds.top_left();
        self.merges.insert(
            root,
            MergeSpan {
                row_span: bounds.row_span(),
                col_span: bounds.col_span(),
            },
        );
        self.hidden.extend(bounds.cells().filter(|c| *c != root));
        debug!(
            "Merged {root} spanning {}x{}",
            bounds.row_span(),
            bounds.col_span()
        );
        Ok(root)
    }

    /// Removes the merge rooted at `root` and un-hides exactly its own rectangle.
    pub fn unmerge(&mut self, root: CellAddress) -> Result<MergeSpan, StudioError> {
        let span = self
            .merges
            .remove(&root)
            .ok_or_else(|| StudioError::validation(format!("No merge is rooted at {root}")))?;
        for cell in span.bounds(root).cells() {
            self.hidden.remove(&cell);
        }
        debug!("Unmerged {root}");
        Ok(span)
    }

    /// Checks that row `row` may be reshaped to `new_cols` effective columns.
    ///
    /// Merges rooted in the row are purged by the reshape; a merge rooted in another
    /// row that covers this row past the new bound blocks it.
    pub fn check_reshape(&self, row: usize, new_cols: usize) -> Result<(), StudioError> {
        for (root, span) in &self.merges {
            let rect = span.bounds(*root);
            if root.row != row && (rect.min_row..=rect.max_row).contains(&row) && rect.max_col >= new_cols {
                return Err(StudioError::validation(format!(
                    "Row {row} cannot shrink to {new_cols} columns: the merge at {root} covers column {}",
                    rect.max_col
                )));
            }
        }
        Ok(())
    }

    /// Drops every merge rooted in `row`, un-hiding their rectangles.
    pub fn purge_row(&mut self, row: usize) -> Vec<CellAddress> {
        let roots: Vec<CellAddress> = self.merges.keys().filter(|r| r.row == row).copied().collect();
        for root in &roots {
            // Key was just listed, so the unmerge cannot fail.
            let _ = self.unmerge(*root);
        }
        roots
    }

    /// Checks that the grid may be truncated to `row_count` rows.
    pub fn check_truncate(&self, row_count: usize) -> Result<(), StudioError> {
        for (root, span) in &self.merges {
            let rect = span.bounds(*root);
            if rect.min_row < row_count && rect.max_row >= row_count {
                return Err(StudioError::validation(format!(
                    "Cannot reduce to {row_count} rows: the merge at {root} extends to row {}",
                    rect.max_row
                )));
            }
        }
        Ok(())
    }

    /// Drops every merge rooted at or below `row_count`.
    pub fn purge_rows_from(&mut self, row_count: usize) -> Vec<CellAddress> {
        let roots: Vec<CellAddress> = self
            .merges
            .keys()
            .filter(|r| r.row >= row_count)
            .copied()
            .collect();
        for root in &roots {
            let _ = self.unmerge(*root);
        }
        roots
    }

    /// True when the hidden set equals the union of merge rectangles minus roots.
    pub fn is_consistent(&self) -> bool {
        derive_hidden(&self.merges) == self.hidden
    }
}

fn derive_hidden(merges: &BTreeMap<CellAddress, MergeSpan>) -> BTreeSet<CellAddress> {
    merges
        .iter()
        .flat_map(|(root, span)| {
            let root = *root;
            span.bounds(root).cells().filter(move |c| *c != root)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::rows::{RowKind, RowUpdate};

    fn at(row: usize, col: usize) -> CellAddress {
        CellAddress::new(row, col)
    }

    fn rect(a: CellAddress, b: CellAddress) -> Bounds {
        Bounds::from_corners(a, b)
    }

    fn layout_with_cols(cols: &[usize]) -> LayoutModel {
        let mut layout = LayoutModel::default();
        layout.set_row_count(cols.len()).unwrap();
        for (i, c) in cols.iter().enumerate() {
            layout.update_row(i, RowUpdate::Columns(*c)).unwrap();
        }
        layout
    }

    #[test]
    fn test_merge_hides_everything_but_root() {
        let layout = layout_with_cols(&[3, 3, 3]);
        let mut map = MergeMap::default();
        let root = map.merge(rect(at(1, 2), at(0, 1)), &layout).unwrap();

        assert_eq!(root, at(0, 1));
        assert_eq!(
            map.span_at(root),
            Some(MergeSpan {
                row_span: 2,
                col_span: 2
            })
        );
        let hidden: Vec<_> = map.hidden().iter().copied().collect();
        assert_eq!(hidden, vec![at(0, 2), at(1, 1), at(1, 2)]);
        assert!(map.is_consistent());
    }

    #[test]
    fn test_merge_then_unmerge_restores_hidden_set() {
        let layout = layout_with_cols(&[4, 4, 4]);
        let mut map = MergeMap::default();
        map.merge(rect(at(2, 0), at(2, 1)), &layout).unwrap();
        let before = map.hidden().clone();

        let root = map.merge(rect(at(0, 1), at(1, 3)), &layout).unwrap();
        map.unmerge(root).unwrap();

        assert_eq!(map.hidden(), &before);
        assert!(map.span_at(root).is_none());
        assert!(map.is_consistent());
    }

    #[test]
    fn test_single_cell_merge_rejected() {
        let layout = layout_with_cols(&[3]);
        let mut map = MergeMap::default();
        let err = map.merge(rect(at(0, 0), at(0, 0)), &layout).unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));
        assert!(map.merges().is_empty());
    }

    #[test]
    fn test_overlapping_merge_rejected_without_mutation() {
        let layout = layout_with_cols(&[3, 3]);
        let mut map = MergeMap::default();
        map.merge(rect(at(0, 0), at(1, 1)), &layout).unwrap();
        let snapshot = map.clone();

        assert!(map.merge(rect(at(1, 1), at(1, 2)), &layout).is_err());
        assert!(map.merge(rect(at(0, 0), at(0, 2)), &layout).is_err());
        assert_eq!(map, snapshot);
    }

    #[test]
    fn test_merge_past_row_width_rejected() {
        // Row 1 only has 2 columns, so a 3-wide rectangle over rows 0-1 is invalid.
        let layout = layout_with_cols(&[3, 2]);
        let mut map = MergeMap::default();
        assert!(map.merge(rect(at(0, 0), at(1, 2)), &layout).is_err());
        assert!(map.merge(rect(at(0, 0), at(1, 1)), &layout).is_ok());
    }

    #[test]
    fn test_merge_into_banner_row_rejected() {
        let mut layout = layout_with_cols(&[3, 3]);
        layout.update_row(1, RowUpdate::Kind(RowKind::Banner)).unwrap();
        let mut map = MergeMap::default();
        assert!(map.merge(rect(at(0, 0), at(1, 1)), &layout).is_err());
    }

    #[test]
    fn test_unmerge_unknown_root_rejected() {
        let mut map = MergeMap::default();
        assert!(map.unmerge(at(0, 0)).is_err());
    }

    #[test]
    fn test_unmerge_leaves_neighbouring_merge_hidden_cells() {
        let layout = layout_with_cols(&[4, 4]);
        let mut map = MergeMap::default();
        map.merge(rect(at(0, 0), at(1, 1)), &layout).unwrap();
        map.merge(rect(at(0, 2), at(1, 3)), &layout).unwrap();

        map.unmerge(at(0, 0)).unwrap();
        assert!(map.is_hidden(at(1, 3)));
        assert!(map.is_hidden(at(0, 3)));
        assert!(!map.is_hidden(at(1, 1)));
        assert!(map.is_consistent());
    }

    #[test]
    fn test_owner_of_hidden_cell() {
        let layout = layout_with_cols(&[3, 3]);
        let mut map = MergeMap::default();
        map.merge(rect(at(0, 1), at(1, 2)), &layout).unwrap();
        assert_eq!(map.owner_of(at(1, 2)), Some(at(0, 1)));
        assert_eq!(map.owner_of(at(0, 1)), Some(at(0, 1)));
        assert_eq!(map.owner_of(at(1, 0)), None);
    }

    #[test]
    fn test_reshape_blocked_by_foreign_merge() {
        let layout = layout_with_cols(&[3, 3]);
        let mut map = MergeMap::default();
        map.merge(rect(at(0, 1), at(1, 2)), &layout).unwrap();

        assert!(map.check_reshape(1, 2).is_err());
        assert!(map.check_reshape(1, 3).is_ok());
        // The merge is rooted in row 0, so row 0 may reshape freely (it gets purged).
        assert!(map.check_reshape(0, 1).is_ok());
    }

    #[test]
    fn test_purge_row_removes_whole_rectangles() {
        let layout = layout_with_cols(&[3, 3, 3]);
        let mut map = MergeMap::default();
        map.merge(rect(at(0, 0), at(2, 0)), &layout).unwrap();
        map.merge(rect(at(1, 1), at(1, 2)), &layout).unwrap();

        let purged = map.purge_row(0);
        assert_eq!(purged, vec![at(0, 0)]);
        assert!(!map.is_hidden(at(2, 0)));
        assert!(map.is_hidden(at(1, 2)));
        assert!(map.is_consistent());
    }

    #[test]
    fn test_truncate_checks() {
        let layout = layout_with_cols(&[3, 3, 3]);
        let mut map = MergeMap::default();
        map.merge(rect(at(1, 0), at(2, 0)), &layout).unwrap();
        map.merge(rect(at(2, 1), at(2, 2)), &layout).unwrap();

        assert!(map.check_truncate(2).is_err());
        assert!(map.check_truncate(1).is_ok());
        assert_eq!(map.purge_rows_from(1), vec![at(1, 0), at(2, 1)]);
        assert!(map.hidden().is_empty());
    }

    #[test]
    fn test_from_parts_rejects_inconsistent_hidden_set() {
        let layout = layout_with_cols(&[3, 3]);
        let mut merges = BTreeMap::new();
        merges.insert(
            at(0, 0),
            MergeSpan {
                row_span: 1,
                col_span: 2,
            },
        );

        let good: BTreeSet<_> = [at(0, 1)].into_iter().collect();
        assert!(MergeMap::from_parts(merges.clone(), good, &layout).is_ok());

        let extra: BTreeSet<_> = [at(0, 1), at(1, 1)].into_iter().collect();
        assert!(MergeMap::from_parts(merges, extra, &layout).is_err());
    }

    #[test]
    fn test_from_parts_rejects_overlap_and_out_of_grid() {
        let layout = layout_with_cols(&[3, 3]);
        let span = MergeSpan {
            row_span: 2,
            col_span: 2,
        };

        let mut overlapping = BTreeMap::new();
        overlapping.insert(at(0, 0), span);
        overlapping.insert(at(1, 1), span);
        let hidden = derive_hidden(&overlapping);
        assert!(MergeMap::from_parts(overlapping, hidden, &layout).is_err());

        let mut outside = BTreeMap::new();
        outside.insert(at(1, 2), span);
        let hidden = derive_hidden(&outside);
        assert!(MergeMap::from_parts(outside, hidden, &layout).is_err());
    }

    #[test]
    fn test_invariant_holds_across_operation_sequence() {
        let layout = layout_with_cols(&[4, 4, 4, 4]);
        let mut map = MergeMap::default();
        let attempts = [
            rect(at(0, 0), at(1, 1)),
            rect(at(0, 1), at(0, 3)),
            rect(at(2, 2), at(3, 3)),
            rect(at(3, 0), at(3, 1)),
            rect(at(1, 2), at(2, 3)),
        ];
        for bounds in attempts {
            let _ = map.merge(bounds, &layout);
            assert!(map.is_consistent());
        }
        let _ = map.unmerge(at(2, 2));
        assert!(map.is_consistent());
        map.purge_row(3);
        assert!(map.is_consistent());
        assert!(map.merge(rect(at(1, 2), at(2, 3)), &layout).is_ok());
        assert!(map.is_consistent());
    }
}
