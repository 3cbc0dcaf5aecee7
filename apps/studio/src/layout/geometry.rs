//! Target card geometry: the pixel size a cell's image must fill, and the
//! closest aspect ratio the generation service supports for it.

use serde::Serialize;

use crate::layout::address::CellAddress;
use crate::layout::merge::MergeMap;
use crate::layout::rows::LayoutModel;

/// Aspect ratios accepted by the generation service, as (label, width, height).
const SUPPORTED_RATIOS: &[(&str, f64, f64)] = &[
    ("1:1", 1.0, 1.0),
    ("3:2", 3.0, 2.0),
    ("2:3", 2.0, 3.0),
    ("3:4", 3.0, 4.0),
    ("4:3", 4.0, 3.0),
    ("4:5", 4.0, 5.0),
    ("5:4", 5.0, 4.0),
    ("9:16", 9.0, 16.0),
    ("16:9", 16.0, 9.0),
    ("21:9", 21.0, 9.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn aspect_ratio(&self) -> &'static str {
        closest_aspect_ratio(self.width, self.height)
    }
}

/// Pixel size of the card at `addr`, accounting for its merge span.
///
/// Width is the page width split across the row's columns times the column span.
/// Height is the root row's height plus, for every further spanned row, that row's
/// height and one gap. A banner row is always one full-width column.
pub fn target_size(layout: &LayoutModel, merges: &MergeMap, addr: CellAddress) -> Option<TargetSize> {
    let row = layout.row(addr.row)?;
    let (row_span, col_span) = if row.is_banner() {
        (1, 1)
    } else {
        merges
            .span_at(addr)
            .map(|span| (span.row_span, span.col_span))
            .unwrap_or((1, 1))
    };

    let config = layout.config();
    let columns = row.effective_columns().max(1) as f64;
    let width = f64::from(config.page_width) / columns * col_span as f64;

    let mut height = row.height;
    for offset in 1..row_span {
        let spanned = layout.row(addr.row + offset).map(|r| r.height).unwrap_or(0);
        height = height.saturating_add(spanned).saturating_add(config.gap);
    }

    Some(TargetSize {
        width: width.round() as u32,
        height,
    })
}

/// Label of the supported ratio closest to `width / height`.
pub fn closest_aspect_ratio(width: u32, height: u32) -> &'static str {
    if width == 0 || height == 0 {
        return "1:1";
    }
    let target = f64::from(width) / f64::from(height);
    SUPPORTED_RATIOS
        .iter()
        .min_by(|a, b| {
            let da = (a.1 / a.2 - target).abs();
            let db = (b.1 / b.2 - target).abs();
            da.total_cmp(&db)
        })
        .map(|(label, _, _)| *label)
        .unwrap_or("1:1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::rows::{RowKind, RowUpdate};
    use crate::layout::selection::Bounds;

    #[test]
    fn test_plain_cell_splits_page_width() {
        let layout = LayoutModel::default();
        let size = target_size(&layout, &MergeMap::default(), CellAddress::new(0, 0)).unwrap();
        assert_eq!(size, TargetSize { width: 185, height: 180 });
    }

    #[test]
    fn test_row_spanning_merge_requests_taller_image() {
        let mut layout = LayoutModel::default();
        layout.update_row(1, RowUpdate::Height(200)).unwrap();
        let mut merges = MergeMap::default();
        merges
            .merge(
                Bounds::from_corners(CellAddress::new(0, 0), CellAddress::new(1, 1)),
                &layout,
            )
            .unwrap();

        let size = target_size(&layout, &merges, CellAddress::new(0, 0)).unwrap();
        assert_eq!(size.width, 370);
        assert_eq!(size.height, 180 + 200 + 2);
    }

    #[test]
    fn test_tall_merged_rows_saturate_height() {
        let mut layout = LayoutModel::default();
        layout.update_row(0, RowUpdate::Height(u32::MAX / 2 + 10)).unwrap();
        layout.update_row(1, RowUpdate::Height(u32::MAX / 2 + 10)).unwrap();
        let mut merges = MergeMap::default();
        merges
            .merge(
                Bounds::from_corners(CellAddress::new(0, 0), CellAddress::new(1, 0)),
                &layout,
            )
            .unwrap();

        let size = target_size(&layout, &merges, CellAddress::new(0, 0)).unwrap();
        assert_eq!(size.height, u32::MAX);
        assert_eq!(size.aspect_ratio(), "9:16");
    }

    #[test]
    fn test_banner_is_full_width() {
        let mut layout = LayoutModel::default();
        layout.update_row(2, RowUpdate::Kind(RowKind::Banner)).unwrap();
        let size = target_size(&layout, &MergeMap::default(), CellAddress::new(2, 0)).unwrap();
        assert_eq!(size.width, 555);
        assert_eq!(size.aspect_ratio(), "21:9");
    }

    #[test]
    fn test_missing_row_has_no_size() {
        let layout = LayoutModel::default();
        assert!(target_size(&layout, &MergeMap::default(), CellAddress::new(40, 0)).is_none());
    }

    #[test]
    fn test_closest_aspect_ratio() {
        assert_eq!(closest_aspect_ratio(185, 180), "1:1");
        assert_eq!(closest_aspect_ratio(185, 362), "9:16");
        assert_eq!(closest_aspect_ratio(1600, 900), "16:9");
        assert_eq!(closest_aspect_ratio(0, 10), "1:1");
    }
}
