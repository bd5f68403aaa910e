//! Sparse in-memory sheet built from traversal callbacks.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::loader::GridSink;
use crate::spec::{
    EnumCellOverwriteRule, EnumCellStyle, EnumGridValue, EnumReportValue, ReportXlsxError,
    SpecBodyCell, SpecFreezePane, SpecGridCell, SpecGridShape, SpecHeaderCell, SpecMergeRegion,
};
use crate::util::convert_offset_to_local;

/// Sheet content keyed by `(row, col)` in sheet coordinates.
///
/// Cells only exist once written. Nothing is materialized into a backend
/// worksheet until the grid is finalized by the writer.
#[derive(Debug, Clone)]
pub struct SheetGrid {
    shape: Option<SpecGridShape>,
    cells: BTreeMap<(usize, usize), SpecGridCell>,
    merges: Vec<SpecMergeRegion>,
    freeze_pane: SpecFreezePane,
    blank_header_text: String,
    rule_overwrite: EnumCellOverwriteRule,
    warnings: Vec<String>,
}

impl SheetGrid {
    pub fn new(blank_header_text: impl Into<String>, rule_overwrite: EnumCellOverwriteRule) -> Self {
        Self {
            shape: None,
            cells: BTreeMap::new(),
            merges: Vec::new(),
            freeze_pane: SpecFreezePane::default(),
            blank_header_text: blank_header_text.into(),
            rule_overwrite,
            warnings: Vec::new(),
        }
    }

    pub fn shape(&self) -> Option<SpecGridShape> {
        self.shape
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&SpecGridCell> {
        self.cells.get(&(row, col))
    }

    pub fn merges(&self) -> &[SpecMergeRegion] {
        &self.merges
    }

    pub fn freeze_pane(&self) -> SpecFreezePane {
        self.freeze_pane
    }

    /// Warnings collected by last-write-wins overwrites.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (&(usize, usize), &SpecGridCell)> {
        self.cells.iter()
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// One past the last populated column of `row`; `0` for an empty row.
    pub fn row_last_col(&self, row: usize) -> usize {
        self.cells
            .range((row, 0)..=(row, usize::MAX))
            .next_back()
            .map_or(0, |((_, col), _)| col + 1)
    }

    /// Merge whose area contains `(row, col)`.
    pub fn merge_at(&self, row: usize, col: usize) -> Option<&SpecMergeRegion> {
        self.merges.iter().find(|region| region.contains(row, col))
    }

    fn register_merge(&mut self, region: SpecMergeRegion) -> Result<(), ReportXlsxError> {
        if let Some(existing) = self.merges.iter().find(|val| val.overlaps(&region)) {
            return Err(ReportXlsxError::OverlappingMergeRegion {
                region,
                existing: *existing,
            });
        }
        if let Some((row, col)) = self.find_labelled_header(&region) {
            return Err(ReportXlsxError::OverlappingMergeRegion {
                region,
                existing: SpecMergeRegion::cell(row, col),
            });
        }
        self.merges.push(region);
        Ok(())
    }

    /// First explicitly labelled header cell inside `region`.
    ///
    /// Shape placeholders are blank and do not count.
    fn find_labelled_header(&self, region: &SpecMergeRegion) -> Option<(usize, usize)> {
        (region.row_first..=region.row_last).find_map(|row| {
            self.cells
                .range((row, region.col_first)..=(row, region.col_last))
                .find(|(_, cell)| cell.if_header && cell.value != EnumGridValue::Blank)
                .map(|(key, _)| *key)
        })
    }

    fn write_header(&mut self, row: usize, col: usize, value: EnumGridValue) {
        self.cells.insert(
            (row, col),
            SpecGridCell {
                value,
                style: EnumCellStyle::Header,
                if_header: true,
            },
        );
    }
}

impl GridSink for SheetGrid {
    fn on_shape(&mut self, shape: SpecGridShape) -> Result<(), ReportXlsxError> {
        if self.shape.is_some() {
            return Err(ReportXlsxError::ShapeRepeated);
        }
        if shape.n_rows_total() > N_NROWS_EXCEL_MAX || shape.n_cols_total() > N_NCOLS_EXCEL_MAX {
            return Err(ReportXlsxError::ShapeExceedsSheetLimits {
                n_rows: shape.n_rows_total(),
                n_cols: shape.n_cols_total(),
            });
        }
        debug!(
            n_rows_header = shape.n_rows_header,
            n_cols_header = shape.n_cols_header,
            n_rows_body = shape.n_rows_body,
            n_cols_body = shape.n_cols_body,
            "grid shape"
        );

        self.shape = Some(shape);
        self.freeze_pane = SpecFreezePane {
            n_cols: shape.n_cols_header,
            n_rows: shape.n_rows_header,
        };

        for row in 0..shape.n_rows_header {
            for col in 0..shape.n_cols_header {
                self.write_header(row, col, EnumGridValue::Blank);
            }
        }
        Ok(())
    }

    fn on_header_cell(&mut self, cell: SpecHeaderCell) -> Result<(), ReportXlsxError> {
        if self.shape.is_none() {
            return Err(ReportXlsxError::ShapeMissing);
        }
        if cell.row_span == 0 || cell.col_span == 0 {
            return Err(ReportXlsxError::InvalidSpan {
                row: cell.row,
                col: cell.col,
                row_span: cell.row_span,
                col_span: cell.col_span,
            });
        }

        if let Some(region) = cell.merge_region() {
            self.register_merge(region)?;
        } else if let Some(existing) = self.merge_at(cell.row, cell.col) {
            return Err(ReportXlsxError::OverlappingMergeRegion {
                region: SpecMergeRegion::cell(cell.row, cell.col),
                existing: *existing,
            });
        }

        let c_label = cell
            .label
            .unwrap_or_else(|| self.blank_header_text.clone());
        self.write_header(cell.row, cell.col, EnumGridValue::String(c_label));
        Ok(())
    }

    fn on_body_cell(&mut self, cell: SpecBodyCell) -> Result<(), ReportXlsxError> {
        let shape = self.shape.ok_or(ReportXlsxError::ShapeMissing)?;
        let n_row = shape.n_rows_header + cell.row;
        let n_col = shape.n_cols_header + cell.col;
        if let Some(region) = self.merge_at(n_row, n_col) {
            return Err(ReportXlsxError::BodyCellInsideMerge {
                row: n_row,
                col: n_col,
                region: *region,
            });
        }

        let (value, style) = match cell.value {
            EnumReportValue::Absent => (EnumGridValue::Blank, EnumCellStyle::Default),
            EnumReportValue::String(val) => (EnumGridValue::String(val), EnumCellStyle::Default),
            EnumReportValue::Integer(val) => (EnumGridValue::Integer(val), EnumCellStyle::Default),
            EnumReportValue::Float(val) => (EnumGridValue::Float(val), EnumCellStyle::Default),
            EnumReportValue::Boolean(val) => (EnumGridValue::Boolean(val), EnumCellStyle::Default),
            EnumReportValue::Date(val) => (EnumGridValue::Date(val), EnumCellStyle::Date),
            EnumReportValue::DateTime(val) => {
                (EnumGridValue::DateTime(val), EnumCellStyle::DateTime)
            }
            EnumReportValue::DateTimeOffset(val) => (
                EnumGridValue::DateTime(convert_offset_to_local(&val)),
                EnumCellStyle::DateTime,
            ),
        };

        if let Some(existing) = self.cells.get(&(n_row, n_col))
            && !existing.if_header
        {
            match self.rule_overwrite {
                EnumCellOverwriteRule::Error => {
                    return Err(ReportXlsxError::CellOverwrite {
                        row: n_row,
                        col: n_col,
                    });
                }
                EnumCellOverwriteRule::LastWriteWins => {
                    warn!(row = n_row, col = n_col, "body cell overwritten");
                    self.warnings
                        .push(format!("Cell ({n_row}, {n_col}) overwritten by a later value."));
                }
            }
        }

        self.cells.insert(
            (n_row, n_col),
            SpecGridCell {
                value,
                style,
                if_header: false,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate};

    use super::*;
    use crate::conf::C_TEXT_HEADER_BLANK;

    fn derive_grid(shape: SpecGridShape) -> SheetGrid {
        let mut grid = SheetGrid::new(C_TEXT_HEADER_BLANK, EnumCellOverwriteRule::LastWriteWins);
        grid.on_shape(shape).unwrap();
        grid
    }

    #[test]
    fn test_shape_places_styled_header_placeholders() {
        let grid = derive_grid(SpecGridShape::new(2, 3, 4, 5));

        for row in 0..2 {
            for col in 0..3 {
                let cell = grid.cell(row, col).expect("placeholder exists");
                assert_eq!(cell.style, EnumCellStyle::Header);
                assert_eq!(cell.value, EnumGridValue::Blank);
            }
        }
        assert!(grid.cell(0, 3).is_none());
        assert!(grid.cell(2, 0).is_none());
        assert_eq!(grid.len(), 6);
    }

    #[test]
    fn test_freeze_pane_matches_header_size() {
        let grid = derive_grid(SpecGridShape::new(2, 3, 4, 5));
        assert_eq!(grid.freeze_pane(), SpecFreezePane { n_cols: 3, n_rows: 2 });

        let grid = derive_grid(SpecGridShape::new(0, 0, 4, 5));
        assert_eq!(grid.freeze_pane(), SpecFreezePane { n_cols: 0, n_rows: 0 });
        assert!(grid.is_empty());
    }

    #[test]
    fn test_header_span_registers_one_merge() {
        let mut grid = derive_grid(SpecGridShape::new(2, 3, 0, 0));
        grid.on_header_cell(SpecHeaderCell::new(0, 0, "Group").with_span(2, 3))
            .unwrap();

        assert_eq!(
            grid.merges(),
            &[SpecMergeRegion {
                row_first: 0,
                col_first: 0,
                row_last: 1,
                col_last: 2,
            }]
        );
        assert_eq!(
            grid.cell(0, 0).unwrap().value,
            EnumGridValue::String("Group".to_string())
        );
        assert_eq!(grid.cell(1, 2).unwrap().value, EnumGridValue::Blank);
    }

    #[test]
    fn test_single_cell_header_has_no_merge_and_blank_label() {
        let mut grid = derive_grid(SpecGridShape::new(1, 2, 0, 0));
        grid.on_header_cell(SpecHeaderCell::new(0, 0, "Name")).unwrap();
        grid.on_header_cell(SpecHeaderCell::unlabeled(0, 1)).unwrap();

        assert!(grid.merges().is_empty());
        assert_eq!(
            grid.cell(0, 1).unwrap().value,
            EnumGridValue::String(C_TEXT_HEADER_BLANK.to_string())
        );
        assert_eq!(grid.cell(0, 1).unwrap().style, EnumCellStyle::Header);
    }

    #[test]
    fn test_overlapping_merge_fails_fast() {
        let mut grid = derive_grid(SpecGridShape::new(2, 4, 0, 0));
        grid.on_header_cell(SpecHeaderCell::new(0, 0, "A").with_span(1, 2))
            .unwrap();

        let err = grid
            .on_header_cell(SpecHeaderCell::new(0, 1, "B").with_span(2, 2))
            .unwrap_err();

        assert!(matches!(err, ReportXlsxError::OverlappingMergeRegion { .. }));
        assert_eq!(grid.merges().len(), 1);
    }

    #[test]
    fn test_single_cell_header_inside_merge_fails_fast() {
        let mut grid = derive_grid(SpecGridShape::new(2, 3, 0, 0));
        grid.on_header_cell(SpecHeaderCell::new(0, 0, "Group").with_span(1, 3))
            .unwrap();

        let err = grid.on_header_cell(SpecHeaderCell::new(0, 2, "Late")).unwrap_err();

        assert!(matches!(
            err,
            ReportXlsxError::OverlappingMergeRegion {
                region: SpecMergeRegion {
                    row_first: 0,
                    col_first: 2,
                    row_last: 0,
                    col_last: 2,
                },
                ..
            }
        ));
        assert_eq!(grid.cell(0, 2).unwrap().value, EnumGridValue::Blank);
    }

    #[test]
    fn test_merge_over_labelled_header_fails_fast() {
        let mut grid = derive_grid(SpecGridShape::new(2, 3, 0, 0));
        grid.on_header_cell(SpecHeaderCell::new(1, 1, "Leaf")).unwrap();

        let err = grid
            .on_header_cell(SpecHeaderCell::new(0, 0, "Group").with_span(2, 2))
            .unwrap_err();

        assert!(matches!(
            err,
            ReportXlsxError::OverlappingMergeRegion {
                existing: SpecMergeRegion {
                    row_first: 1,
                    col_first: 1,
                    row_last: 1,
                    col_last: 1,
                },
                ..
            }
        ));
        assert!(grid.merges().is_empty());
    }

    #[test]
    fn test_merge_over_placeholders_is_allowed() {
        let mut grid = derive_grid(SpecGridShape::new(2, 2, 0, 0));
        grid.on_header_cell(SpecHeaderCell::new(0, 0, "Group").with_span(2, 2))
            .unwrap();
        assert_eq!(grid.merges().len(), 1);
    }

    #[test]
    fn test_body_cell_inside_merge_fails_fast() {
        let mut grid = derive_grid(SpecGridShape::new(1, 1, 2, 2));
        grid.on_header_cell(SpecHeaderCell::new(0, 1, "Tall").with_span(2, 1))
            .unwrap();

        grid.on_body_cell(SpecBodyCell::new(0, 1, 30)).unwrap();
        let err = grid
            .on_body_cell(SpecBodyCell::new(0, 0, "Alice"))
            .unwrap_err();

        assert!(matches!(
            err,
            ReportXlsxError::BodyCellInsideMerge { row: 1, col: 1, .. }
        ));
        assert!(grid.cell(1, 1).is_none());
    }

    #[test]
    fn test_body_values_are_offset_and_typed() {
        let mut grid = derive_grid(SpecGridShape::new(1, 1, 2, 3));
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let datetime = date.and_hms_opt(13, 45, 0).unwrap();

        grid.on_body_cell(SpecBodyCell::new(0, 0, "Alice")).unwrap();
        grid.on_body_cell(SpecBodyCell::new(0, 1, 30)).unwrap();
        grid.on_body_cell(SpecBodyCell::new(0, 2, 1.5)).unwrap();
        grid.on_body_cell(SpecBodyCell::new(1, 0, true)).unwrap();
        grid.on_body_cell(SpecBodyCell::new(1, 1, datetime)).unwrap();
        grid.on_body_cell(SpecBodyCell::new(1, 2, Option::<i64>::None))
            .unwrap();

        assert_eq!(
            grid.cell(1, 1).unwrap().value,
            EnumGridValue::String("Alice".to_string())
        );
        assert_eq!(grid.cell(1, 2).unwrap().value, EnumGridValue::Integer(30));
        assert_eq!(grid.cell(1, 3).unwrap().value, EnumGridValue::Float(1.5));
        assert_eq!(grid.cell(2, 1).unwrap().value, EnumGridValue::Boolean(true));
        assert_eq!(grid.cell(2, 2).unwrap().value, EnumGridValue::DateTime(datetime));
        assert_eq!(grid.cell(2, 2).unwrap().style, EnumCellStyle::DateTime);
        assert_eq!(grid.cell(2, 3).unwrap().value, EnumGridValue::Blank);
        assert_eq!(grid.cell(2, 3).unwrap().style, EnumCellStyle::Default);
    }

    #[test]
    fn test_offset_datetime_becomes_local_datetime() {
        let mut grid = derive_grid(SpecGridShape::new(0, 0, 1, 1));
        let value = DateTime::parse_from_rfc3339("2024-05-01T08:30:00+05:30").unwrap();

        grid.on_body_cell(SpecBodyCell::new(0, 0, value)).unwrap();

        let cell = grid.cell(0, 0).unwrap();
        assert_eq!(cell.style, EnumCellStyle::DateTime);
        assert_eq!(
            cell.value,
            EnumGridValue::DateTime(value.with_timezone(&chrono::Local).naive_local())
        );
    }

    #[test]
    fn test_date_uses_date_style() {
        let mut grid = derive_grid(SpecGridShape::new(0, 0, 1, 1));
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();

        grid.on_body_cell(SpecBodyCell::new(0, 0, date)).unwrap();

        assert_eq!(grid.cell(0, 0).unwrap().style, EnumCellStyle::Date);
    }

    #[test]
    fn test_body_overwrite_policy() {
        let mut grid = derive_grid(SpecGridShape::new(0, 0, 1, 1));
        grid.on_body_cell(SpecBodyCell::new(0, 0, 1)).unwrap();
        grid.on_body_cell(SpecBodyCell::new(0, 0, 2)).unwrap();
        assert_eq!(grid.cell(0, 0).unwrap().value, EnumGridValue::Integer(2));
        assert_eq!(grid.warnings().len(), 1);

        let mut grid = SheetGrid::new(C_TEXT_HEADER_BLANK, EnumCellOverwriteRule::Error);
        grid.on_shape(SpecGridShape::new(0, 0, 1, 1)).unwrap();
        grid.on_body_cell(SpecBodyCell::new(0, 0, 1)).unwrap();
        assert!(matches!(
            grid.on_body_cell(SpecBodyCell::new(0, 0, 2)),
            Err(ReportXlsxError::CellOverwrite { row: 0, col: 0 })
        ));
    }

    #[test]
    fn test_shape_beyond_sheet_limits_is_rejected() {
        let mut grid = SheetGrid::new(C_TEXT_HEADER_BLANK, EnumCellOverwriteRule::LastWriteWins);
        let err = grid
            .on_shape(SpecGridShape::new(1, 0, N_NROWS_EXCEL_MAX, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            ReportXlsxError::ShapeExceedsSheetLimits {
                n_rows: 1_048_577,
                n_cols: 1
            }
        ));
        assert!(grid.shape().is_none());
    }

    #[test]
    fn test_row_last_col() {
        let mut grid = derive_grid(SpecGridShape::new(1, 2, 1, 3));
        assert_eq!(grid.row_last_col(0), 2);
        grid.on_header_cell(SpecHeaderCell::new(0, 4, "Last")).unwrap();
        assert_eq!(grid.row_last_col(0), 5);
        assert_eq!(grid.row_last_col(3), 0);
    }
}
