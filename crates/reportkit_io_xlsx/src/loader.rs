//! Traversal contract between a report source and a grid sink.
//!
//! A [`ReportSource`] yields events; [`load_report`] checks them against the
//! announced shape and forwards them to a [`GridSink`].

use tracing::trace;

use crate::spec::{
    EnumHeaderBoundsRule, EnumReportEvent, ReportXlsxError, SpecBodyCell, SpecGridShape,
    SpecHeaderCell, SpecLoadStats,
};

/// Lazy sequence of traversal events.
pub trait ReportSource {
    fn events(&self) -> Box<dyn Iterator<Item = Result<EnumReportEvent, ReportXlsxError>> + '_>;
}

/// Consumer of traversal events.
pub trait GridSink {
    fn on_shape(&mut self, shape: SpecGridShape) -> Result<(), ReportXlsxError>;

    fn on_header_cell(&mut self, cell: SpecHeaderCell) -> Result<(), ReportXlsxError>;

    fn on_body_cell(&mut self, cell: SpecBodyCell) -> Result<(), ReportXlsxError>;

    /// Dispatch one event to the matching callback.
    fn accept(&mut self, event: EnumReportEvent) -> Result<(), ReportXlsxError> {
        match event {
            EnumReportEvent::Shape(shape) => self.on_shape(shape),
            EnumReportEvent::Header(cell) => self.on_header_cell(cell),
            EnumReportEvent::Body(cell) => self.on_body_cell(cell),
        }
    }
}

impl ReportSource for [EnumReportEvent] {
    fn events(&self) -> Box<dyn Iterator<Item = Result<EnumReportEvent, ReportXlsxError>> + '_> {
        Box::new(self.iter().cloned().map(Ok))
    }
}

impl ReportSource for Vec<EnumReportEvent> {
    fn events(&self) -> Box<dyn Iterator<Item = Result<EnumReportEvent, ReportXlsxError>> + '_> {
        self.as_slice().events()
    }
}

/// Drive `source` into `sink`, enforcing the traversal contract.
///
/// The shape must be the first event and must not repeat. Header cells are
/// sheet-addressed and must lie in the header region selected by
/// `rule_header_bounds`, with spans that stay on the sheet and never cover
/// the body region. Body cells are body-addressed and must lie inside the
/// body region.
pub fn load_report<S, K>(
    source: &S,
    sink: &mut K,
    rule_header_bounds: EnumHeaderBoundsRule,
) -> Result<SpecLoadStats, ReportXlsxError>
where
    S: ReportSource + ?Sized,
    K: GridSink + ?Sized,
{
    let mut stats = SpecLoadStats::default();
    let mut shape_current: Option<SpecGridShape> = None;

    for event in source.events() {
        let event = event?;
        stats.n_events += 1;

        match &event {
            EnumReportEvent::Shape(_) if shape_current.is_some() => {
                return Err(ReportXlsxError::ShapeRepeated);
            }
            EnumReportEvent::Shape(shape) => {
                shape_current = Some(*shape);
            }
            EnumReportEvent::Header(cell) => {
                let shape = shape_current.ok_or(ReportXlsxError::ShapeMissing)?;
                validate_header_cell(cell, &shape, rule_header_bounds)?;
                stats.n_header_cells += 1;
            }
            EnumReportEvent::Body(cell) => {
                let shape = shape_current.ok_or(ReportXlsxError::ShapeMissing)?;
                if !shape.contains_body(cell.row, cell.col) {
                    return Err(ReportXlsxError::CellOutOfBounds {
                        region: "body",
                        row: cell.row,
                        col: cell.col,
                        shape,
                    });
                }
                stats.n_body_cells += 1;
            }
        }

        trace!(?event, "report event");
        sink.accept(event)?;
    }

    if shape_current.is_none() {
        return Err(ReportXlsxError::ShapeMissing);
    }

    Ok(stats)
}

fn validate_header_cell(
    cell: &SpecHeaderCell,
    shape: &SpecGridShape,
    rule_header_bounds: EnumHeaderBoundsRule,
) -> Result<(), ReportXlsxError> {
    let if_inside = match rule_header_bounds {
        EnumHeaderBoundsRule::Corner => shape.contains_header_corner(cell.row, cell.col),
        EnumHeaderBoundsRule::Band => shape.contains_header_band(cell.row, cell.col),
    };
    if !if_inside {
        return Err(ReportXlsxError::CellOutOfBounds {
            region: "header",
            row: cell.row,
            col: cell.col,
            shape: *shape,
        });
    }

    let err_span = || ReportXlsxError::InvalidSpan {
        row: cell.row,
        col: cell.col,
        row_span: cell.row_span,
        col_span: cell.col_span,
    };
    if cell.row_span == 0 || cell.col_span == 0 {
        return Err(err_span());
    }

    let n_row_last = cell.row + cell.row_span - 1;
    let n_col_last = cell.col + cell.col_span - 1;
    let if_span_inside = match rule_header_bounds {
        EnumHeaderBoundsRule::Corner => shape.contains_header_corner(n_row_last, n_col_last),
        EnumHeaderBoundsRule::Band => {
            n_row_last < shape.n_rows_total()
                && n_col_last < shape.n_cols_total()
                && !(n_row_last >= shape.n_rows_header && n_col_last >= shape.n_cols_header)
        }
    };
    if !if_span_inside {
        return Err(err_span());
    }

    Ok(())
}
