//! Report grid models, options and errors.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use polars::prelude::PolarsError;
use rust_xlsxwriter::XlsxError;
use thiserror::Error;

use crate::conf::{
    C_NUM_FORMAT_DATE_ISO, C_NUM_FORMAT_DATETIME_ISO, C_TEXT_HEADER_BLANK,
    derive_default_header_format,
};
use crate::util::derive_column_letters;

////////////////////////////////////////////////////////////////////////////////
// #region GridModel

/// Header and body dimensions of one rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SpecGridShape {
    /// Rows reserved for column labels.
    pub n_rows_header: usize,
    /// Columns reserved for row labels.
    pub n_cols_header: usize,
    /// Data rows below the header.
    pub n_rows_body: usize,
    /// Data columns right of the header.
    pub n_cols_body: usize,
}

impl SpecGridShape {
    pub fn new(
        n_rows_header: usize,
        n_cols_header: usize,
        n_rows_body: usize,
        n_cols_body: usize,
    ) -> Self {
        Self {
            n_rows_header,
            n_cols_header,
            n_rows_body,
            n_cols_body,
        }
    }

    /// Sheet row count (`header + body`).
    pub fn n_rows_total(&self) -> usize {
        self.n_rows_header + self.n_rows_body
    }

    /// Sheet column count (`header + body`).
    pub fn n_cols_total(&self) -> usize {
        self.n_cols_header + self.n_cols_body
    }

    /// Whether body-relative `(row, col)` lies inside the body region.
    pub fn contains_body(&self, row: usize, col: usize) -> bool {
        row < self.n_rows_body && col < self.n_cols_body
    }

    /// Whether sheet `(row, col)` lies inside the top-left header corner.
    pub fn contains_header_corner(&self, row: usize, col: usize) -> bool {
        row < self.n_rows_header && col < self.n_cols_header
    }

    /// Whether sheet `(row, col)` lies in the column-label rows or row-label columns.
    pub fn contains_header_band(&self, row: usize, col: usize) -> bool {
        row < self.n_rows_total()
            && col < self.n_cols_total()
            && (row < self.n_rows_header || col < self.n_cols_header)
    }
}

/// One header label, addressed in sheet coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecHeaderCell {
    pub row: usize,
    pub col: usize,
    /// Label text; `None` renders as the blank-header placeholder.
    pub label: Option<String>,
    /// Rows covered, `>= 1`.
    pub row_span: usize,
    /// Columns covered, `>= 1`.
    pub col_span: usize,
}

impl SpecHeaderCell {
    /// Single-cell header with a label.
    pub fn new(row: usize, col: usize, label: impl Into<String>) -> Self {
        Self {
            row,
            col,
            label: Some(label.into()),
            row_span: 1,
            col_span: 1,
        }
    }

    /// Single-cell header without a label.
    pub fn unlabeled(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            label: None,
            row_span: 1,
            col_span: 1,
        }
    }

    /// Return the same header covering `row_span x col_span` cells.
    pub fn with_span(mut self, row_span: usize, col_span: usize) -> Self {
        self.row_span = row_span;
        self.col_span = col_span;
        self
    }

    /// Merged region covered by this header, `None` for a `1x1` span.
    pub fn merge_region(&self) -> Option<SpecMergeRegion> {
        if self.row_span <= 1 && self.col_span <= 1 {
            return None;
        }
        Some(SpecMergeRegion {
            row_first: self.row,
            col_first: self.col,
            row_last: self.row + self.row_span.max(1) - 1,
            col_last: self.col + self.col_span.max(1) - 1,
        })
    }
}

/// One data value, addressed relative to the body region.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecBodyCell {
    pub row: usize,
    pub col: usize,
    pub value: EnumReportValue,
}

impl SpecBodyCell {
    pub fn new(row: usize, col: usize, value: impl Into<EnumReportValue>) -> Self {
        Self {
            row,
            col,
            value: value.into(),
        }
    }
}

/// Typed value of a body cell.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumReportValue {
    /// Missing value.
    Absent,
    /// Text value.
    String(String),
    /// Integer value. Written as an Excel number, exact up to 2^53.
    Integer(i64),
    /// Floating-point value.
    Float(f64),
    /// Boolean value.
    Boolean(bool),
    /// Calendar date without time of day.
    Date(NaiveDate),
    /// Date and time without offset.
    DateTime(NaiveDateTime),
    /// Date and time with a UTC offset.
    DateTimeOffset(DateTime<FixedOffset>),
}

impl From<&str> for EnumReportValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnumReportValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for EnumReportValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for EnumReportValue {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for EnumReportValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for EnumReportValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<NaiveDate> for EnumReportValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for EnumReportValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<DateTime<FixedOffset>> for EnumReportValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTimeOffset(value)
    }
}

impl<T: Into<EnumReportValue>> From<Option<T>> for EnumReportValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

/// JSON scalars convert; arrays and objects are rejected.
impl TryFrom<&serde_json::Value> for EnumReportValue {
    type Error = ReportXlsxError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        match value {
            Value::Null => Ok(Self::Absent),
            Value::Bool(val) => Ok(Self::Boolean(*val)),
            Value::String(val) => Ok(Self::String(val.clone())),
            Value::Number(val) => {
                if let Some(n) = val.as_i64() {
                    Ok(Self::Integer(n))
                } else if let Some(n) = val.as_f64() {
                    Ok(Self::Float(n))
                } else {
                    Err(ReportXlsxError::UnsupportedValueType(format!(
                        "json number {val}"
                    )))
                }
            }
            Value::Array(_) => Err(ReportXlsxError::UnsupportedValueType(
                "json array".to_string(),
            )),
            Value::Object(_) => Err(ReportXlsxError::UnsupportedValueType(
                "json object".to_string(),
            )),
        }
    }
}

/// One announcement of the traversal driver.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumReportEvent {
    /// Grid shape; must come first and exactly once.
    Shape(SpecGridShape),
    /// Header label in sheet coordinates.
    Header(SpecHeaderCell),
    /// Body value in body coordinates.
    Body(SpecBodyCell),
}

impl From<SpecGridShape> for EnumReportEvent {
    fn from(value: SpecGridShape) -> Self {
        Self::Shape(value)
    }
}

impl From<SpecHeaderCell> for EnumReportEvent {
    fn from(value: SpecHeaderCell) -> Self {
        Self::Header(value)
    }
}

impl From<SpecBodyCell> for EnumReportEvent {
    fn from(value: SpecBodyCell) -> Self {
        Self::Body(value)
    }
}

/// Inclusive rectangular merge in sheet coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecMergeRegion {
    pub row_first: usize,
    pub col_first: usize,
    pub row_last: usize,
    pub col_last: usize,
}

impl SpecMergeRegion {
    /// Region covering the single cell `(row, col)`.
    pub fn cell(row: usize, col: usize) -> Self {
        Self {
            row_first: row,
            col_first: col,
            row_last: row,
            col_last: col,
        }
    }

    /// Whether both regions share at least one cell.
    pub fn overlaps(&self, other: &SpecMergeRegion) -> bool {
        self.row_first <= other.row_last
            && other.row_first <= self.row_last
            && self.col_first <= other.col_last
            && other.col_first <= self.col_last
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.row_first..=self.row_last).contains(&row)
            && (self.col_first..=self.col_last).contains(&col)
    }

    /// Number of columns covered.
    pub fn width(&self) -> usize {
        self.col_last - self.col_first + 1
    }
}

impl fmt::Display for SpecMergeRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}:{}{}",
            derive_column_letters(self.col_first),
            self.row_first + 1,
            derive_column_letters(self.col_last),
            self.row_last + 1
        )
    }
}

/// Freeze boundary in (columns, rows) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SpecFreezePane {
    pub n_cols: usize,
    pub n_rows: usize,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellFormat

/// Declarative cell format, converted to a backend format at write time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Solid fill pattern.
    pub fill_solid: Option<bool>,
    /// Font color.
    pub font_color: Option<String>,
}

/// Style slot a cell refers to. Each slot resolves to one format per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnumCellStyle {
    /// No explicit format.
    #[default]
    Default,
    /// Header label format.
    Header,
    /// Date-only number format.
    Date,
    /// Date+time number format.
    DateTime,
}

/// Concrete value stored in a sheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumGridValue {
    /// Cell exists but holds nothing.
    Blank,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// Materialized sheet cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecGridCell {
    pub value: EnumGridValue,
    pub style: EnumCellStyle,
    /// Set for cells written from the header region.
    pub if_header: bool,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Number formats supplied by the formatting locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecNumberFormatLocale {
    /// Date-only format code.
    pub date_format: String,
    /// Date+time format code.
    pub datetime_format: String,
}

impl Default for SpecNumberFormatLocale {
    fn default() -> Self {
        Self {
            date_format: C_NUM_FORMAT_DATE_ISO.to_string(),
            datetime_format: C_NUM_FORMAT_DATETIME_ISO.to_string(),
        }
    }
}

/// Autofit rule for column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumAutofitColumnsRule {
    /// Disable autofit.
    None,
    /// Infer width from header cells only.
    Header,
    /// Infer width from body cells only.
    Body,
    /// Infer width from every cell of the column (default).
    #[default]
    All,
}

/// Autofit policy applied at finalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Autofit width inference rule.
    pub rule_columns: EnumAutofitColumnsRule,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            rule_columns: EnumAutofitColumnsRule::All,
            width_cell_min: 8,
            width_cell_max: 60,
            width_cell_padding: 2,
        }
    }
}

/// Policy for two body writes targeting the same coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumCellOverwriteRule {
    /// Keep the latest value (default).
    #[default]
    LastWriteWins,
    /// Fail with [`ReportXlsxError::CellOverwrite`].
    Error,
}

/// Where header cells may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumHeaderBoundsRule {
    /// Only inside `[0, header rows) x [0, header columns)`.
    Corner,
    /// Anywhere in the header rows or the header columns (default).
    #[default]
    Band,
}

/// Renderer-wide options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecReportWriteOptions {
    /// Date/date-time number formats.
    pub formats: SpecNumberFormatLocale,
    /// Header cell format.
    pub fmt_header: SpecCellFormat,
    /// Text written for unlabeled headers.
    pub blank_header_text: String,
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
    /// Body overwrite policy.
    pub rule_overwrite: EnumCellOverwriteRule,
    /// Header placement policy.
    pub rule_header_bounds: EnumHeaderBoundsRule,
}

impl Default for SpecReportWriteOptions {
    fn default() -> Self {
        Self {
            formats: SpecNumberFormatLocale::default(),
            fmt_header: derive_default_header_format(),
            blank_header_text: C_TEXT_HEADER_BLANK.to_string(),
            policy_autofit: SpecAutofitCellsPolicy::default(),
            rule_overwrite: EnumCellOverwriteRule::LastWriteWins,
            rule_header_bounds: EnumHeaderBoundsRule::Band,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Report

/// Counters collected while driving a source into a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecLoadStats {
    pub n_events: usize,
    pub n_header_cells: usize,
    pub n_body_cells: usize,
}

/// Per-render report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRenderReport {
    /// Sheet name written to the workbook.
    pub sheet_name: String,
    /// Announced grid shape.
    pub shape: SpecGridShape,
    /// Load counters.
    pub stats: SpecLoadStats,
    /// Number of merged regions.
    pub n_merges: usize,
    /// Final `(column, width)` pairs set by autofit.
    pub widths_by_col: Vec<(usize, f64)>,
    /// Serialized document size.
    pub n_bytes: usize,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecRenderReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Errors raised while building or rendering a report.
#[derive(Debug, Error)]
pub enum ReportXlsxError {
    /// Required constructor argument was not provided.
    #[error("Missing required argument: {0}")]
    ArgumentMissing(&'static str),
    /// Value outside the supported set of cell kinds.
    #[error("Unsupported cell value type: {0}")]
    UnsupportedValueType(String),
    /// Header overlaps an earlier merged region or labelled header cell.
    #[error("Merged region {region} overlaps existing merged region {existing}")]
    OverlappingMergeRegion {
        region: SpecMergeRegion,
        existing: SpecMergeRegion,
    },
    /// Body cell addressed inside a header merge.
    #[error("Body cell ({row}, {col}) lies inside merged region {region}")]
    BodyCellInsideMerge {
        row: usize,
        col: usize,
        region: SpecMergeRegion,
    },
    /// A cell arrived before the grid shape.
    #[error("Grid shape must be announced before any cell")]
    ShapeMissing,
    /// The grid shape was announced twice.
    #[error("Grid shape announced more than once")]
    ShapeRepeated,
    /// Cell coordinate outside its region.
    #[error("{region} cell ({row}, {col}) lies outside the {region} region of {shape:?}")]
    CellOutOfBounds {
        region: &'static str,
        row: usize,
        col: usize,
        shape: SpecGridShape,
    },
    /// Header span is zero, leaves its header region or reaches the body.
    #[error("Invalid header span {row_span}x{col_span} at ({row}, {col})")]
    InvalidSpan {
        row: usize,
        col: usize,
        row_span: usize,
        col_span: usize,
    },
    /// Shape does not fit on one worksheet.
    #[error("Grid of {n_rows} rows x {n_cols} columns exceeds worksheet limits")]
    ShapeExceedsSheetLimits { n_rows: usize, n_cols: usize },
    /// Second body write to a coordinate under [`EnumCellOverwriteRule::Error`].
    #[error("Cell ({row}, {col}) was already written")]
    CellOverwrite { row: usize, col: usize },
    /// Invalid option value.
    #[error("{0}")]
    InvalidPolicy(String),
    /// Spreadsheet backend failure.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] XlsxError),
    /// Output sink failure.
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    /// DataFrame access failure.
    #[error("DataFrame error: {0}")]
    DataFrame(#[from] PolarsError),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
