//! `reportkit_io_xlsx` v1:
//! Renders hierarchical tabular reports into single-sheet XLSX workbooks.
//!
//! Modules:
//! - `conf`   : constants and default presets
//! - `spec`   : grid models, options and errors
//! - `util`   : pure helper functions
//! - `loader` : source/sink traversal contract
//! - `grid`   : sparse sheet model filled by traversal callbacks
//! - `source` : `DataFrame`-backed report source
//! - `writer` : workbook renderer
pub mod conf;
pub mod grid;
pub mod loader;
pub mod source;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_NUM_FORMAT_DATE_ISO, C_NUM_FORMAT_DATETIME_ISO, C_TEXT_HEADER_BLANK,
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
    derive_default_header_format, derive_default_report_write_options,
    derive_number_formats_for_locale,
};
pub use grid::SheetGrid;
pub use loader::{GridSink, ReportSource, load_report};
pub use source::{DataFrameReportSource, derive_report_value_from_any_value};
pub use spec::{
    EnumAutofitColumnsRule, EnumCellOverwriteRule, EnumCellStyle, EnumGridValue,
    EnumHeaderBoundsRule, EnumReportEvent, EnumReportValue, ReportXlsxError,
    SpecAutofitCellsPolicy, SpecBodyCell, SpecCellFormat, SpecFreezePane, SpecGridCell,
    SpecGridShape, SpecHeaderCell, SpecLoadStats, SpecMergeRegion, SpecNumberFormatLocale,
    SpecRenderReport, SpecReportWriteOptions,
};
pub use util::{plan_header_runs, sanitize_sheet_name};
pub use writer::{
    ReportXlsxWriter, SpecReportStyleSet, plan_column_widths, render_report_to_bytes,
};
