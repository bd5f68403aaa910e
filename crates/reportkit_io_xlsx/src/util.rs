//! Stateless helper utilities used by the report renderer.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime};

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::spec::{EnumGridValue, ReportXlsxError, SpecHeaderCell};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Drop the offset of `value`, keeping the instant as local wall-clock time.
pub fn convert_offset_to_local(value: &DateTime<FixedOffset>) -> NaiveDateTime {
    value.with_timezone(&Local).naive_local()
}

/// Estimate displayed width units for one grid value.
///
/// Used by autofit inference logic.
pub fn estimate_width_len(value: &EnumGridValue) -> usize {
    match value {
        EnumGridValue::Blank => 0,
        EnumGridValue::String(s) => estimate_unicode_string_width(s),
        EnumGridValue::Integer(n) => n.to_string().len(),
        EnumGridValue::Float(n) => {
            if n.is_finite() && n.fract() != 0.0 {
                format!("{n:.4}").trim_end_matches('0').len()
            } else {
                n.to_string().len()
            }
        }
        EnumGridValue::Boolean(b) => {
            if *b {
                4
            } else {
                5
            }
        }
        EnumGridValue::Date(_) => 10,
        EnumGridValue::DateTime(_) => 19,
    }
}

fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().trim_matches('\'').to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Zero-based column index to letters (`0 -> A`, `26 -> AA`).
pub fn derive_column_letters(col_idx: usize) -> String {
    let mut l_chars = Vec::new();
    let mut n_rest = col_idx + 1;
    while n_rest > 0 {
        let n_rem = (n_rest - 1) % 26;
        l_chars.push((b'A' + n_rem as u8) as char);
        n_rest = (n_rest - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

pub fn cast_row_num(value: usize) -> Result<u32, ReportXlsxError> {
    u32::try_from(value)
        .map_err(|_| ReportXlsxError::InvalidPolicy(format!("row index overflow: {value}")))
}

pub fn cast_col_num(value: usize) -> Result<u16, ReportXlsxError> {
    u16::try_from(value)
        .map_err(|_| ReportXlsxError::InvalidPolicy(format!("column index overflow: {value}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HeaderMergeUtils

/// Plan header cells for a label grid, collapsing runs of equal adjacent
/// non-empty labels in a row into one cell with a column span.
///
/// `col_offset` shifts every planned column; empty labels are skipped.
pub fn plan_header_runs(header_grid: &[Vec<String>], col_offset: usize) -> Vec<SpecHeaderCell> {
    let mut l_header_cells = Vec::new();

    for (row_idx, row_values) in header_grid.iter().enumerate() {
        let n_cols = row_values.len();
        let mut n_col_idx = 0;

        while n_col_idx < n_cols {
            let c_cell_val = &row_values[n_col_idx];
            if c_cell_val.is_empty() {
                n_col_idx += 1;
                continue;
            }

            let mut n_col_idx_end = n_col_idx + 1;
            while n_col_idx_end < n_cols && row_values[n_col_idx_end] == *c_cell_val {
                n_col_idx_end += 1;
            }

            l_header_cells.push(
                SpecHeaderCell::new(row_idx, col_offset + n_col_idx, c_cell_val.clone())
                    .with_span(1, n_col_idx_end - n_col_idx),
            );
            n_col_idx = n_col_idx_end;
        }
    }

    l_header_cells
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
