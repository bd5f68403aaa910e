//! Report source backed by a Polars `DataFrame`.

use std::io::Cursor;

use chrono::{DateTime, NaiveDate};
use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader, TimeUnit};

use crate::loader::ReportSource;
use crate::spec::{
    EnumReportEvent, EnumReportValue, ReportXlsxError, SpecBodyCell, SpecGridShape,
    SpecHeaderCell,
};
use crate::util::plan_header_runs;

/// Days between `0001-01-01` and `1970-01-01`.
const N_DAYS_CE_TO_UNIX_EPOCH: i32 = 719_163;

/// Tabular report over a `DataFrame`.
///
/// The first `n_cols_row_header` columns become row labels (header cells in
/// the header columns), the remaining columns become body values. Column
/// labels come from the column names, or from a custom header grid whose
/// equal adjacent labels are merged.
#[derive(Debug, Clone)]
pub struct DataFrameReportSource {
    df_data: DataFrame,
    header_grid: Vec<Vec<String>>,
    n_cols_row_header: usize,
}

impl DataFrameReportSource {
    pub fn new(df_data: DataFrame) -> Self {
        let l_colnames: Vec<String> = df_data
            .get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        Self {
            df_data,
            header_grid: vec![l_colnames],
            n_cols_row_header: 0,
        }
    }

    /// Read `v_ipc_df` as Polars IPC bytes.
    pub fn from_ipc_bytes(v_ipc_df: &[u8]) -> Result<Self, ReportXlsxError> {
        Ok(Self::new(derive_dataframe_from_ipc_bytes(v_ipc_df)?))
    }

    /// Use the leading `n_cols` columns as row labels.
    pub fn with_row_header_columns(mut self, n_cols: usize) -> Result<Self, ReportXlsxError> {
        if n_cols > self.df_data.width() {
            return Err(ReportXlsxError::InvalidPolicy(format!(
                "n_cols_row_header={n_cols} exceeds DataFrame width {}.",
                self.df_data.width()
            )));
        }
        self.n_cols_row_header = n_cols;
        Ok(self)
    }

    /// Replace column-name labels with a multi-row header `DataFrame`.
    ///
    /// `df_header` must have `>= 1` row and the same width as the data.
    pub fn with_header(mut self, df_header: &DataFrame) -> Result<Self, ReportXlsxError> {
        if df_header.height() == 0 {
            return Err(ReportXlsxError::InvalidPolicy(
                "df_header must have >= 1 row (0-row header is not allowed).".to_string(),
            ));
        }
        if df_header.width() != self.df_data.width() {
            return Err(ReportXlsxError::InvalidPolicy(
                "df_header.width must equal df.width.".to_string(),
            ));
        }
        self.header_grid = derive_string_grid_from_dataframe(df_header)?;
        Ok(self)
    }

    pub fn shape(&self) -> SpecGridShape {
        SpecGridShape::new(
            self.header_grid.len(),
            self.n_cols_row_header,
            self.df_data.height(),
            self.df_data.width() - self.n_cols_row_header,
        )
    }

    fn derive_row_events(&self, n_row: usize) -> Vec<Result<EnumReportEvent, ReportXlsxError>> {
        let n_rows_header = self.header_grid.len();
        self.df_data
            .get_columns()
            .iter()
            .enumerate()
            .map(|(n_col, col)| -> Result<EnumReportEvent, ReportXlsxError> {
                let value = col.get(n_row)?;
                if n_col < self.n_cols_row_header {
                    Ok(SpecHeaderCell {
                        row: n_rows_header + n_row,
                        col: n_col,
                        label: derive_header_text_from_any_value(value),
                        row_span: 1,
                        col_span: 1,
                    }
                    .into())
                } else {
                    Ok(SpecBodyCell {
                        row: n_row,
                        col: n_col - self.n_cols_row_header,
                        value: derive_report_value_from_any_value(value)?,
                    }
                    .into())
                }
            })
            .collect()
    }
}

impl ReportSource for DataFrameReportSource {
    fn events(&self) -> Box<dyn Iterator<Item = Result<EnumReportEvent, ReportXlsxError>> + '_> {
        let l_header_events = plan_header_runs(&self.header_grid, 0)
            .into_iter()
            .map(|cell| Ok(EnumReportEvent::Header(cell)));
        let iter_rows = (0..self.df_data.height()).flat_map(|n_row| self.derive_row_events(n_row));

        Box::new(
            std::iter::once(Ok(EnumReportEvent::Shape(self.shape())))
                .chain(l_header_events)
                .chain(iter_rows),
        )
    }
}

/// Convert one `AnyValue` into a report value.
///
/// Nested, binary and other non-scalar dtypes are rejected.
pub fn derive_report_value_from_any_value(
    value: AnyValue<'_>,
) -> Result<EnumReportValue, ReportXlsxError> {
    let value = match value {
        AnyValue::Null => EnumReportValue::Absent,
        AnyValue::String(val) => EnumReportValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumReportValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumReportValue::Boolean(val),
        AnyValue::UInt8(val) => EnumReportValue::Integer(val as i64),
        AnyValue::UInt16(val) => EnumReportValue::Integer(val as i64),
        AnyValue::UInt32(val) => EnumReportValue::Integer(val as i64),
        AnyValue::UInt64(val) => i64::try_from(val)
            .map(EnumReportValue::Integer)
            .unwrap_or(EnumReportValue::Float(val as f64)),
        AnyValue::Int8(val) => EnumReportValue::Integer(val as i64),
        AnyValue::Int16(val) => EnumReportValue::Integer(val as i64),
        AnyValue::Int32(val) => EnumReportValue::Integer(val as i64),
        AnyValue::Int64(val) => EnumReportValue::Integer(val),
        AnyValue::Int128(val) => i64::try_from(val)
            .map(EnumReportValue::Integer)
            .unwrap_or(EnumReportValue::Float(val as f64)),
        AnyValue::Float32(val) => EnumReportValue::Float(val as f64),
        AnyValue::Float64(val) => EnumReportValue::Float(val),
        AnyValue::Date(n_days) => derive_date_from_days(n_days)?,
        AnyValue::Datetime(val, time_unit, time_zone) => {
            derive_datetime_from_timestamp(val, time_unit, time_zone.is_some())?
        }
        AnyValue::DatetimeOwned(val, time_unit, time_zone) => {
            derive_datetime_from_timestamp(val, time_unit, time_zone.is_some())?
        }
        other => {
            return Err(ReportXlsxError::UnsupportedValueType(
                other.dtype().to_string(),
            ));
        }
    };
    Ok(value)
}

fn derive_date_from_days(n_days: i32) -> Result<EnumReportValue, ReportXlsxError> {
    n_days
        .checked_add(N_DAYS_CE_TO_UNIX_EPOCH)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map(EnumReportValue::Date)
        .ok_or_else(|| ReportXlsxError::UnsupportedValueType(format!("date out of range: {n_days}")))
}

/// Timezone-aware timestamps are UTC instants and keep a `+00:00` offset.
fn derive_datetime_from_timestamp(
    val: i64,
    time_unit: TimeUnit,
    if_tz_aware: bool,
) -> Result<EnumReportValue, ReportXlsxError> {
    let datetime_utc = match time_unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(val)),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(val),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(val),
    }
    .ok_or_else(|| {
        ReportXlsxError::UnsupportedValueType(format!("datetime out of range: {val}"))
    })?;

    if if_tz_aware {
        Ok(EnumReportValue::DateTimeOffset(datetime_utc.fixed_offset()))
    } else {
        Ok(EnumReportValue::DateTime(datetime_utc.naive_utc()))
    }
}

fn derive_dataframe_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<DataFrame, ReportXlsxError> {
    Ok(IpcReader::new(Cursor::new(v_ipc_df)).finish()?)
}

fn derive_string_grid_from_dataframe(df: &DataFrame) -> Result<Vec<Vec<String>>, ReportXlsxError> {
    let n_height = df.height();
    let n_width = df.width();
    let l_cols = df.get_columns();

    let mut l_grid = vec![vec![String::new(); n_width]; n_height];
    for (idx_row, val_row) in l_grid.iter_mut().enumerate() {
        for (idx_col, val_cell) in val_row.iter_mut().enumerate() {
            let value = l_cols[idx_col].get(idx_row)?;
            *val_cell = derive_header_text_from_any_value(value).unwrap_or_default();
        }
    }

    Ok(l_grid)
}

fn derive_header_text_from_any_value(value: AnyValue<'_>) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(val) => Some(val.to_string()),
        AnyValue::StringOwned(val) => Some(val.to_string()),
        _ => Some(value.to_string()),
    }
}
