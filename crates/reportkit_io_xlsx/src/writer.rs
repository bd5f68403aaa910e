//! XLSX renderer that materializes a report grid into workbook bytes.

use std::io::Write;

use rust_xlsxwriter::{Format, FormatAlign, FormatPattern, Workbook, Worksheet};
use tracing::debug;

use crate::grid::SheetGrid;
use crate::loader::{ReportSource, load_report};
use crate::spec::{
    EnumAutofitColumnsRule, EnumCellStyle, EnumGridValue, ReportXlsxError, SpecAutofitCellsPolicy,
    SpecCellFormat, SpecRenderReport, SpecReportWriteOptions,
};
use crate::util::{cast_col_num, cast_row_num, estimate_width_len, sanitize_sheet_name};

/// Formats created once per document and shared by every cell write.
#[derive(Debug, Clone)]
pub struct SpecReportStyleSet {
    pub fmt_header: Format,
    pub fmt_date: Format,
    pub fmt_datetime: Format,
}

impl SpecReportStyleSet {
    pub fn new(options: &SpecReportWriteOptions) -> Self {
        Self {
            fmt_header: derive_rust_xlsx_format(&options.fmt_header),
            fmt_date: Format::new().set_num_format(&options.formats.date_format),
            fmt_datetime: Format::new().set_num_format(&options.formats.datetime_format),
        }
    }

    /// Backend format of a style slot; `None` for unformatted cells.
    pub fn resolve(&self, style: EnumCellStyle) -> Option<&Format> {
        match style {
            EnumCellStyle::Default => None,
            EnumCellStyle::Header => Some(&self.fmt_header),
            EnumCellStyle::Date => Some(&self.fmt_date),
            EnumCellStyle::DateTime => Some(&self.fmt_datetime),
        }
    }
}

/// One-shot renderer of a report into a single-sheet workbook.
///
/// The workbook is built in memory; the sink receives the serialized bytes
/// exactly once, after the whole grid has been materialized. A failed render
/// writes nothing.
pub struct ReportXlsxWriter<W: Write> {
    sink: W,
    sheet_name: String,
    options: SpecReportWriteOptions,
}

impl<W: Write> ReportXlsxWriter<W> {
    /// Create a renderer writing to `sink` under `sheet_name`.
    pub fn new(
        sink: W,
        sheet_name: &str,
        options: SpecReportWriteOptions,
    ) -> Result<Self, ReportXlsxError> {
        if sheet_name.trim().is_empty() {
            return Err(ReportXlsxError::ArgumentMissing("sheet_name"));
        }
        validate_policy_autofit(&options.policy_autofit)?;

        Ok(Self {
            sink,
            sheet_name: sanitize_sheet_name(sheet_name, "_"),
            options,
        })
    }

    /// Sanitized sheet name.
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Traverse `source`, build the sheet and write the workbook to the sink.
    pub fn render<S>(mut self, source: &S) -> Result<SpecRenderReport, ReportXlsxError>
    where
        S: ReportSource + ?Sized,
    {
        let styles = SpecReportStyleSet::new(&self.options);
        let mut grid = SheetGrid::new(
            self.options.blank_header_text.clone(),
            self.options.rule_overwrite,
        );

        let stats = load_report(source, &mut grid, self.options.rule_header_bounds)?;
        let shape = grid.shape().ok_or(ReportXlsxError::ShapeMissing)?;

        let mut report = SpecRenderReport {
            sheet_name: self.sheet_name.clone(),
            shape,
            stats,
            n_merges: grid.merges().len(),
            ..Default::default()
        };
        for c_warning in grid.warnings() {
            report.warn(c_warning);
        }

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&self.sheet_name)?;

        debug!(
            sheet_name = %self.sheet_name,
            n_cells = grid.len(),
            n_merges = grid.merges().len(),
            "materializing grid"
        );
        write_grid(worksheet, &grid, &styles)?;

        report.widths_by_col = plan_column_widths(&grid, &self.options.policy_autofit);
        for (n_col, n_width) in &report.widths_by_col {
            worksheet.set_column_width(cast_col_num(*n_col)?, *n_width)?;
        }

        let v_bytes = workbook.save_to_buffer()?;
        self.sink.write_all(&v_bytes)?;
        self.sink.flush()?;

        report.n_bytes = v_bytes.len();
        debug!(n_bytes = report.n_bytes, "workbook written");
        Ok(report)
    }
}

/// Render `source` into an in-memory workbook.
pub fn render_report_to_bytes<S>(
    source: &S,
    sheet_name: &str,
    options: SpecReportWriteOptions,
) -> Result<(Vec<u8>, SpecRenderReport), ReportXlsxError>
where
    S: ReportSource + ?Sized,
{
    let mut v_bytes = Vec::new();
    let report = ReportXlsxWriter::new(&mut v_bytes, sheet_name, options)?.render(source)?;
    Ok((v_bytes, report))
}

/// Plan `(column, width)` for every column spanned by sheet row 0.
///
/// Cells inside merges wider than one column do not count toward widths.
pub fn plan_column_widths(grid: &SheetGrid, policy: &SpecAutofitCellsPolicy) -> Vec<(usize, f64)> {
    if matches!(policy.rule_columns, EnumAutofitColumnsRule::None) {
        return vec![];
    }

    let n_cols = grid.row_last_col(0);
    let mut l_width_by_col = vec![0usize; n_cols];

    for ((n_row, n_col), cell) in grid.iter_cells() {
        if *n_col >= n_cols {
            continue;
        }
        let if_counted = match policy.rule_columns {
            EnumAutofitColumnsRule::Header => cell.if_header,
            EnumAutofitColumnsRule::Body => !cell.if_header,
            EnumAutofitColumnsRule::All | EnumAutofitColumnsRule::None => true,
        };
        if !if_counted {
            continue;
        }
        if grid
            .merge_at(*n_row, *n_col)
            .is_some_and(|region| region.width() > 1)
        {
            continue;
        }
        l_width_by_col[*n_col] = usize::max(l_width_by_col[*n_col], estimate_width_len(&cell.value));
    }

    let n_min = usize::max(1, policy.width_cell_min);
    let n_max = usize::min(255, usize::max(n_min, policy.width_cell_max));
    let n_pad = policy.width_cell_padding;

    l_width_by_col
        .into_iter()
        .enumerate()
        .map(|(n_col, n_width)| {
            let n_width_final = usize::min(n_max, usize::max(n_min, n_width + n_pad));
            (n_col, n_width_final as f64)
        })
        .collect()
}

fn write_grid(
    worksheet: &mut Worksheet,
    grid: &SheetGrid,
    styles: &SpecReportStyleSet,
) -> Result<(), ReportXlsxError> {
    for ((n_row, n_col), cell) in grid.iter_cells() {
        if grid.merge_at(*n_row, *n_col).is_some() {
            continue;
        }
        write_cell_with_format(
            worksheet,
            *n_row,
            *n_col,
            &cell.value,
            styles.resolve(cell.style),
        )?;
    }

    for region in grid.merges() {
        let c_text = match grid.cell(region.row_first, region.col_first).map(|c| &c.value) {
            Some(EnumGridValue::String(val)) => val.as_str(),
            _ => "",
        };
        worksheet.merge_range(
            cast_row_num(region.row_first)?,
            cast_col_num(region.col_first)?,
            cast_row_num(region.row_last)?,
            cast_col_num(region.col_last)?,
            c_text,
            &styles.fmt_header,
        )?;
    }

    let freeze_pane = grid.freeze_pane();
    if freeze_pane.n_rows > 0 || freeze_pane.n_cols > 0 {
        worksheet.set_freeze_panes(
            cast_row_num(freeze_pane.n_rows)?,
            cast_col_num(freeze_pane.n_cols)?,
        )?;
    }

    Ok(())
}

/// Write one cell value with an optional format.
///
/// Integers are stored as Excel numbers (IEEE doubles), so magnitudes above
/// 2^53 lose precision.
fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumGridValue,
    format: Option<&Format>,
) -> Result<(), ReportXlsxError> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;

    match (value, format) {
        (EnumGridValue::Blank, Some(fmt)) => {
            worksheet.write_blank(n_row, n_col, fmt)?;
        }
        (EnumGridValue::Blank, None) => {}
        (EnumGridValue::String(val), Some(fmt)) if val.is_empty() => {
            worksheet.write_blank(n_row, n_col, fmt)?;
        }
        (EnumGridValue::String(val), None) if val.is_empty() => {}
        (EnumGridValue::String(val), Some(fmt)) => {
            worksheet.write_string_with_format(n_row, n_col, val, fmt)?;
        }
        (EnumGridValue::String(val), None) => {
            worksheet.write_string(n_row, n_col, val)?;
        }
        (EnumGridValue::Integer(val), Some(fmt)) => {
            worksheet.write_number_with_format(n_row, n_col, *val as f64, fmt)?;
        }
        (EnumGridValue::Integer(val), None) => {
            worksheet.write_number(n_row, n_col, *val as f64)?;
        }
        (EnumGridValue::Float(val), Some(fmt)) => {
            worksheet.write_number_with_format(n_row, n_col, *val, fmt)?;
        }
        (EnumGridValue::Float(val), None) => {
            worksheet.write_number(n_row, n_col, *val)?;
        }
        (EnumGridValue::Boolean(val), Some(fmt)) => {
            worksheet.write_boolean_with_format(n_row, n_col, *val, fmt)?;
        }
        (EnumGridValue::Boolean(val), None) => {
            worksheet.write_boolean(n_row, n_col, *val)?;
        }
        (EnumGridValue::Date(val), Some(fmt)) => {
            worksheet.write_datetime_with_format(n_row, n_col, *val, fmt)?;
        }
        (EnumGridValue::Date(val), None) => {
            worksheet.write_datetime(n_row, n_col, *val)?;
        }
        (EnumGridValue::DateTime(val), Some(fmt)) => {
            worksheet.write_datetime_with_format(n_row, n_col, *val, fmt)?;
        }
        (EnumGridValue::DateTime(val), None) => {
            worksheet.write_datetime(n_row, n_col, *val)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if spec.fill_solid.unwrap_or(false) {
        format = format.set_pattern(FormatPattern::Solid);
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    format
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        "vjustify" | "vertical_justify" => Some(FormatAlign::VerticalJustify),
        "vdistributed" | "vertical_distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), ReportXlsxError> {
    if policy_autofit.width_cell_min == 0 {
        return Err(ReportXlsxError::InvalidPolicy(
            "policy_autofit.width_cell_min must be >= 1.".to_string(),
        ));
    }
    if policy_autofit.width_cell_max < policy_autofit.width_cell_min {
        return Err(ReportXlsxError::InvalidPolicy(
            "policy_autofit.width_cell_max must be >= policy_autofit.width_cell_min.".to_string(),
        ));
    }
    Ok(())
}
