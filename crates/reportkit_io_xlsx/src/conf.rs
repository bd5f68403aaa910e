//! XLSX constants and default preset factories.

use crate::spec::{SpecCellFormat, SpecNumberFormatLocale, SpecReportWriteOptions};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Text written into a header cell whose label is absent.
pub const C_TEXT_HEADER_BLANK: &str = "(blank)";
/// Solid fill color of header cells.
pub const C_COLOR_HEADER_FILL: &str = "#C0C0C0";

/// ISO date-only number format.
pub const C_NUM_FORMAT_DATE_ISO: &str = "yyyy-mm-dd";
/// ISO date+time number format.
pub const C_NUM_FORMAT_DATETIME_ISO: &str = "yyyy-mm-dd hh:mm:ss";

/// Build the header style: bold, centered, top-aligned, solid gray fill.
pub fn derive_default_header_format() -> SpecCellFormat {
    SpecCellFormat {
        bold: Some(true),
        align: Some("center".to_string()),
        valign: Some("top".to_string()),
        bg_color: Some(C_COLOR_HEADER_FILL.to_string()),
        fill_solid: Some(true),
        ..Default::default()
    }
}

/// Resolve date and date-time number formats for a locale tag.
///
/// Matching is on the language (and region, where it changes the order of
/// day and month). Unknown tags fall back to ISO formats.
pub fn derive_number_formats_for_locale(locale_tag: &str) -> SpecNumberFormatLocale {
    let c_tag = locale_tag.trim().replace('_', "-").to_ascii_lowercase();
    let (c_date, c_datetime) = match c_tag.as_str() {
        "en-us" => ("m/d/yyyy", "m/d/yyyy h:mm:ss"),
        "en-gb" | "en-ie" | "en-au" | "en-nz" => ("dd/mm/yyyy", "dd/mm/yyyy hh:mm:ss"),
        _ => match c_tag.split('-').next().unwrap_or_default() {
            "de" => ("dd.mm.yyyy", "dd.mm.yyyy hh:mm:ss"),
            "nl" => ("d-m-yyyy", "d-m-yyyy hh:mm:ss"),
            "fr" => ("dd/mm/yyyy", "dd/mm/yyyy hh:mm:ss"),
            _ => (C_NUM_FORMAT_DATE_ISO, C_NUM_FORMAT_DATETIME_ISO),
        },
    };

    SpecNumberFormatLocale {
        date_format: c_date.to_string(),
        datetime_format: c_datetime.to_string(),
    }
}

/// Build default write options.
pub fn derive_default_report_write_options() -> SpecReportWriteOptions {
    SpecReportWriteOptions::default()
}
