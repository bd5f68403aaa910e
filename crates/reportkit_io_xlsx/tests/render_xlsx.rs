use std::io::{Cursor, Read};

use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
use chrono::{DateTime, Local, NaiveDate};
use polars::prelude::{Column, DataFrame, NamedFrom};

use reportkit_io_xlsx::{
    C_NUM_FORMAT_DATETIME_ISO, DataFrameReportSource, EnumReportEvent, ReportXlsxError,
    SpecBodyCell, SpecGridShape, SpecHeaderCell, SpecReportWriteOptions, render_report_to_bytes,
};

fn read_part(v_bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(v_bytes)).expect("rendered bytes are a zip");
    let mut file = archive.by_name(name).expect("part exists");
    let mut c_xml = String::new();
    file.read_to_string(&mut c_xml).expect("part is utf-8");
    c_xml
}

fn read_sheet(v_bytes: Vec<u8>, sheet_name: &str) -> calamine::Range<Data> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(v_bytes)).expect("rendered bytes are a workbook");
    assert_eq!(workbook.sheet_names(), vec![sheet_name.to_string()]);
    workbook
        .worksheet_range(sheet_name)
        .expect("sheet is readable")
}

fn is_number(value: Option<&Data>, expected: f64) -> bool {
    match value {
        Some(Data::Float(val)) => *val == expected,
        Some(Data::Int(val)) => *val as f64 == expected,
        _ => false,
    }
}

#[test]
fn test_people_report_round_trip() {
    let l_events: Vec<EnumReportEvent> = vec![
        SpecGridShape::new(1, 1, 2, 2).into(),
        SpecHeaderCell::new(0, 0, "Name").into(),
        SpecBodyCell::new(0, 0, "Alice").into(),
        SpecBodyCell::new(0, 1, 30).into(),
        SpecBodyCell::new(1, 0, "Bob").into(),
        SpecBodyCell::new(1, 1, 25).into(),
    ];

    let (v_bytes, report) =
        render_report_to_bytes(&l_events, "People", SpecReportWriteOptions::default()).unwrap();
    assert_eq!(report.n_merges, 0);

    let c_sheet_xml = read_part(&v_bytes, "xl/worksheets/sheet1.xml");
    assert!(c_sheet_xml.contains(r#"xSplit="1""#));
    assert!(c_sheet_xml.contains(r#"ySplit="1""#));
    assert!(c_sheet_xml.contains(r#"state="frozen""#));
    assert!(c_sheet_xml.contains(r#"<c r="A1" s=""#));
    assert!(!c_sheet_xml.contains(r#"<c r="B2" s=""#));

    let c_styles_xml = read_part(&v_bytes, "xl/styles.xml");
    assert!(c_styles_xml.contains("<b/>"));
    assert!(c_styles_xml.contains(r#"patternType="solid""#));
    assert!(c_styles_xml.contains("FFC0C0C0"));

    let range = read_sheet(v_bytes, "People");
    assert_eq!(
        range.get_value((0, 0)),
        Some(&Data::String("Name".to_string()))
    );
    assert_eq!(
        range.get_value((1, 1)),
        Some(&Data::String("Alice".to_string()))
    );
    assert!(is_number(range.get_value((1, 2)), 30.0));
    assert_eq!(
        range.get_value((2, 1)),
        Some(&Data::String("Bob".to_string()))
    );
    assert!(is_number(range.get_value((2, 2)), 25.0));
}

#[test]
fn test_offset_datetime_is_written_as_datetime() {
    let value = DateTime::parse_from_rfc3339("2024-03-10T23:15:00-07:00").unwrap();
    let l_events: Vec<EnumReportEvent> = vec![
        SpecGridShape::new(0, 0, 1, 2).into(),
        SpecBodyCell::new(0, 0, value).into(),
        SpecBodyCell::new(0, 1, true).into(),
    ];

    let (v_bytes, _) =
        render_report_to_bytes(&l_events, "Dates", SpecReportWriteOptions::default()).unwrap();

    let c_styles_xml = read_part(&v_bytes, "xl/styles.xml");
    assert!(c_styles_xml.contains(&format!(r#"formatCode="{C_NUM_FORMAT_DATETIME_ISO}""#)));
    let c_sheet_xml = read_part(&v_bytes, "xl/worksheets/sheet1.xml");
    assert!(c_sheet_xml.contains(r#"<c r="A1" s=""#));
    assert!(!c_sheet_xml.contains("<pane"));

    let datetime_local = value.with_timezone(&Local).naive_local();
    let datetime_epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let n_serial_expected =
        (datetime_local - datetime_epoch).num_milliseconds() as f64 / 86_400_000.0;

    let range = read_sheet(v_bytes, "Dates");
    match range.get_value((0, 0)) {
        Some(Data::DateTime(val)) => {
            assert!((val.as_f64() - n_serial_expected).abs() < 1e-6);
        }
        other => panic!("expected a date-time cell, got {other:?}"),
    }
    assert_eq!(range.get_value((0, 1)), Some(&Data::Bool(true)));
}

#[test]
fn test_header_reaching_into_body_is_rejected() {
    let l_events: Vec<EnumReportEvent> = vec![
        SpecGridShape::new(1, 1, 2, 2).into(),
        SpecHeaderCell::new(0, 1, "Tall").with_span(2, 1).into(),
        SpecBodyCell::new(0, 0, "Alice").into(),
        SpecBodyCell::new(0, 1, 30).into(),
    ];

    let result = render_report_to_bytes(&l_events, "Tall", SpecReportWriteOptions::default());

    assert!(matches!(result, Err(ReportXlsxError::InvalidSpan { .. })));
}

#[test]
fn test_large_integer_is_exact_up_to_two_pow_53() {
    let n_value = 1i64 << 53;
    let l_events: Vec<EnumReportEvent> = vec![
        SpecGridShape::new(0, 0, 1, 1).into(),
        SpecBodyCell::new(0, 0, n_value).into(),
    ];

    let (v_bytes, _) =
        render_report_to_bytes(&l_events, "Big", SpecReportWriteOptions::default()).unwrap();

    let range = read_sheet(v_bytes, "Big");
    assert!(is_number(range.get_value((0, 0)), 9_007_199_254_740_992.0));
}

#[test]
fn test_dataframe_source_renders_header_and_body() {
    let df = DataFrame::new(vec![
        Column::new("city".into(), ["Oslo", "Lima"]),
        Column::new("population".into(), [709_037i64, 10_092_000]),
    ])
    .unwrap();
    let source = DataFrameReportSource::new(df)
        .with_row_header_columns(1)
        .unwrap();

    let (v_bytes, report) =
        render_report_to_bytes(&source, "Cities", SpecReportWriteOptions::default()).unwrap();
    assert_eq!(report.shape, SpecGridShape::new(1, 1, 2, 1));

    let range = read_sheet(v_bytes, "Cities");
    assert_eq!(
        range.get_value((0, 1)),
        Some(&Data::String("population".to_string()))
    );
    assert_eq!(
        range.get_value((2, 0)),
        Some(&Data::String("Lima".to_string()))
    );
    assert!(is_number(range.get_value((1, 1)), 709_037.0));
}
