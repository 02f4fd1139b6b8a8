//! Spreadsheet rendering of attendance rosters

use rollcall_api::{AttendanceRecord, DescriptiveKey};
use rollcall_util::TIMESTAMP_FORMAT;
use rust_xlsxwriter::{Format, Workbook};

use crate::StoreResult;

/// Column headers, in order
pub const EXPORT_COLUMNS: [&str; 10] = [
    "Student Name",
    "Enrollment Number",
    "Email",
    "Time Slot",
    "Subject",
    "Faculty",
    "Class",
    "Semester",
    "Date",
    "Attendance Time",
];

const SHEET_NAME: &str = "Attendance";

/// Render a roster as an `.xlsx` workbook.
///
/// One row per record in the given order, below a bold header row. An
/// empty roster yields a workbook with only the header.
pub fn render_workbook(key: &DescriptiveKey, records: &[AttendanceRecord]) -> StoreResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, title) in EXPORT_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
        sheet.set_column_width(col as u16, 18)?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        let attended_at = record.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let cells = [
            record.student_name.as_str(),
            record.enrollment_number.as_str(),
            record.email.as_str(),
            key.time_slot.as_str(),
            key.subject.as_str(),
            key.faculty.as_str(),
            key.class_name.as_str(),
            key.semester.as_str(),
            key.date.as_str(),
            attended_at.as_str(),
        ];

        for (col, value) in cells.iter().enumerate() {
            sheet.write_string(row, col as u16, *value)?;
        }
    }

    let bytes = workbook.save_to_buffer()?;
    tracing::debug!(rows = records.len(), bytes = bytes.len(), "Workbook rendered");
    Ok(bytes)
}
