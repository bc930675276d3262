//! Workbook assembly for the export modes.

use log::{info, warn};

use snafu::prelude::*;
use umya_spreadsheet::{new_file, writer, Spreadsheet, Worksheet};

use std::collections::BTreeMap;
use std::path::Path;

use survey_rollup::decode::decode_arrays;
use survey_rollup::pivot::PivotMatrix;
use survey_rollup::{ExportRow, IndicatorFilter, Language};

use crate::report::*;

/// Sheet name of the pivoted report.
pub const PIVOT_SHEET_NAME: &str = "pivot";

// Layout of the pivoted sheet: the first four key columns stay hidden, the
// seven informational columns get a fixed width, and every organization
// column gets the same wide default since the organization count is unbounded.
const KEY_COLUMNS_HIDDEN: usize = 4;
const INFO_COLUMNS: usize = 7;
const INFO_COLUMN_WIDTH: f64 = 14.0;
const ORG_COLUMN_WIDTH: f64 = 40.0;

/// Derives the workbook file name from the campaign and method display
/// names. Two methods with the same display name collide; last writer wins.
pub fn derive_workbook_name(campaign: &str, method: &str) -> String {
    let campaign_slug = slug(campaign);
    let method_slug = slug(method);
    if method_slug.is_empty() {
        format!("{}.xlsx", campaign_slug)
    } else {
        format!("{}-{}.xlsx", campaign_slug, method_slug)
    }
}

fn slug(name: &str) -> String {
    let mut out = String::new();
    let mut gap = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            if gap && !out.is_empty() {
                out.push('_');
            }
            gap = false;
            out.extend(c.to_lowercase());
        } else {
            gap = true;
        }
    }
    out
}

/// One line of a per-indicator answer listing.
struct ListingRow {
    indicator_name: String,
    organization_name: String,
    tax_id: String,
    contact: String,
    created_at: String,
    updated_at: String,
    classification: String,
    value_label: String,
}

/// Writes one worksheet per distinct indicator code, each a flat answer
/// listing for manual review. Rows whose arrays do not decode are skipped
/// with a warning, like on the pivot path.
pub fn write_indicator_sheets(
    rows: &[ExportRow],
    lang: Option<Language>,
    filter: IndicatorFilter,
    path: &Path,
) -> ReportResult<()> {
    let mut book = new_file();
    fill_indicator_book(&mut book, rows, lang, filter);
    save(&book, path)
}

fn fill_indicator_book(
    book: &mut Spreadsheet,
    rows: &[ExportRow],
    lang: Option<Language>,
    filter: IndicatorFilter,
) {
    let mut by_code: BTreeMap<String, Vec<ListingRow>> = BTreeMap::new();
    for row in rows.iter() {
        if !filter.matches(row.direct) {
            continue;
        }
        let (raw_gender, raw_value) = match (row.str_gender.as_deref(), row.str_value.as_deref()) {
            (Some(g), Some(v)) => (g, v),
            _ => continue,
        };
        let decoded = match decode_arrays(raw_gender, raw_value) {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    "write_indicator_sheets: skipping row org={} indicator={} section={:?}: {}",
                    row.organization_name, row.indicator_code, row.section_id, e
                );
                continue;
            }
        };
        let listing = by_code.entry(row.indicator_code.clone()).or_default();
        for (classification, value_label) in decoded.pairs.iter() {
            listing.push(ListingRow {
                indicator_name: row.indicator_name.resolve(lang).to_string(),
                organization_name: row.organization_name.clone(),
                tax_id: row.tax_id.clone(),
                contact: row.contact.clone().unwrap_or_default(),
                created_at: row.created_at.clone(),
                updated_at: row.updated_at.clone(),
                classification: classification.clone(),
                value_label: value_label.clone(),
            });
        }
    }

    let mut first = true;
    for (code, listing) in by_code.iter() {
        if first {
            // A fresh workbook already carries one sheet; reuse it for the
            // first indicator.
            if let Some(sheet) = book.get_sheet_by_name_mut("Sheet1") {
                sheet.set_name(code.as_str());
            }
            first = false;
        } else {
            let _ = book.new_sheet(code.as_str());
        }
        if let Some(sheet) = book.get_sheet_by_name_mut(code.as_str()) {
            write_listing(sheet, listing);
        }
    }
}

fn write_listing(sheet: &mut Worksheet, listing: &[ListingRow]) {
    let headers = [
        "indicator",
        "organization",
        "tax_id",
        "contact",
        "created_at",
        "updated_at",
        "classification",
        "value",
    ];
    for (idx, header) in headers.iter().enumerate() {
        sheet.get_cell_mut(((idx + 1) as u32, 1u32)).set_value(*header);
    }
    for (idx, row) in listing.iter().enumerate() {
        let row_num = (idx + 2) as u32;
        let cells = [
            &row.indicator_name,
            &row.organization_name,
            &row.tax_id,
            &row.contact,
            &row.created_at,
            &row.updated_at,
            &row.classification,
            &row.value_label,
        ];
        for (col_idx, content) in cells.iter().enumerate() {
            sheet
                .get_cell_mut(((col_idx + 1) as u32, row_num))
                .set_value(content.as_str());
        }
    }
}

/// Writes the pivot matrix as a single worksheet. The four leading key
/// columns keep their data for traceability and sorting but are hidden.
pub fn write_pivot_sheet(matrix: &PivotMatrix, path: &Path) -> ReportResult<()> {
    let mut book = new_file();
    fill_pivot_book(&mut book, matrix);
    save(&book, path)
}

fn fill_pivot_book(book: &mut Spreadsheet, matrix: &PivotMatrix) {
    if let Some(sheet) = book.get_sheet_by_name_mut("Sheet1") {
        sheet.set_name(PIVOT_SHEET_NAME);
    }
    let sheet = match book.get_sheet_by_name_mut(PIVOT_SHEET_NAME) {
        Some(s) => s,
        None => return,
    };

    let info_headers = [
        "section_order",
        "section",
        "method",
        "is_direct_indicator",
        "indicator_code",
        "indicator",
        "classification",
    ];
    for (idx, header) in info_headers.iter().enumerate() {
        sheet.get_cell_mut(((idx + 1) as u32, 1u32)).set_value(*header);
    }
    for (c, col) in matrix.cols.iter().enumerate() {
        let col_num = (INFO_COLUMNS + c + 1) as u32;
        sheet
            .get_cell_mut((col_num, 1u32))
            .set_value(format!("{} ({})", col.organization_name, col.tax_id));
    }

    for (r, key) in matrix.rows.iter().enumerate() {
        let row_num = (r + 2) as u32;
        let info_cells = [
            key.section_order.to_string(),
            key.section_title.clone(),
            key.method_name.clone(),
            key.direct.to_string(),
            key.indicator_code.clone(),
            key.indicator_name.clone(),
            key.classification.clone(),
        ];
        for (col_idx, content) in info_cells.iter().enumerate() {
            sheet
                .get_cell_mut(((col_idx + 1) as u32, row_num))
                .set_value(content.as_str());
        }
        for c in 0..matrix.cols.len() {
            // Absent cells stay absent: an empty cell is "no data", not zero.
            if let Some(cell) = matrix.value_at(r, c) {
                sheet
                    .get_cell_mut(((INFO_COLUMNS + c + 1) as u32, row_num))
                    .set_value(cell.render());
            }
        }
    }

    for idx in 0..(INFO_COLUMNS + matrix.cols.len()) {
        let letter = column_letter(idx + 1);
        let dimension = sheet.get_column_dimension_mut(letter.as_str());
        if idx < KEY_COLUMNS_HIDDEN {
            dimension.set_hidden(true);
        }
        if idx < INFO_COLUMNS {
            dimension.set_width(INFO_COLUMN_WIDTH);
        } else {
            dimension.set_width(ORG_COLUMN_WIDTH);
        }
    }
}

// 1-based index to spreadsheet column letters (1 -> A, 27 -> AA).
fn column_letter(mut index: usize) -> String {
    let mut letters: Vec<char> = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn save(book: &Spreadsheet, path: &Path) -> ReportResult<()> {
    if let Err(e) = writer::xlsx::write(book, path) {
        whatever!("Error writing workbook {}: {:?}", path.display(), e);
    }
    info!("save: wrote workbook {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_rollup::pivot::build_pivot;
    use survey_rollup::LocalizedText;

    fn export_row(org: &str, tax_id: &str, code: &str, value: &str) -> ExportRow {
        ExportRow {
            campaign_id: "c1".to_string(),
            campaign_name: LocalizedText::plain("Campaign 2024"),
            organization_name: org.to_string(),
            tax_id: tax_id.to_string(),
            contact: Some("contact@example.org".to_string()),
            created_at: "2024-02-01".to_string(),
            updated_at: "2024-03-01".to_string(),
            method_id: "m1".to_string(),
            method_name: LocalizedText::plain("Method one"),
            section_id: Some("s1".to_string()),
            section_title: LocalizedText::plain("Section"),
            section_path_order: 1.0,
            indicator_code: code.to_string(),
            indicator_name: LocalizedText::plain("Indicator"),
            direct: true,
            data_type: "number".to_string(),
            str_gender: Some("[total]".to_string()),
            str_value: Some(value.to_string()),
        }
    }

    #[test]
    fn workbook_names_are_deterministic_slugs() {
        assert_eq!(
            derive_workbook_name("Campaign 2024", "Method One"),
            "campaign_2024-method_one.xlsx"
        );
        assert_eq!(
            derive_workbook_name("  Campanya  (2024)  ", "Mètode u"),
            "campanya_2024-mètode_u.xlsx"
        );
        assert_eq!(derive_workbook_name("Campaign", ""), "campaign.xlsx");
    }

    #[test]
    fn column_letters_roll_over() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn indicator_book_holds_one_sheet_per_code() {
        let rows = vec![
            export_row("Org A", "A01", "IND1", "3"),
            export_row("Org B", "B01", "IND1", "5"),
            export_row("Org A", "A01", "IND2", "7"),
        ];
        let mut book = new_file();
        fill_indicator_book(&mut book, &rows, None, IndicatorFilter::Direct);
        let sheet1 = book.get_sheet_by_name("IND1").unwrap();
        assert_eq!(sheet1.get_value((1u32, 1u32)), "indicator");
        assert_eq!(sheet1.get_value((2u32, 2u32)), "Org A");
        assert_eq!(sheet1.get_value((2u32, 3u32)), "Org B");
        let sheet2 = book.get_sheet_by_name("IND2").unwrap();
        assert_eq!(sheet2.get_value((8u32, 2u32)), "7");
    }

    #[test]
    fn pivot_book_lays_out_matrix_with_empty_cells() {
        let rows = vec![
            export_row("Org A", "A01", "IND", "3"),
            export_row("Org B", "B01", "IND", "5"),
            export_row("Org C", "C01", "OTHER", "7"),
        ];
        let outcome = build_pivot(&rows, None, IndicatorFilter::Direct);
        let mut book = new_file();
        fill_pivot_book(&mut book, &outcome.matrix);
        let sheet = book.get_sheet_by_name(PIVOT_SHEET_NAME).unwrap();
        assert_eq!(sheet.get_value((1u32, 1u32)), "section_order");
        assert_eq!(sheet.get_value((8u32, 1u32)), "Org A (A01)");
        // Row keys sort IND before OTHER; Org A's IND value lands in the
        // first organization column, Org C's stays empty there.
        assert_eq!(sheet.get_value((5u32, 2u32)), "IND");
        assert_eq!(sheet.get_value((8u32, 2u32)), "3");
        assert_eq!(sheet.get_value((9u32, 2u32)), "5");
        assert_eq!(sheet.get_value((10u32, 2u32)), "");
        assert_eq!(sheet.get_value((10u32, 3u32)), "7");
    }
}
