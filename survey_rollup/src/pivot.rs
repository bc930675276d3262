//! Pivoting of export rows into the indicator-by-organization matrix.

use log::{debug, info, warn};

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::*;
use crate::decode::decode_arrays;

/// Composite pivot row key. The field order is the sort order of the sheet.
#[derive(Debug, Clone)]
pub struct RowKey {
    pub section_order: f64,
    pub section_title: String,
    pub method_name: String,
    pub direct: bool,
    pub indicator_code: String,
    pub indicator_name: String,
    pub classification: String,
}

impl RowKey {
    fn compare(&self, other: &RowKey) -> Ordering {
        self.section_order
            .total_cmp(&other.section_order)
            .then_with(|| self.section_title.cmp(&other.section_title))
            .then_with(|| self.method_name.cmp(&other.method_name))
            .then_with(|| self.direct.cmp(&other.direct))
            .then_with(|| self.indicator_code.cmp(&other.indicator_code))
            .then_with(|| self.indicator_name.cmp(&other.indicator_name))
            .then_with(|| self.classification.cmp(&other.classification))
    }
}

// Manual impls: section_order is an f64 and total_cmp keeps the order total.
impl PartialEq for RowKey {
    fn eq(&self, other: &RowKey) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for RowKey {}

impl PartialOrd for RowKey {
    fn partial_cmp(&self, other: &RowKey) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for RowKey {
    fn cmp(&self, other: &RowKey) -> Ordering {
        self.compare(other)
    }
}

/// Pivot column key: one column per organization.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone)]
pub struct ColKey {
    pub tax_id: String,
    pub organization_name: String,
}

/// The sparse matrix. Every distinct organization gets a column even when it
/// has no value for some rows; absent cells stay absent.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct PivotMatrix {
    pub rows: Vec<RowKey>,
    pub cols: Vec<ColKey>,
    cells: HashMap<(usize, usize), CellValue>,
}

impl PivotMatrix {
    pub fn value_at(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn populated_cells(&self) -> usize {
        self.cells.len()
    }
}

/// Matrix plus the row-scoped failures and data-quality warnings collected
/// while building it.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct PivotOutcome {
    pub matrix: PivotMatrix,
    pub rejected: Vec<RejectedRow>,
    pub warnings: Vec<String>,
}

/// Builds the pivot matrix from export rows.
///
/// Rows not matching the indicator filter, or missing both array columns,
/// do not participate. A row whose arrays fail to decode is rejected alone
/// and reported; the rest of the export continues. When several source rows
/// land on the same cell the minimum value wins.
pub fn build_pivot(
    rows: &[ExportRow],
    lang: Option<Language>,
    filter: IndicatorFilter,
) -> PivotOutcome {
    info!(
        "build_pivot: processing {:?} rows, lang: {:?}, filter: {:?}",
        rows.len(),
        lang,
        filter
    );

    let mut entries: Vec<(RowKey, ColKey, CellValue)> = Vec::new();
    let mut rejected: Vec<RejectedRow> = Vec::new();
    // indicator code -> (saw a bracketed value, saw a scalar value)
    let mut value_formats: HashMap<String, (bool, bool)> = HashMap::new();

    for row in rows.iter() {
        if !filter.matches(row.direct) {
            continue;
        }
        let (raw_gender, raw_value) = match (row.str_gender.as_deref(), row.str_value.as_deref()) {
            (Some(g), Some(v)) => (g, v),
            _ => {
                debug!(
                    "build_pivot: no array columns for {} / {}, skipping",
                    row.organization_name, row.indicator_code
                );
                continue;
            }
        };

        let decoded = match decode_arrays(raw_gender, raw_value) {
            Ok(d) => d,
            Err(e) => {
                reject(&mut rejected, row, e);
                continue;
            }
        };

        let formats = value_formats
            .entry(row.indicator_code.clone())
            .or_insert((false, false));
        if decoded.multi_valued {
            formats.0 = true;
        } else {
            formats.1 = true;
        }

        let classified = match decoded.classified(&row.data_type) {
            Ok(c) => c,
            Err(e) => {
                reject(&mut rejected, row, e);
                continue;
            }
        };

        let col = ColKey {
            tax_id: row.tax_id.clone(),
            organization_name: row.organization_name.clone(),
        };
        for (classification, cell) in classified {
            let key = RowKey {
                section_order: row.section_path_order,
                section_title: row.section_title.resolve(lang).to_string(),
                method_name: row.method_name.resolve(lang).to_string(),
                direct: row.direct,
                indicator_code: row.indicator_code.clone(),
                indicator_name: row.indicator_name.resolve(lang).to_string(),
                classification,
            };
            entries.push((key, col.clone(), cell));
        }
    }

    let mut mixed: Vec<&String> = value_formats
        .iter()
        .filter_map(|(code, (multi, scalar))| (*multi && *scalar).then_some(code))
        .collect();
    mixed.sort();
    let warnings: Vec<String> = mixed
        .iter()
        .map(|code| {
            let msg = format!(
                "indicator {} mixes bracketed and scalar value formats",
                code
            );
            warn!("build_pivot: {}", msg);
            msg
        })
        .collect();

    let mut row_axis: Vec<RowKey> = entries.iter().map(|(k, _, _)| k.clone()).collect();
    row_axis.sort();
    row_axis.dedup();
    let mut col_axis: Vec<ColKey> = entries.iter().map(|(_, c, _)| c.clone()).collect();
    col_axis.sort();
    col_axis.dedup();

    let mut cells: HashMap<(usize, usize), CellValue> = HashMap::new();
    for (key, col, cell) in entries {
        let r = row_axis.binary_search(&key).unwrap();
        let c = col_axis.binary_search(&col).unwrap();
        match cells.get_mut(&(r, c)) {
            Some(existing) => {
                if cell_less(&cell, existing) {
                    *existing = cell;
                }
            }
            None => {
                cells.insert((r, c), cell);
            }
        }
    }

    debug!(
        "build_pivot: {:?} rows x {:?} cols, {:?} populated cells, {:?} rejected",
        row_axis.len(),
        col_axis.len(),
        cells.len(),
        rejected.len()
    );

    PivotOutcome {
        matrix: PivotMatrix {
            rows: row_axis,
            cols: col_axis,
            cells,
        },
        rejected,
        warnings,
    }
}

fn reject(rejected: &mut Vec<RejectedRow>, row: &ExportRow, error: DecodeError) {
    warn!(
        "build_pivot: rejecting row org={} indicator={} section={:?}: {}",
        row.organization_name, row.indicator_code, row.section_id, error
    );
    rejected.push(RejectedRow {
        organization_name: row.organization_name.clone(),
        indicator_code: row.indicator_code.clone(),
        section_id: row.section_id.clone(),
        error,
    });
}

// Minimum-wins merge: numeric pairs compare numerically, anything else on
// the rendered text.
fn cell_less(a: &CellValue, b: &CellValue) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x < y,
        _ => a.render() < b.render(),
    }
}
