//! Readers for the materialized view rows.
//!
//! The answers view travels as JSON (one object per row, the view's column
//! names as keys). The export view additionally travels as an xlsx
//! worksheet, which is how the upstream system hands exports around; the
//! first row is the header and columns are located by name.

use log::{debug, warn};

use calamine::{open_workbook, DataType, Reader, Xlsx};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use std::collections::HashMap;
use std::fs;

use survey_rollup::*;

use crate::report::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputType {
    Json,
    Xlsx,
}

impl InputType {
    pub fn parse(input_type: Option<&str>) -> ReportResult<InputType> {
        match input_type {
            None | Some("json") => Ok(InputType::Json),
            Some("xlsx") => Ok(InputType::Xlsx),
            Some(other) => InvalidInputTypeSnafu { input_type: other }.fail(),
        }
    }
}

/// One row of the answers view, with the column names used by the source
/// system. Previous-campaign columns arrive as nulls when the left join
/// found nothing, never as missing columns.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawAnswerRow {
    pub campaign_id: String,
    pub campaign_name: String,
    #[serde(default)]
    pub campaign_name_ca: Option<String>,
    #[serde(default)]
    pub campaign_name_es: Option<String>,
    #[serde(default)]
    pub campaign_name_en: Option<String>,
    pub year: i32,
    #[serde(default)]
    pub previous_campaign_id: Option<String>,

    pub survey_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub status: String,
    pub organization_id: String,
    pub organization_name: String,
    pub tax_id: String,

    pub method_id: String,
    pub method_active: bool,
    pub method_name: String,
    #[serde(default)]
    pub method_name_ca: Option<String>,
    #[serde(default)]
    pub method_name_es: Option<String>,
    #[serde(default)]
    pub method_name_en: Option<String>,
    #[serde(default)]
    pub method_description: String,
    #[serde(default)]
    pub method_description_ca: Option<String>,
    #[serde(default)]
    pub method_description_es: Option<String>,
    #[serde(default)]
    pub method_description_en: Option<String>,

    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub section_title: String,
    #[serde(default)]
    pub section_title_ca: Option<String>,
    #[serde(default)]
    pub section_title_es: Option<String>,
    #[serde(default)]
    pub section_title_en: Option<String>,
    pub section_path_order: f64,
    #[serde(default)]
    pub method_level: i32,

    pub indicator_id: String,
    pub indicator_code: String,
    pub indicator_name: String,
    #[serde(default)]
    pub indicator_name_ca: Option<String>,
    #[serde(default)]
    pub indicator_name_es: Option<String>,
    #[serde(default)]
    pub indicator_name_en: Option<String>,
    #[serde(default)]
    pub indicator_description: String,
    #[serde(default)]
    pub indicator_description_ca: Option<String>,
    #[serde(default)]
    pub indicator_description_es: Option<String>,
    #[serde(default)]
    pub indicator_description_en: Option<String>,
    pub is_direct_indicator: bool,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub unit: String,

    pub gender: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub gender_label: String,
    #[serde(default)]
    pub value_label: String,
    #[serde(default)]
    pub value_label_ca: Option<String>,
    #[serde(default)]
    pub value_label_es: Option<String>,
    #[serde(default)]
    pub value_label_en: Option<String>,

    #[serde(default)]
    pub prev_gender: Option<String>,
    #[serde(default)]
    pub prev_value: Option<f64>,
    #[serde(default)]
    pub prev_gender_label: Option<String>,
    #[serde(default)]
    pub prev_value_label: Option<String>,
    #[serde(default)]
    pub prev_value_label_ca: Option<String>,
    #[serde(default)]
    pub prev_value_label_es: Option<String>,
    #[serde(default)]
    pub prev_value_label_en: Option<String>,
}

impl RawAnswerRow {
    fn into_flat_row(self) -> FlatRow {
        // The left join materializes a previous result iff the gender column
        // came back non-null.
        let previous = self.prev_gender.map(|gender| ResultFields {
            gender,
            value: self.prev_value,
            gender_label: self.prev_gender_label.unwrap_or_default(),
            value_label: localized(
                self.prev_value_label.unwrap_or_default(),
                self.prev_value_label_ca,
                self.prev_value_label_es,
                self.prev_value_label_en,
            ),
        });
        FlatRow {
            campaign: CampaignFields {
                id: self.campaign_id,
                name: localized(
                    self.campaign_name,
                    self.campaign_name_ca,
                    self.campaign_name_es,
                    self.campaign_name_en,
                ),
                year: self.year,
                previous_campaign_id: self.previous_campaign_id,
            },
            survey: SurveyFields {
                id: self.survey_id,
                created_at: self.created_at,
                updated_at: self.updated_at,
                status: self.status,
                organization_id: self.organization_id,
                organization_name: self.organization_name,
                tax_id: self.tax_id,
            },
            method: MethodFields {
                id: self.method_id,
                active: self.method_active,
                name: localized(
                    self.method_name,
                    self.method_name_ca,
                    self.method_name_es,
                    self.method_name_en,
                ),
                description: localized(
                    self.method_description,
                    self.method_description_ca,
                    self.method_description_es,
                    self.method_description_en,
                ),
            },
            section: SectionFields {
                id: self.section_id,
                title: localized(
                    self.section_title,
                    self.section_title_ca,
                    self.section_title_es,
                    self.section_title_en,
                ),
                path_order: self.section_path_order,
                method_level: self.method_level,
            },
            indicator: IndicatorFields {
                id: self.indicator_id,
                code: self.indicator_code,
                name: localized(
                    self.indicator_name,
                    self.indicator_name_ca,
                    self.indicator_name_es,
                    self.indicator_name_en,
                ),
                description: localized(
                    self.indicator_description,
                    self.indicator_description_ca,
                    self.indicator_description_es,
                    self.indicator_description_en,
                ),
                direct: self.is_direct_indicator,
                category: self.category,
                data_type: self.data_type,
                unit: self.unit,
            },
            result: ResultFields {
                gender: self.gender,
                value: self.value,
                gender_label: self.gender_label,
                value_label: localized(
                    self.value_label,
                    self.value_label_ca,
                    self.value_label_es,
                    self.value_label_en,
                ),
            },
            previous,
        }
    }
}

/// One row of the export view.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawExportRow {
    pub campaign_id: String,
    pub campaign_name: String,
    #[serde(default)]
    pub campaign_name_ca: Option<String>,
    #[serde(default)]
    pub campaign_name_es: Option<String>,
    #[serde(default)]
    pub campaign_name_en: Option<String>,

    pub organization_name: String,
    pub tax_id: String,
    #[serde(default)]
    pub contact: Option<String>,
    pub created_at: String,
    pub updated_at: String,

    pub method_id: String,
    pub method_name: String,
    #[serde(default)]
    pub method_name_ca: Option<String>,
    #[serde(default)]
    pub method_name_es: Option<String>,
    #[serde(default)]
    pub method_name_en: Option<String>,

    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub section_title: String,
    #[serde(default)]
    pub section_title_ca: Option<String>,
    #[serde(default)]
    pub section_title_es: Option<String>,
    #[serde(default)]
    pub section_title_en: Option<String>,
    pub section_path_order: f64,

    pub indicator_code: String,
    pub indicator_name: String,
    #[serde(default)]
    pub indicator_name_ca: Option<String>,
    #[serde(default)]
    pub indicator_name_es: Option<String>,
    #[serde(default)]
    pub indicator_name_en: Option<String>,
    pub is_direct_indicator: bool,
    #[serde(default)]
    pub data_type: String,

    #[serde(default)]
    pub str_gender: Option<String>,
    #[serde(default)]
    pub str_value: Option<String>,
}

impl RawExportRow {
    fn into_export_row(self) -> ExportRow {
        ExportRow {
            campaign_id: self.campaign_id,
            campaign_name: localized(
                self.campaign_name,
                self.campaign_name_ca,
                self.campaign_name_es,
                self.campaign_name_en,
            ),
            organization_name: self.organization_name,
            tax_id: self.tax_id,
            contact: self.contact,
            created_at: self.created_at,
            updated_at: self.updated_at,
            method_id: self.method_id,
            method_name: localized(
                self.method_name,
                self.method_name_ca,
                self.method_name_es,
                self.method_name_en,
            ),
            section_id: self.section_id,
            section_title: localized(
                self.section_title,
                self.section_title_ca,
                self.section_title_es,
                self.section_title_en,
            ),
            section_path_order: self.section_path_order,
            indicator_code: self.indicator_code,
            indicator_name: localized(
                self.indicator_name,
                self.indicator_name_ca,
                self.indicator_name_es,
                self.indicator_name_en,
            ),
            direct: self.is_direct_indicator,
            data_type: self.data_type,
            str_gender: self.str_gender,
            str_value: self.str_value,
        }
    }
}

fn localized(
    default: String,
    ca: Option<String>,
    es: Option<String>,
    en: Option<String>,
) -> LocalizedText {
    LocalizedText {
        default,
        ca,
        es,
        en,
    }
}

// A document that is not a JSON array is fatal; a row missing an expected
// column only loses that row.
pub fn read_answer_rows_json(path: &str) -> ReportResult<Vec<FlatRow>> {
    let contents = fs::read_to_string(path).context(OpeningInputSnafu { path })?;
    let raw: Vec<serde_json::Value> =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_answer_rows_json: {:?} rows in {:?}", raw.len(), path);
    let mut rows: Vec<FlatRow> = Vec::with_capacity(raw.len());
    for (idx, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<RawAnswerRow>(value) {
            Ok(r) => rows.push(r.into_flat_row()),
            Err(e) => warn!("read_answer_rows_json: skipping row {}: {}", idx, e),
        }
    }
    Ok(rows)
}

pub fn read_export_rows_json(path: &str) -> ReportResult<Vec<ExportRow>> {
    let contents = fs::read_to_string(path).context(OpeningInputSnafu { path })?;
    let raw: Vec<serde_json::Value> =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_export_rows_json: {:?} rows in {:?}", raw.len(), path);
    let mut rows: Vec<ExportRow> = Vec::with_capacity(raw.len());
    for (idx, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<RawExportRow>(value) {
            Ok(r) => rows.push(r.into_export_row()),
            Err(e) => warn!("read_export_rows_json: skipping row {}: {}", idx, e),
        }
    }
    Ok(rows)
}

// The column positions of the export worksheet, resolved once from the
// header. A missing required column fails the whole read; a bad cell only
// loses its row.
struct ExportColumns {
    columns: HashMap<String, usize>,
    campaign_id: usize,
    campaign_name: usize,
    organization_name: usize,
    tax_id: usize,
    created_at: usize,
    updated_at: usize,
    method_id: usize,
    method_name: usize,
    section_title: usize,
    section_path_order: usize,
    indicator_code: usize,
    indicator_name: usize,
    is_direct_indicator: usize,
}

impl ExportColumns {
    fn resolve(header: &[DataType]) -> ReportResult<ExportColumns> {
        let columns = header_index(header);
        Ok(ExportColumns {
            campaign_id: required_column(&columns, "campaign_id")?,
            campaign_name: required_column(&columns, "campaign_name")?,
            organization_name: required_column(&columns, "organization_name")?,
            tax_id: required_column(&columns, "tax_id")?,
            created_at: required_column(&columns, "created_at")?,
            updated_at: required_column(&columns, "updated_at")?,
            method_id: required_column(&columns, "method_id")?,
            method_name: required_column(&columns, "method_name")?,
            section_title: required_column(&columns, "section_title")?,
            section_path_order: required_column(&columns, "section_path_order")?,
            indicator_code: required_column(&columns, "indicator_code")?,
            indicator_name: required_column(&columns, "indicator_name")?,
            is_direct_indicator: required_column(&columns, "is_direct_indicator")?,
            columns,
        })
    }

    fn read_row(&self, row: &[DataType], lineno: u64) -> ReportResult<ExportRow> {
        Ok(ExportRow {
            campaign_id: cell_string(row, self.campaign_id),
            campaign_name: localized(
                cell_string(row, self.campaign_name),
                variant(&self.columns, row, "campaign_name_ca"),
                variant(&self.columns, row, "campaign_name_es"),
                variant(&self.columns, row, "campaign_name_en"),
            ),
            organization_name: cell_string(row, self.organization_name),
            tax_id: cell_string(row, self.tax_id),
            contact: variant(&self.columns, row, "contact"),
            created_at: cell_string(row, self.created_at),
            updated_at: cell_string(row, self.updated_at),
            method_id: cell_string(row, self.method_id),
            method_name: localized(
                cell_string(row, self.method_name),
                variant(&self.columns, row, "method_name_ca"),
                variant(&self.columns, row, "method_name_es"),
                variant(&self.columns, row, "method_name_en"),
            ),
            section_id: variant(&self.columns, row, "section_id"),
            section_title: localized(
                cell_string(row, self.section_title),
                variant(&self.columns, row, "section_title_ca"),
                variant(&self.columns, row, "section_title_es"),
                variant(&self.columns, row, "section_title_en"),
            ),
            section_path_order: cell_f64(row, self.section_path_order, lineno)?,
            indicator_code: cell_string(row, self.indicator_code),
            indicator_name: localized(
                cell_string(row, self.indicator_name),
                variant(&self.columns, row, "indicator_name_ca"),
                variant(&self.columns, row, "indicator_name_es"),
                variant(&self.columns, row, "indicator_name_en"),
            ),
            direct: cell_bool(row, self.is_direct_indicator, lineno)?,
            data_type: variant(&self.columns, row, "data_type").unwrap_or_default(),
            str_gender: variant(&self.columns, row, "str_gender"),
            str_value: variant(&self.columns, row, "str_value"),
        })
    }
}

pub fn read_export_rows_xlsx(path: &str, worksheet: Option<&str>) -> ReportResult<Vec<ExportRow>> {
    let wrange = get_range(path, worksheet)?;
    let mut rows_iter = wrange.rows();
    let header = rows_iter.next().context(EmptyExcelSnafu {})?;
    debug!("read_export_rows_xlsx: header: {:?}", header);

    let columns = ExportColumns::resolve(header)?;

    let mut res: Vec<ExportRow> = Vec::new();
    for (idx, row) in rows_iter.enumerate() {
        let lineno = (idx + 2) as u64;
        match columns.read_row(row, lineno) {
            Ok(export_row) => res.push(export_row),
            Err(e) => warn!("read_export_rows_xlsx: skipping line {}: {}", lineno, e),
        }
    }
    Ok(res)
}

fn get_range(path: &str, worksheet: Option<&str>) -> ReportResult<calamine::Range<DataType>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    match worksheet {
        Some(name) => workbook
            .worksheet_range(name)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path }),
        None => {
            let all_worksheets = workbook.worksheets();
            match all_worksheets.as_slice() {
                [] => EmptyExcelSnafu {}.fail(),
                [(_, wrange)] => Ok(wrange.clone()),
                _ => {
                    whatever!(
                        "read_export_rows_xlsx: several worksheets in {:?}, the worksheet name must be provided",
                        path
                    )
                }
            }
        }
    }
}

/// Maps each header cell to its column index position.
fn header_index(header: &[DataType]) -> HashMap<String, usize> {
    header
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| match cell {
            DataType::String(s) => Some((s.trim().to_string(), idx)),
            _ => None,
        })
        .collect()
}

fn required_column(columns: &HashMap<String, usize>, name: &str) -> ReportResult<usize> {
    columns
        .get(name)
        .cloned()
        .context(MissingColumnSnafu { name })
}

fn cell_string(row: &[DataType], idx: usize) -> String {
    match row.get(idx) {
        Some(DataType::String(s)) => s.clone(),
        Some(DataType::Float(f)) => f.to_string(),
        Some(DataType::Int(i)) => i.to_string(),
        Some(DataType::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

// An optional column: absent column or empty cell is simply no value.
fn variant(columns: &HashMap<String, usize>, row: &[DataType], name: &str) -> Option<String> {
    let idx = *columns.get(name)?;
    match row.get(idx) {
        Some(DataType::Empty) | None => None,
        _ => Some(cell_string(row, idx)),
    }
}

fn cell_f64(row: &[DataType], idx: usize, lineno: u64) -> ReportResult<f64> {
    match row.get(idx) {
        Some(DataType::Float(f)) => Ok(*f),
        Some(DataType::Int(i)) => Ok(*i as f64),
        Some(DataType::String(s)) => match s.trim().parse::<f64>() {
            Ok(x) => Ok(x),
            Err(_) => ExcelWrongCellTypeSnafu {
                lineno,
                content: s.clone(),
            }
            .fail(),
        },
        cell => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}

fn cell_bool(row: &[DataType], idx: usize, lineno: u64) -> ReportResult<bool> {
    match row.get(idx) {
        Some(DataType::Bool(b)) => Ok(*b),
        Some(DataType::Int(i)) => Ok(*i != 0),
        Some(DataType::Float(f)) => Ok(*f != 0.0),
        Some(DataType::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(true),
            "false" | "f" | "0" => Ok(false),
            _ => ExcelWrongCellTypeSnafu {
                lineno,
                content: s.clone(),
            }
            .fail(),
        },
        cell => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANSWER_ROW: &str = r#"[{
        "campaign_id": "c1",
        "campaign_name": "Campanya 2024",
        "campaign_name_en": "2024 campaign",
        "year": 2024,
        "previous_campaign_id": null,
        "survey_id": "sv1",
        "created_at": "2024-02-01T10:00:00",
        "updated_at": "2024-03-01T10:00:00",
        "status": "closed",
        "organization_id": "org1",
        "organization_name": "Org One",
        "tax_id": "B0000001",
        "method_id": "m1",
        "method_active": true,
        "method_name": "Method one",
        "section_id": null,
        "section_title": "",
        "section_path_order": 4.0,
        "indicator_id": "i1",
        "indicator_code": "A01",
        "indicator_name": "Paid workers",
        "is_direct_indicator": true,
        "data_type": "number",
        "gender": "M",
        "value": 12.0,
        "gender_label": "Men",
        "value_label": "12",
        "prev_gender": "M",
        "prev_value": 10.0,
        "prev_gender_label": "Men",
        "prev_value_label": "10"
    }]"#;

    #[test]
    fn answer_row_parses_and_converts() {
        let raw: Vec<RawAnswerRow> = serde_json::from_str(ANSWER_ROW).unwrap();
        assert_eq!(raw.len(), 1);
        let row = raw.into_iter().next().unwrap().into_flat_row();
        assert_eq!(row.campaign.id, "c1");
        assert_eq!(row.campaign.name.resolve(None), "Campanya 2024");
        assert_eq!(
            row.campaign.name.resolve(Some(Language::En)),
            "2024 campaign"
        );
        // No Catalan variant in the payload: default wins.
        assert_eq!(
            row.campaign.name.resolve(Some(Language::Ca)),
            "Campanya 2024"
        );
        assert_eq!(row.section.id, None);
        assert_eq!(row.result.value, Some(12.0));
        let previous = row.previous.unwrap();
        assert_eq!(previous.value, Some(10.0));
    }

    #[test]
    fn absent_previous_columns_mean_no_previous_result() {
        let trimmed = ANSWER_ROW
            .replace("\"prev_gender\": \"M\",", "\"prev_gender\": null,")
            .replace("\"prev_value\": 10.0,", "\"prev_value\": null,");
        let raw: Vec<RawAnswerRow> = serde_json::from_str(&trimmed).unwrap();
        let row = raw.into_iter().next().unwrap().into_flat_row();
        assert!(row.previous.is_none());
    }

    #[test]
    fn header_index_maps_names_to_positions() {
        let header = vec![
            DataType::String("campaign_id".to_string()),
            DataType::Empty,
            DataType::String("tax_id".to_string()),
        ];
        let columns = header_index(&header);
        assert_eq!(columns.get("campaign_id"), Some(&0));
        assert_eq!(columns.get("tax_id"), Some(&2));
        assert!(required_column(&columns, "campaign_id").is_ok());
        assert!(matches!(
            required_column(&columns, "str_value"),
            Err(ReportError::MissingColumn { .. })
        ));
    }

    #[test]
    fn bool_cells_accept_the_common_encodings() {
        let row = vec![
            DataType::Bool(true),
            DataType::Int(0),
            DataType::String("true".to_string()),
            DataType::String("maybe".to_string()),
        ];
        assert!(cell_bool(&row, 0, 2).unwrap());
        assert!(!cell_bool(&row, 1, 2).unwrap());
        assert!(cell_bool(&row, 2, 2).unwrap());
        assert!(cell_bool(&row, 3, 2).is_err());
    }
}
