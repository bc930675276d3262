use log::{info, warn};

use survey_rollup::pivot::build_pivot;
use survey_rollup::*;

use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::PathBuf;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::report::row_reader::*;
use crate::report::xlsx_writer::*;

pub mod row_reader;
pub mod xlsx_writer;

#[derive(Debug, Snafu)]
pub enum ReportError {
    #[snafu(display("Error opening file {path}"))]
    OpeningInput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON content"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error opening workbook {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The workbook has no usable worksheet"))]
    EmptyExcel {},
    #[snafu(display("Missing column {name} in the worksheet header"))]
    MissingColumn { name: String },
    #[snafu(display("Unexpected cell content at line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: u64, content: String },
    #[snafu(display("Unknown language {code}"))]
    InvalidLanguage { code: String },
    #[snafu(display("Unknown mode {mode}"))]
    InvalidMode { mode: String },
    #[snafu(display("Unknown input type {input_type}"))]
    InvalidInputType { input_type: String },
    #[snafu(display("--direct and --derived are mutually exclusive"))]
    ConflictingFilters {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ReportResult<T> = Result<T, ReportError>;

pub struct TreeOptions {
    pub lang: Option<Language>,
    pub organization: Option<String>,
    pub campaign: Option<String>,
    pub out: Option<String>,
    pub reference: Option<String>,
}

/// Builds the nested answers tree for the requested scope and writes it as
/// JSON. An empty scope produces `{"campaigns": []}`, not an error.
pub fn run_tree(input_path: &str, opts: &TreeOptions) -> ReportResult<()> {
    let all_rows = read_answer_rows_json(input_path)?;
    let rows: Vec<FlatRow> = all_rows
        .into_iter()
        .filter(|r| {
            opts.campaign.as_ref().map_or(true, |c| &r.campaign.id == c)
                && opts
                    .organization
                    .as_ref()
                    .map_or(true, |o| &r.survey.organization_id == o)
        })
        .collect();
    info!("run_tree: {:?} rows in scope", rows.len());

    let tree = build_tree(&rows, opts.lang);
    let tree_js = tree_to_json(&tree);
    let pretty = serde_json::to_string_pretty(&tree_js).context(ParsingJsonSnafu {})?;

    match opts.out.as_deref() {
        None | Some("stdout") => println!("{}", pretty),
        Some(path) => fs::write(path, &pretty).context(WritingOutputSnafu { path })?,
    }

    // The reference tree, if provided for comparison.
    if let Some(reference_path) = opts.reference.as_deref() {
        let reference = read_reference(reference_path)?;
        let pretty_reference =
            serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_reference != pretty {
            warn!("Found differences with the reference tree");
            print_diff(pretty_reference.as_str(), pretty.as_str(), "\n");
            whatever!("Difference detected between generated tree and reference tree");
        }
    }

    Ok(())
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ExportMode {
    /// One worksheet per indicator code, flat answer listings.
    IndicatorSheets,
    /// A single pivoted worksheet, organizations as columns.
    Pivot,
}

pub struct ExportOptions {
    pub mode: ExportMode,
    pub lang: Option<Language>,
    pub filter: IndicatorFilter,
    pub campaign: Option<String>,
    pub method: Option<String>,
    pub out_dir: String,
    pub input_type: InputType,
    pub worksheet: Option<String>,
}

/// Builds the requested workbook and returns the path it was written to.
///
/// The file name is derived from the campaign and method display names; two
/// methods sharing a display name within a run overwrite each other (known
/// limitation, last writer wins).
pub fn run_export(input_path: &str, opts: &ExportOptions) -> ReportResult<String> {
    let all_rows = match opts.input_type {
        InputType::Json => read_export_rows_json(input_path)?,
        InputType::Xlsx => read_export_rows_xlsx(input_path, opts.worksheet.as_deref())?,
    };
    let rows: Vec<ExportRow> = all_rows
        .into_iter()
        .filter(|r| {
            opts.campaign.as_ref().map_or(true, |c| &r.campaign_id == c)
                && opts.method.as_ref().map_or(true, |m| &r.method_id == m)
        })
        .collect();
    info!("run_export: {:?} rows in scope", rows.len());

    let campaign_label = rows
        .first()
        .map(|r| r.campaign_name.resolve(opts.lang).to_string())
        .unwrap_or_else(|| "export".to_string());
    let method_label = rows
        .first()
        .map(|r| r.method_name.resolve(opts.lang).to_string())
        .unwrap_or_default();
    let file_name = derive_workbook_name(&campaign_label, &method_label);
    let path: PathBuf = [opts.out_dir.as_str(), file_name.as_str()].iter().collect();

    match opts.mode {
        ExportMode::IndicatorSheets => {
            write_indicator_sheets(&rows, opts.lang, opts.filter, &path)?;
        }
        ExportMode::Pivot => {
            let outcome = build_pivot(&rows, opts.lang, opts.filter);
            for rejected in outcome.rejected.iter() {
                warn!(
                    "run_export: rejected row org={} indicator={} section={:?}: {}",
                    rejected.organization_name,
                    rejected.indicator_code,
                    rejected.section_id,
                    rejected.error
                );
            }
            write_pivot_sheet(&outcome.matrix, &path)?;
        }
    }

    Ok(path.as_path().display().to_string())
}

pub fn read_reference(path: &str) -> ReportResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningInputSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

pub fn tree_to_json(tree: &ResultTree) -> JSValue {
    let campaigns: Vec<JSValue> = tree.campaigns.iter().map(campaign_to_json).collect();
    json!({ "campaigns": campaigns })
}

fn campaign_to_json(c: &CampaignNode) -> JSValue {
    let surveys: Vec<JSValue> = c.surveys.iter().map(survey_to_json).collect();
    json!({
        "id": c.id,
        "name": c.name,
        "year": c.year,
        "previous_campaign_id": c.previous_campaign_id,
        "surveys": surveys,
    })
}

fn survey_to_json(s: &SurveyNode) -> JSValue {
    let methods: Vec<JSValue> = s.methods.iter().map(method_to_json).collect();
    json!({
        "id": s.id,
        "created_at": s.created_at,
        "updated_at": s.updated_at,
        "status": s.status,
        "organization_id": s.organization_id,
        "organization_name": s.organization_name,
        "tax_id": s.tax_id,
        "methods": methods,
    })
}

fn method_to_json(m: &MethodNode) -> JSValue {
    let sections: Vec<JSValue> = m.sections.iter().map(section_to_json).collect();
    json!({
        "id": m.id,
        "active": m.active,
        "name": m.name,
        "description": m.description,
        "sections": sections,
    })
}

fn section_to_json(s: &SectionNode) -> JSValue {
    let indicators: Vec<JSValue> = s.indicators.iter().map(indicator_to_json).collect();
    json!({
        "id": s.id,
        "title": s.title,
        "path_order": s.path_order,
        "method_level": s.method_level,
        "indicators": indicators,
    })
}

fn indicator_to_json(i: &IndicatorNode) -> JSValue {
    let results: Vec<JSValue> = i.results.iter().map(result_to_json).collect();
    json!({
        "id": i.id,
        "code": i.code,
        "name": i.name,
        "description": i.description,
        "is_direct_indicator": i.direct,
        "category": i.category,
        "data_type": i.data_type,
        "unit": i.unit,
        "results": results,
    })
}

fn result_to_json(r: &ResultNode) -> JSValue {
    let previous = r.previous.as_ref().map(|p| {
        json!({
            "gender": p.gender,
            "value": p.value,
            "gender_label": p.gender_label,
            "value_label": p.value_label,
        })
    });
    json!({
        "gender": r.gender,
        "value": r.value,
        "gender_label": r.gender_label,
        "value_label": r.value_label,
        "previous": previous,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_rollup::builder::RowBuilder;

    fn scenario_rows() -> Vec<FlatRow> {
        let base = RowBuilder::new("c1", 2024)
            .campaign_name("C1")
            .survey("sv1", "org1", "Org One", "B0000001")
            .method("m1", "M1");
        let mut rows = Vec::new();
        for (section, order, indicator, code) in [
            ("s1", 1.0, "i1", "A01"),
            ("s2", 2.0, "i2", "B01"),
        ] {
            for gender in ["M", "F"] {
                rows.push(
                    base.clone()
                        .section(Some(section), section, order)
                        .indicator(indicator, code, code)
                        .result(gender, Some(1.0))
                        .row(),
                );
            }
        }
        rows
    }

    #[test]
    fn empty_tree_keeps_schema() {
        let js = tree_to_json(&build_tree(&[], None));
        assert_eq!(js, json!({ "campaigns": [] }));
    }

    #[test]
    fn end_to_end_tree_json() {
        let tree = build_tree(&scenario_rows(), None);
        let js = tree_to_json(&tree);

        let campaigns = js["campaigns"].as_array().unwrap();
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0]["name"], "C1");
        assert_eq!(campaigns[0]["year"], 2024);

        let surveys = campaigns[0]["surveys"].as_array().unwrap();
        assert_eq!(surveys.len(), 1);
        let methods = surveys[0]["methods"].as_array().unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0]["name"], "M1");

        let sections = methods[0]["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0]["title"], "s1");
        assert_eq!(sections[1]["title"], "s2");

        for section in sections {
            let indicators = section["indicators"].as_array().unwrap();
            assert_eq!(indicators.len(), 1);
            let results = indicators[0]["results"].as_array().unwrap();
            assert_eq!(results.len(), 2);
            // No previous campaign in the scenario: the key is still there.
            assert!(results[0]["previous"].is_null());
        }
    }

    #[test]
    fn result_json_carries_previous_value() {
        let row = RowBuilder::new("c2", 2024)
            .previous_campaign("c1")
            .survey("sv1", "org1", "Org One", "B0000001")
            .method("m1", "M1")
            .section(Some("s1"), "Section", 1.0)
            .indicator("i1", "A01", "Indicator")
            .result("M", Some(12.0))
            .previous_result("M", Some(10.0))
            .row();
        let js = tree_to_json(&build_tree(&[row], None));
        let result = &js["campaigns"][0]["surveys"][0]["methods"][0]["sections"][0]["indicators"]
            [0]["results"][0];
        assert_eq!(result["value"], 12.0);
        assert_eq!(result["previous"]["value"], 10.0);
    }
}
