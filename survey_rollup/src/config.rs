// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// Identifier used by the source views for rows whose indicator does not
/// belong to any section. It is an ordinary grouping key, never dropped.
pub const NO_SECTION_ID: &str = "e2ef801f-adbc-60d2-36d0-0b9f3516ebc7";

/// The languages supported by the source system.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Language {
    Ca,
    Es,
    En,
}

impl Language {
    pub fn parse(code: &str) -> Option<Language> {
        match code {
            "ca" => Some(Language::Ca),
            "es" => Some(Language::Es),
            "en" => Some(Language::En),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Ca => "ca",
            Language::Es => "es",
            Language::En => "en",
        }
    }
}

/// A display text together with its per-language variants.
///
/// The source views expose every display text as an unsuffixed default column
/// plus one optional column per language (`name`, `name_ca`, `name_es`,
/// `name_en`). Resolution falls back to the default when no language is
/// requested or when the requested variant is missing on that field.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct LocalizedText {
    pub default: String,
    pub ca: Option<String>,
    pub es: Option<String>,
    pub en: Option<String>,
}

impl LocalizedText {
    pub fn plain(s: &str) -> LocalizedText {
        LocalizedText {
            default: s.to_string(),
            ..LocalizedText::default()
        }
    }

    /// The variant for the requested language, or the unsuffixed default.
    pub fn resolve(&self, lang: Option<Language>) -> &str {
        let variant = match lang {
            Some(Language::Ca) => self.ca.as_deref(),
            Some(Language::Es) => self.es.as_deref(),
            Some(Language::En) => self.en.as_deref(),
            None => None,
        };
        variant.unwrap_or(&self.default)
    }

    pub fn with_variant(mut self, lang: Language, text: &str) -> LocalizedText {
        let slot = match lang {
            Language::Ca => &mut self.ca,
            Language::Es => &mut self.es,
            Language::En => &mut self.en,
        };
        *slot = Some(text.to_string());
        self
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CampaignFields {
    pub id: String,
    pub name: LocalizedText,
    pub year: i32,
    pub previous_campaign_id: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveyFields {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub status: String,
    pub organization_id: String,
    pub organization_name: String,
    pub tax_id: String,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MethodFields {
    pub id: String,
    pub active: bool,
    pub name: LocalizedText,
    pub description: LocalizedText,
}

#[derive(PartialEq, Debug, Clone)]
pub struct SectionFields {
    /// None for indicators outside any section; grouped under
    /// [NO_SECTION_ID].
    pub id: Option<String>,
    pub title: LocalizedText,
    /// Total order across the sections of a method.
    pub path_order: f64,
    pub method_level: i32,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct IndicatorFields {
    pub id: String,
    pub code: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub direct: bool,
    pub category: String,
    pub data_type: String,
    pub unit: String,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ResultFields {
    pub gender: String,
    pub value: Option<f64>,
    pub gender_label: String,
    pub value_label: LocalizedText,
}

/// One row of the flattened answers view: a single
/// campaign/survey/method/section/indicator/gender combination, with the
/// previous campaign's matching value attached when the left join found one.
#[derive(PartialEq, Debug, Clone)]
pub struct FlatRow {
    pub campaign: CampaignFields,
    pub survey: SurveyFields,
    pub method: MethodFields,
    pub section: SectionFields,
    pub indicator: IndicatorFields,
    pub result: ResultFields,
    pub previous: Option<ResultFields>,
}

/// One row of the flattened export view. `str_gender` and `str_value` carry
/// the bracketed array encoding handled by [crate::decode].
#[derive(PartialEq, Debug, Clone)]
pub struct ExportRow {
    pub campaign_id: String,
    pub campaign_name: LocalizedText,
    pub organization_name: String,
    pub tax_id: String,
    pub contact: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub method_id: String,
    pub method_name: LocalizedText,
    pub section_id: Option<String>,
    pub section_title: LocalizedText,
    pub section_path_order: f64,
    pub indicator_code: String,
    pub indicator_name: LocalizedText,
    pub direct: bool,
    pub data_type: String,
    pub str_gender: Option<String>,
    pub str_value: Option<String>,
}

/// Mutually exclusive indicator selection for the export paths. There is no
/// "both" mode: a request either wants the answered (direct) indicators or
/// the computed ones.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum IndicatorFilter {
    Direct,
    Derived,
}

impl IndicatorFilter {
    pub fn from_direct_flag(direct_only: bool) -> IndicatorFilter {
        if direct_only {
            IndicatorFilter::Direct
        } else {
            IndicatorFilter::Derived
        }
    }

    pub fn matches(&self, direct: bool) -> bool {
        match self {
            IndicatorFilter::Direct => direct,
            IndicatorFilter::Derived => !direct,
        }
    }
}

// ******** Output data structures *********

/// The five-level answers tree. Child sequences are always present, possibly
/// empty, so the serialized schema does not depend on data volume.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ResultTree {
    pub campaigns: Vec<CampaignNode>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CampaignNode {
    pub id: String,
    pub name: String,
    pub year: i32,
    pub previous_campaign_id: Option<String>,
    pub surveys: Vec<SurveyNode>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct SurveyNode {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub status: String,
    pub organization_id: String,
    pub organization_name: String,
    pub tax_id: String,
    pub methods: Vec<MethodNode>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct MethodNode {
    pub id: String,
    pub active: bool,
    pub name: String,
    pub description: String,
    pub sections: Vec<SectionNode>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct SectionNode {
    pub id: String,
    pub title: String,
    pub path_order: f64,
    pub method_level: i32,
    pub indicators: Vec<IndicatorNode>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct IndicatorNode {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: String,
    pub direct: bool,
    pub category: String,
    pub data_type: String,
    pub unit: String,
    pub results: Vec<ResultNode>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ResultNode {
    pub gender: String,
    pub value: Option<f64>,
    pub gender_label: String,
    pub value_label: String,
    pub previous: Option<PreviousResult>,
}

/// The same organization's value for the same indicator in the previous
/// campaign. A companion value on the result, not a separate tree.
#[derive(PartialEq, Debug, Clone)]
pub struct PreviousResult {
    pub gender: String,
    pub value: Option<f64>,
    pub gender_label: String,
    pub value_label: String,
}

/// A populated pivot cell. Cells with no contributing row stay absent so the
/// spreadsheet distinguishes "no data" from a zero value.
#[derive(PartialEq, Debug, Clone)]
pub enum CellValue {
    /// Presence marker for multi-select classifications.
    Present,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Present => Some(1.0),
            CellValue::Number(x) => Some(*x),
            CellValue::Text(_) => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            CellValue::Present => "1".to_string(),
            CellValue::Number(x) => x.to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }
}

/// Errors that reject a single export row's contribution to the pivot.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum DecodeError {
    /// The bracketed list syntax could not be parsed.
    Malformed { content: String },
    /// The gender and value arrays decoded to different lengths. Lengths are
    /// never truncated or broadcast to match.
    CardinalityMismatch { genders: usize, values: usize },
    /// The indicator expects a numeric measurement but the content does not
    /// parse as a number.
    NonNumeric { content: String },
}

impl Error for DecodeError {}

impl Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Malformed { content } => {
                write!(f, "malformed array encoding: {}", content)
            }
            DecodeError::CardinalityMismatch { genders, values } => {
                write!(
                    f,
                    "gender/value cardinality mismatch: {} vs {}",
                    genders, values
                )
            }
            DecodeError::NonNumeric { content } => {
                write!(f, "expected a numeric value: {}", content)
            }
        }
    }
}

/// Identity of an export row that was rejected, for reporting.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RejectedRow {
    pub organization_name: String,
    pub indicator_code: String,
    pub section_id: Option<String>,
    pub error: DecodeError,
}
