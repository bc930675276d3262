pub use crate::config::*;

/// A builder for assembling flat answers-view rows.
///
/// The view carries more than thirty columns per row; the builder fills the
/// ones a caller does not care about with neutral defaults.
///
/// ```
/// pub use survey_rollup::builder::RowBuilder;
///
/// let row = RowBuilder::new("campaign-1", 2024)
///     .survey("survey-1", "org-1", "Some organization", "B0000001")
///     .method("method-1", "Questionnaire")
///     .section(Some("section-1"), "General data", 1.0)
///     .indicator("ind-1", "A01", "Paid workers")
///     .result("M", Some(12.0))
///     .row();
///
/// assert_eq!(row.indicator.code, "A01");
/// ```
#[derive(PartialEq, Debug, Clone)]
pub struct RowBuilder {
    _row: FlatRow,
}

impl RowBuilder {
    pub fn new(campaign_id: &str, year: i32) -> RowBuilder {
        RowBuilder {
            _row: FlatRow {
                campaign: CampaignFields {
                    id: campaign_id.to_string(),
                    name: LocalizedText::plain(campaign_id),
                    year,
                    previous_campaign_id: None,
                },
                survey: SurveyFields {
                    id: String::new(),
                    created_at: String::new(),
                    updated_at: String::new(),
                    status: String::new(),
                    organization_id: String::new(),
                    organization_name: String::new(),
                    tax_id: String::new(),
                },
                method: MethodFields {
                    id: String::new(),
                    active: true,
                    name: LocalizedText::default(),
                    description: LocalizedText::default(),
                },
                section: SectionFields {
                    id: None,
                    title: LocalizedText::default(),
                    path_order: 0.0,
                    method_level: 0,
                },
                indicator: IndicatorFields {
                    id: String::new(),
                    code: String::new(),
                    name: LocalizedText::default(),
                    description: LocalizedText::default(),
                    direct: true,
                    category: String::new(),
                    data_type: String::new(),
                    unit: String::new(),
                },
                result: ResultFields {
                    gender: String::new(),
                    value: None,
                    gender_label: String::new(),
                    value_label: LocalizedText::default(),
                },
                previous: None,
            },
        }
    }

    pub fn campaign_name(mut self, name: &str) -> RowBuilder {
        self._row.campaign.name = LocalizedText::plain(name);
        self
    }

    pub fn campaign_name_text(mut self, name: LocalizedText) -> RowBuilder {
        self._row.campaign.name = name;
        self
    }

    pub fn previous_campaign(mut self, id: &str) -> RowBuilder {
        self._row.campaign.previous_campaign_id = Some(id.to_string());
        self
    }

    pub fn survey(
        mut self,
        id: &str,
        organization_id: &str,
        organization_name: &str,
        tax_id: &str,
    ) -> RowBuilder {
        self._row.survey.id = id.to_string();
        self._row.survey.organization_id = organization_id.to_string();
        self._row.survey.organization_name = organization_name.to_string();
        self._row.survey.tax_id = tax_id.to_string();
        self
    }

    pub fn survey_status(mut self, status: &str, created_at: &str, updated_at: &str) -> RowBuilder {
        self._row.survey.status = status.to_string();
        self._row.survey.created_at = created_at.to_string();
        self._row.survey.updated_at = updated_at.to_string();
        self
    }

    pub fn method(mut self, id: &str, name: &str) -> RowBuilder {
        self._row.method.id = id.to_string();
        self._row.method.name = LocalizedText::plain(name);
        self
    }

    pub fn method_description(mut self, description: LocalizedText) -> RowBuilder {
        self._row.method.description = description;
        self
    }

    pub fn section(mut self, id: Option<&str>, title: &str, path_order: f64) -> RowBuilder {
        self._row.section.id = id.map(|s| s.to_string());
        self._row.section.title = LocalizedText::plain(title);
        self._row.section.path_order = path_order;
        self
    }

    pub fn indicator(mut self, id: &str, code: &str, name: &str) -> RowBuilder {
        self._row.indicator.id = id.to_string();
        self._row.indicator.code = code.to_string();
        self._row.indicator.name = LocalizedText::plain(name);
        self
    }

    pub fn indicator_kind(mut self, direct: bool, data_type: &str, unit: &str) -> RowBuilder {
        self._row.indicator.direct = direct;
        self._row.indicator.data_type = data_type.to_string();
        self._row.indicator.unit = unit.to_string();
        self
    }

    pub fn result(mut self, gender: &str, value: Option<f64>) -> RowBuilder {
        self._row.result.gender = gender.to_string();
        self._row.result.value = value;
        self
    }

    pub fn result_labels(mut self, gender_label: &str, value_label: LocalizedText) -> RowBuilder {
        self._row.result.gender_label = gender_label.to_string();
        self._row.result.value_label = value_label;
        self
    }

    pub fn previous_result(mut self, gender: &str, value: Option<f64>) -> RowBuilder {
        self._row.previous = Some(ResultFields {
            gender: gender.to_string(),
            value,
            gender_label: String::new(),
            value_label: LocalizedText::default(),
        });
        self
    }

    pub fn row(self) -> FlatRow {
        self._row
    }
}
