mod config;
pub mod builder;
pub mod decode;
pub mod manual;
pub mod pivot;

use log::{debug, info};

use std::collections::HashMap;

pub use crate::config::*;

/// Folds flat answers-view rows into the five-level campaign tree.
///
/// One pass over the rows maintains, for every level, an index from the
/// ancestor-scoped natural key to the position of the materialized node.
/// The first row that introduces a key supplies the node's attributes;
/// result rows are the non-distinct leaf and always append. A final pass
/// orders section children by path order, indicator children by code and
/// result children by (gender, previous gender). Campaign, survey and
/// method children keep first-seen order.
///
/// Zero input rows yield an empty tree, not an error.
pub fn build_tree(rows: &[FlatRow], lang: Option<Language>) -> ResultTree {
    info!("build_tree: processing {:?} rows, lang: {:?}", rows.len(), lang);

    let mut tree = ResultTree::default();

    type Key1 = String;
    type Key2 = (String, String);
    type Key3 = (String, String, String);
    type Key4 = (String, String, String, String);
    type Key5 = (String, String, String, String, String);
    let mut campaign_idx: HashMap<Key1, usize> = HashMap::new();
    let mut survey_idx: HashMap<Key2, usize> = HashMap::new();
    let mut method_idx: HashMap<Key3, usize> = HashMap::new();
    let mut section_idx: HashMap<Key4, usize> = HashMap::new();
    let mut indicator_idx: HashMap<Key5, usize> = HashMap::new();

    for row in rows.iter() {
        let campaign_key = row.campaign.id.clone();
        let ci = *campaign_idx.entry(campaign_key.clone()).or_insert_with(|| {
            tree.campaigns.push(campaign_node(&row.campaign, lang));
            tree.campaigns.len() - 1
        });

        let surveys = &mut tree.campaigns[ci].surveys;
        let survey_key = (campaign_key.clone(), row.survey.id.clone());
        let si = *survey_idx.entry(survey_key.clone()).or_insert_with(|| {
            surveys.push(survey_node(&row.survey));
            surveys.len() - 1
        });

        let methods = &mut surveys[si].methods;
        let method_key = (survey_key.0.clone(), survey_key.1.clone(), row.method.id.clone());
        let mi = *method_idx.entry(method_key.clone()).or_insert_with(|| {
            methods.push(method_node(&row.method, lang));
            methods.len() - 1
        });

        let sections = &mut methods[mi].sections;
        let section_id = row
            .section
            .id
            .clone()
            .unwrap_or_else(|| NO_SECTION_ID.to_string());
        let section_key = (
            method_key.0.clone(),
            method_key.1.clone(),
            method_key.2.clone(),
            section_id.clone(),
        );
        let sei = *section_idx.entry(section_key.clone()).or_insert_with(|| {
            sections.push(section_node(&row.section, section_id, lang));
            sections.len() - 1
        });

        let indicators = &mut sections[sei].indicators;
        let indicator_key = (
            section_key.0.clone(),
            section_key.1.clone(),
            section_key.2.clone(),
            section_key.3.clone(),
            row.indicator.id.clone(),
        );
        let ii = *indicator_idx.entry(indicator_key).or_insert_with(|| {
            indicators.push(indicator_node(&row.indicator, lang));
            indicators.len() - 1
        });

        indicators[ii]
            .results
            .push(result_node(&row.result, row.previous.as_ref(), lang));
    }

    order_children(&mut tree);

    debug!(
        "build_tree: {:?} campaigns in output tree",
        tree.campaigns.len()
    );
    tree
}

fn campaign_node(c: &CampaignFields, lang: Option<Language>) -> CampaignNode {
    CampaignNode {
        id: c.id.clone(),
        name: c.name.resolve(lang).to_string(),
        year: c.year,
        previous_campaign_id: c.previous_campaign_id.clone(),
        surveys: Vec::new(),
    }
}

fn survey_node(s: &SurveyFields) -> SurveyNode {
    SurveyNode {
        id: s.id.clone(),
        created_at: s.created_at.clone(),
        updated_at: s.updated_at.clone(),
        status: s.status.clone(),
        organization_id: s.organization_id.clone(),
        organization_name: s.organization_name.clone(),
        tax_id: s.tax_id.clone(),
        methods: Vec::new(),
    }
}

fn method_node(m: &MethodFields, lang: Option<Language>) -> MethodNode {
    MethodNode {
        id: m.id.clone(),
        active: m.active,
        name: m.name.resolve(lang).to_string(),
        description: m.description.resolve(lang).to_string(),
        sections: Vec::new(),
    }
}

fn section_node(s: &SectionFields, id: String, lang: Option<Language>) -> SectionNode {
    SectionNode {
        id,
        title: s.title.resolve(lang).to_string(),
        path_order: s.path_order,
        method_level: s.method_level,
        indicators: Vec::new(),
    }
}

fn indicator_node(i: &IndicatorFields, lang: Option<Language>) -> IndicatorNode {
    IndicatorNode {
        id: i.id.clone(),
        code: i.code.clone(),
        name: i.name.resolve(lang).to_string(),
        description: i.description.resolve(lang).to_string(),
        direct: i.direct,
        category: i.category.clone(),
        data_type: i.data_type.clone(),
        unit: i.unit.clone(),
        results: Vec::new(),
    }
}

fn result_node(
    r: &ResultFields,
    previous: Option<&ResultFields>,
    lang: Option<Language>,
) -> ResultNode {
    ResultNode {
        gender: r.gender.clone(),
        value: r.value,
        gender_label: r.gender_label.clone(),
        value_label: r.value_label.resolve(lang).to_string(),
        previous: previous.map(|p| PreviousResult {
            gender: p.gender.clone(),
            value: p.value,
            gender_label: p.gender_label.clone(),
            value_label: p.value_label.resolve(lang).to_string(),
        }),
    }
}

// Sections by path order, indicators by code, results by (gender, previous
// gender). The sorts are stable, so equal keys keep insertion order.
fn order_children(tree: &mut ResultTree) {
    for campaign in tree.campaigns.iter_mut() {
        for survey in campaign.surveys.iter_mut() {
            for method in survey.methods.iter_mut() {
                method
                    .sections
                    .sort_by(|a, b| a.path_order.total_cmp(&b.path_order));
                for section in method.sections.iter_mut() {
                    section.indicators.sort_by(|a, b| a.code.cmp(&b.code));
                    for indicator in section.indicators.iter_mut() {
                        indicator.results.sort_by(|a, b| {
                            let ka = (
                                a.gender.as_str(),
                                a.previous.as_ref().map(|p| p.gender.as_str()),
                            );
                            let kb = (
                                b.gender.as_str(),
                                b.previous.as_ref().map(|p| p.gender.as_str()),
                            );
                            ka.cmp(&kb)
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::RowBuilder;
    use crate::*;
    use std::collections::HashSet;

    fn two_section_rows() -> Vec<FlatRow> {
        let base = RowBuilder::new("c1", 2024)
            .campaign_name("Campaign one")
            .survey("sv1", "org1", "Org One", "B000001");
        vec![
            base.clone()
                .method("m1", "Method one")
                .section(Some("s2"), "Late section", 2.0)
                .indicator("i2", "B01", "Indicator B")
                .result("M", Some(4.0))
                .row(),
            base.clone()
                .method("m1", "Method one")
                .section(Some("s2"), "Late section", 2.0)
                .indicator("i2", "B01", "Indicator B")
                .result("F", Some(6.0))
                .row(),
            base.clone()
                .method("m1", "Method one")
                .section(Some("s1"), "Early section", 1.0)
                .indicator("i1", "A01", "Indicator A")
                .result("M", Some(1.0))
                .row(),
            base.method("m1", "Method one")
                .section(Some("s1"), "Early section", 1.0)
                .indicator("i1", "A01", "Indicator A")
                .result("F", Some(2.0))
                .row(),
        ]
    }

    #[test]
    fn empty_input_yields_empty_tree() {
        let tree = build_tree(&[], None);
        assert_eq!(tree, ResultTree::default());
    }

    #[test]
    fn end_to_end_shape_and_order() {
        let tree = build_tree(&two_section_rows(), None);
        assert_eq!(tree.campaigns.len(), 1);
        let campaign = &tree.campaigns[0];
        assert_eq!(campaign.name, "Campaign one");
        assert_eq!(campaign.year, 2024);
        assert_eq!(campaign.surveys.len(), 1);
        let survey = &campaign.surveys[0];
        assert_eq!(survey.methods.len(), 1);
        let method = &survey.methods[0];
        assert_eq!(method.sections.len(), 2);
        // Sections come back in path order even though the rows arrived with
        // the late section first.
        assert_eq!(method.sections[0].title, "Early section");
        assert_eq!(method.sections[1].title, "Late section");
        for section in method.sections.iter() {
            assert_eq!(section.indicators.len(), 1);
            let indicator = &section.indicators[0];
            assert_eq!(indicator.results.len(), 2);
            assert_eq!(indicator.results[0].gender, "F");
            assert_eq!(indicator.results[1].gender, "M");
        }
    }

    #[test]
    fn flattening_reproduces_input_tuples() {
        let rows = two_section_rows();
        let tree = build_tree(&rows, None);
        let mut flattened: Vec<(String, String, String, String, String, String)> = Vec::new();
        for c in tree.campaigns.iter() {
            for sv in c.surveys.iter() {
                for m in sv.methods.iter() {
                    for se in m.sections.iter() {
                        for i in se.indicators.iter() {
                            for r in i.results.iter() {
                                flattened.push((
                                    c.id.clone(),
                                    sv.id.clone(),
                                    m.id.clone(),
                                    se.id.clone(),
                                    i.id.clone(),
                                    r.gender.clone(),
                                ));
                            }
                        }
                    }
                }
            }
        }
        assert_eq!(flattened.len(), rows.len());
        let expected: HashSet<_> = rows
            .iter()
            .map(|r| {
                (
                    r.campaign.id.clone(),
                    r.survey.id.clone(),
                    r.method.id.clone(),
                    r.section.id.clone().unwrap(),
                    r.indicator.id.clone(),
                    r.result.gender.clone(),
                )
            })
            .collect();
        let got: HashSet<_> = flattened.into_iter().collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn levels_deduplicate_results_do_not() {
        let rows = two_section_rows();
        let tree = build_tree(&rows, None);
        // 4 rows over 1 campaign / 1 survey / 1 method / 2 sections,
        // 2 result rows per indicator survive.
        let method = &tree.campaigns[0].surveys[0].methods[0];
        let total_results: usize = method
            .sections
            .iter()
            .flat_map(|s| s.indicators.iter())
            .map(|i| i.results.len())
            .sum();
        assert_eq!(total_results, 4);
    }

    #[test]
    fn missing_section_groups_under_sentinel() {
        let row = RowBuilder::new("c1", 2024)
            .survey("sv1", "org1", "Org One", "B000001")
            .method("m1", "Method one")
            .section(None, "", 99.0)
            .indicator("i1", "A01", "Indicator A")
            .result("T", None)
            .row();
        let tree = build_tree(&[row], None);
        let sections = &tree.campaigns[0].surveys[0].methods[0].sections;
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].id, NO_SECTION_ID);
    }

    #[test]
    fn indicators_sorted_by_code_within_section() {
        let base = RowBuilder::new("c1", 2024)
            .survey("sv1", "org1", "Org One", "B000001")
            .method("m1", "Method one")
            .section(Some("s1"), "Section", 1.0);
        let rows = vec![
            base.clone()
                .indicator("i9", "Z09", "Last")
                .result("T", Some(1.0))
                .row(),
            base.indicator("i0", "A01", "First")
                .result("T", Some(1.0))
                .row(),
        ];
        let tree = build_tree(&rows, None);
        let codes: Vec<&str> = tree.campaigns[0].surveys[0].methods[0].sections[0]
            .indicators
            .iter()
            .map(|i| i.code.as_str())
            .collect();
        assert_eq!(codes, vec!["A01", "Z09"]);
    }

    #[test]
    fn localization_resolves_variant_and_falls_back() {
        let row = RowBuilder::new("c1", 2024)
            .campaign_name_text(
                LocalizedText::plain("Campanya").with_variant(Language::En, "Campaign"),
            )
            .survey("sv1", "org1", "Org One", "B000001")
            .method("m1", "Method one")
            .section(Some("s1"), "Section", 1.0)
            .indicator("i1", "A01", "Indicator A")
            .result("T", Some(1.0))
            .row();
        let english = build_tree(&[row.clone()], Some(Language::En));
        assert_eq!(english.campaigns[0].name, "Campaign");
        // No Spanish variant on the field: the default wins.
        let spanish = build_tree(&[row.clone()], Some(Language::Es));
        assert_eq!(spanish.campaigns[0].name, "Campanya");
        let default = build_tree(&[row], None);
        assert_eq!(default.campaigns[0].name, "Campanya");
    }

    #[test]
    fn previous_result_rides_along() {
        let row = RowBuilder::new("c2", 2024)
            .previous_campaign("c1")
            .survey("sv1", "org1", "Org One", "B000001")
            .method("m1", "Method one")
            .section(Some("s1"), "Section", 1.0)
            .indicator("i1", "A01", "Indicator A")
            .result("M", Some(12.0))
            .previous_result("M", Some(10.0))
            .row();
        let tree = build_tree(&[row], None);
        let result = &tree.campaigns[0].surveys[0].methods[0].sections[0].indicators[0].results[0];
        let previous = result.previous.as_ref().unwrap();
        assert_eq!(previous.value, Some(10.0));
        assert_eq!(previous.gender, "M");
    }
}
