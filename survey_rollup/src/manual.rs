/*!

# Data model and usage notes

This crate folds the flattened answers of a survey campaign into reporting
structures. It does not talk to a database: the caller (for instance the
`campdata` command line tool) materializes the rows from the source views
and hands them over as slices.

## The answers view

Each [crate::FlatRow] is one combination of campaign, survey, method,
section, indicator and gender, with the value columns of that combination.
The same campaign/survey/method/section/indicator tuple appears once per
gender split, so every level above the result is deduplicated by its id
while result rows all survive.

Two columns need care:

- the section id is nullable. Indicators asked outside any section arrive
  with no section id and are grouped under the fixed key
  [crate::NO_SECTION_ID], which is rendered like any other section.
- every display text arrives as a default column plus optional per-language
  variants ([crate::LocalizedText]). The requested [crate::Language] is an
  explicit parameter of every build call; there is no process-wide locale.

Build the tree with [crate::build_tree]:

```
use survey_rollup::builder::RowBuilder;
use survey_rollup::build_tree;

let rows = vec![RowBuilder::new("campaign-1", 2024)
    .survey("survey-1", "org-1", "Some organization", "B0000001")
    .method("method-1", "Questionnaire")
    .section(Some("section-1"), "General data", 1.0)
    .indicator("ind-1", "A01", "Paid workers")
    .result("M", Some(12.0))
    .row()];

let tree = build_tree(&rows, None);
assert_eq!(tree.campaigns.len(), 1);
```

## The export view

Each [crate::ExportRow] carries the answers of one organization to one
indicator with two string-encoded array columns, `str_gender` and
`str_value`. The bracketed encoding and the scalar-wrapping rule are
documented on [crate::decode::decode_arrays]. [crate::pivot::build_pivot]
turns the decoded rows into a sparse matrix with one column per
organization; undecodable rows are reported in the outcome and skipped
instead of aborting the export.

*/
