use clap::Parser;

/// Reporting tool for campaign survey data.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The file containing the materialized rows of the answers
    /// view (tree mode) or of the export view (sheets and pivot modes).
    #[clap(short, long, value_parser)]
    pub input: String,

    /// (default json) The type of the input: json, or xlsx for export views
    /// handed around as workbooks.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (tree, sheets or pivot) tree prints the nested answers as JSON;
    /// sheets writes one worksheet per indicator code; pivot writes the
    /// indicator-by-organization matrix as a single worksheet.
    #[clap(short, long, value_parser)]
    pub mode: String,

    /// (ca, es or en, optional) The language for every display text. Fields
    /// without a variant in that language fall back to their default text.
    #[clap(short, long, value_parser)]
    pub lang: Option<String>,

    /// Export only the direct (answered) indicators. This is the default for
    /// the export modes.
    #[clap(long, takes_value = false)]
    pub direct: bool,

    /// Export only the derived (computed) indicators instead of the direct
    /// ones.
    #[clap(long, takes_value = false)]
    pub derived: bool,

    /// (optional) Keep only the rows of this organization id (tree mode).
    #[clap(long, value_parser)]
    pub organization: Option<String>,

    /// (optional) Keep only the rows of this campaign id.
    #[clap(long, value_parser)]
    pub campaign: Option<String>,

    /// (optional) Keep only the rows of this method id (export modes).
    #[clap(long, value_parser)]
    pub method: Option<String>,

    /// (file path, 'stdout' or empty) Tree mode: where to write the JSON
    /// output. Export modes: the directory receiving the workbook, whose
    /// file name is derived from the campaign and method display names.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) Tree mode only: a reference JSON tree. If provided,
    /// campdata checks that the generated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (optional) When reading an xlsx input, the name of the worksheet to
    /// use. Defaults to the only worksheet of the workbook.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
