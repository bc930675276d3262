use log::info;

use clap::Parser;
use snafu::ErrorCompat;

use survey_rollup::{IndicatorFilter, Language};

mod args;
mod report;

use crate::report::row_reader::InputType;
use crate::report::{ExportMode, ExportOptions, ReportError, ReportResult, TreeOptions};

fn run(args: &args::Args) -> ReportResult<()> {
    let lang = match args.lang.as_deref() {
        None => None,
        Some(code) => match Language::parse(code) {
            Some(l) => Some(l),
            None => {
                return Err(ReportError::InvalidLanguage {
                    code: code.to_string(),
                });
            }
        },
    };

    let input_type = InputType::parse(args.input_type.as_deref())?;

    if args.direct && args.derived {
        return Err(ReportError::ConflictingFilters {});
    }
    let filter = IndicatorFilter::from_direct_flag(!args.derived);

    match args.mode.as_str() {
        "tree" => report::run_tree(
            &args.input,
            &TreeOptions {
                lang,
                organization: args.organization.clone(),
                campaign: args.campaign.clone(),
                out: args.out.clone(),
                reference: args.reference.clone(),
            },
        ),
        "sheets" | "pivot" => {
            let mode = if args.mode == "pivot" {
                ExportMode::Pivot
            } else {
                ExportMode::IndicatorSheets
            };
            let path = report::run_export(
                &args.input,
                &ExportOptions {
                    mode,
                    lang,
                    filter,
                    campaign: args.campaign.clone(),
                    method: args.method.clone(),
                    out_dir: args.out.clone().unwrap_or_else(|| ".".to_string()),
                    input_type,
                    worksheet: args.excel_worksheet_name.clone(),
                },
            )?;
            println!("{}", path);
            Ok(())
        }
        other => Err(ReportError::InvalidMode {
            mode: other.to_string(),
        }),
    }
}

fn main() {
    let args = args::Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    info!("args: {:?}", args);

    if let Err(e) = run(&args) {
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
