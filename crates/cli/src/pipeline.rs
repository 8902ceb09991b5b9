//! `gamba areas|weights|merge|run|validate`: config-driven batch stages.

use chrono::{Local, NaiveDate};
use clap::Args;

use gamba_config::{ConfigError, PipelineConfig};
use gamba_io::pipeline::{
    parse_cli_date, AreasSummary, DateFilter, DateSelection, MergeReport, Pipeline, RunReport,
    WeightsSummary,
};
use gamba_io::IoError;

use crate::exit_codes::{
    EXIT_ERROR, EXIT_PIPELINE_CONFIG, EXIT_PIPELINE_LEDGER, EXIT_PIPELINE_RUNTIME,
    EXIT_PIPELINE_UNMATCHED, EXIT_USAGE,
};
use crate::{CliError, GlobalArgs};

/// Date selection flags shared by every stage.
#[derive(Args, Debug, Default)]
pub struct DateArgs {
    /// Only process today's date
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub today: bool,

    /// First date to process (YYYY-MM-DD or DD-MM-YYYY)
    #[arg(long, value_parser = parse_date_arg, requires = "to")]
    pub from: Option<NaiveDate>,

    /// Last date to process, inclusive
    #[arg(long, value_parser = parse_date_arg, requires = "from")]
    pub to: Option<NaiveDate>,
}

fn parse_date_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_cli_date(raw).ok_or_else(|| format!("invalid date '{raw}', expected YYYY-MM-DD or DD-MM-YYYY"))
}

impl DateArgs {
    fn filter(&self) -> Result<DateFilter, CliError> {
        if self.today {
            return Ok(DateFilter::Only(Local::now().date_naive()));
        }
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(CliError::new(
                EXIT_USAGE,
                format!("--from {from} is after --to {to}"),
            )),
            (Some(from), Some(to)) if from == to => Ok(DateFilter::Only(from)),
            (Some(from), Some(to)) => Ok(DateFilter::Range { from, to }),
            _ => Ok(DateFilter::All),
        }
    }
}

fn config_err(e: ConfigError) -> CliError {
    CliError::new(EXIT_PIPELINE_CONFIG, e.to_string())
}

fn io_err(e: IoError) -> CliError {
    match e {
        IoError::Ledger(_) => CliError::new(EXIT_PIPELINE_LEDGER, e.to_string())
            .with_hint("the ledger needs FECHA, NUMVENTA, PESONETO, IMPORTE and NUMENVAS columns"),
        _ => CliError::new(EXIT_PIPELINE_RUNTIME, e.to_string()),
    }
}

/// `--config`, else the default config file, else a bare `--base-dir`.
fn load_config(global: &GlobalArgs) -> Result<PipelineConfig, CliError> {
    let mut config = match &global.config {
        Some(path) => PipelineConfig::load(path).map_err(config_err)?,
        None => {
            let default = PipelineConfig::default_path();
            if default.is_file() {
                log::debug!("using config {}", default.display());
                PipelineConfig::load(&default).map_err(config_err)?
            } else if let Some(base_dir) = &global.base_dir {
                PipelineConfig::with_base_dir(base_dir)
            } else {
                return Err(CliError::new(EXIT_PIPELINE_CONFIG, "no pipeline config found")
                    .with_hint(format!(
                        "pass --config <file>, --base-dir <dir>, or create {}",
                        default.display()
                    )));
            }
        }
    };
    if let Some(base_dir) = &global.base_dir {
        config.base_dir = base_dir.clone();
    }
    if global.year.is_some() {
        config.year = global.year;
    }
    config.validate().map_err(config_err)?;
    Ok(config)
}

fn setup(global: &GlobalArgs, dates: &DateArgs) -> Result<(Pipeline, DateSelection), CliError> {
    let config = load_config(global)?;
    let selection = DateSelection {
        filter: dates.filter()?,
        year: config.year,
    };
    Ok((Pipeline::new(&config), selection))
}

fn render_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json = render_json(value)?;
    println!("{json}");
    Ok(())
}

fn strict_check(strict: bool, merge: &MergeReport) -> Result<(), CliError> {
    let unmatched = merge.unmatched_rows();
    if strict && unmatched > 0 {
        return Err(CliError::new(
            EXIT_PIPELINE_UNMATCHED,
            format!("{unmatched} images without a ledger match"),
        )
        .with_hint("see RESULTS/no_merge/ for the unmatched images"));
    }
    Ok(())
}

fn date_label(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
}

// ---------------------------------------------------------------------------
// Human summaries (stderr)
// ---------------------------------------------------------------------------

fn report_areas(areas: &[AreasSummary]) {
    if areas.is_empty() {
        eprintln!("areas: no dates processed");
    }
    for s in areas {
        eprintln!(
            "areas {}: {} label files, {} detections, {} lines skipped",
            date_label(s.date),
            s.label_files,
            s.detections,
            s.skipped_lines
        );
    }
}

fn report_weights(weights: &[WeightsSummary]) {
    if weights.is_empty() {
        eprintln!("weights: no dates processed");
    }
    for s in weights {
        eprintln!(
            "weights {}: {} images, {} metadata rows, {} processed ({} without metadata, {} without class 2)",
            date_label(s.date),
            s.images,
            s.metadata_rows,
            s.processed_rows,
            s.without_metadata,
            s.without_detections
        );
    }
}

fn report_merge(merge: &MergeReport) {
    for date in &merge.failed_dates {
        eprintln!("merge {date}: failed, see log");
    }
    if merge.dates.is_empty() {
        eprintln!("merge: no dates processed");
        return;
    }
    eprintln!(
        "ledger: {} rows, {} skipped, {} invalid NUMENVAS, {} cancelled",
        merge.ledger_rows, merge.ledger_skipped, merge.ledger_invalid_quantity, merge.ledger_cancelled
    );
    if merge.table_rows_skipped > 0 {
        eprintln!("processed tables: {} unreadable rows skipped", merge.table_rows_skipped);
    }
    for s in &merge.dates {
        eprintln!(
            "merge {}: {} images, {} merged, {} duplicated, {} unmatched",
            date_label(s.date),
            s.universe_rows,
            s.merged_rows,
            s.duplicate_rows,
            s.unmatched_rows
        );
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub fn cmd_areas(global: &GlobalArgs, dates: DateArgs) -> Result<(), CliError> {
    let (pipeline, selection) = setup(global, &dates)?;
    let areas = pipeline.compute_areas(selection).map_err(io_err)?;
    report_areas(&areas);
    Ok(())
}

pub fn cmd_weights(global: &GlobalArgs, dates: DateArgs) -> Result<(), CliError> {
    let (pipeline, selection) = setup(global, &dates)?;
    let weights = pipeline.compute_weights(selection).map_err(io_err)?;
    report_weights(&weights);
    Ok(())
}

pub fn cmd_merge(global: &GlobalArgs, dates: DateArgs, json: bool, strict: bool) -> Result<(), CliError> {
    let (pipeline, selection) = setup(global, &dates)?;
    let merge = pipeline.merge(selection).map_err(io_err)?;
    if json {
        print_json(&merge.dates)?;
    }
    report_merge(&merge);
    strict_check(strict, &merge)
}

pub fn cmd_run(global: &GlobalArgs, dates: DateArgs, json: bool, strict: bool) -> Result<(), CliError> {
    let (pipeline, selection) = setup(global, &dates)?;
    let report: RunReport = pipeline.run(selection).map_err(io_err)?;
    if json {
        print_json(&report)?;
    }
    report_areas(&report.areas);
    report_weights(&report.weights);
    report_merge(&report.merge);
    strict_check(strict, &report.merge)
}

pub fn cmd_validate(global: &GlobalArgs) -> Result<(), CliError> {
    let config = load_config(global)?;
    let pipeline = Pipeline::new(&config);
    let p = pipeline.paths();
    eprintln!("config OK");
    println!("base_dir       {}", config.base_dir.display());
    println!("year           {}", config.year.map(|y| y.to_string()).unwrap_or_else(|| "-".into()));
    println!("inference_dir  {}", p.inference_dir.display());
    println!("areas_dir      {}", p.areas_dir.display());
    println!("temp_dir       {}", p.temp_dir.display());
    println!("results_dir    {}", p.results_dir.display());
    println!("ledger_file    {}", p.ledger_file.display());
    println!("metadata_file  {}", p.metadata_file.display());
    Ok(())
}
