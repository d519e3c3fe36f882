use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use qc_core::QcError;
use qc_metrics::{MetricParams, ToleranceUnit};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "qc",
    version = "0.3.0",
    about = "Quality control metrics for mass-spectrometry runs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum UnitArg {
    #[value(name = "auto")]
    Auto,
    #[value(name = "ppm")]
    Ppm,
    #[value(name = "da")]
    Da,
}

impl From<UnitArg> for ToleranceUnit {
    fn from(value: UnitArg) -> Self {
        match value {
            UnitArg::Auto => ToleranceUnit::Auto,
            UnitArg::Ppm => ToleranceUnit::Ppm,
            UnitArg::Da => ToleranceUnit::Da,
        }
    }
}

#[derive(Args)]
struct InputArgs {
    /// Consensus map (JSON) whose identifications carry a `UID`.
    #[arg(long)]
    in_cm: PathBuf,
    /// Raw spectra, one JSON file per run.
    #[arg(long, num_args = 1..)]
    in_raw: Vec<PathBuf>,
    /// Post-filter feature maps, one JSON file per run.
    #[arg(long, num_args = 1..)]
    in_post_fdr: Vec<PathBuf>,
    /// RT alignment transformations, one JSON file per run.
    #[arg(long, num_args = 1..)]
    in_trafo: Vec<PathBuf>,
    /// Contaminant protein database (FASTA).
    #[arg(long)]
    in_contaminants: Option<PathBuf>,
}

impl From<InputArgs> for qc_runner::QcInputs {
    fn from(value: InputArgs) -> Self {
        qc_runner::QcInputs {
            in_cm: value.in_cm,
            in_raw: value.in_raw,
            in_post_fdr: value.in_post_fdr,
            in_trafo: value.in_trafo,
            in_contaminants: value.in_contaminants,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    Run {
        #[command(flatten)]
        inputs: InputArgs,
        /// mzTab report.
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        out_cm: Option<PathBuf>,
        #[arg(long, num_args = 1..)]
        out_feat: Vec<PathBuf>,
        #[arg(long)]
        params: Option<PathBuf>,
        #[arg(long, value_enum)]
        fragment_mass_error_unit: Option<UnitArg>,
        /// Defaults to 20 when neither this flag nor the params file sets it.
        #[arg(long)]
        fragment_mass_error_tolerance: Option<f64>,
        #[arg(long)]
        force_no_fdr: bool,
        #[arg(long)]
        json: bool,
    },
    Describe {
        #[command(flatten)]
        inputs: InputArgs,
        #[arg(long)]
        json: bool,
    },
    ParamsInit {
        #[arg(long, default_value = "qc_params.yaml")]
        out: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    match run_command(cli.command) {
        Ok(Some(payload)) => {
            emit_json(&payload);
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(err) => {
            let qc_error = err.chain().find_map(|e| e.downcast_ref::<QcError>());
            let code = qc_error.map(|e| e.exit_code()).unwrap_or(1);
            if json_mode {
                let (kind, details) = match qc_error {
                    Some(QcError::IllegalParameter { param, .. }) => {
                        ("illegal_parameters", json!({ "param": param }))
                    }
                    Some(e) => (e.code(), json!({})),
                    None => ("command_failed", json!({})),
                };
                emit_json(&json_error(kind, format!("{:#}", err), details));
            } else {
                eprintln!("error: {:#}", err);
            }
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Run {
            inputs,
            out,
            out_cm,
            out_feat,
            params,
            fragment_mass_error_unit,
            fragment_mass_error_tolerance,
            force_no_fdr,
            json,
        } => {
            let mut metric_params = match &params {
                Some(path) => {
                    tracing::info!(path = %path.display(), "loading parameter file");
                    qc_runner::load_params(path)?
                }
                None => MetricParams::default(),
            };
            if let Some(unit) = fragment_mass_error_unit {
                metric_params.fragment_mass_error.unit = unit.into();
            }
            if let Some(tolerance) = fragment_mass_error_tolerance {
                if tolerance.is_nan() || tolerance <= 0.0 {
                    return Err(anyhow!(QcError::illegal(
                        "fragment_mass_error_tolerance",
                        "must be a positive number"
                    )));
                }
                metric_params.fragment_mass_error.tolerance = tolerance;
            }
            if force_no_fdr {
                metric_params.ms2_id_rate.force_no_fdr = true;
            }

            let inputs: qc_runner::QcInputs = inputs.into();
            let outputs = qc_runner::QcOutputs {
                out,
                out_cm,
                out_feat,
            };
            let result = qc_runner::run_quality_control(&inputs, &outputs, &metric_params)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "run",
                    "params": params_to_json(&metric_params),
                    "run": serde_json::to_value(&result)?,
                })));
            }
            print_run_result(&result);
        }
        Commands::Describe { inputs, json } => {
            let inputs: qc_runner::QcInputs = inputs.into();
            let plan = qc_runner::describe_quality_control(&inputs)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "describe",
                    "plan": serde_json::to_value(&plan)?,
                })));
            }
            print_plan(&plan);
        }
        Commands::ParamsInit { out, force } => {
            write_params_template(&out, force)?;
            println!("wrote: {}", out.display());
            println!(
                "next: qc run --params {} --in-cm <consensus.json> --out <report.mzTab>",
                out.display()
            );
        }
    }
    Ok(None)
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Run { json, .. } | Commands::Describe { json, .. } => *json,
        Commands::ParamsInit { .. } => false,
    }
}

fn params_to_json(params: &MetricParams) -> Value {
    json!({
        "fragment_mass_error": {
            "unit": params.fragment_mass_error.unit.as_str(),
            "tolerance": params.fragment_mass_error.tolerance,
        },
        "ms2_id_rate": {
            "force_no_fdr": params.ms2_id_rate.force_no_fdr,
        }
    })
}

fn print_skipped(skipped: &[qc_runner::SkippedMetric]) {
    for metric in skipped {
        let missing: Vec<String> = metric
            .missing
            .iter()
            .map(|r| format!("{} ({})", r.name(), r.input_param()))
            .collect();
        println!("skipped: {} (missing {})", metric.name, missing.join(", "));
    }
}

fn print_plan(plan: &qc_runner::QcPlan) {
    println!("runs: {}", plan.number_exps);
    println!("inputs: {}", plan.status);
    println!("metrics: {}", plan.runnable.join(", "));
    print_skipped(&plan.skipped);
}

fn print_run_result(result: &qc_runner::QcRunResult) {
    println!("runs: {}", result.number_exps);
    println!("inputs: {}", result.status);
    println!("metrics: {}", result.executed.join(", "));
    print_skipped(&result.skipped);
    println!("merged_identifications: {}", result.merged_ids);
    println!("staged_identifications: {}", result.staged_ids);
    println!("dropped_conflicts: {}", result.dropped_conflicts);
    println!("custom_entries: {}", result.custom_entries);
    println!("in_cm_sha256: {}", result.in_cm_sha256);
    println!("report: {}", result.report_path.display());
}

fn write_params_template(out: &Path, force: bool) -> Result<()> {
    if out.exists() && !force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            out.display()
        ));
    }
    let template = r#"# qc run --params <this file>
# Command-line flags take precedence over values set here.

fragment_mass_error:
  # auto | ppm | da; auto reads the tolerance from the search parameters
  unit: auto
  # used for ppm/da, and for auto when the search parameters carry none
  tolerance: 20

ms2_id_rate:
  # count every identification, even without target/decoy annotation
  force_no_fdr: false
"#;
    qc_core::atomic_write_bytes(out, template.as_bytes())
}
