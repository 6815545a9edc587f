mod pipeline;
mod pool;
mod trim;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{App, Arg, ArgMatches, SubCommand};
use env_logger::Env;
use log::{error, info};
use mcatrim_anvil::manager::{Paths, RegionManager};

use pipeline::{Config, Executor};
use pool::process_world;
use trim::{threshold_for_criteria, Trim};

/// Hand-written JSON-Schema document for the pipeline configuration
/// shape. No schema-generation crate is part of the teacher stack, so
/// `--generate-schema` emits this constant rather than deriving one.
const PIPELINE_SCHEMA: &str = include_str!("pipeline_schema.json");

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let matches = App::new("mcatrim")
        .about("Prune and transform Minecraft-compatible region files")
        .subcommand(
            SubCommand::with_name("trim")
                .arg(
                    Arg::with_name("input-region")
                        .long("input-region")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("output-region")
                        .long("output-region")
                        .takes_value(true)
                        .required(false),
                )
                .arg(
                    Arg::with_name("backup")
                        .long("backup")
                        .takes_value(true)
                        .min_values(0)
                        .required(false),
                )
                .arg(
                    Arg::with_name("parallel")
                        .long("parallel")
                        .takes_value(true)
                        .min_values(0)
                        .required(false),
                )
                .arg(
                    Arg::with_name("criteria")
                        .long("criteria")
                        .takes_value(true)
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("pipeline")
                .arg(
                    Arg::with_name("validate")
                        .long("validate")
                        .takes_value(true)
                        .required(false),
                )
                .arg(
                    Arg::with_name("run")
                        .long("run")
                        .takes_value(true)
                        .required(false),
                ),
        )
        .arg(
            Arg::with_name("generate-schema")
                .long("generate-schema")
                .takes_value(true)
                .required(false),
        )
        .get_matches();

    if let Some(schema_path) = matches.value_of("generate-schema") {
        return run_generate_schema(schema_path);
    }

    match matches.subcommand() {
        ("trim", Some(args)) => run_trim(args),
        ("pipeline", Some(args)) => run_pipeline(args),
        _ => {
            error!("{}", matches.usage());
            ExitCode::FAILURE
        }
    }
}

fn run_generate_schema(path: &str) -> ExitCode {
    match fs::write(path, PIPELINE_SCHEMA) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("failed to write schema to {path}: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_trim(args: &ArgMatches) -> ExitCode {
    let input = PathBuf::from(args.value_of("input-region").unwrap());
    let output = args.value_of("output-region").map(PathBuf::from);
    let backup = args.value_of("backup").map(PathBuf::from);
    let parallel = args
        .value_of("parallel")
        .map(|v| v.parse::<usize>())
        .transpose();
    let criteria = args.value_of("criteria").unwrap();

    let parallel = match parallel {
        Ok(p) => p,
        Err(e) => {
            error!("invalid --parallel value: {e}");
            return ExitCode::FAILURE;
        }
    };

    let threshold_ticks = match threshold_for_criteria(criteria) {
        Some(t) => t,
        None => {
            error!("unknown criteria key '{criteria}'");
            return ExitCode::FAILURE;
        }
    };

    let manager = RegionManager::new(Paths::new(
        &input,
        output.as_deref(),
        backup.as_deref(),
    ));

    let names = match manager.region_names() {
        Ok(n) => n,
        Err(e) => {
            error!("failed to enumerate region files: {e}");
            return ExitCode::FAILURE;
        }
    };

    let command = Trim { threshold_ticks };
    let mut total_evicted = 0;
    for result in process_world(&manager, parallel, names, command) {
        match result {
            Ok(evicted) => total_evicted += evicted,
            Err(e) => error!("{e}"),
        }
    }

    info!("done: evicted {total_evicted} chunk(s) total");
    ExitCode::SUCCESS
}

fn run_pipeline(args: &ArgMatches) -> ExitCode {
    if let Some(path) = args.value_of("validate") {
        return run_validate(Path::new(path));
    }
    if let Some(path) = args.value_of("run") {
        return run_execute(Path::new(path));
    }
    error!("pipeline requires --validate <file> or --run <file>");
    ExitCode::FAILURE
}

fn run_validate(path: &Path) -> ExitCode {
    let json = match fs::read_to_string(path) {
        Ok(j) => j,
        Err(e) => {
            error!("failed to read {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    let config = match Config::parse(&json) {
        Ok(c) => c,
        Err(e) => {
            error!("{} is not a valid pipeline configuration: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate() {
        error!("{} is not a valid pipeline configuration: {e}", path.display());
        return ExitCode::FAILURE;
    }

    info!("{} valid ({} pipeline(s))", path.display(), config.pipelines.len());
    ExitCode::SUCCESS
}

fn run_execute(path: &Path) -> ExitCode {
    let json = match fs::read_to_string(path) {
        Ok(j) => j,
        Err(e) => {
            error!("failed to read {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    let config = match Config::parse(&json) {
        Ok(c) => c,
        Err(e) => {
            error!("{} is not a valid pipeline configuration: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate() {
        error!("{} is not a valid pipeline configuration: {e}", path.display());
        return ExitCode::FAILURE;
    }

    for pipeline in &config.pipelines {
        let mut executor = match Executor::start(&pipeline.input_folder, pipeline.start_with, pipeline.threads) {
            Ok(e) => e,
            Err(e) => {
                error!("failed to start pipeline over {}: {e}", pipeline.input_folder.display());
                return ExitCode::FAILURE;
            }
        };

        info!(
            "{}: starting selection size {}",
            pipeline.input_folder.display(),
            executor.selected_len()
        );

        if let Err(e) = executor.run_pipeline(pipeline) {
            error!("pipeline over {} failed: {e}", pipeline.input_folder.display());
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
