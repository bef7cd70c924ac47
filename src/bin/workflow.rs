use std::path::PathBuf;

use serde::Serialize;
use spectatio_rust_lib::app::adb::device::AdbUiAccessor;
use spectatio_rust_lib::app::adb::locator::{
    resolve_adb_program, resolve_serial, validate_adb_program,
};
use spectatio_rust_lib::app::adb::parse::parse_ready_serials;
use spectatio_rust_lib::app::adb::runner::run_command_with_timeout;
use spectatio_rust_lib::app::config::{load_config, RunnerConfig};
use spectatio_rust_lib::app::error::AppError;
use spectatio_rust_lib::app::logging::init_logging;
use spectatio_rust_lib::app::models::{TaskOutcome, WorkflowReport};
use spectatio_rust_lib::app::workflow::interpreter::WorkflowInterpreter;
use spectatio_rust_lib::app::workflow::resolver::resolve;
use spectatio_rust_lib::app::workflow::store::ConfigStore;
use tracing::info;
use uuid::Uuid;

const USAGE: &str = "Usage: workflow [--config PATH] [--extension PATH] [--runtime PATH] [--adb PATH] [--serial SERIAL] [--json] <validate | list | lookup CATEGORY NAME | run WORKFLOW>";

#[derive(Debug, Clone)]
enum Action {
    Validate,
    List,
    Lookup { category: String, name: String },
    Run { workflow: String },
}

#[derive(Debug, Clone)]
struct Args {
    action: Action,
    config: Option<PathBuf>,
    extension: Option<PathBuf>,
    runtime: Option<PathBuf>,
    adb: Option<String>,
    serial: Option<String>,
    json: bool,
}

#[derive(Serialize)]
struct ValidateSummary<'a> {
    status: &'static str,
    trace_id: &'a str,
    loaded_from: Vec<String>,
    workflows: usize,
    ui_elements: usize,
    dangling_references: Vec<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut config: Option<PathBuf> = None;
    let mut extension: Option<PathBuf> = None;
    let mut runtime: Option<PathBuf> = None;
    let mut adb: Option<String> = None;
    let mut serial: Option<String> = None;
    let mut json = false;
    let mut positional: Vec<String> = Vec::new();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config = Some(PathBuf::from(value));
            }
            "--extension" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--extension requires a value".to_string())?;
                extension = Some(PathBuf::from(value));
            }
            "--runtime" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--runtime requires a value".to_string())?;
                runtime = Some(PathBuf::from(value));
            }
            "--adb" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--adb requires a value".to_string())?;
                adb = Some(value);
            }
            "--serial" => {
                serial = it
                    .next()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty());
                if serial.is_none() {
                    return Err("--serial requires a value".to_string());
                }
            }
            "--json" => {
                json = true;
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            other if other.starts_with("--") => return Err(format!("Unknown arg: {other}")),
            _ => positional.push(arg),
        }
    }

    let action = match positional.as_slice() {
        [command] if command == "validate" => Action::Validate,
        [command] if command == "list" => Action::List,
        [command, category, name] if command == "lookup" => Action::Lookup {
            category: category.clone(),
            name: name.clone(),
        },
        [command, workflow] if command == "run" => Action::Run {
            workflow: workflow.clone(),
        },
        [] => return Err(USAGE.to_string()),
        _ => return Err(format!("Unexpected arguments: {}\n{USAGE}", positional.join(" "))),
    };

    Ok(Args {
        action,
        config,
        extension,
        runtime,
        adb,
        serial,
        json,
    })
}

fn apply_overrides(mut settings: RunnerConfig, args: &Args) -> RunnerConfig {
    if let Some(path) = &args.config {
        settings.workflow.default_config_path = path.to_string_lossy().to_string();
    }
    if let Some(path) = &args.extension {
        settings.workflow.extension_config_path = path.to_string_lossy().to_string();
    }
    if let Some(path) = &args.runtime {
        settings.workflow.runtime_config_path = path.to_string_lossy().to_string();
    }
    if let Some(adb) = &args.adb {
        settings.adb.command_path = adb.clone();
    }
    settings
}

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn validate(store: &ConfigStore, args: &Args, trace_id: &str) -> Result<(), AppError> {
    let config = store.config(trace_id)?;
    let dangling = store.dangling_references();
    let summary = ValidateSummary {
        status: if dangling.is_empty() { "pass" } else { "fail" },
        trace_id,
        loaded_from: store
            .loaded_from()
            .iter()
            .map(|path| path.display().to_string())
            .collect(),
        workflows: config.workflows.len(),
        ui_elements: config.ui_elements.len(),
        dangling_references: dangling.clone(),
    };
    if args.json {
        print_json(&summary);
    } else {
        for path in &summary.loaded_from {
            println!("loaded {path}");
        }
        println!(
            "{} workflows, {} UI elements",
            summary.workflows, summary.ui_elements
        );
        for reference in &dangling {
            println!("dangling reference: {reference}");
        }
    }
    if dangling.is_empty() {
        Ok(())
    } else {
        Err(AppError::config(
            format!("{} dangling reference(s) in workflow config", dangling.len()),
            trace_id,
        ))
    }
}

fn list(store: &ConfigStore, args: &Args, trace_id: &str) -> Result<(), AppError> {
    store.config(trace_id)?;
    let names = store.workflow_names();
    if args.json {
        print_json(&names);
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

fn lookup(
    store: &ConfigStore,
    category: &str,
    name: &str,
    trace_id: &str,
) -> Result<(), AppError> {
    let serialize = |value: serde_json::Result<String>| {
        value.map_err(|err| {
            AppError::config(format!("Failed to serialize {name}: {err}"), trace_id)
        })
    };
    let rendered = match category.to_ascii_uppercase().as_str() {
        "ACTIONS" => store.action(name, trace_id)?.to_string(),
        "COMMANDS" => store.command(name, trace_id)?.to_string(),
        "PACKAGES" => store.package(name, trace_id)?.to_string(),
        "UI_ELEMENTS" => {
            let spec = store.ui_element(name, trace_id)?;
            let json = serialize(serde_json::to_string_pretty(spec))?;
            format!("{json}\nselector: {}", resolve(spec))
        }
        "WORKFLOWS" => serialize(serde_json::to_string_pretty(store.workflow(name, trace_id)?))?,
        other => {
            return Err(AppError::config(
                format!(
                    "Unknown category '{other}'; expected ACTIONS, COMMANDS, PACKAGES, UI_ELEMENTS or WORKFLOWS"
                ),
                trace_id,
            ))
        }
    };
    println!("{rendered}");
    Ok(())
}

fn pick_single_device(
    adb_program: &str,
    settings: &RunnerConfig,
    trace_id: &str,
) -> Result<String, AppError> {
    let args = vec!["devices".to_string()];
    let out = run_command_with_timeout(
        adb_program,
        &args,
        settings.adb.command_timeout(),
        trace_id,
    )?;
    if !out.success() {
        return Err(AppError::device(
            format!("adb devices failed: {}", out.stderr.trim()),
            trace_id,
        ));
    }
    let online = parse_ready_serials(&out.stdout);
    match online.as_slice() {
        [] => Err(AppError::device("No online adb devices found.", trace_id)),
        [serial] => Ok(serial.clone()),
        many => Err(AppError::device(
            format!(
                "Multiple online devices found ({}). Set ANDROID_SERIAL or pass --serial.",
                many.join(", ")
            ),
            trace_id,
        )),
    }
}

fn print_report(report: &WorkflowReport) {
    println!(
        "workflow {} finished in {} ms (trace {})",
        report.workflow, report.duration_ms, report.trace_id
    );
    for record in &report.tasks {
        let outcome = match record.outcome {
            TaskOutcome::Completed => "completed",
            TaskOutcome::Skipped => "skipped",
        };
        println!(
            "  #{} {} x{} {outcome} ({} ms)",
            record.index, record.task_type, record.repeats, record.duration_ms
        );
    }
}

fn run(
    store: &ConfigStore,
    settings: &RunnerConfig,
    workflow: &str,
    args: &Args,
    trace_id: &str,
) -> Result<(), AppError> {
    store.config(trace_id)?;
    let adb_program = resolve_adb_program(&settings.adb.command_path);
    validate_adb_program(&adb_program, trace_id)?;
    let serial = match resolve_serial(args.serial.as_deref(), &settings.adb.serial) {
        Some(serial) => serial,
        None => pick_single_device(&adb_program, settings, trace_id)?,
    };
    info!(trace_id = %trace_id, serial = %serial, workflow = %workflow, "running workflow");

    let accessor = AdbUiAccessor::new(
        adb_program,
        Some(serial),
        settings.adb.command_timeout(),
        trace_id,
    );
    let report = WorkflowInterpreter::new(store, &accessor, trace_id)
        .with_options(settings.workflow.interpreter_options())
        .execute_workflow(workflow)?;
    if args.json {
        print_json(&report);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn execute(args: &Args, trace_id: &str) -> Result<(), AppError> {
    let settings = apply_overrides(load_config(trace_id)?, args);
    let store = ConfigStore::load(&settings.workflow.config_sources(), trace_id)?;
    match &args.action {
        Action::Validate => validate(&store, args, trace_id),
        Action::List => list(&store, args, trace_id),
        Action::Lookup { category, name } => lookup(&store, category, name, trace_id),
        Action::Run { workflow } => run(&store, &settings, workflow, args, trace_id),
    }
}

fn main() {
    let args = match parse_args() {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    init_logging();
    let trace_id = Uuid::new_v4().to_string();

    if let Err(err) = execute(&args, &trace_id) {
        if args.json {
            eprintln!("{}", serde_json::to_string_pretty(&err).unwrap_or_default());
        } else {
            eprintln!("error: {err}");
        }
        std::process::exit(1);
    }
}
