use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;

use crate::app::actions::dispatcher::{Confirmer, Reporter};
use crate::app::actions::{Action, ActionEvent, ActionRequest, ActionStatus, ActionTag};
use crate::app::aggregate::DeviceQuery;
use crate::app::config::{onboarding_finished, set_onboarding_finished};
use crate::app::context::ExecutionContext;
use crate::app::engine::Engine;
use crate::app::error::AppError;
use crate::app::logging::{init_logging, resolve_trace_id};
use crate::app::models::{CommandResponse, Device, DeviceKind};

pub const USAGE: &str = "Usage:
  devicebar list [--android] [--ios] [--physical|--virtual] [--json]
  devicebar check [--json]
  devicebar action <tag> <device-name> [--android] [--ios] [--physical|--virtual]
                   [--yes] [--command <id>] [--json]
  devicebar android-home [<path>] [--json]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    List {
        query: DeviceQuery,
        json: bool,
    },
    Check {
        json: bool,
    },
    Action {
        tag: ActionTag,
        device: String,
        query: DeviceQuery,
        yes: bool,
        command: Option<String>,
        json: bool,
    },
    AndroidHome {
        path: Option<String>,
        json: bool,
    },
    Help,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupReport {
    android: bool,
    ios: bool,
    onboarding_finished: bool,
}

fn parse_tag(value: &str) -> Result<ActionTag, String> {
    let parsed = match value.parse::<i32>() {
        Ok(number) => ActionTag::from_tag(number),
        Err(_) => ActionTag::from_name(value),
    };
    parsed.ok_or_else(|| format!("Unknown action tag: {value}"))
}

pub fn parse_args(args: &[String]) -> Result<CliCommand, String> {
    let mut it = args.iter();
    let Some(subcommand) = it.next() else {
        return Ok(CliCommand::Help);
    };

    let mut json = false;
    let mut positional: Vec<String> = Vec::new();
    let mut android = false;
    let mut ios = false;
    let mut kind = DeviceKind::Both;
    let mut yes = false;
    let mut command: Option<String> = None;

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--android" => android = true,
            "--ios" => ios = true,
            "--physical" | "--virtual" if kind != DeviceKind::Both => {
                return Err("--physical and --virtual are mutually exclusive".to_string());
            }
            "--physical" => kind = DeviceKind::Physical,
            "--virtual" => kind = DeviceKind::Virtual,
            "--yes" | "-y" => yes = true,
            "--command" => {
                let value = it
                    .next()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| "--command requires a value".to_string())?;
                command = Some(value);
            }
            "-h" | "--help" => return Ok(CliCommand::Help),
            other if other.starts_with("--") => return Err(format!("Unknown arg: {other}")),
            other => positional.push(other.to_string()),
        }
    }

    match subcommand.as_str() {
        "list" => {
            if !positional.is_empty() {
                return Err(format!("Unexpected argument: {}", positional[0]));
            }
            // Neither flag means both platforms.
            let (android, ios) = if !android && !ios { (true, true) } else { (android, ios) };
            Ok(CliCommand::List {
                query: DeviceQuery::new(android, ios).with_kind(kind),
                json,
            })
        }
        "check" => Ok(CliCommand::Check { json }),
        "action" => {
            let [tag, device] = positional.as_slice() else {
                return Err("action requires <tag> <device-name>".to_string());
            };
            let tag = parse_tag(tag)?;
            if tag == ActionTag::CustomCommand && command.is_none() {
                return Err("custom_command requires --command <id>".to_string());
            }
            // Without platform flags, Android-only actions look up Android
            // devices only and everything else searches both platforms.
            let (android, ios) = match (android, ios) {
                (false, false) if tag.android_only() => (true, false),
                (false, false) => (true, true),
                flags => flags,
            };
            Ok(CliCommand::Action {
                tag,
                device: device.clone(),
                query: DeviceQuery::new(android, ios).with_kind(kind),
                yes,
                command,
                json,
            })
        }
        "android-home" => match positional.as_slice() {
            [] => Ok(CliCommand::AndroidHome { path: None, json }),
            [path] => Ok(CliCommand::AndroidHome {
                path: Some(path.clone()),
                json,
            }),
            _ => Err("android-home takes at most one path".to_string()),
        },
        "-h" | "--help" | "help" => Ok(CliCommand::Help),
        other => Err(format!("Unknown command: {other}")),
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("Failed to serialize output: {err}"),
    }
}

fn respond<T: Serialize>(trace_id: &str, data: T) {
    print_json(&CommandResponse {
        trace_id: trace_id.to_string(),
        data,
    });
}

fn report_error(err: &AppError, json: bool) -> i32 {
    if json {
        print_json(err);
    } else {
        eprintln!("error [{}]: {} (trace {})", err.code, err.diagnostic(), err.trace_id);
    }
    1
}

fn device_line(device: &Device) -> String {
    format!(
        "{}\t{:?}\t{}\t{}\t{}",
        device.platform,
        device.device_type,
        device.display_name(),
        device.identifier.as_deref().unwrap_or("-"),
        if device.booted { "booted" } else { "shutdown" }
    )
}

fn confirm_on_stdin(action: &Action) -> bool {
    print!("{:?} {}? [y/N] ", action.tag(), action.device().name);
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn run_action(
    engine: &Engine,
    tag: ActionTag,
    device_name: &str,
    query: DeviceQuery,
    yes: bool,
    command: Option<&str>,
    trace_id: &str,
) -> Result<ActionEvent, AppError> {
    let device = engine.find_device(ExecutionContext::Background, device_name, query, trace_id)?;
    let mut request = match (tag, command) {
        (ActionTag::CustomCommand, Some(id)) => {
            ActionRequest::custom(engine.find_command(device.platform, id, trace_id)?)
        }
        _ => ActionRequest::new(tag),
    };
    if yes {
        request = request.skipping_confirmation();
    }

    let slot: Arc<Mutex<Option<ActionEvent>>> = Arc::new(Mutex::new(None));
    let sink = slot.clone();
    let reporter: Reporter = Arc::new(move |event: ActionEvent| {
        if let Ok(mut guard) = sink.lock() {
            *guard = Some(event);
        }
    });
    let confirmer: Confirmer = Arc::new(confirm_on_stdin);

    let dispatcher = engine.dispatcher(reporter, confirmer);
    dispatcher.dispatch(&device, &request, Some(trace_id.to_string()));
    dispatcher.shutdown();

    let event = slot.lock().ok().and_then(|mut guard| guard.take());
    event.ok_or_else(|| AppError::system("Action finished without a report", trace_id))
}

fn execute(engine: &Engine, command: CliCommand, trace_id: &str) -> i32 {
    match command {
        CliCommand::Help => {
            println!("{USAGE}");
            0
        }
        CliCommand::List { query, json } => {
            match engine
                .coordinator
                .get_all_devices_blocking(ExecutionContext::Background, query, trace_id)
            {
                Ok(devices) if json => {
                    respond(trace_id, devices);
                    0
                }
                Ok(devices) => {
                    for device in &devices {
                        println!("{}", device_line(device));
                    }
                    0
                }
                Err(err) => report_error(&err, json),
            }
        }
        CliCommand::Check { json } => {
            let checks = engine
                .android
                .check_setup(ExecutionContext::Background, trace_id)
                .and_then(|android| {
                    engine
                        .ios
                        .check_setup(ExecutionContext::Background, trace_id)
                        .map(|ios| SetupReport {
                            android,
                            ios,
                            onboarding_finished: onboarding_finished(engine.locator.store().as_ref()),
                        })
                });
            match checks {
                Ok(report) if json => {
                    respond(trace_id, report);
                    0
                }
                Ok(report) => {
                    println!("android\t{}", if report.android { "ok" } else { "missing" });
                    println!("ios\t{}", if report.ios { "ok" } else { "missing" });
                    0
                }
                Err(err) => report_error(&err, json),
            }
        }
        CliCommand::Action {
            tag,
            device,
            query,
            yes,
            command,
            json,
        } => match run_action(engine, tag, &device, query, yes, command.as_deref(), trace_id) {
            Ok(event) => {
                let code = if event.status == ActionStatus::Succeeded { 0 } else { 1 };
                if json {
                    respond(trace_id, event);
                } else if let Some(err) = &event.error {
                    return report_error(err, false);
                } else {
                    println!("{:?} {} on {}", event.tag, status_word(event.status), event.device_name);
                }
                code
            }
            Err(err) => report_error(&err, json),
        },
        CliCommand::AndroidHome { path, json } => {
            let result = match path {
                Some(path) => engine
                    .locator
                    .set_android_home(&path, trace_id)
                    .and_then(|()| {
                        set_onboarding_finished(engine.locator.store().as_ref(), true);
                        engine.locator.get_android_home(trace_id)
                    }),
                None => engine.locator.get_android_home(trace_id),
            };
            match result {
                Ok(home) if json => {
                    respond(trace_id, home);
                    0
                }
                Ok(home) => {
                    println!("{home}");
                    0
                }
                Err(err) => report_error(&err, json),
            }
        }
    }
}

fn status_word(status: ActionStatus) -> &'static str {
    match status {
        ActionStatus::Succeeded => "succeeded",
        ActionStatus::Failed => "failed",
        ActionStatus::Cancelled => "cancelled",
    }
}

/// Entry point for the `devicebar` binary. Returns the process exit code.
pub fn run(args: &[String]) -> i32 {
    let command = match parse_args(args) {
        Ok(command) => command,
        Err(msg) => {
            eprintln!("{msg}\n{USAGE}");
            return 2;
        }
    };
    if command == CliCommand::Help {
        println!("{USAGE}");
        return 0;
    }

    init_logging("warn");
    let trace_id = resolve_trace_id(None);
    info!(trace_id = %trace_id, command = ?command, "devicebar invoked");

    let engine = match Engine::system() {
        Ok(engine) => engine,
        Err(err) => return report_error(&err, false),
    };
    let code = execute(&engine, command, &trace_id);
    engine.coordinator.shutdown();
    code
}
