use tracing::info;

use crate::app::actions::template::expand_template;
use crate::app::actions::{
    require_booted, require_command, require_identifier, ActionEnv, ActionOutcome, ActionRequest,
    ActionTag,
};
use crate::app::config::preferred_terminal;
use crate::app::context::ExecutionContext;
use crate::app::error::AppError;
use crate::app::exec::shell;
use crate::app::models::{Command, Device, DeviceType};
use crate::app::toolchain::paths::shell_quote;

pub const ACCESSIBILITY_SETTING: &str = "enabled_accessibility_services";
pub const TALKBACK_ON: &str =
    "com.google.android.marvin.talkback/com.google.android.marvin.talkback.TalkBackService";
pub const TALKBACK_OFF: &str =
    "com.android.talkback/com.google.android.marvin.talkback.TalkBackService";

const COLD_BOOT_FLAG: &str = "-no-snapshot";
const NO_AUDIO_FLAG: &str = "-no-audio";
const SHELL_SPECIAL: &[char] = &[
    '\\', '"', '\'', '`', '$', '&', '|', ';', '<', '>', '(', ')', '*', '~', '#', '?', '!', '[', ']',
    '{', '}',
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AndroidAction {
    CopyName { device: Device },
    CopyIdentifier { device: Device, identifier: String },
    Delete { device: Device, confirm: bool },
    ColdBoot { device: Device },
    NoAudio { device: Device },
    ToggleAccessibility { device: Device, serial: String },
    PasteClipboardText { device: Device, serial: String },
    LaunchLogStream { device: Device, serial: String },
    CustomCommand { device: Device, command: Command },
}

/// Text for `adb shell input text`: spaces become `%s`, shell
/// metacharacters are backslash-escaped for the device shell.
pub fn escape_input_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            ' ' => escaped.push_str("%s"),
            '\n' | '\r' | '\t' => escaped.push_str("%s"),
            ch if SHELL_SPECIAL.contains(&ch) => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ch => escaped.push(ch),
        }
    }
    escaped
}

pub fn next_accessibility_value(current: &str) -> &'static str {
    if current.trim() == TALKBACK_ON {
        TALKBACK_OFF
    } else {
        TALKBACK_ON
    }
}

fn ensure_virtual(device: &Device, tag: ActionTag, trace_id: &str) -> Result<(), AppError> {
    match device.device_type {
        DeviceType::Virtual => Ok(()),
        DeviceType::Physical => Err(AppError::unsupported(
            format!("{} is not available for physical device {}", tag.name(), device.name),
            trace_id,
        )),
    }
}

pub(super) fn build(
    device: &Device,
    request: &ActionRequest,
    trace_id: &str,
) -> Result<AndroidAction, AppError> {
    let device = device.clone();
    let action = match request.tag {
        ActionTag::CopyName => AndroidAction::CopyName { device },
        ActionTag::CopyIdentifier => {
            let identifier = require_identifier(&device, trace_id)?;
            AndroidAction::CopyIdentifier { device, identifier }
        }
        ActionTag::Delete => {
            ensure_virtual(&device, request.tag, trace_id)?;
            AndroidAction::Delete {
                device,
                confirm: !request.skip_confirmation,
            }
        }
        ActionTag::ColdBoot => {
            ensure_virtual(&device, request.tag, trace_id)?;
            AndroidAction::ColdBoot { device }
        }
        ActionTag::NoAudio => {
            ensure_virtual(&device, request.tag, trace_id)?;
            AndroidAction::NoAudio { device }
        }
        ActionTag::ToggleAccessibility => {
            let serial = require_booted(&device, request.tag, trace_id)?;
            AndroidAction::ToggleAccessibility { device, serial }
        }
        ActionTag::PasteClipboardText => {
            let serial = require_booted(&device, request.tag, trace_id)?;
            AndroidAction::PasteClipboardText { device, serial }
        }
        ActionTag::LaunchLogStream => {
            let serial = require_booted(&device, request.tag, trace_id)?;
            AndroidAction::LaunchLogStream { device, serial }
        }
        ActionTag::CustomCommand => {
            let command = require_command(&device, request, trace_id)?;
            AndroidAction::CustomCommand { device, command }
        }
    };
    Ok(action)
}

impl AndroidAction {
    pub fn tag(&self) -> ActionTag {
        match self {
            AndroidAction::CopyName { .. } => ActionTag::CopyName,
            AndroidAction::CopyIdentifier { .. } => ActionTag::CopyIdentifier,
            AndroidAction::Delete { .. } => ActionTag::Delete,
            AndroidAction::ColdBoot { .. } => ActionTag::ColdBoot,
            AndroidAction::NoAudio { .. } => ActionTag::NoAudio,
            AndroidAction::ToggleAccessibility { .. } => ActionTag::ToggleAccessibility,
            AndroidAction::PasteClipboardText { .. } => ActionTag::PasteClipboardText,
            AndroidAction::LaunchLogStream { .. } => ActionTag::LaunchLogStream,
            AndroidAction::CustomCommand { .. } => ActionTag::CustomCommand,
        }
    }

    pub fn device(&self) -> &Device {
        match self {
            AndroidAction::CopyName { device }
            | AndroidAction::CopyIdentifier { device, .. }
            | AndroidAction::Delete { device, .. }
            | AndroidAction::ColdBoot { device }
            | AndroidAction::NoAudio { device }
            | AndroidAction::ToggleAccessibility { device, .. }
            | AndroidAction::PasteClipboardText { device, .. }
            | AndroidAction::LaunchLogStream { device, .. }
            | AndroidAction::CustomCommand { device, .. } => device,
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        matches!(self, AndroidAction::Delete { confirm: true, .. })
    }

    pub(super) fn execute(
        &self,
        env: &ActionEnv,
        ctx: ExecutionContext,
        trace_id: &str,
    ) -> Result<ActionOutcome, AppError> {
        match self {
            AndroidAction::CopyName { device } => {
                env.clipboard.set_text(&device.name)?;
                Ok(ActionOutcome::Copied {
                    value: device.name.clone(),
                })
            }
            AndroidAction::CopyIdentifier { identifier, .. } => {
                env.clipboard.set_text(identifier)?;
                Ok(ActionOutcome::Copied {
                    value: identifier.clone(),
                })
            }
            AndroidAction::Delete { device, .. } => {
                env.android.delete(ctx, device, trace_id)?;
                Ok(ActionOutcome::Done)
            }
            AndroidAction::ColdBoot { device } => {
                env.android
                    .launch(ctx, device, &[COLD_BOOT_FLAG.to_string()], trace_id)?;
                Ok(ActionOutcome::Done)
            }
            AndroidAction::NoAudio { device } => {
                env.android
                    .launch(ctx, device, &[NO_AUDIO_FLAG.to_string()], trace_id)?;
                Ok(ActionOutcome::Done)
            }
            AndroidAction::ToggleAccessibility { serial, .. } => {
                toggle_accessibility(env, serial, trace_id)
            }
            AndroidAction::PasteClipboardText { serial, .. } => {
                paste_clipboard(env, serial, trace_id)
            }
            AndroidAction::LaunchLogStream { serial, .. } => {
                let adb = env.locator.get_adb_path(trace_id)?;
                let command = format!("{} -s {} logcat -v color", shell_quote(&adb), serial);
                let terminal = preferred_terminal(env.locator.store().as_ref());
                env.terminal.open(&terminal, &command, trace_id)?;
                Ok(ActionOutcome::LogStreamOpened { terminal })
            }
            AndroidAction::CustomCommand { device, command } => {
                let expanded = expand_template(&command.command, device, &env.locator, trace_id)?;
                let (program, args) = shell(&expanded);
                env.locator
                    .executor()
                    .execute(&program, &args, None, trace_id)?;
                info!(trace_id = %trace_id, command = %command.name, device = %device.name, "custom command finished");
                if command.boots_device == Some(true) {
                    env.android.attach(ctx, device, trace_id)?;
                }
                Ok(ActionOutcome::Done)
            }
        }
    }
}

fn adb_shell_args(serial: &str, rest: &[&str]) -> Vec<String> {
    let mut args = vec!["-s".to_string(), serial.to_string(), "shell".to_string()];
    args.extend(rest.iter().map(|value| value.to_string()));
    args
}

fn toggle_accessibility(
    env: &ActionEnv,
    serial: &str,
    trace_id: &str,
) -> Result<ActionOutcome, AppError> {
    let adb = env.locator.get_adb_path(trace_id)?;
    let executor = env.locator.executor();
    let current = executor.execute(
        &adb,
        &adb_shell_args(serial, &["settings", "get", "secure", ACCESSIBILITY_SETTING]),
        None,
        trace_id,
    )?;
    let next = next_accessibility_value(&current);
    executor.execute(
        &adb,
        &adb_shell_args(serial, &["settings", "put", "secure", ACCESSIBILITY_SETTING, next]),
        None,
        trace_id,
    )?;
    info!(trace_id = %trace_id, serial = %serial, value = %next, "accessibility toggled");
    Ok(ActionOutcome::AccessibilityToggled {
        value: next.to_string(),
    })
}

fn paste_clipboard(env: &ActionEnv, serial: &str, trace_id: &str) -> Result<ActionOutcome, AppError> {
    let text = env
        .clipboard
        .get_text()
        .filter(|text| !text.is_empty())
        .ok_or_else(|| AppError::validation("Clipboard has no text to paste", trace_id))?;
    let adb = env.locator.get_adb_path(trace_id)?;
    let escaped = escape_input_text(&text);
    env.locator.executor().execute(
        &adb,
        &adb_shell_args(serial, &["input", "text", &escaped]),
        None,
        trace_id,
    )?;
    Ok(ActionOutcome::Done)
}
