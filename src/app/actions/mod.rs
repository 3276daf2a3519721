//! Device actions.
//!
//! An action is built from a device plus an [`ActionRequest`] by a
//! per-platform factory, producing a closed [`Action`] value. Building is
//! pure; subprocesses only run in [`Action::execute`], which the
//! [`dispatcher::ActionDispatcher`] serialises on one queue.

pub mod android;
pub mod dispatcher;
pub mod env;
pub mod ios;
pub mod template;

use serde::Serialize;

use crate::app::context::ExecutionContext;
use crate::app::error::AppError;
use crate::app::models::{Command, Device, Platform};

pub use android::AndroidAction;
pub use dispatcher::{ActionDispatcher, ActionEvent, ActionStatus};
pub use env::{ActionEnv, AppleScriptTerminal, Clipboard, MemoryClipboard, TerminalLauncher};
pub use ios::IosAction;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionTag {
    CopyName,
    CopyIdentifier,
    Delete,
    ColdBoot,
    NoAudio,
    ToggleAccessibility,
    PasteClipboardText,
    LaunchLogStream,
    CustomCommand,
}

impl ActionTag {
    pub const ALL: [ActionTag; 9] = [
        ActionTag::CopyName,
        ActionTag::CopyIdentifier,
        ActionTag::Delete,
        ActionTag::ColdBoot,
        ActionTag::NoAudio,
        ActionTag::ToggleAccessibility,
        ActionTag::PasteClipboardText,
        ActionTag::LaunchLogStream,
        ActionTag::CustomCommand,
    ];

    /// Menu tag values persisted alongside commands.
    pub fn tag(self) -> i32 {
        match self {
            ActionTag::CopyName => 1,
            ActionTag::CopyIdentifier => 2,
            ActionTag::Delete => 3,
            ActionTag::ColdBoot => 4,
            ActionTag::NoAudio => 5,
            ActionTag::ToggleAccessibility => 6,
            ActionTag::PasteClipboardText => 7,
            ActionTag::LaunchLogStream => 8,
            ActionTag::CustomCommand => 100,
        }
    }

    pub fn from_tag(value: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.tag() == value)
    }

    pub fn from_name(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|tag| tag.name() == normalized)
    }

    /// Tags that only exist for Android devices.
    pub fn android_only(self) -> bool {
        matches!(
            self,
            ActionTag::NoAudio
                | ActionTag::ToggleAccessibility
                | ActionTag::PasteClipboardText
                | ActionTag::LaunchLogStream
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ActionTag::CopyName => "copy_name",
            ActionTag::CopyIdentifier => "copy_identifier",
            ActionTag::Delete => "delete",
            ActionTag::ColdBoot => "cold_boot",
            ActionTag::NoAudio => "no_audio",
            ActionTag::ToggleAccessibility => "toggle_accessibility",
            ActionTag::PasteClipboardText => "paste_clipboard_text",
            ActionTag::LaunchLogStream => "launch_log_stream",
            ActionTag::CustomCommand => "custom_command",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub tag: ActionTag,
    /// Required for [`ActionTag::CustomCommand`], ignored otherwise.
    pub command: Option<Command>,
    pub skip_confirmation: bool,
}

impl ActionRequest {
    pub fn new(tag: ActionTag) -> Self {
        Self {
            tag,
            command: None,
            skip_confirmation: false,
        }
    }

    pub fn custom(command: Command) -> Self {
        Self {
            tag: ActionTag::CustomCommand,
            command: Some(command),
            skip_confirmation: false,
        }
    }

    pub fn skipping_confirmation(mut self) -> Self {
        self.skip_confirmation = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutcome {
    Done,
    /// Value handed to the clipboard.
    Copied { value: String },
    AccessibilityToggled { value: String },
    LogStreamOpened { terminal: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Android(AndroidAction),
    Ios(IosAction),
}

impl Action {
    pub fn tag(&self) -> ActionTag {
        match self {
            Action::Android(action) => action.tag(),
            Action::Ios(action) => action.tag(),
        }
    }

    pub fn device(&self) -> &Device {
        match self {
            Action::Android(action) => action.device(),
            Action::Ios(action) => action.device(),
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        match self {
            Action::Android(action) => action.requires_confirmation(),
            Action::Ios(action) => action.requires_confirmation(),
        }
    }

    pub fn execute(
        &self,
        env: &ActionEnv,
        ctx: ExecutionContext,
        trace_id: &str,
    ) -> Result<ActionOutcome, AppError> {
        ctx.ensure_background("Device action", trace_id)?;
        match self {
            Action::Android(action) => action.execute(env, ctx, trace_id),
            Action::Ios(action) => action.execute(env, ctx, trace_id),
        }
    }
}

/// Factory keyed on the device platform and the requested tag.
pub fn build_action(
    device: &Device,
    request: &ActionRequest,
    trace_id: &str,
) -> Result<Action, AppError> {
    match device.platform {
        Platform::Android => android::build(device, request, trace_id).map(Action::Android),
        Platform::Ios => ios::build(device, request, trace_id).map(Action::Ios),
    }
}

fn require_identifier(device: &Device, trace_id: &str) -> Result<String, AppError> {
    device
        .identifier
        .clone()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::not_found(format!("{} has no identifier", device.name), trace_id))
}

fn require_booted(device: &Device, tag: ActionTag, trace_id: &str) -> Result<String, AppError> {
    if !device.booted {
        return Err(AppError::validation(
            format!("{} needs {} to be running", tag.name(), device.name),
            trace_id,
        ));
    }
    require_identifier(device, trace_id)
}

fn require_command(
    device: &Device,
    request: &ActionRequest,
    trace_id: &str,
) -> Result<Command, AppError> {
    let Some(command) = request.command.clone() else {
        return Err(AppError::validation("Custom command action needs a command", trace_id));
    };
    if command.platform != device.platform {
        return Err(AppError::unsupported(
            format!(
                "Command {} targets {} but {} is a {} device",
                command.name, command.platform, device.name, device.platform
            ),
            trace_id,
        ));
    }
    if command.need_booted_device && !device.booted {
        return Err(AppError::validation(
            format!("Command {} needs {} to be running", command.name, device.name),
            trace_id,
        ));
    }
    Ok(command)
}
