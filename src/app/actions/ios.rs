use tracing::info;

use crate::app::actions::template::expand_template;
use crate::app::actions::{
    require_command, require_identifier, ActionEnv, ActionOutcome, ActionRequest, ActionTag,
};
use crate::app::context::ExecutionContext;
use crate::app::error::AppError;
use crate::app::exec::shell;
use crate::app::models::{Command, Device, DeviceType};

/// iOS has no counterpart for emulator flags, TalkBack, input injection or
/// logcat, so those tags have no variant here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IosAction {
    CopyName { device: Device },
    CopyIdentifier { device: Device, identifier: String },
    ColdBoot { device: Device },
    Delete { device: Device, confirm: bool },
    CustomCommand { device: Device, command: Command },
}

pub(super) fn build(
    device: &Device,
    request: &ActionRequest,
    trace_id: &str,
) -> Result<IosAction, AppError> {
    let device = device.clone();
    match request.tag {
        ActionTag::CopyName => Ok(IosAction::CopyName { device }),
        ActionTag::CopyIdentifier => {
            let identifier = require_identifier(&device, trace_id)?;
            Ok(IosAction::CopyIdentifier { device, identifier })
        }
        ActionTag::ColdBoot | ActionTag::Delete if device.device_type == DeviceType::Physical => {
            Err(AppError::unsupported(
                format!(
                    "{} is not available for physical device {}",
                    request.tag.name(),
                    device.name
                ),
                trace_id,
            ))
        }
        ActionTag::ColdBoot => Ok(IosAction::ColdBoot { device }),
        ActionTag::Delete => Ok(IosAction::Delete {
            device,
            confirm: !request.skip_confirmation,
        }),
        ActionTag::CustomCommand => {
            let command = require_command(&device, request, trace_id)?;
            Ok(IosAction::CustomCommand { device, command })
        }
        ActionTag::NoAudio
        | ActionTag::ToggleAccessibility
        | ActionTag::PasteClipboardText
        | ActionTag::LaunchLogStream => Err(AppError::unsupported(
            format!("{} is not supported on iOS devices", request.tag.name()),
            trace_id,
        )),
    }
}

impl IosAction {
    pub fn tag(&self) -> ActionTag {
        match self {
            IosAction::CopyName { .. } => ActionTag::CopyName,
            IosAction::CopyIdentifier { .. } => ActionTag::CopyIdentifier,
            IosAction::ColdBoot { .. } => ActionTag::ColdBoot,
            IosAction::Delete { .. } => ActionTag::Delete,
            IosAction::CustomCommand { .. } => ActionTag::CustomCommand,
        }
    }

    pub fn device(&self) -> &Device {
        match self {
            IosAction::CopyName { device }
            | IosAction::CopyIdentifier { device, .. }
            | IosAction::ColdBoot { device }
            | IosAction::Delete { device, .. }
            | IosAction::CustomCommand { device, .. } => device,
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        matches!(self, IosAction::Delete { confirm: true, .. })
    }

    pub(super) fn execute(
        &self,
        env: &ActionEnv,
        ctx: ExecutionContext,
        trace_id: &str,
    ) -> Result<ActionOutcome, AppError> {
        match self {
            IosAction::CopyName { device } => {
                env.clipboard.set_text(&device.name)?;
                Ok(ActionOutcome::Copied {
                    value: device.name.clone(),
                })
            }
            IosAction::CopyIdentifier { identifier, .. } => {
                env.clipboard.set_text(identifier)?;
                Ok(ActionOutcome::Copied {
                    value: identifier.clone(),
                })
            }
            IosAction::ColdBoot { device } => {
                env.ios.launch(ctx, device, &[], trace_id)?;
                Ok(ActionOutcome::Done)
            }
            IosAction::Delete { device, .. } => {
                env.ios.delete(ctx, device, trace_id)?;
                Ok(ActionOutcome::Done)
            }
            IosAction::CustomCommand { device, command } => {
                let expanded = expand_template(&command.command, device, &env.locator, trace_id)?;
                let (program, args) = shell(&expanded);
                env.locator
                    .executor()
                    .execute(&program, &args, None, trace_id)?;
                info!(trace_id = %trace_id, command = %command.name, device = %device.name, "custom command finished");
                if command.boots_device == Some(true) {
                    env.ios.attach(ctx, device, trace_id)?;
                }
                Ok(ActionOutcome::Done)
            }
        }
    }
}
