use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::config::load_parameters;
use crate::app::context::ExecutionContext;
use crate::app::error::{AppError, ERR_NOT_FOUND};
use crate::app::exec::LaunchStatus;
use crate::app::focus::{focus_device_window, WindowFinder};
use crate::app::models::{Device, DeviceType, Parameter, Platform};
use crate::app::toolchain::ToolchainLocator;

const LAUNCH_GRACE: Duration = Duration::from_secs(3);
const ALREADY_RUNNING_MARKERS: [&str; 3] = [
    "is already running",
    "Running multiple emulators with the same AVD",
    "another emulator instance running with the current AVD",
];

/// Emulator launch arguments: profile, enabled parameters, then action flags.
pub fn build_launch_args(name: &str, parameters: &[Parameter], extra: &[String]) -> Vec<String> {
    let mut args = vec![format!("@{name}")];
    for parameter in parameters.iter().filter(|parameter| parameter.enabled) {
        args.extend(parameter.command.split_whitespace().map(str::to_string));
    }
    args.extend(extra.iter().cloned());
    args
}

pub fn is_already_running(message: &str) -> bool {
    ALREADY_RUNNING_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

pub struct AndroidDeviceService {
    locator: Arc<ToolchainLocator>,
    windows: Arc<dyn WindowFinder>,
}

impl AndroidDeviceService {
    pub fn new(locator: Arc<ToolchainLocator>, windows: Arc<dyn WindowFinder>) -> Self {
        Self { locator, windows }
    }

    fn ensure_emulator(device: &Device, operation: &str, trace_id: &str) -> Result<(), AppError> {
        match (device.platform, device.device_type) {
            (Platform::Android, DeviceType::Virtual) => Ok(()),
            (Platform::Android, DeviceType::Physical) => Err(AppError::unsupported(
                format!("{operation} is not available for physical device {}", device.name),
                trace_id,
            )),
            (Platform::Ios, _) => Err(AppError::unsupported(
                format!("{operation} on {} needs the iOS service", device.name),
                trace_id,
            )),
        }
    }

    /// Kills a running instance first, then removes the AVD.
    pub fn delete(
        &self,
        ctx: ExecutionContext,
        device: &Device,
        trace_id: &str,
    ) -> Result<(), AppError> {
        ctx.ensure_background("Delete emulator", trace_id)?;
        Self::ensure_emulator(device, "Delete", trace_id)?;
        let executor = self.locator.executor();

        if device.booted {
            if let Some(serial) = device.identifier.as_deref() {
                let adb = self.locator.get_adb_path(trace_id)?;
                let args = vec![
                    "-s".to_string(),
                    serial.to_string(),
                    "emu".to_string(),
                    "kill".to_string(),
                ];
                executor.execute(&adb, &args, None, trace_id)?;
                info!(trace_id = %trace_id, serial = %serial, "killed emulator before delete");
            }
        }

        let avd_manager = self.locator.get_avd_manager_path(trace_id)?;
        let args = vec![
            "delete".to_string(),
            "avd".to_string(),
            "-n".to_string(),
            device.name.clone(),
        ];
        executor.execute(&avd_manager, &args, None, trace_id)?;
        info!(trace_id = %trace_id, device = %device.name, "deleted avd");
        Ok(())
    }

    pub fn launch(
        &self,
        ctx: ExecutionContext,
        device: &Device,
        extra_args: &[String],
        trace_id: &str,
    ) -> Result<(), AppError> {
        ctx.ensure_background("Launch emulator", trace_id)?;
        Self::ensure_emulator(device, "Launch", trace_id)?;
        let emulator = self.locator.get_emulator_path(trace_id)?;
        let parameters = load_parameters(self.locator.store().as_ref(), trace_id)?;
        let args = build_launch_args(&device.name, &parameters, extra_args);
        info!(trace_id = %trace_id, device = %device.name, args = ?args, "launching emulator");

        match self
            .locator
            .executor()
            .spawn_detached(&emulator, &args, LAUNCH_GRACE, trace_id)?
        {
            LaunchStatus::Running => Ok(()),
            LaunchStatus::Exited(output) => {
                let combined = format!("{}\n{}", output.stdout, output.stderr);
                if is_already_running(&combined) {
                    info!(trace_id = %trace_id, device = %device.name, "emulator already running");
                    return Ok(());
                }
                if output.success() {
                    return Ok(());
                }
                warn!(
                    trace_id = %trace_id,
                    device = %device.name,
                    exit_code = ?output.exit_code,
                    "emulator exited during launch"
                );
                Err(AppError::execution(
                    format!("Emulator {} exited during launch", device.name),
                    output.stderr.trim(),
                    output.exit_code,
                    trace_id,
                ))
            }
        }
    }

    pub fn focus(
        &self,
        ctx: ExecutionContext,
        device: &Device,
        trace_id: &str,
    ) -> Result<(), AppError> {
        ctx.ensure_background("Focus emulator", trace_id)?;
        focus_device_window(self.windows.as_ref(), device, trace_id)
    }

    /// Brings a freshly booted emulator forward when its window is already up.
    pub fn attach(
        &self,
        ctx: ExecutionContext,
        device: &Device,
        trace_id: &str,
    ) -> Result<(), AppError> {
        match self.focus(ctx, device, trace_id) {
            Err(err) if err.is(ERR_NOT_FOUND) => Ok(()),
            other => other,
        }
    }
}
