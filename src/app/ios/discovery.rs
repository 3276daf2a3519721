use std::fs;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::context::ExecutionContext;
use crate::app::error::AppError;
use crate::app::models::{Device, DeviceKind};
use crate::app::parse::{parse_devicectl_json, parse_simctl_devices};
use crate::app::toolchain::ToolchainLocator;

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub struct IosDiscovery {
    locator: Arc<ToolchainLocator>,
}

impl IosDiscovery {
    pub fn new(locator: Arc<ToolchainLocator>) -> Self {
        Self { locator }
    }

    pub fn get_devices(
        &self,
        ctx: ExecutionContext,
        kind: DeviceKind,
        trace_id: &str,
    ) -> Result<Vec<Device>, AppError> {
        ctx.ensure_background("iOS discovery", trace_id)?;
        let devices = match kind {
            DeviceKind::Virtual => self.simulators(trace_id)?,
            DeviceKind::Physical => self.physical_devices(trace_id)?,
            DeviceKind::Both => {
                let mut devices = self.simulators(trace_id)?;
                devices.extend(self.physical_devices(trace_id)?);
                devices
            }
        };
        info!(trace_id = %trace_id, count = devices.len(), kind = ?kind, "ios devices listed");
        Ok(devices)
    }

    fn simulators(&self, trace_id: &str) -> Result<Vec<Device>, AppError> {
        let xcrun = self.locator.get_xcrun_path();
        let output = self.locator.executor().execute(
            &xcrun,
            &args(&["simctl", "list", "devices", "available"]),
            None,
            trace_id,
        )?;
        Ok(parse_simctl_devices(&output))
    }

    /// `devicectl` only writes JSON to a file, so the listing goes through a
    /// temp file that is removed when this returns.
    fn physical_devices(&self, trace_id: &str) -> Result<Vec<Device>, AppError> {
        let xcrun = self.locator.get_xcrun_path();
        let output_file = tempfile::Builder::new()
            .prefix("devicectl-")
            .suffix(".json")
            .tempfile()
            .map_err(|err| AppError::system(format!("Failed to create temp file: {err}"), trace_id))?;
        let output_path = output_file.path().to_string_lossy().to_string();

        let mut command = args(&["devicectl", "list", "devices", "-j"]);
        command.push(output_path);
        self.locator
            .executor()
            .execute(&xcrun, &command, None, trace_id)?;

        let raw = fs::read_to_string(output_file.path()).map_err(|err| {
            AppError::system(format!("Failed to read devicectl output: {err}"), trace_id)
        })?;
        Ok(parse_devicectl_json(&raw))
    }

    pub fn check_setup(&self, ctx: ExecutionContext, trace_id: &str) -> Result<bool, AppError> {
        ctx.ensure_background("iOS setup check", trace_id)?;
        let xcrun = self.locator.get_xcrun_path();
        match self
            .locator
            .executor()
            .execute(&xcrun, &args(&["--find", "simctl"]), None, trace_id)
        {
            Ok(_) => Ok(true),
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err, "ios setup check failed");
                Ok(false)
            }
        }
    }
}
