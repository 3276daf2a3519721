use std::sync::Arc;

use tracing::{info, warn};

use crate::app::android::matcher::IdentityMatcher;
use crate::app::context::ExecutionContext;
use crate::app::error::AppError;
use crate::app::models::{Device, DeviceKind};
use crate::app::parse::{parse_adb_physical, parse_avd_list};
use crate::app::toolchain::ToolchainLocator;

pub struct AndroidDiscovery {
    locator: Arc<ToolchainLocator>,
    matcher: IdentityMatcher,
}

impl AndroidDiscovery {
    pub fn new(locator: Arc<ToolchainLocator>) -> Self {
        Self {
            matcher: IdentityMatcher::new(Arc::clone(&locator)),
            locator,
        }
    }

    pub fn get_devices(
        &self,
        ctx: ExecutionContext,
        kind: DeviceKind,
        trace_id: &str,
    ) -> Result<Vec<Device>, AppError> {
        ctx.ensure_background("Android discovery", trace_id)?;
        let devices = match kind {
            DeviceKind::Virtual => self.virtual_devices(trace_id)?,
            DeviceKind::Physical => self.physical_devices(trace_id)?,
            DeviceKind::Both => {
                let mut devices = self.virtual_devices(trace_id)?;
                devices.extend(self.physical_devices(trace_id)?);
                devices
            }
        };
        info!(trace_id = %trace_id, count = devices.len(), kind = ?kind, "android devices listed");
        Ok(devices)
    }

    fn virtual_devices(&self, trace_id: &str) -> Result<Vec<Device>, AppError> {
        let emulator = self.locator.get_emulator_path(trace_id)?;
        let output = self.locator.executor().execute(
            &emulator,
            &["-list-avds".to_string()],
            None,
            trace_id,
        )?;
        Ok(parse_avd_list(&output, |name| {
            self.matcher.match_serial(name, trace_id)
        }))
    }

    fn physical_devices(&self, trace_id: &str) -> Result<Vec<Device>, AppError> {
        let adb = self.locator.get_adb_path(trace_id)?;
        let output = self.locator.executor().execute(
            &adb,
            &["devices".to_string(), "-l".to_string()],
            None,
            trace_id,
        )?;
        Ok(parse_adb_physical(&output))
    }

    /// True when the SDK resolves and its emulator answers `-list-avds`.
    pub fn check_setup(&self, ctx: ExecutionContext, trace_id: &str) -> Result<bool, AppError> {
        ctx.ensure_background("Android setup check", trace_id)?;
        let home = match self.locator.get_android_home(trace_id) {
            Ok(home) => home,
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err, "android setup check failed");
                return Ok(false);
            }
        };
        match self.locator.check_android_home(&home, trace_id) {
            Ok(()) => Ok(true),
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err, "android setup check failed");
                Ok(false)
            }
        }
    }
}
