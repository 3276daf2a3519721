use std::sync::Arc;

use tracing::info;

use crate::app::context::ExecutionContext;
use crate::app::error::AppError;
use crate::app::focus::{focus_device_window, WindowFinder};
use crate::app::models::{Device, DeviceType, Platform};
use crate::app::toolchain::ToolchainLocator;

const ALREADY_BOOTED_MARKER: &str = "current state: Booted";
const SIMULATOR_APP: &str = "Simulator";

pub struct IosDeviceService {
    locator: Arc<ToolchainLocator>,
    windows: Arc<dyn WindowFinder>,
}

impl IosDeviceService {
    pub fn new(locator: Arc<ToolchainLocator>, windows: Arc<dyn WindowFinder>) -> Self {
        Self { locator, windows }
    }

    fn simulator_udid<'a>(
        device: &'a Device,
        operation: &str,
        trace_id: &str,
    ) -> Result<&'a str, AppError> {
        match (device.platform, device.device_type) {
            (Platform::Ios, DeviceType::Virtual) => {}
            (Platform::Ios, DeviceType::Physical) => {
                return Err(AppError::unsupported(
                    format!("{operation} is not available for physical device {}", device.name),
                    trace_id,
                ))
            }
            (Platform::Android, _) => {
                return Err(AppError::unsupported(
                    format!("{operation} on {} needs the Android service", device.name),
                    trace_id,
                ))
            }
        }
        device
            .identifier
            .as_deref()
            .filter(|udid| !udid.is_empty())
            .ok_or_else(|| {
                AppError::not_found(format!("{} has no simulator UDID", device.name), trace_id)
            })
    }

    pub fn delete(
        &self,
        ctx: ExecutionContext,
        device: &Device,
        trace_id: &str,
    ) -> Result<(), AppError> {
        ctx.ensure_background("Delete simulator", trace_id)?;
        let udid = Self::simulator_udid(device, "Delete", trace_id)?;
        let xcrun = self.locator.get_xcrun_path();
        let args = vec!["simctl".to_string(), "delete".to_string(), udid.to_string()];
        self.locator.executor().execute(&xcrun, &args, None, trace_id)?;
        info!(trace_id = %trace_id, udid = %udid, "deleted simulator");
        Ok(())
    }

    /// Boots the simulator, then opens the Simulator app on it.
    pub fn launch(
        &self,
        ctx: ExecutionContext,
        device: &Device,
        extra_args: &[String],
        trace_id: &str,
    ) -> Result<(), AppError> {
        ctx.ensure_background("Launch simulator", trace_id)?;
        let udid = Self::simulator_udid(device, "Launch", trace_id)?;
        let xcrun = self.locator.get_xcrun_path();
        let mut args = vec!["simctl".to_string(), "boot".to_string(), udid.to_string()];
        args.extend(extra_args.iter().cloned());

        match self.locator.executor().execute(&xcrun, &args, None, trace_id) {
            Ok(_) => info!(trace_id = %trace_id, udid = %udid, "booted simulator"),
            Err(err) if err.diagnostic().contains(ALREADY_BOOTED_MARKER) => {
                info!(trace_id = %trace_id, udid = %udid, "simulator already booted");
            }
            Err(err) => return Err(err),
        }
        self.attach(ctx, device, trace_id)
    }

    /// `open -a Simulator --args -CurrentDeviceUDID <udid>`.
    pub fn attach(
        &self,
        ctx: ExecutionContext,
        device: &Device,
        trace_id: &str,
    ) -> Result<(), AppError> {
        ctx.ensure_background("Open Simulator", trace_id)?;
        let udid = Self::simulator_udid(device, "Open", trace_id)?;
        let args = vec![
            "-a".to_string(),
            SIMULATOR_APP.to_string(),
            "--args".to_string(),
            "-CurrentDeviceUDID".to_string(),
            udid.to_string(),
        ];
        self.locator.executor().execute("open", &args, None, trace_id)?;
        Ok(())
    }

    pub fn focus(
        &self,
        ctx: ExecutionContext,
        device: &Device,
        trace_id: &str,
    ) -> Result<(), AppError> {
        ctx.ensure_background("Focus simulator", trace_id)?;
        focus_device_window(self.windows.as_ref(), device, trace_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::{ConfigStore, MemoryStore, KEY_XCRUN_PATH};
    use crate::app::exec::fake::FakeExecutor;
    use crate::app::focus::NoWindowFinder;

    const UDID: &str = "5A1B2C3D-1111-2222-3333-444455556666";

    fn service(executor: Arc<FakeExecutor>) -> IosDeviceService {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_XCRUN_PATH, Some("xcrun".to_string()));
        IosDeviceService::new(
            Arc::new(ToolchainLocator::new(store, executor)),
            Arc::new(NoWindowFinder),
        )
    }

    fn simulator(device_type: DeviceType) -> Device {
        Device {
            name: "iPhone 15".to_string(),
            version: Some("iOS 17.2".to_string()),
            identifier: Some(UDID.to_string()),
            booted: false,
            platform: Platform::Ios,
            device_type,
            device_family: None,
        }
    }

    #[test]
    fn launch_boots_then_opens_simulator_app() {
        let executor = Arc::new(FakeExecutor::new());
        executor.ok(&format!("xcrun simctl boot {UDID}"), "");
        executor.ok(&format!("open -a Simulator --args -CurrentDeviceUDID {UDID}"), "");
        service(executor.clone())
            .launch(ExecutionContext::Background, &simulator(DeviceType::Virtual), &[], "t")
            .expect("launch");
        assert_eq!(executor.calls().len(), 2);
    }

    #[test]
    fn already_booted_is_not_an_error() {
        let executor = Arc::new(FakeExecutor::new());
        executor.fail(
            &format!("xcrun simctl boot {UDID}"),
            "An error was encountered processing the command (domain=com.apple.CoreSimulator.SimError, code=405):\nUnable to boot device in current state: Booted",
        );
        executor.ok(&format!("open -a Simulator --args -CurrentDeviceUDID {UDID}"), "");
        service(executor)
            .launch(ExecutionContext::Background, &simulator(DeviceType::Virtual), &[], "t")
            .expect("already booted");
    }

    #[test]
    fn other_boot_failures_propagate() {
        let executor = Arc::new(FakeExecutor::new());
        executor.fail(&format!("xcrun simctl boot {UDID}"), "Invalid device");
        let err = service(executor.clone())
            .launch(ExecutionContext::Background, &simulator(DeviceType::Virtual), &[], "t")
            .expect_err("expected failure");
        assert_eq!(err.code, "ERR_EXECUTION");
        assert_eq!(executor.call_count("open"), 0);
    }

    #[test]
    fn delete_uses_udid() {
        let executor = Arc::new(FakeExecutor::new());
        executor.ok(&format!("xcrun simctl delete {UDID}"), "");
        service(executor.clone())
            .delete(ExecutionContext::Background, &simulator(DeviceType::Virtual), "t")
            .expect("delete");
        assert_eq!(executor.calls(), vec![format!("xcrun simctl delete {UDID}")]);
    }

    #[test]
    fn physical_devices_are_not_deletable() {
        let err = service(Arc::new(FakeExecutor::new()))
            .delete(ExecutionContext::Background, &simulator(DeviceType::Physical), "t")
            .expect_err("expected unsupported");
        assert_eq!(err.code, "ERR_UNSUPPORTED");
    }
}
