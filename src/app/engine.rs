use std::sync::Arc;

use tracing::warn;

use crate::app::actions::{
    ActionDispatcher, ActionEnv, AppleScriptTerminal, Clipboard, MemoryClipboard, TerminalLauncher,
};
use crate::app::actions::dispatcher::{Confirmer, Reporter};
use crate::app::aggregate::{DeviceCoordinator, DeviceQuery};
use crate::app::android::{AndroidDeviceService, AndroidDiscovery};
use crate::app::config::{load_commands, ConfigStore, JsonFileStore};
use crate::app::context::ExecutionContext;
use crate::app::error::AppError;
use crate::app::exec::{ProcessExecutor, SystemExecutor};
use crate::app::focus::{NoWindowFinder, WindowFinder};
use crate::app::ios::{IosDeviceService, IosDiscovery};
use crate::app::models::{Command, Device, Platform};
use crate::app::toolchain::ToolchainLocator;

/// Wires every component from its host collaborators.
pub struct Engine {
    pub locator: Arc<ToolchainLocator>,
    pub android: Arc<AndroidDiscovery>,
    pub ios: Arc<IosDiscovery>,
    pub coordinator: DeviceCoordinator,
    pub actions: Arc<ActionEnv>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        executor: Arc<dyn ProcessExecutor>,
        windows: Arc<dyn WindowFinder>,
        clipboard: Arc<dyn Clipboard>,
        terminal: Arc<dyn TerminalLauncher>,
    ) -> Self {
        let locator = Arc::new(ToolchainLocator::new(store, executor));
        let android = Arc::new(AndroidDiscovery::new(locator.clone()));
        let ios = Arc::new(IosDiscovery::new(locator.clone()));
        let actions = Arc::new(ActionEnv {
            locator: locator.clone(),
            android: Arc::new(AndroidDeviceService::new(locator.clone(), windows.clone())),
            ios: Arc::new(IosDeviceService::new(locator.clone(), windows)),
            clipboard,
            terminal,
        });
        Self {
            coordinator: DeviceCoordinator::new(android.clone(), ios.clone()),
            locator,
            android,
            ios,
            actions,
        }
    }

    /// Settings file from the user's home, real subprocesses, AppleScript
    /// terminals and an in-process clipboard.
    pub fn system() -> Result<Self, AppError> {
        let store: Arc<dyn ConfigStore> = Arc::new(JsonFileStore::open_default()?);
        let executor: Arc<dyn ProcessExecutor> = Arc::new(SystemExecutor);
        Ok(Self::new(
            store,
            executor.clone(),
            Arc::new(NoWindowFinder),
            Arc::new(MemoryClipboard::default()),
            Arc::new(AppleScriptTerminal::new(executor)),
        ))
    }

    pub fn dispatcher(&self, reporter: Reporter, confirmer: Confirmer) -> ActionDispatcher {
        ActionDispatcher::new(self.actions.clone(), reporter, confirmer)
    }

    /// First device named `name` on the platforms `query` selects. Each
    /// platform is listed on its own, so a host without one toolchain can
    /// still reach devices of the other. A listing error is only returned
    /// when no platform produced the device.
    pub fn find_device(
        &self,
        ctx: ExecutionContext,
        name: &str,
        query: DeviceQuery,
        trace_id: &str,
    ) -> Result<Device, AppError> {
        ctx.ensure_background("Device lookup", trace_id)?;
        let mut scopes = Vec::new();
        if query.include_android {
            scopes.push(DeviceQuery::new(true, false));
        }
        if query.include_ios {
            scopes.push(DeviceQuery::new(false, true));
        }
        let mut first_error: Option<AppError> = None;
        for scope in scopes {
            match self
                .coordinator
                .get_all_devices_blocking(ctx, scope.with_kind(query.kind), trace_id)
            {
                Ok(devices) => {
                    if let Some(device) = devices.into_iter().find(|device| device.name == name) {
                        return Ok(device);
                    }
                }
                Err(err) => {
                    warn!(trace_id = %trace_id, error = %err, "device listing failed during lookup");
                    first_error.get_or_insert(err);
                }
            }
        }
        Err(first_error
            .unwrap_or_else(|| AppError::not_found(format!("No device named {name}"), trace_id)))
    }

    pub fn find_command(
        &self,
        platform: Platform,
        id: &str,
        trace_id: &str,
    ) -> Result<Command, AppError> {
        load_commands(self.locator.store().as_ref(), trace_id)?
            .into_iter()
            .find(|command| command.id == id && command.platform == platform)
            .ok_or_else(|| {
                AppError::not_found(format!("No {platform} command with id {id}"), trace_id)
            })
    }
}
