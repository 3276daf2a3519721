use std::sync::{Arc, Mutex};

use tracing::{error, info};

use crate::app::android::AndroidDiscovery;
use crate::app::context::ExecutionContext;
use crate::app::error::AppError;
use crate::app::ios::IosDiscovery;
use crate::app::logging::resolve_trace_id;
use crate::app::models::{Device, DeviceKind};
use crate::app::scheduler::SerialQueue;

pub type DevicesCallback = Box<dyn FnOnce(Result<Vec<Device>, AppError>) + Send + 'static>;

/// Which platforms and device kinds one aggregation pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceQuery {
    pub include_android: bool,
    pub include_ios: bool,
    pub kind: DeviceKind,
}

impl DeviceQuery {
    pub fn new(include_android: bool, include_ios: bool) -> Self {
        Self {
            include_android,
            include_ios,
            kind: DeviceKind::Both,
        }
    }

    pub fn with_kind(mut self, kind: DeviceKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Sequential Android-then-iOS discovery on one background queue. A failure
/// on either side discards everything gathered so far.
pub struct DeviceCoordinator {
    android: Arc<AndroidDiscovery>,
    ios: Arc<IosDiscovery>,
    queue: SerialQueue,
}

impl DeviceCoordinator {
    pub fn new(android: Arc<AndroidDiscovery>, ios: Arc<IosDiscovery>) -> Self {
        Self {
            android,
            ios,
            queue: SerialQueue::new("devicebar-discovery"),
        }
    }

    /// Queues one aggregation pass; `callback` receives the merged list or
    /// the first error, on the coordinator's worker thread.
    pub fn get_all_devices(
        &self,
        query: DeviceQuery,
        trace_id: Option<String>,
        callback: DevicesCallback,
    ) -> String {
        let trace_id = resolve_trace_id(trace_id);
        let android = self.android.clone();
        let ios = self.ios.clone();
        let slot = Arc::new(Mutex::new(Some(callback)));
        let job_slot = slot.clone();
        let job_trace = trace_id.clone();

        let queued = self.queue.dispatch(move || {
            let result = collect(&android, &ios, ExecutionContext::Background, query, &job_trace);
            if let Some(callback) = take(&job_slot) {
                callback(result);
            }
        });

        if !queued {
            if let Some(callback) = take(&slot) {
                callback(Err(AppError::system("Discovery queue is shut down", &trace_id)));
            }
        }
        trace_id
    }

    /// Same unit of work, run on the caller's own background thread.
    pub fn get_all_devices_blocking(
        &self,
        ctx: ExecutionContext,
        query: DeviceQuery,
        trace_id: &str,
    ) -> Result<Vec<Device>, AppError> {
        ctx.ensure_background("Device aggregation", trace_id)?;
        collect(&self.android, &self.ios, ctx, query, trace_id)
    }

    pub fn shutdown(&self) {
        self.queue.shutdown();
    }
}

fn take(slot: &Mutex<Option<DevicesCallback>>) -> Option<DevicesCallback> {
    slot.lock().ok().and_then(|mut guard| guard.take())
}

fn collect(
    android: &AndroidDiscovery,
    ios: &IosDiscovery,
    ctx: ExecutionContext,
    query: DeviceQuery,
    trace_id: &str,
) -> Result<Vec<Device>, AppError> {
    let mut devices = Vec::new();
    if query.include_android {
        match android.get_devices(ctx, query.kind, trace_id) {
            Ok(found) => devices.extend(found),
            Err(err) => {
                error!(trace_id = %trace_id, error = %err, "android discovery failed");
                return Err(err);
            }
        }
    }
    if query.include_ios {
        match ios.get_devices(ctx, query.kind, trace_id) {
            Ok(found) => devices.extend(found),
            Err(err) => {
                error!(trace_id = %trace_id, error = %err, "ios discovery failed");
                return Err(err);
            }
        }
    }
    info!(trace_id = %trace_id, count = devices.len(), "devices aggregated");
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::{ConfigStore, MemoryStore, KEY_ANDROID_HOME, KEY_XCRUN_PATH};
    use crate::app::exec::fake::FakeExecutor;
    use crate::app::models::Platform;
    use crate::app::toolchain::ToolchainLocator;
    use std::sync::mpsc;

    const ADB: &str = "/sdk/platform-tools/adb";
    const EMULATOR: &str = "/sdk/emulator/emulator";
    const SIMCTL_LIST: &str = "xcrun simctl list devices available";

    fn coordinator(executor: Arc<FakeExecutor>) -> DeviceCoordinator {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_ANDROID_HOME, Some("/sdk".to_string()));
        store.set(KEY_XCRUN_PATH, Some("xcrun".to_string()));
        let locator = Arc::new(ToolchainLocator::new(store, executor));
        DeviceCoordinator::new(
            Arc::new(AndroidDiscovery::new(locator.clone())),
            Arc::new(IosDiscovery::new(locator)),
        )
    }

    fn scripted() -> Arc<FakeExecutor> {
        let executor = Arc::new(FakeExecutor::new());
        executor.ok(&format!("{EMULATOR} -list-avds"), "Pixel_7\n");
        executor.ok(&format!("{ADB} devices"), "List of devices attached\n");
        executor.ok(
            SIMCTL_LIST,
            "== Devices ==\n-- iOS 17.2 --\n    iPhone 15 (5A1B2C3D-1111-2222-3333-444455556666) (Shutdown)\n",
        );
        executor
    }

    fn run(coordinator: &DeviceCoordinator, query: DeviceQuery) -> Result<Vec<Device>, AppError> {
        let (sender, receiver) = mpsc::channel();
        coordinator.get_all_devices(
            query,
            None,
            Box::new(move |result| {
                let _ = sender.send(result);
            }),
        );
        receiver.recv().expect("callback")
    }

    #[test]
    fn merges_android_then_ios() {
        let executor = scripted();
        let devices = run(
            &coordinator(executor.clone()),
            DeviceQuery::new(true, true).with_kind(DeviceKind::Virtual),
        )
        .expect("devices");
        let platforms: Vec<Platform> = devices.iter().map(|device| device.platform).collect();
        assert_eq!(platforms, vec![Platform::Android, Platform::Ios]);
        let calls = executor.calls();
        assert_eq!(calls.first().map(String::as_str), Some(format!("{EMULATOR} -list-avds").as_str()));
        assert_eq!(calls.last().map(String::as_str), Some(SIMCTL_LIST));
    }

    #[test]
    fn ios_failure_discards_android_results() {
        let executor = Arc::new(FakeExecutor::new());
        executor.ok(&format!("{EMULATOR} -list-avds"), "Pixel_7\n");
        executor.ok(&format!("{ADB} devices"), "List of devices attached\n");
        executor.fail(SIMCTL_LIST, "xcrun: error: unable to find utility \"simctl\"");
        let err = run(
            &coordinator(executor),
            DeviceQuery::new(true, true).with_kind(DeviceKind::Virtual),
        )
        .expect_err("expected failure");
        assert_eq!(err.code, "ERR_EXECUTION");
    }

    #[test]
    fn android_failure_skips_ios() {
        let executor = Arc::new(FakeExecutor::new());
        executor.fail(&format!("{EMULATOR} -list-avds"), "emulator: crashed");
        executor.ok(SIMCTL_LIST, "== Devices ==\n");
        let coordinator = coordinator(executor.clone());
        let err = coordinator
            .get_all_devices_blocking(
                ExecutionContext::Background,
                DeviceQuery::new(true, true).with_kind(DeviceKind::Virtual),
                "t",
            )
            .expect_err("expected failure");
        assert_eq!(err.code, "ERR_EXECUTION");
        assert_eq!(executor.call_count("xcrun"), 0);
    }

    #[test]
    fn excluded_platforms_are_not_queried() {
        let executor = scripted();
        let devices = coordinator(executor.clone())
            .get_all_devices_blocking(
                ExecutionContext::Background,
                DeviceQuery::new(false, true).with_kind(DeviceKind::Virtual),
                "t",
            )
            .expect("devices");
        assert_eq!(devices.len(), 1);
        assert_eq!(executor.call_count(EMULATOR), 0);
    }

    #[test]
    fn blocking_call_rejects_presentation_context() {
        let err = coordinator(scripted())
            .get_all_devices_blocking(ExecutionContext::Presentation, DeviceQuery::new(true, true), "t")
            .expect_err("expected rejection");
        assert_eq!(err.code, "ERR_VALIDATION");
    }

    #[test]
    fn shut_down_coordinator_reports_through_callback() {
        let coordinator = coordinator(scripted());
        coordinator.shutdown();
        let err = run(&coordinator, DeviceQuery::new(true, false)).expect_err("expected failure");
        assert_eq!(err.code, "ERR_SYSTEM");
    }
}
