use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::config::{
    ConfigStore, KEY_ADB_PATH, KEY_ANDROID_HOME, KEY_AVD_MANAGER_PATH, KEY_EMULATOR_PATH,
    KEY_XCRUN_PATH,
};
use crate::app::error::AppError;
use crate::app::exec::{shell, ProcessExecutor};
use crate::app::toolchain::paths::{clean_stored_path, home_relative, shell_quote};

pub const ADB_SUBPATH: &str = "platform-tools/adb";
pub const EMULATOR_SUBPATH: &str = "emulator/emulator";
pub const AVD_MANAGER_SUBPATH: &str = "cmdline-tools/latest/bin/avdmanager";

const PROFILE_FILES: [&str; 5] = [
    ".zshrc",
    ".zprofile",
    ".bash_profile",
    ".bashrc",
    ".profile",
];
const SYSTEM_XCRUN: &str = "/usr/bin/xcrun";

/// `sh -c` script that sources `profile` if present and prints `$ANDROID_HOME`.
pub fn profile_probe_script(profile: &Path) -> String {
    let quoted = shell_quote(&profile.to_string_lossy());
    format!("[ -f {quoted} ] && . {quoted} >/dev/null 2>&1; echo \"$ANDROID_HOME\"")
}

/// Resolves SDK binaries. Derived paths are cached in the settings store;
/// resolution is deterministic per environment, so concurrent writers agree.
pub struct ToolchainLocator {
    store: Arc<dyn ConfigStore>,
    executor: Arc<dyn ProcessExecutor>,
    profile_candidates: Vec<PathBuf>,
}

impl ToolchainLocator {
    pub fn new(store: Arc<dyn ConfigStore>, executor: Arc<dyn ProcessExecutor>) -> Self {
        let profile_candidates = PROFILE_FILES.iter().map(|name| home_relative(name)).collect();
        Self {
            store,
            executor,
            profile_candidates,
        }
    }

    pub fn with_profile_candidates(mut self, candidates: Vec<PathBuf>) -> Self {
        self.profile_candidates = candidates;
        self
    }

    pub fn executor(&self) -> &Arc<dyn ProcessExecutor> {
        &self.executor
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    pub fn get_android_home(&self, trace_id: &str) -> Result<String, AppError> {
        if let Some(home) = self.store.get(KEY_ANDROID_HOME).and_then(|v| clean_stored_path(&v)) {
            return Ok(home);
        }

        for profile in &self.profile_candidates {
            let (program, args) = shell(&profile_probe_script(profile));
            match self.executor.execute(&program, &args, None, trace_id) {
                Ok(stdout) => {
                    let value = stdout
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .last()
                        .unwrap_or_default();
                    if !value.is_empty() {
                        info!(trace_id = %trace_id, profile = %profile.display(), "resolved ANDROID_HOME");
                        return Ok(value.to_string());
                    }
                }
                Err(err) => {
                    debug!(
                        trace_id = %trace_id,
                        profile = %profile.display(),
                        error = %err,
                        "profile probe failed"
                    );
                }
            }
        }

        warn!(trace_id = %trace_id, "ANDROID_HOME not found in any shell profile");
        Err(AppError::configuration(
            "Android SDK not found: set ANDROID_HOME in your shell profile or choose the SDK folder",
            trace_id,
        ))
    }

    pub fn get_adb_path(&self, trace_id: &str) -> Result<String, AppError> {
        self.derived_path(KEY_ADB_PATH, ADB_SUBPATH, trace_id)
    }

    pub fn get_emulator_path(&self, trace_id: &str) -> Result<String, AppError> {
        self.derived_path(KEY_EMULATOR_PATH, EMULATOR_SUBPATH, trace_id)
    }

    pub fn get_avd_manager_path(&self, trace_id: &str) -> Result<String, AppError> {
        self.derived_path(KEY_AVD_MANAGER_PATH, AVD_MANAGER_SUBPATH, trace_id)
    }

    fn derived_path(&self, key: &str, subpath: &str, trace_id: &str) -> Result<String, AppError> {
        if let Some(cached) = self.store.get(key).and_then(|v| clean_stored_path(&v)) {
            return Ok(cached);
        }
        let home = self.get_android_home(trace_id)?;
        let resolved = Path::new(&home).join(subpath).to_string_lossy().to_string();
        self.store.set(key, Some(resolved.clone()));
        Ok(resolved)
    }

    /// Verifies that `path` looks like an Android SDK with a working emulator.
    pub fn check_android_home(&self, path: &str, trace_id: &str) -> Result<(), AppError> {
        let Some(home) = clean_stored_path(path) else {
            return Err(AppError::configuration("Android SDK path is empty", trace_id));
        };
        let home = PathBuf::from(home);
        if !home.is_dir() {
            return Err(AppError::configuration(
                format!("Android SDK folder {} does not exist", home.display()),
                trace_id,
            ));
        }
        let emulator = home.join(EMULATOR_SUBPATH).to_string_lossy().to_string();
        self.executor
            .execute(&emulator, &["-list-avds".to_string()], None, trace_id)
            .map(|_| ())
            .map_err(|err| {
                AppError::configuration(
                    format!(
                        "{} is not a usable Android SDK: {}",
                        home.display(),
                        err.diagnostic()
                    ),
                    trace_id,
                )
            })
    }

    /// Stores an explicit SDK location and drops every path derived from the old one.
    pub fn set_android_home(&self, path: &str, trace_id: &str) -> Result<(), AppError> {
        self.check_android_home(path, trace_id)?;
        let home = clean_stored_path(path).unwrap_or_default();
        self.store.set(KEY_ANDROID_HOME, Some(home));
        for key in [KEY_ADB_PATH, KEY_EMULATOR_PATH, KEY_AVD_MANAGER_PATH] {
            self.store.set(key, None);
        }
        Ok(())
    }

    pub fn get_xcrun_path(&self) -> String {
        if let Some(cached) = self.store.get(KEY_XCRUN_PATH).and_then(|v| clean_stored_path(&v)) {
            return cached;
        }
        let resolved = if Path::new(SYSTEM_XCRUN).exists() {
            SYSTEM_XCRUN.to_string()
        } else {
            "xcrun".to_string()
        };
        self.store.set(KEY_XCRUN_PATH, Some(resolved.clone()));
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::MemoryStore;
    use crate::app::exec::fake::FakeExecutor;

    fn probe_key(profile: &str) -> String {
        let (program, args) = shell(&profile_probe_script(Path::new(profile)));
        FakeExecutor::key(&program, &args)
    }

    fn locator(store: Arc<MemoryStore>, executor: Arc<FakeExecutor>) -> ToolchainLocator {
        ToolchainLocator::new(store, executor).with_profile_candidates(vec![
            PathBuf::from("/home/u/.zshrc"),
            PathBuf::from("/home/u/.bashrc"),
            PathBuf::from("/home/u/.profile"),
        ])
    }

    #[test]
    fn cached_override_wins_without_probing() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_ANDROID_HOME, Some("\"/opt/android\"".to_string()));
        let executor = Arc::new(FakeExecutor::new());
        let home = locator(store, executor.clone())
            .get_android_home("trace")
            .expect("home");
        assert_eq!(home, "/opt/android");
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn probes_profiles_in_order_and_ignores_failures() {
        let store = Arc::new(MemoryStore::new());
        let executor = Arc::new(FakeExecutor::new());
        executor.fail(&probe_key("/home/u/.zshrc"), "zsh: parse error");
        executor.ok(&probe_key("/home/u/.bashrc"), "\n");
        executor.ok(&probe_key("/home/u/.profile"), "welcome!\n/sdk/android\n");

        let home = locator(store, executor.clone())
            .get_android_home("trace")
            .expect("home");
        assert_eq!(home, "/sdk/android");
        assert_eq!(executor.calls().len(), 3);
    }

    #[test]
    fn missing_home_is_configuration_error() {
        let store = Arc::new(MemoryStore::new());
        let executor = Arc::new(FakeExecutor::new());
        for profile in ["/home/u/.zshrc", "/home/u/.bashrc", "/home/u/.profile"] {
            executor.ok(&probe_key(profile), "\n");
        }
        let err = locator(store, executor)
            .get_adb_path("trace-cfg")
            .expect_err("expected configuration error");
        assert_eq!(err.code, "ERR_CONFIGURATION");
        assert_eq!(err.trace_id, "trace-cfg");
    }

    #[test]
    fn derived_paths_are_cached() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_ANDROID_HOME, Some("/opt/android".to_string()));
        let executor = Arc::new(FakeExecutor::new());
        let locator = locator(store.clone(), executor);

        assert_eq!(
            locator.get_adb_path("t").expect("adb"),
            "/opt/android/platform-tools/adb"
        );
        assert_eq!(
            locator.get_emulator_path("t").expect("emulator"),
            "/opt/android/emulator/emulator"
        );
        assert_eq!(
            locator.get_avd_manager_path("t").expect("avdmanager"),
            "/opt/android/cmdline-tools/latest/bin/avdmanager"
        );
        assert_eq!(
            store.get(KEY_ADB_PATH).as_deref(),
            Some("/opt/android/platform-tools/adb")
        );

        store.set(KEY_ANDROID_HOME, Some("/elsewhere".to_string()));
        assert_eq!(
            locator.get_adb_path("t").expect("cached adb"),
            "/opt/android/platform-tools/adb"
        );
    }

    #[test]
    fn check_android_home_rejects_missing_folder() {
        let store = Arc::new(MemoryStore::new());
        let executor = Arc::new(FakeExecutor::new());
        let err = locator(store, executor)
            .check_android_home("/this/path/should/not/exist", "trace")
            .expect_err("expected error");
        assert_eq!(err.code, "ERR_CONFIGURATION");
    }

    #[test]
    fn set_android_home_probes_emulator_and_resets_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let home = dir.path().to_string_lossy().to_string();
        let emulator = dir.path().join(EMULATOR_SUBPATH).to_string_lossy().to_string();

        let store = Arc::new(MemoryStore::new());
        store.set(KEY_ADB_PATH, Some("/old/adb".to_string()));
        let executor = Arc::new(FakeExecutor::new());
        executor.ok(&format!("{emulator} -list-avds"), "Pixel_7\n");

        let locator = locator(store.clone(), executor);
        locator.set_android_home(&home, "trace").expect("set home");
        assert_eq!(store.get(KEY_ANDROID_HOME), Some(home.clone()));
        assert_eq!(store.get(KEY_ADB_PATH), None);
        assert_eq!(
            locator.get_adb_path("trace").expect("adb"),
            dir.path().join(ADB_SUBPATH).to_string_lossy().to_string()
        );
    }

    #[test]
    fn check_android_home_surfaces_probe_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let home = dir.path().to_string_lossy().to_string();
        let emulator = dir.path().join(EMULATOR_SUBPATH).to_string_lossy().to_string();
        let executor = Arc::new(FakeExecutor::new());
        executor.fail(&format!("{emulator} -list-avds"), "emulator: not found");

        let err = locator(Arc::new(MemoryStore::new()), executor)
            .check_android_home(&home, "trace")
            .expect_err("expected probe failure");
        assert_eq!(err.code, "ERR_CONFIGURATION");
        assert!(err.error.contains("emulator: not found"));
    }

    #[test]
    fn xcrun_path_is_cached() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_XCRUN_PATH, Some("/Applications/Xcode.app/usr/bin/xcrun".to_string()));
        let locator = locator(store, Arc::new(FakeExecutor::new()));
        assert_eq!(locator.get_xcrun_path(), "/Applications/Xcode.app/usr/bin/xcrun");
    }
}
