use crate::app::error::AppError;
use crate::app::models::{Device, Platform};
use crate::app::toolchain::ToolchainLocator;

pub const VAR_DEVICE_NAME: &str = "$device_name";
pub const VAR_DEVICE_ID: &str = "$device_id";
pub const VAR_ADB_ID: &str = "$adb_id";
pub const VAR_UUID: &str = "$uuid";
pub const VAR_ANDROID_HOME: &str = "$android_home_path";
pub const VAR_ADB_PATH: &str = "$adb_path";
pub const VAR_EMULATOR_PATH: &str = "$emulator_path";
pub const VAR_AVD_MANAGER_PATH: &str = "$avd_manager_path";
pub const VAR_XCRUN_PATH: &str = "$xcrun_path";

#[derive(Debug, Clone, Copy)]
enum Source {
    DeviceName,
    Identifier,
    AndroidHome,
    Adb,
    Emulator,
    AvdManager,
    Xcrun,
}

fn variables(platform: Platform) -> &'static [(&'static str, Source)] {
    match platform {
        Platform::Android => &[
            (VAR_DEVICE_NAME, Source::DeviceName),
            (VAR_DEVICE_ID, Source::Identifier),
            (VAR_ADB_ID, Source::Identifier),
            (VAR_ANDROID_HOME, Source::AndroidHome),
            (VAR_ADB_PATH, Source::Adb),
            (VAR_EMULATOR_PATH, Source::Emulator),
            (VAR_AVD_MANAGER_PATH, Source::AvdManager),
        ],
        Platform::Ios => &[
            (VAR_DEVICE_NAME, Source::DeviceName),
            (VAR_DEVICE_ID, Source::Identifier),
            (VAR_UUID, Source::Identifier),
            (VAR_XCRUN_PATH, Source::Xcrun),
        ],
    }
}

fn resolve(
    variable: &str,
    source: Source,
    device: &Device,
    locator: &ToolchainLocator,
    trace_id: &str,
) -> Result<String, AppError> {
    match source {
        Source::DeviceName => Ok(device.name.clone()),
        Source::Identifier => device.identifier.clone().ok_or_else(|| {
            AppError::validation(
                format!("{variable} needs a running device but {} has no identifier", device.name),
                trace_id,
            )
        }),
        Source::AndroidHome => locator.get_android_home(trace_id),
        Source::Adb => locator.get_adb_path(trace_id),
        Source::Emulator => locator.get_emulator_path(trace_id),
        Source::AvdManager => locator.get_avd_manager_path(trace_id),
        Source::Xcrun => Ok(locator.get_xcrun_path()),
    }
}

/// Substitutes the placeholders known for the device's platform in one pass
/// over the template. Substituted values are never scanned again, and are
/// inserted verbatim; quoting is up to the template. Toolchain paths are
/// only resolved when the template mentions them.
pub fn expand_template(
    template: &str,
    device: &Device,
    locator: &ToolchainLocator,
    trace_id: &str,
) -> Result<String, AppError> {
    if template.trim().is_empty() {
        return Err(AppError::validation("Command template is empty", trace_id));
    }
    let known = variables(device.platform);
    let mut expanded = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(index) = rest.find('$') {
        expanded.push_str(&rest[..index]);
        let tail = &rest[index..];
        let matched = known
            .iter()
            .filter(|entry| tail.starts_with(entry.0))
            .max_by_key(|entry| entry.0.len());
        match matched {
            Some(&(variable, source)) => {
                expanded.push_str(&resolve(variable, source, device, locator, trace_id)?);
                rest = &tail[variable.len()..];
            }
            None => {
                expanded.push('$');
                rest = &tail[1..];
            }
        }
    }
    expanded.push_str(rest);
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::{ConfigStore, MemoryStore, KEY_ANDROID_HOME, KEY_XCRUN_PATH};
    use crate::app::exec::fake::FakeExecutor;
    use crate::app::models::DeviceType;
    use std::sync::Arc;

    fn locator() -> ToolchainLocator {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_ANDROID_HOME, Some("/sdk".to_string()));
        store.set(KEY_XCRUN_PATH, Some("/usr/bin/xcrun".to_string()));
        ToolchainLocator::new(store, Arc::new(FakeExecutor::new()))
    }

    fn device(platform: Platform, identifier: Option<&str>) -> Device {
        Device {
            name: "Pixel_7".to_string(),
            version: None,
            identifier: identifier.map(str::to_string),
            booted: identifier.is_some(),
            platform,
            device_type: DeviceType::Virtual,
            device_family: None,
        }
    }

    #[test]
    fn expands_android_variables() {
        let expanded = expand_template(
            "$adb_path -s $adb_id install app.apk && echo $device_name in $android_home_path",
            &device(Platform::Android, Some("emulator-5554")),
            &locator(),
            "t",
        )
        .expect("expand");
        assert_eq!(
            expanded,
            "/sdk/platform-tools/adb -s emulator-5554 install app.apk && echo Pixel_7 in /sdk"
        );
    }

    #[test]
    fn expands_ios_variables_and_leaves_android_ones() {
        let expanded = expand_template(
            "$xcrun_path simctl io $uuid screenshot shot.png # $adb_path",
            &device(Platform::Ios, Some("UDID-1")),
            &locator(),
            "t",
        )
        .expect("expand");
        assert_eq!(
            expanded,
            "/usr/bin/xcrun simctl io UDID-1 screenshot shot.png # $adb_path"
        );
    }

    #[test]
    fn identifier_variables_need_a_running_device() {
        let err = expand_template(
            "$adb_path -s $adb_id reboot",
            &device(Platform::Android, None),
            &locator(),
            "t",
        )
        .expect_err("expected validation error");
        assert_eq!(err.code, "ERR_VALIDATION");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let mut simulator = device(Platform::Ios, Some("U-1"));
        simulator.name = "My $uuid sim".to_string();
        let expanded = expand_template("echo $device_name", &simulator, &locator(), "t")
            .expect("expand");
        assert_eq!(expanded, "echo My $uuid sim");

        let expanded = expand_template("$uuid '$device_name' $$uuid", &simulator, &locator(), "t")
            .expect("expand");
        assert_eq!(expanded, "U-1 'My $uuid sim' $U-1");
    }

    #[test]
    fn empty_template_is_rejected() {
        let err = expand_template("  ", &device(Platform::Ios, None), &locator(), "t")
            .expect_err("expected validation error");
        assert_eq!(err.code, "ERR_VALIDATION");
    }
}
