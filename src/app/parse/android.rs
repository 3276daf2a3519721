use regex::Regex;

use crate::app::error::AppError;
use crate::app::models::{Device, DeviceType, Platform};

/// Lines the emulator binary mixes into `-list-avds` output.
const AVD_LIST_NOISE: [&str; 2] = ["Storing crashdata", "|"];
const EMULATOR_SERIAL_PATTERN: &str = r"^emulator-[0-9]+$";

/// One row of `adb devices [-l]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdbEntry {
    pub serial: String,
    pub state: String,
    pub model: Option<String>,
    pub product: Option<String>,
    pub device: Option<String>,
    pub transport_id: Option<String>,
}

pub fn parse_adb_entries(output: &str) -> Vec<AdbEntry> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter(|line| !line.to_lowercase().contains("list of devices"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                return None;
            }
            let mut entry = AdbEntry {
                serial: tokens[0].to_string(),
                state: tokens[1].to_string(),
                model: None,
                product: None,
                device: None,
                transport_id: None,
            };
            for token in tokens.iter().skip(2) {
                if let Some(value) = token.strip_prefix("model:") {
                    entry.model = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("product:") {
                    entry.product = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("device:") {
                    entry.device = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("transport_id:") {
                    entry.transport_id = Some(value.to_string());
                }
            }
            Some(entry)
        })
        .collect()
}

fn emulator_serial_regex() -> Option<Regex> {
    Regex::new(EMULATOR_SERIAL_PATTERN).ok()
}

pub fn is_emulator_serial(serial: &str) -> bool {
    emulator_serial_regex()
        .map(|re| re.is_match(serial))
        .unwrap_or(false)
}

/// Running emulator serials from `adb devices`, in listing order.
pub fn parse_emulator_serials(output: &str) -> Vec<String> {
    let Some(re) = emulator_serial_regex() else {
        return Vec::new();
    };
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|serial| re.is_match(serial))
        .map(str::to_string)
        .collect()
}

/// `emulator -list-avds` output. `match_serial` resolves a profile name to a
/// running serial; any error leaves the device unbooted and unidentified.
pub fn parse_avd_list<F>(output: &str, mut match_serial: F) -> Vec<Device>
where
    F: FnMut(&str) -> Result<String, AppError>,
{
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !AVD_LIST_NOISE.iter().any(|marker| line.contains(marker)))
        .map(|name| {
            let identifier = match_serial(name).ok();
            Device {
                name: name.to_string(),
                version: None,
                booted: identifier.is_some(),
                identifier,
                platform: Platform::Android,
                device_type: DeviceType::Virtual,
                device_family: None,
            }
        })
        .collect()
}

/// `adb devices -l` output restricted to online hardware.
pub fn parse_adb_physical(output: &str) -> Vec<Device> {
    parse_adb_entries(output)
        .into_iter()
        .filter(|entry| entry.state == "device")
        .filter(|entry| !is_emulator_serial(&entry.serial))
        .filter_map(|entry| {
            let name = entry.model.filter(|model| !model.is_empty())?;
            Some(Device {
                name,
                version: None,
                identifier: Some(entry.serial),
                booted: true,
                platform: Platform::Android,
                device_type: DeviceType::Physical,
                device_family: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_adb_entries() {
        let output = "List of devices attached\n0123456789ABCDEF device product:sdk_gphone64_arm64 model:Pixel_7 device:emu64a transport_id:1\nemulator-5554 unauthorized transport_id:2\n";
        let parsed = parse_adb_entries(output);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].serial, "0123456789ABCDEF");
        assert_eq!(parsed[0].model.as_deref(), Some("Pixel_7"));
        assert_eq!(parsed[1].state, "unauthorized");
    }

    #[test]
    fn avd_list_matches_serials_and_skips_crashdata() {
        let output = "Pixel_3a_API_30_x86\nStoring crashdata in: /tmp/android-user/emu-crash-34.1.db\n\nPixel_4_API_29\nNexus_5X_API_28\n";
        let devices = parse_avd_list(output, |name| match name {
            "Pixel_3a_API_30_x86" => Ok("emulator-5554".to_string()),
            "Pixel_4_API_29" => Ok("emulator-5556".to_string()),
            other => Err(AppError::not_found(format!("{other} is not running"), "t")),
        });

        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].name, "Pixel_3a_API_30_x86");
        assert!(devices[0].booted);
        assert_eq!(devices[0].identifier.as_deref(), Some("emulator-5554"));
        assert!(devices[1].booted);
        assert_eq!(devices[1].identifier.as_deref(), Some("emulator-5556"));
        assert!(!devices[2].booted);
        assert_eq!(devices[2].identifier, None);
        assert!(devices
            .iter()
            .all(|d| d.platform == Platform::Android && d.device_type == DeviceType::Virtual));
    }

    #[test]
    fn crashdata_lines_never_reach_the_matcher() {
        let mut asked = Vec::new();
        let devices = parse_avd_list(
            "Storing crashdata in: /tmp/x\nINFO    | Android emulator version 34\nPixel_7\n",
            |name| {
                asked.push(name.to_string());
                Err(AppError::not_found("offline", "t"))
            },
        );
        assert_eq!(asked, vec!["Pixel_7".to_string()]);
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn physical_list_excludes_emulators_and_offline_entries() {
        let output = "List of devices attached\nR58M123ABC             device usb:1-1 product:beyond1 model:SM_G973F device:beyond1 transport_id:3\nemulator-5554          device product:sdk_gphone64 model:sdk_gphone64_arm64 device:emu64a transport_id:1\n9A281FFAZ001P0         unauthorized usb:1-2 transport_id:4\nbroken\n";
        let devices = parse_adb_physical(output);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "SM_G973F");
        assert_eq!(devices[0].identifier.as_deref(), Some("R58M123ABC"));
        assert!(devices[0].booted);
        assert_eq!(devices[0].device_type, DeviceType::Physical);
    }

    #[test]
    fn physical_list_empty_input() {
        assert!(parse_adb_physical("").is_empty());
        assert!(parse_adb_physical("List of devices attached\n\n").is_empty());
    }

    #[test]
    fn extracts_emulator_serials_in_order() {
        let output = "List of devices attached\nemulator-5556\tdevice\nR58M123ABC\tdevice\nemulator-5554\toffline\n";
        assert_eq!(
            parse_emulator_serials(output),
            vec!["emulator-5556".to_string(), "emulator-5554".to_string()]
        );
        assert!(is_emulator_serial("emulator-5554"));
        assert!(!is_emulator_serial("emulator-abc"));
    }

    #[test]
    fn serials_that_only_start_like_emulators_are_physical() {
        assert!(!is_emulator_serial("emulator-5554x"));
        let output = "List of devices attached
emulator-5554x device usb:1-1 model:Handset device:handset transport_id:5
emulator-5556 device model:sdk_gphone64_arm64 transport_id:6
";
        let devices = parse_adb_physical(output);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].identifier.as_deref(), Some("emulator-5554x"));
        assert_eq!(parse_emulator_serials(output), vec!["emulator-5556".to_string()]);
    }
}
