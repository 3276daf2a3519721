use regex::Regex;
use serde::Deserialize;

use crate::app::models::{Device, DeviceFamily, DeviceType, Platform};

const HEADER_PATTERN: &str = r"^--\s*(.+?)\s*--$";
const SIMULATOR_PATTERN: &str = r"^\s*(.+?)\s+\(([0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12})\)\s+\(([^)]*)\)\s*$";
const UNAVAILABLE_TUNNEL: &str = "unavailable";

/// `xcrun simctl list devices available` text output.
///
/// Each `-- <runtime> --` header sets the version for the device lines that
/// follow it. Lines that are neither headers nor device rows are skipped.
pub fn parse_simctl_devices(output: &str) -> Vec<Device> {
    let (Ok(header_re), Ok(device_re)) = (Regex::new(HEADER_PATTERN), Regex::new(SIMULATOR_PATTERN))
    else {
        return Vec::new();
    };

    let mut current_version: Option<String> = None;
    let mut devices = Vec::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(caps) = header_re.captures(trimmed) {
            current_version = Some(caps[1].to_string());
            continue;
        }
        let Some(caps) = device_re.captures(line) else {
            continue;
        };
        let name = caps[1].trim().to_string();
        let state = &caps[3];
        devices.push(Device {
            device_family: Some(DeviceFamily::from_name(&name)),
            name,
            version: current_version.clone(),
            identifier: Some(caps[2].to_string()),
            booted: state.contains("Booted"),
            platform: Platform::Ios,
            device_type: DeviceType::Virtual,
        });
    }
    devices
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DevicectlOutput {
    info: DevicectlInfo,
    result: DevicectlResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DevicectlInfo {
    outcome: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DevicectlResult {
    devices: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DevicectlDevice {
    identifier: Option<String>,
    device_properties: DeviceProperties,
    hardware_properties: HardwareProperties,
    connection_properties: ConnectionProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DeviceProperties {
    name: Option<String>,
    os_version_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HardwareProperties {
    udid: Option<String>,
    device_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ConnectionProperties {
    tunnel_state: Option<String>,
}

/// JSON written by `xcrun devicectl list devices -j <file>`.
pub fn parse_devicectl_json(output: &str) -> Vec<Device> {
    let Ok(parsed) = serde_json::from_str::<DevicectlOutput>(output) else {
        return Vec::new();
    };
    if parsed.info.outcome.as_deref() != Some("success") {
        return Vec::new();
    }
    parsed
        .result
        .devices
        .into_iter()
        .filter_map(|value| serde_json::from_value::<DevicectlDevice>(value).ok())
        .filter_map(|entry| {
            let name = entry.device_properties.name.filter(|v| !v.trim().is_empty())?;
            let identifier = entry
                .hardware_properties
                .udid
                .or(entry.identifier)
                .filter(|v| !v.trim().is_empty());
            let booted = entry.connection_properties.tunnel_state.as_deref()
                != Some(UNAVAILABLE_TUNNEL);
            let device_family = entry
                .hardware_properties
                .device_type
                .as_deref()
                .map(DeviceFamily::from_devicectl)
                .unwrap_or_else(|| DeviceFamily::from_name(&name));
            Some(Device {
                name,
                version: entry.device_properties.os_version_number,
                identifier,
                booted,
                platform: Platform::Ios,
                device_type: DeviceType::Physical,
                device_family: Some(device_family),
            })
        })
        .collect()
}
