use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Ios => write!(f, "ios"),
            Platform::Android => write!(f, "android"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Physical,
    Virtual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    Phone,
    Tablet,
    Watch,
    Tv,
    Headset,
    Unknown,
}

impl DeviceFamily {
    /// Best-effort family for a simulator or device display name.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("ipad") {
            DeviceFamily::Tablet
        } else if lower.contains("iphone") || lower.contains("ipod") {
            DeviceFamily::Phone
        } else if lower.contains("watch") {
            DeviceFamily::Watch
        } else if lower.contains("apple tv") || lower.contains("appletv") {
            DeviceFamily::Tv
        } else if lower.contains("vision") {
            DeviceFamily::Headset
        } else {
            DeviceFamily::Unknown
        }
    }

    /// Maps `hardwareProperties.deviceType` from `devicectl` JSON.
    pub fn from_devicectl(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "iphone" | "ipod" => DeviceFamily::Phone,
            "ipad" => DeviceFamily::Tablet,
            "applewatch" => DeviceFamily::Watch,
            "appletv" => DeviceFamily::Tv,
            "applevision" | "realitydevice" => DeviceFamily::Headset,
            _ => DeviceFamily::Unknown,
        }
    }
}

/// Which kinds of device a discovery call should list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Physical,
    Virtual,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub booted: bool,
    pub platform: Platform,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_family: Option<DeviceFamily>,
}

impl Device {
    pub fn display_name(&self) -> String {
        match &self.version {
            Some(version) if !version.is_empty() => format!("{} ({})", self.name, version),
            _ => self.name.clone(),
        }
    }

    /// Identity within one discovery pass: name, platform and type.
    pub fn same_device(&self, other: &Device) -> bool {
        self.name == other.name
            && self.platform == other.platform
            && self.device_type == other.device_type
    }
}

/// User-defined action template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: String,
    pub name: String,
    pub command: String,
    pub icon: String,
    pub platform: Platform,
    pub need_booted_device: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boots_device: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<i32>,
}

/// Extra launch flag applied to every emulator launch while enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub id: String,
    pub title: String,
    pub command: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResponse<T> {
    pub trace_id: String,
    pub data: T,
}
