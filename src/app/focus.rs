use tracing::debug;

use crate::app::error::AppError;
use crate::app::models::{Device, Platform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: u64,
    pub title: String,
}

/// Application whose windows host a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOwner {
    AndroidEmulator,
    IosSimulator,
}

impl WindowOwner {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Android => WindowOwner::AndroidEmulator,
            Platform::Ios => WindowOwner::IosSimulator,
        }
    }
}

/// Window discovery and raising, provided by the host OS integration.
pub trait WindowFinder: Send + Sync {
    fn windows(&self, owner: WindowOwner) -> Result<Vec<WindowInfo>, AppError>;
    fn raise(&self, window: &WindowInfo) -> Result<(), AppError>;
}

/// Finder for hosts without window integration; never finds a window.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWindowFinder;

impl WindowFinder for NoWindowFinder {
    fn windows(&self, _owner: WindowOwner) -> Result<Vec<WindowInfo>, AppError> {
        Ok(Vec::new())
    }

    fn raise(&self, _window: &WindowInfo) -> Result<(), AppError> {
        Ok(())
    }
}

/// `Android Emulator - Pixel_7_API_34:5554` yields `Pixel_7_API_34`.
pub fn parse_android_window_title(title: &str) -> Option<String> {
    let start = title
        .find(" - ")
        .map(|index| index + 3)
        .or_else(|| title.find('-').map(|index| index + 1))?;
    let rest = &title[start..];
    let end = rest.rfind(':').unwrap_or(rest.len());
    let name = rest[..end].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// `iPhone 15 Pro – iOS 17.2` yields `iPhone 15 Pro`.
pub fn parse_ios_window_title(title: &str) -> Option<String> {
    let end = title.find(['—', '–']).unwrap_or(title.len());
    let name = title[..end].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

pub fn window_device_name(platform: Platform, title: &str) -> Option<String> {
    match platform {
        Platform::Android => parse_android_window_title(title),
        Platform::Ios => parse_ios_window_title(title),
    }
}

pub fn select_window<'a>(device: &Device, windows: &'a [WindowInfo]) -> Option<&'a WindowInfo> {
    windows.iter().find(|window| {
        window_device_name(device.platform, &window.title).as_deref() == Some(device.name.as_str())
    })
}

pub fn focus_device_window(
    finder: &dyn WindowFinder,
    device: &Device,
    trace_id: &str,
) -> Result<(), AppError> {
    let windows = finder.windows(WindowOwner::for_platform(device.platform))?;
    debug!(trace_id = %trace_id, count = windows.len(), device = %device.name, "candidate windows");
    let Some(window) = select_window(device, &windows) else {
        return Err(AppError::not_found(
            format!("No window found for {}", device.name),
            trace_id,
        ));
    };
    finder.raise(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::DeviceType;
    use std::sync::Mutex;

    struct ScriptedFinder {
        windows: Vec<WindowInfo>,
        raised: Mutex<Vec<u64>>,
    }

    impl WindowFinder for ScriptedFinder {
        fn windows(&self, _owner: WindowOwner) -> Result<Vec<WindowInfo>, AppError> {
            Ok(self.windows.clone())
        }

        fn raise(&self, window: &WindowInfo) -> Result<(), AppError> {
            self.raised.lock().expect("raised").push(window.id);
            Ok(())
        }
    }

    fn window(id: u64, title: &str) -> WindowInfo {
        WindowInfo {
            id,
            title: title.to_string(),
        }
    }

    fn device(name: &str, platform: Platform) -> Device {
        Device {
            name: name.to_string(),
            version: None,
            identifier: None,
            booted: true,
            platform,
            device_type: DeviceType::Virtual,
            device_family: None,
        }
    }

    #[test]
    fn parses_android_titles() {
        assert_eq!(
            parse_android_window_title("Android Emulator - Pixel_7_API_34:5554").as_deref(),
            Some("Pixel_7_API_34")
        );
        assert_eq!(
            parse_android_window_title("Android Emulator - Pixel-Fold:5556").as_deref(),
            Some("Pixel-Fold")
        );
        assert_eq!(parse_android_window_title("Extended controls"), None);
    }

    #[test]
    fn parses_ios_titles() {
        assert_eq!(
            parse_ios_window_title("iPhone 15 Pro – iOS 17.2").as_deref(),
            Some("iPhone 15 Pro")
        );
        assert_eq!(
            parse_ios_window_title("iPad Air — iPadOS 17.0").as_deref(),
            Some("iPad Air")
        );
        assert_eq!(parse_ios_window_title("Apple TV").as_deref(), Some("Apple TV"));
    }

    #[test]
    fn raises_only_the_matching_window() {
        let finder = ScriptedFinder {
            windows: vec![
                window(1, "Android Emulator - Pixel_4_API_29:5556"),
                window(2, "Android Emulator - Pixel_7_API_34:5554"),
            ],
            raised: Mutex::new(Vec::new()),
        };
        focus_device_window(&finder, &device("Pixel_7_API_34", Platform::Android), "t")
            .expect("focus");
        assert_eq!(*finder.raised.lock().expect("raised"), vec![2]);
    }

    #[test]
    fn missing_window_is_not_found() {
        let err = focus_device_window(&NoWindowFinder, &device("iPhone 15", Platform::Ios), "t")
            .expect_err("expected not found");
        assert_eq!(err.code, "ERR_NOT_FOUND");
    }
}
