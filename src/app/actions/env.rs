use std::sync::{Arc, Mutex};

use crate::app::android::AndroidDeviceService;
use crate::app::error::AppError;
use crate::app::exec::ProcessExecutor;
use crate::app::ios::IosDeviceService;
use crate::app::toolchain::ToolchainLocator;

pub trait Clipboard: Send + Sync {
    fn get_text(&self) -> Option<String>;
    fn set_text(&self, text: &str) -> Result<(), AppError>;
}

/// In-process clipboard for hosts without a system pasteboard.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            text: Mutex::new(initial),
        }
    }
}

impl Clipboard for MemoryClipboard {
    fn get_text(&self) -> Option<String> {
        self.text.lock().ok().and_then(|guard| guard.clone())
    }

    fn set_text(&self, text: &str) -> Result<(), AppError> {
        let mut guard = self
            .text
            .lock()
            .map_err(|_| AppError::system("Clipboard lock poisoned", ""))?;
        *guard = Some(text.to_string());
        Ok(())
    }
}

/// Opens a terminal application running a command.
pub trait TerminalLauncher: Send + Sync {
    fn open(&self, app: &str, command: &str, trace_id: &str) -> Result<(), AppError>;
}

pub fn applescript_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// AppleScript for `app`; iTerm has its own dictionary, everything else is
/// driven like Terminal.
pub fn terminal_script(app: &str, command: &str) -> Vec<String> {
    let app = applescript_escape(app);
    let command = applescript_escape(command);
    if app.to_lowercase().contains("iterm") {
        vec![
            format!("tell application \"{app}\""),
            "activate".to_string(),
            format!("create window with default profile command \"{command}\""),
            "end tell".to_string(),
        ]
    } else {
        vec![
            format!("tell application \"{app}\""),
            "activate".to_string(),
            format!("do script \"{command}\""),
            "end tell".to_string(),
        ]
    }
}

pub struct AppleScriptTerminal {
    executor: Arc<dyn ProcessExecutor>,
}

impl AppleScriptTerminal {
    pub fn new(executor: Arc<dyn ProcessExecutor>) -> Self {
        Self { executor }
    }
}

impl TerminalLauncher for AppleScriptTerminal {
    fn open(&self, app: &str, command: &str, trace_id: &str) -> Result<(), AppError> {
        let mut args = Vec::new();
        for line in terminal_script(app, command) {
            args.push("-e".to_string());
            args.push(line);
        }
        self.executor.execute("osascript", &args, None, trace_id)?;
        Ok(())
    }
}

/// Everything an action may touch while it runs.
pub struct ActionEnv {
    pub locator: Arc<ToolchainLocator>,
    pub android: Arc<AndroidDeviceService>,
    pub ios: Arc<IosDeviceService>,
    pub clipboard: Arc<dyn Clipboard>,
    pub terminal: Arc<dyn TerminalLauncher>,
}
