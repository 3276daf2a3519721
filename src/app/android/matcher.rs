use std::sync::Arc;

use tracing::debug;

use crate::app::error::AppError;
use crate::app::parse::parse_emulator_serials;
use crate::app::toolchain::ToolchainLocator;

/// Correlates a running emulator serial with its AVD profile name.
pub struct IdentityMatcher {
    locator: Arc<ToolchainLocator>,
}

impl IdentityMatcher {
    pub fn new(locator: Arc<ToolchainLocator>) -> Self {
        Self { locator }
    }

    /// One `adb devices` listing plus one `emu avd name` query per running
    /// emulator until a name matches.
    pub fn match_serial(&self, profile_name: &str, trace_id: &str) -> Result<String, AppError> {
        let adb = self.locator.get_adb_path(trace_id)?;
        let executor = self.locator.executor();
        let listing = executor.execute(&adb, &["devices".to_string()], None, trace_id)?;
        let serials = parse_emulator_serials(&listing);
        match_serial_with(profile_name, &serials, trace_id, |serial| {
            let args = vec![
                "-s".to_string(),
                serial.to_string(),
                "emu".to_string(),
                "avd".to_string(),
                "name".to_string(),
            ];
            executor.execute(&adb, &args, None, trace_id)
        })
    }
}

/// First serial whose queried name equals `profile_name`, trying each
/// candidate in order. A failed query counts as a mismatch.
pub fn match_serial_with<F>(
    profile_name: &str,
    serials: &[String],
    trace_id: &str,
    mut query_name: F,
) -> Result<String, AppError>
where
    F: FnMut(&str) -> Result<String, AppError>,
{
    let wanted = profile_name.trim();
    for serial in serials {
        match query_name(serial) {
            Ok(output) => {
                let name = output.lines().next().unwrap_or_default().trim();
                if name == wanted {
                    return Ok(serial.clone());
                }
            }
            Err(err) => {
                debug!(trace_id = %trace_id, serial = %serial, error = %err, "avd name query failed");
            }
        }
    }
    Err(AppError::not_found(
        format!("No running emulator for {wanted}"),
        trace_id,
    ))
}
