pub mod android;
pub mod ios;

pub use android::{parse_adb_physical, parse_avd_list, parse_emulator_serials};
pub use ios::{parse_devicectl_json, parse_simctl_devices};
