use serde::Serialize;

/// Seconds between two polls of the CI servers
pub const DEFAULT_REFRESH_INTERVAL: u32 = 15;

/// General application behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneralSettings {
    pub refresh_interval_in_seconds: u32,
    /// Reflect the overall build state in the main window icon
    pub update_main_window_icon: bool,
    /// Show who claimed a broken build (Jenkins claim plugin)
    pub integrate_with_claim_plugin: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            refresh_interval_in_seconds: DEFAULT_REFRESH_INTERVAL,
            update_main_window_icon: true,
            integrate_with_claim_plugin: true,
        }
    }
}
