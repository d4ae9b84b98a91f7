//! Application settings (settings file, keys as the desktop app writes them)

use serde::{Deserialize, Serialize};

/// User settings relevant to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// When false, actions are swallowed; bindings still change state
    #[serde(rename = "allow.input.simulation", default = "default_true")]
    pub allow_input_simulation: bool,
    /// Save the profile set when the session ends
    #[serde(rename = "auto.save.profiles", default)]
    pub auto_save_profiles: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allow_input_simulation: true,
            auto_save_profiles: false,
        }
    }
}
