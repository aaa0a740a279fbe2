use crate::error::SettingsError;
use serde::Serialize;
use std::{fmt, str::FromStr};

/// Build outcome a sound can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundStatus {
    /// A build failed after succeeding
    Failed,
    /// A build succeeded after failing
    Fixed,
    /// A build failed again
    StillFailing,
    /// A build succeeded again
    Succeeded,
}

impl SoundStatus {
    pub const ALL: [SoundStatus; 4] = [
        SoundStatus::Failed,
        SoundStatus::Fixed,
        SoundStatus::StillFailing,
        SoundStatus::Succeeded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SoundStatus::Failed => "Failed",
            SoundStatus::Fixed => "Fixed",
            SoundStatus::StillFailing => "StillFailing",
            SoundStatus::Succeeded => "Succeeded",
        }
    }

    /// Key of the sound path in the properties file
    pub(super) fn key(self) -> String {
        format!("sounds.{}", self.as_str())
    }
}

impl fmt::Display for SoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoundStatus {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoundStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| SettingsError::UnknownSoundStatus(s.to_owned()))
    }
}

/// Sounds played when build states change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationSettings {
    pub failed_sound_path: Option<String>,
    pub fixed_sound_path: Option<String>,
    pub still_failing_sound_path: Option<String>,
    pub succeeded_sound_path: Option<String>,
    /// Report unstable builds as failed ones
    pub treat_unstable_as_failed: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            failed_sound_path: None,
            fixed_sound_path: None,
            still_failing_sound_path: None,
            succeeded_sound_path: None,
            treat_unstable_as_failed: true,
        }
    }
}

impl NotificationSettings {
    pub fn sound_path(&self, status: SoundStatus) -> Option<&str> {
        match status {
            SoundStatus::Failed => self.failed_sound_path.as_deref(),
            SoundStatus::Fixed => self.fixed_sound_path.as_deref(),
            SoundStatus::StillFailing => self.still_failing_sound_path.as_deref(),
            SoundStatus::Succeeded => self.succeeded_sound_path.as_deref(),
        }
    }

    pub fn set_sound_path(&mut self, status: SoundStatus, path: Option<String>) {
        let slot = match status {
            SoundStatus::Failed => &mut self.failed_sound_path,
            SoundStatus::Fixed => &mut self.fixed_sound_path,
            SoundStatus::StillFailing => &mut self.still_failing_sound_path,
            SoundStatus::Succeeded => &mut self.succeeded_sound_path,
        };
        *slot = path.filter(|p| !p.is_empty());
    }
}
