//! Keyboard commands
//!
//! Run in the background context as thin pass-throughs into the store. The
//! outcome is forwarded to content surfaces as command feedback.

use std::fmt;

use crate::settings::SettingsPatch;
use crate::store::PreferenceStore;
use crate::types::{FeatureId, UnknownName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleEnabled,
    ToggleFeature(FeatureId),
}

impl Command {
    pub const ALL: [Command; 7] = [
        Self::ToggleEnabled,
        Self::ToggleFeature(FeatureId::HideShorts),
        Self::ToggleFeature(FeatureId::HideHomeFeed),
        Self::ToggleFeature(FeatureId::HideEndCards),
        Self::ToggleFeature(FeatureId::HideComments),
        Self::ToggleFeature(FeatureId::HideSidebar),
        Self::ToggleFeature(FeatureId::SearchOnly),
    ];

    /// Symbolic name as declared in the extension manifest.
    pub fn name(self) -> &'static str {
        match self {
            Self::ToggleEnabled => "toggle-enabled",
            Self::ToggleFeature(FeatureId::HideShorts) => "toggle-shorts",
            Self::ToggleFeature(FeatureId::HideHomeFeed) => "toggle-home-feed",
            Self::ToggleFeature(FeatureId::HideEndCards) => "toggle-end-cards",
            Self::ToggleFeature(FeatureId::HideComments) => "toggle-comments",
            Self::ToggleFeature(FeatureId::HideSidebar) => "toggle-sidebar",
            Self::ToggleFeature(FeatureId::SearchOnly) => "toggle-search-only",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, UnknownName> {
        Self::ALL
            .into_iter()
            .find(|command| command.name() == name)
            .ok_or_else(|| UnknownName(name.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a command, sent back as feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: Command,
    /// New value of the toggled flag
    pub value: bool,
}

/// Toggle the flag behind a command.
pub fn run_command(store: &mut PreferenceStore, command: Command) -> CommandOutcome {
    let current = store.get();
    let value = match command {
        Command::ToggleEnabled => {
            let value = !current.enabled;
            store.set(SettingsPatch::enabled(value));
            value
        }
        Command::ToggleFeature(feature) => {
            // Merge is shallow: start from the full current map
            let value = !current.features.get(feature);
            store.set(SettingsPatch::features(current.features.with(feature, value)));
            value
        }
    };
    log::debug!("command {} -> {}", command, value);
    CommandOutcome { command, value }
}
