use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use super::error::SessionError;

/// The screen that is currently on display.
#[derive(
    Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum AppMode {
    #[default]
    Splash,
    Welcome,
    Configuration,
    Converter,
    Validator,
}

impl AppMode {
    /// Position of the menu tab leading to this mode. The splash screen has no tab.
    pub fn tab(&self) -> Option<usize> {
        MENU_TABS.iter().position(|tab| tab.mode == *self)
    }
}

impl FromStr for AppMode {
    type Err = SessionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Splash" => Ok(AppMode::Splash),
            "Welcome" => Ok(AppMode::Welcome),
            "Configuration" => Ok(AppMode::Configuration),
            "Converter" => Ok(AppMode::Converter),
            "Validator" => Ok(AppMode::Validator),
            _ => Err(SessionError::UnknownMode(value.to_string())),
        }
    }
}

/// A navigation destination in the menu bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuTab {
    pub title: &'static str,
    pub mode: AppMode,
}

pub const MENU_TABS: [MenuTab; 4] = [
    MenuTab {
        title: "1) Getting started",
        mode: AppMode::Welcome,
    },
    MenuTab {
        title: "2) Configuration",
        mode: AppMode::Configuration,
    },
    MenuTab {
        title: "3) iEEG to BIDS",
        mode: AppMode::Converter,
    },
    MenuTab {
        title: "4) Validator",
        mode: AppMode::Validator,
    },
];

/// The result of a navigation: the new mode together with its menu tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub mode: AppMode,
    pub tab: usize,
}

/// Resolves a menu position into the mode and tab it activates.
pub fn navigate(position: usize) -> Option<Transition> {
    MENU_TABS.get(position).map(|tab| Transition {
        mode: tab.mode,
        tab: position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn every_interactive_mode_has_exactly_one_tab() {
        for mode in AppMode::iter() {
            let tabs = MENU_TABS.iter().filter(|tab| tab.mode == mode).count();
            let expected = if mode == AppMode::Splash { 0 } else { 1 };
            assert_eq!(tabs, expected, "{mode}");
        }
    }

    #[test]
    fn navigate_pairs_mode_and_position() {
        assert_eq!(
            navigate(2),
            Some(Transition {
                mode: AppMode::Converter,
                tab: 2
            })
        );
        assert_eq!(navigate(4), None);
        for (position, tab) in MENU_TABS.iter().enumerate() {
            assert_eq!(tab.mode.tab(), Some(position));
        }
    }

    #[test]
    fn parse_rejects_unknown_modes() {
        assert_eq!("Validator".parse::<AppMode>().ok(), Some(AppMode::Validator));
        assert!("SplashScreen".parse::<AppMode>().is_err());
        assert!("welcome".parse::<AppMode>().is_err());
    }
}
