use std::fmt;

use eeg2bids::session::{AppMode, Change};
use serde::{
    de::{self, Deserializer, Visitor},
    Deserialize,
};
use serde_json::Value;

/// LORIS lookups the backend answers with a list of names.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LorisList {
    Sites,
    Projects,
    Subprojects,
    Visits,
}

impl LorisList {
    pub const ALL: [LorisList; 4] = [
        LorisList::Sites,
        LorisList::Projects,
        LorisList::Subprojects,
        LorisList::Visits,
    ];

    /// The backend event carrying this list.
    pub fn event(&self) -> &'static str {
        match self {
            LorisList::Sites => "loris_sites",
            LorisList::Projects => "loris_projects",
            LorisList::Subprojects => "loris_subprojects",
            LorisList::Visits => "loris_visits",
        }
    }

    /// Where the list is kept in the task record.
    pub fn task_key(&self) -> &'static str {
        match self {
            LorisList::Sites => "lorisSites",
            LorisList::Projects => "lorisProjects",
            LorisList::Subprojects => "lorisSubprojects",
            LorisList::Visits => "lorisVisits",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Tick,
    Render,
    Resize(u16, u16),
    Suspend,
    Resume,
    Quit,
    Error(String),
    Navigate(usize),
    NextTab,
    PreviousTab,
    SwitchMode(AppMode),
    ToggleCredentials,
    Changed(Change),
    LorisLogin(Value),
    EdfData(Value),
    LorisOptions(LorisList, Value),
    BidsMetadata(Value),
    CandidateCreated(Value),
    BidsCreated(Value),
    ValidationResult(Value),
}

impl Action {
    /// Actions that move between screens.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Action::Navigate(_) | Action::NextTab | Action::PreviousTab | Action::SwitchMode(_)
        )
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ActionVisitor;

        impl<'de> Visitor<'de> for ActionVisitor {
            type Value = Action;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a valid string representation of Action")
            }

            fn visit_str<E>(self, value: &str) -> Result<Action, E>
            where
                E: de::Error,
            {
                match value {
                    "Tick" => Ok(Action::Tick),
                    "Render" => Ok(Action::Render),
                    "Suspend" => Ok(Action::Suspend),
                    "Resume" => Ok(Action::Resume),
                    "Quit" => Ok(Action::Quit),
                    "NextTab" => Ok(Action::NextTab),
                    "PreviousTab" => Ok(Action::PreviousTab),
                    "ToggleCredentials" => Ok(Action::ToggleCredentials),
                    data if data.starts_with("Navigate(") => {
                        let position = data.trim_start_matches("Navigate(").trim_end_matches(')');
                        let position: usize = position.trim().parse().map_err(E::custom)?;
                        Ok(Action::Navigate(position))
                    }
                    data if data.starts_with("SwitchMode(") => {
                        let mode = data.trim_start_matches("SwitchMode(").trim_end_matches(')');
                        mode.parse::<AppMode>()
                            .map(Action::SwitchMode)
                            .map_err(E::custom)
                    }
                    data if data.starts_with("Error(") => {
                        let error_msg = data.trim_start_matches("Error(").trim_end_matches(')');
                        Ok(Action::Error(error_msg.to_string()))
                    }
                    data if data.starts_with("Resize(") => {
                        let parts: Vec<&str> = data
                            .trim_start_matches("Resize(")
                            .trim_end_matches(')')
                            .split(',')
                            .collect();
                        if parts.len() == 2 {
                            let width: u16 = parts[0].trim().parse().map_err(E::custom)?;
                            let height: u16 = parts[1].trim().parse().map_err(E::custom)?;
                            Ok(Action::Resize(width, height))
                        } else {
                            Err(E::custom(format!("Invalid Resize format: {}", value)))
                        }
                    }
                    _ => Err(E::custom(format!("Unknown Action variant: {}", value))),
                }
            }
        }

        deserializer.deserialize_str(ActionVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(raw: &str) -> Result<Action, serde_json::Error> {
        serde_json::from_value(Value::String(raw.to_string()))
    }

    #[test]
    fn parses_parameterised_actions() {
        assert_eq!(parse("Navigate(2)").unwrap(), Action::Navigate(2));
        assert_eq!(
            parse("SwitchMode(Validator)").unwrap(),
            Action::SwitchMode(AppMode::Validator)
        );
        assert_eq!(parse("Resize(80, 24)").unwrap(), Action::Resize(80, 24));
    }

    #[test]
    fn rejects_unknown_modes_and_actions() {
        assert!(parse("SwitchMode(Settings)").is_err());
        assert!(parse("Navigate(x)").is_err());
        assert!(parse("Help").is_err());
        assert!(parse("Refresh").is_err());
    }
}
