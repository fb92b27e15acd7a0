//! Shared domain enumerations aligned with persisted database enums.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "event_mode", rename_all = "snake_case")]
pub enum EventMode {
    Online,
    Offline,
}

impl EventMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EventMode::Online => "online",
            EventMode::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "event_category", rename_all = "snake_case")]
pub enum EventCategory {
    Seminar,
    Webinar,
    Workshop,
    Hackathon,
    #[default]
    Other,
}

impl EventCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::Seminar => "seminar",
            EventCategory::Webinar => "webinar",
            EventCategory::Workshop => "workshop",
            EventCategory::Hackathon => "hackathon",
            EventCategory::Other => "other",
        }
    }
}

impl FromStr for EventCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "seminar" => Ok(EventCategory::Seminar),
            "webinar" => Ok(EventCategory::Webinar),
            "workshop" => Ok(EventCategory::Workshop),
            "hackathon" => Ok(EventCategory::Hackathon),
            "other" => Ok(EventCategory::Other),
            other => Err(format!("unknown event category `{other}`")),
        }
    }
}
