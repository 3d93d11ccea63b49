//! Observations — what an NPC perceives at the start of a turn.
//!
//! An observation is a loose JSON event from the game.  Only a handful of
//! fields are interpreted; everything under `details` is carried along and
//! scanned for reflection signals.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A game event seen by an NPC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Event category (`dialogue`, `combat`, `quest_completed`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Who acted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Who or what was acted upon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// What happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Where it happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Free-form event details.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

fn present(field: Option<&String>) -> Option<&str> {
    field.map(String::as_str).filter(|s| !s.is_empty())
}

impl Observation {
    /// An observation with only an event type.
    #[must_use]
    pub fn of_type(event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            ..Self::default()
        }
    }

    /// Natural-language summary, e.g.
    /// `player_1 asks about the ring to/with npc_1 at tavern (mood: tense)`.
    ///
    /// Only scalar detail values are rendered.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        match self.actor.as_deref() {
            None => parts.push("unknown".into()),
            Some("") => {}
            Some(actor) => parts.push(actor.into()),
        }
        parts.push(self.action.clone().unwrap_or_else(|| "did something".into()));
        if let Some(target) = present(self.target.as_ref()) {
            parts.push(format!("to/with {target}"));
        }
        if let Some(location) = present(self.location.as_ref()) {
            parts.push(format!("at {location}"));
        }
        let details: Vec<String> = self
            .details
            .iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some(format!("{key}: {s}")),
                Value::Number(n) => Some(format!("{key}: {n}")),
                Value::Bool(b) => Some(format!("{key}: {b}")),
                _ => None,
            })
            .collect();
        if !details.is_empty() {
            parts.push(format!("({})", details.join(", ")));
        }
        parts.join(" ")
    }

    /// The event type, if set.
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    /// A string detail by key.
    #[must_use]
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }

    /// Emotion reported in `details.emotion`.
    #[must_use]
    pub fn observed_emotion(&self) -> Option<&str> {
        self.detail_str("emotion")
    }

    fn details_text(&self) -> String {
        Value::Object(self.details.clone()).to_string().to_lowercase()
    }

    /// Whether the details signal a change in a relationship.
    #[must_use]
    pub fn relationship_changed(&self) -> bool {
        self.details.contains_key("relationship") || self.details_text().contains("relation")
    }

    /// Whether the event concerns a quest.
    #[must_use]
    pub fn quest_changed(&self) -> bool {
        self.event_type() == Some("quest_completed") || self.details_text().contains("quest")
    }
}
