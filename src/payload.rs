use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bot gender, encoded on the wire as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Gender {
    Male,
    #[default]
    Female,
}

impl From<Gender> for u8 {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => 0,
            Gender::Female => 1,
        }
    }
}

impl TryFrom<u8> for Gender {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Gender::Male),
            1 => Ok(Gender::Female),
            other => Err(format!("unknown gender value: {}", other)),
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// Immutable descriptors of a bot, copied into every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotProfile {
    pub name: String,
    pub gender: Gender,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub birthdate: DateTime<Utc>,
    pub favorite_color: String,
    pub father_name: String,
    pub father_age: u32,
    pub mother_name: String,
    pub mother_age: u32,
}

impl Default for BotProfile {
    fn default() -> Self {
        Self {
            name: "Emma".into(),
            gender: Gender::Female,
            // 1996-01-01T00:00:00Z
            birthdate: DateTime::from_timestamp(820_454_400, 0).unwrap_or_default(),
            favorite_color: "red".into(),
            father_name: "Peter".into(),
            father_age: 50,
            mother_name: "Helena".into(),
            mother_age: 50,
        }
    }
}

/// Mutable conversational state of a bot. Supplied fresh with every request
/// and updated from every reply by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BotState {
    pub mood: f64,
    pub affection: f64,
    pub pattern: Option<i64>,
}

impl Default for BotState {
    fn default() -> Self {
        Self {
            mood: 1.0,
            affection: 1.0,
            pattern: None,
        }
    }
}

impl BotState {
    /// Take over mood, affection and pattern from a reply.
    pub fn apply(&mut self, response: &ResponsePayload) {
        self.mood = response.mood;
        self.affection = response.affection;
        self.pattern = response.pattern;
    }
}

/// One conversational turn sent to a worker process as a single JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_pattern: Option<i64>,
    pub mood: f64,
    pub affection: f64,
    pub bot_gender: Gender,
    pub bot_name: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub bot_birthdate: DateTime<Utc>,
    pub bot_favorite_color: String,
    pub father_name: String,
    pub father_age: u32,
    pub mother_name: String,
    pub mother_age: u32,
}

impl RequestPayload {
    pub fn new(text: impl Into<String>, profile: &BotProfile, state: &BotState) -> Self {
        Self {
            text: text.into(),
            previous_pattern: state.pattern,
            mood: state.mood,
            affection: state.affection,
            bot_gender: profile.gender,
            bot_name: profile.name.clone(),
            bot_birthdate: profile.birthdate,
            bot_favorite_color: profile.favorite_color.clone(),
            father_name: profile.father_name.clone(),
            father_age: profile.father_age,
            mother_name: profile.mother_name.clone(),
            mother_age: profile.mother_age,
        }
    }

    /// The fallback answer for this request: the given neutral text with
    /// mood and affection echoed back unchanged.
    pub fn fallback_response(&self, text: &str) -> ResponsePayload {
        ResponsePayload::fallback(text, self.mood, self.affection)
    }
}

/// A generated reply read back from a worker process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<i64>,
    pub mood: f64,
    pub affection: f64,
}

impl ResponsePayload {
    pub fn fallback(text: impl Into<String>, mood: f64, affection: f64) -> Self {
        Self {
            text: text.into(),
            pattern: None,
            mood,
            affection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_encodes_as_integer() {
        assert_eq!(serde_json::to_string(&Gender::Male).unwrap(), "0");
        assert_eq!(serde_json::to_string(&Gender::Female).unwrap(), "1");
        assert!(serde_json::from_str::<Gender>("2").is_err());
    }

    #[test]
    fn request_uses_wire_field_names() {
        let state = BotState {
            mood: 0.25,
            affection: 0.5,
            pattern: Some(7),
        };
        let request = RequestPayload::new("hallo", &BotProfile::default(), &state);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["text"], "hallo");
        assert_eq!(value["previous_pattern"], 7);
        assert_eq!(value["bot_gender"], 1);
        assert_eq!(value["bot_name"], "Emma");
        assert_eq!(value["bot_birthdate"], 820_454_400);
        assert_eq!(value["bot_favorite_color"], "red");
        assert_eq!(value["father_age"], 50);
        assert_eq!(value["mother_name"], "Helena");
    }

    #[test]
    fn absent_pattern_is_omitted() {
        let request = RequestPayload::new("hi", &BotProfile::default(), &BotState::default());
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("previous_pattern"));

        let response = ResponsePayload::fallback("Ok", 0.1, 0.2);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("pattern"));
    }

    #[test]
    fn response_parses_without_pattern() {
        let response: ResponsePayload =
            serde_json::from_str(r#"{"text":"na?","mood":0.3,"affection":0.9}"#).unwrap();
        assert_eq!(response.text, "na?");
        assert_eq!(response.pattern, None);
        assert!((response.mood - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn state_applies_reply() {
        let mut state = BotState::default();
        state.apply(&ResponsePayload {
            text: "schön".into(),
            pattern: Some(3),
            mood: 0.6,
            affection: 0.4,
        });
        assert_eq!(state.pattern, Some(3));
        assert!((state.mood - 0.6).abs() < f64::EPSILON);
        assert!((state.affection - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn fallback_echoes_request_state() {
        let state = BotState {
            mood: 0.4,
            affection: 0.7,
            pattern: Some(1),
        };
        let request = RequestPayload::new("x", &BotProfile::default(), &state);
        let fallback = request.fallback_response("Ok");
        assert_eq!(fallback, ResponsePayload::fallback("Ok", 0.4, 0.7));
    }
}
