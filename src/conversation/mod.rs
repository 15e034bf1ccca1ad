//! Conversation types

use chrono::{DateTime, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Greeting every session starts with
pub const WELCOME_MESSAGE: &str = "Welcome to HistoryAI! I'm here to help you explore the foundations of computing through conversations with historical AI pioneers. Ask me anything about computing history!";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Empty assistant message that a reveal fills in word by word
    pub fn placeholder() -> Self {
        Self::assistant(String::new())
    }

    pub fn welcome() -> Self {
        Self::assistant(WELCOME_MESSAGE)
    }

    /// Local wall-clock time of the message, e.g. `4:32 PM`
    pub fn display_time(&self) -> String {
        format_clock(&self.timestamp.with_timezone(&Local))
    }
}

/// 12-hour clock rendering with zero-padded minutes
pub fn format_clock<T: Timelike>(time: &T) -> String {
    let hour = time.hour();
    let meridiem = if hour >= 12 { "PM" } else { "AM" };
    let hour12 = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", hour12, time.minute(), meridiem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(&at(16, 32)), "4:32 PM");
        assert_eq!(format_clock(&at(9, 5)), "9:05 AM");
        assert_eq!(format_clock(&at(0, 0)), "12:00 AM");
        assert_eq!(format_clock(&at(12, 7)), "12:07 PM");
    }

    #[test]
    fn test_welcome_is_assistant() {
        let message = Message::welcome();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, WELCOME_MESSAGE);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(Message::user("a").id, Message::user("a").id);
    }
}
