//! Character roster
//!
//! The historical figures a user can talk to. The roster is built in, or
//! loaded from a TOML file:
//!
//! ```toml
//! default = "Alan Turing"
//!
//! [[character]]
//! name = "Alan Turing"
//! avatar = "alan-turing.png"
//! bio = "English mathematician and codebreaker..."
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::ConfigError;

/// Display profile of a character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub name: String,

    #[serde(default)]
    pub bio: String,

    /// Avatar image file, resolved by the front-end
    #[serde(default)]
    pub avatar: Option<String>,
}

/// The set of selectable characters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterRoster {
    /// Name of the profile shown for unknown identities
    #[serde(default)]
    pub default: Option<String>,

    #[serde(rename = "character", default)]
    characters: Vec<CharacterProfile>,
}

impl CharacterRoster {
    /// Load a roster from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load a roster from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let roster: CharacterRoster = toml::from_str(content)?;
        roster.validate()?;
        Ok(roster)
    }

    /// Alan Turing, Ada Lovelace and John von Neumann
    pub fn builtin() -> Self {
        let profile = |name: &str, avatar: &str, bio: &str| CharacterProfile {
            name: name.to_string(),
            bio: bio.to_string(),
            avatar: Some(avatar.to_string()),
        };

        Self {
            default: Some(builtin::ALAN_TURING.to_string()),
            characters: vec![
                profile(builtin::ALAN_TURING, "alan-turing.png", builtin::ALAN_TURING_BIO),
                profile(builtin::ADA_LOVELACE, "ada-lovelace.png", builtin::ADA_LOVELACE_BIO),
                profile(
                    builtin::JOHN_VON_NEUMANN,
                    "john-von-neumann.png",
                    builtin::JOHN_VON_NEUMANN_BIO,
                ),
            ],
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.characters.is_empty() {
            return Err(ConfigError::Validation(
                "character roster is empty".into(),
            ));
        }
        if let Some(default) = &self.default {
            if self.get(default).is_none() {
                return Err(ConfigError::Validation(format!(
                    "default character '{}' is not in the roster",
                    default
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CharacterProfile> {
        self.characters.iter().find(|c| c.name == name)
    }

    /// Profile for `name`, falling back to the default character
    pub fn resolve(&self, name: &str) -> &CharacterProfile {
        self.get(name).unwrap_or_else(|| self.default_profile())
    }

    pub fn default_profile(&self) -> &CharacterProfile {
        self.default
            .as_deref()
            .and_then(|name| self.get(name))
            .unwrap_or(&self.characters[0])
    }

    pub fn names(&self) -> Vec<&str> {
        self.characters.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn profiles(&self) -> &[CharacterProfile] {
        &self.characters
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }
}

/// Built-in characters that don't require files
pub mod builtin {
    pub const ALAN_TURING: &str = "Alan Turing";
    pub const ADA_LOVELACE: &str = "Ada Lovelace";
    pub const JOHN_VON_NEUMANN: &str = "John von Neumann";

    pub const ALAN_TURING_BIO: &str = "Alan Turing was an English mathematician and codebreaker whose work on universal computing machines, wartime codebreaking of Enigma, and early ideas about machine intelligence laid the foundations of modern computer science and AI.";

    pub const ADA_LOVELACE_BIO: &str = "Ada Lovelace was a 19th-century English mathematician who collaborated with Charles Babbage on his Analytical Engine and is often regarded as the first computer programmer for her visionary notes on what the machine could do.";

    pub const JOHN_VON_NEUMANN_BIO: &str = "John von Neumann was a Hungarian-American mathematician and polymath who helped define the stored-program computer architecture, made pioneering contributions to game theory, and worked on quantum mechanics and nuclear physics.";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roster() {
        let toml_content = r#"
default = "Grace Hopper"

[[character]]
name = "Grace Hopper"
avatar = "grace-hopper.png"
bio = "Pioneer of compilers."

[[character]]
name = "Claude Shannon"
"#;

        let roster = CharacterRoster::from_str(toml_content).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.names(), vec!["Grace Hopper", "Claude Shannon"]);

        let shannon = roster.get("Claude Shannon").unwrap();
        assert!(shannon.bio.is_empty());
        assert!(shannon.avatar.is_none());
    }

    #[test]
    fn test_unknown_character_falls_back_to_default() {
        let roster = CharacterRoster::builtin();
        assert_eq!(roster.resolve("Charles Babbage").name, builtin::ALAN_TURING);
        assert_eq!(roster.resolve(builtin::ADA_LOVELACE).name, builtin::ADA_LOVELACE);
    }

    #[test]
    fn test_missing_default_uses_first_entry() {
        let roster = CharacterRoster::from_str(
            r#"
[[character]]
name = "Konrad Zuse"
"#,
        )
        .unwrap();
        assert_eq!(roster.resolve("nobody").name, "Konrad Zuse");
    }

    #[test]
    fn test_empty_roster_rejected() {
        let result = CharacterRoster::from_str("default = \"Alan Turing\"");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_default_must_exist() {
        let result = CharacterRoster::from_str(
            r#"
default = "Nobody"

[[character]]
name = "Alan Turing"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
