use serde::{Deserialize, Serialize};

/// User known by the directory.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// How the user is shown on-screen.
    pub display_name: String,
}

impl User {
    /// Create a new [`User`] displayed by its username.
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            display_name: username.clone(),
            username,
        }
    }

    /// Update `display_name` of [`User`]. Empty names are ignored.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        if !display_name.is_empty() {
            self.display_name = display_name;
        }
        self
    }

    pub fn real_name(&self) -> &str {
        &self.display_name
    }

    /// Properties of a [`User`] and what they hold, one `name: description`
    /// per line.
    pub fn describe_metadata() -> String {
        METADATA
            .iter()
            .map(|(name, description)| format!("{name}: {description}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

const METADATA: [(&str, &str); 2] = [
    ("username", "Login name in the directory."),
    ("display_name", "How the user is shown on-screen."),
];
