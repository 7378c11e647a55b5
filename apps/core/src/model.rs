use serde::{Deserialize, Serialize};

/// Who services a routing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Owner {
    Plugin(String),
    /// The operating system's own default handler.
    System,
}

impl Owner {
    pub fn plugin(id: impl Into<String>) -> Self {
        Self::Plugin(id.into())
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }

    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            Self::Plugin(id) => Some(id),
            Self::System => None,
        }
    }

    pub(crate) fn from_column(value: Option<String>) -> Self {
        match value {
            Some(id) => Self::Plugin(id),
            None => Self::System,
        }
    }

    pub(crate) fn to_column(&self) -> Option<&str> {
        self.plugin_id()
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plugin(id) => write!(f, "{id}"),
            Self::System => write!(f, "<system>"),
        }
    }
}

/// The remembered handler choice for one routing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerBinding {
    pub routing_key: String,
    pub candidate_id: String,
    pub owner: Owner,
    pub last_checked_at: i64,
    pub previous_candidate_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerCandidate {
    pub candidate_id: String,
    pub routing_key: String,
    pub owner: Owner,
    pub description: String,
    /// Command line with positional `%0`, `%1`, ... placeholders.
    pub command_template: String,
    pub updated_at: i64,
}

pub const SYSTEM_CANDIDATE_PREFIX: &str = "system:";

impl HandlerCandidate {
    /// The "use the system default" entry a chooser offers next to real candidates.
    pub fn system(routing_key: &str) -> Self {
        let routing_key = normalize_routing_key(routing_key);
        Self {
            candidate_id: format!("{SYSTEM_CANDIDATE_PREFIX}{routing_key}"),
            routing_key,
            owner: Owner::System,
            description: "System default".to_string(),
            command_template: String::new(),
            updated_at: 0,
        }
    }
}

/// What the registration collaborator hands over when a handler claims a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRegistration {
    pub candidate_id: String,
    pub routing_key: String,
    pub owner: Owner,
    pub description: String,
    pub command_template: String,
}

impl CandidateRegistration {
    pub fn new(routing_key: &str, owner: Owner, command_template: &str) -> Self {
        Self {
            candidate_id: uuid::Uuid::new_v4().to_string(),
            routing_key: normalize_routing_key(routing_key),
            owner,
            description: String::new(),
            command_template: command_template.to_string(),
        }
    }

    pub fn with_candidate_id(mut self, candidate_id: &str) -> Self {
        self.candidate_id = candidate_id.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

pub fn normalize_routing_key(input: &str) -> String {
    input.trim().to_lowercase()
}
