use serde::{Deserialize, Serialize};

use crate::dispatcher::Handled;
use crate::model::HandlerBinding;
use crate::resolver::Outcome;
use crate::shortcut_file::ShortcutEntry;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputRequest {
    pub input: String,
}

/// A choice made by the presentation layer's own chooser. `system` picks the
/// OS default for `routing_key` (or the input's own key when omitted).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplySelectionRequest {
    pub input: String,
    #[serde(default)]
    pub candidate_id: Option<String>,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub routing_key: Option<String>,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnbindRequest {
    pub routing_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FindShortcutsRequest {
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolveResponse {
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandledResponse {
    pub handled: Handled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnbindResponse {
    pub routing_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BindingsResponse {
    pub bindings: Vec<HandlerBinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShortcutDto {
    pub name: String,
    pub shortcut_path: String,
    pub target_path: String,
    pub icon_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShortcutsResponse {
    pub shortcuts: Vec<ShortcutDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload")]
pub enum CoreRequest {
    Resolve(InputRequest),
    Open(InputRequest),
    ApplySelection(ApplySelectionRequest),
    Unbind(UnbindRequest),
    ListBindings,
    FindShortcuts(FindShortcutsRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload")]
pub enum CoreResponse {
    Resolve(ResolveResponse),
    Open(HandledResponse),
    ApplySelection(HandledResponse),
    Unbind(UnbindResponse),
    ListBindings(BindingsResponse),
    FindShortcuts(ShortcutsResponse),
}

impl From<ShortcutEntry> for ShortcutDto {
    fn from(value: ShortcutEntry) -> Self {
        Self {
            name: value.name,
            shortcut_path: value.shortcut_path.to_string_lossy().into_owned(),
            target_path: value.target_path,
            icon_path: value
                .cached_icon_path
                .map(|path| path.to_string_lossy().into_owned()),
        }
    }
}
