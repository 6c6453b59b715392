//! Workflow players: the roles an application passes through and the action form each of
//! them uses to move it along.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::field::FieldRecord;

/// Name of the derived select field that lists a player's selectable actions.
pub const DEFAULT_ACTION_FIELD: &str = "defaultAction";

/// Ordered list of players; position determines the next and previous player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Workflow {
    pub name: Option<String>,
    pub players: Vec<Player>,
}

/// A workflow participant role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Player {
    pub id: String,
    /// Officer designation shown in Forward / Return labels of neighbouring players.
    pub designation: Option<String>,
    #[serde(flatten)]
    pub permissions: PlayerPermissions,
    /// Additional named permissions, in display order.
    pub custom_permissions: Vec<CustomPermission>,
    /// Per-action opt-ins narrowing which permitted actions appear.
    pub action_form_options: ActionFormOptions,
    /// Fields of the "take action" dialog.
    pub action_form: Vec<FieldRecord>,
}

impl Player {
    /// The derived `defaultAction` field, when present.
    pub fn default_action_field(&self) -> Option<&FieldRecord> {
        self.action_form.iter().find(|field| field.name == DEFAULT_ACTION_FIELD)
    }

    /// Designation, when set and not blank.
    pub fn designation(&self) -> Option<&str> {
        self.designation.as_deref().map(str::trim).filter(|designation| !designation.is_empty())
    }
}

/// Built-in permission flags of a player.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerPermissions {
    pub can_forward_to_player: bool,
    pub can_sanction: bool,
    pub can_return_to_player: bool,
    pub can_return_to_citizen: bool,
    pub can_reject: bool,
    pub can_withhold: bool,
    pub can_direct_withheld: bool,
}

/// A named permission beyond the built-in flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomPermission {
    /// Stable key, used as the option value and as the opt-in key.
    pub key: String,
    pub label: String,
    pub enabled: bool,
}

/// Opt-ins that decide which permitted actions are actually offered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionFormOptions {
    pub forward_to_player: bool,
    pub sanction: bool,
    pub return_to_player: bool,
    pub return_to_citizen: bool,
    pub reject: bool,
    pub withhold: bool,
    pub direct_withheld: bool,
    /// Opt-in per custom permission key.
    pub custom: IndexMap<String, bool>,
}

impl ActionFormOptions {
    pub fn custom_enabled(&self, key: &str) -> bool {
        self.custom.get(key).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_player_with_flat_permissions() {
        let json_text = r#"{
            "id": "clerk",
            "designation": "Village Officer",
            "canSanction": true,
            "canForwardToPlayer": true,
            "customPermissions": [{ "key": "fieldVisit", "label": "Field Visit", "enabled": true }],
            "actionFormOptions": { "sanction": true, "custom": { "fieldVisit": true } },
            "actionForm": [{ "name": "remarks", "type": "text" }]
        }"#;
        let player: Player = serde_json::from_str(json_text).expect("deserialize player");
        assert!(player.permissions.can_sanction);
        assert!(!player.permissions.can_reject);
        assert!(player.action_form_options.custom_enabled("fieldVisit"));
        assert!(!player.action_form_options.custom_enabled("unknown"));
        assert_eq!(player.action_form.len(), 1);
        assert!(player.default_action_field().is_none());
        assert_eq!(player.designation(), Some("Village Officer"));
    }
}
