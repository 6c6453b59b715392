//! Derivation of a player's selectable workflow actions.
//!
//! The `defaultAction` select of a player's action form is computed, never authored: its
//! options are the built-in actions the player is permitted to take and has opted into, in a
//! fixed order, followed by the enabled custom permissions.

use portal_types::{
    ActionFormOptions, DEFAULT_ACTION_FIELD, FieldKind, FieldOption, FieldRecord, FieldType, OptionsConfig, Player, PlayerPermissions,
    Workflow,
    field::{dedupe_options, normalize::generate_field_id},
};
use tracing::debug;

/// Label of the synthesized `defaultAction` field.
pub const DEFAULT_ACTION_LABEL: &str = "Action";

/// Built-in workflow actions in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowAction {
    ForwardToPlayer,
    Sanction,
    ReturnToPlayer,
    ReturnToCitizen,
    Reject,
    Withhold,
    DirectWithheld,
}

impl WorkflowAction {
    /// Every built-in action, in the order options are generated.
    pub const ORDERED: [Self; 7] = [
        Self::ForwardToPlayer,
        Self::Sanction,
        Self::ReturnToPlayer,
        Self::ReturnToCitizen,
        Self::Reject,
        Self::Withhold,
        Self::DirectWithheld,
    ];

    /// Option value submitted when the action is chosen.
    pub fn value(&self) -> &'static str {
        match self {
            Self::ForwardToPlayer => "forwardToPlayer",
            Self::Sanction => "sanction",
            Self::ReturnToPlayer => "returnToPlayer",
            Self::ReturnToCitizen => "returnToCitizen",
            Self::Reject => "reject",
            Self::Withhold => "withhold",
            Self::DirectWithheld => "directWithheld",
        }
    }

    fn permitted(&self, permissions: &PlayerPermissions) -> bool {
        match self {
            Self::ForwardToPlayer => permissions.can_forward_to_player,
            Self::Sanction => permissions.can_sanction,
            Self::ReturnToPlayer => permissions.can_return_to_player,
            Self::ReturnToCitizen => permissions.can_return_to_citizen,
            Self::Reject => permissions.can_reject,
            Self::Withhold => permissions.can_withhold,
            Self::DirectWithheld => permissions.can_direct_withheld,
        }
    }

    fn opted_in(&self, options: &ActionFormOptions) -> bool {
        match self {
            Self::ForwardToPlayer => options.forward_to_player,
            Self::Sanction => options.sanction,
            Self::ReturnToPlayer => options.return_to_player,
            Self::ReturnToCitizen => options.return_to_citizen,
            Self::Reject => options.reject,
            Self::Withhold => options.withhold,
            Self::DirectWithheld => options.direct_withheld,
        }
    }

    fn label(&self, neighbours: &PlayerNeighbours<'_>) -> String {
        match self {
            Self::ForwardToPlayer => format!("Forward to {}", neighbours.next_designation.unwrap_or("Player")),
            Self::Sanction => "Sanction".to_string(),
            Self::ReturnToPlayer => format!("Return to {}", neighbours.previous_designation.unwrap_or("Player")),
            Self::ReturnToCitizen => "Return to Citizen".to_string(),
            Self::Reject => "Reject".to_string(),
            Self::Withhold => "Withhold".to_string(),
            Self::DirectWithheld => "Direct Withheld".to_string(),
        }
    }
}

/// Designations of the players around the one being generated, when resolvable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerNeighbours<'workflow> {
    pub next_designation: Option<&'workflow str>,
    pub previous_designation: Option<&'workflow str>,
}

impl<'workflow> PlayerNeighbours<'workflow> {
    /// Neighbours of the player at `index`, taken from adjacent positions.
    pub fn at(workflow: &'workflow Workflow, index: usize) -> Self {
        let previous = index.checked_sub(1).and_then(|previous| workflow.players.get(previous));
        Self {
            next_designation: workflow.players.get(index + 1).and_then(Player::designation),
            previous_designation: previous.and_then(Player::designation),
        }
    }
}

/// Options of the `defaultAction` field for `player` under `options`.
///
/// Each built-in action requires both the permission flag and the opt-in; custom permissions
/// follow in list order when enabled and opted into.
pub fn generate_action_options(player: &Player, options: &ActionFormOptions, neighbours: &PlayerNeighbours<'_>) -> Vec<FieldOption> {
    let built_in = WorkflowAction::ORDERED
        .iter()
        .filter(|action| action.permitted(&player.permissions) && action.opted_in(options))
        .map(|action| FieldOption::new(action.value(), action.label(neighbours)));

    let custom = player
        .custom_permissions
        .iter()
        .filter(|permission| permission.enabled && !permission.key.trim().is_empty() && options.custom_enabled(&permission.key))
        .map(|permission| {
            let label = if permission.label.trim().is_empty() {
                permission.key.clone()
            } else {
                permission.label.clone()
            };
            FieldOption::new(permission.key.clone(), label)
        });

    dedupe_options(built_in.chain(custom).collect())
}

/// Regenerates the `defaultAction` field of `player`.
///
/// The first existing field keeps its id, position and layout attributes but is reshaped
/// into a static select holding only the generated options; later fields with the same
/// name are dropped. Without one, a required, non-editable select is appended.
pub fn apply_action_form(mut player: Player, neighbours: &PlayerNeighbours<'_>) -> Player {
    let options = generate_action_options(&player, &player.action_form_options, neighbours);
    debug!(player_id = %player.id, action_count = options.len(), "regenerated action options");

    let field_count = player.action_form.len();
    let mut seen = false;
    player.action_form.retain(|field| field.name != DEFAULT_ACTION_FIELD || !std::mem::replace(&mut seen, true));
    if player.action_form.len() < field_count {
        debug!(player_id = %player.id, dropped = field_count - player.action_form.len(), "dropped duplicate defaultAction fields");
    }

    match player.action_form.iter_mut().find(|field| field.name == DEFAULT_ACTION_FIELD) {
        Some(field) => {
            field.label = DEFAULT_ACTION_LABEL.to_string();
            field.field_type = FieldType::Select;
            field.kind = FieldKind::Options(OptionsConfig {
                options,
                ..OptionsConfig::default()
            });
        }
        None => {
            let field = default_action_field(generate_field_id(), options);
            player.action_form.push(field);
        }
    }
    player
}

/// Regenerates the action form of every player using positional neighbours.
pub fn apply_workflow_action_forms(workflow: Workflow) -> Workflow {
    let neighbours: Vec<(Option<String>, Option<String>)> = (0..workflow.players.len())
        .map(|index| {
            let neighbours = PlayerNeighbours::at(&workflow, index);
            (
                neighbours.next_designation.map(str::to_string),
                neighbours.previous_designation.map(str::to_string),
            )
        })
        .collect();

    let Workflow { name, players } = workflow;
    let players = players
        .into_iter()
        .zip(neighbours)
        .map(|(player, (next, previous))| {
            let neighbours = PlayerNeighbours {
                next_designation: next.as_deref(),
                previous_designation: previous.as_deref(),
            };
            apply_action_form(player, &neighbours)
        })
        .collect();
    Workflow { name, players }
}

fn default_action_field(id: String, options: Vec<FieldOption>) -> FieldRecord {
    let mut field = FieldRecord::new(FieldType::Select);
    field.id = id;
    field.name = DEFAULT_ACTION_FIELD.to_string();
    field.label = DEFAULT_ACTION_LABEL.to_string();
    field.required = true;
    field.editable = false;
    if let Some(config) = field.options_config_mut() {
        config.options = options;
    }
    field
}
