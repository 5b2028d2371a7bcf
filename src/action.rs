//! Combat actions.

use crate::ids::{AbilityId, CombatantId};
use serde::{Deserialize, Serialize};

/// What an action does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Attack,
    Ability(AbilityId),
    Defend,
    Flee,
}

/// A chosen action, ready to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatAction {
    pub kind: ActionKind,
    pub source: CombatantId,
    pub targets: Vec<CombatantId>,
    /// Higher resolves first when several actions wait in the same tick.
    pub priority: i32,
}

impl CombatAction {
    pub const DEFEND_PRIORITY: i32 = 1;
    pub const FLEE_PRIORITY: i32 = 2;

    pub fn attack(source: CombatantId, target: CombatantId) -> Self {
        Self {
            kind: ActionKind::Attack,
            source,
            targets: vec![target],
            priority: 0,
        }
    }

    pub fn ability(source: CombatantId, ability: AbilityId, targets: Vec<CombatantId>) -> Self {
        Self {
            kind: ActionKind::Ability(ability),
            source,
            targets,
            priority: 0,
        }
    }

    pub fn defend(source: CombatantId) -> Self {
        Self {
            kind: ActionKind::Defend,
            source,
            targets: vec![source],
            priority: Self::DEFEND_PRIORITY,
        }
    }

    pub fn flee(source: CombatantId) -> Self {
        Self {
            kind: ActionKind::Flee,
            source,
            targets: Vec::new(),
            priority: Self::FLEE_PRIORITY,
        }
    }

    pub fn ability_id(&self) -> Option<&AbilityId> {
        match &self.kind {
            ActionKind::Ability(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_defend(&self) -> bool {
        self.kind == ActionKind::Defend
    }
}
