//! Error types for combat and content operations.
//!
//! Combat errors are always recoverable: callers substitute a safe default
//! action or report a `false` sentinel. Content errors surface while a
//! catalog is being built, before any battle starts.

use crate::ids::{AbilityId, CombatantId, ModuleInstanceId};
use thiserror::Error;

/// Format a list of ids as a readable string.
fn format_ids(ids: &[String]) -> String {
    if ids.is_empty() {
        return String::from("(none)");
    }
    ids.join(", ")
}

/// Errors that can occur while selecting or resolving combat actions.
///
/// # Examples
///
/// ```rust
/// use zzcombat::CombatError;
///
/// let err = CombatError::InsufficientResource { needed: 12, available: 5 };
/// assert_eq!(err.to_string(), "Insufficient energy: needed 12, available 5");
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CombatError {
    /// The target list required by an action resolved to nothing.
    #[error("Invalid target: no live combatant matches")]
    InvalidTarget,

    /// Energy is below the ability cost.
    #[error("Insufficient energy: needed {needed}, available {available}")]
    InsufficientResource { needed: u32, available: u32 },

    /// The module backing an ability is overheated.
    #[error("Module {0} is overheated")]
    Overheated(ModuleInstanceId),

    /// A socket index is out of range or its level requirement is unmet.
    #[error("Illegal socket {index}: {reason}")]
    IllegalSocket { index: usize, reason: String },

    /// No action could be produced. The AI never returns this; it exists so
    /// external input collaborators can report it.
    #[error("No available action for combatant {0}")]
    NoAvailableAction(CombatantId),

    /// The combatant is not part of this battle.
    #[error("Unknown combatant: {0}")]
    UnknownCombatant(CombatantId),

    /// The combatant is not waiting for a command.
    #[error("Combatant {0} is not ready to act")]
    NotReady(CombatantId),

    /// The ability is not known to the combatant or the catalog.
    #[error("Unknown ability: {0}")]
    UnknownAbility(AbilityId),

    /// The ability is still cooling down.
    #[error("Ability {id} is on cooldown for {turns} more turn(s)")]
    OnCooldown { id: AbilityId, turns: u32 },

    /// An ability index past the end of the combatant's kit.
    #[error("No ability in slot {0}")]
    NoSuchAbilitySlot(usize),

    /// An input entry point was called while no combatant waits for input.
    #[error("No combatant is waiting for input")]
    NoPendingInput,
}

/// Errors raised while assembling a [`ContentCatalog`](crate::ContentCatalog).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContentError {
    /// Two definitions share the same id.
    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),

    /// A firmware threshold table is not strictly positive.
    #[error("Invalid firmware thresholds for module {0}")]
    InvalidThresholds(String),

    /// A definition references ids that are not in the catalog.
    #[error("Definition {owner} references unknown ids: {}", format_ids(.missing))]
    UnknownDefinition { owner: String, missing: Vec<String> },
}
