//! Target-shape expansion.

use crate::ability::TargetShape;
use crate::combatant::CombatantState;
use crate::error::CombatError;
use crate::ids::CombatantId;
use rand::seq::SliceRandom;
use rand::Rng;

/// Expand a declared target shape into concrete live targets.
///
/// `allies` excludes the actor. A `preferred` target replaces the random
/// pick of single-target shapes when it is a live, legal target; group shapes
/// ignore it. An empty result is [`CombatError::InvalidTarget`].
pub fn resolve_targets<R: Rng + ?Sized>(
    shape: TargetShape,
    actor: &CombatantState,
    allies: &[&CombatantState],
    enemies: &[&CombatantState],
    preferred: Option<CombatantId>,
    rng: &mut R,
) -> Result<Vec<CombatantId>, CombatError> {
    let live_enemies: Vec<CombatantId> = enemies
        .iter()
        .filter(|c| c.is_alive())
        .map(|c| c.id())
        .collect();
    let mut friendly: Vec<CombatantId> = Vec::with_capacity(allies.len() + 1);
    if actor.is_alive() {
        friendly.push(actor.id());
    }
    friendly.extend(allies.iter().filter(|c| c.is_alive()).map(|c| c.id()));

    let targets = match shape {
        TargetShape::SelfOnly => vec![actor.id()],
        TargetShape::SingleEnemy | TargetShape::RandomEnemy => {
            pick_one(&live_enemies, preferred, rng).into_iter().collect()
        }
        TargetShape::SingleAlly => pick_one(&friendly, preferred, rng).into_iter().collect(),
        TargetShape::AllEnemies => live_enemies,
        TargetShape::AllAllies => friendly,
        TargetShape::All => {
            let mut all = friendly;
            all.extend(live_enemies);
            all
        }
    };

    if targets.is_empty() {
        return Err(CombatError::InvalidTarget);
    }
    Ok(targets)
}

fn pick_one<R: Rng + ?Sized>(
    pool: &[CombatantId],
    preferred: Option<CombatantId>,
    rng: &mut R,
) -> Option<CombatantId> {
    if let Some(p) = preferred {
        if pool.contains(&p) {
            return Some(p);
        }
    }
    pool.choose(rng).copied()
}
