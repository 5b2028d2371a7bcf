//! Identifier types.
//!
//! Content ids (abilities, module definitions, species) are interned strings
//! backed by `Arc<str>` so they are cheap to clone and compare. Runtime ids
//! (combatants, module instances, creatures) are plain integers handed out by
//! an injected [`IdGenerator`], never by a process-wide counter.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

macro_rules! interned_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Create a new id from a string slice.
            pub fn new(s: &str) -> Self {
                Self(Arc::from(s))
            }

            /// Get the string representation of this id.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(Arc::from(s))
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                self.0.as_ref().serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok(Self::from(s))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

interned_id!(
    /// Identifier of an ability definition in the content catalog.
    ///
    /// ```rust
    /// use zzcombat::ids::AbilityId;
    ///
    /// let a: AbilityId = "flare".into();
    /// assert_eq!(a, AbilityId::new("flare"));
    /// assert_eq!(a.as_str(), "flare");
    /// ```
    AbilityId
);

interned_id!(
    /// Identifier of a resource module definition.
    ModuleDefId
);

interned_id!(
    /// Identifier of a creature species.
    SpeciesId
);

/// Identifier of a combatant within one battle.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatantId(pub u32);

/// Identifier of a persistent resource module instance.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleInstanceId(pub u64);

/// Identifier of a persistent creature.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreatureId(pub u64);

impl std::fmt::Display for CombatantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl std::fmt::Display for ModuleInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "module-{}", self.0)
    }
}

impl std::fmt::Display for CreatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "creature-{}", self.0)
    }
}

/// Source of fresh runtime ids.
///
/// Injected wherever new instances are minted so simulations stay
/// reproducible and tests can run in parallel.
pub trait IdGenerator: std::fmt::Debug {
    /// Produce the next raw id.
    fn next_raw(&mut self) -> u64;

    /// Combatant ids are 32-bit; the raw id is truncated.
    fn next_combatant_id(&mut self) -> CombatantId {
        CombatantId(self.next_raw() as u32)
    }

    fn next_module_id(&mut self) -> ModuleInstanceId {
        ModuleInstanceId(self.next_raw())
    }

    fn next_creature_id(&mut self) -> CreatureId {
        CreatureId(self.next_raw())
    }
}

/// Deterministic generator counting up from a starting value.
///
/// # Examples
///
/// ```rust
/// use zzcombat::ids::{IdGenerator, SequentialIds};
///
/// let mut ids = SequentialIds::starting_at(10);
/// assert_eq!(ids.next_raw(), 10);
/// assert_eq!(ids.next_raw(), 11);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }
}

impl IdGenerator for SequentialIds {
    fn next_raw(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}
