//! The ability catalog: every definition the engine can activate.

use std::collections::BTreeMap;

use game_core::def::{AbilityDefinition, AbilityId};
use game_core::env::DefinitionOracle;

/// Immutable id-keyed store of ability definitions.
///
/// Built once by the loaders (or by hand in tests) and consulted by the
/// engine through [`DefinitionOracle`]. Name lookup exists for tooling
/// and content validation; the hot path is always by id.
#[derive(Debug, Default)]
pub struct AbilityCatalog {
    by_id: BTreeMap<AbilityId, AbilityDefinition>,
    names: BTreeMap<String, AbilityId>,
}

impl AbilityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition. Returns the definition previously registered
    /// under the same id, if any.
    pub fn insert(&mut self, def: AbilityDefinition) -> Option<AbilityDefinition> {
        self.names.insert(def.name.clone(), def.id);
        self.by_id.insert(def.id, def)
    }

    pub fn get(&self, id: AbilityId) -> Option<&AbilityDefinition> {
        self.by_id.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&AbilityDefinition> {
        self.names.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AbilityDefinition> {
        self.by_id.values()
    }
}

impl FromIterator<AbilityDefinition> for AbilityCatalog {
    fn from_iter<I: IntoIterator<Item = AbilityDefinition>>(iter: I) -> Self {
        let mut catalog = AbilityCatalog::new();
        for def in iter {
            catalog.insert(def);
        }
        catalog
    }
}

impl DefinitionOracle for AbilityCatalog {
    fn ability(&self, id: AbilityId) -> Option<&AbilityDefinition> {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id_and_name() {
        let catalog: AbilityCatalog = [
            AbilityDefinition::new(AbilityId(1), "fire-bolt"),
            AbilityDefinition::new(AbilityId(2), "frost-nova"),
        ]
        .into_iter()
        .collect();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(AbilityId(1)).unwrap().name, "fire-bolt");
        assert_eq!(catalog.get_by_name("frost-nova").unwrap().id, AbilityId(2));
        assert!(catalog.get(AbilityId(3)).is_none());
    }

    #[test]
    fn reinsert_replaces_the_definition() {
        let mut catalog = AbilityCatalog::new();
        catalog.insert(AbilityDefinition::new(AbilityId(1), "fire-bolt"));
        let old = catalog.insert(AbilityDefinition::new(AbilityId(1), "fire-bolt-v2"));
        assert_eq!(old.unwrap().name, "fire-bolt");
        assert_eq!(catalog.get_by_name("fire-bolt-v2").unwrap().id, AbilityId(1));
    }
}
