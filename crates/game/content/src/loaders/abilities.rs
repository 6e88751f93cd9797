//! Ability catalog loader.
//!
//! Loads ability definitions from RON files into an [`AbilityCatalog`].

use std::path::Path;

use game_core::def::AbilityDefinition;

use crate::catalog::AbilityCatalog;
use crate::loaders::{LoadResult, read_file};

/// Loader for ability catalogs from RON files.
pub struct AbilityLoader;

impl AbilityLoader {
    /// Load an ability catalog from a RON file.
    ///
    /// RON format: `Vec<AbilityDefinition>`. Duplicate ids are a content
    /// error, reported rather than silently last-wins.
    pub fn load(path: &Path) -> LoadResult<AbilityCatalog> {
        let content = read_file(path)?;
        Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Failed to load ability catalog {}: {}", path.display(), e))
    }

    /// Parse a RON catalog from a string.
    pub fn parse(content: &str) -> LoadResult<AbilityCatalog> {
        let defs: Vec<AbilityDefinition> = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse ability catalog RON: {}", e))?;

        let mut catalog = AbilityCatalog::new();
        for def in defs {
            let id = def.id;
            let name = def.name.clone();
            if let Some(previous) = catalog.insert(def) {
                anyhow::bail!(
                    "Duplicate ability id {:?}: '{}' and '{}'",
                    id,
                    previous.name,
                    name
                );
            }
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_core::def::{AbilityId, TargetingShape};
    use std::io::Write;

    fn sample_catalog() -> Vec<AbilityDefinition> {
        let mut bolt = AbilityDefinition::new(AbilityId(1), "fire-bolt");
        bolt.range = 300.0;
        bolt.cooldown.base_ms = 5000;
        bolt.damage.base[0] = 40.0;

        let mut nova = AbilityDefinition::new(AbilityId(2), "frost-nova");
        nova.style.shape = TargetingShape::CircleArea;
        nova.style.needs_target = false;
        nova.style.aoe_centered_on_user = true;
        nova.radius = 120.0;

        vec![bolt, nova]
    }

    #[test]
    fn load_round_trips_a_serialized_catalog() {
        let text = ron::to_string(&sample_catalog()).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();

        let catalog = AbilityLoader::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        let bolt = catalog.get_by_name("fire-bolt").unwrap();
        assert_eq!(bolt.cooldown.base_ms, 5000);
        assert_eq!(
            catalog.get(AbilityId(2)).unwrap().style.shape,
            TargetingShape::CircleArea
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut defs = sample_catalog();
        defs.push(AbilityDefinition::new(AbilityId(1), "impostor"));
        let text = ron::to_string(&defs).unwrap();

        let err = AbilityLoader::parse(&text).unwrap_err();
        assert!(err.to_string().contains("Duplicate ability id"));
    }

    #[test]
    fn missing_file_is_a_readable_error() {
        let err = AbilityLoader::load(Path::new("/nonexistent/abilities.ron")).unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }
}
