#![deny(warnings)]

//! Mod loading: building, institution and edict definitions from YAML.
//!
//! Each mod is a directory under the mods root holding `metadata.yaml` and
//! `definitions.yaml`. Mods load in directory-name order; later mods may
//! not redefine anything an earlier mod already defined.

use serde::Deserialize;
use sim_core::{
    validate_building, validate_edict, validate_institution, BuildingDefinition, EdictDefinition,
    Institution, ValidationError,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Definition schema version this engine understands.
pub const ENGINE_SCHEMA_VERSION: u32 = 1;

/// Metadata for a mod package.
#[derive(Debug, Clone, Deserialize)]
pub struct ModMeta {
    pub id: String,
    pub name: String,
    pub version: String,
    pub engine_schema_version: u32,
    pub compat: Option<String>,
}

#[derive(Debug, Error)]
pub enum ModError {
    #[error("invalid metadata: {0}")]
    InvalidMeta(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("yaml error in {path}: {message}")]
    Yaml { path: PathBuf, message: String },
    #[error("invalid definition in mod {module}: {source}")]
    Validation {
        module: String,
        #[source]
        source: ValidationError,
    },
}

impl From<std::io::Error> for ModError {
    fn from(e: std::io::Error) -> Self {
        ModError::Io(e.to_string())
    }
}

/// Contents of one `definitions.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefinitionFile {
    #[serde(default)]
    pub buildings: Vec<BuildingDefinition>,
    #[serde(default)]
    pub institutions: Vec<Institution>,
    #[serde(default)]
    pub edicts: Vec<EdictDefinition>,
}

/// Validated definitions merged across every loaded mod.
#[derive(Debug, Clone, Default)]
pub struct DefinitionPack {
    pub buildings: Vec<BuildingDefinition>,
    pub institutions: Vec<Institution>,
    pub edicts: Vec<EdictDefinition>,
}

impl DefinitionPack {
    /// Validate `file` and append its definitions. Nothing is appended if
    /// any definition is invalid or already present.
    pub fn merge(&mut self, file: DefinitionFile) -> Result<(), ValidationError> {
        let mut buildings: BTreeSet<&str> = self.buildings.iter().map(|b| b.name.as_str()).collect();
        for b in &file.buildings {
            validate_building(b)?;
            if !buildings.insert(&b.name) {
                return Err(ValidationError::Duplicate(format!("building {}", b.name)));
            }
        }
        let mut institutions: BTreeSet<_> = self.institutions.iter().map(|i| i.id).collect();
        for i in &file.institutions {
            validate_institution(i)?;
            if !institutions.insert(i.id) {
                return Err(ValidationError::Duplicate(format!("institution {}", i.id)));
            }
        }
        let mut edicts: BTreeSet<&str> = self.edicts.iter().map(|e| e.name.as_str()).collect();
        for e in &file.edicts {
            validate_edict(e)?;
            if !edicts.insert(&e.name) {
                return Err(ValidationError::Duplicate(format!("edict {}", e.name)));
            }
        }
        self.buildings.extend(file.buildings);
        self.institutions.extend(file.institutions);
        self.edicts.extend(file.edicts);
        Ok(())
    }

    /// Building definition by name.
    pub fn building(&self, name: &str) -> Option<&BuildingDefinition> {
        self.buildings.iter().find(|b| b.name == name)
    }

    /// Edict definition by name.
    pub fn edict(&self, name: &str) -> Option<&EdictDefinition> {
        self.edicts.iter().find(|e| e.name == name)
    }

    /// Whether no definition was loaded.
    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty() && self.institutions.is_empty() && self.edicts.is_empty()
    }
}

/// Loaded mod with metadata and directory.
#[derive(Debug, Clone)]
pub struct LoadedMod {
    pub meta: ModMeta,
    pub dir: PathBuf,
}

/// Discovers mods under a root directory and merges their definitions.
pub struct ModLoader {
    root: PathBuf,
    mods: Vec<LoadedMod>,
}

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ModError> {
    let text = fs::read_to_string(path)?;
    serde_yaml::from_str(&text).map_err(|e| ModError::Yaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

impl ModLoader {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            mods: vec![],
        }
    }

    /// Mods found by the last [`ModLoader::load_all`].
    pub fn mods(&self) -> &[LoadedMod] {
        &self.mods
    }

    /// Load every mod directory under the root, in name order.
    ///
    /// Directories without `metadata.yaml` are skipped; a mod without
    /// `definitions.yaml` contributes nothing.
    pub fn load_all(&mut self) -> Result<DefinitionPack, ModError> {
        let mut dirs = Vec::new();
        for ent in fs::read_dir(&self.root)? {
            let ent = ent?;
            if ent.file_type()?.is_dir() {
                dirs.push(ent.path());
            }
        }
        dirs.sort();

        self.mods.clear();
        let mut pack = DefinitionPack::default();
        for dir in dirs {
            let meta_path = dir.join("metadata.yaml");
            if !meta_path.exists() {
                debug!(dir = %dir.display(), "skipping directory without metadata");
                continue;
            }
            let meta: ModMeta = read_yaml(&meta_path)?;
            if meta.engine_schema_version != ENGINE_SCHEMA_VERSION {
                return Err(ModError::InvalidMeta(format!(
                    "{} targets schema {}, engine supports {}",
                    meta.id, meta.engine_schema_version, ENGINE_SCHEMA_VERSION
                )));
            }
            let defs_path = dir.join("definitions.yaml");
            if defs_path.exists() {
                let file: DefinitionFile = read_yaml(&defs_path)?;
                let counts = (file.buildings.len(), file.institutions.len(), file.edicts.len());
                pack.merge(file).map_err(|source| ModError::Validation {
                    module: meta.id.clone(),
                    source,
                })?;
                info!(
                    id = %meta.id,
                    version = %meta.version,
                    buildings = counts.0,
                    institutions = counts.1,
                    edicts = counts.2,
                    "mod loaded"
                );
            }
            self.mods.push(LoadedMod { meta, dir });
        }
        Ok(pack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sim_core::{ModifierKind, ResourceKind};

    fn base_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/mods")
    }

    #[test]
    fn base_mod_loads_and_validates() {
        let mut loader = ModLoader::new(base_root());
        let pack = loader.load_all().unwrap();
        assert!(!loader.mods().is_empty(), "no mods loaded from assets/mods");
        assert_eq!(loader.mods()[0].meta.id, "base");

        let farm = pack.building("Farm").expect("farm defined");
        assert!(farm.is_hub());
        assert_eq!(farm.max_production.get(&ResourceKind::Food), Some(&120));
        let mill = pack.building("Mill").expect("mill defined");
        assert!(mill.is_hublet());

        let levy = pack.edict("Grain Levy").expect("levy defined");
        let effect = levy.effect.expect("levy has an effect");
        assert_eq!(effect.kind, ModifierKind::TaxIncome);
        assert_eq!(effect.value, Decimal::new(1, 1));
        assert!(!pack.institutions.is_empty());
    }

    #[test]
    fn duplicates_are_rejected_without_partial_merge() {
        let yaml = r#"
buildings:
  - name: Well
    category: Housing
edicts:
  - name: Curfew
    category: Civic
    duration_months: 6
"#;
        let file: DefinitionFile = serde_yaml::from_str(yaml).unwrap();
        let mut pack = DefinitionPack::default();
        pack.merge(file.clone()).unwrap();
        assert_eq!(
            pack.merge(file),
            Err(ValidationError::Duplicate("building Well".into()))
        );
        assert_eq!(pack.buildings.len(), 1);
        assert_eq!(pack.edicts.len(), 1);
    }

    #[test]
    fn invalid_definitions_fail() {
        let yaml = r#"
edicts:
  - name: Forever
    category: Economic
    duration_months: 0
"#;
        let file: DefinitionFile = serde_yaml::from_str(yaml).unwrap();
        let mut pack = DefinitionPack::default();
        assert_eq!(
            pack.merge(file),
            Err(ValidationError::ZeroDuration("Forever".into()))
        );
        assert!(pack.is_empty());
    }

    #[test]
    fn missing_root_is_io_error() {
        let mut loader = ModLoader::new(base_root().join("does-not-exist"));
        assert!(matches!(loader.load_all(), Err(ModError::Io(_))));
    }
}
