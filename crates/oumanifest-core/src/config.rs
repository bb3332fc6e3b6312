//! Manifest configuration types.

use std::path::Path;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoEnumIterator};

use crate::error::ManifestError;
use crate::record::FileKind;

/// Which file kinds are written to the manifest.
///
/// Kinds missing from a JSON config are not selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default = "KindFilter::none")]
pub struct KindFilter {
    pub regular: bool,
    pub directory: bool,
    pub character: bool,
    pub block: bool,
    pub symlink: bool,
    pub fifo: bool,
}

impl KindFilter {
    /// Select every kind.
    pub fn all() -> Self {
        Self {
            regular: true,
            directory: true,
            character: true,
            block: true,
            symlink: true,
            fifo: true,
        }
    }

    /// Select nothing.
    pub fn none() -> Self {
        Self {
            regular: false,
            directory: false,
            character: false,
            block: false,
            symlink: false,
            fifo: false,
        }
    }

    /// Parse `-t` letters (`r d c b l f`).
    pub fn from_letters(letters: &str) -> Result<Self, ManifestError> {
        let mut filter = Self::none();
        for c in letters.chars() {
            let kind = FileKind::from_letter(c).ok_or_else(|| ManifestError::InvalidConfig {
                message: format!("\"{c}\" does not correspond to a file type"),
            })?;
            filter.insert(kind);
        }
        Ok(filter)
    }

    /// Add a kind to the selection.
    pub fn insert(&mut self, kind: FileKind) {
        *self.slot(kind) = true;
    }

    /// Check if a kind is selected.
    pub fn contains(&self, kind: FileKind) -> bool {
        match kind {
            FileKind::Regular => self.regular,
            FileKind::Directory => self.directory,
            FileKind::CharDevice => self.character,
            FileKind::BlockDevice => self.block,
            FileKind::Symlink => self.symlink,
            FileKind::Fifo => self.fifo,
        }
    }

    /// Check if nothing is selected.
    pub fn is_empty(&self) -> bool {
        !FileKind::iter().any(|kind| self.contains(kind))
    }

    fn slot(&mut self, kind: FileKind) -> &mut bool {
        match kind {
            FileKind::Regular => &mut self.regular,
            FileKind::Directory => &mut self.directory,
            FileKind::CharDevice => &mut self.character,
            FileKind::BlockDevice => &mut self.block,
            FileKind::Symlink => &mut self.symlink,
            FileKind::Fifo => &mut self.fifo,
        }
    }
}

impl Default for KindFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Optional metadata fields written to each record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSet {
    /// Write `size <n>`.
    pub size: bool,
    /// Write `mtime <sec> <nsec>`.
    pub mtime: bool,
}

impl FieldSet {
    /// Parse `-m` letters (`s m`).
    pub fn from_letters(letters: &str) -> Result<Self, ManifestError> {
        let mut fields = Self::default();
        for c in letters.chars() {
            match c {
                's' => fields.size = true,
                'm' => fields.mtime = true,
                _ => {
                    return Err(ManifestError::InvalidConfig {
                        message: format!("\"{c}\" does not correspond to a metadata type"),
                    });
                }
            }
        }
        Ok(fields)
    }
}

/// Reconciliation policies active in update mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatePolicy {
    /// Append records for paths missing from the manifest.
    pub add: bool,
    /// Drop records for paths that no longer exist.
    pub remove: bool,
    /// Refresh size and mtime of existing records.
    pub modified: bool,
}

impl UpdatePolicy {
    /// Parse `-u` letters (`a r m`).
    pub fn from_letters(letters: &str) -> Result<Self, ManifestError> {
        let mut policy = Self::default();
        for c in letters.chars() {
            match c {
                'a' => policy.add = true,
                'r' => policy.remove = true,
                'm' => policy.modified = true,
                _ => {
                    return Err(ManifestError::InvalidConfig {
                        message: format!("\"{c}\" is not an update type"),
                    });
                }
            }
        }
        Ok(policy)
    }

    /// Check if no policy is active.
    pub fn is_empty(&self) -> bool {
        !(self.add || self.remove || self.modified)
    }
}

/// Which manifest paths a named root makes eligible for removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RemoveScope {
    /// The root itself and everything below it.
    #[default]
    Subtree,
    /// Only the root path itself.
    Exact,
}

/// Configuration for manifest creation and update.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ManifestConfig {
    /// File kinds to record.
    #[builder(default)]
    #[serde(default)]
    pub kinds: KindFilter,

    /// Metadata fields to record.
    #[builder(default)]
    #[serde(default)]
    pub fields: FieldSet,

    /// Follow symlinks named as roots (`-H`).
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_command_line_links: bool,

    /// Follow every symlink encountered (`-L`). Implies `-H`.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_all_links: bool,

    /// Report and skip probe failures instead of aborting.
    #[builder(default = "false")]
    #[serde(default)]
    pub verbose: bool,

    /// Update mode policies (None = create mode).
    #[builder(default)]
    #[serde(default)]
    pub update: Option<UpdatePolicy>,

    /// Removal matching for named roots.
    #[builder(default)]
    #[serde(default)]
    pub remove_scope: RemoveScope,
}

impl ManifestConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(Some(policy)) = self.update {
            if policy.is_empty() {
                return Err("update mode needs at least one of add, remove or modified".to_string());
            }
        }
        Ok(())
    }
}

impl ManifestConfig {
    /// Create a new config builder.
    pub fn builder() -> ManifestConfigBuilder {
        ManifestConfigBuilder::default()
    }

    /// Create-mode config recording every kind with no optional fields.
    pub fn new() -> Self {
        Self {
            kinds: KindFilter::all(),
            fields: FieldSet::default(),
            follow_command_line_links: false,
            follow_all_links: false,
            verbose: false,
            update: None,
            remove_scope: RemoveScope::Subtree,
        }
    }

    /// Load a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ManifestError::io("read configuration file", e))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| ManifestError::InvalidConfig {
            message: format!("{}: {e}", path.as_ref().display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the builder enforces, for configs built another way.
    pub fn validate(&self) -> Result<(), ManifestError> {
        match self.update {
            Some(policy) if policy.is_empty() => Err(ManifestError::InvalidConfig {
                message: "update mode needs at least one of add, remove or modified".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Whether symlinks named as roots are followed.
    pub fn follows_command_line_links(&self) -> bool {
        self.follow_command_line_links || self.follow_all_links
    }

    /// Whether symlinks inside the hierarchy are followed.
    pub fn follows_all_links(&self) -> bool {
        self.follow_all_links
    }

    /// Active update policies, or none in create mode.
    pub fn update_policy(&self) -> UpdatePolicy {
        self.update.unwrap_or_default()
    }
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ManifestConfig::builder()
            .fields(FieldSet {
                size: true,
                mtime: true,
            })
            .follow_all_links(true)
            .build()
            .unwrap();

        assert!(config.fields.size);
        assert!(config.follows_command_line_links());
        assert!(config.follows_all_links());
        assert_eq!(config.kinds, KindFilter::all());
        assert!(config.update.is_none());
    }

    #[test]
    fn test_builder_rejects_empty_update() {
        let result = ManifestConfig::builder()
            .update(UpdatePolicy::default())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_kind_letters() {
        let filter = KindFilter::from_letters("rd").unwrap();
        assert!(filter.contains(FileKind::Regular));
        assert!(filter.contains(FileKind::Directory));
        assert!(!filter.contains(FileKind::Symlink));

        assert!(KindFilter::from_letters("rx").is_err());
        assert!(KindFilter::from_letters("").unwrap().is_empty());
    }

    #[test]
    fn test_update_and_field_letters() {
        let policy = UpdatePolicy::from_letters("am").unwrap();
        assert!(policy.add && policy.modified && !policy.remove);
        assert!(UpdatePolicy::from_letters("q").is_err());

        let fields = FieldSet::from_letters("sm").unwrap();
        assert!(fields.size && fields.mtime);
        assert!(FieldSet::from_letters("z").is_err());
    }

    #[test]
    fn test_remove_scope_parse() {
        assert_eq!("exact".parse::<RemoveScope>().unwrap(), RemoveScope::Exact);
        assert_eq!(RemoveScope::default().to_string(), "subtree");
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"fields": {"size": true}, "update": {"add": true}, "remove_scope": "exact"}"#,
        )
        .unwrap();

        let config = ManifestConfig::from_json_file(&path).unwrap();
        assert!(config.fields.size);
        assert!(!config.fields.mtime);
        assert!(config.update_policy().add);
        assert_eq!(config.remove_scope, RemoveScope::Exact);
        assert_eq!(config.kinds, KindFilter::all());
    }

    #[test]
    fn test_from_json_file_rejects_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            ManifestConfig::from_json_file(&path),
            Err(ManifestError::InvalidConfig { .. })
        ));
    }
}
