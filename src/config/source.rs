//! Source schema: field groups of the stored source document.
//!
//! A [`SourceSchema`] is an ordered list of [`SourceGroupConfig`]s, where a
//! group's id is its position, plus the [`ModuleInfo`]s that groups may
//! reference. Schema upgrades can disable single groups or every group;
//! the aggregate [`SourceSchema::is_all_fields_disabled`] flag always
//! reflects the groups' own flags.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::GroupId;
use crate::error::{Result, SegmergeError};

/// A named external module and its load parameters.
///
/// Two modules are equal when their names are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub module_name: String,
    #[serde(default)]
    pub module_path: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl ModuleInfo {
    pub fn new<S: Into<String>>(module_name: S) -> Self {
        ModuleInfo {
            module_name: module_name.into(),
            ..Default::default()
        }
    }
}

impl PartialEq for ModuleInfo {
    fn eq(&self, other: &Self) -> bool {
        self.module_name == other.module_name
    }
}

impl Eq for ModuleInfo {}

/// Which fields of a document a source group stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMode {
    /// Every field of the document.
    #[default]
    AllField,
    /// Only the fields listed in the group.
    SpecifiedField,
    /// Fields chosen by the group's module.
    UserDefine,
}

/// One independently enable/disable-able group of source fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceGroupConfig {
    /// Position in the owning schema, assigned on insertion.
    #[serde(skip)]
    group_id: GroupId,
    #[serde(default)]
    pub field_mode: FieldMode,
    #[serde(default)]
    pub fields: Vec<String>,
    /// Name of a [`ModuleInfo`] in the owning schema; empty for none.
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    disabled: bool,
}

impl SourceGroupConfig {
    pub fn new(field_mode: FieldMode) -> Self {
        SourceGroupConfig {
            field_mode,
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_module<S: Into<String>>(mut self, module: S) -> Self {
        self.module = module.into();
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Compare configuration with another group, ignoring the disabled flag.
    pub fn check_equal(&self, other: &SourceGroupConfig) -> Result<()> {
        let field = |name: &str| format!("source.group[{}].{name}", self.group_id);

        if self.field_mode != other.field_mode {
            return Err(SegmergeError::mismatch(
                field("field_mode"),
                format!("{:?} vs {:?}", self.field_mode, other.field_mode),
            ));
        }
        if self.fields != other.fields {
            return Err(SegmergeError::mismatch(
                field("fields"),
                format!("{:?} vs {:?}", self.fields, other.fields),
            ));
        }
        if self.module != other.module {
            return Err(SegmergeError::mismatch(
                field("module"),
                format!("'{}' vs '{}'", self.module, other.module),
            ));
        }
        if self.parameters != other.parameters {
            return Err(SegmergeError::mismatch(
                field("parameters"),
                format!("{:?} vs {:?}", self.parameters, other.parameters),
            ));
        }
        Ok(())
    }

    /// Reject a mode whose settings are missing: specified fields with no
    /// fields, or a user defined group with no module.
    pub fn validate(&self) -> Result<()> {
        match self.field_mode {
            FieldMode::SpecifiedField if self.fields.is_empty() => Err(SegmergeError::schema(
                format!(
                    "SourceGroupConfig[{}] specifies fields but lists none",
                    self.group_id
                ),
            )),
            FieldMode::UserDefine if self.module.is_empty() => Err(SegmergeError::schema(
                format!(
                    "SourceGroupConfig[{}] is user defined but names no module",
                    self.group_id
                ),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SourceSchemaRepr {
    #[serde(default)]
    modules: Vec<ModuleInfo>,
    #[serde(default)]
    group_configs: Vec<SourceGroupConfig>,
}

/// Ordered source groups plus the modules they may reference.
///
/// Mutation (disabling groups) belongs to the schema-upgrade path and must
/// not overlap with a merge reading the same instance.
#[derive(Debug, Clone, Default)]
pub struct SourceSchema {
    group_configs: Vec<SourceGroupConfig>,
    modules: Vec<ModuleInfo>,
    all_fields_disabled: bool,
}

impl SourceSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from JSON (`{"modules": [...], "group_configs": [...]}`).
    ///
    /// Group ids follow array order. The result is not validated; call
    /// [`SourceSchema::check`] before using it.
    pub fn from_json(json: &str) -> Result<Self> {
        let repr: SourceSchemaRepr = serde_json::from_str(json)?;
        let mut schema = SourceSchema {
            group_configs: Vec::with_capacity(repr.group_configs.len()),
            modules: repr.modules,
            all_fields_disabled: false,
        };
        for group in repr.group_configs {
            schema.add_group_config(group);
        }
        Ok(schema)
    }

    pub fn to_json(&self) -> Result<String> {
        let repr = SourceSchemaRepr {
            modules: self.modules.clone(),
            group_configs: self.group_configs.clone(),
        };
        Ok(serde_json::to_string_pretty(&repr)?)
    }

    /// Append a group; its id becomes its position.
    pub fn add_group_config(&mut self, mut group: SourceGroupConfig) -> GroupId {
        let group_id = self.group_configs.len();
        group.group_id = group_id;
        self.group_configs.push(group);
        self.refresh_all_fields_disabled();
        group_id
    }

    pub fn add_module(&mut self, module: ModuleInfo) {
        self.modules.push(module);
    }

    /// Group by id, `None` when out of range.
    pub fn group_config(&self, group_id: GroupId) -> Option<&SourceGroupConfig> {
        self.group_configs.get(group_id)
    }

    pub fn group_configs(&self) -> &[SourceGroupConfig] {
        &self.group_configs
    }

    pub fn group_count(&self) -> usize {
        self.group_configs.len()
    }

    pub fn modules(&self) -> &[ModuleInfo] {
        &self.modules
    }

    pub fn module(&self, module_name: &str) -> Option<&ModuleInfo> {
        self.modules.iter().find(|m| m.module_name == module_name)
    }

    pub fn is_module_exist(&self, module_name: &str) -> bool {
        self.module(module_name).is_some()
    }

    pub fn is_all_fields_disabled(&self) -> bool {
        self.all_fields_disabled
    }

    /// Validate the schema: at least one group, and every referenced
    /// module declared.
    pub fn check(&self) -> Result<()> {
        if self.group_configs.is_empty() {
            return Err(SegmergeError::schema(
                "SourceSchema should have at least one group config",
            ));
        }

        for group in &self.group_configs {
            if !group.module.is_empty() && !self.is_module_exist(&group.module) {
                return Err(SegmergeError::schema(format!(
                    "SourceGroupConfig[{}] uses undeclared module [{}]",
                    group.group_id, group.module
                )));
            }
        }
        Ok(())
    }

    /// Stricter than [`SourceSchema::check`]: every group must also carry
    /// the settings its field mode needs.
    pub fn validate_groups(&self) -> Result<()> {
        self.group_configs
            .iter()
            .try_for_each(SourceGroupConfig::validate)
    }

    /// Require `other` to describe the same groups, modules and aggregate
    /// disabled state. Reports the first divergence.
    pub fn assert_equal(&self, other: &SourceSchema) -> Result<()> {
        if self.group_count() != other.group_count() {
            return Err(SegmergeError::mismatch(
                "source.group_count",
                format!("{} vs {}", self.group_count(), other.group_count()),
            ));
        }
        for (group, other_group) in self.group_configs.iter().zip(&other.group_configs) {
            group.check_equal(other_group)?;
        }

        let mut names: Vec<_> = self.modules.iter().map(|m| &m.module_name).collect();
        let mut other_names: Vec<_> = other.modules.iter().map(|m| &m.module_name).collect();
        names.sort();
        other_names.sort();
        if names != other_names {
            return Err(SegmergeError::mismatch(
                "source.modules",
                format!("{names:?} vs {other_names:?}"),
            ));
        }

        if self.all_fields_disabled != other.all_fields_disabled {
            return Err(SegmergeError::mismatch(
                "source.all_fields_disabled",
                format!("{} vs {}", self.all_fields_disabled, other.all_fields_disabled),
            ));
        }
        Ok(())
    }

    /// Disable every group. Idempotent.
    pub fn disable_all_fields(&mut self) {
        for group in &mut self.group_configs {
            group.disabled = true;
        }
        self.refresh_all_fields_disabled();
    }

    /// Disable one group. An unknown id only logs a warning, since
    /// configuration may lag behind schema evolution.
    pub fn disable_field_group(&mut self, group_id: GroupId) {
        let Some(group) = self.group_configs.get_mut(group_id) else {
            warn!(
                "group id [{group_id}] for source index does not exist ({} groups)",
                self.group_configs.len()
            );
            return;
        };

        group.disabled = true;
        self.refresh_all_fields_disabled();
    }

    /// Ids of all disabled groups, ascending.
    pub fn disable_group_ids(&self) -> Vec<GroupId> {
        self.group_configs
            .iter()
            .filter(|g| g.disabled)
            .map(|g| g.group_id)
            .collect()
    }

    // An empty schema is never "all disabled"; check() rejects it anyway.
    fn refresh_all_fields_disabled(&mut self) {
        self.all_fields_disabled =
            !self.group_configs.is_empty() && self.group_configs.iter().all(|g| g.disabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_group_schema() -> SourceSchema {
        let mut schema = SourceSchema::new();
        schema.add_module(ModuleInfo::new("summary_plugin"));
        schema.add_group_config(SourceGroupConfig::new(FieldMode::AllField));
        schema.add_group_config(
            SourceGroupConfig::new(FieldMode::SpecifiedField)
                .with_fields(vec!["title".to_string(), "price".to_string()])
                .with_module("summary_plugin"),
        );
        schema
    }

    fn assert_aggregate_consistent(schema: &SourceSchema) {
        let every_group = schema.group_configs().iter().all(|g| g.is_disabled());
        assert_eq!(schema.is_all_fields_disabled(), every_group);
    }

    #[test]
    fn test_group_ids_follow_position() {
        let schema = two_group_schema();
        assert_eq!(schema.group_count(), 2);
        assert_eq!(schema.group_config(0).unwrap().group_id(), 0);
        assert_eq!(schema.group_config(1).unwrap().group_id(), 1);
        assert!(schema.group_config(2).is_none());
    }

    #[test]
    fn test_check_rejects_empty_schema() {
        let schema = SourceSchema::new();
        assert!(matches!(schema.check(), Err(SegmergeError::Schema(_))));
    }

    #[test]
    fn test_check_rejects_undeclared_module() {
        let mut schema = SourceSchema::new();
        schema.add_group_config(SourceGroupConfig::new(FieldMode::AllField).with_module("ghost"));

        let err = schema.check().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_check_ignores_mode_settings() {
        let mut schema = SourceSchema::new();
        schema.add_group_config(SourceGroupConfig::new(FieldMode::SpecifiedField));
        schema.check().unwrap();
        assert!(matches!(
            schema.validate_groups(),
            Err(SegmergeError::Schema(_))
        ));

        let mut schema = SourceSchema::new();
        schema.add_group_config(SourceGroupConfig::new(FieldMode::UserDefine));
        schema.check().unwrap();
        assert!(schema.validate_groups().is_err());
    }

    #[test]
    fn test_check_accepts_valid_schema() {
        two_group_schema().check().unwrap();
    }

    #[test]
    fn test_module_lookup() {
        let schema = two_group_schema();
        assert!(schema.is_module_exist("summary_plugin"));
        assert_eq!(
            schema.module("summary_plugin").unwrap().module_name,
            "summary_plugin"
        );
        assert!(schema.module("other").is_none());
    }

    #[test]
    fn test_disable_all_fields_is_idempotent() {
        let mut schema = two_group_schema();
        schema.disable_all_fields();
        assert!(schema.is_all_fields_disabled());
        assert_eq!(schema.disable_group_ids(), vec![0, 1]);

        schema.disable_all_fields();
        assert!(schema.is_all_fields_disabled());
        assert_aggregate_consistent(&schema);
    }

    #[test]
    fn test_disabling_last_enabled_group_sets_aggregate() {
        let mut schema = two_group_schema();

        schema.disable_field_group(1);
        assert!(!schema.is_all_fields_disabled());
        assert_eq!(schema.disable_group_ids(), vec![1]);
        assert_aggregate_consistent(&schema);

        schema.disable_field_group(0);
        assert!(schema.is_all_fields_disabled());
        assert_aggregate_consistent(&schema);
    }

    #[test]
    fn test_adding_enabled_group_clears_aggregate() {
        let mut schema = two_group_schema();
        schema.disable_all_fields();
        assert!(schema.is_all_fields_disabled());

        // A fresh enabled group means not every group is disabled any more.
        let group_id = schema.add_group_config(SourceGroupConfig::new(FieldMode::AllField));
        assert_eq!(group_id, 2);
        assert!(!schema.is_all_fields_disabled());
        assert_aggregate_consistent(&schema);
    }

    #[test]
    fn test_disable_unknown_group_is_noop() {
        let mut schema = two_group_schema();
        schema.disable_field_group(7);

        assert!(schema.disable_group_ids().is_empty());
        assert!(!schema.is_all_fields_disabled());
    }

    #[test]
    fn test_assert_equal_reports_first_divergence() {
        let a = two_group_schema();
        let b = two_group_schema();
        a.assert_equal(&b).unwrap();

        let mut fewer = SourceSchema::new();
        fewer.add_module(ModuleInfo::new("summary_plugin"));
        fewer.add_group_config(SourceGroupConfig::new(FieldMode::AllField));
        match a.assert_equal(&fewer) {
            Err(SegmergeError::SchemaMismatch { field, .. }) => {
                assert_eq!(field, "source.group_count")
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let mut other_modules = two_group_schema();
        other_modules.add_module(ModuleInfo::new("extra"));
        match a.assert_equal(&other_modules) {
            Err(SegmergeError::SchemaMismatch { field, .. }) => assert_eq!(field, "source.modules"),
            other => panic!("unexpected result: {other:?}"),
        }

        let mut disabled = two_group_schema();
        disabled.disable_all_fields();
        match a.assert_equal(&disabled) {
            Err(SegmergeError::SchemaMismatch { field, .. }) => {
                assert_eq!(field, "source.all_fields_disabled")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_assert_equal_detects_group_change() {
        let a = two_group_schema();
        let mut b = SourceSchema::new();
        b.add_module(ModuleInfo::new("summary_plugin"));
        b.add_group_config(SourceGroupConfig::new(FieldMode::AllField));
        b.add_group_config(
            SourceGroupConfig::new(FieldMode::SpecifiedField)
                .with_fields(vec!["title".to_string()])
                .with_module("summary_plugin"),
        );

        match a.assert_equal(&b) {
            Err(SegmergeError::SchemaMismatch { field, .. }) => {
                assert_eq!(field, "source.group[1].fields")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_module_equality_by_name() {
        let mut a = ModuleInfo::new("m");
        a.module_path = "/lib/a.so".to_string();
        let b = ModuleInfo::new("m");
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_json_assigns_ids_and_aggregate() {
        let json = r#"{
            "modules": [{"module_name": "summary_plugin", "parameters": {"k": "v"}}],
            "group_configs": [
                {"field_mode": "all_field", "disabled": true},
                {"field_mode": "user_define", "module": "summary_plugin", "disabled": true}
            ]
        }"#;
        let schema = SourceSchema::from_json(json).unwrap();
        schema.check().unwrap();

        assert_eq!(schema.group_config(1).unwrap().group_id(), 1);
        assert_eq!(
            schema.group_config(1).unwrap().field_mode,
            FieldMode::UserDefine
        );
        assert!(schema.is_all_fields_disabled());

        let reloaded = SourceSchema::from_json(&schema.to_json().unwrap()).unwrap();
        schema.assert_equal(&reloaded).unwrap();
    }
}
