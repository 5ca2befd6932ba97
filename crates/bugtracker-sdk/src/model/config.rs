//! 数据驱动的模型定义
//!
//! 由应用层以 JSON 提供实体的字段表与远端方法，转换为 `EntityModel`。
//!
//! ```json
//! {
//!   "kind": "comment",
//!   "id_field": "id",
//!   "read": { "name": "Bug.comments", "id_param": "comment_ids", "id_as_list": true },
//!   "record_path": ["comments", "{id}"],
//!   "fields": [
//!     { "name": "id", "kind": "int", "direction": "read_only" },
//!     { "name": "text", "kind": "text", "direction": "read_write", "required": true }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::codec::FieldKind;
use super::entity_model::{EntityModel, PathStep, RemoteMethod};
use super::field::{FieldDescriptor, FieldDirection};
use crate::error::{BugTrackerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    /// 线上键名（默认与 name 相同）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_name: Option<String>,
    pub kind: FieldKind,
    pub direction: FieldDirection,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMethodConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_param: Option<String>,
    #[serde(default)]
    pub id_as_list: bool,
    /// 线上键名 → 参数名
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityModelConfig {
    pub kind: String,
    pub fields: Vec<FieldConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<RemoteMethodConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<RemoteMethodConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<RemoteMethodConfig>,
    #[serde(default)]
    pub record_path: Vec<String>,
    #[serde(default = "default_created_id_path")]
    pub created_id_path: Vec<String>,
}

fn default_created_id_path() -> Vec<String> {
    vec!["id".to_string()]
}

impl FieldConfig {
    fn to_descriptor(&self) -> FieldDescriptor {
        let mut field = FieldDescriptor::new(self.name.clone(), self.kind, self.direction);
        if let Some(wire_name) = &self.wire_name {
            field = field.with_wire_name(wire_name.clone());
        }
        if self.required {
            field = field.required();
        }
        field
    }
}

impl RemoteMethodConfig {
    fn to_method(&self, kind: &str) -> Result<RemoteMethod> {
        let mut method = RemoteMethod::new(self.name.clone());
        match (&self.id_param, self.id_as_list) {
            (Some(key), false) => method = method.with_id_param(key.clone()),
            (Some(key), true) => method = method.with_id_list(key.clone()),
            (None, true) => {
                return Err(BugTrackerError::Config(format!(
                    "method `{}` of `{}` sets id_as_list without id_param",
                    self.name, kind
                )));
            }
            (None, false) => {}
        }
        for (wire_name, param) in &self.aliases {
            method = method.with_alias(wire_name.clone(), param.clone());
        }
        Ok(method)
    }
}

impl EntityModelConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 校验并构建模型
    pub fn build(&self) -> Result<Arc<EntityModel>> {
        let mut builder = EntityModel::builder(self.kind.clone())
            .record_path(self.record_path.iter().map(|s| PathStep::parse(s)).collect())
            .created_id_path(self.created_id_path.iter().map(|s| PathStep::parse(s)).collect());

        for field in &self.fields {
            builder = builder.field(field.to_descriptor());
        }
        if let Some(id_field) = &self.id_field {
            builder = builder.id_field(id_field.clone());
        }
        if let Some(read) = &self.read {
            builder = builder.read(read.to_method(&self.kind)?);
        }
        if let Some(update) = &self.update {
            builder = builder.update(update.to_method(&self.kind)?);
        }
        if let Some(create) = &self.create {
            builder = builder.create(create.to_method(&self.kind)?);
        }
        builder.build()
    }
}
