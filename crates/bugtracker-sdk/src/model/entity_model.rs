//! 实体模型
//!
//! 一种实体（Bug / Comment / Attachment …）对应一个 `EntityModel`：有序字段表 +
//! 远端方法配置。模型构造后不可变，以 `Arc` 在所有实例间共享。

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::codec::FieldValue;
use super::field::FieldDescriptor;
use crate::error::{BugTrackerError, Result};
use crate::wire::WireValue;

/// 远端实体标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Int(i64),
    Key(String),
}

impl RemoteId {
    pub fn to_wire(&self) -> WireValue {
        match self {
            RemoteId::Int(id) => WireValue::Int(*id),
            RemoteId::Key(key) => WireValue::String(key.clone()),
        }
    }

    pub fn to_field_value(&self) -> FieldValue {
        match self {
            RemoteId::Int(id) => FieldValue::Int(*id),
            RemoteId::Key(key) => FieldValue::Text(key.clone()),
        }
    }

    pub fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Int(id) => Some(RemoteId::Int(*id)),
            FieldValue::Text(key) => Some(RemoteId::Key(key.clone())),
            _ => None,
        }
    }

    pub fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::Int(id) => Some(RemoteId::Int(*id)),
            WireValue::String(key) => Some(RemoteId::Key(key.clone())),
            _ => None,
        }
    }
}

impl From<i64> for RemoteId {
    fn from(value: i64) -> Self {
        RemoteId::Int(value)
    }
}

impl From<i32> for RemoteId {
    fn from(value: i32) -> Self {
        RemoteId::Int(value as i64)
    }
}

impl From<&str> for RemoteId {
    fn from(value: &str) -> Self {
        RemoteId::Key(value.to_string())
    }
}

impl From<String> for RemoteId {
    fn from(value: String) -> Self {
        RemoteId::Key(value)
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Int(id) => write!(f, "{}", id),
            RemoteId::Key(key) => f.write_str(key),
        }
    }
}

/// 在响应中定位记录的一步
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Key(String),
    Index(usize),
    /// 以当前实体 id 作为键，例如 Bugzilla 的 `{"comments": {"42": {...}}}`
    RemoteId,
}

impl PathStep {
    /// 配置中的写法：`"bugs"` → Key，`"0"` → Index，`"{id}"` → RemoteId
    pub fn parse(step: &str) -> Self {
        if step == "{id}" {
            PathStep::RemoteId
        } else if let Ok(index) = step.parse::<usize>() {
            PathStep::Index(index)
        } else {
            PathStep::Key(step.to_string())
        }
    }
}

/// 沿路径取值；路径为空时返回根本身
pub fn resolve_path<'a>(
    root: &'a WireValue,
    path: &[PathStep],
    id: Option<&RemoteId>,
) -> Option<&'a WireValue> {
    path.iter().try_fold(root, |node, step| match step {
        PathStep::Key(key) => node.get(key),
        // 数字步在映射上按字符串键处理（`{"bugs": {"7": ...}}`）
        PathStep::Index(index) => match node {
            WireValue::Map(_) => node.get(&index.to_string()),
            _ => node.index(*index),
        },
        PathStep::RemoteId => node.get(&id?.to_string()),
    })
}

/// 一个远端方法及其参数约定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMethod {
    name: String,
    id_param: Option<String>,
    id_as_list: bool,
    param_aliases: BTreeMap<String, String>,
}

impl RemoteMethod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_param: None,
            id_as_list: false,
            param_aliases: BTreeMap::new(),
        }
    }

    /// 以 `{key: id}` 传递实体 id
    pub fn with_id_param(mut self, key: impl Into<String>) -> Self {
        self.id_param = Some(key.into());
        self.id_as_list = false;
        self
    }

    /// 以 `{key: [id]}` 传递实体 id（Bugzilla 的 ids / comment_ids）
    pub fn with_id_list(mut self, key: impl Into<String>) -> Self {
        self.id_param = Some(key.into());
        self.id_as_list = true;
        self
    }

    /// 本方法中某个字段使用不同的参数名
    pub fn with_alias(mut self, wire_name: impl Into<String>, param: impl Into<String>) -> Self {
        self.param_aliases.insert(wire_name.into(), param.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_param(&self) -> Option<&str> {
        self.id_param.as_deref()
    }

    pub fn id_as_list(&self) -> bool {
        self.id_as_list
    }

    pub fn param_key<'a>(&'a self, wire_name: &'a str) -> &'a str {
        self.param_aliases
            .get(wire_name)
            .map(String::as_str)
            .unwrap_or(wire_name)
    }

    /// 生成 id 参数；方法未声明 id 参数时返回 None
    pub fn id_entry(&self, id: &RemoteId) -> Option<(String, WireValue)> {
        let key = self.id_param.as_ref()?;
        let value = if self.id_as_list {
            WireValue::List(vec![id.to_wire()])
        } else {
            id.to_wire()
        };
        Some((key.clone(), value))
    }
}

/// 实体模型
#[derive(Debug)]
pub struct EntityModel {
    kind: String,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
    by_wire_name: HashMap<String, usize>,
    id_field: Option<String>,
    read: Option<RemoteMethod>,
    update: Option<RemoteMethod>,
    create: Option<RemoteMethod>,
    record_path: Vec<PathStep>,
    created_id_path: Vec<PathStep>,
}

impl EntityModel {
    pub fn builder(kind: impl Into<String>) -> EntityModelBuilder {
        EntityModelBuilder::new(kind)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// 按声明顺序的字段表（编码顺序由此确定）
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_named(&self, name: &str) -> Result<&FieldDescriptor> {
        self.by_name
            .get(name)
            .map(|&index| &self.fields[index])
            .ok_or_else(|| BugTrackerError::UnknownField {
                entity: self.kind.clone(),
                field: name.to_string(),
            })
    }

    pub fn field_for_wire_key(&self, wire_key: &str) -> Option<&FieldDescriptor> {
        self.by_wire_name.get(wire_key).map(|&index| &self.fields[index])
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn id_field(&self) -> Option<&FieldDescriptor> {
        self.id_field.as_deref().and_then(|name| self.field_named(name).ok())
    }

    pub fn read_method(&self) -> Result<&RemoteMethod> {
        self.read.as_ref().ok_or_else(|| self.unsupported("fetch"))
    }

    pub fn update_method(&self) -> Result<&RemoteMethod> {
        self.update.as_ref().ok_or_else(|| self.unsupported("commit"))
    }

    pub fn create_method(&self) -> Result<&RemoteMethod> {
        self.create.as_ref().ok_or_else(|| self.unsupported("create"))
    }

    pub fn record_path(&self) -> &[PathStep] {
        &self.record_path
    }

    pub fn created_id_path(&self) -> &[PathStep] {
        &self.created_id_path
    }

    fn unsupported(&self, operation: &'static str) -> BugTrackerError {
        BugTrackerError::UnsupportedOperation {
            entity: self.kind.clone(),
            operation,
        }
    }
}

/// 实体模型构建器
pub struct EntityModelBuilder {
    kind: String,
    fields: Vec<FieldDescriptor>,
    id_field: Option<String>,
    read: Option<RemoteMethod>,
    update: Option<RemoteMethod>,
    create: Option<RemoteMethod>,
    record_path: Vec<PathStep>,
    created_id_path: Vec<PathStep>,
}

impl EntityModelBuilder {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Vec::new(),
            id_field: None,
            read: None,
            update: None,
            create: None,
            record_path: Vec::new(),
            created_id_path: vec![PathStep::Key("id".to_string())],
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = Some(name.into());
        self
    }

    pub fn read(mut self, method: RemoteMethod) -> Self {
        self.read = Some(method);
        self
    }

    pub fn update(mut self, method: RemoteMethod) -> Self {
        self.update = Some(method);
        self
    }

    pub fn create(mut self, method: RemoteMethod) -> Self {
        self.create = Some(method);
        self
    }

    pub fn record_path(mut self, path: Vec<PathStep>) -> Self {
        self.record_path = path;
        self
    }

    pub fn created_id_path(mut self, path: Vec<PathStep>) -> Self {
        self.created_id_path = path;
        self
    }

    pub fn build(self) -> Result<Arc<EntityModel>> {
        if self.kind.trim().is_empty() {
            return Err(BugTrackerError::InvalidModel("entity kind must not be empty".to_string()));
        }

        let mut by_name = HashMap::with_capacity(self.fields.len());
        let mut by_wire_name = HashMap::with_capacity(self.fields.len());
        for (index, field) in self.fields.iter().enumerate() {
            if by_name.insert(field.name().to_string(), index).is_some() {
                return Err(BugTrackerError::InvalidModel(format!(
                    "duplicate field `{}` in `{}`",
                    field.name(),
                    self.kind
                )));
            }
            if by_wire_name.insert(field.wire_name().to_string(), index).is_some() {
                return Err(BugTrackerError::InvalidModel(format!(
                    "duplicate wire name `{}` in `{}`",
                    field.wire_name(),
                    self.kind
                )));
            }
        }

        if let Some(id_field) = &self.id_field {
            if !by_name.contains_key(id_field) {
                return Err(BugTrackerError::InvalidModel(format!(
                    "id field `{}` is not declared in `{}`",
                    id_field, self.kind
                )));
            }
        }

        if let Some(update) = &self.update {
            let id_key = match update.id_param() {
                Some(key) => key,
                None => self
                    .id_field
                    .as_ref()
                    .and_then(|name| by_name.get(name))
                    .map(|&index| self.fields[index].wire_name())
                    .unwrap_or("id"),
            };
            // 可写字段的参数名不能覆盖 update 调用的 id 参数
            if let Some(field) = self
                .fields
                .iter()
                .filter(|f| f.direction().is_writable())
                .find(|f| update.param_key(f.wire_name()) == id_key)
            {
                return Err(BugTrackerError::InvalidModel(format!(
                    "field `{}` of `{}` collides with id parameter `{}` of `{}`",
                    field.name(),
                    self.kind,
                    id_key,
                    update.name()
                )));
            }
        }

        Ok(Arc::new(EntityModel {
            kind: self.kind,
            fields: self.fields,
            by_name,
            by_wire_name,
            id_field: self.id_field,
            read: self.read,
            update: self.update,
            create: self.create,
            record_path: self.record_path,
            created_id_path: self.created_id_path,
        }))
    }
}
