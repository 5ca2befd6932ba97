//! 实体实例 - 字段值 + 脏标记
//!
//! 每个字段的状态机：
//!
//! ```text
//! Unloaded ──fetch/create──▶ Clean ──set(不同值)──▶ Dirty
//!                              ▲                     │
//!                              └─commit 成功 / set 回原值─┘
//! ```
//!
//! 只读字段永远不会变脏。实例本身不做并发保护：跨任务共享时需要外部加锁，
//! 且锁要覆盖整个 commit（快照脏字段 → 远端调用 → 清除脏标记 不是原子的）。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{BugTrackerError, Result};
use crate::model::{EntityModel, FieldDescriptor, FieldValue, RemoteId};
use crate::wire::WireMap;

/// 字段对外可见的同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStatus {
    /// 从未加载 / 设置
    Unloaded,
    /// 与最后已知的服务器状态一致
    Clean,
    /// 本地修改，待推送
    Dirty,
}

#[derive(Debug, Clone, PartialEq)]
enum FieldState {
    Clean(FieldValue),
    Dirty {
        value: FieldValue,
        /// 最后已知的服务器值；草稿实体上为 None
        baseline: Option<FieldValue>,
    },
}

impl FieldState {
    fn value(&self) -> &FieldValue {
        match self {
            FieldState::Clean(value) => value,
            FieldState::Dirty { value, .. } => value,
        }
    }
}

/// 一个实体的本地表示
#[derive(Debug, Clone)]
pub struct EntityInstance {
    model: Arc<EntityModel>,
    fields: BTreeMap<String, FieldState>,
}

impl EntityInstance {
    /// 空实例（所有字段 Unloaded）
    pub fn new(model: Arc<EntityModel>) -> Self {
        Self {
            model,
            fields: BTreeMap::new(),
        }
    }

    /// 待创建的实体：先 `set` 可写字段，再交给 `Synchronizer::create`
    pub fn draft(model: Arc<EntityModel>) -> Self {
        Self::new(model)
    }

    /// 从服务器记录构建实例，所有已解码字段为 Clean
    ///
    /// 没有对应描述的键被忽略（向前兼容）；缺失或为 null 的字段保持 Unloaded；
    /// 只写字段即便出现在响应中也不读取。
    pub fn from_wire(model: Arc<EntityModel>, record: &WireMap) -> Result<Self> {
        let mut fields = BTreeMap::new();
        for (key, wire) in record {
            let Some(descriptor) = model.field_for_wire_key(key) else {
                debug!("{} 响应中的未知字段 `{}` 已忽略", model.kind(), key);
                continue;
            };
            if !descriptor.direction().is_readable() || wire.is_null() {
                continue;
            }
            let value = descriptor.decode(wire)?;
            fields.insert(descriptor.name().to_string(), FieldState::Clean(value));
        }
        Ok(Self { model, fields })
    }

    pub fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    pub fn get(&self, name: &str) -> Result<&FieldValue> {
        let descriptor = self.model.field_named(name)?;
        self.fields
            .get(descriptor.name())
            .map(FieldState::value)
            .ok_or_else(|| BugTrackerError::FieldNotLoaded {
                entity: self.model.kind().to_string(),
                field: name.to_string(),
            })
    }

    pub fn get_text(&self, name: &str) -> Result<&str> {
        let value = self.get(name)?;
        value.as_text().ok_or_else(|| mismatch(name, "text", value))
    }

    pub fn get_int(&self, name: &str) -> Result<i64> {
        let value = self.get(name)?;
        value.as_int().ok_or_else(|| mismatch(name, "int", value))
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        let value = self.get(name)?;
        value.as_bool().ok_or_else(|| mismatch(name, "bool", value))
    }

    pub fn get_timestamp(&self, name: &str) -> Result<DateTime<Utc>> {
        let value = self.get(name)?;
        value.as_timestamp().ok_or_else(|| mismatch(name, "timestamp", value))
    }

    /// 写入字段
    ///
    /// 值与最后已知的服务器值相同时字段回到 Clean，避免无意义的写入。
    /// 失败时实例保持不变。
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        let value = value.into();
        let descriptor = self.model.field_named(name)?;
        if !descriptor.direction().is_writable() {
            return Err(BugTrackerError::ReadOnlyField {
                entity: self.model.kind().to_string(),
                field: name.to_string(),
            });
        }
        if !descriptor.kind().accepts(&value) {
            return Err(BugTrackerError::FieldTypeMismatch {
                field: name.to_string(),
                expected: descriptor.kind().as_str(),
                actual: value.type_name(),
            });
        }

        let next = match self.fields.remove(name) {
            None => FieldState::Dirty {
                value,
                baseline: None,
            },
            Some(FieldState::Clean(clean)) if clean == value => FieldState::Clean(clean),
            Some(FieldState::Clean(clean)) => FieldState::Dirty {
                value,
                baseline: Some(clean),
            },
            Some(FieldState::Dirty { baseline, .. }) if baseline.as_ref() == Some(&value) => {
                FieldState::Clean(value)
            }
            Some(FieldState::Dirty { baseline, .. }) => FieldState::Dirty { value, baseline },
        };
        self.fields.insert(name.to_string(), next);
        Ok(())
    }

    pub fn status(&self, name: &str) -> Result<FieldStatus> {
        let descriptor = self.model.field_named(name)?;
        Ok(match self.fields.get(descriptor.name()) {
            None => FieldStatus::Unloaded,
            Some(FieldState::Clean(_)) => FieldStatus::Clean,
            Some(FieldState::Dirty { .. }) => FieldStatus::Dirty,
        })
    }

    /// 待推送的字段名
    pub fn dirty_fields(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .filter(|(_, state)| matches!(state, FieldState::Dirty { .. }))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.fields
            .values()
            .any(|state| matches!(state, FieldState::Dirty { .. }))
    }

    /// 将指定字段的当前值作为新的服务器基线（幂等）
    pub fn mark_clean<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            if let Some(FieldState::Dirty { value, .. }) = self.fields.get(name) {
                let value = value.clone();
                self.fields.insert(name.to_string(), FieldState::Clean(value));
            }
        }
    }

    /// 放弃所有本地修改：有基线的回到基线，草稿字段回到 Unloaded
    pub fn discard_changes(&mut self) {
        let dirty = self.dirty_fields();
        for name in dirty {
            if let Some(FieldState::Dirty { baseline, .. }) = self.fields.remove(&name) {
                if let Some(baseline) = baseline {
                    self.fields.insert(name, FieldState::Clean(baseline));
                }
            }
        }
    }

    /// 远端标识（id 字段已加载时）
    pub fn remote_id(&self) -> Option<RemoteId> {
        let id_field = self.model.id_field()?;
        self.fields
            .get(id_field.name())
            .and_then(|state| RemoteId::from_field_value(state.value()))
    }

    /// 字段当前值（不区分 Clean / Dirty），未加载时为 None
    pub(crate) fn loaded_value(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).map(FieldState::value)
    }

    /// 由同步层写入服务器确认的值（绕过方向检查）
    pub(crate) fn store_clean(&mut self, descriptor: &FieldDescriptor, value: FieldValue) {
        self.fields
            .insert(descriptor.name().to_string(), FieldState::Clean(value));
    }

    /// 所有已加载字段标记为 Clean
    pub(crate) fn mark_all_clean(&mut self) {
        let names: Vec<String> = self.fields.keys().cloned().collect();
        self.mark_clean(names);
    }
}

fn mismatch(name: &str, expected: &'static str, value: &FieldValue) -> BugTrackerError {
    BugTrackerError::FieldTypeMismatch {
        field: name.to_string(),
        expected,
        actual: value.type_name(),
    }
}
