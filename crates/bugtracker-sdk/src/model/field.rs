use serde::{Deserialize, Serialize};

use super::codec::{FieldKind, FieldValue};
use crate::error::Result;
use crate::wire::WireValue;

/// 字段方向：由谁提供字段值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDirection {
    /// 仅服务器提供（id、creator、creation_time …）
    ReadOnly,
    /// 仅客户端提供，服务器不回传（如创建时附带的初始描述）
    WriteOnly,
    /// 双向
    ReadWrite,
}

impl FieldDirection {
    /// 客户端能否写入
    pub fn is_writable(self) -> bool {
        !matches!(self, FieldDirection::ReadOnly)
    }

    /// 能否从服务器响应中读取
    pub fn is_readable(self) -> bool {
        !matches!(self, FieldDirection::WriteOnly)
    }
}

/// 单个远端映射字段的描述，构造后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    wire_name: String,
    direction: FieldDirection,
    kind: FieldKind,
    required: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind, direction: FieldDirection) -> Self {
        let name = name.into();
        Self {
            wire_name: name.clone(),
            name,
            direction,
            kind,
            required: false,
        }
    }

    pub fn read_only(name: impl Into<String>, kind: FieldKind) -> Self {
        Self::new(name, kind, FieldDirection::ReadOnly)
    }

    pub fn read_write(name: impl Into<String>, kind: FieldKind) -> Self {
        Self::new(name, kind, FieldDirection::ReadWrite)
    }

    pub fn write_only(name: impl Into<String>, kind: FieldKind) -> Self {
        Self::new(name, kind, FieldDirection::WriteOnly)
    }

    /// 线上键名与本地字段名不同时使用
    pub fn with_wire_name(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = wire_name.into();
        self
    }

    /// 创建实体时必须提供
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    pub fn direction(&self) -> FieldDirection {
        self.direction
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn decode(&self, wire: &WireValue) -> Result<FieldValue> {
        self.kind.decode(&self.name, wire)
    }

    pub fn encode(&self, value: &FieldValue) -> Result<WireValue> {
        self.kind.encode(&self.name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_permissions() {
        assert!(!FieldDirection::ReadOnly.is_writable());
        assert!(FieldDirection::ReadOnly.is_readable());
        assert!(FieldDirection::WriteOnly.is_writable());
        assert!(!FieldDirection::WriteOnly.is_readable());
        assert!(FieldDirection::ReadWrite.is_writable());
        assert!(FieldDirection::ReadWrite.is_readable());
    }

    #[test]
    fn wire_name_defaults_to_field_name() {
        let field = FieldDescriptor::read_only("creator", FieldKind::Text);
        assert_eq!(field.wire_name(), "creator");

        let renamed = FieldDescriptor::read_write("text", FieldKind::Text)
            .with_wire_name("comment")
            .required();
        assert_eq!(renamed.name(), "text");
        assert_eq!(renamed.wire_name(), "comment");
        assert!(renamed.is_required());
    }
}
