//! 字段编解码器
//!
//! `FieldKind` 描述字段的类型化取值域，负责 线上值 ⇄ 类型化值 的转换。
//! 解码对服务器端的几种常见表示宽容（XML-RPC 的整数布尔、紧凑日期格式等），
//! 编码总是产生规范形式，因此 `decode(encode(v)) == v`。

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BugTrackerError, Result};
use crate::wire::WireValue;

/// XML-RPC dateTime.iso8601 的紧凑格式，例如 20110314T09:26:53
const XMLRPC_DATETIME_FORMAT: &str = "%Y%m%dT%H:%M:%S";

/// 类型化字段值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    TextList(Vec<String>),
    IntList(Vec<i64>),
    /// 不做类型约束的原始线上值
    Raw(WireValue),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::TextList(_) => "text_list",
            FieldValue::IntList(_) => "int_list",
            FieldValue::Raw(_) => "raw",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::TextList(value)
    }
}

impl From<Vec<i64>> for FieldValue {
    fn from(value: Vec<i64>) -> Self {
        FieldValue::IntList(value)
    }
}

impl From<WireValue> for FieldValue {
    fn from(value: WireValue) -> Self {
        FieldValue::Raw(value)
    }
}

/// 字段类型（编解码器）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Text,
    Timestamp,
    TextList,
    IntList,
    Raw,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::Int => "int",
            FieldKind::Float => "float",
            FieldKind::Text => "text",
            FieldKind::Timestamp => "timestamp",
            FieldKind::TextList => "text_list",
            FieldKind::IntList => "int_list",
            FieldKind::Raw => "raw",
        }
    }

    /// 值是否在本类型的取值域内
    ///
    /// NaN 与无穷大不在 Float 的取值域内：它们无法与原值比较，JSON 上也无法表示。
    pub fn accepts(self, value: &FieldValue) -> bool {
        if let FieldValue::Float(f) = value {
            return self == FieldKind::Float && f.is_finite();
        }
        matches!(
            (self, value),
            (FieldKind::Bool, FieldValue::Bool(_))
                | (FieldKind::Int, FieldValue::Int(_))
                | (FieldKind::Float, FieldValue::Float(_))
                | (FieldKind::Text, FieldValue::Text(_))
                | (FieldKind::Timestamp, FieldValue::Timestamp(_))
                | (FieldKind::TextList, FieldValue::TextList(_))
                | (FieldKind::IntList, FieldValue::IntList(_))
                | (FieldKind::Raw, FieldValue::Raw(_))
        )
    }

    /// 线上值 → 类型化值
    pub fn decode(self, field: &str, wire: &WireValue) -> Result<FieldValue> {
        let decoded = match (self, wire) {
            (FieldKind::Raw, other) => Some(FieldValue::Raw(other.clone())),

            (FieldKind::Bool, WireValue::Bool(b)) => Some(FieldValue::Bool(*b)),
            // XML-RPC <boolean> 只有 0 / 1
            (FieldKind::Bool, WireValue::Int(0)) => Some(FieldValue::Bool(false)),
            (FieldKind::Bool, WireValue::Int(1)) => Some(FieldValue::Bool(true)),

            (FieldKind::Int, WireValue::Int(i)) => Some(FieldValue::Int(*i)),
            (FieldKind::Int, WireValue::Float(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Some(FieldValue::Int(*f as i64))
            }
            (FieldKind::Int, WireValue::String(s)) => s.trim().parse().ok().map(FieldValue::Int),

            (FieldKind::Float, WireValue::Float(f)) => Some(FieldValue::Float(*f)),
            (FieldKind::Float, WireValue::Int(i)) => Some(FieldValue::Float(*i as f64)),

            (FieldKind::Text, WireValue::String(s)) => Some(FieldValue::Text(s.clone())),

            (FieldKind::Timestamp, WireValue::Timestamp(ts)) => Some(FieldValue::Timestamp(*ts)),
            (FieldKind::Timestamp, WireValue::String(s)) => {
                parse_timestamp(s).map(FieldValue::Timestamp)
            }
            // 数字时间戳按 UNIX 毫秒（UTC）处理
            (FieldKind::Timestamp, WireValue::Int(ms)) => {
                Utc.timestamp_millis_opt(*ms).single().map(FieldValue::Timestamp)
            }

            (FieldKind::TextList, WireValue::List(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(FieldValue::TextList),
            (FieldKind::IntList, WireValue::List(items)) => items
                .iter()
                .map(WireValue::as_i64)
                .collect::<Option<Vec<_>>>()
                .map(FieldValue::IntList),

            _ => None,
        };

        decoded.ok_or_else(|| BugTrackerError::Decode {
            field: field.to_string(),
            message: format!("cannot read {} as {}", describe(wire), self.as_str()),
        })
    }

    /// 类型化值 → 线上值
    pub fn encode(self, field: &str, value: &FieldValue) -> Result<WireValue> {
        if !self.accepts(value) {
            return Err(BugTrackerError::FieldTypeMismatch {
                field: field.to_string(),
                expected: self.as_str(),
                actual: value.type_name(),
            });
        }

        Ok(match value {
            FieldValue::Bool(b) => WireValue::Bool(*b),
            FieldValue::Int(i) => WireValue::Int(*i),
            FieldValue::Float(f) => WireValue::Float(*f),
            FieldValue::Text(s) => WireValue::String(s.clone()),
            FieldValue::Timestamp(ts) => WireValue::Timestamp(*ts),
            FieldValue::TextList(items) => {
                WireValue::List(items.iter().cloned().map(WireValue::String).collect())
            }
            FieldValue::IntList(items) => {
                WireValue::List(items.iter().copied().map(WireValue::Int).collect())
            }
            FieldValue::Raw(wire) => wire.clone(),
        })
    }
}

/// 解析 RFC 3339 或 XML-RPC 紧凑格式（无时区，按 UTC）
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, XMLRPC_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn describe(wire: &WireValue) -> String {
    match wire {
        WireValue::String(s) => format!("string {:?}", s),
        WireValue::Int(i) => format!("integer {}", i),
        other => other.type_name().to_string(),
    }
}
