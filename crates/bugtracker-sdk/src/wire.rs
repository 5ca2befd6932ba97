//! 线上值模型
//!
//! 与具体传输（XML-RPC / JSON-RPC）无关的结构化表示，字段编解码器只面向它。
//! JSON 传输时时间戳统一为 RFC 3339 字符串（UTC）。

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};

/// 参数 / 响应映射（有序，保证编码结果确定）
pub type WireMap = BTreeMap<String, WireValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    List(Vec<WireValue>),
    Map(WireMap),
}

impl WireValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::Bool(_) => "boolean",
            WireValue::Int(_) => "integer",
            WireValue::Float(_) => "float",
            WireValue::String(_) => "string",
            WireValue::Timestamp(_) => "timestamp",
            WireValue::List(_) => "list",
            WireValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }

    /// 取映射中的键（非映射返回 None）
    pub fn get(&self, key: &str) -> Option<&WireValue> {
        match self {
            WireValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// 取列表中的元素（非列表返回 None）
    pub fn index(&self, index: usize) -> Option<&WireValue> {
        match self {
            WireValue::List(items) => items.get(index),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&WireMap> {
        match self {
            WireValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for WireValue {
    fn from(value: bool) -> Self {
        WireValue::Bool(value)
    }
}

impl From<i64> for WireValue {
    fn from(value: i64) -> Self {
        WireValue::Int(value)
    }
}

impl From<i32> for WireValue {
    fn from(value: i32) -> Self {
        WireValue::Int(value as i64)
    }
}

impl From<f64> for WireValue {
    fn from(value: f64) -> Self {
        WireValue::Float(value)
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        WireValue::String(value.to_string())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        WireValue::String(value)
    }
}

impl From<DateTime<Utc>> for WireValue {
    fn from(value: DateTime<Utc>) -> Self {
        WireValue::Timestamp(value)
    }
}

impl From<Vec<WireValue>> for WireValue {
    fn from(value: Vec<WireValue>) -> Self {
        WireValue::List(value)
    }
}

impl From<WireMap> for WireValue {
    fn from(value: WireMap) -> Self {
        WireValue::Map(value)
    }
}

impl From<WireValue> for Value {
    fn from(value: WireValue) -> Self {
        match value {
            WireValue::Null => Value::Null,
            WireValue::Bool(b) => Value::Bool(b),
            WireValue::Int(i) => Value::Number(i.into()),
            // NaN / Infinity 在 JSON 中没有表示
            WireValue::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            WireValue::String(s) => Value::String(s),
            WireValue::Timestamp(ts) => {
                Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            WireValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            WireValue::Map(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for WireValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => WireValue::Null,
            Value::Bool(b) => WireValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    WireValue::Int(i)
                } else {
                    // 超出 i64 的 u64 也落到浮点
                    WireValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            // JSON 没有时间类型，时间戳以字符串到达，由时间戳编解码器负责解析
            Value::String(s) => WireValue::String(s),
            Value::Array(items) => {
                WireValue::List(items.into_iter().map(WireValue::from).collect())
            }
            Value::Object(map) => WireValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, WireValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// 将参数映射转为 JSON 对象
pub fn map_to_json(map: WireMap) -> Value {
    Value::from(WireValue::Map(map))
}
