//! 脚本化的内存传输，按顺序返回预设响应并记录每次调用

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::RemoteTransport;
use crate::error::TransportError;
use crate::wire::{WireMap, WireValue};

/// 一次被记录的调用
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: WireMap,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<WireMap, TransportError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个成功响应
    pub fn push_response(&self, response: WireMap) {
        self.responses.lock().push_back(Ok(response));
    }

    /// 以 JSON 追加成功响应（必须是对象）
    pub fn push_json(&self, response: serde_json::Value) {
        let map = match WireValue::from(response) {
            WireValue::Map(map) => map,
            other => {
                let mut map = WireMap::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        self.push_response(map);
    }

    /// 追加一个失败响应
    pub fn push_error(&self, error: TransportError) {
        self.responses.lock().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().last().cloned()
    }

    /// 尚未被消费的预设响应数
    pub fn pending_responses(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl RemoteTransport for MockTransport {
    async fn call(&self, method: &str, params: WireMap) -> Result<WireMap, TransportError> {
        self.calls.lock().push(RecordedCall {
            method: method.to_string(),
            params,
        });
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(TransportError::Protocol(format!(
                "no scripted response for `{}`",
                method
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replays_responses_in_order() {
        let transport = MockTransport::new();
        transport.push_json(json!({"id": 1}));
        transport.push_error(TransportError::Timeout("slow".to_string()));

        let first = transport.call("Bug.get", WireMap::new()).await.unwrap();
        assert_eq!(first.get("id"), Some(&WireValue::Int(1)));

        let second = transport.call("Bug.update", WireMap::new()).await;
        assert!(matches!(second, Err(TransportError::Timeout(_))));

        let third = transport.call("Bug.get", WireMap::new()).await;
        assert!(matches!(third, Err(TransportError::Protocol(_))));

        let methods: Vec<String> = transport.calls().into_iter().map(|c| c.method).collect();
        assert_eq!(methods, vec!["Bug.get", "Bug.update", "Bug.get"]);
        assert_eq!(transport.pending_responses(), 0);
    }
}
