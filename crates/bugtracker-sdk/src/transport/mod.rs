//! 远端传输
//!
//! 同步层只依赖 `RemoteTransport::call(method, params)`，连接、鉴权、超时、重试都属于
//! 传输实现，不进入同步逻辑。

pub mod http;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::wire::WireMap;

pub use http::JsonRpcTransport;
pub use mock::{MockTransport, RecordedCall};

/// 执行一次命名的远端调用
///
/// 调用可能阻塞在网络 I/O 上；实现自行负责超时与重试策略。
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn call(&self, method: &str, params: WireMap) -> Result<WireMap, TransportError>;
}

#[async_trait]
impl<T: RemoteTransport + ?Sized> RemoteTransport for Arc<T> {
    async fn call(&self, method: &str, params: WireMap) -> Result<WireMap, TransportError> {
        (**self).call(method, params).await
    }
}
