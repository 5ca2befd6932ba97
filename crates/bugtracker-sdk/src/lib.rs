//! Bug tracker SDK - 远端实体同步核心
//!
//! 本 SDK 负责把 bug tracker（Bugzilla 等）RPC 接口上的远端对象映射为本地实体：
//! - 🧩 数据驱动的实体模型：字段方向（只读 / 只写 / 读写）+ 类型化编解码器
//! - ✏️ 字段级脏标记：只推送被修改的可写字段，改回原值自动清除
//! - 🔄 fetch / commit / create：失败时不改动本地 dirty/clean 状态
//! - 📡 可替换的传输层：JSON-RPC over HTTP、脚本化内存传输
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use bugtracker_sdk::{TrackerClient, TrackerConfig};
//! use bugtracker_sdk::presets::bugzilla;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TrackerConfig::builder()
//!         .endpoint("https://bugzilla.example.org/jsonrpc.cgi")
//!         .api_key("your-api-key")
//!         .bugzilla_presets()
//!         .build()?;
//!     let client = TrackerClient::new(config)?;
//!
//!     // 修改 bug 状态，只会发送 status 字段
//!     let mut bug = client.fetch(bugzilla::BUG, 1234).await?;
//!     bug.set("status", "RESOLVED")?;
//!     bug.set("resolution", "FIXED")?;
//!     client.commit(&mut bug).await?;
//!
//!     // 添加评论
//!     let model = client.model(bugzilla::COMMENT)?;
//!     let mut comment = bugzilla::new_comment(&model, 1234, "Fixed in r4567")?;
//!     let comment_id = client.create(&mut comment).await?;
//!     println!("comment {} created", comment_id);
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod wire;
pub mod model;
pub mod instance;
pub mod sync;
pub mod transport;
pub mod presets;
pub mod config;
pub mod client;

// 重新导出核心类型，方便使用
pub use error::{BugTrackerError, Result, TransportError};
pub use wire::{WireMap, WireValue};
pub use model::{
    EntityModel, EntityModelBuilder, EntityModelConfig, FieldDescriptor, FieldDirection,
    FieldKind, FieldValue, PathStep, RemoteId, RemoteMethod,
};
pub use instance::{EntityInstance, FieldStatus};
pub use sync::{CommitResult, Synchronizer};
pub use transport::{JsonRpcTransport, MockTransport, RecordedCall, RemoteTransport};
pub use config::{RetryConfig, TrackerConfig, TrackerConfigBuilder, TransportConfig};
pub use client::{ModelRegistry, TrackerClient};
