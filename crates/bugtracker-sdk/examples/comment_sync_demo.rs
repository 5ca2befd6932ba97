//! 评论同步演示
//!
//! 使用脚本化的内存传输，演示 fetch → set → commit → create 的完整流程：
//!
//! ```bash
//! cargo run --example comment_sync_demo
//! ```

use std::sync::Arc;

use bugtracker_sdk::{
    EntityInstance, EntityModel, FieldDescriptor, FieldKind, MockTransport, RemoteMethod,
    Synchronizer, TransportError,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let comment_model = EntityModel::builder("comment")
        .field(FieldDescriptor::read_only("id", FieldKind::Int))
        .field(FieldDescriptor::read_write("text", FieldKind::Text).required())
        .field(FieldDescriptor::read_only("creator", FieldKind::Text))
        .field(FieldDescriptor::read_only("creation_time", FieldKind::Timestamp))
        .id_field("id")
        .read(RemoteMethod::new("Comment.get").with_id_param("id"))
        .update(RemoteMethod::new("Comment.update").with_id_param("id"))
        .create(RemoteMethod::new("Comment.create"))
        .build()?;

    let transport = Arc::new(MockTransport::new());
    let synchronizer = Synchronizer::new(transport.clone());

    // 1. 拉取
    transport.push_json(json!({
        "id": 42,
        "text": "hello",
        "creator": "alice",
        "creation_time": "2011-03-14T09:26:53Z",
    }));
    let mut comment = synchronizer.fetch(&comment_model, 42).await?;
    println!(
        "📥 comment #{} by {} at {}: {}",
        comment.get_int("id")?,
        comment.get_text("creator")?,
        comment.get_timestamp("creation_time")?,
        comment.get_text("text")?
    );

    // 2. 只读字段拒绝写入
    if let Err(e) = comment.set("id", 99) {
        println!("🚫 {}", e);
    }

    // 3. 修改并提交，只发送 text
    comment.set("text", "hello world")?;
    println!("✏️ dirty fields: {:?}", comment.dirty_fields());
    transport.push_json(json!({}));
    let result = synchronizer.commit(&mut comment).await?;
    println!("📤 sent {:?}, params {:?}", result.sent_fields(), transport.last_call());

    // 4. 无修改时 commit 不发请求
    let calls = transport.call_count();
    synchronizer.commit(&mut comment).await?;
    println!("💤 no-op commit, calls {} → {}", calls, transport.call_count());

    // 5. 传输失败后脏字段保留
    comment.set("text", "third edit")?;
    transport.push_error(TransportError::Timeout("request timed out".to_string()));
    if let Err(e) = synchronizer.commit(&mut comment).await {
        println!("⚠️ {}, still dirty: {:?}", e, comment.dirty_fields());
    }
    comment.discard_changes();

    // 6. 创建新评论
    let mut draft = EntityInstance::draft(Arc::clone(&comment_model));
    draft.set("text", "a brand new comment")?;
    transport.push_json(json!({"id": 43}));
    let id = synchronizer.create(&mut draft).await?;
    println!("🆕 created comment #{}", id);

    Ok(())
}
