//! 同步器 - fetch / commit / create 的统一入口
//!
//! ## NOTE: Synchronizer 不做重试
//!
//! 超时与重试属于 `RemoteTransport`。同步器对传输错误不做任何恢复，原样上抛。
//!
//! 任何失败都不会改动实例的 dirty/clean 状态：fetch 返回新实例，commit 与 create 只在
//! 远端调用成功后才清除脏标记。future 在 await 中途被取消时同理，字段保持调用前的状态；
//! 但远端是否已经应用了这次调用无法从本地得知。

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::commit::{self, CommitResult};
use crate::error::{BugTrackerError, Result};
use crate::instance::EntityInstance;
use crate::model::{resolve_path, EntityModel, RemoteId};
use crate::transport::RemoteTransport;
use crate::wire::WireValue;

/// 同步器，除传输句柄外不持有任何状态
#[derive(Clone)]
pub struct Synchronizer {
    transport: Arc<dyn RemoteTransport>,
}

impl Synchronizer {
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn RemoteTransport> {
        &self.transport
    }

    /// 拉取远端实体，返回全部为 Clean 的新实例
    pub async fn fetch(
        &self,
        model: &Arc<EntityModel>,
        remote_id: impl Into<RemoteId>,
    ) -> Result<EntityInstance> {
        let id = remote_id.into();
        let method = model.read_method()?;

        let mut params = crate::wire::WireMap::new();
        commit::insert_id(&mut params, model, method, &id);

        debug!("fetch {} id={} via {}", model.kind(), id, method.name());
        let response = WireValue::Map(self.transport.call(method.name(), params).await?);

        let record = resolve_path(&response, model.record_path(), Some(&id))
            .and_then(WireValue::as_map)
            .ok_or_else(|| BugTrackerError::UnexpectedResponse {
                entity: model.kind().to_string(),
                message: format!("record for id {} not found in {} response", id, method.name()),
            })?;

        let instance = EntityInstance::from_wire(Arc::clone(model), record)?;
        info!("✅ fetch {} id={} 完成", model.kind(), id);
        Ok(instance)
    }

    /// 推送脏字段
    ///
    /// 没有脏字段时直接返回 `Unchanged`，不发起任何远端调用。一次调用要么全部应用，
    /// 要么全部不应用；服务器拒绝时返回 `CommitRejected`，字段保持 Dirty。
    pub async fn commit(&self, instance: &mut EntityInstance) -> Result<CommitResult> {
        let dirty = instance.dirty_fields();
        let model = Arc::clone(instance.model());
        if dirty.is_empty() {
            debug!("commit {}: 没有脏字段，跳过", model.kind());
            return Ok(CommitResult::Unchanged);
        }

        let method = model.update_method()?;
        let id = instance
            .remote_id()
            .ok_or_else(|| BugTrackerError::MissingIdentifier {
                entity: model.kind().to_string(),
            })?;
        let (params, sent) = commit::update_params(instance, method, &id, &dirty)?;

        debug!("commit {} id={} fields={:?}", model.kind(), id, sent);
        let response = self
            .transport
            .call(method.name(), params)
            .await
            .map_err(|e| {
                warn!("commit {} id={} 失败: {}", model.kind(), id, e);
                BugTrackerError::from_commit_failure(e)
            })?;

        instance.mark_clean(&sent);
        info!("✅ commit {} id={} 完成: {} 个字段", model.kind(), id, sent.len());
        Ok(CommitResult::Applied {
            fields: sent,
            response,
        })
    }

    /// 创建远端实体
    ///
    /// 发送所有已设置的可写字段（没有服务器状态可比较，不看脏标记）；成功后记录返回的
    /// id，全部字段标记为 Clean。
    pub async fn create(&self, instance: &mut EntityInstance) -> Result<RemoteId> {
        let model = Arc::clone(instance.model());
        let method = model.create_method()?;
        let params = commit::create_params(instance, method)?;

        debug!("create {} via {} ({} 个参数)", model.kind(), method.name(), params.len());
        let response = WireValue::Map(
            self.transport
                .call(method.name(), params)
                .await
                .map_err(|e| {
                    warn!("create {} 失败: {}", model.kind(), e);
                    BugTrackerError::from_commit_failure(e)
                })?,
        );

        let unexpected = |message: String| BugTrackerError::UnexpectedResponse {
            entity: model.kind().to_string(),
            message,
        };
        let id_wire = resolve_path(&response, model.created_id_path(), None)
            .ok_or_else(|| unexpected(format!("{} response carries no id", method.name())))?;
        let id = RemoteId::from_wire(id_wire)
            .ok_or_else(|| unexpected(format!("id is a {}", id_wire.type_name())))?;

        // 先解码再改动实例，保证失败时实例不变
        let id_value = match model.id_field() {
            Some(field) => Some((field, field.decode(id_wire)?)),
            None => None,
        };
        if let Some((field, value)) = id_value {
            instance.store_clean(field, value);
        }
        instance.mark_all_clean();

        info!("✅ create {} 完成: id={}", model.kind(), id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::instance::FieldStatus;
    use crate::model::{FieldDescriptor, FieldKind, PathStep, RemoteMethod};
    use crate::transport::MockTransport;
    use crate::wire::WireMap;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn comment_model() -> Arc<EntityModel> {
        EntityModel::builder("comment")
            .field(FieldDescriptor::read_only("id", FieldKind::Int))
            .field(FieldDescriptor::read_write("text", FieldKind::Text).required())
            .field(FieldDescriptor::read_only("creator", FieldKind::Text))
            .id_field("id")
            .read(RemoteMethod::new("Comment.get").with_id_param("id"))
            .update(RemoteMethod::new("Comment.update").with_id_param("id"))
            .create(RemoteMethod::new("Comment.create"))
            .build()
            .unwrap()
    }

    fn setup() -> (Arc<MockTransport>, Synchronizer) {
        let transport = Arc::new(MockTransport::new());
        let synchronizer = Synchronizer::new(transport.clone());
        (transport, synchronizer)
    }

    async fn fetched(transport: &MockTransport, synchronizer: &Synchronizer) -> EntityInstance {
        transport.push_json(json!({"id": 42, "text": "hello", "creator": "alice"}));
        synchronizer.fetch(&comment_model(), 42).await.unwrap()
    }

    #[tokio::test]
    async fn fetch_populates_clean_instance() {
        let (transport, synchronizer) = setup();
        let comment = fetched(&transport, &synchronizer).await;

        assert_eq!(comment.get_text("text").unwrap(), "hello");
        assert_eq!(comment.get_text("creator").unwrap(), "alice");
        assert!(comment.dirty_fields().is_empty());

        let call = transport.last_call().unwrap();
        assert_eq!(call.method, "Comment.get");
        assert_eq!(call.params.get("id"), Some(&WireValue::Int(42)));
    }

    #[tokio::test]
    async fn fetch_leaves_missing_fields_unloaded() {
        let (transport, synchronizer) = setup();
        transport.push_json(json!({"id": 5, "text": "hi", "reactions": 3}));
        let comment = synchronizer.fetch(&comment_model(), 5).await.unwrap();

        assert_eq!(comment.status("creator").unwrap(), FieldStatus::Unloaded);
        assert!(matches!(
            comment.get("creator"),
            Err(BugTrackerError::FieldNotLoaded { .. })
        ));
    }

    #[tokio::test]
    async fn fetch_follows_record_path() {
        let model = EntityModel::builder("comment")
            .field(FieldDescriptor::read_only("id", FieldKind::Int))
            .field(FieldDescriptor::read_write("text", FieldKind::Text))
            .id_field("id")
            .read(RemoteMethod::new("Bug.comments").with_id_list("comment_ids"))
            .record_path(vec![PathStep::Key("comments".into()), PathStep::RemoteId])
            .build()
            .unwrap();
        let (transport, synchronizer) = setup();
        transport.push_json(json!({"comments": {"9": {"id": 9, "text": "nested"}}}));

        let comment = synchronizer.fetch(&model, 9).await.unwrap();
        assert_eq!(comment.get_text("text").unwrap(), "nested");
        assert_eq!(
            transport.last_call().unwrap().params.get("comment_ids"),
            Some(&WireValue::List(vec![WireValue::Int(9)]))
        );

        transport.push_json(json!({"comments": {}}));
        let err = synchronizer.fetch(&model, 10).await.unwrap_err();
        assert!(matches!(err, BugTrackerError::UnexpectedResponse { .. }));
    }

    #[tokio::test]
    async fn fetch_surfaces_transport_error_unchanged() {
        let (transport, synchronizer) = setup();
        transport.push_error(TransportError::Fault {
            code: 101,
            message: "Comment #1 does not exist.".to_string(),
        });
        let err = synchronizer.fetch(&comment_model(), 1).await.unwrap_err();
        assert!(matches!(
            err,
            BugTrackerError::Transport(TransportError::Fault { code: 101, .. })
        ));
    }

    #[tokio::test]
    async fn commit_sends_only_dirty_fields_and_id() {
        let (transport, synchronizer) = setup();
        let mut comment = fetched(&transport, &synchronizer).await;

        comment.set("text", "hello world").unwrap();
        assert_eq!(comment.dirty_fields(), BTreeSet::from(["text".to_string()]));

        transport.push_json(json!({}));
        let result = synchronizer.commit(&mut comment).await.unwrap();
        assert_eq!(result.sent_fields(), ["text".to_string()]);

        let call = transport.last_call().unwrap();
        assert_eq!(call.method, "Comment.update");
        let mut expected = WireMap::new();
        expected.insert("id".to_string(), WireValue::Int(42));
        expected.insert("text".to_string(), WireValue::from("hello world"));
        assert_eq!(call.params, expected);

        assert!(comment.dirty_fields().is_empty());
        assert_eq!(comment.get_text("text").unwrap(), "hello world");
    }

    #[tokio::test]
    async fn commit_without_changes_makes_no_call() {
        let (transport, synchronizer) = setup();
        let mut comment = fetched(&transport, &synchronizer).await;
        let calls_before = transport.call_count();

        let result = synchronizer.commit(&mut comment).await.unwrap();
        assert!(result.is_noop());

        // 改了又改回来，同样不发请求
        comment.set("text", "draft").unwrap();
        comment.set("text", "hello").unwrap();
        let result = synchronizer.commit(&mut comment).await.unwrap();
        assert!(result.is_noop());

        assert_eq!(transport.call_count(), calls_before);
    }

    #[tokio::test]
    async fn failed_commit_keeps_fields_dirty() {
        let (transport, synchronizer) = setup();
        let mut comment = fetched(&transport, &synchronizer).await;
        comment.set("text", "hello world").unwrap();
        let before = comment.dirty_fields();

        transport.push_error(TransportError::Timeout("request timed out".to_string()));
        let err = synchronizer.commit(&mut comment).await.unwrap_err();
        assert!(matches!(
            err,
            BugTrackerError::Transport(TransportError::Timeout(_))
        ));
        assert_eq!(comment.dirty_fields(), before);

        transport.push_error(TransportError::Fault {
            code: 115,
            message: "not allowed".to_string(),
        });
        let err = synchronizer.commit(&mut comment).await.unwrap_err();
        assert!(err.is_commit_rejected());
        assert_eq!(comment.dirty_fields(), before);
    }

    #[tokio::test]
    async fn commit_requires_identifier() {
        let (transport, synchronizer) = setup();
        let mut draft = EntityInstance::draft(comment_model());
        draft.set("text", "never created").unwrap();

        let err = synchronizer.commit(&mut draft).await.unwrap_err();
        assert!(matches!(err, BugTrackerError::MissingIdentifier { .. }));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn create_records_id_and_cleans_fields() {
        let (transport, synchronizer) = setup();
        let mut draft = EntityInstance::draft(comment_model());
        draft.set("text", "first!").unwrap();

        transport.push_json(json!({"id": 77}));
        let id = synchronizer.create(&mut draft).await.unwrap();

        assert_eq!(id, RemoteId::Int(77));
        assert_eq!(draft.remote_id(), Some(RemoteId::Int(77)));
        assert_eq!(draft.status("id").unwrap(), FieldStatus::Clean);
        assert!(draft.dirty_fields().is_empty());

        let call = transport.last_call().unwrap();
        assert_eq!(call.method, "Comment.create");
        assert_eq!(call.params.get("text"), Some(&WireValue::from("first!")));
        assert!(!call.params.contains_key("id"));
    }

    #[tokio::test]
    async fn create_validates_before_calling() {
        let (transport, synchronizer) = setup();
        let mut draft = EntityInstance::draft(comment_model());
        let err = synchronizer.create(&mut draft).await.unwrap_err();
        assert!(matches!(err, BugTrackerError::MissingRequiredField { .. }));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn create_without_returned_id_leaves_draft_dirty() {
        let (transport, synchronizer) = setup();
        let mut draft = EntityInstance::draft(comment_model());
        draft.set("text", "first!").unwrap();

        transport.push_json(json!({"ok": true}));
        let err = synchronizer.create(&mut draft).await.unwrap_err();
        assert!(matches!(err, BugTrackerError::UnexpectedResponse { .. }));
        assert_eq!(draft.dirty_fields(), BTreeSet::from(["text".to_string()]));
    }

    #[tokio::test]
    async fn failed_create_leaves_draft_untouched() {
        let (transport, synchronizer) = setup();
        let mut draft = EntityInstance::draft(comment_model());
        draft.set("text", "first!").unwrap();
        let before = draft.dirty_fields();

        transport.push_error(TransportError::Fault {
            code: 54,
            message: "You must specify a comment.".to_string(),
        });
        let err = synchronizer.create(&mut draft).await.unwrap_err();
        assert!(err.is_commit_rejected());
        assert_eq!(err.fault_code(), Some(54));
        assert_eq!(draft.dirty_fields(), before);
        assert_eq!(draft.remote_id(), None);

        transport.push_error(TransportError::Timeout("request timed out".to_string()));
        let err = synchronizer.create(&mut draft).await.unwrap_err();
        assert!(matches!(
            err,
            BugTrackerError::Transport(TransportError::Timeout(_))
        ));
        assert_eq!(draft.dirty_fields(), before);
        assert_eq!(draft.remote_id(), None);
        assert_eq!(draft.get_text("text").unwrap(), "first!");
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn cancelled_commit_keeps_fields_dirty() {
        use crate::transport::RemoteTransport;
        use async_trait::async_trait;

        // 永不返回的传输
        struct Hang;
        #[async_trait]
        impl RemoteTransport for Hang {
            async fn call(
                &self,
                _: &str,
                _: WireMap,
            ) -> std::result::Result<WireMap, TransportError> {
                std::future::pending().await
            }
        }

        let (transport, synchronizer) = setup();
        let mut comment = fetched(&transport, &synchronizer).await;
        comment.set("text", "pending").unwrap();

        let hanging = Synchronizer::new(Arc::new(Hang));
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            hanging.commit(&mut comment),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(comment.dirty_fields(), BTreeSet::from(["text".to_string()]));
    }
}
