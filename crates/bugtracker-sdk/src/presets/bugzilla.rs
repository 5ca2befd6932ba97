//! Bugzilla 5 WebService 的实体模型
//!
//! 字段表与方法名对应 Bugzilla 的 JSON-RPC / XML-RPC 接口。Bugzilla 不允许修改已有评论，
//! 因此 comment 模型没有 update 方法。

use std::sync::Arc;

use crate::error::Result;
use crate::instance::EntityInstance;
use crate::model::{EntityModel, FieldDescriptor, FieldKind, PathStep, RemoteMethod};

pub const BUG: &str = "bug";
pub const COMMENT: &str = "comment";
pub const ATTACHMENT: &str = "attachment";

fn path(steps: &[&str]) -> Vec<PathStep> {
    steps.iter().map(|s| PathStep::parse(s)).collect()
}

pub fn bug_model() -> Result<Arc<EntityModel>> {
    EntityModel::builder(BUG)
        .field(FieldDescriptor::read_only("id", FieldKind::Int))
        .field(FieldDescriptor::read_write("summary", FieldKind::Text).required())
        .field(FieldDescriptor::read_write("product", FieldKind::Text).required())
        .field(FieldDescriptor::read_write("component", FieldKind::Text).required())
        .field(FieldDescriptor::read_write("version", FieldKind::Text).required())
        .field(FieldDescriptor::read_write("status", FieldKind::Text))
        .field(FieldDescriptor::read_write("resolution", FieldKind::Text))
        .field(FieldDescriptor::read_write("priority", FieldKind::Text))
        .field(FieldDescriptor::read_write("severity", FieldKind::Text))
        .field(FieldDescriptor::read_write("op_sys", FieldKind::Text))
        .field(FieldDescriptor::read_write("platform", FieldKind::Text))
        .field(FieldDescriptor::read_write("assigned_to", FieldKind::Text))
        .field(FieldDescriptor::read_write("url", FieldKind::Text))
        .field(FieldDescriptor::read_write("whiteboard", FieldKind::Text))
        .field(FieldDescriptor::read_only("creator", FieldKind::Text))
        .field(FieldDescriptor::read_only("creation_time", FieldKind::Timestamp))
        .field(FieldDescriptor::read_only("last_change_time", FieldKind::Timestamp))
        .field(FieldDescriptor::read_only("is_open", FieldKind::Bool))
        .field(FieldDescriptor::read_only("cc", FieldKind::TextList))
        // 创建时的首条评论
        .field(FieldDescriptor::write_only("description", FieldKind::Text))
        .id_field("id")
        .read(RemoteMethod::new("Bug.get").with_id_list("ids"))
        .update(RemoteMethod::new("Bug.update").with_id_list("ids"))
        .create(RemoteMethod::new("Bug.create"))
        .record_path(path(&["bugs", "0"]))
        .build()
}

pub fn comment_model() -> Result<Arc<EntityModel>> {
    EntityModel::builder(COMMENT)
        .field(FieldDescriptor::read_only("id", FieldKind::Int))
        .field(FieldDescriptor::read_write("bug_id", FieldKind::Int).required())
        .field(FieldDescriptor::read_write("text", FieldKind::Text).required())
        .field(FieldDescriptor::read_only("creator", FieldKind::Text))
        .field(FieldDescriptor::read_only("creation_time", FieldKind::Timestamp))
        .field(FieldDescriptor::read_write("is_private", FieldKind::Bool))
        .field(FieldDescriptor::read_only("count", FieldKind::Int))
        .field(FieldDescriptor::read_only("attachment_id", FieldKind::Int))
        .id_field("id")
        .read(RemoteMethod::new("Bug.comments").with_id_list("comment_ids"))
        .create(
            RemoteMethod::new("Bug.add_comment")
                .with_alias("bug_id", "id")
                .with_alias("text", "comment"),
        )
        .record_path(path(&["comments", "{id}"]))
        .build()
}

pub fn attachment_model() -> Result<Arc<EntityModel>> {
    EntityModel::builder(ATTACHMENT)
        .field(FieldDescriptor::read_only("id", FieldKind::Int))
        .field(FieldDescriptor::read_only("bug_id", FieldKind::Int))
        // Bug.add_attachment 以 ids 数组指定目标 bug，别名只挂在 create 上
        .field(FieldDescriptor::write_only("target_bugs", FieldKind::IntList).required())
        .field(FieldDescriptor::read_write("file_name", FieldKind::Text).required())
        .field(FieldDescriptor::read_write("summary", FieldKind::Text).required())
        .field(FieldDescriptor::read_write("content_type", FieldKind::Text).required())
        // base64 编码的内容
        .field(FieldDescriptor::write_only("data", FieldKind::Text).required())
        .field(FieldDescriptor::read_write("is_patch", FieldKind::Bool))
        .field(FieldDescriptor::read_write("is_obsolete", FieldKind::Bool))
        .field(FieldDescriptor::read_write("is_private", FieldKind::Bool))
        .field(FieldDescriptor::read_only("creator", FieldKind::Text))
        .field(FieldDescriptor::read_only("creation_time", FieldKind::Timestamp))
        .field(FieldDescriptor::read_only("last_change_time", FieldKind::Timestamp))
        .field(FieldDescriptor::read_only("size", FieldKind::Int))
        .id_field("id")
        .read(RemoteMethod::new("Bug.attachments").with_id_list("attachment_ids"))
        .update(RemoteMethod::new("Bug.update_attachment").with_id_list("ids"))
        .create(RemoteMethod::new("Bug.add_attachment").with_alias("target_bugs", "ids"))
        .record_path(path(&["attachments", "{id}"]))
        .created_id_path(path(&["ids", "0"]))
        .build()
}

/// 全部内置模型
pub fn models() -> Result<Vec<Arc<EntityModel>>> {
    Ok(vec![bug_model()?, comment_model()?, attachment_model()?])
}

/// 待提交到某个 bug 的新评论
pub fn new_comment(
    model: &Arc<EntityModel>,
    bug_id: i64,
    text: impl Into<String>,
) -> Result<EntityInstance> {
    let mut comment = EntityInstance::draft(Arc::clone(model));
    comment.set("bug_id", bug_id)?;
    comment.set("text", text.into())?;
    Ok(comment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BugTrackerError;
    use crate::model::{FieldValue, RemoteId};
    use crate::sync::Synchronizer;
    use crate::transport::MockTransport;
    use crate::wire::WireValue;
    use serde_json::json;

    #[test]
    fn presets_build() {
        let models = models().unwrap();
        let kinds: Vec<&str> = models.iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, vec![BUG, COMMENT, ATTACHMENT]);
    }

    #[tokio::test]
    async fn fetch_bugzilla_comment() {
        let model = comment_model().unwrap();
        let transport = Arc::new(MockTransport::new());
        let synchronizer = Synchronizer::new(transport.clone());
        transport.push_json(json!({
            "comments": {
                "42": {
                    "id": 42,
                    "bug_id": 7,
                    "text": "hello",
                    "creator": "alice@example.org",
                    "creation_time": "2011-03-14T09:26:53Z",
                    "time": "2011-03-14T09:26:53Z",
                    "is_private": false,
                    "count": 1,
                    "attachment_id": null,
                    "tags": []
                }
            },
            "bugs": {}
        }));

        let comment = synchronizer.fetch(&model, 42).await.unwrap();
        assert_eq!(comment.get_text("creator").unwrap(), "alice@example.org");
        assert_eq!(comment.get_int("count").unwrap(), 1);
        assert!(!comment.get_bool("is_private").unwrap());
        assert!(matches!(
            comment.get("attachment_id"),
            Err(BugTrackerError::FieldNotLoaded { .. })
        ));

        let call = transport.last_call().unwrap();
        assert_eq!(call.method, "Bug.comments");
        assert_eq!(
            call.params.get("comment_ids"),
            Some(&WireValue::List(vec![WireValue::Int(42)]))
        );
    }

    #[tokio::test]
    async fn add_comment_uses_bugzilla_param_names() {
        let model = comment_model().unwrap();
        let transport = Arc::new(MockTransport::new());
        let synchronizer = Synchronizer::new(transport.clone());
        transport.push_json(json!({"id": 501}));

        let mut comment = new_comment(&model, 7, "Still reproducible on 5.0.4").unwrap();
        let id = synchronizer.create(&mut comment).await.unwrap();
        assert_eq!(id.to_string(), "501");
        assert_eq!(comment.get_int("id").unwrap(), 501);

        let params = transport.last_call().unwrap().params;
        assert_eq!(params.get("id"), Some(&WireValue::Int(7)));
        assert_eq!(
            params.get("comment"),
            Some(&WireValue::from("Still reproducible on 5.0.4"))
        );
        assert!(!params.contains_key("text"));
    }

    #[tokio::test]
    async fn comments_cannot_be_edited() {
        let model = comment_model().unwrap();
        let transport = Arc::new(MockTransport::new());
        let synchronizer = Synchronizer::new(transport.clone());
        transport.push_json(json!({"comments": {"42": {"id": 42, "bug_id": 7, "text": "hello"}}}));

        let mut comment = synchronizer.fetch(&model, 42).await.unwrap();
        comment.set("text", "edited").unwrap();
        let err = synchronizer.commit(&mut comment).await.unwrap_err();
        assert!(matches!(err, BugTrackerError::UnsupportedOperation { .. }));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn bug_update_uses_ids_list() {
        let model = bug_model().unwrap();
        let transport = Arc::new(MockTransport::new());
        let synchronizer = Synchronizer::new(transport.clone());
        transport.push_json(json!({
            "bugs": [{
                "id": 7,
                "summary": "Crash on save",
                "status": "NEW",
                "cc": ["bob@example.org"],
                "creation_time": "2011-03-14T09:26:53Z",
                "flags": []
            }],
            "faults": []
        }));

        let mut bug = synchronizer.fetch(&model, 7).await.unwrap();
        assert_eq!(
            bug.get("cc").unwrap(),
            &FieldValue::TextList(vec!["bob@example.org".to_string()])
        );
        bug.set("status", "RESOLVED").unwrap();
        bug.set("resolution", "FIXED").unwrap();

        transport.push_json(json!({"bugs": [{"id": 7, "changes": {}}]}));
        synchronizer.commit(&mut bug).await.unwrap();

        let params = transport.last_call().unwrap().params;
        assert_eq!(params.len(), 3);
        assert_eq!(params["ids"], WireValue::List(vec![WireValue::Int(7)]));
        assert_eq!(params["status"], WireValue::from("RESOLVED"));
        assert_eq!(params["resolution"], WireValue::from("FIXED"));
    }

    #[tokio::test]
    async fn attachment_update_keeps_its_own_id() {
        let model = attachment_model().unwrap();
        let transport = Arc::new(MockTransport::new());
        let synchronizer = Synchronizer::new(transport.clone());
        transport.push_json(json!({
            "attachments": {
                "88": {"id": 88, "bug_id": 7, "file_name": "trace.log", "summary": "Stack trace"}
            }
        }));

        let mut attachment = synchronizer.fetch(&model, 88).await.unwrap();
        attachment.set("target_bugs", vec![7_i64]).unwrap();
        attachment.set("summary", "renamed").unwrap();

        transport.push_json(json!({"attachments": [{"id": 88, "changes": {}}]}));
        synchronizer.commit(&mut attachment).await.unwrap();

        let call = transport.last_call().unwrap();
        assert_eq!(call.method, "Bug.update_attachment");
        assert_eq!(call.params["ids"], WireValue::List(vec![WireValue::Int(88)]));
        assert_eq!(call.params["summary"], WireValue::from("renamed"));
        assert_eq!(attachment.remote_id(), Some(RemoteId::Int(88)));
    }

    #[tokio::test]
    async fn add_attachment_reads_id_from_ids_list() {
        let model = attachment_model().unwrap();
        let transport = Arc::new(MockTransport::new());
        let synchronizer = Synchronizer::new(transport.clone());
        transport.push_json(json!({"ids": [88]}));

        let mut attachment = EntityInstance::draft(Arc::clone(&model));
        attachment.set("target_bugs", vec![7_i64]).unwrap();
        attachment.set("file_name", "trace.log").unwrap();
        attachment.set("summary", "Stack trace").unwrap();
        attachment.set("content_type", "text/plain").unwrap();
        attachment.set("data", "U3RhY2s=").unwrap();

        let id = synchronizer.create(&mut attachment).await.unwrap();
        assert_eq!(id.to_string(), "88");
        assert!(!attachment.is_dirty());

        let params = transport.last_call().unwrap().params;
        assert_eq!(params["ids"], WireValue::List(vec![WireValue::Int(7)]));
        assert_eq!(params["data"], WireValue::from("U3RhY2s="));
    }
}
