//! 推送参数的组装
//!
//! 只负责把实例的字段编码成一次远端调用的参数，不做 I/O。

use std::collections::BTreeSet;

use crate::error::{BugTrackerError, Result};
use crate::instance::EntityInstance;
use crate::model::{EntityModel, RemoteId, RemoteMethod};
use crate::wire::WireMap;

/// commit 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum CommitResult {
    /// 没有脏字段，未发起远端调用
    Unchanged,
    /// 已推送并被服务器接受
    Applied {
        /// 本次发送的字段（模型声明顺序）
        fields: Vec<String>,
        /// 服务器响应
        response: WireMap,
    },
}

impl CommitResult {
    pub fn is_noop(&self) -> bool {
        matches!(self, CommitResult::Unchanged)
    }

    pub fn sent_fields(&self) -> &[String] {
        match self {
            CommitResult::Unchanged => &[],
            CommitResult::Applied { fields, .. } => fields,
        }
    }
}

/// 写入实体 id 参数
///
/// 方法未声明 id 参数时使用 id 字段的线上键名。
pub(crate) fn insert_id(
    params: &mut WireMap,
    model: &EntityModel,
    method: &RemoteMethod,
    id: &RemoteId,
) {
    if let Some((key, value)) = method.id_entry(id) {
        params.insert(key, value);
    } else {
        let key = model.id_field().map(|f| f.wire_name()).unwrap_or("id");
        params.insert(key.to_string(), id.to_wire());
    }
}

/// update 参数：id + 指定的脏字段；返回参数与实际发送的字段名
pub(crate) fn update_params(
    instance: &EntityInstance,
    method: &RemoteMethod,
    id: &RemoteId,
    dirty: &BTreeSet<String>,
) -> Result<(WireMap, Vec<String>)> {
    let model = instance.model();
    let mut params = WireMap::new();
    insert_id(&mut params, model, method, id);

    let mut sent = Vec::with_capacity(dirty.len());
    for field in model.fields().iter().filter(|f| dirty.contains(f.name())) {
        let Some(value) = instance.loaded_value(field.name()) else {
            continue;
        };
        let key = method.param_key(field.wire_name());
        if params.contains_key(key) {
            return Err(BugTrackerError::InvalidModel(format!(
                "field `{}` of `{}` would overwrite parameter `{}` of `{}`",
                field.name(),
                model.kind(),
                key,
                method.name()
            )));
        }
        params.insert(key.to_string(), field.encode(value)?);
        sent.push(field.name().to_string());
    }
    Ok((params, sent))
}

/// create 参数：全部已设置的可写字段（无论脏否），缺少必填字段时失败
pub(crate) fn create_params(instance: &EntityInstance, method: &RemoteMethod) -> Result<WireMap> {
    let model = instance.model();
    let mut params = WireMap::new();

    for field in model.fields().iter().filter(|f| f.direction().is_writable()) {
        match instance.loaded_value(field.name()) {
            Some(value) => {
                params.insert(
                    method.param_key(field.wire_name()).to_string(),
                    field.encode(value)?,
                );
            }
            None if field.is_required() => {
                return Err(BugTrackerError::MissingRequiredField {
                    entity: model.kind().to_string(),
                    field: field.name().to_string(),
                });
            }
            None => {}
        }
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDescriptor, FieldKind};
    use crate::wire::WireValue;
    use std::sync::Arc;

    fn bug_model() -> Arc<EntityModel> {
        EntityModel::builder("bug")
            .field(FieldDescriptor::read_only("id", FieldKind::Int))
            .field(FieldDescriptor::read_write("summary", FieldKind::Text).required())
            .field(FieldDescriptor::read_write("product", FieldKind::Text).required())
            .field(FieldDescriptor::read_write("status", FieldKind::Text))
            .field(FieldDescriptor::write_only("description", FieldKind::Text))
            .field(FieldDescriptor::read_only("creator", FieldKind::Text))
            .id_field("id")
            .build()
            .unwrap()
    }

    #[test]
    fn update_params_only_carry_dirty_fields() {
        let mut record = WireMap::new();
        record.insert("id".to_string(), WireValue::Int(7));
        record.insert("summary".to_string(), WireValue::from("Crash"));
        record.insert("status".to_string(), WireValue::from("NEW"));
        let mut bug = EntityInstance::from_wire(bug_model(), &record).unwrap();
        bug.set("status", "ASSIGNED").unwrap();

        let method = RemoteMethod::new("Bug.update").with_id_list("ids");
        let id = bug.remote_id().unwrap();
        let (params, sent) = update_params(&bug, &method, &id, &bug.dirty_fields()).unwrap();

        assert_eq!(sent, vec!["status".to_string()]);
        assert_eq!(params.len(), 2);
        assert_eq!(params["ids"], WireValue::List(vec![WireValue::Int(7)]));
        assert_eq!(params["status"], WireValue::from("ASSIGNED"));
    }

    #[test]
    fn update_params_refuse_to_overwrite_id() {
        // 模型未声明 update 方法，构建期检查不会触发
        let model = EntityModel::builder("attachment")
            .field(FieldDescriptor::read_only("id", FieldKind::Int))
            .field(
                FieldDescriptor::write_only("target_bugs", FieldKind::IntList)
                    .with_wire_name("ids"),
            )
            .id_field("id")
            .build()
            .unwrap();
        let mut record = WireMap::new();
        record.insert("id".to_string(), WireValue::Int(88));
        let mut attachment = EntityInstance::from_wire(model, &record).unwrap();
        attachment.set("target_bugs", vec![7_i64]).unwrap();

        let method = RemoteMethod::new("Bug.update_attachment").with_id_list("ids");
        let dirty = attachment.dirty_fields();
        let err = update_params(&attachment, &method, &RemoteId::Int(88), &dirty).unwrap_err();
        assert!(matches!(err, BugTrackerError::InvalidModel(_)));
        assert_eq!(attachment.dirty_fields().len(), 1);
    }

    #[test]
    fn id_falls_back_to_id_field_wire_name() {
        let model = bug_model();
        let mut params = WireMap::new();
        insert_id(&mut params, &model, &RemoteMethod::new("Bug.update"), &RemoteId::Int(3));
        assert_eq!(params.get("id"), Some(&WireValue::Int(3)));
    }

    #[test]
    fn create_params_include_clean_writable_fields() {
        let mut draft = EntityInstance::draft(bug_model());
        draft.set("summary", "Crash on save").unwrap();
        draft.set("product", "Firefox").unwrap();
        draft.set("description", "Steps: ...").unwrap();
        // 模拟已部分确认的字段：clean 的可写字段同样要发送
        draft.mark_clean(["product"]);

        let method = RemoteMethod::new("Bug.create").with_alias("description", "comment");
        let params = create_params(&draft, &method).unwrap();

        assert_eq!(params.len(), 3);
        assert_eq!(params["product"], WireValue::from("Firefox"));
        assert_eq!(params["comment"], WireValue::from("Steps: ..."));
        assert!(!params.contains_key("status"));
    }

    #[test]
    fn create_params_require_required_fields() {
        let mut draft = EntityInstance::draft(bug_model());
        draft.set("summary", "Crash on save").unwrap();
        let err = create_params(&draft, &RemoteMethod::new("Bug.create")).unwrap_err();
        assert!(matches!(
            err,
            BugTrackerError::MissingRequiredField { ref field, .. } if field == "product"
        ));
    }

    #[test]
    fn commit_result_helpers() {
        assert!(CommitResult::Unchanged.is_noop());
        assert!(CommitResult::Unchanged.sent_fields().is_empty());
        let applied = CommitResult::Applied {
            fields: vec!["text".to_string()],
            response: WireMap::new(),
        };
        assert!(!applied.is_noop());
        assert_eq!(applied.sent_fields(), ["text".to_string()]);
    }
}
