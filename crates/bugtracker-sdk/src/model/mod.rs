/// 实体模型层
///
/// 职责：
/// - 字段描述（方向 + 编解码器）
/// - 实体模型（有序字段表 + 远端方法）
/// - 数据驱动的模型配置

pub mod codec;
pub mod field;
pub mod entity_model;
pub mod config;

pub use codec::{FieldKind, FieldValue};
pub use field::{FieldDescriptor, FieldDirection};
pub use entity_model::{
    resolve_path, EntityModel, EntityModelBuilder, PathStep, RemoteId, RemoteMethod,
};
pub use config::{EntityModelConfig, FieldConfig, RemoteMethodConfig};
