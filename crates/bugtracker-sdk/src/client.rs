//! 客户端入口
//!
//! 把同步器和按实体类型索引的模型表组合在一起，应用层按名字操作实体。

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::TrackerConfig;
use crate::error::{BugTrackerError, Result};
use crate::instance::EntityInstance;
use crate::model::{EntityModel, RemoteId};
use crate::presets::bugzilla;
use crate::sync::{CommitResult, Synchronizer};
use crate::transport::{JsonRpcTransport, RemoteTransport};

/// 按实体类型索引的模型表
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<EntityModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: Arc<EntityModel>) -> Result<()> {
        let kind = model.kind().to_string();
        if self.models.contains_key(&kind) {
            return Err(BugTrackerError::InvalidModel(format!(
                "entity kind `{}` registered twice",
                kind
            )));
        }
        self.models.insert(kind, model);
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Result<Arc<EntityModel>> {
        self.models
            .get(kind)
            .cloned()
            .ok_or_else(|| BugTrackerError::UnknownEntity(kind.to_string()))
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.models.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Bug tracker 客户端
pub struct TrackerClient {
    synchronizer: Synchronizer,
    registry: ModelRegistry,
}

impl TrackerClient {
    /// 使用 JSON-RPC over HTTP 传输初始化
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let transport = JsonRpcTransport::new(config.transport.clone())?;
        Self::with_transport(&config, Arc::new(transport))
    }

    /// 使用自定义传输初始化
    pub fn with_transport(
        config: &TrackerConfig,
        transport: Arc<dyn RemoteTransport>,
    ) -> Result<Self> {
        let mut registry = ModelRegistry::new();
        if config.use_bugzilla_presets {
            for model in bugzilla::models()? {
                registry.register(model)?;
            }
        }
        for model_config in &config.models {
            registry.register(model_config.build()?)?;
        }

        info!("✅ TrackerClient 已初始化，实体类型: {:?}", registry.kinds());

        Ok(Self {
            synchronizer: Synchronizer::new(transport),
            registry,
        })
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }

    pub fn model(&self, kind: &str) -> Result<Arc<EntityModel>> {
        self.registry.get(kind)
    }

    /// 新建待创建的实体
    pub fn draft(&self, kind: &str) -> Result<EntityInstance> {
        Ok(EntityInstance::draft(self.registry.get(kind)?))
    }

    pub async fn fetch(
        &self,
        kind: &str,
        remote_id: impl Into<RemoteId>,
    ) -> Result<EntityInstance> {
        let model = self.registry.get(kind)?;
        self.synchronizer.fetch(&model, remote_id).await
    }

    pub async fn commit(&self, instance: &mut EntityInstance) -> Result<CommitResult> {
        self.synchronizer.commit(instance).await
    }

    pub async fn create(&self, instance: &mut EntityInstance) -> Result<RemoteId> {
        self.synchronizer.create(instance).await
    }
}
