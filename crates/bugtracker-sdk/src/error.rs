use thiserror::Error;

/// 传输层错误
///
/// 由 `RemoteTransport` 实现产生，同步层原样向上抛出（`Fault` 在 commit/create 时
/// 转换为 `CommitRejected`）。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// 连接失败（请求未到达服务器）
    #[error("connection failed: {0}")]
    Connection(String),
    /// 请求超时（请求可能已被服务器处理）
    #[error("request timed out: {0}")]
    Timeout(String),
    /// 协议错误（响应无法解析、HTTP 状态异常等）
    #[error("protocol error: {0}")]
    Protocol(String),
    /// 服务器拒绝了调用
    #[error("remote fault [{code}]: {message}")]
    Fault { code: i64, message: String },
}

impl TransportError {
    /// 请求是否确定未到达服务器（只有这种情况可以安全重发）
    pub fn is_connection(&self) -> bool {
        matches!(self, TransportError::Connection(_))
    }
}

#[derive(Debug, Error)]
pub enum BugTrackerError {
    #[error("unknown field `{field}` on entity `{entity}`")]
    UnknownField { entity: String, field: String },

    #[error("field `{field}` on entity `{entity}` is read-only")]
    ReadOnlyField { entity: String, field: String },

    #[error("field `{field}` on entity `{entity}` has not been loaded")]
    FieldNotLoaded { entity: String, field: String },

    #[error("commit rejected by remote: {reason}")]
    CommitRejected { reason: String, code: Option<i64> },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    // 以下为同步核心之外的辅助错误
    #[error("field `{field}` expects {expected}, got {actual}")]
    FieldTypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("cannot decode field `{field}`: {message}")]
    Decode { field: String, message: String },

    #[error("entity `{entity}` has no loaded identifier")]
    MissingIdentifier { entity: String },

    #[error("required field `{field}` missing for create on `{entity}`")]
    MissingRequiredField { entity: String, field: String },

    #[error("entity `{entity}` does not support {operation}")]
    UnsupportedOperation {
        entity: String,
        operation: &'static str,
    },

    #[error("unexpected response for `{entity}`: {message}")]
    UnexpectedResponse { entity: String, message: String },

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("unknown entity kind: {0}")]
    UnknownEntity(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BugTrackerError {
    /// 判断是否是远端拒绝提交
    pub fn is_commit_rejected(&self) -> bool {
        matches!(self, BugTrackerError::CommitRejected { .. })
    }

    /// 获取远端错误码（CommitRejected 或 Transport::Fault）
    pub fn fault_code(&self) -> Option<i64> {
        match self {
            BugTrackerError::CommitRejected { code, .. } => *code,
            BugTrackerError::Transport(TransportError::Fault { code, .. }) => Some(*code),
            _ => None,
        }
    }

    /// 将提交阶段的传输错误归类：服务器拒绝 → CommitRejected，其余原样保留
    pub(crate) fn from_commit_failure(error: TransportError) -> Self {
        match error {
            TransportError::Fault { code, message } => BugTrackerError::CommitRejected {
                reason: message,
                code: Some(code),
            },
            other => BugTrackerError::Transport(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, BugTrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_becomes_commit_rejected() {
        let err = BugTrackerError::from_commit_failure(TransportError::Fault {
            code: 115,
            message: "You are not allowed to edit this bug".to_string(),
        });
        assert!(err.is_commit_rejected());
        assert_eq!(err.fault_code(), Some(115));
    }

    #[test]
    fn network_failure_stays_transport() {
        let err = BugTrackerError::from_commit_failure(TransportError::Timeout("10s".to_string()));
        assert!(!err.is_commit_rejected());
        assert!(matches!(
            err,
            BugTrackerError::Transport(TransportError::Timeout(_))
        ));
        assert_eq!(err.fault_code(), None);
    }

    #[test]
    fn error_messages_name_the_field() {
        let err = BugTrackerError::ReadOnlyField {
            entity: "comment".to_string(),
            field: "id".to_string(),
        };
        assert_eq!(err.to_string(), "field `id` on entity `comment` is read-only");
    }
}
