/// 实体同步模块
///
/// 职责：
/// - 拉取远端实体（fetch）并解码为 Clean 实例
/// - 只推送脏的可写字段（commit），成功后清除脏标记
/// - 创建远端实体（create）并记录返回的 id

pub mod commit;
pub mod synchronizer;

pub use commit::CommitResult;
pub use synchronizer::Synchronizer;
