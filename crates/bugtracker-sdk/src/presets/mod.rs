//! 常见 bug tracker 的内置实体模型

pub mod bugzilla;
