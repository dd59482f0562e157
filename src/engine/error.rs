// ==========================================
// 运单动态字段系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 字段定义存储错误
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("字段定义不合法: {0}")]
    InvalidSchema(String),

    #[error("字段已存在: {0}")]
    Conflict(String),

    #[error("字段不存在: {0}")]
    NotFound(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type SchemaResult<T> = Result<T, SchemaError>;
