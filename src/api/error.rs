// ==========================================
// 运单动态字段系统 - API层错误类型
// ==========================================
// 职责: 汇总各层错误，转换为带状态码/错误码的用户可读错误
// 红线: 错误信息必须包含显式原因
// ==========================================

use crate::domain::validation::FieldError;
use crate::engine::error::SchemaError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 字段定义错误
    // ==========================================
    #[error("字段定义不合法: {0}")]
    InvalidSchema(String),

    #[error("资源冲突: {0}")]
    Conflict(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 数据校验错误（携带字段级明细）
    // ==========================================
    #[error("数据校验失败: {}", summarize(.0))]
    ValidationFailed(Vec<FieldError>),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件格式不支持: {0}")]
    UnsupportedFileType(String),

    /// 结构性前置条件不满足（无表头、行数超限、任务状态不允许等）
    #[error("前置条件不满足: {0}")]
    StructuralPrecondition(String),

    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiError {
    /// HTTP 风格状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InvalidSchema(_) | ApiError::StructuralPrecondition(_) => 400,
            ApiError::ValidationFailed(_) => 422,
            ApiError::UnsupportedFileType(_) => 415,
            ApiError::ImportError(_)
            | ApiError::DatabaseError(_)
            | ApiError::InternalError(_)
            | ApiError::Other(_) => 500,
        }
    }

    /// 稳定错误码（响应信封 error 字段）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidSchema(_) => "INVALID_SCHEMA",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::ValidationFailed(_) => "VALIDATION_FAILED",
            ApiError::UnsupportedFileType(_) => "UNSUPPORTED_FILE_TYPE",
            ApiError::StructuralPrecondition(_) => "STRUCTURAL_PRECONDITION",
            ApiError::ImportError(_) => "IMPORT_ERROR",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::Conflict(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::DatabaseConnectionError(msg)
            | RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::CorruptRecord { .. } => ApiError::InternalError(err.to_string()),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 SchemaError 转换
// ==========================================
impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::InvalidSchema(msg) => ApiError::InvalidSchema(msg),
            SchemaError::Conflict(msg) => ApiError::Conflict(msg),
            SchemaError::NotFound(msg) => ApiError::NotFound(msg),
            SchemaError::Repository(e) => e.into(),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(msg) => ApiError::NotFound(msg),
            ImportError::UnsupportedFileType(_) => ApiError::UnsupportedFileType(err.to_string()),
            // 文件损坏/不可读属于调用方输入问题
            ImportError::EmptyFile(_)
            | ImportError::TooManyRows { .. }
            | ImportError::InvalidJobState(_)
            | ImportError::FileReadError(_)
            | ImportError::ExcelParseError(_)
            | ImportError::CsvParseError(_) => ApiError::StructuralPrecondition(err.to_string()),
            ImportError::Schema(e) => e.into(),
            ImportError::StagingError(_) | ImportError::ConfigReadError { .. } => {
                ApiError::ImportError(err.to_string())
            }
            ImportError::InternalError(msg) => ApiError::InternalError(msg),
            ImportError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
