// ==========================================
// 运单动态字段系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级失败不走错误通道（收集到批次结果中）
// ==========================================

use crate::engine::error::SchemaError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv/.tsv/.txt/.xlsx/.xls/.xlsm/.xlsb/.ods）")]
    UnsupportedFileType(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("文件无表头: {0}")]
    EmptyFile(String),

    #[error("暂存文件失败: {0}")]
    StagingError(String),

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    // ===== 前置条件错误 =====
    #[error("数据行数 {rows} 超过上限 {limit}")]
    TooManyRows { rows: usize, limit: usize },

    #[error("导入任务状态不允许该操作: {0}")]
    InvalidJobState(String),

    // ===== 下游错误 =====
    #[error(transparent)]
    Schema(#[from] SchemaError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
