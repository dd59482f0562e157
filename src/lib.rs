// ==========================================
// 运单动态字段系统 - 核心库
// ==========================================
// 职责: 字段定义存储 / 依赖求值 / 校验 / 表单装配 / 表格批量导入
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 字段规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装与命令
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{DependencyOperator, FieldType, FieldWidth, ImportJobState, WidgetKind};

// 领域实体
pub use domain::{
    DependencyClause, FieldDefinition, FieldKind, ImportBatchResult, ImportExecuteRequest,
    ImportPreview, ShipmentRecord, ValidationRule,
};

// 引擎
pub use engine::{DependencyEvaluator, FieldSchemaStore, FieldValidator, FormAssembler};

// API
pub use api::{ApiError, ApiResponse, ImportApi, SchemaApi, ShipmentApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "运单动态字段系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
