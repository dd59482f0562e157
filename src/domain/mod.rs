// ==========================================
// 运单动态字段系统 - 领域模型层
// ==========================================
// 职责: 定义字段定义、运单、导入任务等领域实体与类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod field;
pub mod import_job;
pub mod shipment;
pub mod types;
pub mod validation;

// 重导出核心类型
pub use field::{
    is_valid_field_key, BulkUpdateItem, BulkUpdateOutcome, ChoiceRules, DependencyClause,
    FieldDefinition, FieldKind, FieldPatch, FieldTypeDescriptor, FileRules, NumericRules,
    TextRules, ValidationRule,
};
pub use import_job::{
    AvailableField, ColumnMapping, ImportBatchResult, ImportExecuteRequest, ImportJob,
    ImportPreview, MappingTarget, RawRow, RowError,
};
pub use shipment::{core_keys, ShipmentRecord};
pub use types::{DependencyOperator, FieldType, FieldWidth, ImportJobState, WidgetKind};
pub use validation::{FieldError, RecordValidationReport, ValidationErrorKind, ValidationOutcome};
