// ==========================================
// 运单动态字段系统 - 引擎层
// ==========================================
// 职责: 字段定义存储、依赖求值、校验、表单装配
// 红线: Engine 不拼 SQL（数据访问经由 repository）
// ==========================================

pub mod default_schema;
pub mod dependency;
pub mod error;
pub mod form_assembler;
pub mod schema_store;
pub mod validator;

// 重导出核心引擎
pub use default_schema::default_shipment_fields;
pub use dependency::DependencyEvaluator;
pub use error::{SchemaError, SchemaResult};
pub use form_assembler::{FormAssembler, FormPlan, FormSection, RenderDirective};
pub use schema_store::FieldSchemaStore;
pub use validator::FieldValidator;
