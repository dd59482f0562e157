// ==========================================
// 运单动态字段系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口，供命令层/CLI 调用
// ==========================================

pub mod error;
pub mod import_api;
pub mod response;
pub mod schema_api;
pub mod shipment_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;
pub use response::ApiResponse;
pub use schema_api::{DuplicateFieldRequest, InitializeDefaultsResponse, SchemaApi};
pub use shipment_api::{ShipmentApi, ShipmentPage};
