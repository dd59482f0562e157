// ==========================================
// 运单动态字段系统 - 命令层
// ==========================================
// 职责: 对外操作入口，统一返回 ApiResponse 信封
// 说明: 失败一律经 map_api_error 转为 { success: false, error, message }
// ==========================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::api::error::ApiError;
use crate::api::response::ApiResponse;
use crate::api::{DuplicateFieldRequest, InitializeDefaultsResponse, ShipmentPage};
use crate::app::state::AppState;
use crate::domain::field::{
    BulkUpdateItem, BulkUpdateOutcome, FieldDefinition, FieldPatch, FieldTypeDescriptor,
};
use crate::domain::import_job::{ImportBatchResult, ImportExecuteRequest, ImportPreview};
use crate::domain::shipment::ShipmentRecord;
use crate::domain::validation::{RecordValidationReport, ValidationOutcome};
use crate::engine::form_assembler::FormPlan;

// ==========================================
// 公共工具：错误映射、序列化
// ==========================================

/// 将ApiError转换为失败信封
pub fn map_api_error<T>(err: ApiError) -> ApiResponse<T> {
    if err.status_code() >= 500 {
        tracing::error!(code = err.code(), error = %err, "命令执行失败");
    } else {
        tracing::warn!(code = err.code(), error = %err, "命令被拒绝");
    }
    ApiResponse::failure(&err)
}

fn respond<T>(result: Result<T, ApiError>) -> ApiResponse<T> {
    match result {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => map_api_error(e),
    }
}

/// 信封序列化为 JSON 文本（序列化失败时返回失败信封）
pub fn to_json<T: Serialize>(response: &ApiResponse<T>) -> String {
    serde_json::to_string_pretty(response).unwrap_or_else(|e| {
        format!(
            r#"{{"success":false,"error":"INTERNAL_ERROR","message":"序列化失败: {}"}}"#,
            e.to_string().replace('"', "'")
        )
    })
}

// ==========================================
// 字段定义相关命令
// ==========================================

pub fn list_fields(state: &AppState) -> ApiResponse<Vec<FieldDefinition>> {
    respond(state.schema_api.list_fields())
}

pub fn list_visible_fields(state: &AppState) -> ApiResponse<Vec<FieldDefinition>> {
    respond(state.schema_api.list_visible_fields())
}

pub fn get_field(state: &AppState, key: &str) -> ApiResponse<FieldDefinition> {
    respond(state.schema_api.get_field(key))
}

pub fn create_field(state: &AppState, definition: FieldDefinition) -> ApiResponse<FieldDefinition> {
    match state.schema_api.create_field(definition) {
        Ok(created) => ApiResponse::ok_with_message(
            created.clone(),
            format!("Field '{}' created", created.key),
        ),
        Err(e) => map_api_error(e),
    }
}

pub fn update_field(state: &AppState, key: &str, patch: &FieldPatch) -> ApiResponse<FieldDefinition> {
    respond(state.schema_api.update_field(key, patch))
}

pub fn bulk_update_fields(
    state: &AppState,
    items: &[BulkUpdateItem],
) -> ApiResponse<Vec<BulkUpdateOutcome>> {
    match state.schema_api.bulk_update_fields(items) {
        Ok(outcomes) => {
            let failed = outcomes.iter().filter(|o| !o.success).count();
            let message = format!("{} updated, {} failed", outcomes.len() - failed, failed);
            ApiResponse::ok_with_message(outcomes, message)
        }
        Err(e) => map_api_error(e),
    }
}

pub fn delete_field(state: &AppState, key: &str) -> ApiResponse<()> {
    match state.schema_api.delete_field(key) {
        Ok(()) => ApiResponse::ok_with_message((), format!("Field '{}' deleted", key)),
        Err(e) => map_api_error(e),
    }
}

pub fn duplicate_field(
    state: &AppState,
    request: &DuplicateFieldRequest,
) -> ApiResponse<FieldDefinition> {
    respond(state.schema_api.duplicate_field(request))
}

pub fn initialize_default_fields(state: &AppState) -> ApiResponse<InitializeDefaultsResponse> {
    match state.schema_api.initialize_defaults() {
        Ok(resp) if resp.inserted == 0 => {
            ApiResponse::ok_with_message(resp, "Fields already exist; nothing to initialize")
        }
        Ok(resp) => {
            let message = format!("{} default fields initialized", resp.inserted);
            ApiResponse::ok_with_message(resp, message)
        }
        Err(e) => map_api_error(e),
    }
}

pub fn list_field_groups(state: &AppState) -> ApiResponse<Vec<String>> {
    respond(state.schema_api.list_groups())
}

pub fn list_field_types(state: &AppState) -> ApiResponse<Vec<FieldTypeDescriptor>> {
    ApiResponse::ok(state.schema_api.list_field_types())
}

pub fn assemble_form(state: &AppState, values: &Map<String, Value>) -> ApiResponse<FormPlan> {
    respond(state.schema_api.assemble_form(values))
}

pub fn validate_values(
    state: &AppState,
    values: &Map<String, Value>,
) -> ApiResponse<RecordValidationReport> {
    respond(state.schema_api.validate_values(values))
}

pub fn validate_field(
    state: &AppState,
    key: &str,
    value: &Value,
    context: &Map<String, Value>,
) -> ApiResponse<ValidationOutcome> {
    respond(state.schema_api.validate_field(key, value, context))
}

// ==========================================
// 运单导入相关命令
// ==========================================

pub async fn import_preview(state: &AppState, file_path: &str) -> ApiResponse<ImportPreview> {
    tracing::info!(file_path = %file_path, "[import_preview] 收到请求");
    respond(state.import_api.preview_file(file_path).await)
}

pub async fn import_preview_upload(
    state: &AppState,
    file_name: &str,
    bytes: &[u8],
) -> ApiResponse<ImportPreview> {
    tracing::info!(file_name = %file_name, bytes = bytes.len(), "[import_preview_upload] 收到请求");
    respond(state.import_api.preview_upload(file_name, bytes).await)
}

pub async fn import_execute(
    state: &AppState,
    request: &ImportExecuteRequest,
) -> ApiResponse<ImportBatchResult> {
    tracing::info!(job_id = %request.file_reference, "[import_execute] 收到请求");
    match state.import_api.execute_import(request).await {
        Ok(result) => {
            let message = format!(
                "{} rows imported, {} failed",
                result.successful_count, result.failed_count
            );
            ApiResponse::ok_with_message(result, message)
        }
        Err(e) => map_api_error(e),
    }
}

pub async fn import_discard(state: &AppState, job_id: &str) -> ApiResponse<()> {
    match state.import_api.discard_import(job_id).await {
        Ok(()) => ApiResponse::ok_with_message((), "Import discarded"),
        Err(e) => map_api_error(e),
    }
}

// ==========================================
// 运单相关命令
// ==========================================

pub fn create_shipment(state: &AppState, values: &Map<String, Value>) -> ApiResponse<ShipmentRecord> {
    respond(state.shipment_api.create_shipment(values))
}

pub fn update_shipment(
    state: &AppState,
    id: &str,
    patch: &Map<String, Value>,
) -> ApiResponse<ShipmentRecord> {
    respond(state.shipment_api.update_shipment(id, patch))
}

pub fn get_shipment(state: &AppState, id: &str) -> ApiResponse<ShipmentRecord> {
    respond(state.shipment_api.get_shipment(id))
}

pub fn get_shipment_by_awb(state: &AppState, awb_number: &str) -> ApiResponse<ShipmentRecord> {
    respond(state.shipment_api.get_shipment_by_awb(awb_number))
}

pub fn delete_shipment(state: &AppState, id: &str) -> ApiResponse<()> {
    match state.shipment_api.delete_shipment(id) {
        Ok(()) => ApiResponse::ok_with_message((), format!("Shipment '{}' deleted", id)),
        Err(e) => map_api_error(e),
    }
}

pub fn list_shipments(
    state: &AppState,
    limit: Option<usize>,
    offset: Option<usize>,
) -> ApiResponse<ShipmentPage> {
    respond(state.shipment_api.list_shipments(limit, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("commands.db").to_string_lossy().to_string();
        let state = AppState::new(db_path).unwrap();
        (dir, state)
    }

    #[test]
    fn test_initialize_twice_is_noop() {
        let (_dir, state) = state();

        let first = initialize_default_fields(&state);
        assert!(first.success);
        assert_eq!(first.data.as_ref().unwrap().inserted, 16);

        let second = initialize_default_fields(&state);
        assert!(second.success);
        assert_eq!(second.data.unwrap().inserted, 0);
        assert!(second.message.unwrap().contains("already exist"));
    }

    #[test]
    fn test_not_found_envelope() {
        let (_dir, state) = state();
        let resp = get_field(&state, "missing");
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("NOT_FOUND"));
        assert!(resp.data.is_none());
    }

    #[test]
    fn test_to_json() {
        let resp = ApiResponse::ok(json!({"inserted": 0}));
        let text = to_json(&resp);
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["success"], json!(true));
        assert_eq!(parsed["data"]["inserted"], json!(0));
    }
}
