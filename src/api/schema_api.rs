// ==========================================
// 运单动态字段系统 - 字段定义 API
// ==========================================
// 职责: 字段定义管理 + 表单装配 + 值校验
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::field::{
    BulkUpdateItem, BulkUpdateOutcome, FieldDefinition, FieldPatch, FieldTypeDescriptor,
};
use crate::domain::validation::{RecordValidationReport, ValidationOutcome};
use crate::engine::form_assembler::{FormAssembler, FormPlan};
use crate::engine::schema_store::FieldSchemaStore;
use crate::engine::validator::FieldValidator;

/// 复制字段请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateFieldRequest {
    pub source_key: String,
    pub new_key: String,
    pub new_label: String,
}

/// 默认字段初始化结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeDefaultsResponse {
    /// 写入的字段数（已有字段时为 0）
    pub inserted: usize,
    pub fields: Vec<FieldDefinition>,
}

// ==========================================
// SchemaApi - 字段定义 API
// ==========================================
pub struct SchemaApi {
    schema_store: Arc<FieldSchemaStore>,
}

impl SchemaApi {
    pub fn new(schema_store: Arc<FieldSchemaStore>) -> Self {
        Self { schema_store }
    }

    /// 全部字段定义（order 升序，同序按 key）
    pub fn list_fields(&self) -> ApiResult<Vec<FieldDefinition>> {
        Ok(self.schema_store.list()?)
    }

    pub fn list_visible_fields(&self) -> ApiResult<Vec<FieldDefinition>> {
        Ok(self.schema_store.list_visible()?)
    }

    pub fn get_field(&self, key: &str) -> ApiResult<FieldDefinition> {
        Ok(self.schema_store.get(key)?)
    }

    pub fn create_field(&self, definition: FieldDefinition) -> ApiResult<FieldDefinition> {
        Ok(self.schema_store.create(definition)?)
    }

    pub fn update_field(&self, key: &str, patch: &FieldPatch) -> ApiResult<FieldDefinition> {
        Ok(self.schema_store.update(key, patch)?)
    }

    /// 批量更新（逐条结果，单条失败不影响其余）
    pub fn bulk_update_fields(&self, items: &[BulkUpdateItem]) -> ApiResult<Vec<BulkUpdateOutcome>> {
        if items.is_empty() {
            return Err(ApiError::StructuralPrecondition(
                "批量更新列表不能为空".to_string(),
            ));
        }
        Ok(self.schema_store.bulk_update(items))
    }

    pub fn delete_field(&self, key: &str) -> ApiResult<()> {
        Ok(self.schema_store.delete(key)?)
    }

    pub fn duplicate_field(&self, request: &DuplicateFieldRequest) -> ApiResult<FieldDefinition> {
        Ok(self.schema_store.duplicate(
            &request.source_key,
            &request.new_key,
            &request.new_label,
        )?)
    }

    pub fn initialize_defaults(&self) -> ApiResult<InitializeDefaultsResponse> {
        let inserted = self.schema_store.initialize_defaults()?;
        Ok(InitializeDefaultsResponse {
            inserted,
            fields: self.schema_store.list()?,
        })
    }

    pub fn list_groups(&self) -> ApiResult<Vec<String>> {
        Ok(self.schema_store.list_groups()?)
    }

    pub fn list_field_types(&self) -> Vec<FieldTypeDescriptor> {
        self.schema_store.type_descriptors()
    }

    // ==========================================
    // 表单装配 / 校验
    // ==========================================

    /// 按当前值装配表单
    pub fn assemble_form(&self, values: &Map<String, Value>) -> ApiResult<FormPlan> {
        let schema = self.schema_store.list()?;
        let plan = FormAssembler::assemble(&schema, values);
        debug!(
            fields = schema.len(),
            visible = plan.visible_count(),
            "表单装配完成"
        );
        Ok(plan)
    }

    /// 校验整条记录（严格模式），返回强转后的值与全部字段错误
    pub fn validate_values(&self, values: &Map<String, Value>) -> ApiResult<RecordValidationReport> {
        let schema = self.schema_store.list()?;
        Ok(FieldValidator::validate_record(&schema, values))
    }

    /// 校验单个字段值（context 为同一记录的其余字段值）
    pub fn validate_field(
        &self,
        key: &str,
        value: &Value,
        context: &Map<String, Value>,
    ) -> ApiResult<ValidationOutcome> {
        let definition = self.schema_store.get(key)?;
        Ok(FieldValidator::validate(&definition, value, context))
    }
}
