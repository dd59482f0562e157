// ==========================================
// 运单动态字段系统 - 运单 API
// ==========================================
// 职责: 运单交互式增改查
// 红线: 交互写入走严格校验（数值不可解析即失败，不做宽松强转）
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::shipment::ShipmentRecord;
use crate::engine::schema_store::FieldSchemaStore;
use crate::engine::validator::FieldValidator;
use crate::repository::error::RepositoryError;
use crate::repository::shipment_repo::ShipmentRepository;

/// 分页默认/上限
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 500;

/// 运单分页结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentPage {
    pub items: Vec<ShipmentRecord>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

// ==========================================
// ShipmentApi - 运单 API
// ==========================================
pub struct ShipmentApi {
    schema_store: Arc<FieldSchemaStore>,
    shipment_repo: Arc<ShipmentRepository>,
}

impl ShipmentApi {
    pub fn new(schema_store: Arc<FieldSchemaStore>, shipment_repo: Arc<ShipmentRepository>) -> Self {
        Self {
            schema_store,
            shipment_repo,
        }
    }

    /// 创建运单
    ///
    /// # 返回
    /// - Err(ValidationFailed): 任一字段校验失败（携带全部字段错误）
    /// - Err(Conflict): 运单号重复
    pub fn create_shipment(&self, values: &Map<String, Value>) -> ApiResult<ShipmentRecord> {
        let coerced = self.validate_strict(values)?;
        let record = ShipmentRecord::from_values(&coerced);

        self.shipment_repo
            .insert(&record)
            .map_err(|e| duplicate_awb(e, &record))?;

        info!(id = %record.id, awb = ?record.awb_number, "运单已创建");
        Ok(record)
    }

    /// 更新运单（patch 覆盖到现有值后整条重新校验）
    pub fn update_shipment(&self, id: &str, patch: &Map<String, Value>) -> ApiResult<ShipmentRecord> {
        let mut record = self.get_shipment(id)?;

        let mut merged = record.to_values();
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }
        let coerced = self.validate_strict(&merged)?;

        record.apply_values(&coerced);
        // 显式置空的字段不会出现在强转结果中，单独清除
        let cleared: Map<String, Value> = patch
            .iter()
            .filter(|(_, value)| value.is_null())
            .map(|(key, _)| (key.clone(), Value::Null))
            .collect();
        if !cleared.is_empty() {
            record.apply_values(&cleared);
        }
        record.updated_at = Utc::now();

        let updated = self
            .shipment_repo
            .update(&record)
            .map_err(|e| duplicate_awb(e, &record))?;
        if !updated {
            return Err(ApiError::NotFound(format!("运单不存在: {}", id)));
        }

        info!(id = %record.id, changed = patch.len(), "运单已更新");
        Ok(record)
    }

    pub fn get_shipment(&self, id: &str) -> ApiResult<ShipmentRecord> {
        self.shipment_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("运单不存在: {}", id)))
    }

    /// 按运单号查询
    pub fn get_shipment_by_awb(&self, awb_number: &str) -> ApiResult<ShipmentRecord> {
        let awb_number = awb_number.trim();
        if awb_number.is_empty() {
            return Err(ApiError::StructuralPrecondition("缺少运单号".to_string()));
        }
        self.shipment_repo
            .find_by_awb(awb_number)?
            .ok_or_else(|| ApiError::NotFound(format!("运单号不存在: {}", awb_number)))
    }

    /// 删除运单
    pub fn delete_shipment(&self, id: &str) -> ApiResult<()> {
        if !self.shipment_repo.delete(id)? {
            return Err(ApiError::NotFound(format!("运单不存在: {}", id)));
        }
        info!(id = %id, "运单已删除");
        Ok(())
    }

    /// 分页列表（创建时间倒序）
    pub fn list_shipments(&self, limit: Option<usize>, offset: Option<usize>) -> ApiResult<ShipmentPage> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0);
        Ok(ShipmentPage {
            items: self.shipment_repo.list(limit, offset)?,
            total: self.shipment_repo.count()?,
            limit,
            offset,
        })
    }

    fn validate_strict(&self, values: &Map<String, Value>) -> ApiResult<Map<String, Value>> {
        let schema = self.schema_store.list()?;
        let report = FieldValidator::validate_record(&schema, values);
        if !report.is_valid() {
            debug!(errors = %report.summary(), "运单校验失败");
            return Err(ApiError::ValidationFailed(report.errors));
        }
        Ok(report.coerced_values)
    }
}

fn duplicate_awb(err: RepositoryError, record: &ShipmentRecord) -> ApiError {
    match err {
        RepositoryError::UniqueConstraintViolation(_) => ApiError::Conflict(format!(
            "Duplicate AWB number '{}'",
            record.awb_number.as_deref().unwrap_or_default()
        )),
        other => other.into(),
    }
}
