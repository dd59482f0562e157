// ==========================================
// 运单动态字段系统 - 导入任务领域模型
// ==========================================
// 职责: 导入任务（临时）/ 预览结果 / 列映射 / 批次结果
// 生命周期: UPLOADED → PREVIEWED → EXECUTED | DISCARDED
// 说明: 不支持中断续传，部分成功是正常结果
// ==========================================

use crate::domain::types::{FieldType, ImportJobState};
use crate::domain::validation::FieldError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// 源文件中的一行（表头 → 单元格文本）
pub type RawRow = BTreeMap<String, String>;

/// 列映射（表头 → 映射目标）
pub type ColumnMapping = BTreeMap<String, MappingTarget>;

/// 映射目标关键字：跳过该列
pub const SKIP_TARGET: &str = "skip";

// ==========================================
// MappingTarget - 列映射目标
// ==========================================
// 传输形态: 字符串 "skip" 或字段 key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MappingTarget {
    Skip,
    Field(String),
}

impl MappingTarget {
    pub fn field_key(&self) -> Option<&str> {
        match self {
            MappingTarget::Skip => None,
            MappingTarget::Field(key) => Some(key.as_str()),
        }
    }
}

impl From<String> for MappingTarget {
    fn from(s: String) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(SKIP_TARGET) {
            MappingTarget::Skip
        } else {
            MappingTarget::Field(trimmed.to_string())
        }
    }
}

impl From<MappingTarget> for String {
    fn from(target: MappingTarget) -> Self {
        match target {
            MappingTarget::Skip => SKIP_TARGET.to_string(),
            MappingTarget::Field(key) => key,
        }
    }
}

impl fmt::Display for MappingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingTarget::Skip => write!(f, "{}", SKIP_TARGET),
            MappingTarget::Field(key) => write!(f, "{}", key),
        }
    }
}

// ==========================================
// AvailableField - 可映射字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableField {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
}

// ==========================================
// ImportPreview - 预览结果（阶段 A 输出）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    /// 暂存文件引用（执行阶段使用）
    pub job_id: String,
    pub file_name: String,
    pub headers: Vec<String>,
    pub sample_rows: Vec<RawRow>,
    pub total_rows: usize,
    pub available_fields: Vec<AvailableField>,
    pub suggested_mapping: ColumnMapping,
}

// ==========================================
// ImportExecuteRequest - 执行请求（阶段 B 输入）
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportExecuteRequest {
    #[serde(alias = "jobId")]
    pub file_reference: String,
    #[serde(default)]
    pub mapping: ColumnMapping,
    #[serde(default)]
    pub default_values: Map<String, Value>,
}

// ==========================================
// RowError - 行级失败
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 源文件行号（1 起，不含表头）
    pub row: usize,
    /// 失败时的候选数据
    pub data: Map<String, Value>,
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

// ==========================================
// ImportBatchResult - 批次结果（阶段 B 输出）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatchResult {
    pub job_id: String,
    pub total_rows: usize,
    pub successful_count: usize,
    pub failed_count: usize,
    pub per_row_errors: Vec<RowError>,
    pub elapsed_ms: i64,
}

impl ImportBatchResult {
    /// 全部成功
    pub fn is_clean(&self) -> bool {
        self.failed_count == 0
    }
}

// ==========================================
// ImportJob - 导入任务
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub job_id: String,
    pub original_file_name: String,
    pub state: ImportJobState,
    pub headers: Vec<String>,
    pub sample_rows: Vec<RawRow>,
    pub total_rows: usize,
    pub suggested_mapping: ColumnMapping,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ImportBatchResult>,
    pub created_at: DateTime<Utc>,
}

impl ImportJob {
    pub fn new(job_id: &str, original_file_name: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            original_file_name: original_file_name.to_string(),
            state: ImportJobState::Uploaded,
            headers: Vec::new(),
            sample_rows: Vec::new(),
            total_rows: 0,
            suggested_mapping: ColumnMapping::new(),
            result: None,
            created_at: Utc::now(),
        }
    }

    /// 状态转换（非法转换返回说明）
    pub fn transition(&mut self, next: ImportJobState) -> Result<(), String> {
        if !self.state.can_transition_to(next) {
            return Err(format!(
                "导入任务 {} 状态不允许从 {} 转为 {}",
                self.job_id, self.state, next
            ));
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mapping_target_serde() {
        let mapping: ColumnMapping = serde_json::from_value(json!({
            "Customer Mobile No": "customerMobile",
            "Notes": "skip",
            "Blank": ""
        }))
        .unwrap();

        assert_eq!(
            mapping["Customer Mobile No"],
            MappingTarget::Field("customerMobile".to_string())
        );
        assert_eq!(mapping["Notes"], MappingTarget::Skip);
        assert_eq!(mapping["Blank"], MappingTarget::Skip);

        let back = serde_json::to_value(&mapping).unwrap();
        assert_eq!(back["Notes"], json!("skip"));
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = ImportJob::new("job-1", "a.csv");
        assert!(job.transition(ImportJobState::Executed).is_err());
        job.transition(ImportJobState::Previewed).unwrap();
        job.transition(ImportJobState::Executed).unwrap();
        assert!(job.transition(ImportJobState::Discarded).is_err());
    }

    #[test]
    fn test_execute_request_aliases() {
        let req: ImportExecuteRequest = serde_json::from_value(json!({
            "jobId": "abc.csv",
            "mapping": { "AWB": "awbNumber" }
        }))
        .unwrap();
        assert_eq!(req.file_reference, "abc.csv");
        assert!(req.default_values.is_empty());
    }
}
