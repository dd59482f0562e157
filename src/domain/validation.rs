// ==========================================
// 运单动态字段系统 - 校验结果模型
// ==========================================
// 职责: 字段级校验错误分类与校验结果
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 字段级校验错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorKind {
    MissingRequired,
    InvalidType,
    PatternMismatch,
    OutOfRange,
    InvalidEnumValue,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationErrorKind::MissingRequired => write!(f, "MISSING_REQUIRED"),
            ValidationErrorKind::InvalidType => write!(f, "INVALID_TYPE"),
            ValidationErrorKind::PatternMismatch => write!(f, "PATTERN_MISMATCH"),
            ValidationErrorKind::OutOfRange => write!(f, "OUT_OF_RANGE"),
            ValidationErrorKind::InvalidEnumValue => write!(f, "INVALID_ENUM_VALUE"),
        }
    }
}

/// 字段级校验错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field_key: String,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_key, self.message)
    }
}

/// 单字段校验结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub valid: bool,
    pub coerced_value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FieldError>,
}

impl ValidationOutcome {
    pub fn ok(coerced_value: Value) -> Self {
        Self {
            valid: true,
            coerced_value,
            error: None,
        }
    }

    pub fn fail(field_key: &str, kind: ValidationErrorKind, message: String) -> Self {
        Self {
            valid: false,
            coerced_value: Value::Null,
            error: Some(FieldError {
                field_key: field_key.to_string(),
                kind,
                message,
            }),
        }
    }

    /// 错误分类（校验通过时为 None）
    pub fn error_kind(&self) -> Option<ValidationErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// 整条记录的校验报告
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordValidationReport {
    pub coerced_values: serde_json::Map<String, Value>,
    pub errors: Vec<FieldError>,
}

impl RecordValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// 汇总错误信息（用于行级错误/接口提示）
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}
