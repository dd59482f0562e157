// ==========================================
// 运单动态字段系统 - 统一响应信封
// ==========================================
// 格式: { success, data?, message?, error?, details? }
// 说明: error 为稳定错误码，message 为可读原因
// ==========================================

use crate::api::error::ApiError;
use serde::{Deserialize, Serialize};

/// 统一响应信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// 错误码（失败时）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// 错误明细（校验失败时为字段级错误列表）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            details: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    pub fn failure(error: &ApiError) -> Self {
        let details = match error {
            ApiError::ValidationFailed(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        };
        Self {
            success: false,
            data: None,
            message: Some(error.to_string()),
            error: Some(error.code().to_string()),
            details,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl<T> From<Result<T, ApiError>> for ApiResponse<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data),
            Err(e) => ApiResponse::failure(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::{FieldError, ValidationErrorKind};
    use serde_json::json;

    #[test]
    fn test_success_envelope_omits_empty_members() {
        let resp = ApiResponse::ok(vec!["Pricing"]);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, json!({ "success": true, "data": ["Pricing"] }));
    }

    #[test]
    fn test_failure_envelope_carries_code_and_details() {
        let err = ApiError::ValidationFailed(vec![FieldError {
            field_key: "weight".into(),
            kind: ValidationErrorKind::OutOfRange,
            message: "Weight must be at least 0.01".into(),
        }]);
        let resp: ApiResponse<()> = ApiResponse::failure(&err);
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["success"], json!(false));
        assert_eq!(json["error"], json!("VALIDATION_FAILED"));
        assert_eq!(json["details"][0]["fieldKey"], json!("weight"));
        assert_eq!(json["details"][0]["kind"], json!("OUT_OF_RANGE"));
        assert!(json.get("data").is_none());
    }
}
