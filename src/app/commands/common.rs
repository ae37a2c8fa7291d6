use crate::api::error::ApiError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// 公共工具：错误映射、参数解析
// ==========================================

/// 错误响应（返回给调用方）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,

    /// 详细信息（可选）
    pub details: Option<serde_json::Value>,
}

/// 将ApiError转换为JSON字符串
pub(super) fn map_api_error(err: ApiError) -> String {
    let error_response = ErrorResponse {
        code: match &err {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::OptimisticLockFailure(_) => "OPTIMISTIC_LOCK_FAILURE",
            ApiError::StaleRequest { .. } => "STALE_REQUEST",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
        .to_string(),
        message: err.to_string(),
        details: match &err {
            ApiError::ValidationError { field: Some(field), .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            ApiError::InvalidStateTransition { from, to } => {
                Some(serde_json::json!({ "from": from, "to": to }))
            }
            ApiError::StaleRequest {
                resource,
                seq,
                last_accepted,
            } => Some(serde_json::json!({
                "resource": resource,
                "seq": seq,
                "last_accepted": last_accepted,
            })),
            _ => None,
        },
    };

    serde_json::to_string(&error_response).unwrap_or_else(|_| err.to_string())
}

/// 解析命令参数 (缺省参数按空对象处理)
pub(super) fn parse_args<T: DeserializeOwned>(args: JsonValue) -> Result<T, String> {
    let args = if args.is_null() {
        JsonValue::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| map_api_error(ApiError::InvalidInput(format!("参数错误: {}", e))))
}

/// 序列化命令结果
pub(super) fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("序列化失败: {}", e))
}

pub(super) fn default_actor() -> String {
    "system".to_string()
}
