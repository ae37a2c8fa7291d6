// ==========================================
// 印花车间计价系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，将仓储/引擎错误转换为用户友好的错误消息
// 所有错误信息必须包含显式原因
// ==========================================

use crate::engine::error::{BillingError, CostingError};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    /// 运行配置校验失败 (保存前拦截，不落库)
    #[error("数据验证失败: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    #[error("请求已过期: resource={resource}, seq={seq}, last_accepted={last_accepted}")]
    StaleRequest {
        resource: String,
        seq: u64,
        last_accepted: u64,
    },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure {
                context_id,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "结算组{}已被其他用户修改（期望revision={}，实际revision={}）",
                context_id, expected, actual
            )),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::SerializationError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }

            // 数据质量错误
            RepositoryError::FieldValueError { field, message } => ApiError::ValidationError {
                message: format!("字段{}错误: {}", field, message),
                field: Some(field),
            },
        }
    }
}

// ==========================================
// 从引擎错误转换
// ==========================================
impl From<CostingError> for ApiError {
    fn from(err: CostingError) -> Self {
        ApiError::ValidationError {
            field: err.field().map(str::to_string),
            message: err.to_string(),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match &err {
            BillingError::AlreadyFinal { .. } => ApiError::InvalidStateTransition {
                from: "FINAL".to_string(),
                to: "DRAFT".to_string(),
            },
            BillingError::RefinalizeRejected { .. } => {
                ApiError::BusinessRuleViolation(err.to_string())
            }
            BillingError::OrderMissing { order_id } => {
                ApiError::NotFound(format!("Order(id={})不存在", order_id))
            }
            BillingError::OrderNotInContext { .. }
            | BillingError::RunNotInOrder { .. }
            | BillingError::InvalidRate { .. }
            | BillingError::InvalidOrderQuantity { .. } => ApiError::InvalidInput(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
