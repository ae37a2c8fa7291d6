// ==========================================
// 印花车间计价系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 计价校验错误 (CostingError) / 结算错误 (BillingError)
// ==========================================

use thiserror::Error;

/// 计价引擎错误 (校验失败，保存前拦截)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CostingError {
    #[error("必填字段缺失: {field}")]
    MissingField { field: String },

    #[error("字段值无效 (field={field}): {message}")]
    InvalidValue { field: String, message: String },

    #[error("数值不能为负 (field={field}): {value}")]
    NegativeInput { field: String, value: f64 },

    #[error("派生值为负 (行 {row}, 字段 {field}): {value}")]
    NegativeDerivedValue { row: usize, field: String, value: f64 },

    #[error("至少需要一行明细")]
    NoItems,

    #[error("行号越界: index={index}, len={len}")]
    RowOutOfRange { index: usize, len: usize },

    #[error("工艺类型不匹配: expected={expected}, actual={actual}")]
    KindMismatch { expected: String, actual: String },
}

impl CostingError {
    /// 出错字段 (若可定位)
    pub fn field(&self) -> Option<&str> {
        match self {
            CostingError::MissingField { field }
            | CostingError::InvalidValue { field, .. }
            | CostingError::NegativeInput { field, .. }
            | CostingError::NegativeDerivedValue { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// 结算引擎错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BillingError {
    #[error("订单不属于该结算组: order_id={order_id}")]
    OrderNotInContext { order_id: String },

    #[error("运行不属于该订单: order_id={order_id}, run_id={run_id}")]
    RunNotInOrder { order_id: String, run_id: String },

    #[error("单价无效 (run_id={run_id}): {value}")]
    InvalidRate { run_id: String, value: f64 },

    #[error("订单数量无效: order_id={order_id}, quantity={quantity}")]
    InvalidOrderQuantity { order_id: String, quantity: i64 },

    #[error("结算组已定稿，不允许修改单价: context_id={context_id}")]
    AlreadyFinal { context_id: String },

    #[error("结算组已定稿，不允许以不同单价重复定稿: context_id={context_id}")]
    RefinalizeRejected { context_id: String },

    #[error("结算组中缺少订单数据: order_id={order_id}")]
    OrderMissing { order_id: String },
}
