// ==========================================
// 印花车间计价系统 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录
// 用途: 审计追踪 (谁在何时改了哪个运行/结算组)
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub target_id: Option<String>, // 关联对象 (run_id / context_id / order_id)
    pub action_type: String,       // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

impl ActionLog {
    /// 以当前时间构造日志
    pub fn now(
        action_type: ActionType,
        target_id: Option<&str>,
        actor: &str,
        payload_json: Option<JsonValue>,
        detail: Option<String>,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            target_id: target_id.map(str::to_string),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            payload_json,
            detail,
        }
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateOrder,            // 新建订单
    AddProcess,             // 新增工艺
    AddRun,                 // 新增运行
    ConfigureRun,           // 保存运行配置
    CreateBillingContext,   // 新建结算组
    UpdateDraftRates,       // 草稿改价
    FinalizeBillingContext, // 结算定稿
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateOrder => "CREATE_ORDER",
            ActionType::AddProcess => "ADD_PROCESS",
            ActionType::AddRun => "ADD_RUN",
            ActionType::ConfigureRun => "CONFIGURE_RUN",
            ActionType::CreateBillingContext => "CREATE_BILLING_CONTEXT",
            ActionType::UpdateDraftRates => "UPDATE_DRAFT_RATES",
            ActionType::FinalizeBillingContext => "FINALIZE_BILLING_CONTEXT",
        }
    }
}
