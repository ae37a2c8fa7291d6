// ==========================================
// 印花车间计价系统 - 结算领域模型
// ==========================================
// BillingSnapshot: 单订单的权威结算结果 (每次重算/定稿整体替换)
// BillingContext:  多订单结算组，DRAFT → FINAL
// ==========================================

use crate::domain::types::BillingState;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// RunBillingInput - 单运行计费输入
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunBillingInput {
    pub new_rate: f64,
    pub quantity: f64,
}

/// runId → 计费输入
pub type BillingInputs = BTreeMap<String, RunBillingInput>;

// ==========================================
// RateOverride - 单价覆写
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateOverride {
    pub new_rate: f64,
}

/// runId → 单价覆写 (单订单)
pub type RunRateOverrides = BTreeMap<String, RateOverride>;

/// orderId → runId → 单价覆写
pub type RateOverrideMap = BTreeMap<String, RunRateOverrides>;

// ==========================================
// BillingSnapshot - 订单结算快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSnapshot {
    pub snapshot_id: String,
    pub order_id: String,
    pub billing_context_id: String,
    pub result: f64, // 权威计费金额
    pub inputs: BillingInputs,
    pub is_draft: bool,
    pub created_at: NaiveDateTime,
}

// ==========================================
// ContextSnapshot - 结算组汇总快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub result: f64,
    pub is_draft: bool,
    pub created_at: NaiveDateTime,
}

// ==========================================
// BillingContext - 结算组
// ==========================================
// 由操作员从已完成订单显式创建；从不自动删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingContext {
    pub context_id: String,
    pub name: String,
    pub order_ids: Vec<String>,
    pub latest_snapshot: Option<ContextSnapshot>,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub revision: i32, // 乐观锁：每次写入 +1
}

impl BillingContext {
    /// 当前结算状态 (尚无汇总快照视为草稿)
    pub fn state(&self) -> BillingState {
        match &self.latest_snapshot {
            Some(s) => BillingState::from_is_draft(s.is_draft),
            None => BillingState::Draft,
        }
    }

    /// 新建结算组 (尚未写入，尚无快照)
    pub fn new_draft(name: &str, order_ids: &[String], created_by: &str, now: NaiveDateTime) -> Self {
        Self {
            context_id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            order_ids: order_ids.to_vec(),
            latest_snapshot: None,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }
}

// ==========================================
// FinalizeRequest - 定稿请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeRequest {
    #[serde(alias = "billingContextId")]
    pub billing_context_id: String,
    #[serde(default)]
    pub inputs: RateOverrideMap,
    /// 期望的结算组修订号；None 时按"后写覆盖"处理
    #[serde(default)]
    pub expected_revision: Option<i32>,
}
