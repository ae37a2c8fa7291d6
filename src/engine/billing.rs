// ==========================================
// 印花车间计价系统 - 结算快照构建
// ==========================================
// 单运行有效单价: 本次草稿覆写 > 已存 inputs[runId].new_rate > 0
// 单运行有效数量: 已存 inputs[runId].quantity > 0
// 订单金额: Σ 有效单价 × 有效数量
// 基准: 未结算过的运行按 Estimated Amount / 订单数量 作为件单价
// ==========================================

use crate::domain::billing::{
    BillingInputs, BillingSnapshot, RunBillingInput, RunRateOverrides,
};
use crate::domain::order::Order;
use crate::engine::error::BillingError;
use crate::engine::numeric::{ratio_or_zero, round2};
use crate::engine::value_bag::read_estimated_amount;
use chrono::NaiveDateTime;
use uuid::Uuid;

// ==========================================
// BillingSnapshotBuilder - 订单结算快照构建器
// ==========================================
pub struct BillingSnapshotBuilder;

impl BillingSnapshotBuilder {
    /// 由运行值包生成基准计费输入
    pub fn baseline_inputs(order: &Order) -> Result<BillingInputs, BillingError> {
        if order.quantity <= 0 {
            return Err(BillingError::InvalidOrderQuantity {
                order_id: order.order_id.clone(),
                quantity: order.quantity,
            });
        }
        let quantity = order.quantity as f64;

        Ok(order
            .runs()
            .map(|run| {
                let estimated = read_estimated_amount(&run.values);
                (
                    run.run_id.clone(),
                    RunBillingInput {
                        new_rate: ratio_or_zero(estimated, quantity),
                        quantity,
                    },
                )
            })
            .collect())
    }

    /// 已存输入 + 新增运行的基准输入 (已存的条目不覆盖)
    pub fn seed_missing(order: &Order, stored: &BillingInputs) -> Result<BillingInputs, BillingError> {
        let mut merged = stored.clone();
        if order.runs().all(|run| stored.contains_key(&run.run_id)) {
            return Ok(merged);
        }
        for (run_id, input) in Self::baseline_inputs(order)? {
            merged.entry(run_id).or_insert(input);
        }
        Ok(merged)
    }

    /// 单运行的有效计费输入
    pub fn effective_input(
        run_id: &str,
        stored: &BillingInputs,
        draft: Option<&RunRateOverrides>,
    ) -> RunBillingInput {
        let stored_input = stored.get(run_id).copied().unwrap_or_default();
        let new_rate = draft
            .and_then(|d| d.get(run_id))
            .map(|o| o.new_rate)
            .unwrap_or(stored_input.new_rate);

        RunBillingInput {
            new_rate,
            quantity: stored_input.quantity,
        }
    }

    /// 订单金额 (未取整，供客户端镜像显示)
    pub fn order_amount(
        order: &Order,
        stored: &BillingInputs,
        draft: Option<&RunRateOverrides>,
    ) -> f64 {
        order
            .runs()
            .map(|run| {
                let input = Self::effective_input(&run.run_id, stored, draft);
                input.new_rate * input.quantity
            })
            .sum()
    }

    /// 将单价覆写并入已存输入 (数量沿用已存值，无则为 0)
    pub fn apply_overrides(stored: &BillingInputs, overrides: Option<&RunRateOverrides>) -> BillingInputs {
        let mut next = stored.clone();
        if let Some(overrides) = overrides {
            for (run_id, o) in overrides {
                let entry = next.entry(run_id.clone()).or_default();
                entry.new_rate = o.new_rate;
            }
        }
        next
    }

    /// 构建订单结算快照 (result 保留 2 位小数)
    pub fn build(
        order: &Order,
        billing_context_id: &str,
        previous: Option<&BillingSnapshot>,
        overrides: Option<&RunRateOverrides>,
        is_draft: bool,
        now: NaiveDateTime,
    ) -> Result<BillingSnapshot, BillingError> {
        let stored = match previous {
            Some(prev) => Self::seed_missing(order, &prev.inputs)?,
            None => Self::baseline_inputs(order)?,
        };
        let inputs = Self::apply_overrides(&stored, overrides);
        let result = round2(Self::order_amount(order, &inputs, None));

        Ok(BillingSnapshot {
            snapshot_id: previous
                .map(|p| p.snapshot_id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            order_id: order.order_id.clone(),
            billing_context_id: billing_context_id.to_string(),
            result,
            inputs,
            is_draft,
            created_at: now,
        })
    }
}
