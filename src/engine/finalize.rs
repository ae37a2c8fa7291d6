// ==========================================
// 印花车间计价系统 - 结算组定稿
// ==========================================
// 状态机: DRAFT → FINAL (单向)
// 草稿期: 接受单价覆写，重算各订单快照，保持 isDraft = true
// 定稿:   应用覆写 → 重算 → 全部快照 isDraft = false
// 重复定稿: 覆写结果一致 → 无操作；不一致 → 按配置拒绝或重新应用
// 红线: 只生成写入计划，不直接落库 (由仓储层单事务提交)
// ==========================================

use crate::domain::billing::{BillingContext, BillingSnapshot, ContextSnapshot, RateOverrideMap};
use crate::domain::order::Order;
use crate::domain::types::BillingState;
use crate::engine::billing::BillingSnapshotBuilder;
use crate::engine::error::BillingError;
use crate::engine::numeric::round2;
use chrono::NaiveDateTime;
use std::collections::HashMap;

// ==========================================
// BillingPlan - 结算写入计划
// ==========================================
#[derive(Debug, Clone)]
pub struct BillingPlan {
    pub context_id: String,
    pub snapshots: Vec<BillingSnapshot>,
    pub context_snapshot: ContextSnapshot,
    pub from_state: BillingState,
    pub to_state: BillingState,
    /// false 表示与当前已存结果完全一致，无需写库
    pub changed: bool,
}

// ==========================================
// BillingFinalizer - 结算组定稿器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct BillingFinalizer {
    allow_refinalize: bool,
}

impl BillingFinalizer {
    pub fn new(allow_refinalize: bool) -> Self {
        Self { allow_refinalize }
    }

    /// 校验覆写: 订单属于结算组、运行属于订单、单价为非负有限数
    pub fn validate_overrides(
        context: &BillingContext,
        orders: &[Order],
        overrides: &RateOverrideMap,
    ) -> Result<(), BillingError> {
        for (order_id, runs) in overrides {
            if !context.order_ids.contains(order_id) {
                return Err(BillingError::OrderNotInContext {
                    order_id: order_id.clone(),
                });
            }
            let order = orders
                .iter()
                .find(|o| &o.order_id == order_id)
                .ok_or_else(|| BillingError::OrderMissing {
                    order_id: order_id.clone(),
                })?;

            for (run_id, o) in runs {
                if !order.runs().any(|r| &r.run_id == run_id) {
                    return Err(BillingError::RunNotInOrder {
                        order_id: order_id.clone(),
                        run_id: run_id.clone(),
                    });
                }
                if !o.new_rate.is_finite() || o.new_rate < 0.0 {
                    return Err(BillingError::InvalidRate {
                        run_id: run_id.clone(),
                        value: o.new_rate,
                    });
                }
            }
        }
        Ok(())
    }

    /// 生成写入计划
    ///
    /// `current` 为各订单当前已存快照 (可缺)；`target` 为写入后的状态。
    pub fn plan(
        &self,
        context: &BillingContext,
        orders: &[Order],
        current: &[BillingSnapshot],
        overrides: &RateOverrideMap,
        target: BillingState,
        now: NaiveDateTime,
    ) -> Result<BillingPlan, BillingError> {
        let from_state = context.state();
        if !from_state.can_transition_to(target) {
            return Err(BillingError::AlreadyFinal {
                context_id: context.context_id.clone(),
            });
        }
        Self::validate_overrides(context, orders, overrides)?;

        let by_order: HashMap<&str, &BillingSnapshot> =
            current.iter().map(|s| (s.order_id.as_str(), s)).collect();

        let mut snapshots = Vec::with_capacity(context.order_ids.len());
        let mut changed = from_state != target || context.latest_snapshot.is_none();

        for order_id in &context.order_ids {
            let order = orders
                .iter()
                .find(|o| &o.order_id == order_id)
                .ok_or_else(|| BillingError::OrderMissing {
                    order_id: order_id.clone(),
                })?;
            let previous = by_order.get(order_id.as_str()).copied();

            let snapshot = BillingSnapshotBuilder::build(
                order,
                &context.context_id,
                previous,
                overrides.get(order_id),
                target.is_draft(),
                now,
            )?;

            let same = previous.is_some_and(|p| {
                p.result == snapshot.result
                    && p.inputs == snapshot.inputs
                    && p.is_draft == snapshot.is_draft
            });
            changed |= !same;
            snapshots.push(snapshot);
        }

        if from_state == BillingState::Final && changed && !self.allow_refinalize {
            tracing::warn!(
                context_id = %context.context_id,
                "结算组已定稿，拒绝以不同单价重复定稿"
            );
            return Err(BillingError::RefinalizeRejected {
                context_id: context.context_id.clone(),
            });
        }

        let total: f64 = snapshots.iter().map(|s| s.result).sum();
        let context_snapshot = ContextSnapshot {
            result: round2(total),
            is_draft: target.is_draft(),
            created_at: now,
        };

        tracing::debug!(
            context_id = %context.context_id,
            from = %from_state,
            to = %target,
            changed,
            result = context_snapshot.result,
            "结算计划已生成"
        );

        Ok(BillingPlan {
            context_id: context.context_id.clone(),
            snapshots,
            context_snapshot,
            from_state,
            to_state: target,
            changed,
        })
    }
}
