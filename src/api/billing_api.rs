// ==========================================
// 印花车间计价系统 - 结算 API
// ==========================================
// 职责: 结算组创建 / 查询 / 草稿改价 / 定稿
// 状态机: DRAFT → FINAL (单向)
// 写入: 计划由引擎生成，仓储单事务提交；失败时不做任何部分写入
// 红线: 所有写入必须记录 ActionLog (与写入同事务提交)
// ==========================================

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use crate::api::error::{ApiError, ApiResult};
use crate::api::sequencer::RequestSequencer;
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::billing::{
    BillingContext, BillingSnapshot, FinalizeRequest, RateOverrideMap,
};
use crate::domain::order::Order;
use crate::domain::types::BillingState;
use crate::engine::billing::BillingSnapshotBuilder;
use crate::engine::finalize::BillingFinalizer;
use crate::repository::billing_repo::BillingRepository;
use crate::repository::order_repo::OrderRepository;

// ==========================================
// 响应结构
// ==========================================

/// 单订单结算视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBillingView {
    pub order: Order,
    /// 权威快照 (尚未结算时为 None)
    pub billing: Option<BillingSnapshot>,
    /// 客户端镜像金额 (含草稿覆写，未取整，仅供显示)
    pub display_total: f64,
}

/// 结算组视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingContextView {
    pub context: BillingContext,
    pub state: BillingState,
    pub orders: Vec<OrderBillingView>,
    pub display_total: f64,
}

/// 创建请求的序号资源 (结算组 ID 尚未生成)
const CREATE_CONTEXT_RESOURCE: &str = "billing_context.create";

// ==========================================
// BillingApi - 结算 API
// ==========================================
pub struct BillingApi {
    order_repo: Arc<OrderRepository>,
    billing_repo: Arc<BillingRepository>,
    config_manager: Arc<ConfigManager>,
    sequencer: Arc<RequestSequencer>,
}

impl BillingApi {
    pub fn new(
        order_repo: Arc<OrderRepository>,
        billing_repo: Arc<BillingRepository>,
        config_manager: Arc<ConfigManager>,
        sequencer: Arc<RequestSequencer>,
    ) -> Self {
        Self {
            order_repo,
            billing_repo,
            config_manager,
            sequencer,
        }
    }

    fn load_context(&self, context_id: &str) -> ApiResult<BillingContext> {
        self.billing_repo
            .find_context(context_id)?
            .ok_or_else(|| ApiError::NotFound(format!("BillingContext(id={})不存在", context_id)))
    }

    fn finalizer(&self) -> ApiResult<BillingFinalizer> {
        let allow = self
            .config_manager
            .get_allow_refinalize()
            .map_err(|e| ApiError::InternalError(format!("读取配置失败: {}", e)))?;
        Ok(BillingFinalizer::new(allow))
    }

    // ==========================================
    // 创建
    // ==========================================

    /// 从已完成订单创建结算组，并生成初始草稿快照
    ///
    /// 结算组与首个草稿同事务写入，失败时不留下无快照的结算组
    ///
    /// # 参数
    /// - seq: 客户端请求序号 (创建请求共用一个序列；过期请求被拒绝)
    #[instrument(skip(self))]
    pub fn create_billing_context(
        &self,
        name: &str,
        order_ids: &[String],
        seq: Option<u64>,
        actor: &str,
    ) -> ApiResult<BillingContextView> {
        if name.trim().is_empty() {
            return Err(ApiError::InvalidInput("结算组名称不能为空".to_string()));
        }
        if order_ids.is_empty() {
            return Err(ApiError::InvalidInput("结算组至少包含一个订单".to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = order_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(ApiError::InvalidInput(format!("订单重复: {}", dup)));
        }

        self.sequencer.run_in_order(CREATE_CONTEXT_RESOURCE, seq, || {
            let orders = self.order_repo.find_by_ids(order_ids)?;
            if let Some(pending) = orders.iter().find(|o| !o.is_completed()) {
                return Err(ApiError::BusinessRuleViolation(format!(
                    "订单{}尚有未完成配置的运行，不能加入结算组",
                    pending.order_no
                )));
            }

            let now = chrono::Local::now().naive_local();
            let context = BillingContext::new_draft(name.trim(), order_ids, actor, now);
            let plan = self.finalizer()?.plan(
                &context,
                &orders,
                &[],
                &RateOverrideMap::new(),
                BillingState::Draft,
                now,
            )?;

            let log = ActionLog::now(
                ActionType::CreateBillingContext,
                Some(&context.context_id),
                actor,
                Some(json!({
                    "name": context.name,
                    "order_ids": order_ids,
                    "result": plan.context_snapshot.result,
                    "revision": 1,
                    "seq": seq,
                })),
                None,
            );
            self.billing_repo.insert_context_with_plan(&context, &plan, &log)?;

            tracing::info!(
                context_id = %context.context_id,
                orders = order_ids.len(),
                result = plan.context_snapshot.result,
                "结算组已创建"
            );
            self.get_billing_context(&context.context_id, None)
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 查询结算组 (含订单 → 工艺 → 运行 及各订单当前快照)
    ///
    /// # 参数
    /// - draft: 调用方本地草稿覆写，仅影响 display_total，不落库
    pub fn get_billing_context(
        &self,
        context_id: &str,
        draft: Option<&RateOverrideMap>,
    ) -> ApiResult<BillingContextView> {
        let context = self.load_context(context_id)?;
        let orders = self.order_repo.find_by_ids(&context.order_ids)?;
        let snapshots = self.billing_repo.find_snapshots(context_id)?;

        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            let billing = snapshots.iter().find(|s| s.order_id == order.order_id).cloned();
            let stored = match &billing {
                Some(s) => BillingSnapshotBuilder::seed_missing(&order, &s.inputs)?,
                None => BillingSnapshotBuilder::baseline_inputs(&order)?,
            };
            let display_total = BillingSnapshotBuilder::order_amount(
                &order,
                &stored,
                draft.and_then(|d| d.get(&order.order_id)),
            );
            views.push(OrderBillingView {
                order,
                billing,
                display_total,
            });
        }

        let display_total = views.iter().map(|v| v.display_total).sum();
        Ok(BillingContextView {
            state: context.state(),
            context,
            orders: views,
            display_total,
        })
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 草稿期改价 (结算组保持 DRAFT)
    #[instrument(skip(self, request), fields(context_id = %request.billing_context_id))]
    pub fn update_draft_rates(
        &self,
        request: &FinalizeRequest,
        seq: Option<u64>,
        actor: &str,
    ) -> ApiResult<BillingContextView> {
        self.write(request, BillingState::Draft, seq, actor)
    }

    /// 定稿
    ///
    /// 应用覆写 → 重算各订单结果 → 全部快照 isDraft = false (单事务)
    #[instrument(skip(self, request), fields(context_id = %request.billing_context_id))]
    pub fn finalize_billing_context(
        &self,
        request: &FinalizeRequest,
        seq: Option<u64>,
        actor: &str,
    ) -> ApiResult<BillingContextView> {
        self.write(request, BillingState::Final, seq, actor)
    }

    fn write(
        &self,
        request: &FinalizeRequest,
        target: BillingState,
        seq: Option<u64>,
        actor: &str,
    ) -> ApiResult<BillingContextView> {
        let context_id = request.billing_context_id.as_str();
        if context_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("结算组ID不能为空".to_string()));
        }

        self.sequencer.run_in_order(context_id, seq, || {
            let context = self.load_context(context_id)?;
            let orders = self.order_repo.find_by_ids(&context.order_ids)?;
            let current = self.billing_repo.find_snapshots(context_id)?;

            let plan = self.finalizer()?.plan(
                &context,
                &orders,
                &current,
                &request.inputs,
                target,
                chrono::Local::now().naive_local(),
            )?;

            if !plan.changed {
                tracing::info!(context_id, state = %target, "结果未变化，跳过写入");
                return self.get_billing_context(context_id, None);
            }

            let (action_type, detail) = match target {
                BillingState::Draft => (ActionType::UpdateDraftRates, None),
                BillingState::Final => {
                    let config = self.config_manager.get_config_snapshot().unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "读取配置快照失败");
                        "{}".to_string()
                    });
                    (ActionType::FinalizeBillingContext, Some(config))
                }
            };
            let revision = self.billing_repo.apply_plan(&plan, request.expected_revision, |revision| {
                ActionLog::now(
                    action_type,
                    Some(context_id),
                    actor,
                    Some(json!({
                        "inputs": request.inputs,
                        "from": plan.from_state,
                        "to": plan.to_state,
                        "result": plan.context_snapshot.result,
                        "revision": revision,
                        "seq": seq,
                    })),
                    detail,
                )
            })?;

            tracing::info!(
                context_id,
                from = %plan.from_state,
                to = %plan.to_state,
                result = plan.context_snapshot.result,
                revision,
                "结算组已更新"
            );
            self.get_billing_context(context_id, None)
        })
    }
}
