// ==========================================
// 印花车间计价系统 - 订单 API
// ==========================================
// 职责: 订单 / 工艺 / 运行的创建与查询
// 红线: 所有写入必须记录 ActionLog (与写入同事务提交)
// ==========================================

use std::sync::Arc;

use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::{Order, Process, ProcessRun};
use crate::domain::types::ProcessKind;
use crate::repository::order_repo::OrderRepository;
use crate::repository::run_repo::RunRepository;

// ==========================================
// OrderApi - 订单 API
// ==========================================
pub struct OrderApi {
    order_repo: Arc<OrderRepository>,
    run_repo: Arc<RunRepository>,
}

impl OrderApi {
    pub fn new(order_repo: Arc<OrderRepository>, run_repo: Arc<RunRepository>) -> Self {
        Self { order_repo, run_repo }
    }

    /// 新建订单
    pub fn create_order(&self, order_no: &str, quantity: i64, actor: &str) -> ApiResult<Order> {
        if order_no.trim().is_empty() {
            return Err(ApiError::InvalidInput("订单编号不能为空".to_string()));
        }
        if quantity <= 0 {
            return Err(ApiError::InvalidInput(format!("订单数量必须大于 0: {}", quantity)));
        }

        let order = self.order_repo.insert_order(order_no.trim(), quantity, |order| {
            ActionLog::now(
                ActionType::CreateOrder,
                Some(&order.order_id),
                actor,
                Some(json!({ "order_no": order.order_no, "quantity": quantity })),
                None,
            )
        })?;

        tracing::info!(order_id = %order.order_id, order_no = %order.order_no, "订单已创建");
        Ok(order)
    }

    /// 为订单新增工艺
    pub fn add_process(&self, order_id: &str, name: &str, actor: &str) -> ApiResult<Process> {
        if name.trim().is_empty() {
            return Err(ApiError::InvalidInput("工艺名称不能为空".to_string()));
        }

        let process = self.order_repo.insert_process(order_id, name.trim(), |process| {
            ActionLog::now(
                ActionType::AddProcess,
                Some(order_id),
                actor,
                Some(json!({ "process_id": process.process_id, "name": process.name })),
                None,
            )
        })?;

        Ok(process)
    }

    /// 为工艺新增运行
    ///
    /// 未指定工艺类型时按工艺名称推断 (如 "DTF" / "Allover Sublimation")
    pub fn add_run(&self, process_id: &str, process_kind: Option<&str>, actor: &str) -> ApiResult<ProcessRun> {
        let process = self.order_repo.find_process(process_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("Process(id={})不存在", process_id))
        })?;

        let raw_kind = process_kind.unwrap_or(&process.name);
        let kind = ProcessKind::parse(raw_kind)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知工艺类型: {}", raw_kind)))?;

        let run = self.run_repo.insert_run(process_id, kind, |run| {
            ActionLog::now(
                ActionType::AddRun,
                Some(&run.run_id),
                actor,
                Some(json!({
                    "process_id": process_id,
                    "run_number": run.run_number,
                    "process_kind": kind.to_db_str(),
                })),
                None,
            )
        })?;

        Ok(run)
    }

    /// 查询订单 (含工艺与运行)
    pub fn get_order(&self, order_id: &str) -> ApiResult<Order> {
        self.order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Order(id={})不存在", order_id)))
    }
}
