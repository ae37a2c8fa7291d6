use serde::Deserialize;

use crate::app::state::AppState;

use super::common::{default_actor, map_api_error, to_json};

// ==========================================
// 订单相关命令
// ==========================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderArgs {
    pub order_no: String,
    pub quantity: i64,
    #[serde(default = "default_actor")]
    pub actor: String,
}

/// 新建订单
pub async fn create_order(state: &AppState, args: CreateOrderArgs) -> Result<String, String> {
    let order = state
        .order_api
        .create_order(&args.order_no, args.quantity, &args.actor)
        .map_err(map_api_error)?;
    to_json(&order)
}

#[derive(Debug, Deserialize)]
pub struct AddProcessArgs {
    pub order_id: String,
    pub name: String,
    #[serde(default = "default_actor")]
    pub actor: String,
}

/// 为订单新增工艺
pub async fn add_process(state: &AppState, args: AddProcessArgs) -> Result<String, String> {
    let process = state
        .order_api
        .add_process(&args.order_id, &args.name, &args.actor)
        .map_err(map_api_error)?;
    to_json(&process)
}

#[derive(Debug, Deserialize)]
pub struct AddRunArgs {
    pub process_id: String,
    #[serde(default)]
    pub process_kind: Option<String>,
    #[serde(default = "default_actor")]
    pub actor: String,
}

/// 为工艺新增运行
pub async fn add_run(state: &AppState, args: AddRunArgs) -> Result<String, String> {
    let run = state
        .order_api
        .add_run(&args.process_id, args.process_kind.as_deref(), &args.actor)
        .map_err(map_api_error)?;
    to_json(&run)
}

#[derive(Debug, Deserialize)]
pub struct GetOrderArgs {
    pub order_id: String,
}

/// 查询订单 (含工艺与运行)
pub async fn get_order(state: &AppState, args: GetOrderArgs) -> Result<String, String> {
    let order = state
        .order_api
        .get_order(&args.order_id)
        .map_err(map_api_error)?;
    to_json(&order)
}
