// ==========================================
// 印花车间计价系统 - 命令层（按域拆分）
// ==========================================
// 职责: JSON 入 / JSON 出 的命令函数，连接外部调用方与后端 API
// 请求: {"command": "...", "args": {...}}
// 响应: {"ok": true, "data": ...} / {"ok": false, "error": {code, message, details}}
// ==========================================

mod audit;
mod billing;
mod common;
mod order;
mod run;

pub use audit::*;
pub use billing::*;
pub use common::ErrorResponse;
pub use order::*;
pub use run::*;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::api::error::ApiError;
use crate::app::state::AppState;
use common::{map_api_error, parse_args};

/// 命令请求
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub args: JsonValue,
}

/// 按命令名分派
pub async fn dispatch(state: &AppState, request: CommandRequest) -> Result<String, String> {
    let args = request.args;
    match request.command.as_str() {
        // ===== 订单 =====
        "create_order" => create_order(state, parse_args(args)?).await,
        "add_process" => add_process(state, parse_args(args)?).await,
        "add_run" => add_run(state, parse_args(args)?).await,
        "get_order" => get_order(state, parse_args(args)?).await,

        // ===== 运行 =====
        "preview_run" => preview_run(state, parse_args(args)?).await,
        "configure_run" => configure_run(state, parse_args(args)?).await,
        "get_run" => get_run(state, parse_args(args)?).await,

        // ===== 结算 =====
        "create_billing_context" => create_billing_context(state, parse_args(args)?).await,
        "get_billing_context" => get_billing_context(state, parse_args(args)?).await,
        "update_draft_rates" => update_draft_rates(state, parse_args(args)?).await,
        "finalize_billing_context" => finalize_billing_context(state, parse_args(args)?).await,

        // ===== 审计 =====
        "list_action_logs" => list_action_logs(state, parse_args(args)?).await,

        other => Err(map_api_error(ApiError::InvalidInput(format!(
            "未知命令: {}",
            other
        )))),
    }
}

/// 处理一行请求文本，返回一行响应文本
pub async fn handle_line(state: &AppState, line: &str) -> String {
    let result = match serde_json::from_str::<CommandRequest>(line) {
        Ok(request) => {
            tracing::debug!(command = %request.command, "收到命令");
            dispatch(state, request).await
        }
        Err(e) => Err(map_api_error(ApiError::InvalidInput(format!(
            "请求格式错误: {}",
            e
        )))),
    };
    respond(result)
}

/// 将命令结果包装为响应信封
pub fn respond(result: Result<String, String>) -> String {
    let envelope = match result {
        Ok(data) => serde_json::json!({
            "ok": true,
            "data": serde_json::from_str::<JsonValue>(&data).unwrap_or(JsonValue::String(data)),
        }),
        Err(error) => serde_json::json!({
            "ok": false,
            "error": serde_json::from_str::<JsonValue>(&error).unwrap_or(JsonValue::String(error)),
        }),
    };
    envelope.to_string()
}
