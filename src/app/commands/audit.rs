use serde::Deserialize;

use crate::api::error::ApiError;
use crate::app::state::AppState;

use super::common::{map_api_error, to_json};

// ==========================================
// 审计相关命令
// ==========================================

fn default_limit() -> i32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct ListActionLogsArgs {
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub action_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i32,
}

/// 查询操作日志 (按对象 / 按类型 / 最近)
pub async fn list_action_logs(state: &AppState, args: ListActionLogsArgs) -> Result<String, String> {
    if args.limit <= 0 {
        return Err(map_api_error(ApiError::InvalidInput(format!(
            "limit 必须大于 0: {}",
            args.limit
        ))));
    }

    let repo = &state.action_log_repo;
    let logs = match (&args.target_id, &args.action_type) {
        (Some(target_id), _) => repo.find_by_target(target_id, args.limit),
        (None, Some(action_type)) => repo.find_by_action_type(action_type, args.limit),
        (None, None) => repo.find_recent(args.limit),
    }
    .map_err(|e| map_api_error(ApiError::from(e)))?;

    to_json(&logs)
}
