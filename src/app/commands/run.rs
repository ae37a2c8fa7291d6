use serde::Deserialize;

use crate::app::state::AppState;
use crate::domain::order::{RunConfiguration, ValuesBag};
use crate::engine::draft::DraftEdit;

use super::common::{default_actor, map_api_error, to_json};

// ==========================================
// 运行配置相关命令
// ==========================================

#[derive(Debug, Deserialize)]
pub struct PreviewRunArgs {
    pub run_id: String,
    #[serde(default)]
    pub fields: Option<ValuesBag>,
    #[serde(default)]
    pub edits: Vec<DraftEdit>,
}

/// 预览运行计价 (不落库)
pub async fn preview_run(state: &AppState, args: PreviewRunArgs) -> Result<String, String> {
    let preview = state
        .run_api
        .preview_run(&args.run_id, args.fields.as_ref(), &args.edits)
        .map_err(map_api_error)?;
    to_json(&preview)
}

#[derive(Debug, Deserialize)]
pub struct ConfigureRunArgs {
    pub run_id: String,
    #[serde(flatten)]
    pub configuration: RunConfiguration,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default = "default_actor")]
    pub actor: String,
}

/// 保存运行配置
pub async fn configure_run(state: &AppState, args: ConfigureRunArgs) -> Result<String, String> {
    let response = state
        .run_api
        .configure_run(&args.run_id, &args.configuration, args.seq, &args.actor)
        .map_err(map_api_error)?;
    to_json(&response)
}

#[derive(Debug, Deserialize)]
pub struct GetRunArgs {
    pub run_id: String,
}

/// 查询运行
pub async fn get_run(state: &AppState, args: GetRunArgs) -> Result<String, String> {
    let view = state.run_api.get_run(&args.run_id).map_err(map_api_error)?;
    to_json(&view)
}
