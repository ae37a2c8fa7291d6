use serde::Deserialize;

use crate::app::state::AppState;
use crate::domain::billing::{FinalizeRequest, RateOverrideMap};

use super::common::{default_actor, map_api_error, to_json};

// ==========================================
// 结算相关命令
// ==========================================

#[derive(Debug, Deserialize)]
pub struct CreateBillingContextArgs {
    pub name: String,
    pub order_ids: Vec<String>,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default = "default_actor")]
    pub actor: String,
}

/// 新建结算组
pub async fn create_billing_context(
    state: &AppState,
    args: CreateBillingContextArgs,
) -> Result<String, String> {
    let view = state
        .billing_api
        .create_billing_context(&args.name, &args.order_ids, args.seq, &args.actor)
        .map_err(map_api_error)?;
    to_json(&view)
}

#[derive(Debug, Deserialize)]
pub struct GetBillingContextArgs {
    #[serde(alias = "billingContextId")]
    pub billing_context_id: String,
    /// 本地草稿覆写 (仅影响显示金额)
    #[serde(default)]
    pub draft_inputs: Option<RateOverrideMap>,
}

/// 查询结算组
pub async fn get_billing_context(
    state: &AppState,
    args: GetBillingContextArgs,
) -> Result<String, String> {
    let view = state
        .billing_api
        .get_billing_context(&args.billing_context_id, args.draft_inputs.as_ref())
        .map_err(map_api_error)?;
    to_json(&view)
}

#[derive(Debug, Deserialize)]
pub struct BillingWriteArgs {
    #[serde(flatten)]
    pub request: FinalizeRequest,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default = "default_actor")]
    pub actor: String,
}

/// 草稿期改价
pub async fn update_draft_rates(state: &AppState, args: BillingWriteArgs) -> Result<String, String> {
    let view = state
        .billing_api
        .update_draft_rates(&args.request, args.seq, &args.actor)
        .map_err(map_api_error)?;
    to_json(&view)
}

/// 结算定稿
pub async fn finalize_billing_context(
    state: &AppState,
    args: BillingWriteArgs,
) -> Result<String, String> {
    let view = state
        .billing_api
        .finalize_billing_context(&args.request, args.seq, &args.actor)
        .map_err(map_api_error)?;
    to_json(&view)
}
