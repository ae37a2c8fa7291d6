// ==========================================
// 印花车间计价系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令层调用
// ==========================================

pub mod billing_api;
pub mod error;
pub mod order_api;
pub mod run_api;
pub mod sequencer;

// 重导出核心类型
pub use billing_api::{BillingApi, BillingContextView, OrderBillingView};
pub use error::{ApiError, ApiResult};
pub use order_api::OrderApi;
pub use run_api::{ConfigureRunResponse, RunApi, RunPreview, RunView};
pub use sequencer::RequestSequencer;
