// ==========================================
// 印花车间计价系统 - 引擎层
// ==========================================
// 职责: 运行计价 (三种工艺) + 结算快照 + 定稿计划
// 红线: Engine 不拼 SQL；计算器均为纯函数
// ==========================================

pub mod allover;
pub mod billing;
pub mod costing;
pub mod draft;
pub mod dtf;
pub mod error;
pub mod finalize;
pub mod numeric;
pub mod sublimation;
pub mod value_bag;

// 重导出核心引擎
pub use billing::BillingSnapshotBuilder;
pub use costing::{CostedRun, RunCostingEngine};
pub use draft::{DraftEdit, RunDraft};
pub use error::{BillingError, CostingError};
pub use finalize::{BillingFinalizer, BillingPlan};
