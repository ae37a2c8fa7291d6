// ==========================================
// 印花车间计价系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含计价逻辑
// ==========================================

pub mod action_log;
pub mod billing;
pub mod layout;
pub mod order;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use billing::{
    BillingContext, BillingInputs, BillingSnapshot, ContextSnapshot, FinalizeRequest,
    RateOverride, RateOverrideMap, RunBillingInput, RunRateOverrides,
};
pub use layout::{
    AlloverItem, AlloverRunInput, AlloverSummary, CostingParams, DtfItem, DtfRowResult,
    DtfRunInput, DtfSummary, LayoutRow, RunInput, RunSummary, SublimationItem, SublimationRowResult,
    SublimationRunInput, SublimationSummary,
};
pub use order::{Order, Process, ProcessRun, RunConfiguration, ValuesBag};
pub use types::{BillingState, ConfigStatus, ProcessKind};
