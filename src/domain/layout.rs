// ==========================================
// 印花车间计价系统 - 排版行 / 运行计价领域模型
// ==========================================
// 每种工艺一套输入结构 + 一套汇总结构，
// 由 RunInput / RunSummary 两个标签联合统一承载。
// 红线: 不含计算逻辑 (计算在 engine 层)
// ==========================================

use crate::domain::types::ProcessKind;
use serde::{Deserialize, Serialize};

/// 英寸/米换算系数
pub const INCH_PER_METER: f64 = 39.38;

/// DTF 固定排版宽度 (英寸)
pub const DTF_LAYOUT_WIDTH: f64 = 23.0;

/// 升华工艺的数量列数
pub const SUBLIMATION_COLUMNS: usize = 4;

// ==========================================
// CostingParams - 计价常量
// ==========================================
// 默认值即车间现行口径；可由 config_kv 覆写
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostingParams {
    pub inch_per_meter: f64,        // 英寸/米
    pub dtf_layout_width: f64,      // DTF 排版宽度
    pub fusing_rate_per_piece: f64, // 压烫单价 (每件每道)
    pub fusing_passes: f64,         // 压烫道数
}

impl Default for CostingParams {
    fn default() -> Self {
        Self {
            inch_per_meter: INCH_PER_METER,
            dtf_layout_width: DTF_LAYOUT_WIDTH,
            fusing_rate_per_piece: 5.0,
            fusing_passes: 2.0,
        }
    }
}

// ==========================================
// 满版升华 (Allover Sublimation)
// ==========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlloverItem {
    pub design: String, // 花型
    pub height: f64,    // 高度 (英寸)
    pub rate: f64,      // 单价 (由每米单价推导，保留2位)
    pub quantity: f64,  // 数量
    pub amount: f64,    // 金额 = rate × quantity (保留2位)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlloverRunInput {
    pub particulars: String,
    pub panna: String, // 幅宽
    pub rate_per_meter: f64,
    pub printer: String,
    pub items: Vec<AlloverItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlloverSummary {
    pub total_amount: f64,
    pub total_mtr: f64,
}

// ==========================================
// DTF 烫画
// ==========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtfItem {
    pub particulars: String,
    pub height: f64,
    pub pcs_per_layout: f64,  // 每版件数
    pub quantity_actual: f64, // 实际需求数量
    pub adjustment: f64,      // 调整量 (仅记录，不参与计算)
    pub from_other: f64,      // 由其他来源补足的数量
}

/// DTF 单行派生结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtfRowResult {
    pub quantity_required: f64,
    pub number_of_layouts: f64,
    pub area: f64,
    pub price_per_layout: f64,
    pub row_total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtfRunInput {
    pub particulars: String,
    pub pcs: f64, // 计划件数
    pub is_fusing: bool,
    pub is_job_difference: bool, // 仅在 is_fusing 时有意义
    pub custom_pcs: f64,
    pub rate: f64,
    pub items: Vec<DtfItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtfSummary {
    pub rows: Vec<DtfRowResult>,
    pub total_layouts: f64,
    pub total_area: f64,
    pub layout_total_amount: f64,
    pub total_meter: f64,
    pub actual_meter: f64,
    pub efficiency: f64,
    pub fusing_cost: f64,
    pub actual_total: f64,
    pub per_pc_cost: f64,
}

// ==========================================
// 升华 (Sublimation)
// ==========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SublimationItem {
    pub size: String,
    pub width: f64,
    pub height: f64,
    pub quantities: [f64; SUBLIMATION_COLUMNS],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SublimationRowResult {
    pub sum: f64,
    pub row_rate: f64,
    pub row_total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SublimationRunInput {
    /// 全局单价；None 表示未填写
    pub rate: Option<f64>,
    /// 数量列标题 (自由文本，随数据保存，不做校验)
    pub column_labels: [String; SUBLIMATION_COLUMNS],
    pub items: Vec<SublimationItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SublimationSummary {
    pub rows: Vec<SublimationRowResult>,
    pub col_totals: [f64; SUBLIMATION_COLUMNS],
    pub total_sum: f64,
    pub total_amount: f64,
    pub avg_rate: f64,
    pub total_meters: f64,
}

// ==========================================
// LayoutRow - 单行输入 (按工艺类型区分)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "row", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayoutRow {
    AlloverSublimation(AlloverItem),
    Dtf(DtfItem),
    Sublimation(SublimationItem),
}

impl LayoutRow {
    pub fn kind(&self) -> ProcessKind {
        match self {
            LayoutRow::AlloverSublimation(_) => ProcessKind::AlloverSublimation,
            LayoutRow::Dtf(_) => ProcessKind::Dtf,
            LayoutRow::Sublimation(_) => ProcessKind::Sublimation,
        }
    }
}

// ==========================================
// RunInput / RunSummary - 按工艺类型区分的标签联合
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "input", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunInput {
    AlloverSublimation(AlloverRunInput),
    Dtf(DtfRunInput),
    Sublimation(SublimationRunInput),
}

impl RunInput {
    pub fn kind(&self) -> ProcessKind {
        match self {
            RunInput::AlloverSublimation(_) => ProcessKind::AlloverSublimation,
            RunInput::Dtf(_) => ProcessKind::Dtf,
            RunInput::Sublimation(_) => ProcessKind::Sublimation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "summary", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunSummary {
    AlloverSublimation(AlloverSummary),
    Dtf(DtfSummary),
    Sublimation(SublimationSummary),
}

impl RunSummary {
    pub fn kind(&self) -> ProcessKind {
        match self {
            RunSummary::AlloverSublimation(_) => ProcessKind::AlloverSublimation,
            RunSummary::Dtf(_) => ProcessKind::Dtf,
            RunSummary::Sublimation(_) => ProcessKind::Sublimation,
        }
    }

    /// 运行的基准计费金额 (写入值包的 `Estimated Amount`)
    pub fn estimated_amount(&self) -> f64 {
        match self {
            RunSummary::AlloverSublimation(s) => s.total_amount,
            RunSummary::Dtf(s) => s.actual_total,
            RunSummary::Sublimation(s) => s.total_amount,
        }
    }
}
