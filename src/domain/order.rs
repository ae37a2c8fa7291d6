// ==========================================
// 印花车间计价系统 - 订单 / 工艺 / 运行领域模型
// ==========================================
// 订单 → 工艺(Process) → 运行(ProcessRun)
// 运行的原始输入与计算汇总共存于同一个 values 值包
// ==========================================

use crate::domain::types::{ConfigStatus, ProcessKind};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// 运行值包 (字段键 → 任意 JSON 值)
pub type ValuesBag = Map<String, JsonValue>;

/// 单个运行允许的最大图片数
pub const MAX_RUN_IMAGES: usize = 2;

// ==========================================
// Order - 订单
// ==========================================
// 约束: quantity > 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub order_no: String,          // 订单编号 (展示用)
    pub quantity: i64,             // 订购件数
    pub created_at: NaiveDateTime,
    pub processes: Vec<Process>,
}

impl Order {
    /// 遍历订单下所有运行
    pub fn runs(&self) -> impl Iterator<Item = &ProcessRun> {
        self.processes.iter().flat_map(|p| p.runs.iter())
    }

    /// 订单是否已完成配置 (至少一个运行，且全部 COMPLETE)
    pub fn is_completed(&self) -> bool {
        let mut runs = self.runs().peekable();
        runs.peek().is_some() && runs.all(|r| r.config_status == ConfigStatus::Complete)
    }
}

// ==========================================
// Process - 工艺
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub process_id: String,
    pub order_id: String,
    pub name: String, // 工艺名称 (如 "DTF")
    pub runs: Vec<ProcessRun>,
}

// ==========================================
// ProcessRun - 生产运行
// ==========================================
// 仅通过"保存配置"整体替换 values，不做字段级修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRun {
    pub run_id: String,
    pub process_id: String,
    pub run_number: i32,
    pub process_kind: ProcessKind,
    pub values: ValuesBag,
    pub images: Vec<String>, // 0~2 张
    pub executor_id: Option<String>,
    pub reviewer_id: Option<String>,
    pub location_id: Option<String>,
    pub config_status: ConfigStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ProcessRun {
    pub fn is_complete(&self) -> bool {
        self.config_status == ConfigStatus::Complete
    }
}

// ==========================================
// RunConfiguration - 运行配置保存请求
// ==========================================
// fields 与持久化值包同构 (计算字段与原始字段共用命名空间)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub fields: ValuesBag,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default, alias = "executorId")]
    pub executor_id: Option<String>,
    #[serde(default, alias = "reviewerId")]
    pub reviewer_id: Option<String>,
    #[serde(default, alias = "locationId")]
    pub location_id: Option<String>,
}
