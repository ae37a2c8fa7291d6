// ==========================================
// 印花车间计价系统 - 领域类型定义
// ==========================================
// 工艺类型 / 配置状态 / 结算状态
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工艺类型 (Process Kind)
// ==========================================
// 决定一个运行(run)使用哪一套计价公式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessKind {
    AlloverSublimation, // 满版升华
    Dtf,                // DTF 烫画
    Sublimation,        // 升华
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ProcessKind {
    /// 从字符串解析工艺类型
    ///
    /// 兼容数据库值 (`ALLOVER_SUBLIMATION`) 与工艺名称 (`Allover Sublimation`)；
    /// 无法识别时返回 None，由调用方决定如何报错。
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "ALLOVER_SUBLIMATION" | "ALLOVER" => Some(ProcessKind::AlloverSublimation),
            "DTF" => Some(ProcessKind::Dtf),
            "SUBLIMATION" => Some(ProcessKind::Sublimation),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProcessKind::AlloverSublimation => "ALLOVER_SUBLIMATION",
            ProcessKind::Dtf => "DTF",
            ProcessKind::Sublimation => "SUBLIMATION",
        }
    }
}

// ==========================================
// 运行配置状态 (Config Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigStatus {
    Pending,  // 待配置
    Complete, // 已配置
}

impl fmt::Display for ConfigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ConfigStatus {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "COMPLETE" => ConfigStatus::Complete,
            _ => ConfigStatus::Pending,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ConfigStatus::Pending => "PENDING",
            ConfigStatus::Complete => "COMPLETE",
        }
    }
}

// ==========================================
// 结算状态 (Billing State)
// ==========================================
// 状态机: DRAFT → FINAL (单向，不可回退)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingState {
    Draft, // 草稿
    Final, // 已定稿
}

impl fmt::Display for BillingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingState::Draft => write!(f, "DRAFT"),
            BillingState::Final => write!(f, "FINAL"),
        }
    }
}

impl BillingState {
    pub fn from_is_draft(is_draft: bool) -> Self {
        if is_draft {
            BillingState::Draft
        } else {
            BillingState::Final
        }
    }

    pub fn is_draft(&self) -> bool {
        *self == BillingState::Draft
    }

    /// 判断状态转换是否合法
    ///
    /// FINAL → FINAL 视为"重复定稿"，是否允许由上层按配置决定；
    /// FINAL → DRAFT 永远不合法。
    pub fn can_transition_to(&self, target: BillingState) -> bool {
        !matches!((self, target), (BillingState::Final, BillingState::Draft))
    }
}
