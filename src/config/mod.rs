// ==========================================
// 印花车间计价系统 - 配置层
// ==========================================
// 职责: 计价口径 / 运行约束 / 结算策略的可覆写配置
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
