// ==========================================
// 印花车间计价系统 - 应用层
// ==========================================
// 职责: 命令分派，连接外部调用方与后端
// ==========================================

pub mod commands;
pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
