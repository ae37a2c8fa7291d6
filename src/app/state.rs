// ==========================================
// 印花车间计价系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{BillingApi, OrderApi, RequestSequencer, RunApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::{
    action_log_repo::ActionLogRepository, billing_repo::BillingRepository,
    order_repo::OrderRepository, run_repo::RunRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源；所有仓储共享同一个连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 订单API
    pub order_api: Arc<OrderApi>,

    /// 运行配置API
    pub run_api: Arc<RunApi>,

    /// 结算API
    pub billing_api: Arc<BillingApi>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并建表
    /// 2. 初始化所有Repository
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let order_repo = Arc::new(OrderRepository::new(conn.clone()));
        let run_repo = Arc::new(RunRepository::new(conn.clone()));
        let billing_repo = Arc::new(BillingRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // 运行与结算组的请求序号共用一个守卫 (资源键为各自 ID，创建结算组另有固定键)
        let sequencer = Arc::new(RequestSequencer::new());

        // ==========================================
        // 初始化API层
        // ==========================================
        let order_api = Arc::new(OrderApi::new(order_repo.clone(), run_repo.clone()));
        let run_api = Arc::new(RunApi::new(
            run_repo,
            config_manager.clone(),
            sequencer.clone(),
        ));
        let billing_api = Arc::new(BillingApi::new(
            order_repo,
            billing_repo,
            config_manager.clone(),
            sequencer,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            order_api,
            run_api,
            billing_api,
            action_log_repo,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 PRINT_SHOP_BILLING_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("PRINT_SHOP_BILLING_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./print_shop_billing.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("print-shop-billing-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("print-shop-billing");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("print_shop_billing.db");
    }

    path.to_string_lossy().to_string()
}
