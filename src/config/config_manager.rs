// ==========================================
// 印花车间计价系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::layout::{CostingParams, DTF_LAYOUT_WIDTH, INCH_PER_METER};
use crate::domain::order::MAX_RUN_IMAGES;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 的配置值 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// 定稿时写入操作日志，便于追溯当时的计价口径
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 类型化读取 =====

    fn get_f64(&self, key: &str, default: f64) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_value(key)?;
        Ok(match value {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => {
                    tracing::warn!(key, raw = %raw, default, "配置值无法解析，使用默认值");
                    default
                }
            },
            None => default,
        })
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_value(key)?;
        Ok(match value.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
            Some(v) if v == "true" || v == "1" => true,
            Some(v) if v == "false" || v == "0" => false,
            _ => default,
        })
    }

    // ===== 计价参数 =====

    /// 当前生效的计价参数 (缺省回落到车间现行口径)
    pub fn get_costing_params(&self) -> Result<CostingParams, Box<dyn Error>> {
        let defaults = CostingParams::default();
        Ok(CostingParams {
            inch_per_meter: self.get_f64(config_keys::INCH_PER_METER, INCH_PER_METER)?,
            dtf_layout_width: self.get_f64(config_keys::DTF_LAYOUT_WIDTH, DTF_LAYOUT_WIDTH)?,
            fusing_rate_per_piece: self
                .get_f64(config_keys::FUSING_RATE_PER_PIECE, defaults.fusing_rate_per_piece)?,
            fusing_passes: self.get_f64(config_keys::FUSING_PASSES, defaults.fusing_passes)?,
        })
    }

    /// 单个运行允许的最大图片数
    pub fn get_max_run_images(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_f64(config_keys::MAX_RUN_IMAGES, MAX_RUN_IMAGES as f64)?;
        Ok(if value >= 0.0 { value as usize } else { MAX_RUN_IMAGES })
    }

    // ===== 结算 =====

    /// 已定稿结算组是否允许以不同单价重新定稿
    pub fn get_allow_refinalize(&self) -> Result<bool, Box<dyn Error>> {
        self.get_bool(config_keys::ALLOW_REFINALIZE, false)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 计价口径
    pub const INCH_PER_METER: &str = "inch_per_meter";
    pub const DTF_LAYOUT_WIDTH: &str = "dtf_layout_width";
    pub const FUSING_RATE_PER_PIECE: &str = "fusing_rate_per_piece";
    pub const FUSING_PASSES: &str = "fusing_passes";

    // 运行
    pub const MAX_RUN_IMAGES: &str = "max_run_images";

    // 结算
    pub const ALLOW_REFINALIZE: &str = "billing.allow_refinalize";
}
