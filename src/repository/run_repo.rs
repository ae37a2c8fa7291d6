// ==========================================
// 印花车间计价系统 - 运行值包仓储
// ==========================================
// process_run 表: 原始输入与计算汇总共存于 values_json
// 保存配置 = 整体替换 values_json + 标记 COMPLETE
// ==========================================

use crate::db::TS_FORMAT;
use crate::domain::action_log::ActionLog;
use crate::domain::order::{ProcessRun, ValuesBag};
use crate::domain::types::{ConfigStatus, ProcessKind};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub(crate) const RUN_COLUMNS: &str = r#"
    SELECT run_id, process_id, run_number, process_kind, values_json, images_json,
           executor_id, reviewer_id, location_id, config_status, created_at, updated_at
    FROM process_run
"#;

/// 保存配置时整体写入的内容
#[derive(Debug, Clone)]
pub struct RunConfigurationRecord {
    pub values: ValuesBag,
    pub images: Vec<String>,
    pub executor_id: Option<String>,
    pub reviewer_id: Option<String>,
    pub location_id: Option<String>,
}

// ==========================================
// RunRepository - 运行仓储
// ==========================================
pub struct RunRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RunRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增运行 (run_number 取该工艺下的下一个序号)
    pub fn insert_run(
        &self,
        process_id: &str,
        process_kind: ProcessKind,
        audit: impl FnOnce(&ProcessRun) -> ActionLog,
    ) -> RepositoryResult<ProcessRun> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let exists: Option<i32> = tx
            .query_row(
                "SELECT 1 FROM process WHERE process_id = ?1",
                params![process_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(RepositoryError::not_found("Process", process_id));
        }

        let run_number: i32 = tx.query_row(
            "SELECT COALESCE(MAX(run_number), 0) + 1 FROM process_run WHERE process_id = ?1",
            params![process_id],
            |row| row.get(0),
        )?;

        let now = chrono::Local::now().naive_local();
        let run = ProcessRun {
            run_id: uuid::Uuid::new_v4().to_string(),
            process_id: process_id.to_string(),
            run_number,
            process_kind,
            values: ValuesBag::new(),
            images: Vec::new(),
            executor_id: None,
            reviewer_id: None,
            location_id: None,
            config_status: ConfigStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        tx.execute(
            r#"
            INSERT INTO process_run (
                run_id, process_id, run_number, process_kind, values_json, images_json,
                config_status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, '{}', '[]', ?5, ?6, ?6)
            "#,
            params![
                run.run_id,
                run.process_id,
                run.run_number,
                run.process_kind.to_db_str(),
                run.config_status.to_db_str(),
                now.format(TS_FORMAT).to_string(),
            ],
        )?;
        ActionLogRepository::insert_with(&tx, &audit(&run))?;
        tx.commit()?;

        Ok(run)
    }

    /// 按 run_id 查询
    pub fn find_by_id(&self, run_id: &str) -> RepositoryResult<Option<ProcessRun>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!("{} WHERE run_id = ?1", RUN_COLUMNS))?;
        let run = stmt.query_row(params![run_id], map_run_row).optional()?;
        Ok(run)
    }

    /// 查询工艺下的全部运行 (按 run_number 排序)
    pub fn find_by_process(&self, process_id: &str) -> RepositoryResult<Vec<ProcessRun>> {
        let conn = self.get_conn()?;
        find_runs_by_process(&conn, process_id)
    }

    /// 保存配置：整体替换值包，状态置为 COMPLETE
    ///
    /// 值包与操作日志同一事务提交；日志写入失败则运行保持原状
    pub fn save_configuration(
        &self,
        run_id: &str,
        record: &RunConfigurationRecord,
        log: &ActionLog,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let values_json = serde_json::to_string(&record.values)?;
        let images_json = serde_json::to_string(&record.images)?;

        let rows = tx.execute(
            r#"
            UPDATE process_run
            SET values_json = ?1, images_json = ?2,
                executor_id = ?3, reviewer_id = ?4, location_id = ?5,
                config_status = ?6, updated_at = ?7
            WHERE run_id = ?8
            "#,
            params![
                values_json,
                images_json,
                record.executor_id,
                record.reviewer_id,
                record.location_id,
                ConfigStatus::Complete.to_db_str(),
                chrono::Local::now().naive_local().format(TS_FORMAT).to_string(),
                run_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::not_found("ProcessRun", run_id));
        }

        ActionLogRepository::insert_with(&tx, log)?;
        tx.commit()?;
        Ok(())
    }
}

pub(crate) fn find_runs_by_process(conn: &Connection, process_id: &str) -> RepositoryResult<Vec<ProcessRun>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE process_id = ?1 ORDER BY run_number",
        RUN_COLUMNS
    ))?;
    let runs = stmt
        .query_map(params![process_id], map_run_row)?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(runs)
}

fn parse_ts(idx: usize, value: &str) -> SqliteResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 映射数据库行到 ProcessRun
pub(crate) fn map_run_row(row: &Row) -> SqliteResult<ProcessRun> {
    let kind_str: String = row.get(3)?;
    let process_kind = ProcessKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("未知工艺类型: {}", kind_str).into(),
        )
    })?;

    let values_str: String = row.get(4)?;
    let values: ValuesBag = serde_json::from_str(&values_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let images_str: String = row.get(5)?;
    let images: Vec<String> = serde_json::from_str(&images_str).unwrap_or_default();

    let status_str: String = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(ProcessRun {
        run_id: row.get(0)?,
        process_id: row.get(1)?,
        run_number: row.get(2)?,
        process_kind,
        values,
        images,
        executor_id: row.get(6)?,
        reviewer_id: row.get(7)?,
        location_id: row.get(8)?,
        config_status: ConfigStatus::from_str(&status_str),
        created_at: parse_ts(10, &created_at)?,
        updated_at: parse_ts(11, &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action_log::ActionType;
    use crate::repository::order_repo::OrderRepository;
    use serde_json::json;

    fn log<T>(_: &T) -> ActionLog {
        ActionLog::now(ActionType::AddRun, None, "tester", None, None)
    }

    fn configure_log() -> ActionLog {
        ActionLog::now(ActionType::ConfigureRun, None, "tester", None, None)
    }

    fn setup() -> (OrderRepository, RunRepository, String) {
        let (orders, runs, process_id, _) = setup_with_conn();
        (orders, runs, process_id)
    }

    fn setup_with_conn() -> (OrderRepository, RunRepository, String, Arc<Mutex<Connection>>) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let orders = OrderRepository::new(conn.clone());
        let order = orders.insert_order("SO-001", 100, log).unwrap();
        let process = orders.insert_process(&order.order_id, "DTF", log).unwrap();
        (orders, RunRepository::new(conn.clone()), process.process_id, conn)
    }

    #[test]
    fn test_insert_run_numbers_sequentially() {
        let (_, runs, process_id) = setup();

        let r1 = runs.insert_run(&process_id, ProcessKind::Dtf, log).unwrap();
        let r2 = runs.insert_run(&process_id, ProcessKind::Dtf, log).unwrap();
        assert_eq!(r1.run_number, 1);
        assert_eq!(r2.run_number, 2);
        assert_eq!(r1.config_status, ConfigStatus::Pending);

        let listed = runs.find_by_process(&process_id).unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn test_insert_run_unknown_process() {
        let (_, runs, _) = setup();
        let err = runs.insert_run("missing", ProcessKind::Dtf, log).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_save_configuration_replaces_bag() {
        let (_, runs, process_id) = setup();
        let run = runs.insert_run(&process_id, ProcessKind::Dtf, log).unwrap();

        let mut values = ValuesBag::new();
        values.insert("particulars".to_string(), json!("Tee"));
        values.insert("Estimated Amount".to_string(), json!(1234.5));
        let record = RunConfigurationRecord {
            values: values.clone(),
            images: vec!["a.png".to_string()],
            executor_id: Some("E1".to_string()),
            reviewer_id: None,
            location_id: None,
        };
        runs.save_configuration(&run.run_id, &record, &configure_log()).unwrap();

        let saved = runs.find_by_id(&run.run_id).unwrap().unwrap();
        assert_eq!(saved.values, values);
        assert_eq!(saved.images, vec!["a.png".to_string()]);
        assert_eq!(saved.executor_id, Some("E1".to_string()));
        assert!(saved.is_complete());

        // 整体替换，不保留旧键
        let mut replaced = ValuesBag::new();
        replaced.insert("particulars".to_string(), json!("Hoodie"));
        runs.save_configuration(
            &run.run_id,
            &RunConfigurationRecord {
                values: replaced.clone(),
                images: vec![],
                executor_id: None,
                reviewer_id: None,
                location_id: None,
            },
            &configure_log(),
        )
        .unwrap();
        let saved = runs.find_by_id(&run.run_id).unwrap().unwrap();
        assert_eq!(saved.values, replaced);
    }

    #[test]
    fn test_save_configuration_missing_run() {
        let (_, runs, _) = setup();
        let record = RunConfigurationRecord {
            values: ValuesBag::new(),
            images: vec![],
            executor_id: None,
            reviewer_id: None,
            location_id: None,
        };
        assert!(matches!(
            runs.save_configuration("missing", &record, &configure_log()),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_save_configuration_rolled_back_when_audit_fails() {
        let (_, runs, process_id, conn) = setup_with_conn();
        let run = runs.insert_run(&process_id, ProcessKind::Dtf, log).unwrap();
        conn.lock().unwrap().execute("DROP TABLE action_log", []).unwrap();

        let mut values = ValuesBag::new();
        values.insert("particulars".to_string(), json!("Tee"));
        let record = RunConfigurationRecord {
            values,
            images: vec![],
            executor_id: None,
            reviewer_id: None,
            location_id: None,
        };
        assert!(runs.save_configuration(&run.run_id, &record, &configure_log()).is_err());

        let saved = runs.find_by_id(&run.run_id).unwrap().unwrap();
        assert_eq!(saved.config_status, ConfigStatus::Pending);
        assert!(saved.values.is_empty());
    }
}
