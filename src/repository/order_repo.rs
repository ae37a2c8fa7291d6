// ==========================================
// 印花车间计价系统 - 订单 / 工艺仓储
// ==========================================
// 订单读取时带出 工艺 → 运行 的完整层级
// ==========================================

use crate::db::TS_FORMAT;
use crate::domain::action_log::ActionLog;
use crate::domain::order::{Order, Process};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::run_repo::find_runs_by_process;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// OrderRepository - 订单仓储
// ==========================================
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建订单 (quantity 必须 > 0)
    ///
    /// `audit` 由新订单生成操作日志，与订单在同一事务内写入
    pub fn insert_order(
        &self,
        order_no: &str,
        quantity: i64,
        audit: impl FnOnce(&Order) -> ActionLog,
    ) -> RepositoryResult<Order> {
        if quantity <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "quantity".to_string(),
                message: format!("订单数量必须大于 0: {}", quantity),
            });
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let order = Order {
            order_id: uuid::Uuid::new_v4().to_string(),
            order_no: order_no.to_string(),
            quantity,
            created_at: chrono::Local::now().naive_local(),
            processes: Vec::new(),
        };

        tx.execute(
            "INSERT INTO orders (order_id, order_no, quantity, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                order.order_id,
                order.order_no,
                order.quantity,
                order.created_at.format(TS_FORMAT).to_string(),
            ],
        )?;
        ActionLogRepository::insert_with(&tx, &audit(&order))?;
        tx.commit()?;
        Ok(order)
    }

    /// 为订单新增工艺
    pub fn insert_process(
        &self,
        order_id: &str,
        name: &str,
        audit: impl FnOnce(&Process) -> ActionLog,
    ) -> RepositoryResult<Process> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let exists: Option<i32> = tx
            .query_row(
                "SELECT 1 FROM orders WHERE order_id = ?1",
                params![order_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(RepositoryError::not_found("Order", order_id));
        }

        let seq_no: i32 = tx.query_row(
            "SELECT COALESCE(MAX(seq_no), 0) + 1 FROM process WHERE order_id = ?1",
            params![order_id],
            |row| row.get(0),
        )?;

        let process = Process {
            process_id: uuid::Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            name: name.to_string(),
            runs: Vec::new(),
        };
        tx.execute(
            "INSERT INTO process (process_id, order_id, name, seq_no) VALUES (?1, ?2, ?3, ?4)",
            params![process.process_id, process.order_id, process.name, seq_no],
        )?;
        ActionLogRepository::insert_with(&tx, &audit(&process))?;
        tx.commit()?;

        Ok(process)
    }

    /// 按 process_id 查询工艺 (不含运行)
    pub fn find_process(&self, process_id: &str) -> RepositoryResult<Option<Process>> {
        let conn = self.get_conn()?;
        let process = conn
            .query_row(
                "SELECT process_id, order_id, name FROM process WHERE process_id = ?1",
                params![process_id],
                |row| {
                    Ok(Process {
                        process_id: row.get(0)?,
                        order_id: row.get(1)?,
                        name: row.get(2)?,
                        runs: Vec::new(),
                    })
                },
            )
            .optional()?;
        Ok(process)
    }

    /// 按 order_id 查询订单 (含工艺与运行)
    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        load_order(&conn, order_id)
    }

    /// 批量查询订单；任一缺失返回 NotFound
    pub fn find_by_ids(&self, order_ids: &[String]) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        order_ids
            .iter()
            .map(|id| {
                load_order(&conn, id)?.ok_or_else(|| RepositoryError::NotFound {
                    entity: "Order".to_string(),
                    id: id.clone(),
                })
            })
            .collect()
    }
}

fn load_order(conn: &Connection, order_id: &str) -> RepositoryResult<Option<Order>> {
    let head = conn
        .query_row(
            "SELECT order_id, order_no, quantity, created_at FROM orders WHERE order_id = ?1",
            params![order_id],
            |row| {
                let created_at: String = row.get(3)?;
                let created_at = NaiveDateTime::parse_from_str(&created_at, TS_FORMAT).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
                })?;
                Ok(Order {
                    order_id: row.get(0)?,
                    order_no: row.get(1)?,
                    quantity: row.get(2)?,
                    created_at,
                    processes: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut order) = head else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT process_id, order_id, name FROM process WHERE order_id = ?1 ORDER BY seq_no",
    )?;
    let processes = stmt
        .query_map(params![order_id], |row| {
            Ok(Process {
                process_id: row.get(0)?,
                order_id: row.get(1)?,
                name: row.get(2)?,
                runs: Vec::new(),
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;

    for mut process in processes {
        process.runs = find_runs_by_process(conn, &process.process_id)?;
        order.processes.push(process);
    }

    Ok(Some(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action_log::ActionType;
    use crate::domain::types::ProcessKind;
    use crate::repository::run_repo::RunRepository;

    fn log<T>(_: &T) -> ActionLog {
        ActionLog::now(ActionType::CreateOrder, None, "tester", None, None)
    }

    fn setup() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn test_order_hierarchy_round_trip() {
        let conn = setup();
        let orders = OrderRepository::new(conn.clone());
        let runs = RunRepository::new(conn);

        let order = orders.insert_order("SO-100", 250, log).unwrap();
        let dtf = orders.insert_process(&order.order_id, "DTF", log).unwrap();
        let sub = orders.insert_process(&order.order_id, "Sublimation", log).unwrap();
        runs.insert_run(&dtf.process_id, ProcessKind::Dtf, log).unwrap();
        runs.insert_run(&dtf.process_id, ProcessKind::Dtf, log).unwrap();
        runs.insert_run(&sub.process_id, ProcessKind::Sublimation, log).unwrap();

        let loaded = orders.find_by_id(&order.order_id).unwrap().unwrap();
        assert_eq!(loaded.quantity, 250);
        assert_eq!(loaded.processes.len(), 2);
        assert_eq!(loaded.processes[0].name, "DTF");
        assert_eq!(loaded.processes[0].runs.len(), 2);
        assert_eq!(loaded.runs().count(), 3);
        assert!(!loaded.is_completed());
    }

    #[test]
    fn test_insert_order_rejects_non_positive_quantity() {
        let orders = OrderRepository::new(setup());
        assert!(matches!(
            orders.insert_order("SO-0", 0, log),
            Err(RepositoryError::FieldValueError { .. })
        ));
    }

    #[test]
    fn test_duplicate_order_no() {
        let orders = OrderRepository::new(setup());
        orders.insert_order("SO-1", 1, log).unwrap();
        assert!(matches!(
            orders.insert_order("SO-1", 1, log),
            Err(RepositoryError::UniqueConstraintViolation(_))
        ));
    }

    #[test]
    fn test_insert_order_writes_audit_in_same_transaction() {
        let conn = setup();
        let orders = OrderRepository::new(conn.clone());
        let order = orders
            .insert_order("SO-7", 7, |o| {
                ActionLog::now(ActionType::CreateOrder, Some(&o.order_id), "tester", None, None)
            })
            .unwrap();

        let count: i64 = conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM action_log WHERE target_id = ?1",
                params![order.order_id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_insert_order_rolled_back_when_audit_fails() {
        let conn = setup();
        conn.lock().unwrap().execute("DROP TABLE action_log", []).unwrap();
        let orders = OrderRepository::new(conn.clone());

        assert!(orders.insert_order("SO-8", 8, log).is_err());
        let count: i64 = conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_find_by_ids_missing() {
        let orders = OrderRepository::new(setup());
        let order = orders.insert_order("SO-1", 1, log).unwrap();
        let err = orders
            .find_by_ids(&[order.order_id.clone(), "missing".to_string()])
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
