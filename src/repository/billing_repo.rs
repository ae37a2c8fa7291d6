// ==========================================
// 印花车间计价系统 - 结算组 / 结算快照仓储
// ==========================================
// billing_snapshot 以 (context_id, order_id) 为主键，每次写入整体替换
// 写入计划在单事务内提交：任一失败则全部回滚
// 并发控制: billing_context.revision 乐观锁
// ==========================================

use crate::db::TS_FORMAT;
use crate::domain::action_log::ActionLog;
use crate::domain::billing::{BillingContext, BillingInputs, BillingSnapshot, ContextSnapshot};
use crate::domain::types::BillingState;
use crate::engine::finalize::BillingPlan;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// BillingRepository - 结算仓储
// ==========================================
pub struct BillingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BillingRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 新建结算组并写入首个草稿快照
    ///
    /// 结算组、订单关联、快照、操作日志同一事务提交；任一失败不留下结算组
    ///
    /// # 返回
    /// - `Ok(revision)`: 写入后的修订号 (恒为 1)
    pub fn insert_context_with_plan(
        &self,
        context: &BillingContext,
        plan: &BillingPlan,
        log: &ActionLog,
    ) -> RepositoryResult<i32> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO billing_context (context_id, name, created_by, created_at, updated_at, revision)
            VALUES (?1, ?2, ?3, ?4, ?4, 0)
            "#,
            params![
                context.context_id,
                context.name,
                context.created_by,
                context.created_at.format(TS_FORMAT).to_string(),
            ],
        )?;

        for (seq_no, order_id) in context.order_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO billing_context_order (context_id, order_id, seq_no) VALUES (?1, ?2, ?3)",
                params![context.context_id, order_id, seq_no as i64],
            )?;
        }

        let revision = write_plan(&tx, plan, 1)?;
        ActionLogRepository::insert_with(&tx, log)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(revision)
    }

    /// 提交结算写入计划
    ///
    /// # 参数
    /// - `expected_revision`: Some 时校验乐观锁；None 时后写覆盖
    /// - `audit`: 按写入后的修订号生成操作日志，与计划同事务提交
    ///
    /// # 返回
    /// - `Ok(revision)`: 写入后的修订号
    pub fn apply_plan(
        &self,
        plan: &BillingPlan,
        expected_revision: Option<i32>,
        audit: impl FnOnce(i32) -> ActionLog,
    ) -> RepositoryResult<i32> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let current: Option<(i32, Option<bool>)> = tx
            .query_row(
                "SELECT revision, latest_is_draft FROM billing_context WHERE context_id = ?1",
                params![plan.context_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((revision, latest_is_draft)) = current else {
            return Err(RepositoryError::not_found("BillingContext", &plan.context_id));
        };

        if let Some(expected) = expected_revision {
            if expected != revision {
                return Err(RepositoryError::OptimisticLockFailure {
                    context_id: plan.context_id.clone(),
                    expected,
                    actual: revision,
                });
            }
        }

        // 已定稿的结算组永不回到草稿
        if latest_is_draft == Some(false) && plan.to_state == BillingState::Draft {
            return Err(RepositoryError::InvalidStateTransition {
                from: BillingState::Final.to_string(),
                to: BillingState::Draft.to_string(),
            });
        }

        let next_revision = write_plan(&tx, plan, revision + 1)?;
        ActionLogRepository::insert_with(&tx, &audit(next_revision))?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(next_revision)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 context_id 查询结算组
    pub fn find_context(&self, context_id: &str) -> RepositoryResult<Option<BillingContext>> {
        let conn = self.get_conn()?;

        let context = conn
            .query_row(
                r#"
                SELECT context_id, name, created_by, created_at, updated_at, revision,
                       latest_result, latest_is_draft, latest_created_at
                FROM billing_context
                WHERE context_id = ?1
                "#,
                params![context_id],
                map_context_row,
            )
            .optional()?;

        let Some(mut context) = context else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT order_id FROM billing_context_order WHERE context_id = ?1 ORDER BY seq_no",
        )?;
        context.order_ids = stmt
            .query_map(params![context_id], |row| row.get(0))?
            .collect::<SqliteResult<Vec<String>>>()?;

        Ok(Some(context))
    }

    /// 查询结算组下各订单的当前快照
    pub fn find_snapshots(&self, context_id: &str) -> RepositoryResult<Vec<BillingSnapshot>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.snapshot_id, s.context_id, s.order_id, s.result, s.inputs_json,
                   s.is_draft, s.created_at
            FROM billing_snapshot s
            JOIN billing_context_order o
              ON o.context_id = s.context_id AND o.order_id = s.order_id
            WHERE s.context_id = ?1
            ORDER BY o.seq_no
            "#,
        )?;

        let snapshots = stmt
            .query_map(params![context_id], map_snapshot_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(snapshots)
    }
}

/// 替换快照并刷新结算组汇总，修订号置为 `revision`
fn write_plan(conn: &Connection, plan: &BillingPlan, revision: i32) -> RepositoryResult<i32> {
    for snapshot in &plan.snapshots {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO billing_snapshot (
                snapshot_id, context_id, order_id, result, inputs_json, is_draft, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                snapshot.snapshot_id,
                snapshot.billing_context_id,
                snapshot.order_id,
                snapshot.result,
                serde_json::to_string(&snapshot.inputs)?,
                snapshot.is_draft,
                snapshot.created_at.format(TS_FORMAT).to_string(),
            ],
        )?;
    }

    let cs = &plan.context_snapshot;
    let rows = conn.execute(
        r#"
        UPDATE billing_context
        SET latest_result = ?1, latest_is_draft = ?2, latest_created_at = ?3,
            updated_at = ?3, revision = ?4
        WHERE context_id = ?5
        "#,
        params![
            cs.result,
            cs.is_draft,
            cs.created_at.format(TS_FORMAT).to_string(),
            revision,
            plan.context_id,
        ],
    )?;
    if rows == 0 {
        return Err(RepositoryError::not_found("BillingContext", &plan.context_id));
    }
    Ok(revision)
}

fn parse_ts(idx: usize, value: &str) -> SqliteResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn map_context_row(row: &Row) -> SqliteResult<BillingContext> {
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;

    let latest_result: Option<f64> = row.get(6)?;
    let latest_is_draft: Option<bool> = row.get(7)?;
    let latest_created_at: Option<String> = row.get(8)?;
    let latest_snapshot = match (latest_result, latest_is_draft, latest_created_at) {
        (Some(result), Some(is_draft), Some(ts)) => Some(ContextSnapshot {
            result,
            is_draft,
            created_at: parse_ts(8, &ts)?,
        }),
        _ => None,
    };

    Ok(BillingContext {
        context_id: row.get(0)?,
        name: row.get(1)?,
        order_ids: Vec::new(),
        latest_snapshot,
        created_by: row.get(2)?,
        created_at: parse_ts(3, &created_at)?,
        updated_at: parse_ts(4, &updated_at)?,
        revision: row.get(5)?,
    })
}

fn map_snapshot_row(row: &Row) -> SqliteResult<BillingSnapshot> {
    let inputs_str: String = row.get(4)?;
    let inputs: BillingInputs = serde_json::from_str(&inputs_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: String = row.get(6)?;

    Ok(BillingSnapshot {
        snapshot_id: row.get(0)?,
        billing_context_id: row.get(1)?,
        order_id: row.get(2)?,
        result: row.get(3)?,
        inputs,
        is_draft: row.get(5)?,
        created_at: parse_ts(6, &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action_log::ActionType;
    use crate::domain::billing::{RateOverride, RateOverrideMap, RunRateOverrides};
    use crate::domain::types::ProcessKind;
    use crate::engine::finalize::BillingFinalizer;
    use crate::repository::order_repo::OrderRepository;
    use crate::repository::run_repo::{RunConfigurationRecord, RunRepository};
    use serde_json::json;

    struct Fixture {
        conn: Arc<Mutex<Connection>>,
        orders: OrderRepository,
        billing: BillingRepository,
        order_id: String,
        run_id: String,
    }

    fn log<T>(_: &T) -> ActionLog {
        ActionLog::now(ActionType::AddRun, None, "tester", None, None)
    }

    fn finalize_log(revision: i32) -> ActionLog {
        ActionLog::now(
            ActionType::FinalizeBillingContext,
            None,
            "tester",
            Some(json!({ "revision": revision })),
            None,
        )
    }

    fn now() -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn setup() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let orders = OrderRepository::new(conn.clone());
        let runs = RunRepository::new(conn.clone());
        let order = orders.insert_order("SO-1", 10, log).unwrap();
        let process = orders.insert_process(&order.order_id, "DTF", log).unwrap();
        let run = runs.insert_run(&process.process_id, ProcessKind::Dtf, log).unwrap();

        let mut values = crate::domain::order::ValuesBag::new();
        values.insert("Estimated Amount".to_string(), json!(100.0));
        runs.save_configuration(
            &run.run_id,
            &RunConfigurationRecord {
                values,
                images: vec![],
                executor_id: None,
                reviewer_id: None,
                location_id: None,
            },
            &ActionLog::now(ActionType::ConfigureRun, None, "tester", None, None),
        )
        .unwrap();

        Fixture {
            conn: conn.clone(),
            orders,
            billing: BillingRepository::new(conn),
            order_id: order.order_id,
            run_id: run.run_id,
        }
    }

    fn plan_for(
        f: &Fixture,
        context: &BillingContext,
        rate: Option<f64>,
        target: BillingState,
    ) -> BillingPlan {
        let orders = f.orders.find_by_ids(&context.order_ids).unwrap();
        let current = f.billing.find_snapshots(&context.context_id).unwrap();

        let mut overrides = RateOverrideMap::new();
        if let Some(rate) = rate {
            let mut runs = RunRateOverrides::new();
            runs.insert(f.run_id.clone(), RateOverride { new_rate: rate });
            overrides.insert(f.order_id.clone(), runs);
        }

        BillingFinalizer::default()
            .plan(context, &orders, &current, &overrides, target, now())
            .unwrap()
    }

    /// 新建结算组并写入首个草稿，返回 context_id
    fn create_context(f: &Fixture) -> String {
        let context = BillingContext::new_draft("October", &[f.order_id.clone()], "tester", now());
        let draft = plan_for(f, &context, None, BillingState::Draft);
        let revision = f
            .billing
            .insert_context_with_plan(&context, &draft, &log(&context))
            .unwrap();
        assert_eq!(revision, 1);
        context.context_id
    }

    fn plan(f: &Fixture, context_id: &str, rate: Option<f64>, target: BillingState) -> BillingPlan {
        let context = f.billing.find_context(context_id).unwrap().unwrap();
        plan_for(f, &context, rate, target)
    }

    fn count(f: &Fixture, table: &str) -> i64 {
        let conn = f.conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_insert_context_with_plan() {
        let f = setup();
        let context_id = create_context(&f);

        let loaded = f.billing.find_context(&context_id).unwrap().unwrap();
        assert_eq!(loaded.order_ids, vec![f.order_id.clone()]);
        assert_eq!(loaded.revision, 1);
        assert_eq!(loaded.state(), BillingState::Draft);
        assert_eq!(loaded.latest_snapshot.as_ref().unwrap().result, 100.0);

        let snapshots = f.billing.find_snapshots(&context_id).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].inputs[&f.run_id].quantity, 10.0);
        assert_eq!(snapshots[0].inputs[&f.run_id].new_rate, 10.0);
    }

    #[test]
    fn test_insert_context_leaves_nothing_when_snapshot_write_fails() {
        let f = setup();
        f.conn
            .lock()
            .unwrap()
            .execute("DROP TABLE billing_snapshot", [])
            .unwrap();

        let context = BillingContext::new_draft("October", &[f.order_id.clone()], "tester", now());
        let orders = f.orders.find_by_ids(&context.order_ids).unwrap();
        let draft = BillingFinalizer::default()
            .plan(&context, &orders, &[], &RateOverrideMap::new(), BillingState::Draft, now())
            .unwrap();

        assert!(f
            .billing
            .insert_context_with_plan(&context, &draft, &log(&context))
            .is_err());
        assert_eq!(count(&f, "billing_context"), 0);
        assert_eq!(count(&f, "billing_context_order"), 0);
    }

    #[test]
    fn test_apply_plan_writes_audit_with_new_revision() {
        let f = setup();
        let context_id = create_context(&f);
        let before = count(&f, "action_log");

        let fin = plan(&f, &context_id, Some(12.0), BillingState::Final);
        assert_eq!(f.billing.apply_plan(&fin, Some(1), finalize_log).unwrap(), 2);

        assert_eq!(count(&f, "action_log"), before + 1);
        let conn = f.conn.lock().unwrap();
        let payload: String = conn
            .query_row(
                "SELECT payload_json FROM action_log WHERE action_type = 'FINALIZE_BILLING_CONTEXT'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(payload.contains("\"revision\":2"));
    }

    #[test]
    fn test_apply_plan_rolled_back_when_audit_fails() {
        let f = setup();
        let context_id = create_context(&f);
        f.conn
            .lock()
            .unwrap()
            .execute("DROP TABLE action_log", [])
            .unwrap();

        let fin = plan(&f, &context_id, Some(12.0), BillingState::Final);
        assert!(f.billing.apply_plan(&fin, Some(1), finalize_log).is_err());

        let loaded = f.billing.find_context(&context_id).unwrap().unwrap();
        assert_eq!(loaded.revision, 1);
        assert_eq!(loaded.state(), BillingState::Draft);
        let snapshots = f.billing.find_snapshots(&context_id).unwrap();
        assert!(snapshots[0].is_draft);
        assert_eq!(snapshots[0].result, 100.0);
    }

    #[test]
    fn test_apply_plan_stale_revision() {
        let f = setup();
        let context_id = create_context(&f);
        let draft = plan(&f, &context_id, None, BillingState::Draft);
        f.billing.apply_plan(&draft, None, finalize_log).unwrap();

        let fin = plan(&f, &context_id, Some(12.0), BillingState::Final);
        let err = f.billing.apply_plan(&fin, Some(1), finalize_log).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::OptimisticLockFailure { expected: 1, actual: 2, .. }
        ));

        // 失败后未写入任何内容
        let snapshots = f.billing.find_snapshots(&fin.context_id).unwrap();
        assert!(snapshots[0].is_draft);
        assert_eq!(snapshots[0].result, 100.0);
    }

    #[test]
    fn test_final_context_never_returns_to_draft() {
        let f = setup();
        let context_id = create_context(&f);
        let draft = plan(&f, &context_id, None, BillingState::Draft);
        let fin = plan(&f, &context_id, Some(12.0), BillingState::Final);
        f.billing.apply_plan(&fin, None, finalize_log).unwrap();

        // 过期的草稿计划在定稿之后提交
        let err = f.billing.apply_plan(&draft, None, finalize_log).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidStateTransition { .. }));
    }
}
