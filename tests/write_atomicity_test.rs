// ==========================================
// 写入原子性集成测试
// ==========================================
// 覆盖: 操作日志写入失败 → 业务写入整体回滚
//       结算组创建失败 → 不留下无快照的结算组
// 做法: 另开一条连接删表，模拟日志表 / 快照表不可写
// ==========================================

mod test_helpers;

use print_shop_billing::api::ApiError;
use print_shop_billing::domain::billing::{FinalizeRequest, RateOverrideMap};
use print_shop_billing::domain::types::{BillingState, ConfigStatus};
use tempfile::NamedTempFile;
use test_helpers::*;

fn side_connection(tmp: &NamedTempFile) -> rusqlite::Connection {
    print_shop_billing::db::open_sqlite_connection(&tmp.path().to_string_lossy()).unwrap()
}

fn count(conn: &rusqlite::Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_finalize_stays_draft_when_audit_write_fails() {
    let (tmp, state) = create_test_state();
    let (order, _run_id) = seed_completed_order(&state, "ORD-A", 100, 100.0);
    let created = state
        .billing_api
        .create_billing_context("十月结算", &[order.order_id], None, "tester")
        .unwrap();
    let context_id = created.context.context_id.clone();

    side_connection(&tmp)
        .execute("DROP TABLE action_log", [])
        .unwrap();

    let request = FinalizeRequest {
        billing_context_id: context_id.clone(),
        inputs: RateOverrideMap::new(),
        expected_revision: None,
    };
    let result = state
        .billing_api
        .finalize_billing_context(&request, Some(1), "tester");
    assert!(result.is_err());

    let view = state.billing_api.get_billing_context(&context_id, None).unwrap();
    assert_eq!(view.state, BillingState::Draft);
    assert_eq!(view.context.revision, created.context.revision);
    assert!(view.orders.iter().all(|o| o.billing.as_ref().unwrap().is_draft));

    // 失败的请求不占用序号，日志表恢复后同一序号可以重试
    print_shop_billing::db::init_schema(&side_connection(&tmp)).unwrap();
    let view = state
        .billing_api
        .finalize_billing_context(&request, Some(1), "tester")
        .unwrap();
    assert_eq!(view.state, BillingState::Final);
    assert_eq!(view.context.revision, created.context.revision + 1);
}

#[test]
fn test_configure_run_stays_pending_when_audit_write_fails() {
    let (tmp, state) = create_test_state();
    let order = state.order_api.create_order("ORD-B", 10, "tester").unwrap();
    let process = state
        .order_api
        .add_process(&order.order_id, "Allover Sublimation", "tester")
        .unwrap();
    let run = state
        .order_api
        .add_run(&process.process_id, None, "tester")
        .unwrap();

    side_connection(&tmp)
        .execute("DROP TABLE action_log", [])
        .unwrap();

    let err = state
        .run_api
        .configure_run(&run.run_id, &allover_configuration(100.0), None, "tester")
        .unwrap_err();
    assert!(!matches!(err, ApiError::ValidationError { .. }));

    let view = state.run_api.get_run(&run.run_id).unwrap();
    assert_eq!(view.run.config_status, ConfigStatus::Pending);
    assert!(view.run.values.is_empty());
}

#[test]
fn test_create_order_not_kept_when_audit_write_fails() {
    let (tmp, state) = create_test_state();
    let side = side_connection(&tmp);
    side.execute("DROP TABLE action_log", []).unwrap();

    assert!(state.order_api.create_order("ORD-C", 10, "tester").is_err());
    assert_eq!(count(&side, "orders"), 0);
}

#[test]
fn test_create_context_leaves_no_orphan_when_snapshot_write_fails() {
    let (tmp, state) = create_test_state();
    let (order, _run_id) = seed_completed_order(&state, "ORD-D", 100, 100.0);
    let side = side_connection(&tmp);
    side.execute("DROP TABLE billing_snapshot", []).unwrap();

    let result = state.billing_api.create_billing_context(
        "十月结算",
        &[order.order_id.clone()],
        Some(1),
        "tester",
    );
    assert!(result.is_err());
    assert_eq!(count(&side, "billing_context"), 0);
    assert_eq!(count(&side, "billing_context_order"), 0);
    assert_eq!(
        count(&side, "action_log WHERE action_type = 'CREATE_BILLING_CONTEXT'"),
        0
    );

    // 快照表恢复后，同一序号重试成功
    print_shop_billing::db::init_schema(&side).unwrap();
    let view = state
        .billing_api
        .create_billing_context("十月结算", &[order.order_id], Some(1), "tester")
        .unwrap();
    assert_eq!(view.context.revision, 1);
    assert!(view.orders.iter().all(|o| o.billing.as_ref().unwrap().is_draft));
    assert_eq!(count(&side, "billing_context"), 1);
}

#[test]
fn test_create_context_rejects_stale_sequence() {
    let (_tmp, state) = create_test_state();
    let (order_a, _) = seed_completed_order(&state, "ORD-E", 10, 100.0);
    let (order_b, _) = seed_completed_order(&state, "ORD-F", 10, 100.0);

    state
        .billing_api
        .create_billing_context("第一批", &[order_a.order_id], Some(3), "tester")
        .unwrap();
    let err = state
        .billing_api
        .create_billing_context("第二批", &[order_b.order_id], Some(2), "tester")
        .unwrap_err();
    assert!(matches!(err, ApiError::StaleRequest { .. }));
}
