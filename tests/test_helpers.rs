// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、AppState 构造、常用测试数据
// ==========================================

#![allow(dead_code)]

use std::error::Error;

use print_shop_billing::app::AppState;
use print_shop_billing::domain::order::{Order, RunConfiguration, ValuesBag};
use serde_json::json;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_string_lossy().to_string();

    let conn = print_shop_billing::db::open_sqlite_connection(&db_path)?;
    print_shop_billing::db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 创建基于临时数据库的 AppState
pub fn create_test_state() -> (NamedTempFile, AppState) {
    let (temp_file, db_path) = create_test_db().unwrap();
    let state = AppState::new(db_path).unwrap();
    (temp_file, state)
}

/// Allover 运行字段 (单行 5 件，行单价 = 每米单价，估算金额 = 5 × 每米单价)
pub fn allover_fields(rate_per_meter: f64) -> ValuesBag {
    json!({
        "particulars": "Jersey",
        "panna": "60",
        "ratePerMeter": rate_per_meter,
        "printer": "P1",
        "items": [{ "design": "D1", "height": 39.38, "rate": rate_per_meter, "quantity": 5 }]
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub fn allover_configuration(rate_per_meter: f64) -> RunConfiguration {
    RunConfiguration {
        fields: allover_fields(rate_per_meter),
        ..Default::default()
    }
}

/// 新建订单 + 一个 Allover 工艺 + 一个已配置运行
///
/// # 返回
/// (订单, 运行ID)
pub fn seed_completed_order(
    state: &AppState,
    order_no: &str,
    quantity: i64,
    rate_per_meter: f64,
) -> (Order, String) {
    let (order, mut run_ids) = seed_order_with_runs(state, order_no, quantity, &[rate_per_meter]);
    (order, run_ids.remove(0))
}

/// 新建订单 + 一个 Allover 工艺，每个每米单价对应一个已配置运行
///
/// # 返回
/// (订单, 运行ID 列表，顺序与 rates 一致)
pub fn seed_order_with_runs(
    state: &AppState,
    order_no: &str,
    quantity: i64,
    rates_per_meter: &[f64],
) -> (Order, Vec<String>) {
    let order = state
        .order_api
        .create_order(order_no, quantity, "tester")
        .unwrap();
    let process = state
        .order_api
        .add_process(&order.order_id, "Allover Sublimation", "tester")
        .unwrap();

    let mut run_ids = Vec::with_capacity(rates_per_meter.len());
    for &rate in rates_per_meter {
        let run = state
            .order_api
            .add_run(&process.process_id, None, "tester")
            .unwrap();
        state
            .run_api
            .configure_run(&run.run_id, &allover_configuration(rate), None, "tester")
            .unwrap();
        run_ids.push(run.run_id);
    }

    let order = state.order_api.get_order(&order.order_id).unwrap();
    (order, run_ids)
}
