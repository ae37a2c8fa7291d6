// ==========================================
// 印花车间计价系统 - 运行值包编解码
// ==========================================
// 运行的原始输入与计算汇总存放在同一个无类型值包中，
// 计算字段 (如 `Total Amount` / `Estimated Amount`) 与 `particulars`
// 等原始字段共用命名空间。
// 读取: 值包 → RunInput (宽松数值解析)
// 写入: RunInput + RunSummary → 值包 (行派生字段一并写入，便于展示)
// ==========================================

use crate::domain::layout::{
    AlloverItem, AlloverRunInput, DtfItem, DtfRunInput, RunInput, RunSummary, SublimationItem,
    SublimationRunInput, SUBLIMATION_COLUMNS,
};
use crate::domain::order::ValuesBag;
use crate::domain::types::ProcessKind;
use crate::engine::error::CostingError;
use crate::engine::numeric::{json_number, lenient_bool, lenient_f64, lenient_string};
use serde_json::{json, Map, Value as JsonValue};

// ==========================================
// 值包字段键
// ==========================================
pub mod value_keys {
    // ===== 表头 (原始输入) =====
    pub const PARTICULARS: &str = "particulars";
    pub const PANNA: &str = "panna";
    pub const RATE_PER_METER: &str = "ratePerMeter";
    pub const PRINTER: &str = "printer";
    pub const PCS: &str = "pcs";
    pub const IS_FUSING: &str = "isFusing";
    pub const IS_JOB_DIFFERENCE: &str = "isJobDifference";
    pub const CUSTOM_PCS: &str = "customPcs";
    pub const RATE: &str = "rate";
    pub const COLUMN_LABELS: &str = "columnLabels";
    pub const ITEMS: &str = "items";

    // ===== 明细行 =====
    pub const DESIGN: &str = "design";
    pub const HEIGHT: &str = "height";
    pub const QUANTITY: &str = "quantity";
    pub const AMOUNT: &str = "amount";
    pub const PCS_PER_LAYOUT: &str = "pcsPerLayout";
    pub const QUANTITY_ACTUAL: &str = "quantityActual";
    pub const ADJUSTMENT: &str = "adjustment";
    pub const FROM_OTHER: &str = "fromOther";
    pub const SIZE: &str = "size";
    pub const WIDTH: &str = "width";
    pub const QUANTITIES: &str = "quantities";

    // ===== 行派生字段 =====
    pub const QUANTITY_REQUIRED: &str = "quantityRequired";
    pub const NUMBER_OF_LAYOUTS: &str = "numberOfLayouts";
    pub const AREA: &str = "area";
    pub const PRICE_PER_LAYOUT: &str = "pricePerLayout";
    pub const ROW_TOTAL: &str = "rowTotal";
    pub const SUM: &str = "sum";
    pub const ROW_RATE: &str = "rowRate";

    // ===== 运行汇总 (计算字段) =====
    pub const TOTAL_AMOUNT: &str = "Total Amount";
    pub const TOTAL_MTR: &str = "Total Mtr";
    pub const TOTAL_LAYOUTS: &str = "Total Layouts";
    pub const TOTAL_AREA: &str = "Total Area";
    pub const LAYOUT_TOTAL_AMOUNT: &str = "Layout Total Amount";
    pub const TOTAL_METER: &str = "Total Meter";
    pub const ACTUAL_METER: &str = "Actual Meter";
    pub const EFFICIENCY: &str = "Efficiency";
    pub const FUSING_COST: &str = "Fusing Cost";
    pub const ACTUAL_TOTAL: &str = "Actual Total";
    pub const PER_PC_COST: &str = "Per Pc Cost";
    pub const COLUMN_TOTALS: &str = "Column Totals";
    pub const TOTAL_SUM: &str = "Total Sum";
    pub const AVG_RATE: &str = "Avg Rate";
    pub const TOTAL_METERS: &str = "Total Meters";
    pub const ESTIMATED_AMOUNT: &str = "Estimated Amount";
}

use value_keys as k;

// ==========================================
// 读取: 值包 → RunInput
// ==========================================

/// 按运行声明的工艺类型解析值包
pub fn parse_run_input(kind: ProcessKind, bag: &ValuesBag) -> Result<RunInput, CostingError> {
    let items = item_objects(bag)?;

    let input = match kind {
        ProcessKind::AlloverSublimation => RunInput::AlloverSublimation(AlloverRunInput {
            particulars: lenient_string(bag.get(k::PARTICULARS)),
            panna: lenient_string(bag.get(k::PANNA)),
            rate_per_meter: lenient_f64(k::RATE_PER_METER, bag.get(k::RATE_PER_METER)),
            printer: lenient_string(bag.get(k::PRINTER)),
            items: items
                .iter()
                .map(|row| AlloverItem {
                    design: lenient_string(row.get(k::DESIGN)),
                    height: lenient_f64(k::HEIGHT, row.get(k::HEIGHT)),
                    rate: lenient_f64(k::RATE, row.get(k::RATE)),
                    quantity: lenient_f64(k::QUANTITY, row.get(k::QUANTITY)),
                    amount: lenient_f64(k::AMOUNT, row.get(k::AMOUNT)),
                })
                .collect(),
        }),
        ProcessKind::Dtf => RunInput::Dtf(DtfRunInput {
            particulars: lenient_string(bag.get(k::PARTICULARS)),
            pcs: lenient_f64(k::PCS, bag.get(k::PCS)),
            is_fusing: lenient_bool(bag.get(k::IS_FUSING)),
            is_job_difference: lenient_bool(bag.get(k::IS_JOB_DIFFERENCE)),
            custom_pcs: lenient_f64(k::CUSTOM_PCS, bag.get(k::CUSTOM_PCS)),
            rate: lenient_f64(k::RATE, bag.get(k::RATE)),
            items: items
                .iter()
                .map(|row| DtfItem {
                    particulars: lenient_string(row.get(k::PARTICULARS)),
                    height: lenient_f64(k::HEIGHT, row.get(k::HEIGHT)),
                    pcs_per_layout: lenient_f64(k::PCS_PER_LAYOUT, row.get(k::PCS_PER_LAYOUT)),
                    quantity_actual: lenient_f64(k::QUANTITY_ACTUAL, row.get(k::QUANTITY_ACTUAL)),
                    adjustment: lenient_f64(k::ADJUSTMENT, row.get(k::ADJUSTMENT)),
                    from_other: lenient_f64(k::FROM_OTHER, row.get(k::FROM_OTHER)),
                })
                .collect(),
        }),
        ProcessKind::Sublimation => RunInput::Sublimation(SublimationRunInput {
            rate: optional_rate(bag.get(k::RATE)),
            column_labels: column_labels(bag.get(k::COLUMN_LABELS)),
            items: items
                .iter()
                .map(|row| SublimationItem {
                    size: lenient_string(row.get(k::SIZE)),
                    width: lenient_f64(k::WIDTH, row.get(k::WIDTH)),
                    height: lenient_f64(k::HEIGHT, row.get(k::HEIGHT)),
                    quantities: quantities(row.get(k::QUANTITIES)),
                })
                .collect(),
        }),
    };

    Ok(input)
}

/// 读取值包中的基准金额 (`Estimated Amount`)
pub fn read_estimated_amount(bag: &ValuesBag) -> f64 {
    lenient_f64(k::ESTIMATED_AMOUNT, bag.get(k::ESTIMATED_AMOUNT))
}

fn item_objects(bag: &ValuesBag) -> Result<Vec<&Map<String, JsonValue>>, CostingError> {
    match bag.get(k::ITEMS) {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::Array(rows)) => rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                row.as_object().ok_or_else(|| CostingError::InvalidValue {
                    field: format!("{}[{}]", k::ITEMS, idx),
                    message: "明细行必须是对象".to_string(),
                })
            })
            .collect(),
        Some(_) => Err(CostingError::InvalidValue {
            field: k::ITEMS.to_string(),
            message: "明细必须是数组".to_string(),
        }),
    }
}

fn obj(pairs: Vec<(&str, JsonValue)>) -> JsonValue {
    JsonValue::Object(
        pairs
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    )
}

/// 空值/空串视为未填写
fn optional_rate(value: Option<&JsonValue>) -> Option<f64> {
    match value {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) if s.trim().is_empty() => None,
        Some(v) => Some(lenient_f64(k::RATE, Some(v))),
    }
}

fn column_labels(value: Option<&JsonValue>) -> [String; SUBLIMATION_COLUMNS] {
    let mut labels: [String; SUBLIMATION_COLUMNS] = Default::default();
    if let Some(JsonValue::Array(values)) = value {
        for (slot, v) in labels.iter_mut().zip(values.iter()) {
            *slot = lenient_string(Some(v));
        }
    }
    labels
}

fn quantities(value: Option<&JsonValue>) -> [f64; SUBLIMATION_COLUMNS] {
    let mut qty = [0.0; SUBLIMATION_COLUMNS];
    if let Some(JsonValue::Array(values)) = value {
        for (slot, v) in qty.iter_mut().zip(values.iter()) {
            *slot = lenient_f64(k::QUANTITIES, Some(v));
        }
    }
    qty
}

// ==========================================
// 写入: RunInput + RunSummary → 值包
// ==========================================

/// 生成持久化值包 (整体替换旧值包)
pub fn build_values_bag(input: &RunInput, summary: &RunSummary) -> ValuesBag {
    let mut bag = ValuesBag::new();

    match (input, summary) {
        (RunInput::AlloverSublimation(run), RunSummary::AlloverSublimation(s)) => {
            bag.insert(k::PARTICULARS.into(), json!(run.particulars));
            bag.insert(k::PANNA.into(), json!(run.panna));
            bag.insert(k::RATE_PER_METER.into(), json_number(run.rate_per_meter));
            bag.insert(k::PRINTER.into(), json!(run.printer));
            let items = run
                .items
                .iter()
                .map(|item| {
                    obj(vec![
                        (k::DESIGN, json!(item.design)),
                        (k::HEIGHT, json_number(item.height)),
                        (k::RATE, json_number(item.rate)),
                        (k::QUANTITY, json_number(item.quantity)),
                        (k::AMOUNT, json_number(item.amount)),
                    ])
                })
                .collect();
            bag.insert(k::ITEMS.into(), JsonValue::Array(items));

            bag.insert(k::TOTAL_AMOUNT.into(), json_number(s.total_amount));
            bag.insert(k::TOTAL_MTR.into(), json_number(s.total_mtr));
        }
        (RunInput::Dtf(run), RunSummary::Dtf(s)) => {
            bag.insert(k::PARTICULARS.into(), json!(run.particulars));
            bag.insert(k::PCS.into(), json_number(run.pcs));
            bag.insert(k::IS_FUSING.into(), json!(run.is_fusing));
            bag.insert(k::IS_JOB_DIFFERENCE.into(), json!(run.is_job_difference));
            bag.insert(k::CUSTOM_PCS.into(), json_number(run.custom_pcs));
            bag.insert(k::RATE.into(), json_number(run.rate));
            let items = run
                .items
                .iter()
                .zip(s.rows.iter())
                .map(|(item, row)| {
                    obj(vec![
                        (k::PARTICULARS, json!(item.particulars)),
                        (k::HEIGHT, json_number(item.height)),
                        (k::PCS_PER_LAYOUT, json_number(item.pcs_per_layout)),
                        (k::QUANTITY_ACTUAL, json_number(item.quantity_actual)),
                        (k::ADJUSTMENT, json_number(item.adjustment)),
                        (k::FROM_OTHER, json_number(item.from_other)),
                        (k::QUANTITY_REQUIRED, json_number(row.quantity_required)),
                        (k::NUMBER_OF_LAYOUTS, json_number(row.number_of_layouts)),
                        (k::AREA, json_number(row.area)),
                        (k::PRICE_PER_LAYOUT, json_number(row.price_per_layout)),
                        (k::ROW_TOTAL, json_number(row.row_total)),
                    ])
                })
                .collect();
            bag.insert(k::ITEMS.into(), JsonValue::Array(items));

            bag.insert(k::TOTAL_LAYOUTS.into(), json_number(s.total_layouts));
            bag.insert(k::TOTAL_AREA.into(), json_number(s.total_area));
            bag.insert(k::LAYOUT_TOTAL_AMOUNT.into(), json_number(s.layout_total_amount));
            bag.insert(k::TOTAL_METER.into(), json_number(s.total_meter));
            bag.insert(k::ACTUAL_METER.into(), json_number(s.actual_meter));
            bag.insert(k::EFFICIENCY.into(), json_number(s.efficiency));
            bag.insert(k::FUSING_COST.into(), json_number(s.fusing_cost));
            bag.insert(k::ACTUAL_TOTAL.into(), json_number(s.actual_total));
            bag.insert(k::PER_PC_COST.into(), json_number(s.per_pc_cost));
        }
        (RunInput::Sublimation(run), RunSummary::Sublimation(s)) => {
            bag.insert(
                k::RATE.into(),
                run.rate.map(json_number).unwrap_or(JsonValue::Null),
            );
            bag.insert(k::COLUMN_LABELS.into(), json!(run.column_labels));
            let items = run
                .items
                .iter()
                .zip(s.rows.iter())
                .map(|(item, row)| {
                    obj(vec![
                        (k::SIZE, json!(item.size)),
                        (k::WIDTH, json_number(item.width)),
                        (k::HEIGHT, json_number(item.height)),
                        (
                            k::QUANTITIES,
                            JsonValue::Array(item.quantities.iter().map(|q| json_number(*q)).collect()),
                        ),
                        (k::SUM, json_number(row.sum)),
                        (k::ROW_RATE, json_number(row.row_rate)),
                        (k::ROW_TOTAL, json_number(row.row_total)),
                    ])
                })
                .collect();
            bag.insert(k::ITEMS.into(), JsonValue::Array(items));

            bag.insert(
                k::COLUMN_TOTALS.into(),
                JsonValue::Array(s.col_totals.iter().map(|v| json_number(*v)).collect()),
            );
            bag.insert(k::TOTAL_SUM.into(), json_number(s.total_sum));
            bag.insert(k::TOTAL_AMOUNT.into(), json_number(s.total_amount));
            bag.insert(k::AVG_RATE.into(), json_number(s.avg_rate));
            bag.insert(k::TOTAL_METERS.into(), json_number(s.total_meters));
        }
        _ => {
            // 调用方保证 input/summary 同源；不同源时只写基准金额，避免写入错位数据
            tracing::error!(
                input_kind = %input.kind(),
                summary_kind = %summary.kind(),
                "值包输入与汇总工艺类型不一致"
            );
        }
    }

    bag.insert(k::ESTIMATED_AMOUNT.into(), json_number(summary.estimated_amount()));
    bag
}
