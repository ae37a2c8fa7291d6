// ==========================================
// 印花车间计价系统 - DTF 烫画计价
// ==========================================
// 行规则 (排版宽度 W = 23):
//   quantityRequired = quantityActual − fromOther
//   numberOfLayouts  = pcsPerLayout > 0 ? ceil(quantityRequired / pcsPerLayout) : 0
//   area             = W × height
//   pricePerLayout   = rate × area
//   rowTotal         = numberOfLayouts × pricePerLayout
// 汇总:
//   totalMeter  = Σ(height × numberOfLayouts) / 39.38
//   actualMeter = W × 39.38 × rate × totalMeter
//   efficiency  = 100 − (actualMeter − layoutTotal) / layoutTotal × 100 (layoutTotal = 0 → 0)
//   fusingCost  = isFusing ? 5 × 2 × (isJobDifference ? customPcs : pcs) : 0
//   actualTotal = max(layoutTotal, actualMeter) + fusingCost
//   perPcCost   = pcs > 0 ? actualTotal / pcs : 0
// ==========================================

use crate::domain::layout::{CostingParams, DtfItem, DtfRowResult, DtfRunInput, DtfSummary};
use crate::engine::error::CostingError;
use crate::engine::numeric::ratio_or_zero;

/// 单行派生计算
pub fn compute_row(item: &DtfItem, rate: f64, params: &CostingParams) -> DtfRowResult {
    let quantity_required = item.quantity_actual - item.from_other;
    let number_of_layouts = if item.pcs_per_layout > 0.0 {
        (quantity_required / item.pcs_per_layout).ceil()
    } else {
        0.0
    };
    let area = params.dtf_layout_width * item.height;
    let price_per_layout = rate * area;

    DtfRowResult {
        quantity_required,
        number_of_layouts,
        area,
        price_per_layout,
        row_total: number_of_layouts * price_per_layout,
    }
}

/// 压烫附加费
pub fn fusing_cost(input: &DtfRunInput, params: &CostingParams) -> f64 {
    if !input.is_fusing {
        return 0.0;
    }
    let pieces = if input.is_job_difference {
        input.custom_pcs
    } else {
        input.pcs
    };
    params.fusing_rate_per_piece * params.fusing_passes * pieces
}

/// 排版效率 (layout_total_amount = 0 时恒为 0)
pub fn efficiency(actual_meter: f64, layout_total_amount: f64) -> f64 {
    if layout_total_amount > 0.0 {
        100.0 - ((actual_meter - layout_total_amount) / layout_total_amount * 100.0)
    } else {
        0.0
    }
}

/// 运行汇总
pub fn summarize(input: &DtfRunInput, params: &CostingParams) -> DtfSummary {
    let rows: Vec<DtfRowResult> = input
        .items
        .iter()
        .map(|item| compute_row(item, input.rate, params))
        .collect();

    let total_layouts: f64 = rows.iter().map(|r| r.number_of_layouts).sum();
    let total_area: f64 = rows.iter().map(|r| r.area).sum();
    let layout_total_amount: f64 = rows.iter().map(|r| r.row_total).sum();
    let layout_inches: f64 = input
        .items
        .iter()
        .zip(rows.iter())
        .map(|(item, row)| item.height * row.number_of_layouts)
        .sum();

    let total_meter = layout_inches / params.inch_per_meter;
    let actual_meter =
        params.dtf_layout_width * params.inch_per_meter * input.rate * total_meter;
    let fusing = fusing_cost(input, params);
    let actual_total = layout_total_amount.max(actual_meter) + fusing;

    tracing::debug!(
        layouts = total_layouts,
        layout_total_amount,
        actual_meter,
        fusing,
        "DTF 运行汇总完成"
    );

    DtfSummary {
        rows,
        total_layouts,
        total_area,
        layout_total_amount,
        total_meter,
        actual_meter,
        efficiency: efficiency(actual_meter, layout_total_amount),
        fusing_cost: fusing,
        actual_total,
        per_pc_cost: ratio_or_zero(actual_total, input.pcs),
    }
}

/// 保存校验
///
/// particulars 必填、pcs > 0；负数输入与 fromOther > quantityActual 均拒绝。
pub fn validate(input: &DtfRunInput) -> Result<(), CostingError> {
    if input.particulars.trim().is_empty() {
        return Err(CostingError::MissingField {
            field: "particulars".to_string(),
        });
    }

    if input.pcs <= 0.0 {
        return Err(CostingError::InvalidValue {
            field: "pcs".to_string(),
            message: format!("计划件数必须大于 0，实际 {}", input.pcs),
        });
    }

    for (field, value) in [("rate", input.rate), ("customPcs", input.custom_pcs)] {
        if value < 0.0 {
            return Err(CostingError::NegativeInput {
                field: field.to_string(),
                value,
            });
        }
    }

    for (idx, item) in input.items.iter().enumerate() {
        for (field, value) in [
            ("height", item.height),
            ("pcsPerLayout", item.pcs_per_layout),
            ("quantityActual", item.quantity_actual),
            ("fromOther", item.from_other),
        ] {
            if value < 0.0 {
                return Err(CostingError::NegativeInput {
                    field: format!("items[{}].{}", idx, field),
                    value,
                });
            }
        }

        let required = item.quantity_actual - item.from_other;
        if required < 0.0 {
            return Err(CostingError::NegativeDerivedValue {
                row: idx,
                field: "quantityRequired".to_string(),
                value: required,
            });
        }
    }

    Ok(())
}
