// ==========================================
// 印花车间计价系统 - 升华计价
// ==========================================
// 行规则: sum = Σ quantities; rowRate = width × height × rate; rowTotal = sum × rowRate
// 汇总:   colTotals / totalSum / totalAmount
//         avgRate = totalSum > 0 ? totalAmount / totalSum : 0
//         totalMeters = Σ(height × sum) / 39.38
// 列标题为自由文本，不校验
// ==========================================

use crate::domain::layout::{
    CostingParams, SublimationItem, SublimationRowResult, SublimationRunInput,
    SublimationSummary, SUBLIMATION_COLUMNS,
};
use crate::engine::error::CostingError;
use crate::engine::numeric::ratio_or_zero;

pub fn compute_row(item: &SublimationItem, rate: f64) -> SublimationRowResult {
    let sum: f64 = item.quantities.iter().sum();
    let row_rate = item.width * item.height * rate;
    SublimationRowResult {
        sum,
        row_rate,
        row_total: sum * row_rate,
    }
}

/// 运行汇总 (rate 未填写时按 0 预览)
pub fn summarize(input: &SublimationRunInput, params: &CostingParams) -> SublimationSummary {
    let rate = input.rate.unwrap_or(0.0);
    let rows: Vec<SublimationRowResult> =
        input.items.iter().map(|item| compute_row(item, rate)).collect();

    let mut col_totals = [0.0; SUBLIMATION_COLUMNS];
    for item in &input.items {
        for (total, qty) in col_totals.iter_mut().zip(item.quantities.iter()) {
            *total += qty;
        }
    }

    let total_sum: f64 = rows.iter().map(|r| r.sum).sum();
    let total_amount: f64 = rows.iter().map(|r| r.row_total).sum();
    let inch_total: f64 = input
        .items
        .iter()
        .zip(rows.iter())
        .map(|(item, row)| item.height * row.sum)
        .sum();

    SublimationSummary {
        rows,
        col_totals,
        total_sum,
        total_amount,
        avg_rate: ratio_or_zero(total_amount, total_sum),
        total_meters: inch_total / params.inch_per_meter,
    }
}

/// 保存校验：rate 必须已填写；数值不能为负
pub fn validate(input: &SublimationRunInput) -> Result<(), CostingError> {
    let rate = input.rate.ok_or_else(|| CostingError::MissingField {
        field: "rate".to_string(),
    })?;
    if rate < 0.0 {
        return Err(CostingError::NegativeInput {
            field: "rate".to_string(),
            value: rate,
        });
    }

    for (idx, item) in input.items.iter().enumerate() {
        if item.width < 0.0 || item.height < 0.0 {
            let (field, value) = if item.width < 0.0 {
                ("width", item.width)
            } else {
                ("height", item.height)
            };
            return Err(CostingError::NegativeInput {
                field: format!("items[{}].{}", idx, field),
                value,
            });
        }
        if let Some((col, qty)) = item
            .quantities
            .iter()
            .enumerate()
            .find(|(_, q)| **q < 0.0)
        {
            return Err(CostingError::NegativeInput {
                field: format!("items[{}].quantities[{}]", idx, col),
                value: *qty,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> SublimationItem {
        SublimationItem {
            size: "M".to_string(),
            width: 10.0,
            height: 10.0,
            quantities: [1.0, 2.0, 3.0, 4.0],
        }
    }

    fn input(items: Vec<SublimationItem>, rate: Option<f64>) -> SublimationRunInput {
        SublimationRunInput {
            rate,
            column_labels: [
                "S".to_string(),
                "M".to_string(),
                "L".to_string(),
                "XL".to_string(),
            ],
            items,
        }
    }

    #[test]
    fn test_single_row() {
        let row = compute_row(&item(), 1.0);
        assert_eq!(row.sum, 10.0);
        assert_eq!(row.row_rate, 100.0);
        assert_eq!(row.row_total, 1000.0);
    }

    #[test]
    fn test_two_identical_rows() {
        let summary = summarize(&input(vec![item(), item()], Some(1.0)), &CostingParams::default());

        assert_eq!(summary.col_totals, [2.0, 4.0, 6.0, 8.0]);
        assert_eq!(summary.total_sum, 20.0);
        assert_eq!(summary.total_amount, 2000.0);
        assert_eq!(summary.avg_rate, 100.0);
        assert!((summary.total_meters - 200.0 / 39.38).abs() < 1e-9);
    }

    #[test]
    fn test_avg_rate_guard() {
        let mut empty_row = item();
        empty_row.quantities = [0.0; SUBLIMATION_COLUMNS];
        let summary = summarize(&input(vec![empty_row], Some(5.0)), &CostingParams::default());
        assert_eq!(summary.total_sum, 0.0);
        assert_eq!(summary.avg_rate, 0.0);
    }

    #[test]
    fn test_validate_requires_rate_only() {
        assert_eq!(
            validate(&input(vec![item()], None)),
            Err(CostingError::MissingField {
                field: "rate".to_string()
            })
        );
        // 无明细也允许保存
        assert!(validate(&input(vec![], Some(0.0))).is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_quantity() {
        let mut bad = item();
        bad.quantities[2] = -1.0;
        let err = validate(&input(vec![bad], Some(1.0))).unwrap_err();
        assert_eq!(err.field(), Some("items[0].quantities[2]"));
    }
}
