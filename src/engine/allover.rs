// ==========================================
// 印花车间计价系统 - 满版升华计价
// ==========================================
// 行规则:
//   rate   = round2(height / 39.38 × ratePerMeter)
//   amount = round2(rate × quantity)
// 表头改 ratePerMeter → 全部行重算 (recompute_all_rows)
// 行改 height        → 本行 rate + amount 重算
// 行改 quantity      → 本行 amount 重算
// 汇总: totalAmount = Σ amount; totalMtr = Σ(height × quantity) / 39.38
// ==========================================

use crate::domain::layout::{AlloverItem, AlloverRunInput, AlloverSummary, CostingParams};
use crate::engine::error::CostingError;
use crate::engine::numeric::round2;

/// 由高度与每米单价推导行单价
pub fn item_rate(height: f64, rate_per_meter: f64, params: &CostingParams) -> f64 {
    round2(height / params.inch_per_meter * rate_per_meter)
}

/// 行金额
pub fn item_amount(rate: f64, quantity: f64) -> f64 {
    round2(rate * quantity)
}

/// 按每米单价重算单行 (rate + amount)
pub fn recompute_item(item: &AlloverItem, rate_per_meter: f64, params: &CostingParams) -> AlloverItem {
    let rate = item_rate(item.height, rate_per_meter, params);
    AlloverItem {
        rate,
        amount: item_amount(rate, item.quantity),
        ..item.clone()
    }
}

/// 表头单价变更后的全量重算 (纯函数，返回新输入)
pub fn recompute_all_rows(input: &AlloverRunInput, params: &CostingParams) -> AlloverRunInput {
    AlloverRunInput {
        items: input
            .items
            .iter()
            .map(|item| recompute_item(item, input.rate_per_meter, params))
            .collect(),
        ..input.clone()
    }
}

/// 修改每米单价
pub fn with_rate_per_meter(
    input: &AlloverRunInput,
    rate_per_meter: f64,
    params: &CostingParams,
) -> AlloverRunInput {
    let updated = AlloverRunInput {
        rate_per_meter,
        ..input.clone()
    };
    recompute_all_rows(&updated, params)
}

/// 修改某行高度
pub fn with_item_height(
    input: &AlloverRunInput,
    index: usize,
    height: f64,
    params: &CostingParams,
) -> Result<AlloverRunInput, CostingError> {
    replace_item(input, index, |item| {
        let resized = AlloverItem {
            height,
            ..item.clone()
        };
        recompute_item(&resized, input.rate_per_meter, params)
    })
}

/// 修改某行数量 (只重算 amount，保留已存单价)
pub fn with_item_quantity(
    input: &AlloverRunInput,
    index: usize,
    quantity: f64,
) -> Result<AlloverRunInput, CostingError> {
    replace_item(input, index, |item| AlloverItem {
        quantity,
        amount: item_amount(item.rate, quantity),
        ..item.clone()
    })
}

/// 新增一行 (按当前每米单价推导 rate/amount)
pub fn with_added_item(
    input: &AlloverRunInput,
    item: AlloverItem,
    params: &CostingParams,
) -> AlloverRunInput {
    let mut items = input.items.clone();
    items.push(recompute_item(&item, input.rate_per_meter, params));
    AlloverRunInput {
        items,
        ..input.clone()
    }
}

/// 保存前规范化：amount 由已存 rate × quantity 重新推导
///
/// rate 已是 2 位小数，重复规范化结果不变，读回后数字不漂移。
pub fn normalize(input: &AlloverRunInput) -> AlloverRunInput {
    AlloverRunInput {
        items: input
            .items
            .iter()
            .map(|item| AlloverItem {
                rate: round2(item.rate),
                amount: item_amount(round2(item.rate), item.quantity),
                ..item.clone()
            })
            .collect(),
        ..input.clone()
    }
}

/// 已存行单价与 round2(height / 39.38 × ratePerMeter) 不一致的行号
///
/// 规范化保留已存单价，不一致只用于告警。
pub fn stale_rate_rows(input: &AlloverRunInput, params: &CostingParams) -> Vec<usize> {
    input
        .items
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            (round2(item.rate) - item_rate(item.height, input.rate_per_meter, params)).abs() > 0.005
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// 运行汇总
pub fn summarize(input: &AlloverRunInput, params: &CostingParams) -> AlloverSummary {
    let total_amount: f64 = input.items.iter().map(|i| i.amount).sum();
    let inch_total: f64 = input.items.iter().map(|i| i.height * i.quantity).sum();

    AlloverSummary {
        total_amount: round2(total_amount),
        total_mtr: inch_total / params.inch_per_meter,
    }
}

/// 保存校验
///
/// particulars / panna / printer 必填，至少一行明细，数值不能为负。
pub fn validate(input: &AlloverRunInput) -> Result<(), CostingError> {
    for (field, value) in [
        ("particulars", &input.particulars),
        ("panna", &input.panna),
        ("printer", &input.printer),
    ] {
        if value.trim().is_empty() {
            return Err(CostingError::MissingField {
                field: field.to_string(),
            });
        }
    }

    if input.items.is_empty() {
        return Err(CostingError::NoItems);
    }

    if input.rate_per_meter < 0.0 {
        return Err(CostingError::NegativeInput {
            field: "ratePerMeter".to_string(),
            value: input.rate_per_meter,
        });
    }

    for (idx, item) in input.items.iter().enumerate() {
        for (field, value) in [
            ("height", item.height),
            ("rate", item.rate),
            ("quantity", item.quantity),
        ] {
            if value < 0.0 {
                return Err(CostingError::NegativeInput {
                    field: format!("items[{}].{}", idx, field),
                    value,
                });
            }
        }
    }

    Ok(())
}

fn replace_item(
    input: &AlloverRunInput,
    index: usize,
    f: impl FnOnce(&AlloverItem) -> AlloverItem,
) -> Result<AlloverRunInput, CostingError> {
    let current = input.items.get(index).ok_or(CostingError::RowOutOfRange {
        index,
        len: input.items.len(),
    })?;

    let mut items = input.items.clone();
    items[index] = f(current);
    Ok(AlloverRunInput {
        items,
        ..input.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CostingParams {
        CostingParams::default()
    }

    fn item(height: f64, quantity: f64) -> AlloverItem {
        AlloverItem {
            design: "D1".to_string(),
            height,
            quantity,
            ..Default::default()
        }
    }

    fn input(items: Vec<AlloverItem>) -> AlloverRunInput {
        AlloverRunInput {
            particulars: "Jersey front".to_string(),
            panna: "58".to_string(),
            rate_per_meter: 0.0,
            printer: "Epson F9470".to_string(),
            items,
        }
    }

    #[test]
    fn test_one_meter_item_at_100_per_meter() {
        let updated = with_rate_per_meter(&input(vec![item(39.38, 5.0)]), 100.0, &params());

        assert_eq!(updated.items[0].rate, 100.00);
        assert_eq!(updated.items[0].amount, 500.00);

        let summary = summarize(&updated, &params());
        assert_eq!(summary.total_amount, 500.0);
        assert!((summary.total_mtr - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_per_meter_change_recomputes_every_row() {
        let base = input(vec![item(20.0, 3.0), item(40.0, 1.0)]);
        let updated = with_rate_per_meter(&base, 150.0, &params());

        // 20 / 39.38 × 150 = 76.180...
        assert_eq!(updated.items[0].rate, 76.18);
        assert_eq!(updated.items[0].amount, 228.54);
        // 40 / 39.38 × 150 = 152.361...
        assert_eq!(updated.items[1].rate, 152.36);
        assert_eq!(updated.items[1].amount, 152.36);

        // 原输入不被修改
        assert_eq!(base.items[0].rate, 0.0);
    }

    #[test]
    fn test_height_change_recomputes_only_that_row() {
        let base = with_rate_per_meter(&input(vec![item(39.38, 2.0), item(39.38, 2.0)]), 100.0, &params());
        let updated = with_item_height(&base, 1, 78.76, &params()).unwrap();

        assert_eq!(updated.items[0].rate, 100.0);
        assert_eq!(updated.items[1].rate, 200.0);
        assert_eq!(updated.items[1].amount, 400.0);
    }

    #[test]
    fn test_quantity_change_keeps_stored_rate() {
        let mut base = input(vec![item(10.0, 1.0)]);
        base.items[0].rate = 33.33;
        base.rate_per_meter = 999.0;

        let updated = with_item_quantity(&base, 0, 3.0).unwrap();
        assert_eq!(updated.items[0].rate, 33.33);
        assert_eq!(updated.items[0].amount, 99.99);
    }

    #[test]
    fn test_row_out_of_range() {
        let err = with_item_quantity(&input(vec![]), 0, 1.0).unwrap_err();
        assert_eq!(err, CostingError::RowOutOfRange { index: 0, len: 0 });
    }

    #[test]
    fn test_normalize_is_stable() {
        let base = with_rate_per_meter(&input(vec![item(13.0, 7.0)]), 87.5, &params());
        let once = normalize(&base);
        let twice = normalize(&once);
        assert_eq!(once, base);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_stale_rate_rows_flags_only_mismatched_rows() {
        let mut run = input(vec![item(39.38, 2.0), item(19.69, 3.0)]);
        run.rate_per_meter = 100.0;
        run.items[0].rate = 100.0;
        // 19.69 / 39.38 × 100 = 50
        run.items[1].rate = 80.0;
        assert_eq!(stale_rate_rows(&run, &params()), vec![1]);

        let fixed = recompute_all_rows(&run, &params());
        assert!(stale_rate_rows(&fixed, &params()).is_empty());
    }

    #[test]
    fn test_validate_required_headers() {
        let mut missing_printer = input(vec![item(1.0, 1.0)]);
        missing_printer.printer = "  ".to_string();
        assert_eq!(
            validate(&missing_printer),
            Err(CostingError::MissingField {
                field: "printer".to_string()
            })
        );

        let mut missing_panna = input(vec![item(1.0, 1.0)]);
        missing_panna.panna.clear();
        assert_eq!(
            validate(&missing_panna).unwrap_err().field(),
            Some("panna")
        );

        assert_eq!(validate(&input(vec![])), Err(CostingError::NoItems));
        assert!(validate(&input(vec![item(1.0, 1.0)])).is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_quantity() {
        let err = validate(&input(vec![item(1.0, -2.0)])).unwrap_err();
        assert_eq!(err.field(), Some("items[0].quantity"));
    }
}
