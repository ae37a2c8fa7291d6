// ==========================================
// 印花车间计价系统 - 运行计价引擎 (统一分派点)
// ==========================================
// 职责: 按运行声明的工艺类型选择计算器
// 红线: Engine 不拼 SQL；三个计算器均为纯函数，可跨运行并行调用
// ==========================================

use crate::domain::layout::{CostingParams, RunInput, RunSummary};
use crate::domain::order::ValuesBag;
use crate::domain::types::ProcessKind;
use crate::engine::error::CostingError;
use crate::engine::value_bag::{build_values_bag, parse_run_input, read_estimated_amount};
use crate::engine::{allover, dtf, sublimation};

/// 计价结果：规范化后的输入 + 汇总 + 待持久化值包
#[derive(Debug, Clone)]
pub struct CostedRun {
    pub input: RunInput,
    pub summary: RunSummary,
    pub values: ValuesBag,
}

// ==========================================
// RunCostingEngine - 运行计价引擎
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RunCostingEngine {
    params: CostingParams,
}

impl RunCostingEngine {
    pub fn new(params: CostingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CostingParams {
        &self.params
    }

    /// 汇总 (不校验，用于编辑中预览)
    pub fn summarize(&self, input: &RunInput) -> RunSummary {
        match input {
            RunInput::AlloverSublimation(run) => {
                RunSummary::AlloverSublimation(allover::summarize(run, &self.params))
            }
            RunInput::Dtf(run) => RunSummary::Dtf(dtf::summarize(run, &self.params)),
            RunInput::Sublimation(run) => {
                RunSummary::Sublimation(sublimation::summarize(run, &self.params))
            }
        }
    }

    /// 保存前校验
    pub fn validate(&self, input: &RunInput) -> Result<(), CostingError> {
        match input {
            RunInput::AlloverSublimation(run) => allover::validate(run),
            RunInput::Dtf(run) => dtf::validate(run),
            RunInput::Sublimation(run) => sublimation::validate(run),
        }
    }

    /// 规范化 (满版升华的 amount 由已存 rate 重新推导)
    pub fn normalize(&self, input: &RunInput) -> RunInput {
        match input {
            RunInput::AlloverSublimation(run) => RunInput::AlloverSublimation(allover::normalize(run)),
            other => other.clone(),
        }
    }

    /// 规范化 → 校验 → 汇总 → 生成值包
    pub fn evaluate(&self, input: &RunInput) -> Result<CostedRun, CostingError> {
        let input = self.normalize(input);
        self.validate(&input)?;
        let summary = self.summarize(&input);
        let values = build_values_bag(&input, &summary);

        Ok(CostedRun {
            input,
            summary,
            values,
        })
    }

    /// 从保存请求的字段包计价
    ///
    /// 请求中携带的计算字段 (如 `Estimated Amount`) 一律以服务端重算结果覆盖；
    /// 与客户端显示值不一致时记录告警。
    pub fn evaluate_fields(
        &self,
        kind: ProcessKind,
        fields: &ValuesBag,
    ) -> Result<CostedRun, CostingError> {
        let input = parse_run_input(kind, fields)?;
        if let RunInput::AlloverSublimation(run) = &input {
            let rows = allover::stale_rate_rows(run, &self.params);
            if !rows.is_empty() {
                tracing::warn!(
                    process_kind = %kind,
                    rate_per_meter = run.rate_per_meter,
                    rows = ?rows,
                    "行单价与每米单价推导值不一致，保留已存单价"
                );
            }
        }
        let costed = self.evaluate(&input)?;

        if fields.contains_key(crate::engine::value_bag::value_keys::ESTIMATED_AMOUNT) {
            let client_amount = read_estimated_amount(fields);
            let server_amount = costed.summary.estimated_amount();
            if (client_amount - server_amount).abs() > 0.005 {
                tracing::warn!(
                    process_kind = %kind,
                    client_amount,
                    server_amount,
                    "客户端计算金额与服务端不一致，以服务端为准"
                );
            }
        }

        Ok(costed)
    }

    /// 重新读取已保存的运行 (不重算行单价，避免重复取整漂移)
    pub fn reread(&self, kind: ProcessKind, values: &ValuesBag) -> Result<(RunInput, RunSummary), CostingError> {
        let input = parse_run_input(kind, values)?;
        let summary = self.summarize(&input);
        Ok((input, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::layout::{DtfItem, DtfRunInput, SublimationRunInput};
    use serde_json::json;

    fn engine() -> RunCostingEngine {
        RunCostingEngine::default()
    }

    #[test]
    fn test_dispatch_follows_input_kind() {
        let dtf = RunInput::Dtf(DtfRunInput {
            particulars: "Tee".to_string(),
            pcs: 10.0,
            rate: 1.0,
            items: vec![DtfItem {
                height: 10.0,
                pcs_per_layout: 5.0,
                quantity_actual: 10.0,
                ..Default::default()
            }],
            ..Default::default()
        });
        assert_eq!(engine().summarize(&dtf).kind(), ProcessKind::Dtf);

        let sub = RunInput::Sublimation(SublimationRunInput::default());
        assert_eq!(engine().summarize(&sub).kind(), ProcessKind::Sublimation);
    }

    #[test]
    fn test_evaluate_rejects_invalid_input_before_summary() {
        let dtf = RunInput::Dtf(DtfRunInput::default());
        let err = engine().evaluate(&dtf).unwrap_err();
        assert_eq!(err.field(), Some("particulars"));
    }

    #[test]
    fn test_evaluate_fields_overrides_client_totals() {
        let fields = json!({
            "particulars": "Jersey",
            "panna": "60",
            "ratePerMeter": 100,
            "printer": "P1",
            "items": [{ "design": "D1", "height": 39.38, "rate": 100, "quantity": 5, "amount": 1 }],
            "Total Amount": 9999,
            "Estimated Amount": 9999
        });
        let costed = engine()
            .evaluate_fields(ProcessKind::AlloverSublimation, fields.as_object().unwrap())
            .unwrap();

        // amount 由 rate × quantity 重新推导
        assert_eq!(costed.values["items"][0]["amount"], json!(500.0));
        assert_eq!(costed.values["Total Amount"], json!(500.0));
        assert_eq!(costed.values["Estimated Amount"], json!(500.0));
    }

    #[test]
    fn test_evaluate_fields_keeps_stale_item_rate() {
        crate::logging::init_test();
        // 39.38 / 39.38 × 100 = 100，请求里带的是 120
        let fields = json!({
            "particulars": "Jersey",
            "panna": "60",
            "ratePerMeter": 100,
            "printer": "P1",
            "items": [{ "design": "D1", "height": 39.38, "rate": 120, "quantity": 5 }]
        });
        let costed = engine()
            .evaluate_fields(ProcessKind::AlloverSublimation, fields.as_object().unwrap())
            .unwrap();

        assert_eq!(costed.values["items"][0]["rate"], json!(120.0));
        assert_eq!(costed.values["Estimated Amount"], json!(600.0));
        let RunInput::AlloverSublimation(run) = &costed.input else {
            panic!("unexpected input kind");
        };
        assert_eq!(allover::stale_rate_rows(run, engine().params()), vec![0]);
    }

    #[test]
    fn test_reread_reproduces_saved_numbers() {
        let fields = json!({
            "particulars": "Jersey",
            "panna": "60",
            "ratePerMeter": 91.7,
            "printer": "P1",
            "items": [
                { "design": "D1", "height": 17.5, "rate": 40.75, "quantity": 9 },
                { "design": "D2", "height": 33.1, "rate": 77.08, "quantity": 4 }
            ]
        });
        let costed = engine()
            .evaluate_fields(ProcessKind::AlloverSublimation, fields.as_object().unwrap())
            .unwrap();

        let (input, summary) = engine()
            .reread(ProcessKind::AlloverSublimation, &costed.values)
            .unwrap();
        assert_eq!(input, costed.input);
        assert_eq!(summary, costed.summary);

        // 再保存一次，结果不漂移
        let again = engine().evaluate(&input).unwrap();
        assert_eq!(again.values, costed.values);
    }
}
