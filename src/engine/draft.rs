// ==========================================
// 印花车间计价系统 - 运行编辑草稿
// ==========================================
// 每个运行一个 RunDraft 值对象：
// - 每次编辑消费旧草稿、返回新草稿 (整体替换，不原地修改)
// - 保存时整体提交 (校验 + 计价)
// - 表头单价变更统一走"全量行重算"
// ==========================================

use crate::domain::layout::{LayoutRow, RunInput, RunSummary, SUBLIMATION_COLUMNS};
use crate::engine::allover;
use crate::engine::costing::{CostedRun, RunCostingEngine};
use crate::engine::error::CostingError;
use serde::{Deserialize, Serialize};

// ==========================================
// DraftEdit - 草稿编辑操作
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DraftEdit {
    /// 满版升华：修改每米单价 (全部行重算)
    SetRatePerMeter { rate_per_meter: f64 },
    /// DTF / 升华：修改全局单价
    SetRate { rate: f64 },
    /// 修改行高度
    SetItemHeight { index: usize, height: f64 },
    /// 修改行数量 (DTF 为 quantityActual；升华需指定列)
    SetItemQuantity {
        index: usize,
        #[serde(default)]
        column: Option<usize>,
        quantity: f64,
    },
    /// 追加一行
    AddRow { row: LayoutRow },
    /// 删除一行
    RemoveRow { index: usize },
}

// ==========================================
// RunDraft - 运行编辑草稿
// ==========================================
#[derive(Debug, Clone)]
pub struct RunDraft {
    input: RunInput,
    edits: u32, // 已应用的编辑次数
}

impl RunDraft {
    pub fn new(input: RunInput) -> Self {
        Self { input, edits: 0 }
    }

    pub fn input(&self) -> &RunInput {
        &self.input
    }

    pub fn edit_count(&self) -> u32 {
        self.edits
    }

    /// 当前预览汇总
    pub fn summary(&self, engine: &RunCostingEngine) -> RunSummary {
        engine.summarize(&self.input)
    }

    /// 应用一次编辑，返回新草稿
    pub fn apply(self, edit: &DraftEdit, engine: &RunCostingEngine) -> Result<RunDraft, CostingError> {
        let params = engine.params();
        let next = match (&self.input, edit) {
            // ===== 满版升华 =====
            (RunInput::AlloverSublimation(run), DraftEdit::SetRatePerMeter { rate_per_meter }) => {
                RunInput::AlloverSublimation(allover::with_rate_per_meter(run, *rate_per_meter, params))
            }
            (RunInput::AlloverSublimation(run), DraftEdit::SetItemHeight { index, height }) => {
                RunInput::AlloverSublimation(allover::with_item_height(run, *index, *height, params)?)
            }
            (RunInput::AlloverSublimation(run), DraftEdit::SetItemQuantity { index, quantity, .. }) => {
                RunInput::AlloverSublimation(allover::with_item_quantity(run, *index, *quantity)?)
            }
            (RunInput::AlloverSublimation(run), DraftEdit::AddRow { row: LayoutRow::AlloverSublimation(item) }) => {
                RunInput::AlloverSublimation(allover::with_added_item(run, item.clone(), params))
            }

            // ===== DTF =====
            (RunInput::Dtf(run), DraftEdit::SetRate { rate }) => {
                let mut run = run.clone();
                run.rate = *rate;
                RunInput::Dtf(run)
            }
            (RunInput::Dtf(run), DraftEdit::SetItemHeight { index, height }) => {
                let mut run = run.clone();
                row_mut(&mut run.items, *index)?.height = *height;
                RunInput::Dtf(run)
            }
            (RunInput::Dtf(run), DraftEdit::SetItemQuantity { index, quantity, .. }) => {
                let mut run = run.clone();
                row_mut(&mut run.items, *index)?.quantity_actual = *quantity;
                RunInput::Dtf(run)
            }
            (RunInput::Dtf(run), DraftEdit::AddRow { row: LayoutRow::Dtf(item) }) => {
                let mut run = run.clone();
                run.items.push(item.clone());
                RunInput::Dtf(run)
            }

            // ===== 升华 =====
            (RunInput::Sublimation(run), DraftEdit::SetRate { rate }) => {
                let mut run = run.clone();
                run.rate = Some(*rate);
                RunInput::Sublimation(run)
            }
            (RunInput::Sublimation(run), DraftEdit::SetItemHeight { index, height }) => {
                let mut run = run.clone();
                row_mut(&mut run.items, *index)?.height = *height;
                RunInput::Sublimation(run)
            }
            (RunInput::Sublimation(run), DraftEdit::SetItemQuantity { index, column, quantity }) => {
                let column = column.ok_or_else(|| CostingError::MissingField {
                    field: "column".to_string(),
                })?;
                if column >= SUBLIMATION_COLUMNS {
                    return Err(CostingError::InvalidValue {
                        field: "column".to_string(),
                        message: format!("列号超出范围: {}", column),
                    });
                }
                let mut run = run.clone();
                row_mut(&mut run.items, *index)?.quantities[column] = *quantity;
                RunInput::Sublimation(run)
            }
            (RunInput::Sublimation(run), DraftEdit::AddRow { row: LayoutRow::Sublimation(item) }) => {
                let mut run = run.clone();
                run.items.push(item.clone());
                RunInput::Sublimation(run)
            }

            // ===== 通用 =====
            (input, DraftEdit::RemoveRow { index }) => remove_row(input, *index)?,
            (input, DraftEdit::AddRow { row }) => {
                return Err(CostingError::KindMismatch {
                    expected: input.kind().to_string(),
                    actual: row.kind().to_string(),
                })
            }
            (input, other) => {
                return Err(CostingError::InvalidValue {
                    field: "op".to_string(),
                    message: format!("工艺 {} 不支持该编辑: {:?}", input.kind(), other),
                })
            }
        };

        Ok(RunDraft {
            input: next,
            edits: self.edits + 1,
        })
    }

    /// 依次应用多次编辑 (任一失败则整体失败，原草稿不受影响)
    pub fn apply_all(self, edits: &[DraftEdit], engine: &RunCostingEngine) -> Result<RunDraft, CostingError> {
        edits
            .iter()
            .try_fold(self, |draft, edit| draft.apply(edit, engine))
    }

    /// 提交草稿：校验 + 计价
    pub fn commit(&self, engine: &RunCostingEngine) -> Result<CostedRun, CostingError> {
        engine.evaluate(&self.input)
    }
}

fn row_mut<T>(items: &mut [T], index: usize) -> Result<&mut T, CostingError> {
    let len = items.len();
    items
        .get_mut(index)
        .ok_or(CostingError::RowOutOfRange { index, len })
}

fn remove_row(input: &RunInput, index: usize) -> Result<RunInput, CostingError> {
    fn without<T: Clone>(items: &[T], index: usize) -> Result<Vec<T>, CostingError> {
        if index >= items.len() {
            return Err(CostingError::RowOutOfRange {
                index,
                len: items.len(),
            });
        }
        let mut next = items.to_vec();
        next.remove(index);
        Ok(next)
    }

    Ok(match input {
        RunInput::AlloverSublimation(run) => {
            let mut run = run.clone();
            run.items = without(&run.items, index)?;
            RunInput::AlloverSublimation(run)
        }
        RunInput::Dtf(run) => {
            let mut run = run.clone();
            run.items = without(&run.items, index)?;
            RunInput::Dtf(run)
        }
        RunInput::Sublimation(run) => {
            let mut run = run.clone();
            run.items = without(&run.items, index)?;
            RunInput::Sublimation(run)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::layout::{
        AlloverItem, AlloverRunInput, DtfItem, DtfRunInput, SublimationItem, SublimationRunInput,
    };

    fn allover_draft() -> RunDraft {
        RunDraft::new(RunInput::AlloverSublimation(AlloverRunInput {
            particulars: "Jersey".to_string(),
            panna: "58".to_string(),
            rate_per_meter: 0.0,
            printer: "P1".to_string(),
            items: vec![],
        }))
    }

    #[test]
    fn test_allover_edit_sequence() {
        let engine = RunCostingEngine::default();
        let draft = allover_draft()
            .apply_all(
                &[
                    DraftEdit::AddRow {
                        row: LayoutRow::AlloverSublimation(AlloverItem {
                            design: "D1".to_string(),
                            height: 39.38,
                            quantity: 1.0,
                            ..Default::default()
                        }),
                    },
                    DraftEdit::SetRatePerMeter { rate_per_meter: 100.0 },
                    DraftEdit::SetItemQuantity { index: 0, column: None, quantity: 5.0 },
                ],
                &engine,
            )
            .unwrap();

        assert_eq!(draft.edit_count(), 3);
        let RunInput::AlloverSublimation(run) = draft.input() else {
            panic!("应为满版升华");
        };
        assert_eq!(run.items[0].rate, 100.0);
        assert_eq!(run.items[0].amount, 500.0);
        assert_eq!(draft.summary(&engine).estimated_amount(), 500.0);

        let costed = draft.commit(&engine).unwrap();
        assert_eq!(costed.summary.estimated_amount(), 500.0);
    }

    #[test]
    fn test_failed_edit_leaves_previous_draft_usable() {
        let engine = RunCostingEngine::default();
        let draft = allover_draft();
        let snapshot = draft.clone();

        let err = draft
            .apply(&DraftEdit::SetItemHeight { index: 3, height: 1.0 }, &engine)
            .unwrap_err();
        assert_eq!(err, CostingError::RowOutOfRange { index: 3, len: 0 });
        assert_eq!(snapshot.edit_count(), 0);
    }

    #[test]
    fn test_add_row_kind_mismatch() {
        let engine = RunCostingEngine::default();
        let err = allover_draft()
            .apply(
                &DraftEdit::AddRow {
                    row: LayoutRow::Dtf(DtfItem::default()),
                },
                &engine,
            )
            .unwrap_err();
        assert!(matches!(err, CostingError::KindMismatch { .. }));
    }

    #[test]
    fn test_rate_per_meter_not_supported_for_dtf() {
        let engine = RunCostingEngine::default();
        let draft = RunDraft::new(RunInput::Dtf(DtfRunInput::default()));
        let err = draft
            .apply(&DraftEdit::SetRatePerMeter { rate_per_meter: 1.0 }, &engine)
            .unwrap_err();
        assert_eq!(err.field(), Some("op"));
    }

    #[test]
    fn test_sublimation_quantity_needs_column() {
        let engine = RunCostingEngine::default();
        let draft = RunDraft::new(RunInput::Sublimation(SublimationRunInput {
            rate: Some(1.0),
            column_labels: Default::default(),
            items: vec![SublimationItem {
                size: "M".to_string(),
                width: 10.0,
                height: 10.0,
                quantities: [0.0; SUBLIMATION_COLUMNS],
            }],
        }));

        let err = draft
            .clone()
            .apply(&DraftEdit::SetItemQuantity { index: 0, column: None, quantity: 3.0 }, &engine)
            .unwrap_err();
        assert_eq!(err.field(), Some("column"));

        let updated = draft
            .apply(&DraftEdit::SetItemQuantity { index: 0, column: Some(2), quantity: 3.0 }, &engine)
            .unwrap();
        assert_eq!(updated.summary(&engine).estimated_amount(), 300.0);
    }

    #[test]
    fn test_remove_row() {
        let engine = RunCostingEngine::default();
        let draft = RunDraft::new(RunInput::Dtf(DtfRunInput {
            items: vec![DtfItem::default(), DtfItem::default()],
            ..Default::default()
        }));
        let updated = draft.apply(&DraftEdit::RemoveRow { index: 1 }, &engine).unwrap();
        let RunInput::Dtf(run) = updated.input() else {
            panic!("应为 DTF");
        };
        assert_eq!(run.items.len(), 1);
    }
}
