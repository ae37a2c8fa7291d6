// ==========================================
// 印花车间计价系统 - 运行配置 API
// ==========================================
// 职责: 运行计价预览 / 保存配置 / 查询
// 保存流程: 解析字段 → 规范化 → 校验 → 计价 → 整体替换值包 → COMPLETE
// 校验失败不落库，调用方草稿保持不变
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use crate::api::error::{ApiError, ApiResult};
use crate::api::sequencer::RequestSequencer;
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::layout::{RunInput, RunSummary};
use crate::domain::order::{ProcessRun, RunConfiguration, ValuesBag};
use crate::engine::costing::RunCostingEngine;
use crate::engine::draft::{DraftEdit, RunDraft};
use crate::repository::run_repo::{RunConfigurationRecord, RunRepository};

// ==========================================
// 响应结构
// ==========================================

/// 预览结果 (未校验，不落库)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPreview {
    pub input: RunInput,
    pub summary: RunSummary,
    /// 当前草稿若直接保存会被拒绝的原因
    pub validation_error: Option<String>,
}

/// 保存配置结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureRunResponse {
    pub success: bool,
    pub run: ProcessRun,
    pub estimated_amount: f64,
}

/// 运行详情 (原始值包 + 重新读取的类型化输入与汇总)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunView {
    pub run: ProcessRun,
    pub input: Option<RunInput>,
    pub summary: Option<RunSummary>,
}

// ==========================================
// RunApi - 运行配置 API
// ==========================================
pub struct RunApi {
    run_repo: Arc<RunRepository>,
    config_manager: Arc<ConfigManager>,
    sequencer: Arc<RequestSequencer>,
}

impl RunApi {
    pub fn new(
        run_repo: Arc<RunRepository>,
        config_manager: Arc<ConfigManager>,
        sequencer: Arc<RequestSequencer>,
    ) -> Self {
        Self {
            run_repo,
            config_manager,
            sequencer,
        }
    }

    fn engine(&self) -> ApiResult<RunCostingEngine> {
        let params = self
            .config_manager
            .get_costing_params()
            .map_err(|e| ApiError::InternalError(format!("读取计价参数失败: {}", e)))?;
        Ok(RunCostingEngine::new(params))
    }

    fn load_run(&self, run_id: &str) -> ApiResult<ProcessRun> {
        self.run_repo
            .find_by_id(run_id)?
            .ok_or_else(|| ApiError::NotFound(format!("ProcessRun(id={})不存在", run_id)))
    }

    /// 预览计价
    ///
    /// # 参数
    /// - draft_fields: 编辑中的字段包 (为空时以已保存值包为起点)
    /// - edits: 依次应用的草稿编辑
    #[instrument(skip(self, draft_fields, edits))]
    pub fn preview_run(
        &self,
        run_id: &str,
        draft_fields: Option<&ValuesBag>,
        edits: &[DraftEdit],
    ) -> ApiResult<RunPreview> {
        let run = self.load_run(run_id)?;
        let engine = self.engine()?;

        let base = draft_fields.unwrap_or(&run.values);
        let input = crate::engine::value_bag::parse_run_input(run.process_kind, base)?;
        let draft = RunDraft::new(input).apply_all(edits, &engine)?;

        let validation_error = engine
            .validate(&engine.normalize(draft.input()))
            .err()
            .map(|e| e.to_string());

        Ok(RunPreview {
            summary: draft.summary(&engine),
            input: draft.input().clone(),
            validation_error,
        })
    }

    /// 保存运行配置
    ///
    /// # 参数
    /// - seq: 客户端请求序号 (同一运行内递增；过期请求被拒绝)
    #[instrument(skip(self, configuration))]
    pub fn configure_run(
        &self,
        run_id: &str,
        configuration: &RunConfiguration,
        seq: Option<u64>,
        actor: &str,
    ) -> ApiResult<ConfigureRunResponse> {
        let images = configuration.images.clone().unwrap_or_default();
        let max_images = self
            .config_manager
            .get_max_run_images()
            .map_err(|e| ApiError::InternalError(format!("读取配置失败: {}", e)))?;
        if images.len() > max_images {
            return Err(ApiError::ValidationError {
                message: format!("图片数量超出上限: {} > {}", images.len(), max_images),
                field: Some("images".to_string()),
            });
        }

        self.sequencer.run_in_order(run_id, seq, || {
            let run = self.load_run(run_id)?;
            let engine = self.engine()?;
            let costed = engine.evaluate_fields(run.process_kind, &configuration.fields)?;
            let estimated_amount = costed.summary.estimated_amount();

            let record = RunConfigurationRecord {
                values: costed.values,
                images,
                executor_id: configuration.executor_id.clone(),
                reviewer_id: configuration.reviewer_id.clone(),
                location_id: configuration.location_id.clone(),
            };
            let log = ActionLog::now(
                ActionType::ConfigureRun,
                Some(run_id),
                actor,
                Some(json!({
                    "process_kind": run.process_kind.to_db_str(),
                    "estimated_amount": estimated_amount,
                    "seq": seq,
                })),
                None,
            );
            self.run_repo.save_configuration(run_id, &record, &log)?;

            tracing::info!(run_id, estimated_amount, "运行配置已保存");

            Ok(ConfigureRunResponse {
                success: true,
                run: self.load_run(run_id)?,
                estimated_amount,
            })
        })
    }

    /// 查询运行
    ///
    /// 已保存的运行按原值包重新读取；未配置或值包损坏时仅返回原始值包
    pub fn get_run(&self, run_id: &str) -> ApiResult<RunView> {
        let run = self.load_run(run_id)?;
        if !run.is_complete() {
            return Ok(RunView {
                run,
                input: None,
                summary: None,
            });
        }

        let engine = self.engine()?;
        match engine.reread(run.process_kind, &run.values) {
            Ok((input, summary)) => Ok(RunView {
                run,
                input: Some(input),
                summary: Some(summary),
            }),
            Err(e) => {
                tracing::warn!(run_id, error = %e, "已保存值包无法解析");
                Ok(RunView {
                    run,
                    input: None,
                    summary: None,
                })
            }
        }
    }
}
