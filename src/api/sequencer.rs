// ==========================================
// 印花车间计价系统 - 请求序号守卫
// ==========================================
// 同一资源 (运行 / 结算组) 的保存请求携带客户端递增序号 seq：
// - seq <= 已接受的最大序号 → 拒绝 (StaleRequest)
// - 请求在持锁期间执行，成功后才登记序号
// 未携带 seq 的请求不参与排序 (后写覆盖)
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct RequestSequencer {
    last_accepted: Mutex<HashMap<String, u64>>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按序执行请求
    ///
    /// `f` 失败时不登记序号，客户端可用同一 seq 重试
    pub fn run_in_order<T, F>(&self, resource: &str, seq: Option<u64>, f: F) -> ApiResult<T>
    where
        F: FnOnce() -> ApiResult<T>,
    {
        let mut guard = self
            .last_accepted
            .lock()
            .map_err(|e| ApiError::InternalError(format!("序号锁获取失败: {}", e)))?;

        let Some(seq) = seq else {
            return f();
        };

        if let Some(&last) = guard.get(resource) {
            if seq <= last {
                tracing::warn!(resource, seq, last_accepted = last, "拒绝过期请求");
                return Err(ApiError::StaleRequest {
                    resource: resource.to_string(),
                    seq,
                    last_accepted: last,
                });
            }
        }

        let value = f()?;
        guard.insert(resource.to_string(), seq);
        Ok(value)
    }

    /// 资源最近一次被接受的序号
    pub fn last_accepted(&self, resource: &str) -> Option<u64> {
        self.last_accepted
            .lock()
            .ok()
            .and_then(|g| g.get(resource).copied())
    }
}
