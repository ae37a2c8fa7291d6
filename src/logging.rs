// ==========================================
// 日志系统初始化
// ==========================================
// tracing + tracing-subscriber
// 日志写 stderr，stdout 只留给命令响应
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量 (取值 "json" 时输出结构化日志)
pub const LOG_FORMAT_ENV: &str = "PRINT_SHOP_BILLING_LOG_FORMAT";

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=print_shop_billing=trace
/// - PRINT_SHOP_BILLING_LOG_FORMAT: `json` 或缺省 (文本)
///
/// # 示例
/// ```no_run
/// use print_shop_billing::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true);

    if wants_json(std::env::var(LOG_FORMAT_ENV).ok().as_deref()) {
        builder.json().with_current_span(true).init();
    } else {
        builder.init();
    }
}

fn wants_json(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("json"))
}

/// 测试用日志 (可重复调用)
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_selection() {
        assert!(wants_json(Some("json")));
        assert!(wants_json(Some(" JSON ")));
        assert!(!wants_json(Some("text")));
        assert!(!wants_json(None));
        init_test();
        tracing::debug!("测试日志已初始化");
    }
}
