// ==========================================
// 印花车间计价系统 - 数值工具
// ==========================================
// 宽松解析: 非数字文本按 0 处理 (记录告警，不拒绝)
// 比值保护: 分母为 0 时返回 0，不产生 NaN/Infinity
// ==========================================

use serde_json::Value as JsonValue;

/// 四舍五入保留 2 位小数
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 受保护的除法：分母 ≤ 0 时返回 0
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// 宽松读取数值
///
/// - Number → 原值 (非有限值视为 0)
/// - 数字字符串 → 解析值
/// - 空串 / null / 缺失 → 0
/// - 其他文本 → 0，并输出 warn 日志 (typo 会把该行静默清零，需可观测)
pub fn lenient_f64(field: &str, value: Option<&JsonValue>) -> f64 {
    let parsed = match value {
        None | Some(JsonValue::Null) => return 0.0,
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return 0.0;
            }
            trimmed.parse::<f64>().ok()
        }
        Some(JsonValue::Bool(_)) | Some(JsonValue::Array(_)) | Some(JsonValue::Object(_)) => None,
    };

    match parsed {
        Some(v) if v.is_finite() => v,
        _ => {
            tracing::warn!(field = field, raw_value = ?value, "数值字段无法解析，按 0 处理");
            0.0
        }
    }
}

/// 宽松读取布尔值 ("true"/"1"/"yes"/"on" 及非零数值视为真)
pub fn lenient_bool(value: Option<&JsonValue>) -> bool {
    match value {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Some(JsonValue::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        _ => false,
    }
}

/// 宽松读取文本 (数字转字符串，null/缺失为空串)
pub fn lenient_string(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        Some(JsonValue::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// 把 f64 写成 JSON 数值 (非有限值写 0)
pub fn json_number(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::from(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round2() {
        assert_eq!(round2(100.0), 100.0);
        assert_eq!(round2(12.345_6), 12.35);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(58.404_875), 58.4);
    }

    #[test]
    fn test_ratio_or_zero_guards_zero_denominator() {
        assert_eq!(ratio_or_zero(10.0, 0.0), 0.0);
        assert_eq!(ratio_or_zero(0.0, 0.0), 0.0);
        assert_eq!(ratio_or_zero(10.0, 4.0), 2.5);
    }

    #[test]
    fn test_lenient_f64() {
        assert_eq!(lenient_f64("h", Some(&json!(12.5))), 12.5);
        assert_eq!(lenient_f64("h", Some(&json!("7"))), 7.0);
        assert_eq!(lenient_f64("h", Some(&json!(" 3.25 "))), 3.25);
        assert_eq!(lenient_f64("h", Some(&json!(""))), 0.0);
        assert_eq!(lenient_f64("h", Some(&json!("12a"))), 0.0);
        assert_eq!(lenient_f64("h", Some(&json!("NaN"))), 0.0);
        assert_eq!(lenient_f64("h", Some(&JsonValue::Null)), 0.0);
        assert_eq!(lenient_f64("h", None), 0.0);
        assert_eq!(lenient_f64("h", Some(&json!(true))), 0.0);
    }

    #[test]
    fn test_lenient_bool() {
        assert!(lenient_bool(Some(&json!(true))));
        assert!(lenient_bool(Some(&json!("Yes"))));
        assert!(lenient_bool(Some(&json!(1))));
        assert!(!lenient_bool(Some(&json!("no"))));
        assert!(!lenient_bool(Some(&json!(0))));
        assert!(!lenient_bool(None));
    }

    #[test]
    fn test_lenient_string() {
        assert_eq!(lenient_string(Some(&json!("A1"))), "A1");
        assert_eq!(lenient_string(Some(&json!(42))), "42");
        assert_eq!(lenient_string(None), "");
    }
}
