// ==========================================
// 运单动态字段系统 - 字段校验器
// ==========================================
// 职责: 按字段定义强转并校验原始值
// 流程: 激活判定 → 必填 → 类型强转 → 格式 → 正则 → 范围/长度 → 选项
// 红线: 不修改字段定义；数值解析失败必须拒绝（与导入宽松策略不同）
// ==========================================

use crate::domain::field::{ChoiceRules, FieldDefinition, FieldKind, NumericRules, TextRules};
use crate::domain::types::FieldType;
use crate::domain::validation::{RecordValidationReport, ValidationErrorKind, ValidationOutcome};
use crate::engine::dependency::{coerce_to_string, DependencyEvaluator};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// 日期输出格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// 时间输出格式
pub const TIME_FORMAT: &str = "%H:%M:%S";
/// 日期时间输出格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const DATE_INPUT_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y"];
const TIME_INPUT_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];
const DATETIME_INPUT_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

// ==========================================
// FieldValidator - 字段校验器
// ==========================================
pub struct FieldValidator;

impl FieldValidator {
    /// 校验单个字段值
    ///
    /// # 参数
    /// - definition: 字段定义
    /// - raw: 原始值
    /// - context: 记录上下文（用于依赖求值）
    ///
    /// # 返回
    /// - ValidationOutcome: valid / coerced_value / error
    pub fn validate(
        definition: &FieldDefinition,
        raw: &Value,
        context: &Map<String, Value>,
    ) -> ValidationOutcome {
        let active = DependencyEvaluator::is_active(definition, context);

        if is_empty_value(raw) {
            if definition.required && active {
                return ValidationOutcome::fail(
                    &definition.key,
                    ValidationErrorKind::MissingRequired,
                    format!("{} is required", definition.label),
                );
            }
            return ValidationOutcome::ok(Value::Null);
        }

        match &definition.kind {
            FieldKind::Text(rules)
            | FieldKind::MultilineText(rules)
            | FieldKind::SecretText(rules)
            | FieldKind::Email(rules)
            | FieldKind::Phone(rules)
            | FieldKind::Url(rules)
            | FieldKind::Color(rules) => validate_text(definition, rules, raw),
            FieldKind::Number(rules) | FieldKind::Range(rules) => {
                validate_number(definition, rules, raw)
            }
            FieldKind::Date => validate_temporal(definition, raw, |s| {
                parse_date(s).map(|d| d.format(DATE_FORMAT).to_string())
            }),
            FieldKind::Time => validate_temporal(definition, raw, |s| {
                parse_time(s).map(|t| t.format(TIME_FORMAT).to_string())
            }),
            FieldKind::Datetime => validate_temporal(definition, raw, |s| {
                parse_datetime(s).map(|dt| dt.format(DATETIME_FORMAT).to_string())
            }),
            FieldKind::Boolean => match raw {
                Value::Bool(b) => ValidationOutcome::ok(Value::Bool(*b)),
                other => match parse_bool(&coerce_to_string(other)) {
                    Some(b) => ValidationOutcome::ok(Value::Bool(b)),
                    None => invalid_type(definition, "a yes/no value"),
                },
            },
            FieldKind::Enum(rules) | FieldKind::RadioGroup(rules) => {
                validate_single_choice(definition, rules, raw)
            }
            FieldKind::CheckboxGroup(rules) => validate_multi_choice(definition, rules, raw),
            FieldKind::File(_) => match raw {
                Value::String(s) => ValidationOutcome::ok(Value::String(s.trim().to_string())),
                Value::Array(items) if items.iter().all(Value::is_string) => {
                    ValidationOutcome::ok(raw.clone())
                }
                _ => invalid_type(definition, "a file reference"),
            },
        }
    }

    /// 校验整条记录
    ///
    /// 说明:
    /// - 每个字段独立校验，收集全部错误
    /// - 不在字段定义中的 key 原样保留（扩展值不因定义删除而丢失）
    pub fn validate_record(
        schema: &[FieldDefinition],
        values: &Map<String, Value>,
    ) -> RecordValidationReport {
        let mut report = RecordValidationReport::default();

        for (key, value) in values {
            if !schema.iter().any(|d| &d.key == key) {
                report.coerced_values.insert(key.clone(), value.clone());
            }
        }

        for definition in schema {
            let raw = values.get(&definition.key).unwrap_or(&Value::Null);
            let outcome = Self::validate(definition, raw, values);
            match outcome.error {
                Some(error) => report.errors.push(error),
                None => {
                    if !outcome.coerced_value.is_null() {
                        report
                            .coerced_values
                            .insert(definition.key.clone(), outcome.coerced_value);
                    }
                }
            }
        }

        report
    }
}

// ==========================================
// 各类型校验
// ==========================================

fn validate_text(definition: &FieldDefinition, rules: &TextRules, raw: &Value) -> ValidationOutcome {
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(_) | Value::Bool(_) => coerce_to_string(raw),
        _ => return invalid_type(definition, "text"),
    };

    let shape_ok = match definition.field_type() {
        FieldType::Email => email_regex().is_match(&text),
        FieldType::Phone => phone_regex().is_match(&text),
        FieldType::Url => url_regex().is_match(&text),
        FieldType::Color => color_regex().is_match(&text),
        _ => true,
    };
    if !shape_ok {
        let expected = match definition.field_type() {
            FieldType::Email => "a valid email address",
            FieldType::Phone => "a valid phone number",
            FieldType::Url => "a valid URL",
            _ => "a hex color such as #1A2B3C",
        };
        return invalid_type(definition, expected);
    }

    if let Some(pattern) = &rules.pattern {
        let matched = compiled_pattern(pattern)
            .map(|re| re.is_match(&text))
            .unwrap_or(false);
        if !matched {
            let message = rules
                .message
                .clone()
                .unwrap_or_else(|| format!("{} does not match the required format", definition.label));
            return ValidationOutcome::fail(&definition.key, ValidationErrorKind::PatternMismatch, message);
        }
    }

    let length = text.chars().count();
    if let Some(min) = rules.min_length {
        if length < min {
            return out_of_range(
                definition,
                rules.message.as_deref(),
                format!("{} must be at least {} characters", definition.label, min),
            );
        }
    }
    if let Some(max) = rules.max_length {
        if length > max {
            return out_of_range(
                definition,
                rules.message.as_deref(),
                format!("{} must be at most {} characters", definition.label, max),
            );
        }
    }

    ValidationOutcome::ok(Value::String(text))
}

fn validate_number(
    definition: &FieldDefinition,
    rules: &NumericRules,
    raw: &Value,
) -> ValidationOutcome {
    let number = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    };
    let Some(number) = number else {
        return invalid_type(definition, "a number");
    };

    if let Some(min) = rules.min {
        if number < min {
            return out_of_range(
                definition,
                rules.message.as_deref(),
                format!("{} must be at least {}", definition.label, min),
            );
        }
    }
    if let Some(max) = rules.max {
        if number > max {
            return out_of_range(
                definition,
                rules.message.as_deref(),
                format!("{} must be at most {}", definition.label, max),
            );
        }
    }

    ValidationOutcome::ok(Value::from(number))
}

fn validate_temporal<F>(definition: &FieldDefinition, raw: &Value, parse: F) -> ValidationOutcome
where
    F: Fn(&str) -> Option<String>,
{
    let Value::String(s) = raw else {
        return invalid_type(definition, "a date/time");
    };
    match parse(s.trim()) {
        Some(canonical) => ValidationOutcome::ok(Value::String(canonical)),
        None => invalid_type(definition, "a valid date/time"),
    }
}

fn validate_single_choice(
    definition: &FieldDefinition,
    rules: &ChoiceRules,
    raw: &Value,
) -> ValidationOutcome {
    let candidate = coerce_to_string(raw);
    match match_option(rules, &candidate) {
        Some(option) => ValidationOutcome::ok(Value::String(option)),
        None => invalid_enum(definition, rules, &candidate),
    }
}

fn validate_multi_choice(
    definition: &FieldDefinition,
    rules: &ChoiceRules,
    raw: &Value,
) -> ValidationOutcome {
    let candidates: Vec<String> = match raw {
        Value::Array(items) => items.iter().map(coerce_to_string).collect(),
        other => split_list(&coerce_to_string(other)),
    };

    let mut selected = Vec::with_capacity(candidates.len());
    for candidate in candidates.iter().filter(|c| !c.is_empty()) {
        match match_option(rules, candidate) {
            Some(option) => {
                if !selected.contains(&option) {
                    selected.push(option);
                }
            }
            None => return invalid_enum(definition, rules, candidate),
        }
    }

    ValidationOutcome::ok(Value::Array(selected.into_iter().map(Value::String).collect()))
}

/// 选项匹配：精确优先，其次忽略大小写（返回定义中的写法）
fn match_option(rules: &ChoiceRules, candidate: &str) -> Option<String> {
    rules
        .enum_values
        .iter()
        .find(|v| v.as_str() == candidate)
        .or_else(|| {
            rules
                .enum_values
                .iter()
                .find(|v| v.eq_ignore_ascii_case(candidate))
        })
        .cloned()
}

// ==========================================
// 失败结果构造
// ==========================================

fn invalid_type(definition: &FieldDefinition, expected: &str) -> ValidationOutcome {
    ValidationOutcome::fail(
        &definition.key,
        ValidationErrorKind::InvalidType,
        format!("{} must be {}", definition.label, expected),
    )
}

fn out_of_range(definition: &FieldDefinition, custom: Option<&str>, default: String) -> ValidationOutcome {
    ValidationOutcome::fail(
        &definition.key,
        ValidationErrorKind::OutOfRange,
        custom.map(str::to_string).unwrap_or(default),
    )
}

fn invalid_enum(definition: &FieldDefinition, rules: &ChoiceRules, candidate: &str) -> ValidationOutcome {
    let message = rules.message.clone().unwrap_or_else(|| {
        format!(
            "'{}' is not a valid option for {} (allowed: {})",
            candidate,
            definition.label,
            rules.enum_values.join(", ")
        )
    });
    ValidationOutcome::fail(&definition.key, ValidationErrorKind::InvalidEnumValue, message)
}

// ==========================================
// 公共解析工具（导入层复用）
// ==========================================

/// 空值判定: null / 空白字符串 / 空数组
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// 解析布尔值（true/false/1/0/yes/no/y/n）
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// 解析日期（兼容完整日期时间，取日期部分）
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| parse_datetime(s).map(|dt| dt.date()))
}

/// 解析时间
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    TIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

/// 解析日期时间（RFC 3339 统一转为 UTC）
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// 按逗号/分号拆分列表
pub fn split_list(s: &str) -> Vec<String> {
    s.split([',', ';'])
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// 自定义正则缓存上限（超出后整体清空重建）
const PATTERN_CACHE_LIMIT: usize = 512;

/// 按模式串缓存编译结果（非法模式返回 None，不缓存）
fn compiled_pattern(pattern: &str) -> Option<Regex> {
    static CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    if let Some(re) = cache.lock().ok().and_then(|c| c.get(pattern).cloned()) {
        return Some(re);
    }

    let re = Regex::new(pattern).ok()?;
    if let Ok(mut c) = cache.lock() {
        if c.len() >= PATTERN_CACHE_LIMIT {
            c.clear();
        }
        c.insert(pattern.to_string(), re.clone());
    }
    Some(re)
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9][0-9\s\-()]{5,19}$").expect("phone regex"))
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url regex"))
}

fn color_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("color regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::{DependencyClause, ValidationRule};
    use crate::domain::types::DependencyOperator;
    use serde_json::json;

    fn ctx(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn with_rule(key: &str, t: FieldType, rule: ValidationRule, values: &[&str]) -> FieldDefinition {
        FieldDefinition::new(
            key,
            key,
            FieldKind::from_parts(t, &rule, values.iter().map(|v| v.to_string()).collect()),
        )
    }

    #[test]
    fn test_pin_code_pattern_scenario() {
        let field = with_rule(
            "pinCode",
            FieldType::Text,
            ValidationRule {
                pattern: Some(r"^\d{6}$".to_string()),
                ..Default::default()
            },
            &[],
        );

        let outcome = FieldValidator::validate(&field, &json!("12345"), &Map::new());
        assert_eq!(outcome.error_kind(), Some(ValidationErrorKind::PatternMismatch));
        assert!(!outcome.valid);

        let outcome = FieldValidator::validate(&field, &json!("123456"), &Map::new());
        assert!(outcome.valid);
        assert_eq!(outcome.coerced_value, json!("123456"));
    }

    #[test]
    fn test_compiled_pattern_reused() {
        let first = compiled_pattern(r"^[A-Z]{3}\d+$").unwrap();
        let second = compiled_pattern(r"^[A-Z]{3}\d+$").unwrap();
        assert_eq!(first.as_str(), second.as_str());
        assert!(second.is_match("AWB123"));
        assert!(compiled_pattern("([unclosed").is_none());
    }

    #[test]
    fn test_pattern_custom_message() {
        let field = with_rule(
            "pinCode",
            FieldType::Text,
            ValidationRule {
                pattern: Some(r"^\d{6}$".to_string()),
                message: Some("Pin code must be 6 digits".to_string()),
                ..Default::default()
            },
            &[],
        );
        let outcome = FieldValidator::validate(&field, &json!("abc"), &Map::new());
        assert_eq!(outcome.error.unwrap().message, "Pin code must be 6 digits");
    }

    #[test]
    fn test_required_empty_string_for_every_type() {
        for t in FieldType::ALL {
            let field = with_rule("f", t, ValidationRule::default(), &["A"]).required();
            let outcome = FieldValidator::validate(&field, &json!(""), &Map::new());
            assert_eq!(
                outcome.error_kind(),
                Some(ValidationErrorKind::MissingRequired),
                "type {}",
                t
            );
        }
    }

    #[test]
    fn test_inactive_field_waives_required_but_still_coerces() {
        let field = FieldDefinition::new("deliveryDate", "Delivery Date", FieldKind::plain(FieldType::Date))
            .required()
            .with_dependency(DependencyClause::new(
                "shipmentStatus",
                DependencyOperator::Equals,
                json!("Delivered"),
            ));
        let context = ctx(json!({ "shipmentStatus": "InTransit" }));

        let outcome = FieldValidator::validate(&field, &Value::Null, &context);
        assert!(outcome.valid);

        let outcome = FieldValidator::validate(&field, &json!("2025/01/20"), &context);
        assert!(outcome.valid);
        assert_eq!(outcome.coerced_value, json!("2025-01-20"));

        let outcome = FieldValidator::validate(&field, &json!("not a date"), &context);
        assert_eq!(outcome.error_kind(), Some(ValidationErrorKind::InvalidType));

        let active = ctx(json!({ "shipmentStatus": "Delivered" }));
        let outcome = FieldValidator::validate(&field, &Value::Null, &active);
        assert_eq!(outcome.error_kind(), Some(ValidationErrorKind::MissingRequired));
    }

    #[test]
    fn test_number_strict_rejects_garbage() {
        let field = with_rule("marginAmount", FieldType::Number, ValidationRule::default(), &[]);
        let outcome = FieldValidator::validate(&field, &json!("abc"), &Map::new());
        assert_eq!(outcome.error_kind(), Some(ValidationErrorKind::InvalidType));

        let outcome = FieldValidator::validate(&field, &json!(" 12.5 "), &Map::new());
        assert_eq!(outcome.coerced_value, json!(12.5));
    }

    #[test]
    fn test_number_range() {
        let field = with_rule(
            "weight",
            FieldType::Number,
            ValidationRule {
                min: Some(0.01),
                max: Some(100.0),
                ..Default::default()
            },
            &[],
        );
        let outcome = FieldValidator::validate(&field, &json!(0), &Map::new());
        assert_eq!(outcome.error_kind(), Some(ValidationErrorKind::OutOfRange));
        let outcome = FieldValidator::validate(&field, &json!("150"), &Map::new());
        assert_eq!(outcome.error_kind(), Some(ValidationErrorKind::OutOfRange));
        assert!(FieldValidator::validate(&field, &json!(2.5), &Map::new()).valid);
    }

    #[test]
    fn test_text_length_checked_after_trim() {
        let field = with_rule(
            "name",
            FieldType::Text,
            ValidationRule {
                min_length: Some(3),
                max_length: Some(5),
                ..Default::default()
            },
            &[],
        );
        let outcome = FieldValidator::validate(&field, &json!("  ab  "), &Map::new());
        assert_eq!(outcome.error_kind(), Some(ValidationErrorKind::OutOfRange));
        let outcome = FieldValidator::validate(&field, &json!("abcdef"), &Map::new());
        assert_eq!(outcome.error_kind(), Some(ValidationErrorKind::OutOfRange));
        assert!(FieldValidator::validate(&field, &json!("abcd"), &Map::new()).valid);
    }

    #[test]
    fn test_enum_membership() {
        let field = with_rule(
            "courierPartner",
            FieldType::Enum,
            ValidationRule::default(),
            &["BlueDart", "Delhivery"],
        );
        let outcome = FieldValidator::validate(&field, &json!("bluedart"), &Map::new());
        assert_eq!(outcome.coerced_value, json!("BlueDart"));
        let outcome = FieldValidator::validate(&field, &json!("FedEx"), &Map::new());
        assert_eq!(outcome.error_kind(), Some(ValidationErrorKind::InvalidEnumValue));
    }

    #[test]
    fn test_checkbox_group_subset() {
        let field = with_rule(
            "services",
            FieldType::CheckboxGroup,
            ValidationRule::default(),
            &["COD", "Insurance", "Fragile"],
        );
        let outcome = FieldValidator::validate(&field, &json!("COD, Fragile"), &Map::new());
        assert_eq!(outcome.coerced_value, json!(["COD", "Fragile"]));

        let outcome = FieldValidator::validate(&field, &json!(["COD", "Express"]), &Map::new());
        assert_eq!(outcome.error_kind(), Some(ValidationErrorKind::InvalidEnumValue));
    }

    #[test]
    fn test_boolean_and_temporal_coercion() {
        let b = with_rule("cod", FieldType::Boolean, ValidationRule::default(), &[]);
        assert_eq!(FieldValidator::validate(&b, &json!("Yes"), &Map::new()).coerced_value, json!(true));
        assert_eq!(
            FieldValidator::validate(&b, &json!("maybe"), &Map::new()).error_kind(),
            Some(ValidationErrorKind::InvalidType)
        );

        let t = with_rule("pickupTime", FieldType::Time, ValidationRule::default(), &[]);
        assert_eq!(
            FieldValidator::validate(&t, &json!("09:30"), &Map::new()).coerced_value,
            json!("09:30:00")
        );

        let dt = with_rule("bookedAt", FieldType::Datetime, ValidationRule::default(), &[]);
        assert_eq!(
            FieldValidator::validate(&dt, &json!("2025-01-20T10:00:00+05:30"), &Map::new())
                .coerced_value,
            json!("2025-01-20T04:30:00")
        );
    }

    #[test]
    fn test_email_phone_url_color_shapes() {
        let email = with_rule("customerEmail", FieldType::Email, ValidationRule::default(), &[]);
        assert!(FieldValidator::validate(&email, &json!("a@b.co"), &Map::new()).valid);
        assert!(!FieldValidator::validate(&email, &json!("not-an-email"), &Map::new()).valid);

        let phone = with_rule("customerMobile", FieldType::Phone, ValidationRule::default(), &[]);
        assert!(FieldValidator::validate(&phone, &json!("+91 98765-43210"), &Map::new()).valid);
        assert!(!FieldValidator::validate(&phone, &json!("call me"), &Map::new()).valid);

        let url = with_rule("trackingUrl", FieldType::Url, ValidationRule::default(), &[]);
        assert!(FieldValidator::validate(&url, &json!("https://track.example.com/x"), &Map::new()).valid);

        let color = with_rule("tagColor", FieldType::Color, ValidationRule::default(), &[]);
        assert!(FieldValidator::validate(&color, &json!("#1a2b3c"), &Map::new()).valid);
        assert!(!FieldValidator::validate(&color, &json!("blue"), &Map::new()).valid);
    }

    #[test]
    fn test_validate_does_not_mutate_definition() {
        let field = with_rule("status", FieldType::Enum, ValidationRule::default(), &["A", "B"]);
        let snapshot = field.clone();
        let _ = FieldValidator::validate(&field, &json!("a"), &Map::new());
        assert_eq!(field, snapshot);
    }

    #[test]
    fn test_validate_record_collects_errors_and_keeps_unknown_keys() {
        let schema = vec![
            with_rule("awbNumber", FieldType::Text, ValidationRule::default(), &[]).required(),
            with_rule("weight", FieldType::Number, ValidationRule::default(), &[]),
        ];
        let report = FieldValidator::validate_record(
            &schema,
            &ctx(json!({ "weight": "x", "legacyField": "kept" })),
        );

        assert!(!report.is_valid());
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.coerced_values["legacyField"], json!("kept"));
    }
}
