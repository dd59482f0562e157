// ==========================================
// 运单动态字段系统 - 依赖求值器
// ==========================================
// 职责: 根据当前记录值计算字段是否"激活"
// 规则: 子句之间 AND；空子句列表恒为 true
// 红线: 纯函数，校验路径与表单装配路径必须调用同一实现
// ==========================================

use crate::domain::field::{DependencyClause, FieldDefinition};
use crate::domain::types::DependencyOperator;
use serde_json::{Map, Value};

// ==========================================
// DependencyEvaluator - 依赖求值器
// ==========================================
pub struct DependencyEvaluator;

impl DependencyEvaluator {
    /// 计算子句列表的合取结果
    ///
    /// # 参数
    /// - clauses: 依赖子句
    /// - values: 当前记录值（字段 key → 值）
    pub fn evaluate(clauses: &[DependencyClause], values: &Map<String, Value>) -> bool {
        clauses
            .iter()
            .all(|clause| Self::evaluate_clause(clause, values))
    }

    /// 字段是否激活
    pub fn is_active(definition: &FieldDefinition, values: &Map<String, Value>) -> bool {
        Self::evaluate(&definition.dependencies, values)
    }

    /// 单个子句求值
    pub fn evaluate_clause(clause: &DependencyClause, values: &Map<String, Value>) -> bool {
        let actual = values.get(&clause.field_key).unwrap_or(&Value::Null);
        let expected = &clause.comparison_value;

        match clause.operator {
            DependencyOperator::Equals => coerce_to_string(actual) == coerce_to_string(expected),
            DependencyOperator::NotEquals => coerce_to_string(actual) != coerce_to_string(expected),
            DependencyOperator::Contains => contains(actual, expected),
            DependencyOperator::NotContains => !contains(actual, expected),
            DependencyOperator::GreaterThan => match (coerce_to_number(actual), coerce_to_number(expected)) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
            DependencyOperator::LessThan => match (coerce_to_number(actual), coerce_to_number(expected)) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
        }
    }
}

/// 字符串包含；数组值额外匹配元素相等
fn contains(actual: &Value, expected: &Value) -> bool {
    let needle = coerce_to_string(expected);
    if let Value::Array(items) = actual {
        if items.iter().any(|item| coerce_to_string(item) == needle) {
            return true;
        }
    }
    coerce_to_string(actual).contains(&needle)
}

/// 值 → 比较用字符串
///
/// 整数形式的浮点数不带小数部分（2.0 → "2"），null → ""
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                let f = n.as_f64().unwrap_or(0.0);
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{}", f as i64)
                } else {
                    f.to_string()
                }
            }
        }
        Value::Array(items) => items
            .iter()
            .map(coerce_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// 值 → 数值（无法转换返回 None）
pub fn coerce_to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
            }
        }
        _ => None,
    }
}
