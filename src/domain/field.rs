// ==========================================
// 运单动态字段系统 - 字段定义领域模型
// ==========================================
// 职责: FieldDefinition / FieldKind / DependencyClause / FieldPatch
// 红线: key 创建后不可变；选项类字段必须携带至少一个选项
// 存储/传输形态: 扁平 JSON（type + enumValues + validationRule）
// ==========================================

use crate::domain::types::{DependencyOperator, FieldType, FieldWidth, WidgetKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 选项类字段缺少选项时的提示文案
pub const ENUM_VALUES_REQUIRED_MESSAGE: &str =
    "Enum values are required when field type is enum, radio-group or checkbox-group";

// ==========================================
// ValidationRule - 扁平校验规则（传输形态）
// ==========================================
// 说明: 只在与字段类型匹配时生效，其余属性在转换为 FieldKind 时丢弃
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple: Option<bool>,
}

impl ValidationRule {
    /// 用 patch 中已给出的属性覆盖当前规则
    pub fn overlay(&mut self, patch: &ValidationRule) {
        if patch.min.is_some() {
            self.min = patch.min;
        }
        if patch.max.is_some() {
            self.max = patch.max;
        }
        if patch.min_length.is_some() {
            self.min_length = patch.min_length;
        }
        if patch.max_length.is_some() {
            self.max_length = patch.max_length;
        }
        if patch.pattern.is_some() {
            self.pattern = patch.pattern.clone().filter(|p| !p.is_empty());
        }
        if patch.message.is_some() {
            self.message = patch.message.clone().filter(|m| !m.is_empty());
        }
        if patch.step.is_some() {
            self.step = patch.step;
        }
        if patch.accept.is_some() {
            self.accept = patch.accept.clone();
        }
        if patch.multiple.is_some() {
            self.multiple = patch.multiple;
        }
    }
}

// ==========================================
// 各类字段的专属规则
// ==========================================

/// 文本类规则（text / multiline-text / email / phone / url / secret-text / color）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRules {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub message: Option<String>,
}

/// 数值类规则（number / range）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericRules {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub message: Option<String>,
}

/// 选项类规则（enum / radio-group / checkbox-group）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChoiceRules {
    pub enum_values: Vec<String>,
    pub message: Option<String>,
}

/// 文件类规则
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileRules {
    pub accept: Option<String>,
    pub multiple: bool,
}

// ==========================================
// FieldKind - 字段类型（带类型专属属性的封闭联合）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "KindWire", into = "KindWire")]
pub enum FieldKind {
    Text(TextRules),
    Number(NumericRules),
    Date,
    Time,
    Datetime,
    Enum(ChoiceRules),
    Boolean,
    CheckboxGroup(ChoiceRules),
    RadioGroup(ChoiceRules),
    Email(TextRules),
    Phone(TextRules),
    Url(TextRules),
    MultilineText(TextRules),
    File(FileRules),
    SecretText(TextRules),
    Color(TextRules),
    Range(NumericRules),
}

/// FieldKind 的扁平传输形态
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KindWire {
    #[serde(rename = "type")]
    field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    enum_values: Vec<String>,
    #[serde(default)]
    validation_rule: ValidationRule,
}

impl From<KindWire> for FieldKind {
    fn from(wire: KindWire) -> Self {
        FieldKind::from_parts(wire.field_type, &wire.validation_rule, wire.enum_values)
    }
}

impl From<FieldKind> for KindWire {
    fn from(kind: FieldKind) -> Self {
        KindWire {
            field_type: kind.field_type(),
            enum_values: kind.enum_values().map(<[String]>::to_vec).unwrap_or_default(),
            validation_rule: kind.validation_rule(),
        }
    }
}

impl FieldKind {
    /// 由类型 + 扁平规则 + 选项构造（与类型无关的属性被丢弃）
    pub fn from_parts(field_type: FieldType, rule: &ValidationRule, enum_values: Vec<String>) -> Self {
        let text = || TextRules {
            min_length: rule.min_length,
            max_length: rule.max_length,
            pattern: rule.pattern.clone().filter(|p| !p.is_empty()),
            message: rule.message.clone(),
        };
        let numeric = || NumericRules {
            min: rule.min,
            max: rule.max,
            step: rule.step,
            message: rule.message.clone(),
        };
        let choice = |values: Vec<String>| ChoiceRules {
            enum_values: values
                .into_iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
            message: rule.message.clone(),
        };

        match field_type {
            FieldType::Text => FieldKind::Text(text()),
            FieldType::Number => FieldKind::Number(numeric()),
            FieldType::Date => FieldKind::Date,
            FieldType::Time => FieldKind::Time,
            FieldType::Datetime => FieldKind::Datetime,
            FieldType::Enum => FieldKind::Enum(choice(enum_values)),
            FieldType::Boolean => FieldKind::Boolean,
            FieldType::CheckboxGroup => FieldKind::CheckboxGroup(choice(enum_values)),
            FieldType::RadioGroup => FieldKind::RadioGroup(choice(enum_values)),
            FieldType::Email => FieldKind::Email(text()),
            FieldType::Phone => FieldKind::Phone(text()),
            FieldType::Url => FieldKind::Url(text()),
            FieldType::MultilineText => FieldKind::MultilineText(text()),
            FieldType::File => FieldKind::File(FileRules {
                accept: rule.accept.clone(),
                multiple: rule.multiple.unwrap_or(false),
            }),
            FieldType::SecretText => FieldKind::SecretText(text()),
            FieldType::Color => FieldKind::Color(text()),
            FieldType::Range => FieldKind::Range(numeric()),
        }
    }

    /// 便捷构造: 无规则的纯类型
    pub fn plain(field_type: FieldType) -> Self {
        FieldKind::from_parts(field_type, &ValidationRule::default(), Vec::new())
    }

    /// 便捷构造: 选项类字段
    pub fn choice(field_type: FieldType, values: &[&str]) -> Self {
        FieldKind::from_parts(
            field_type,
            &ValidationRule::default(),
            values.iter().map(|v| v.to_string()).collect(),
        )
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldKind::Text(_) => FieldType::Text,
            FieldKind::Number(_) => FieldType::Number,
            FieldKind::Date => FieldType::Date,
            FieldKind::Time => FieldType::Time,
            FieldKind::Datetime => FieldType::Datetime,
            FieldKind::Enum(_) => FieldType::Enum,
            FieldKind::Boolean => FieldType::Boolean,
            FieldKind::CheckboxGroup(_) => FieldType::CheckboxGroup,
            FieldKind::RadioGroup(_) => FieldType::RadioGroup,
            FieldKind::Email(_) => FieldType::Email,
            FieldKind::Phone(_) => FieldType::Phone,
            FieldKind::Url(_) => FieldType::Url,
            FieldKind::MultilineText(_) => FieldType::MultilineText,
            FieldKind::File(_) => FieldType::File,
            FieldKind::SecretText(_) => FieldType::SecretText,
            FieldKind::Color(_) => FieldType::Color,
            FieldKind::Range(_) => FieldType::Range,
        }
    }

    pub fn widget(&self) -> WidgetKind {
        self.field_type().widget()
    }

    pub fn text_rules(&self) -> Option<&TextRules> {
        match self {
            FieldKind::Text(r)
            | FieldKind::Email(r)
            | FieldKind::Phone(r)
            | FieldKind::Url(r)
            | FieldKind::MultilineText(r)
            | FieldKind::SecretText(r)
            | FieldKind::Color(r) => Some(r),
            _ => None,
        }
    }

    pub fn numeric_rules(&self) -> Option<&NumericRules> {
        match self {
            FieldKind::Number(r) | FieldKind::Range(r) => Some(r),
            _ => None,
        }
    }

    pub fn choice_rules(&self) -> Option<&ChoiceRules> {
        match self {
            FieldKind::Enum(r) | FieldKind::CheckboxGroup(r) | FieldKind::RadioGroup(r) => Some(r),
            _ => None,
        }
    }

    /// 选项列表（仅选项类字段）
    pub fn enum_values(&self) -> Option<&[String]> {
        self.choice_rules().map(|r| r.enum_values.as_slice())
    }

    /// 还原为扁平规则
    pub fn validation_rule(&self) -> ValidationRule {
        let mut rule = ValidationRule::default();
        if let Some(t) = self.text_rules() {
            rule.min_length = t.min_length;
            rule.max_length = t.max_length;
            rule.pattern = t.pattern.clone();
            rule.message = t.message.clone();
        }
        if let Some(n) = self.numeric_rules() {
            rule.min = n.min;
            rule.max = n.max;
            rule.step = n.step;
            rule.message = n.message.clone();
        }
        if let Some(c) = self.choice_rules() {
            rule.message = c.message.clone();
        }
        if let FieldKind::File(f) = self {
            rule.accept = f.accept.clone();
            rule.multiple = Some(f.multiple);
        }
        rule
    }

    /// 校验类型自身的结构约束
    ///
    /// # 返回
    /// - Err(String): 违反的约束说明（由调用方包装为 InvalidSchema）
    pub fn check_invariants(&self) -> Result<(), String> {
        if let Some(choice) = self.choice_rules() {
            if choice.enum_values.is_empty() {
                return Err(ENUM_VALUES_REQUIRED_MESSAGE.to_string());
            }
        }

        if let Some(text) = self.text_rules() {
            if let Some(pattern) = &text.pattern {
                Regex::new(pattern).map_err(|e| format!("Invalid pattern '{}': {}", pattern, e))?;
            }
            if let (Some(min), Some(max)) = (text.min_length, text.max_length) {
                if min > max {
                    return Err(format!("minLength ({}) exceeds maxLength ({})", min, max));
                }
            }
        }

        if let Some(numeric) = self.numeric_rules() {
            if let (Some(min), Some(max)) = (numeric.min, numeric.max) {
                if min > max {
                    return Err(format!("min ({}) exceeds max ({})", min, max));
                }
            }
            if let Some(step) = numeric.step {
                if step <= 0.0 {
                    return Err(format!("step must be positive, got {}", step));
                }
            }
        }

        Ok(())
    }
}

// ==========================================
// DependencyClause - 条件可见性子句
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyClause {
    #[serde(alias = "field")]
    pub field_key: String,
    #[serde(alias = "value", default)]
    pub comparison_value: Value,
    #[serde(default)]
    pub operator: DependencyOperator,
}

impl DependencyClause {
    pub fn new(field_key: &str, operator: DependencyOperator, comparison_value: Value) -> Self {
        Self {
            field_key: field_key.to_string(),
            comparison_value,
            operator,
        }
    }
}

// ==========================================
// FieldDefinition - 字段定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub key: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// 排序号；创建时为空则由存储分配 max+1
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub dependencies: Vec<DependencyClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<FieldWidth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub readonly: bool,
}

fn default_visible() -> bool {
    true
}

impl FieldDefinition {
    /// 创建字段定义（默认可见、非必填、无依赖）
    pub fn new(key: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            kind,
            visible: true,
            order: None,
            required: false,
            placeholder: None,
            help_text: None,
            default_value: None,
            dependencies: Vec::new(),
            width: None,
            group: None,
            readonly: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn with_width(mut self, width: FieldWidth) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn with_dependency(mut self, clause: DependencyClause) -> Self {
        self.dependencies.push(clause);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    /// 排序键: (order, key)；未分配 order 的排在最后
    pub fn sort_key(&self) -> (i64, &str) {
        (self.order.unwrap_or(i64::MAX), self.key.as_str())
    }

    /// 实际布局宽度（显式宽度优先）
    pub fn resolved_width(&self) -> FieldWidth {
        self.width.unwrap_or_else(|| self.field_type().default_width())
    }

    /// 分组名（空白视为未分组）
    pub fn group_name(&self) -> Option<&str> {
        self.group.as_deref().map(str::trim).filter(|g| !g.is_empty())
    }

    /// 校验定义自身的结构约束（key 格式 / 类型约束 / 自依赖）
    pub fn check_invariants(&self) -> Result<(), String> {
        if !is_valid_field_key(&self.key) {
            return Err(format!(
                "Invalid field key '{}': must start with a letter or underscore and contain only letters, digits and underscores",
                self.key
            ));
        }
        if self.label.trim().is_empty() {
            return Err(format!("Label is required for field '{}'", self.key));
        }
        self.kind.check_invariants()?;
        if self.dependencies.iter().any(|d| d.field_key == self.key) {
            return Err(format!("Field '{}' cannot depend on itself", self.key));
        }
        if let Some(clause) = self.dependencies.iter().find(|d| d.field_key.trim().is_empty()) {
            return Err(format!(
                "Dependency of field '{}' has an empty field key (operator {})",
                self.key, clause.operator
            ));
        }
        Ok(())
    }
}

/// 字段 key 格式: ^[A-Za-z_][A-Za-z0-9_]*$
pub fn is_valid_field_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ==========================================
// FieldPatch - 局部更新
// ==========================================
// 说明: key 字段被接受但总是忽略（key 不可变）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_rule: Option<ValidationRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<DependencyClause>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<FieldWidth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
}

impl FieldPatch {
    /// 是否涉及类型/选项/规则变更（需要重新校验选项约束）
    pub fn touches_kind(&self) -> bool {
        self.field_type.is_some() || self.enum_values.is_some() || self.validation_rule.is_some()
    }

    /// 将 patch 应用到定义上，返回新的定义（原定义不变）
    pub fn apply_to(&self, current: &FieldDefinition) -> FieldDefinition {
        let mut next = current.clone();

        if let Some(label) = &self.label {
            next.label = label.clone();
        }

        if self.touches_kind() {
            let field_type = self.field_type.unwrap_or_else(|| current.field_type());
            let mut rule = current.kind.validation_rule();
            if let Some(patch_rule) = &self.validation_rule {
                rule.overlay(patch_rule);
            }
            let enum_values = self.enum_values.clone().unwrap_or_else(|| {
                current.kind.enum_values().map(<[String]>::to_vec).unwrap_or_default()
            });
            next.kind = FieldKind::from_parts(field_type, &rule, enum_values);
        }

        if let Some(visible) = self.visible {
            next.visible = visible;
        }
        if let Some(order) = self.order {
            next.order = Some(order);
        }
        if let Some(required) = self.required {
            next.required = required;
        }
        if let Some(placeholder) = &self.placeholder {
            next.placeholder = non_empty(placeholder);
        }
        if let Some(help_text) = &self.help_text {
            next.help_text = non_empty(help_text);
        }
        if let Some(default_value) = &self.default_value {
            next.default_value = if default_value.is_null() {
                None
            } else {
                Some(default_value.clone())
            };
        }
        if let Some(dependencies) = &self.dependencies {
            next.dependencies = dependencies.clone();
        }
        if let Some(width) = self.width {
            next.width = Some(width);
        }
        if let Some(group) = &self.group {
            next.group = non_empty(group);
        }
        if let Some(readonly) = self.readonly {
            next.readonly = readonly;
        }

        next
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ==========================================
// 批量更新
// ==========================================

/// 批量更新条目
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateItem {
    pub key: String,
    #[serde(default)]
    pub fields: FieldPatch,
}

/// 批量更新单条结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateOutcome {
    pub key: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ==========================================
// FieldTypeDescriptor - 类型清单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTypeDescriptor {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    pub widget: WidgetKind,
    pub requires_enum_values: bool,
    pub supported_rules: Vec<String>,
}

impl FieldTypeDescriptor {
    pub fn for_type(field_type: FieldType) -> Self {
        let supported: &[&str] = if field_type.is_textual() {
            &["minLength", "maxLength", "pattern", "message"]
        } else if field_type.is_numeric() {
            &["min", "max", "step", "message"]
        } else if field_type.is_choice() {
            &["message"]
        } else if field_type == FieldType::File {
            &["accept", "multiple"]
        } else {
            &[]
        };

        Self {
            field_type,
            label: field_type.display_label().to_string(),
            widget: field_type.widget(),
            requires_enum_values: field_type.is_choice(),
            supported_rules: supported.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_key_pattern() {
        assert!(is_valid_field_key("pinCode"));
        assert!(is_valid_field_key("_internal"));
        assert!(is_valid_field_key("awb_copy2"));
        assert!(!is_valid_field_key("2fast"));
        assert!(!is_valid_field_key("pin-code"));
        assert!(!is_valid_field_key(""));
        assert!(!is_valid_field_key("pin code"));
    }

    #[test]
    fn test_deserialize_flat_wire_shape() {
        let def: FieldDefinition = serde_json::from_value(json!({
            "key": "pinCode",
            "label": "Pin Code",
            "type": "text",
            "required": true,
            "validationRule": { "pattern": "^\\d{6}$", "message": "6 digits", "min": 3 }
        }))
        .unwrap();

        assert_eq!(def.field_type(), FieldType::Text);
        assert!(def.visible);
        let rules = def.kind.text_rules().unwrap();
        assert_eq!(rules.pattern.as_deref(), Some("^\\d{6}$"));
        assert_eq!(rules.message.as_deref(), Some("6 digits"));
        // min 对文本类型无意义，被丢弃
        assert_eq!(def.kind.validation_rule().min, None);
    }

    #[test]
    fn test_serialize_keeps_enum_values() {
        let def = FieldDefinition::new(
            "shipmentStatus",
            "Status",
            FieldKind::choice(FieldType::Enum, &["Booked", "Delivered"]),
        );
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["type"], "enum");
        assert_eq!(value["enumValues"], json!(["Booked", "Delivered"]));
    }

    #[test]
    fn test_choice_without_values_violates_invariant() {
        for t in [FieldType::Enum, FieldType::RadioGroup, FieldType::CheckboxGroup] {
            let def = FieldDefinition::new("status", "Status", FieldKind::plain(t));
            let err = def.check_invariants().unwrap_err();
            assert!(err.contains("Enum values are required"));
        }
    }

    #[test]
    fn test_invalid_pattern_violates_invariant() {
        let kind = FieldKind::from_parts(
            FieldType::Text,
            &ValidationRule {
                pattern: Some("([".to_string()),
                ..Default::default()
            },
            Vec::new(),
        );
        let def = FieldDefinition::new("code", "Code", kind);
        assert!(def.check_invariants().is_err());
    }

    #[test]
    fn test_self_dependency_rejected() {
        let def = FieldDefinition::new("a", "A", FieldKind::plain(FieldType::Text)).with_dependency(
            DependencyClause::new("a", DependencyOperator::Equals, json!("x")),
        );
        assert!(def.check_invariants().is_err());
    }

    #[test]
    fn test_dependency_clause_aliases() {
        let clause: DependencyClause = serde_json::from_value(json!({
            "field": "shipmentStatus",
            "value": "Delivered",
            "operator": "equals"
        }))
        .unwrap();
        assert_eq!(clause.field_key, "shipmentStatus");
        assert_eq!(clause.comparison_value, json!("Delivered"));
        assert_eq!(clause.operator, DependencyOperator::Equals);
    }

    #[test]
    fn test_patch_ignores_key_and_changes_type() {
        let def = FieldDefinition::new("mode", "Mode", FieldKind::plain(FieldType::Text)).with_order(3);
        let patch = FieldPatch {
            key: Some("renamed".to_string()),
            field_type: Some(FieldType::RadioGroup),
            enum_values: Some(vec!["Air".to_string(), " Surface ".to_string()]),
            ..Default::default()
        };

        let next = patch.apply_to(&def);
        assert_eq!(next.key, "mode");
        assert_eq!(next.field_type(), FieldType::RadioGroup);
        assert_eq!(
            next.kind.enum_values().unwrap(),
            &["Air".to_string(), "Surface".to_string()]
        );
        assert_eq!(next.order, Some(3));
        // 原定义未被修改
        assert_eq!(def.field_type(), FieldType::Text);
    }

    #[test]
    fn test_patch_type_change_to_choice_without_values() {
        let def = FieldDefinition::new("mode", "Mode", FieldKind::plain(FieldType::Text));
        let patch = FieldPatch {
            field_type: Some(FieldType::Enum),
            ..Default::default()
        };
        let next = patch.apply_to(&def);
        assert!(next.check_invariants().is_err());
    }

    #[test]
    fn test_descriptor_for_each_type() {
        let d = FieldTypeDescriptor::for_type(FieldType::CheckboxGroup);
        assert!(d.requires_enum_values);
        assert_eq!(d.widget, WidgetKind::CheckboxGroup);
        let d = FieldTypeDescriptor::for_type(FieldType::Range);
        assert!(d.supported_rules.contains(&"step".to_string()));
    }
}
