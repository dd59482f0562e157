// ==========================================
// 运单动态字段系统 - 领域类型定义
// ==========================================
// 职责: 字段类型、依赖运算符、布局宽度、控件类型、导入任务状态
// 约束: 全部为封闭枚举，新增成员必须在所有 match 处显式处理
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 字段类型 (Field Type)
// ==========================================
// 序列化格式: kebab-case (与前端/存储一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Time,
    Datetime,
    Enum,
    Boolean,
    CheckboxGroup,
    RadioGroup,
    Email,
    Phone,
    Url,
    MultilineText,
    File,
    SecretText,
    Color,
    Range,
}

impl FieldType {
    /// 全部字段类型（按类型清单顺序）
    pub const ALL: [FieldType; 17] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Date,
        FieldType::Time,
        FieldType::Datetime,
        FieldType::Enum,
        FieldType::Boolean,
        FieldType::CheckboxGroup,
        FieldType::RadioGroup,
        FieldType::Email,
        FieldType::Phone,
        FieldType::Url,
        FieldType::MultilineText,
        FieldType::File,
        FieldType::SecretText,
        FieldType::Color,
        FieldType::Range,
    ];

    /// 转换为存储/传输用的字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Datetime => "datetime",
            FieldType::Enum => "enum",
            FieldType::Boolean => "boolean",
            FieldType::CheckboxGroup => "checkbox-group",
            FieldType::RadioGroup => "radio-group",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Url => "url",
            FieldType::MultilineText => "multiline-text",
            FieldType::File => "file",
            FieldType::SecretText => "secret-text",
            FieldType::Color => "color",
            FieldType::Range => "range",
        }
    }

    /// 从字符串解析字段类型（兼容下划线写法）
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
    }

    /// 中文/英文显示名称（类型清单使用）
    pub fn display_label(&self) -> &'static str {
        match self {
            FieldType::Text => "Text",
            FieldType::Number => "Number",
            FieldType::Date => "Date",
            FieldType::Time => "Time",
            FieldType::Datetime => "Date & Time",
            FieldType::Enum => "Dropdown",
            FieldType::Boolean => "Yes / No",
            FieldType::CheckboxGroup => "Checkbox Group",
            FieldType::RadioGroup => "Radio Group",
            FieldType::Email => "Email",
            FieldType::Phone => "Phone",
            FieldType::Url => "URL",
            FieldType::MultilineText => "Multiline Text",
            FieldType::File => "File Upload",
            FieldType::SecretText => "Password",
            FieldType::Color => "Color",
            FieldType::Range => "Range Slider",
        }
    }

    /// 是否为选项类字段（必须携带 enum_values）
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            FieldType::Enum | FieldType::RadioGroup | FieldType::CheckboxGroup
        )
    }

    /// 是否为数值类字段
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Range)
    }

    /// 是否为文本类字段（支持长度/正则规则）
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            FieldType::Text
                | FieldType::MultilineText
                | FieldType::Email
                | FieldType::Phone
                | FieldType::Url
                | FieldType::SecretText
                | FieldType::Color
        )
    }

    /// 对应的默认控件
    pub fn widget(&self) -> WidgetKind {
        match self {
            FieldType::Text => WidgetKind::TextInput,
            FieldType::Number => WidgetKind::NumberInput,
            FieldType::Date => WidgetKind::DatePicker,
            FieldType::Time => WidgetKind::TimePicker,
            FieldType::Datetime => WidgetKind::DateTimePicker,
            FieldType::Enum => WidgetKind::Select,
            FieldType::Boolean => WidgetKind::Switch,
            FieldType::CheckboxGroup => WidgetKind::CheckboxGroup,
            FieldType::RadioGroup => WidgetKind::RadioGroup,
            FieldType::Email => WidgetKind::EmailInput,
            FieldType::Phone => WidgetKind::PhoneInput,
            FieldType::Url => WidgetKind::UrlInput,
            FieldType::MultilineText => WidgetKind::TextArea,
            FieldType::File => WidgetKind::FileUpload,
            FieldType::SecretText => WidgetKind::PasswordInput,
            FieldType::Color => WidgetKind::ColorPicker,
            FieldType::Range => WidgetKind::Slider,
        }
    }

    /// 未显式指定宽度时的布局宽度
    pub fn default_width(&self) -> FieldWidth {
        match self {
            FieldType::MultilineText | FieldType::CheckboxGroup | FieldType::File => {
                FieldWidth::Full
            }
            _ => FieldWidth::Half,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 依赖运算符 (Dependency Operator)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
}

impl Default for DependencyOperator {
    fn default() -> Self {
        DependencyOperator::Equals
    }
}

impl fmt::Display for DependencyOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyOperator::Equals => write!(f, "equals"),
            DependencyOperator::NotEquals => write!(f, "not_equals"),
            DependencyOperator::Contains => write!(f, "contains"),
            DependencyOperator::NotContains => write!(f, "not_contains"),
            DependencyOperator::GreaterThan => write!(f, "greater_than"),
            DependencyOperator::LessThan => write!(f, "less_than"),
        }
    }
}

// ==========================================
// 布局宽度 (Field Width)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldWidth {
    Full,
    Half,
    Third,
    Quarter,
}

impl FieldWidth {
    /// 12 栅格下占用的列数
    pub fn grid_span(&self) -> u8 {
        match self {
            FieldWidth::Full => 12,
            FieldWidth::Half => 6,
            FieldWidth::Third => 4,
            FieldWidth::Quarter => 3,
        }
    }
}

// ==========================================
// 控件类型 (Widget Kind)
// ==========================================
// 由字段类型派生，渲染方据此选择控件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    TextInput,
    NumberInput,
    DatePicker,
    TimePicker,
    DateTimePicker,
    Select,
    Switch,
    CheckboxGroup,
    RadioGroup,
    EmailInput,
    PhoneInput,
    UrlInput,
    TextArea,
    FileUpload,
    PasswordInput,
    ColorPicker,
    Slider,
}

// ==========================================
// 导入任务状态 (Import Job State)
// ==========================================
// 生命周期: UPLOADED → PREVIEWED → EXECUTED（终态）
//                       PREVIEWED → DISCARDED（终态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportJobState {
    Uploaded,
    Previewed,
    Executed,
    Discarded,
}

impl ImportJobState {
    /// 判断状态转换是否合法
    pub fn can_transition_to(&self, next: ImportJobState) -> bool {
        matches!(
            (self, next),
            (ImportJobState::Uploaded, ImportJobState::Previewed)
                | (ImportJobState::Previewed, ImportJobState::Executed)
                | (ImportJobState::Previewed, ImportJobState::Discarded)
        )
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportJobState::Executed | ImportJobState::Discarded)
    }
}

impl fmt::Display for ImportJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportJobState::Uploaded => write!(f, "UPLOADED"),
            ImportJobState::Previewed => write!(f, "PREVIEWED"),
            ImportJobState::Executed => write!(f, "EXECUTED"),
            ImportJobState::Discarded => write!(f, "DISCARDED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_round_trip_str() {
        for t in FieldType::ALL {
            assert_eq!(FieldType::parse(t.as_str()), Some(t));
        }
        assert_eq!(FieldType::parse("checkbox_group"), Some(FieldType::CheckboxGroup));
        assert_eq!(FieldType::parse("unknown"), None);
    }

    #[test]
    fn test_field_type_serde_kebab_case() {
        let json = serde_json::to_string(&FieldType::MultilineText).unwrap();
        assert_eq!(json, "\"multiline-text\"");
    }

    #[test]
    fn test_choice_types() {
        assert!(FieldType::Enum.is_choice());
        assert!(FieldType::RadioGroup.is_choice());
        assert!(FieldType::CheckboxGroup.is_choice());
        assert!(!FieldType::Text.is_choice());
    }

    #[test]
    fn test_import_job_state_transitions() {
        assert!(ImportJobState::Uploaded.can_transition_to(ImportJobState::Previewed));
        assert!(ImportJobState::Previewed.can_transition_to(ImportJobState::Executed));
        assert!(ImportJobState::Previewed.can_transition_to(ImportJobState::Discarded));
        assert!(!ImportJobState::Executed.can_transition_to(ImportJobState::Previewed));
        assert!(!ImportJobState::Uploaded.can_transition_to(ImportJobState::Executed));
        assert!(ImportJobState::Discarded.is_terminal());
    }
}
