// ==========================================
// 运单动态字段系统 - 动态表单装配器
// ==========================================
// 职责: 字段定义 + 当前值 → 渲染指令（分组 + 未分组）
// 规则: 有效可见 = visible AND 依赖激活；有效必填 = required AND 有效可见
// 红线: 依赖求值必须与校验器使用同一实现
// ==========================================

use crate::domain::field::FieldDefinition;
use crate::domain::types::{FieldType, FieldWidth, WidgetKind};
use crate::engine::dependency::DependencyEvaluator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ==========================================
// RenderDirective - 单字段渲染指令
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderDirective {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub widget: WidgetKind,
    pub visible: bool,
    pub required: bool,
    pub readonly: bool,
    pub width: FieldWidth,
    /// 栅格跨度（12 栅格）
    pub span: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub options: Vec<String>,
    pub value: Value,
    /// 值变化时需要重新求值的字段
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dependency_keys: Vec<String>,
}

/// 表单分组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSection {
    pub name: String,
    pub fields: Vec<RenderDirective>,
}

// ==========================================
// FormPlan - 表单装配结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPlan {
    pub sections: Vec<FormSection>,
    pub ungrouped: Vec<RenderDirective>,
}

impl FormPlan {
    /// 按渲染顺序遍历（先分组，后未分组）
    pub fn directives(&self) -> impl Iterator<Item = &RenderDirective> {
        self.sections
            .iter()
            .flat_map(|s| s.fields.iter())
            .chain(self.ungrouped.iter())
    }

    pub fn get(&self, key: &str) -> Option<&RenderDirective> {
        self.directives().find(|d| d.key == key)
    }

    /// 当前可见的字段数
    pub fn visible_count(&self) -> usize {
        self.directives().filter(|d| d.visible).count()
    }
}

// ==========================================
// FormAssembler - 表单装配器
// ==========================================
pub struct FormAssembler;

impl FormAssembler {
    /// 装配表单
    ///
    /// # 参数
    /// - schema: 字段定义（调用方负责排序，通常来自 list()）
    /// - values: 当前记录值
    pub fn assemble(schema: &[FieldDefinition], values: &Map<String, Value>) -> FormPlan {
        let mut plan = FormPlan::default();

        for definition in schema {
            let directive = Self::directive_for(definition, values);
            match definition.group_name() {
                Some(group) => match plan.sections.iter_mut().find(|s| s.name == group) {
                    Some(section) => section.fields.push(directive),
                    None => plan.sections.push(FormSection {
                        name: group.to_string(),
                        fields: vec![directive],
                    }),
                },
                None => plan.ungrouped.push(directive),
            }
        }

        plan
    }

    /// 单字段渲染指令
    pub fn directive_for(definition: &FieldDefinition, values: &Map<String, Value>) -> RenderDirective {
        let visible = definition.visible && DependencyEvaluator::is_active(definition, values);
        let width = definition.resolved_width();

        let value = values
            .get(&definition.key)
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| definition.default_value.clone())
            .unwrap_or(Value::Null);

        let mut dependency_keys: Vec<String> = Vec::new();
        for clause in &definition.dependencies {
            if !dependency_keys.contains(&clause.field_key) {
                dependency_keys.push(clause.field_key.clone());
            }
        }

        RenderDirective {
            key: definition.key.clone(),
            label: definition.label.clone(),
            field_type: definition.field_type(),
            widget: definition.kind.widget(),
            visible,
            required: definition.required && visible,
            readonly: definition.readonly,
            width,
            span: width.grid_span(),
            group: definition.group_name().map(str::to_string),
            placeholder: definition.placeholder.clone(),
            help_text: definition.help_text.clone(),
            options: definition.kind.enum_values().map(<[String]>::to_vec).unwrap_or_default(),
            value,
            dependency_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::{DependencyClause, FieldKind};
    use crate::domain::types::DependencyOperator;
    use serde_json::json;

    fn ctx(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn schema() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("awbNumber", "AWB Number", FieldKind::plain(FieldType::Text))
                .required()
                .with_group("Shipment"),
            FieldDefinition::new("remarks", "Remarks", FieldKind::plain(FieldType::MultilineText)),
            FieldDefinition::new(
                "shipmentStatus",
                "Status",
                FieldKind::choice(FieldType::Enum, &["Booked", "InTransit", "Delivered"]),
            )
            .with_group("Shipment")
            .with_default(json!("Booked")),
            FieldDefinition::new("deliveryDate", "Delivery Date", FieldKind::plain(FieldType::Date))
                .required()
                .with_group("Delivery")
                .with_width(FieldWidth::Third)
                .with_dependency(DependencyClause::new(
                    "shipmentStatus",
                    DependencyOperator::Equals,
                    json!("Delivered"),
                )),
            FieldDefinition::new("internalNote", "Internal", FieldKind::plain(FieldType::Text)).hidden(),
        ]
    }

    #[test]
    fn test_sections_keep_first_seen_order() {
        let plan = FormAssembler::assemble(&schema(), &Map::new());

        let names: Vec<&str> = plan.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Shipment", "Delivery"]);
        let shipment: Vec<&str> = plan.sections[0].fields.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(shipment, vec!["awbNumber", "shipmentStatus"]);
        let ungrouped: Vec<&str> = plan.ungrouped.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(ungrouped, vec!["remarks", "internalNote"]);

        let order: Vec<&str> = plan.directives().map(|d| d.key.as_str()).collect();
        assert_eq!(
            order,
            vec!["awbNumber", "shipmentStatus", "deliveryDate", "remarks", "internalNote"]
        );
    }

    #[test]
    fn test_effective_visibility_and_required() {
        let plan = FormAssembler::assemble(&schema(), &ctx(json!({ "shipmentStatus": "InTransit" })));
        let delivery = plan.get("deliveryDate").unwrap();
        assert!(!delivery.visible);
        assert!(!delivery.required);
        assert_eq!(delivery.dependency_keys, vec!["shipmentStatus".to_string()]);

        let plan = FormAssembler::assemble(&schema(), &ctx(json!({ "shipmentStatus": "Delivered" })));
        let delivery = plan.get("deliveryDate").unwrap();
        assert!(delivery.visible);
        assert!(delivery.required);

        assert!(!plan.get("internalNote").unwrap().visible);
    }

    #[test]
    fn test_visibility_matches_evaluator_for_every_field() {
        let values = ctx(json!({ "shipmentStatus": "Delivered" }));
        let defs = schema();
        let plan = FormAssembler::assemble(&defs, &values);
        for def in &defs {
            let expected = def.visible && DependencyEvaluator::is_active(def, &values);
            assert_eq!(plan.get(&def.key).unwrap().visible, expected, "{}", def.key);
        }
    }

    #[test]
    fn test_width_defaults_and_values() {
        let plan = FormAssembler::assemble(&schema(), &ctx(json!({ "awbNumber": "AWB001" })));

        let remarks = plan.get("remarks").unwrap();
        assert_eq!(remarks.width, FieldWidth::Full);
        assert_eq!(remarks.widget, WidgetKind::TextArea);
        assert_eq!(plan.get("awbNumber").unwrap().width, FieldWidth::Half);
        assert_eq!(plan.get("deliveryDate").unwrap().width, FieldWidth::Third);

        assert_eq!(plan.get("awbNumber").unwrap().value, json!("AWB001"));
        let status = plan.get("shipmentStatus").unwrap();
        assert_eq!(status.value, json!("Booked"));
        assert_eq!(status.options.len(), 3);
    }

    #[test]
    fn test_empty_schema() {
        let plan = FormAssembler::assemble(&[], &Map::new());
        assert_eq!(plan.visible_count(), 0);
        assert!(plan.sections.is_empty());
    }
}
