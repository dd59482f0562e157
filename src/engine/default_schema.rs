// ==========================================
// 运单动态字段系统 - 默认字段集
// ==========================================
// 职责: 空库初始化时写入的运单字段定义
// 说明: key 与 ShipmentRecord 核心属性一一对应（podFile/remarks 进入扩展侧表）
// ==========================================

use crate::domain::field::{DependencyClause, FieldDefinition, FieldKind, ValidationRule};
use crate::domain::shipment::core_keys;
use crate::domain::types::{DependencyOperator, FieldType, FieldWidth};
use serde_json::json;

pub const GROUP_SHIPMENT: &str = "Shipment Details";
pub const GROUP_CUSTOMER: &str = "Customer";
pub const GROUP_PRICING: &str = "Pricing";
pub const GROUP_DELIVERY: &str = "Delivery";

pub const SHIPMENT_STATUSES: [&str; 6] = [
    "Booked",
    "Picked Up",
    "InTransit",
    "Out For Delivery",
    "Delivered",
    "Returned",
];

pub const COURIER_PARTNERS: [&str; 5] = ["BlueDart", "Delhivery", "DTDC", "Ecom Express", "India Post"];

fn rule(f: impl FnOnce(&mut ValidationRule)) -> ValidationRule {
    let mut r = ValidationRule::default();
    f(&mut r);
    r
}

fn money(key: &str, label: &str) -> FieldDefinition {
    FieldDefinition::new(
        key,
        label,
        FieldKind::from_parts(
            FieldType::Number,
            &rule(|r| {
                r.min = Some(0.0);
                r.step = Some(0.01);
            }),
            Vec::new(),
        ),
    )
    .with_group(GROUP_PRICING)
    .with_width(FieldWidth::Third)
    .with_default(json!(0))
}

/// 默认字段集（order 从 1 连续递增）
pub fn default_shipment_fields() -> Vec<FieldDefinition> {
    let fields = vec![
        FieldDefinition::new(
            core_keys::AWB_NUMBER,
            "AWB Number",
            FieldKind::from_parts(
                FieldType::Text,
                &rule(|r| {
                    r.min_length = Some(4);
                    r.max_length = Some(32);
                }),
                Vec::new(),
            ),
        )
        .required()
        .with_group(GROUP_SHIPMENT)
        .with_placeholder("e.g. 1234567890"),
        FieldDefinition::new(core_keys::CUSTOMER_NAME, "Customer Name", FieldKind::plain(FieldType::Text))
            .required()
            .with_group(GROUP_CUSTOMER),
        FieldDefinition::new(
            core_keys::CUSTOMER_MOBILE,
            "Customer Mobile",
            FieldKind::plain(FieldType::Phone),
        )
        .required()
        .with_group(GROUP_CUSTOMER),
        FieldDefinition::new(
            core_keys::CUSTOMER_EMAIL,
            "Customer Email",
            FieldKind::plain(FieldType::Email),
        )
        .with_group(GROUP_CUSTOMER),
        FieldDefinition::new(
            core_keys::DESTINATION_ADDRESS,
            "Destination Address",
            FieldKind::plain(FieldType::MultilineText),
        )
        .required()
        .with_group(GROUP_CUSTOMER),
        FieldDefinition::new(
            core_keys::PIN_CODE,
            "Pin Code",
            FieldKind::from_parts(
                FieldType::Text,
                &rule(|r| {
                    r.pattern = Some(r"^\d{6}$".to_string());
                    r.message = Some("Pin Code must be exactly 6 digits".to_string());
                }),
                Vec::new(),
            ),
        )
        .required()
        .with_group(GROUP_CUSTOMER)
        .with_width(FieldWidth::Quarter),
        FieldDefinition::new(
            core_keys::COURIER_PARTNER,
            "Courier Partner",
            FieldKind::choice(FieldType::Enum, &COURIER_PARTNERS),
        )
        .with_group(GROUP_SHIPMENT),
        FieldDefinition::new(
            core_keys::SHIPMENT_STATUS,
            "Shipment Status",
            FieldKind::choice(FieldType::Enum, &SHIPMENT_STATUSES),
        )
        .with_group(GROUP_SHIPMENT)
        .with_default(json!("Booked")),
        FieldDefinition::new(core_keys::SHIPMENT_DATE, "Shipment Date", FieldKind::plain(FieldType::Date))
            .with_group(GROUP_SHIPMENT),
        FieldDefinition::new(
            core_keys::WEIGHT,
            "Weight (kg)",
            FieldKind::from_parts(
                FieldType::Number,
                &rule(|r| {
                    r.min = Some(0.01);
                    r.step = Some(0.01);
                }),
                Vec::new(),
            ),
        )
        .required()
        .with_group(GROUP_SHIPMENT)
        .with_width(FieldWidth::Quarter),
        money(core_keys::BASE_AMOUNT, "Base Amount"),
        money(core_keys::MARGIN_AMOUNT, "Margin Amount"),
        money(core_keys::TAX_AMOUNT, "Tax Amount"),
        FieldDefinition::new("deliveryDate", "Delivery Date", FieldKind::plain(FieldType::Date))
            .required()
            .with_group(GROUP_DELIVERY)
            .with_dependency(DependencyClause::new(
                core_keys::SHIPMENT_STATUS,
                DependencyOperator::Equals,
                json!("Delivered"),
            )),
        FieldDefinition::new("remarks", "Remarks", FieldKind::plain(FieldType::MultilineText))
            .with_group(GROUP_DELIVERY),
        FieldDefinition::new(
            "podFile",
            "Proof of Delivery",
            FieldKind::from_parts(
                FieldType::File,
                &rule(|r| r.accept = Some("image/*,application/pdf".to_string())),
                Vec::new(),
            ),
        )
        .with_group(GROUP_DELIVERY),
    ];

    fields
        .into_iter()
        .enumerate()
        .map(|(i, def)| def.with_order(i as i64 + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid_and_ordered() {
        let fields = default_shipment_fields();
        assert_eq!(fields.len(), 16);
        for (i, def) in fields.iter().enumerate() {
            def.check_invariants().unwrap();
            assert_eq!(def.order, Some(i as i64 + 1));
        }
    }

    #[test]
    fn test_weight_has_positive_minimum() {
        let weight = default_shipment_fields()
            .into_iter()
            .find(|d| d.key == core_keys::WEIGHT)
            .unwrap();
        assert_eq!(weight.kind.numeric_rules().unwrap().min, Some(0.01));
    }
}
