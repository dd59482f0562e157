// ==========================================
// 运单动态字段系统 - 字段映射器实现
// ==========================================
// 职责: 表头 → 字段 key 建议映射 + 单元格宽松强转
// 规则: 表头归一化（小写、去标点空白）后做子串匹配，长片段优先
// 红线: 宽松强转只用于导入；交互写入走严格校验
// ==========================================

use crate::domain::field::FieldDefinition;
use crate::domain::import_job::{AvailableField, ColumnMapping, MappingTarget};
use crate::domain::types::FieldType;
use crate::engine::validator::{parse_bool, parse_date, parse_datetime, split_list, DATETIME_FORMAT, DATE_FORMAT};
use crate::importer::importer_trait::FieldMapper;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::Value;

// ==========================================
// 表头片段 → 字段 key
// ==========================================
// 匹配时先试具体片段，再试泛称片段；同一层内按长度降序，同长度保持表内顺序
const HEADER_FRAGMENTS: &[(&str, &str)] = &[
    ("awbnumber", "awbNumber"),
    ("airwaybill", "awbNumber"),
    ("trackingnumber", "awbNumber"),
    ("trackingno", "awbNumber"),
    ("awbno", "awbNumber"),
    ("awb", "awbNumber"),
    ("customermobile", "customerMobile"),
    ("customerphone", "customerMobile"),
    ("mobile", "customerMobile"),
    ("phone", "customerMobile"),
    ("contact", "customerMobile"),
    ("customeremail", "customerEmail"),
    ("email", "customerEmail"),
    ("customername", "customerName"),
    ("consignee", "customerName"),
    ("customer", "customerName"),
    ("name", "customerName"),
    ("destinationaddress", "destinationAddress"),
    ("deliveryaddress", "destinationAddress"),
    ("address", "destinationAddress"),
    ("pincode", "pinCode"),
    ("postalcode", "pinCode"),
    ("zipcode", "pinCode"),
    ("pin", "pinCode"),
    ("zip", "pinCode"),
    ("courierpartner", "courierPartner"),
    ("courier", "courierPartner"),
    ("carrier", "courierPartner"),
    ("shipmentstatus", "shipmentStatus"),
    ("status", "shipmentStatus"),
    ("deliverydate", "deliveryDate"),
    ("deliveredon", "deliveryDate"),
    ("shipmentdate", "shipmentDate"),
    ("shippingdate", "shipmentDate"),
    ("bookingdate", "shipmentDate"),
    ("shipdate", "shipmentDate"),
    ("date", "shipmentDate"),
    ("weight", "weight"),
    ("baseamount", "baseAmount"),
    ("basefreight", "baseAmount"),
    ("freight", "baseAmount"),
    ("marginamount", "marginAmount"),
    ("margin", "marginAmount"),
    ("taxamount", "taxAmount"),
    ("gst", "taxAmount"),
    ("tax", "taxAmount"),
    ("remarks", "remarks"),
    ("remark", "remarks"),
    ("notes", "remarks"),
    ("comment", "remarks"),
];

/// 泛称片段: "Customer Address"/"Consignee Phone" 之类的表头应命中更具体的片段
const GENERIC_FRAGMENTS: &[&str] = &["customer", "consignee", "name"];

/// 表头归一化: 小写 + 仅保留字母数字
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

// ==========================================
// FragmentFieldMapper - 基于片段表的映射器
// ==========================================
pub struct FragmentFieldMapper;

impl FragmentFieldMapper {
    /// 单个表头的建议目标
    ///
    /// 1. 归一化后与字段 key/label 完全相同
    /// 2. 片段表子串匹配（目标必须在可映射字段中）
    pub fn suggest_for_header(&self, header: &str, available: &[AvailableField]) -> MappingTarget {
        let normalized = normalize_header(header);
        if normalized.is_empty() {
            return MappingTarget::Skip;
        }

        if let Some(field) = available.iter().find(|f| {
            normalize_header(&f.key) == normalized || normalize_header(&f.label) == normalized
        }) {
            return MappingTarget::Field(field.key.clone());
        }

        let mut fragments: Vec<&(&str, &str)> = HEADER_FRAGMENTS.iter().collect();
        fragments.sort_by_key(|(fragment, _)| {
            (GENERIC_FRAGMENTS.contains(fragment), std::cmp::Reverse(fragment.len()))
        });

        fragments
            .into_iter()
            .filter(|(fragment, _)| normalized.contains(fragment))
            .find(|(_, key)| available.iter().any(|f| f.key == *key))
            .map(|(_, key)| MappingTarget::Field(key.to_string()))
            .unwrap_or(MappingTarget::Skip)
    }
}

impl FieldMapper for FragmentFieldMapper {
    fn suggest_mapping(&self, headers: &[String], available: &[AvailableField]) -> ColumnMapping {
        headers
            .iter()
            .map(|h| (h.clone(), self.suggest_for_header(h, available)))
            .collect()
    }

    fn coerce_cell(&self, definition: &FieldDefinition, raw: &str) -> Value {
        let trimmed = raw.trim();
        match definition.field_type() {
            FieldType::Number | FieldType::Range => Value::from(lenient_number(trimmed).unwrap_or(0.0)),
            FieldType::Boolean => Value::Bool(parse_bool(trimmed).unwrap_or(false)),
            FieldType::CheckboxGroup => {
                Value::Array(split_list(trimmed).into_iter().map(Value::String).collect())
            }
            FieldType::Date => parse_date(trimmed)
                .or_else(|| serial_from_text(trimmed).map(|dt| dt.date()))
                .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
                .unwrap_or_else(|| Value::String(trimmed.to_string())),
            FieldType::Datetime => parse_datetime(trimmed)
                .or_else(|| serial_from_text(trimmed))
                .map(|dt| Value::String(dt.format(DATETIME_FORMAT).to_string()))
                .unwrap_or_else(|| Value::String(trimmed.to_string())),
            _ => Value::String(trimmed.to_string()),
        }
    }
}

/// 宽松数值解析: 去除货币符号/千分位/空白（"₹ 1,234.50" → 1234.5）
pub fn lenient_number(raw: &str) -> Option<f64> {
    let chars: Vec<char> = raw.chars().collect();
    let start = chars.iter().enumerate().position(|(i, c)| {
        c.is_ascii_digit()
            || ((*c == '-' || *c == '.') && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()))
    })?;

    let mut cleaned = String::new();
    for (i, c) in chars[start..].iter().enumerate() {
        match c {
            '0'..='9' | '.' => cleaned.push(*c),
            '-' if i == 0 => cleaned.push('-'),
            ',' | '_' | ' ' | '\u{a0}' | '\'' => {}
            _ => break,
        }
    }

    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Excel 序列日期 → 日期时间（1900 日期系统，基准 1899-12-30）
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    base.checked_add_signed(Duration::seconds(seconds))
}

fn serial_from_text(raw: &str) -> Option<NaiveDateTime> {
    raw.parse::<f64>().ok().and_then(excel_serial_to_datetime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::FieldKind;
    use crate::engine::default_schema::default_shipment_fields;
    use serde_json::json;

    fn available() -> Vec<AvailableField> {
        default_shipment_fields()
            .into_iter()
            .filter(|d| d.field_type() != FieldType::File)
            .map(|d| AvailableField {
                field_type: d.field_type(),
                required: d.required,
                key: d.key,
                label: d.label,
            })
            .collect()
    }

    fn suggest(header: &str) -> MappingTarget {
        FragmentFieldMapper.suggest_for_header(header, &available())
    }

    #[test]
    fn test_customer_mobile_no_scenario() {
        assert_eq!(suggest("Customer Mobile No"), MappingTarget::Field("customerMobile".into()));
    }

    #[test]
    fn test_longer_fragments_win() {
        assert_eq!(suggest("Customer Name"), MappingTarget::Field("customerName".into()));
        assert_eq!(suggest("Customer E-mail"), MappingTarget::Field("customerEmail".into()));
        assert_eq!(suggest("Shipping Date"), MappingTarget::Field("shipmentDate".into()));
        assert_eq!(suggest("Delivery Date"), MappingTarget::Field("deliveryDate".into()));
        assert_eq!(suggest("AWB No."), MappingTarget::Field("awbNumber".into()));
        assert_eq!(suggest("PIN"), MappingTarget::Field("pinCode".into()));
        assert_eq!(suggest("GST"), MappingTarget::Field("taxAmount".into()));
    }

    #[test]
    fn test_specific_fragments_beat_generic_person_fragments() {
        assert_eq!(suggest("Customer Address"), MappingTarget::Field("destinationAddress".into()));
        assert_eq!(suggest("Customer Pincode"), MappingTarget::Field("pinCode".into()));
        assert_eq!(suggest("Consignee Phone"), MappingTarget::Field("customerMobile".into()));
        assert_eq!(suggest("Consignee Name"), MappingTarget::Field("customerName".into()));
        assert_eq!(suggest("Customer"), MappingTarget::Field("customerName".into()));
    }

    #[test]
    fn test_unmatched_and_unavailable_targets_skip() {
        assert_eq!(suggest("Random Column"), MappingTarget::Skip);
        assert_eq!(suggest("   "), MappingTarget::Skip);

        let only_awb: Vec<AvailableField> = available().into_iter().filter(|f| f.key == "awbNumber").collect();
        assert_eq!(
            FragmentFieldMapper.suggest_for_header("Weight", &only_awb),
            MappingTarget::Skip
        );
    }

    #[test]
    fn test_exact_key_or_label_match_for_custom_fields() {
        let mut fields = available();
        fields.push(AvailableField {
            key: "insuranceValue".into(),
            label: "Insurance Value".into(),
            field_type: FieldType::Number,
            required: false,
        });
        assert_eq!(
            FragmentFieldMapper.suggest_for_header("insurance value", &fields),
            MappingTarget::Field("insuranceValue".into())
        );
    }

    #[test]
    fn test_lenient_number() {
        assert_eq!(lenient_number("₹ 1,234.50"), Some(1234.5));
        assert_eq!(lenient_number("Rs. 100"), Some(100.0));
        assert_eq!(lenient_number("$-12"), Some(-12.0));
        assert_eq!(lenient_number("2.5 kg"), Some(2.5));
        assert_eq!(lenient_number("abc"), None);
    }

    #[test]
    fn test_coerce_cell_lenient() {
        let number = FieldDefinition::new("marginAmount", "Margin", FieldKind::plain(FieldType::Number));
        assert_eq!(FragmentFieldMapper.coerce_cell(&number, "abc"), json!(0.0));
        assert_eq!(FragmentFieldMapper.coerce_cell(&number, "1,000"), json!(1000.0));

        let boolean = FieldDefinition::new("cod", "COD", FieldKind::plain(FieldType::Boolean));
        assert_eq!(FragmentFieldMapper.coerce_cell(&boolean, "maybe"), json!(false));
        assert_eq!(FragmentFieldMapper.coerce_cell(&boolean, "Y"), json!(true));

        let checkbox = FieldDefinition::new(
            "services",
            "Services",
            FieldKind::choice(FieldType::CheckboxGroup, &["COD", "Insurance"]),
        );
        assert_eq!(FragmentFieldMapper.coerce_cell(&checkbox, "COD; Insurance"), json!(["COD", "Insurance"]));

        let date = FieldDefinition::new("shipmentDate", "Date", FieldKind::plain(FieldType::Date));
        assert_eq!(FragmentFieldMapper.coerce_cell(&date, "15/01/2025"), json!("2025-01-15"));
        assert_eq!(FragmentFieldMapper.coerce_cell(&date, "45672"), json!("2025-01-15"));
        assert_eq!(FragmentFieldMapper.coerce_cell(&date, "soon"), json!("soon"));
    }

    #[test]
    fn test_excel_serial() {
        let dt = excel_serial_to_datetime(45672.5).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2025-01-15 12:00");
        assert!(excel_serial_to_datetime(0.0).is_none());
    }
}
