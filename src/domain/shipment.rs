// ==========================================
// 运单动态字段系统 - 运单领域模型
// ==========================================
// 职责: 运单固定核心属性 + 扩展字段侧表 + 金额派生
// 红线: 派生金额不独立存储，每次写入前重新计算
// 红线: 扩展字段侧表不得覆盖核心属性
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

// ==========================================
// 核心属性对应的字段 key
// ==========================================
pub mod core_keys {
    pub const AWB_NUMBER: &str = "awbNumber";
    pub const CUSTOMER_NAME: &str = "customerName";
    pub const CUSTOMER_MOBILE: &str = "customerMobile";
    pub const CUSTOMER_EMAIL: &str = "customerEmail";
    pub const DESTINATION_ADDRESS: &str = "destinationAddress";
    pub const PIN_CODE: &str = "pinCode";
    pub const COURIER_PARTNER: &str = "courierPartner";
    pub const SHIPMENT_STATUS: &str = "shipmentStatus";
    pub const SHIPMENT_DATE: &str = "shipmentDate";
    pub const WEIGHT: &str = "weight";
    pub const BASE_AMOUNT: &str = "baseAmount";
    pub const MARGIN_AMOUNT: &str = "marginAmount";
    pub const TAX_AMOUNT: &str = "taxAmount";

    // 派生金额（只读，写入时忽略）
    pub const PRE_TAX_TOTAL: &str = "preTaxTotal";
    pub const POST_TAX_TOTAL: &str = "postTaxTotal";
    pub const GRAND_TOTAL: &str = "grandTotal";

    /// 所有核心属性 key（含派生金额）
    pub const ALL: [&str; 16] = [
        AWB_NUMBER,
        CUSTOMER_NAME,
        CUSTOMER_MOBILE,
        CUSTOMER_EMAIL,
        DESTINATION_ADDRESS,
        PIN_CODE,
        COURIER_PARTNER,
        SHIPMENT_STATUS,
        SHIPMENT_DATE,
        WEIGHT,
        BASE_AMOUNT,
        MARGIN_AMOUNT,
        TAX_AMOUNT,
        PRE_TAX_TOTAL,
        POST_TAX_TOTAL,
        GRAND_TOTAL,
    ];

    pub fn is_core(key: &str) -> bool {
        ALL.contains(&key)
    }
}

// ==========================================
// ShipmentRecord - 运单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRecord {
    // ===== 主键 =====
    pub id: String,

    // ===== 核心属性 =====
    pub awb_number: Option<String>, // 运单号（唯一）
    pub customer_name: Option<String>,
    pub customer_mobile: Option<String>,
    pub customer_email: Option<String>,
    pub destination_address: Option<String>,
    pub pin_code: Option<String>,
    pub courier_partner: Option<String>,
    pub shipment_status: Option<String>,
    pub shipment_date: Option<NaiveDate>,
    pub weight: Option<f64>, // 重量（kg）

    // ===== 金额（输入） =====
    pub base_amount: f64,
    pub margin_amount: f64,
    pub tax_amount: f64,

    // ===== 金额（派生） =====
    pub pre_tax_total: f64,  // base + margin
    pub post_tax_total: f64, // pre_tax + tax
    pub grand_total: f64,    // = post_tax

    // ===== 扩展字段侧表 =====
    #[serde(default)]
    pub extra_fields: BTreeMap<String, Value>,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShipmentRecord {
    /// 创建空运单
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            awb_number: None,
            customer_name: None,
            customer_mobile: None,
            customer_email: None,
            destination_address: None,
            pin_code: None,
            courier_partner: None,
            shipment_status: None,
            shipment_date: None,
            weight: None,
            base_amount: 0.0,
            margin_amount: 0.0,
            tax_amount: 0.0,
            pre_tax_total: 0.0,
            post_tax_total: 0.0,
            grand_total: 0.0,
            extra_fields: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 由字段值映射构造运单（已校验/已强转的值）
    pub fn from_values(values: &Map<String, Value>) -> Self {
        let mut record = Self::new();
        record.apply_values(values);
        record
    }

    /// 将字段值写入运单
    ///
    /// 说明:
    /// - 核心 key 写入对应属性；派生金额 key 被忽略
    /// - 其余 key 进入扩展字段侧表（null 表示移除）
    pub fn apply_values(&mut self, values: &Map<String, Value>) {
        for (key, value) in values {
            match key.as_str() {
                core_keys::AWB_NUMBER => self.awb_number = value_to_string(value),
                core_keys::CUSTOMER_NAME => self.customer_name = value_to_string(value),
                core_keys::CUSTOMER_MOBILE => self.customer_mobile = value_to_string(value),
                core_keys::CUSTOMER_EMAIL => self.customer_email = value_to_string(value),
                core_keys::DESTINATION_ADDRESS => {
                    self.destination_address = value_to_string(value)
                }
                core_keys::PIN_CODE => self.pin_code = value_to_string(value),
                core_keys::COURIER_PARTNER => self.courier_partner = value_to_string(value),
                core_keys::SHIPMENT_STATUS => self.shipment_status = value_to_string(value),
                core_keys::SHIPMENT_DATE => {
                    self.shipment_date = value_to_string(value)
                        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
                }
                core_keys::WEIGHT => self.weight = value.as_f64(),
                core_keys::BASE_AMOUNT => self.base_amount = value.as_f64().unwrap_or(0.0),
                core_keys::MARGIN_AMOUNT => self.margin_amount = value.as_f64().unwrap_or(0.0),
                core_keys::TAX_AMOUNT => self.tax_amount = value.as_f64().unwrap_or(0.0),
                core_keys::PRE_TAX_TOTAL | core_keys::POST_TAX_TOTAL | core_keys::GRAND_TOTAL => {
                    tracing::debug!(key = %key, "忽略派生金额字段的写入");
                }
                _ => {
                    if value.is_null() {
                        self.extra_fields.remove(key);
                    } else {
                        self.extra_fields.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        self.recompute_totals();
    }

    /// 由金额输入计算派生金额 (税前合计, 税后合计, 总计)
    pub fn derived_totals(&self) -> (f64, f64, f64) {
        let pre_tax = round2(self.base_amount + self.margin_amount);
        let post_tax = round2(pre_tax + self.tax_amount);
        (pre_tax, post_tax, post_tax)
    }

    /// 重新计算派生金额
    pub fn recompute_totals(&mut self) {
        (self.pre_tax_total, self.post_tax_total, self.grand_total) = self.derived_totals();
    }

    /// 以字段 key → 值 的形式导出（用于表单装配/依赖求值）
    pub fn to_values(&self) -> Map<String, Value> {
        let mut map = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(v) = value {
                map.insert(key.to_string(), v);
            }
        };

        put(core_keys::AWB_NUMBER, self.awb_number.clone().map(Value::String));
        put(core_keys::CUSTOMER_NAME, self.customer_name.clone().map(Value::String));
        put(core_keys::CUSTOMER_MOBILE, self.customer_mobile.clone().map(Value::String));
        put(core_keys::CUSTOMER_EMAIL, self.customer_email.clone().map(Value::String));
        put(
            core_keys::DESTINATION_ADDRESS,
            self.destination_address.clone().map(Value::String),
        );
        put(core_keys::PIN_CODE, self.pin_code.clone().map(Value::String));
        put(core_keys::COURIER_PARTNER, self.courier_partner.clone().map(Value::String));
        put(core_keys::SHIPMENT_STATUS, self.shipment_status.clone().map(Value::String));
        put(
            core_keys::SHIPMENT_DATE,
            self.shipment_date.map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        );
        put(core_keys::WEIGHT, self.weight.map(Value::from));
        put(core_keys::BASE_AMOUNT, Some(Value::from(self.base_amount)));
        put(core_keys::MARGIN_AMOUNT, Some(Value::from(self.margin_amount)));
        put(core_keys::TAX_AMOUNT, Some(Value::from(self.tax_amount)));
        put(core_keys::PRE_TAX_TOTAL, Some(Value::from(self.pre_tax_total)));
        put(core_keys::POST_TAX_TOTAL, Some(Value::from(self.post_tax_total)));
        put(core_keys::GRAND_TOTAL, Some(Value::from(self.grand_total)));

        for (key, value) in &self.extra_fields {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
        map
    }
}

impl Default for ShipmentRecord {
    fn default() -> Self {
        Self::new()
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        other => Some(other.to_string()),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_totals_derived_from_inputs() {
        let record = ShipmentRecord::from_values(&values(json!({
            "baseAmount": 100.0,
            "marginAmount": 20.5,
            "taxAmount": 21.69
        })));

        assert_eq!(record.pre_tax_total, 120.5);
        assert_eq!(record.post_tax_total, 142.19);
        assert_eq!(record.grand_total, 142.19);
    }

    #[test]
    fn test_derived_totals_not_writable() {
        let record = ShipmentRecord::from_values(&values(json!({
            "baseAmount": 10,
            "grandTotal": 9999
        })));
        assert_eq!(record.grand_total, 10.0);
        assert!(!record.extra_fields.contains_key("grandTotal"));
    }

    #[test]
    fn test_extension_fields_do_not_shadow_core() {
        let record = ShipmentRecord::from_values(&values(json!({
            "awbNumber": "AWB001",
            "insuranceOpted": true
        })));

        assert_eq!(record.awb_number.as_deref(), Some("AWB001"));
        assert_eq!(record.extra_fields.get("insuranceOpted"), Some(&json!(true)));
        assert!(!record.extra_fields.contains_key("awbNumber"));
    }

    #[test]
    fn test_update_recomputes_totals() {
        let mut record = ShipmentRecord::from_values(&values(json!({ "baseAmount": 50 })));
        record.apply_values(&values(json!({ "taxAmount": 9 })));
        assert_eq!(record.grand_total, 59.0);
    }

    #[test]
    fn test_to_values_contains_core_and_extra() {
        let record = ShipmentRecord::from_values(&values(json!({
            "shipmentStatus": "Delivered",
            "shipmentDate": "2025-01-20",
            "fragile": "yes"
        })));
        let map = record.to_values();
        assert_eq!(map["shipmentStatus"], json!("Delivered"));
        assert_eq!(map["shipmentDate"], json!("2025-01-20"));
        assert_eq!(map["fragile"], json!("yes"));
    }
}
