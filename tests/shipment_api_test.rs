// ==========================================
// 运单 API 集成测试
// ==========================================
// 覆盖: 交互式创建/更新（严格校验）、唯一约束、分页

use serde_json::{json, Map, Value};
use shipment_schema::api::ApiError;
use shipment_schema::app::commands;
use shipment_schema::domain::validation::ValidationErrorKind;

use test_helpers::create_test_state;

fn valid_shipment(awb: &str) -> Map<String, Value> {
    let mut values = Map::new();
    values.insert("awbNumber".into(), json!(awb));
    values.insert("customerName".into(), json!("Asha Rao"));
    values.insert("customerMobile".into(), json!("9876543210"));
    values.insert("destinationAddress".into(), json!("12 MG Road, Bengaluru"));
    values.insert("pinCode".into(), json!("560001"));
    values.insert("weight".into(), json!("1.5"));
    values.insert("baseAmount".into(), json!(100));
    values.insert("marginAmount".into(), json!(20));
    values.insert("taxAmount".into(), json!(21.6));
    values.insert("shipmentStatus".into(), json!("booked"));
    values
}

#[test]
fn test_create_coerces_and_derives_totals() {
    let (_db, _staging, state) = create_test_state(true).unwrap();

    let created = state.shipment_api.create_shipment(&valid_shipment("AWB5001")).unwrap();

    assert_eq!(created.weight, Some(1.5));
    // 选项值大小写不敏感匹配后归一为定义中的写法
    assert_eq!(created.shipment_status.as_deref(), Some("Booked"));
    assert_eq!(created.pre_tax_total, 120.0);
    assert_eq!(created.post_tax_total, 141.6);
    assert_eq!(created.grand_total, 141.6);

    let fetched = state.shipment_api.get_shipment(&created.id).unwrap();
    assert_eq!(fetched.awb_number.as_deref(), Some("AWB5001"));
    assert_eq!(fetched.grand_total, 141.6);
}

#[test]
fn test_create_rejects_invalid_values() {
    let (_db, _staging, state) = create_test_state(true).unwrap();

    let mut values = valid_shipment("AWB5002");
    values.insert("pinCode".into(), json!("12345"));
    values.insert("courierPartner".into(), json!("Pigeon Post"));
    values.remove("customerName");

    match state.shipment_api.create_shipment(&values) {
        Err(ApiError::ValidationFailed(errors)) => {
            let kinds: Vec<(&str, ValidationErrorKind)> = errors
                .iter()
                .map(|e| (e.field_key.as_str(), e.kind))
                .collect();
            assert!(kinds.contains(&("pinCode", ValidationErrorKind::PatternMismatch)));
            assert!(kinds.contains(&("courierPartner", ValidationErrorKind::InvalidEnumValue)));
            assert!(kinds.contains(&("customerName", ValidationErrorKind::MissingRequired)));
        }
        other => panic!("expected ValidationFailed, got {:?}", other.map(|s| s.id)),
    }
    assert_eq!(state.shipment_api.list_shipments(None, None).unwrap().total, 0);
}

#[test]
fn test_duplicate_awb_is_conflict() {
    let (_db, _staging, state) = create_test_state(true).unwrap();

    state.shipment_api.create_shipment(&valid_shipment("AWB5003")).unwrap();
    let err = state
        .shipment_api
        .create_shipment(&valid_shipment("AWB5003"))
        .unwrap_err();

    assert_eq!(err.status_code(), 409);
    assert!(err.to_string().contains("Duplicate AWB number 'AWB5003'"));
}

#[test]
fn test_update_merges_and_revalidates() {
    let (_db, _staging, state) = create_test_state(true).unwrap();
    let created = state.shipment_api.create_shipment(&valid_shipment("AWB5004")).unwrap();

    // 状态改为 Delivered 但缺少送达日期
    let mut patch = Map::new();
    patch.insert("shipmentStatus".into(), json!("Delivered"));
    match state.shipment_api.update_shipment(&created.id, &patch) {
        Err(ApiError::ValidationFailed(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field_key, "deliveryDate");
        }
        other => panic!("expected ValidationFailed, got {:?}", other.map(|s| s.id)),
    }

    patch.insert("deliveryDate".into(), json!("20/01/2025"));
    patch.insert("marginAmount".into(), json!(30));
    patch.insert("remarks".into(), json!("left with guard"));
    let updated = state.shipment_api.update_shipment(&created.id, &patch).unwrap();

    assert_eq!(updated.shipment_status.as_deref(), Some("Delivered"));
    assert_eq!(updated.extra_fields.get("deliveryDate"), Some(&json!("2025-01-20")));
    assert_eq!(updated.pre_tax_total, 130.0);
    assert_eq!(updated.customer_name.as_deref(), Some("Asha Rao"));
    assert!(updated.updated_at >= created.updated_at);

    // 置空扩展字段
    let mut clear = Map::new();
    clear.insert("remarks".into(), Value::Null);
    let cleared = state.shipment_api.update_shipment(&created.id, &clear).unwrap();
    assert!(cleared.extra_fields.get("remarks").is_none());

    let err = state.shipment_api.update_shipment("missing", &clear).unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[test]
fn test_lookup_by_awb_and_delete() {
    let (_db, _staging, state) = create_test_state(true).unwrap();
    let created = state.shipment_api.create_shipment(&valid_shipment("AWB7001")).unwrap();

    let found = state.shipment_api.get_shipment_by_awb(" AWB7001 ").unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(state.shipment_api.get_shipment_by_awb("").unwrap_err().status_code(), 400);

    let resp = commands::delete_shipment(&state, &created.id);
    assert!(resp.success);
    assert_eq!(state.shipment_api.get_shipment_by_awb("AWB7001").unwrap_err().status_code(), 404);

    let resp = commands::delete_shipment(&state, &created.id);
    assert_eq!(resp.error.as_deref(), Some("NOT_FOUND"));
}

#[test]
fn test_list_paging() {
    let (_db, _staging, state) = create_test_state(true).unwrap();
    for i in 0..5 {
        state
            .shipment_api
            .create_shipment(&valid_shipment(&format!("AWB60{:02}", i)))
            .unwrap();
    }

    let page = state.shipment_api.list_shipments(Some(2), Some(1)).unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.limit, 2);
    assert_eq!(page.offset, 1);

    let resp = commands::list_shipments(&state, Some(0), None);
    assert!(resp.success);
    assert_eq!(resp.data.unwrap().limit, 1);

    let resp = commands::get_shipment(&state, "nope");
    assert_eq!(resp.error.as_deref(), Some("NOT_FOUND"));
}
