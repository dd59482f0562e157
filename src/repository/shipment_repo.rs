// ==========================================
// 运单动态字段系统 - 运单仓储
// ==========================================
// 职责: 管理 shipment 表（核心列 + 扩展字段 JSON 侧表）
// 约束: awb_number 唯一（重复写入返回 UniqueConstraintViolation）
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::shipment::ShipmentRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    shipment_id, awb_number, customer_name, customer_mobile, customer_email,
    destination_address, pin_code, courier_partner, shipment_status, shipment_date,
    weight, base_amount, margin_amount, tax_amount,
    pre_tax_total, post_tax_total, grand_total,
    extra_fields_json, created_at, updated_at
"#;

// ==========================================
// ShipmentRepository - 运单仓储
// ==========================================
pub struct ShipmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ShipmentRepository {
    /// 创建新的仓储实例（自动建表）
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_and_migrate(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入运单（派生金额按金额输入重新计算后写入）
    pub fn insert(&self, record: &ShipmentRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let extra = serde_json::to_string(&record.extra_fields)?;
        let (pre_tax_total, post_tax_total, grand_total) = record.derived_totals();
        conn.execute(
            r#"
            INSERT INTO shipment (
                shipment_id, awb_number, customer_name, customer_mobile, customer_email,
                destination_address, pin_code, courier_partner, shipment_status, shipment_date,
                weight, base_amount, margin_amount, tax_amount,
                pre_tax_total, post_tax_total, grand_total,
                extra_fields_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            "#,
            params![
                record.id,
                record.awb_number,
                record.customer_name,
                record.customer_mobile,
                record.customer_email,
                record.destination_address,
                record.pin_code,
                record.courier_partner,
                record.shipment_status,
                record.shipment_date.map(|d| d.format("%Y-%m-%d").to_string()),
                record.weight,
                record.base_amount,
                record.margin_amount,
                record.tax_amount,
                pre_tax_total,
                post_tax_total,
                grand_total,
                extra,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 更新运单（按 id）
    ///
    /// # 返回
    /// - Ok(true): 已更新
    /// - Ok(false): 运单不存在
    pub fn update(&self, record: &ShipmentRecord) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let extra = serde_json::to_string(&record.extra_fields)?;
        let (pre_tax_total, post_tax_total, grand_total) = record.derived_totals();
        let affected = conn.execute(
            r#"
            UPDATE shipment SET
                awb_number = ?2, customer_name = ?3, customer_mobile = ?4, customer_email = ?5,
                destination_address = ?6, pin_code = ?7, courier_partner = ?8,
                shipment_status = ?9, shipment_date = ?10,
                weight = ?11, base_amount = ?12, margin_amount = ?13, tax_amount = ?14,
                pre_tax_total = ?15, post_tax_total = ?16, grand_total = ?17,
                extra_fields_json = ?18, updated_at = ?19
            WHERE shipment_id = ?1
            "#,
            params![
                record.id,
                record.awb_number,
                record.customer_name,
                record.customer_mobile,
                record.customer_email,
                record.destination_address,
                record.pin_code,
                record.courier_partner,
                record.shipment_status,
                record.shipment_date.map(|d| d.format("%Y-%m-%d").to_string()),
                record.weight,
                record.base_amount,
                record.margin_amount,
                record.tax_amount,
                pre_tax_total,
                post_tax_total,
                grand_total,
                extra,
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(affected > 0)
    }

    /// 按 id 查询
    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ShipmentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM shipment WHERE shipment_id = ?1", SELECT_COLUMNS);
        let row = conn.query_row(&sql, params![id], map_row).optional()?;
        row.map(ShipmentRow::decode).transpose()
    }

    /// 按运单号查询
    pub fn find_by_awb(&self, awb_number: &str) -> RepositoryResult<Option<ShipmentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM shipment WHERE awb_number = ?1", SELECT_COLUMNS);
        let row = conn.query_row(&sql, params![awb_number], map_row).optional()?;
        row.map(ShipmentRow::decode).transpose()
    }

    /// 分页查询（创建时间倒序）
    pub fn list(&self, limit: usize, offset: usize) -> RepositoryResult<Vec<ShipmentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM shipment ORDER BY created_at DESC, shipment_id ASC LIMIT ?1 OFFSET ?2",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(ShipmentRow::decode).collect()
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM shipment", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 删除运单
    pub fn delete(&self, id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM shipment WHERE shipment_id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

/// 原始行（文本列尚未解码）
struct ShipmentRow {
    id: String,
    awb_number: Option<String>,
    customer_name: Option<String>,
    customer_mobile: Option<String>,
    customer_email: Option<String>,
    destination_address: Option<String>,
    pin_code: Option<String>,
    courier_partner: Option<String>,
    shipment_status: Option<String>,
    shipment_date: Option<String>,
    weight: Option<f64>,
    base_amount: f64,
    margin_amount: f64,
    tax_amount: f64,
    pre_tax_total: f64,
    post_tax_total: f64,
    grand_total: f64,
    extra_fields_json: String,
    created_at: String,
    updated_at: String,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<ShipmentRow> {
    Ok(ShipmentRow {
        id: row.get(0)?,
        awb_number: row.get(1)?,
        customer_name: row.get(2)?,
        customer_mobile: row.get(3)?,
        customer_email: row.get(4)?,
        destination_address: row.get(5)?,
        pin_code: row.get(6)?,
        courier_partner: row.get(7)?,
        shipment_status: row.get(8)?,
        shipment_date: row.get(9)?,
        weight: row.get(10)?,
        base_amount: row.get(11)?,
        margin_amount: row.get(12)?,
        tax_amount: row.get(13)?,
        pre_tax_total: row.get(14)?,
        post_tax_total: row.get(15)?,
        grand_total: row.get(16)?,
        extra_fields_json: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

impl ShipmentRow {
    /// 解码文本列（损坏数据返回 CorruptRecord，不做静默替换）
    fn decode(self) -> RepositoryResult<ShipmentRecord> {
        let id = self.id;
        let corrupt = |message: String| RepositoryError::CorruptRecord {
            entity: "shipment".to_string(),
            id: id.clone(),
            message,
        };

        let extra_fields: BTreeMap<String, Value> = serde_json::from_str(&self.extra_fields_json)
            .map_err(|e| corrupt(format!("extra_fields_json: {}", e)))?;
        let shipment_date = self
            .shipment_date
            .map(|s| {
                NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map_err(|e| corrupt(format!("shipment_date '{}': {}", s, e)))
            })
            .transpose()?;
        let created_at = parse_timestamp(&self.created_at).map_err(|e| corrupt(format!("created_at: {}", e)))?;
        let updated_at = parse_timestamp(&self.updated_at).map_err(|e| corrupt(format!("updated_at: {}", e)))?;

        Ok(ShipmentRecord {
            id,
            awb_number: self.awb_number,
            customer_name: self.customer_name,
            customer_mobile: self.customer_mobile,
            customer_email: self.customer_email,
            destination_address: self.destination_address,
            pin_code: self.pin_code,
            courier_partner: self.courier_partner,
            shipment_status: self.shipment_status,
            shipment_date,
            weight: self.weight,
            base_amount: self.base_amount,
            margin_amount: self.margin_amount,
            tax_amount: self.tax_amount,
            pre_tax_total: self.pre_tax_total,
            post_tax_total: self.post_tax_total,
            grand_total: self.grand_total,
            extra_fields,
            created_at,
            updated_at,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("'{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repo() -> ShipmentRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ShipmentRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn record(awb: &str) -> ShipmentRecord {
        let values = json!({
            "awbNumber": awb,
            "customerName": "Asha",
            "shipmentDate": "2025-01-15",
            "weight": 1.5,
            "baseAmount": 100.0,
            "taxAmount": 18.0,
            "fragile": true
        });
        ShipmentRecord::from_values(values.as_object().unwrap())
    }

    #[test]
    fn test_insert_and_round_trip_extra_fields() {
        let repo = repo();
        let r = record("AWB001");
        repo.insert(&r).unwrap();

        let loaded = repo.find_by_awb("AWB001").unwrap().unwrap();
        assert_eq!(loaded.id, r.id);
        assert_eq!(loaded.grand_total, 118.0);
        assert_eq!(loaded.extra_fields["fragile"], json!(true));
        assert_eq!(loaded.shipment_date, r.shipment_date);
    }

    #[test]
    fn test_awb_unique() {
        let repo = repo();
        repo.insert(&record("AWB001")).unwrap();
        let err = repo.insert(&record("AWB001")).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_totals_recomputed_on_write() {
        let repo = repo();
        let values = json!({ "awbNumber": "AWB100" });
        let mut r = ShipmentRecord::from_values(values.as_object().unwrap());
        r.base_amount = 100.0;
        r.margin_amount = 20.0;
        repo.insert(&r).unwrap();

        let loaded = repo.find_by_id(&r.id).unwrap().unwrap();
        assert_eq!(loaded.pre_tax_total, 120.0);
        assert_eq!(loaded.grand_total, 120.0);

        let mut changed = loaded.clone();
        changed.tax_amount = 21.6;
        assert!(repo.update(&changed).unwrap());
        let loaded = repo.find_by_id(&r.id).unwrap().unwrap();
        assert_eq!(loaded.post_tax_total, 141.6);
        assert_eq!(loaded.grand_total, 141.6);
    }

    #[test]
    fn test_corrupt_stored_columns_are_reported() {
        let repo = repo();
        let r = record("AWB200");
        repo.insert(&r).unwrap();

        {
            let conn = repo.get_conn().unwrap();
            conn.execute(
                "UPDATE shipment SET extra_fields_json = '{not json' WHERE shipment_id = ?1",
                params![r.id],
            )
            .unwrap();
        }
        let err = repo.find_by_id(&r.id).unwrap_err();
        assert!(matches!(err, RepositoryError::CorruptRecord { ref entity, .. } if entity == "shipment"));

        {
            let conn = repo.get_conn().unwrap();
            conn.execute(
                "UPDATE shipment SET extra_fields_json = '{}', created_at = 'yesterday' WHERE shipment_id = ?1",
                params![r.id],
            )
            .unwrap();
        }
        assert!(matches!(repo.list(10, 0), Err(RepositoryError::CorruptRecord { .. })));
    }

    #[test]
    fn test_update_missing_returns_false() {
        let repo = repo();
        assert!(!repo.update(&record("AWB404")).unwrap());
        assert!(repo.find_by_id("nope").unwrap().is_none());
    }
}
