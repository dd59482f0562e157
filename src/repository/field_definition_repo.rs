// ==========================================
// 运单动态字段系统 - 字段定义仓储
// ==========================================
// 职责: 管理 field_definition 表（key 主键 + 排序号 + 定义 JSON）
// 红线: Repository 不含业务逻辑（约束校验在 FieldSchemaStore）
// ==========================================

use crate::domain::field::FieldDefinition;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// FieldDefinitionRepository - 字段定义仓储
// ==========================================
pub struct FieldDefinitionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FieldDefinitionRepository {
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

    /// 插入定义（key 重复时返回 UniqueConstraintViolation）
    pub fn insert(&self, definition: &FieldDefinition) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let json = serde_json::to_string(definition)?;
        conn.execute(
            r#"
            INSERT INTO field_definition (field_key, order_index, definition_json)
            VALUES (?1, ?2, ?3)
            "#,
            params![definition.key, definition.order.unwrap_or(0), json],
        )?;
        Ok(())
    }

    /// 覆盖写入已有定义
    ///
    /// # 返回
    /// - Ok(true): 已更新
    /// - Ok(false): key 不存在
    pub fn replace(&self, definition: &FieldDefinition) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let json = serde_json::to_string(definition)?;
        let affected = conn.execute(
            r#"
            UPDATE field_definition
            SET order_index = ?2, definition_json = ?3, updated_at = datetime('now')
            WHERE field_key = ?1
            "#,
            params![definition.key, definition.order.unwrap_or(0), json],
        )?;
        Ok(affected > 0)
    }

    /// 按 key 查询
    pub fn find_by_key(&self, key: &str) -> RepositoryResult<Option<FieldDefinition>> {
        let conn = self.get_conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT definition_json FROM field_definition WHERE field_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|j| decode(key, &j)).transpose()
    }

    /// 查询全部定义（order 升序，key 升序）
    pub fn list_all(&self) -> RepositoryResult<Vec<FieldDefinition>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT field_key, definition_json
            FROM field_definition
            ORDER BY order_index ASC, field_key ASC
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.iter().map(|(key, json)| decode(key, json)).collect()
    }

    /// 删除定义
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): key 不存在
    pub fn delete(&self, key: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM field_definition WHERE field_key = ?1", params![key])?;
        Ok(affected > 0)
    }

    /// 当前最大排序号（空表返回 0）
    pub fn max_order(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let max: Option<i64> =
            conn.query_row("SELECT MAX(order_index) FROM field_definition", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0))
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM field_definition", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 批量插入（单事务；用于默认字段初始化）
    pub fn insert_batch(&self, definitions: &[FieldDefinition]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        for definition in definitions {
            let json = serde_json::to_string(definition)?;
            tx.execute(
                r#"
                INSERT INTO field_definition (field_key, order_index, definition_json)
                VALUES (?1, ?2, ?3)
                "#,
                params![definition.key, definition.order.unwrap_or(0), json],
            )?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(definitions.len())
    }
}

fn decode(key: &str, json: &str) -> RepositoryResult<FieldDefinition> {
    serde_json::from_str(json).map_err(|e| RepositoryError::CorruptRecord {
        entity: "field_definition".to_string(),
        id: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::FieldKind;
    use crate::domain::types::FieldType;

    fn repo() -> FieldDefinitionRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        FieldDefinitionRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn def(key: &str, order: i64) -> FieldDefinition {
        FieldDefinition::new(key, key, FieldKind::plain(FieldType::Text)).with_order(order)
    }

    #[test]
    fn test_insert_list_sorted() {
        let repo = repo();
        repo.insert(&def("b", 2)).unwrap();
        repo.insert(&def("a", 2)).unwrap();
        repo.insert(&def("c", 1)).unwrap();

        let keys: Vec<String> = repo.list_all().unwrap().into_iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
        assert_eq!(repo.max_order().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_key_is_unique_violation() {
        let repo = repo();
        repo.insert(&def("a", 1)).unwrap();
        let err = repo.insert(&def("a", 2)).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_replace_and_delete_missing() {
        let repo = repo();
        assert!(!repo.replace(&def("ghost", 1)).unwrap());
        assert!(!repo.delete("ghost").unwrap());
        assert_eq!(repo.max_order().unwrap(), 0);

        repo.insert(&def("a", 1)).unwrap();
        assert!(repo.replace(&def("a", 7)).unwrap());
        assert_eq!(repo.find_by_key("a").unwrap().unwrap().order, Some(7));
        assert!(repo.delete("a").unwrap());
        assert!(repo.find_by_key("a").unwrap().is_none());
    }
}
