// ==========================================
// 运单动态字段系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{ConfigResult, ImportConfigReader};
use crate::db::open_and_migrate;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// 默认预览样例行数
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

/// 默认暂存子目录名
pub const STAGING_DIR_NAME: &str = "import-staging";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_and_migrate(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value, "配置已更新");
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取非负整数配置（格式错误时告警并使用默认值）
    fn get_usize_or_default(&self, key: &str, default: usize) -> ConfigResult<usize> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        Ok(value.trim().parse::<usize>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %value, "配置格式错误，使用默认值");
            default
        }))
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 测试前后保存/恢复配置
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 此方法会覆盖现有的 global 配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

/// 默认暂存目录: <数据目录>/shipment-schema/import-staging（无数据目录时退回系统临时目录）
pub fn default_staging_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("shipment-schema"))
        .unwrap_or_else(|| std::env::temp_dir().join("shipment-schema"))
        .join(STAGING_DIR_NAME)
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_staging_dir(&self) -> ConfigResult<PathBuf> {
        match self.get_config_value(config_keys::IMPORT_STAGING_DIR)? {
            Some(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir.trim())),
            _ => Ok(default_staging_dir()),
        }
    }

    async fn get_sample_rows(&self) -> ConfigResult<usize> {
        let rows = self.get_usize_or_default(config_keys::IMPORT_SAMPLE_ROWS, DEFAULT_SAMPLE_ROWS)?;
        Ok(if rows == 0 { DEFAULT_SAMPLE_ROWS } else { rows })
    }

    async fn get_max_rows(&self) -> ConfigResult<usize> {
        self.get_usize_or_default(config_keys::IMPORT_MAX_ROWS, 0)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 导入
    pub const IMPORT_STAGING_DIR: &str = "import_staging_dir";
    pub const IMPORT_SAMPLE_ROWS: &str = "import_sample_rows";
    pub const IMPORT_MAX_ROWS: &str = "import_max_rows";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults() {
        let config = manager();
        assert_eq!(config.get_sample_rows().await.unwrap(), 5);
        assert_eq!(config.get_max_rows().await.unwrap(), 0);
        assert!(config.get_staging_dir().await.unwrap().ends_with(STAGING_DIR_NAME));
    }

    #[tokio::test]
    async fn test_overrides_and_bad_values() {
        let config = manager();
        config.set_global_config_value(config_keys::IMPORT_SAMPLE_ROWS, "2").unwrap();
        config.set_global_config_value(config_keys::IMPORT_MAX_ROWS, "lots").unwrap();
        config.set_global_config_value(config_keys::IMPORT_STAGING_DIR, "/tmp/staging").unwrap();

        assert_eq!(config.get_sample_rows().await.unwrap(), 2);
        assert_eq!(config.get_max_rows().await.unwrap(), 0);
        assert_eq!(config.get_staging_dir().await.unwrap(), PathBuf::from("/tmp/staging"));
    }

    #[test]
    fn test_snapshot_restore() {
        let config = manager();
        config.set_global_config_value(config_keys::IMPORT_SAMPLE_ROWS, "3").unwrap();
        let snapshot = config.get_config_snapshot().unwrap();

        config.set_global_config_value(config_keys::IMPORT_SAMPLE_ROWS, "9").unwrap();
        assert_eq!(config.restore_config_from_snapshot(&snapshot).unwrap(), 1);
        assert_eq!(
            config.get_global_config_value(config_keys::IMPORT_SAMPLE_ROWS).unwrap(),
            Some("3".to_string())
        );
    }
}
