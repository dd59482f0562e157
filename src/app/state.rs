// ==========================================
// 运单动态字段系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储共享同一个 SQLite 连接
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ImportApi, SchemaApi, ShipmentApi};
use crate::config::config_manager::ConfigManager;
use crate::engine::schema_store::FieldSchemaStore;
use crate::importer::ShipmentImporterImpl;
use crate::repository::field_definition_repo::FieldDefinitionRepository;
use crate::repository::shipment_repo::ShipmentRepository;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "SHIPMENT_SCHEMA_DB_PATH";

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 字段定义API
    pub schema_api: Arc<SchemaApi>,

    /// 运单导入API
    pub import_api: Arc<ImportApi>,

    /// 运单API
    pub shipment_api: Arc<ShipmentApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（不存在时自动创建并建表）
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = crate::db::open_and_migrate(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let field_repo = Arc::new(FieldDefinitionRepository::from_connection(conn.clone()));
        let shipment_repo = Arc::new(ShipmentRepository::from_connection(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层 / 导入器
        // ==========================================
        let schema_store = Arc::new(FieldSchemaStore::new(field_repo));
        let importer = Arc::new(ShipmentImporterImpl::new(
            schema_store.clone(),
            shipment_repo.clone(),
            config_manager.clone(),
        ));

        // ==========================================
        // 创建API实例
        // ==========================================
        let schema_api = Arc::new(SchemaApi::new(schema_store.clone()));
        let import_api = Arc::new(ImportApi::new(importer));
        let shipment_api = Arc::new(ShipmentApi::new(schema_store, shipment_repo));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            schema_api,
            import_api,
            shipment_api,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 SHIPMENT_SCHEMA_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./shipment_schema.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("shipment-schema");
        // best-effort: 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("shipment_schema.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_new_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.db").to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);
        assert!(state.schema_api.list_fields().unwrap().is_empty());
    }
}
