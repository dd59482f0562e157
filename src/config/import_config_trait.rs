// ==========================================
// 运单动态字段系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;
use std::path::PathBuf;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取上传文件暂存目录
    ///
    /// # 默认值
    /// - <用户数据目录>/shipment-schema/import-staging
    async fn get_staging_dir(&self) -> ConfigResult<PathBuf>;

    /// 获取预览样例行数
    ///
    /// # 默认值
    /// - 5
    async fn get_sample_rows(&self) -> ConfigResult<usize>;

    /// 获取单次导入最大行数
    ///
    /// # 返回
    /// - 0: 不限制
    ///
    /// # 默认值
    /// - 0
    async fn get_max_rows(&self) -> ConfigResult<usize>;
}
