// ==========================================
// Mock 配置实现 - 用于集成测试
// ==========================================

use async_trait::async_trait;
use shipment_schema::config::{ConfigResult, ImportConfigReader};
use std::path::PathBuf;

/// Mock 配置结构
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub staging_dir: PathBuf,
    pub sample_rows: usize,
    pub max_rows: usize,
    /// 行数配置读取失败（暂存目录仍可读取）
    pub fail_row_limits: bool,
}

impl MockConfig {
    /// 创建默认配置（5 行样例，不限行数）
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            sample_rows: 5,
            max_rows: 0,
            fail_row_limits: false,
        }
    }

    pub fn with_sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows;
        self
    }

    pub fn with_max_rows(mut self, rows: usize) -> Self {
        self.max_rows = rows;
        self
    }

    pub fn with_failing_row_limits(mut self) -> Self {
        self.fail_row_limits = true;
        self
    }
}

#[async_trait]
impl ImportConfigReader for MockConfig {
    async fn get_staging_dir(&self) -> ConfigResult<PathBuf> {
        Ok(self.staging_dir.clone())
    }

    async fn get_sample_rows(&self) -> ConfigResult<usize> {
        if self.fail_row_limits {
            return Err("import_sample_rows 不是有效整数".into());
        }
        Ok(self.sample_rows)
    }

    async fn get_max_rows(&self) -> ConfigResult<usize> {
        if self.fail_row_limits {
            return Err("import_max_rows 不是有效整数".into());
        }
        Ok(self.max_rows)
    }
}
