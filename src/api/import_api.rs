// ==========================================
// 运单动态字段系统 - 运单导入 API
// ==========================================
// 职责: 封装两阶段导入（预览 / 执行 / 放弃）
// 说明: 行级失败在批次结果中返回，不作为 API 错误
// ==========================================

use std::path::Path;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::import_job::{ImportBatchResult, ImportExecuteRequest, ImportJob, ImportPreview};
use crate::importer::ShipmentImporter;

/// 导入API
pub struct ImportApi {
    importer: Arc<dyn ShipmentImporter>,
}

impl ImportApi {
    pub fn new(importer: Arc<dyn ShipmentImporter>) -> Self {
        Self { importer }
    }

    /// 预览本地文件
    ///
    /// # 返回
    /// - Ok(ImportPreview): 表头/样例行/建议映射，job_id 用于后续执行
    /// - Err(UnsupportedFileType / StructuralPrecondition / NotFound)
    pub async fn preview_file(&self, file_path: &str) -> ApiResult<ImportPreview> {
        let file_path = file_path.trim();
        if file_path.is_empty() {
            return Err(ApiError::StructuralPrecondition("未指定导入文件".to_string()));
        }
        Ok(self.importer.preview(Path::new(file_path)).await?)
    }

    /// 预览上传内容
    pub async fn preview_upload(&self, file_name: &str, bytes: &[u8]) -> ApiResult<ImportPreview> {
        if bytes.is_empty() {
            return Err(ApiError::StructuralPrecondition(format!(
                "上传文件为空: {}",
                file_name
            )));
        }
        Ok(self.importer.preview_upload(file_name, bytes).await?)
    }

    /// 按映射执行导入
    pub async fn execute_import(&self, request: &ImportExecuteRequest) -> ApiResult<ImportBatchResult> {
        if request.file_reference.trim().is_empty() {
            return Err(ApiError::StructuralPrecondition(
                "缺少暂存文件引用 (fileReference)".to_string(),
            ));
        }
        Ok(self.importer.execute(request).await?)
    }

    /// 放弃导入
    pub async fn discard_import(&self, job_id: &str) -> ApiResult<()> {
        if job_id.trim().is_empty() {
            return Err(ApiError::StructuralPrecondition(
                "缺少暂存文件引用 (jobId)".to_string(),
            ));
        }
        Ok(self.importer.discard(job_id).await?)
    }

    /// 查询本进程内的导入任务
    pub fn get_job(&self, job_id: &str) -> ApiResult<ImportJob> {
        self.importer
            .job(job_id)
            .ok_or_else(|| ApiError::NotFound(format!("导入任务不存在: {}", job_id)))
    }
}
