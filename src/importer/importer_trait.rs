// ==========================================
// 运单动态字段系统 - 导入 Trait
// ==========================================
// 职责: 定义运单导入接口（不包含实现）
// 两阶段: preview（暂存 + 解析 + 建议映射）→ execute（映射 + 校验 + 落库）
// ==========================================

use crate::domain::field::FieldDefinition;
use crate::domain::import_job::{
    AvailableField, ColumnMapping, ImportBatchResult, ImportExecuteRequest, ImportJob,
    ImportPreview, RawRow,
};
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

// ==========================================
// ParsedSheet - 统一的表格解析结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSheet {
    /// 去重后的表头（源文件列顺序）
    pub headers: Vec<String>,
    /// 数据行（已跳过空白行）
    pub rows: Vec<RawRow>,
}

impl ParsedSheet {
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }
}

// ==========================================
// ShipmentImporter Trait
// ==========================================
// 用途: 运单批量导入主接口
// 实现者: ShipmentImporterImpl
#[async_trait]
pub trait ShipmentImporter: Send + Sync {
    /// 阶段 A: 暂存文件并生成预览
    ///
    /// # 返回
    /// - Ok(ImportPreview): job_id / 表头 / 样例行 / 总行数 / 可映射字段 / 建议映射
    /// - Err(UnsupportedFileType): 扩展名不支持（暂存副本已删除）
    async fn preview(&self, source: &Path) -> ImportResult<ImportPreview>;

    /// 阶段 A（上传形态）: 以原始字节暂存并生成预览
    async fn preview_upload(&self, file_name: &str, bytes: &[u8]) -> ImportResult<ImportPreview>;

    /// 阶段 B: 按映射执行导入
    ///
    /// # 说明
    /// - 行级失败收集到结果中，不中断批次
    /// - 无论成功与否，暂存文件都会被删除
    async fn execute(&self, request: &ImportExecuteRequest) -> ImportResult<ImportBatchResult>;

    /// 放弃已预览的导入（删除暂存文件）
    async fn discard(&self, job_id: &str) -> ImportResult<()>;

    /// 查询导入任务（仅本进程内）
    fn job(&self, job_id: &str) -> Option<ImportJob>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口
// 实现者: CsvParser, ExcelParser, UniversalFileParser
pub trait FileParser: Send + Sync {
    /// 解析文件为表头 + 行记录
    fn parse(&self, file_path: &Path) -> ImportResult<ParsedSheet>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 用途: 表头 → 字段映射建议，单元格宽松强转
// 实现者: FragmentFieldMapper
pub trait FieldMapper: Send + Sync {
    /// 为每个表头给出建议映射（无法匹配为 skip）
    fn suggest_mapping(&self, headers: &[String], available: &[AvailableField]) -> ColumnMapping;

    /// 单元格文本 → 字段值（宽松：数值无法解析时为 0）
    fn coerce_cell(&self, definition: &FieldDefinition, raw: &str) -> Value;
}
