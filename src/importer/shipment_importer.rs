// ==========================================
// 运单动态字段系统 - 运单导入器实现
// ==========================================
// 职责: 整合导入流程，从文件到数据库
// 阶段 A: 暂存 → 解析 → 可映射字段 → 建议映射 → 预览
// 阶段 B: 解析 → 映射 + 宽松强转 → 校验 → 落库（逐行，失败收集）→ 删除暂存
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::field::FieldDefinition;
use crate::domain::import_job::{
    AvailableField, ImportBatchResult, ImportExecuteRequest, ImportJob, ImportPreview,
    MappingTarget, RawRow, RowError,
};
use crate::domain::shipment::ShipmentRecord;
use crate::domain::types::{FieldType, ImportJobState};
use crate::engine::schema_store::FieldSchemaStore;
use crate::engine::validator::FieldValidator;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FragmentFieldMapper;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::importer_trait::{FieldMapper, FileParser, ParsedSheet, ShipmentImporter};
use crate::importer::staging::{ImportStaging, StagedFile};
use crate::repository::error::RepositoryError;
use crate::repository::shipment_repo::ShipmentRepository;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// 默认保留的已结束任务数
pub const DEFAULT_RETAINED_JOBS: usize = 200;

// ==========================================
// JobRegistry - 本进程内的导入任务登记
// ==========================================
// 已结束任务（执行/放弃）按结束顺序保留最近 retain_finished 个；
// 登记总数超过 retain_finished * 4 时淘汰最早的未结束任务（其暂存文件仍可执行）
struct JobRegistry {
    jobs: HashMap<String, ImportJob>,
    finished: VecDeque<String>,
    retain_finished: usize,
}

impl JobRegistry {
    fn new(retain_finished: usize) -> Self {
        Self {
            jobs: HashMap::new(),
            finished: VecDeque::new(),
            retain_finished: retain_finished.max(1),
        }
    }

    fn insert(&mut self, job: ImportJob) {
        self.jobs.insert(job.job_id.clone(), job);

        let cap = self.retain_finished.saturating_mul(4);
        while self.jobs.len() > cap {
            let oldest_open = self
                .jobs
                .values()
                .filter(|j| !self.finished.contains(&j.job_id))
                .min_by_key(|j| j.created_at)
                .map(|j| j.job_id.clone());
            match oldest_open {
                Some(job_id) => {
                    debug!(job_id = %job_id, "淘汰未结束的导入任务登记");
                    self.jobs.remove(&job_id);
                }
                None => break,
            }
        }
    }

    fn finish(&mut self, job_id: &str, next: ImportJobState, result: Option<ImportBatchResult>) {
        let Some(job) = self.jobs.get_mut(job_id) else {
            return;
        };
        if let Err(e) = job.transition(next) {
            warn!(job_id = %job_id, error = %e, "导入任务状态更新失败");
            return;
        }
        job.result = result;

        self.finished.push_back(job_id.to_string());
        while self.finished.len() > self.retain_finished {
            if let Some(evicted) = self.finished.pop_front() {
                self.jobs.remove(&evicted);
            }
        }
    }
}

/// 预览/执行前读取的行数配置
struct RowLimits {
    max_rows: usize,
    sample_rows: usize,
}

// ==========================================
// ShipmentImporterImpl - 运单导入器实现
// ==========================================
pub struct ShipmentImporterImpl<C>
where
    C: ImportConfigReader,
{
    // 字段定义 / 运单存储
    schema_store: Arc<FieldSchemaStore>,
    shipment_repo: Arc<ShipmentRepository>,

    // 配置读取器
    config: Arc<C>,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    field_mapper: Box<dyn FieldMapper>,

    // 本进程内的导入任务
    jobs: Mutex<JobRegistry>,
}

impl<C> ShipmentImporterImpl<C>
where
    C: ImportConfigReader,
{
    /// 创建导入器（默认组件: UniversalFileParser + FragmentFieldMapper）
    pub fn new(
        schema_store: Arc<FieldSchemaStore>,
        shipment_repo: Arc<ShipmentRepository>,
        config: Arc<C>,
    ) -> Self {
        Self::with_components(
            schema_store,
            shipment_repo,
            config,
            Box::new(UniversalFileParser),
            Box::new(FragmentFieldMapper),
        )
    }

    pub fn with_components(
        schema_store: Arc<FieldSchemaStore>,
        shipment_repo: Arc<ShipmentRepository>,
        config: Arc<C>,
        file_parser: Box<dyn FileParser>,
        field_mapper: Box<dyn FieldMapper>,
    ) -> Self {
        Self {
            schema_store,
            shipment_repo,
            config,
            file_parser,
            field_mapper,
            jobs: Mutex::new(JobRegistry::new(DEFAULT_RETAINED_JOBS)),
        }
    }

    /// 设置保留的已结束任务数（最少 1）
    pub fn with_job_retention(self, retain_finished: usize) -> Self {
        Self {
            jobs: Mutex::new(JobRegistry::new(retain_finished)),
            ..self
        }
    }

    /// 当前登记的任务数
    pub fn tracked_jobs(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.jobs.len()).unwrap_or(0)
    }

    async fn staging(&self) -> ImportResult<ImportStaging> {
        let dir = self
            .config
            .get_staging_dir()
            .await
            .map_err(|e| ImportError::ConfigReadError {
                key: "import_staging_dir".to_string(),
                message: e.to_string(),
            })?;
        Ok(ImportStaging::new(dir))
    }

    /// 读取行数配置（在触碰暂存文件之前调用，失败时没有需要清理的文件）
    async fn row_limits(&self) -> ImportResult<RowLimits> {
        let max_rows = self
            .config
            .get_max_rows()
            .await
            .map_err(|e| ImportError::ConfigReadError {
                key: "import_max_rows".to_string(),
                message: e.to_string(),
            })?;
        let sample_rows = self
            .config
            .get_sample_rows()
            .await
            .map_err(|e| ImportError::ConfigReadError {
                key: "import_sample_rows".to_string(),
                message: e.to_string(),
            })?;
        Ok(RowLimits { max_rows, sample_rows })
    }

    /// 解析暂存文件并检查行数上限（失败时删除暂存文件）
    fn parse_staged(&self, staging: &ImportStaging, job_id: &str, path: &Path, limit: usize) -> ImportResult<ParsedSheet> {
        let sheet = match self.file_parser.parse(path) {
            Ok(sheet) => sheet,
            Err(e) => {
                staging.remove(job_id);
                return Err(e);
            }
        };

        if limit > 0 && sheet.total_rows() > limit {
            staging.remove(job_id);
            return Err(ImportError::TooManyRows {
                rows: sheet.total_rows(),
                limit,
            });
        }
        Ok(sheet)
    }

    /// 可映射字段（不含文件类型字段）
    fn available_fields(schema: &[FieldDefinition]) -> Vec<AvailableField> {
        schema
            .iter()
            .filter(|d| d.field_type() != FieldType::File)
            .map(|d| AvailableField {
                key: d.key.clone(),
                label: d.label.clone(),
                field_type: d.field_type(),
                required: d.required,
            })
            .collect()
    }

    #[instrument(skip(self, staging, staged, limits), fields(job_id = %staged.job_id))]
    fn build_preview(&self, staging: &ImportStaging, staged: StagedFile, limits: RowLimits) -> ImportResult<ImportPreview> {
        let mut job = ImportJob::new(&staged.job_id, &staged.original_file_name);

        debug!("步骤 1: 解析文件");
        let sheet = self.parse_staged(staging, &staged.job_id, &staged.path, limits.max_rows)?;
        info!(total_rows = sheet.total_rows(), columns = sheet.headers.len(), "文件解析完成");

        debug!("步骤 2: 读取可映射字段");
        let schema = match self.schema_store.list() {
            Ok(schema) => schema,
            Err(e) => {
                staging.remove(&staged.job_id);
                return Err(e.into());
            }
        };
        let available_fields = Self::available_fields(&schema);

        debug!("步骤 3: 生成建议映射");
        let suggested_mapping = self.field_mapper.suggest_mapping(&sheet.headers, &available_fields);
        let mapped = suggested_mapping.values().filter(|t| **t != MappingTarget::Skip).count();
        info!(mapped, unmapped = suggested_mapping.len() - mapped, "建议映射完成");

        let sample_rows: Vec<RawRow> = sheet.rows.iter().take(limits.sample_rows).cloned().collect();

        job.headers = sheet.headers.clone();
        job.sample_rows = sample_rows.clone();
        job.total_rows = sheet.total_rows();
        job.suggested_mapping = suggested_mapping.clone();
        job.transition(ImportJobState::Previewed)
            .map_err(ImportError::InvalidJobState)?;
        self.register(job);

        Ok(ImportPreview {
            job_id: staged.job_id,
            file_name: staged.original_file_name,
            total_rows: sheet.total_rows(),
            headers: sheet.headers,
            sample_rows,
            available_fields,
            suggested_mapping,
        })
    }

    /// 逐行映射 + 校验 + 落库
    fn process_rows(
        &self,
        job_id: &str,
        sheet: &ParsedSheet,
        request: &ImportExecuteRequest,
        schema: &[FieldDefinition],
    ) -> ImportBatchResult {
        let started = Instant::now();
        let by_key: HashMap<&str, &FieldDefinition> = schema.iter().map(|d| (d.key.as_str(), d)).collect();

        // 映射目标不在字段定义中的列: 告警后忽略
        let unknown: BTreeSet<&str> = request
            .mapping
            .values()
            .filter_map(MappingTarget::field_key)
            .filter(|key| !by_key.contains_key(key))
            .collect();
        for key in &unknown {
            warn!(job_id = %job_id, target = %key, "映射目标字段不存在，已忽略");
        }

        let mut successful_count = 0;
        let mut per_row_errors = Vec::new();

        for (idx, row) in sheet.rows.iter().enumerate() {
            let row_number = idx + 1;
            let candidate = self.build_candidate(row, request, &by_key);

            let report = FieldValidator::validate_record(schema, &candidate);
            if !report.is_valid() {
                debug!(row = row_number, errors = %report.summary(), "行校验失败");
                per_row_errors.push(RowError {
                    row: row_number,
                    data: candidate,
                    error: report.summary(),
                    field_errors: report.errors,
                });
                continue;
            }

            let record = ShipmentRecord::from_values(&report.coerced_values);
            match self.shipment_repo.insert(&record) {
                Ok(()) => successful_count += 1,
                Err(e) => {
                    let error = match e {
                        RepositoryError::UniqueConstraintViolation(_) => format!(
                            "Duplicate AWB number '{}'",
                            record.awb_number.as_deref().unwrap_or_default()
                        ),
                        other => other.to_string(),
                    };
                    debug!(row = row_number, error = %error, "行写入失败");
                    per_row_errors.push(RowError {
                        row: row_number,
                        data: candidate,
                        error,
                        field_errors: Vec::new(),
                    });
                }
            }
        }

        per_row_errors.sort_by_key(|e| e.row);
        ImportBatchResult {
            job_id: job_id.to_string(),
            total_rows: sheet.total_rows(),
            successful_count,
            failed_count: per_row_errors.len(),
            per_row_errors,
            elapsed_ms: started.elapsed().as_millis() as i64,
        }
    }

    /// 候选值 = 默认值 ⊕ 非空映射单元格（宽松强转）
    fn build_candidate(
        &self,
        row: &RawRow,
        request: &ImportExecuteRequest,
        by_key: &HashMap<&str, &FieldDefinition>,
    ) -> Map<String, Value> {
        let mut candidate = request.default_values.clone();
        for (header, target) in &request.mapping {
            let Some(definition) = target.field_key().and_then(|k| by_key.get(k)) else {
                continue;
            };
            let Some(cell) = row.get(header).map(|c| c.trim()).filter(|c| !c.is_empty()) else {
                continue;
            };
            candidate.insert(
                definition.key.clone(),
                self.field_mapper.coerce_cell(definition, cell),
            );
        }
        candidate
    }

    fn register(&self, job: ImportJob) {
        match self.jobs.lock() {
            Ok(mut jobs) => jobs.insert(job),
            Err(e) => warn!(error = %e, "导入任务登记失败（锁获取失败）"),
        }
    }

    /// 检查任务状态转换（本进程未登记的任务视为已预览）
    fn check_transition(&self, job_id: &str, next: ImportJobState) -> ImportResult<()> {
        let jobs = self
            .jobs
            .lock()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))?;
        match jobs.jobs.get(job_id) {
            Some(job) if !job.state.can_transition_to(next) => Err(ImportError::InvalidJobState(format!(
                "导入任务 {} 当前状态 {} 不能转为 {}",
                job_id, job.state, next
            ))),
            _ => Ok(()),
        }
    }

    fn finish_job(&self, job_id: &str, next: ImportJobState, result: Option<ImportBatchResult>) {
        match self.jobs.lock() {
            Ok(mut jobs) => jobs.finish(job_id, next, result),
            Err(e) => warn!(job_id = %job_id, error = %e, "导入任务状态更新失败（锁获取失败）"),
        }
    }
}

#[async_trait]
impl<C> ShipmentImporter for ShipmentImporterImpl<C>
where
    C: ImportConfigReader,
{
    async fn preview(&self, source: &Path) -> ImportResult<ImportPreview> {
        info!(source = %source.display(), "开始导入预览");
        let staging = self.staging().await?;
        let limits = self.row_limits().await?;
        let staged = staging.stage_file(source)?;
        self.build_preview(&staging, staged, limits)
    }

    async fn preview_upload(&self, file_name: &str, bytes: &[u8]) -> ImportResult<ImportPreview> {
        info!(file_name = %file_name, bytes = bytes.len(), "开始导入预览（上传）");
        let staging = self.staging().await?;
        let limits = self.row_limits().await?;
        let staged = staging.stage_bytes(file_name, bytes)?;
        self.build_preview(&staging, staged, limits)
    }

    #[instrument(skip(self, request), fields(job_id = %request.file_reference))]
    async fn execute(&self, request: &ImportExecuteRequest) -> ImportResult<ImportBatchResult> {
        let job_id = request.file_reference.as_str();
        info!(mapped_columns = request.mapping.len(), "开始执行导入");

        let staging = self.staging().await?;
        let limits = self.row_limits().await?;
        let path = staging.resolve(job_id)?;
        if let Err(e) = self.check_transition(job_id, ImportJobState::Executed) {
            staging.remove(job_id);
            return Err(e);
        }

        debug!("步骤 1: 解析文件");
        let sheet = self.parse_staged(&staging, job_id, &path, limits.max_rows)?;

        debug!("步骤 2: 读取字段定义");
        let schema = match self.schema_store.list() {
            Ok(schema) => schema,
            Err(e) => {
                staging.remove(job_id);
                return Err(e.into());
            }
        };

        debug!("步骤 3: 逐行映射、校验、落库");
        let result = self.process_rows(job_id, &sheet, request, &schema);

        debug!("步骤 4: 清理暂存文件");
        staging.remove(job_id);
        self.finish_job(job_id, ImportJobState::Executed, Some(result.clone()));

        info!(
            total_rows = result.total_rows,
            successful = result.successful_count,
            failed = result.failed_count,
            elapsed_ms = result.elapsed_ms,
            "导入执行完成"
        );
        Ok(result)
    }

    async fn discard(&self, job_id: &str) -> ImportResult<()> {
        self.check_transition(job_id, ImportJobState::Discarded)?;
        let staging = self.staging().await?;
        let removed = staging.remove(job_id);
        let known = self.job(job_id).is_some();
        if !removed && !known {
            return Err(ImportError::FileNotFound(format!("暂存文件不存在: {}", job_id)));
        }
        self.finish_job(job_id, ImportJobState::Discarded, None);
        info!(job_id = %job_id, "导入任务已放弃");
        Ok(())
    }

    fn job(&self, job_id: &str) -> Option<ImportJob> {
        self.jobs.lock().ok().and_then(|jobs| jobs.jobs.get(job_id).cloned())
    }
}
