// ==========================================
// 运单动态字段系统 - 字段定义存储
// ==========================================
// 职责: 字段定义的增删改查 / 批量更新 / 复制 / 默认初始化
// 约束: key 不可变；选项类字段必须有选项；不得自依赖
// 并发: 每次变更是单条语句，后写覆盖先写
// ==========================================

use crate::domain::field::{
    is_valid_field_key, BulkUpdateItem, BulkUpdateOutcome, FieldDefinition, FieldPatch,
    FieldTypeDescriptor,
};
use crate::domain::types::FieldType;
use crate::engine::default_schema::default_shipment_fields;
use crate::engine::error::{SchemaError, SchemaResult};
use crate::repository::error::RepositoryError;
use crate::repository::field_definition_repo::FieldDefinitionRepository;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ==========================================
// FieldSchemaStore - 字段定义存储
// ==========================================
pub struct FieldSchemaStore {
    repo: Arc<FieldDefinitionRepository>,
}

impl FieldSchemaStore {
    pub fn new(repo: Arc<FieldDefinitionRepository>) -> Self {
        Self { repo }
    }

    /// 创建字段定义
    ///
    /// # 返回
    /// - Ok(FieldDefinition): 已分配 order 的定义
    /// - Err(InvalidSchema): key 格式/选项/正则/自依赖不合法
    /// - Err(Conflict): key 已存在
    pub fn create(&self, mut definition: FieldDefinition) -> SchemaResult<FieldDefinition> {
        definition.key = definition.key.trim().to_string();
        definition
            .check_invariants()
            .map_err(SchemaError::InvalidSchema)?;

        if self.repo.find_by_key(&definition.key)?.is_some() {
            return Err(SchemaError::Conflict(format!(
                "Field with key '{}' already exists",
                definition.key
            )));
        }

        if definition.order.is_none() {
            definition.order = Some(self.repo.max_order()? + 1);
        }

        self.repo
            .insert(&definition)
            .map_err(|e| conflict_on_unique(e, &definition.key))?;

        info!(
            key = %definition.key,
            field_type = %definition.field_type(),
            order = ?definition.order,
            "字段定义已创建"
        );
        Ok(definition)
    }

    /// 全部定义（order 升序，key 升序）
    pub fn list(&self) -> SchemaResult<Vec<FieldDefinition>> {
        let mut definitions = self.repo.list_all()?;
        definitions.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(definitions)
    }

    pub fn get(&self, key: &str) -> SchemaResult<FieldDefinition> {
        self.repo
            .find_by_key(key)?
            .ok_or_else(|| not_found(key))
    }

    /// 局部更新（patch 中的 key 被忽略）
    pub fn update(&self, key: &str, patch: &FieldPatch) -> SchemaResult<FieldDefinition> {
        let current = self.get(key)?;

        if let Some(patch_key) = &patch.key {
            if patch_key != key {
                debug!(key = %key, ignored = %patch_key, "字段 key 不可修改，已忽略 patch 中的 key");
            }
        }

        let next = patch.apply_to(&current);
        next.check_invariants().map_err(SchemaError::InvalidSchema)?;

        if !self.repo.replace(&next)? {
            return Err(not_found(key));
        }

        info!(key = %key, kind_changed = patch.touches_kind(), "字段定义已更新");
        Ok(next)
    }

    /// 删除定义（不级联：已存储的运单值保留）
    pub fn delete(&self, key: &str) -> SchemaResult<()> {
        if !self.repo.delete(key)? {
            return Err(not_found(key));
        }
        info!(key = %key, "字段定义已删除");
        Ok(())
    }

    /// 批量更新（各条独立，单条失败不影响其余）
    pub fn bulk_update(&self, items: &[BulkUpdateItem]) -> Vec<BulkUpdateOutcome> {
        let outcomes: Vec<BulkUpdateOutcome> = items
            .iter()
            .map(|item| match self.update(&item.key, &item.fields) {
                Ok(_) => BulkUpdateOutcome {
                    key: item.key.clone(),
                    success: true,
                    error: None,
                },
                Err(e) => {
                    warn!(key = %item.key, error = %e, "批量更新单条失败");
                    BulkUpdateOutcome {
                        key: item.key.clone(),
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.success).count();
        info!(total = outcomes.len(), failed, "批量更新完成");
        outcomes
    }

    /// 复制字段定义
    ///
    /// 复制类型/规则/选项/分组/可见/必填等全部属性，key/label 取新值，order = max+1
    pub fn duplicate(&self, source_key: &str, new_key: &str, new_label: &str) -> SchemaResult<FieldDefinition> {
        let source = self.get(source_key)?;

        let new_key = new_key.trim();
        if !is_valid_field_key(new_key) {
            return Err(SchemaError::InvalidSchema(format!(
                "Invalid field key '{}': must start with a letter or underscore and contain only letters, digits and underscores",
                new_key
            )));
        }
        if self.repo.find_by_key(new_key)?.is_some() {
            return Err(SchemaError::Conflict(format!(
                "Field with key '{}' already exists",
                new_key
            )));
        }

        let mut copy = source.clone();
        copy.key = new_key.to_string();
        copy.label = new_label.to_string();
        copy.order = None;

        let created = self.create(copy)?;
        info!(source = %source_key, key = %created.key, "字段定义已复制");
        Ok(created)
    }

    /// 空库时写入默认字段集
    ///
    /// # 返回
    /// - 写入的字段数（非空库返回 0）
    pub fn initialize_defaults(&self) -> SchemaResult<usize> {
        if self.repo.count()? > 0 {
            debug!("字段定义已存在，跳过默认初始化");
            return Ok(0);
        }
        let defaults = default_shipment_fields();
        let inserted = self.repo.insert_batch(&defaults)?;
        info!(inserted, "默认字段定义已初始化");
        Ok(inserted)
    }

    /// 仅可见字段
    pub fn list_visible(&self) -> SchemaResult<Vec<FieldDefinition>> {
        Ok(self.list()?.into_iter().filter(|d| d.visible).collect())
    }

    /// 去重后的分组名（按列表顺序首次出现）
    pub fn list_groups(&self) -> SchemaResult<Vec<String>> {
        let mut groups: Vec<String> = Vec::new();
        for definition in self.list()? {
            if let Some(group) = definition.group_name() {
                if !groups.iter().any(|g| g == group) {
                    groups.push(group.to_string());
                }
            }
        }
        Ok(groups)
    }

    /// 类型清单
    pub fn type_descriptors(&self) -> Vec<FieldTypeDescriptor> {
        FieldType::ALL.iter().copied().map(FieldTypeDescriptor::for_type).collect()
    }
}

fn not_found(key: &str) -> SchemaError {
    SchemaError::NotFound(format!("Field with key '{}' not found", key))
}

fn conflict_on_unique(err: RepositoryError, key: &str) -> SchemaError {
    match err {
        RepositoryError::UniqueConstraintViolation(_) => {
            SchemaError::Conflict(format!("Field with key '{}' already exists", key))
        }
        other => SchemaError::Repository(other),
    }
}
