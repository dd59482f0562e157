// ==========================================
// 运单动态字段系统 - 上传文件暂存
// ==========================================
// 职责: 上传文件复制到暂存目录（uuid 命名），按 job_id 定位/删除
// 红线: job_id 只能是暂存目录下的文件名（禁止路径穿越）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// 已暂存的文件
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub job_id: String,
    pub path: PathBuf,
    pub original_file_name: String,
}

pub struct ImportStaging {
    dir: PathBuf,
}

impl ImportStaging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 复制源文件到暂存目录
    pub fn stage_file(&self, source: &Path) -> ImportResult<StagedFile> {
        if !source.is_file() {
            return Err(ImportError::FileNotFound(source.display().to_string()));
        }
        let original_file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let staged = self.allocate(&original_file_name)?;
        fs::copy(source, &staged.path)
            .map_err(|e| ImportError::StagingError(format!("{}: {}", staged.path.display(), e)))?;

        debug!(job_id = %staged.job_id, source = %source.display(), "文件已暂存");
        Ok(staged)
    }

    /// 以原始字节写入暂存目录
    pub fn stage_bytes(&self, file_name: &str, bytes: &[u8]) -> ImportResult<StagedFile> {
        let staged = self.allocate(file_name)?;
        fs::write(&staged.path, bytes)
            .map_err(|e| ImportError::StagingError(format!("{}: {}", staged.path.display(), e)))?;

        debug!(job_id = %staged.job_id, bytes = bytes.len(), "上传内容已暂存");
        Ok(staged)
    }

    /// 按 job_id 定位暂存文件（不存在返回 FileNotFound）
    pub fn resolve(&self, job_id: &str) -> ImportResult<PathBuf> {
        if !is_safe_job_id(job_id) {
            return Err(ImportError::FileNotFound(format!("非法的暂存文件引用: {}", job_id)));
        }
        let path = self.dir.join(job_id);
        if !path.is_file() {
            return Err(ImportError::FileNotFound(format!("暂存文件不存在: {}", job_id)));
        }
        Ok(path)
    }

    /// 删除暂存文件
    ///
    /// # 返回
    /// - true: 已删除
    /// - false: 文件不存在或删除失败（失败时记录告警）
    pub fn remove(&self, job_id: &str) -> bool {
        if !is_safe_job_id(job_id) {
            return false;
        }
        let path = self.dir.join(job_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(job_id = %job_id, "暂存文件已删除");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "暂存文件删除失败");
                false
            }
        }
    }

    fn allocate(&self, original_file_name: &str) -> ImportResult<StagedFile> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| ImportError::StagingError(format!("{}: {}", self.dir.display(), e)))?;

        let ext = Path::new(original_file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .filter(|e| !e.is_empty());
        let job_id = match ext {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        Ok(StagedFile {
            path: self.dir.join(&job_id),
            job_id,
            original_file_name: original_file_name.to_string(),
        })
    }
}

/// job_id 只能是单层文件名
pub fn is_safe_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && !job_id.contains(['/', '\\'])
        && job_id != "."
        && job_id != ".."
        && !job_id.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_stage_resolve_remove() {
        let dir = tempfile::tempdir().unwrap();
        let staging = ImportStaging::new(dir.path().join("staging"));

        let mut source = tempfile::Builder::new().suffix(".CSV").tempfile().unwrap();
        writeln!(source, "a,b").unwrap();

        let staged = staging.stage_file(source.path()).unwrap();
        assert!(staged.job_id.ends_with(".csv"));
        assert_eq!(staging.resolve(&staged.job_id).unwrap(), staged.path);

        assert!(staging.remove(&staged.job_id));
        assert!(!staging.remove(&staged.job_id));
        assert!(matches!(staging.resolve(&staged.job_id), Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let staging = ImportStaging::new(dir.path());
        assert!(staging.resolve("../secret.csv").is_err());
        assert!(!is_safe_job_id("a/b.csv"));
        assert!(!is_safe_job_id(".."));
        assert!(is_safe_job_id("0b7c.csv"));
    }

    #[test]
    fn test_stage_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let staging = ImportStaging::new(dir.path());
        let staged = staging.stage_bytes("upload.xlsx", b"PK").unwrap();
        assert_eq!(staged.original_file_name, "upload.xlsx");
        assert_eq!(fs::read(&staged.path).unwrap(), b"PK");
    }
}
