// ==========================================
// 运单动态字段系统 - 导入层
// ==========================================
// 职责: 表格文件批量导入运单（预览 → 执行）
// 支持: CSV / TSV / TXT / Excel / ODS
// ==========================================

// 模块声明
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod importer_trait;
pub mod shipment_importer;
pub mod staging;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use field_mapper::FragmentFieldMapper;
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use shipment_importer::ShipmentImporterImpl;
pub use staging::{ImportStaging, StagedFile};

// 重导出 Trait 接口
pub use importer_trait::{FieldMapper, FileParser, ParsedSheet, ShipmentImporter};
