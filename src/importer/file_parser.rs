// ==========================================
// 运单动态字段系统 - 文件解析器实现
// ==========================================
// 支持: 分隔文本 (.csv/.tsv/.txt) / 工作簿 (.xlsx/.xls/.xlsm/.xlsb/.ods)
// 输出: ParsedSheet（表头去重 + 空白行跳过 + 单元格 trim）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::excel_serial_to_datetime;
use crate::importer::importer_trait::{FileParser, ParsedSheet};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// 分隔文本扩展名
pub const DELIMITED_EXTENSIONS: [&str; 3] = ["csv", "tsv", "txt"];

/// 工作簿扩展名
pub const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xls", "xlsm", "xlsb", "ods"];

/// 是否支持该扩展名（不区分大小写）
pub fn is_supported_extension(ext: &str) -> bool {
    let ext = ext.to_lowercase();
    DELIMITED_EXTENSIONS.contains(&ext.as_str()) || WORKBOOK_EXTENSIONS.contains(&ext.as_str())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// 表头去重: 空白表头 → "Column N"，重复表头 → "Name (2)"
pub fn disambiguate_headers(raw: &[String]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::with_capacity(raw.len());
    for (idx, header) in raw.iter().enumerate() {
        let base = match header.trim() {
            "" => format!("Column {}", idx + 1),
            trimmed => trimmed.to_string(),
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while headers.contains(&candidate) {
            candidate = format!("{} ({})", base, n);
            n += 1;
        }
        headers.push(candidate);
    }
    headers
}

/// 组装行记录（缺失单元格视为空串；全空行返回 None）
fn build_row(headers: &[String], cells: Vec<String>) -> Option<BTreeMap<String, String>> {
    if cells.iter().all(|c| c.is_empty()) {
        return None;
    }
    let mut row = BTreeMap::new();
    for (idx, header) in headers.iter().enumerate() {
        row.insert(header.clone(), cells.get(idx).cloned().unwrap_or_default());
    }
    Some(row)
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 分隔符: .tsv 为制表符；.txt 按首行嗅探；其余为逗号
    fn detect_delimiter(path: &Path) -> ImportResult<u8> {
        match extension_of(path).as_str() {
            "tsv" => Ok(b'\t'),
            "txt" => {
                let mut first_line = String::new();
                BufReader::new(File::open(path)?).read_line(&mut first_line)?;
                let candidates = [b',', b'\t', b';', b'|'];
                let best = candidates
                    .iter()
                    .copied()
                    .max_by_key(|d| first_line.bytes().filter(|b| b == d).count())
                    .unwrap_or(b',');
                if first_line.bytes().any(|b| b == best) {
                    Ok(best)
                } else {
                    Ok(b',')
                }
            }
            _ => Ok(b','),
        }
    }
}

impl FileParser for CsvParser {
    fn parse(&self, file_path: &Path) -> ImportResult<ParsedSheet> {
        let path = file_path;

        // 检查文件存在
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let delimiter = Self::detect_delimiter(path)?;
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        // 读取表头（去除 UTF-8 BOM）
        let raw_headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        if raw_headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::EmptyFile(path.display().to_string()));
        }
        let headers = disambiguate_headers(&raw_headers);

        // 读取所有行
        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let cells: Vec<String> = record.iter().map(|v| v.trim().to_string()).collect();
            // 跳过完全空白的行
            if let Some(row) = build_row(&headers, cells) {
                rows.push(row);
            }
        }

        Ok(ParsedSheet { headers, rows })
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse(&self, file_path: &Path) -> ImportResult<ParsedSheet> {
        let path = file_path;

        // 检查文件存在
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        // 打开工作簿（按扩展名自动识别格式）
        let mut workbook = open_workbook_auto(path)?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("工作簿无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        // 提取表头（第一行）
        let mut rows_iter = range.rows();
        let header_row = rows_iter
            .next()
            .ok_or_else(|| ImportError::EmptyFile(path.display().to_string()))?;
        let raw_headers: Vec<String> = header_row.iter().map(cell_to_string).collect();
        if raw_headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::EmptyFile(path.display().to_string()));
        }
        let headers = disambiguate_headers(&raw_headers);

        // 读取数据行
        let mut rows = Vec::new();
        for data_row in rows_iter {
            let cells: Vec<String> = data_row.iter().map(cell_to_string).collect();
            // 跳过完全空白的行
            if let Some(row) = build_row(&headers, cells) {
                rows.push(row);
            }
        }

        Ok(ParsedSheet { headers, rows })
    }
}

/// 工作簿单元格 → 文本
///
/// 整数形式的浮点数不带小数（110001.0 → "110001"），日期单元格转为 ISO 文本
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(ndt) if ndt.time() == chrono::NaiveTime::MIN => ndt.date().format("%Y-%m-%d").to_string(),
            Some(ndt) => ndt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::Error(e) => {
            tracing::debug!(error = ?e, "单元格包含错误值，按空白处理");
            String::new()
        }
        other => other.to_string().trim().to_string(),
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse(&self, file_path: &Path) -> ImportResult<ParsedSheet> {
        let ext = extension_of(file_path);

        if DELIMITED_EXTENSIONS.contains(&ext.as_str()) {
            CsvParser.parse(file_path)
        } else if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
            ExcelParser.parse(file_path)
        } else {
            Err(ImportError::UnsupportedFileType(if ext.is_empty() {
                "(无扩展名)".to_string()
            } else {
                ext
            }))
        }
    }
}
