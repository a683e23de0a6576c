// ==========================================
// 钢铁物质流分析 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 表结构错误 =====
    #[error("表 {table} 缺少列: {column}")]
    MissingColumn { table: String, column: String },

    #[error("类型转换失败 (行 {row}, 字段 {field}): {message}")]
    TypeConversionError {
        row: usize,
        field: String,
        message: String,
    },

    #[error("表 {table} 含非有限数值 (行 {row}, 字段 {field}): {value}")]
    NonFiniteValue {
        table: String,
        row: usize,
        field: String,
        value: String,
    },

    // ===== 数据覆盖错误 =====
    #[error("表 {table} 缺少区域: {region}")]
    MissingRegion { table: String, region: String },

    #[error("表 {table} 缺少年份: {year}")]
    MissingYear { table: String, year: i32 },

    #[error("表 {table} 含未知{kind}: {value} (行 {row})")]
    UnknownKey {
        table: String,
        kind: String,
        value: String,
        row: usize,
    },

    #[error("表 {0} 无数据行")]
    EmptyTable(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
