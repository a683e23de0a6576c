// ==========================================
// 钢铁物质流分析 - 导入层
// ==========================================
// 职责: 外部表格 (CSV / Excel) → 模型输入
// 红线: 只做解析与对齐,不做计算
// ==========================================

pub mod error;
pub mod file_parser;
pub mod table_loader;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawTable, UniversalFileParser};
pub use table_loader::{TableLoader, WideTable};
