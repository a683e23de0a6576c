// ==========================================
// 钢铁物质流分析 - 输入表加载器
// ==========================================
// 表格式:
// - 宽表: region,<year>,<year>,...   (历史净贸易 / 上限序列)
// - 类别表: region,<category>,...    (间接贸易份额)
// - DSM 长表: region,category,scenario,year,inflow,outflow[,stock]
// 文件: <data_path>/<stem>.csv | .xlsx | .xls
// ==========================================

use crate::config::{ModelConfig, TradeWindow};
use crate::domain::types::Dimensions;
use crate::engine::inputs::{ModelInputs, TradeHistory};
use crate::engine::stock::DsmOutput;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{RawTable, UniversalFileParser};
use ndarray::{Array2, Array3, Array4};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

// ===== 默认文件名 =====
pub const DSM_TABLE: &str = "dsm";
pub const CRUDE_TRADE_TABLE: &str = "crude_trade";
pub const SCRAP_TRADE_TABLE: &str = "scrap_trade";
pub const INDIRECT_TRADE_TABLE: &str = "indirect_trade";
pub const INDIRECT_SHARES_TABLE: &str = "indirect_trade_shares";
pub const MAX_SCRAP_SHARE_TABLE: &str = "max_scrap_share";

const SUPPORTED_EXTENSIONS: [&str; 3] = ["csv", "xlsx", "xls"];

fn parse_number(table: &RawTable, row: usize, field: &str, raw: &str) -> ImportResult<f64> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    let value = raw.parse::<f64>().map_err(|e| ImportError::TypeConversionError {
        row: row + 2,
        field: format!("{}.{}", table.name, field),
        message: e.to_string(),
    })?;
    // "NaN" / "inf" 可被 f64 解析,但不是合法的质量
    if !value.is_finite() {
        return Err(ImportError::NonFiniteValue {
            table: table.name.clone(),
            row: row + 2,
            field: field.to_string(),
            value: raw.to_string(),
        });
    }
    Ok(value)
}

/// 宽表: 按区域 → 年份 → 数值
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub name: String,
    pub years: Vec<i32>,
    pub values: HashMap<String, HashMap<i32, f64>>,
}

impl WideTable {
    /// 从原始表解析（首列为区域,其余列名为年份）
    pub fn from_raw(table: &RawTable) -> ImportResult<Self> {
        let mut years = Vec::new();
        let mut year_columns = Vec::new();
        for (idx, header) in table.headers.iter().enumerate().skip(1) {
            // 非年份列（如备注）忽略
            if let Ok(year) = header.trim_end_matches(".0").parse::<i32>() {
                years.push(year);
                year_columns.push((idx, year));
            }
        }

        let mut values = HashMap::new();
        for (row_idx, row) in table.rows.iter().enumerate() {
            let Some(region) = row.first() else {
                continue;
            };
            let mut series = HashMap::new();
            for (col, year) in &year_columns {
                let raw = row.get(*col).map(String::as_str).unwrap_or("");
                series.insert(*year, parse_number(table, row_idx, &year.to_string(), raw)?);
            }
            values.insert(region.clone(), series);
        }

        Ok(Self {
            name: table.name.clone(),
            years,
            values,
        })
    }

    /// 按区域顺序取年份区间 (t, r)
    pub fn select(&self, regions: &[String], first_year: i32, last_year: i32) -> ImportResult<Array2<f64>> {
        let n_t = (last_year - first_year + 1).max(0) as usize;
        let mut out = Array2::<f64>::zeros((n_t, regions.len()));

        for (r, region) in regions.iter().enumerate() {
            let series = self.values.get(region).ok_or_else(|| ImportError::MissingRegion {
                table: self.name.clone(),
                region: region.clone(),
            })?;
            for (t, year) in (first_year..=last_year).enumerate() {
                out[[t, r]] = *series.get(&year).ok_or_else(|| ImportError::MissingYear {
                    table: self.name.clone(),
                    year,
                })?;
            }
        }
        Ok(out)
    }
}

// ==========================================
// TableLoader - 输入表加载器
// ==========================================
pub struct TableLoader {
    data_path: PathBuf,
    parser: UniversalFileParser,
}

impl TableLoader {
    pub fn new<P: AsRef<Path>>(data_path: P) -> Self {
        Self {
            data_path: data_path.as_ref().to_path_buf(),
            parser: UniversalFileParser,
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// 按文件名主干查找表文件（依次尝试 csv / xlsx / xls）
    pub fn find_table(&self, stem: &str) -> Option<PathBuf> {
        SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| self.data_path.join(format!("{}.{}", stem, ext)))
            .find(|path| path.exists())
    }

    fn read_table(&self, stem: &str) -> ImportResult<RawTable> {
        let path = self.find_table(stem).ok_or_else(|| {
            ImportError::FileNotFound(self.data_path.join(format!("{}.csv", stem)).display().to_string())
        })?;
        let table = self.parser.parse(&path)?;
        if table.rows.is_empty() {
            return Err(ImportError::EmptyTable(table.name));
        }
        debug!(table = %table.name, rows = table.rows.len(), "读取输入表");
        Ok(table)
    }

    fn read_optional_table(&self, stem: &str) -> ImportResult<Option<RawTable>> {
        match self.find_table(stem) {
            Some(_) => self.read_table(stem).map(Some),
            None => Ok(None),
        }
    }

    /// 历史净贸易 (t_known, r)
    pub fn load_net_trade(&self, stem: &str, regions: &[String], window: TradeWindow) -> ImportResult<Array2<f64>> {
        let table = WideTable::from_raw(&self.read_table(stem)?)?;
        table.select(regions, window.first_year, window.last_year)
    }

    /// 类别份额表 (r, g)
    pub fn load_share_table(&self, stem: &str, regions: &[String], categories: &[String]) -> ImportResult<Array2<f64>> {
        let table = self.read_table(stem)?;
        let columns = categories
            .iter()
            .map(|c| table.require_column(c))
            .collect::<ImportResult<Vec<_>>>()?;

        let mut out = Array2::<f64>::zeros((regions.len(), categories.len()));
        for (r, region) in regions.iter().enumerate() {
            let (row_idx, row) = table
                .rows
                .iter()
                .enumerate()
                .find(|(_, row)| row.first() == Some(region))
                .ok_or_else(|| ImportError::MissingRegion {
                    table: table.name.clone(),
                    region: region.clone(),
                })?;
            for (g, col) in columns.iter().enumerate() {
                let raw = row.get(*col).map(String::as_str).unwrap_or("");
                out[[r, g]] = parse_number(&table, row_idx, &categories[g], raw)?;
            }
        }
        Ok(out)
    }

    /// 区域列表（按 DSM 表首次出现顺序）
    pub fn load_regions(&self) -> ImportResult<Vec<String>> {
        let table = self.read_table(DSM_TABLE)?;
        let col = table.require_column("region")?;
        let mut regions: Vec<String> = Vec::new();
        for row in &table.rows {
            if let Some(region) = row.get(col) {
                if !region.is_empty() && !regions.contains(region) {
                    regions.push(region.clone());
                }
            }
        }
        Ok(regions)
    }

    /// DSM 长表 → (t, r, g, s); 缺失单元取 0
    pub fn load_dsm(&self, dimensions: &Dimensions) -> ImportResult<DsmOutput> {
        let table = self.read_table(DSM_TABLE)?;
        let region_col = table.require_column("region")?;
        let category_col = table.require_column("category")?;
        let scenario_col = table.require_column("scenario")?;
        let year_col = table.require_column("year")?;
        let inflow_col = table.require_column("inflow")?;
        let outflow_col = table.require_column("outflow")?;
        let stock_col = table.column("stock");

        let (n_t, n_r, n_s) = dimensions.trs();
        let shape = (n_t, n_r, dimensions.n_goods(), n_s);
        let mut inflows = Array4::<f64>::zeros(shape);
        let mut outflows = Array4::<f64>::zeros(shape);
        let mut stocks = stock_col.map(|_| Array4::<f64>::zeros(shape));

        let lookup = |values: &[String], key: &str, kind: &str, row: usize| {
            values.iter().position(|v| v == key).ok_or_else(|| ImportError::UnknownKey {
                table: table.name.clone(),
                kind: kind.to_string(),
                value: key.to_string(),
                row: row + 2,
            })
        };
        let cell = |row: &Vec<String>, col: usize| row.get(col).cloned().unwrap_or_default();

        let mut skipped_years = 0usize;
        for (row_idx, row) in table.rows.iter().enumerate() {
            let year_raw = cell(row, year_col);
            let year = year_raw
                .trim_end_matches(".0")
                .parse::<i32>()
                .map_err(|e| ImportError::TypeConversionError {
                    row: row_idx + 2,
                    field: "year".to_string(),
                    message: e.to_string(),
                })?;
            let Some(t) = dimensions.year_index(year) else {
                skipped_years += 1;
                continue;
            };
            let r = lookup(dimensions.regions.as_slice(), cell(row, region_col).as_str(), "区域", row_idx)?;
            let g = lookup(dimensions.goods.as_slice(), cell(row, category_col).as_str(), "类别", row_idx)?;
            let s = lookup(dimensions.scenarios.as_slice(), cell(row, scenario_col).as_str(), "情景", row_idx)?;

            inflows[[t, r, g, s]] = parse_number(&table, row_idx, "inflow", &cell(row, inflow_col))?;
            outflows[[t, r, g, s]] = parse_number(&table, row_idx, "outflow", &cell(row, outflow_col))?;
            if let (Some(stocks), Some(col)) = (stocks.as_mut(), stock_col) {
                stocks[[t, r, g, s]] = parse_number(&table, row_idx, "stock", &cell(row, col))?;
            }
        }

        if skipped_years > 0 {
            warn!(rows = skipped_years, "DSM 表中有年份超出模型范围,已忽略");
        }
        Ok(DsmOutput::new(stocks, inflows, outflows))
    }

    /// 废钢占比上限序列: 宽表 (r × 年份),自切换年份起,各情景相同
    pub fn load_max_scrap_share_series(
        &self,
        dimensions: &Dimensions,
        break_year: i32,
    ) -> ImportResult<Option<Array3<f64>>> {
        let Some(raw) = self.read_optional_table(MAX_SCRAP_SHARE_TABLE)? else {
            return Ok(None);
        };
        let table = WideTable::from_raw(&raw)?;
        let by_year = table.select(&dimensions.regions, break_year, dimensions.last_year())?;

        let (n_t, n_r) = by_year.dim();
        let n_s = dimensions.n_scenarios();
        let series = Array3::from_shape_fn((n_t, n_r, n_s), |(t, r, _)| by_year[[t, r]]);
        Ok(Some(series))
    }

    /// 加载全部模型输入
    ///
    /// # 说明
    /// - 份额表与上限序列为可选表,缺失时为 None
    /// - 外部上游数组不从表加载
    #[instrument(skip_all, fields(data_path = %self.data_path.display()))]
    pub fn load_inputs(&self, config: &ModelConfig) -> ImportResult<ModelInputs> {
        let regions = self.load_regions()?;
        let dimensions = Dimensions::new(
            config.years(),
            config.elements.clone(),
            regions.clone(),
            config.in_use_categories.clone(),
            config.recycling_categories.clone(),
            config.scenarios.clone(),
        )
        .map_err(|e| ImportError::InternalError(e.to_string()))?;

        let dsm = self.load_dsm(&dimensions)?;
        let trade = TradeHistory {
            crude: self.load_net_trade(CRUDE_TRADE_TABLE, &regions, config.trade.crude)?,
            scrap: self.load_net_trade(SCRAP_TRADE_TABLE, &regions, config.trade.scrap)?,
            indirect: self.load_net_trade(INDIRECT_TRADE_TABLE, &regions, config.trade.indirect)?,
            indirect_shares: match self.find_table(INDIRECT_SHARES_TABLE) {
                Some(_) => Some(self.load_share_table(
                    INDIRECT_SHARES_TABLE,
                    &regions,
                    &config.in_use_categories,
                )?),
                None => None,
            },
        };

        let mut inputs = ModelInputs::new(regions, dsm, trade);
        if let Some(break_year) = config.max_scrap_share.break_year {
            inputs.max_scrap_share_series = self.load_max_scrap_share_series(&dimensions, break_year)?;
        }

        info!(
            regions = inputs.regions.len(),
            has_shares = inputs.trade.indirect_shares.is_some(),
            has_max_share_series = inputs.max_scrap_share_series.is_some(),
            "模型输入加载完成"
        );
        Ok(inputs)
    }
}
