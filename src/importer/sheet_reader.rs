// ==========================================
// 需求供应规划系统 - 工作表读取与字段映射
// ==========================================
// 流程: 单元格 → 按行聚合(HashMap<列名, 值>) → 类型化输入行
// 约束: 表头行偏移为各工作表类型的固定常量，不自动探测
// ==========================================

use crate::domain::demand::RawDemandRow;
use crate::domain::lookup::{
    CapacityTable, CountryMapping, CountryMappingRow, EnvironmentNormRow, FactoryCapacityRow,
    FreightCostTable, FreightRateRow, LookupTables, ProductRow, ProductTable, WarehouseStockRow,
    WarehouseStockTable,
};
use crate::domain::types::{ProductionEnvironment, WarehouseCode};
use crate::importer::cell_store::CellStore;
use crate::importer::error::{ImportError, ImportResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

// ==========================================
// SheetKind - 逻辑工作表类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetKind {
    Demand,
    CountryMap,
    EnvNorms,
    FactoryCapacity,
    Freight,
    Product,
    WarehouseStock,
}

impl SheetKind {
    pub fn sheet_name(&self) -> &'static str {
        match self {
            SheetKind::Demand => "DEMAND",
            SheetKind::CountryMap => "COUNTRY_MAP",
            SheetKind::EnvNorms => "ENV_NORMS",
            SheetKind::FactoryCapacity => "FACTORY_CAPACITY",
            SheetKind::Freight => "FREIGHT",
            SheetKind::Product => "PRODUCT",
            SheetKind::WarehouseStock => "WAREHOUSE_STOCK",
        }
    }

    /// 表头所在行（0 起），数据行从下一行开始
    pub fn header_row(&self) -> usize {
        match self {
            // 需求表前两行为标题/说明
            SheetKind::Demand => 2,
            _ => 0,
        }
    }

    pub fn is_required(&self) -> bool {
        !matches!(self, SheetKind::Product | SheetKind::WarehouseStock)
    }

    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            SheetKind::Demand => &[
                "Geography",
                "Market",
                "SKU",
                "Month",
                "Cases",
                "Classification",
                "Origin",
            ],
            SheetKind::CountryMap => &["Geography", "Market", "Country"],
            SheetKind::EnvNorms => &["SKU", "Environment", "InventoryDays", "OpeningStockDays"],
            SheetKind::FactoryCapacity => &["SKU", "Factory", "MonthlyCapacity"],
            SheetKind::Freight => &["Factory", "Country", "SKU", "Rate"],
            SheetKind::Product => &["SKU", "WeightPerUnit"],
            SheetKind::WarehouseStock => &["Warehouse", "SKU", "OpeningStock", "MonthlyCapacity"],
        }
    }
}

/// 列名标准化（TRIM + 小写）
fn column_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// 编码类字段清洗：去空白，数值型编码去掉 ".0" 尾巴（如 "100.0" → "100"）
pub fn clean_code(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(int_part) = trimmed.strip_suffix(".0") {
        if !int_part.is_empty() && int_part.chars().all(|c| c.is_ascii_digit()) {
            return int_part.to_string();
        }
    }
    trimmed.to_string()
}

// ==========================================
// SheetRow - 按列名索引的一行
// ==========================================
#[derive(Debug, Clone)]
pub struct SheetRow {
    pub row_index: usize,
    values: HashMap<String, String>,
}

impl SheetRow {
    pub fn get(&self, column: &str) -> &str {
        self.values
            .get(&column_key(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn get_f64(&self, sheet: SheetKind, column: &str) -> ImportResult<f64> {
        let raw = self.get(column).trim();
        if raw.is_empty() {
            return Ok(0.0);
        }
        raw.parse::<f64>()
            .map_err(|_| ImportError::TypeConversionError {
                sheet: sheet.sheet_name().to_string(),
                row: self.row_index,
                field: column.to_string(),
                value: raw.to_string(),
            })
    }
}

// ==========================================
// SheetReader
// ==========================================
pub struct SheetReader<'a, S: CellStore + ?Sized> {
    store: &'a S,
    batch_id: &'a str,
}

impl<'a, S: CellStore + ?Sized> SheetReader<'a, S> {
    pub fn new(store: &'a S, batch_id: &'a str) -> Self {
        Self { store, batch_id }
    }

    /// 读取一个工作表的数据行
    ///
    /// # 返回
    /// - Ok(Some(rows)): 工作表存在
    /// - Ok(None): 可选工作表不存在
    /// - Err(SheetMissing / ColumnMissing): 必需工作表缺失或表头不完整
    pub fn read_rows(&self, kind: SheetKind) -> ImportResult<Option<Vec<SheetRow>>> {
        let cells = self.store.read_sheet(self.batch_id, kind.sheet_name())?;
        if cells.is_empty() {
            if kind.is_required() {
                return Err(ImportError::SheetMissing {
                    sheet: kind.sheet_name().to_string(),
                });
            }
            debug!(sheet = kind.sheet_name(), "可选工作表不存在，跳过");
            return Ok(None);
        }

        let present: HashSet<String> = cells.iter().map(|c| column_key(&c.column_name)).collect();
        for column in kind.required_columns() {
            if !present.contains(&column_key(column)) {
                return Err(ImportError::ColumnMissing {
                    sheet: kind.sheet_name().to_string(),
                    column: column.to_string(),
                });
            }
        }

        let header_row = kind.header_row();
        let mut grouped: BTreeMap<usize, HashMap<String, String>> = BTreeMap::new();
        for cell in cells.into_iter().filter(|c| c.row_index > header_row) {
            let value = cell.value.unwrap_or_default().trim().to_string();
            grouped
                .entry(cell.row_index)
                .or_default()
                .insert(column_key(&cell.column_name), value);
        }

        let rows: Vec<SheetRow> = grouped
            .into_iter()
            // 跳过完全空白的行
            .filter(|(_, values)| values.values().any(|v| !v.is_empty()))
            .map(|(row_index, values)| SheetRow { row_index, values })
            .collect();

        debug!(sheet = kind.sheet_name(), rows = rows.len(), "工作表读取完成");
        Ok(Some(rows))
    }

    fn required_rows(&self, kind: SheetKind) -> ImportResult<Vec<SheetRow>> {
        Ok(self.read_rows(kind)?.unwrap_or_default())
    }

    // ==========================================
    // 类型化映射
    // ==========================================

    pub fn demand_rows(&self) -> ImportResult<Vec<RawDemandRow>> {
        Ok(self
            .required_rows(SheetKind::Demand)?
            .into_iter()
            .map(|row| RawDemandRow {
                row_index: row.row_index,
                geography: row.get("Geography").to_string(),
                market: row.get("Market").to_string(),
                sku: clean_code(row.get("SKU")),
                month_raw: row.get("Month").to_string(),
                value_raw: row.get("Cases").to_string(),
                classification: row.get("Classification").to_string(),
                origin: row.get("Origin").to_string(),
            })
            .collect())
    }

    pub fn country_mapping_rows(&self) -> ImportResult<Vec<CountryMappingRow>> {
        Ok(self
            .required_rows(SheetKind::CountryMap)?
            .into_iter()
            .map(|row| CountryMappingRow {
                geography: row.get("Geography").to_string(),
                market: row.get("Market").to_string(),
                country_code: row.get("Country").to_string(),
            })
            .collect())
    }

    pub fn environment_norm_rows(&self) -> ImportResult<Vec<EnvironmentNormRow>> {
        let kind = SheetKind::EnvNorms;
        self.required_rows(kind)?
            .into_iter()
            .map(|row| {
                Ok(EnvironmentNormRow {
                    sku: clean_code(row.get("SKU")),
                    environment: ProductionEnvironment::from_db_str(row.get("Environment")),
                    inventory_days: row.get_f64(kind, "InventoryDays")?,
                    opening_stock_days: row.get_f64(kind, "OpeningStockDays")?,
                })
            })
            .collect()
    }

    pub fn factory_capacity_rows(&self) -> ImportResult<Vec<FactoryCapacityRow>> {
        let kind = SheetKind::FactoryCapacity;
        self.required_rows(kind)?
            .into_iter()
            .map(|row| {
                Ok(FactoryCapacityRow {
                    sku: clean_code(row.get("SKU")),
                    factory: clean_code(row.get("Factory")),
                    monthly_capacity: row.get_f64(kind, "MonthlyCapacity")?,
                })
            })
            .collect()
    }

    pub fn freight_rows(&self) -> ImportResult<Vec<FreightRateRow>> {
        let kind = SheetKind::Freight;
        self.required_rows(kind)?
            .into_iter()
            .map(|row| {
                Ok(FreightRateRow {
                    factory: clean_code(row.get("Factory")),
                    country: row.get("Country").to_string(),
                    sku: clean_code(row.get("SKU")),
                    rate: row.get_f64(kind, "Rate")?,
                })
            })
            .collect()
    }

    pub fn product_rows(&self) -> ImportResult<Vec<ProductRow>> {
        let kind = SheetKind::Product;
        self.read_rows(kind)?
            .unwrap_or_default()
            .into_iter()
            .map(|row| {
                Ok(ProductRow {
                    sku: clean_code(row.get("SKU")),
                    weight_per_unit: row.get_f64(kind, "WeightPerUnit")?,
                })
            })
            .collect()
    }

    pub fn warehouse_stock_rows(&self) -> ImportResult<Vec<WarehouseStockRow>> {
        let kind = SheetKind::WarehouseStock;
        let mut out = Vec::new();
        for row in self.read_rows(kind)?.unwrap_or_default() {
            let raw = row.get("Warehouse");
            let warehouse =
                WarehouseCode::from_db_str(raw).ok_or_else(|| ImportError::TypeConversionError {
                    sheet: kind.sheet_name().to_string(),
                    row: row.row_index,
                    field: "Warehouse".to_string(),
                    value: raw.to_string(),
                })?;
            out.push(WarehouseStockRow {
                warehouse,
                sku: clean_code(row.get("SKU")),
                opening_stock: row.get_f64(kind, "OpeningStock")?,
                monthly_capacity: row.get_f64(kind, "MonthlyCapacity")?,
            });
        }
        Ok(out)
    }

    /// 构建一次运行的只读查找表
    pub fn lookup_tables(&self) -> ImportResult<LookupTables> {
        let tables = LookupTables {
            country_mapping: CountryMapping::from_rows(self.country_mapping_rows()?),
            capacity: CapacityTable::from_rows(
                self.environment_norm_rows()?,
                self.factory_capacity_rows()?,
            ),
            freight: FreightCostTable::from_rows(self.freight_rows()?),
            products: ProductTable::from_rows(self.product_rows()?),
            warehouse_stock: WarehouseStockTable::from_rows(self.warehouse_stock_rows()?),
        };

        info!(
            batch_id = %self.batch_id,
            country_mappings = tables.country_mapping.len(),
            "查找表构建完成"
        );
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::cell_store::MemoryCellStore;

    #[test]
    fn test_clean_code() {
        assert_eq!(clean_code(" 100.0 "), "100");
        assert_eq!(clean_code("100"), "100");
        assert_eq!(clean_code("A1.0"), "A1.0");
        assert_eq!(clean_code("F1"), "F1");
    }

    #[test]
    fn test_demand_header_offset_skips_title_rows() {
        let store = MemoryCellStore::new();
        // 标题行（0/1）不应被当作数据
        store.put_cells(
            "B1",
            "DEMAND",
            vec![crate::importer::cell_store::RawCell::new(0, 0, "Geography", "Demand Plan 2026")],
        );
        store.put_table(
            "B1",
            "DEMAND",
            2,
            &["Geography", "Market", "SKU", "Month", "Cases", "Classification", "Origin"],
            &[
                vec!["Saudi Arabia", "Retail", "100.0", "05", "50", "", "Local"],
                vec!["", "", "", "", "", "", ""],
            ],
        );

        let reader = SheetReader::new(&store, "B1");
        let rows = reader.demand_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sku, "100");
        assert_eq!(rows[0].month_raw, "05");
        assert_eq!(rows[0].row_index, 3);
    }

    #[test]
    fn test_missing_required_sheet() {
        let store = MemoryCellStore::new();
        let reader = SheetReader::new(&store, "B1");
        let err = reader.country_mapping_rows().unwrap_err();
        assert!(matches!(err, ImportError::SheetMissing { ref sheet } if sheet == "COUNTRY_MAP"));
    }

    #[test]
    fn test_missing_required_column() {
        let store = MemoryCellStore::new();
        store.put_table("B1", "FREIGHT", 0, &["Factory", "Country", "SKU"], &[vec!["F1", "KSA", "100"]]);
        let reader = SheetReader::new(&store, "B1");
        let err = reader.freight_rows().unwrap_err();
        assert!(matches!(err, ImportError::ColumnMissing { ref column, .. } if column == "Rate"));
    }

    #[test]
    fn test_optional_sheet_absent_is_empty() {
        let store = MemoryCellStore::new();
        let reader = SheetReader::new(&store, "B1");
        assert!(reader.product_rows().unwrap().is_empty());
        assert!(reader.warehouse_stock_rows().unwrap().is_empty());
    }

    #[test]
    fn test_bad_number_in_lookup_sheet_is_error() {
        let store = MemoryCellStore::new();
        store.put_table(
            "B1",
            "FACTORY_CAPACITY",
            0,
            &["SKU", "Factory", "MonthlyCapacity"],
            &[vec!["100", "F1", "lots"]],
        );
        let reader = SheetReader::new(&store, "B1");
        let err = reader.factory_capacity_rows().unwrap_err();
        assert!(matches!(err, ImportError::TypeConversionError { row: 1, .. }));
    }
}
