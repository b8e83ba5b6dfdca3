// ==========================================
// 需求供应规划系统 - 行字段编解码辅助
// ==========================================

use crate::domain::types::WarehouseCode;
use rusqlite::types::{Type, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// 解析仓库代码列
pub fn warehouse_column(idx: usize, raw: String) -> rusqlite::Result<WarehouseCode> {
    WarehouseCode::from_db_str(&raw).ok_or_else(|| conversion_error(idx, format!("未知仓库代码: {}", raw)))
}

/// 解析 JSON 列（NULL → None）
pub fn json_column<T: DeserializeOwned>(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<T>> {
    match raw {
        None => Ok(None),
        Some(s) => serde_json::from_str(&s)
            .map(Some)
            .map_err(|e| conversion_error(idx, e.to_string())),
    }
}

/// 序列化为 JSON 列值（None → NULL）
pub fn json_value<T: Serialize>(value: Option<&T>) -> Result<Value, serde_json::Error> {
    Ok(match value {
        Some(v) => Value::Text(serde_json::to_string(v)?),
        None => Value::Null,
    })
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub fn real(v: f64) -> Value {
    Value::Real(v)
}

pub fn opt_real(v: Option<f64>) -> Value {
    v.map(Value::Real).unwrap_or(Value::Null)
}

pub fn int(v: usize) -> Value {
    Value::Integer(v as i64)
}

pub fn flag(v: bool) -> Value {
    Value::Integer(v as i64)
}
