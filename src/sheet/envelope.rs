use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::LoadError;
use crate::row::Row;

pub static STATUS_OK: &str = "ok";

/// gviz 响应：{status, table:{cols:[{label}], rows:[{c:[{v,f}]}]}}
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub status: String,
    #[serde(default)]
    pub table: Option<Table>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Table {
    #[serde(default, deserialize_with = "null_as_default")]
    pub cols: Vec<Option<Column>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rows: Vec<Option<TableRow>>,
}

#[derive(Debug, Deserialize)]
pub struct Column {
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TableRow {
    #[serde(default, deserialize_with = "null_as_default")]
    pub c: Vec<Option<Cell>>,
}

#[derive(Debug, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub v: Option<Value>,
    #[serde(default)]
    pub f: Option<String>,
}

// 缺失和显式的 null 都按空值处理
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Cell {
    /// 优先原始值，其次格式化文字
    pub fn value(&self) -> Value {
        match (&self.v, &self.f) {
            (Some(v), _) if !v.is_null() => v.clone(),
            (_, Some(f)) => Value::String(f.clone()),
            _ => Value::String(String::new()),
        }
    }
}

/// 响应外面包了一层函数调用，取第一个 `{` 到最后一个 `}` 之间的部分
pub fn extract_json(body: &str) -> Result<&str, LoadError> {
    let start = body.find('{');
    let end = body.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&body[start..=end]),
        _ => Err(LoadError::Parse("响应中找不到 JSON 内容".to_string())),
    }
}

#[instrument(skip_all, fields(len = body.len()))]
pub fn parse_body(body: &str) -> Result<Vec<Row>, LoadError> {
    let envelope: Envelope = serde_json::from_str(extract_json(body)?)?;
    if envelope.status != STATUS_OK {
        return Err(LoadError::Remote(envelope.status));
    }
    let table = envelope
        .table
        .ok_or_else(|| LoadError::Parse("响应中缺少 table".to_string()))?;
    let rows = table.into_rows();
    debug!("解析出 {} 行", rows.len());
    Ok(rows)
}

impl Table {
    pub fn labels(&self) -> Vec<String> {
        self.cols
            .iter()
            .map(|col| {
                col.as_ref()
                    .and_then(|c| c.label.as_deref())
                    .map(|label| label.trim().to_string())
                    .unwrap_or_default()
            })
            .collect()
    }

    pub fn into_rows(self) -> Vec<Row> {
        let labels = self.labels();
        self.rows
            .into_iter()
            .enumerate()
            .map(|(idx, table_row)| {
                let cells = table_row.map(|r| r.c).unwrap_or_default();
                let mut row = Row::new(idx);
                for (i, label) in labels.iter().enumerate() {
                    let value = cells
                        .get(i)
                        .and_then(Option::as_ref)
                        .map(Cell::value)
                        .unwrap_or_else(|| Value::String(String::new()));
                    row.insert(label.clone(), value);
                }
                row
            })
            .collect()
    }
}
