use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 表格中的一行，列名 -> 单元格值，保持原始列顺序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(rename = "__idx")]
    pub index: usize,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl Row {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            values: Map::new(),
        }
    }

    /// 同名列后写覆盖前写，但保留首次出现的位置
    pub fn insert(&mut self, label: impl Into<String>, value: Value) {
        self.values.insert(label.into(), value);
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.values.get(label)
    }

    /// 单元格的文字形式，不存在时为空字符串
    pub fn text(&self, label: &str) -> String {
        self.get(label).map(cell_text).unwrap_or_default()
    }

    /// 非空时返回文字，空值（含 0、false）视为缺失
    pub fn non_empty(&self, label: &str) -> Option<String> {
        self.get(label).filter(|v| is_truthy(v)).map(cell_text)
    }

    /// 所有列值以空格连接，不含 __idx
    pub fn joined_values(&self) -> String {
        self.values
            .values()
            .map(cell_text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                let f = n.as_f64().unwrap_or_default();
                // 整数值的浮点数不带小数部分：5.0 -> "5"
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{}", f as i64)
                } else {
                    f.to_string()
                }
            }
        }
        other => other.to_string(),
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        _ => true,
    }
}
