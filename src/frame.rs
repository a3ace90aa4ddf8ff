use std::cmp::Ordering;
use std::fmt;
use std::io::Read;

use thiserror::Error;

/// Errors raised by the tabular container. These propagate through the
/// pipeline unchanged, never rewrapped.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("{0}")]
    Shape(String),

    #[error("invalid expression: {0}")]
    Expr(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(String),
}

/// A single cell. Numbers and strings get a total order so frames can be
/// sorted and partitioned deterministically; nulls sort first.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Num(f64),
    Str(String),
}

impl Value {
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Num(_) => 1,
            Value::Str(_) => 2,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Num(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{}", *v as i64)
                } else {
                    write!(f, "{}", v)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

/// In-memory tabular container: named columns over row-major storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, FrameError> {
        let width = headers.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(FrameError::Shape(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
        }
        Ok(Frame { headers, rows })
    }

    pub fn empty(headers: Vec<String>) -> Self {
        Frame {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, FrameError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Materialize one column by name.
    pub fn column(&self, name: &str) -> Result<Vec<Value>, FrameError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx].clone()).collect())
    }

    /// New frame with only the named columns, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Frame, FrameError> {
        let indices: Vec<usize> = names
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<_, _>>()?;
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Ok(Frame {
            headers: names.iter().map(|n| n.to_string()).collect(),
            rows,
        })
    }

    /// De-duplicated rows, first occurrence kept, first-seen order preserved.
    pub fn unique(&self) -> Frame {
        let mut seen: Vec<&Vec<Value>> = Vec::new();
        let mut rows = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row) {
                seen.push(row);
                rows.push(row.clone());
            }
        }
        Frame {
            headers: self.headers.clone(),
            rows,
        }
    }

    /// Stable sort by parallel key columns (one `Vec<Value>` per key, each the
    /// length of the frame).
    pub fn sort_by(&self, keys: &[Vec<Value>]) -> Result<Frame, FrameError> {
        for key in keys {
            if key.len() != self.n_rows() {
                return Err(FrameError::Shape(format!(
                    "sort key length {} does not match frame length {}",
                    key.len(),
                    self.n_rows()
                )));
            }
        }
        let mut order: Vec<usize> = (0..self.n_rows()).collect();
        order.sort_by(|&a, &b| {
            for key in keys {
                match key[a].cmp(&key[b]) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            Ordering::Equal
        });
        let rows = order.iter().map(|&i| self.rows[i].clone()).collect();
        Ok(Frame {
            headers: self.headers.clone(),
            rows,
        })
    }

    /// Sort by the key columns, then split into maximal runs of identical
    /// key tuples. Returns (key tuple, row subset) pairs in sorted order.
    pub fn partition_by(
        &self,
        keys: &[Vec<Value>],
    ) -> Result<Vec<(Vec<Value>, Frame)>, FrameError> {
        for key in keys {
            if key.len() != self.n_rows() {
                return Err(FrameError::Shape(format!(
                    "partition key length {} does not match frame length {}",
                    key.len(),
                    self.n_rows()
                )));
            }
        }
        let mut order: Vec<usize> = (0..self.n_rows()).collect();
        order.sort_by(|&a, &b| {
            for key in keys {
                match key[a].cmp(&key[b]) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            Ordering::Equal
        });

        let key_tuple = |i: usize| -> Vec<Value> { keys.iter().map(|k| k[i].clone()).collect() };

        let mut out: Vec<(Vec<Value>, Frame)> = Vec::new();
        for &i in &order {
            let tuple = key_tuple(i);
            match out.last_mut() {
                Some((last, frame)) if *last == tuple => {
                    frame.rows.push(self.rows[i].clone());
                }
                _ => {
                    out.push((
                        tuple,
                        Frame {
                            headers: self.headers.clone(),
                            rows: vec![self.rows[i].clone()],
                        },
                    ));
                }
            }
        }
        Ok(out)
    }

    /// Rows whose named columns equal the given values. This is the inner
    /// join against a single key row used for facet subsetting; no matching
    /// rows yields an empty frame, not an error.
    pub fn semi_join(&self, on: &[(String, Value)]) -> Result<Frame, FrameError> {
        let indices: Vec<(usize, &Value)> = on
            .iter()
            .map(|(name, value)| self.column_index(name).map(|i| (i, value)))
            .collect::<Result<_, _>>()?;
        let rows = self
            .rows
            .iter()
            .filter(|r| indices.iter().all(|&(i, v)| &r[i] == v))
            .cloned()
            .collect();
        Ok(Frame {
            headers: self.headers.clone(),
            rows,
        })
    }

    /// Row concatenation. Headers must match exactly.
    pub fn vstack(&self, other: &Frame) -> Result<Frame, FrameError> {
        if self.headers != other.headers {
            return Err(FrameError::Shape(format!(
                "vstack column mismatch: {:?} vs {:?}",
                self.headers, other.headers
            )));
        }
        let mut rows = self.rows.clone();
        rows.extend(other.rows.iter().cloned());
        Ok(Frame {
            headers: self.headers.clone(),
            rows,
        })
    }

    pub fn slice(&self, offset: usize, len: usize) -> Frame {
        let end = (offset + len).min(self.rows.len());
        let start = offset.min(end);
        Frame {
            headers: self.headers.clone(),
            rows: self.rows[start..end].to_vec(),
        }
    }

    /// Read a headered CSV. Cells that parse as f64 become numbers, empty
    /// cells become null, everything else stays a string.
    pub fn from_csv<R: Read>(reader: R) -> Result<Frame, FrameError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let row = record.iter().map(parse_cell).collect();
            rows.push(row);
        }
        Ok(Frame { headers, rows })
    }

    /// Parse a JSON array of row objects, e.g.
    /// `[{"x": 1, "y": "a"}, {"x": 2, "y": "b"}]`. Column order follows the
    /// first row; missing keys become null.
    pub fn from_json(json: &str) -> Result<Frame, FrameError> {
        let parsed: serde_json::Value =
            serde_json::from_str(json).map_err(|e| FrameError::Json(e.to_string()))?;
        Self::from_json_value(&parsed)
    }

    pub fn from_json_value(parsed: &serde_json::Value) -> Result<Frame, FrameError> {
        let records = parsed
            .as_array()
            .ok_or_else(|| FrameError::Json("expected an array of row objects".to_string()))?;
        if records.is_empty() {
            return Ok(Frame::empty(Vec::new()));
        }
        let first = records[0]
            .as_object()
            .ok_or_else(|| FrameError::Json("expected row objects".to_string()))?;
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut rows = Vec::new();
        for record in records {
            let obj = record
                .as_object()
                .ok_or_else(|| FrameError::Json("expected row objects".to_string()))?;
            let row = headers
                .iter()
                .map(|h| match obj.get(h) {
                    Some(serde_json::Value::Number(n)) => {
                        Value::Num(n.as_f64().unwrap_or(f64::NAN))
                    }
                    Some(serde_json::Value::String(s)) => Value::Str(s.clone()),
                    Some(serde_json::Value::Bool(b)) => {
                        Value::Num(if *b { 1.0 } else { 0.0 })
                    }
                    Some(serde_json::Value::Null) | None => Value::Null,
                    Some(other) => Value::Str(other.to_string()),
                })
                .collect();
            rows.push(row);
        }
        Ok(Frame { headers, rows })
    }
}

fn parse_cell(cell: &str) -> Value {
    if cell.is_empty() {
        Value::Null
    } else if let Ok(v) = cell.parse::<f64>() {
        Value::Num(v)
    } else {
        Value::Str(cell.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_frame() -> Frame {
        Frame::new(
            vec!["x".to_string(), "g".to_string()],
            vec![
                vec![Value::Num(3.0), Value::Str("b".to_string())],
                vec![Value::Num(1.0), Value::Str("a".to_string())],
                vec![Value::Num(2.0), Value::Str("a".to_string())],
                vec![Value::Num(1.0), Value::Str("a".to_string())],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let res = Frame::new(
            vec!["x".to_string()],
            vec![vec![Value::Num(1.0), Value::Num(2.0)]],
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_select_and_column() {
        let f = make_frame();
        let g = f.select(&["g"]).unwrap();
        assert_eq!(g.headers(), &["g".to_string()]);
        assert_eq!(g.n_rows(), 4);
        assert!(f.column("missing").is_err());
    }

    #[test]
    fn test_unique_preserves_first_seen_order() {
        let f = make_frame().select(&["g"]).unwrap().unique();
        assert_eq!(
            f.rows(),
            &[
                vec![Value::Str("b".to_string())],
                vec![Value::Str("a".to_string())],
            ]
        );
    }

    #[test]
    fn test_partition_by_sorts_then_splits() {
        let f = make_frame();
        let key = f.column("g").unwrap();
        let parts = f.partition_by(&[key]).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].0, vec![Value::Str("a".to_string())]);
        assert_eq!(parts[0].1.n_rows(), 3);
        assert_eq!(parts[1].0, vec![Value::Str("b".to_string())]);
        assert_eq!(parts[1].1.n_rows(), 1);
    }

    #[test]
    fn test_semi_join_no_match_is_empty() {
        let f = make_frame();
        let sub = f
            .semi_join(&[("g".to_string(), Value::Str("z".to_string()))])
            .unwrap();
        assert!(sub.is_empty());
        assert_eq!(sub.headers(), f.headers());
    }

    #[test]
    fn test_vstack_mismatch() {
        let f = make_frame();
        let other = Frame::empty(vec!["y".to_string()]);
        assert!(f.vstack(&other).is_err());
    }

    #[test]
    fn test_from_csv_types() {
        let csv = "x,label\n1.5,hello\n,world\n";
        let f = Frame::from_csv(csv.as_bytes()).unwrap();
        assert_eq!(f.rows()[0][0], Value::Num(1.5));
        assert_eq!(f.rows()[1][0], Value::Null);
        assert_eq!(f.rows()[0][1], Value::Str("hello".to_string()));
    }

    #[test]
    fn test_from_json_rows() {
        let f = Frame::from_json(r#"[{"x": 1, "g": "a"}, {"x": 2, "g": null}]"#).unwrap();
        assert_eq!(f.n_rows(), 2);
        assert_eq!(f.rows()[1][f.column_index("g").unwrap()], Value::Null);
    }

    #[test]
    fn test_value_total_order() {
        let mut vals = vec![
            Value::Str("a".to_string()),
            Value::Num(2.0),
            Value::Null,
            Value::Num(-1.0),
        ];
        vals.sort();
        assert_eq!(vals[0], Value::Null);
        assert_eq!(vals[1], Value::Num(-1.0));
        assert_eq!(vals[3], Value::Str("a".to_string()));
    }
}
