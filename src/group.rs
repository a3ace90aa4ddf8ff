use crate::aes::Mapping;
use crate::error::Result;
use crate::frame::{Frame, Value};
use crate::parser::Expr;

/// Synthetic mapping key that forces grouping without binding a visual
/// channel.
pub const GROUP_KEY: &str = "group";

/// One run of rows sharing a group key.
#[derive(Debug, Clone)]
pub struct Group {
    pub key: Vec<Value>,
    pub data: Frame,
}

/// Partition `data` into groups for a layer.
///
/// The group key is the union of the mapping expressions for every grouped
/// aesthetic present in the combined mapping, plus anything mapped under the
/// synthetic `"group"` key, de-duplicated. An empty key set means the whole
/// dataset is a single group. Otherwise the data is sorted by the key
/// expressions and split into maximal runs, so equal inputs always produce
/// the same groups in the same order.
pub fn group_data(
    data: &Frame,
    combined: &Mapping,
    grouped_aesthetics: &[String],
) -> Result<Vec<Group>> {
    let mut key_exprs: Vec<&Expr> = Vec::new();
    for aes in grouped_aesthetics {
        if let Some(expr) = combined.get(aes) {
            if !key_exprs.contains(&expr) {
                key_exprs.push(expr);
            }
        }
    }
    if let Some(expr) = combined.get(GROUP_KEY) {
        if !key_exprs.contains(&expr) {
            key_exprs.push(expr);
        }
    }

    if key_exprs.is_empty() {
        return Ok(vec![Group {
            key: Vec::new(),
            data: data.clone(),
        }]);
    }

    let mut key_columns = Vec::with_capacity(key_exprs.len());
    for expr in &key_exprs {
        key_columns.push(expr.eval(data)?);
    }

    let parts = data.partition_by(&key_columns)?;
    Ok(parts
        .into_iter()
        .map(|(key, data)| Group { key, data })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes::Mapping;

    fn make_data() -> Frame {
        Frame::new(
            vec!["x".to_string(), "species".to_string()],
            vec![
                vec![Value::Num(1.0), Value::Str("wolf".to_string())],
                vec![Value::Num(2.0), Value::Str("bear".to_string())],
                vec![Value::Num(3.0), Value::Str("wolf".to_string())],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_no_grouped_aesthetics_single_group() {
        let data = make_data();
        let mapping = Mapping::new().set("x", "x").unwrap();
        let groups = group_data(&data, &mapping, &["color".to_string()]).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].data.n_rows(), 3);
        assert!(groups[0].key.is_empty());
    }

    #[test]
    fn test_grouped_aesthetic_partitions_sorted() {
        let data = make_data();
        let mapping = Mapping::new()
            .set("x", "x")
            .unwrap()
            .set("color", "species")
            .unwrap();
        let groups = group_data(&data, &mapping, &["color".to_string()]).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, vec![Value::Str("bear".to_string())]);
        assert_eq!(groups[0].data.n_rows(), 1);
        assert_eq!(groups[1].key, vec![Value::Str("wolf".to_string())]);
        assert_eq!(groups[1].data.n_rows(), 2);
    }

    #[test]
    fn test_synthetic_group_key() {
        let data = make_data();
        let mapping = Mapping::new()
            .set("x", "x")
            .unwrap()
            .set(GROUP_KEY, "species")
            .unwrap();
        let groups = group_data(&data, &mapping, &[]).unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_duplicate_key_expressions_collapse() {
        let data = make_data();
        let mapping = Mapping::new()
            .set("color", "species")
            .unwrap()
            .set("marker", "species")
            .unwrap();
        let groups = group_data(
            &data,
            &mapping,
            &["color".to_string(), "marker".to_string()],
        )
        .unwrap();
        // same expression twice forms a single key column
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key.len(), 1);
    }

    #[test]
    fn test_determinism() {
        let data = make_data();
        let mapping = Mapping::new().set("color", "species").unwrap();
        let a = group_data(&data, &mapping, &["color".to_string()]).unwrap();
        let b = group_data(&data, &mapping, &["color".to_string()]).unwrap();
        let keys_a: Vec<_> = a.iter().map(|g| g.key.clone()).collect();
        let keys_b: Vec<_> = b.iter().map(|g| g.key.clone()).collect();
        assert_eq!(keys_a, keys_b);
    }
}
