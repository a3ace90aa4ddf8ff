// Categorical color cycling for discrete color scales

use std::collections::BTreeMap;

use crate::scale::Scale;

/// D3-inspired category10 cycle.
pub const CATEGORY10: [&str; 10] = [
    "blue", "orange", "green", "red", "purple", "brown", "pink", "gray", "olive", "cyan",
];

/// Assign palette colors to a list of levels, wrapping past the palette end.
pub fn assign_colors(levels: &[String]) -> BTreeMap<String, String> {
    levels
        .iter()
        .enumerate()
        .map(|(i, level)| {
            (
                level.clone(),
                CATEGORY10[i % CATEGORY10.len()].to_string(),
            )
        })
        .collect()
}

/// A non-strict discrete color scale cycling category10 over the given
/// levels in order.
pub fn color_scale_for(levels: &[String]) -> Scale {
    Scale::DiscreteManual {
        table: assign_colors(levels),
        strict: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_colors_wraps() {
        let levels: Vec<String> = (0..12).map(|i| format!("g{:02}", i)).collect();
        let table = assign_colors(&levels);
        assert_eq!(table["g00"], "blue");
        assert_eq!(table["g10"], "blue");
        assert_eq!(table["g11"], "orange");
    }
}
