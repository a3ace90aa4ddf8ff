use serde::{Deserialize, Serialize};

fn default_facet_label_pad_x() -> f64 {
    0.05
}

fn default_facet_label_pad_y() -> f64 {
    0.15
}

fn default_facet_label_size() -> u32 {
    16
}

fn default_true() -> bool {
    true
}

/// Flat table of global plot defaults, consulted wherever the caller does
/// not override explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlotConfig {
    /// Horizontal pad, in axes-fraction units, between a panel edge and a
    /// row facet label.
    #[serde(default = "default_facet_label_pad_x")]
    pub facet_label_pad_x: f64,
    /// Vertical pad between a panel edge and a column facet label.
    #[serde(default = "default_facet_label_pad_y")]
    pub facet_label_pad_y: f64,
    #[serde(default = "default_facet_label_size")]
    pub facet_label_size: u32,
    /// Derive the shared x label from the x mapping when no explicit label
    /// is given.
    #[serde(default = "default_true")]
    pub autolabel_xaxis: bool,
    #[serde(default = "default_true")]
    pub autolabel_yaxis: bool,
    /// Fixed figure-fraction coordinates for the shared axis labels; None
    /// lets the layout place them.
    #[serde(default)]
    pub xaxis_label_x: Option<f64>,
    #[serde(default)]
    pub xaxis_label_y: Option<f64>,
    #[serde(default)]
    pub yaxis_label_x: Option<f64>,
    #[serde(default)]
    pub yaxis_label_y: Option<f64>,
    #[serde(default)]
    pub legend: bool,
}

impl Default for PlotConfig {
    fn default() -> Self {
        PlotConfig {
            facet_label_pad_x: default_facet_label_pad_x(),
            facet_label_pad_y: default_facet_label_pad_y(),
            facet_label_size: default_facet_label_size(),
            autolabel_xaxis: true,
            autolabel_yaxis: true,
            xaxis_label_x: None,
            xaxis_label_y: None,
            yaxis_label_x: None,
            yaxis_label_y: None,
            legend: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlotConfig::default();
        assert_eq!(config.facet_label_pad_x, 0.05);
        assert_eq!(config.facet_label_pad_y, 0.15);
        assert!(config.autolabel_xaxis);
        assert!(!config.legend);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PlotConfig = serde_json::from_str(r#"{"legend": true}"#).unwrap();
        assert!(config.legend);
        assert!(config.autolabel_yaxis);
        assert_eq!(config.facet_label_pad_y, 0.15);
    }
}
