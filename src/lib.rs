// Library exports for gramplot

pub mod aes;
pub mod config;
pub mod error;
pub mod facet;
pub mod frame;
pub mod geom;
pub mod group;
pub mod kde;
pub mod palette;
pub mod parser;
pub mod plot;
pub mod position;
pub mod scale;
pub mod spec;
pub mod stat;
pub mod surface;

pub use config::PlotConfig;
pub use error::{PlotError, Result};
pub use facet::FacetSpec;
pub use frame::{Frame, Value};
pub use geom::Geom;
pub use plot::Plot;
pub use position::Position;
pub use scale::Scale;
pub use spec::PlotSpec;
pub use stat::{Axis, Stat};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}
