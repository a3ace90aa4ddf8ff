use std::fs;
use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use clap::Parser;

use gramplot::frame::Frame;
use gramplot::spec::PlotSpec;
use gramplot::RenderOptions;

#[derive(Parser, Debug)]
#[command(name = "gramplot")]
#[command(about = "Render statistical plots from CSV data and a JSON plot description", long_about = None)]
struct Args {
    /// JSON plot description, e.g.
    /// '{"mapping": {"x": "time", "y": "temp"}, "geoms": [{"kind": "line"}]}'
    spec: String,

    /// Treat the spec argument as a path to a JSON file instead
    #[arg(long)]
    spec_file: bool,

    /// Output width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Output height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let json = if args.spec_file {
        fs::read_to_string(&args.spec)
            .with_context(|| format!("Failed to read spec file {}", args.spec))?
    } else {
        args.spec.clone()
    };
    let spec = PlotSpec::from_json(&json).context("Failed to parse plot description")?;

    // Data comes from stdin unless the description carries inline rows
    let data = if spec.data.is_some() {
        None
    } else {
        let mut csv = String::new();
        io::stdin()
            .read_to_string(&mut csv)
            .context("Failed to read CSV from stdin")?;
        if csv.trim().is_empty() {
            None
        } else {
            Some(Frame::from_csv(csv.as_bytes()).context("Failed to parse CSV")?)
        }
    };

    let plot = spec.into_plot(data).context("Failed to build plot")?;
    let options = RenderOptions {
        width: args.width,
        height: args.height,
    };
    let png_bytes = plot.render(&options).context("Failed to render plot")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(&png_bytes)
        .context("Failed to write PNG to stdout")?;
    handle.flush().context("Failed to flush stdout")?;

    Ok(())
}
