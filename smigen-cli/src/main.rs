//! Command-line front end of the SMI memory arbitration tree generator.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::{info, LevelFilter};
use smigen::{arbitration_tree_module_name, Package, ScalingFactor};

#[derive(Parser, Debug)]
#[command(version, about)]
struct SmigenArgs {
    #[arg(long, default_value_t = 1, help = "Number of client side SMI memory ports")]
    num_mem_ports: usize,
    #[arg(long, default_value_t = 64, help = "Server side AXI data bus width in bits (64, 128, 256 or 512)")]
    axi_bus_width: usize,
    #[arg(long, help = "Override the module name (default: smiMemArbitrationTreeX{ports}S{scaling})")]
    module_name: Option<String>,
    #[arg(long, default_value = ".", help = "Directory the Verilog file is written to")]
    out_dir: PathBuf,
    #[arg(short, long, action = clap::ArgAction::Count, help = "Raise log level (-v: info, -vv: debug)")]
    verbose: u8,
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

fn main() -> anyhow::Result<()> {
    let argv = SmigenArgs::parse();
    env_logger::Builder::new().filter_level(log_level(argv.verbose)).parse_default_env().init();

    let scaling = ScalingFactor::from_axi_bus_width(argv.axi_bus_width)?;
    let module_name =
        argv.module_name.unwrap_or_else(|| arbitration_tree_module_name(argv.num_mem_ports, scaling));

    let mut package = Package::default();
    package
        .add_tree(&module_name, argv.num_mem_ports, scaling)
        .with_context(|| format!("cannot generate {}", module_name))?;

    for path in package.gen_vir(&argv.out_dir)? {
        info!("generated {}", path.display());
    }

    Ok(())
}
