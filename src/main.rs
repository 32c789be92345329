/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use clap::Parser;
use std::path::Path;

use cvfab::arch::{Arch, BuildError};
use cvfab::cells::CellError;
use cvfab::config::{ArchConfig, ConfigError};
use cvfab::exporter::*;
use cvfab::lab::LabState;
use cvfab::loader::{DeviceDescription, OpenError, OpenOpts, PackingFile};
#[allow(unused)]
use cvfab::log::*;
use cvfab::dbg_log;

#[derive(Parser, Debug)]
#[clap(
    author = "Antmicro",
    version = "0.1.0",
    about = "CVFAB - Cyclone V device model and LAB legality checker",
    long_about = None
)]
struct Args {
    #[clap(help = "Device description file (YAML or JSON)")]
    device: String,
    #[clap(long, help = "Use raw (uncompressed) device file")]
    raw: bool,
    #[clap(long, help = "Device model configuration (YAML)")]
    config: Option<String>,
    #[command(subcommand)]
    command: SubCommands,
}

#[derive(Parser, Debug)]
struct PipsCmd {
    #[arg(help = "Wire name")]
    wire: String,
    #[arg(long, help = "List pips driving the wire instead of the ones it drives")]
    uphill: bool,
}

#[derive(Parser, Debug)]
struct CheckCmd {
    #[arg(help = "Packing file with placed cells")]
    packing: String,
    #[arg(long, help = "Use raw (uncompressed) packing file")]
    raw_packing: bool,
    #[arg(long, help = "Number of threads, overrides the configuration")]
    threads: Option<usize>,
    #[arg(long, help = "LABs (LAB_X<x>Y<y>) to have their reports exported, :all for every LAB")]
    json: Option<Vec<String>>,
    #[arg(long, default_value = "labs.json", help = "File for the exported reports")]
    json_file: String,
}

#[derive(Parser, Debug)]
enum SubCommands {
    /// Print device model statistics
    Stats,
    /// List pips of a wire
    Pips(PipsCmd),
    /// Check the legality of a packed and placed design
    Check(CheckCmd),
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Open(#[from] OpenError),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Build(#[from] BuildError),
    #[error("{0}")]
    Cell(#[from] CellError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("no wire named {0}")]
    NoSuchWire(String),
}

fn stats(arch: &Arch) {
    println!(concat!(
        "Device {}:\n",
        "    No. of wires:  {}\n",
        "    No. of pips:   {}\n",
        "    No. of bels:   {}\n",
        "    No. of LABs:   {}"
        ),
        arch.name,
        arch.graph.wire_count(),
        arch.graph.pip_count(),
        arch.bels.bels().len(),
        arch.labs.len()
    );
}

fn pips(args: PipsCmd, arch: &Arch) -> Result<(), CliError> {
    let wire = arch.wire_by_name(&args.wire)
        .ok_or_else(|| CliError::NoSuchWire(args.wire.clone()))?;
    let range = if args.uphill {
        arch.pips_uphill(wire)
    } else {
        arch.pips_downhill(wire)
    };
    for pip in range {
        if let Some(name) = arch.pip_name(pip) {
            println!("{}", name);
        }
    }
    Ok(())
}

fn check(args: CheckCmd, arch: &mut Arch, config: &ArchConfig) -> Result<(), CliError> {
    let packing = PackingFile::open(&args.packing, &OpenOpts { raw: args.raw_packing })?;
    let resolved = packing.resolve(arch)?;
    let alm_cnt = arch.propose_cells(&resolved.cells)?;

    let threads = args.threads.unwrap_or(config.threads);
    let illegal = arch.check_all(threads);

    let mut unresolved = 0;
    for lab in 0 .. arch.labs.len() as u32 {
        if illegal.contains(&lab) {
            continue;
        }
        if let Err(err) = arch.commit(lab) {
            dbg_log!(DBG_WARN, "{}", err);
            continue;
        }
        let used_alms: Vec<u8> = arch.labs[lab as usize].alms.iter()
            .enumerate()
            .filter(|(_, alm)| !alm.binding.is_empty())
            .map(|(idx, _)| idx as u8)
            .collect();
        for alm in used_alms {
            if let Err(err) = arch.compute_lut_masks(lab, alm) {
                dbg_log!(DBG_WARN, "LAB {} ALM {}: {}", lab, alm, err);
                unresolved += 1;
            }
        }
    }

    let confirmed = arch.labs.iter()
        .filter(|lab| lab.state == LabState::Confirmed)
        .count();
    println!(concat!(
        "Design {}:\n",
        "    No. of cells:                  {}\n",
        "    No. of ALMs used:              {}\n",
        "    No. of illegal LABs:           {}\n",
        "    No. of committed LABs:         {}\n",
        "    No. of ALMs without pin map:   {}"
        ),
        args.packing,
        resolved.cells.len(),
        alm_cnt,
        illegal.len(),
        confirmed,
        unresolved
    );
    for lab in &illegal {
        let info = &arch.labs[*lab as usize];
        println!("    Illegal: {}", LabReport::export_name(info.x, info.y));
    }

    let arch: &Arch = arch;
    let mut json_exporter = CompoundJsonExporter::new(&args.json, Path::new(&args.json_file).into());
    for lab in 0 .. arch.labs.len() as u32 {
        let info = &arch.labs[lab as usize];
        let name = LabReport::export_name(info.x, info.y);
        json_exporter.ignore_or_export(&name, || LabReport::new(arch, lab))?;
    }
    json_exporter.flush()?;

    Ok(())
}

fn run(args: Args) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => ArchConfig::load(path)?,
        None => ArchConfig::default(),
    };

    let device = DeviceDescription::open(Path::new(&args.device), &OpenOpts { raw: args.raw })?;
    let mut arch = Arch::new(&device.resolve()?, &config)?;

    match args.command {
        SubCommands::Stats => stats(&arch),
        SubCommands::Pips(sargs) => pips(sargs, &arch)?,
        SubCommands::Check(sargs) => check(sargs, &mut arch, &config)?,
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let SubCommands::Check(check) = &args.command {
        if check.threads == Some(0) {
            eprintln!("error: at least one thread is needed");
            std::process::exit(2);
        }
    }

    if let Err(err) = run(args) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
