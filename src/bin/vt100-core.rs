//! Command-line harness: loads a firmware ROM and a command script, runs
//! the script driver to completion, and logs whatever the script's `dump`/
//! `covrw`/`switches` commands produce.
//!
//! This is the host side of the test harness described in `spec.md` §6; the
//! script grammar itself is interpreted by `vt100_core::script::ScriptDriver`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use vt100_core::config::MachineConfig;
use vt100_core::machine::Machine;
use vt100_core::script::ScriptDriver;

#[derive(Parser, Debug)]
#[command(name = "vt100-core", about = "Cycle-level VT100 emulation core test harness")]
struct Args {
    /// Path to the firmware ROM image (8080 code + constants).
    #[arg(long)]
    rom: PathBuf,

    /// Path to the command script to drive the run.
    #[arg(long)]
    script: PathBuf,

    /// Path to the character generator ROM, if frame output is wanted.
    #[arg(long)]
    char_rom: Option<PathBuf>,

    /// Path to a binary NVR image: 100 little-endian u16 words.
    #[arg(long)]
    nvr_image: Option<PathBuf>,

    /// Advanced Video Option fitted at boot.
    #[arg(long)]
    avo: bool,

    /// Graphics Processor Option fitted at boot.
    #[arg(long)]
    gpo: bool,

    /// Standard Terminal Port fitted at boot.
    #[arg(long)]
    stp: bool,

    /// Serial loopback test fixture fitted at boot.
    #[arg(long)]
    loopback: bool,

    /// Path to a ROM symbol table (`<hex address> <name>` per line).
    #[arg(long)]
    symbols: Option<PathBuf>,

    /// Path to a RAM equate table (`<hex address> <name>` per line,
    /// addresses relative to the start of RAM).
    #[arg(long)]
    equates: Option<PathBuf>,

    /// Path to a coverage-priming file (`{d|u} <hex start> <hex end>` per
    /// line) seeding DATA/UNREACH regions before the run starts.
    #[arg(long)]
    coverage_priming: Option<PathBuf>,
}

fn load_nvr_image(path: &PathBuf) -> Result<Vec<u16>> {
    let bytes = fs::read(path).with_context(|| format!("reading NVR image {}", path.display()))?;
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rom = fs::read(&args.rom).with_context(|| format!("reading ROM {}", args.rom.display()))?;
    let script_text =
        fs::read_to_string(&args.script).with_context(|| format!("reading script {}", args.script.display()))?;

    let config = MachineConfig {
        have_avo: args.avo,
        have_gpo: args.gpo,
        have_stp: args.stp,
        have_loopback: args.loopback,
        ..MachineConfig::default()
    };

    let mut machine = Machine::new(&rom, config);

    if let Some(char_rom_path) = &args.char_rom {
        let data = fs::read(char_rom_path).with_context(|| format!("reading character ROM {}", char_rom_path.display()))?;
        machine.load_char_rom(&data);
    }

    if let Some(nvr_path) = &args.nvr_image {
        let words = load_nvr_image(nvr_path)?;
        machine.load_nvr_image(&words);
    }

    let mut driver = ScriptDriver::new(&script_text);

    if let Some(symbols_path) = &args.symbols {
        let text =
            fs::read_to_string(symbols_path).with_context(|| format!("reading symbol table {}", symbols_path.display()))?;
        driver.load_symbols(&text);
    }
    if let Some(equates_path) = &args.equates {
        let text =
            fs::read_to_string(equates_path).with_context(|| format!("reading equate table {}", equates_path.display()))?;
        driver.load_equates(&text);
    }
    if let Some(priming_path) = &args.coverage_priming {
        let text = fs::read_to_string(priming_path)
            .with_context(|| format!("reading coverage-priming file {}", priming_path.display()))?;
        driver.prime_coverage(&mut machine, &text);
    }

    driver.run(&mut machine, None).context("running script")?;

    Ok(())
}
