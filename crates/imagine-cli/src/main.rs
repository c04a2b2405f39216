//! `imagine`: command-line interface for the IMAGine GEMV engine.
//!
//! ```text
//! USAGE:
//!   imagine regs                         Dump the register window
//!   imagine push <listing> [--wait]      Stream a program listing
//!   imagine load --reg N <values...>     Load a vector register
//!   imagine pop [--max N]                Drain FIFO-out
//!   imagine disasm <listing>             Decode a listing
//!   imagine reset                        Reset both FIFOs
//!   imagine selftest                     Loader round trip on the simulator
//! ```
//!
//! The device node comes from `--device`, else `$IMAGINE_DEVICE`, else
//! `/dev/uio0`. `--sim` runs against the simulated engine instead.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use imagine_chip::{regs, EngineParams, Program, ProgramConfig};
use imagine_driver::listing;
use imagine_driver::mmio::default_device_path;
use imagine_driver::{
    check_compatible, fixed, Backoff, FifoTransport, MmioPort, PollConfig, RegisterPort, Sample,
    SimulatedEngine, VectorLoader,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Status polls before a `--sim` wait gives up, unless `--timeout-ms` is set.
const SIM_POLL_ATTEMPTS: u64 = 1024;

#[derive(Parser)]
#[command(name = "imagine", about = "IMAGine GEMV engine CLI", version)]
struct Cli {
    /// UIO or /dev/mem node holding the register window.
    #[arg(long, global = true)]
    device: Option<PathBuf>,

    /// Page-aligned byte offset of the window in the node (hex with 0x).
    #[arg(long, global = true, default_value = "0", value_parser = parse_u64)]
    offset: u64,

    /// Use the simulated engine instead of hardware.
    #[arg(long, global = true)]
    sim: bool,

    /// PEs per block.
    #[arg(long, global = true, default_value_t = 16)]
    lanes: usize,

    /// PE register width in bits.
    #[arg(long, global = true, default_value_t = 16)]
    reg_width: usize,

    /// Give up on FIFO-full / EOV waits after this many milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print every register in the window.
    Regs,
    /// Stream a program listing into FIFO-in.
    Push {
        /// Listing file.
        listing: PathBuf,
        /// File is raw little-endian words, not a text listing.
        #[arg(long)]
        binary: bool,
        /// Wait for end-of-vector, then acknowledge it.
        #[arg(long)]
        wait: bool,
        /// Pop up to N results afterwards.
        #[arg(long)]
        pop: Option<usize>,
    },
    /// Load a vector into a vector register.
    Load {
        /// Vector register index.
        #[arg(long)]
        reg: usize,
        /// Values are floats, converted with --frac fraction bits.
        #[arg(long)]
        float: bool,
        /// Fraction bits for --float.
        #[arg(long, default_value_t = 8)]
        frac: u32,
        /// Print the instruction words instead of pushing them.
        #[arg(long)]
        dry_run: bool,
        /// Lane values.
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<String>,
    },
    /// Drain FIFO-out.
    Pop {
        /// Stop after this many samples.
        #[arg(long, default_value_t = 64)]
        max: usize,
        /// Print as floats with this many fraction bits.
        #[arg(long)]
        frac: Option<u32>,
    },
    /// Decode a listing to stdout.
    Disasm {
        /// Listing file.
        listing: PathBuf,
        /// File is raw little-endian words.
        #[arg(long)]
        binary: bool,
    },
    /// Reset both FIFOs.
    Reset,
    /// Load random vectors into the simulated engine and read them back.
    Selftest {
        /// Number of vectors.
        #[arg(long, default_value_t = 32)]
        vectors: usize,
        /// RNG seed.
        #[arg(long, default_value_t = 0x1234_5678)]
        seed: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let params = EngineParams::new(cli.lanes, cli.reg_width)?;

    match &cli.command {
        Cmd::Regs => cmd_regs(&cli)?,
        Cmd::Push {
            listing,
            binary,
            wait,
            pop,
        } => cmd_push(&cli, params, listing, *binary, *wait, *pop)?,
        Cmd::Load {
            reg,
            float,
            frac,
            dry_run,
            values,
        } => cmd_load(&cli, params, *reg, *float, *frac, *dry_run, values)?,
        Cmd::Pop { max, frac } => cmd_pop(&cli, *max, *frac)?,
        Cmd::Disasm { listing, binary } => cmd_disasm(params, listing, *binary)?,
        Cmd::Reset => {
            open(&cli)?.reset_fifos();
            println!("FIFOs reset");
        }
        Cmd::Selftest { vectors, seed } => cmd_selftest(params, *vectors, *seed)?,
    }

    Ok(())
}

fn parse_u64(s: &str) -> std::result::Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("'{s}': {e}"))
}

fn open(cli: &Cli) -> Result<FifoTransport<Box<dyn RegisterPort>>> {
    let port: Box<dyn RegisterPort> = if cli.sim {
        let params = EngineParams::new(cli.lanes, cli.reg_width)?;
        Box::new(SimulatedEngine::new(params))
    } else {
        let path = cli.device.clone().unwrap_or_else(default_device_path);
        let port = MmioPort::map(&path, cli.offset)
            .with_context(|| format!("mapping {}", path.display()))?;
        info!("Using {}", path.display());
        Box::new(port)
    };

    let mut poll = cli.timeout_ms.map_or_else(PollConfig::unbounded, |ms| {
        PollConfig::unbounded().with_deadline(Duration::from_millis(ms))
    });
    // Nothing raises EOV in the simulator, so an unbounded wait never ends
    if cli.sim && poll.is_unbounded() {
        poll = poll.with_max_attempts(SIM_POLL_ATTEMPTS);
    }

    let mut fifo = FifoTransport::new(port).with_poll(poll);
    if !cli.sim {
        fifo = fifo.with_wait(Backoff::default());
    }
    Ok(fifo)
}

fn read_program(params: EngineParams, path: &Path, binary: bool) -> Result<Program> {
    let program = if binary {
        let config = ProgramConfig {
            reg_width: params.reg_width(),
            lanes_per_block: params.lanes_per_block(),
            ..ProgramConfig::default()
        };
        listing::read_binary(path, config)
    } else {
        listing::read_listing(path)
    };
    program.with_context(|| format!("reading {}", path.display()))
}

fn cmd_regs(cli: &Cli) -> Result<()> {
    let mut fifo = open(cli)?;
    let port = fifo.port_mut();
    println!("reg  offset  name           value");
    for index in 0..regs::REG_COUNT {
        if regs::is_reserved(index) {
            continue;
        }
        let value = port.read(index);
        println!(
            "{index:>3}  {:#06x}  {:<13}  {value:#010x}",
            regs::offset(index),
            regs::name(index)
        );
    }
    Ok(())
}

fn cmd_push(
    cli: &Cli,
    params: EngineParams,
    path: &Path,
    binary: bool,
    wait: bool,
    pop: Option<usize>,
) -> Result<()> {
    let program = read_program(params, path, binary)?;
    check_compatible(&program, &params)?;

    let mut fifo = open(cli)?;
    fifo.push_program(&program)?;
    println!("Pushed '{}': {} words", program.name(), program.len());

    if wait {
        fifo.poll_until_complete()?;
        fifo.clear_end_of_vector();
        println!("End of vector");
    }
    if let Some(max) = pop {
        print_samples(&mut fifo, max, Some(program.config().frac_width));
    }
    Ok(())
}

fn cmd_load(
    cli: &Cli,
    params: EngineParams,
    reg: usize,
    float: bool,
    frac: u32,
    dry_run: bool,
    values: &[String],
) -> Result<()> {
    let loader = VectorLoader::new(params);

    let ints: Vec<i16> = if float {
        let floats = values
            .iter()
            .map(|v| v.parse::<f32>().with_context(|| format!("'{v}' is not a number")))
            .collect::<Result<Vec<_>>>()?;
        if !dry_run {
            let mut fifo = open(cli)?;
            let n = loader.load_vector_row_f32(&mut fifo, reg, &floats, frac)?;
            println!("Loaded {} values into r{reg}: {n} instructions", floats.len());
            return Ok(());
        }
        floats.iter().map(|&v| fixed::to_fixed(v, frac)).collect()
    } else {
        values
            .iter()
            .map(|v| v.parse::<i16>().with_context(|| format!("'{v}' is not a 16-bit integer")))
            .collect::<Result<_>>()?
    };

    if dry_run {
        for word in loader.plan_vector_row(reg, &ints)? {
            println!("{word}");
        }
        return Ok(());
    }

    let mut fifo = open(cli)?;
    let n = loader.load_vector_row(&mut fifo, reg, &ints)?;
    println!("Loaded {} values into r{reg}: {n} instructions", ints.len());
    Ok(())
}

fn cmd_pop(cli: &Cli, max: usize, frac: Option<u32>) -> Result<()> {
    let mut fifo = open(cli)?;
    print_samples(&mut fifo, max, frac);
    Ok(())
}

fn print_samples<P: RegisterPort>(fifo: &mut FifoTransport<P>, max: usize, frac: Option<u32>) {
    let mut count = 0;
    while count < max {
        let Sample::Valid { value, attrib } = fifo.pop_sample() else {
            break;
        };
        match frac {
            Some(f) => println!("{count:>4}  {:>12.6}  attrib={attrib:#04x}", fixed::from_fixed(value, f)),
            None => println!("{count:>4}  {value:>6}  attrib={attrib:#04x}"),
        }
        count += 1;
    }
    println!("{count} samples");
}

fn cmd_disasm(params: EngineParams, path: &Path, binary: bool) -> Result<()> {
    let program = read_program(params, path, binary)?;
    listing::write_listing(&program, std::io::stdout().lock())?;
    Ok(())
}

fn cmd_selftest(params: EngineParams, vectors: usize, seed: u32) -> Result<()> {
    let loader = VectorLoader::new(params);
    let mut fifo = FifoTransport::new(SimulatedEngine::new(params));
    fifo.port_mut().fill_bram(0xA5A5);

    let mut state = seed.max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };

    let max_len = params.max_vector_len().min(512);
    let mut total_words = 0;
    for i in 0..vectors {
        let reg = next() as usize % params.register_count();
        let len = next() as usize % max_len + 1;
        let values: Vec<i16> = (0..len)
            .map(|_| {
                // Random value, sparse about half the time
                let r = next();
                if r & 1 == 0 {
                    0
                } else {
                    fixed::sign_extend((r >> 8) as u16, params.reg_width())
                }
            })
            .collect();

        total_words += loader.load_vector_row(&mut fifo, reg, &values)?;
        let back = fifo
            .port()
            .register_lanes(reg, len)
            .context("register out of range")?;
        if back != values {
            bail!("vector {i} (r{reg}, {len} lanes) read back wrong");
        }
    }

    println!(
        "selftest: {vectors} vectors OK, {total_words} instructions, {} overflows",
        fifo.port().overflows()
    );
    Ok(())
}
