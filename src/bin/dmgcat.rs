//! Headless demo host: loads a ROM (and optional boot ROM) from disk, runs
//! it for a fixed number of frames with no display attached, and dumps the
//! final frame as a PGM so the core can be exercised without any GUI
//! dependency at all. Grounded in the teacher's `app::main` CLI shape,
//! stripped of its SDL/font/debug-view scaffolding since this core has no
//! concept of a window to draw into.

use clap::Parser;
use dmg_core::error::{ErrorKind, NoConnection};
use dmg_core::host::Host;
use dmg_core::GameBoy;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Run a Game Boy ROM headlessly and dump the final frame as a PGM")]
struct Args {
    /// Path to the .gb ROM file.
    rom: PathBuf,

    /// Optional boot ROM; when omitted, the core starts at the documented
    /// post-boot register state instead of executing the real boot ROM.
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// Number of frames to run before dumping output.
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Where to write the final frame, as a binary PGM (P5).
    #[arg(long, default_value = "frame.pgm")]
    out: PathBuf,
}

struct FileHost {
    rom: Vec<u8>,
    boot_rom: Option<Vec<u8>>,
    ram: Vec<u8>,
}

impl Host for FileHost {
    fn rom_read(&mut self, addr: u32) -> u8 {
        *self.rom.get(addr as usize).unwrap_or(&0xFF)
    }

    fn cart_ram_read(&mut self, addr: u32) -> u8 {
        *self.ram.get(addr as usize).unwrap_or(&0xFF)
    }

    fn cart_ram_write(&mut self, addr: u32, val: u8) {
        if self.ram.len() <= addr as usize {
            self.ram.resize(addr as usize + 1, 0xFF);
        }
        self.ram[addr as usize] = val;
    }

    fn on_error(&mut self, kind: ErrorKind, pc: u16) {
        log::error!("core reported a fatal error at pc={pc:#06x}: {kind}");
    }

    fn boot_rom_read(&mut self, addr: u16) -> u8 {
        self.boot_rom
            .as_ref()
            .and_then(|b| b.get(addr as usize))
            .copied()
            .unwrap_or(0xFF)
    }

    fn serial_rx(&mut self) -> Result<u8, NoConnection> {
        Err(NoConnection)
    }

    fn lcd_draw_line(&mut self, _pixels: &[u8; 160], line: u8) {
        log::trace!("scanline {line} composed");
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rom = fs::read(&args.rom)?;
    let boot_rom = args.boot_rom.as_ref().map(fs::read).transpose()?;
    let skip_boot_rom = boot_rom.is_none();
    let mut host = FileHost {
        rom,
        boot_rom,
        ram: Vec::new(),
    };

    let mut gb = GameBoy::init(&mut host, skip_boot_rom)
        .map_err(|e| anyhow::anyhow!("failed to initialise core: {e}"))?;

    for frame in 0..args.frames {
        if let Err(e) = gb.run_frame(&mut host) {
            log::error!("run_frame failed on frame {frame}: {e}");
            break;
        }
    }

    write_pgm(&args.out, gb.frame_buffer())?;
    log::info!("wrote {} frames of output to {}", args.frames, args.out.display());
    Ok(())
}

/// Writes a 160x144 4-shade framebuffer as a binary PGM, mapping the
/// 2-bit shade (bits 0-1 of each byte; palette tag bits are ignored here)
/// onto greyscale the way a terminal image viewer expects.
fn write_pgm(path: &PathBuf, buffer: &[u8]) -> std::io::Result<()> {
    let mut out = fs::File::create(path)?;
    write!(out, "P5\n160 144\n255\n")?;
    let shades = [0xFFu8, 0xAA, 0x55, 0x00];
    let pixels: Vec<u8> = buffer.iter().map(|&px| shades[(px & 0x03) as usize]).collect();
    out.write_all(&pixels)?;
    Ok(())
}
