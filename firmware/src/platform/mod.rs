use alloc::boxed::Box;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

use crate::cfg;
use crate::platform::clint::SifiveClintWrap;
use crate::platform::console::Uart16550Wrap;
use crate::platform::reset::SifiveTestDeviceWrap;
use crate::sbi::SBI;
use crate::sbi::console::SbiConsole;
use crate::sbi::hsm::SbiHsm;
use crate::sbi::ipi::SbiIpi;
use crate::sbi::logger;
use crate::sbi::reset::SbiReset;

mod clint;
mod console;
mod reset;

pub(crate) static mut PLATFORM: Platform = Platform::new();

/// Fixed-configuration platform: one 16550 console, one SiFive CLINT and one
/// SiFive test device, all located through the build-time config.
pub struct Platform {
    pub sbi: SBI,
    ready: AtomicBool,
}

impl Platform {
    pub const fn new() -> Self {
        Platform {
            sbi: SBI::new(),
            ready: AtomicBool::new(false),
        }
    }

    pub fn init(&mut self) {
        self.sbi.console = Some(SbiConsole::new(Mutex::new(Box::new(
            Uart16550Wrap::<u8>::new(cfg::CONSOLE_BASE),
        ))));
        logger::Logger::init().unwrap();

        self.sbi.ipi = Some(SbiIpi::new(
            Mutex::new(Box::new(SifiveClintWrap::new(cfg::CLINT_BASE))),
            cfg::NUM_HART_MAX - 1,
        ));
        self.sbi.hsm = Some(SbiHsm);
        self.sbi.reset = Some(SbiReset::new(Mutex::new(Box::new(
            SifiveTestDeviceWrap::new(cfg::RESET_BASE),
        ))));

        self.ready.swap(true, Ordering::Release);
    }

    pub fn print_board_info(&self) {
        info!("RustSBI domain firmware version {}", env!("CARGO_PKG_VERSION"));
        info!("{:<30}: 0x{:08x}", "Console Device", cfg::CONSOLE_BASE);
        info!("{:<30}: 0x{:08x}", "Clint Device", cfg::CLINT_BASE);
        info!("{:<30}: 0x{:08x}", "Reset Device", cfg::RESET_BASE);
        info!(
            "{:<30}: 0x{:08x} - 0x{:08x}",
            "Memory Range",
            cfg::MEMORY_START,
            cfg::MEMORY_START + cfg::MEMORY_SIZE
        );
    }

    pub fn ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn have_console(&self) -> bool {
        self.sbi.console.is_some()
    }
}
