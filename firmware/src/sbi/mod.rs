use rustsbi::RustSBI;

pub mod console;
pub mod domain;
pub mod hsm;
pub mod ipi;
pub mod reset;

pub mod hart_context;
pub mod heap;
pub mod logger;
pub mod pmp;
pub mod trap;
pub mod trap_stack;

use console::SbiConsole;
use hsm::SbiHsm;
use ipi::SbiIpi;
use reset::SbiReset;

#[derive(RustSBI, Default)]
#[rustsbi(dynamic)]
#[allow(clippy::upper_case_acronyms)]
pub struct SBI {
    #[rustsbi(console)]
    pub console: Option<SbiConsole>,
    #[rustsbi(ipi, timer)]
    pub ipi: Option<SbiIpi>,
    #[rustsbi(hsm)]
    pub hsm: Option<SbiHsm>,
    #[rustsbi(reset)]
    pub reset: Option<SbiReset>,
}

impl SBI {
    pub const fn new() -> Self {
        SBI {
            console: None,
            ipi: None,
            hsm: None,
            reset: None,
        }
    }
}
