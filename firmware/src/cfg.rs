use static_toml::static_toml;

/// The address where the SBI link start.
pub const SBI_LINK_START_ADDRESS: usize = 0x80000000;

static_toml! {
    const CONFIG = include_toml!("config.toml");
}

/// Maximum number of supported harts.
pub const NUM_HART_MAX: usize = CONFIG.num_hart_max as usize;
/// Stack size per hart (hardware thread) in bytes.
pub const STACK_SIZE_PER_HART: usize = CONFIG.stack_size_per_hart as usize;
/// Heap Size of SBI firmware.
pub const HEAP_SIZE: usize = CONFIG.heap_size as usize;
/// Platform page size.
pub const PAGE_SIZE: usize = CONFIG.page_size as usize;
/// Log Level.
pub const LOG_LEVEL: &'static str = CONFIG.log_level;
/// Number of PMP entries implemented per hart.
pub const PMP_ENTRY_COUNT: usize = CONFIG.pmp_entry_count as usize;
/// Address for jump mode.
#[cfg(not(feature = "payload"))]
pub const JUMP_ADDRESS: usize = CONFIG.jump_address as usize;
/// Physical memory handed to the next stage.
pub const MEMORY_START: usize = CONFIG.memory_start as usize;
pub const MEMORY_SIZE: usize = CONFIG.memory_size as usize;

/// Console device base address.
pub const CONSOLE_BASE: usize = CONFIG.console.base as usize;
/// CLINT base address.
pub const CLINT_BASE: usize = CONFIG.clint.base as usize;
/// Test/reset device base address.
pub const RESET_BASE: usize = CONFIG.reset.base as usize;

/// Secure service domain configuration.
pub mod secure_domain {
    use super::CONFIG;

    pub const ENABLED: bool = CONFIG.domain.enabled;
    pub const NAME: &'static str = CONFIG.domain.name;
    pub const BASE: usize = CONFIG.domain.base as usize;
    pub const SIZE: usize = CONFIG.domain.size as usize;
    pub const ENTRY: usize = CONFIG.domain.entry as usize;
    pub const ARG1: usize = CONFIG.domain.arg1 as usize;
    pub const MODE: &'static str = CONFIG.domain.mode;
    pub const BOOT_HART: usize = CONFIG.domain.boot_hart as usize;
    pub const POSSIBLE_HARTS: usize = CONFIG.domain.possible_harts as usize;
    pub const ASSIGNED_HARTS: usize = CONFIG.domain.assigned_harts as usize;
}
