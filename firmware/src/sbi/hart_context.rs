use core::ptr::NonNull;
use core::sync::atomic::{AtomicU8, Ordering};
use fast_trap::FlowContext;
use riscv::register::mstatus;

use crate::sbi::hsm::HsmCell;

/// Context for managing hart (hardware thread) state and operations.
pub(crate) struct HartContext {
    /// Trap context for handling exceptions and interrupts.
    trap: FlowContext,
    /// Hart state management cell containing next stage boot info.
    pub hsm: HsmCell<NextStage>,
    /// Type of inter-processor interrupt pending.
    pub ipi_type: AtomicU8,
}

// HartContext sits at the bottom of each per-hart stack; the stack size must
// keep it aligned.
use crate::cfg::STACK_SIZE_PER_HART;
const _: () = assert!(STACK_SIZE_PER_HART % core::mem::align_of::<HartContext>() == 0);

impl HartContext {
    /// Initialize the hart context by creating a fresh HSM cell.
    #[inline]
    pub fn init(&mut self) {
        self.hsm = HsmCell::new();
        self.ipi_type.store(0, Ordering::Relaxed);
    }

    /// Get a non-null pointer to the trap context.
    #[inline]
    pub fn context_ptr(&mut self) -> NonNull<FlowContext> {
        unsafe { NonNull::new_unchecked(&mut self.trap) }
    }
}

/// Information needed to boot into the next execution stage.
#[derive(Debug)]
pub struct NextStage {
    /// Starting address to jump to.
    pub start_addr: usize,
    /// Opaque value passed to next stage.
    pub opaque: usize,
    /// Privilege mode for next stage.
    pub next_mode: mstatus::MPP,
}
