use crate::riscv::current_hartid;
use crate::sbi::hsm::local_hsm;
use crate::sbi::ipi;
use crate::sbi::trap_stack;
use core::arch::naked_asm;
use riscv::register::{mie, mstatus, satp, sstatus};
use sbi_spec::hsm::hart_state;

/// Boot Function.
/// After boot, this flow will never back again,
/// so we can store a0, a1 and mepc only.
#[unsafe(naked)]
pub unsafe extern "C" fn boot() -> ! {
    naked_asm!(
        ".align 2",
        // Reset hart local stack
        "call    {locate_stack}",
        "csrw    mscratch, sp",
        // Allocate stack space
        "addi   sp, sp, -3*8",
        // Call handler with context pointer
        "mv     a0, sp",
        "call   {boot_handler}",
        // Restore mepc
        "ld     t0, 0*8(sp)
        csrw    mepc, t0",
        // Restore registers
        "ld      a0, 1*8(sp)",
        "ld      a1, 2*8(sp)",
        // Restore stack pointer
        "add     sp, sp, 3*8",
        // Switch stacks back
        "csrrw  sp, mscratch, sp",
        // Return from machine mode
        "mret",
        locate_stack = sym trap_stack::locate,
        boot_handler = sym boot_handler,
    );
}

/// Boot Handler.
///
/// Waits until this hart is started through HSM, then fills the boot context
/// with the next stage entry state. A stopped hart parks here on `wfi`.
pub extern "C" fn boot_handler(ctx: &mut BootContext) {
    loop {
        match local_hsm().start() {
            // Handle HSM Start
            Ok(next_stage) => {
                ipi::clear_msip();
                unsafe {
                    sstatus::clear_sie();
                    satp::write(0);
                    mstatus::set_mpie();
                    mstatus::set_mpp(next_stage.next_mode);
                    mie::set_msoft();
                    mie::set_mtimer();
                }
                ctx.a0 = current_hartid();
                ctx.a1 = next_stage.opaque;
                ctx.mepc = next_stage.start_addr;
                return;
            }
            // Handle HSM Stop
            Err(hart_state::STOPPED) => {
                ipi::clear_msip();
                unsafe {
                    mie::set_msoft();
                }
                riscv::asm::wfi();
            }
            _ => core::hint::spin_loop(),
        }
    }
}

/// Boot context structure containing saved register state.
#[derive(Debug)]
#[repr(C)]
pub struct BootContext {
    pub mepc: usize, // 0
    pub a0: usize,
    pub a1: usize, // 2
}
