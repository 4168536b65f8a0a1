use fast_trap::{FastContext, FastResult};
use riscv::register::{mepc, mie, mstatus, satp, sstatus};
use rustsbi::RustSBI;
use sbi_spec::hsm::hart_state;

use crate::platform::PLATFORM;
use crate::riscv::current_hartid;
use crate::sbi::console;
use crate::sbi::hsm::local_hsm;
use crate::sbi::ipi;

/// Boot or resume a supervisor stage on the fast path.
#[inline]
pub fn switch(mut ctx: FastContext, start_addr: usize, opaque: usize) -> FastResult {
    unsafe {
        sstatus::clear_sie();
        satp::write(0);
    }

    ctx.regs().a[0] = current_hartid();
    ctx.regs().a[1] = opaque;
    ctx.regs().pc = start_addr;
    ctx.call(2)
}

/// Handle machine software inter-processor interrupts.
#[inline]
pub fn msoft_ipi_handler() {
    use ipi::get_and_reset_ipi_type;
    ipi::clear_msip();
    let ipi_type = get_and_reset_ipi_type();
    // Handle supervisor software interrupt
    if (ipi_type & ipi::IPI_TYPE_SSOFT) != 0 {
        unsafe {
            riscv::register::mip::set_ssoft();
        }
    }
}

#[inline]
pub fn msoft_handler(ctx: FastContext) -> FastResult {
    match local_hsm().start() {
        // Handle HSM Start
        Ok(next_stage) => {
            ipi::clear_msip();
            unsafe {
                mstatus::set_mpie();
                mstatus::set_mpp(next_stage.next_mode);
                mie::set_msoft();
                mie::set_mtimer();
            }
            switch(ctx, next_stage.start_addr, next_stage.opaque)
        }
        // Handle HSM Stop
        Err(hart_state::STOPPED) => {
            ipi::clear_msip();
            unsafe {
                mie::set_msoft();
            }
            riscv::asm::wfi();
            ctx.restore()
        }
        // Handle plain IPIs
        _ => {
            msoft_ipi_handler();
            ctx.restore()
        }
    }
}

#[inline]
#[allow(clippy::too_many_arguments)]
pub fn sbi_call_handler(
    mut ctx: FastContext,
    a1: usize,
    a2: usize,
    a3: usize,
    a4: usize,
    a5: usize,
    a6: usize,
    a7: usize,
) -> FastResult {
    use sbi_spec::{base, legacy};
    let mut ret = unsafe {
        PLATFORM
            .sbi
            .handle_ecall(a7, a6, [ctx.a0(), a1, a2, a3, a4, a5])
    };
    if ret.is_ok() {
        match (a7, a6) {
            // Handle legacy console probe
            (base::EID_BASE, base::PROBE_EXTENSION)
                if matches!(
                    ctx.a0(),
                    legacy::LEGACY_CONSOLE_PUTCHAR | legacy::LEGACY_CONSOLE_GETCHAR
                ) =>
            {
                ret.value = 1;
            }
            _ => {}
        }
    } else {
        match a7 {
            legacy::LEGACY_CONSOLE_PUTCHAR => {
                ret.error = console::putchar(ctx.a0());
                ret.value = a1;
            }
            legacy::LEGACY_CONSOLE_GETCHAR => {
                ret.error = console::getchar();
                ret.value = a1;
            }
            _ => {}
        }
    }
    ctx.regs().a = [ret.error, ret.value, a2, a3, a4, a5, a6, a7];
    // `ecall` has no compressed encoding; skip the full instruction.
    mepc::write(mepc::read() + 4);
    ctx.restore()
}
