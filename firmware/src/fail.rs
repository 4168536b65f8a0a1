use crate::riscv::current_hartid;

use riscv::interrupt::machine::{Exception, Interrupt};
use riscv::register::{mcause::Trap, mepc, mtval};

#[cfg(all(feature = "payload", feature = "jump"))]
compile_error!("feature \"payload\" and feature \"jump\" cannot be enabled at the same time");

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    use ::riscv::register::*;
    error!("Hart {} {info}", current_hartid());
    error!("-----------------------------");
    error!("mcause:  {:?}", mcause::read().cause());
    error!("mepc:    {:#018x}", mepc::read());
    error!("mtval:   {:#018x}", mtval::read());
    error!("-----------------------------");
    error!("System shutdown scheduled due to RustSBI panic");
    loop {}
}

pub fn unsupported_trap(trap: Option<Trap<Interrupt, Exception>>) -> ! {
    error!("-----------------------------");
    error!("trap:    {trap:?}");
    error!("mepc:    {:#018x}", mepc::read());
    error!("mtval:   {:#018x}", mtval::read());
    error!("-----------------------------");
    panic!("Stopped with unsupported trap")
}

#[cold]
pub fn stop() -> ! {
    loop {
        core::hint::spin_loop()
    }
}
