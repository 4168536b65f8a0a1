//! Supervisor domains: set construction, the machine switch HAL and the
//! vendor extension routing enter/exit ecalls into the context manager.

use core::mem::size_of;
use fast_trap::{EntireContext, EntireContextSeparated, EntireResult, FlowContext};
use riscv::register::{mepc, mie, mstatus, satp, sstatus};
use rustsbi::SbiRet;
use sbi_spec::binary::HartMask;

use domctx::{
    BootStage, ContextManager, ContextSlot, Domain, DomainId, Error, PmpPolicy, PmpRegion,
    Privilege, RegionAccess, RegionMode, SupervisorCsrs, SwitchEffect, SwitchHal, TrapFrame,
    mask_of_first,
};

use crate::cfg;
use crate::firmware;
use crate::platform::PLATFORM;
use crate::riscv::csr;
use crate::riscv::current_hartid;
use crate::sbi::hart_context::NextStage;
use crate::sbi::hsm::{local_hsm, remote_hsm};
use crate::sbi::pmp;
use crate::sbi::trap_stack;

/// Domain context calls, in the firmware-specific SBI extension space.
pub const EID_DOMAIN: usize = 0x0A04_3210;
/// Enter the domain named by `a0`.
pub const DOMAIN_ENTER: usize = 0;
/// Yield back to the caller or advance the boot-up chain.
pub const DOMAIN_EXIT: usize = 1;
/// Report the index of the domain the calling hart is executing in.
pub const DOMAIN_CURRENT: usize = 2;

/// The one manager instance; touched by the cold-boot hart during setup and
/// by each hart for its own context afterwards.
static mut CONTEXT: ContextManager = ContextManager::new(cfg::NUM_HART_MAX);

// Saved frames are copied against the live FlowContext.
const _: () = assert!(size_of::<TrapFrame>() == size_of::<FlowContext>());

/// Machine implementation of the switch HAL.
struct MachineHal;

impl SwitchHal for MachineHal {
    #[inline]
    fn pmp_count(&self) -> usize {
        cfg::PMP_ENTRY_COUNT
    }

    #[inline]
    fn pmp_disable(&mut self, index: usize) {
        pmp::disable_entry(index);
    }

    #[inline]
    fn pmp_apply(&mut self, policy: &PmpPolicy) {
        pmp::apply_policy(policy);
    }

    fn csr_exchange(&mut self, bank: &mut SupervisorCsrs) {
        bank.sstatus = csr::swap_sstatus(bank.sstatus);
        bank.sie = csr::swap_sie(bank.sie);
        bank.sip = csr::swap_sip(bank.sip);
        bank.stvec = csr::swap_stvec(bank.stvec);
        bank.sscratch = csr::swap_sscratch(bank.sscratch);
        bank.sepc = csr::swap_sepc(bank.sepc);
        bank.scause = csr::swap_scause(bank.scause);
        bank.stval = csr::swap_stval(bank.stval);
        bank.satp = csr::swap_satp(bank.satp);
        bank.scounteren = csr::swap_scounteren(bank.scounteren);
        bank.senvcfg = csr::swap_senvcfg(bank.senvcfg);
        bank.mstatus = csr::swap_mstatus(bank.mstatus);
    }

    #[inline]
    fn live_frame(&mut self) -> &mut TrapFrame {
        let ptr = trap_stack::hart_context_mut(current_hartid()).context_ptr();
        unsafe { &mut *ptr.as_ptr().cast::<TrapFrame>() }
    }
}

/// Builds the domain set from config and threads the boot-up chains.
///
/// Runs once on the cold-boot hart, after the platform PMP window is set so
/// the image ranges are known.
pub fn setup() -> Result<(), Error> {
    let mut root = Domain::new("root", mask_of_first(cfg::NUM_HART_MAX), current_hartid());
    root.pmp = root_policy()?;
    unsafe {
        let root_id = CONTEXT.register(root)?;
        if cfg::secure_domain::ENABLED {
            let mut secure = Domain::new(
                cfg::secure_domain::NAME,
                HartMask::from_mask_base(cfg::secure_domain::POSSIBLE_HARTS, 0),
                cfg::secure_domain::BOOT_HART,
            );
            secure.assigned_harts =
                HartMask::from_mask_base(cfg::secure_domain::ASSIGNED_HARTS, 0);
            secure.next_addr = cfg::secure_domain::ENTRY;
            secure.next_arg1 = cfg::secure_domain::ARG1;
            secure.next_mode = privilege_of(cfg::secure_domain::MODE);
            secure.pmp = secure_policy()?;
            let _ = CONTEXT.register(secure)?;
        }
        CONTEXT.init(root_id)
    }
}

/// Logs a per-domain summary after successful setup.
pub fn report() {
    unsafe {
        for (id, d) in CONTEXT.domains() {
            let (possible, _) = d.possible_harts.into_inner();
            let (assigned, _) = d.assigned_harts.into_inner();
            info!(
                "Domain{} {}: boot hart {}, possible {:#x}, assigned {:#x}",
                id.0, d.name, d.boot_hartid, possible, assigned
            );
            if d.next_addr != 0 {
                info!(
                    "{:<30}: 0x{:08x} ({:?}, arg 0x{:x})",
                    "  Next entry", d.next_addr, d.next_mode, d.next_arg1
                );
            }
        }
    }
}

/// Context slot of the domain running on this hart.
pub fn current_context() -> Option<&'static ContextSlot> {
    unsafe { CONTEXT.current_slot(current_hartid()) }
}

/// Handler for the domain vendor extension, on the full-context trap path.
pub extern "C" fn domain_call_handler(raw_ctx: EntireContext) -> EntireResult {
    let mut ctx = raw_ctx.split().0;
    let hart_id = current_hartid();
    let a0 = ctx.regs().a[0];
    let a6 = ctx.regs().a[6];
    let epc = mepc::read();

    match a6 {
        DOMAIN_ENTER | DOMAIN_EXIT => {}
        DOMAIN_CURRENT => {
            // Pure query; nothing is switched.
            let ret = match current_context() {
                Some(slot) => SbiRet::success(slot.domain().0),
                None => SbiRet::invalid_param(),
            };
            ctx.regs().a[0] = ret.error;
            ctx.regs().a[1] = ret.value;
            mepc::write(epc + 4);
            return ctx.restore();
        }
        _ => {
            let ret = SbiRet::not_supported();
            ctx.regs().a[0] = ret.error;
            ctx.regs().a[1] = ret.value;
            mepc::write(epc + 4);
            return ctx.restore();
        }
    }

    // Stage the caller's resume state before switching: skip the `ecall`
    // (which has no compressed encoding) and make the call read as
    // successful once this context is resumed.
    let staged = SbiRet::success(0);
    ctx.regs().pc = epc + 4;
    ctx.regs().a[0] = staged.error;
    ctx.regs().a[1] = staged.value;

    let mut hal = MachineHal;
    let result = match a6 {
        DOMAIN_ENTER => unsafe { CONTEXT.enter(hart_id, DomainId(a0), &mut hal) },
        _ => unsafe { CONTEXT.exit(hart_id, &mut hal) },
    };

    match result {
        Ok(SwitchEffect::Resumed) => {
            // The live frame now belongs to the target context.
            mepc::write(ctx.regs().pc);
            ctx.restore()
        }
        Ok(SwitchEffect::BootHere(stage)) => boot_stage(ctx, stage),
        Ok(SwitchEffect::StartAndPark { boot_hartid, stage }) => {
            let ret = start_boot_hart(boot_hartid, stage);
            if ret.is_err() {
                debug!("Start request for boot hart {} returned {:?}", boot_hartid, ret);
            }
            park()
        }
        Ok(SwitchEffect::Park) => park(),
        Err(err) => {
            // Nothing was switched; report the failure to the caller.
            let ret = sbi_ret_of(err);
            ctx.regs().pc = epc + 4;
            ctx.regs().a[0] = ret.error;
            ctx.regs().a[1] = ret.value;
            mepc::write(epc + 4);
            ctx.restore()
        }
    }
}

/// First jump into a fresh domain context on its boot hart.
fn boot_stage(mut ctx: EntireContextSeparated, stage: BootStage) -> EntireResult {
    unsafe {
        sstatus::clear_sie();
        satp::write(0);
        mstatus::set_mpie();
        mstatus::set_mpp(mpp_of(stage.next_mode));
        mie::set_msoft();
        mie::set_mtimer();
    }
    ctx.regs().a[0] = current_hartid();
    ctx.regs().a[1] = stage.opaque;
    ctx.regs().pc = stage.start_addr;
    mepc::write(stage.start_addr);
    ctx.restore()
}

/// Posts the domain's boot stage to its boot hart through HSM.
fn start_boot_hart(hart_id: usize, stage: BootStage) -> SbiRet {
    match remote_hsm(hart_id) {
        Some(remote) => {
            if remote.start(NextStage {
                start_addr: stage.start_addr,
                opaque: stage.opaque,
                next_mode: mpp_of(stage.next_mode),
            }) {
                unsafe {
                    PLATFORM.sbi.ipi.as_ref().unwrap().set_msip(hart_id);
                }
                SbiRet::success(0)
            } else {
                SbiRet::already_started()
            }
        }
        None => SbiRet::invalid_param(),
    }
}

/// Parks this hart until its domain starts it through HSM.
fn park() -> ! {
    local_hsm().stop();
    unsafe { crate::sbi::trap::boot::boot() }
}

fn mpp_of(privilege: Privilege) -> mstatus::MPP {
    match privilege {
        Privilege::Supervisor => mstatus::MPP::Supervisor,
        Privilege::User => mstatus::MPP::User,
    }
}

fn privilege_of(mode: &str) -> Privilege {
    match mode {
        "user" | "User" => Privilege::User,
        _ => Privilege::Supervisor,
    }
}

fn sbi_ret_of(err: Error) -> SbiRet {
    match err {
        Error::InvalidParam => SbiRet::invalid_param(),
        // The SBI binary encoding has no out-of-memory value.
        Error::OutOfMemory => SbiRet::failed(),
    }
}

/// Root domain policy: the firmware self-protection window, matching the
/// entries `firmware::set_pmp` programs at boot.
fn root_policy() -> Result<PmpPolicy, Error> {
    let image = firmware::sbi_image_range();
    let rodata = firmware::sbi_rodata_range();
    let tor = |addr, access| PmpRegion {
        addr,
        size: 0,
        access,
        mode: RegionMode::Tor,
    };
    let mut policy = PmpPolicy::new();
    policy.push(PmpRegion {
        addr: 0,
        size: 0,
        access: RegionAccess::None,
        mode: RegionMode::Off,
    })?;
    policy.push(tor(cfg::MEMORY_START, RegionAccess::RWX))?;
    policy.push(tor(image.start, RegionAccess::RWX))?;
    policy.push(tor(rodata.start, RegionAccess::None))?;
    policy.push(tor(rodata.end, RegionAccess::None))?;
    policy.push(tor(image.end, RegionAccess::None))?;
    policy.push(tor(cfg::MEMORY_START + cfg::MEMORY_SIZE, RegionAccess::RWX))?;
    policy.push(tor(usize::MAX, RegionAccess::RW))?;
    Ok(policy)
}

/// Secure domain policy: its own memory plus the console MMIO window; every
/// other access is denied by the absence of a matching entry.
fn secure_policy() -> Result<PmpPolicy, Error> {
    let mut policy = PmpPolicy::new();
    policy.push(PmpRegion {
        addr: cfg::secure_domain::BASE,
        size: cfg::secure_domain::SIZE,
        access: RegionAccess::RWX,
        mode: RegionMode::Napot,
    })?;
    policy.push(PmpRegion {
        addr: cfg::CONSOLE_BASE,
        size: cfg::PAGE_SIZE,
        access: RegionAccess::RW,
        mode: RegionMode::Napot,
    })?;
    Ok(policy)
}
