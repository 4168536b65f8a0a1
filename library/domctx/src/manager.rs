//! Context manager: slot pool, boot-up chains and the switch engine.

use alloc::vec::Vec;
use log::error;

use crate::context::{ContextSlot, SlotId};
use crate::domain::{BootStage, Domain, DomainId, mask_clear, mask_set};
use crate::{Error, SwitchHal};

/// What the firmware must do after a switch completed.
///
/// A switch into a slot holding a snapshot is finished once the live frame is
/// restored. A switch into a fresh slot leaves a zeroed frame behind and the
/// domain still has to be brought up; how depends on which hart we are on.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchEffect {
    /// The target context was resumed from its snapshot; nothing left to do.
    Resumed,
    /// Fresh context and this hart is the domain's boot hart: jump into the
    /// entry point.
    BootHere(BootStage),
    /// Fresh context whose boot hart is elsewhere: request a start of
    /// `boot_hartid` and park this hart until the domain brings it up.
    StartAndPark { boot_hartid: usize, stage: BootStage },
    /// Fresh context that cannot start yet: some hart the domain may ever use
    /// has never been observed under management. Park this hart.
    Park,
}

/// Owner of every context slot and of the per-hart switch state.
///
/// Registration and [`init`] run once on the cold-boot hart. Afterwards each
/// hart only touches its own current pointer, its own slots and its own bit
/// in the assigned masks, so the runtime paths need no locking; callers must
/// keep machine interrupts masked for the duration of a switch.
///
/// [`init`]: ContextManager::init
pub struct ContextManager {
    domains: Vec<Domain>,
    slots: Vec<ContextSlot>,
    /// Per-hart pointer to the slot holding the running context.
    current: Vec<Option<SlotId>>,
    /// Per-hart owner domain, the inverse of the assigned masks.
    hart_domain: Vec<Option<DomainId>>,
    root: Option<DomainId>,
    num_harts: usize,
    ready: bool,
}

impl ContextManager {
    pub const fn new(num_harts: usize) -> Self {
        Self {
            domains: Vec::new(),
            slots: Vec::new(),
            current: Vec::new(),
            hart_domain: Vec::new(),
            root: None,
            num_harts,
            ready: false,
        }
    }

    /// Adds a domain to the registry. Only possible before [`init`].
    ///
    /// [`init`]: ContextManager::init
    pub fn register(&mut self, domain: Domain) -> Result<DomainId, Error> {
        if self.ready {
            return Err(Error::InvalidParam);
        }
        self.domains.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
        let id = DomainId(self.domains.len());
        self.domains.push(domain);
        Ok(id)
    }

    /// Allocates every context slot and threads the per-hart boot-up chains.
    ///
    /// Non-root domains are processed in registration order; a domain's
    /// assigned harts seed the chain of the hart they name, its unassigned
    /// possible harts are validated and appended. The root domain is
    /// processed last so its slots terminate every chain, and cold boot
    /// leaves every covered hart current in the root domain.
    ///
    /// Calling `init` a second time is refused. A failed `init` is terminal
    /// for the firmware; the manager is not reusable afterwards.
    pub fn init(&mut self, root: DomainId) -> Result<(), Error> {
        if self.ready || root.0 >= self.domains.len() {
            return Err(Error::InvalidParam);
        }
        if !self.domains[root.0].context_managed {
            error!(
                "{}: root domain must have context management enabled",
                self.domains[root.0].name
            );
            return Err(Error::InvalidParam);
        }
        let num_harts = self.num_harts;
        self.current
            .try_reserve_exact(num_harts)
            .map_err(|_| Error::OutOfMemory)?;
        self.current.resize(num_harts, None);
        self.hart_domain
            .try_reserve_exact(num_harts)
            .map_err(|_| Error::OutOfMemory)?;
        self.hart_domain.resize(num_harts, None);

        // Head and tail of each hart's chain of startup candidates.
        let mut head: Vec<Option<SlotId>> = Vec::new();
        head.try_reserve_exact(num_harts)
            .map_err(|_| Error::OutOfMemory)?;
        head.resize(num_harts, None);
        let mut tail: Vec<Option<SlotId>> = Vec::new();
        tail.try_reserve_exact(num_harts)
            .map_err(|_| Error::OutOfMemory)?;
        tail.resize(num_harts, None);

        for idx in 0..self.domains.len() {
            if idx == root.0 || !self.domains[idx].context_managed {
                continue;
            }
            self.install_domain_slots(DomainId(idx), root, &mut head, &mut tail)?;
        }
        self.install_root_slots(root, &head, &tail)?;

        // Harts outside the root domain start out current in their chain
        // head; they come up once that domain's boot hart starts them.
        for h in 0..num_harts {
            if self.current[h].is_none() {
                if let Some(hd) = head[h] {
                    self.current[h] = Some(hd);
                    self.hart_domain[h] = Some(self.slots[hd.0].dom);
                }
            }
        }

        // From here on the assigned masks track the runtime claim only.
        for d in self.domains.iter_mut() {
            d.assigned_harts = crate::domain::empty_mask();
        }
        for h in 0..num_harts {
            if let Some(d) = self.hart_domain[h] {
                let dom = &mut self.domains[d.0];
                dom.assigned_harts = mask_set(dom.assigned_harts, h);
            }
        }

        self.root = Some(root);
        self.ready = true;
        Ok(())
    }

    fn install_domain_slots(
        &mut self,
        id: DomainId,
        root: DomainId,
        head: &mut [Option<SlotId>],
        tail: &mut [Option<SlotId>],
    ) -> Result<(), Error> {
        let num_harts = self.num_harts;
        let root_possible = self.domains[root.0].possible_harts;
        let count = (0..num_harts)
            .filter(|&h| self.domains[id.0].possible_harts.has_bit(h))
            .count();
        // Reserving up front keeps the per-slot pushes infallible, so a
        // domain is installed either completely or not at all.
        self.slots
            .try_reserve(count)
            .map_err(|_| Error::OutOfMemory)?;
        {
            let d = &mut self.domains[id.0];
            d.table
                .try_reserve_exact(num_harts)
                .map_err(|_| Error::OutOfMemory)?;
            d.table.resize(num_harts, None);
        }
        for h in 0..num_harts {
            let d = &self.domains[id.0];
            if !d.possible_harts.has_bit(h) {
                continue;
            }
            if !d.assigned_harts.has_bit(h) {
                // An unassigned context is only reachable if the domain can
                // be started at all and if something will run on this hart.
                if !d.assigned_harts.has_bit(d.boot_hartid) {
                    error!(
                        "{}: boot hart {} is not an assigned hart, domain can never be started",
                        d.name, d.boot_hartid
                    );
                    return Err(Error::InvalidParam);
                }
                if tail[h].is_none() && !root_possible.has_bit(h) {
                    error!(
                        "{}: contexts on hart {} will never be started up",
                        d.name, h
                    );
                    return Err(Error::InvalidParam);
                }
            }
            let slot = SlotId(self.slots.len());
            self.slots.push(ContextSlot::empty(id));
            self.domains[id.0].table[h] = Some(slot);
            match tail[h] {
                Some(t) => self.slots[t.0].next_ctx = Some(slot),
                None => head[h] = Some(slot),
            }
            tail[h] = Some(slot);
        }
        Ok(())
    }

    fn install_root_slots(
        &mut self,
        root: DomainId,
        head: &[Option<SlotId>],
        tail: &[Option<SlotId>],
    ) -> Result<(), Error> {
        let num_harts = self.num_harts;
        let count = (0..num_harts)
            .filter(|&h| self.domains[root.0].possible_harts.has_bit(h))
            .count();
        self.slots
            .try_reserve(count)
            .map_err(|_| Error::OutOfMemory)?;
        {
            let d = &mut self.domains[root.0];
            d.table
                .try_reserve_exact(num_harts)
                .map_err(|_| Error::OutOfMemory)?;
            d.table.resize(num_harts, None);
        }
        for h in 0..num_harts {
            if !self.domains[root.0].possible_harts.has_bit(h) {
                continue;
            }
            let slot = SlotId(self.slots.len());
            self.slots.push(ContextSlot::empty(root));
            self.domains[root.0].table[h] = Some(slot);
            // Every chain terminates at the root slot, and the root slot
            // links to the first startup candidate so the hart's first exit
            // advances the chain.
            if let Some(t) = tail[h] {
                self.slots[t.0].next_ctx = Some(slot);
            }
            self.slots[slot.0].next_ctx = head[h];
            self.current[h] = Some(slot);
            self.hart_domain[h] = Some(root);
        }
        Ok(())
    }

    /// Switches the calling hart into `target`'s context.
    ///
    /// Records the caller on the target slot so the matching [`exit`] finds
    /// its way home, then runs the switch. Entering the domain the hart is
    /// already in is a no-op. Nothing changes on the error path.
    ///
    /// [`exit`]: ContextManager::exit
    pub fn enter(
        &mut self,
        hart_id: usize,
        target: DomainId,
        hal: &mut impl SwitchHal,
    ) -> Result<SwitchEffect, Error> {
        if !self.ready || hart_id >= self.num_harts || target.0 >= self.domains.len() {
            return Err(Error::InvalidParam);
        }
        if !self.domains[target.0].context_managed {
            return Err(Error::InvalidParam);
        }
        let cur = self.current[hart_id].ok_or(Error::InvalidParam)?;
        let tgt = self.domains[target.0]
            .context_of(hart_id)
            .ok_or(Error::InvalidParam)?;
        if cur == tgt {
            return Ok(SwitchEffect::Resumed);
        }
        self.slots[tgt.0].next_ctx = Some(cur);
        Ok(self.switch(hart_id, cur, tgt, hal))
    }

    /// Yields the calling hart's context to its successor.
    ///
    /// The successor is the slot recorded in the current slot's link (the
    /// caller that entered us, or the next startup candidate threaded at
    /// init); the link is consumed. With no link the hart falls back to the
    /// root domain's slot. Fails if no successor exists, leaving all state
    /// untouched.
    pub fn exit(
        &mut self,
        hart_id: usize,
        hal: &mut impl SwitchHal,
    ) -> Result<SwitchEffect, Error> {
        if !self.ready || hart_id >= self.num_harts {
            return Err(Error::InvalidParam);
        }
        let cur = self.current[hart_id].ok_or(Error::InvalidParam)?;
        let root = self.root.ok_or(Error::InvalidParam)?;
        let tgt = match self.slots[cur.0].next_ctx {
            Some(t) => {
                self.slots[cur.0].next_ctx = None;
                t
            }
            None => self.domains[root.0]
                .context_of(hart_id)
                .ok_or(Error::InvalidParam)?,
        };
        if tgt == cur {
            return Err(Error::InvalidParam);
        }
        Ok(self.switch(hart_id, cur, tgt, hal))
    }

    /// The ordered switch: domain handover, PMP, CSR bank, trap frame.
    ///
    /// Precondition: single-threaded on this hart with machine interrupts
    /// masked. Postcondition: hardware reflects `tgt`, `cur` holds a
    /// resumable snapshot of the pre-switch state.
    fn switch(
        &mut self,
        hart_id: usize,
        cur: SlotId,
        tgt: SlotId,
        hal: &mut impl SwitchHal,
    ) -> SwitchEffect {
        let out_dom = self.slots[cur.0].dom;
        let in_dom = self.slots[tgt.0].dom;

        // Hand the hart over first; trap handlers must not observe the old
        // owner once any hardware state changes below.
        if out_dom != in_dom {
            let outgoing = &mut self.domains[out_dom.0];
            outgoing.assigned_harts = mask_clear(outgoing.assigned_harts, hart_id);
            self.hart_domain[hart_id] = Some(in_dom);
            let incoming = &mut self.domains[in_dom.0];
            incoming.assigned_harts = mask_set(incoming.assigned_harts, hart_id);
        }

        // PMP entries are not replaceable atomically; a stale entry
        // overlapping a new one could grant unintended access mid-switch, so
        // wipe them all before applying the incoming policy.
        for index in 0..hal.pmp_count() {
            hal.pmp_disable(index);
        }
        hal.pmp_apply(&self.domains[in_dom.0].pmp);

        // Swap the live CSR bank against the target snapshot; the old live
        // values land in the outgoing slot.
        let mut bank = self.slots[tgt.0].csrs;
        hal.csr_exchange(&mut bank);
        self.slots[cur.0].csrs = bank;

        // Exchange trap frames only after the CSRs are in place.
        let frame = hal.live_frame();
        let outgoing_regs = *frame;
        *frame = self.slots[tgt.0].regs;
        self.slots[cur.0].regs = outgoing_regs;

        self.slots[cur.0].initialized = true;
        self.current[hart_id] = Some(tgt);

        if self.slots[tgt.0].initialized {
            SwitchEffect::Resumed
        } else {
            self.startup(hart_id, in_dom)
        }
    }

    /// Disposition for a switch that landed in a fresh context.
    fn startup(&self, hart_id: usize, dom: DomainId) -> SwitchEffect {
        let d = &self.domains[dom.0];
        // The domain can only come up once every hart it may ever use is
        // under management; a possible hart this platform does not have (or
        // that nothing will ever run on) keeps it parked.
        let all_observed = (0..usize::BITS as usize)
            .filter(|&h| d.possible_harts.has_bit(h))
            .all(|h| h < self.num_harts && self.current[h].is_some());
        if !all_observed {
            return SwitchEffect::Park;
        }
        let stage = d.boot_stage();
        if hart_id == d.boot_hartid {
            SwitchEffect::BootHere(stage)
        } else {
            SwitchEffect::StartAndPark {
                boot_hartid: d.boot_hartid,
                stage,
            }
        }
    }

    /// Slot holding the context the hart is currently running.
    pub fn current_slot(&self, hart_id: usize) -> Option<&ContextSlot> {
        let id = *self.current.get(hart_id)?;
        id.map(|id| &self.slots[id.0])
    }

    /// Domain the hart currently belongs to.
    pub fn current_domain(&self, hart_id: usize) -> Option<DomainId> {
        self.hart_domain.get(hart_id).copied().flatten()
    }

    pub fn domain(&self, id: DomainId) -> Option<&Domain> {
        self.domains.get(id.0)
    }

    pub fn root(&self) -> Option<DomainId> {
        self.root
    }

    pub fn domains(&self) -> impl Iterator<Item = (DomainId, &Domain)> {
        self.domains.iter().enumerate().map(|(i, d)| (DomainId(i), d))
    }

    pub fn ready(&self) -> bool {
        self.ready
    }

    pub(crate) fn slot(&self, id: SlotId) -> &ContextSlot {
        &self.slots[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PmpRegion, Privilege, RegionAccess, RegionMode, mask_of_first};
    use crate::{SupervisorCsrs, TrapFrame};
    use alloc::vec::Vec;
    use sbi_spec::binary::HartMask;
    use std::collections::BTreeSet;

    const SECURE_ENTRY: usize = 0x8020_0000;
    const SECURE_ARG1: usize = 0x87e5_4321;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum PmpEvent {
        Disable(usize),
        Apply,
    }

    /// Mock of the machine hardware: a live CSR bank, a live frame and a
    /// recording PMP unit.
    struct TestHal {
        csrs: SupervisorCsrs,
        frame: TrapFrame,
        pmp: [Option<PmpRegion>; 8],
        events: Vec<PmpEvent>,
    }

    impl TestHal {
        fn new() -> Self {
            Self {
                csrs: SupervisorCsrs::default(),
                frame: TrapFrame::default(),
                pmp: [None; 8],
                events: Vec::new(),
            }
        }
    }

    impl SwitchHal for TestHal {
        fn pmp_count(&self) -> usize {
            self.pmp.len()
        }

        fn pmp_disable(&mut self, index: usize) {
            self.pmp[index] = None;
            self.events.push(PmpEvent::Disable(index));
        }

        fn pmp_apply(&mut self, policy: &crate::PmpPolicy) {
            for (index, region) in policy.regions().iter().enumerate() {
                self.pmp[index] = Some(*region);
            }
            self.events.push(PmpEvent::Apply);
        }

        fn csr_exchange(&mut self, bank: &mut SupervisorCsrs) {
            core::mem::swap(&mut self.csrs, bank);
        }

        fn live_frame(&mut self) -> &mut TrapFrame {
            &mut self.frame
        }
    }

    fn region(addr: usize) -> PmpRegion {
        PmpRegion {
            addr,
            size: 0x20_0000,
            access: RegionAccess::RWX,
            mode: RegionMode::Napot,
        }
    }

    fn root_domain(num_harts: usize) -> Domain {
        let mut d = Domain::new("root", mask_of_first(num_harts), 0);
        d.pmp.push(region(0x8000_0000)).unwrap();
        d
    }

    fn secure_domain(possible: HartMask, assigned: HartMask, boot_hartid: usize) -> Domain {
        let mut d = Domain::new("secure", possible, boot_hartid);
        d.assigned_harts = assigned;
        d.next_addr = SECURE_ENTRY;
        d.next_mode = Privilege::Supervisor;
        d.next_arg1 = SECURE_ARG1;
        d.pmp.push(region(0x8020_0000)).unwrap();
        d
    }

    /// root + secure on a single hart, both claiming hart 0.
    fn single_hart_pair() -> (ContextManager, DomainId, DomainId) {
        let mut mgr = ContextManager::new(1);
        let root = mgr.register(root_domain(1)).unwrap();
        let secure = mgr
            .register(secure_domain(mask_of_first(1), mask_of_first(1), 0))
            .unwrap();
        mgr.init(root).unwrap();
        (mgr, root, secure)
    }

    fn sentinel_csrs() -> SupervisorCsrs {
        SupervisorCsrs {
            sstatus: 0x1111,
            sie: 0x2222,
            sip: 0x3333,
            stvec: 0x4444,
            sscratch: 0x5555,
            sepc: 0x6666,
            scause: 0x7777,
            stval: 0x8888,
            satp: 0x9999,
            scounteren: 0xaaaa,
            senvcfg: 0xbbbb,
            mstatus: 0xcccc,
        }
    }

    fn sentinel_frame() -> TrapFrame {
        let mut frame = TrapFrame::default();
        frame.ra = 0x100;
        frame.sp = 0x200;
        frame.gp = 0x300;
        frame.a = [10, 11, 12, 13, 14, 15, 16, 17];
        frame.s[0] = 0x400;
        frame.t[6] = 0x500;
        frame.pc = 0x8000_1004;
        frame
    }

    #[test]
    fn enter_starts_fresh_domain_on_its_boot_hart() {
        let (mut mgr, root, secure) = single_hart_pair();
        let mut hal = TestHal::new();
        hal.csrs = sentinel_csrs();
        hal.frame = sentinel_frame();

        let effect = mgr.enter(0, secure, &mut hal).unwrap();
        assert_eq!(
            effect,
            SwitchEffect::BootHere(BootStage {
                start_addr: SECURE_ENTRY,
                next_mode: Privilege::Supervisor,
                opaque: SECURE_ARG1,
            })
        );
        // A fresh context starts from the zeroed slot state.
        assert_eq!(hal.csrs, SupervisorCsrs::default());
        assert_eq!(hal.frame, TrapFrame::default());
        // The hart now belongs to the secure domain.
        assert_eq!(mgr.current_domain(0), Some(secure));
        assert!(mgr.domain(secure).unwrap().assigned_harts.has_bit(0));
        assert!(!mgr.domain(root).unwrap().assigned_harts.has_bit(0));
        // PMP reflects the secure policy.
        assert_eq!(hal.pmp[0], Some(region(0x8020_0000)));
        assert_eq!(hal.pmp[1], None);
    }

    #[test]
    fn exit_returns_to_caller_with_state_intact() {
        let (mut mgr, root, secure) = single_hart_pair();
        let mut hal = TestHal::new();
        let caller_csrs = sentinel_csrs();
        let caller_frame = sentinel_frame();
        hal.csrs = caller_csrs;
        hal.frame = caller_frame;

        let _ = mgr.enter(0, secure, &mut hal).unwrap();
        // The callee runs for a while and then yields with its own state.
        hal.frame.pc = SECURE_ENTRY + 0x40;
        hal.csrs.satp = 0xdead;

        let effect = mgr.exit(0, &mut hal).unwrap();
        assert_eq!(effect, SwitchEffect::Resumed);
        // Round trip: every saved CSR and register equals the caller's.
        assert_eq!(hal.csrs, caller_csrs);
        assert_eq!(hal.frame, caller_frame);
        assert_eq!(mgr.current_domain(0), Some(root));
        // PMP reflects the caller's policy again.
        assert_eq!(hal.pmp[0], Some(region(0x8000_0000)));
        // The callee slot now holds a resumable snapshot.
        let slot = mgr.domain(secure).unwrap().context_of(0).unwrap();
        assert!(mgr.slot(slot).initialized());
        assert_eq!(mgr.slot(slot).regs.pc, SECURE_ENTRY + 0x40);
        assert_eq!(mgr.slot(slot).csrs.satp, 0xdead);
    }

    #[test]
    fn pmp_entries_are_wiped_before_the_new_policy_lands() {
        let (mut mgr, _, secure) = single_hart_pair();
        let mut hal = TestHal::new();
        let _ = mgr.enter(0, secure, &mut hal).unwrap();
        let disables: Vec<_> = (0..hal.pmp_count()).map(PmpEvent::Disable).collect();
        assert_eq!(hal.events[..disables.len()], disables[..]);
        assert_eq!(hal.events[disables.len()], PmpEvent::Apply);
    }

    #[test]
    fn first_exit_walks_the_boot_chain() {
        // root on both harts, secure claims hart 0 only.
        let mut mgr = ContextManager::new(2);
        let root = mgr.register(root_domain(2)).unwrap();
        let secure = mgr
            .register(secure_domain(mask_of_first(2), mask_of_first(1), 0))
            .unwrap();
        mgr.init(root).unwrap();

        // Hart 0: the chain head is the secure context, started in place.
        let mut hal0 = TestHal::new();
        let effect = mgr.exit(0, &mut hal0).unwrap();
        assert!(matches!(effect, SwitchEffect::BootHere(stage) if stage.start_addr == SECURE_ENTRY));
        assert_eq!(mgr.current_domain(0), Some(secure));

        // Hart 1 is not the boot hart; it hands over and parks.
        let mut hal1 = TestHal::new();
        let effect = mgr.exit(1, &mut hal1).unwrap();
        assert_eq!(
            effect,
            SwitchEffect::StartAndPark {
                boot_hartid: 0,
                stage: BootStage {
                    start_addr: SECURE_ENTRY,
                    next_mode: Privilege::Supervisor,
                    opaque: SECURE_ARG1,
                },
            }
        );
        assert_eq!(mgr.current_domain(1), Some(secure));

        // The chains are spent: the next exit on hart 0 falls back to root.
        let effect = mgr.exit(0, &mut hal0).unwrap();
        assert_eq!(effect, SwitchEffect::Resumed);
        assert_eq!(mgr.current_domain(0), Some(root));
    }

    #[test]
    fn init_rejects_boot_hart_outside_assigned_mask() {
        let mut mgr = ContextManager::new(3);
        let root = mgr.register(root_domain(3)).unwrap();
        // Boot hart 2 is possible but never assigned: the domain could not
        // be started by anyone.
        let secure = secure_domain(mask_of_first(3), mask_of_first(1), 2);
        let _ = mgr.register(secure).unwrap();
        assert_eq!(mgr.init(root), Err(Error::InvalidParam));
    }

    #[test]
    fn init_rejects_hart_nothing_will_run_on() {
        // Root covers hart 0 only; secure is possible on hart 1 with no
        // assigned predecessor there.
        let mut mgr = ContextManager::new(2);
        let root = mgr.register(root_domain(1)).unwrap();
        let _ = mgr
            .register(secure_domain(mask_of_first(2), mask_of_first(1), 0))
            .unwrap();
        assert_eq!(mgr.init(root), Err(Error::InvalidParam));
    }

    #[test]
    fn invalid_enter_leaves_hardware_untouched() {
        let mut mgr = ContextManager::new(2);
        let root = mgr.register(root_domain(2)).unwrap();
        let secure = mgr
            .register(secure_domain(mask_of_first(1), mask_of_first(1), 0))
            .unwrap();
        let mut unmanaged = Domain::new("static", mask_of_first(2), 0);
        unmanaged.context_managed = false;
        let unmanaged = mgr.register(unmanaged).unwrap();
        mgr.init(root).unwrap();

        let mut hal = TestHal::new();
        hal.csrs = sentinel_csrs();
        hal.frame = sentinel_frame();

        // Out-of-range index.
        assert_eq!(mgr.enter(0, DomainId(99), &mut hal), Err(Error::InvalidParam));
        // Context management disabled on the target.
        assert_eq!(mgr.enter(0, unmanaged, &mut hal), Err(Error::InvalidParam));
        // No slot for this hart: secure is only possible on hart 0.
        assert_eq!(mgr.enter(1, secure, &mut hal), Err(Error::InvalidParam));

        assert_eq!(hal.csrs, sentinel_csrs());
        assert_eq!(hal.frame, sentinel_frame());
        assert!(hal.events.is_empty());
        assert_eq!(mgr.current_domain(0), Some(root));
    }

    #[test]
    fn enter_into_current_domain_is_a_noop() {
        let (mut mgr, root, _) = single_hart_pair();
        let mut hal = TestHal::new();
        hal.csrs = sentinel_csrs();
        assert_eq!(mgr.enter(0, root, &mut hal), Ok(SwitchEffect::Resumed));
        assert_eq!(hal.csrs, sentinel_csrs());
        assert!(hal.events.is_empty());
    }

    #[test]
    fn exit_without_successor_is_an_error() {
        let mut mgr = ContextManager::new(1);
        let root = mgr.register(root_domain(1)).unwrap();
        mgr.init(root).unwrap();
        let mut hal = TestHal::new();
        hal.frame = sentinel_frame();
        assert_eq!(mgr.exit(0, &mut hal), Err(Error::InvalidParam));
        assert_eq!(hal.frame, sentinel_frame());
        assert!(hal.events.is_empty());
    }

    #[test]
    fn init_twice_is_refused() {
        let (mut mgr, root, _) = single_hart_pair();
        assert_eq!(mgr.init(root), Err(Error::InvalidParam));
        // Late registration is refused as well.
        assert!(mgr.register(root_domain(1)).is_err());
    }

    #[test]
    fn startup_parks_when_a_possible_hart_is_missing() {
        // secure declares hart 1 possible on a single-hart platform.
        let mut mgr = ContextManager::new(1);
        let root = mgr.register(root_domain(1)).unwrap();
        let _ = mgr
            .register(secure_domain(mask_of_first(2), mask_of_first(1), 0))
            .unwrap();
        mgr.init(root).unwrap();
        let mut hal = TestHal::new();
        assert_eq!(mgr.exit(0, &mut hal), Ok(SwitchEffect::Park));
    }

    #[test]
    fn tables_are_complete_and_disjoint_after_init() {
        let mut mgr = ContextManager::new(2);
        let root = mgr.register(root_domain(2)).unwrap();
        let _ = mgr
            .register(secure_domain(mask_of_first(2), mask_of_first(1), 0))
            .unwrap();
        mgr.init(root).unwrap();

        let mut seen = BTreeSet::new();
        for (_, d) in mgr.domains() {
            for h in 0..2 {
                if d.possible_harts.has_bit(h) {
                    let slot = d.context_of(h).expect("table entry missing after init");
                    // No slot may appear in more than one domain's table.
                    assert!(seen.insert(slot));
                }
            }
        }

        // Each hart is claimed by exactly one domain.
        for h in 0..2 {
            let owners = mgr
                .domains()
                .filter(|(_, d)| d.assigned_harts.has_bit(h))
                .count();
            assert_eq!(owners, 1);
            assert_eq!(mgr.current_domain(h), Some(root));
        }
    }

    #[test]
    fn boot_chains_are_finite_and_end_at_root() {
        let mut mgr = ContextManager::new(2);
        let root = mgr.register(root_domain(2)).unwrap();
        let a = mgr
            .register(secure_domain(mask_of_first(2), mask_of_first(1), 0))
            .unwrap();
        let mut second = secure_domain(mask_of_first(2), HartMask::from_mask_base(0b10, 0), 1);
        second.name = "vault";
        let b = mgr.register(second).unwrap();
        mgr.init(root).unwrap();

        for h in 0..2 {
            // The walk from the root slot visits every startup candidate
            // once and comes back to the root slot for this hart.
            let start = mgr.domain(root).unwrap().context_of(h).unwrap();
            let mut cursor = start;
            let mut hops = 0;
            loop {
                match mgr.slot(cursor).next_ctx {
                    Some(next) => {
                        cursor = next;
                        hops += 1;
                        assert!(hops <= 4, "chain does not terminate");
                        if cursor == start {
                            break;
                        }
                    }
                    None => break,
                }
            }
            assert_eq!(cursor, start);
            assert_eq!(mgr.slot(cursor).domain(), root);
            assert_eq!(hops, 3);
            let _ = (a, b);
        }
    }
}
