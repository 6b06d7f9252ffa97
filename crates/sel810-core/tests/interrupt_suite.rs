//! Interrupt engine coverage: aggregation, gating, priority selection,
//! vectored dispatch and TOI dismissal.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use sel810_core::{
    vector_address, InterruptLines, Machine, Peripheral, GROUP_NONE, INTERRUPT_SLOTS,
};

const fn ctl_io(sub: u16, unit: u16) -> u16 {
    (0o13 << 12) | (sub << 6) | unit
}

const fn bru(i: bool, disp: u16) -> u16 {
    (0o11 << 12) | ((i as u16) << 10) | disp
}

/// Unit that asserts a fixed interrupt line while armed.
struct LineUnit {
    group: usize,
    mask: AtomicU16,
}

impl LineUnit {
    fn new(group: usize, mask: u16) -> Self {
        Self {
            group,
            mask: AtomicU16::new(mask),
        }
    }
}

impl Peripheral for LineUnit {
    fn test_ready(&self, _cmd: u16) -> bool {
        true
    }
    fn test(&self, _cmd: u16) -> bool {
        true
    }
    fn command_ready(&self) -> bool {
        true
    }
    fn command(&self, _cmd: u16) -> bool {
        true
    }
    fn read_ready(&self) -> bool {
        true
    }
    fn read(&self) -> (bool, u16) {
        (true, 0)
    }
    fn write_ready(&self) -> bool {
        true
    }
    fn write(&self, _word: u16) -> bool {
        true
    }
    fn interrupts(&self) -> Option<InterruptLines> {
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[self.group] = self.mask.load(Ordering::Relaxed);
        Some(lines)
    }
}

#[test]
fn dispatch_vectors_through_group_three_level_one() {
    let mut machine = Machine::new();
    machine.interrupts_mut().enable(3, 0x800);
    machine.interrupts_mut().post_requests(&{
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[3] = 0x800;
        lines
    });
    machine.regs_mut().set_pc(0o1234);
    let vector = vector_address(3, 1);
    assert_eq!(vector, 578);
    machine.memory_mut().write(vector, 0o4000);

    machine.interrupt_step();

    // implicit SPB: resume address stored at the target, execution lands
    // one word past it
    assert_eq!(machine.memory().read(0o4000), 0o1234);
    assert_eq!(machine.regs().pc(), 0o4001);
    assert_eq!(machine.interrupts().group(), 3);
    assert_eq!(machine.interrupts().level(), 1);
    assert_eq!(machine.interrupts().mask(), 0x800);
    assert_eq!(machine.interrupts().active(3), 0x800);
    assert!(machine.controls().interrupt());
    // prefetch happened through the vector
    assert_eq!(machine.regs().ir(), machine.memory().read(0o4001));
}

#[test]
fn dispatch_is_gated_for_one_cycle_after_blocking() {
    let mut machine = Machine::new();
    machine.interrupts_mut().enable(0, 0x800);
    machine.interrupts_mut().post_requests(&{
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[0] = 0x800;
        lines
    });
    machine.interrupts_mut().block();

    machine.interrupt_step();
    assert_eq!(machine.interrupts().group(), GROUP_NONE);

    machine.interrupt_step();
    assert_eq!(machine.interrupts().group(), 0);
}

#[test]
fn device_lines_aggregate_into_requests() {
    let mut machine = Machine::new();
    let unit = Arc::new(LineUnit::new(2, 0x004));
    machine.attach(5, unit).expect("attach");
    machine.interrupts_mut().enable(2, 0xFFF);
    machine.memory_mut().write(vector_address(2, 10), 0o3000);

    machine.interrupt_step();

    assert_eq!(machine.interrupts().group(), 2);
    assert_eq!(machine.interrupts().level(), 10);
    assert_eq!(machine.interrupts().request(2), 0x004);
}

#[test]
fn disabled_lines_accumulate_but_do_not_dispatch() {
    let mut machine = Machine::new();
    let unit = Arc::new(LineUnit::new(4, 0x010));
    machine.attach(6, unit).expect("attach");

    machine.interrupt_step();
    assert_eq!(machine.interrupts().group(), GROUP_NONE);
    assert_eq!(machine.interrupts().request(4), 0x010);

    // enabling later lets the held request through
    machine.interrupts_mut().enable(4, 0x010);
    machine.memory_mut().write(vector_address(4, 8), 0o3100);
    machine.interrupt_step();
    assert_eq!(machine.interrupts().group(), 4);
}

#[test]
fn higher_priority_group_preempts_the_active_level() {
    let mut machine = Machine::new();
    machine.interrupts_mut().enable(3, 0x800);
    machine.interrupts_mut().enable(1, 0x800);
    machine.memory_mut().write(vector_address(3, 1), 0o4000);
    machine.memory_mut().write(vector_address(1, 1), 0o4100);

    machine.interrupts_mut().post_requests(&{
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[3] = 0x800;
        lines
    });
    machine.interrupt_step();
    assert_eq!(machine.interrupts().group(), 3);
    machine.interrupt_step(); // consume the post-dispatch block

    machine.interrupts_mut().post_requests(&{
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[1] = 0x800;
        lines
    });
    machine.interrupt_step();
    assert_eq!(machine.interrupts().group(), 1);
    // both levels are active now
    assert_eq!(machine.interrupts().active(3), 0x800);
    assert_eq!(machine.interrupts().active(1), 0x800);
}

#[test]
fn same_group_needs_a_strictly_higher_level() {
    let mut machine = Machine::new();
    machine.interrupts_mut().enable(2, 0xFFF);
    machine.memory_mut().write(vector_address(2, 12), 0o3000);
    machine.memory_mut().write(vector_address(2, 1), 0o3200);

    machine.interrupts_mut().post_requests(&{
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[2] = 0x001; // level 12, the lowest
        lines
    });
    machine.interrupt_step();
    assert_eq!(machine.interrupts().level(), 12);
    machine.interrupt_step(); // consume the block

    // a lower level in the same group stays pending
    machine.interrupts_mut().post_requests(&{
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[2] = 0x001;
        lines
    });
    machine.interrupt_step();
    assert_eq!(machine.interrupts().level(), 12);

    // a higher level preempts
    machine.interrupts_mut().post_requests(&{
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[2] = 0x800;
        lines
    });
    machine.interrupt_step();
    assert_eq!(machine.interrupts().level(), 1);
}

#[test]
fn bru_indirect_with_toi_dismisses_the_active_level() {
    let mut machine = Machine::new();

    // dispatch group 3 level 1
    machine.interrupts_mut().enable(3, 0x800);
    machine.interrupts_mut().post_requests(&{
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[3] = 0x800;
        lines
    });
    machine.memory_mut().write(vector_address(3, 1), 0o4000);
    machine.interrupt_step();
    assert_eq!(machine.interrupts().group(), 3);

    // handler: TOI ; BRU* through the stored resume word
    machine.memory_mut().write(0o4001, 0o35); // TOI
    machine.memory_mut().write(0o4002, bru(true, 0o100));
    machine.memory_mut().write(0o100, 0o100); // pointer word, chain off
    machine.prime();

    machine.step_cycle(); // TOI arms the dismissal and blocks one cycle
    assert!(machine.interrupts().toi_pending());
    assert_eq!(machine.interrupts().group(), 3);

    machine.step_cycle(); // BRU* applies it
    assert_eq!(machine.regs().pc(), 0o100);
    assert!(!machine.interrupts().toi_pending());
    assert_eq!(machine.interrupts().group(), GROUP_NONE);
    assert_eq!(machine.interrupts().active(3), 0);
    assert_eq!(machine.interrupts().request(3), 0);
    assert!(!machine.controls().interrupt());
}

#[test]
fn toi_dismissal_restores_the_next_highest_level() {
    let mut machine = Machine::new();
    machine.interrupts_mut().enable(3, 0x800);
    machine.interrupts_mut().enable(1, 0x800);
    machine.memory_mut().write(vector_address(3, 1), 0o4000);
    machine.memory_mut().write(vector_address(1, 1), 0o4100);

    machine.interrupts_mut().post_requests(&{
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[3] = 0x800;
        lines
    });
    machine.interrupt_step();
    machine.interrupt_step();
    machine.interrupts_mut().post_requests(&{
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[1] = 0x800;
        lines
    });
    machine.interrupt_step();
    assert_eq!(machine.interrupts().group(), 1);

    // handler of the preempting level dismisses itself
    machine.memory_mut().write(0o4101, 0o35); // TOI
    machine.memory_mut().write(0o4102, bru(true, 0o200));
    machine.memory_mut().write(0o200, 0o200);
    machine.prime();
    machine.step_cycle();
    machine.step_cycle();

    // the interrupted group-3 service resumes
    assert_eq!(machine.interrupts().group(), 3);
    assert_eq!(machine.interrupts().level(), 1);
    assert_eq!(machine.interrupts().active(3), 0x800);
    assert!(machine.controls().interrupt());
}

#[test]
fn pie_pid_roundtrip_leaves_enabled_unchanged() {
    let mut machine = Machine::new();
    // PIE group 5 mask 0x0F0 ; PID group 5 mask 0x0F0
    machine.memory_mut().write(0, ctl_io(6, 0));
    machine.memory_mut().write(1, (5 << 12) | 0x0F0);
    machine.memory_mut().write(2, ctl_io(6, 1));
    machine.memory_mut().write(3, (5 << 12) | 0x0F0);
    machine.prime();

    let before = machine.interrupts().enabled(5);
    machine.step_cycle();
    assert_eq!(machine.interrupts().enabled(5), 0x0F0);
    assert_eq!(machine.regs().pc(), 2);
    machine.step_cycle();
    assert_eq!(machine.interrupts().enabled(5), before);
    assert_eq!(machine.regs().pc(), 4);
}

#[test]
fn pie_blocks_the_following_interrupt_cycle() {
    let mut machine = Machine::new();
    machine.memory_mut().write(0, ctl_io(6, 0));
    machine.memory_mut().write(1, (0 << 12) | 0x800);
    machine.memory_mut().write(vector_address(0, 1), 0o4000);
    machine.interrupts_mut().post_requests(&{
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[0] = 0x800;
        lines
    });
    machine.prime();

    // the step enables the level, but its interrupt cycle is shadowed
    machine.step_cycle();
    assert_eq!(machine.interrupts().group(), GROUP_NONE);
    assert_eq!(machine.regs().pc(), 2);

    // the next cycle dispatches
    machine.interrupt_step();
    assert_eq!(machine.interrupts().group(), 0);
}

#[test]
fn spb_shadows_the_next_interrupt_cycle() {
    let mut machine = Machine::new();
    machine.memory_mut().write(0, (0o12 << 12) | 0o100); // SPB 0o100
    machine.interrupts_mut().enable(0, 0x800);
    machine.interrupts_mut().post_requests(&{
        let mut lines = [0; INTERRUPT_SLOTS];
        lines[0] = 0x800;
        lines
    });
    machine.memory_mut().write(vector_address(0, 1), 0o4000);
    machine.prime();

    machine.step_cycle();
    // the subroutine linkage completed before any dispatch
    assert_eq!(machine.memory().read(0o100), 1);
    assert_eq!(machine.regs().pc(), 0o101);
    assert_eq!(machine.interrupts().group(), GROUP_NONE);
}
