// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios driving the whole core through the hosted virtual
//! clock: the host loop below is the same run / wait-for-interrupt /
//! isr-entry shape a real platform uses.

use std::cell::{Cell, RefCell};

use abi::{
    Event, EventData, EventId, ProcId, QueueFull, Timestamp, EVENT_EXIT,
    EVENT_INIT, EVENT_TIMEOUT, EVENT_USER_BASE,
};
use kern::arch::hosted;
use kern::{time, Kernel, ProcessDesc, ThreadResult};

thread_local! {
    static WAKES: RefCell<Vec<Timestamp>> = RefCell::new(Vec::new());
    static SEEN: RefCell<Vec<(&'static str, EventId)>> = RefCell::new(Vec::new());
    static CHILD: Cell<Option<ProcId>> = Cell::new(None);
    static CTX_IN_CALLBACK: Cell<Option<ProcId>> = Cell::new(None);
}

fn wakes() -> Vec<Timestamp> {
    WAKES.with(|w| w.borrow_mut().drain(..).collect())
}

fn seen() -> Vec<(&'static str, EventId)> {
    SEEN.with(|s| s.borrow_mut().drain(..).collect())
}

/// One turn of the host main loop: drain the scheduler, sleep until the
/// hardware timer fires, take the interrupt. False once nothing is armed.
fn host_turn(kernel: &mut Kernel) -> bool {
    kernel.run();
    if hosted::wait_for_interrupt() {
        kernel.isr_entry();
        true
    } else {
        false
    }
}

// --- scenario 1: single-shot event timer ---------------------------------

fn single_shot(kernel: &mut Kernel, this: ProcId, ev: &Event) -> ThreadResult {
    const WAIT: u16 = 1;
    match kernel.resume_point(this) {
        0 => {
            let t = kernel.timer_claim().unwrap();
            kernel.etimer_start(t, 100, this, EVENT_TIMEOUT, EventData::Timer(t));
            kernel.set_resume_point(this, WAIT);
            ThreadResult::Waiting
        }
        _ => {
            if ev.id == EVENT_TIMEOUT {
                WAKES.with(|w| w.borrow_mut().push(time::now()));
            }
            ThreadResult::Waiting
        }
    }
}
static SINGLE_SHOT: ProcessDesc =
    ProcessDesc { name: "single-shot", thread: single_shot };

#[test]
fn single_shot_timer_fires_on_time() {
    hosted::set_time(0);
    let mut kernel = Kernel::new();
    kernel.start(&SINGLE_SHOT, EventData::None).unwrap();

    for _ in 0..8 {
        if !host_turn(&mut kernel) {
            break;
        }
    }
    kernel.run();

    let wakes = wakes();
    assert_eq!(wakes.len(), 1);
    // Delivered at the deadline, within the rtimer rounding slack.
    assert!(wakes[0] >= 100 && wakes[0] <= 101, "woke at {}", wakes[0]);
}

fn wakes_pending() -> usize {
    WAKES.with(|w| w.borrow().len())
}

// --- scenario 2: periodic timer via phase-preserving reset ---------------

fn periodic(kernel: &mut Kernel, this: ProcId, ev: &Event) -> ThreadResult {
    const WAIT: u16 = 1;
    match kernel.resume_point(this) {
        0 => {
            let t = kernel.timer_claim().unwrap();
            kernel.etimer_start(t, 50, this, EVENT_TIMEOUT, EventData::Timer(t));
            kernel.set_resume_point(this, WAIT);
            ThreadResult::Waiting
        }
        _ => {
            if ev.id == EVENT_TIMEOUT {
                WAKES.with(|w| w.borrow_mut().push(time::now()));
                if let EventData::Timer(t) = ev.data {
                    if wakes_pending() < 10 {
                        kernel.etimer_reset(t);
                    } else {
                        kernel.etimer_stop(t);
                    }
                }
            }
            ThreadResult::Waiting
        }
    }
}
static PERIODIC: ProcessDesc =
    ProcessDesc { name: "periodic", thread: periodic };

#[test]
fn reset_keeps_a_periodic_timer_phase_locked() {
    hosted::set_time(0);
    let mut kernel = Kernel::new();
    kernel.start(&PERIODIC, EventData::None).unwrap();

    for _ in 0..64 {
        if !host_turn(&mut kernel) {
            break;
        }
    }
    kernel.run();

    let wakes = wakes();
    assert_eq!(wakes.len(), 10);
    for (k, woke) in wakes.iter().enumerate() {
        let ideal = 50 * (k as Timestamp + 1);
        assert!(
            *woke >= ideal && *woke <= ideal + 1,
            "wake {k} at {woke}, wanted {ideal}",
        );
    }
}

// --- scenario 3: broadcast reaches everyone, newest first ----------------

fn listener_a(_: &mut Kernel, _: ProcId, ev: &Event) -> ThreadResult {
    record("a", ev);
    ThreadResult::Waiting
}
fn listener_b(_: &mut Kernel, _: ProcId, ev: &Event) -> ThreadResult {
    record("b", ev);
    ThreadResult::Waiting
}
fn listener_c(_: &mut Kernel, _: ProcId, ev: &Event) -> ThreadResult {
    record("c", ev);
    ThreadResult::Waiting
}
fn record(name: &'static str, ev: &Event) {
    if ev.id != EVENT_INIT {
        SEEN.with(|s| s.borrow_mut().push((name, ev.id)));
    }
}
static LISTENER_A: ProcessDesc = ProcessDesc { name: "a", thread: listener_a };
static LISTENER_B: ProcessDesc = ProcessDesc { name: "b", thread: listener_b };
static LISTENER_C: ProcessDesc = ProcessDesc { name: "c", thread: listener_c };

#[test]
fn broadcast_delivers_once_to_each_in_start_order() {
    let mut kernel = Kernel::new();
    kernel.start(&LISTENER_A, EventData::None).unwrap();
    kernel.start(&LISTENER_B, EventData::None).unwrap();
    kernel.start(&LISTENER_C, EventData::None).unwrap();

    let id = EventId(EVENT_USER_BASE + 42);
    kernel.post(None, id, EventData::None).unwrap();
    kernel.run();

    // Exactly one delivery per process, newest registration first.
    assert_eq!(seen(), vec![("c", id), ("b", id), ("a", id)]);
}

// --- scenario 4: ctimer callback context ---------------------------------

fn observe_ctx(kernel: &mut Kernel, _: u32) {
    CTX_IN_CALLBACK.with(|c| c.set(kernel.current()));
}

fn ctimer_owner(kernel: &mut Kernel, _: ProcId, ev: &Event) -> ThreadResult {
    if ev.id == EVENT_INIT {
        let t = kernel.timer_claim().unwrap();
        kernel.ctimer_start(t, 10, observe_ctx, 0).unwrap();
    }
    ThreadResult::Waiting
}
static CTIMER_OWNER: ProcessDesc =
    ProcessDesc { name: "ctimer-owner", thread: ctimer_owner };

#[test]
fn ctimer_callback_sees_its_owner_as_active_context() {
    hosted::set_time(0);
    CTX_IN_CALLBACK.with(|c| c.set(None));
    let mut kernel = Kernel::new();
    let pid = kernel.start(&CTIMER_OWNER, EventData::None).unwrap();

    assert!(host_turn(&mut kernel));
    assert_eq!(CTX_IN_CALLBACK.with(|c| c.get()), Some(pid));
    assert_eq!(kernel.current(), None);
}

// --- boundaries ----------------------------------------------------------

#[test]
fn timer_armed_across_the_timestamp_wrap_still_fires() {
    hosted::set_time(Timestamp::MAX - 50);
    let mut kernel = Kernel::new();
    kernel.start(&SINGLE_SHOT, EventData::None).unwrap();

    for _ in 0..8 {
        if !host_turn(&mut kernel) {
            break;
        }
    }
    kernel.run();

    let wakes = wakes();
    // Deadline was MAX - 50 + 100, i.e. 49 after the wrap.
    assert_eq!(wakes.len(), 1);
    assert!(wakes[0] >= 49 && wakes[0] <= 50, "woke at {}", wakes[0]);
}

#[test]
fn full_queue_rejects_then_accepts_after_a_dequeue() {
    let mut kernel = Kernel::new();
    let pid = kernel.start(&LISTENER_A, EventData::None).unwrap();

    let id = EventId(EVENT_USER_BASE);
    while kernel.post(Some(pid), id, EventData::None).is_ok() {}
    assert_eq!(kernel.post(Some(pid), id, EventData::None), Err(QueueFull));

    kernel.run_once();
    kernel.post(Some(pid), id, EventData::None).unwrap();
    kernel.run();
    let _ = seen();
}

// --- spawn idiom ---------------------------------------------------------

fn child(_: &mut Kernel, _: ProcId, ev: &Event) -> ThreadResult {
    // One ping and we are done.
    if ev.id == EventId(EVENT_USER_BASE + 1) {
        ThreadResult::Exited
    } else {
        ThreadResult::Waiting
    }
}
static CHILD_PROC: ProcessDesc = ProcessDesc { name: "child", thread: child };

fn parent(kernel: &mut Kernel, this: ProcId, ev: &Event) -> ThreadResult {
    const JOIN: u16 = 1;
    match kernel.resume_point(this) {
        0 => {
            let pid = kernel.start(&CHILD_PROC, EventData::None).unwrap();
            CHILD.with(|c| c.set(Some(pid)));
            if !kernel.alive(pid) {
                // Child exited during its own INIT; nothing to wait for.
                SEEN.with(|s| s.borrow_mut().push(("joined", ev.id)));
                return ThreadResult::Exited;
            }
            kernel.set_resume_point(this, JOIN);
            ThreadResult::Waiting
        }
        _ => {
            let joined = CHILD.with(|c| c.get()).map_or(false, |pid| {
                ev.id == EVENT_EXIT && ev.data == EventData::Proc(pid)
            });
            if joined {
                SEEN.with(|s| s.borrow_mut().push(("joined", ev.id)));
                ThreadResult::Exited
            } else {
                ThreadResult::Waiting
            }
        }
    }
}
static PARENT_PROC: ProcessDesc =
    ProcessDesc { name: "parent", thread: parent };

#[test]
fn spawned_child_exit_resumes_the_parent() {
    let mut kernel = Kernel::new();
    let parent_pid = kernel.start(&PARENT_PROC, EventData::None).unwrap();
    let child_pid = CHILD.with(|c| c.get()).unwrap();
    assert!(kernel.alive(child_pid));

    kernel
        .post(Some(child_pid), EventId(EVENT_USER_BASE + 1), EventData::None)
        .unwrap();
    kernel.run();

    assert_eq!(seen(), vec![("joined", EVENT_EXIT)]);
    assert!(!kernel.alive(child_pid));
    assert!(!kernel.alive(parent_pid));
}
