// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process table and dispatch.
//!
//! Processes occupy a fixed table of slots and are threaded onto an
//! intrusive list in LIFO registration order (`start` pushes at the front).
//! Broadcast delivery walks that list front to back, so the newest-started
//! process hears a broadcast first; tests rely on this order.
//!
//! Ids carry a generation number (see [`ProcId`]) so that an id held across
//! an exit-and-reuse of its slot stops matching instead of being
//! misdelivered.

use abi::{config, Event, EventData, OutOfSlots, ProcId, EVENT_EXIT, EVENT_INIT};
use unwrap_lite::UnwrapLite;

use crate::counters::Drop;
use crate::proto::{ProtoState, ThreadResult};
use crate::Kernel;

/// Signature of a process thread function.
///
/// The dispatcher copies the pointer out of the table before the call, so
/// the function receives the whole kernel mutably and may start and stop
/// timers and processes and post events freely.
pub type ThreadFn = fn(&mut Kernel, ProcId, &Event) -> ThreadResult;

/// Static description of a process. Lives in the application image; the
/// kernel refers to it for the lifetime of the started process.
pub struct ProcessDesc {
    pub name: &'static str,
    pub thread: ThreadFn,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ProcState {
    /// Quiescent between dispatches.
    Running,
    /// Thread function currently on the call stack. Dispatch to a process
    /// in this state is skipped, which is what makes nested synchronous
    /// posts to self harmless.
    Called,
    /// Exit requested while the thread was on the call stack; torn down
    /// when the call unwinds.
    Exiting,
}

pub(crate) struct ProcessSlot {
    desc: &'static ProcessDesc,
    pt: ProtoState,
    state: ProcState,
    needs_poll: bool,
    next: Option<u8>,
}

pub(crate) struct ProcessTable {
    slots: [Option<ProcessSlot>; config::MAX_PROCESSES],
    generations: [u8; config::MAX_PROCESSES],
    head: Option<u8>,
}

/// A fixed-size copy of the registration list, taken before any delivery
/// loop so that threads can start and exit processes mid-walk without
/// invalidating the iteration.
pub(crate) struct Snapshot {
    ids: [ProcId; config::MAX_PROCESSES],
    len: usize,
}

impl Snapshot {
    pub(crate) fn iter(&self) -> impl Iterator<Item = ProcId> + '_ {
        self.ids[..self.len].iter().copied()
    }
}

impl ProcessTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            generations: [0; config::MAX_PROCESSES],
            head: None,
        }
    }

    pub(crate) fn get(&self, pid: ProcId) -> Option<&ProcessSlot> {
        let index = pid.index();
        if index >= config::MAX_PROCESSES
            || self.generations[index] != pid.generation()
        {
            return None;
        }
        self.slots[index].as_ref()
    }

    pub(crate) fn get_mut(&mut self, pid: ProcId) -> Option<&mut ProcessSlot> {
        let index = pid.index();
        if index >= config::MAX_PROCESSES
            || self.generations[index] != pid.generation()
        {
            return None;
        }
        self.slots[index].as_mut()
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let mut ids = [ProcId::new(0, 0); config::MAX_PROCESSES];
        let mut len = 0;
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let slot = self.slots[index as usize].as_ref().unwrap_lite();
            ids[len] = ProcId::new(index as usize, self.generations[index as usize]);
            len += 1;
            cursor = slot.next;
        }
        Snapshot { ids, len }
    }

    fn unlink(&mut self, index: usize) {
        let mut cursor = self.head;
        let mut prev: Option<u8> = None;
        while let Some(i) = cursor {
            let next = self.slots[i as usize].as_ref().and_then(|s| s.next);
            if i as usize == index {
                match prev {
                    None => self.head = next,
                    Some(p) => {
                        if let Some(slot) = self.slots[p as usize].as_mut() {
                            slot.next = next;
                        }
                    }
                }
                return;
            }
            prev = Some(i);
            cursor = next;
        }
    }
}

impl Kernel {
    /// Registers and initializes a process.
    ///
    /// The process receives an `INIT` event synchronously, with `data` as
    /// its payload, before this returns. Starting a process that is already
    /// in the table is a no-op that returns its existing id.
    pub fn start(
        &mut self,
        desc: &'static ProcessDesc,
        data: EventData,
    ) -> Result<ProcId, OutOfSlots> {
        if let Some(pid) = self.find(desc) {
            return Ok(pid);
        }

        let index = self
            .procs
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(OutOfSlots)?;
        self.procs.generations[index] =
            self.procs.generations[index].wrapping_add(1);
        let pid = ProcId::new(index, self.procs.generations[index]);

        self.procs.slots[index] = Some(ProcessSlot {
            desc,
            pt: ProtoState::default(),
            state: ProcState::Running,
            needs_poll: false,
            next: self.procs.head,
        });
        self.procs.head = Some(index as u8);

        let ev = Event {
            id: EVENT_INIT,
            data,
            target: Some(pid),
        };
        self.dispatch(pid, &ev);
        Ok(pid)
    }

    /// Finds a started process by descriptor identity.
    pub fn find(&self, desc: &'static ProcessDesc) -> Option<ProcId> {
        self.procs
            .snapshot()
            .iter()
            .find(|&pid| match self.procs.get(pid) {
                Some(slot) => core::ptr::eq(slot.desc, desc),
                None => false,
            })
    }

    /// True while `pid` names a live process.
    pub fn alive(&self, pid: ProcId) -> bool {
        self.procs.get(pid).is_some()
    }

    /// Name of a live process.
    pub fn process_name(&self, pid: ProcId) -> Option<&'static str> {
        self.procs.get(pid).map(|s| s.desc.name)
    }

    /// The process currently being executed, if any. Timer starts and event
    /// posts read this to attribute ownership.
    pub fn current(&self) -> Option<ProcId> {
        self.ctx.current()
    }

    /// Current resume label of a process (zero if `pid` is stale).
    pub fn resume_point(&self, pid: ProcId) -> u16 {
        self.procs.get(pid).map(|s| s.pt.resume()).unwrap_or(0)
    }

    /// Stores the label at which `pid`'s thread resumes on its next entry.
    pub fn set_resume_point(&mut self, pid: ProcId, label: u16) {
        if let Some(slot) = self.procs.get_mut(pid) {
            slot.pt.jump(label);
        }
    }

    /// Requests prompt re-entry: the scheduler will deliver a `POLL` event
    /// to `pid` before it next reports idle.
    pub fn poll_request(&mut self, pid: ProcId) {
        if let Some(slot) = self.procs.get_mut(pid) {
            slot.needs_poll = true;
        }
    }

    /// Terminates a process.
    ///
    /// Every *other* process is told synchronously first (an `EXIT`
    /// broadcast carrying `EventData::Proc(pid)`), then the process itself
    /// receives `EXIT` with itself as the active context so its cleanup
    /// code observes a valid state, then the slot is reclaimed. Pending
    /// queued events for the process are dropped lazily by the dispatcher.
    ///
    /// Exiting a process whose thread is currently on the call stack defers
    /// the teardown until that call unwinds. Exiting a stale id is a no-op.
    pub fn exit(&mut self, pid: ProcId) {
        let Some(slot) = self.procs.get_mut(pid) else {
            return;
        };
        match slot.state {
            ProcState::Called | ProcState::Exiting => {
                slot.state = ProcState::Exiting;
            }
            ProcState::Running => self.finalize_exit(pid),
        }
    }

    pub(crate) fn finalize_exit(&mut self, pid: ProcId) {
        {
            let Some(slot) = self.procs.get_mut(pid) else {
                return;
            };
            // Block re-entrant exit() calls while we unwind.
            slot.state = ProcState::Exiting;
        }

        let notice = Event {
            id: EVENT_EXIT,
            data: EventData::Proc(pid),
            target: None,
        };
        let snap = self.procs.snapshot();
        for other in snap.iter() {
            if other != pid {
                self.dispatch(other, &notice);
            }
        }

        // Last words: the process cleans up with itself as the active
        // context. Whatever it returns, it is gone afterwards.
        if let Some(slot) = self.procs.get(pid) {
            let thread = slot.desc.thread;
            let ev = Event {
                id: EVENT_EXIT,
                data: EventData::None,
                target: Some(pid),
            };
            self.ctx.push(pid);
            let _ = thread(self, pid, &ev);
            self.ctx.pop(pid);
        }

        self.procs.unlink(pid.index());
        self.procs.slots[pid.index()] = None;
    }

    /// Calls `pid`'s thread with `ev`, maintaining the active-context stack
    /// and the call-state machine. Dispatch to a stale id or to a process
    /// already on the call stack is a no-op.
    pub(crate) fn dispatch(&mut self, pid: ProcId, ev: &Event) {
        let thread = {
            let Some(slot) = self.procs.get_mut(pid) else {
                return;
            };
            if slot.state != ProcState::Running {
                return;
            }
            slot.state = ProcState::Called;
            slot.desc.thread
        };

        self.ctx.push(pid);
        let result = thread(self, pid, ev);
        self.ctx.pop(pid);

        let exiting = {
            let Some(slot) = self.procs.get_mut(pid) else {
                return;
            };
            let exiting = slot.state == ProcState::Exiting;
            slot.state = ProcState::Running;
            exiting
        };
        if exiting || result == ThreadResult::Exited {
            self.finalize_exit(pid);
        }
    }

    pub(crate) fn take_poll_request(&mut self, pid: ProcId) -> bool {
        match self.procs.get_mut(pid) {
            Some(slot) if slot.needs_poll => {
                slot.needs_poll = false;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn count_drop(&mut self, reason: Drop) {
        self.drops.bump(reason);
    }
}

/// Active-context stack: which process the kernel is currently executing.
///
/// Every path that calls into a thread function or a ctimer callback pushes
/// the callee around the call. Outside of dispatch the stack is empty and
/// [`Kernel::current`] returns `None`.
pub(crate) struct ContextStack {
    entries: [ProcId; config::CONTEXT_DEPTH],
    depth: usize,
}

impl ContextStack {
    pub(crate) fn new() -> Self {
        Self {
            entries: [ProcId::new(0, 0); config::CONTEXT_DEPTH],
            depth: 0,
        }
    }

    pub(crate) fn current(&self) -> Option<ProcId> {
        self.depth.checked_sub(1).map(|top| self.entries[top])
    }

    pub(crate) fn push(&mut self, pid: ProcId) {
        assert!(self.depth < config::CONTEXT_DEPTH, "context stack overflow");
        self.entries[self.depth] = pid;
        self.depth += 1;
    }

    pub(crate) fn pop(&mut self, pid: ProcId) {
        debug_assert_eq!(self.current(), Some(pid), "unbalanced context pop");
        self.depth -= 1;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.depth == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abi::{EventId, EVENT_TIMEOUT};
    use std::cell::RefCell;

    thread_local! {
        static LOG: RefCell<Vec<(&'static str, EventId, EventData)>> =
            RefCell::new(Vec::new());
    }

    fn log_of() -> Vec<(&'static str, EventId, EventData)> {
        LOG.with(|l| l.borrow_mut().drain(..).collect())
    }

    fn recorder(name: &'static str) -> impl Fn(&Event) {
        move |ev| LOG.with(|l| l.borrow_mut().push((name, ev.id, ev.data)))
    }

    fn rec_a(_: &mut Kernel, _: ProcId, ev: &Event) -> ThreadResult {
        recorder("a")(ev);
        ThreadResult::Waiting
    }
    fn rec_b(_: &mut Kernel, _: ProcId, ev: &Event) -> ThreadResult {
        recorder("b")(ev);
        ThreadResult::Waiting
    }
    fn rec_c(_: &mut Kernel, _: ProcId, ev: &Event) -> ThreadResult {
        recorder("c")(ev);
        ThreadResult::Waiting
    }

    static PROC_A: ProcessDesc = ProcessDesc { name: "a", thread: rec_a };
    static PROC_B: ProcessDesc = ProcessDesc { name: "b", thread: rec_b };
    static PROC_C: ProcessDesc = ProcessDesc { name: "c", thread: rec_c };

    #[test]
    fn start_delivers_init_synchronously() {
        let mut kernel = Kernel::new();
        let pid = kernel.start(&PROC_A, EventData::Word(7)).unwrap();
        assert!(kernel.alive(pid));
        assert_eq!(log_of(), vec![("a", EVENT_INIT, EventData::Word(7))]);
    }

    #[test]
    fn start_is_idempotent() {
        let mut kernel = Kernel::new();
        let first = kernel.start(&PROC_A, EventData::None).unwrap();
        let again = kernel.start(&PROC_A, EventData::None).unwrap();
        assert_eq!(first, again);
        // Only one INIT was delivered.
        assert_eq!(log_of().len(), 1);
    }

    #[test]
    fn broadcast_order_is_newest_first() {
        let mut kernel = Kernel::new();
        kernel.start(&PROC_A, EventData::None).unwrap();
        kernel.start(&PROC_B, EventData::None).unwrap();
        kernel.start(&PROC_C, EventData::None).unwrap();
        let _ = log_of();

        kernel.post_sync(None, EVENT_TIMEOUT, EventData::Word(42));
        let names: Vec<_> = log_of().into_iter().map(|(n, _, _)| n).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn exit_notifies_others_then_self() {
        let mut kernel = Kernel::new();
        let a = kernel.start(&PROC_A, EventData::None).unwrap();
        kernel.start(&PROC_B, EventData::None).unwrap();
        let _ = log_of();

        kernel.exit(a);
        assert!(!kernel.alive(a));
        assert_eq!(
            log_of(),
            vec![
                ("b", EVENT_EXIT, EventData::Proc(a)),
                ("a", EVENT_EXIT, EventData::None),
            ]
        );
    }

    #[test]
    fn stale_id_stops_matching_after_slot_reuse() {
        let mut kernel = Kernel::new();
        let a = kernel.start(&PROC_A, EventData::None).unwrap();
        kernel.exit(a);
        let b = kernel.start(&PROC_B, EventData::None).unwrap();
        // B reuses A's slot but A's id must not resolve to it.
        assert_eq!(b.index(), a.index());
        assert!(!kernel.alive(a));
        assert!(kernel.alive(b));
    }

    #[test]
    fn context_is_tracked_during_dispatch() {
        fn check_ctx(kernel: &mut Kernel, this: ProcId, _: &Event) -> ThreadResult {
            assert_eq!(kernel.current(), Some(this));
            ThreadResult::Waiting
        }
        static PROC_CTX: ProcessDesc =
            ProcessDesc { name: "ctx", thread: check_ctx };

        let mut kernel = Kernel::new();
        kernel.start(&PROC_CTX, EventData::None).unwrap();
        assert_eq!(kernel.current(), None);
    }

    #[test]
    fn exit_during_own_call_is_deferred() {
        fn quits(kernel: &mut Kernel, this: ProcId, ev: &Event) -> ThreadResult {
            recorder("q")(ev);
            if ev.id == EVENT_INIT {
                kernel.exit(this);
                // Still alive here; teardown happens after we return.
                assert!(kernel.alive(this));
            }
            ThreadResult::Waiting
        }
        static PROC_Q: ProcessDesc = ProcessDesc { name: "q", thread: quits };

        let mut kernel = Kernel::new();
        let pid = kernel.start(&PROC_Q, EventData::None).unwrap();
        assert!(!kernel.alive(pid));
        let ids: Vec<_> = log_of().into_iter().map(|(_, id, _)| id).collect();
        assert_eq!(ids, vec![EVENT_INIT, EVENT_EXIT]);
    }
}
