// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The polling process: registers buttons, samples them at the configured
//! cadence, and broadcasts their gestures.
//!
//! Buttons are registered before the process starts. The process primes
//! every button from its live level, arms a periodic event timer, and on
//! each tick polls the whole set; if the scheduler ran late and whole
//! periods were missed, the reset loop polls once per missed period to
//! catch up, so gesture timing is measured in ticks regardless of jitter.
//!
//! Every gesture goes out as a synchronous broadcast so that listeners see
//! it before the next sample can supersede it.

use abi::{
    config::TIMESTAMP_TICKS_PER_SEC, Event, EventData, OutOfSlots, ProcId,
    TimerId, Timespan, EVENT_EXIT, EVENT_TIMEOUT,
};
use kern::util::StaticCell;
use kern::{Kernel, ProcessDesc, ThreadResult};
use ringbuf::{ringbuf, ringbuf_entry};

use crate::{config, Button, ButtonEvent, ButtonGetFn, ButtonId};

/// Sampling period in clock ticks (20 ms).
pub const POLL_PERIOD: Timespan = TIMESTAMP_TICKS_PER_SEC / config::POLL_HZ;

/// Capacity of the button table.
pub const MAX_BUTTONS: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Registered(u8),
    Gesture(u8, ButtonEvent),
}
ringbuf!(Trace, 16, Trace::None);

struct Pipeline {
    buttons: [Option<Button>; MAX_BUTTONS],
    tick: Option<TimerId>,
}

static PIPELINE: StaticCell<Pipeline> = StaticCell::new(Pipeline {
    buttons: [None; MAX_BUTTONS],
    tick: None,
});

/// Adds a button to the set. Call before starting the process; buttons
/// registered later are picked up but start from the released state.
pub fn register(get: ButtonGetFn) -> Result<ButtonId, OutOfSlots> {
    let mut pipeline = PIPELINE.borrow_mut();
    let index = pipeline
        .buttons
        .iter()
        .position(|b| b.is_none())
        .ok_or(OutOfSlots)?;
    pipeline.buttons[index] = Some(Button::new(get));
    ringbuf_entry!(Trace::Registered(index as u8));
    Ok(ButtonId(index as u8))
}

/// Removes every registered button (primarily for test isolation).
pub fn clear() {
    let mut pipeline = PIPELINE.borrow_mut();
    pipeline.buttons = [None; MAX_BUTTONS];
}

pub static BUTTONS_PROCESS: ProcessDesc = ProcessDesc {
    name: "uibuttons",
    thread: buttons_thread,
};

/// Starts the pipeline process.
pub fn init(kernel: &mut Kernel) -> Result<ProcId, OutOfSlots> {
    kernel.start(&BUTTONS_PROCESS, EventData::None)
}

fn buttons_thread(
    kernel: &mut Kernel,
    this: ProcId,
    ev: &Event,
) -> ThreadResult {
    const TICK: u16 = 1;

    if ev.id == EVENT_EXIT && ev.target == Some(this) {
        // Teardown: give the tick timer back while we still exist.
        let tick = PIPELINE.borrow_mut().tick.take();
        if let Some(t) = tick {
            kernel.timer_release(t);
        }
        return ThreadResult::Exited;
    }

    match kernel.resume_point(this) {
        0 => {
            {
                let mut pipeline = PIPELINE.borrow_mut();
                for button in pipeline.buttons.iter_mut().flatten() {
                    button.init();
                }
            }
            let Ok(t) = kernel.timer_claim() else {
                return ThreadResult::Exited;
            };
            PIPELINE.borrow_mut().tick = Some(t);
            kernel.etimer_start(
                t,
                POLL_PERIOD,
                this,
                EVENT_TIMEOUT,
                EventData::Timer(t),
            );
            kernel.set_resume_point(this, TICK);
            ThreadResult::Waiting
        }
        TICK => {
            let Some(t) = PIPELINE.borrow_mut().tick else {
                return ThreadResult::Exited;
            };
            if !kernel.etimer_expired(t) {
                return ThreadResult::Waiting;
            }
            // Poll once per elapsed period, not once per wakeup.
            loop {
                poll_all(kernel);
                kernel.etimer_reset(t);
                if !kernel.etimer_expired(t) {
                    break;
                }
            }
            ThreadResult::Waiting
        }
        _ => ThreadResult::Exited,
    }
}

fn poll_all(kernel: &mut Kernel) {
    for index in 0..MAX_BUTTONS {
        let emitted = {
            let mut pipeline = PIPELINE.borrow_mut();
            match pipeline.buttons[index].as_mut() {
                Some(button) => button.poll(),
                None => continue,
            }
        };
        // The pipeline borrow is released before dispatch so listeners may
        // inspect or register buttons from their handlers.
        for gesture in emitted.iter() {
            ringbuf_entry!(Trace::Gesture(index as u8, gesture));
            kernel.post_sync(
                None,
                gesture.event_id(),
                EventData::Word(index as u32),
            );
        }
    }
}
