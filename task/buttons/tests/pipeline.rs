// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-pipeline scenarios: scripted GPIO level in, kernel + event timer +
//! poll process in the middle, broadcast gestures out.
//!
//! The registered button set is a process-wide static, so these tests
//! serialize on a mutex and reset it between runs.

use std::cell::RefCell;
use std::sync::Mutex;

use abi::{Event, EventData, ProcId, Timestamp};
use kern::arch::hosted;
use kern::{time, Kernel, ProcessDesc, ThreadResult};
use uibuttons::{config, process, ButtonEvent};

static PIPELINE_LOCK: Mutex<()> = Mutex::new(());

thread_local! {
    static SCRIPT: RefCell<Vec<bool>> = RefCell::new(Vec::new());
    static CURSOR: RefCell<usize> = RefCell::new(0);
    static GESTURES: RefCell<Vec<(Timestamp, ButtonEvent)>> =
        RefCell::new(Vec::new());
}

/// GPIO standing in for a real pad: each read consumes one scripted sample.
fn scripted_pad() -> bool {
    SCRIPT.with(|s| {
        CURSOR.with(|c| {
            let mut cursor = c.borrow_mut();
            let script = s.borrow();
            let level = script.get(*cursor).copied().unwrap_or(false);
            *cursor += 1;
            level
        })
    })
}

fn samples_left() -> bool {
    SCRIPT.with(|s| CURSOR.with(|c| *c.borrow() < s.borrow().len()))
}

fn gestures() -> Vec<(Timestamp, ButtonEvent)> {
    GESTURES.with(|g| g.borrow_mut().drain(..).collect())
}

fn observer(_: &mut Kernel, _: ProcId, ev: &Event) -> ThreadResult {
    if let Some((_, gesture)) = uibuttons::decode(ev) {
        GESTURES.with(|g| g.borrow_mut().push((time::now(), gesture)));
    }
    ThreadResult::Waiting
}
static OBSERVER: ProcessDesc =
    ProcessDesc { name: "observer", thread: observer };

fn levels(spec: &[(bool, usize)]) -> Vec<bool> {
    let mut out = Vec::new();
    for &(level, count) in spec {
        out.extend(std::iter::repeat(level).take(count));
    }
    out
}

/// Boots a kernel with the observer and the button pipeline over `script`
/// and runs until the script is consumed. The first sample is eaten by the
/// boot-time priming read; poll k sees sample k (1-based) of the rest.
fn run_pipeline(script: Vec<bool>) -> Vec<(Timestamp, ButtonEvent)> {
    SCRIPT.with(|s| *s.borrow_mut() = script);
    CURSOR.with(|c| *c.borrow_mut() = 0);
    GESTURES.with(|g| g.borrow_mut().clear());

    hosted::set_time(0);
    let mut kernel = Kernel::new();
    kernel.start(&OBSERVER, EventData::None).unwrap();
    process::clear();
    process::register(scripted_pad).unwrap();
    let pipeline = process::init(&mut kernel).unwrap();

    while samples_left() {
        kernel.run();
        if !hosted::wait_for_interrupt() {
            break;
        }
        kernel.isr_entry();
    }
    kernel.run();
    kernel.exit(pipeline);
    gestures()
}

/// Scripted level sequence from the debounce scenario: a one-tick glitch
/// followed by a persistent press. The priming sample is prepended.
#[test]
fn glitch_is_rejected_and_the_real_press_confirms_at_poll_eight() {
    let _guard = PIPELINE_LOCK.lock().unwrap();

    let mut script = vec![false]; // consumed by the boot priming read
    script.extend(levels(&[(false, 2), (true, 1), (false, 1), (true, 8)]));
    let fired = run_pipeline(script);

    let edges: Vec<_> = fired
        .iter()
        .filter(|(_, g)| *g == ButtonEvent::RisingEdge)
        .collect();
    assert_eq!(edges.len(), 1, "events: {fired:?}");

    // Polls happen every 20 ms starting at t=20; the press that begins at
    // poll 5 survives the debounce countdown and confirms at poll 8.
    let poll_period = process::POLL_PERIOD;
    assert_eq!(edges[0].0, 8 * poll_period);
}

#[test]
fn press_release_press_release_inside_the_timeout_is_one_double_click() {
    let _guard = PIPELINE_LOCK.lock().unwrap();

    let mut script = vec![false];
    script.extend(levels(&[
        (true, 6),
        (false, 6),
        (true, 6),
        (false, config::CLICK_TIMEOUT as usize + 10),
    ]));
    let fired = run_pipeline(script);

    let clicks: Vec<_> = fired
        .iter()
        .filter(|(_, g)| {
            matches!(
                g,
                ButtonEvent::SingleClick
                    | ButtonEvent::DoubleClick
                    | ButtonEvent::TripleClick
            )
        })
        .collect();
    assert_eq!(clicks.len(), 1, "events: {fired:?}");
    assert_eq!(clicks[0].1, ButtonEvent::DoubleClick);

    // Both presses were short.
    let shorts = fired
        .iter()
        .filter(|(_, g)| *g == ButtonEvent::ShortPress)
        .count();
    assert_eq!(shorts, 2);
}

#[test]
fn gestures_are_broadcast_synchronously_in_poll_order() {
    let _guard = PIPELINE_LOCK.lock().unwrap();

    let mut script = vec![false];
    script.extend(levels(&[(true, 8), (false, 8)]));
    let fired = run_pipeline(script);

    let order: Vec<_> = fired.iter().map(|(_, g)| *g).collect();
    // Confirmed press: edge then first repeat; confirmed release: edge
    // then the hold bucket.
    assert_eq!(
        order,
        vec![
            ButtonEvent::RisingEdge,
            ButtonEvent::RepeatPress,
            ButtonEvent::FallingEdge,
            ButtonEvent::ShortPress,
        ]
    );
}
