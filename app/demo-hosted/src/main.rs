// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hosted demonstration: the whole stack on the virtual clock.
//!
//! A scripted "GPIO pad" produces a short click, a double click, and a long
//! hold; the button pipeline turns those into gestures; a listener process
//! prints every gesture it hears. The main loop at the bottom is the
//! canonical host loop: run the scheduler until idle, sleep until the
//! hardware timer fires, take the interrupt.

use abi::{Event, EventData, ProcId};
use kern::arch::hosted;
use kern::{time, Kernel, ProcessDesc, ThreadResult};

/// The scripted pad: pressed during three windows of virtual time.
///
///   500..600    a clean short press (one click)
///  1000..1080 / 1160..1240   two presses close together (double click)
///  1600..2900  a hold long enough to cross the one-second threshold
fn demo_pad() -> bool {
    let t = time::now();
    (500..600).contains(&t)
        || (1000..1080).contains(&t)
        || (1160..1240).contains(&t)
        || (1600..2900).contains(&t)
}

fn listener(_: &mut Kernel, _: ProcId, ev: &Event) -> ThreadResult {
    if let Some((button, gesture)) = uibuttons::decode(ev) {
        println!("[{:>5} ms] button {}: {:?}", time::now(), button.0, gesture);
    }
    ThreadResult::Waiting
}
static LISTENER: ProcessDesc =
    ProcessDesc { name: "listener", thread: listener };

fn main() {
    hosted::set_time(0);
    let mut kernel = Kernel::new();

    kernel.start(&LISTENER, EventData::None).expect("process slot");
    uibuttons::process::register(demo_pad).expect("button slot");
    uibuttons::process::init(&mut kernel).expect("process slot");

    println!("myos demo: scripted button on a virtual clock");
    while time::now() < 3500 {
        kernel.run();
        if !hosted::wait_for_interrupt() {
            break;
        }
        kernel.isr_entry();
    }
    kernel.run();
    println!("[{:>5} ms] done", time::now());
}
