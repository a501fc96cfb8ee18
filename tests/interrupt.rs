//! Cancellation tests live in their own binary: the interrupt flag is
//! process-wide and one-way, so these must not share a process with tests
//! that expect uncancelled playback.

mod common;

use common::{solid_image, MemoryScreen};
use yav::{compositor, interrupt};

#[test]
fn infinite_loop_stops_at_the_first_frame_boundary_after_cancel() {
    let mut screen = MemoryScreen::rgba(2, 2);
    let mut img = solid_image(2, 2, [1, 2, 3, 255]);
    img.loops = -1;
    img.frame_delay_ms = 0;

    interrupt::trigger();
    assert!(interrupt::interrupted());

    // without cancellation this would never return; with the flag set the
    // run completes exactly one frame and leaves it visible
    compositor::blit(&mut screen, &img).unwrap();
    assert_eq!(screen.presented, 1);
    assert_ne!(screen.pixel(0, 0), 0);
}

#[test]
fn cancelled_positive_loop_also_stops_early() {
    let mut screen = MemoryScreen::rgba(2, 2);
    let mut img = solid_image(2, 2, [1, 2, 3, 255]);
    img.loops = 50;
    img.frame_delay_ms = 0;

    interrupt::trigger();
    compositor::blit(&mut screen, &img).unwrap();
    assert_eq!(screen.presented, 1);
}
