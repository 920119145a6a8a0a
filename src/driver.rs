// Driver - Host timer loop
// Sleeps until the next deadline and ticks; the only place that blocks

use crate::audio::PlayerFactory;
use crate::sequencer::metronome::Metronome;
use crate::sequencer::timer::HostClock;
use std::thread;
use std::time::Duration;

/// Upper bound of a single sleep, so stop requests are noticed quickly
const MAX_SLEEP: Duration = Duration::from_millis(50);

/// Something polled by a host timer loop
pub trait TimerDriven {
    /// Earliest host time at which `tick` has work to do
    fn next_deadline(&self) -> Option<f64>;

    /// Fires whatever is due at the current host time
    fn tick(&mut self);
}

impl<F, H> TimerDriven for Metronome<F, H>
where
    F: PlayerFactory,
    H: HostClock + Clone,
{
    fn next_deadline(&self) -> Option<f64> {
        Metronome::next_deadline(self)
    }

    fn tick(&mut self) {
        Metronome::tick(self)
    }
}

/// Ticks `target` in real time until it has no deadline left or
/// `keep_running` returns false. Returns the number of ticks handled.
pub fn run_realtime(
    target: &mut impl TimerDriven,
    host: &impl HostClock,
    mut keep_running: impl FnMut() -> bool,
) -> u64 {
    let mut ticks = 0;
    loop {
        let Some(deadline) = target.next_deadline() else {
            break;
        };

        let wait = deadline - host.now();
        if wait > 0.0 {
            thread::sleep(Duration::from_secs_f64(wait).min(MAX_SLEEP));
        } else {
            target.tick();
            ticks += 1;
        }

        if !keep_running() {
            break;
        }
    }
    log::debug!("Timer loop exited after {} ticks", ticks);
    ticks
}
