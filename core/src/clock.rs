//! Cooperative scheduler pacing every cycle-counted device against wall clock.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Sentinel cycle count a [`Clockable::tick`] returns to halt the entire clock.
pub const HALT: u32 = 0;

/// Anything the clock can drive. A return of [`HALT`] is terminal: the
/// owning [`Clock::run`] loop (and `Clock::tick`) stop scheduling further
/// work. Any other value is the number of cycles before this clockable is
/// eligible to tick again.
pub trait Clockable {
    fn tick(&mut self) -> u32;
}

pub type SharedClockable = Rc<RefCell<dyn Clockable>>;

struct Entry {
    clockable: SharedClockable,
    remaining: u32,
}

/// Result of a single `Clock::tick()` round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickResult {
    Continue,
    Halted,
}

/// Ordered sequence of clockables, ticked in registration order once per
/// round. Pacing against wall clock happens only inside `run()`; `tick()`
/// itself is a plain, unpaced scheduling step.
pub struct Clock {
    entries: Vec<Entry>,
    frequency_hz: f64,
    delay: f64,
    fullspeed: bool,
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    cycles: u64,
}

/// Target wall-clock width of one pacing sync window.
const SYNC_TIME: Duration = Duration::from_millis(20);

impl Clock {
    pub fn new(frequency_hz: f64) -> Self {
        Self {
            entries: Vec::new(),
            frequency_hz,
            delay: 1.0,
            fullspeed: false,
            paused: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            cycles: 0,
        }
    }

    pub fn set_delay(&mut self, delay: f64) {
        self.delay = delay;
    }

    pub fn set_fullspeed(&mut self, fullspeed: bool) {
        self.fullspeed = fullspeed;
    }

    pub fn fullspeed(&self) -> bool {
        self.fullspeed
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycles
    }

    /// A cloneable, thread-safe flag the hosting UI can use to pause/stop
    /// this clock from a second thread without touching device state.
    pub fn control_handles(&self) -> (Arc<AtomicBool>, Arc<AtomicBool>) {
        (self.paused.clone(), self.stopped.clone())
    }

    /// Append `cb` if it is not already registered (pointer identity).
    pub fn add(&mut self, cb: SharedClockable) {
        if self.entries.iter().any(|e| Rc::ptr_eq(&e.clockable, &cb)) {
            return;
        }
        self.entries.push(Entry {
            clockable: cb,
            remaining: 0,
        });
    }

    /// Remove `cb` if present. Idempotent when absent.
    pub fn del(&mut self, cb: &SharedClockable) {
        self.entries.retain(|e| !Rc::ptr_eq(&e.clockable, cb));
    }

    /// Tick every due clockable once, in registration order. A's writes are
    /// committed before B's tick runs when both are due in the same round,
    /// since entries are iterated in order and each device's `tick` runs to
    /// completion before the next is considered.
    pub fn tick(&mut self) -> TickResult {
        let mut halted = false;
        for entry in &mut self.entries {
            if entry.remaining == 0 {
                let cycles = entry.clockable.borrow_mut().tick();
                if cycles == HALT {
                    halted = true;
                    entry.remaining = 0;
                    continue;
                }
                entry.remaining = cycles;
            }
            entry.remaining = entry.remaining.saturating_sub(1);
        }
        self.cycles += 1;
        if halted { TickResult::Halted } else { TickResult::Continue }
    }

    pub fn pause(&self, pause: bool) {
        self.paused.store(pause, Ordering::Release);
    }

    pub fn toggle_pause(&self) {
        self.paused.fetch_xor(true, Ordering::AcqRel);
    }

    pub fn paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Set the pause flag and block the calling thread until the running
    /// thread has observed it (polls at the same 200ms granularity `run`
    /// uses while suspended).
    pub fn pause_wait(&self, pause: bool) {
        self.pause(pause);
        while self.paused.load(Ordering::Acquire) != pause {
            std::thread::sleep(Duration::from_millis(200));
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// The scheduling loop. Runs until `stop()` is called or a clockable
    /// returns `HALT`. While `paused()`, sleeps in 200ms increments without
    /// ticking. Otherwise ticks once, and — unless `fullspeed` — paces wall
    /// clock in `SYNC_TIME`-wide windows: every `sync_cycles` emulated
    /// cycles (chosen so the window covers ~20ms of emulated time at
    /// `frequency_hz`), sleeps for the shortfall between emulated and wall
    /// time, scaled by `delay`. Oversleeping carries negative credit into
    /// the next window instead of resetting it.
    pub fn run(&mut self) {
        let sync_cycles = ((self.frequency_hz * SYNC_TIME.as_secs_f64()).round() as u64).max(1);
        let window_target = Duration::from_secs_f64(sync_cycles as f64 / self.frequency_hz);
        let mut window_start = Instant::now();
        let mut window_cycles = 0u64;
        let mut credit = Duration::ZERO;
        log::info!("clock run loop starting at {} Hz", self.frequency_hz);
        loop {
            if self.stopped() {
                break;
            }
            if self.paused() {
                std::thread::sleep(Duration::from_millis(200));
                continue;
            }
            if self.tick() == TickResult::Halted {
                break;
            }
            window_cycles += 1;
            if !self.fullspeed && window_cycles >= sync_cycles {
                let elapsed = window_start.elapsed();
                let deficit = window_target.saturating_sub(elapsed);
                if deficit.is_zero() && elapsed > window_target {
                    log::warn!(
                        "clock overrun: window took {:?}, budget was {:?}",
                        elapsed,
                        window_target
                    );
                } else {
                    let wait = deficit.mul_f64(self.delay).saturating_sub(credit);
                    let before_sleep = Instant::now();
                    if !wait.is_zero() {
                        std::thread::sleep(wait);
                    }
                    let overslept = before_sleep.elapsed().saturating_sub(wait);
                    credit = overslept;
                }
                window_start = Instant::now();
                window_cycles = 0;
            }
        }
        log::info!("clock run loop stopped after {} cycles", self.cycles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingClockable {
        ticks: u32,
        period: u32,
    }

    impl Clockable for CountingClockable {
        fn tick(&mut self) -> u32 {
            self.ticks += 1;
            self.period
        }
    }

    struct HaltsImmediately;
    impl Clockable for HaltsImmediately {
        fn tick(&mut self) -> u32 {
            HALT
        }
    }

    #[test]
    fn add_is_idempotent_by_pointer_identity() {
        let mut clock = Clock::new(1_000_000.0);
        let cb: SharedClockable = Rc::new(RefCell::new(CountingClockable { ticks: 0, period: 1 }));
        clock.add(cb.clone());
        clock.add(cb.clone());
        assert_eq!(clock.entries.len(), 1);
    }

    #[test]
    fn del_is_idempotent_when_absent() {
        let mut clock = Clock::new(1_000_000.0);
        let cb: SharedClockable = Rc::new(RefCell::new(CountingClockable { ticks: 0, period: 1 }));
        clock.del(&cb);
        clock.add(cb.clone());
        clock.del(&cb);
        clock.del(&cb);
        assert!(clock.entries.is_empty());
    }

    #[test]
    fn period_n_elapses_n_cycles_between_invocations() {
        let mut clock = Clock::new(1_000_000.0);
        let cb: SharedClockable = Rc::new(RefCell::new(CountingClockable { ticks: 0, period: 3 }));
        clock.add(cb.clone());
        for _ in 0..10 {
            clock.tick();
        }
        // ticks at round 0, 3, 6, 9 -> 4 invocations in 10 rounds
        assert_eq!(cb.borrow().ticks, 4);
    }

    #[test]
    fn halt_propagates_from_tick() {
        let mut clock = Clock::new(1_000_000.0);
        clock.add(Rc::new(RefCell::new(HaltsImmediately)));
        assert_eq!(clock.tick(), TickResult::Halted);
    }

    #[test]
    fn fullspeed_run_completes_quickly() {
        let mut clock = Clock::new(1.0);
        clock.set_fullspeed(true);
        let ticks = Rc::new(RefCell::new(0u32));
        struct StopAfterTwo {
            ticks: Rc<RefCell<u32>>,
        }
        impl Clockable for StopAfterTwo {
            fn tick(&mut self) -> u32 {
                *self.ticks.borrow_mut() += 1;
                if *self.ticks.borrow() >= 2 { HALT } else { 1 }
            }
        }
        clock.add(Rc::new(RefCell::new(StopAfterTwo { ticks: ticks.clone() })));
        let start = Instant::now();
        clock.run();
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(*ticks.borrow(), 2);
    }
}
