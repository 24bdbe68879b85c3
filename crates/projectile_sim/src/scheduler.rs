//! FixedTickScheduler - референсный TickDriver
//!
//! Каждая регистрация копит собственный accumulator и вызывается с
//! `dt = 1 / frequency` столько раз, сколько периодов накопилось.
//! Callback'и вызываются без lock: регистрация новых tick изнутри
//! callback (spawn из hit callback) допустима. Panic callback останавливает
//! только его регистрацию, остальные продолжают тикать.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use crate::logger;
use crate::ports::{TickDriver, TickFn, TickHandle};
use crate::state::lock;

/// Допуск на накопленную ошибку f32 (60 × 1/60 ≠ 1.0 ровно)
const PERIOD_EPSILON: f32 = 1e-6;

struct Registration {
    on_tick: TickFn,
    period: f32,
    accumulator: f32,
    handle: TickHandle,
}

#[derive(Default)]
pub struct FixedTickScheduler {
    registrations: Mutex<Vec<Registration>>,
}

impl FixedTickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Количество живых (не остановленных) регистраций
    pub fn len(&self) -> usize {
        lock(&self.registrations)
            .iter()
            .filter(|registration| !registration.handle.is_stopped())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Продвигает время на `elapsed` секунд. Возвращает число вызовов callback.
    pub fn advance(&self, elapsed: f32) -> usize {
        self.run(|registration| {
            registration.accumulator += elapsed;
            let mut due = 0;
            while registration.accumulator + PERIOD_EPSILON >= registration.period {
                registration.accumulator -= registration.period;
                due += 1;
            }
            due
        })
    }

    /// Ровно один tick для каждой регистрации (независимо от частоты)
    pub fn tick_once(&self) -> usize {
        self.run(|_| 1)
    }

    fn run(&self, mut due: impl FnMut(&mut Registration) -> usize) -> usize {
        let mut current = std::mem::take(&mut *lock(&self.registrations));
        let mut fired = 0;

        for registration in current.iter_mut() {
            let count = due(registration);
            for _ in 0..count {
                if registration.handle.is_stopped() {
                    break;
                }
                fired += 1;
                let period = registration.period;
                let on_tick = &mut registration.on_tick;
                match catch_unwind(AssertUnwindSafe(|| on_tick(period))) {
                    Ok(true) => {}
                    Ok(false) => registration.handle.stop(),
                    Err(_) => {
                        logger::log_error("💥 Tick callback panicked, registration stopped");
                        registration.handle.stop();
                    }
                }
            }
        }

        current.retain(|registration| !registration.handle.is_stopped());

        // Регистрации, сделанные во время прогона, идут после текущих
        let mut registrations = lock(&self.registrations);
        let added = std::mem::replace(&mut *registrations, current);
        registrations.extend(added);
        registrations.retain(|registration| !registration.handle.is_stopped());

        fired
    }
}

impl TickDriver for FixedTickScheduler {
    fn register(&self, on_tick: TickFn, frequency_hz: f32) -> TickHandle {
        let handle = TickHandle::new();
        if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
            logger::log_warning(&format!(
                "⚠️ Tick registration rejected: invalid frequency {}",
                frequency_hz
            ));
            handle.stop();
            return handle;
        }

        lock(&self.registrations).push(Registration {
            on_tick,
            period: 1.0 / frequency_hz,
            accumulator: 0.0,
            handle: handle.clone(),
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>, stop_after: usize) -> TickFn {
        let counter = counter.clone();
        Box::new(move |_dt| counter.fetch_add(1, Ordering::SeqCst) + 1 < stop_after)
    }

    #[test]
    fn test_advance_fires_per_accumulated_period() {
        let scheduler = FixedTickScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.register(counting(&counter, usize::MAX), 10.0);

        scheduler.advance(0.05);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        scheduler.advance(0.05);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        scheduler.advance(0.3);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_sixty_hz_over_one_second() {
        let scheduler = FixedTickScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.register(counting(&counter, usize::MAX), 60.0);

        for _ in 0..60 {
            scheduler.advance(1.0 / 60.0);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 60);
    }

    #[test]
    fn test_false_return_stops_registration() {
        let scheduler = FixedTickScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.register(counting(&counter, 3), 60.0);

        for _ in 0..10 {
            scheduler.tick_once();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(handle.is_stopped());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_external_stop() {
        let scheduler = FixedTickScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.register(counting(&counter, usize::MAX), 60.0);

        scheduler.tick_once();
        handle.stop();
        scheduler.tick_once();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_register_from_inside_callback() {
        let scheduler = Arc::new(FixedTickScheduler::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = Arc::downgrade(&scheduler);
        let inner_counter = counter.clone();
        scheduler.register(
            Box::new(move |_| {
                if let Some(scheduler) = inner_scheduler.upgrade() {
                    scheduler.register(counting(&inner_counter, 1), 60.0);
                }
                false
            }),
            60.0,
        );

        scheduler.tick_once();
        assert_eq!(scheduler.len(), 1);
        scheduler.tick_once();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_panicking_callback_does_not_stop_others() {
        let scheduler = FixedTickScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let bad = scheduler.register(Box::new(|_| panic!("tick exploded")), 60.0);
        scheduler.register(counting(&counter, usize::MAX), 60.0);

        for _ in 0..5 {
            scheduler.tick_once();
        }

        assert!(bad.is_stopped());
        assert_eq!(scheduler.len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_invalid_frequency_is_stopped() {
        let scheduler = FixedTickScheduler::new();
        let handle = scheduler.register(Box::new(|_| true), 0.0);
        assert!(handle.is_stopped());
        assert!(scheduler.is_empty());
    }
}
