//! Display State Coordinator
//!
//! Owns the process-wide record of what the display is believed to be
//! running, plus the menu entries whose checkmarks mirror it. Three triggers
//! feed it concurrently:
//! - menu clicks and hotkeys call [`Coordinator::apply_change`]
//!   (change, then read back and trust the OS)
//! - the poll loop calls [`Coordinator::poll_tick`]
//!   (read, compare, reconcile only on difference)
//!
//! Both paths end in the same locked write, so there is exactly one place
//! that mutates shared state and toggles checkmarks. Display change calls
//! are made outside the lock.

use crate::display::{
    DisplayAction, DisplayBackend, DisplayError, DisplayState, RefreshRate, Resolution,
};
use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Check/uncheck side effect of a menu entry.
///
/// Called while the coordinator lock is held, from whichever thread made the
/// write. Implementations must be quick and must not call back into the
/// coordinator.
pub trait MenuCheck: Send + Sync {
    fn set_checked(&self, checked: bool);
}

/// A menu entry together with the value it selects
pub struct MenuEntry<T> {
    value: T,
    handle: Box<dyn MenuCheck>,
}

impl<T> MenuEntry<T> {
    pub fn new(value: T, handle: impl MenuCheck + 'static) -> Self {
        Self {
            value,
            handle: Box::new(handle),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Result of one poll tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Display matches the shared state; nothing was written
    Unchanged,
    /// Display differed and the shared state and menu were updated
    Reconciled(DisplayState),
    /// The display could not be read; the tick was skipped
    ReadFailed,
}

struct SharedState {
    current: Option<DisplayState>,
    resolutions: Vec<MenuEntry<Resolution>>,
    rates: Vec<MenuEntry<RefreshRate>>,
}

impl SharedState {
    /// The single write path: checkmarks first, then the recorded state
    fn write(&mut self, observed: DisplayState) {
        for entry in &self.resolutions {
            entry.handle.set_checked(*entry.value() == observed.resolution);
        }
        for entry in &self.rates {
            entry.handle.set_checked(*entry.value() == observed.rate);
        }
        self.current = Some(observed);
    }
}

/// Serializes every change to the shared display state
pub struct Coordinator<D: DisplayBackend> {
    display: D,
    state: Mutex<SharedState>,
}

impl<D: DisplayBackend> Coordinator<D> {
    pub fn new(
        display: D,
        resolutions: Vec<MenuEntry<Resolution>>,
        rates: Vec<MenuEntry<RefreshRate>>,
    ) -> Self {
        Self {
            display,
            state: Mutex::new(SharedState {
                current: None,
                resolutions,
                rates,
            }),
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// The last state written, `None` until the first successful read
    pub fn current(&self) -> Option<DisplayState> {
        self.state.lock().current
    }

    /// Initial unconditional reconcile so the menu reflects reality before
    /// any user interaction
    pub fn startup(&self) -> Result<DisplayState, DisplayError> {
        let observed = self.display.current_display()?;
        info!(display = %observed, "initial display state");
        self.reconcile(observed);
        Ok(observed)
    }

    /// Make the requested change, then read back and reconcile.
    ///
    /// A failed change leaves state and checkmarks untouched and is not
    /// retried. A failed read-back is swallowed: the menu keeps its
    /// pre-change state until the next poll.
    pub fn apply_change(&self, action: DisplayAction) -> Result<(), DisplayError> {
        info!(%action, "applying display change");

        if let Err(e) = self.display.apply(action) {
            error!(%action, "display change failed: {}", e);
            return Err(e);
        }

        match self.display.current_display() {
            Ok(observed) => {
                self.reconcile(observed);
                Ok(())
            }
            Err(e) => {
                warn!(%action, "could not read back display after change: {}", e);
                Ok(())
            }
        }
    }

    /// Update every checkmark and the shared state to match `observed`.
    ///
    /// Idempotent: repeating it with the same state repeats the same writes.
    pub fn reconcile(&self, observed: DisplayState) {
        let mut state = self.state.lock();
        state.write(observed);
        debug!(display = %observed, "display state reconciled");
    }

    /// Re-read the display and reconcile only if it differs from the shared
    /// state. Compare and write happen under one lock acquisition.
    pub fn poll_tick(&self) -> PollOutcome {
        let observed = match self.display.current_display() {
            Ok(observed) => observed,
            Err(e) => {
                debug!("skipping poll tick: {}", e);
                return PollOutcome::ReadFailed;
            }
        };

        let mut state = self.state.lock();
        if state.current == Some(observed) {
            return PollOutcome::Unchanged;
        }

        info!(
            from = ?state.current.map(|s| s.to_string()),
            to = %observed,
            "display changed externally"
        );
        state.write(observed);
        PollOutcome::Reconciled(observed)
    }
}

/// Spawn a worker that applies every action received on `requests`.
///
/// Each trigger source gets its own worker, so a slow or hung display change
/// stalls only that source. The worker exits when all senders are dropped.
pub fn spawn_action_worker<D>(
    name: &str,
    coordinator: Arc<Coordinator<D>>,
    requests: Receiver<DisplayAction>,
) -> std::io::Result<JoinHandle<()>>
where
    D: DisplayBackend + 'static,
{
    let thread_name = name.to_string();
    thread::Builder::new().name(name.to_string()).spawn(move || {
        debug!(worker = %thread_name, "action worker started");
        for action in requests.iter() {
            if let Err(e) = coordinator.apply_change(action) {
                debug!(worker = %thread_name, "request dropped: {}", e);
            }
        }
        debug!(worker = %thread_name, "action worker stopped");
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{parse_config, AppConfig, RateEntry, ResolutionEntry};
    use crate::hotkey::{build_bindings, BindingTable, HOTKEY_RATE_BASE, HOTKEY_RES_BASE};
    use crossbeam::channel::unbounded;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Simulated display hardware
    pub(crate) struct FakeDisplay {
        pub mode: Mutex<DisplayState>,
        pub fail_change: AtomicBool,
        pub fail_read: AtomicBool,
        pub reads: AtomicUsize,
        pub changes: AtomicUsize,
        /// Rate the hardware actually lands on, whatever was requested
        pub rate_override: Mutex<Option<RefreshRate>>,
    }

    impl FakeDisplay {
        pub fn new(mode: DisplayState) -> Arc<Self> {
            Arc::new(Self {
                mode: Mutex::new(mode),
                fail_change: AtomicBool::new(false),
                fail_read: AtomicBool::new(false),
                reads: AtomicUsize::new(0),
                changes: AtomicUsize::new(0),
                rate_override: Mutex::new(None),
            })
        }

        /// Change the mode behind the coordinator's back
        pub fn set_externally(&self, mode: DisplayState) {
            *self.mode.lock() = mode;
        }
    }

    impl DisplayBackend for FakeDisplay {
        fn current_display(&self) -> Result<DisplayState, DisplayError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_read.load(Ordering::SeqCst) {
                return Err(DisplayError::Read("device busy".to_string()));
            }
            Ok(*self.mode.lock())
        }

        fn change_resolution(&self, resolution: Resolution) -> Result<(), DisplayError> {
            if self.fail_change.load(Ordering::SeqCst) {
                return Err(DisplayError::Change {
                    target: resolution.to_string(),
                    reason: "mode not supported".to_string(),
                });
            }
            self.changes.fetch_add(1, Ordering::SeqCst);
            self.mode.lock().resolution = resolution;
            Ok(())
        }

        fn change_refresh_rate(&self, rate: RefreshRate) -> Result<(), DisplayError> {
            if self.fail_change.load(Ordering::SeqCst) {
                return Err(DisplayError::Change {
                    target: rate.to_string(),
                    reason: "mode not supported".to_string(),
                });
            }
            self.changes.fetch_add(1, Ordering::SeqCst);
            let landed = self.rate_override.lock().unwrap_or(rate);
            self.mode.lock().rate = landed;
            Ok(())
        }
    }

    /// Menu item that records its checked flag and how often it was written
    #[derive(Clone, Default)]
    pub(crate) struct FakeItem(Arc<FakeItemState>);

    #[derive(Default)]
    pub(crate) struct FakeItemState {
        checked: AtomicBool,
        writes: AtomicUsize,
    }

    impl FakeItem {
        pub fn checked(&self) -> bool {
            self.0.checked.load(Ordering::SeqCst)
        }

        pub fn writes(&self) -> usize {
            self.0.writes.load(Ordering::SeqCst)
        }
    }

    impl MenuCheck for FakeItem {
        fn set_checked(&self, checked: bool) {
            self.0.checked.store(checked, Ordering::SeqCst);
            self.0.writes.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) struct Harness {
        pub display: Arc<FakeDisplay>,
        pub coordinator: Arc<Coordinator<Arc<FakeDisplay>>>,
        pub res_items: Vec<FakeItem>,
        pub rate_items: Vec<FakeItem>,
    }

    impl Harness {
        pub fn new(config: &AppConfig, initial: DisplayState) -> Self {
            let display = FakeDisplay::new(initial);
            let res_items: Vec<FakeItem> =
                config.resolutions.iter().map(|_| FakeItem::default()).collect();
            let rate_items: Vec<FakeItem> =
                config.refresh_rates.iter().map(|_| FakeItem::default()).collect();

            let resolutions = config
                .resolutions
                .iter()
                .zip(&res_items)
                .map(|(e, item)| MenuEntry::new(e.resolution, item.clone()))
                .collect();
            let rates = config
                .refresh_rates
                .iter()
                .zip(&rate_items)
                .map(|(e, item)| MenuEntry::new(e.rate, item.clone()))
                .collect();

            let coordinator = Arc::new(Coordinator::new(
                Arc::clone(&display),
                resolutions,
                rates,
            ));

            Self {
                display,
                coordinator,
                res_items,
                rate_items,
            }
        }

        pub fn res_checks(&self) -> Vec<bool> {
            self.res_items.iter().map(FakeItem::checked).collect()
        }

        pub fn rate_checks(&self) -> Vec<bool> {
            self.rate_items.iter().map(FakeItem::checked).collect()
        }

        pub fn total_writes(&self) -> usize {
            self.res_items
                .iter()
                .chain(&self.rate_items)
                .map(FakeItem::writes)
                .sum()
        }
    }

    pub(crate) fn mode(width: u32, height: u32, hz: u32) -> DisplayState {
        DisplayState::new(Resolution::new(width, height), RefreshRate(hz))
    }

    pub(crate) fn scenario_config() -> AppConfig {
        AppConfig {
            resolutions: vec![
                ResolutionEntry::new(Resolution::new(2560, 1600), "Ctrl+F1"),
                ResolutionEntry::new(Resolution::new(2560, 1440), ""),
            ],
            refresh_rates: vec![
                RateEntry::new(RefreshRate(240), "Alt+F1"),
                RateEntry::new(RefreshRate(60), ""),
            ],
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_startup_reconciles_unconditionally() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        assert_eq!(h.coordinator.current(), None);

        let observed = h.coordinator.startup().unwrap();

        assert_eq!(observed, mode(2560, 1600, 240));
        assert_eq!(h.coordinator.current(), Some(observed));
        assert_eq!(h.res_checks(), vec![true, false]);
        assert_eq!(h.rate_checks(), vec![true, false]);
    }

    #[test]
    fn test_startup_read_failure_leaves_menu_alone() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        h.display.fail_read.store(true, Ordering::SeqCst);

        assert!(h.coordinator.startup().is_err());
        assert_eq!(h.coordinator.current(), None);
        assert_eq!(h.total_writes(), 0);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        let observed = mode(2560, 1440, 60);

        h.coordinator.reconcile(observed);
        let checks_once = (h.res_checks(), h.rate_checks());
        let writes_once = h.total_writes();

        h.coordinator.reconcile(observed);

        assert_eq!((h.res_checks(), h.rate_checks()), checks_once);
        assert_eq!(h.coordinator.current(), Some(observed));
        // Redundant but harmless: the second call repeats the same writes
        assert_eq!(h.total_writes(), writes_once * 2);
    }

    #[test]
    fn test_duplicate_config_lines_check_one_entry_per_kind() {
        let config = parse_config(
            "[Resolutions]\n2560x1600 = Ctrl+F1\n2560x1600\n\
             [RefreshRates]\n240\n240 = Alt+F1\n",
        );
        let h = Harness::new(&config, mode(2560, 1600, 240));

        h.coordinator.startup().unwrap();

        let checked = |checks: Vec<bool>| checks.into_iter().filter(|c| *c).count();
        assert_eq!(checked(h.res_checks()), 1);
        assert_eq!(checked(h.rate_checks()), 1);
    }

    #[test]
    fn test_unlisted_mode_unchecks_everything() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        h.coordinator.startup().unwrap();

        h.coordinator.reconcile(mode(1920, 1080, 144));

        assert_eq!(h.res_checks(), vec![false, false]);
        assert_eq!(h.rate_checks(), vec![false, false]);
        assert_eq!(h.coordinator.current(), Some(mode(1920, 1080, 144)));
    }

    #[test]
    fn test_poll_tick_without_change_writes_nothing() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        h.coordinator.startup().unwrap();
        let writes = h.total_writes();

        assert_eq!(h.coordinator.poll_tick(), PollOutcome::Unchanged);
        assert_eq!(h.coordinator.poll_tick(), PollOutcome::Unchanged);

        assert_eq!(h.total_writes(), writes);
    }

    #[test]
    fn test_poll_tick_reconciles_once_on_difference() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        h.coordinator.startup().unwrap();
        let writes = h.total_writes();

        h.display.set_externally(mode(2560, 1600, 60));

        assert_eq!(
            h.coordinator.poll_tick(),
            PollOutcome::Reconciled(mode(2560, 1600, 60))
        );
        // One reconcile touches every entry exactly once
        assert_eq!(h.total_writes(), writes * 2);
        assert_eq!(h.rate_checks(), vec![false, true]);

        assert_eq!(h.coordinator.poll_tick(), PollOutcome::Unchanged);
        assert_eq!(h.total_writes(), writes * 2);
    }

    #[test]
    fn test_poll_tick_after_failed_startup_reconciles() {
        let h = Harness::new(&scenario_config(), mode(2560, 1440, 60));
        h.display.fail_read.store(true, Ordering::SeqCst);
        assert_eq!(h.coordinator.poll_tick(), PollOutcome::ReadFailed);
        assert_eq!(h.total_writes(), 0);

        h.display.fail_read.store(false, Ordering::SeqCst);
        assert_eq!(
            h.coordinator.poll_tick(),
            PollOutcome::Reconciled(mode(2560, 1440, 60))
        );
        assert_eq!(h.res_checks(), vec![false, true]);
    }

    #[test]
    fn test_failed_change_leaves_state_untouched() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        h.coordinator.startup().unwrap();
        let writes = h.total_writes();
        h.display.fail_change.store(true, Ordering::SeqCst);

        let result = h
            .coordinator
            .apply_change(DisplayAction::SetRefreshRate(RefreshRate(60)));

        assert!(matches!(result, Err(DisplayError::Change { .. })));
        assert_eq!(h.total_writes(), writes);
        assert_eq!(h.coordinator.current(), Some(mode(2560, 1600, 240)));
        assert_eq!(h.rate_checks(), vec![true, false]);
    }

    #[test]
    fn test_failed_read_back_keeps_pre_change_menu() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        h.coordinator.startup().unwrap();
        h.display.fail_read.store(true, Ordering::SeqCst);

        let result = h
            .coordinator
            .apply_change(DisplayAction::SetResolution(Resolution::new(2560, 1440)));

        assert!(result.is_ok());
        assert_eq!(h.display.changes.load(Ordering::SeqCst), 1);
        assert_eq!(h.coordinator.current(), Some(mode(2560, 1600, 240)));
        assert_eq!(h.res_checks(), vec![true, false]);

        // The next successful poll catches up
        h.display.fail_read.store(false, Ordering::SeqCst);
        assert_eq!(
            h.coordinator.poll_tick(),
            PollOutcome::Reconciled(mode(2560, 1440, 240))
        );
        assert_eq!(h.res_checks(), vec![false, true]);
    }

    #[test]
    fn test_change_trusts_the_read_back() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        h.coordinator.startup().unwrap();

        // Hardware settles on 60hz when asked for an unlisted 144hz
        *h.display.rate_override.lock() = Some(RefreshRate(60));
        h.coordinator
            .apply_change(DisplayAction::SetRefreshRate(RefreshRate(144)))
            .unwrap();

        assert_eq!(h.coordinator.current(), Some(mode(2560, 1600, 60)));
        assert_eq!(h.rate_checks(), vec![false, true]);
    }

    #[test]
    fn test_end_to_end_scenario() {
        let config = AppConfig {
            resolutions: vec![
                ResolutionEntry::new(Resolution::new(2560, 1600), "Ctrl+F1"),
                ResolutionEntry::new(Resolution::new(2560, 1440), ""),
            ],
            refresh_rates: vec![RateEntry::new(RefreshRate(240), "Alt+F1")],
            ..AppConfig::default()
        };
        let h = Harness::new(&config, mode(2560, 1600, 240));

        let mut table = BindingTable::new(&config);
        let bindings = build_bindings(&config);
        for binding in &bindings {
            table.mark_registered(binding.id);
        }
        assert_eq!(
            bindings.iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![HOTKEY_RES_BASE, HOTKEY_RATE_BASE]
        );

        h.coordinator.startup().unwrap();
        assert_eq!(h.res_checks(), vec![true, false]);
        assert_eq!(h.rate_checks(), vec![true]);

        // The unbound entry never registered, so its id dispatches nothing
        assert_eq!(table.resolve(HOTKEY_RES_BASE + 1), None);
        assert_eq!(h.display.changes.load(Ordering::SeqCst), 0);

        h.coordinator
            .apply_change(DisplayAction::SetResolution(Resolution::new(2560, 1440)))
            .unwrap();

        assert_eq!(h.coordinator.current(), Some(mode(2560, 1440, 240)));
        assert_eq!(h.res_checks(), vec![false, true]);
        assert_eq!(h.rate_checks(), vec![true]);

        // A bound hotkey routes through the same path
        let action = table.resolve(HOTKEY_RES_BASE).unwrap();
        h.coordinator.apply_change(action).unwrap();
        assert_eq!(h.res_checks(), vec![true, false]);
    }

    #[test]
    fn test_external_change_scenario() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        h.coordinator.startup().unwrap();
        let changes_before = h.display.changes.load(Ordering::SeqCst);

        h.display.set_externally(mode(2560, 1440, 60));

        assert_eq!(
            h.coordinator.poll_tick(),
            PollOutcome::Reconciled(mode(2560, 1440, 60))
        );
        assert_eq!(h.coordinator.current(), Some(mode(2560, 1440, 60)));
        assert_eq!(h.res_checks(), vec![false, true]);
        assert_eq!(h.rate_checks(), vec![false, true]);
        assert_eq!(h.display.changes.load(Ordering::SeqCst), changes_before);
    }

    #[test]
    fn test_concurrent_triggers_keep_menu_consistent() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        h.coordinator.startup().unwrap();

        let actions = [
            DisplayAction::SetResolution(Resolution::new(2560, 1440)),
            DisplayAction::SetRefreshRate(RefreshRate(60)),
            DisplayAction::SetResolution(Resolution::new(2560, 1600)),
            DisplayAction::SetRefreshRate(RefreshRate(240)),
        ];

        let handles: Vec<_> = actions
            .iter()
            .copied()
            .map(|action| {
                let coordinator = Arc::clone(&h.coordinator);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _ = coordinator.apply_change(action);
                        coordinator.poll_tick();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Settle on whatever the hardware ended up in
        h.coordinator.poll_tick();
        let current = h.coordinator.current().unwrap();
        assert_eq!(current, *h.display.mode.lock());

        let expected_res: Vec<bool> = scenario_config()
            .resolutions
            .iter()
            .map(|e| e.resolution == current.resolution)
            .collect();
        let expected_rates: Vec<bool> = scenario_config()
            .refresh_rates
            .iter()
            .map(|e| e.rate == current.rate)
            .collect();
        assert_eq!(h.res_checks(), expected_res);
        assert_eq!(h.rate_checks(), expected_rates);
        assert_eq!(h.res_checks().iter().filter(|c| **c).count(), 1);
        assert_eq!(h.rate_checks().iter().filter(|c| **c).count(), 1);
    }

    #[test]
    fn test_action_worker_applies_requests_in_order() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        h.coordinator.startup().unwrap();

        let (tx, rx) = unbounded();
        let worker = spawn_action_worker("test-worker", Arc::clone(&h.coordinator), rx).unwrap();

        tx.send(DisplayAction::SetRefreshRate(RefreshRate(60))).unwrap();
        tx.send(DisplayAction::SetResolution(Resolution::new(2560, 1440)))
            .unwrap();
        drop(tx);
        worker.join().unwrap();

        assert_eq!(h.display.changes.load(Ordering::SeqCst), 2);
        assert_eq!(h.coordinator.current(), Some(mode(2560, 1440, 60)));
        assert_eq!(h.res_checks(), vec![false, true]);
        assert_eq!(h.rate_checks(), vec![false, true]);
    }

    #[test]
    fn test_action_worker_survives_failures() {
        let h = Harness::new(&scenario_config(), mode(2560, 1600, 240));
        h.coordinator.startup().unwrap();
        h.display.fail_change.store(true, Ordering::SeqCst);

        let (tx, rx) = unbounded();
        let worker = spawn_action_worker("test-worker", Arc::clone(&h.coordinator), rx).unwrap();

        tx.send(DisplayAction::SetRefreshRate(RefreshRate(60))).unwrap();
        tx.send(DisplayAction::SetRefreshRate(RefreshRate(60))).unwrap();
        drop(tx);
        worker.join().unwrap();

        assert_eq!(h.coordinator.current(), Some(mode(2560, 1600, 240)));
        assert_eq!(h.rate_checks(), vec![true, false]);
    }
}
