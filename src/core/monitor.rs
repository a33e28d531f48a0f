//! Connection monitor: reconciles observed VPN state with the reconnect policy.
//!
//! The [`Monitor`] owns the derived [`ConnectionState`], the
//! [`ReconnectPolicy`], the last recorded [`Intent`] and a queue of deferred
//! actions. Everything happens on the caller's loop:
//!
//! - [`Monitor::tick`] runs due deferred actions, then polls when the poll
//!   interval has elapsed.
//! - [`Monitor::reconcile`] is the single function that turns an
//!   [`Observation`] into the next state and decides what the policy does.
//! - Explicit actions ([`Monitor::connect`], [`Monitor::disconnect`],
//!   [`Monitor::reconnect`]) only update flags and issue commands; the next
//!   poll observes the outcome.
//!
//! All methods return [`MonitorEvent`]s for the caller to present.
//!
//! Queued tasks are never removed. A queued auto-reconnect re-checks the
//! policy when it fires and becomes a no-op
//! ([`MonitorEvent::ReconnectCancelled`]) after a manual disconnect or when
//! auto-reconnect was disabled. The connect queued by a manual reconnect
//! carries the connect epoch it was queued in; any later explicit connect
//! or disconnect bumps the epoch and the task is dropped
//! ([`MonitorEvent::ConnectCancelled`]).
//!
//! With a [`ManualHold`] attached, explicit disconnects are also recorded
//! on disk so a monitor in another process honours them.

use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::core::hold::ManualHold;
use crate::core::scheduler::Scheduler;
use crate::platform::{ServiceAction, VpnBackend};
use crate::state::{ConnectCriterion, ConnectionState, Observation, ReconnectPolicy};

/// Last action requested by the user or the policy.
///
/// Recorded separately from the observed [`ConnectionState`]; the two may
/// disagree until the next poll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Intent {
    #[default]
    Idle,
    Connect,
    Disconnect,
}

/// Something the presentation layer should know about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Rising edge.
    Connected { ip: Option<String> },
    /// Falling edge.
    Disconnected,
    /// An auto-reconnect was queued.
    ReconnectScheduled { attempt: u32, max: u32 },
    /// A queued auto-reconnect is being issued now.
    AutoReconnecting { attempt: u32, max: u32 },
    /// A queued auto-reconnect found the policy no longer allows it.
    ReconnectCancelled { attempt: u32 },
    /// A queued auto-reconnect found the connection already back.
    ReconnectSkipped { attempt: u32 },
    /// The connect queued by a manual reconnect was overtaken by another
    /// explicit action.
    ConnectCancelled,
    /// Budget spent for this disconnection episode.
    ReconnectExhausted { max: u32 },
    /// A service command was issued successfully.
    ActionIssued(ServiceAction),
    /// A service command failed.
    ActionFailed {
        action: ServiceAction,
        error: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Deferred {
    AutoReconnect { attempt: u32 },
    Connect { epoch: u64 },
}

/// Timing and criterion settings for a [`Monitor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    /// Delay between a drop and its auto-reconnect.
    pub reconnect_delay: Duration,
    /// Delay between stop and start in a manual reconnect.
    pub reconnect_after_disconnect: Duration,
    /// Time an issued auto-reconnect gets before the next is queued.
    pub reconnect_settle: Duration,
    pub criterion: ConnectCriterion,
}

impl MonitorSettings {
    pub const fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            reconnect_after_disconnect: Duration::from_secs(
                config.reconnect_after_disconnect_secs,
            ),
            reconnect_settle: Duration::from_secs(config.reconnect_settle_secs),
            criterion: config.connect_criterion,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Connection state plus reconnect policy, driven from one loop.
#[derive(Debug)]
pub struct Monitor {
    state: ConnectionState,
    policy: ReconnectPolicy,
    intent: Intent,
    settings: MonitorSettings,
    last_poll: Option<Instant>,
    /// When the last auto-reconnect was issued, until an edge settles it.
    awaiting: Option<Instant>,
    exhausted_reported: bool,
    /// Bumped by every explicit connect or disconnect.
    epoch: u64,
    hold: Option<ManualHold>,
    /// `manual_disconnect` was adopted from the hold file.
    held_elsewhere: bool,
    tasks: Scheduler<Deferred>,
}

impl Monitor {
    pub fn new(settings: MonitorSettings, policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::default(),
            policy,
            intent: Intent::Idle,
            settings,
            last_poll: None,
            awaiting: None,
            exhausted_reported: false,
            epoch: 0,
            hold: None,
            held_elsewhere: false,
            tasks: Scheduler::new(),
        }
    }

    /// Share explicit disconnects with other processes through `hold`.
    #[must_use]
    pub fn with_hold(mut self, hold: ManualHold) -> Self {
        self.hold = Some(hold);
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            MonitorSettings::from_config(config),
            ReconnectPolicy::new(config.auto_reconnect, config.max_reconnect_attempts),
        )
    }

    pub const fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub const fn intent(&self) -> Intent {
        self.intent
    }

    /// Deferred actions still queued.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Whether an auto-reconnect is queued.
    pub fn reconnect_pending(&self) -> bool {
        self.tasks
            .contains(|t| matches!(t, Deferred::AutoReconnect { .. }))
    }

    /// Time connected so far, if connected.
    pub fn uptime(&self, now: Instant) -> Option<Duration> {
        self.state.since.map(|since| now.saturating_duration_since(since))
    }

    /// Fold one observation into the state and apply the reconnect policy.
    pub fn reconcile(&mut self, obs: &Observation, now: Instant) -> Vec<MonitorEvent> {
        let was_connected = self.state.connected;
        let since = if was_connected {
            self.state.since
        } else {
            Some(now)
        };
        let next = ConnectionState::derive(obs, self.settings.criterion, since);
        let mut events = Vec::new();

        match (was_connected, next.connected) {
            (false, true) => {
                self.policy.on_connected();
                self.awaiting = None;
                self.exhausted_reported = false;
                self.held_elsewhere = false;
                if let Some(hold) = &self.hold {
                    hold.clear();
                }
                crate::log_info!(
                    "MONITOR",
                    "Connected ({})",
                    next.ip.as_deref().unwrap_or("no address")
                );
                events.push(MonitorEvent::Connected {
                    ip: next.ip.clone(),
                });
            }
            (true, false) => {
                crate::log_warning!("MONITOR", "Connection lost");
                events.push(MonitorEvent::Disconnected);
                self.queue_auto_reconnect(now, &mut events);
            }
            (false, false) => {
                if let Some(issued) = self.awaiting {
                    if now.saturating_duration_since(issued) >= self.settings.reconnect_settle
                        && !self.reconnect_pending()
                    {
                        self.awaiting = None;
                        crate::log_debug!("MONITOR", "Reconnect attempt did not come up");
                        self.queue_auto_reconnect(now, &mut events);
                    }
                }
            }
            (true, true) => {}
        }

        self.state = next;
        events
    }

    /// Observe the backend and reconcile.
    pub fn poll(&mut self, backend: &dyn VpnBackend, now: Instant) -> Vec<MonitorEvent> {
        self.last_poll = Some(now);
        self.sync_hold();
        let obs = backend.observe();
        self.reconcile(&obs, now)
    }

    /// Whether a poll is due at `now`.
    pub fn poll_due(&self, now: Instant) -> bool {
        self.last_poll
            .map_or(true, |last| {
                now.saturating_duration_since(last) >= self.settings.poll_interval
            })
    }

    /// Run deferred actions that are due.
    pub fn run_due(&mut self, backend: &dyn VpnBackend, now: Instant) -> Vec<MonitorEvent> {
        let due = self.tasks.take_due(now);
        if due.is_empty() {
            return Vec::new();
        }
        self.sync_hold();

        let mut events = Vec::new();
        for task in due {
            match task {
                Deferred::AutoReconnect { attempt } => {
                    self.fire_auto_reconnect(backend, attempt, now, &mut events);
                }
                Deferred::Connect { epoch } if epoch == self.epoch => {
                    events.extend(self.connect(backend));
                }
                Deferred::Connect { .. } => {
                    crate::log_info!("MONITOR", "Queued connect dropped after a newer request");
                    events.push(MonitorEvent::ConnectCancelled);
                }
            }
        }
        events
    }

    /// One loop iteration: due actions first, then a poll if one is due.
    pub fn tick(&mut self, backend: &dyn VpnBackend, now: Instant) -> Vec<MonitorEvent> {
        let mut events = self.run_due(backend, now);
        if self.poll_due(now) {
            events.extend(self.poll(backend, now));
        }
        events
    }

    /// Explicit connect: clears the manual-disconnect flag and starts the service.
    pub fn connect(&mut self, backend: &dyn VpnBackend) -> Vec<MonitorEvent> {
        self.policy.manual_disconnect = false;
        self.intent = Intent::Connect;
        self.epoch += 1;
        self.held_elsewhere = false;
        if let Some(hold) = &self.hold {
            hold.clear();
        }
        crate::log_info!("MONITOR", "Connect requested");
        let mut events = Vec::new();
        Self::issue(backend, ServiceAction::Start, &mut events);
        events
    }

    /// Explicit disconnect: suppresses auto-reconnect and stops the service.
    pub fn disconnect(&mut self, backend: &dyn VpnBackend) -> Vec<MonitorEvent> {
        self.policy.manual_disconnect = true;
        self.intent = Intent::Disconnect;
        self.awaiting = None;
        self.epoch += 1;
        self.held_elsewhere = false;
        if let Some(hold) = &self.hold {
            hold.set();
        }
        crate::log_info!("MONITOR", "Disconnect requested");
        let mut events = Vec::new();
        Self::issue(backend, ServiceAction::Stop, &mut events);
        events
    }

    /// Stop now and connect again after `reconnect_after_disconnect`.
    ///
    /// Goes through [`Monitor::disconnect`], so the drop it causes spends no
    /// auto-reconnect budget. The queued connect clears the flag when it runs,
    /// unless another connect or disconnect came first.
    pub fn reconnect(&mut self, backend: &dyn VpnBackend, now: Instant) -> Vec<MonitorEvent> {
        let events = self.disconnect(backend);
        self.intent = Intent::Connect;
        self.tasks.schedule(
            now,
            self.settings.reconnect_after_disconnect,
            Deferred::Connect { epoch: self.epoch },
        );
        events
    }

    /// Connect when disconnected, disconnect when connected.
    pub fn toggle(&mut self, backend: &dyn VpnBackend) -> Vec<MonitorEvent> {
        if self.state.connected {
            self.disconnect(backend)
        } else {
            self.connect(backend)
        }
    }

    /// User toggle for auto-reconnect. Enabling starts a fresh budget.
    pub fn set_auto_reconnect(&mut self, enabled: bool) {
        self.policy.set_enabled(enabled);
        if enabled {
            self.exhausted_reported = false;
        }
        crate::log_info!(
            "MONITOR",
            "Auto-reconnect {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// Follow explicit disconnects and connects made by another process.
    fn sync_hold(&mut self) {
        let Some(hold) = &self.hold else {
            return;
        };
        let held = hold.is_set();
        if held && !self.policy.manual_disconnect {
            crate::log_info!("MONITOR", "Manual disconnect recorded elsewhere");
            self.policy.manual_disconnect = true;
            self.held_elsewhere = true;
            self.awaiting = None;
        } else if !held && self.held_elsewhere {
            crate::log_info!("MONITOR", "Manual disconnect released elsewhere");
            self.policy.manual_disconnect = false;
            self.held_elsewhere = false;
        }
    }

    fn queue_auto_reconnect(&mut self, now: Instant, events: &mut Vec<MonitorEvent>) {
        if self.reconnect_pending() {
            return;
        }
        let max = self.policy.max_attempts;
        if let Some(attempt) = self.policy.try_fire() {
            crate::log_info!(
                "MONITOR",
                "Auto-reconnect {attempt}/{max} in {}s",
                self.settings.reconnect_delay.as_secs()
            );
            self.tasks.schedule(
                now,
                self.settings.reconnect_delay,
                Deferred::AutoReconnect { attempt },
            );
            events.push(MonitorEvent::ReconnectScheduled { attempt, max });
        } else if self.policy.is_exhausted() && !self.exhausted_reported {
            self.exhausted_reported = true;
            crate::log_warning!("MONITOR", "Auto-reconnect gave up after {max} attempts");
            events.push(MonitorEvent::ReconnectExhausted { max });
        }
    }

    fn fire_auto_reconnect(
        &mut self,
        backend: &dyn VpnBackend,
        attempt: u32,
        now: Instant,
        events: &mut Vec<MonitorEvent>,
    ) {
        if !self.policy.allows_queued_attempt() {
            crate::log_info!("MONITOR", "Queued auto-reconnect {attempt} dropped");
            events.push(MonitorEvent::ReconnectCancelled { attempt });
            return;
        }
        if self.state.connected {
            crate::log_info!("MONITOR", "Already connected, auto-reconnect {attempt} skipped");
            events.push(MonitorEvent::ReconnectSkipped { attempt });
            return;
        }

        let max = self.policy.max_attempts;
        crate::log_info!("MONITOR", "Auto-reconnecting (attempt {attempt}/{max})");
        events.push(MonitorEvent::AutoReconnecting { attempt, max });
        self.intent = Intent::Connect;
        self.awaiting = Some(now);

        // A service that is up without a usable tunnel needs a restart; start
        // would be a no-op.
        let action = if self.state.service_active {
            ServiceAction::Restart
        } else {
            ServiceAction::Start
        };
        Self::issue(backend, action, events);
    }

    fn issue(backend: &dyn VpnBackend, action: ServiceAction, events: &mut Vec<MonitorEvent>) {
        match backend.control(action) {
            Ok(()) => events.push(MonitorEvent::ActionIssued(action)),
            Err(e) => {
                crate::log_error!("SERVICE", "systemctl {action} failed: {e}");
                events.push(MonitorEvent::ActionFailed {
                    action,
                    error: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakeBackend;
    use crate::state::InterfaceStatus;

    fn monitor() -> Monitor {
        Monitor::new(MonitorSettings::default(), ReconnectPolicy::new(true, 3))
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn connected_obs(ip: &str) -> Observation {
        Observation {
            service_active: true,
            interface: InterfaceStatus::Up {
                ipv4: Some(ip.to_string()),
            },
        }
    }

    fn count_connected(events: &[MonitorEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, MonitorEvent::Connected { .. }))
            .count()
    }

    #[test]
    fn test_failed_queries_are_disconnected() {
        let mut m = monitor();
        let events = m.reconcile(&Observation::default(), Instant::now());
        assert!(events.is_empty());
        assert!(!m.state().connected);
        assert_eq!(m.state().ip, None);
    }

    #[test]
    fn test_connected_fires_once_per_edge() {
        let backend = FakeBackend::connected("10.0.0.5");
        let mut m = monitor();
        let start = Instant::now();

        let first = m.poll(&backend, start);
        assert_eq!(
            first,
            vec![MonitorEvent::Connected {
                ip: Some("10.0.0.5".to_string())
            }]
        );
        assert!(m.state().connected);
        assert_eq!(m.state().ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(m.state().since, Some(start));

        let mut later = Vec::new();
        for i in 1..5 {
            later.extend(m.poll(&backend, start + secs(2 * i)));
        }
        assert_eq!(count_connected(&later), 0);
        assert_eq!(m.state().since, Some(start));
        assert_eq!(m.uptime(start + secs(8)), Some(secs(8)));
    }

    #[test]
    fn test_rising_edge_resets_attempts_and_manual_flag() {
        let mut m = monitor();
        m.policy.attempts = 2;
        m.policy.manual_disconnect = true;

        m.reconcile(&connected_obs("10.0.0.5"), Instant::now());
        assert_eq!(m.policy().attempts, 0);
        assert!(!m.policy().manual_disconnect);
    }

    #[test]
    fn test_falling_edge_schedules_reconnect() {
        let backend = FakeBackend::connected("10.0.0.5");
        let mut m = monitor();
        let start = Instant::now();
        m.poll(&backend, start);

        backend.set_down();
        let events = m.poll(&backend, start + secs(2));
        assert_eq!(
            events,
            vec![
                MonitorEvent::Disconnected,
                MonitorEvent::ReconnectScheduled { attempt: 1, max: 3 },
            ]
        );
        assert_eq!(m.policy().attempts, 1);
        assert!(m.reconnect_pending());

        // Not before the delay.
        assert!(m.run_due(&backend, start + secs(4)).is_empty());
        assert!(backend.actions().is_empty());

        let events = m.run_due(&backend, start + secs(5));
        assert_eq!(
            events,
            vec![
                MonitorEvent::AutoReconnecting { attempt: 1, max: 3 },
                MonitorEvent::ActionIssued(ServiceAction::Start),
            ]
        );
        assert_eq!(backend.actions(), vec![ServiceAction::Start]);
        assert_eq!(m.intent(), Intent::Connect);
    }

    #[test]
    fn test_manual_disconnect_never_auto_reconnects() {
        let backend = FakeBackend::connected("10.0.0.5");
        let mut m = monitor();
        let start = Instant::now();
        m.poll(&backend, start);

        m.disconnect(&backend);
        assert_eq!(m.intent(), Intent::Disconnect);
        backend.set_down();

        let events = m.poll(&backend, start + secs(1));
        assert_eq!(events, vec![MonitorEvent::Disconnected]);
        assert_eq!(m.policy().attempts, 0);
        assert_eq!(m.pending_tasks(), 0);

        // Long after, still nothing.
        let events = m.tick(&backend, start + secs(60));
        assert!(events.is_empty());
        assert_eq!(backend.actions(), vec![ServiceAction::Stop]);
    }

    #[test]
    fn test_manual_disconnect_blocks_even_with_budget_and_enabled() {
        let mut m = monitor();
        let start = Instant::now();
        m.reconcile(&connected_obs("10.0.0.5"), start);
        m.policy.manual_disconnect = true;
        m.policy.enabled = true;
        m.policy.attempts = 0;

        let events = m.reconcile(&Observation::default(), start + secs(2));
        assert!(!events
            .iter()
            .any(|e| matches!(e, MonitorEvent::ReconnectScheduled { .. })));
    }

    #[test]
    fn test_at_most_max_attempts_per_episode() {
        let backend = FakeBackend::connected("10.0.0.5");
        let mut m = monitor();
        let mut now = Instant::now();
        m.tick(&backend, now);

        backend.set_down();
        let mut all = Vec::new();
        for _ in 0..60 {
            now += secs(1);
            all.extend(m.tick(&backend, now));
        }

        let fired = all
            .iter()
            .filter(|e| matches!(e, MonitorEvent::AutoReconnecting { .. }))
            .count();
        assert_eq!(fired, 3);
        assert_eq!(backend.count(ServiceAction::Start), 3);
        let exhausted = all
            .iter()
            .filter(|e| matches!(e, MonitorEvent::ReconnectExhausted { .. }))
            .count();
        assert_eq!(exhausted, 1);
        assert_eq!(m.policy().attempts, 3);
    }

    #[test]
    fn test_successful_reconnect_resets_budget() {
        let backend = FakeBackend::connected("10.0.0.5");
        let mut m = monitor();
        let mut now = Instant::now();
        m.tick(&backend, now);

        backend.set_down();
        for _ in 0..6 {
            now += secs(1);
            m.tick(&backend, now);
        }
        assert_eq!(backend.count(ServiceAction::Start), 1);

        backend.set_connected("10.0.0.7");
        now += secs(2);
        let events = m.tick(&backend, now);
        assert_eq!(count_connected(&events), 1);
        assert_eq!(m.policy().attempts, 0);
        assert_eq!(m.state().ip.as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn test_disabling_cancels_queued_attempt_at_fire_time() {
        let backend = FakeBackend::connected("10.0.0.5");
        let mut m = monitor();
        let start = Instant::now();
        m.poll(&backend, start);
        backend.set_down();
        m.poll(&backend, start + secs(2));
        assert!(m.reconnect_pending());

        m.set_auto_reconnect(false);
        let events = m.run_due(&backend, start + secs(5));
        assert_eq!(events, vec![MonitorEvent::ReconnectCancelled { attempt: 1 }]);
        assert!(backend.actions().is_empty());
    }

    #[test]
    fn test_manual_disconnect_cancels_queued_attempt_at_fire_time() {
        let backend = FakeBackend::connected("10.0.0.5");
        let mut m = monitor();
        let start = Instant::now();
        m.poll(&backend, start);
        backend.set_down();
        m.poll(&backend, start + secs(2));

        m.disconnect(&backend);
        let events = m.run_due(&backend, start + secs(5));
        assert_eq!(events, vec![MonitorEvent::ReconnectCancelled { attempt: 1 }]);
        assert_eq!(backend.actions(), vec![ServiceAction::Stop]);
    }

    #[test]
    fn test_disconnect_overrides_queued_reconnect_connect() {
        let backend = FakeBackend::connected("10.0.0.5");
        let mut m = monitor();
        let start = Instant::now();
        m.poll(&backend, start);

        m.reconnect(&backend, start);
        m.disconnect(&backend);
        backend.set_down();
        m.poll(&backend, start + secs(1));

        let events = m.run_due(&backend, start + secs(2));
        assert_eq!(events, vec![MonitorEvent::ConnectCancelled]);
        assert_eq!(
            backend.actions(),
            vec![ServiceAction::Stop, ServiceAction::Stop]
        );
        assert!(m.policy().manual_disconnect);
        assert_eq!(m.intent(), Intent::Disconnect);
        assert_eq!(m.pending_tasks(), 0);
    }

    #[test]
    fn test_queued_attempt_after_recovery_is_reported() {
        let backend = FakeBackend::connected("10.0.0.5");
        let mut m = monitor();
        let start = Instant::now();
        m.poll(&backend, start);
        backend.set_down();
        m.poll(&backend, start + secs(2));

        // Back on its own before the attempt fires.
        backend.set_connected("10.0.0.5");
        m.poll(&backend, start + secs(4));
        let events = m.run_due(&backend, start + secs(5));
        assert_eq!(events, vec![MonitorEvent::ReconnectSkipped { attempt: 1 }]);
        assert!(backend.actions().is_empty());
    }

    fn hold_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "kvc-monitor-hold-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_disconnect_from_another_process_is_honoured() {
        let dir = hold_dir("disconnect");
        let backend = FakeBackend::connected("10.0.0.5");
        let start = Instant::now();
        let mut watcher = monitor().with_hold(ManualHold::in_dir(&dir));
        watcher.poll(&backend, start);

        // A separate CLI invocation stops the service.
        monitor()
            .with_hold(ManualHold::in_dir(&dir))
            .disconnect(&backend);
        backend.set_down();

        let events = watcher.poll(&backend, start + secs(2));
        assert_eq!(events, vec![MonitorEvent::Disconnected]);
        assert!(watcher.policy().manual_disconnect);
        assert_eq!(watcher.pending_tasks(), 0);
        assert!(watcher.tick(&backend, start + secs(30)).is_empty());
        assert_eq!(backend.actions(), vec![ServiceAction::Stop]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_hold_from_another_process_cancels_queued_attempt() {
        let dir = hold_dir("queued");
        let backend = FakeBackend::connected("10.0.0.5");
        let start = Instant::now();
        let mut watcher = monitor().with_hold(ManualHold::in_dir(&dir));
        watcher.poll(&backend, start);
        backend.set_down();
        watcher.poll(&backend, start + secs(2));
        assert!(watcher.reconnect_pending());

        ManualHold::in_dir(&dir).set();
        let events = watcher.run_due(&backend, start + secs(5));
        assert_eq!(events, vec![MonitorEvent::ReconnectCancelled { attempt: 1 }]);
        assert!(backend.actions().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_connect_from_another_process_releases_hold() {
        let dir = hold_dir("release");
        let hold = ManualHold::in_dir(&dir);
        let backend = FakeBackend::default();
        let start = Instant::now();
        let mut watcher = monitor().with_hold(hold.clone());

        hold.set();
        watcher.poll(&backend, start);
        assert!(watcher.policy().manual_disconnect);

        monitor()
            .with_hold(ManualHold::in_dir(&dir))
            .connect(&backend);
        assert!(!hold.is_set());
        watcher.poll(&backend, start + secs(2));
        assert!(!watcher.policy().manual_disconnect);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_own_disconnect_writes_hold_and_rising_edge_clears_it() {
        let dir = hold_dir("own");
        let hold = ManualHold::in_dir(&dir);
        let backend = FakeBackend::connected("10.0.0.5");
        let start = Instant::now();
        let mut m = monitor().with_hold(hold.clone());
        m.poll(&backend, start);

        m.disconnect(&backend);
        assert!(hold.is_set());

        backend.set_down();
        m.poll(&backend, start + secs(2));
        // Started outside the monitor.
        backend.set_connected("10.0.0.5");
        m.poll(&backend, start + secs(4));
        assert!(!hold.is_set());
        assert!(!m.policy().manual_disconnect);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_reenabling_resets_attempts() {
        let mut m = monitor();
        m.policy.attempts = 3;
        m.set_auto_reconnect(false);
        m.set_auto_reconnect(true);
        assert_eq!(m.policy().attempts, 0);
        assert!(m.policy().enabled);
    }

    #[test]
    fn test_connect_clears_manual_flag() {
        let backend = FakeBackend::default();
        let mut m = monitor();
        m.policy.manual_disconnect = true;

        let events = m.connect(&backend);
        assert_eq!(events, vec![MonitorEvent::ActionIssued(ServiceAction::Start)]);
        assert!(!m.policy().manual_disconnect);
        assert_eq!(m.intent(), Intent::Connect);
        // Actions never touch observed state.
        assert!(!m.state().connected);
    }

    #[test]
    fn test_reconnect_stops_then_connects() {
        let backend = FakeBackend::connected("10.0.0.5");
        let mut m = monitor();
        let start = Instant::now();
        m.poll(&backend, start);

        m.reconnect(&backend, start);
        assert!(m.policy().manual_disconnect);
        assert_eq!(backend.actions(), vec![ServiceAction::Stop]);

        backend.set_down();
        let events = m.poll(&backend, start + secs(1));
        assert_eq!(events, vec![MonitorEvent::Disconnected]);
        assert_eq!(m.policy().attempts, 0);

        m.run_due(&backend, start + secs(2));
        assert_eq!(
            backend.actions(),
            vec![ServiceAction::Stop, ServiceAction::Start]
        );
        assert!(!m.policy().manual_disconnect);
        assert_eq!(m.pending_tasks(), 0);
    }

    #[test]
    fn test_toggle_follows_observed_state() {
        let backend = FakeBackend::default();
        let mut m = monitor();
        m.toggle(&backend);
        assert_eq!(backend.actions(), vec![ServiceAction::Start]);

        m.reconcile(&connected_obs("10.0.0.5"), Instant::now());
        m.toggle(&backend);
        assert_eq!(
            backend.actions(),
            vec![ServiceAction::Start, ServiceAction::Stop]
        );
    }

    #[test]
    fn test_failed_command_is_reported() {
        let backend = FakeBackend::default();
        *backend.fail_control.borrow_mut() = true;
        let mut m = monitor();

        let events = m.connect(&backend);
        assert!(matches!(
            &events[..],
            [MonitorEvent::ActionFailed {
                action: ServiceAction::Start,
                error
            }] if error.contains("password is required")
        ));
    }

    #[test]
    fn test_stuck_service_is_restarted() {
        let mut m = monitor();
        let start = Instant::now();
        m.reconcile(&connected_obs("10.0.0.5"), start);

        // Service stays up but the tunnel loses its address.
        let backend = FakeBackend::default();
        *backend.service_active.borrow_mut() = true;
        *backend.interface.borrow_mut() = InterfaceStatus::Up { ipv4: None };
        m.poll(&backend, start + secs(2));
        assert!(m.state().is_waiting_for_address());

        m.run_due(&backend, start + secs(5));
        assert_eq!(backend.actions(), vec![ServiceAction::Restart]);
    }

    #[test]
    fn test_interface_criterion_accepts_bare_interface() {
        let settings = MonitorSettings {
            criterion: ConnectCriterion::Interface,
            ..MonitorSettings::default()
        };
        let mut m = Monitor::new(settings, ReconnectPolicy::default());
        let obs = Observation {
            service_active: true,
            interface: InterfaceStatus::Up { ipv4: None },
        };
        let events = m.reconcile(&obs, Instant::now());
        assert_eq!(events, vec![MonitorEvent::Connected { ip: None }]);
    }

    #[test]
    fn test_poll_interval() {
        let backend = FakeBackend::default();
        let mut m = monitor();
        let start = Instant::now();
        assert!(m.poll_due(start));
        m.tick(&backend, start);
        assert!(!m.poll_due(start + secs(1)));
        assert!(m.poll_due(start + secs(2)));
    }
}
