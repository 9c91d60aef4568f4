use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use serde::{Deserialize, Serialize};

use crate::control::{Liveness, RenderControl, RenderHost, StatKey, SupervisorError};
use crate::poller::{Flow, Poller};

/// Polling intervals and timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub stats_interval: Duration,
    pub framebuffer_interval: Duration,
    /// How long `reset` waits for each poller to stop.
    pub join_timeout: Duration,
    /// Period of the wait loop on the calling thread.
    pub wait_tick: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(1),
            framebuffer_interval: Duration::from_secs(10),
            join_timeout: Duration::from_secs(2),
            wait_tick: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Started,
    Stopping,
}

/// Why a render ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    FilmReady,
    Terminated,
    EnoughSamples,
    UserBreak,
    /// The renderer stopped abnormally.
    Crashed(Option<i32>),
}

impl TerminationReason {
    pub fn is_crash(&self) -> bool {
        matches!(self, Self::Crashed(_))
    }
}

/// Check the renderer's termination flags and the host's stop request.
///
/// An abnormal exit is reported ahead of the flags so that a crash is never
/// mistaken for a completed render.
pub fn check_termination(
    control: &dyn RenderControl,
    host: &dyn RenderHost,
) -> Option<TerminationReason> {
    if let Liveness::Crashed(code) = control.liveness() {
        return Some(TerminationReason::Crashed(code));
    }
    if control.statistic(StatKey::FilmIsReady) > 0.0 {
        Some(TerminationReason::FilmReady)
    } else if control.statistic(StatKey::Terminated) > 0.0 {
        Some(TerminationReason::Terminated)
    } else if control.statistic(StatKey::EnoughSamples) > 0.0 {
        Some(TerminationReason::EnoughSamples)
    } else if host.test_break() {
        Some(TerminationReason::UserBreak)
    } else {
        None
    }
}

/// One-line render status, e.g. `00:01:05 - 12.50 S/p - 84000 S/s - 1920x1080`.
pub fn format_status(control: &dyn RenderControl) -> String {
    let secs = control.statistic(StatKey::SecElapsed).max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02} - {:.2} S/p - {:.0} S/s - {}x{}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        control.statistic(StatKey::SamplesPx),
        control.statistic(StatKey::SamplesSec),
        control.statistic(StatKey::FilmXres) as u32,
        control.statistic(StatKey::FilmYres) as u32,
    )
}

/// Drives a running render: statistics and framebuffer pollers, completion
/// detection and ordered teardown.
///
/// Teardown always stops both pollers before the renderer handle is
/// released. Dropping the supervisor performs the same teardown.
pub struct RenderSupervisor {
    config: SupervisorConfig,
    state: SupervisorState,
    stats: Option<Poller>,
    framebuffer: Option<Poller>,
    events_tx: Sender<TerminationReason>,
    events_rx: Receiver<TerminationReason>,
    status: Arc<Mutex<String>>,
    host: Arc<dyn RenderHost>,
    control: Option<Arc<dyn RenderControl>>,
    outcome: Option<TerminationReason>,
}

impl RenderSupervisor {
    pub fn new(
        control: Arc<dyn RenderControl>,
        host: Arc<dyn RenderHost>,
        config: SupervisorConfig,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            config,
            state: SupervisorState::Idle,
            stats: None,
            framebuffer: None,
            events_tx,
            events_rx,
            status: Arc::new(Mutex::new(String::new())),
            host,
            control: Some(control),
            outcome: None,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Last status line produced by the statistics poller.
    pub fn status(&self) -> String {
        self.status.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn outcome(&self) -> Option<TerminationReason> {
        self.outcome
    }

    /// Start rendering and both pollers. Calling it again while started only
    /// logs a warning.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        if self.state != SupervisorState::Idle {
            tracing::warn!(state = ?self.state, "render supervisor already started");
            return Ok(());
        }
        let control = self.control.clone().ok_or(SupervisorError::Released)?;
        control.world_end()?;

        let stats = {
            let control = Arc::clone(&control);
            let host = Arc::clone(&self.host);
            let status = Arc::clone(&self.status);
            let events = self.events_tx.clone();
            Poller::spawn("luxport-stats", self.config.stats_interval, move || {
                let line = format_status(control.as_ref());
                host.update_status(&line);
                if let Ok(mut slot) = status.lock() {
                    *slot = line;
                }
                match check_termination(control.as_ref(), host.as_ref()) {
                    Some(reason) => {
                        let _ = events.send(reason);
                        Flow::Stop
                    }
                    None => Flow::Continue,
                }
            })?
        };
        let framebuffer = {
            let control = Arc::clone(&control);
            let host = Arc::clone(&self.host);
            Poller::spawn("luxport-framebuffer", self.config.framebuffer_interval, move || {
                match control.framebuffer() {
                    Ok(fb) => host.refresh_image(&fb),
                    Err(e) => tracing::debug!(error = %e, "framebuffer not ready"),
                }
                Flow::Continue
            })
        };
        let framebuffer = match framebuffer {
            Ok(poller) => poller,
            Err(e) => {
                let mut stats = stats;
                stats.stop(self.config.join_timeout);
                return Err(e);
            }
        };

        self.stats = Some(stats);
        self.framebuffer = Some(framebuffer);
        self.state = SupervisorState::Started;
        tracing::info!("render started");
        Ok(())
    }

    /// Block until the render ends, then tear down. Returns why it ended, or
    /// the previous outcome when the render is not running.
    pub fn wait(&mut self) -> Option<TerminationReason> {
        if self.state != SupervisorState::Started {
            return self.outcome;
        }
        let reason = loop {
            match self.events_rx.recv_timeout(self.config.wait_tick) {
                Ok(reason) => break reason,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(reason) = self.poller_lost() {
                        break reason;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break TerminationReason::Terminated,
            }
        };
        match reason {
            TerminationReason::Crashed(code) => {
                tracing::error!(?code, "renderer crashed");
            }
            reason => tracing::info!(?reason, status = %self.status(), "render finished"),
        }
        self.outcome = Some(reason);
        self.reset();
        Some(reason)
    }

    /// Termination reason when the statistics poller has exited without
    /// reporting one, checked here on the calling thread instead.
    fn poller_lost(&self) -> Option<TerminationReason> {
        if !self.stats.as_ref().is_none_or(|p| p.is_finished()) {
            return None;
        }
        if let Ok(reason) = self.events_rx.try_recv() {
            return Some(reason);
        }
        tracing::warn!("statistics poller stopped without a result");
        let reason = self
            .control
            .as_deref()
            .and_then(|control| check_termination(control, self.host.as_ref()));
        Some(reason.unwrap_or(TerminationReason::Terminated))
    }

    /// Stop both pollers, pull the framebuffer one last time, then exit, wait
    /// for and release the renderer.
    pub fn reset(&mut self) {
        let Some(control) = self.control.take() else {
            return;
        };
        let was_started = self.state == SupervisorState::Started;
        self.state = SupervisorState::Stopping;

        for poller in [self.stats.take(), self.framebuffer.take()]
            .into_iter()
            .flatten()
        {
            let mut poller = poller;
            poller.stop(self.config.join_timeout);
        }

        if was_started {
            match control.framebuffer() {
                Ok(fb) => self.host.refresh_image(&fb),
                Err(e) => tracing::debug!(error = %e, "no final framebuffer"),
            }
        }
        control.exit();
        control.wait();
        control.cleanup();

        self.state = SupervisorState::Idle;
        tracing::debug!("render supervisor reset");
    }
}

impl Drop for RenderSupervisor {
    fn drop(&mut self) {
        self.reset();
    }
}
