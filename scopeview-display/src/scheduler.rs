//! Rate limiting of histogram recomputation.
//!
//! For each channel the scheduler decides whether a render pass should
//! recompute statistics now, defer to a timer, or skip. With a period `p`,
//! a channel updated at `t0` recomputes at most once in `(t0, t0 + p)`;
//! requests inside that window arm a single timer for `t0 + p`, and the
//! timer callback recomputes from the newest image. A forced request
//! bypasses the rate, including manual mode.

use std::collections::HashMap;
use std::time::Instant;

use log::trace;

use scopeview_core::HistogramUpdateRate;

use crate::timer::DebounceTimer;

/// Outcome of [`HistogramScheduler::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    /// Recompute during this pass.
    Now,
    /// A timer will fire at the given instant.
    Deferred(Instant),
    /// Do not recompute.
    Skip,
}

#[derive(Debug, Default, Clone, Copy)]
struct ChannelSchedule {
    last_update: Option<Instant>,
    pending: Option<Instant>,
    forced: bool,
}

/// Per-channel update decisions plus the timer that delivers deferred ones.
#[derive(Debug)]
pub struct HistogramScheduler {
    rate: HistogramUpdateRate,
    channels: HashMap<usize, ChannelSchedule>,
    timer: DebounceTimer,
}

impl HistogramScheduler {
    /// Creates a scheduler whose deferred updates arrive through `timer`.
    #[must_use]
    pub fn new(rate: HistogramUpdateRate, timer: DebounceTimer) -> Self {
        Self {
            rate,
            channels: HashMap::new(),
            timer,
        }
    }

    #[must_use]
    pub fn rate(&self) -> HistogramUpdateRate {
        self.rate
    }

    /// Decides what to do for `channel` at time `now`.
    pub fn request(&mut self, channel: usize, now: Instant) -> UpdateDecision {
        let schedule = self.channels.entry(channel).or_default();
        if std::mem::take(&mut schedule.forced) {
            if schedule.pending.take().is_some() {
                self.timer.cancel(channel);
            }
            return UpdateDecision::Now;
        }

        let decision = match self.rate {
            HistogramUpdateRate::Always => UpdateDecision::Now,
            HistogramUpdateRate::Manual => UpdateDecision::Skip,
            HistogramUpdateRate::Every(period) => match schedule.last_update {
                None => UpdateDecision::Now,
                Some(last) if now.saturating_duration_since(last) >= period => UpdateDecision::Now,
                Some(last) => {
                    if let Some(at) = schedule.pending {
                        UpdateDecision::Deferred(at)
                    } else {
                        let at = last + period;
                        schedule.pending = Some(at);
                        self.timer.schedule(channel, at);
                        trace!("channel {channel}: histogram deferred");
                        UpdateDecision::Deferred(at)
                    }
                }
            },
        };

        if decision == UpdateDecision::Now && schedule.pending.take().is_some() {
            self.timer.cancel(channel);
        }
        decision
    }

    /// Accepts a timer firing for `channel` scheduled for `at`. Returns
    /// whether the caller should recompute. Cancelled firings, and firings
    /// for a deadline other than the one now pending, return `false`.
    pub fn timer_fired(&mut self, channel: usize, at: Instant) -> bool {
        let Some(schedule) = self.channels.get_mut(&channel) else {
            return false;
        };
        if schedule.pending != Some(at) {
            return false;
        }
        schedule.pending = None;
        self.rate != HistogramUpdateRate::Manual
    }

    /// Records that `channel` was recomputed at `now`.
    pub fn mark_updated(&mut self, channel: usize, now: Instant) {
        let schedule = self.channels.entry(channel).or_default();
        schedule.last_update = Some(now);
        if schedule.pending.take().is_some() {
            self.timer.cancel(channel);
        }
    }

    /// Makes the next request for `channel` return [`UpdateDecision::Now`].
    pub fn force_next(&mut self, channel: usize) {
        self.channels.entry(channel).or_default().forced = true;
    }

    /// Forces the next request for every known channel.
    pub fn force_all(&mut self) {
        for schedule in self.channels.values_mut() {
            schedule.forced = true;
        }
    }

    /// Changes the rate; pending timers are dropped and re-armed by the
    /// next request if still needed.
    pub fn set_rate(&mut self, rate: HistogramUpdateRate) {
        if rate == self.rate {
            return;
        }
        self.rate = rate;
        self.cancel_pending();
    }

    /// Forgets `channel` and any pending timer for it.
    pub fn cancel(&mut self, channel: usize) {
        if let Some(schedule) = self.channels.remove(&channel) {
            if schedule.pending.is_some() {
                self.timer.cancel(channel);
            }
        }
    }

    /// Drops every pending timer.
    pub fn cancel_pending(&mut self) {
        for (&channel, schedule) in &mut self.channels {
            if schedule.pending.take().is_some() {
                self.timer.cancel(channel);
            }
        }
    }

    /// Deadline of the timer armed for `channel`.
    #[must_use]
    pub fn pending(&self, channel: usize) -> Option<Instant> {
        self.channels.get(&channel).and_then(|s| s.pending)
    }

    /// Stops the timer thread.
    pub fn shutdown(&mut self) {
        self.cancel_pending();
        self.timer.shutdown();
    }
}
