//! Per-session page traversal.
//!
//! A session is an explicit state machine hosted by the scheduler. Each
//! resumption runs until the session either has to wait for its inter-page
//! delay or reaches a terminal reason. Every session ends with exactly one
//! `session_end` event, after which it emits nothing.

use std::fmt;
use std::rc::Rc;

use clickstream_core::config::{InterPageDist, SessionsConfig};
use clickstream_core::{EventDraft, EventType};

use crate::conversion::ConversionModel;
use crate::deterministic::{Process, ProcessContext, RandomSource, SimulationError, Suspend};
use crate::intents::SessionIntent;
use crate::site_graph::{PageGraph, SiteGraph};
use crate::world::SimWorld;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEndReason {
    DropOff,
    Conversion,
    Timeout,
    NoNextPage,
    MaxSteps,
    /// No more specific reason applies
    Ended,
}

impl SessionEndReason {
    pub const ALL: [SessionEndReason; 6] = [
        SessionEndReason::DropOff,
        SessionEndReason::Conversion,
        SessionEndReason::Timeout,
        SessionEndReason::NoNextPage,
        SessionEndReason::MaxSteps,
        SessionEndReason::Ended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEndReason::DropOff => "drop_off",
            SessionEndReason::Conversion => "conversion",
            SessionEndReason::Timeout => "timeout",
            SessionEndReason::NoNextPage => "no_next_page",
            SessionEndReason::MaxSteps => "max_steps",
            SessionEndReason::Ended => "ended",
        }
    }
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delay between two page views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterPageTime {
    Fixed(f64),
    Exponential { mean: f64 },
}

impl InterPageTime {
    /// Samples a delay in seconds. Fixed delays and non-positive means draw nothing.
    pub fn sample(&self, rng: &mut dyn RandomSource) -> f64 {
        match *self {
            InterPageTime::Fixed(seconds) => seconds.max(0.0),
            InterPageTime::Exponential { mean } if mean <= 0.0 => 0.0,
            InterPageTime::Exponential { mean } => rng.expovariate(1.0 / mean),
        }
    }
}

/// Traversal rules shared by every session of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRules {
    /// Inactivity timeout in seconds; 0 disables it
    pub timeout_s: f64,
    pub max_steps: Option<u32>,
    pub entry_page: String,
    pub inter_page: InterPageTime,
}

impl SessionRules {
    /// # Errors
    ///
    /// - `SimulationError::InvalidModel` - If the timeout or a delay parameter is negative
    pub fn from_config(config: &SessionsConfig) -> Result<Self, SimulationError> {
        let invalid = |reason: String| SimulationError::InvalidModel {
            component: "sessions",
            reason,
        };

        let timeout_s = config.inactivity_timeout_seconds();
        if !timeout_s.is_finite() || timeout_s < 0.0 {
            return Err(invalid(format!("inactivity timeout must be >= 0, got {timeout_s}s")));
        }

        let delay = &config.inter_page_time;
        let inter_page = match delay.dist {
            InterPageDist::Fixed if delay.fixed_seconds < 0.0 => {
                return Err(invalid("fixed_seconds must be >= 0".to_string()));
            }
            InterPageDist::Fixed => InterPageTime::Fixed(delay.fixed_seconds),
            InterPageDist::Exponential => InterPageTime::Exponential {
                mean: delay.mean_seconds,
            },
        };

        Ok(Self {
            timeout_s,
            max_steps: config.max_steps,
            entry_page: config.entry_page.clone(),
            inter_page,
        })
    }
}

/// Per-user parameters captured when a session starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionProfile {
    pub propensity: f64,
    pub dropoff_multiplier: f64,
    pub logit_shift: f64,
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self {
            propensity: 0.0,
            dropoff_multiplier: 1.0,
            logit_shift: 0.0,
        }
    }
}

/// Everything a session needs to know about where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTicket {
    pub user_id: String,
    pub session_id: String,
    pub intent: SessionIntent,
}

impl SessionTicket {
    /// Draft pre-filled with the session's user, id and origin.
    fn draft(&self, event_type: EventType) -> EventDraft {
        EventDraft::new(event_type)
            .user(&self.user_id)
            .session(&self.session_id)
            .origin(&self.intent.intent_source, &self.intent.channel)
    }
}

/// Starts whatever happens after the resolver has a user and a session id.
pub trait SessionRunner {
    /// # Errors
    ///
    /// Any error aborts the run.
    fn start_session(
        &self,
        ctx: &mut ProcessContext<'_, SimWorld>,
        ticket: SessionTicket,
    ) -> Result<(), SimulationError>;
}

/// Walks sessions through the site graph.
#[derive(Debug, Clone)]
pub struct GraphSessionRunner {
    graph: Rc<SiteGraph>,
    rules: Rc<SessionRules>,
    conversion: Option<Rc<ConversionModel>>,
}

impl GraphSessionRunner {
    pub fn new(graph: SiteGraph, rules: SessionRules, conversion: Option<ConversionModel>) -> Self {
        Self {
            graph: Rc::new(graph),
            rules: Rc::new(rules),
            conversion: conversion.map(Rc::new),
        }
    }
}

impl SessionRunner for GraphSessionRunner {
    fn start_session(
        &self,
        ctx: &mut ProcessContext<'_, SimWorld>,
        ticket: SessionTicket,
    ) -> Result<(), SimulationError> {
        let users = &ctx.world.users;
        let user = users
            .get(&ticket.user_id)
            .ok_or_else(|| SimulationError::UnknownUser {
                user_id: ticket.user_id.clone(),
            })?;

        let discovery = user.discovery_mode && users.config().discovery_mode.enabled;
        let profile = SessionProfile {
            propensity: user.propensity,
            dropoff_multiplier: if discovery {
                user.discovery_dropoff_multiplier
            } else {
                1.0
            },
            logit_shift: if discovery {
                user.discovery_conversion_logit_shift
            } else {
                0.0
            },
        };

        let engine = SessionEngine::new(
            ticket,
            profile,
            Rc::clone(&self.graph),
            Rc::clone(&self.rules),
            self.conversion.clone(),
        );
        ctx.spawn(engine)?;
        Ok(())
    }
}

/// Closes every session immediately. Used when no site graph is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSessionRunner;

impl SessionRunner for NoopSessionRunner {
    fn start_session(
        &self,
        ctx: &mut ProcessContext<'_, SimWorld>,
        ticket: SessionTicket,
    ) -> Result<(), SimulationError> {
        end_session(ctx, &ticket, None, 0, SessionEndReason::Ended)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// About to view the current page
    View,
    /// Inter-page delay elapsed; pick the next page
    Transition,
    /// Inactivity timeout elapsed
    TimedOut,
}

/// One session's walk through the site graph.
pub struct SessionEngine {
    name: String,
    ticket: SessionTicket,
    profile: SessionProfile,
    graph: Rc<SiteGraph>,
    rules: Rc<SessionRules>,
    conversion: Option<Rc<ConversionModel>>,
    current: String,
    steps: u32,
    phase: Phase,
}

impl SessionEngine {
    pub fn new(
        ticket: SessionTicket,
        profile: SessionProfile,
        graph: Rc<SiteGraph>,
        rules: Rc<SessionRules>,
        conversion: Option<Rc<ConversionModel>>,
    ) -> Self {
        Self {
            name: format!("session:{}", ticket.session_id),
            current: rules.entry_page.clone(),
            ticket,
            profile,
            graph,
            rules,
            conversion,
            steps: 0,
            phase: Phase::View,
        }
    }

    fn view(&mut self, ctx: &mut ProcessContext<'_, SimWorld>) -> Result<Option<Suspend>, SimulationError> {
        if self.rules.max_steps.is_some_and(|cap| self.steps >= cap) {
            return self.finish(ctx, SessionEndReason::MaxSteps).map(Some);
        }

        let now = ctx.now();
        self.steps += 1;
        ctx.world.emit(
            now,
            self.ticket
                .draft(EventType::PageView)
                .page(&self.current)
                .value_num(f64::from(self.steps)),
        )?;

        let base_dropoff = self.graph.page(&self.current).map_or(0.0, |page| page.dropoff_p);
        let dropoff_p = (base_dropoff * self.profile.dropoff_multiplier).clamp(0.0, 1.0);
        if ctx.world.rng.random() < dropoff_p {
            ctx.world.emit(
                now,
                self.ticket
                    .draft(EventType::DropOff)
                    .page(&self.current)
                    .value_num(dropoff_p),
            )?;
            return self.finish(ctx, SessionEndReason::DropOff).map(Some);
        }

        if let Some(model) = &self.conversion {
            let (converted, p) = model.should_convert(
                self.profile.propensity,
                self.profile.logit_shift,
                &mut *ctx.world.rng,
            );
            if converted {
                ctx.world.emit(
                    now,
                    self.ticket
                        .draft(EventType::Conversion)
                        .page(&self.current)
                        .value_num(p),
                )?;
                return self.finish(ctx, SessionEndReason::Conversion).map(Some);
            }
        }

        let delay = self.rules.inter_page.sample(&mut *ctx.world.rng);
        if self.rules.timeout_s > 0.0 && delay > self.rules.timeout_s {
            self.phase = Phase::TimedOut;
            return Ok(Some(Suspend::After(self.rules.timeout_s)));
        }

        self.phase = Phase::Transition;
        if delay > 0.0 {
            return Ok(Some(Suspend::After(delay)));
        }
        Ok(None)
    }

    fn transition(&mut self, ctx: &mut ProcessContext<'_, SimWorld>) -> Result<Option<Suspend>, SimulationError> {
        let next = self
            .graph
            .next_page(&self.current, &mut *ctx.world.rng)
            .map(str::to_string);
        match next {
            Some(page) => {
                self.current = page;
                self.phase = Phase::View;
                Ok(None)
            }
            None => self.finish(ctx, SessionEndReason::NoNextPage).map(Some),
        }
    }

    fn finish(
        &mut self,
        ctx: &mut ProcessContext<'_, SimWorld>,
        reason: SessionEndReason,
    ) -> Result<Suspend, SimulationError> {
        end_session(ctx, &self.ticket, Some(&self.current), self.steps, reason)?;
        Ok(Suspend::Finished)
    }
}

impl Process<SimWorld> for SessionEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn resume(&mut self, ctx: &mut ProcessContext<'_, SimWorld>) -> Result<Suspend, SimulationError> {
        loop {
            let step = match self.phase {
                Phase::View => self.view(ctx)?,
                Phase::Transition => self.transition(ctx)?,
                Phase::TimedOut => Some(self.finish(ctx, SessionEndReason::Timeout)?),
            };
            if let Some(suspend) = step {
                return Ok(suspend);
            }
        }
    }
}

/// Emits the terminal `session_end` and updates the user's lifecycle.
fn end_session(
    ctx: &mut ProcessContext<'_, SimWorld>,
    ticket: &SessionTicket,
    page: Option<&str>,
    steps: u32,
    reason: SessionEndReason,
) -> Result<(), SimulationError> {
    let now = ctx.now();
    let mut draft = ticket
        .draft(EventType::SessionEnd)
        .value_str(reason.as_str())
        .value_num(f64::from(steps));
    if let Some(page) = page {
        draft = draft.page(page);
    }
    ctx.world.emit(now, draft)?;

    let ts = ctx.world.run.timestamp_at(now);
    ctx.world.users.mark_session_end(&ticket.user_id, ts)?;
    *ctx
        .world
        .stats
        .sessions_ended
        .entry(reason.as_str().to_string())
        .or_default() += 1;

    tracing::debug!(
        session_id = %ticket.session_id,
        user_id = %ticket.user_id,
        reason = %reason,
        steps,
        now,
        "Session ended"
    );
    Ok(())
}
