//! Turns queued intents into sessions.

use clickstream_core::{EventDraft, EventType};

use crate::deterministic::{Process, ProcessContext, SimulationError, Suspend};
use crate::intents::{INTENTS_AVAILABLE, SPACE_AVAILABLE, SessionIntent};
use crate::sessions::{SessionRunner, SessionTicket};
use crate::world::SimWorld;

/// Consumer process draining the intent queue.
///
/// Each resumption handles at most one intent. When disabled the resolver
/// still drains the queue so producers never stall, but emits nothing.
pub struct IntentResolver {
    enabled: bool,
    runner: Box<dyn SessionRunner>,
}

impl IntentResolver {
    pub fn new(enabled: bool, runner: Box<dyn SessionRunner>) -> Self {
        Self { enabled, runner }
    }

    fn resolve(
        &self,
        ctx: &mut ProcessContext<'_, SimWorld>,
        intent: SessionIntent,
    ) -> Result<(), SimulationError> {
        let now = ctx.now();
        let world = &mut *ctx.world;
        world.emit(now, intent_draft(EventType::SessionIntent, &intent))?;

        let ts = world.run.timestamp_at(now);
        let (user, created) = world.users.get_or_create_for_intent(ts, &mut *world.rng);
        let user_id = user.user_id.clone();
        if created {
            world.emit(
                now,
                intent_draft(EventType::UserCreated, &intent).user(&user_id),
            )?;
        }

        let session_id = world.ids.next_id("session");
        world.emit(
            now,
            intent_draft(EventType::SessionStart, &intent)
                .user(&user_id)
                .session(&session_id),
        )?;
        world.stats.intents_resolved += 1;
        world.stats.sessions_started += 1;

        tracing::debug!(
            intent_id = %intent.intent_id,
            %user_id,
            %session_id,
            new_user = created,
            now,
            "Resolved intent"
        );

        self.runner.start_session(
            ctx,
            SessionTicket {
                user_id,
                session_id,
                intent,
            },
        )
    }
}

/// Draft carrying the intent's origin, payload and identifiers.
fn intent_draft(event_type: EventType, intent: &SessionIntent) -> EventDraft {
    let draft = EventDraft::new(event_type)
        .origin(&intent.intent_source, &intent.channel)
        .with_payload(&intent.payload)
        .with("intent_id", intent.intent_id.as_str());
    match &intent.audience_id {
        Some(audience_id) => draft.with("audience_id", audience_id.as_str()),
        None => draft,
    }
}

impl Process<SimWorld> for IntentResolver {
    fn name(&self) -> &str {
        "intent_resolver"
    }

    fn resume(&mut self, ctx: &mut ProcessContext<'_, SimWorld>) -> Result<Suspend, SimulationError> {
        let Some(intent) = ctx.world.intents.try_take() else {
            return Ok(Suspend::Wait(INTENTS_AVAILABLE));
        };
        if ctx.world.intents.is_bounded() {
            ctx.notify(SPACE_AVAILABLE)?;
        }

        if self.enabled {
            self.resolve(ctx, intent)?;
        } else {
            ctx.world.stats.intents_discarded += 1;
            tracing::debug!(
                intent_id = %intent.intent_id,
                discarded = ctx.world.stats.intents_discarded,
                "Resolver disabled, discarding intent"
            );
        }
        Ok(Suspend::After(0.0))
    }
}
