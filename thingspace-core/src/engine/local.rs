//! The engine: a Space, its domain logic and its subscribers on one thread.

use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

use super::config::{EngineConfig, EngineError};
use super::outbox::{Outbox, Queued};
use super::remote::{RemoteSource, SyncPending};
use crate::model::{Action, ParseError, RemotePriority, Thing, ThingKey};
use crate::pending::{PendingResult, PriorityPool, Publisher, ThreadPools, ThreadPublisher, Work};
use crate::reactive::{Changes, Retainer, Subscribers, Subscription};
use crate::result::{Builder, Cause, ItemResult, Phase, Status, SyncException, SyncResult};
use crate::space::{resolve_all, Diff, Holder, Selector, Space, SpaceError};
use crate::spec::{Applied, Reactions, Spec};

type ThingOf<S> = <S as Spec>::Thing;
type ActionOf<S> = <S as Spec>::Action;
type Remote<S> = Arc<dyn RemoteSource<ThingOf<S>, ActionOf<S>>>;

/// Remote calls someone is waiting on.
const SEND_NOW: i32 = 1;
/// Outbox flushes.
const SEND_QUEUED: i32 = 0;

/// An offline-first source over a [`Spec`].
///
/// Cloning is cheap; clones share the same Space.
///
/// Never block on a result returned by the engine from inside a subscriber
/// callback or a remote continuation: those run on the Space thread, which
/// is the thread that would resolve it.
pub struct Engine<S: Spec> {
    inner: Arc<Inner<S>>,
}

impl<S: Spec> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S: Spec> {
    spec: S,
    config: EngineConfig,
    space: Arc<Mutex<Space<ThingOf<S>>>>,
    outbox: Mutex<Outbox<ActionOf<S>>>,
    publisher: Arc<ThreadPublisher>,
    subscribers: Subscribers<ThingOf<S>>,
    remote: Option<Remote<S>>,
    dispatch: Option<Arc<dyn PriorityPool>>,
}

/// Retains subscribed identities on behalf of [`Subscribers`].
struct SpaceRetainer<T> {
    space: Weak<Mutex<Space<T>>>,
}

impl<T: Thing> Retainer for SpaceRetainer<T> {
    fn remember(&self, holder: &Holder, key: &ThingKey) {
        if let Some(space) = self.space.upgrade() {
            space.lock().remember_keys(holder, [key.clone()]);
        }
    }

    fn forget(&self, holder: &Holder, key: &ThingKey) {
        if let Some(space) = self.space.upgrade() {
            space.lock().forget_keys(holder, [key.clone()]);
        }
    }
}

impl<S: Spec> Engine<S> {
    /// Start an engine, optionally backed by `remote`.
    ///
    /// Remote calls are made from the Space thread; continuations always
    /// come back to it.
    pub fn new(spec: S, config: EngineConfig, remote: Option<Remote<S>>) -> Result<Self, EngineError> {
        Self::start(spec, config, remote, None)
    }

    /// Like [`new`](Self::new), but remote calls are made from a priority
    /// pool taken from `pools`, so a slow transport never holds up the
    /// Space thread. Sends someone is waiting on go before outbox flushes.
    pub fn with_pools(
        spec: S,
        config: EngineConfig,
        remote: Option<Remote<S>>,
        pools: &dyn ThreadPools,
    ) -> Result<Self, EngineError> {
        let dispatch = pools.prioritized(&format!("{}-send", config.thread_name), 1)?;
        Self::start(spec, config, remote, Some(dispatch))
    }

    fn start(
        spec: S,
        config: EngineConfig,
        remote: Option<Remote<S>>,
        dispatch: Option<Arc<dyn PriorityPool>>,
    ) -> Result<Self, EngineError> {
        let publisher = Arc::new(ThreadPublisher::new(config.thread_name.clone())?);
        let space = Arc::new(Mutex::new(Space::new(config.space.clone())));
        let retainer: Arc<dyn Retainer> = Arc::new(SpaceRetainer {
            space: Arc::downgrade(&space),
        });
        let subscribers = Subscribers::new(Arc::clone(&publisher) as Arc<dyn Publisher>, Some(retainer));

        debug!(
            thread = %config.thread_name,
            remote = remote.is_some(),
            pooled = dispatch.is_some(),
            "engine started"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                spec,
                outbox: Mutex::new(Outbox::new(config.retry_limit)),
                config,
                space,
                publisher,
                subscribers,
                remote,
                dispatch,
            }),
        })
    }

    /// An engine with no remote. `Remote` actions fail at setup.
    pub fn local(spec: S, config: EngineConfig) -> Result<Self, EngineError> {
        Self::new(spec, config, None)
    }

    pub fn spec(&self) -> &S {
        &self.inner.spec
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn subscribers(&self) -> &Subscribers<ThingOf<S>> {
        &self.inner.subscribers
    }

    /// Apply `actions`, then read `thing`.
    ///
    /// Actions apply in order on the Space thread. The Thing is read
    /// locally first (stored, then resolved, then derived) and from the
    /// remote only when that fails. Any failed action fails the sync in
    /// [`Phase::Actions`] and skips the read.
    pub fn sync(
        &self,
        thing: Option<ThingOf<S>>,
        actions: Vec<ActionOf<S>>,
    ) -> SyncPending<ThingOf<S>, ActionOf<S>> {
        let pending = PendingResult::new();
        let inner = Arc::clone(&self.inner);
        let outcome = pending.clone();
        self.inner
            .publisher
            .publish(Box::new(move || inner.transact(thing, actions, outcome)));
        pending
    }

    /// Imprint `thing` and settle derived state.
    pub fn imprint(&self, thing: ThingOf<S>) -> PendingResult<Diff<ThingOf<S>>, SpaceError> {
        let pending = PendingResult::new();
        let inner = Arc::clone(&self.inner);
        let outcome = pending.clone();
        self.inner.publisher.publish(Box::new(move || {
            let imprinted = {
                let mut space = inner.space.lock();
                space.imprint(&thing).map(|_| inner.settle(&mut space))
            };
            match imprinted {
                Ok(diff) => {
                    inner.subscribers.publish(&diff);
                    inner.trim();
                    outcome.success(diff);
                }
                Err(err) => {
                    outcome.fail(err);
                }
            }
        }));
        pending
    }

    /// Send queued actions to the remote.
    ///
    /// Resolves with the remote's result. Without a remote the queue is
    /// left as is and the flush fails at setup.
    pub fn flush(&self) -> SyncPending<ThingOf<S>, ActionOf<S>> {
        let pending = PendingResult::new();
        let inner = Arc::clone(&self.inner);
        let outcome = pending.clone();
        self.inner.publisher.publish(Box::new(move || {
            let batch = inner.outbox.lock().drain();
            let Some(remote) = inner.remote.clone() else {
                let actions = batch.iter().map(|queued| queued.action.clone()).collect();
                inner.outbox.lock().restore(batch);
                let result = SyncResult::builder(None, actions).build(Status::NotAttempted);
                outcome.fail(SyncException::new(result, Phase::Setup).with_message("no remote source"));
                return;
            };
            if batch.is_empty() {
                outcome.success(SyncResult::builder(None, Vec::new()).build(Status::NotAttempted));
                return;
            }
            debug!(actions = batch.len(), "flushing outbox");
            inner.send(remote, batch, outcome, SEND_QUEUED);
        }));
        pending
    }

    /// Actions waiting for [`flush`](Self::flush).
    pub fn outbox_len(&self) -> usize {
        self.inner.outbox.lock().len()
    }

    /// Follow `changes`. See [`Subscribers::add`].
    pub fn subscribe<F>(&self, changes: Changes<ThingOf<S>>, retain: bool, on_update: F) -> Subscription
    where
        F: Fn(&ThingOf<S>) + Send + Sync + 'static,
    {
        self.inner.subscribers.add(changes, retain, on_update)
    }

    /// Retain `keys` under `holder`.
    pub fn remember(&self, holder: &Holder, keys: impl IntoIterator<Item = ThingKey>) {
        let holder = holder.clone();
        let keys: Vec<ThingKey> = keys.into_iter().collect();
        let inner = Arc::clone(&self.inner);
        self.inner
            .publisher
            .publish(Box::new(move || inner.space.lock().remember_keys(&holder, keys)));
    }

    /// Release `keys` from `holder`, evicting what is no longer needed.
    pub fn forget(&self, holder: &Holder, keys: impl IntoIterator<Item = ThingKey>) {
        let holder = holder.clone();
        let keys: Vec<ThingKey> = keys.into_iter().collect();
        let inner = Arc::clone(&self.inner);
        self.inner
            .publisher
            .publish(Box::new(move || inner.space.lock().forget_keys(&holder, keys)));
    }

    /// Resolves once everything published before it has run.
    pub fn barrier(&self) -> PendingResult<(), ()> {
        let pending = PendingResult::new();
        let outcome = pending.clone();
        self.inner.publisher.publish(Box::new(move || {
            outcome.success(());
        }));
        pending
    }

    /// Run `f` against the current Space.
    pub fn read<R>(&self, f: impl FnOnce(&Space<ThingOf<S>>) -> R) -> R {
        f(&self.inner.space.lock())
    }

    pub fn get(&self, key: &ThingKey) -> Option<ThingOf<S>> {
        self.inner.space.lock().get(key).cloned()
    }

    /// Parse an Action with the engine's JSON config.
    pub fn parse_action(&self, json: &str) -> Result<ActionOf<S>, ParseError> {
        self.inner.spec.actions().parse_str(json, &self.inner.config.json)
    }

    /// Parse a Thing with the engine's JSON config.
    pub fn parse_thing(&self, json: &str) -> Result<ThingOf<S>, ParseError> {
        self.inner.spec.things().parse_str(json, &self.inner.config.json)
    }

    /// Serialize a Thing with the engine's JSON config.
    pub fn thing_json(&self, thing: &ThingOf<S>) -> serde_json::Value {
        self.inner.spec.things().to_json(thing, &self.inner.config.json)
    }
}

impl<S: Spec> Inner<S> {
    fn transact(
        self: &Arc<Self>,
        thing: Option<ThingOf<S>>,
        actions: Vec<ActionOf<S>>,
        pending: SyncPending<ThingOf<S>, ActionOf<S>>,
    ) {
        if pending.is_abandoned() {
            debug!("sync abandoned before it started");
            return;
        }
        debug!(actions = actions.len(), thing = thing.is_some(), "sync");
        let mut builder = SyncResult::builder(thing.clone(), actions.clone());

        let forwarded: Vec<usize> = actions
            .iter()
            .enumerate()
            .filter(|(_, action)| action.priority() == RemotePriority::Remote)
            .map(|(index, _)| index)
            .collect();
        if !forwarded.is_empty() && self.remote.is_none() {
            let result = builder.build(Status::NotAttempted);
            pending.fail(
                SyncException::new(result, Phase::Setup)
                    .with_message("remote-only actions need a remote source"),
            );
            return;
        }

        let mut background = Vec::new();
        let (diff, local) = {
            let mut space = self.space.lock();
            for (index, action) in actions.iter().enumerate() {
                let priority = action.priority();
                if !priority.applies_locally() {
                    continue;
                }
                match self.spec.apply(action, &mut space, self.remote.as_deref()) {
                    Ok(applied) => {
                        builder.action(index, applied.status());
                        if applied != Applied::Done {
                            continue;
                        }
                        // Credentials go out now or not at all.
                        if priority.is_sent() || (priority.is_queued() && action.has_credentials()) {
                            background.push(Queued::new(action.clone()));
                        } else if priority.is_queued() {
                            self.outbox.lock().push(action.clone());
                        }
                    }
                    Err(err) => {
                        warn!(action = action.name(), error = %err, "action failed");
                        let status = err.status();
                        builder.action_with(index, ItemResult::new(status).with_cause(Arc::new(err)));
                    }
                }
            }

            let local = match &thing {
                Some(thing) if forwarded.is_empty() && !builder.has_action_failures() => {
                    self.read_local(thing, &mut space)
                }
                _ => None,
            };
            (self.settle(&mut space), local)
        };
        self.subscribers.publish(&diff);
        self.trim();

        if !background.is_empty() {
            match self.remote.clone() {
                Some(remote) => self.send(remote, background, PendingResult::new(), SEND_NOW),
                None => {
                    let mut outbox = self.outbox.lock();
                    for queued in background {
                        outbox.push(queued.action);
                    }
                }
            }
        }

        if builder.has_action_failures() {
            return complete(builder, &pending);
        }
        if let Some(found) = local {
            builder.result(found).thing(Status::Success);
            return complete(builder, &pending);
        }
        match (thing.is_some(), self.remote.clone()) {
            (false, _) if forwarded.is_empty() => complete(builder, &pending),
            (true, None) => {
                builder.thing_with(
                    ItemResult::new(Status::Failed).with_message("not available locally"),
                );
                complete(builder, &pending)
            }
            (_, Some(remote)) => self.forward(remote, builder, forwarded, thing, pending),
            // Remote actions without a remote were rejected at setup.
            (false, None) => complete(builder, &pending),
        }
    }

    /// The stored, resolved or derived version of `thing`.
    fn read_local(&self, thing: &ThingOf<S>, space: &mut Space<ThingOf<S>>) -> Option<ThingOf<S>> {
        let resolved = resolve_all(self.spec.resolver(), thing, &*space);
        if let Some(stored) = space.select_thing(&resolved) {
            return Some(stored.clone());
        }
        let derived = self.spec.derive().derive(&resolved, &*space)?;
        match space.imprint(&derived) {
            Ok(_) => derived.key().and_then(|key| space.get(&key).cloned()),
            Err(err) => {
                warn!(error = %err, "derived thing cannot be imprinted");
                None
            }
        }
    }

    /// Send the actions at `indexes`, and the Thing if one is requested, to
    /// the remote. Continues on the Space thread.
    fn forward(
        self: &Arc<Self>,
        remote: Remote<S>,
        builder: Builder<ThingOf<S>, ActionOf<S>>,
        indexes: Vec<usize>,
        thing: Option<ThingOf<S>>,
        pending: SyncPending<ThingOf<S>, ActionOf<S>>,
    ) {
        let batch: Vec<ActionOf<S>> = indexes
            .iter()
            .filter_map(|&index| builder.actions().get(index).cloned())
            .collect();
        trace!(actions = batch.len(), thing = thing.is_some(), "forwarding to remote");

        let inner = Arc::clone(self);
        self.dispatch(
            SEND_NOW,
            Box::new(move || {
                let call = remote.sync(thing, batch);
                pending.proxy(&call);
                let space_thread = Arc::clone(&inner.publisher) as Arc<dyn Publisher>;
                call.publisher(space_thread)
                    .on_result(move |outcome| inner.finish(builder, indexes, outcome, pending));
            }),
        );
    }

    fn finish(
        &self,
        mut builder: Builder<ThingOf<S>, ActionOf<S>>,
        indexes: Vec<usize>,
        outcome: Result<SyncResult<ThingOf<S>, ActionOf<S>>, SyncException<ThingOf<S>, ActionOf<S>>>,
        pending: SyncPending<ThingOf<S>, ActionOf<S>>,
    ) {
        let (remote, failure) = match outcome {
            Ok(result) => (result, None),
            Err(exception) if exception.phase() == Phase::Setup => {
                warn!("remote sync could not start");
                return fail_setup(builder, &indexes, exception, &pending);
            }
            Err(exception) => {
                warn!(phase = %exception.phase(), "remote sync failed");
                let cause: Cause = Arc::new(exception.clone());
                (exception.into_result(), Some(cause))
            }
        };

        for (position, &index) in indexes.iter().enumerate() {
            let reported = remote
                .actions()
                .get(position)
                .map(|(_, item)| item.clone())
                .filter(|item| item.status != Status::NotAttempted);
            let item = match (reported, &failure) {
                (Some(item), _) => item,
                (None, Some(cause)) => ItemResult::new(Status::Failed).with_cause(Arc::clone(cause)),
                (None, None) => ItemResult::new(Status::NotAttempted),
            };
            builder.action_with(index, item);
        }

        if builder.requested().is_some() && !builder.has_action_failures() {
            let diff = {
                let mut space = self.space.lock();
                self.absorb_thing(&mut builder, &remote, failure.as_ref(), &mut space);
                self.settle(&mut space)
            };
            self.subscribers.publish(&diff);
            self.trim();
        }
        complete(builder, &pending);
    }

    /// Imprint the Thing the remote returned and record its outcome.
    fn absorb_thing(
        &self,
        builder: &mut Builder<ThingOf<S>, ActionOf<S>>,
        remote: &SyncResult<ThingOf<S>, ActionOf<S>>,
        failure: Option<&Cause>,
        space: &mut Space<ThingOf<S>>,
    ) {
        let Some(value) = remote.result() else {
            let requested = builder.requested().cloned();
            match requested.and_then(|thing| self.read_local(&thing, space)) {
                Some(found) => {
                    builder.result(found).thing(Status::Success);
                }
                None => {
                    let mut item = ItemResult::new(match remote.thing_status() {
                        Status::FailedDiscard => Status::FailedDiscard,
                        _ => Status::Failed,
                    });
                    if let Some(cause) = failure.or(remote.thing_result().cause.as_ref()) {
                        item = item.with_cause(Arc::clone(cause));
                    }
                    builder.thing_with(item);
                }
            }
            return;
        };

        let resolver = self.spec.resolver();
        let resolved = resolve_all(resolver, value, &*space);
        let status = match remote.thing_status() {
            Status::NotAttempted => Status::Success,
            status => status,
        };
        // Only what the remote vouches for overwrites local fields.
        let imprintable = if status == Status::Success { resolved } else { resolver.reduce(&resolved) };
        let Some(key) = imprintable.key() else {
            builder.thing_with(
                ItemResult::new(Status::Failed).with_message("remote thing could not be resolved"),
            );
            return;
        };
        match space.imprint(&imprintable) {
            Ok(_) => {
                if let Some(stored) = space.get(&key) {
                    builder.result(stored.clone());
                }
                builder.thing_with(ItemResult {
                    status,
                    ..remote.thing_result().clone()
                });
            }
            Err(err) => {
                builder.thing_with(ItemResult::new(Status::Failed).with_cause(Arc::new(err)));
            }
        }
    }

    /// Send a background batch, requeueing what may be retried, then
    /// relay the remote's outcome to `relay`.
    fn send(
        self: &Arc<Self>,
        remote: Remote<S>,
        batch: Vec<Queued<ActionOf<S>>>,
        relay: SyncPending<ThingOf<S>, ActionOf<S>>,
        priority: i32,
    ) {
        let inner = Arc::clone(self);
        self.dispatch(priority, Box::new(move || inner.send_now(remote, batch, relay)));
    }

    fn send_now(
        self: Arc<Self>,
        remote: Remote<S>,
        batch: Vec<Queued<ActionOf<S>>>,
        relay: SyncPending<ThingOf<S>, ActionOf<S>>,
    ) {
        let actions = batch.iter().map(|queued| queued.action.clone()).collect();
        let call = remote.sync(None, actions);
        relay.proxy(&call);
        let inner = Arc::clone(&self);
        call.publisher(Arc::clone(&self.publisher) as Arc<dyn Publisher>)
            .on_result(move |outcome| {
                let requeued = match &outcome {
                    Ok(result) => inner.outbox.lock().settle(batch, result, false),
                    Err(exception) => inner.outbox.lock().settle(batch, exception.result(), true),
                };
                if requeued > 0 {
                    debug!(requeued, "actions back in the outbox");
                }
                match outcome {
                    Ok(result) => relay.success(result),
                    Err(exception) => relay.fail(exception),
                };
            });
    }

    /// Rederive until nothing changes, returning everything that changed
    /// since the last settle.
    fn settle(&self, space: &mut Space<ThingOf<S>>) -> Diff<ThingOf<S>> {
        let derive = self.spec.derive();
        let mut total = space.take_changes();
        let mut latest = total.clone();
        let mut flagged = Reactions::new();
        let mut passes = 0;

        while !latest.is_empty() {
            if passes == self.config.max_rederive_passes {
                warn!(passes, pending = latest.len(), "derived state did not settle");
                break;
            }
            passes += 1;

            let mut fresh = Reactions::new();
            derive.reactions(&latest, &mut fresh);
            flagged.absorb(fresh.clone());
            if flagged.is_empty() {
                break;
            }
            // Newly flagged Things, plus Things that just changed under an
            // earlier flag.
            let targets: Vec<_> = space
                .things()
                .filter(|thing| {
                    fresh.fields_for(*thing).is_some()
                        || thing.key().is_some_and(|key| latest.contains(&key))
                })
                .filter_map(|thing| flagged.fields_for(thing).map(|fields| (thing.clone(), fields)))
                .collect();
            for (thing, fields) in targets {
                let Some(updated) = derive.rederive(&thing, &fields, &latest, &*space) else {
                    continue;
                };
                if let Err(err) = space.imprint(&updated) {
                    warn!(error = %err, "rederived thing cannot be imprinted");
                }
            }
            latest = space.take_changes();
            total.absorb(latest.clone());
        }

        trace!(passes, changed = total.len(), "settled");
        total
    }

    /// Evict unretained Things beyond the Space's capacity.
    fn trim(&self) {
        let evicted = self.space.lock().trim();
        if !evicted.is_empty() {
            trace!(evicted = evicted.len(), "trimmed");
        }
    }

    fn dispatch(&self, priority: i32, work: Work) {
        match &self.dispatch {
            Some(pool) => pool.submit(priority, work),
            None => work(),
        }
    }
}

/// Fail a sync whose remote half never started. Forwarded items keep the
/// remote's untouched statuses, with its exception as their cause.
fn fail_setup<T: Thing, A: Action>(
    mut builder: Builder<T, A>,
    indexes: &[usize],
    exception: SyncException<T, A>,
    pending: &SyncPending<T, A>,
) {
    let cause: Cause = Arc::new(exception.clone());
    let remote = exception.into_result();
    for (position, &index) in indexes.iter().enumerate() {
        let status = remote.action_status(position).unwrap_or(Status::NotAttempted);
        builder.action_with(index, ItemResult::new(status).with_cause(Arc::clone(&cause)));
    }
    if builder.requested().is_some() {
        builder.thing_with(ItemResult::new(Status::NotAttempted).with_cause(Arc::clone(&cause)));
    }
    let result = builder.build(Status::NotAttempted);
    pending.fail(SyncException::new(result, Phase::Setup).with_cause(cause));
}

fn complete<T: Thing, A: Action>(builder: Builder<T, A>, pending: &SyncPending<T, A>) {
    let phase = if builder.has_action_failures() {
        Some(Phase::Actions)
    } else if builder.thing_status().is_some_and(Status::is_failure) {
        Some(Phase::Thing)
    } else {
        None
    };
    let result = builder.build(Status::NotAttempted);
    match phase {
        Some(phase) => {
            debug!(%phase, "sync failed");
            pending.fail(SyncException::new(result, phase));
        }
        None => {
            pending.success(result);
        }
    }
}

impl<S: Spec> fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("thread", &self.inner.config.thread_name)
            .field("remote", &self.inner.remote.is_some())
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}
