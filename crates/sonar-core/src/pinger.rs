use crate::config::Configuration;
use crate::destination::Destination;
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::net::channel::IcmpNetwork;
use crate::net::Network;
use crate::response::Response;
use crate::types::{Identifier, MaxProbes, Sequence, Token};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

/// An `ICMP` echo (ping) engine.
///
/// A `Pinger` sends one echo request at a time to its [`Destination`], waits
/// for the matching reply or for the timeout, publishes a [`Response`] and
/// then sends the next request after the probe interval.
///
/// Use the [`crate::Builder`] type to create a [`Pinger`].
///
/// Note that this type is cheaply cloneable.
pub struct Pinger<N: Network = IcmpNetwork> {
    inner: Arc<inner::PingerInner<N>>,
}

impl<N: Network> Pinger<N> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        destination: Destination,
        network: N,
        config: Configuration,
        max_probes: Option<MaxProbes>,
        identifier: Identifier,
        token: Token,
        channel_capacity: usize,
        lifecycle: Option<&Lifecycle>,
        runtime: Handle,
    ) -> Self {
        let inner = Arc::new(inner::PingerInner::new(
            destination,
            network,
            config,
            max_probes,
            identifier,
            token,
            channel_capacity,
            runtime,
        ));
        if config.track_app_lifecycle {
            if let Some(lifecycle) = lifecycle {
                inner::PingerInner::watch(&inner, lifecycle);
            }
        }
        Self { inner }
    }

    /// Start probing.
    ///
    /// Opens the channel if it is not already open and sends the first probe
    /// immediately. Calling `start` while probing has no effect.
    pub fn start(&self) -> Result<()> {
        self.inner.start()
    }

    /// Stop probing, keeping the channel open.
    ///
    /// Any in-flight probe is abandoned without a [`Response`].
    pub fn stop(&self, reset_sequence: bool) {
        self.inner.stop(reset_sequence);
    }

    /// Stop probing and close the channel.
    pub fn halt(&self, reset_sequence: bool) {
        self.inner.halt(reset_sequence);
    }

    /// Subscribe to the stream of probe [`Response`]s.
    ///
    /// Only responses published after subscribing are received.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Response> {
        self.inner.subscribe()
    }

    #[must_use]
    pub fn destination(&self) -> &Destination {
        self.inner.destination()
    }

    #[must_use]
    pub fn configuration(&self) -> Configuration {
        self.inner.configuration()
    }

    #[must_use]
    pub fn identifier(&self) -> Identifier {
        self.inner.identifier()
    }

    #[must_use]
    pub fn token(&self) -> Token {
        self.inner.token()
    }

    #[must_use]
    pub fn max_probes(&self) -> Option<MaxProbes> {
        self.inner.max_probes()
    }

    /// The sequence number of the current (or next) probe.
    #[must_use]
    pub fn sequence(&self) -> Sequence {
        self.inner.sequence()
    }

    /// The number of probes completed since creation or the last sequence reset.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.inner.completed()
    }

    /// Whether the pinger is stopped (or was never started).
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.inner.is_halted()
    }
}

impl<N: Network> Clone for Pinger<N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<N: Network> Debug for Pinger<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pinger")
            .field("destination", self.destination())
            .field("identifier", &self.identifier())
            .field("token", &self.token().to_string())
            .field("configuration", &self.configuration())
            .finish_non_exhaustive()
    }
}

mod inner {
    use crate::codec::{self, Expected, ValidatedReply};
    use crate::config::Configuration;
    use crate::destination::Destination;
    use crate::error::{Error, ProbeError, Result};
    use crate::lifecycle::{Lifecycle, LifecycleEvent};
    use crate::net::{Channel, DatagramHandler, Network};
    use crate::response::{Ipv4Header, Response};
    use crate::state::SequenceState;
    use crate::types::{Identifier, MaxProbes, Sequence, Token};
    use parking_lot::Mutex;
    use std::sync::{Arc, Weak};
    use tokio::runtime::Handle;
    use tokio::sync::broadcast::{self, error::RecvError};
    use tokio::task::AbortHandle;
    use tokio::time::Instant;
    use tracing::instrument;

    pub(super) struct PingerInner<N: Network> {
        destination: Destination,
        network: N,
        config: Configuration,
        max_probes: Option<MaxProbes>,
        identifier: Identifier,
        token: Token,
        runtime: Handle,
        responses: broadcast::Sender<Response>,
        state: Mutex<State<N::Channel>>,
    }

    /// Mutable state, only ever accessed with the lock held.
    struct State<C> {
        channel: Option<C>,
        sequence: SequenceState,
        /// Set by `stop` and `halt`, cleared by `start`.
        halted: bool,
        halted_by_lifecycle: bool,
        completed: usize,
        /// Incremented for every probe sent; timers for older probes are stale.
        epoch: u64,
        timeout: Option<AbortHandle>,
        next_probe: Option<AbortHandle>,
        lifecycle_watcher: Option<AbortHandle>,
    }

    impl<C> State<C> {
        fn new() -> Self {
            Self {
                channel: None,
                sequence: SequenceState::default(),
                halted: true,
                halted_by_lifecycle: false,
                completed: 0,
                epoch: 0,
                timeout: None,
                next_probe: None,
                lifecycle_watcher: None,
            }
        }
    }

    /// What a completed probe learned.
    struct Outcome {
        error: Option<ProbeError>,
        byte_count: Option<usize>,
        ip_header: Option<Ipv4Header>,
    }

    impl Outcome {
        const fn reply(reply: &ValidatedReply) -> Self {
            Self {
                error: None,
                byte_count: Some(reply.byte_count),
                ip_header: Some(reply.ip_header),
            }
        }

        const fn invalid(error: ProbeError, byte_count: usize) -> Self {
            Self {
                error: Some(error),
                byte_count: Some(byte_count),
                ip_header: None,
            }
        }

        const fn failed(error: ProbeError) -> Self {
            Self {
                error: Some(error),
                byte_count: None,
                ip_header: None,
            }
        }
    }

    impl<N: Network> PingerInner<N> {
        #[allow(clippy::too_many_arguments)]
        pub(super) fn new(
            destination: Destination,
            network: N,
            config: Configuration,
            max_probes: Option<MaxProbes>,
            identifier: Identifier,
            token: Token,
            channel_capacity: usize,
            runtime: Handle,
        ) -> Self {
            let (responses, _) = broadcast::channel(channel_capacity);
            Self {
                destination,
                network,
                config,
                max_probes,
                identifier,
                token,
                runtime,
                responses,
                state: Mutex::new(State::new()),
            }
        }

        /// Spawn a task which halts on suspension and restarts on resumption.
        pub(super) fn watch(this: &Arc<Self>, lifecycle: &Lifecycle) {
            let events = lifecycle.subscribe();
            let weak = Arc::downgrade(this);
            let task = this.runtime.spawn(watch_lifecycle(weak, events));
            this.state.lock().lifecycle_watcher = Some(task.abort_handle());
        }

        #[instrument(skip(self), fields(destination = %self.destination), level = "debug")]
        pub(super) fn start(self: &Arc<Self>) -> Result<()> {
            let mut state = self.state.lock();
            state.halted_by_lifecycle = false;
            self.start_locked(&mut state)
        }

        #[instrument(skip(self), level = "debug")]
        pub(super) fn stop(&self, reset_sequence: bool) {
            let mut state = self.state.lock();
            state.halted_by_lifecycle = false;
            Self::stop_locked(&mut state, reset_sequence);
        }

        #[instrument(skip(self), level = "debug")]
        pub(super) fn halt(&self, reset_sequence: bool) {
            let mut state = self.state.lock();
            state.halted_by_lifecycle = false;
            Self::halt_locked(&mut state, reset_sequence);
        }

        pub(super) fn subscribe(&self) -> broadcast::Receiver<Response> {
            self.responses.subscribe()
        }

        pub(super) fn destination(&self) -> &Destination {
            &self.destination
        }

        pub(super) fn configuration(&self) -> Configuration {
            self.config
        }

        pub(super) fn identifier(&self) -> Identifier {
            self.identifier
        }

        pub(super) fn token(&self) -> Token {
            self.token
        }

        pub(super) fn max_probes(&self) -> Option<MaxProbes> {
            self.max_probes
        }

        pub(super) fn sequence(&self) -> Sequence {
            self.state.lock().sequence.sequence()
        }

        pub(super) fn completed(&self) -> usize {
            self.state.lock().completed
        }

        pub(super) fn is_halted(&self) -> bool {
            self.state.lock().halted
        }

        fn start_locked(self: &Arc<Self>, state: &mut State<N::Channel>) -> Result<()> {
            if state.channel.is_none() {
                let _guard = self.runtime.enter();
                state.channel = Some(self.network.open(self.datagram_handler())?);
            }
            state.halted = false;
            if state.sequence.in_flight() || state.next_probe.is_some() {
                tracing::debug!("already probing");
                return Ok(());
            }
            self.probe(state)
        }

        fn stop_locked(state: &mut State<N::Channel>, reset_sequence: bool) {
            state.halted = true;
            if let Some(timeout) = state.timeout.take() {
                timeout.abort();
            }
            if let Some(next_probe) = state.next_probe.take() {
                next_probe.abort();
            }
            state.sequence.interrupt();
            if reset_sequence {
                state.sequence.reset();
                state.completed = 0;
            }
            tracing::debug!(sequence = state.sequence.sequence().0, "stopped");
        }

        fn halt_locked(state: &mut State<N::Channel>, reset_sequence: bool) {
            Self::stop_locked(state, reset_sequence);
            if let Some(mut channel) = state.channel.take() {
                channel.close();
            }
        }

        /// The channel holds only a weak reference back to us.
        fn datagram_handler(self: &Arc<Self>) -> DatagramHandler {
            let weak = Arc::downgrade(self);
            Arc::new(move |datagram: &[u8]| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_datagram(datagram);
                }
            })
        }

        fn probe(self: &Arc<Self>, state: &mut State<N::Channel>) -> Result<()> {
            if state.halted {
                return Ok(());
            }
            if self.probe_limit_reached(state) {
                tracing::debug!(completed = state.completed, "probe limit reached");
                return Ok(());
            }
            let sequence = state.sequence.sequence();
            let packet = codec::encode(self.identifier, sequence, &self.token)?;
            let channel = state.channel.as_mut().ok_or(Error::SocketNil)?;
            state.epoch = state.epoch.wrapping_add(1);
            state.sequence.begin(Instant::now());
            tracing::debug!(sequence = sequence.0, "sending probe");
            match channel.send(&packet, self.destination.address()) {
                Ok(()) => state.timeout = Some(self.arm_timeout(state.epoch)),
                Err(err) => self.complete(state, &Outcome::failed(err)),
            }
            Ok(())
        }

        fn arm_timeout(self: &Arc<Self>, epoch: u64) -> AbortHandle {
            let weak = Arc::downgrade(self);
            let timeout = self.config.timeout;
            self.runtime
                .spawn(async move {
                    tokio::time::sleep(timeout).await;
                    if let Some(inner) = weak.upgrade() {
                        inner.on_timeout(epoch);
                    }
                })
                .abort_handle()
        }

        fn on_timeout(self: &Arc<Self>, epoch: u64) {
            let mut state = self.state.lock();
            if state.epoch != epoch || state.halted || !state.sequence.in_flight() {
                return;
            }
            // this task is the timeout, there is nothing to abort
            state.timeout = None;
            tracing::debug!(sequence = state.sequence.sequence().0, "probe timed out");
            self.complete(&mut state, &Outcome::failed(ProbeError::ResponseTimeout));
        }

        fn on_datagram(self: &Arc<Self>, datagram: &[u8]) {
            let mut state = self.state.lock();
            if state.halted || !state.sequence.in_flight() {
                tracing::trace!(len = datagram.len(), "no probe in flight, discarding");
                return;
            }
            let expected = Expected {
                identifier: self.identifier,
                sequence: state.sequence.sequence(),
                token: &self.token,
            };
            match codec::decode(datagram, &expected) {
                Ok(Some(reply)) => self.complete(&mut state, &Outcome::reply(&reply)),
                Ok(None) => tracing::trace!(len = datagram.len(), "not ours, discarding"),
                Err(err) => {
                    tracing::debug!(%err, "invalid reply");
                    self.complete(&mut state, &Outcome::invalid(err, datagram.len()));
                }
            }
        }

        fn on_next_probe(self: &Arc<Self>, epoch: u64) {
            let mut state = self.state.lock();
            if state.epoch != epoch || state.halted || state.sequence.in_flight() {
                return;
            }
            state.next_probe = None;
            if let Err(err) = self.probe(&mut state) {
                tracing::error!(%err, "failed to send probe");
            }
        }

        fn on_lifecycle(self: &Arc<Self>, event: LifecycleEvent) {
            let mut state = self.state.lock();
            match event {
                LifecycleEvent::Suspended => {
                    tracing::debug!("halting for suspension");
                    // a scheduler the user stopped stays stopped on resume
                    if !state.halted {
                        state.halted_by_lifecycle = true;
                    }
                    Self::halt_locked(&mut state, false);
                }
                LifecycleEvent::Resumed => {
                    if !state.halted_by_lifecycle {
                        return;
                    }
                    tracing::debug!("restarting after resumption");
                    state.halted_by_lifecycle = false;
                    if let Err(err) = self.start_locked(&mut state) {
                        tracing::error!(%err, "failed to restart after resumption");
                    }
                }
            }
        }

        /// Publish the outcome of the in-flight probe and schedule the next one.
        fn complete(self: &Arc<Self>, state: &mut State<N::Channel>, outcome: &Outcome) {
            if let Some(timeout) = state.timeout.take() {
                timeout.abort();
            }
            let sequence = state.sequence.sequence();
            let round_trip_time = state.sequence.complete(Instant::now());
            state.completed += 1;
            let response = Response {
                identifier: self.identifier,
                resolved_address: Some(self.destination.address()),
                sequence,
                round_trip_time,
                error: outcome.error,
                byte_count: outcome.byte_count,
                ip_header: outcome.ip_header,
            };
            tracing::debug!(?response);
            if !state.halted && self.responses.send(response).is_err() {
                tracing::trace!("no subscribers");
            }
            self.schedule_next(state);
        }

        fn schedule_next(self: &Arc<Self>, state: &mut State<N::Channel>) {
            if state.halted {
                return;
            }
            if self.probe_limit_reached(state) {
                tracing::debug!(completed = state.completed, "probe limit reached");
                return;
            }
            let weak = Arc::downgrade(self);
            let epoch = state.epoch;
            let interval = self.config.probe_interval;
            let task = self.runtime.spawn(async move {
                tokio::time::sleep(interval).await;
                if let Some(inner) = weak.upgrade() {
                    inner.on_next_probe(epoch);
                }
            });
            state.next_probe = Some(task.abort_handle());
        }

        fn probe_limit_reached(&self, state: &State<N::Channel>) -> bool {
            self.max_probes
                .is_some_and(|MaxProbes(max)| state.completed >= max.get())
        }
    }

    impl<N: Network> Drop for PingerInner<N> {
        fn drop(&mut self) {
            let state = self.state.get_mut();
            if let Some(watcher) = state.lifecycle_watcher.take() {
                watcher.abort();
            }
            Self::halt_locked(state, false);
        }
    }

    async fn watch_lifecycle<N: Network>(
        inner: Weak<PingerInner<N>>,
        mut events: broadcast::Receiver<LifecycleEvent>,
    ) {
        loop {
            match events.recv().await {
                Ok(event) => match inner.upgrade() {
                    Some(inner) => inner.on_lifecycle(event),
                    None => return,
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "lifecycle events lagged");
                }
                Err(RecvError::Closed) => return,
            }
        }
    }
}
