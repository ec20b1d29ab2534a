use crate::config::{defaults, Configuration};
use crate::destination::Destination;
use crate::error::{Error, Result};
use crate::lifecycle::Lifecycle;
use crate::net::channel::IcmpNetwork;
use crate::net::Network;
use crate::pinger::Pinger;
use crate::types::{Identifier, MaxProbes, Token};
use std::fmt::{Debug, Formatter};
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::runtime::Handle;

/// Build a [`Pinger`].
///
/// # Examples
///
/// Ping a host every 500ms with a 2 second timeout:
///
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// use sonar_core::{Builder, Destination};
/// use std::time::Duration;
///
/// let destination = Destination::resolve("example.com")?;
/// let pinger = Builder::new(destination)
///     .probe_interval(Duration::from_millis(500))
///     .timeout(Duration::from_secs(2))
///     .max_probes(Some(10))
///     .build()?;
/// let mut responses = pinger.subscribe();
/// pinger.start()?;
/// while let Ok(response) = responses.recv().await {
///     println!("{response:?}");
/// }
/// # Ok(())
/// # }
/// ```
///
/// # See Also
///
/// - [`Pinger`] - The pinger this builder creates.
pub struct Builder<N: Network = IcmpNetwork> {
    destination: Destination,
    network: N,
    config: Configuration,
    max_probes: Option<MaxProbes>,
    lifecycle: Option<Lifecycle>,
    channel_capacity: usize,
    identifier: Option<Identifier>,
    token: Option<Token>,
}

impl Builder<IcmpNetwork> {
    /// Build a pinger which sends to `destination` over a raw `ICMP` socket.
    #[must_use]
    pub fn new(destination: Destination) -> Self {
        Self::with_network(destination, IcmpNetwork)
    }
}

impl<N: Network> Builder<N> {
    /// Build a pinger which sends to `destination` over the given [`Network`].
    #[must_use]
    pub fn with_network(destination: Destination, network: N) -> Self {
        Self {
            destination,
            network,
            config: Configuration::default(),
            max_probes: None,
            lifecycle: None,
            channel_capacity: defaults::DEFAULT_CHANNEL_CAPACITY,
            identifier: None,
            token: None,
        }
    }

    /// Replace the whole timing configuration.
    #[must_use]
    pub fn configuration(self, config: Configuration) -> Self {
        Self { config, ..self }
    }

    /// Set the delay between a probe completing and the next being sent.
    #[must_use]
    pub fn probe_interval(self, probe_interval: Duration) -> Self {
        Self {
            config: Configuration {
                probe_interval,
                ..self.config
            },
            ..self
        }
    }

    /// Set how long to wait for each reply.
    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        Self {
            config: Configuration {
                timeout,
                ..self.config
            },
            ..self
        }
    }

    /// Halt on host suspension and restart on resumption.
    #[must_use]
    pub fn track_app_lifecycle(self, track_app_lifecycle: bool) -> Self {
        Self {
            config: Configuration {
                track_app_lifecycle,
                ..self.config
            },
            ..self
        }
    }

    /// Stop after this many probes have completed.
    ///
    /// `None` or `Some(0)` means probe until stopped.
    #[must_use]
    pub fn max_probes(self, max_probes: Option<usize>) -> Self {
        Self {
            max_probes: max_probes.and_then(NonZeroUsize::new).map(MaxProbes),
            ..self
        }
    }

    /// The source of host lifecycle events.
    #[must_use]
    pub fn lifecycle(self, lifecycle: &Lifecycle) -> Self {
        Self {
            lifecycle: Some(lifecycle.clone()),
            ..self
        }
    }

    /// The number of responses buffered for slow subscribers.
    #[must_use]
    pub fn channel_capacity(self, channel_capacity: usize) -> Self {
        Self {
            channel_capacity,
            ..self
        }
    }

    /// Use a fixed identifier rather than a random one.
    #[must_use]
    pub fn identifier(self, identifier: Identifier) -> Self {
        Self {
            identifier: Some(identifier),
            ..self
        }
    }

    /// Use a fixed token rather than a random one.
    #[must_use]
    pub fn token(self, token: Token) -> Self {
        Self {
            token: Some(token),
            ..self
        }
    }

    /// Build the [`Pinger`].
    ///
    /// Must be called from within a Tokio runtime. The pinger is idle until
    /// [`Pinger::start`] is called.
    pub fn build(self) -> Result<Pinger<N>> {
        if self.config.probe_interval.is_zero() {
            return Err(Error::BadConfig(format!(
                "probe_interval ({:?}) must be greater than zero",
                self.config.probe_interval
            )));
        }
        if self.config.timeout.is_zero() {
            return Err(Error::BadConfig(format!(
                "timeout ({:?}) must be greater than zero",
                self.config.timeout
            )));
        }
        if self.channel_capacity == 0 {
            return Err(Error::BadConfig(format!(
                "channel_capacity ({}) must be greater than zero",
                self.channel_capacity
            )));
        }
        let runtime = Handle::try_current().map_err(|err| Error::NoRuntime(err.to_string()))?;
        let identifier = self.identifier.unwrap_or_else(Identifier::random);
        let token = self.token.unwrap_or_else(Token::random);
        tracing::debug!(
            destination = %self.destination,
            identifier = identifier.0,
            %token,
            config = ?self.config,
            "building pinger"
        );
        Ok(Pinger::new(
            self.destination,
            self.network,
            self.config,
            self.max_probes,
            identifier,
            token,
            self.channel_capacity,
            self.lifecycle.as_ref(),
            runtime,
        ))
    }
}

impl<N: Network> Debug for Builder<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("destination", &self.destination)
            .field("config", &self.config)
            .field("max_probes", &self.max_probes)
            .field("channel_capacity", &self.channel_capacity)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{DatagramHandler, MockChannel};
    use std::net::Ipv4Addr;

    struct MockNetwork;

    impl Network for MockNetwork {
        type Channel = MockChannel;

        fn open(&self, _on_datagram: DatagramHandler) -> Result<Self::Channel> {
            Ok(MockChannel::new())
        }
    }

    fn destination() -> Destination {
        Destination::from_ipv4(Ipv4Addr::LOCALHOST)
    }

    #[tokio::test]
    async fn test_builder_minimal() -> anyhow::Result<()> {
        let pinger = Builder::with_network(destination(), MockNetwork).build()?;
        assert_eq!(Ipv4Addr::LOCALHOST, pinger.destination().address());
        assert_eq!(Configuration::default(), pinger.configuration());
        assert_eq!(None, pinger.max_probes());
        assert_eq!(0, pinger.sequence().0);
        assert_eq!(0, pinger.completed());
        assert!(pinger.is_halted());
        Ok(())
    }

    #[tokio::test]
    async fn test_builder_full() -> anyhow::Result<()> {
        let lifecycle = Lifecycle::new();
        let token = Token([0xab; 16]);
        let pinger = Builder::with_network(destination(), MockNetwork)
            .probe_interval(Duration::from_millis(250))
            .timeout(Duration::from_millis(100))
            .track_app_lifecycle(false)
            .max_probes(Some(3))
            .lifecycle(&lifecycle)
            .channel_capacity(8)
            .identifier(Identifier(1234))
            .token(token)
            .build()?;
        let config = pinger.configuration();
        assert_eq!(Duration::from_millis(250), config.probe_interval);
        assert_eq!(Duration::from_millis(100), config.timeout);
        assert!(!config.track_app_lifecycle);
        assert_eq!(Some(MaxProbes(NonZeroUsize::new(3).unwrap())), pinger.max_probes());
        assert_eq!(Identifier(1234), pinger.identifier());
        assert_eq!(token, pinger.token());
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_max_probes_is_unlimited() -> anyhow::Result<()> {
        let pinger = Builder::with_network(destination(), MockNetwork)
            .max_probes(Some(0))
            .build()?;
        assert_eq!(None, pinger.max_probes());
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_probe_interval() {
        let err = Builder::with_network(destination(), MockNetwork)
            .probe_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::BadConfig(_)));
    }

    #[tokio::test]
    async fn test_zero_timeout() {
        let err = Builder::with_network(destination(), MockNetwork)
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::BadConfig(_)));
    }

    #[tokio::test]
    async fn test_zero_channel_capacity() {
        let err = Builder::with_network(destination(), MockNetwork)
            .channel_capacity(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::BadConfig(_)));
    }

    #[test]
    fn test_no_runtime() {
        let err = Builder::with_network(destination(), MockNetwork)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::NoRuntime(_)));
    }
}
