//! Sonar - an `ICMP` echo (ping) engine.
//!
//! This crate provides the probe scheduler used by the standalone `sonar`
//! command line tool.
//!
//! A [`Pinger`] sends one `ICMPv4` echo request at a time to a single
//! [`Destination`], correlates replies using an identifier, a sequence number
//! and a random token carried as the payload, and publishes a [`Response`] for
//! every probe, whether it succeeded, was rejected or timed out.
//!
//! # Example
//!
//! The following example pings a host five times and prints each response:
//!
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! use sonar_core::{Builder, Destination};
//!
//! let pinger = Builder::new(Destination::resolve("1.1.1.1")?)
//!     .max_probes(Some(5))
//!     .build()?;
//! let mut responses = pinger.subscribe();
//! pinger.start()?;
//! for _ in 0..5 {
//!     let response = responses.recv().await?;
//!     match response.round_trip_time {
//!         Some(rtt) if response.is_success() => println!("seq={} {rtt:?}", response.sequence.0),
//!         _ => println!("seq={} {:?}", response.sequence.0, response.error),
//!     }
//! }
//! pinger.halt(true);
//! # Ok(())
//! # }
//! ```
//!
//! # Privileges
//!
//! The default [`Network`] opens a raw `ICMP` socket which requires elevated
//! privileges (`CAP_NET_RAW` on Linux, root elsewhere).
//!
//! # See Also
//!
//! - [`Builder`] - Build a [`Pinger`].
//! - [`Lifecycle`] - Halt and restart pingers on host suspension.
#![deny(unsafe_code)]

#[cfg(not(unix))]
compile_error!("sonar-core only supports unix platforms");

mod builder;
mod config;
mod destination;
mod error;
mod lifecycle;
mod pinger;
mod response;
mod state;
mod types;

/// Encoding and validation of echo messages.
pub mod codec;

/// Channels over which echo messages are sent and received.
pub mod net;

/// Host name resolution.
pub mod resolver;

pub use builder::Builder;
pub use config::{defaults, Configuration};
pub use destination::Destination;
pub use error::{Error, IoError, IoOperation, ProbeError, Result};
pub use lifecycle::{Lifecycle, LifecycleEvent};
pub use net::channel::{IcmpChannel, IcmpNetwork};
pub use net::{Channel, DatagramHandler, Network};
pub use pinger::Pinger;
pub use resolver::{Resolver, SystemResolver};
pub use response::{Ipv4Header, Response};
pub use types::{Identifier, MaxProbes, Sequence, Token, TOKEN_LEN};
