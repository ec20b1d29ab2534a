use crate::config::{LogFormat, SonarConfig};
use crate::report::{format_response, Statistics};
use sonar_core::{Builder, Destination, Lifecycle, Pinger, Resolver, SystemResolver, TOKEN_LEN};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::fmt::format::FmtSpan;

/// Run the `sonar` application.
pub fn run_sonar(cfg: &SonarConfig) -> anyhow::Result<()> {
    configure_logging(cfg);
    let destination = resolve_destination(&SystemResolver, &cfg.host)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(ping(cfg, destination))
}

/// Resolve the target before the runtime starts as the lookup blocks.
fn resolve_destination(resolver: &impl Resolver, host: &str) -> anyhow::Result<Destination> {
    let destination = Destination::resolve_with(resolver, host)?;
    tracing::debug!(%destination, "resolved");
    Ok(destination)
}

async fn ping(cfg: &SonarConfig, destination: Destination) -> anyhow::Result<()> {
    let lifecycle = Lifecycle::new();
    let pinger = Builder::new(destination.clone())
        .probe_interval(cfg.interval)
        .timeout(cfg.timeout)
        .track_app_lifecycle(cfg.track_app_lifecycle)
        .max_probes(cfg.count)
        .lifecycle(&lifecycle)
        .build()?;
    tracing::debug!(?pinger, "pinger built");
    println!("PING {destination}: {TOKEN_LEN} data bytes");
    let stats = ping_until_done(cfg, &pinger, &lifecycle).await?;
    pinger.halt(true);
    println!();
    println!("{}", stats.summary(destination.host()));
    Ok(())
}

/// Print responses until the probe limit is reached or we are interrupted.
///
/// `SIGUSR1` and `SIGUSR2` are forwarded to the lifecycle as suspension and
/// resumption.
async fn ping_until_done(
    cfg: &SonarConfig,
    pinger: &Pinger,
    lifecycle: &Lifecycle,
) -> anyhow::Result<Statistics> {
    let mut responses = pinger.subscribe();
    let mut suspend = signal(SignalKind::user_defined1())?;
    let mut resume = signal(SignalKind::user_defined2())?;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stats = Statistics::default();
    pinger.start()?;
    loop {
        tokio::select! {
            response = responses.recv() => match response {
                Ok(response) => {
                    println!("{}", format_response(&response));
                    stats.record(&response);
                    if cfg.count.is_some_and(|count| stats.transmitted() >= count) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "responses lagged"),
                Err(RecvError::Closed) => break,
            },
            res = &mut ctrl_c => {
                res?;
                tracing::debug!("interrupted");
                break;
            }
            Some(()) = suspend.recv() => lifecycle.suspended(),
            Some(()) = resume.recv() => lifecycle.resumed(),
        }
    }
    Ok(stats)
}

fn configure_logging(cfg: &SonarConfig) {
    if cfg.verbose {
        match cfg.log_format {
            LogFormat::Compact => {
                tracing_subscriber::fmt()
                    .with_span_events(FmtSpan::NONE)
                    .with_env_filter(&cfg.log_filter)
                    .with_writer(std::io::stderr)
                    .compact()
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .with_span_events(FmtSpan::NONE)
                    .with_env_filter(&cfg.log_filter)
                    .with_writer(std::io::stderr)
                    .pretty()
                    .init();
            }
        }
    }
}
