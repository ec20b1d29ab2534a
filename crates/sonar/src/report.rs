use sonar_core::{ProbeError, Response};
use std::time::Duration;

/// Render a single response as a line of output.
pub fn format_response(response: &Response) -> String {
    let seq = response.sequence.0;
    match (&response.error, response.ip_header) {
        (None, Some(header)) => {
            let bytes = response.byte_count.unwrap_or_default();
            let rtt = response.round_trip_time.unwrap_or_default();
            format!(
                "{bytes} bytes from {}: icmp_seq={seq} ttl={} time={:.3} ms",
                header.source,
                header.time_to_live,
                as_millis(rtt)
            )
        }
        (Some(ProbeError::ResponseTimeout), _) => format!("Request timeout for icmp_seq={seq}"),
        (Some(err), _) => format!("icmp_seq={seq} error: {err}"),
        (None, None) => format!("icmp_seq={seq} no reply"),
    }
}

/// Summary statistics over every response seen.
#[derive(Debug, Default, Clone, Copy)]
pub struct Statistics {
    transmitted: usize,
    received: usize,
    min: Option<Duration>,
    max: Option<Duration>,
    total: Duration,
}

impl Statistics {
    pub fn record(&mut self, response: &Response) {
        self.transmitted += 1;
        if !response.is_success() {
            return;
        }
        self.received += 1;
        if let Some(rtt) = response.round_trip_time {
            self.min = Some(self.min.map_or(rtt, |min| min.min(rtt)));
            self.max = Some(self.max.map_or(rtt, |max| max.max(rtt)));
            self.total += rtt;
        }
    }

    pub const fn transmitted(&self) -> usize {
        self.transmitted
    }

    pub const fn received(&self) -> usize {
        self.received
    }

    /// Percentage of requests without a valid reply.
    pub fn loss_pct(&self) -> f64 {
        if self.transmitted == 0 {
            0_f64
        } else {
            (self.transmitted - self.received) as f64 * 100_f64 / self.transmitted as f64
        }
    }

    pub fn mean(&self) -> Option<Duration> {
        let received = u32::try_from(self.received).ok().filter(|r| *r > 0)?;
        Some(self.total / received)
    }

    pub fn summary(&self, host: &str) -> String {
        let mut out = format!("--- {host} ping statistics ---\n");
        out.push_str(&format!(
            "{} packets transmitted, {} packets received, {:.1}% packet loss",
            self.transmitted,
            self.received,
            self.loss_pct()
        ));
        if let (Some(min), Some(mean), Some(max)) = (self.min, self.mean(), self.max) {
            out.push_str(&format!(
                "\nround-trip min/avg/max = {:.3}/{:.3}/{:.3} ms",
                as_millis(min),
                as_millis(mean),
                as_millis(max)
            ));
        }
        out
    }
}

fn as_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000_f64
}
