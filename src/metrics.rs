//! DogStatsD export of per-measurement metrics.
//!
//! Metrics go out through a cadence [`StatsdClient`] as
//! `<namespace>.<name>:<value>|<type>|#ammeter:<id>[,error_kind:<kind>]`.
//! Sends are queued onto a background thread, so `record` never blocks the
//! sampler. Nothing here can fail a run: an absent agent only loses packets.

use crate::config::DatadogConfig;
use ammeter_core::Measurement;
use ammeter_sampler::MetricsSink;
use cadence::prelude::*;
use cadence::{MetricError, MetricResult, QueuingMetricSink, StatsdClient, UdpMetricSink};
use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::{debug, trace};

/// [`MetricsSink`] sending DogStatsD metrics over UDP.
pub struct StatsdSink {
    client: StatsdClient,
    namespace: String,
}

impl fmt::Debug for StatsdSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsdSink")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

fn swallow(err: MetricError) {
    trace!(error = %err, "StatsD send failed");
}

impl StatsdSink {
    /// Queue metrics for the agent at `host:port` from an ephemeral local port.
    pub fn connect(host: &str, port: u16, namespace: &str) -> MetricResult<Self> {
        let target = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "agent address resolved to nothing")
        })?;
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;

        let udp = UdpMetricSink::from(target, socket)?;
        let queued = QueuingMetricSink::from(udp);
        let namespace = namespace.trim_end_matches('.').to_string();
        let client = StatsdClient::builder(&namespace, queued)
            .with_error_handler(swallow)
            .build();
        debug!(host, port, namespace = %namespace, "StatsD sink ready");
        Ok(Self { client, namespace })
    }

    /// Sink for an enabled `datadog` section, `None` otherwise.
    pub fn from_config(config: &DatadogConfig) -> MetricResult<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        Self::connect(&config.host, config.port, &config.namespace).map(Some)
    }
}

impl MetricsSink for StatsdSink {
    fn record(&self, m: &Measurement) {
        let id = m.instrument_id();
        match (m.value(), m.error_kind()) {
            (Some(value), None) => {
                self.client
                    .gauge_with_tags("current_a", value)
                    .with_tag("ammeter", id)
                    .send();
                self.client
                    .count_with_tags("measure_ok", 1i64)
                    .with_tag("ammeter", id)
                    .send();
            }
            (_, kind) => {
                let kind = kind.map(|k| k.as_str()).unwrap_or("unknown");
                self.client
                    .count_with_tags("measure_error", 1i64)
                    .with_tag("ammeter", id)
                    .with_tag("error_kind", kind)
                    .send();
            }
        }
        self.client
            .time_with_tags("latency_ms", m.latency())
            .with_tag("ammeter", id)
            .send();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ammeter_core::ErrorKind;
    use std::time::Duration;

    fn receiver() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        socket
    }

    /// One datagram per metric, in send order.
    fn recv_lines(socket: &UdpSocket, count: usize) -> Vec<String> {
        let mut buf = [0u8; 2048];
        (0..count)
            .map(|_| {
                let n = socket.recv(&mut buf).unwrap();
                String::from_utf8_lossy(&buf[..n]).to_string()
            })
            .collect()
    }

    #[test]
    fn test_ok_measurement_lines() {
        let rx = receiver();
        let sink = StatsdSink::connect("127.0.0.1", rx.local_addr().unwrap().port(), "ammeter_test.").unwrap();
        sink.record(&Measurement::success("entes", 0, 0.25, Duration::from_millis(12)));

        assert_eq!(
            recv_lines(&rx, 3),
            vec![
                "ammeter_test.current_a:0.25|g|#ammeter:entes",
                "ammeter_test.measure_ok:1|c|#ammeter:entes",
                "ammeter_test.latency_ms:12|ms|#ammeter:entes",
            ]
        );
    }

    #[test]
    fn test_failed_measurement_lines() {
        let rx = receiver();
        let sink = StatsdSink::connect("127.0.0.1", rx.local_addr().unwrap().port(), "").unwrap();
        sink.record(&Measurement::failure("greenlee", 4, ErrorKind::Timeout, Duration::from_millis(2)));

        let lines = recv_lines(&rx, 2);
        assert_eq!(lines[0], "measure_error:1|c|#ammeter:greenlee,error_kind:timeout");
        assert_eq!(lines[1], "latency_ms:2|ms|#ammeter:greenlee");
    }

    #[test]
    fn test_absent_agent_is_silent() {
        // Nothing listens on the port; record must neither panic nor block.
        let port = {
            let unused = UdpSocket::bind("127.0.0.1:0").unwrap();
            unused.local_addr().unwrap().port()
        };
        let sink = StatsdSink::connect("127.0.0.1", port, "ns").unwrap();
        for i in 0..10 {
            sink.record(&Measurement::success("circutor", i, 1.0, Duration::ZERO));
        }
    }

    #[test]
    fn test_disabled_config_yields_no_sink() {
        let config = DatadogConfig::default();
        assert!(StatsdSink::from_config(&config).unwrap().is_none());
    }
}
