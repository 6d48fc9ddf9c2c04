//! Subscription streams.
//!
//! A [`SubscriptionStream`] is one background task that polls a
//! [`SensorSource`] for a single target and pushes [`ServerMessage::Sensor`]
//! events into a connection's outbound channel. It runs until its
//! cancellation token fires or the outbound channel closes.

mod schedule;

pub use schedule::PollSchedule;

use std::sync::Arc;

use log::{debug, error, warn};
use sensorcast_protocol::{Reading, ServerMessage, Subscribe};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::sensor::{GeoPoint, Measurement, SensorSource};

/// What a stream is polling for.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Landmark name echoed back in every reading.
    pub name: String,
    pub point: GeoPoint,
}

impl Target {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            point: GeoPoint::new(lat, lng),
        }
    }

    pub fn reading(&self, measurement: Measurement) -> Reading {
        Reading {
            landmark: self.name.clone(),
            lat: self.point.lat,
            lng: self.point.lng,
            temperature: measurement.temperature,
            humidity: measurement.humidity,
        }
    }
}

impl From<Subscribe> for Target {
    fn from(sub: Subscribe) -> Self {
        Self::new(sub.name, sub.lat, sub.lng)
    }
}

/// Handle to a running poll task.
///
/// Dropping the handle cancels the task; [`SubscriptionStream::stop`] also
/// waits for it to exit.
#[derive(Debug)]
pub struct SubscriptionStream {
    target: Target,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SubscriptionStream {
    /// Start polling `target` immediately.
    pub fn spawn(
        target: Target,
        source: Arc<dyn SensorSource>,
        schedule: PollSchedule,
        outbound: mpsc::Sender<ServerMessage>,
        token: CancellationToken,
    ) -> Self {
        let poller = Poller {
            target: target.clone(),
            source,
            schedule,
            outbound,
            token: token.clone(),
        };
        let handle = tokio::spawn(poller.run());

        Self {
            target,
            token,
            handle,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the task and wait for it to exit.
    ///
    /// Once this returns the stream will not send anything else.
    pub async fn stop(mut self) {
        self.token.cancel();
        let Err(e) = (&mut self.handle).await else {
            return;
        };
        if e.is_panic() {
            error!("Stream for '{}' panicked: {}", self.target.name, e);
        }
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

struct Poller {
    target: Target,
    source: Arc<dyn SensorSource>,
    schedule: PollSchedule,
    outbound: mpsc::Sender<ServerMessage>,
    token: CancellationToken,
}

impl Poller {
    async fn run(self) {
        let name = &self.target.name;
        let point = self.target.point;
        let mut consecutive_failures: u32 = 0;

        debug!(
            "Stream for '{}' ({}, {}) started, polling every {:?}",
            name,
            point.lat,
            point.lng,
            self.schedule.interval()
        );

        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                outcome = self.source.fetch(point) => outcome,
            };

            match outcome {
                Ok(measurement) => {
                    consecutive_failures = 0;
                    let event = ServerMessage::Sensor(self.target.reading(measurement));
                    let sent = tokio::select! {
                        biased;
                        _ = self.token.cancelled() => break,
                        sent = self.outbound.send(event) => sent,
                    };
                    if sent.is_err() {
                        debug!("Outbound channel for '{}' closed", name);
                        break;
                    }
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    warn!(
                        "Fetch for '{}' failed ({} in a row): {}",
                        name, consecutive_failures, e
                    );
                }
            }

            let delay = self.schedule.delay_after(consecutive_failures);
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        debug!("Stream for '{}' stopped", name);
    }
}
