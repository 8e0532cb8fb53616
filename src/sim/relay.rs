//! Input capture and the client-to-authority input channel

use glam::Vec3;
use tokio::sync::mpsc;
use tracing::debug;

use super::state::{DesiredInput, InputSample};

/// Reliable, ordered, fire-and-forget destination for input samples
pub trait InputSink: Send {
    fn send(&self, sample: InputSample) -> Result<(), RelayError>;
}

/// Failure to hand a sample to the transport
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RelayError {
    #[error("input channel closed")]
    Closed,
}

impl InputSink for mpsc::UnboundedSender<InputSample> {
    fn send(&self, sample: InputSample) -> Result<(), RelayError> {
        mpsc::UnboundedSender::send(self, sample).map_err(|_| RelayError::Closed)
    }
}

/// Turns raw control axes into `DesiredInput` and forwards them to the
/// authority when this host is not the authority.
///
/// Also holds the engine-enable gate: while the engine is off every
/// captured input is zero.
pub struct InputRelay {
    sink: Option<Box<dyn InputSink>>,
    engine_enabled: bool,
    sent: u64,
    failed: u64,
}

impl InputRelay {
    /// Relay for the authority host; `relay` does nothing
    pub fn local() -> Self {
        Self {
            sink: None,
            engine_enabled: true,
            sent: 0,
            failed: 0,
        }
    }

    /// Relay that forwards every captured sample to the authority
    pub fn remote(sink: Box<dyn InputSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::local()
        }
    }

    pub fn set_engine_enabled(&mut self, enabled: bool) {
        self.engine_enabled = enabled;
    }

    pub fn engine_enabled(&self) -> bool {
        self.engine_enabled
    }

    /// Gate and clamp raw axes for this tick
    pub fn capture(&self, axes: Vec3, yaw: f32) -> DesiredInput {
        if !self.engine_enabled {
            return DesiredInput::ZERO;
        }
        let input = DesiredInput::new(axes, yaw);
        if input.is_finite() {
            input.clamped()
        } else {
            DesiredInput::ZERO
        }
    }

    /// Gate an input that arrived from elsewhere (e.g. a remote client)
    pub fn gate(&self, input: DesiredInput) -> DesiredInput {
        if self.engine_enabled {
            input
        } else {
            DesiredInput::ZERO
        }
    }

    /// Send this tick's input to the authority. Delivery failures are
    /// logged and otherwise ignored.
    pub fn relay(&mut self, input: DesiredInput, now: f64) {
        let Some(sink) = &self.sink else {
            return;
        };

        match sink.send(InputSample::new(input, now)) {
            Ok(()) => self.sent += 1,
            Err(e) => {
                self.failed += 1;
                debug!(error = %e, failed = self.failed, "Input sample not delivered");
            }
        }
    }

    /// (sent, failed) sample counts
    pub fn counts(&self) -> (u64, u64) {
        (self.sent, self.failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_off_zeroes_input() {
        let mut relay = InputRelay::local();
        relay.set_engine_enabled(false);
        assert_eq!(relay.capture(Vec3::ONE, 1.0), DesiredInput::ZERO);

        relay.set_engine_enabled(true);
        assert_eq!(relay.capture(Vec3::X, 0.0).forward, 1.0);
    }

    #[test]
    fn test_capture_clamps() {
        let relay = InputRelay::local();
        let input = relay.capture(Vec3::new(2.0, -2.0, 0.0), 9.0);
        assert_eq!(input.forward, 1.0);
        assert_eq!(input.lateral, -1.0);
        assert_eq!(input.yaw, 1.0);
    }

    #[test]
    fn test_remote_relay_forwards_samples_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut relay = InputRelay::remote(Box::new(tx));

        relay.relay(relay.capture(Vec3::X, 0.0), 1.0);
        relay.relay(relay.capture(Vec3::Y, 0.5), 2.0);

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.timestamp, 1.0);
        assert_eq!(first.desired_input, Vec3::X);
        assert_eq!(second.timestamp, 2.0);
        assert_eq!(second.desired_yaw, 0.5);
        assert_eq!(relay.counts(), (2, 0));
    }

    #[test]
    fn test_local_relay_sends_nothing() {
        let mut relay = InputRelay::local();
        relay.relay(DesiredInput::ZERO, 1.0);
        assert_eq!(relay.counts(), (0, 0));
    }

    #[test]
    fn test_closed_channel_is_not_an_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut relay = InputRelay::remote(Box::new(tx));

        relay.relay(DesiredInput::ZERO, 1.0);
        assert_eq!(relay.counts(), (0, 1));
    }
}
