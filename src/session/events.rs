//! Notifications a session sends to its observers.

use crossbeam_channel::Sender;

use super::SessionState;
use crate::data::FitRange;
use crate::parameters::Bounds;

/// A committed change to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    DataLoaded {
        points: usize,
    },
    FunctionSelected {
        name: String,
        parameters: Vec<String>,
    },
    ParameterChanged {
        name: String,
        value: f64,
    },
    BoundsChanged {
        name: String,
        bounds: Bounds,
    },
    RangeChanged(FitRange),
    FitStarted,
    FitSucceeded {
        cost: f64,
        iterations: usize,
    },
    FitFailed {
        message: String,
    },
    FitCancelled,
    Accepted,
}

/// Receives every event a session broadcasts, in order.
pub trait SessionObserver {
    fn notify(&mut self, event: &SessionEvent);
}

impl<F> SessionObserver for F
where
    F: FnMut(&SessionEvent),
{
    fn notify(&mut self, event: &SessionEvent) {
        self(event)
    }
}

/// Forwards events over a channel, e.g. to a renderer on another thread.
/// A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver(pub Sender<SessionEvent>);

impl SessionObserver for ChannelObserver {
    fn notify(&mut self, event: &SessionEvent) {
        let _ = self.0.send(event.clone());
    }
}
