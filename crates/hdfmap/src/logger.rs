//! Caller-supplied log destination.

use tracing::Dispatch;

/// Routes the events of one map or loader to a chosen subscriber.
///
/// Without a dispatcher, events go to whatever subscriber is current for the
/// calling thread. Nothing here touches the global default.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    dispatch: Option<Dispatch>,
}

impl Logger {
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch: Some(dispatch) }
    }

    /// Logger that leaves routing to the caller's current subscriber.
    pub fn inherit() -> Self {
        Self::default()
    }

    pub fn is_injected(&self) -> bool {
        self.dispatch.is_some()
    }

    /// Run `f` with this logger's dispatcher as the thread default.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl From<Dispatch> for Logger {
    fn from(dispatch: Dispatch) -> Self {
        Logger::new(dispatch)
    }
}
