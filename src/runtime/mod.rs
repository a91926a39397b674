//! Runtime module - threads and the viewer facade
//!
//! - `worker` - query thread owning the engine
//! - `indexer` - background row counter
//! - `viewer` - the facade a presentation layer drives

pub mod indexer;
pub mod viewer;
pub mod worker;

use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::messages::Msg;

pub use indexer::Indexer;
pub use viewer::Viewer;
pub use worker::{QueryJob, QueryWorker};

/// Called after a message is sent from a background thread, so an event
/// loop blocked elsewhere knows to drain the channel
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Sending half shared by the background threads
#[derive(Clone)]
pub struct Notifier {
    tx: Sender<Msg>,
    waker: Option<Waker>,
}

impl Notifier {
    pub fn new(tx: Sender<Msg>, waker: Option<Waker>) -> Self {
        Self { tx, waker }
    }

    /// Returns false once the receiving side is gone
    pub fn send(&self, msg: Msg) -> bool {
        if self.tx.send(msg).is_err() {
            return false;
        }
        if let Some(wake) = &self.waker {
            wake();
        }
        true
    }
}
