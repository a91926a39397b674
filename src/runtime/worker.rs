//! Query worker thread
//!
//! Owns the engine, and with it the file handle. Jobs arrive over a channel
//! one at a time; every finished query goes back as a message. The thread
//! exits when the job sender is dropped.

use std::io::{Read, Seek};
use std::sync::mpsc::{self, Sender};

use super::Notifier;
use crate::messages::{IndexMsg, Msg};
use crate::query::{Answer, QueryEngine, QueryOutcome, Request};

#[derive(Debug)]
pub struct QueryJob {
    pub request: Request,
    pub scratch: Answer,
}

pub struct QueryWorker {
    jobs: Option<Sender<QueryJob>>,
}

impl QueryWorker {
    pub fn spawn<R>(mut engine: QueryEngine<R>, notifier: Notifier) -> std::io::Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        let (jobs, rx) = mpsc::channel::<QueryJob>();
        std::thread::Builder::new()
            .name("brace-query".into())
            .spawn(move || {
                for job in rx {
                    let (result, request) = engine.query(job.request, job.scratch);
                    if let Some(file_len) = engine.take_length_change() {
                        notifier.send(Msg::Index(IndexMsg::FileChanged { file_len }));
                    }
                    if !notifier.send(Msg::completed(QueryOutcome::new(request, result))) {
                        break;
                    }
                }
                tracing::debug!("Query worker exiting");
            })?;
        Ok(Self { jobs: Some(jobs) })
    }

    /// Hand a job to the thread, or get it back if the thread is gone
    pub fn submit(&self, job: QueryJob) -> Result<(), QueryJob> {
        match &self.jobs {
            Some(jobs) => jobs.send(job).map_err(|e| e.0),
            None => Err(job),
        }
    }

    /// Let the thread finish its current job and exit
    pub fn stop(&mut self) {
        self.jobs = None;
    }
}
