//! Background row indexer
//!
//! Scans the file once in order on its own thread and publishes checkpoints
//! as it goes. It is the only writer of the index it is given; the query
//! engine reads snapshots.

use std::io::{Read, Seek};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::Notifier;
use crate::csv::{Dialect, RowReader};
use crate::index::{self, IndexWriter};
use crate::messages::{IndexMsg, Msg};

pub struct Indexer {
    cancel: Arc<AtomicBool>,
}

impl Indexer {
    /// Start scanning `source`, whose length is `file_len` bytes
    pub fn spawn<R>(
        source: R,
        file_len: u64,
        dialect: Dialect,
        read_size: usize,
        progress_rows: u64,
        mut writer: IndexWriter,
        notifier: Notifier,
    ) -> std::io::Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&cancel);
        std::thread::Builder::new()
            .name("brace-index".into())
            .spawn(move || {
                let send = |msg: IndexMsg| {
                    notifier.send(Msg::Index(msg));
                };
                let mut reader = RowReader::new(source, dialect, read_size);
                let result = index::build(&mut reader, &mut writer, progress_rows, &stop, |idx| {
                    let frontier = idx.frontier();
                    send(IndexMsg::Progress {
                        rows: frontier.row,
                        bytes: frontier.offset,
                        file_len,
                    });
                });
                match result {
                    Ok(true) => {
                        let rows = writer.current().total_rows().unwrap_or(0);
                        send(IndexMsg::Completed { rows });
                    }
                    Ok(false) => tracing::debug!("Index scan cancelled"),
                    Err(e) => {
                        tracing::warn!("Index scan failed: {}", e);
                        send(IndexMsg::Failed(e.to_string()));
                    }
                }
            })?;
        Ok(Self { cancel })
    }

    /// Ask the scan to stop at its next progress point
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl Drop for Indexer {
    fn drop(&mut self) {
        self.cancel();
    }
}
