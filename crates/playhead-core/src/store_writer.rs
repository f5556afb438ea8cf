use playhead_ports::storage::{OutcomeRecord, SessionSummary, SettingsDto, StoragePort};
use std::sync::mpsc;
use std::thread;

enum StoreJob {
    Settings(SettingsDto),
    Outcomes(Vec<OutcomeRecord>),
    Summary(SessionSummary),
    Barrier(mpsc::SyncSender<()>),
}

/// Hands store writes to a background thread so the tick loop never waits on disk.
pub struct StoreWriter {
    tx: Option<mpsc::Sender<StoreJob>>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl StoreWriter {
    pub fn spawn(storage: Box<dyn StoragePort>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<StoreJob>();
        let join_handle = thread::Builder::new()
            .name("playhead-store".to_string())
            .spawn(move || {
                for job in rx {
                    let result = match job {
                        StoreJob::Settings(settings) => storage.save_settings(&settings),
                        StoreJob::Outcomes(records) => storage.append_outcomes(&records),
                        StoreJob::Summary(summary) => storage.save_summary(&summary),
                        StoreJob::Barrier(done) => {
                            let _ = done.send(());
                            Ok(())
                        }
                    };
                    if let Err(err) = result {
                        log::warn!("store write failed: {err}");
                    }
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            join_handle: Some(join_handle),
        })
    }

    pub fn save_settings(&self, settings: &SettingsDto) {
        self.send(StoreJob::Settings(settings.clone()));
    }

    pub fn append_outcomes(&self, records: Vec<OutcomeRecord>) {
        if !records.is_empty() {
            self.send(StoreJob::Outcomes(records));
        }
    }

    pub fn save_summary(&self, summary: SessionSummary) {
        self.send(StoreJob::Summary(summary));
    }

    /// Blocks until every job queued so far has been handed to the store.
    pub fn flush(&self) {
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        self.send(StoreJob::Barrier(done_tx));
        let _ = done_rx.recv();
    }

    fn send(&self, job: StoreJob) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        if tx.send(job).is_err() {
            log::warn!("store writer is gone, dropping write");
        }
    }
}

impl Drop for StoreWriter {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}
