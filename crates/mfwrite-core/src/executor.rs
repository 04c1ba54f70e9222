//! Dump write execution
//!
//! [`DumpWriteExecutor`] performs the writes of a [`WritePlan`] in ascending
//! sector, then block order, each with the key the plan chose for it. The
//! first failure stops the run; blocks written before it stay written. The
//! tag session is closed on every exit path.
//!
//! A run can be moved off the calling thread with [`DumpWriteExecutor::spawn`],
//! which reports exactly one result through a [`BackgroundWrite`] handle.

use crate::dump::{Block, Dump};
use crate::error::{Error, Result, WriteError};
use crate::keys::{Key, KeyMap, KeyType};
use crate::plan::WritePlan;
use crate::session::{Session, TagConnector, WriteStatus};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

/// Progress of a running dump write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteProgress {
    /// Blocks written so far
    pub blocks_written: usize,
    /// Blocks in the plan
    pub total_blocks: usize,
    /// Sector of the block just written
    pub sector: u8,
    /// Block just written
    pub block: u8,
}

impl WriteProgress {
    /// Completion percentage (0.0 to 100.0)
    pub fn percentage(&self) -> f64 {
        if self.total_blocks == 0 {
            100.0
        } else {
            (self.blocks_written as f64 / self.total_blocks as f64) * 100.0
        }
    }

    /// Whether every planned block has been written
    pub fn is_complete(&self) -> bool {
        self.blocks_written >= self.total_blocks
    }
}

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(&WriteProgress) + Send + Sync>;

/// Result of a dump write that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The plan was empty; the tag was not touched
    NothingToWrite,
    /// Every planned block was written
    Completed {
        /// Number of blocks written
        blocks_written: usize,
    },
}

struct ResolvedWrite<'p> {
    sector: u8,
    block: u8,
    data: &'p Block,
    key: &'p Key,
    key_type: KeyType,
}

/// Executes write plans against a tag
pub struct DumpWriteExecutor<'c, C: ?Sized> {
    connector: &'c C,
    progress_callback: Option<ProgressCallback>,
}

impl<'c, C: TagConnector + ?Sized> DumpWriteExecutor<'c, C> {
    /// Create an executor acquiring sessions from `connector`
    pub fn new(connector: &'c C) -> Self {
        Self {
            connector,
            progress_callback: None,
        }
    }

    /// Set a callback invoked after every written block
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&WriteProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    pub(crate) fn with_callback(mut self, callback: Option<ProgressCallback>) -> Self {
        self.progress_callback = callback;
        self
    }

    /// Write every block of `plan`, taking payloads from `dump` and keys from
    /// `keys`
    ///
    /// An empty plan returns [`ExecutionOutcome::NothingToWrite`] without
    /// connecting. A block the plan names but `dump` or `keys` cannot supply
    /// fails with [`Error::PlanMismatch`] before the tag is touched.
    pub fn execute(
        &self,
        plan: &WritePlan,
        dump: &Dump,
        keys: &KeyMap,
    ) -> Result<ExecutionOutcome> {
        if plan.is_empty() {
            tracing::info!("Write plan is empty, nothing to write");
            return Ok(ExecutionOutcome::NothingToWrite);
        }

        let writes = resolve(plan, dump, keys)?;
        let total_blocks = writes.len();
        tracing::info!("Writing {} block(s)", total_blocks);

        let mut session = Session::open(self.connector)?;

        for (index, write) in writes.iter().enumerate() {
            let status = session.write_block(
                write.sector,
                write.block,
                write.data,
                write.key,
                write.key_type.use_as_key_b(),
            );

            let source = match status {
                WriteStatus::Success => {
                    tracing::debug!(
                        "Sector {}, block {}: written with key {}",
                        write.sector,
                        write.block,
                        write.key_type
                    );
                    if let Some(ref callback) = self.progress_callback {
                        callback(&WriteProgress {
                            blocks_written: index + 1,
                            total_blocks,
                            sector: write.sector,
                            block: write.block,
                        });
                    }
                    continue;
                }
                WriteStatus::NotInSector => WriteError::NotInSector {
                    sector: write.sector,
                    block: write.block,
                },
                WriteStatus::Failure => WriteError::Failed {
                    sector: write.sector,
                    block: write.block,
                },
            };

            tracing::warn!(
                "Aborting after {} of {} block(s): {}",
                index,
                total_blocks,
                source
            );
            return Err(Error::WriteAborted {
                sector: write.sector,
                block: write.block,
                source,
            });
        }

        tracing::info!("Wrote {} block(s)", total_blocks);
        Ok(ExecutionOutcome::Completed {
            blocks_written: total_blocks,
        })
    }
}

impl<C: TagConnector + Send + Sync + 'static> DumpWriteExecutor<'_, C> {
    /// Run [`execute`](Self::execute) on a worker thread
    ///
    /// The returned handle yields exactly one result. The caller stays free to
    /// animate a progress display meanwhile.
    pub fn spawn(
        connector: Arc<C>,
        plan: WritePlan,
        dump: Dump,
        keys: KeyMap,
        progress_callback: Option<ProgressCallback>,
    ) -> BackgroundWrite {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::spawn(move || {
            let result = DumpWriteExecutor::new(connector.as_ref())
                .with_callback(progress_callback)
                .execute(&plan, &dump, &keys);
            // The receiver may already be gone; the result is then discarded.
            let _ = sender.send(result);
        });
        BackgroundWrite { receiver, handle }
    }
}

/// Handle to a dump write running on a worker thread
pub struct BackgroundWrite {
    receiver: mpsc::Receiver<Result<ExecutionOutcome>>,
    handle: JoinHandle<()>,
}

impl BackgroundWrite {
    /// Whether the worker has finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker reports its result
    ///
    /// A worker that terminates without reporting yields [`Error::WorkerLost`].
    pub fn wait(self) -> Result<ExecutionOutcome> {
        let result = self.receiver.recv().map_err(|_| Error::WorkerLost)?;
        if self.handle.join().is_err() {
            tracing::warn!("Background writer panicked after reporting");
        }
        result
    }
}

fn resolve<'p>(
    plan: &WritePlan,
    dump: &'p Dump,
    keys: &'p KeyMap,
) -> Result<Vec<ResolvedWrite<'p>>> {
    plan.iter()
        .map(|(sector, block, key_type)| {
            let mismatch = || Error::PlanMismatch { sector, block };
            let data = dump.get(sector, block).ok_or_else(mismatch)?;
            let key = keys
                .get(sector)
                .and_then(|pair| pair.get(key_type))
                .ok_or_else(mismatch)?;
            Ok(ResolvedWrite {
                sector,
                block,
                data,
                key,
                key_type,
            })
        })
        .collect()
}
