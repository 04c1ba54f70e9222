//! End-to-end write orchestration
//!
//! [`TagWriter`] ties the pieces together the way an operator uses them:
//! check a dump against the present tag, show the plan and its conflicts,
//! then execute the plan (inline or on a worker thread). Single block writes
//! and factory formatting go through the same type.

use crate::config::Config;
use crate::dump::{Block, Dump};
use crate::error::{Error, Result};
use crate::executor::{BackgroundWrite, DumpWriteExecutor, ExecutionOutcome, ProgressCallback};
use crate::factory;
use crate::geometry::TagGeometry;
use crate::keys::{KeyMap, KeyPair};
use crate::plan::{ConflictReport, WritePlan, WritePlanBuilder};
use crate::session::{Session, TagConnector};
use crate::single::{BlockTarget, SingleBlockWriter};
use std::sync::Arc;

/// A dump checked against the present tag, ready to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWrite {
    /// Geometry of the tag the dump was checked against
    pub geometry: TagGeometry,
    /// The dump as it will be written (static access conditions applied)
    pub dump: Dump,
    /// Blocks that will be written
    pub plan: WritePlan,
    /// Blocks and sectors that will be skipped
    pub report: ConflictReport,
}

impl PreparedWrite {
    /// Whether executing would write nothing
    pub fn is_empty(&self) -> bool {
        self.plan.is_empty()
    }
}

/// Orchestrates write operations against tags from one connector
pub struct TagWriter<C> {
    connector: Arc<C>,
    config: Config,
}

impl<C: TagConnector> TagWriter<C> {
    /// Create a writer with default configuration
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, Config::default())
    }

    /// Create a writer with custom configuration
    pub fn with_config(connector: C, config: Config) -> Self {
        Self {
            connector: Arc::new(connector),
            config,
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying connector
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Geometry of the present tag
    pub fn tag_geometry(&self) -> Result<TagGeometry> {
        let session = Session::open(self.connector.as_ref())?;
        Ok(session.tag_geometry())
    }

    /// Check `dump` against the present tag and plan its write
    ///
    /// Configured static access conditions are applied to the dump's
    /// trailers first. Fails if the dump does not fit the tag or the tag
    /// cannot be checked; skipped blocks end up in the report.
    pub fn prepare_dump(&self, dump: Dump, keys: &KeyMap) -> Result<PreparedWrite> {
        let dump = match self.config.static_access_conditions {
            Some(ac) => {
                tracing::info!("Applying static access conditions {}", hex::encode_upper(ac));
                dump.with_static_access_conditions(ac)
            }
            None => dump,
        };

        let session = Session::open(self.connector.as_ref())?;
        let geometry = session.tag_geometry();
        tracing::info!("Tag detected: {}", geometry);
        self.prepare_with(session, geometry, dump, keys)
    }

    /// Plan restoring the present tag to its factory state
    pub fn prepare_factory_format(&self, keys: &KeyMap) -> Result<PreparedWrite> {
        let session = Session::open(self.connector.as_ref())?;
        let geometry = session.tag_geometry();
        tracing::info!("Formatting {}", geometry);
        let dump = factory::synthesize(&geometry);
        self.prepare_with(session, geometry, dump, keys)
    }

    fn prepare_with(
        &self,
        mut session: Session,
        geometry: TagGeometry,
        dump: Dump,
        keys: &KeyMap,
    ) -> Result<PreparedWrite> {
        dump.check_fits(&geometry)?;

        let diagnostics = session
            .classify_writability(&dump.positions(), keys)
            .map_err(|e| match e {
                Error::Connection(_) => e,
                other => Error::Connection(format!("Could not check tag: {}", other)),
            })?;
        drop(session);

        let (plan, report) = WritePlanBuilder::new()
            .allow_manufacturer_write(self.config.allow_manufacturer_write)
            .build(&dump, keys, &geometry, &diagnostics)?;

        Ok(PreparedWrite {
            geometry,
            dump,
            plan,
            report,
        })
    }

    /// Execute a prepared write on the calling thread
    pub fn write_dump(
        &self,
        prepared: &PreparedWrite,
        keys: &KeyMap,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<ExecutionOutcome> {
        DumpWriteExecutor::new(self.connector.as_ref())
            .with_callback(progress_callback)
            .execute(&prepared.plan, &prepared.dump, keys)
    }

    /// Write one block, trying key B before key A
    pub fn write_block(&self, target: BlockTarget, data: &Block, keys: &KeyPair) -> Result<()> {
        if target.is_manufacturer_block() {
            tracing::warn!("Writing the manufacturer block");
        } else if target.is_sector_trailer() {
            tracing::warn!(
                "Writing block {} of sector {}, a sector trailer on most tags",
                target.block(),
                target.sector()
            );
        }

        let mut session = Session::open(self.connector.as_ref())?;
        SingleBlockWriter::new(&mut *session).write_one(target, data, keys)?;
        Ok(())
    }
}

impl<C: TagConnector + Send + Sync + 'static> TagWriter<C> {
    /// Execute a prepared write on a worker thread
    pub fn spawn_write(
        &self,
        prepared: PreparedWrite,
        keys: KeyMap,
        progress_callback: Option<ProgressCallback>,
    ) -> BackgroundWrite {
        DumpWriteExecutor::spawn(
            Arc::clone(&self.connector),
            prepared.plan,
            prepared.dump,
            keys,
            progress_callback,
        )
    }
}
