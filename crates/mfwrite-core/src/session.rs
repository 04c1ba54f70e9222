//! Hardware seam
//!
//! Tag transceiving and authentication live outside this crate. The engine
//! only sees a [`TagSession`]: an exclusively owned handle to the present tag,
//! obtained from a [`TagConnector`] and closed when the [`Session`] guard is
//! dropped, on every exit path.

use crate::diagnostic::Diagnostics;
use crate::dump::{Block, Positions};
use crate::error::Result;
use crate::geometry::TagGeometry;
use crate::keys::{Key, KeyMap};
use std::ops::{Deref, DerefMut};

/// Outcome of one hardware block write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The block was written
    Success,
    /// The block index is not part of the sector on this tag
    NotInSector,
    /// Authentication or transfer failed
    Failure,
}

/// An open session with the present tag
#[cfg_attr(test, mockall::automock)]
pub trait TagSession {
    /// Sector layout of the present tag
    fn tag_geometry(&self) -> TagGeometry;

    /// Classify how each requested block may be written
    ///
    /// A sector missing from the result could not be evaluated (dead sector,
    /// no usable key, corrupted access bytes). An `Err` means the tag could
    /// not be checked at all.
    fn classify_writability(&mut self, positions: &Positions, keys: &KeyMap) -> Result<Diagnostics>;

    /// Authenticate with `key` (as key B if `use_as_key_b`) and write one block
    fn write_block(
        &mut self,
        sector: u8,
        block: u8,
        data: &Block,
        key: &Key,
        use_as_key_b: bool,
    ) -> WriteStatus;

    /// Release the tag
    fn close(&mut self);
}

/// Source of tag sessions (a reader, an emulator, ...)
#[cfg_attr(test, mockall::automock)]
pub trait TagConnector {
    /// Acquire exclusive access to the present tag
    fn connect(&self) -> Result<Box<dyn TagSession + Send>>;
}

/// Guard around an open [`TagSession`] that closes it when dropped
pub struct Session {
    inner: Box<dyn TagSession + Send>,
}

impl Session {
    /// Acquire a session from `connector`
    pub fn open<C: TagConnector + ?Sized>(connector: &C) -> Result<Self> {
        let inner = connector.connect()?;
        tracing::debug!("Tag session opened");
        Ok(Self { inner })
    }
}

impl Deref for Session {
    type Target = dyn TagSession + Send;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.inner.close();
        tracing::debug!("Tag session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_session_closes_on_drop() {
        let mut session = MockTagSession::new();
        session
            .expect_tag_geometry()
            .return_const(TagGeometry::CLASSIC_1K);
        session.expect_close().times(1).return_const(());

        let mut connector = MockTagConnector::new();
        connector
            .expect_connect()
            .times(1)
            .return_once(move || Ok(Box::new(session)));

        let session = Session::open(&connector).unwrap();
        assert_eq!(session.tag_geometry(), TagGeometry::CLASSIC_1K);
        drop(session);
    }

    #[test]
    fn test_connect_failure_propagates() {
        let mut connector = MockTagConnector::new();
        connector
            .expect_connect()
            .returning(|| Err(Error::Connection("no tag present".to_string())));

        let result = Session::open(&connector);
        assert!(matches!(result, Err(Error::Connection(_))));
    }
}
