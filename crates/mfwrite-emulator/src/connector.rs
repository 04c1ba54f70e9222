//! Connectors handing out virtual card sessions
//!
//! The image is loaded on `connect` and every accepted write is persisted
//! right away, so each session sees the card as the previous one left it.

use crate::card::VirtualCard;
use crate::image::CardImage;
use crate::{EmulatorError, Result};
use mfwrite_core::{TagConnector, TagSession};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Where a virtual card lives between sessions
#[derive(Debug, Clone)]
pub(crate) enum Backing {
    File(PathBuf),
    Shared(Arc<Mutex<CardImage>>),
}

impl Backing {
    fn load(&self) -> Result<CardImage> {
        match self {
            Backing::File(path) => CardImage::load(path),
            Backing::Shared(image) => Ok(image
                .lock()
                .map_err(|_| EmulatorError::Poisoned)?
                .clone()),
        }
    }

    pub(crate) fn persist(&self, image: &CardImage) -> Result<()> {
        match self {
            Backing::File(path) => image.save(path),
            Backing::Shared(shared) => {
                *shared.lock().map_err(|_| EmulatorError::Poisoned)? = image.clone();
                Ok(())
            }
        }
    }
}

/// [`TagConnector`] for a virtual card
#[derive(Debug, Clone)]
pub struct VirtualCardConnector {
    backing: Backing,
}

impl VirtualCardConnector {
    /// Card stored in a JSON image file
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            backing: Backing::File(path.as_ref().to_path_buf()),
        }
    }

    /// Card held in memory, shared with the caller
    pub fn shared(image: Arc<Mutex<CardImage>>) -> Self {
        Self {
            backing: Backing::Shared(image),
        }
    }

    /// Card held in memory
    pub fn in_memory(image: CardImage) -> Self {
        Self::shared(Arc::new(Mutex::new(image)))
    }

    /// Current card contents
    pub fn snapshot(&self) -> Result<CardImage> {
        self.backing.load()
    }

    /// Open a session directly, without going through [`TagConnector`]
    pub fn open(&self) -> Result<VirtualCard> {
        let image = self.backing.load()?;
        Ok(VirtualCard::with_backing(image, self.backing.clone()))
    }
}

impl TagConnector for VirtualCardConnector {
    fn connect(&self) -> mfwrite_core::Result<Box<dyn TagSession + Send>> {
        let card = self
            .open()
            .map_err(|e| mfwrite_core::Error::Connection(e.to_string()))?;
        tracing::debug!("Virtual card present: {}", card.image().geometry);
        Ok(Box::new(card))
    }
}
