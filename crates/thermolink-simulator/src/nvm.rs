//! File-backed settings NVM.
//!
//! The raw settings block is wrapped in a small postcard record so that a
//! file from an unrelated program, or one written by an incompatible build,
//! reads back as erased flash instead of garbage settings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thermolink_core::settings::Nvm;

const MAGIC: u32 = 0x544C_4E56;
const VERSION: u16 = 1;

/// Value of an erased flash byte.
const ERASED: u8 = 0xFF;

#[derive(Debug, Serialize, Deserialize)]
struct NvmImage {
    magic: u32,
    version: u16,
    block: Vec<u8>,
}

pub struct FileNvm {
    path: PathBuf,
}

impl FileNvm {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> io::Result<Option<Vec<u8>>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let image: NvmImage = match postcard::from_bytes(&bytes) {
            Ok(image) => image,
            Err(e) => {
                warn!("{} is not an NVM image: {}", self.path.display(), e);
                return Ok(None);
            }
        };
        if image.magic != MAGIC || image.version != VERSION {
            warn!(
                "{} has magic 0x{:08X} version {}, expected 0x{:08X} version {}",
                self.path.display(),
                image.magic,
                image.version,
                MAGIC,
                VERSION
            );
            return Ok(None);
        }
        Ok(Some(image.block))
    }

    fn store(&self, data: &[u8]) -> anyhow::Result<()> {
        let image = NvmImage {
            magic: MAGIC,
            version: VERSION,
            block: data.to_vec(),
        };
        let bytes = postcard::to_allocvec(&image)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

impl Nvm for FileNvm {
    fn read(&mut self, destination: &mut [u8]) {
        destination.fill(ERASED);
        match self.load() {
            Ok(Some(block)) => {
                let count = block.len().min(destination.len());
                destination[..count].copy_from_slice(&block[..count]);
            }
            Ok(None) => info!("No settings image at {}", self.path.display()),
            Err(e) => error!("Reading {} failed: {}", self.path.display(), e),
        }
    }

    fn write(&mut self, data: &[u8]) {
        if let Err(e) = self.store(data) {
            error!("Writing {} failed: {:#}", self.path.display(), e);
        }
    }
}
