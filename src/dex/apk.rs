//! Pulling the `classes*.dex` series out of an APK.
//!
//! An APK is a ZIP archive whose DEX entries are named `classes.dex`,
//! `classes2.dex`, `classes3.dex`, … with no gaps. The loader extracts
//! them in that order into owned buffers; the caller keeps the buffers
//! alive and parses each with [`DexReader::new`](super::DexReader::new).

use std::{fs::File, io::BufReader, io::Read, path::Path};

use zip::{result::ZipError, ZipArchive};

/// An error produced while extracting DEX entries from an APK.
#[derive(Debug, thiserror::Error)]
pub enum ApkError {
    /// The archive could not be opened or an entry could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not a readable ZIP archive.
    #[error("error reading archive: {0}")]
    Zip(#[from] ZipError),
    /// The archive contains no `classes.dex` entry.
    #[error("no classes.dex entry in the archive")]
    NoDex,
}

/// Reads every `classes*.dex` entry of the APK at `path`, in series order.
///
/// # Errors
/// See [`ApkError`]. An APK without a `classes.dex` yields
/// [`ApkError::NoDex`].
pub fn read_dex_entries<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<u8>>, ApkError> {
    let file = File::open(path.as_ref())?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let mut buffers = Vec::new();
    for ordinal in 1usize.. {
        let name = if ordinal == 1 {
            "classes.dex".to_owned()
        } else {
            format!("classes{ordinal}.dex")
        };
        let mut entry = match archive.by_name(&name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => break,
            Err(err) => return Err(err.into()),
        };
        let mut buffer = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut buffer)?;
        buffers.push(buffer);
    }
    if buffers.is_empty() {
        return Err(ApkError::NoDex);
    }
    Ok(buffers)
}
