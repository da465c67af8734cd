//! Zip signature check.
//!
//! Only the local-file-header signature at offset zero is verified; archive
//! contents are never inspected.
use std::io::{self, Read};

use crate::error::{IngestError, IoStage, ValidationError};

/// `PK\x03\x04`
pub const ZIP_LOCAL_FILE_HEADER: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Read exactly four bytes and compare them against [`ZIP_LOCAL_FILE_HEADER`].
///
/// Short input is an invalid archive, not an I/O error. Nothing past the
/// signature is read.
///
/// ```rust
/// use ingest::{check_zip_signature, IngestError, ValidationError};
///
/// assert!(check_zip_signature(&mut &b"PK\x03\x04rest"[..]).is_ok());
/// assert!(matches!(
///     check_zip_signature(&mut &b"\x89PNG"[..]),
///     Err(IngestError::Validation(ValidationError::InvalidArchive))
/// ));
/// ```
pub fn check_zip_signature<R: Read>(reader: &mut R) -> Result<(), IngestError> {
    let mut signature = [0u8; 4];
    let mut filled = 0;
    while filled < signature.len() {
        match reader.read(&mut signature[filled..]) {
            Ok(0) => return Err(ValidationError::InvalidArchive.into()),
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(IngestError::io(IoStage::ReadSource, err)),
        }
    }

    if signature != ZIP_LOCAL_FILE_HEADER {
        return Err(ValidationError::InvalidArchive.into());
    }
    Ok(())
}
