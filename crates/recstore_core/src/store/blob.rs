//! Blob actions: direct pass-through to the driver's blob table.

use super::action::{BlobOp, Reply};
use crate::driver::{Driver, DriverError};
use crate::error::{PayloadKind, StoreError, StoreResult};

const BLOB_ENTITY: &str = "blob";

pub(crate) fn execute(driver: &mut dyn Driver, max_bytes: usize, op: BlobOp) -> StoreResult<Reply> {
    match op {
        BlobOp::Retrieve { key } => match driver.blob_retrieve(&key) {
            Ok(bytes) => Ok(Reply::Blob(Some(bytes))),
            Err(DriverError::NotFound) => Ok(Reply::Blob(None)),
            Err(err) => Err(err.into()),
        },
        BlobOp::Create { key, bytes } => {
            check_size(&bytes, max_bytes)?;
            driver
                .blob_create(&key, &bytes)
                .map_err(|err| blob_error(&key, err))?;
            Ok(Reply::Done)
        }
        BlobOp::Update { key, bytes } => {
            check_size(&bytes, max_bytes)?;
            driver
                .blob_update(&key, &bytes)
                .map_err(|err| blob_error(&key, err))?;
            Ok(Reply::Done)
        }
        BlobOp::Remove { key } => {
            driver
                .blob_remove(&key)
                .map_err(|err| blob_error(&key, err))?;
            Ok(Reply::Done)
        }
    }
}

fn check_size(bytes: &[u8], max_bytes: usize) -> StoreResult<()> {
    if bytes.len() > max_bytes {
        return Err(StoreError::PayloadTooLarge {
            kind: PayloadKind::Blob,
            size: bytes.len(),
            max: max_bytes,
        });
    }
    Ok(())
}

fn blob_error(key: &str, err: DriverError) -> StoreError {
    match err {
        DriverError::NotFound => StoreError::not_found(BLOB_ENTITY, key),
        DriverError::Duplicate => StoreError::conflict(BLOB_ENTITY, key),
        other => StoreError::Backend(other),
    }
}
