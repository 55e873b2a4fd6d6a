//! 写入前的参数校验。

use crate::error::StorageError;

/// 设备 ID 不能为空。
pub fn ensure_device_id(device_id: &str) -> Result<(), StorageError> {
    if device_id.trim().is_empty() {
        return Err(StorageError::new("device_id required"));
    }
    Ok(())
}
