use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdgeError {
    #[error("Interface not supported or not found")]
    InterfaceNotSupported,

    #[error("Permission denied (requires CAP_NET_RAW)")]
    PermissionDenied,

    #[error("Frame pool exhausted")]
    PoolExhausted,

    #[error("Cannot pin thread to core {0}")]
    Affinity(usize),

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl EdgeError {
    /// Map socket setup failures onto the variants callers can act on.
    pub fn from_setup(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => EdgeError::PermissionDenied,
            io::ErrorKind::NotFound => EdgeError::InterfaceNotSupported,
            _ if is_missing_device(&err) => EdgeError::InterfaceNotSupported,
            _ => EdgeError::Io(err),
        }
    }
}

#[cfg(target_os = "linux")]
fn is_missing_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(fluxedge_core::sys::ENODEV)
}

#[cfg(not(target_os = "linux"))]
fn is_missing_device(_err: &io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_error_mapping() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(EdgeError::from_setup(denied), EdgeError::PermissionDenied));

        let other = io::Error::new(io::ErrorKind::Other, "boom");
        assert!(matches!(EdgeError::from_setup(other), EdgeError::Io(_)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_missing_device_maps_to_unsupported() {
        let no_dev = io::Error::from_raw_os_error(fluxedge_core::sys::ENODEV);
        assert!(matches!(EdgeError::from_setup(no_dev), EdgeError::InterfaceNotSupported));
    }
}
