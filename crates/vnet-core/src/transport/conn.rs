//! Handles, messages and error codes of the connection framework.

use bytes::Bytes;

/// Connection handle issued by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub i64);

/// Timer handle issued by the timer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub i64);

/// A typed message as carried by the connection framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub msg_type: u16,
    pub payload: Bytes,
}

impl Message {
    pub fn new(msg_type: u16, payload: Bytes) -> Self {
        Self { msg_type, payload }
    }
}

/// Connection-level error reported to a message's error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ConnError {
    #[error("connection closed")]
    Clean,
    #[error("connection timed out")]
    Timeout,
    #[error("connection destroyed")]
    Destroy,
    #[error("connect failed")]
    Connect,
    #[error("connection reset")]
    Reset,
    #[error("login failed")]
    Login,
    #[error("bad connection handle")]
    BadHandle,
    #[error("protocol error")]
    Protocol,
    #[error("cannot connect")]
    CantConnect,
}

impl ConnError {
    /// Framework error code (`CONN_ERROR_*`).
    pub fn code(self) -> i32 {
        match self {
            ConnError::Clean => 0,
            ConnError::Timeout => 1,
            ConnError::Destroy => 2,
            ConnError::Connect => 3,
            ConnError::Reset => 4,
            ConnError::Login => 5,
            ConnError::BadHandle => 6,
            ConnError::Protocol => 7,
            ConnError::CantConnect => 8,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => ConnError::Clean,
            1 => ConnError::Timeout,
            2 => ConnError::Destroy,
            3 => ConnError::Connect,
            4 => ConnError::Reset,
            5 => ConnError::Login,
            6 => ConnError::BadHandle,
            7 => ConnError::Protocol,
            8 => ConnError::CantConnect,
            _ => return None,
        })
    }
}

/// The storage collaborator rejected a read or write (negative status code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("slice storage failed with status {0}")]
pub struct StorageError(pub i32);

/// A timer could not be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("no async runtime to host the timer")]
    NoRuntime,
    #[error("timer service out of resources")]
    OutOfResource,
}
