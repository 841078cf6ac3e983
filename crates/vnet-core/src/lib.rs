pub mod config;
pub mod logging;

pub mod checksum;
pub mod chunk_plan;
pub mod deadline;
pub mod node_pool;
pub mod protocol;
pub mod retry;
pub mod session;
pub mod sim;
pub mod slot;
pub mod storage;
pub mod transport;

pub use session::{
    DoneCallback, DownloadResult, SessionError, SessionHandle, SessionSummary, SliceDownloader,
};
pub use transport::{Collaborators, NodeId, Slice, TransportContext};
