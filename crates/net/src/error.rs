use voxelspace_common::PlayerId;
use voxelspace_kernel::{StorageError, WorldError};

/// Why a client request was refused. The display text is what the client
/// receives in its `error` reply.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("join before sending {0}")]
    NotJoined(&'static str),
    #[error("already joined as {0}")]
    AlreadyJoined(PlayerId),
    #[error("player {0} is already connected")]
    PlayerConnected(PlayerId),
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
    #[error("block y={y} is outside the world ({min}..={max})")]
    OutOfBounds { y: i32, min: i32, max: i32 },
    #[error("unknown block type {0}")]
    UnknownBlock(i64),
    #[error("block is {distance:.1} away, reach is {reach:.1}")]
    OutOfReach { distance: f32, reach: f32 },
    #[error("requested {requested} chunks, limit is {limit}")]
    TooManyChunks { requested: usize, limit: usize },
    #[error("chat message longer than {0} characters")]
    ChatTooLong(usize),
    #[error("player {0} was not restored; join again")]
    NotRestored(PlayerId),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),
}
