use serde::{Deserialize, Serialize};
use voxelspace_common::{Body, EntityId, PlayerId, SessionId, Vec3};

/// A simulated non-player object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Free-form type tag, e.g. `"item"` or `"drone"`.
    pub kind: String,
    pub body: Body,
}

impl Entity {
    pub fn new(kind: impl Into<String>, body: Body) -> Self {
        Self {
            id: EntityId::new(),
            kind: kind.into(),
            body,
        }
    }
}

/// A connected (or detached) participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub body: Body,
    /// Connection handle owned by the protocol layer. Never persisted; a
    /// restored player is detached until someone joins with its id.
    #[serde(skip)]
    pub session: Option<SessionId>,
}

impl Player {
    /// A detached player at `position` with the standard hitbox.
    pub fn new(id: PlayerId, position: Vec3) -> Self {
        Self {
            id,
            body: Body::at(position, Body::PLAYER_BOUNDS),
            session: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.session.is_some()
    }
}
