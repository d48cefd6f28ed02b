//! Wire messages. JSON, one object per message, discriminated by `"type"`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use voxelspace_common::{ChunkCoord, ChunkData, ChunkKey, EntityId, IVec3, PlayerId, Vec3, Voxel};
use voxelspace_kernel::{Entity, Player, WorldEvent, WorldSettings};

/// Chunks keyed by their `"x,y,z"` string.
pub type ChunkMap = BTreeMap<ChunkKey, ChunkData>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        #[serde(default)]
        player_id: Option<PlayerId>,
    },
    Move {
        #[serde(with = "voxelspace_common::xyz")]
        position: Vec3,
        #[serde(with = "voxelspace_common::xyz")]
        rotation: Vec3,
        #[serde(default, with = "voxelspace_common::xyz")]
        velocity: Vec3,
    },
    PlaceBlock {
        x: i32,
        y: i32,
        z: i32,
        /// Wider than a voxel so out-of-range ids are reported, not
        /// rejected as malformed.
        block_type: i64,
    },
    BreakBlock {
        x: i32,
        y: i32,
        z: i32,
    },
    RequestChunks {
        chunks: Vec<ChunkCoord>,
    },
    Chat {
        message: String,
    },
    /// The interaction type travels as `kind`; `type` is the envelope tag.
    Interact {
        kind: String,
        #[serde(default)]
        target: serde_json::Value,
    },
}

impl ClientMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::Move { .. } => "move",
            ClientMessage::PlaceBlock { .. } => "place_block",
            ClientMessage::BreakBlock { .. } => "break_block",
            ClientMessage::RequestChunks { .. } => "request_chunks",
            ClientMessage::Chat { .. } => "chat",
            ClientMessage::Interact { .. } => "interact",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    InitialState {
        player_id: PlayerId,
        chunks: ChunkMap,
        players: Vec<PlayerView>,
        settings: SettingsView,
    },
    WorldUpdate {
        updates: WorldUpdates,
    },
    ChunkData {
        chunks: ChunkMap,
    },
    PlayerJoined {
        player: PlayerView,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    PlayerMoved {
        player_id: PlayerId,
        #[serde(with = "voxelspace_common::xyz")]
        position: Vec3,
        #[serde(with = "voxelspace_common::xyz")]
        rotation: Vec3,
    },
    BlockUpdate {
        position: BlockPos,
        block_type: Voxel,
    },
    Chat {
        player_id: PlayerId,
        message: String,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Integer block position as an `{x, y, z}` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl From<IVec3> for BlockPos {
    fn from(v: IVec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<BlockPos> for IVec3 {
    fn from(p: BlockPos) -> Self {
        IVec3::new(p.x, p.y, p.z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    #[serde(with = "voxelspace_common::xyz")]
    pub position: Vec3,
    #[serde(with = "voxelspace_common::xyz")]
    pub rotation: Vec3,
}

impl From<&Player> for PlayerView {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            position: p.body.position,
            rotation: p.body.rotation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "voxelspace_common::xyz")]
    pub position: Vec3,
    #[serde(with = "voxelspace_common::xyz")]
    pub rotation: Vec3,
}

impl From<&Entity> for EntityView {
    fn from(e: &Entity) -> Self {
        Self {
            id: e.id,
            kind: e.kind.clone(),
            position: e.body.position,
            rotation: e.body.rotation,
        }
    }
}

/// The subset of world settings clients need.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub view_distance: i32,
    pub gravity: f32,
}

impl From<&WorldSettings> for SettingsView {
    fn from(s: &WorldSettings) -> Self {
        Self {
            view_distance: s.view_distance,
            gravity: s.gravity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockChange {
    pub position: BlockPos,
    pub block_type: Voxel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum GameEvent {
    EntitySpawned {
        id: EntityId,
        kind: String,
    },
    EntityDespawned {
        id: EntityId,
    },
    Interaction {
        player_id: PlayerId,
        kind: String,
        target: serde_json::Value,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldUpdates {
    pub entities: Vec<EntityView>,
    pub blocks: Vec<BlockChange>,
    pub events: Vec<GameEvent>,
}

impl WorldUpdates {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.blocks.is_empty() && self.events.is_empty()
    }
}

/// Where a drained world event goes on the wire, if anywhere.
pub(crate) enum Fanout {
    Block(BlockChange),
    Event(GameEvent),
    Skip,
}

impl From<WorldEvent> for Fanout {
    fn from(event: WorldEvent) -> Self {
        match event {
            WorldEvent::BlockChanged { position, voxel } => Fanout::Block(BlockChange {
                position: position.into(),
                block_type: voxel,
            }),
            WorldEvent::EntitySpawned { id, kind } => {
                Fanout::Event(GameEvent::EntitySpawned { id, kind })
            }
            WorldEvent::EntityDespawned { id } => Fanout::Event(GameEvent::EntityDespawned { id }),
            WorldEvent::Interaction {
                player,
                kind,
                target,
            } => Fanout::Event(GameEvent::Interaction {
                player_id: player,
                kind,
                target,
            }),
            // Joins and leaves have their own messages.
            WorldEvent::PlayerAdded { .. }
            | WorldEvent::PlayerRemoved { .. }
            | WorldEvent::Stepped { .. } => Fanout::Skip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_messages_parse_from_wire_shapes() {
        let join: ClientMessage = serde_json::from_str(r#"{"type":"join"}"#).unwrap();
        assert_eq!(join, ClientMessage::Join { player_id: None });

        let join: ClientMessage =
            serde_json::from_str(r#"{"type":"join","playerId":"bob"}"#).unwrap();
        assert_eq!(join, ClientMessage::Join {
            player_id: Some(PlayerId::from("bob"))
        });

        let place: ClientMessage = serde_json::from_value(json!({
            "type": "place_block", "x": -1, "y": 70, "z": 4, "blockType": 8
        }))
        .unwrap();
        assert_eq!(place, ClientMessage::PlaceBlock {
            x: -1,
            y: 70,
            z: 4,
            block_type: 8
        });

        let mv: ClientMessage = serde_json::from_value(json!({
            "type": "move",
            "position": {"x": 1.5, "y": 2.0, "z": 3.0},
            "rotation": {"x": 0.0, "y": 1.0, "z": 0.0}
        }))
        .unwrap();
        assert!(matches!(mv, ClientMessage::Move { velocity, .. } if velocity == Vec3::ZERO));

        let req: ClientMessage = serde_json::from_value(json!({
            "type": "request_chunks", "chunks": [{"x": 0, "y": 2, "z": -1}]
        }))
        .unwrap();
        assert_eq!(req, ClientMessage::RequestChunks {
            chunks: vec![ChunkCoord::new(0, 2, -1)]
        });

        let interact: ClientMessage = serde_json::from_value(json!({
            "type": "interact", "kind": "npc", "target": {"id": 3}
        }))
        .unwrap();
        assert_eq!(interact.name(), "interact");
    }

    #[test]
    fn unknown_or_incomplete_messages_fail() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"teleport"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"break_block","x":1}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }

    #[test]
    fn server_messages_use_wire_field_names() {
        let msg = ServerMessage::BlockUpdate {
            position: BlockPos { x: 1, y: -2, z: 3 },
            block_type: 4,
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "block_update", "position": {"x": 1, "y": -2, "z": 3}, "blockType": 4})
        );

        let left = ServerMessage::PlayerLeft {
            player_id: PlayerId::from("p"),
        };
        assert_eq!(
            serde_json::to_value(&left).unwrap(),
            json!({"type": "player_left", "playerId": "p"})
        );

        let update = ServerMessage::WorldUpdate {
            updates: WorldUpdates {
                events: vec![GameEvent::Interaction {
                    player_id: PlayerId::from("p"),
                    kind: "npc".into(),
                    target: json!(null),
                }],
                ..WorldUpdates::default()
            },
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["type"], "world_update");
        assert_eq!(value["updates"]["events"][0]["type"], "interaction");
        assert_eq!(value["updates"]["events"][0]["playerId"], "p");
    }

    #[test]
    fn chunk_maps_key_by_canonical_string() {
        let mut chunks = ChunkMap::new();
        chunks.insert(ChunkCoord::new(-1, 0, 2).key(), ChunkData {
            voxels: vec![0; 4],
            modified: false,
        });
        let value = serde_json::to_value(ServerMessage::ChunkData { chunks }).unwrap();
        assert_eq!(value["chunks"]["-1,0,2"]["modified"], false);
    }
}
