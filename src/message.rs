use serde::{Deserialize, Serialize};

use crate::meta::Meta;

/// A peer known to the tracker: a node_id identifying the process, and the
/// UDP endpoint it serves pieces from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Owner {
    pub node_id: u64,
    pub host: String,
    pub port: u16,
}

/// One row of a `LIST` response: a swarm summary, not the full owner list.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ListItem {
    pub infohash: String,
    pub filename: String,
    pub size: u64,
    pub pieces: usize,
    pub peers: usize,
}

/// Tracker-directed requests, tagged by `mode`, one variant per spec
/// message kind. Unknown modes fail to deserialize and are discarded by
/// the receive loop rather than rejected with a reply (UDP losses and
/// malformed datagrams are silently dropped).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum TrackerRequest {
    #[serde(rename = "OWN")]
    Own {
        node_id: u64,
        host: String,
        port: u16,
        infohash: String,
        meta: Meta,
    },
    #[serde(rename = "REGISTER")]
    Register { node_id: u64, infohash: String },
    #[serde(rename = "NEED")]
    Need { node_id: u64, infohash: String },
    #[serde(rename = "LIST")]
    List { node_id: u64 },
    #[serde(rename = "FIND_BY_NAME")]
    FindByName { node_id: u64, filename: String },
    #[serde(rename = "EXIT")]
    Exit { node_id: u64, infohash: String },
}

/// Tracker replies. `Own`, `Register`, and `Exit` produce no reply at all
/// (handled by simply not sending anything back), so this enum only
/// covers the request kinds that answer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackerResponse {
    Need(NeedResponse),
    List(ListResponse),
    FindByName(FindByNameResponse),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NeedResponse {
    Ok {
        ok: bool,
        infohash: String,
        meta: Meta,
        peers: Vec<Owner>,
    },
    NotFound {
        ok: bool,
        error: String,
        infohash: String,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub ok: bool,
    pub items: Vec<ListItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FindByNameResponse {
    Match {
        ok: bool,
        filename: String,
        #[serde(rename = "match")]
        matched: ListItem,
    },
    NotFoundOrAmbiguous {
        ok: bool,
        error: String,
        filename: String,
        matches: Vec<ListItem>,
    },
}

/// Peer-to-peer messages, tagged by `type`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerMessage {
    #[serde(rename = "GET_PIECE")]
    GetPiece { ih: String, piece: usize },
    #[serde(rename = "PIECE_BLOCK")]
    PieceBlock {
        ih: String,
        piece: usize,
        block: usize,
        total_blocks: usize,
        data: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_request_round_trips() {
        let req = TrackerRequest::Own {
            node_id: 1,
            host: "127.0.0.1".into(),
            port: 9000,
            infohash: "abc".into(),
            meta: Meta {
                filename: "f".into(),
                size: 1,
                piece_size: 1,
                piece_hashes: vec!["h".into()],
            },
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""mode":"OWN""#));
        let back: TrackerRequest = serde_json::from_str(&json).unwrap();
        match back {
            TrackerRequest::Own { node_id, .. } => assert_eq!(node_id, 1),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn get_piece_round_trips() {
        let msg = PeerMessage::GetPiece {
            ih: "abc".into(),
            piece: 3,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"GET_PIECE""#));
        let back: PeerMessage = serde_json::from_str(&json).unwrap();
        match back {
            PeerMessage::GetPiece { piece, .. } => assert_eq!(piece, 3),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unknown_mode_fails_to_parse() {
        let raw = r#"{"mode":"BOGUS","node_id":1}"#;
        assert!(serde_json::from_str::<TrackerRequest>(raw).is_err());
    }
}
