use std::collections::BTreeMap;

use log::info;
use ndn_core::{Data, Interest, Nack};

/// Face identity. `0` is never a valid face.
pub type FaceId = u64;

/// Reserved id meaning "no face"
pub const INVALID_FACE_ID: FaceId = 0;
/// Reserved id used to tag Data served from the content store
pub const CONTENT_STORE_FACE_ID: FaceId = 254;

/// Whether a face connects to a local application or to the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceScope {
    Local,
    NonLocal,
}

/// Link type of the underlying communication channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    PointToPoint,
    MultiAccess,
    AdHoc,
}

/// Per-face packet counters
#[derive(Debug, Clone, Default)]
pub struct FaceCounters {
    pub packets_in: u64,
    pub packets_out: u64,
    /// Interests received with hop-limit already zero
    pub n_in_hop_limit_zero: u64,
    /// Interest sends refused because hop-limit zero met a non-local link
    pub n_out_hop_limit_zero: u64,
}

/// A communication endpoint consumed by the forwarder
///
/// Implementations live outside the forwarding core; they deliver received
/// packets by calling the forwarder entry points on the forwarder's thread and
/// transmit whatever the forwarder hands to `send_*`.
pub trait Face {
    fn id(&self) -> FaceId;
    fn scope(&self) -> FaceScope;
    fn link_type(&self) -> LinkType;
    fn send_interest(&mut self, interest: &Interest);
    fn send_data(&mut self, data: &Data);
    fn send_nack(&mut self, nack: &Nack);
    fn counters(&self) -> &FaceCounters;
    fn counters_mut(&mut self) -> &mut FaceCounters;
}

/// Errors raised by face registration
#[derive(Debug, thiserror::Error)]
pub enum FaceTableError {
    #[error("Face id 0 is reserved")]
    InvalidId,
    #[error("Face already exists: {0}")]
    AlreadyExists(FaceId),
}

/// Registry of the faces currently attached to the forwarder
#[derive(Default)]
pub struct FaceTable {
    faces: BTreeMap<FaceId, Box<dyn Face>>,
}

impl FaceTable {
    pub fn new() -> Self {
        Self { faces: BTreeMap::new() }
    }

    /// Register a face under the id it reports
    pub fn add(&mut self, face: Box<dyn Face>) -> Result<FaceId, FaceTableError> {
        let id = face.id();
        if id == INVALID_FACE_ID {
            return Err(FaceTableError::InvalidId);
        }
        if self.faces.contains_key(&id) {
            return Err(FaceTableError::AlreadyExists(id));
        }
        self.faces.insert(id, face);
        info!("Added face {}", id);
        Ok(id)
    }

    pub fn remove(&mut self, id: FaceId) -> Option<Box<dyn Face>> {
        let face = self.faces.remove(&id);
        if face.is_some() {
            info!("Removed face {}", id);
        }
        face
    }

    pub fn get(&self, id: FaceId) -> Option<&dyn Face> {
        self.faces.get(&id).map(Box::as_ref)
    }

    pub fn get_mut(&mut self, id: FaceId) -> Option<&mut Box<dyn Face>> {
        self.faces.get_mut(&id)
    }

    pub fn contains(&self, id: FaceId) -> bool {
        self.faces.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}
