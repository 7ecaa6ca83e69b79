//! Identifiers and simple allocators for core entities.

use serde::{Deserialize, Serialize};

/// One attached rig (character instance) inside a [`crate::Director`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RigId(pub u32);

/// Opaque reference to a clip of one [`crate::ActionBlender`].
/// Handles are dense indices in clip load order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ClipHandle(pub u32);

/// Registration of an audio-ended listener for one playback session.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u32);

/// Outstanding media (cue timeline + audio) request.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u32);

/// Monotonic allocator for rig, listener and request ids.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_rig: u32,
    next_listener: u32,
    next_request: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_rig(&mut self) -> RigId {
        let id = RigId(self.next_rig);
        self.next_rig = self.next_rig.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_listener(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener = self.next_listener.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_request(&mut self) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request = self.next_request.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_rig(), RigId(0));
        assert_eq!(alloc.alloc_rig(), RigId(1));
        assert_eq!(alloc.alloc_listener(), ListenerId(0));
        assert_eq!(alloc.alloc_listener(), ListenerId(1));
        assert_eq!(alloc.alloc_request(), RequestId(0));
        assert_eq!(alloc.alloc_request(), RequestId(1));
    }
}
