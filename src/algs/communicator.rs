//! Thin façade over in-process (threaded) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable**; the collective phases call `.wait()` before
//! they trust that a buffer is ready. Every phase of a reconciliation pass is
//! a blocking collective: a rank that never answers blocks its peers forever.

use crate::amr_error::AmrError;
use crate::algs::wire::expect_exact_len;
use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Typed message tag. Each collective phase owns one tag so that messages
/// from different phases never match each other.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    pub const fn offset(self, by: u16) -> Self {
        Self(self.0.wrapping_add(by))
    }
}

/// Message-passing interface used by every collective phase.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Blocking send.
    fn send(&self, peer: usize, tag: CommTag, buf: &[u8]) {
        let _ = self.isend(peer, tag.as_u16(), buf).wait();
    }

    /// Blocking receive of exactly `len` bytes.
    fn recv_exact(&self, peer: usize, tag: CommTag, len: usize) -> Result<Vec<u8>, AmrError> {
        if peer >= self.size() {
            return Err(AmrError::CommError {
                neighbor: peer,
                message: format!("no such rank in a group of {}", self.size()),
            });
        }
        let mut buf = vec![0u8; len];
        let handle = self.irecv(peer, tag.as_u16(), &mut buf);
        match handle.wait() {
            Some(data) => {
                expect_exact_len(peer, data.len(), len)?;
                Ok(data)
            }
            None => Ok(buf),
        }
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Compile-time no-op comm for a single serial process.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
}

// --- LocalComm: in-process ranks on threads ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Mailbox {
    queues: Mutex<HashMap<Key, VecDeque<Bytes>>>,
    arrived: Condvar,
}

/// One rank of a group of ranks living in the same process.
///
/// Messages are FIFO per `(src, dst, tag)`. Sends never block; receives
/// block until a matching message arrives.
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl LocalComm {
    /// `size` connected ranks sharing one mailbox; hand one to each thread.
    pub fn world(size: usize) -> Vec<LocalComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }
}

/// Receive handle of [`LocalComm`]; waiting blocks on the mailbox.
pub struct LocalHandle {
    key: Key,
    mailbox: Arc<Mailbox>,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let mut queues = self.mailbox.queues.lock();
        loop {
            if let Some(bytes) = queues.get_mut(&self.key).and_then(VecDeque::pop_front) {
                return Some(bytes.to_vec());
            }
            self.mailbox.arrived.wait(&mut queues);
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        let key = (self.rank, peer, tag);
        self.mailbox
            .queues
            .lock()
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
        self.mailbox.arrived.notify_all();
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> LocalHandle {
        LocalHandle {
            key: (peer, self.rank, tag),
            mailbox: Arc::clone(&self.mailbox),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    // `mpi::traits` has its own `Communicator`; keep only its methods in scope.
    use mpi::traits::{Communicator as _, Destination, Source};

    /// Blocking point-to-point transport over the MPI world communicator.
    pub struct MpiComm {
        _universe: Universe,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Initialize MPI; `None` if it was already initialized.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                _universe: universe,
                world,
                rank,
                size,
            })
        }
    }

    /// MPI operations complete before the handle is returned.
    pub struct MpiHandle(Option<Vec<u8>>);

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
            MpiHandle(None)
        }

        fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> MpiHandle {
            let (data, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(i32::from(tag));
            MpiHandle(Some(data))
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_roundtrip_two_ranks() {
        let comms = LocalComm::world(2);
        let tag = CommTag::new(7);
        comms[0].send(1, tag, &[1, 2, 3, 4]);
        let data = comms[1].recv_exact(0, tag, 4).unwrap();
        assert_eq!(data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn local_messages_are_fifo_per_tag() {
        let comms = LocalComm::world(2);
        comms[0].send(1, CommTag::new(1), &[1]);
        comms[0].send(1, CommTag::new(2), &[9]);
        comms[0].send(1, CommTag::new(1), &[2]);
        assert_eq!(comms[1].recv_exact(0, CommTag::new(2), 1).unwrap(), vec![9]);
        assert_eq!(comms[1].recv_exact(0, CommTag::new(1), 1).unwrap(), vec![1]);
        assert_eq!(comms[1].recv_exact(0, CommTag::new(1), 1).unwrap(), vec![2]);
    }

    #[test]
    fn short_message_is_a_length_mismatch() {
        let comms = LocalComm::world(2);
        comms[1].send(0, CommTag::new(3), &[5, 6]);
        assert_eq!(
            comms[0].recv_exact(1, CommTag::new(3), 3),
            Err(AmrError::MessageLengthMismatch {
                neighbor: 1,
                expected: 3,
                got: 2
            })
        );
    }

    #[test]
    fn receive_blocks_until_send() {
        let mut comms = LocalComm::world(2);
        let c1 = comms.pop().unwrap();
        let c0 = comms.pop().unwrap();
        let t = std::thread::spawn(move || c1.recv_exact(0, CommTag::new(4), 2).unwrap());
        std::thread::sleep(std::time::Duration::from_millis(20));
        c0.send(1, CommTag::new(4), &[7, 8]);
        assert_eq!(t.join().unwrap(), vec![7, 8]);
    }

    #[test]
    fn no_comm_is_a_single_rank() {
        assert_eq!((NoComm.rank(), NoComm.size()), (0, 1));
    }
}
