//! MPI runtime
use crate::traits::{CartesianComm, Operation, ProcessGroup, TransferFailure};
use crate::types::{Cell, Rank, Tag, TileHeader, TransportError};
use memoffset::offset_of;
use mpi::{
    datatype::{Equivalence, UncommittedUserDatatype, UserDatatype},
    point_to_point::{Destination, Source},
    topology::{CartesianCommunicator, Communicator, SimpleCommunicator},
    Address, Count,
};

unsafe impl Equivalence for TileHeader {
    type Out = UserDatatype;
    fn equivalent_datatype() -> Self::Out {
        UserDatatype::structured(
            &[1, 1, 1],
            &[
                offset_of!(TileHeader, width) as Address,
                offset_of!(TileHeader, height) as Address,
                offset_of!(TileHeader, padding) as Address,
            ],
            &[
                UncommittedUserDatatype::contiguous(1, &u32::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(1, &u32::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(1, &u32::equivalent_datatype()).as_ref(),
            ],
        )
    }
}

/// A process group backed by an MPI communicator
pub struct MpiGroup<C: Communicator = SimpleCommunicator> {
    comm: C,
}

impl<C: Communicator> MpiGroup<C> {
    /// Wrap a communicator, usually `universe.world()`
    pub fn new(comm: C) -> Self {
        Self { comm }
    }
}

impl<C: Communicator> ProcessGroup for MpiGroup<C> {
    type Cartesian = MpiCartesian;

    fn rank(&self) -> Rank {
        self.comm.rank()
    }

    fn size(&self) -> Rank {
        self.comm.size()
    }

    fn create_cartesian(&self, dims: [usize; 2]) -> Result<MpiCartesian, TransportError> {
        let dims = [dims[0] as Count, dims[1] as Count];
        self.comm
            .create_cartesian_communicator(&dims, &[true, true], false)
            .map(|comm| MpiCartesian { comm })
            .ok_or_else(|| {
                TransportError::Runtime(format!(
                    "could not create a {}x{} cartesian communicator",
                    dims[0], dims[1]
                ))
            })
    }
}

/// A periodic MPI Cartesian communicator
pub struct MpiCartesian {
    comm: CartesianCommunicator,
}

impl MpiCartesian {
    fn check_rank(&self, rank: Rank) -> Result<(), TransportError> {
        if rank >= 0 && rank < self.comm.size() {
            Ok(())
        } else {
            Err(TransportError::InvalidRank(rank))
        }
    }
}

impl CartesianComm for MpiCartesian {
    fn rank(&self) -> Rank {
        self.comm.rank()
    }

    fn size(&self) -> Rank {
        self.comm.size()
    }

    fn coordinates_of(&self, rank: Rank) -> Result<[usize; 2], TransportError> {
        self.check_rank(rank)?;
        match self.comm.rank_to_coordinates(rank)[..] {
            [x, y] => Ok([x as usize, y as usize]),
            _ => Err(TransportError::Runtime(
                "communicator is not two dimensional".to_string(),
            )),
        }
    }

    fn shift(&self, axis: usize, displacement: i32) -> Result<(Rank, Rank), TransportError> {
        match self.comm.shift(axis as Count, displacement) {
            (Some(source), Some(destination)) => Ok((source, destination)),
            _ => Err(TransportError::Runtime(format!(
                "axis {axis} is not periodic"
            ))),
        }
    }

    fn send_header(
        &self,
        peer: Rank,
        tag: Tag,
        header: &TileHeader,
    ) -> Result<(), TransportError> {
        self.check_rank(peer)?;
        self.comm.process_at_rank(peer).send_with_tag(header, tag);
        Ok(())
    }

    fn receive_header(&self, peer: Rank, tag: Tag) -> Result<TileHeader, TransportError> {
        self.check_rank(peer)?;
        let (header, _status) = self
            .comm
            .process_at_rank(peer)
            .receive_with_tag::<TileHeader>(tag);
        Ok(header)
    }

    fn send(&self, peer: Rank, tag: Tag, values: &[Cell]) -> Result<(), TransportError> {
        self.check_rank(peer)?;
        self.comm.process_at_rank(peer).send_with_tag(values, tag);
        Ok(())
    }

    fn receive(&self, peer: Rank, tag: Tag, count: usize) -> Result<Vec<Cell>, TransportError> {
        self.check_rank(peer)?;
        let (values, _status) = self
            .comm
            .process_at_rank(peer)
            .receive_vec_with_tag::<Cell>(tag);
        if values.len() != count {
            return Err(TransportError::SizeMismatch {
                peer,
                expected: count,
                received: values.len(),
            });
        }
        Ok(values)
    }

    fn wait_all(&self, operations: Vec<Operation>) -> Result<Vec<Vec<Cell>>, TransferFailure> {
        for operation in &operations {
            self.check_rank(operation.peer())
                .map_err(|e| TransferFailure::new(operation, e))?;
        }
        let mut buffers = operations
            .iter()
            .map(|operation| match operation {
                Operation::Send { .. } => Vec::new(),
                Operation::Receive { count, .. } => vec![0.0; *count],
            })
            .collect::<Vec<_>>();

        // Requests must complete before the scope ends, so lengths are checked afterwards
        let statuses = mpi::request::scope(|scope| {
            let requests = operations
                .iter()
                .zip(buffers.iter_mut())
                .map(|(operation, buffer)| match operation {
                    Operation::Send { peer, tag, values } => self
                        .comm
                        .process_at_rank(*peer)
                        .immediate_send_with_tag(scope, &values[..], *tag),
                    Operation::Receive { peer, tag, .. } => self
                        .comm
                        .process_at_rank(*peer)
                        .immediate_receive_into_with_tag(scope, &mut buffer[..], *tag),
                })
                .collect::<Vec<_>>();
            requests
                .into_iter()
                .map(|request| request.wait())
                .collect::<Vec<_>>()
        });

        for (operation, status) in operations.iter().zip(&statuses) {
            if let Operation::Receive { peer, count, .. } = operation {
                let received = status.count(Cell::equivalent_datatype());
                if received < 0 || received as usize != *count {
                    return Err(TransferFailure::new(
                        operation,
                        TransportError::SizeMismatch {
                            peer: *peer,
                            expected: *count,
                            received: received.max(0) as usize,
                        },
                    ));
                }
            }
        }
        Ok(buffers)
    }

    fn abort(&self, code: i32) {
        self.comm.abort(code)
    }
}
