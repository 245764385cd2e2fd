use std::{borrow::Cow, io};

use crate::{Deserialize, Serialize, specs::AssignmentSpec};

type Header = u64;
const HEADER_SIZE: usize = size_of::<Header>();
const OFFSET_SIZE: usize = size_of::<u64>();

const ERR_H: Header = 0;
const CONTROL_H: Header = 1;
const MODEL_H: Header = 2;
const EPSILON_H: Header = 3;
const BARRIER_H: Header = 4;
const CORRECTION_H: Header = 5;
const COUNTS_H: Header = 6;

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug)]
pub enum Payload<'a> {
    /// The full model vector, sent by the coordinator when dispatching a round.
    Model(&'a [f64]),
    /// A worker's slice of the forward projection starting at row `offset`.
    Epsilon { offset: usize, values: &'a [f64] },
    /// The complete forward projection, broadcast by the coordinator.
    Barrier(&'a [f64]),
    /// A worker's slice of the correction vector starting at column `offset`.
    Correction { offset: usize, values: &'a [f64] },
    /// The full observed counts vector, one entry per operator row, weighting the adjoint step.
    Counts(&'a [f64]),
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Assign(AssignmentSpec),
    Disconnect,
}

/// The application layer message for the entire system.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    /// A short name of the message kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(Command::Assign(_)) => "control/assign",
            Msg::Control(Command::Disconnect) => "control/disconnect",
            Msg::Data(Payload::Model(_)) => "data/model",
            Msg::Data(Payload::Epsilon { .. }) => "data/epsilon",
            Msg::Data(Payload::Barrier(_)) => "data/barrier",
            Msg::Data(Payload::Correction { .. }) => "data/correction",
            Msg::Data(Payload::Counts(_)) => "data/counts",
            Msg::Err(_) => "err",
        }
    }

    fn buf_is_too_small<T>(size: usize, needed: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {needed} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid kind header {kind}"),
        ))
    }

    fn cast_nums(bytes: &[u8]) -> io::Result<&[f64]> {
        bytemuck::try_cast_slice(bytes).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Received a malformed numeric payload of {} bytes: {e:?}", bytes.len()),
            )
        })
    }

    fn split_offset(rest: &[u8]) -> io::Result<(usize, &[f64])> {
        if rest.len() < OFFSET_SIZE {
            return Self::buf_is_too_small(rest.len(), OFFSET_SIZE);
        }

        let (offset_buf, nums) = rest.split_at(OFFSET_SIZE);
        let mut offset = [0; OFFSET_SIZE];
        offset.copy_from_slice(offset_buf);

        let offset = usize::try_from(u64::from_be_bytes(offset))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok((offset, Self::cast_nums(nums)?))
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>> {
        match self {
            Msg::Err(e) => {
                buf.extend_from_slice(&ERR_H.to_be_bytes());
                Ok(Some(e.as_bytes()))
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL_H.to_be_bytes());
                serde_json::to_writer(buf, cmd)?;
                Ok(None)
            }
            Msg::Data(payload) => {
                let (kind, offset, nums) = match *payload {
                    Payload::Model(values) => (MODEL_H, None, values),
                    Payload::Epsilon { offset, values } => (EPSILON_H, Some(offset), values),
                    Payload::Barrier(values) => (BARRIER_H, None, values),
                    Payload::Correction { offset, values } => (CORRECTION_H, Some(offset), values),
                    Payload::Counts(values) => (COUNTS_H, None, values),
                };

                buf.extend_from_slice(&kind.to_be_bytes());
                if let Some(offset) = offset {
                    buf.extend_from_slice(&(offset as u64).to_be_bytes());
                }

                Ok(Some(bytemuck::cast_slice::<f64, u8>(nums)))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a mut [u8]) -> io::Result<Self> {
        let buf: &'a [u8] = buf;

        if buf.len() < HEADER_SIZE {
            return Self::buf_is_too_small(buf.len(), HEADER_SIZE);
        }

        let (kind_buf, rest) = buf.split_at(HEADER_SIZE);
        let mut kind = [0; HEADER_SIZE];
        kind.copy_from_slice(kind_buf);

        match Header::from_be_bytes(kind) {
            ERR_H => {
                let string = str::from_utf8(rest)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Err(Cow::Borrowed(string)))
            }
            CONTROL_H => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            MODEL_H => Ok(Self::Data(Payload::Model(Self::cast_nums(rest)?))),
            BARRIER_H => Ok(Self::Data(Payload::Barrier(Self::cast_nums(rest)?))),
            COUNTS_H => Ok(Self::Data(Payload::Counts(Self::cast_nums(rest)?))),
            EPSILON_H => {
                let (offset, values) = Self::split_offset(rest)?;
                Ok(Self::Data(Payload::Epsilon { offset, values }))
            }
            CORRECTION_H => {
                let (offset, values) = Self::split_offset(rest)?;
                Ok(Self::Data(Payload::Correction { offset, values }))
            }
            kind => Self::invalid_kind(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::{DegeneracyPolicy, OperatorSpec, Partition};

    fn roundtrip(msg: &Msg<'_>, storage: &mut Vec<u64>) {
        let mut head = Vec::new();
        let tail = msg.serialize(&mut head).unwrap();
        head.extend_from_slice(tail.unwrap_or_default());

        storage.resize(head.len().div_ceil(8), 0);
        let view: &mut [u8] = bytemuck::cast_slice_mut(storage);
        view[..head.len()].copy_from_slice(&head);
    }

    #[test]
    fn epsilon_slice_keeps_offset() {
        let values = [1.0, 2.5, -3.0];
        let msg = Msg::Data(Payload::Epsilon {
            offset: 7,
            values: &values,
        });

        let mut storage = Vec::new();
        roundtrip(&msg, &mut storage);
        let len = 8 + 8 + 3 * 8;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut storage);

        match Msg::deserialize(&mut bytes[..len]).unwrap() {
            Msg::Data(Payload::Epsilon { offset, values: got }) => {
                assert_eq!(offset, 7);
                assert_eq!(got, values);
            }
            other => panic!("unexpected msg: {other:?}"),
        }
    }

    #[test]
    fn empty_correction_slice() {
        let msg = Msg::Data(Payload::Correction {
            offset: 3,
            values: &[],
        });

        let mut storage = Vec::new();
        roundtrip(&msg, &mut storage);
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut storage);

        match Msg::deserialize(&mut bytes[..16]).unwrap() {
            Msg::Data(Payload::Correction { offset, values }) => {
                assert_eq!(offset, 3);
                assert!(values.is_empty());
            }
            other => panic!("unexpected msg: {other:?}"),
        }
    }

    #[test]
    fn assignment_command() {
        let spec = AssignmentSpec {
            worker_id: 2,
            round: 0,
            rows: Partition::new(4, 3),
            cols: Partition::new(3, 3),
            operator: OperatorSpec::Diagonal {
                rows: 10,
                cols: 9,
                value: 2.0,
            },
            degeneracy: DegeneracyPolicy::Background { value: 1e-3 },
            counts: true,
        };
        let msg = Msg::Control(Command::Assign(spec));

        let mut head = Vec::new();
        assert!(msg.serialize(&mut head).unwrap().is_none());

        match Msg::deserialize(&mut head).unwrap() {
            Msg::Control(Command::Assign(got)) => {
                assert_eq!(got.worker_id, 2);
                assert_eq!(got.rows, Partition::new(4, 3));
                assert_eq!(got.cols.range(), 3..6);
                assert_eq!(got.degeneracy, DegeneracyPolicy::Background { value: 1e-3 });
                assert!(got.counts);
            }
            other => panic!("unexpected msg: {other:?}"),
        }
    }

    #[test]
    fn counts_vector() {
        let counts = [3.0, 0.0, 7.5];
        let msg = Msg::Data(Payload::Counts(&counts));

        let mut storage = Vec::new();
        roundtrip(&msg, &mut storage);
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut storage);

        match Msg::deserialize(&mut bytes[..8 + 3 * 8]).unwrap() {
            Msg::Data(Payload::Counts(got)) => assert_eq!(got, counts),
            other => panic!("unexpected msg: {other:?}"),
        }
    }

    #[test]
    fn assignment_without_counts_field() {
        let json = r#"{"assign":{"worker_id":1,"round":0,"rows":{"offset":0,"count":2},
            "cols":{"offset":0,"count":2},"operator":{"diagonal":{"rows":2,"cols":2,"value":2.0}},
            "degeneracy":"flag"}}"#;

        match serde_json::from_str::<Command>(json).unwrap() {
            Command::Assign(spec) => assert!(!spec.counts),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn truncated_offset_is_invalid_data() {
        let mut bytes = EPSILON_H.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0, 1, 2]);

        let err = Msg::deserialize(&mut bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn unknown_kind_is_invalid_data() {
        let mut bytes = 42u64.to_be_bytes().to_vec();
        let err = Msg::deserialize(&mut bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
