//! Binary trace format shared by the recorder and the decoder.
//!
//! A capture is an 8-byte magic, a little-endian `u16` format version and a
//! sequence of bincode-encoded [`TraceRecord`]s running until end of input.
//! Stacks and task descriptors are written once and referenced by id from
//! event records.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::task::{TaskDescriptor, TaskId};
use crate::trace::{Event, EventIndex, EventKind, EventTable, Frame};

/// Magic bytes at the start of every capture.
pub const MAGIC: [u8; 8] = *b"LSCPTRC\0";

/// Current format version.
pub const VERSION: u16 = 1;

/// Stack id meaning "no stack recorded".
pub const EMPTY_STACK: u64 = 0;

const HEADER_LEN: usize = MAGIC.len() + 2;

/// A single record in the trace stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceRecord {
    /// Descriptor of a spawned task.
    Task {
        id: TaskId,
        parent: Option<TaskId>,
        name: String,
    },
    /// An interned call stack, innermost frame first.
    Stack { id: u64, frames: Vec<Frame> },
    /// A task event. `stack` refers to a previously written `Stack` record.
    Event {
        kind: EventKind,
        task: TaskId,
        timestamp_ns: u64,
        stack: u64,
    },
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// Writes a capture stream.
pub struct TraceWriter<W: Write> {
    writer: W,
}

impl<W: Write> TraceWriter<W> {
    /// Creates a writer and emits the stream header.
    pub fn new(mut writer: W) -> io::Result<Self> {
        writer.write_all(&MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        Ok(Self { writer })
    }

    pub fn write(&mut self, record: &TraceRecord) -> io::Result<()> {
        options()
            .serialize_into(&mut self.writer, record)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Decodes a full capture stream from a reader.
pub fn decode<R: Read>(mut reader: R) -> Result<EventTable, DecodeError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| DecodeError::Read(e.to_string()))?;
    decode_bytes(&bytes)
}

/// Decodes a capture held in memory.
pub fn decode_bytes(bytes: &[u8]) -> Result<EventTable, DecodeError> {
    if bytes.len() < HEADER_LEN {
        if !bytes.is_empty() && !MAGIC.starts_with(bytes) {
            return Err(DecodeError::BadMagic);
        }
        return Err(DecodeError::Truncated {
            offset: bytes.len() as u64,
        });
    }
    if bytes[..MAGIC.len()] != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = u16::from_le_bytes([bytes[MAGIC.len()], bytes[MAGIC.len() + 1]]);
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let mut stacks: HashMap<u64, Vec<Frame>> = HashMap::new();
    let mut tasks: HashMap<TaskId, TaskDescriptor> = HashMap::new();
    let mut events: Vec<Event> = Vec::new();
    let mut last_event: HashMap<TaskId, usize> = HashMap::new();

    let mut rest = &bytes[HEADER_LEN..];
    while !rest.is_empty() {
        let offset = (bytes.len() - rest.len()) as u64;
        let record: TraceRecord = options()
            .with_limit(rest.len() as u64)
            .deserialize_from(&mut rest)
            .map_err(|e| record_error(offset, e))?;

        match record {
            TraceRecord::Task { id, parent, name } => {
                tasks.insert(id, TaskDescriptor::new(id, name).with_parent(parent));
            }
            TraceRecord::Stack { id, frames } => {
                stacks.insert(id, frames);
            }
            TraceRecord::Event {
                kind,
                task,
                timestamp_ns,
                stack,
            } => {
                if task.get() == 0 {
                    return Err(DecodeError::ZeroTaskId { offset });
                }
                let stack = if stack == EMPTY_STACK {
                    Vec::new()
                } else {
                    stacks
                        .get(&stack)
                        .cloned()
                        .ok_or(DecodeError::UnknownStack { offset, stack })?
                };

                let index = events.len();
                if let Some(prev) = last_event.insert(task, index) {
                    events[prev].next = Some(EventIndex(index));
                }
                events.push(Event {
                    kind,
                    task,
                    timestamp_ns,
                    stack,
                    next: None,
                });
            }
        }
    }

    tracing::debug!(
        events = events.len(),
        tasks = tasks.len(),
        stacks = stacks.len(),
        "decoded trace"
    );

    Ok(EventTable::new(events, tasks))
}

fn record_error(offset: u64, err: bincode::Error) -> DecodeError {
    match err.as_ref() {
        bincode::ErrorKind::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
            DecodeError::Truncated { offset }
        }
        bincode::ErrorKind::SizeLimit => DecodeError::Truncated { offset },
        _ => DecodeError::Malformed {
            offset,
            reason: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_records(records: &[TraceRecord]) -> Vec<u8> {
        let mut writer = TraceWriter::new(Vec::new()).unwrap();
        for record in records {
            writer.write(record).unwrap();
        }
        writer.into_inner()
    }

    fn event(kind: EventKind, task: u64, stack: u64) -> TraceRecord {
        TraceRecord::Event {
            kind,
            task: TaskId(task),
            timestamp_ns: 0,
            stack,
        }
    }

    #[test]
    fn test_decode_links_events_per_task() {
        let bytes = write_records(&[
            TraceRecord::Task {
                id: TaskId(1),
                parent: None,
                name: "app::a".to_string(),
            },
            TraceRecord::Stack {
                id: 1,
                frames: vec![Frame::new("app::main", "src/main.rs", 10)],
            },
            event(EventKind::TaskCreate, 1, 1),
            event(EventKind::TaskCreate, 2, EMPTY_STACK),
            event(EventKind::TaskStart, 1, EMPTY_STACK),
            event(EventKind::TaskEnd, 1, EMPTY_STACK),
        ]);

        let table = decode_bytes(&bytes).unwrap();
        assert_eq!(table.len(), 4);

        let events = table.events();
        assert_eq!(events[0].next, Some(EventIndex(2)));
        assert_eq!(events[1].next, None);
        assert_eq!(events[2].next, Some(EventIndex(3)));
        assert_eq!(events[3].next, None);
        assert_eq!(events[0].stack[0].function, "app::main");
        assert_eq!(table.task_name(TaskId(1)), "app::a");
        assert_eq!(table.task_name(TaskId(2)), "");
    }

    #[test]
    fn test_decode_header_only_is_empty_table() {
        let bytes = write_records(&[]);
        let table = decode_bytes(&bytes).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let err = decode_bytes(b"NOTATRACE!!!").unwrap_err();
        assert_eq!(err, DecodeError::BadMagic);
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&7u16.to_le_bytes());
        let err = decode_bytes(&bytes).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedVersion(7));
    }

    #[test]
    fn test_decode_reports_truncation() {
        let bytes = write_records(&[
            TraceRecord::Task {
                id: TaskId(1),
                parent: None,
                name: "app::a".to_string(),
            },
            event(EventKind::TaskCreate, 1, EMPTY_STACK),
        ]);
        let cut = &bytes[..bytes.len() - 3];

        match decode_bytes(cut).unwrap_err() {
            DecodeError::Truncated { offset } => assert!(offset >= HEADER_LEN as u64),
            other => panic!("expected truncation, got {other:?}"),
        }
        assert!(matches!(
            decode_bytes(&MAGIC[..4]).unwrap_err(),
            DecodeError::Truncated { offset: 4 }
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_stack() {
        let bytes = write_records(&[event(EventKind::TaskCreate, 1, 42)]);
        assert!(matches!(
            decode_bytes(&bytes).unwrap_err(),
            DecodeError::UnknownStack { stack: 42, .. }
        ));
    }

    #[test]
    fn test_decode_rejects_zero_task_id() {
        let bytes = write_records(&[event(EventKind::TaskCreate, 0, EMPTY_STACK)]);
        assert!(matches!(
            decode_bytes(&bytes).unwrap_err(),
            DecodeError::ZeroTaskId { .. }
        ));
    }

    #[test]
    fn test_decode_from_reader() {
        let bytes = write_records(&[event(EventKind::TaskCreate, 3, EMPTY_STACK)]);
        let table = decode(bytes.as_slice()).unwrap();
        assert_eq!(table.events()[0].task, TaskId(3));
    }
}
