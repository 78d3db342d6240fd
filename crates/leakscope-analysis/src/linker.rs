//! Follows each task's event chain to its last recorded event.

use leakscope_core::{DecodeError, EventIndex, EventKind, EventTable, TaskId};

/// Outcome of following one `TaskCreate` event to the end of its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLifecycle {
    pub task: TaskId,
    pub create: EventIndex,
    pub terminal: EventIndex,
    /// The terminal event is not a `TaskEnd`.
    pub leaked: bool,
}

/// Walks `next` links from `start` until an event without a successor.
///
/// Links must point strictly forward to an event of the same task. Anything
/// else is reported as [`DecodeError::BrokenChain`], which also bounds the
/// walk to the length of the table.
pub fn terminal_event(table: &EventTable, start: EventIndex) -> Result<EventIndex, DecodeError> {
    let mut current = start;
    let mut event = table.get(start).ok_or(DecodeError::MissingEvent(start))?;

    while let Some(next) = event.next {
        let broken = DecodeError::BrokenChain {
            task: event.task,
            at: current,
            to: next,
        };
        if next <= current {
            return Err(broken);
        }
        match table.get(next) {
            Some(following) if following.task == event.task => {
                current = next;
                event = following;
            }
            _ => return Err(broken),
        }
    }

    Ok(current)
}

/// Whether the task created at `create` never reached a `TaskEnd`.
pub fn is_leaked(table: &EventTable, create: EventIndex) -> Result<bool, DecodeError> {
    let terminal = terminal_event(table, create)?;
    Ok(table
        .get(terminal)
        .is_some_and(|event| !event.kind.is_terminal()))
}

/// Classifies every `TaskCreate` event of the table, in table order.
pub fn classify(table: &EventTable) -> Result<Vec<TaskLifecycle>, DecodeError> {
    table
        .iter()
        .filter(|(_, event)| event.kind == EventKind::TaskCreate)
        .map(|(create, event)| {
            let terminal = terminal_event(table, create)?;
            let leaked = table
                .get(terminal)
                .is_some_and(|last| !last.kind.is_terminal());
            Ok(TaskLifecycle {
                task: event.task,
                create,
                terminal,
                leaked,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use leakscope_core::Event;
    use std::collections::HashMap;

    fn event(kind: EventKind, task: u64, next: Option<usize>) -> Event {
        Event {
            kind,
            task: TaskId(task),
            timestamp_ns: 0,
            stack: Vec::new(),
            next: next.map(EventIndex),
        }
    }

    fn table(events: Vec<Event>) -> EventTable {
        EventTable::new(events, HashMap::new())
    }

    #[test]
    fn test_finished_and_blocked_tasks() {
        let table = table(vec![
            event(EventKind::TaskCreate, 1, Some(2)),
            event(EventKind::TaskCreate, 2, Some(3)),
            event(EventKind::TaskStart, 1, Some(4)),
            event(EventKind::TaskBlock, 2, None),
            event(EventKind::TaskEnd, 1, None),
        ]);

        let lifecycles = classify(&table).unwrap();
        assert_eq!(lifecycles.len(), 2);
        assert_eq!(lifecycles[0].terminal, EventIndex(4));
        assert!(!lifecycles[0].leaked);
        assert_eq!(lifecycles[1].terminal, EventIndex(3));
        assert!(lifecycles[1].leaked);
    }

    #[test]
    fn test_unlinked_create_is_its_own_terminal() {
        let table = table(vec![event(EventKind::TaskCreate, 1, None)]);
        assert_eq!(terminal_event(&table, EventIndex(0)).unwrap(), EventIndex(0));
        assert!(is_leaked(&table, EventIndex(0)).unwrap());
    }

    #[test]
    fn test_long_chain_is_walked_iteratively() {
        let len = 200_000;
        let mut events = Vec::with_capacity(len);
        events.push(event(EventKind::TaskCreate, 1, Some(1)));
        for i in 1..len - 1 {
            events.push(event(EventKind::TaskBlock, 1, Some(i + 1)));
        }
        events.push(event(EventKind::TaskEnd, 1, None));

        let table = table(events);
        assert_eq!(
            terminal_event(&table, EventIndex(0)).unwrap(),
            EventIndex(len - 1)
        );
        assert!(!is_leaked(&table, EventIndex(0)).unwrap());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let table = table(vec![
            event(EventKind::TaskCreate, 1, Some(1)),
            event(EventKind::TaskBlock, 1, Some(0)),
        ]);
        assert_eq!(
            terminal_event(&table, EventIndex(0)).unwrap_err(),
            DecodeError::BrokenChain {
                task: TaskId(1),
                at: EventIndex(1),
                to: EventIndex(0),
            }
        );
    }

    #[test]
    fn test_self_link_and_dangling_link_are_rejected() {
        let self_link = table(vec![event(EventKind::TaskCreate, 1, Some(0))]);
        assert!(classify(&self_link).is_err());

        let dangling = table(vec![event(EventKind::TaskCreate, 1, Some(5))]);
        assert!(classify(&dangling).is_err());

        let foreign = table(vec![
            event(EventKind::TaskCreate, 1, Some(1)),
            event(EventKind::TaskEnd, 2, None),
        ]);
        assert!(classify(&foreign).is_err());
    }

    #[test]
    fn test_missing_start_event() {
        let table = table(Vec::new());
        assert_eq!(
            terminal_event(&table, EventIndex(3)).unwrap_err(),
            DecodeError::MissingEvent(EventIndex(3))
        );
    }
}
