use crate::event::Event;
use chrono::TimeDelta;

/// Time-ordered events of a single entity.
///
/// Events are sorted ascending by timestamp with a stable sort: events sharing
/// a timestamp keep the order in which they were given. That tie order carries
/// no meaning in the event table, so traces with simultaneous events may
/// classify transitions differently when input rows are reordered.
#[derive(Debug, Clone)]
pub struct Trace<'a> {
    events: Vec<&'a Event>,
}

/// Move between two consecutive events of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<'a> {
    pub from: &'a str,
    pub to: &'a str,
    /// Time elapsed between the two events, never negative.
    pub elapsed: TimeDelta,
}

impl<'a> Trace<'a> {
    pub fn new(mut events: Vec<&'a Event>) -> Self {
        events.sort_by_key(|event| event.timestamp);
        Self { events }
    }

    pub fn events(&self) -> &[&'a Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate over consecutive event pairs.
    ///
    /// The first event has no predecessor and only sets the starting point,
    /// so a trace of `n` events yields `n - 1` transitions.
    pub fn transitions(&self) -> impl Iterator<Item = Transition<'a>> + '_ {
        self.events
            .iter()
            .zip(self.events.iter().skip(1))
            .map(|(&prev, &curr)| Transition {
                from: &prev.step,
                to: &curr.step,
                elapsed: curr.timestamp - prev.timestamp,
            })
    }
}
