//! Event table types.

use crate::config::Columns;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Read;

/// Single row of the event table.
///
/// An entity visiting the same step several times produces several events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Identifier of the tracked entity (a client, a visitor, a visit, ...).
    pub entity_id: String,
    /// Process step name.
    pub step: String,
    pub timestamp: NaiveDateTime,
    /// Experiment group label (`Test`, `Control`, ...).
    pub group: String,
}

impl Event {
    pub fn new(
        entity_id: impl Into<String>,
        step: impl Into<String>,
        timestamp: NaiveDateTime,
        group: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            step: step.into(),
            timestamp,
            group: group.into(),
        }
    }
}

/// Unordered collection of events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Read an event table from CSV data.
    ///
    /// Columns are located by their header names, so extra columns and any
    /// column order are accepted.
    ///
    /// # Errors
    /// Returns an error if a configured column is missing or if a row cannot be parsed.
    pub fn from_csv_reader<R: Read>(reader: R, columns: &Columns) -> Result<Self> {
        let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

        let headers = reader.headers().context("failed to read header")?.clone();
        let layout = Layout {
            entity: find_column(&headers, &columns.entity)?,
            step: find_column(&headers, &columns.step)?,
            timestamp: find_column(&headers, &columns.timestamp)?,
            group: find_column(&headers, &columns.group)?,
        };

        let mut events = Vec::new();
        for record in reader.records() {
            let record = record.context("failed to read record")?;
            let line = record.position().map_or(0, |pos| pos.line());
            let event = layout
                .parse(&record)
                .with_context(|| format!("invalid record on line {line}"))?;
            events.push(event);
        }
        log::debug!("read {} events", events.len());

        Ok(Self { events })
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Distinct group labels, in order of first appearance.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for event in &self.events {
            if !groups.contains(&event.group.as_str()) {
                groups.push(&event.group);
            }
        }
        groups
    }

    /// Keep only the events of one group.
    pub fn filter_group(&self, group: &str) -> Self {
        let events = self
            .events
            .iter()
            .filter(|event| event.group == group)
            .cloned()
            .collect();
        Self { events }
    }
}

impl From<Vec<Event>> for EventLog {
    fn from(events: Vec<Event>) -> Self {
        Self::new(events)
    }
}

struct Layout {
    entity: usize,
    step: usize,
    timestamp: usize,
    group: usize,
}

impl Layout {
    fn parse(&self, record: &StringRecord) -> Result<Event> {
        let field = |idx: usize| {
            record
                .get(idx)
                .with_context(|| format!("missing field {idx}"))
        };
        let timestamp = field(self.timestamp)?;
        Ok(Event {
            entity_id: field(self.entity)?.to_string(),
            step: field(self.step)?.to_string(),
            timestamp: parse_timestamp(timestamp)
                .with_context(|| format!("invalid timestamp {timestamp:?}"))?,
            group: field(self.group)?.to_string(),
        })
    }
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize> {
    match headers.iter().position(|header| header == name) {
        Some(idx) => Ok(idx),
        None => bail!("column {name:?} not found in header {headers:?}"),
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS` timestamps, with optional fractional seconds,
/// falling back to RFC 3339.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    for format in FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(timestamp);
        }
    }
    let timestamp = DateTime::parse_from_rfc3339(text).context("unrecognized timestamp format")?;
    Ok(timestamp.naive_utc())
}
