//! Holding area for records whose struct schema is not fully known yet.

use super::graph::StructDependencyGraph;
use crate::error::Result;
use std::collections::HashMap;

/// A struct record parked until its schema (and every nested schema) is registered.
///
/// Carries the entry's name and metadata as they were when the record
/// arrived, so the record still decodes if the entry finishes in between.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingStructRecord {
    /// Arrival order across all queued records
    pub sequence: u64,
    pub entry_id: u32,
    pub timestamp: u64,
    pub name: String,
    pub metadata: String,
    pub struct_name: String,
    pub is_array: bool,
    pub payload: Vec<u8>,
}

/// Queues records per struct name and releases them once the dependency graph
/// reports that struct decodable.
#[derive(Debug, Clone)]
pub struct StructDecodeQueue<T> {
    graph: StructDependencyGraph,
    queued: HashMap<String, Vec<T>>,
}

impl<T> StructDecodeQueue<T> {
    pub fn new() -> Self {
        Self {
            graph: StructDependencyGraph::new(),
            queued: HashMap::new(),
        }
    }

    /// Appends a record to `struct_name`'s pending list.
    pub fn queue_struct_record(&mut self, struct_name: &str, record: T) {
        self.queued
            .entry(struct_name.to_string())
            .or_default()
            .push(record);
    }

    /// Registers a schema's dependencies, then hands every pending list whose
    /// struct just became decodable to `on_decodable`, once per name.
    pub fn register_schema<I, S, F>(
        &mut self,
        struct_name: &str,
        dependencies: I,
        mut on_decodable: F,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnMut(&str, Vec<T>),
    {
        self.graph.register_schema(struct_name, dependencies)?;

        let ready: Vec<String> = self
            .queued
            .keys()
            .filter(|name| self.graph.is_decodable(name))
            .cloned()
            .collect();

        for name in ready {
            if let Some(records) = self.queued.remove(&name) {
                log::debug!("Releasing {} queued record(s) for struct {}", records.len(), name);
                on_decodable(&name, records);
            }
        }

        Ok(())
    }

    /// Struct names that still have records waiting, with their counts.
    pub fn pending(&self) -> impl Iterator<Item = (&str, usize)> {
        self.queued
            .iter()
            .map(|(name, records)| (name.as_str(), records.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}

impl<T> Default for StructDecodeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
