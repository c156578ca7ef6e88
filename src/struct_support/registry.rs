use super::parser::SchemaParser;
use super::queue::{PendingStructRecord, StructDecodeQueue};
use super::types::*;
use crate::error::{Result, WpilogError};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry for struct schemas: owns parsed declarations, memoized byte
/// lengths, and the queue of records waiting on schemas not yet seen.
///
/// Schemas are append-only. A name keeps its first definition.
#[derive(Debug, Clone)]
pub struct StructRegistry {
    parser: SchemaParser,
    definitions: HashMap<String, Arc<[StructDeclaration]>>,
    sources: HashMap<String, String>,
    byte_lengths: HashMap<String, usize>,
    queue: StructDecodeQueue<PendingStructRecord>,
}

impl StructRegistry {
    pub fn new() -> Self {
        Self {
            parser: SchemaParser::new(),
            definitions: HashMap::new(),
            sources: HashMap::new(),
            byte_lengths: HashMap::new(),
            queue: StructDecodeQueue::new(),
        }
    }

    /// Register a struct schema from its text definition.
    ///
    /// Forwards the member types to the decode queue as the struct's
    /// dependencies; any queued records that become decodable are handed to
    /// `on_decodable`, grouped by struct name.
    pub fn register<F>(&mut self, name: &str, schema_text: &str, on_decodable: F) -> Result<()>
    where
        F: FnMut(&str, Vec<PendingStructRecord>),
    {
        if let Some(existing) = self.sources.get(name) {
            if existing != schema_text {
                log::warn!(
                    "Ignoring redefinition of struct {}: '{}' (keeping '{}')",
                    name,
                    schema_text,
                    existing
                );
            }
            return Ok(());
        }

        let declarations = self.parser.parse(schema_text)?;
        let dependencies: Vec<String> = declarations
            .iter()
            .map(|member| member.value_type.name().to_string())
            .collect();

        self.definitions
            .insert(name.to_string(), declarations.into());

        if let Err(e) = self
            .queue
            .register_schema(name, dependencies, on_decodable)
        {
            self.definitions.remove(name);
            return Err(e);
        }

        log::debug!("Registered struct {}: {}", name, schema_text);
        self.sources
            .insert(name.to_string(), schema_text.to_string());
        Ok(())
    }

    /// Get a registered schema by name.
    pub fn definition(&self, name: &str) -> Option<&[StructDeclaration]> {
        self.definitions.get(name).map(|d| d.as_ref())
    }

    /// Like [`StructRegistry::definition`], but a miss is an error.
    pub fn get_definition(&self, name: &str) -> Result<&[StructDeclaration]> {
        self.definition(name)
            .ok_or_else(|| WpilogError::SchemaError(format!("Unknown struct definition: {}", name)))
    }

    /// Names of every registered struct.
    pub fn struct_names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Parks a record until `struct_name` is fully decodable.
    pub fn queue_record(&mut self, struct_name: &str, record: PendingStructRecord) {
        log::debug!(
            "Queueing record for entry {} until struct {} is decodable",
            record.entry_id,
            struct_name
        );
        self.queue.queue_struct_record(struct_name, record);
    }

    /// Struct names with queued records, and how many each holds.
    pub fn pending(&self) -> impl Iterator<Item = (&str, usize)> {
        self.queue.pending()
    }

    /// The packed size of a struct in bytes, or the first struct name that
    /// prevents computing it.
    ///
    /// Nested structs are sized with an explicit stack, so nesting depth is
    /// bounded only by the number of registered schemas.
    pub fn byte_length(&mut self, name: &str) -> Result<DecodeStatus<usize>> {
        let mut stack = vec![name.to_string()];

        while let Some(current) = stack.last() {
            if self.byte_lengths.contains_key(current) {
                stack.pop();
                continue;
            }
            let members = match self.definitions.get(current) {
                Some(members) => Arc::clone(members),
                None => return Ok(DecodeStatus::Blocked(current.clone())),
            };
            if stack.len() > self.definitions.len() {
                return Err(WpilogError::DependencyCycle(current.clone()));
            }

            let mut total: usize = 0;
            let mut unsized_member = None;
            for member in members.iter() {
                match self.member_byte_length(current, member)? {
                    DecodeStatus::Decoded(len) => {
                        total = total
                            .checked_add(len)
                            .ok_or_else(|| too_large(current, member))?;
                    }
                    DecodeStatus::Blocked(nested) => {
                        unsized_member = Some(nested);
                        break;
                    }
                }
            }

            match unsized_member {
                Some(nested) => stack.push(nested),
                None => {
                    let current = current.clone();
                    self.byte_lengths.insert(current, total);
                    stack.pop();
                }
            }
        }

        Ok(match self.byte_lengths.get(name) {
            Some(&len) => DecodeStatus::Decoded(len),
            None => DecodeStatus::Blocked(name.to_string()),
        })
    }

    /// `Blocked(nested)` means the nested struct has not been sized yet.
    fn member_byte_length(
        &self,
        struct_name: &str,
        member: &StructDeclaration,
    ) -> Result<DecodeStatus<usize>> {
        if member.bit_width.is_some() {
            return Err(bit_field_unsupported(struct_name, member));
        }

        let one = match &member.value_type {
            ValueType::Scalar(scalar) => scalar.size(),
            ValueType::Struct(nested) => match self.byte_lengths.get(nested) {
                Some(&len) => len,
                None => return Ok(DecodeStatus::Blocked(nested.clone())),
            },
        };

        if one == 0 && member.array_size.unwrap_or(0) > 0 {
            return Err(WpilogError::DeclarationRange(format!(
                "member '{}' of struct '{}' is an array of zero-sized struct {}",
                member.name,
                struct_name,
                member.value_type.name()
            )));
        }

        one.checked_mul(member.array_size.unwrap_or(1))
            .map(DecodeStatus::Decoded)
            .ok_or_else(|| too_large(struct_name, member))
    }
}

fn too_large(struct_name: &str, member: &StructDeclaration) -> WpilogError {
    WpilogError::DeclarationRange(format!(
        "struct '{}' is too large: member '{}' overflows the byte length",
        struct_name, member.name
    ))
}

pub(super) fn bit_field_unsupported(struct_name: &str, member: &StructDeclaration) -> WpilogError {
    WpilogError::NotImplemented(format!(
        "bit-field member '{}' of struct '{}'",
        member.name, struct_name
    ))
}

impl Default for StructRegistry {
    fn default() -> Self {
        Self::new()
    }
}
