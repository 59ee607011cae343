use crate::bml_parser::ReadSeek;
use crate::err::{DeserializationError, DeserializationResult};
use crate::tag_tree::deserializer::TagDeserializer;
use crate::tag_tree::model::{PointerId, ResolvedCollection};
use crate::tag_tree::TagKind;

use log::{debug, trace};

/// Counters reported by one call to [`TagDeserializer::resolve_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// Collections decoded from the source during this call.
    pub decoded: usize,
    /// Pointers attached to a collection that had already been decoded for the same target.
    pub shared: usize,
}

impl<R: ReadSeek> TagDeserializer<R> {
    /// Resolves every pending pointer in the registry.
    ///
    /// Decoding a target collection can discover further pointers; they are appended to the
    /// registry and handled by the same sweep, so on return no reachable pointer is left
    /// unresolved. Already resolved pointers are skipped, and a target offset is decoded at most
    /// once per session, which also terminates self-referencing pointer chains.
    pub fn resolve_all(&mut self) -> DeserializationResult<ResolutionStats> {
        let mut stats = ResolutionStats::default();
        let mut next = 0;

        while next < self.registry.len() {
            let id = PointerId(next);
            next += 1;

            let Some(entry) = self.registry.get(id) else {
                break;
            };
            if entry.resolved.is_some() {
                continue;
            }
            let target_offset = entry.target_offset;

            if let Some(index) = self.registry.collection_for_target(target_offset) {
                trace!(
                    "Pointer #{} shares already decoded target `0x{:08x}`",
                    id.index(),
                    target_offset
                );
                self.registry.attach(id, index);
                stats.shared += 1;
                continue;
            }

            let resolved = self.read_supplementary_collection(target_offset)?;
            let index = self.registry.insert_collection(resolved);
            self.registry.attach(id, index);
            stats.decoded += 1;
        }

        debug!(
            "Resolved pointers: {} collections decoded, {} shared, registry holds {} pointers",
            stats.decoded,
            stats.shared,
            self.registry.len()
        );

        Ok(stats)
    }

    /// Reads the `[u16 length][Collection]` record at `target_offset`.
    fn read_supplementary_collection(
        &mut self,
        target_offset: u32,
    ) -> DeserializationResult<ResolvedCollection> {
        self.cursor
            .seek(u64::from(target_offset), "pointer target")?;

        let length_prefix = self.cursor.u16_named("supplementary collection length")?;

        let offset = self.cursor.position();
        let discriminator = self.cursor.u8_named("supplementary collection discriminator")?;
        if discriminator != TagKind::COLLECTION {
            return Err(DeserializationError::UnexpectedVariant {
                expected: "Collection",
                found: discriminator,
                offset,
            });
        }

        let collection = self.read_collection(0, offset)?;

        let consumed = self.cursor.position() - offset;
        if consumed != u64::from(length_prefix) {
            debug!(
                "Collection at `0x{:08x}` declares {} bytes, decoded {}",
                target_offset, length_prefix, consumed
            );
        }

        Ok(ResolvedCollection {
            target_offset,
            length_prefix,
            collection,
        })
    }
}
