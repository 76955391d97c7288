//! Reverse relationship synthesis.
//!
//! When a resource declares a relationship to another cached resource, the
//! inverse field on that resource (as declared in the schema registry) is
//! updated to point back, so the server only needs to send one side.

use tracing::trace;

use super::state::ResourceTable;
use crate::document::{Linkage, Resource};
use crate::schema::SchemaRegistry;

/// Mirror `resource`'s relationships onto the resources it references.
///
/// Targets that are not cached yet, or whose type declares no field pointing
/// back at `resource.kind`, are skipped. Plural back-references never gain
/// a duplicate entry for the same id.
pub fn synchronize(table: &mut ResourceTable, resource: &Resource, registry: &SchemaRegistry) {
  let owner = resource.identifier();

  for (field, relationship) in &resource.relationships {
    let Some(linkage) = &relationship.data else {
      continue;
    };

    for child in linkage.to_vec() {
      let Some(back) = registry.back_reference(&child.kind, &owner.kind) else {
        trace!(
          owner = %owner.kind,
          field = %field,
          child = %child.kind,
          "no back-reference declared, skipping"
        );
        continue;
      };

      let Some(target) = table
        .get_mut(&child.kind)
        .and_then(|by_id| by_id.get_mut(&child.id))
      else {
        continue;
      };

      let slot = target.relationships.entry(back.key).or_default();

      if !back.is_array {
        slot.data = Some(Linkage::One(owner.clone()));
        continue;
      }

      slot.data = Some(match slot.data.take() {
        Some(existing) if existing.contains_id(&owner.id) => existing,
        Some(Linkage::Many(mut ids)) => {
          ids.push(owner.clone());
          Linkage::Many(ids)
        }
        Some(Linkage::One(single)) => Linkage::Many(vec![single, owner.clone()]),
        None => Linkage::Many(vec![owner.clone()]),
      });
    }
  }
}
