//! Which locals feed each field store.
//!
//! A cheap approximation of the receiver of a `putfield`: every local load
//! since the previous store is attributed to the next one. If slot 0 is
//! among them, the store is taken to target `this`.

use crate::analysis::{FieldRef, Instruction, MethodFacts};

/// One `putfield` with the local slots loaded since the previous store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldStore {
    /// Instruction index of the `putfield`.
    pub index: usize,
    pub field: FieldRef,
    pub loaded_slots: Vec<u16>,
}

impl FieldStore {
    pub fn involves_this(&self) -> bool {
        self.loaded_slots.contains(&0)
    }
}

/// Field stores of `method` in instruction order.
pub fn field_stores(method: &MethodFacts) -> Vec<FieldStore> {
    let mut stores = Vec::new();
    let mut loaded = Vec::new();

    for (index, instruction) in method.instructions.iter().enumerate() {
        match instruction {
            Instruction::Load { slot, .. } => loaded.push(*slot),
            Instruction::PutField(field) => stores.push(FieldStore {
                index,
                field: field.clone(),
                loaded_slots: std::mem::take(&mut loaded),
            }),
            _ => {}
        }
    }

    stores
}
