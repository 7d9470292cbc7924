use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

#[cfg(test)]
mod tests;

/// One entry of a [`Delta`]
#[derive(Clone, Debug, PartialEq)]
pub enum Change<T> {
    /// New or changed entity, always the complete current value
    Upsert(T),
    /// Entity present in the previous mapping, absent now
    Tombstone,
}

impl<T: Serialize> Serialize for Change<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Change::Upsert(value) => value.serialize(serializer),
            Change::Tombstone => serializer.serialize_none(),
        }
    }
}

/// Minimal update between two successive entity mappings.
///
/// Keys are exactly the added, changed and removed ids. Iteration order carries
/// no meaning.
#[derive(Clone, Debug, PartialEq)]
pub struct Delta<T> {
    changes: HashMap<String, Change<T>>,
}

impl<T> Delta<T> {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, id: &str) -> Option<&Change<T>> {
        self.changes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Change<T>)> {
        self.changes.iter()
    }

    /// Ids marked as removed
    pub fn tombstones(&self) -> impl Iterator<Item = &String> {
        self.changes
            .iter()
            .filter(|(_, change)| matches!(change, Change::Tombstone))
            .map(|(id, _)| id)
    }
}

impl<T: Clone> Delta<T> {
    /// Apply this delta to a client-side reconstruction of the previous mapping
    pub fn apply(&self, target: &mut HashMap<String, T>) {
        for (id, change) in &self.changes {
            match change {
                Change::Upsert(value) => {
                    target.insert(id.clone(), value.clone());
                }
                Change::Tombstone => {
                    target.remove(id);
                }
            }
        }
    }
}

impl<T> Default for Delta<T> {
    fn default() -> Self {
        Self {
            changes: HashMap::new(),
        }
    }
}

impl<T: Serialize> Serialize for Delta<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.changes.len()))?;
        for (id, change) in &self.changes {
            map.serialize_entry(id, change)?;
        }
        map.end()
    }
}

/// Compute the delta that turns `previous` into `current`.
///
/// Entities absent from `previous` or structurally unequal are emitted in
/// full; ids only in `previous` become tombstones. Neither mapping is
/// modified; the caller swaps `previous` for `current` afterwards.
pub fn diff<T: Clone + PartialEq>(
    previous: &HashMap<String, T>,
    current: &HashMap<String, T>,
) -> Delta<T> {
    let mut changes = HashMap::new();

    for (id, value) in current {
        if previous.get(id) != Some(value) {
            changes.insert(id.clone(), Change::Upsert(value.clone()));
        }
    }

    for id in previous.keys() {
        if !current.contains_key(id) {
            changes.insert(id.clone(), Change::Tombstone);
        }
    }

    Delta { changes }
}
