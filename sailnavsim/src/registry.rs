//! BoatRegistry (C3, §4.1): a name-keyed, insertion-ordered map of vessels
//! plus a secondary group-membership index. Structural mutation (add/
//! remove) and the per-tick advance/command-drain phases are serialized
//! through one `RwLock`, held exclusively by the Sim thread during those
//! phases and shared by NetServer worker reads (§5).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::vessel::Vessel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    Ok,
    Exists,
}

/// One registry node: a vessel plus its external identity.
pub struct BoatEntry {
    pub name: String,
    pub group: Option<String>,
    pub alt_name: Option<String>,
    pub vessel: Vessel,
}

struct Inner {
    entries: HashMap<String, BoatEntry>,
    /// Insertion order of live names; removals are swept lazily at iteration.
    order: Vec<String>,
    /// group name -> ordered member boat names.
    groups: HashMap<String, Vec<String>>,
}

/// The boat registry. A single instance is shared (via `Arc`) between the
/// Sim thread and the NetServer worker pool.
pub struct BoatRegistry {
    inner: RwLock<Inner>,
}

impl Default for BoatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BoatRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                order: Vec::new(),
                groups: HashMap::new(),
            }),
        }
    }

    pub fn add(&self, vessel: Vessel, name: &str, group: Option<&str>, alt_name: Option<&str>) -> AddResult {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.entries.contains_key(name) {
            return AddResult::Exists;
        }
        inner.order.push(name.to_string());
        if let Some(g) = group {
            inner.groups.entry(g.to_string()).or_default().push(name.to_string());
        }
        inner.entries.insert(
            name.to_string(),
            BoatEntry {
                name: name.to_string(),
                group: group.map(String::from),
                alt_name: alt_name.map(String::from),
                vessel,
            },
        );
        AddResult::Ok
    }

    pub fn remove(&self, name: &str) -> Option<Vessel> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let entry = inner.entries.remove(name)?;
        inner.order.retain(|n| n != name);
        if let Some(g) = &entry.group {
            if let Some(members) = inner.groups.get_mut(g) {
                members.retain(|n| n != name);
            }
        }
        Some(entry.vessel)
    }

    pub fn contains(&self, name: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` with mutable access to a named vessel, under the exclusive
    /// lock. Returns `None` if the boat is absent (command silently
    /// dropped, per §4.6 step 5).
    pub fn with_vessel_mut<R>(&self, name: &str, f: impl FnOnce(&mut Vessel) -> R) -> Option<R> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let entry = inner.entries.get_mut(name)?;
        Some(f(&mut entry.vessel))
    }

    pub fn get_clone(&self, name: &str) -> Option<Vessel> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.entries.get(name).map(|e| e.vessel.clone())
    }

    /// Runs `f` over every live entry in insertion order, under the
    /// exclusive lock, matching the advance phase's "mutate every vessel"
    /// access pattern (§4.6 step 3).
    pub fn for_each_mut(&self, mut f: impl FnMut(&str, &mut Vessel)) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let Inner { entries, order, .. } = &mut *inner;
        for name in order.iter() {
            if let Some(entry) = entries.get_mut(name) {
                f(&entry.name, &mut entry.vessel);
            }
        }
    }

    /// Read-only snapshot iteration in insertion order, under the shared
    /// lock (§3 invariant 1/3).
    pub fn snapshot_in_order(&self) -> Vec<(String, Vessel)> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .order
            .iter()
            .filter_map(|name| inner.entries.get(name).map(|e| (name.clone(), e.vessel.clone())))
            .collect()
    }

    /// `<name>,<altName-or-"!">` lines for every member of the group that
    /// `name_or_group` names either directly or as a boat's own group,
    /// in registry insertion order (§4.1, §4.8 `boatgroupmembers`).
    pub fn group_membership_response(&self, group: &str) -> Vec<(String, Option<String>)> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let Some(members) = inner.groups.get(group) else {
            return Vec::new();
        };
        inner
            .order
            .iter()
            .filter(|n| members.contains(n))
            .filter_map(|n| inner.entries.get(n).map(|e| (e.name.clone(), e.alt_name.clone())))
            .collect()
    }

    pub fn entry_group(&self, name: &str) -> Option<Option<String>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.entries.get(name).map(|e| e.group.clone())
    }

    pub fn entry_flags_hidden_in_group(&self, name: &str) -> Option<bool> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .entries
            .get(name)
            .map(|e| e.vessel.flags.contains(sailnavsim_types::BoatFlags::HIDDEN_IN_GROUP))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LatLon;
    use sailnavsim_types::{BoatFlags, BoatType};

    fn boat() -> Vessel {
        Vessel::new(LatLon::new(0.0, 0.0), BoatType::Basic, BoatFlags::empty())
    }

    #[test]
    fn add_get_remove_basic() {
        let reg = BoatRegistry::new();
        assert_eq!(reg.add(boat(), "TestBoat0", None, None), AddResult::Ok);
        assert_eq!(reg.len(), 1);
        assert!(reg.contains("TestBoat0"));
        let removed = reg.remove("TestBoat0");
        assert!(removed.is_some());
        assert_eq!(reg.len(), 0);
        assert!(!reg.contains("TestBoat0"));
    }

    #[test]
    fn duplicate_add_is_rejected_and_state_preserved() {
        let reg = BoatRegistry::new();
        reg.add(boat(), "A", Some("G"), None);
        let result = reg.add(boat(), "A", None, None);
        assert_eq!(result, AddResult::Exists);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.entry_group("A"), Some(Some("G".to_string())));
    }

    #[test]
    fn iteration_is_insertion_ordered() {
        let reg = BoatRegistry::new();
        for name in ["c", "a", "b"] {
            reg.add(boat(), name, None, None);
        }
        let order: Vec<String> = reg.snapshot_in_order().into_iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn removing_nonmember_returns_none() {
        let reg = BoatRegistry::new();
        assert!(reg.remove("ghost").is_none());
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn group_membership_response_is_ordered() {
        let reg = BoatRegistry::new();
        reg.add(boat(), "B1", Some("G"), Some("Alpha".into()));
        reg.add(boat(), "B2", Some("G"), None);
        reg.add(boat(), "B3", Some("Other"), None);
        let resp = reg.group_membership_response("G");
        assert_eq!(
            resp,
            vec![
                ("B1".to_string(), Some("Alpha".to_string())),
                ("B2".to_string(), None),
            ]
        );
    }
}
