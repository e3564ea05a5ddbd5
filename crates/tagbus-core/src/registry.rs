//! Tag registry: path <-> handle <-> role/owner bookkeeping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::error::{RegistryError, RegistryResult};
use crate::types::{AssignedTag, Handle, TagDescriptor, TagRegistrationItem, TagRole};

/// One item of a `RegisterTags` batch request.
#[derive(Debug, Clone)]
pub struct TagRegistration {
    pub path: String,
    pub role: TagRole,
    pub owner_plugin_instance_id: String,
}

/// Thread-safe path/handle/role registry.
///
/// Handle zero is reserved and never handed out. Re-registering an
/// already-known path returns the existing handle and silently updates the
/// stored role/owner rather than erroring - callers that change their mind
/// about a tag's producer/consumer role do not need a separate API.
pub struct TagRegistry {
    by_path: RwLock<HashMap<String, Handle>>,
    by_handle: RwLock<HashMap<Handle, TagDescriptor>>,
    next_handle: AtomicU32,
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TagRegistry {
    pub fn new() -> Self {
        Self {
            by_path: RwLock::new(HashMap::new()),
            by_handle: RwLock::new(HashMap::new()),
            next_handle: AtomicU32::new(1),
        }
    }

    /// Registers a batch of tags, skipping entries whose path is empty or
    /// whitespace-only. Returns the handle assigned (or reused) for each
    /// surviving entry, in the same order they were submitted.
    pub fn register(&self, items: Vec<TagRegistration>) -> Vec<Handle> {
        let mut handles = Vec::with_capacity(items.len());
        for item in items {
            let path = item.path.trim().to_ascii_lowercase();
            if path.is_empty() {
                continue;
            }

            let existing = self.by_path.read().get(&path).copied();
            let handle = match existing {
                Some(handle) => {
                    let mut by_handle = self.by_handle.write();
                    if let Some(desc) = by_handle.get_mut(&handle) {
                        desc.role = item.role;
                        desc.owner_plugin_instance_id = item.owner_plugin_instance_id.clone();
                    }
                    handle
                }
                None => {
                    let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
                    self.by_path.write().insert(path.clone(), handle);
                    self.by_handle.write().insert(
                        handle,
                        TagDescriptor {
                            handle,
                            path,
                            role: item.role,
                            owner_plugin_instance_id: item.owner_plugin_instance_id,
                        },
                    );
                    handle
                }
            };
            handles.push(handle);
        }
        handles
    }

    /// Implements the `RegisterTags` operation exactly as specified: the
    /// effective owner of each item is `source_override` if present, else
    /// `reference_plugin_instance_id`. Skips items with an empty/whitespace
    /// path. Returns one [`AssignedTag`] per surviving item, in order.
    pub fn register_tags(
        &self,
        reference_plugin_instance_id: &str,
        items: Vec<TagRegistrationItem>,
    ) -> Vec<AssignedTag> {
        let mut out = Vec::with_capacity(items.len());
        let registrations: Vec<(String, TagRole, String)> = items
            .into_iter()
            .filter(|item| !item.path.trim().is_empty())
            .map(|item| {
                let owner = item
                    .source_override
                    .unwrap_or_else(|| reference_plugin_instance_id.to_string());
                (item.path, item.role, owner)
            })
            .collect();

        let handles = self.register(
            registrations
                .iter()
                .map(|(path, role, owner)| TagRegistration {
                    path: path.clone(),
                    role: *role,
                    owner_plugin_instance_id: owner.clone(),
                })
                .collect(),
        );

        for ((path, role, owner), handle) in registrations.into_iter().zip(handles) {
            out.push(AssignedTag {
                tag_path: path,
                role,
                handle,
                source_plugin_instance_id: owner,
                reference_plugin_instance_id: reference_plugin_instance_id.to_string(),
            });
        }
        out
    }

    /// Applies tag identities already assigned by an authoritative remote
    /// registry, rather than allocating new handles locally. Used only on
    /// the client side of a remote backplane, where handle identity belongs
    /// to the server and this registry exists purely as a local mirror for
    /// synchronous path/handle lookups.
    pub fn import_assigned(&self, assigned: &[AssignedTag]) {
        for tag in assigned {
            let path = tag.tag_path.trim().to_ascii_lowercase();
            if path.is_empty() {
                continue;
            }
            self.by_path.write().insert(path.clone(), tag.handle);
            self.by_handle.write().insert(
                tag.handle,
                TagDescriptor {
                    handle: tag.handle,
                    path,
                    role: tag.role,
                    owner_plugin_instance_id: tag.source_plugin_instance_id.clone(),
                },
            );
        }
    }

    pub fn get_by_handle(&self, handle: Handle) -> RegistryResult<TagDescriptor> {
        self.by_handle
            .read()
            .get(&handle)
            .cloned()
            .ok_or(RegistryError::NotRegistered(handle))
    }

    pub fn get_by_path(&self, path: &str) -> RegistryResult<TagDescriptor> {
        let key = path.trim().to_ascii_lowercase();
        let handle = *self
            .by_path
            .read()
            .get(&key)
            .ok_or_else(|| RegistryError::PathNotFound(path.to_string()))?;
        self.get_by_handle(handle)
    }

    /// Number of tags currently registered.
    pub fn len(&self) -> usize {
        self.by_handle.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(path: &str, role: TagRole, owner: &str) -> TagRegistration {
        TagRegistration {
            path: path.to_string(),
            role,
            owner_plugin_instance_id: owner.to_string(),
        }
    }

    #[test]
    fn registers_new_paths_with_increasing_handles() {
        let registry = TagRegistry::new();
        let handles = registry.register(vec![
            reg("plant/line1/temp", TagRole::Producer, "sensor-1"),
            reg("plant/line1/alarm", TagRole::Consumer, "alarm-1"),
        ]);
        assert_eq!(handles.len(), 2);
        assert_ne!(handles[0], 0);
        assert_ne!(handles[0], handles[1]);
    }

    #[test]
    fn re_registering_same_path_is_idempotent() {
        let registry = TagRegistry::new();
        let first = registry.register(vec![reg("a/b", TagRole::Producer, "p1")]);
        let second = registry.register(vec![reg("a/b", TagRole::Consumer, "p2")]);
        assert_eq!(first, second);
        let desc = registry.get_by_handle(first[0]).unwrap();
        assert_eq!(desc.role, TagRole::Consumer);
        assert_eq!(desc.owner_plugin_instance_id, "p2");
    }

    #[test]
    fn empty_and_whitespace_paths_are_skipped() {
        let registry = TagRegistry::new();
        let handles = registry.register(vec![
            reg("", TagRole::Producer, "p1"),
            reg("   ", TagRole::Producer, "p1"),
            reg("real/path", TagRole::Producer, "p1"),
        ]);
        assert_eq!(handles.len(), 1);
    }

    #[test]
    fn path_lookup_is_case_insensitive_trimmed() {
        let registry = TagRegistry::new();
        let handles = registry.register(vec![reg("  a/b  ", TagRole::Producer, "p1")]);
        assert_eq!(registry.get_by_path("a/b").unwrap().handle, handles[0]);
    }

    #[test]
    fn register_tags_reassigns_owner_but_preserves_handle() {
        let registry = TagRegistry::new();
        let first = registry.register_tags(
            "p1",
            vec![TagRegistrationItem {
                path: "A/B".into(),
                role: TagRole::Producer,
                source_override: None,
            }],
        );
        let second = registry.register_tags(
            "p2",
            vec![TagRegistrationItem {
                path: "A/B".into(),
                role: TagRole::Producer,
                source_override: None,
            }],
        );
        assert_eq!(first[0].handle, second[0].handle);
        assert_eq!(registry.get_by_path("a/b").unwrap().owner_plugin_instance_id, "p2");
    }

    #[test]
    fn register_tags_honors_source_override() {
        let registry = TagRegistry::new();
        let assigned = registry.register_tags(
            "gateway",
            vec![TagRegistrationItem {
                path: "x/y".into(),
                role: TagRole::Producer,
                source_override: Some("remote-device-7".into()),
            }],
        );
        assert_eq!(assigned[0].source_plugin_instance_id, "remote-device-7");
        assert_eq!(assigned[0].reference_plugin_instance_id, "gateway");
    }

    #[test]
    fn import_assigned_mirrors_server_allocated_handles() {
        let registry = TagRegistry::new();
        registry.import_assigned(&[AssignedTag {
            tag_path: "Plant/Line1/Remote".into(),
            role: TagRole::Producer,
            handle: 42,
            source_plugin_instance_id: "remote-plugin".into(),
            reference_plugin_instance_id: "gateway".into(),
        }]);

        let desc = registry.get_by_path("plant/line1/remote").unwrap();
        assert_eq!(desc.handle, 42);
        assert_eq!(desc.owner_plugin_instance_id, "remote-plugin");
        assert_eq!(registry.get_by_handle(42).unwrap().path, "plant/line1/remote");
    }

    #[test]
    fn unknown_handle_and_path_return_errors() {
        let registry = TagRegistry::new();
        assert!(matches!(
            registry.get_by_handle(999),
            Err(RegistryError::NotRegistered(999))
        ));
        assert!(matches!(
            registry.get_by_path("nope"),
            Err(RegistryError::PathNotFound(_))
        ));
    }
}
