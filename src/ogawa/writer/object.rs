//! Object handles for writing.

use super::archive::{NodeId, Shared};
use super::property::OCompoundProperty;
use crate::core::{MetaData, ObjectHeader};
use crate::util::Result;

/// Handle to an object in an archive being written.
///
/// Handles are cheap to clone and all point into the same archive. An
/// object stays writable until it is finalized or the archive closes;
/// finalizing also writes every descendant.
#[derive(Clone)]
pub struct OObject {
    shared: Shared,
    id: NodeId,
}

impl OObject {
    pub(crate) fn new(shared: Shared, id: NodeId) -> Self {
        Self { shared, id }
    }

    pub fn header(&self) -> Result<ObjectHeader> {
        Ok(self.shared.lock().object_header(self.id)?.clone())
    }

    pub fn name(&self) -> String {
        self.header().map(|h| h.name).unwrap_or_default()
    }

    pub fn full_name(&self) -> String {
        self.header().map(|h| h.full_name).unwrap_or_default()
    }

    pub fn num_children(&self) -> usize {
        self.shared
            .lock()
            .object_children(self.id)
            .map_or(0, <[NodeId]>::len)
    }

    /// Add a child object. Fails on a duplicate or malformed name, or when
    /// this object is already finalized.
    pub fn create_child(&self, name: &str, meta_data: MetaData) -> Result<OObject> {
        let id = self.shared.lock().create_object(self.id, name, meta_data)?;
        Ok(OObject::new(self.shared.clone(), id))
    }

    /// The object's property compound.
    pub fn properties(&self) -> Result<OCompoundProperty> {
        let id = self.shared.lock().object_properties(self.id)?;
        Ok(OCompoundProperty::new(self.shared.clone(), id))
    }

    /// Write this object and everything below it. Later writes fail with
    /// [`Error::Frozen`](crate::util::Error::Frozen).
    pub fn finalize(&self) -> Result<()> {
        let mut state = self.shared.lock();
        state.check_open()?;
        state.freeze_object(self.id).map(drop)
    }

    pub fn is_finalized(&self) -> bool {
        self.shared.lock().is_frozen(self.id)
    }
}

impl std::fmt::Debug for OObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OObject").field("id", &self.id).finish()
    }
}
