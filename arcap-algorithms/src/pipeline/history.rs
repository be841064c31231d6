use arcap_core::containers::Object3D;

use super::{GeometryBackend, Operator};
use crate::error::ProcessingResult;

/// The current object of a processing session plus the object before the last change, for one level of undo
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectHistory {
    current: Object3D,
    previous: Option<Object3D>,
}

impl ObjectHistory {
    pub fn new(current: Object3D) -> Self {
        Self {
            current,
            previous: None,
        }
    }

    pub fn current(&self) -> &Object3D {
        &self.current
    }

    pub fn previous(&self) -> Option<&Object3D> {
        self.previous.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.previous.is_some()
    }

    /// Makes `object` the current object and remembers the replaced one
    pub fn commit(&mut self, object: Object3D) {
        self.previous = Some(std::mem::replace(&mut self.current, object));
    }

    /// Restores the object before the last commit. Returns false if there is nothing to undo
    pub fn undo(&mut self) -> bool {
        match self.previous.take() {
            Some(previous) => {
                self.current = previous;
                true
            }
            None => false,
        }
    }

    /// Applies `operator` to the current object and commits the result. On failure the history is unchanged
    pub fn apply(
        &mut self,
        operator: &Operator,
        backend: &dyn GeometryBackend,
    ) -> ProcessingResult<&Object3D> {
        let result = backend.apply(operator, &self.current)?;
        self.commit(result);
        Ok(&self.current)
    }
}
