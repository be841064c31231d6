//! Chains processing operators into a session: a pluggable [GeometryBackend], a single-level undo
//! [ObjectHistory] and a background [ProcessingWorker]

mod backend;
pub use self::backend::*;

mod history;
pub use self::history::*;

mod operator;
pub use self::operator::*;

mod worker;
pub use self::worker::*;

use arcap_core::containers::Object3D;
use log::info;

use crate::error::ProcessingResult;

/// An ordered list of operators that are applied one after another
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pipeline {
    pub operators: Vec<Operator>,
}

impl Pipeline {
    pub fn new(operators: Vec<Operator>) -> Self {
        Self { operators }
    }

    /// Applies all operators in order. Stops at the first failing operator
    pub fn run(&self, object: &Object3D, backend: &dyn GeometryBackend) -> ProcessingResult<Object3D> {
        let mut current = object.clone();
        for (step, operator) in self.operators.iter().enumerate() {
            info!("Step {}/{} on the {} backend", step + 1, self.operators.len(), backend.name());
            current = backend.apply(operator, &current)?;
        }
        Ok(current)
    }

    /// Applies all operators in order through `history`, so that the last step can be undone. On failure, the
    /// steps before the failing one stay committed
    pub fn run_with_history(
        &self,
        history: &mut ObjectHistory,
        backend: &dyn GeometryBackend,
    ) -> ProcessingResult<()> {
        for operator in &self.operators {
            history.apply(operator, backend)?;
        }
        Ok(())
    }
}

impl FromIterator<Operator> for Pipeline {
    fn from_iter<T: IntoIterator<Item = Operator>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
