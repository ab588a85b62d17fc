use modelvault_core::{FeatureMap, FeatureSchema, FeatureVector};

/// A feature vector plus the auxiliary values computed along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Built<D> {
    pub vector: FeatureVector,
    pub derived: D,
}

/// Maps one domain input to the features an artifact was trained on.
///
/// `compute` re-derives every feature it knows about; `build` then keeps
/// exactly the artifact's declared slots, in declared order. Adapters only
/// read their reference tables.
pub trait FeatureAdapter {
    type Input: ?Sized;
    /// Values callers display next to the prediction (distance, ...).
    type Derived;

    fn compute(&self, input: &Self::Input) -> (FeatureMap, Self::Derived);

    fn build(&self, input: &Self::Input, schema: &FeatureSchema) -> Built<Self::Derived> {
        let (computed, derived) = self.compute(input);
        Built {
            vector: schema.conform(computed),
            derived,
        }
    }
}
