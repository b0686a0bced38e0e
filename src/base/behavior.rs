/// Behaviors shared by every clocked component of the model.
pub trait ModuleBehaviors {
    /// Advance the component by one cycle.
    fn tick_one(&mut self);

    /// Return the component to its power-on state.
    fn reset(&mut self);
}
