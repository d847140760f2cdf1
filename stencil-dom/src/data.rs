use serde_json::Value;

/// Read side of the reactive observer.
///
/// Every `get` is a dependency read: observers record the keypath so the
/// render can be scheduled again when it changes.
pub trait Data {
    fn get(&mut self, keypath: &str) -> Option<Value>;

    /// Calls a host-registered function. `None` means no such function.
    fn call(&mut self, name: &str, args: Vec<Value>) -> Option<Value> {
        let _ = (name, args);
        None
    }
}

/// Plain values act as a data source with no dependency tracking.
impl Data for Value {
    fn get(&mut self, keypath: &str) -> Option<Value> {
        stencil_expr::value::get_path(self, keypath)
    }
}
