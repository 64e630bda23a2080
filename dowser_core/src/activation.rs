use std::collections::HashMap;

/// Scalar activation function applied at each network node.
pub type ActivationFn = fn(f64) -> f64;

/// Name-keyed table of activation functions.
///
/// The registry ships with the common activations and accepts extras through
/// `register`, so callers can make custom functions available to network
/// construction under a plain string name.
#[derive(Debug, Clone)]
pub struct ActivationRegistry {
    functions: HashMap<String, ActivationFn>,
}

impl ActivationRegistry {
    /// Registry with no functions at all; the caller registers every one.
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in activations.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("sigmoid", sigmoid);
        registry.register("tanh", tanh);
        registry.register("sin", sine);
        registry.register("gauss", gauss);
        registry.register("relu", relu);
        registry.register("identity", identity);
        registry.register("clamped", clamped);
        registry.register("abs", absolute);
        registry
    }

    /// Adds or replaces an activation under `name`.
    pub fn register(&mut self, name: &str, function: ActivationFn) {
        self.functions.insert(name.to_string(), function);
    }

    pub fn get(&self, name: &str) -> Option<ActivationFn> {
        self.functions.get(name).copied()
    }

    /// Registered names in sorted order, so callers that pick an activation
    /// from this list by seeded index get the same pick for the same seed.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for ActivationRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn sigmoid(x: f64) -> f64 {
    let z = (5.0 * x).clamp(-60.0, 60.0);
    1.0 / (1.0 + (-z).exp())
}

fn tanh(x: f64) -> f64 {
    x.tanh()
}

fn sine(x: f64) -> f64 {
    x.sin()
}

fn gauss(x: f64) -> f64 {
    let z = x.clamp(-3.4, 3.4);
    (-5.0 * z * z).exp()
}

fn relu(x: f64) -> f64 {
    if x > 0.0 { x } else { 0.0 }
}

fn identity(x: f64) -> f64 {
    x
}

fn clamped(x: f64) -> f64 {
    x.clamp(-1.0, 1.0)
}

fn absolute(x: f64) -> f64 {
    x.abs()
}
