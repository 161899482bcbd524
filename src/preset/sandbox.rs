//! Compiling preset function sources into invokable presets.

use std::fmt;

use serde_json::Value;

use crate::expression::bind::{BoundFunction, bind_function};
use crate::expression::eval::Interpreter;
use crate::expression::parser::parse_function;
use crate::foundation::error::PresetResult;
use crate::preset::fetch::Fetcher;
use crate::scene::output::PresetOutput;

/// Anything the pipeline can invoke as `fn(inputData, props)`.
///
/// Implemented by [`CompiledPreset`] and by plain Rust closures, so hosts can register native
/// presets next to serialized ones.
pub trait PresetFunction {
    /// Returns the raw, not yet normalized, preset result.
    fn call(&self, input: &Value, props: &Value, fetcher: &dyn Fetcher) -> PresetResult<Value>;

    /// Calls the function and normalizes its result; `None` means "no contribution".
    fn invoke(
        &self,
        input: &Value,
        props: &Value,
        fetcher: &dyn Fetcher,
    ) -> PresetResult<Option<PresetOutput>> {
        let raw = self.call(input, props, fetcher)?;
        PresetOutput::from_return(raw)
    }
}

/// A preset source that parsed and bound cleanly.
///
/// Holds no reference to the compiling context: the only values a call can observe are its two
/// arguments and whatever `fetch` returns.
#[derive(Clone)]
pub struct CompiledPreset {
    func: BoundFunction,
}

impl fmt::Debug for CompiledPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPreset")
            .field("params", &self.func.def.params)
            .field("slots", &self.func.slot_count)
            .finish()
    }
}

impl CompiledPreset {
    pub fn params(&self) -> &[String] {
        &self.func.def.params
    }
}

/// Compiles a serialized preset function such as `(input, props) => ({ childrenData: [] })`.
pub fn compile(source: &str) -> PresetResult<CompiledPreset> {
    let def = parse_function(source.trim())?;
    let func = bind_function(def)?;
    Ok(CompiledPreset { func })
}

impl PresetFunction for CompiledPreset {
    fn call(&self, input: &Value, props: &Value, fetcher: &dyn Fetcher) -> PresetResult<Value> {
        let args = [input.clone(), props.clone()];
        Ok(Interpreter::new(fetcher).call(&self.func, &args)?)
    }
}

impl<F> PresetFunction for F
where
    F: Fn(&Value, &Value) -> PresetResult<Value>,
{
    fn call(&self, input: &Value, props: &Value, _fetcher: &dyn Fetcher) -> PresetResult<Value> {
        self(input, props)
    }
}
