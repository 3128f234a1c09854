//! Hook for turning a parsed model into generated output.

use crate::model::Model;

/// Turns a finished [`Model`] into generated text.
///
/// The engine hands the hook the model and the name of the source file it
/// came from, and returns whatever the hook produced without inspecting it.
pub trait CodeGenerator {
    /// Produce output for one parsed source file.
    fn generate(&mut self, model: &Model, source_file: &str) -> String;
}
