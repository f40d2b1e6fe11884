//! Sandbox globals that route evaluated style values into generator sessions.
//!
//! Every callback is fault-isolated: a bad argument or a failing generator
//! becomes a diagnostic for the originating file and the call yields
//! `undefined`, so the rest of the run continues.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::core::slice::{EXTRACTORS_GLOBAL, INTRINSIC_GLOBAL, REGISTER_GLOBAL, REPORT_GLOBAL};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::extractors::{Extractor, ExtractorId, ExtractorRegistry, Generator, GeneratorOutput, GeneratorSession};
use crate::sandbox::{EvalError, Function, Object, ObjectClass, Value};

#[derive(Default)]
struct SessionState {
    sessions: BTreeMap<ExtractorId, GeneratorSession>,
    diagnostics: Vec<Diagnostic>,
}

/// Generator sessions for one build plus the globals that feed them.
pub struct Callbacks {
    state: Rc<RefCell<SessionState>>,
    registry: Rc<ExtractorRegistry>,
}

impl Callbacks {
    /// Start a session for every plain extractor, derived ones included.
    pub fn new(registry: &ExtractorRegistry, class_prefix: &str) -> Self {
        let sessions = registry
            .all()
            .into_iter()
            .filter_map(|extractor| {
                extractor
                    .start_session(class_prefix)
                    .map(|session| (extractor.id().clone(), session))
            })
            .collect();
        Self {
            state: Rc::new(RefCell::new(SessionState {
                sessions,
                diagnostics: Vec::new(),
            })),
            registry: Rc::new(registry.clone()),
        }
    }

    /// Global bindings for the sandbox.
    pub fn globals(&self) -> Vec<(String, Value)> {
        let mut extractors = Object::new(ObjectClass::Namespace);
        for extractor in self.registry.top_level() {
            extractors.set(&extractor.id().to_string(), self.callback(extractor));
        }

        let registry = self.registry.clone();
        let state = self.state.clone();
        let register = Value::function(Function::native(REGISTER_GLOBAL, move |args| {
            let id = arg_string(args, 0);
            let Some(extractor) = registry.all().into_iter().find(|e| e.id().to_string() == id) else {
                return Err(EvalError::Type(format!("unknown extractor `{id}`")));
            };
            match extractor {
                Extractor::Plain(_) => {
                    ingest(&state, extractor.id(), &arg_string(args, 1), args.get(2..).unwrap_or_default());
                    Ok(Value::Undefined)
                }
                Extractor::Factory(_) => Err(EvalError::Type(format!("`{id}` is a factory and takes no styles"))),
            }
        }));

        let state = self.state.clone();
        let report = Value::function(Function::native(REPORT_GLOBAL, move |args| {
            let file = arg_string(args, 0);
            let error = args.get(1).map(Value::to_js_string).unwrap_or_default();
            state.borrow_mut().diagnostics.push(
                Diagnostic::warning(DiagnosticCode::ExtractionFailed, format!("failed to evaluate style call: {error}"))
                    .in_file(file),
            );
            Ok(Value::Undefined)
        }));

        let intrinsic = Value::function(Function::native(INTRINSIC_GLOBAL, |args| {
            let id = arg_string(args, 0);
            Ok(Value::function(Function::native(&id, |_| Ok(Value::Undefined))))
        }));

        vec![
            (REGISTER_GLOBAL.to_string(), register),
            (EXTRACTORS_GLOBAL.to_string(), Value::object(extractors)),
            (REPORT_GLOBAL.to_string(), report),
            (INTRINSIC_GLOBAL.to_string(), intrinsic),
        ]
    }

    /// The callable standing in for `extractor`.
    ///
    /// Plain extractors take `(file, ...styles)`. Factories take their
    /// configuration and return an object of derived callbacks.
    fn callback(&self, extractor: &Extractor) -> Value {
        let id = extractor.id().clone();
        match extractor {
            Extractor::Plain(_) => {
                let state = self.state.clone();
                Value::function(Function::native(&id.to_string(), move |args| {
                    ingest(&state, &id, &arg_string(args, 0), args.get(1..).unwrap_or_default());
                    Ok(Value::Undefined)
                }))
            }
            Extractor::Factory(factory) => {
                let derived: Vec<(String, Value)> = factory
                    .derived
                    .iter()
                    .map(|(name, derived)| (name.clone(), self.callback(derived)))
                    .collect();
                Value::function(Function::native(&id.to_string(), move |_| {
                    Ok(Value::plain_object(derived.clone()))
                }))
            }
        }
    }

    /// Finish every session and collect what was raised along the way.
    pub fn drain(self) -> (BTreeMap<ExtractorId, GeneratorOutput>, Vec<Diagnostic>) {
        let mut state = self.state.borrow_mut();
        let outputs = state
            .sessions
            .iter_mut()
            .map(|(id, session)| (id.clone(), session.finish()))
            .filter(|(_, output)| !output.is_empty())
            .collect();
        let diagnostics = std::mem::take(&mut state.diagnostics);
        (outputs, diagnostics)
    }
}

fn arg_string(args: &[Value], i: usize) -> String {
    args.get(i).map(Value::to_js_string).unwrap_or_default()
}

/// Feed style values from `file` into the session for `id`.
fn ingest(state: &RefCell<SessionState>, id: &ExtractorId, file: &str, values: &[Value]) {
    let mut state = state.borrow_mut();
    let SessionState { sessions, diagnostics } = &mut *state;
    let Some(session) = sessions.get_mut(id) else {
        diagnostics.push(
            Diagnostic::warning(DiagnosticCode::CallbackFailed, format!("no generator session for `{id}`")).in_file(file),
        );
        return;
    };
    for value in values {
        if !value.is_plain_object() {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticCode::InvalidStyleArgument,
                    format!("`{id}` expects a plain object, got {}", value.describe()),
                )
                .in_file(file),
            );
            continue;
        }
        if let Err(e) = session.ingest(file, &value.to_json()) {
            diagnostics.push(Diagnostic::warning(DiagnosticCode::GeneratorFailed, format!("`{id}`: {e}")).in_file(file));
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::fixtures::registry;
    use crate::extractors::OutputKey;

    fn global(callbacks: &Callbacks, name: &str) -> Value {
        callbacks
            .globals()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .unwrap()
    }

    fn call(function: &Value, args: &[Value]) -> Result<Value, EvalError> {
        let Value::Function(function) = function else {
            panic!("not a function: {function:?}");
        };
        let Function::Native(native) = &**function else {
            panic!("not native");
        };
        (native.call)(args)
    }

    fn style(entries: &[(&str, Value)]) -> Value {
        Value::plain_object(entries.iter().map(|(k, v)| (k.to_string(), v.clone())))
    }

    #[test]
    fn test_register_feeds_the_session() {
        let callbacks = Callbacks::new(&registry(), "ss-");
        let register = global(&callbacks, REGISTER_GLOBAL);
        call(
            &register,
            &[
                Value::string("@styleslice/core:css"),
                Value::string("/b.ts"),
                style(&[("color", Value::string("red"))]),
            ],
        )
        .unwrap();

        let (outputs, diagnostics) = callbacks.drain();
        assert!(diagnostics.is_empty());
        let css = &outputs[&ExtractorId::new("@styleslice/core", "css")];
        assert_eq!(
            css.get(&OutputKey::File("/b.ts".to_string())).map(String::as_str),
            Some(".ss-css-0 {\n  color: red;\n}")
        );
    }

    #[test]
    fn test_invalid_arguments_become_warnings() {
        let callbacks = Callbacks::new(&registry(), "ss-");
        let register = global(&callbacks, REGISTER_GLOBAL);
        call(
            &register,
            &[Value::string("@styleslice/core:css"), Value::string("/b.ts"), Value::Null],
        )
        .unwrap();
        assert!(call(&register, &[Value::string("nope:css"), Value::string("/b.ts")]).is_err());

        let (outputs, diagnostics) = callbacks.drain();
        assert!(outputs.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::InvalidStyleArgument);
        assert_eq!(diagnostics[0].file.as_deref(), Some("/b.ts"));
    }

    #[test]
    fn test_factories_return_derived_callbacks() {
        let callbacks = Callbacks::new(&registry(), "ss-");
        let Value::Object(extractors) = global(&callbacks, EXTRACTORS_GLOBAL) else {
            panic!("extractors is not an object");
        };
        let factory = extractors.borrow().get("@styleslice/core:createTheme").cloned().unwrap();
        let derived = call(&factory, &[style(&[])]).unwrap();
        let Value::Object(derived) = derived else {
            panic!("factory did not return an object");
        };
        let themed_css = derived.borrow().get("css").cloned().unwrap();
        call(&themed_css, &[Value::string("/theme.ts"), style(&[("margin", Value::Number(2.0))])]).unwrap();

        let (outputs, _) = callbacks.drain();
        let ids: Vec<String> = outputs.keys().map(ToString::to_string).collect();
        assert_eq!(ids, vec!["@styleslice/core:createTheme.css"]);
    }

    #[test]
    fn test_report_records_extraction_failures() {
        let callbacks = Callbacks::new(&registry(), "ss-");
        let report = global(&callbacks, REPORT_GLOBAL);
        call(&report, &[Value::string("/a.ts"), crate::sandbox::error_object("TypeError", "bad")]).unwrap();
        let (_, diagnostics) = callbacks.drain();
        assert_eq!(diagnostics[0].code, DiagnosticCode::ExtractionFailed);
        assert_eq!(diagnostics[0].message, "failed to evaluate style call: TypeError: bad");
    }
}
