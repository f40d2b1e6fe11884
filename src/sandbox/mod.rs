//! Built-in evaluator for bundled style code.
//!
//! Runs a [`Bundle`] to completion with a set of global bindings. Only the
//! constant-expression subset of JavaScript that style code uses is
//! implemented; anything else raises an error when it is executed.

mod builtins;
mod env;
mod error;
mod interp;
mod methods;
mod module;
mod ops;
mod value;

pub use env::Scope;
pub use error::{EvalError, error_object};
pub use module::ModuleFailure;
pub use value::{Function, Native, NativeFn, Object, ObjectClass, Value};

use crate::core::build::Bundle;

/// Call depth for interpreted functions.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// What a completed run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub steps: u64,
    /// Modules whose top level threw, in execution order.
    pub failures: Vec<ModuleFailure>,
}

#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    /// Evaluation fuel; unbounded when `None`.
    pub max_steps: Option<u64>,
    pub max_depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            max_steps: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Evaluator {
    pub fn new(max_steps: Option<u64>) -> Self {
        Self {
            max_steps,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Run `bundle` with `globals` bound as free variables.
    ///
    /// A module that throws at its top level is reported in the summary and
    /// does not stop the others. Running out of steps fails the whole run.
    pub fn run(&self, bundle: &Bundle, globals: Vec<(String, Value)>) -> Result<RunSummary, EvalError> {
        let root = Scope::root();
        builtins::install(&root);
        for (name, value) in globals {
            root.declare(&name, env::Slot::Value(value), false);
        }

        let mut interp = interp::Interpreter::new(bundle, root, self.max_steps, self.max_depth);
        interp.instantiate()?;
        let failures = interp.execute()?;
        tracing::debug!(
            steps = interp.steps(),
            modules = bundle.modules.len(),
            failed = failures.len(),
            "sandbox run finished"
        );
        Ok(RunSummary {
            steps: interp.steps(),
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;
    use serde_json::{Value as Json, json};

    use super::*;
    use crate::core::build::{Bundler, MemoryBundler};

    /// Run `files` (the first is the entry) and collect what `emit(...)` saw.
    fn run_summary(evaluator: Evaluator, files: &[(&str, &str)]) -> (Result<RunSummary, EvalError>, Vec<Json>) {
        let modules: BTreeMap<String, Option<String>> = files
            .iter()
            .map(|(path, code)| (path.to_string(), Some(code.to_string())))
            .collect();
        let bundle = MemoryBundler.bundle(files[0].0, &modules).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let emit = Value::function(Function::native("emit", move |args| {
            sink.borrow_mut().push(args.first().map(Value::to_json).unwrap_or(Json::Null));
            Ok(Value::Undefined)
        }));
        let summary = evaluator.run(&bundle, vec![("emit".to_string(), emit)]);
        let out = seen.borrow().clone();
        (summary, out)
    }

    /// Like [`run_summary`], with the first module failure as the error.
    fn run_with(evaluator: Evaluator, files: &[(&str, &str)]) -> Result<Vec<Json>, EvalError> {
        let (summary, out) = run_summary(evaluator, files);
        match summary?.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(out),
        }
    }

    fn run(files: &[(&str, &str)]) -> Vec<Json> {
        run_with(Evaluator::default(), files).unwrap()
    }

    fn run_one(code: &str) -> Vec<Json> {
        run(&[("/entry.ts", code)])
    }

    #[test]
    fn test_expressions_and_templates() {
        let out = run_one(
            r#"
            const size = 4;
            const unit = "px";
            emit(`${size * 2}${unit}`);
            emit({ margin: size / 8, padding: [1, 2, 3].map((n) => n * size), ["k" + 1]: true });
            emit(size > 2 ? "big" : "small");
            emit(null ?? "fallback");
            emit(typeof missing);
            emit(0.1 + 0.2);
            "#,
        );
        assert_eq!(
            out,
            vec![
                json!("8px"),
                json!({ "margin": 0.5, "padding": [4, 8, 12], "k1": true }),
                json!("big"),
                json!("fallback"),
                json!("undefined"),
                json!(0.30000000000000004),
            ]
        );
    }

    #[test]
    fn test_functions_destructuring_and_spread() {
        let out = run_one(
            r#"
            function scale(base, { factor = 2, ...rest } = {}) {
              return { value: base * factor, ...rest };
            }
            const [first, , third = 9, ...others] = [1, 2, undefined, 4, 5];
            const add = (a) => (b) => a + b;
            emit(scale(3));
            emit(scale(3, { factor: 3, unit: "rem" }));
            emit([first, third, others]);
            emit(add(1)(2));
            emit(Math.max(...[3, 7, 5]));
            "#,
        );
        assert_eq!(
            out,
            vec![
                json!({ "value": 6 }),
                json!({ "value": 9, "unit": "rem" }),
                json!([1, 9, [4, 5]]),
                json!(3),
                json!(7),
            ]
        );
    }

    #[test]
    fn test_control_flow() {
        let out = run_one(
            r#"
            let total = 0;
            outer: for (let i = 0; i < 5; i++) {
              for (const j of [1, 2, 3]) {
                if (j === 2) continue;
                if (i === 3) break outer;
                total += i * j;
              }
            }
            emit(total);
            const keys = [];
            for (const key in { a: 1, b: 2 }) keys.push(key);
            emit(keys);
            let n = 0;
            while (true) { if (++n > 3) break; }
            emit(n);
            switch ("b") { case "a": emit("a"); case "b": emit("b"); case "c": emit("c"); break; default: emit("d"); }
            "#,
        );
        assert_eq!(out, vec![json!(12), json!(["a", "b"]), json!(4), json!("b"), json!("c")]);
    }

    #[test]
    fn test_try_catch_and_errors() {
        let out = run_one(
            r#"
            try { null.x; } catch (err) { emit(err.name); }
            try { throw new Error("boom"); } catch ({ message }) { emit(message); }
            try { tdz; let tdz = 1; } catch (err) { emit(err.name); }
            let cleaned = false;
            try { try { throw 1; } finally { cleaned = true; } } catch (value) { emit([value, cleaned]); }
            "#,
        );
        assert_eq!(
            out,
            vec![json!("TypeError"), json!("boom"), json!("ReferenceError"), json!([1, true])]
        );
    }

    #[test]
    fn test_uncaught_throw_is_an_error() {
        let err = run_with(Evaluator::default(), &[("/entry.ts", "throw new RangeError('nope');")]).unwrap_err();
        assert_eq!(err.to_string(), "uncaught RangeError: nope");
    }

    #[test]
    fn test_top_level_failures_are_isolated_per_module() {
        let (summary, out) = run_summary(
            Evaluator::default(),
            &[
                ("/entry.ts", "import './bad'; import './good'; emit('entry');"),
                ("/bad.ts", "emit('bad'); null.x; emit('unreachable');"),
                ("/good.ts", "emit('good');"),
            ],
        );
        let summary = summary.unwrap();
        assert_eq!(out, vec![json!("bad"), json!("good"), json!("entry")]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].path, "/bad.ts");
        assert!(matches!(summary.failures[0].error, EvalError::Type(_)));
    }

    #[test]
    fn test_recursion_depth() {
        let code = "const down = (n) => (n === 0 ? 0 : 1 + down(n - 1)); emit(down(200));";
        let deep = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(move || run_one(code))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(deep, vec![json!(200)]);

        let err = run_with(Evaluator::default().with_max_depth(50), &[("/entry.ts", code)]).unwrap_err();
        assert!(matches!(err, EvalError::Range(_)));
    }

    #[test]
    fn test_step_limit_cannot_be_caught() {
        let err = run_with(
            Evaluator::new(Some(500)),
            &[("/entry.ts", "try { while (true) {} } catch (e) { emit('caught'); }")],
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::StepLimit(500)));
    }

    #[test]
    fn test_native_work_is_bounded() {
        let huge = run_with(Evaluator::new(Some(10_000)), &[("/entry.ts", "const a = []; a.length = 5e9;")]);
        assert!(matches!(huge, Err(EvalError::Range(_))));

        let padded = run_with(Evaluator::default(), &[("/entry.ts", "emit('x'.padStart(1e9));")]);
        assert!(matches!(padded, Err(EvalError::Range(_))));

        let out = run_one("try { 'ab'.repeat(999999).repeat(999); } catch (e) { emit('caught'); }");
        assert_eq!(out, vec![json!("caught")]);

        // Growth is charged as steps even though no interpreted loop runs.
        let grown = run_with(Evaluator::new(Some(10_000)), &[("/entry.ts", "const a = []; a.length = 100000;")]);
        assert!(matches!(grown, Err(EvalError::StepLimit(10_000))));

        let spread = run_with(
            Evaluator::new(Some(10_000)),
            &[("/entry.ts", "const a = []; a.length = 4000; const b = [...a, ...a, ...a];")],
        );
        assert!(matches!(spread, Err(EvalError::StepLimit(10_000))));
    }

    #[test]
    fn test_modules_and_live_bindings() {
        let out = run(&[
            (
                "/entry.ts",
                r#"
                import theme, { color, bump, count } from "./theme";
                import * as all from "./barrel";
                emit(color);
                bump();
                emit(count);
                emit(theme.name);
                emit(Object.keys(all));
                emit(all.spacing.sm);
                "#,
            ),
            (
                "/theme.ts",
                r#"
                export const color = "red";
                export let count = 0;
                export function bump() { count += 1; }
                export default { name: "light" };
                "#,
            ),
            ("/barrel.ts", "export * from './tokens'; export { color as primary } from './theme';"),
            ("/tokens.ts", "export const spacing = { sm: 4 } as const;"),
        ]);
        assert_eq!(
            out,
            vec![json!("red"), json!(1), json!("light"), json!(["primary", "spacing"]), json!(4)]
        );
    }

    #[test]
    fn test_external_imports_fail_only_when_read() {
        let out = run_one(
            r#"
            import { unused, used } from "some-package";
            emit("before");
            try { used; } catch (err) { emit(err.name); }
            "#,
        );
        assert_eq!(out, vec![json!("before"), json!("ReferenceError")]);
    }

    #[test]
    fn test_typescript_wrappers_and_enums() {
        let out = run_one(
            r#"
            enum Size { Small = 2, Large }
            const px = (n: number): string => `${n}px`;
            const value = (Size.Large as number)!;
            emit(px(value satisfies number));
            emit(Size[2]);
            "#,
        );
        assert_eq!(out, vec![json!("3px"), json!("Small")]);
    }

    #[test]
    fn test_builtin_methods() {
        let out = run_one(
            r#"
            emit([3, 1, 2].sort((a, b) => a - b));
            emit(["a", "b"].join("-").toUpperCase());
            emit("  pad ".trim().padStart(5, "*"));
            emit([1, 2, 3].reduce((acc, n) => acc + n, 0));
            emit(Object.entries({ a: 1 }));
            emit(JSON.stringify({ a: [1, "x"] }));
            emit((1.005).toFixed(1));
            emit("a,b".split(","));
            "#,
        );
        assert_eq!(
            out,
            vec![
                json!([1, 2, 3]),
                json!("A-B"),
                json!("**pad"),
                json!(6),
                json!([["a", 1]]),
                json!("{\"a\":[1,\"x\"]}"),
                json!("1.0"),
                json!(["a", "b"]),
            ]
        );
    }

    #[test]
    fn test_unsupported_syntax_is_reported_when_executed() {
        let out = run_one("function never() { class A {} } emit('ok');");
        assert_eq!(out, vec![json!("ok")]);

        let err = run_with(Evaluator::default(), &[("/entry.ts", "class A {}")]).unwrap_err();
        assert!(matches!(err, EvalError::Unsupported(_)));
    }
}
