#[cfg(test)]
mod script_tests {
    use crate::parser::{parse_expression, parse_statements};
    use crate::runtime::{Interpreter, Limits, ScriptHost, Value};
    use anyhow::{anyhow, Result};
    use serde_json::json;
    use std::rc::Rc;

    /// Records capability calls instead of touching a scheduler
    #[derive(Default)]
    struct RecordingHost {
        scheduled: Vec<(String, serde_json::Value, f64)>,
        cancelled: Vec<String>,
    }

    impl ScriptHost for RecordingHost {
        fn call_helper(&mut self, name: &str, params: Value) -> Result<Value> {
            match name {
                "double" => Ok(Value::Number(params.to_number() * 2.0)),
                _ => Err(anyhow!("unknown helper {}", name)),
            }
        }

        fn schedule_action(&mut self, name: &str, params: Value, delay_ms: f64) -> Result<()> {
            self.scheduled.push((name.to_string(), params.to_json(), delay_ms));
            Ok(())
        }

        fn cancel_action(&mut self, name: &str) -> Result<()> {
            self.cancelled.push(name.to_string());
            Ok(())
        }

        fn random(&mut self) -> f64 {
            0.25
        }
    }

    fn eval(source: &str) -> Value {
        let mut host = RecordingHost::default();
        let expr = parse_expression(source).unwrap();
        Interpreter::new(&mut host, Limits::default())
            .eval(&expr)
            .unwrap()
    }

    /// Run a body as a function of `(state, params)` and return its result
    fn run(source: &str, state: serde_json::Value, params: serde_json::Value) -> Result<Value> {
        let mut host = RecordingHost::default();
        run_with(&mut host, source, state, params, Limits::default())
    }

    fn run_with(
        host: &mut RecordingHost,
        source: &str,
        state: serde_json::Value,
        params: serde_json::Value,
        limits: Limits,
    ) -> Result<Value> {
        let program = parse_statements(source)?;
        let def = Rc::new(crate::parser::FunctionDef {
            name: None,
            params: vec![
                crate::parser::ast::Binding::identifier("state"),
                crate::parser::ast::Binding::identifier("params"),
                crate::parser::ast::Binding::identifier("helpers"),
            ],
            body: crate::parser::ast::FunctionBody::Block(program.statements),
        });
        let mut helpers = crate::runtime::Object::new();
        helpers.insert(
            "double".to_string(),
            Value::Function(crate::runtime::Callable::Helper("double".to_string())),
        );
        helpers.insert(
            "scheduleAction".to_string(),
            Value::Function(crate::runtime::Callable::ScheduleAction),
        );
        helpers.insert(
            "cancelAction".to_string(),
            Value::Function(crate::runtime::Callable::CancelAction),
        );
        let mut interpreter = Interpreter::new(host, limits);
        interpreter.call_function(
            &def,
            vec![
                Value::from(state),
                Value::from(params),
                Value::Object(helpers),
            ],
        )
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(eval("1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(eval("2 ** 10"), Value::Number(1024.0));
        assert_eq!(eval("7 % 3"), Value::Number(1.0));
        assert_eq!(eval("'a' + 1"), Value::string("a1"));
        assert_eq!(eval("'5' * '2'"), Value::Number(10.0));
        assert_eq!(eval("`${1 + 1} items`"), Value::string("2 items"));
    }

    #[test]
    fn test_comparison_and_logic() {
        assert_eq!(eval("1 == '1'"), Value::Bool(true));
        assert_eq!(eval("1 === '1'"), Value::Bool(false));
        assert_eq!(eval("null ?? 'fallback'"), Value::string("fallback"));
        assert_eq!(eval("0 || 'x'"), Value::string("x"));
        assert_eq!(eval("0 ?? 'x'"), Value::Number(0.0));
        assert_eq!(eval("'b' > 'a' && 2 >= 2"), Value::Bool(true));
        assert_eq!(eval("typeof missing"), Value::string("undefined"));
        assert_eq!(eval("typeof [1]"), Value::string("object"));
    }

    #[test]
    fn test_optional_chaining_short_circuits() {
        assert_eq!(eval("null?.a.b.c"), Value::Undefined);
        assert_eq!(eval("({ a: null }).a?.b"), Value::Undefined);
        assert_eq!(eval("({ a: { b: 2 } })?.a.b"), Value::Number(2.0));
    }

    #[test]
    fn test_reading_property_of_undefined_fails() {
        let mut host = RecordingHost::default();
        let expr = parse_expression("undefined.x").unwrap();
        let err = Interpreter::new(&mut host, Limits::default())
            .eval(&expr)
            .unwrap_err();
        assert!(err.to_string().contains("reading 'x'"));
    }

    #[test]
    fn test_globals() {
        assert_eq!(eval("Math.max(3, 9, 4)"), Value::Number(9.0));
        assert_eq!(eval("Math.round(2.5)"), Value::Number(3.0));
        assert_eq!(eval("Math.random()"), Value::Number(0.25));
        assert_eq!(eval("parseInt('42px')"), Value::Number(42.0));
        assert_eq!(eval("JSON.stringify({ a: [1, 'x'] })"), Value::string("{\"a\":[1,\"x\"]}"));
        assert_eq!(eval("JSON.parse('{\"n\": 3}').n"), Value::Number(3.0));
        assert_eq!(eval("Object.keys({ a: 1, b: 2 }).join('')"), Value::string("ab"));
        assert_eq!(eval("Array.isArray([])"), Value::Bool(true));
        assert_eq!(eval("Array(3).fill('').length"), Value::Number(3.0));
        assert_eq!(eval("Array.from({ length: 3 }, (_, i) => i * i)"), Value::from(json!([0, 1, 4])));
        assert_eq!(eval("(3.14159).toFixed(2)"), Value::string("3.14"));
        assert_eq!(eval("String(12) + Number('3')"), Value::string("123"));
    }

    #[test]
    fn test_array_methods() {
        assert_eq!(eval("[1, 2, 3].map(x => x * 2)"), Value::from(json!([2, 4, 6])));
        assert_eq!(eval("[1, 2, 3, 4].filter(x => x % 2 === 0)"), Value::from(json!([2, 4])));
        assert_eq!(eval("[1, 2, 3].reduce((a, b) => a + b, 0)"), Value::Number(6.0));
        assert_eq!(eval("['a', 'b'].indexOf('b')"), Value::Number(1.0));
        assert_eq!(eval("[1, [2, [3]]].flat()"), Value::from(json!([1, 2, [3]])));
        assert_eq!(eval("[3, 1, 2].sort((a, b) => a - b)"), Value::from(json!([1, 2, 3])));
        assert_eq!(eval("[10, 9, 1].sort()"), Value::from(json!([1, 10, 9])));
        assert_eq!(eval("['', 'X', ''].every(c => c !== 'O')"), Value::Bool(true));
        assert_eq!(eval("[1, 2, 3].find(x => x > 1)"), Value::Number(2.0));
        assert_eq!(eval("[1, 2, 3].slice(-2)"), Value::from(json!([2, 3])));
    }

    #[test]
    fn test_callback_receives_whole_array() {
        assert_eq!(
            eval("[1, 2, 3].map((x, i, all) => all.length)"),
            Value::from(json!([3, 3, 3]))
        );
    }

    #[test]
    fn test_mutating_methods_write_back() {
        let result = run(
            "const list = [...state.items]\nlist.push(4)\nlist.shift()\nreturn { items: list }",
            json!({"items": [1, 2, 3]}),
            json!({}),
        )
        .unwrap();
        assert_eq!(result, Value::from(json!({"items": [2, 3, 4]})));
    }

    #[test]
    fn test_nested_assignment_writes_through() {
        let result = run(
            "const board = state.board.slice()\nboard[params.index] = 'X'\nstate.meta.moves += 1\nreturn { board, moves: state.meta.moves }",
            json!({"board": ["", "", ""], "meta": {"moves": 0}}),
            json!({"index": 1}),
        )
        .unwrap();
        assert_eq!(
            result,
            Value::from(json!({"board": ["", "X", ""], "moves": 1}))
        );
    }

    #[test]
    fn test_const_reassignment_fails() {
        let err = run("const a = 1\na = 2", json!({}), json!({})).unwrap_err();
        assert!(err.to_string().contains("constant"));
    }

    #[test]
    fn test_destructuring_and_defaults() {
        let result = run(
            "const { board, isXNext = true, missing = 'd' } = state\nconst [first, , third] = board\nreturn { first, third, isXNext, missing }",
            json!({"board": ["a", "b", "c"]}),
            json!({}),
        )
        .unwrap();
        assert_eq!(
            result,
            Value::from(json!({"first": "a", "third": "c", "isXNext": true, "missing": "d"}))
        );
    }

    #[test]
    fn test_loops_and_control_flow() {
        let result = run(
            r#"
            let total = 0
            for (let i = 0; i < 10; i++) {
                if (i % 2) continue
                if (i > 6) break
                total += i
            }
            let keys = ''
            for (const k in { a: 1, b: 2 }) keys += k
            let n = 0
            while (true) { n++; if (n >= 3) break }
            for (const c of 'xy') keys += c
            return { total, keys, n }
            "#,
            json!({}),
            json!({}),
        )
        .unwrap();
        assert_eq!(
            result,
            Value::from(json!({"total": 12, "keys": "abxy", "n": 3}))
        );
    }

    #[test]
    fn test_closures_capture_by_value() {
        let result = run(
            "let x = 1\nconst read = () => x\nx = 2\nreturn read()",
            json!({}),
            json!({}),
        )
        .unwrap();
        assert_eq!(result, Value::Number(1.0));
    }

    #[test]
    fn test_recursive_function_declaration() {
        let result = run(
            "return fact(5)\nfunction fact(n) { return n <= 1 ? 1 : n * fact(n - 1) }",
            json!({}),
            json!({}),
        )
        .unwrap();
        assert_eq!(result, Value::Number(120.0));
    }

    #[test]
    fn test_winner_check_helper_body() {
        let source = r#"
            const lines = [[0,1,2],[3,4,5],[6,7,8],[0,3,6],[1,4,7],[2,5,8],[0,4,8],[2,4,6]];
            for (const [a, b, c] of lines) {
                if (params.board[a] && params.board[a] === params.board[b] && params.board[a] === params.board[c]) {
                    return params.board[a];
                }
            }
            return null;
        "#;
        let winner = run(
            source,
            json!({}),
            json!({"board": ["X", "X", "X", "O", "O", "", "", "", ""]}),
        )
        .unwrap();
        assert_eq!(winner, Value::string("X"));

        let none = run(source, json!({}), json!({"board": ["", "", "", "", "", "", "", "", ""]})).unwrap();
        assert_eq!(none, Value::Null);
    }

    #[test]
    fn test_capabilities_are_routed_to_host() {
        let mut host = RecordingHost::default();
        let result = run_with(
            &mut host,
            "helpers.scheduleAction('tick', { n: 1 }, 500)\nhelpers.cancelAction('other')\nreturn helpers.double(21)",
            json!({}),
            json!({}),
            Limits::default(),
        )
        .unwrap();

        assert_eq!(result, Value::Number(42.0));
        assert_eq!(host.scheduled, vec![("tick".to_string(), json!({"n": 1}), 500.0)]);
        assert_eq!(host.cancelled, vec!["other".to_string()]);
    }

    #[test]
    fn test_step_budget_stops_infinite_loop() {
        let mut host = RecordingHost::default();
        let limits = Limits {
            step_budget: 1_000,
            ..Limits::default()
        };
        let err = run_with(&mut host, "while (true) {}", json!({}), json!({}), limits).unwrap_err();
        assert!(err.to_string().contains("budget"));
    }

    #[test]
    fn test_oversized_values_are_rejected() {
        for body in [
            "return 'ab'.repeat(1e19)",
            "return Array.from({ length: 1e19 })",
            "return Array(4e9)",
            "return 'x'.padStart(1e12)",
            "let list = []\nlist.length = 4e9\nreturn list",
            "let list = []\nlist[4e9 - 2] = 1\nreturn list",
            "return 'ab'.replaceAll('', 'x'.repeat(500000))",
            "return Array(1000).fill('x'.repeat(100000))",
            "return Array(50000).fill('ab').join('x'.repeat(1000))",
            "let s = 'x'.repeat(1000)\nwhile (true) { s = s + s }",
            "let s = 'x'.repeat(1000)\nwhile (true) { s = `${s}${s}` }",
            "let list = [1]\nwhile (true) { list = list.concat(list) }",
            "let list = [1]\nwhile (true) { list.push(...list) }",
        ] {
            let err = run(body, json!({}), json!({})).unwrap_err();
            assert!(err.to_string().contains("limit"), "{}: {}", body, err);
        }
    }

    #[test]
    fn test_lengths_within_limits_still_work() {
        let limits = Limits {
            max_array_len: 8,
            max_string_len: 8,
            ..Limits::default()
        };
        let mut host = RecordingHost::default();
        let result = run_with(
            &mut host,
            "let list = Array(3).fill(0)\nlist.length = 8\nreturn [list.length, 'ab'.repeat(4), '7'.padStart(8, '0')]",
            json!({}),
            json!({}),
            limits,
        )
        .unwrap();
        assert_eq!(result.to_json(), json!([8, "abababab", "00000007"]));

        let err = run_with(&mut host, "return 'ab'.repeat(5)", json!({}), json!({}), limits).unwrap_err();
        assert!(err.to_string().contains("limit"));
        assert!(run("return Array(-1)", json!({}), json!({})).is_err());
    }

    #[test]
    fn test_call_depth_is_capped() {
        let err = run(
            "function loop(n) { return loop(n + 1) }\nreturn loop(0)",
            json!({}),
            json!({}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("call depth"));
    }

    #[test]
    fn test_no_ambient_capabilities() {
        assert!(run("return require('fs')", json!({}), json!({})).is_err());
        assert!(run("return process.env", json!({}), json!({})).is_err());
        assert!(run("return window", json!({}), json!({})).is_err());
    }

    #[test]
    fn test_ambient_state_bindings() {
        let mut host = RecordingHost::default();
        let state = Value::from(json!({"count": 4, "items": [1, 2]}));
        let expr = parse_expression("count * 2 + state.items.length").unwrap();
        let result = Interpreter::new(&mut host, Limits::default())
            .with_ambient_state(&state)
            .eval(&expr)
            .unwrap();
        assert_eq!(result, Value::Number(10.0));
    }
}
