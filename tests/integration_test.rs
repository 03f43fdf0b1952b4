// Integration tests for the REPL session and the program image

use crepl::interpreter::errors::RuntimeError;
use crepl::interpreter::image::{compile_unit, ProgramImage};
use crepl::memory::value::Value;
use crepl::repl::analyzer::{analyze, Completeness};
use crepl::repl::classifier::{classify, Classification};
use crepl::repl::splitter::split;
use crepl::repl::{CodeLine, Event, LineKind, Session, State};

fn run_program(source: &str) -> Result<Value, RuntimeError> {
    let mut image = ProgramImage::new(1024 * 1024 * 100, 256);
    let unit = compile_unit(source, 0, &mut Vec::new()).expect("Compilation failed");
    image.link(unit).expect("Linking failed");
    image.invoke("main")
}

/// Feed lines to a session and collect every event
fn feed(session: &mut Session, lines: &[&str]) -> Vec<Event> {
    lines.iter().flat_map(|line| session.process(line).events).collect()
}

fn results(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Result(line) => Some(line.clone()),
            _ => None,
        })
        .collect()
}

fn eval(session: &mut Session, line: &str) -> String {
    let events = session.process(line).events;
    let mut found = results(&events);
    assert_eq!(found.len(), 1, "expected one result for {:?}, got {:?}", line, events);
    found.remove(0)
}

// === ANALYZER PROPERTIES ===

#[test]
fn test_balanced_input_has_depth_zero() {
    for input in [
        "int x;",
        "x = (1 + 2) * 3;",
        "int f(int a[]) { return a[0]; }",
        "while (x) { if (y) { z(); } }",
    ] {
        let analysis = analyze(input);
        assert_eq!(analysis.completeness, Completeness::Complete, "{}", input);
        assert_eq!(analysis.depth, 0, "{}", input);
    }
}

#[test]
fn test_unmatched_openers_set_depth() {
    let cases = [("int f(void) {", 1), ("if (x) { while (y) {", 2), ("g(h(a[", 3)];
    for (input, depth) in cases {
        let analysis = analyze(input);
        assert_eq!(analysis.completeness, Completeness::Incomplete, "{}", input);
        assert_eq!(analysis.depth, depth, "{}", input);
    }
}

#[test]
fn test_do_block_needs_while() {
    let mut buffer = String::from("do { x++; }");
    assert_eq!(analyze(&buffer).completeness, Completeness::Incomplete);
    buffer.push_str(" while (x < 10);");
    assert_eq!(analyze(&buffer).completeness, Completeness::Complete);
}

#[test]
fn test_analysis_has_no_side_effects() {
    let buffer = "int f(void) {\n  return 1;\n";
    let first = analyze(buffer);
    let second = analyze(buffer);
    assert_eq!(first, second);
    assert_eq!(classify("", "42 + 1;"), classify("", "42 + 1;"));
}

// === SESSION PROPERTIES ===

#[test]
fn test_expression_statement() {
    assert_eq!(classify("", "42 + 1;"), Classification::Stmt);
    let mut session = Session::default();
    assert_eq!(eval(&mut session, "42 + 1;"), "=> (int) 43");
}

#[test]
fn test_declaration_with_runtime_initializer() {
    let mut session = Session::default();
    let events = feed(&mut session, &["int a = 5, b = a + 1;"]);
    assert!(results(&events).is_empty());
    assert_eq!(
        session.lines(),
        &[
            CodeLine::new("int a = 5;", LineKind::Declaration),
            CodeLine::new("int b;", LineKind::Declaration),
            CodeLine::new("b = a + 1;", LineKind::Statement),
        ]
    );
    assert_eq!(eval(&mut session, "b;"), "=> (int) 6");
}

#[test]
fn test_pasted_statements_run_in_order() {
    let mut session = Session::default();
    feed(&mut session, &["int x, y, z;"]);

    let units = split(&session.session_source(), "x = 1; y = 2; z = x + y;").unwrap();
    assert_eq!(units, vec!["x = 1;", "y = 2;", "z = x + y;"]);

    feed(&mut session, &["x = 1; y = 2; z = x + y;"]);
    assert_eq!(session.statement_count(), 3);
    assert_eq!(eval(&mut session, "z;"), "=> (int) 3");
}

#[test]
fn test_string_pointer_probe() {
    let mut session = Session::default();
    feed(&mut session, &["char *s = \"hello\";"]);
    assert_eq!(eval(&mut session, "s;"), "=> (char *) \"hello\"");
    assert_eq!(eval(&mut session, "(char *)12345;"), "=> (char *) 0x3039");
    assert_eq!(eval(&mut session, "(char *)0;"), "=> (char *) 0x0");
}

#[test]
fn test_pointer_past_end_of_memory_prints_address() {
    let mut session = Session::default();
    assert_eq!(eval(&mut session, "(char *)-1;"), "=> (char *) 0xffffffffffffffff");
    assert_eq!(eval(&mut session, "(char *)-1 - 1;"), "=> (char *) 0xfffffffffffffffe");
    assert_eq!(eval(&mut session, "2 + 2;"), "=> (int) 4");
}

#[test]
fn test_void_pointers_print_addresses() {
    let mut session = Session::default();
    feed(&mut session, &["void *vp = malloc(4);", "struct { int q; } anon;"]);

    let line = eval(&mut session, "vp;");
    assert!(line.starts_with("=> (void *) 0x"), "{}", line);
    let line = eval(&mut session, "&anon;");
    assert!(line.starts_with("=> (void *) 0x"), "{}", line);
}

#[test]
fn test_wrapper_names_are_unique() {
    let mut session = Session::default();
    for expected in 1..=3 {
        eval(&mut session, "1;");
        assert_eq!(session.statement_count(), expected);
    }
    assert!(session.image().has_function("__anon0"));
    assert!(session.image().has_function("__anon2"));
}

// === SESSION BEHAVIOR ===

#[test]
fn test_function_definition_across_lines() {
    let mut session = Session::default();
    feed(
        &mut session,
        &["int fib(int n) {", "if (n < 2)", "return n;", "return fib(n - 1) + fib(n - 2);", "}"],
    );
    assert_eq!(session.state(), State::Idle);
    assert_eq!(session.session_source(), "int fib(int n);\n");
    assert_eq!(eval(&mut session, "fib(20);"), "=> (int) 6765");
}

#[test]
fn test_result_types() {
    let mut session = Session::default();
    feed(&mut session, &["int sq(int x) { return x * x; }", "typedef unsigned long size;", "size n = 3;"]);

    assert_eq!(eval(&mut session, "1.5 * 2;"), "=> (double) 3.000000");
    assert_eq!(eval(&mut session, "(unsigned)-1;"), "=> (unsigned int) 4294967295");
    assert_eq!(eval(&mut session, "n * 2;"), "=> (unsigned long) 6");
    assert_eq!(eval(&mut session, "'A';"), "=> (int) 65");
    assert!(eval(&mut session, "sq;").starts_with("=> (int (*)(int)) 0x"));
    assert_eq!(eval(&mut session, "(void)sq(2);"), "=> (void)");
}

#[test]
fn test_struct_values() {
    let mut session = Session::default();
    feed(
        &mut session,
        &["struct Point { int x; int y; };", "int seven(void) { return 7; }", "struct Point p = {seven(), 3};"],
    );
    assert_eq!(eval(&mut session, "p.x * 10 + p.y;"), "=> (int) 73");

    let events = session.process("p;").events;
    assert_eq!(results(&events), vec!["=> (struct Point)"]);
    assert!(events.iter().any(|e| matches!(e, Event::Note(_))));
}

#[test]
fn test_heap_across_inputs() {
    let mut session = Session::default();
    feed(
        &mut session,
        &[
            "struct Node { int value; struct Node *next; };",
            "struct Node *first = malloc(sizeof(struct Node));",
            "first->value = 1; first->next = malloc(sizeof(struct Node));",
            "first->next->value = 2;",
        ],
    );
    assert_eq!(eval(&mut session, "first->value + first->next->value;"), "=> (int) 3");

    let events = feed(&mut session, &["free(first);", "first->value;"]);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Error(msg) if msg.contains("freed"))));
}

#[test]
fn test_runaway_recursion_is_a_runtime_error() {
    let mut session = Session::default();
    feed(&mut session, &["int down(int n) { return down(n + 1); }"]);
    let events = feed(&mut session, &["down(0);"]);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, Event::Error(msg) if msg.contains("call stack exhausted"))),
        "{:?}",
        events
    );
    assert!(events.iter().any(|e| matches!(e, Event::Note(n) if n == "Note: last line ignored due to errors.")));
    assert_eq!(eval(&mut session, "2 + 2;"), "=> (int) 4");
}

#[test]
fn test_output_and_macros() {
    let mut session = Session::default();
    let events = feed(
        &mut session,
        &["#define GREETING \"hi\"", "for (int i = 0; i < 3; i++) printf(\"%s %d\\n\", GREETING, i);"],
    );
    assert_eq!(events, vec![Event::Output("hi 0\nhi 1\nhi 2\n".to_string())]);
}

#[test]
fn test_errors_leave_session_unchanged() {
    let mut session = Session::default();
    feed(&mut session, &["int total = 10;"]);
    let before = session.lines().to_vec();

    let events = feed(&mut session, &["int broken = ;"]);
    assert!(events.iter().any(|e| matches!(e, Event::Diagnostic(_))));
    assert!(events.iter().any(|e| matches!(e, Event::Note(n) if n == "Note: last line ignored due to errors.")));
    assert_eq!(session.lines(), before.as_slice());

    // Redefinition is a compile error too
    feed(&mut session, &["int total = 11;"]);
    assert_eq!(session.lines(), before.as_slice());
    assert_eq!(eval(&mut session, "total;"), "=> (int) 10");
}

#[test]
fn test_diagnostics_reported_once() {
    let mut session = Session::default();
    feed(&mut session, &["int *p;", "char *q;"]);
    let events = feed(&mut session, &["p = q;"]);
    let diagnostics = events.iter().filter(|e| matches!(e, Event::Diagnostic(_))).count();
    assert_eq!(diagnostics, 1, "{:?}", events);
}

#[test]
fn test_unterminated_comment_keeps_buffering() {
    let mut session = Session::default();
    let reply = session.process("int x = 1; /* comment;");
    assert!(reply.events.is_empty());
    assert_eq!(session.state(), State::Buffering);
    session.process("still comment */");
    assert_eq!(session.state(), State::Idle);
    assert_eq!(eval(&mut session, "x;"), "=> (int) 1");
}

// === PROGRAM IMAGE TESTS ===

#[test]
fn test_simple_arithmetic() {
    let source = r#"
        int main() {
            int x = 5;
            int y = 10;
            int z = x + y;
            return z;
        }
    "#;
    assert_eq!(run_program(source), Ok(Value::Int(15)));
}

#[test]
fn test_heap_struct_allocation() {
    let source = r#"
        struct Point {
            int x;
            int y;
        };

        int main() {
            struct Point* p = (struct Point*)malloc(sizeof(struct Point));
            p->x = 42;
            p->y = 100;
            int sum = p->x + p->y;
            free(p);
            return sum;
        }
    "#;
    assert_eq!(run_program(source), Ok(Value::Int(142)));
}

#[test]
fn test_heap_double_free_error() {
    let source = r#"
        int main() {
            int *p = malloc(sizeof(int));
            free(p);
            free(p);
            return 0;
        }
    "#;
    let result = run_program(source);
    assert!(matches!(result, Err(RuntimeError::DoubleFree { .. })), "got {:?}", result);
}

#[test]
fn test_heap_null_dereference() {
    let source = r#"
        struct Point {
            int x;
            int y;
        };

        int main() {
            struct Point* p = NULL;
            p->x = 10;
            return 0;
        }
    "#;
    assert_eq!(run_program(source), Err(RuntimeError::NullDereference));
}

#[test]
fn test_break_continue() {
    let source = r#"
        int main() {
            int sum = 0;
            for (int i = 0; i < 100; i++) {
                if (i % 2 == 0) continue;
                if (i > 10) break;
                sum += i;
            }
            return sum;
        }
    "#;
    assert_eq!(run_program(source), Ok(Value::Int(1 + 3 + 5 + 7 + 9)));
}

#[test]
fn test_char_array() {
    let source = r#"
        int main() {
            char word[8] = "crepl";
            char copy[8];
            strcpy(copy, word);
            copy[0] = 'C';
            return strcmp(copy, word) < 0 ? (int)strlen(copy) : -1;
        }
    "#;
    assert_eq!(run_program(source), Ok(Value::Int(5)));
}

#[test]
fn test_switch() {
    let source = r#"
        int grade(int score) {
            switch (score / 10) {
                case 10:
                case 9: return 'A';
                case 8: return 'B';
                default: return 'F';
            }
        }

        int main() {
            return grade(95) + grade(100) + grade(81) + grade(12);
        }
    "#;
    assert_eq!(run_program(source), Ok(Value::Int(65 + 65 + 66 + 70)));
}
