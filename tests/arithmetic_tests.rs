use crepl::interpreter::image::{compile_unit, ProgramImage};
use crepl::memory::value::Value;
use crepl::repl::{Event, Session};

/// Run `main` and return everything it printed
fn run_output(source: &str) -> String {
    let mut image = ProgramImage::new(100 * 1024 * 1024, 256);
    let unit = compile_unit(source, 0, &mut Vec::new()).expect("Compilation failed");
    image.link(unit).expect("Linking failed");
    let result = image.invoke("main");
    let output = image.take_output();
    println!("Interpreter output:\n{}", output);
    assert_eq!(result, Ok(Value::Int(0)));
    output
}

#[test]
fn test_arithmetic_coercion() {
    let source = r#"
    int main() {
        char c = 'a';
        char two = 2;
        int ten = 10;

        printf("Char + Int: %d\n", c + ten);
        printf("Int - Char: %d\n", ten - c);
        printf("Char * Char: %d\n", c * two);
        if (c == 97) printf("Comparison Char == Int: OK\n");
        if (97 == c) printf("Comparison Int == Char: OK\n");
        printf("Char / Int: %d\n", c / 2);

        char wrapped = 200;
        printf("Wrapped: %d\n", wrapped);
        unsigned char byte = -1;
        printf("Byte: %d\n", byte);
        return 0;
    }
    "#;

    let output = run_output(source);
    assert!(output.contains("Char + Int: 107"));
    assert!(output.contains("Int - Char: -87"));
    assert!(output.contains("Char * Char: 194"));
    assert!(output.contains("Comparison Char == Int: OK"));
    assert!(output.contains("Comparison Int == Char: OK"));
    assert!(output.contains("Char / Int: 48"));
    assert!(output.contains("Wrapped: -56"));
    assert!(output.contains("Byte: 255"));
}

#[test]
fn test_pointer_arithmetic() {
    let source = r#"
    int main() {
        int arr[5];
        int *p = arr;
        int *p2 = p + 2;

        *p2 = 42;
        if (arr[2] == 42) {
            printf("Pointer Write OK\n");
        } else {
            printf("Pointer Write FAIL: %d\n", arr[2]);
        }

        int diff = p2 - p;
        printf("Diff elems: %d\n", diff);

        int *p3 = 2 + p;
        *p3 = 84;
        if (arr[2] == 84) {
            printf("Commutative Add OK\n");
        }
        return 0;
    }
    "#;

    let output = run_output(source);
    assert!(output.contains("Pointer Write OK"));
    assert!(output.contains("Commutative Add OK"));
    assert!(output.contains("Diff elems: 2"));
}

#[test]
fn test_session_arithmetic() {
    let mut session = Session::default();
    let mut last = |line: &str| -> Option<String> {
        session.process(line).events.into_iter().find_map(|e| match e {
            Event::Result(text) => Some(text),
            _ => None,
        })
    };

    assert_eq!(last("7 / 2;").as_deref(), Some("=> (int) 3"));
    assert_eq!(last("-7 % 3;").as_deref(), Some("=> (int) -1"));
    assert_eq!(last("7 / 2.0;").as_deref(), Some("=> (double) 3.500000"));
    assert_eq!(last("1 << 10;").as_deref(), Some("=> (int) 1024"));
    assert_eq!(last("2147483647 + 1;").as_deref(), Some("=> (int) -2147483648"));
    assert_eq!(last("3u - 4;").as_deref(), Some("=> (unsigned int) 4294967295"));
    assert_eq!(last("sizeof(long);").as_deref(), Some("=> (unsigned long) 8"));
}
