use std::{cell::RefCell, io::Cursor, rc::Rc};

use hanlox::{
    pipeline::{self, InterpretError},
    resolver::ResolveErrorKind,
    tree_walk_interpreter::{ExecutionErrorKind, Interpreter, MAX_CALL_DEPTH},
};

fn run(source: &str) -> (String, Result<(), InterpretError>) {
    let output = Rc::new(RefCell::new(Vec::<u8>::new()));
    let mut interpreter = Interpreter::new(output.clone());
    let result = pipeline::run(&mut interpreter, source);
    let output = String::from_utf8(output.take()).expect("Output should be valid UTF-8");
    (output, result)
}

fn test_valid_program(source: &str, expected_output: &str) {
    let (output, result) = run(source);
    result.expect("Interpret should work on valid program");
    assert_eq!(output, expected_output);
}

#[test]
fn test_fib() {
    let source = r#"
    fun fib(n) {
        if (n <= 1) return n;
        return fib(n - 1) + fib(n - 2);
    }

    for (var i = 0; i < 10; i = i + 1) {
        print fib(i);
    }
    "#;
    let expected_output = "0\n1\n1\n2\n3\n5\n8\n13\n21\n34\n";
    test_valid_program(source, expected_output);
}

#[test]
fn test_closure() {
    let source = r#"
    fun makeCounter() {
        var i = 0;
        fun count() {
            i = i + 1;
            return i;
        }
        return count;
    }

    var counter = makeCounter();
    print counter(); // 1
    print counter(); // 2
    var other = makeCounter();
    print other(); // 1
    print counter(); // 3
    "#;
    let expected_output = "1\n2\n1\n3\n";
    test_valid_program(source, expected_output);
}

#[test]
fn test_closures_defined_in_loop() {
    let source = r#"
    var closures = array();
    for (var i = 0; i < 3; i = i + 1) {
        var captured = i;
        fun show() { print captured; print i; }
        array_push(closures, show);
    }
    for (var k = 0; k < 3; k = k + 1) {
        array_get(closures, k)();
    }
    "#;
    test_valid_program(source, "0\n3\n1\n3\n2\n3\n");
}

#[test]
fn test_closures_share_captured_environment() {
    let source = r#"
    var get;
    var set;
    fun pair() {
        var value = "initial";
        fun getter() { return value; }
        fun setter(v) { value = v; }
        get = getter;
        set = setter;
    }
    pair();
    print get();
    set("changed");
    print get();
    "#;
    test_valid_program(source, "initial\nchanged\n");
}

#[test]
fn test_functions_cant_break_scope() {
    let source = r#"
    var a = "global";
    {
        fun showA() {
            print a;
        }
        showA(); // global
        var a = "block";
        showA(); // global
    }
    "#;
    let expected_output = "global\nglobal\n";
    test_valid_program(source, expected_output);
}

#[test]
fn test_classes() {
    let source = r#"
    class Counter {
        init() {
            this.cnt = 0;
        }
        count() {
            this.cnt = this.cnt + 1;
            return this.cnt;
        }
    }

    var counter = Counter();
    print counter.count(); // 1
    print counter.count(); // 2
    "#;
    let expected_output = "1\n2\n";
    test_valid_program(source, expected_output);
}

#[test]
fn test_inheritance() {
    let source = r#"
    class Counter {
        init() {
            this.cnt = 0;
        }
        count() {
            this.cnt = this.cnt + 1;
            return this.cnt;
        }
    }

    class DecCounter < Counter {
        init() {
            super.init();
        }
        count() {
            this.cnt = this.cnt - 1;
            return this.cnt;
        }
    }

    var counter = DecCounter();
    print counter.count(); // -1
    print counter.count(); // -2
    "#;
    let expected_output = "-1\n-2\n";
    test_valid_program(source, expected_output);
}

#[test]
fn test_super_dispatch() {
    let source = r#"
    class A {
        greet() { print "A greets"; }
    }
    class B < A {
        greet() {
            print "B greets";
            super.greet();
        }
    }
    class C < B {}
    B().greet();
    C().greet();
    "#;
    test_valid_program(source, "B greets\nA greets\nB greets\nA greets\n");
}

#[test]
fn test_super_is_static() {
    let source = r#"
    class A {
        method() { print "A method"; }
    }
    class B < A {
        method() { print "B method"; }
        test() { super.method(); }
    }
    class C < B {}
    C().test();
    "#;
    test_valid_program(source, "A method\n");
}

#[test]
fn test_bound_methods_keep_this() {
    let source = r#"
    class Person {
        init(name) { this.name = name; }
        hello() { print "hi " + this.name; }
    }
    var method = Person("jane").hello;
    method();
    "#;
    test_valid_program(source, "hi jane\n");
}

#[test]
fn test_number_printing() {
    let source = r#"
    print 3.0;
    print 3.5;
    print 0;
    print 123456;
    print 0.1 + 0.2;
    print 1 / 4;
    "#;
    test_valid_program(source, "3\n3.5\n0\n123456\n0.30000000000000004\n0.25\n");
}

#[test]
fn test_concatenation_is_associative() {
    let (left, _) = run(r#"print "a" + ("b" + "c");"#);
    let (right, _) = run(r#"print ("a" + "b") + "c";"#);
    assert_eq!(left, "abc\n");
    assert_eq!(left, right);
}

#[test]
fn test_assignment_is_right_associative() {
    test_valid_program("var a; var b; a = b = 5; print a; print b;", "5\n5\n");
}

#[test]
fn test_undefined_variable_read_and_assign() {
    let (_, result) = run("print nope;");
    match result {
        Err(InterpretError::Runtime(e)) => {
            assert!(matches!(e.kind, ExecutionErrorKind::UndefinedVariable(ref name) if name == "nope"))
        }
        other => panic!("expected runtime error, got {other:?}"),
    }

    let (_, result) = run("nope = 1;");
    match result {
        Err(InterpretError::Runtime(e)) => {
            assert!(matches!(e.kind, ExecutionErrorKind::UndefinedVariable(ref name) if name == "nope"))
        }
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[test]
fn test_own_initializer_is_resolve_error() {
    let (output, result) = run("print \"before\";\n{ var x = x; }");
    match result {
        Err(InterpretError::Resolve(errors)) => {
            assert_eq!(errors.0.len(), 1);
            assert_eq!(errors.0[0].kind, ResolveErrorKind::ReadInOwnInitializer);
        }
        other => panic!("expected resolve error, got {other:?}"),
    }
    assert_eq!(output, "");
}

#[test]
fn test_array_round_trip() {
    let source = r#"
    var a = array();
    for (var i = 0; i < 5; i = i + 1) {
        array_push(a, i * 10);
    }
    print array_size(a);
    for (var i = 0; i < array_size(a); i = i + 1) {
        print array_get(a, i);
    }
    print array_get(a, 5);
    "#;
    let (output, result) = run(source);
    assert_eq!(output, "5\n0\n10\n20\n30\n40\n");
    match result {
        Err(InterpretError::Runtime(e)) => {
            assert!(matches!(
                e.kind,
                ExecutionErrorKind::IndexOutOfRange { len: 5, .. }
            ));
            assert_eq!(e.line(), Some(10));
        }
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[test]
fn test_parse_error_suppresses_evaluation() {
    let (output, result) = run("print \"never\";\nvar = 3;\nprint 1 + 1;");
    match result {
        Err(InterpretError::Syntax(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors.parse[0].line(), Some(2));
        }
        other => panic!("expected syntax error, got {other:?}"),
    }
    assert_eq!(output, "");
}

#[test]
fn test_lexical_error_suppresses_evaluation() {
    let (output, result) = run("print 1;\nprint 2 # 3;");
    assert!(matches!(result, Err(InterpretError::Syntax(_))));
    assert_eq!(output, "");
}

#[test]
fn test_runtime_error_keeps_partial_output() {
    let (output, result) = run("print 1;\nprint 2;\nprint 1 < \"x\";\nprint 4;");
    assert_eq!(output, "1\n2\n");
    let Err(InterpretError::Runtime(e)) = result else {
        panic!("expected runtime error");
    };
    assert_eq!(e.line(), Some(3));
    assert!(matches!(e.kind, ExecutionErrorKind::InvalidLess(..)));
}

#[test]
fn test_localized_program() {
    let source = r#"
    클래스 인사 {
        말하기(이름) {
            반환 "안녕, " + 이름;
        }
    }
    변수 합 = 0;
    반복 (변수 i = 1; i <= 3; i = i + 1) {
        합 = 합 + i;
    }
    만약 (합 == 6 그리고 참) {
        출력 인사().말하기("세계");
    } 아니면 {
        출력 "틀림";
    }
    출력 길이("우아한");
    "#;
    test_valid_program(source, "안녕, 세계\n3\n");
}

#[test]
fn test_string_natives() {
    let source = r#"
    var parts = split("a-b-c", "-");
    print parts;
    print array_size(parts);
    print substring("hello world", 6, 11);
    print contains("hello", "ell");
    print parse_int("-42") + 1;
    print length("");
    "#;
    test_valid_program(source, "[a, b, c]\n3\nworld\ntrue\n-41\n0\n");
}

#[test]
fn test_native_type_error_names_function() {
    let (_, result) = run("substring(1, 2, 3);");
    let Err(InterpretError::Runtime(e)) = result else {
        panic!("expected runtime error");
    };
    assert!(matches!(
        e.kind,
        ExecutionErrorKind::Native {
            function: "substring",
            ..
        }
    ));
    assert_eq!(
        e.to_string(),
        "substring(): expected a string but got 1\n[line 1]"
    );
}

#[test]
fn test_read_input_uses_injected_stdin() {
    let output = Rc::new(RefCell::new(Vec::<u8>::new()));
    let input = Rc::new(RefCell::new(Cursor::new(b"42\n".to_vec())));
    let mut interpreter = Interpreter::with_io(output.clone(), input);
    pipeline::run(&mut interpreter, "print parse_int(읽기()) * 2;").unwrap();
    assert_eq!(String::from_utf8(output.take()).unwrap(), ">> 84\n");
}

#[test]
fn test_repl_units_share_state() {
    let output = Rc::new(RefCell::new(Vec::<u8>::new()));
    let mut interpreter = Interpreter::new(output.clone());
    pipeline::run(&mut interpreter, "var count = 0;").unwrap();
    pipeline::run(&mut interpreter, "fun bump() { count = count + 1; return count; }").unwrap();
    assert!(pipeline::run(&mut interpreter, "print nope;").is_err());
    pipeline::run(&mut interpreter, "bump(); print bump();").unwrap();
    assert_eq!(String::from_utf8(output.take()).unwrap(), "2\n");
}

#[test]
fn test_redeclaring_globals() {
    test_valid_program(
        "var a = 1; var a = a + 1; fun f() { return 1; } fun f() { return 2; } print a; print f();",
        "2\n2\n",
    );
}

/// Deep recursion needs more stack than the default test thread has.
fn with_large_stack(f: impl FnOnce() + Send + 'static) {
    std::thread::Builder::new()
        .stack_size(128 * 1024 * 1024)
        .spawn(f)
        .expect("Thread should spawn")
        .join()
        .expect("Thread should not panic");
}

#[test]
fn test_deep_recursion_within_limit() {
    with_large_stack(|| {
        let source = format!(
            "fun f(n) {{ if (n == 0) return 0; return f(n - 1) + 1; }} print f({});",
            MAX_CALL_DEPTH - 1
        );
        test_valid_program(&source, &format!("{}\n", MAX_CALL_DEPTH - 1));
    });
}

#[test]
fn test_runaway_recursion_is_recoverable() {
    with_large_stack(|| {
        let output = Rc::new(RefCell::new(Vec::<u8>::new()));
        let mut interpreter = Interpreter::new(output.clone());
        pipeline::run(&mut interpreter, "print 1;").unwrap();
        pipeline::run(&mut interpreter, "fun f(n) { return f(n + 1); }").unwrap();

        match pipeline::run(&mut interpreter, "f(0);") {
            Err(InterpretError::Runtime(e)) => {
                assert!(matches!(e.kind, ExecutionErrorKind::StackOverflow));
                assert_eq!(e.line(), Some(1));
            }
            other => panic!("expected runtime error, got {other:?}"),
        }

        pipeline::run(&mut interpreter, "print 2;").unwrap();
        assert_eq!(String::from_utf8(output.take()).unwrap(), "1\n2\n");
    });
}

#[test]
fn test_runaway_constructor_recursion() {
    with_large_stack(|| {
        let (_, result) = run("class A { init() { A(); } }\nA();");
        let Err(InterpretError::Runtime(e)) = result else {
            panic!("expected runtime error");
        };
        assert!(matches!(e.kind, ExecutionErrorKind::StackOverflow));
    });
}

#[test]
fn test_self_containing_array_prints() {
    test_valid_program(
        "var a = array(); array_push(a, 1); array_push(a, a); print a;",
        "[1, [...]]\n",
    );
}
