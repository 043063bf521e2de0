use loxide::interpreter::Interpreter;
use loxide::parser::Parser;
use loxide::resolver::Resolver;
use loxide::scanner::Scanner;

use pretty_assertions::assert_eq;

/// Run a program through the full pipeline with a captured output sink.
/// Returns everything `print` wrote plus the runtime error, if any. Static
/// errors fail the test — these fixtures are all syntactically valid.
fn run(source: &str) -> (String, Option<String>) {
    let (tokens, scan_errors) = Scanner::new(source.as_bytes()).scan();
    assert!(scan_errors.is_empty(), "scan errors: {:?}", scan_errors);

    let mut parser = Parser::new(&tokens);
    let (statements, parse_errors) = parser.parse();
    assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);

    let (locals, resolve_errors) = Resolver::new().resolve(&statements);
    assert!(
        resolve_errors.is_empty(),
        "resolve errors: {:?}",
        resolve_errors
    );

    let mut buffer: Vec<u8> = Vec::new();
    let error = {
        let mut interpreter = Interpreter::new(&mut buffer);
        interpreter
            .interpret(&statements, locals)
            .err()
            .map(|e| e.to_string())
    };

    (String::from_utf8(buffer).expect("output is UTF-8"), error)
}

fn run_ok(source: &str) -> String {
    let (output, error) = run(source);
    assert!(error.is_none(), "unexpected runtime error: {:?}", error);
    output
}

// ───────────────────────── printing and arithmetic ─────────────────────────

#[test]
fn integral_results_print_without_fraction() {
    assert_eq!(run_ok("print 1 + 2;"), "3\n");
    assert_eq!(run_ok("print 10 / 2;"), "5\n");
}

#[test]
fn fractional_results_keep_their_decimals() {
    assert_eq!(run_ok("print 5 / 2;"), "2.5\n");
    assert_eq!(run_ok("print 0.1 + 0.2;"), format!("{}\n", 0.1_f64 + 0.2_f64));
}

#[test]
fn string_concatenation() {
    assert_eq!(run_ok("print \"1\" + \"2\";"), "12\n");
}

#[test]
fn division_by_zero_follows_ieee() {
    assert_eq!(run_ok("print 1 / 0;"), "inf\n");
}

#[test]
fn unary_minus_and_grouping() {
    assert_eq!(run_ok("print -(-3);"), "3\n");
    assert_eq!(run_ok("print (1 + 2) * 3;"), "9\n");
}

#[test]
fn print_nil_and_booleans() {
    assert_eq!(run_ok("print nil;"), "nil\n");
    assert_eq!(run_ok("print true;"), "true\n");
    assert_eq!(run_ok("print 1 > 2;"), "false\n");
}

// ───────────────────────── type errors ─────────────────────────

#[test]
fn plus_type_mismatch_is_runtime_error() {
    let (_, error) = run("print 1 + \"a\";");
    let error = error.expect("mixed + should fail");
    assert!(error.contains("Operands must be two numbers or two strings."));
}

#[test]
fn comparison_requires_numbers() {
    let (_, error) = run("print \"a\" < \"b\";");
    assert!(error.expect("string < should fail").contains("Operands must be two numbers."));
}

#[test]
fn unary_minus_requires_a_number() {
    let (_, error) = run("print -\"a\";");
    assert!(error.expect("-string should fail").contains("Operand must be a number."));
}

#[test]
fn runtime_errors_halt_remaining_statements() {
    let (output, error) = run("print \"before\"; print 1 + nil; print \"after\";");

    assert_eq!(output, "before\n");
    assert!(error.is_some());
}

// ───────────────────────── equality ─────────────────────────

#[test]
fn nil_equality_is_symmetric() {
    // nil equals only nil, on either side.
    assert_eq!(run_ok("print nil == nil;"), "true\n");
    assert_eq!(run_ok("print nil == \"x\";"), "false\n");
    assert_eq!(run_ok("print \"x\" == nil;"), "false\n");
    assert_eq!(run_ok("print nil == false;"), "false\n");
}

#[test]
fn equality_never_type_errors() {
    assert_eq!(run_ok("print 1 == \"1\";"), "false\n");
    assert_eq!(run_ok("print \"a\" == \"a\";"), "true\n");
    assert_eq!(run_ok("print 1 != 2;"), "true\n");
}

// ───────────────────────── truthiness and logic ─────────────────────────

#[test]
fn only_nil_and_false_are_falsy() {
    assert_eq!(run_ok("if (0) print \"zero\";"), "zero\n");
    assert_eq!(run_ok("if (\"\") print \"empty\";"), "empty\n");
    assert_eq!(run_ok("if (nil) print \"nil\"; else print \"no\";"), "no\n");
    assert_eq!(run_ok("if (false) print \"f\"; else print \"no\";"), "no\n");
}

#[test]
fn logical_operators_return_operands_not_booleans() {
    assert_eq!(run_ok("print \"hi\" or 2;"), "hi\n");
    assert_eq!(run_ok("print nil or \"yes\";"), "yes\n");
    assert_eq!(run_ok("print nil and 2;"), "nil\n");
    assert_eq!(run_ok("print 1 and 2;"), "2\n");
}

#[test]
fn logical_operators_short_circuit() {
    let source = "\
        fun boom() { print \"boom\"; return true; }\n\
        var x = false and boom();\n\
        print x;\n\
        var y = true or boom();\n\
        print y;";

    assert_eq!(run_ok(source), "false\ntrue\n");
}

// ───────────────────────── scoping ─────────────────────────

#[test]
fn block_shadowing_restores_the_outer_binding() {
    assert_eq!(
        run_ok("var a = 1; { var a = 2; print a; } print a;"),
        "2\n1\n"
    );
}

#[test]
fn assignment_in_nested_block_hits_the_exact_frame() {
    let source = "\
        var a = 1;\n\
        {\n\
            var a = 2;\n\
            {\n\
                a = 3;\n\
                print a;\n\
            }\n\
            print a;\n\
        }\n\
        print a;";

    assert_eq!(run_ok(source), "3\n3\n1\n");
}

#[test]
fn undefined_variable_read_is_a_runtime_error() {
    let (_, error) = run("print missing;");
    assert!(error
        .expect("read should fail")
        .contains("Undefined variable 'missing'."));
}

#[test]
fn undefined_variable_assignment_is_a_runtime_error() {
    let (_, error) = run("missing = 1;");
    assert!(error
        .expect("assignment should fail")
        .contains("Undefined variable 'missing'."));
}

#[test]
fn var_without_initializer_is_nil() {
    assert_eq!(run_ok("var a; print a;"), "nil\n");
}

// ───────────────────────── control flow ─────────────────────────

#[test]
fn while_loop_counts_down() {
    assert_eq!(
        run_ok("var i = 3; while (i > 0) { print i; i = i - 1; }"),
        "3\n2\n1\n"
    );
}

#[test]
fn for_loop_prints_each_iteration() {
    assert_eq!(
        run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );
}

#[test]
fn for_loop_variable_stays_scoped_to_the_loop() {
    let (_, error) = run("for (var i = 0; i < 1; i = i + 1) print i; print i;");
    assert!(error
        .expect("loop variable should not leak")
        .contains("Undefined variable 'i'."));
}

// ───────────────────────── functions and closures ─────────────────────────

#[test]
fn function_values_print_their_name() {
    assert_eq!(run_ok("fun greet() {} print greet;"), "<fn greet>\n");
}

#[test]
fn functions_return_nil_by_default() {
    assert_eq!(run_ok("fun noop() {} print noop();"), "nil\n");
}

#[test]
fn return_exits_the_function_early() {
    assert_eq!(
        run_ok("fun early() { return 7; print \"unreachable\"; } print early();"),
        "7\n"
    );
}

#[test]
fn recursion_works() {
    let source = "\
        fun fib(n) {\n\
            if (n < 2) return n;\n\
            return fib(n - 2) + fib(n - 1);\n\
        }\n\
        print fib(10);";

    assert_eq!(run_ok(source), "55\n");
}

#[test]
fn counters_are_independent_closures() {
    let source = "\
        fun makeCounter() {\n\
            var count = 0;\n\
            fun increment() {\n\
                count = count + 1;\n\
                print count;\n\
            }\n\
            return increment;\n\
        }\n\
        var a = makeCounter();\n\
        var b = makeCounter();\n\
        a();\n\
        a();\n\
        b();";

    assert_eq!(run_ok(source), "1\n2\n1\n");
}

#[test]
fn closures_capture_the_declaration_scope_not_later_shadows() {
    let source = "\
        var a = \"global\";\n\
        {\n\
            fun showA() { print a; }\n\
            showA();\n\
            var a = \"block\";\n\
            showA();\n\
        }";

    assert_eq!(run_ok(source), "global\nglobal\n");
}

#[test]
fn wrong_arity_is_a_runtime_error_that_halts() {
    let source = "\
        fun f(a, b) { print a + b; }\n\
        print \"before\";\n\
        f(1);\n\
        print \"after\";";

    let (output, error) = run(source);

    assert_eq!(output, "before\n");
    assert!(error
        .expect("wrong arity should fail")
        .contains("Expected 2 arguments but got 1."));
}

#[test]
fn calling_a_non_callable_is_a_runtime_error() {
    let (_, error) = run("\"text\"();");
    assert!(error
        .expect("call should fail")
        .contains("Can only call functions and classes."));
}

#[test]
fn arguments_evaluate_left_to_right() {
    let source = "\
        fun tag(label) { print label; return label; }\n\
        fun pair(a, b) {}\n\
        pair(tag(1), tag(2));";

    assert_eq!(run_ok(source), "1\n2\n");
}

// ───────────────────────── natives ─────────────────────────

#[test]
fn clock_returns_a_positive_number_of_seconds() {
    assert_eq!(run_ok("print clock() > 0;"), "true\n");
}

#[test]
fn clock_prints_as_a_native_function() {
    assert_eq!(run_ok("print clock;"), "<native fn clock>\n");
}

#[test]
fn clock_rejects_arguments() {
    let (_, error) = run("clock(1);");
    assert!(error
        .expect("clock(1) should fail")
        .contains("Expected 0 arguments but got 1."));
}

// ───────────────────────── classes (bare instances) ─────────────────────────

#[test]
fn classes_print_as_their_name() {
    assert_eq!(run_ok("class Robot {} print Robot;"), "Robot\n");
}

#[test]
fn calling_a_class_allocates_an_instance() {
    assert_eq!(
        run_ok("class Robot {} print Robot();"),
        "Robot instance\n"
    );
}

#[test]
fn class_calls_accept_any_argument_count() {
    assert_eq!(
        run_ok("class Robot {} print Robot(1, 2, 3);"),
        "Robot instance\n"
    );
}

#[test]
fn reading_an_undefined_property_is_a_runtime_error() {
    let (_, error) = run("class Foo {} var f = Foo(); print f.bar;");
    assert!(error
        .expect("property read should fail")
        .contains("Undefined property 'bar'."));
}

#[test]
fn property_access_on_a_non_instance_is_a_runtime_error() {
    let (_, error) = run("var x = 1; print x.field;");
    assert!(error
        .expect("property read should fail")
        .contains("Only instances have properties."));
}

#[test]
fn property_assignment_is_rejected() {
    let (_, error) = run("class Foo {} var f = Foo(); f.bar = 1;");
    assert!(error
        .expect("property write should fail")
        .contains("Property assignment is not supported."));
}

#[test]
fn declared_methods_do_not_interfere_with_execution() {
    assert_eq!(
        run_ok("class Greeter { hello() { print \"hi\"; } } print Greeter;"),
        "Greeter\n"
    );
}

#[test]
fn instances_compare_by_identity() {
    let source = "\
        class Foo {}\n\
        var a = Foo();\n\
        var b = Foo();\n\
        print a == a;\n\
        print a == b;";

    assert_eq!(run_ok(source), "true\nfalse\n");
}

// ───────────────────────── comments in programs ─────────────────────────

#[test]
fn comments_are_invisible_to_execution() {
    let source = "\
        /* header\n\
           comment */\n\
        print 1; // trailing\n\
        print 2;";

    assert_eq!(run_ok(source), "1\n2\n");
}
