use loxide::scanner::Scanner;
use loxide::token::TokenType;

use pretty_assertions::assert_eq;

fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
    let scanner = Scanner::new(source.as_bytes());
    let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

    assert_eq!(
        tokens.len(),
        expected.len(),
        "token count mismatch for {:?}",
        source
    );

    for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
        assert_eq!(actual.token_type, *expected_type);
        assert_eq!(actual.lexeme, *expected_lexeme);
    }
}

#[test]
fn punctuation_and_operators() {
    assert_token_sequence(
        "({*.,+*})",
        &[
            (TokenType::LEFT_PAREN, "("),
            (TokenType::LEFT_BRACE, "{"),
            (TokenType::STAR, "*"),
            (TokenType::DOT, "."),
            (TokenType::COMMA, ","),
            (TokenType::PLUS, "+"),
            (TokenType::STAR, "*"),
            (TokenType::RIGHT_BRACE, "}"),
            (TokenType::RIGHT_PAREN, ")"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn compound_operators_are_greedy() {
    assert_token_sequence(
        "! != = == < <= > >= ===",
        &[
            (TokenType::BANG, "!"),
            (TokenType::BANG_EQUAL, "!="),
            (TokenType::EQUAL, "="),
            (TokenType::EQUAL_EQUAL, "=="),
            (TokenType::LESS, "<"),
            (TokenType::LESS_EQUAL, "<="),
            (TokenType::GREATER, ">"),
            (TokenType::GREATER_EQUAL, ">="),
            // `===` splits greedily into `==` `=`.
            (TokenType::EQUAL_EQUAL, "=="),
            (TokenType::EQUAL, "="),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn keywords_versus_identifiers() {
    assert_token_sequence(
        "var varx class classes fun print orchid or",
        &[
            (TokenType::VAR, "var"),
            (TokenType::IDENTIFIER, "varx"),
            (TokenType::CLASS, "class"),
            (TokenType::IDENTIFIER, "classes"),
            (TokenType::FUN, "fun"),
            (TokenType::PRINT, "print"),
            (TokenType::IDENTIFIER, "orchid"),
            (TokenType::OR, "or"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn number_literals() {
    let scanner = Scanner::new(b"123 3.14 123.".as_slice());
    let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

    assert!(matches!(tokens[0].token_type, TokenType::NUMBER(n) if n == 123.0));
    assert!(matches!(tokens[1].token_type, TokenType::NUMBER(n) if n == 3.14));

    // A trailing dot is not part of the number.
    assert!(matches!(tokens[2].token_type, TokenType::NUMBER(n) if n == 123.0));
    assert_eq!(tokens[3].token_type, TokenType::DOT);
    assert_eq!(tokens[4].token_type, TokenType::EOF);
}

#[test]
fn string_literal_spans_lines_and_counts_them() {
    let source = "\"first\nsecond\"\nprint";
    let (tokens, errors) = Scanner::new(source.as_bytes()).scan();

    assert!(errors.is_empty());
    assert!(matches!(&tokens[0].token_type, TokenType::STRING(s) if s == "first\nsecond"));
    // The string closes on line 2; `print` sits on line 3.
    assert_eq!(tokens[0].line, 2);
    assert_eq!(tokens[1].token_type, TokenType::PRINT);
    assert_eq!(tokens[1].line, 3);
}

#[test]
fn unterminated_string_is_a_nonfatal_error() {
    let (tokens, errors) = Scanner::new(b"\"open".as_slice()).scan();

    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("Unterminated string."));

    // The stream still terminates with EOF.
    assert_eq!(tokens.last().unwrap().token_type, TokenType::EOF);
}

#[test]
fn line_comments_vanish() {
    assert_token_sequence(
        "var a; // the rest is ignored ;;;\nprint a;",
        &[
            (TokenType::VAR, "var"),
            (TokenType::IDENTIFIER, "a"),
            (TokenType::SEMICOLON, ";"),
            (TokenType::PRINT, "print"),
            (TokenType::IDENTIFIER, "a"),
            (TokenType::SEMICOLON, ";"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn block_comments_vanish_and_keep_line_numbers() {
    let source = "/* a\nb\nc */ print";
    let (tokens, errors) = Scanner::new(source.as_bytes()).scan();

    assert!(errors.is_empty());
    assert_eq!(tokens[0].token_type, TokenType::PRINT);
    assert_eq!(tokens[0].line, 3);
}

#[test]
fn block_comments_do_not_nest() {
    // The first `*/` closes the comment; the rest is real input.
    let (tokens, errors) = Scanner::new(b"/* outer /* inner */ var".as_slice()).scan();

    assert!(errors.is_empty());
    assert_eq!(tokens[0].token_type, TokenType::VAR);
}

#[test]
fn unterminated_block_comment_is_a_nonfatal_error() {
    let (tokens, errors) = Scanner::new(b"/* never closed".as_slice()).scan();

    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("Unterminated block comment."));
    assert_eq!(tokens.last().unwrap().token_type, TokenType::EOF);
}

#[test]
fn unexpected_characters_are_reported_and_skipped() {
    let (tokens, errors) = Scanner::new(b",.$(#".as_slice()).scan();

    // Two bad bytes, three good tokens plus EOF.
    assert_eq!(errors.len(), 2);
    for error in &errors {
        assert!(error.to_string().contains("Unexpected character"));
    }

    let kinds: Vec<_> = tokens.iter().map(|t| t.token_type.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            TokenType::COMMA,
            TokenType::DOT,
            TokenType::LEFT_PAREN,
            TokenType::EOF,
        ]
    );
}

#[test]
fn lexemes_reconstruct_the_source_without_trivia() {
    let source = "var a = 1; // comment\n/* block */ print a >= 2;";
    let (tokens, errors) = Scanner::new(source.as_bytes()).scan();

    assert!(errors.is_empty());

    let reconstructed: String = tokens.iter().map(|t| t.lexeme).collect();
    let expected: String = "var a = 1; print a >= 2;"
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    assert_eq!(reconstructed, expected);
}

#[test]
fn eof_carries_the_final_line() {
    let (tokens, _) = Scanner::new(b"print\n\n\n".as_slice()).scan();

    let eof = tokens.last().unwrap();
    assert_eq!(eof.token_type, TokenType::EOF);
    assert_eq!(eof.line, 4);
}
