//! Query-string lookups as handlers see them

use brrtlite::parser::RequestParser;
use brrtlite::query::{unescape, QueryString, ESCAPES};

fn request_query(target: &str) -> QueryString {
    let mut parser = RequestParser::new();
    parser.feed(format!("GET {target} HTTP/1.1\r\n\r\n").as_bytes());
    parser.finish().unwrap().query
}

#[test]
fn test_name_and_age() {
    let q = request_query("/people?name=John%20Doe&age=5");
    assert_eq!(q.value("name"), "John Doe");
    assert_eq!(q.value("age"), "5");
    assert_eq!(q.value("missing"), "");
}

#[test]
fn test_key_must_start_at_boundary() {
    let q = QueryString::new("xname=a&name=b");
    assert_eq!(q.value("name"), "b");
    assert_eq!(q.value("xname"), "a");
}

#[test]
fn test_empty_and_trailing_values() {
    let q = QueryString::new("a=&b=2&c");
    assert_eq!(q.value("a"), "");
    assert_eq!(q.value("b"), "2");
    assert_eq!(q.value("c"), "");
}

#[test]
fn test_value_keeps_embedded_equals() {
    let q = QueryString::new("expr=1%2B1=2");
    assert_eq!(q.raw_value("expr"), "1%2B1=2");
    assert_eq!(q.value("expr"), "1+1=2");
}

#[test]
fn test_every_table_entry_decodes() {
    for (code, replacement) in ESCAPES {
        assert_eq!(unescape(code), replacement, "escape {code}");
    }
}

#[test]
fn test_unknown_and_lowercase_codes_pass_through() {
    assert_eq!(unescape("%C3%A9%zz%2f"), "%C3%A9%zz%2f");
}
