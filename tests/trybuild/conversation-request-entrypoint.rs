use mas_probe::{AuthToken, REQUEST_TIMEOUT, conversation_request};

fn main() {
    let token = AuthToken::parse(Some("compile-check-token")).expect("token should parse");
    let request = conversation_request(&token).expect("request should build");
    assert_eq!(request.headers.len(), 2);
    assert_eq!(request.timeout, Some(REQUEST_TIMEOUT));
}
