//! Display format of the transport error taxonomy.

use mcp_probe::AppError;

#[test]
fn each_variant_has_a_distinct_prefix() {
    let cases = [
        (AppError::Config("x".into()), "config: x"),
        (AppError::Io("x".into()), "io: x"),
        (AppError::TransportStartup("x".into()), "transport startup: x"),
        (AppError::NoResponse("x".into()), "no response: x"),
        (AppError::ProtocolDecode("x".into()), "protocol decode: x"),
        (AppError::Connection("x".into()), "connection: x"),
        (AppError::ResponseTimeout("x".into()), "response timeout: x"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn http_status_display_carries_code_and_body() {
    let err = AppError::HttpStatus {
        status: 503,
        body: "unavailable".into(),
    };
    assert_eq!(err.to_string(), "http status 503: unavailable");
}

#[test]
fn toml_errors_convert_to_config() {
    let toml_err = toml::from_str::<toml::Value>("= broken").expect_err("invalid toml");
    let err = AppError::from(toml_err);
    assert!(err.to_string().starts_with("config: invalid config"));
}

#[test]
fn implements_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    let err = AppError::NoResponse("budget exhausted".into());
    assert_error(&err);
    assert!(format!("{err:?}").contains("NoResponse"));
}

#[test]
fn io_errors_convert_to_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err = AppError::from(io_err);
    assert!(matches!(err, AppError::Io(_)));
    assert_eq!(err.to_string(), "io: pipe closed");
}
