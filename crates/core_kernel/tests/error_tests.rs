//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::PortError;

#[test]
fn test_core_error_configuration() {
    let error = CoreError::configuration("Missing config");

    match error {
        CoreError::Configuration(ref msg) => assert_eq!(msg, "Missing config"),
    }
    assert!(error.to_string().contains("Configuration error"));
}

#[test]
fn test_port_error_unavailable_display() {
    let error = PortError::unavailable("ocr");

    assert!(!error.is_not_found());
    assert_eq!(error.to_string(), "Service unavailable: ocr");
}
