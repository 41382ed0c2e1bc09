#![allow(non_snake_case)]

use super::*;

#[test]
fn LogLevel___into_level_filter___maps_each_level() {
    assert_eq!(LevelFilter::from(LogLevel::Trace), LevelFilter::TRACE);
    assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::WARN);
    assert_eq!(LevelFilter::from(LogLevel::Off), LevelFilter::OFF);
}

#[test]
fn LogLevel___from_str___accepts_lowercase_names() {
    assert_eq!(LogLevel::from_str("debug", false), Ok(LogLevel::Debug));
    assert!(LogLevel::from_str("verbose", false).is_err());
}

#[test]
fn init___called_twice___does_not_panic() {
    init(LogLevel::Off);
    init(LogLevel::Debug);
}
