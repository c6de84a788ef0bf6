//! Logging shims
//!
//! - `defmt` feature: forwards to `defmt` (RTT on the board)
//! - host unit tests: `println!`
//! - otherwise: compiled out, arguments still type-checked
//!
//! Format strings must stick to plain `{}` so they are valid for both `defmt`
//! and `core::fmt`.

macro_rules! log_with {
    ($defmt:ident, $tag:literal, $($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::$defmt!($($arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        ::std::println!("[{}] {}", $tag, ::core::format_args!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(test)))]
        {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}

macro_rules! log_trace {
    ($($arg:tt)*) => { log_with!(trace, "TRACE", $($arg)*) };
}

macro_rules! log_debug {
    ($($arg:tt)*) => { log_with!(debug, "DEBUG", $($arg)*) };
}

macro_rules! log_info {
    ($($arg:tt)*) => { log_with!(info, "INFO", $($arg)*) };
}

macro_rules! log_warn {
    ($($arg:tt)*) => { log_with!(warn, "WARN", $($arg)*) };
}

macro_rules! log_error {
    ($($arg:tt)*) => { log_with!(error, "ERROR", $($arg)*) };
}
