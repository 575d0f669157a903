#![macro_use]
#![allow(unused_macros)]

// Routes a log statement to `log` when it is enabled, otherwise to `defmt`.
// Format strings must stay within the subset both backends accept: plain `{}`.
macro_rules! flight_log {
    ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "log")]
            ::log::$level!($s $(, $x)*);

            #[cfg(all(feature = "defmt", not(feature = "log")))]
            ::defmt::$level!($s $(, $x)*);

            #[cfg(not(any(feature = "log", feature = "defmt")))]
            {
                $(let _ = &$x;)*
            }
        }
    };
}

macro_rules! log_trace {
    ($($args:tt)*) => {
        flight_log!(trace, $($args)*)
    };
}

macro_rules! log_debug {
    ($($args:tt)*) => {
        flight_log!(debug, $($args)*)
    };
}

macro_rules! log_info {
    ($($args:tt)*) => {
        flight_log!(info, $($args)*)
    };
}

macro_rules! log_warn {
    ($($args:tt)*) => {
        flight_log!(warn, $($args)*)
    };
}

macro_rules! log_error {
    ($($args:tt)*) => {
        flight_log!(error, $($args)*)
    };
}
