#[cfg(feature = "log")]
#[macro_use]
mod log {
    macro_rules! net_log {
        (trace, $($arg:expr),*) => { log::trace!($($arg),*) };
        (debug, $($arg:expr),*) => { log::debug!($($arg),*) };
    }
}

#[cfg(feature = "defmt")]
#[macro_use]
mod log {
    macro_rules! net_log {
        (trace, $($arg:expr),*) => { defmt::trace!($($arg),*) };
        (debug, $($arg:expr),*) => { defmt::debug!($($arg),*) };
    }
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
#[macro_use]
mod log {
    macro_rules! net_log {
        ($level:ident, $($arg:expr),*) => {{ $( let _ = $arg; )* }};
    }
}

macro_rules! net_trace {
    ($($arg:expr),*) => (net_log!(trace, $($arg),*));
}

macro_rules! net_debug {
    ($($arg:expr),*) => (net_log!(debug, $($arg),*));
}
