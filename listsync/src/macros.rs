#[cfg(feature = "tracing")]
macro_rules! lstrace {
    ($($tt:tt)*) => {
        tracing::trace!(target: "listsync", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! lstrace {
    ($($tt:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! lsdebug {
    ($($tt:tt)*) => {
        tracing::debug!(target: "listsync", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! lsdebug {
    ($($tt:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! lswarn {
    ($($tt:tt)*) => {
        tracing::warn!(target: "listsync", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! lswarn {
    ($($tt:tt)*) => {};
}
