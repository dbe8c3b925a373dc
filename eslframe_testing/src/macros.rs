//! Assertion macros shared by integration tests.

/// Assert that exactly the given chunks are ready on an
/// [`Outbound`](eslframe::outbound::Outbound), in order.
///
/// With no chunks listed, asserts that nothing was written.
#[macro_export]
macro_rules! assert_written {
    ($outbound:expr $(,)?) => {{
        let written = $crate::drain_text(&mut $outbound);
        assert!(
            written.is_empty(),
            "expected no outbound data at {}:{}, got {:?}",
            file!(),
            line!(),
            written
        );
    }};
    ($outbound:expr, $($chunk:expr),+ $(,)?) => {{
        let written = $crate::drain_text(&mut $outbound);
        let expected: ::std::vec::Vec<::std::string::String> =
            ::std::vec![$(::std::string::String::from($chunk)),+];
        assert_eq!(written, expected, "outbound mismatch at {}:{}", file!(), line!());
    }};
}

/// Feed byte chunks to a listener, panicking with the location on error.
#[macro_export]
macro_rules! feed {
    ($listener:expr, $($data:expr),+ $(,)?) => {{
        $(
            $listener
                .receive_data(&$data[..])
                .unwrap_or_else(|e| panic!("receive_data failed at {}:{}: {e}", file!(), line!()));
        )+
    }};
}

pub use crate::{assert_written, feed};
