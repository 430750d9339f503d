use quick_error::quick_error;

quick_error! {
    /// Internal, unrecoverable failures.
    ///
    /// User-facing compilation problems (a bad token, an unknown CLI flag) are
    /// never represented as `Error` — they are collected as
    /// [`crate::diagnostics::Diagnostic`] records instead. `Error` is reserved
    /// for conditions the pipeline cannot recover from locally: I/O failures,
    /// `scroll` (de)serialization failures against buffers we built ourselves,
    /// and internal invariant violations.
    #[derive(Debug)]
    pub enum Error {
        Io(err: ::std::io::Error) {
            from()
            display("I/O error: {}", err)
        }
        Scroll(err: scroll::Error) {
            from()
            display("binary layout error: {}", err)
        }
        BadMagic(magic: u64) {
            display("invalid magic number: {:#x}", magic)
        }
        Malformed(msg: String) {
            display("malformed input: {}", msg)
        }
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;
