use std::fs::File;
use std::io::{self, Write};

/// True iff `name` is a bare filename that is safe to join onto a directory:
/// non-empty, not `.` or `..`, and free of `/`. This is the sole gate for
/// any filename derived from untrusted input.
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

/// Write `contents` with a single `write(2)` call. Kernel control files
/// (cgroupfs, procfs id maps) accept exactly one write, so a short write is
/// an error rather than a reason to retry.
pub fn write_once(file: &mut File, contents: &[u8]) -> io::Result<()> {
    let n = file.write(contents)?;
    if n < contents.len() {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            "short write to control file",
        ));
    }
    Ok(())
}
