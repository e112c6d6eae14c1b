//! Host lookups shared by the subscriber processes.

use std::path::Path;

/// Returns `true` if `program` resolves to a file on `PATH`.
///
/// A `program` containing a path separator is checked as given.
#[must_use]
pub fn on_path(program: &str) -> bool {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }
    std::env::var_os("PATH").is_some_and(|paths| {
        std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
    })
}
