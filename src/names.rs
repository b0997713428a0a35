use rand::{Rng, distributions::Alphanumeric};

/// Length of the random part of a stored file name.
pub const NAME_LEN: usize = 16;

/// Returns `NAME_LEN` characters drawn uniformly from `[a-zA-Z0-9]`.
///
/// Names are not checked against the storage directory, a collision
/// overwrites the older file.
pub fn random_name() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NAME_LEN)
        .map(char::from)
        .collect()
}

/// Name under which an upload is stored. Always `.png`, even for raw copies.
pub fn upload_file_name() -> String {
    format!("{}.png", random_name())
}
