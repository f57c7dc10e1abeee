use crate::paths::Paths;
use std::fs::{self, File, OpenOptions};
use std::io;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// 10 MB rotation threshold
pub const LOG_ROTATION_SIZE: u64 = 10 * 1024 * 1024;

/// Keep up to 3 rotated files (.1, .2, .3)
pub const LOG_ROTATION_KEEP: u32 = 3;

// ---------------------------------------------------------------------------
// open_background_log — the file a detached instance writes its output to
// ---------------------------------------------------------------------------

/// Opens the background log for appending, rotating it first when it has
/// grown past [`LOG_ROTATION_SIZE`].
pub fn open_background_log(paths: &Paths) -> io::Result<File> {
    fs::create_dir_all(paths.base_dir())?;

    let path = paths.log_file();
    let size = match fs::metadata(&path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => return Err(e),
    };
    if size > LOG_ROTATION_SIZE {
        rotate_log(paths, LOG_ROTATION_KEEP)?;
    }

    OpenOptions::new().create(true).append(true).open(path)
}

// ---------------------------------------------------------------------------
// rotate_log — shift rotated files and rename current to .1
// ---------------------------------------------------------------------------

pub fn rotate_log(paths: &Paths, max_rotations: u32) -> io::Result<()> {
    let oldest = paths.rotated_log_file(max_rotations);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    // Shift .2 -> .3, .1 -> .2, etc.
    for i in (1..max_rotations).rev() {
        let from = paths.rotated_log_file(i);
        if from.exists() {
            fs::rename(&from, paths.rotated_log_file(i + 1))?;
        }
    }

    let current = paths.log_file();
    if current.exists() {
        fs::rename(&current, paths.rotated_log_file(1))?;
    }

    Ok(())
}
