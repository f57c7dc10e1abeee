//! The pid marker: a single text file naming the instance believed to be
//! running. Its presence is only a claim; callers check [`is_alive`] before
//! trusting it.

use crate::paths::Paths;
use crate::sys;
use std::fs;
use std::io;

pub fn read(paths: &Paths) -> io::Result<Option<u32>> {
    match fs::read_to_string(paths.pid_file()) {
        Ok(content) => Ok(parse_pid(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn parse_pid(content: &str) -> Option<u32> {
    content
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|&pid| pid > 0 && pid <= i32::MAX as u32)
}

/// Replaces the marker atomically: the pid goes to a sibling file which is
/// then renamed over the marker.
pub fn write(paths: &Paths, pid: u32) -> io::Result<()> {
    fs::create_dir_all(paths.base_dir())?;
    let target = paths.pid_file();
    let mut tmp = target.clone().into_os_string();
    tmp.push(".tmp");
    fs::write(&tmp, pid.to_string())?;
    fs::rename(&tmp, &target)
}

pub fn clear(paths: &Paths) -> io::Result<()> {
    match fs::remove_file(paths.pid_file()) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Removes the marker only if it still names `pid`.
pub fn clear_if_owned(paths: &Paths, pid: u32) -> io::Result<()> {
    if read(paths)? == Some(pid) {
        clear(paths)?;
    }
    Ok(())
}

pub fn is_alive(pid: u32) -> bool {
    sys::check_pid(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_paths() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        (dir, paths)
    }

    #[test]
    fn test_write_and_read_pid_file() {
        let (_dir, paths) = temp_paths();

        write(&paths, std::process::id()).unwrap();
        assert_eq!(read(&paths).unwrap(), Some(std::process::id()));
    }

    #[test]
    fn test_write_overwrites_previous_pid() {
        let (_dir, paths) = temp_paths();

        write(&paths, 100).unwrap();
        write(&paths, 200).unwrap();
        assert_eq!(read(&paths).unwrap(), Some(200));
        assert_eq!(fs::read_to_string(paths.pid_file()).unwrap(), "200");
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let (dir, paths) = temp_paths();

        write(&paths, 42).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("info-server.pid")]);
    }

    #[test]
    fn test_write_creates_base_dir() {
        let (dir, _) = temp_paths();
        let paths = Paths::with_base(dir.path().join("a").join("b"));

        write(&paths, 7).unwrap();
        assert_eq!(read(&paths).unwrap(), Some(7));
    }

    #[test]
    fn test_read_nonexistent_pid_file() {
        let paths = Paths::with_base(PathBuf::from("/tmp/info-server-nonexistent-test-dir"));
        assert_eq!(read(&paths).unwrap(), None);
    }

    #[test]
    fn test_read_malformed_pid_file() {
        let (_dir, paths) = temp_paths();

        for content in ["", "abc", "-5", "0", "12 34", "99999999999"] {
            fs::write(paths.pid_file(), content).unwrap();
            assert_eq!(read(&paths).unwrap(), None, "content {content:?}");
        }
    }

    #[test]
    fn test_read_tolerates_whitespace() {
        let (_dir, paths) = temp_paths();

        fs::write(paths.pid_file(), "  1234\n").unwrap();
        assert_eq!(read(&paths).unwrap(), Some(1234));
    }

    #[test]
    fn test_read_unreadable_marker_is_an_error() {
        let (_dir, paths) = temp_paths();

        // A directory where the marker should be cannot be read as text.
        fs::create_dir(paths.pid_file()).unwrap();
        assert!(read(&paths).is_err());
    }

    #[test]
    fn test_clear_removes_marker() {
        let (_dir, paths) = temp_paths();

        write(&paths, 1234).unwrap();
        clear(&paths).unwrap();
        assert!(!paths.pid_file().exists());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (_dir, paths) = temp_paths();

        clear(&paths).unwrap();
        clear(&paths).unwrap();
        assert!(!paths.pid_file().exists());
    }

    #[test]
    fn test_clear_if_owned_matching_pid() {
        let (_dir, paths) = temp_paths();

        write(&paths, 1234).unwrap();
        clear_if_owned(&paths, 1234).unwrap();
        assert!(!paths.pid_file().exists());
    }

    #[test]
    fn test_clear_if_owned_other_pid() {
        let (_dir, paths) = temp_paths();

        write(&paths, 1234).unwrap();
        clear_if_owned(&paths, 5678).unwrap();
        assert_eq!(read(&paths).unwrap(), Some(1234));
    }

    #[test]
    fn test_is_alive_with_self() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    fn test_is_alive_stale_pid() {
        // A pid that almost certainly doesn't exist
        assert!(!is_alive(4294967));
    }
}
