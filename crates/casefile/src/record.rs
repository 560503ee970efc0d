//! File metadata normalization.

use std::{
    fs, io,
    os::unix::fs::{MetadataExt, PermissionsExt},
    path::{Path, PathBuf},
    time::SystemTime,
};

use jiff::Timestamp;
use nix::unistd::{Gid, Group, Uid, User};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Path is outside of the import root: {0}")]
    OutsideRoot(PathBuf),
}

/// Kind of a filesystem entry, as classified without following links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    /// Block device, char device, fifo, socket
    Other,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Regular => "regular",
            FileKind::Directory => "directory",
            FileKind::Symlink => "symlink",
            FileKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "regular" => Some(FileKind::Regular),
            "directory" => Some(FileKind::Directory),
            "symlink" => Some(FileKind::Symlink),
            "other" => Some(FileKind::Other),
            _ => None,
        }
    }

    fn of(file_type: fs::FileType) -> Self {
        if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_file() {
            FileKind::Regular
        } else {
            FileKind::Other
        }
    }
}

/// Attributes of one entry of an import.
///
/// Timestamps are RFC 3339 strings in UTC, exactly as the OS reported them.
/// A time outside the representable range is kept as raw `seconds.nanos`
/// since the epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the import root, with unix slashes
    pub relative_path: String,
    pub kind: FileKind,
    /// Only present for regular files
    pub size: Option<u64>,
    pub owner: String,
    pub group: String,
    /// Symbolic permission bits, e.g. `rwxr-x---`
    pub permissions: String,
    pub modified: String,
    pub accessed: String,
    pub changed: Option<String>,
    pub created: String,
    /// Link text of a symlink, never resolved
    pub link_target: Option<String>,
}

/// Stat `path` without following links and build its [`FileRecord`].
///
/// The `root` is used to compute the relative path.
pub fn normalize(path: &Path, root: &Path) -> Result<FileRecord, NormalizeError> {
    let metadata = fs::symlink_metadata(path)?;
    let relative_path = path
        .strip_prefix(root)
        .map_err(|_| NormalizeError::OutsideRoot(path.to_path_buf()))?
        .to_string_lossy()
        .into_owned();

    let kind = FileKind::of(metadata.file_type());
    let size = (kind == FileKind::Regular).then(|| metadata.len());

    let modified = timestamp_string(metadata.mtime(), metadata.mtime_nsec());
    let accessed = timestamp_string(metadata.atime(), metadata.atime_nsec());
    let changed = timestamp_string(metadata.ctime(), metadata.ctime_nsec());
    // No birth time on many filesystems; report the modification time instead
    let created = metadata
        .created()
        .ok()
        .and_then(|t: SystemTime| Timestamp::try_from(t).ok())
        .map(|t| t.to_string())
        .unwrap_or_else(|| modified.clone());

    let link_target = if kind == FileKind::Symlink {
        fs::read_link(path)
            .ok()
            .map(|t| t.to_string_lossy().into_owned())
    } else {
        None
    };

    Ok(FileRecord {
        relative_path,
        kind,
        size,
        owner: owner_name(metadata.uid()),
        group: group_name(metadata.gid()),
        permissions: permission_string(metadata.permissions().mode()),
        modified,
        accessed,
        changed: Some(changed),
        created,
        link_target,
    })
}

/// Render permission bits the way `ls -l` does, e.g. `rwsr-x--T`.
///
/// Setuid, setgid and sticky replace the matching execute position with
/// `s`/`t`, or `S`/`T` when that execute bit is unset.
pub fn permission_string(mode: u32) -> String {
    // (read, write, execute, special bit, special char)
    const CLASSES: [(u32, u32, u32, u32, char); 3] = [
        (0o400, 0o200, 0o100, 0o4000, 's'),
        (0o040, 0o020, 0o010, 0o2000, 's'),
        (0o004, 0o002, 0o001, 0o1000, 't'),
    ];

    let mut out = String::with_capacity(9);
    for (read, write, exec, special, marker) in CLASSES {
        out.push(if mode & read != 0 { 'r' } else { '-' });
        out.push(if mode & write != 0 { 'w' } else { '-' });
        out.push(match (mode & special != 0, mode & exec != 0) {
            (true, true) => marker,
            (true, false) => marker.to_ascii_uppercase(),
            (false, true) => 'x',
            (false, false) => '-',
        });
    }
    out
}

/// RFC 3339 in UTC, or `seconds.nanos` when jiff cannot represent the time.
fn timestamp_string(secs: i64, nsecs: i64) -> String {
    i32::try_from(nsecs)
        .ok()
        .and_then(|n| Timestamp::new(secs, n).ok())
        .map(|t| t.to_string())
        .unwrap_or_else(|| format!("{secs}.{nsecs:09}"))
}

fn owner_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

fn group_name(gid: u32) -> String {
    match Group::from_gid(Gid::from_raw(gid)) {
        Ok(Some(group)) => group.name,
        _ => gid.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use std::os::unix::net::UnixListener;
    use tempfile::TempDir;

    #[test]
    fn regular_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"hello").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        let record = normalize(&path, dir.path()).unwrap();
        assert_eq!(record.relative_path, "notes.txt");
        assert_eq!(record.kind, FileKind::Regular);
        assert_eq!(record.size, Some(5));
        assert_eq!(record.permissions, "rw-r-----");
        assert!(record.modified.ends_with('Z'));
        assert!(record.link_target.is_none());
    }

    #[test]
    fn directory_has_no_size() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("a").join("b");
        fs::create_dir_all(&sub).unwrap();

        let record = normalize(&sub, dir.path()).unwrap();
        assert_eq!(record.relative_path, "a/b");
        assert_eq!(record.kind, FileKind::Directory);
        assert_eq!(record.size, None);
    }

    #[test]
    fn dangling_symlink_is_still_a_symlink() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("dev-link");
        symlink("/dev/does-not-exist-on-this-host", &link).unwrap();

        let record = normalize(&link, dir.path()).unwrap();
        assert_eq!(record.kind, FileKind::Symlink);
        assert_eq!(record.size, None);
        assert_eq!(
            record.link_target.as_deref(),
            Some("/dev/does-not-exist-on-this-host")
        );
    }

    #[test]
    fn symlink_to_file_is_not_followed() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("big.bin");
        fs::write(&target, vec![0u8; 4096]).unwrap();
        let link = dir.path().join("link");
        symlink(&target, &link).unwrap();

        let record = normalize(&link, dir.path()).unwrap();
        assert_eq!(record.kind, FileKind::Symlink);
        assert_eq!(record.size, None);
    }

    #[test]
    fn missing_entry_fails() {
        let dir = TempDir::new().unwrap();
        let err = normalize(&dir.path().join("gone"), dir.path()).unwrap_err();
        assert!(matches!(err, NormalizeError::Io(_)));
    }

    #[test]
    fn path_outside_root_fails() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let err = normalize(other.path(), dir.path()).unwrap_err();
        assert!(matches!(err, NormalizeError::OutsideRoot(_)));
    }

    #[test]
    fn backslash_is_part_of_the_name() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a").join("b"), b"nested").unwrap();
        fs::write(dir.path().join("a\\b"), b"flat").unwrap();

        let nested = normalize(&dir.path().join("a").join("b"), dir.path()).unwrap();
        let flat = normalize(&dir.path().join("a\\b"), dir.path()).unwrap();
        assert_eq!(nested.relative_path, "a/b");
        assert_eq!(flat.relative_path, "a\\b");
        assert_ne!(nested.relative_path, flat.relative_path);
    }

    #[test]
    fn socket_is_other() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.sock");
        let _listener = UnixListener::bind(&path).unwrap();

        let record = normalize(&path, dir.path()).unwrap();
        assert_eq!(record.kind, FileKind::Other);
        assert_eq!(record.size, None);
        assert!(record.link_target.is_none());
    }

    #[test]
    fn permission_strings() {
        assert_eq!(permission_string(0o755), "rwxr-xr-x");
        assert_eq!(permission_string(0o100644), "rw-r--r--");
        assert_eq!(permission_string(0), "---------");
    }

    #[test]
    fn special_permission_bits() {
        assert_eq!(permission_string(0o4755), "rwsr-xr-x");
        assert_eq!(permission_string(0o4644), "rwSr--r--");
        assert_eq!(permission_string(0o2750), "rwxr-s---");
        assert_eq!(permission_string(0o2640), "rw-r-S---");
        assert_eq!(permission_string(0o41777), "rwxrwxrwt");
        assert_eq!(permission_string(0o1644), "rw-r--r-T");
    }

    #[test]
    fn unrepresentable_times_fall_back_to_epoch_seconds() {
        assert_eq!(timestamp_string(0, 0), "1970-01-01T00:00:00Z");
        assert_eq!(timestamp_string(1, 500_000_000), "1970-01-01T00:00:01.5Z");
        assert_eq!(
            timestamp_string(i64::MAX, 7),
            format!("{}.000000007", i64::MAX)
        );
        assert_eq!(timestamp_string(-1, 2_000_000_000), "-1.2000000000");
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in [
            FileKind::Regular,
            FileKind::Directory,
            FileKind::Symlink,
            FileKind::Other,
        ] {
            assert_eq!(FileKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(FileKind::parse("socket"), None);
    }
}
