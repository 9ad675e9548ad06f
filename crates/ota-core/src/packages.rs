//! Packages kept in the download directory: listing, removal and pruning by age.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Regular files in `dir`, sorted by name. A missing directory is empty.
pub fn list(dir: &Path) -> io::Result<Vec<PackageFile>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        files.push(PackageFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            size: meta.len(),
            modified: meta.modified()?,
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Delete the package called `name` from `dir`. Names containing a path
/// separator or `..` are rejected.
pub fn remove(dir: &Path, name: &str) -> io::Result<PathBuf> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a package name: {:?}", name),
        ));
    }
    let path = dir.join(name);
    fs::remove_file(&path)?;
    Ok(path)
}

#[derive(Debug, Default)]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

/// Delete packages last modified more than `max_age` before `now`. Failures
/// to delete one file do not stop the others.
pub fn prune(dir: &Path, max_age: Duration, now: SystemTime) -> io::Result<PruneReport> {
    let mut report = PruneReport::default();
    for file in list(dir)? {
        let expired = file
            .modified
            .checked_add(max_age)
            .is_some_and(|deadline| deadline < now);
        if !expired {
            continue;
        }
        match fs::remove_file(&file.path) {
            Ok(()) => {
                tracing::info!(path = %file.path.display(), "pruned package");
                report.removed.push(file.path);
            }
            Err(e) => {
                tracing::warn!(path = %file.path.display(), "could not prune package: {}", e);
                report.failed.push((file.path, e));
            }
        }
    }
    Ok(report)
}

/// Parse an age such as `1w`, `2w`, `1m`, `3m`, `6m` or `10d`. A month is 30 days.
pub fn parse_age(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("missing unit in {:?} (use d, w or m)", s))?;
    let (count, unit) = s.split_at(split);
    let count: u32 = count
        .parse()
        .map_err(|_| format!("missing count in {:?}", s))?;
    let days = match unit {
        "d" => 1,
        "w" => 7,
        "m" => 30,
        _ => return Err(format!("unknown unit {:?} (use d, w or m)", unit)),
    };
    Ok(DAY * count.saturating_mul(days))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str, age: Duration) -> PathBuf {
        let path = dir.join(name);
        let f = fs::File::create(&path).unwrap();
        f.set_modified(SystemTime::now() - age).unwrap();
        path
    }

    #[test]
    fn list_skips_directories_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.zip", Duration::ZERO);
        touch(dir.path(), "a.zip", Duration::ZERO);
        fs::create_dir(dir.path().join("sub")).unwrap();
        let names: Vec<_> = list(dir.path())
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, ["a.zip", "b.zip"]);
        assert!(list(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn prune_removes_only_old_packages() {
        let dir = tempfile::tempdir().unwrap();
        let old = touch(dir.path(), "old.zip", DAY * 10);
        let fresh = touch(dir.path(), "fresh.zip", DAY);
        let report = prune(dir.path(), DAY * 7, SystemTime::now()).unwrap();
        assert_eq!(report.removed, vec![old.clone()]);
        assert!(report.failed.is_empty());
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn remove_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = touch(dir.path(), "rom.zip", Duration::ZERO);
        assert!(remove(dir.path(), "../rom.zip").is_err());
        assert!(remove(dir.path(), "..").is_err());
        assert_eq!(remove(dir.path(), "rom.zip").unwrap(), pkg);
        assert!(!pkg.exists());
        assert_eq!(
            remove(dir.path(), "rom.zip").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn ages() {
        assert_eq!(parse_age("1w"), Ok(DAY * 7));
        assert_eq!(parse_age("2w"), Ok(DAY * 14));
        assert_eq!(parse_age("3m"), Ok(DAY * 90));
        assert_eq!(parse_age("10d"), Ok(DAY * 10));
        assert!(parse_age("m").is_err());
        assert!(parse_age("5").is_err());
        assert!(parse_age("5y").is_err());
    }
}
