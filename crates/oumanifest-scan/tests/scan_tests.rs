use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use oumanifest_core::{FieldSet, KindFilter, ManifestReader, path_to_bytes};
use oumanifest_scan::{FileKind, FileRecord, ManifestConfig, ManifestError, create_manifest};
use tempfile::TempDir;

fn create_test_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir_all(root.join("docs/notes")).unwrap();
    fs::create_dir(root.join("src")).unwrap();
    fs::write(root.join("README"), "readme").unwrap();
    fs::write(root.join("docs/guide.md"), "# guide").unwrap();
    fs::write(root.join("docs/notes/todo.txt"), "nothing").unwrap();
    fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
    fs::write(root.join("src/with space.rs"), "").unwrap();

    temp
}

fn manifest_of(roots: &[PathBuf], config: &ManifestConfig) -> Result<Vec<u8>, ManifestError> {
    let mut out = Vec::new();
    create_manifest(roots, config, &mut out)?;
    Ok(out)
}

fn records_of(bytes: &[u8]) -> Vec<FileRecord> {
    ManifestReader::open(Cursor::new(bytes.to_vec()))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

static CWD_LOCK: Mutex<()> = Mutex::new(());

struct RestoreDir(PathBuf);

impl Drop for RestoreDir {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.0);
    }
}

/// Run `f` with `dir` as the working directory, one caller at a time.
fn in_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
    let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _restore = RestoreDir(std::env::current_dir().unwrap());
    std::env::set_current_dir(dir).unwrap();
    f()
}

fn full_config() -> ManifestConfig {
    ManifestConfig::builder()
        .fields(FieldSet {
            size: true,
            mtime: true,
        })
        .build()
        .unwrap()
}

#[test]
fn test_create_records_whole_tree() {
    let temp = create_test_tree();
    let root = temp.path().to_path_buf();

    let bytes = manifest_of(&[root.clone()], &full_config()).unwrap();
    assert!(bytes.starts_with(b"OUmanifest 1\n\n"));

    let records = records_of(&bytes);
    // root + docs, src, README + guide.md, notes + main.rs, with space.rs + todo.txt
    assert_eq!(records.len(), 9);
    assert_eq!(records[0].path, path_to_bytes(&root));
    assert_eq!(records[0].kind, FileKind::Directory);

    let readme = records
        .iter()
        .find(|r| r.path == path_to_bytes(&root.join("README")))
        .unwrap();
    assert_eq!(readme.kind, FileKind::Regular);
    assert_eq!(readme.size, Some(6));
    assert!(readme.mtime.is_some());
}

#[test]
fn test_create_is_deterministic() {
    let temp = create_test_tree();
    let roots = [temp.path().to_path_buf()];
    let config = full_config();

    let first = manifest_of(&roots, &config).unwrap();
    let second = manifest_of(&roots, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_kind_filter() {
    let temp = create_test_tree();
    let config = ManifestConfig::builder()
        .kinds(KindFilter::from_letters("d").unwrap())
        .build()
        .unwrap();

    let records = records_of(&manifest_of(&[temp.path().to_path_buf()], &config).unwrap());
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.kind == FileKind::Directory));
    assert!(records.iter().all(|r| r.size.is_none() && r.mtime.is_none()));
}

#[test]
fn test_single_file_root() {
    let temp = create_test_tree();
    let file = temp.path().join("README");

    let records = records_of(&manifest_of(&[file.clone()], &ManifestConfig::new()).unwrap());
    assert_eq!(records, vec![FileRecord::new(path_to_bytes(&file), FileKind::Regular)]);
}

#[test]
fn test_multiple_roots_in_order() {
    let temp = create_test_tree();
    let roots = [temp.path().join("src"), temp.path().join("README")];

    let records = records_of(&manifest_of(&roots, &ManifestConfig::new()).unwrap());
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].to_path_buf(), roots[0]);
    assert_eq!(records[3].to_path_buf(), roots[1]);
}

#[cfg(unix)]
#[test]
fn test_dangling_link_fatal_unless_verbose() {
    let temp = create_test_tree();
    std::os::unix::fs::symlink(temp.path().join("gone"), temp.path().join("src/dangling")).unwrap();
    let roots = [temp.path().to_path_buf()];

    // Physically the dangling link is just a symlink
    let records = records_of(&manifest_of(&roots, &ManifestConfig::new()).unwrap());
    assert!(records.iter().any(|r| r.kind == FileKind::Symlink));

    let strict = ManifestConfig::builder()
        .follow_all_links(true)
        .build()
        .unwrap();
    assert!(matches!(
        manifest_of(&roots, &strict),
        Err(ManifestError::Probe(ref e)) if e.is_not_found()
    ));

    let verbose = ManifestConfig::builder()
        .follow_all_links(true)
        .verbose(true)
        .build()
        .unwrap();
    let mut out = Vec::new();
    let summary = create_manifest(&roots, &verbose, &mut out).unwrap();
    assert_eq!(summary.warnings.len(), 1);
    assert_eq!(summary.records, 9);
}

#[cfg(unix)]
#[test]
fn test_create_stops_on_loop() {
    let temp = create_test_tree();
    std::os::unix::fs::symlink("..", temp.path().join("docs/notes/up")).unwrap();

    let config = ManifestConfig::builder()
        .follow_all_links(true)
        .build()
        .unwrap();

    match manifest_of(&[temp.path().to_path_buf()], &config) {
        Err(ManifestError::InfiniteLoop { path, ancestor }) => {
            assert_eq!(path, temp.path().join("docs/notes/up"));
            assert_eq!(ancestor, temp.path().join("docs"));
        }
        other => panic!("expected loop error, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn test_command_line_link_policy() {
    let temp = create_test_tree();
    let link = temp.path().join("src-link");
    std::os::unix::fs::symlink(temp.path().join("src"), &link).unwrap();

    let physical = records_of(&manifest_of(&[link.clone()], &ManifestConfig::new()).unwrap());
    assert_eq!(physical.len(), 1);
    assert_eq!(physical[0].kind, FileKind::Symlink);

    let config = ManifestConfig::builder()
        .follow_command_line_links(true)
        .build()
        .unwrap();
    let logical = records_of(&manifest_of(&[link.clone()], &config).unwrap());
    assert_eq!(logical.len(), 3);
    assert_eq!(logical[0].kind, FileKind::Directory);
    assert!(
        logical
            .iter()
            .any(|r| r.to_path_buf() == Path::new(&link).join("main.rs"))
    );
}

#[test]
fn test_create_without_roots_uses_bare_names() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("sub")).unwrap();
    fs::write(temp.path().join("a"), "a").unwrap();
    fs::write(temp.path().join("sub/x"), "x").unwrap();

    let no_roots: [PathBuf; 0] = [];
    let bytes = in_dir(temp.path(), || manifest_of(&no_roots, &ManifestConfig::new())).unwrap();

    let mut paths: Vec<_> = records_of(&bytes).into_iter().map(|r| r.path).collect();
    paths.sort();
    assert_eq!(paths, vec![b"a".to_vec(), b"sub".to_vec(), b"sub/x".to_vec()]);
}
