use crate::prelude::DB;
use std::sync::Weak;
use tempfile::TempDir;

/// Holds the temp directory of a test database alive and
/// asserts on drop that no strong references to the DB remain
#[derive(Default)]
pub struct DbLifetime {
    weak_db_ref: Weak<DB>,
    tempdir: Option<TempDir>,
}

impl DbLifetime {
    pub fn new(tempdir: TempDir, weak_db_ref: Weak<DB>) -> Self {
        Self { tempdir: Some(tempdir), weak_db_ref }
    }
}

impl Drop for DbLifetime {
    fn drop(&mut self) {
        for _ in 0..16 {
            if self.weak_db_ref.strong_count() > 0 {
                std::thread::sleep(std::time::Duration::from_millis(50));
            } else {
                break;
            }
        }
        assert_eq!(self.weak_db_ref.strong_count(), 0, "DB is expected to have no strong references when lifetime is dropped");
        if let Some(dir) = self.tempdir.take() {
            let options = rocksdb::Options::default();
            let _ = DB::destroy(&options, dir.path());
        }
    }
}

pub fn get_galaxy_tempdir() -> TempDir {
    let global_tempdir = std::env::temp_dir();
    let galaxy_tempdir = global_tempdir.join("galaxy-node");
    std::fs::create_dir_all(galaxy_tempdir.as_path()).unwrap();
    tempfile::tempdir_in(galaxy_tempdir.as_path()).unwrap()
}

/// Creates a DB within a temp directory under `<OS SPECIFIC TEMP DIR>/galaxy-node`.
/// Callers must keep the returned `DbLifetime` in scope as long as the DB is used
#[macro_export]
macro_rules! create_temp_db {
    ($conn_builder: expr) => {{
        let db_tempdir = $crate::utils::get_galaxy_tempdir();
        let db_path = db_tempdir.path().to_owned();
        let db = $conn_builder.with_db_path(db_path).build().unwrap();
        ($crate::utils::DbLifetime::new(db_tempdir, std::sync::Arc::downgrade(&db)), db)
    }};
}
